//! Server-side sessions.
//!
//! Flow Overview: [`layer`] resolves the session cookie into an explicit
//! [`Session`] and inserts it into the request extensions. Handlers read and
//! mutate that object; once the handler returns, the layer persists the
//! changes and sets, rotates or clears the cookie.

use axum::{
    extract::{Request, State},
    http::{header::SET_COOKIE, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::{sync::Mutex, sync::RwLock, task::JoinHandle, time::interval};
use tracing::{debug, error, info};

pub mod cookie;
mod gate;

pub use self::gate::{require_session, LOGIN_PATH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashLevel {
    Error,
    Success,
    Info,
}

impl FlashLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Success => "success",
            Self::Info => "info",
        }
    }
}

/// One-shot notification shown by the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionData {
    pub username: Option<String>,
    pub logged_in: bool,
    pub flashes: Vec<Flash>,
}

impl SessionData {
    /// Nothing worth keeping a server-side record for.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && !self.logged_in && self.flashes.is_empty()
    }
}

#[derive(Debug, Default)]
struct SessionState {
    data: SessionData,
    dirty: bool,
    rotate: bool,
    cleared: bool,
}

/// Per-request handle on the caller's session.
#[derive(Debug, Clone, Default)]
pub struct Session {
    state: Arc<Mutex<SessionState>>,
}

impl Session {
    fn from_data(data: SessionData) -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState {
                data,
                ..SessionState::default()
            })),
        }
    }

    /// The logged-in username, if the session marker is set.
    pub async fn username(&self) -> Option<String> {
        let state = self.state.lock().await;
        if state.data.logged_in {
            state.data.username.clone()
        } else {
            None
        }
    }

    /// Bind `username` to the session. The token is rotated on commit.
    pub async fn login(&self, username: &str) {
        let mut state = self.state.lock().await;
        state.data.username = Some(username.to_string());
        state.data.logged_in = true;
        state.rotate = true;
        state.dirty = true;
    }

    /// Drop all session state, returning the username that was bound.
    pub async fn clear(&self) -> Option<String> {
        let mut state = self.state.lock().await;
        let previous = std::mem::take(&mut state.data);
        state.cleared = true;
        state.dirty = true;
        previous.username.filter(|_| previous.logged_in)
    }

    pub async fn flash(&self, level: FlashLevel, message: impl Into<String>) {
        let mut state = self.state.lock().await;
        state.data.flashes.push(Flash {
            level,
            message: message.into(),
        });
        state.dirty = true;
    }

    /// Pending flashes, removed from the session.
    pub async fn take_flashes(&self) -> Vec<Flash> {
        let mut state = self.state.lock().await;
        if state.data.flashes.is_empty() {
            return Vec::new();
        }
        state.dirty = true;
        std::mem::take(&mut state.data.flashes)
    }

    async fn finish(&self) -> SessionState {
        std::mem::take(&mut *self.state.lock().await)
    }
}

#[derive(Debug)]
struct SessionRecord {
    data: SessionData,
    created: Instant,
}

/// Lifetime of sessions that only carry flash messages.
pub const ANONYMOUS_TTL: Duration = Duration::from_secs(300);
/// Upper bound on flash-only sessions kept at once.
pub const MAX_ANONYMOUS_SESSIONS: usize = 1024;

/// In-memory session table keyed by the SHA-256 of the token.
///
/// Logged-in sessions live for `ttl` (or until logout when `None`). Sessions
/// without a login only carry flashes for the next page; they expire after
/// `anonymous_ttl` and at most `max_anonymous` of them are kept, oldest
/// evicted first.
#[derive(Debug)]
pub struct SessionStore {
    records: RwLock<HashMap<Vec<u8>, SessionRecord>>,
    ttl: Option<Duration>,
    anonymous_ttl: Duration,
    max_anonymous: usize,
    secure_cookie: bool,
}

impl SessionStore {
    /// `ttl` of `None` keeps sessions until logout.
    #[must_use]
    pub fn new(ttl: Option<Duration>, secure_cookie: bool) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            ttl,
            anonymous_ttl: ANONYMOUS_TTL,
            max_anonymous: MAX_ANONYMOUS_SESSIONS,
            secure_cookie,
        }
    }

    /// Override the lifetime and count limit of flash-only sessions.
    #[must_use]
    pub fn with_anonymous_limits(mut self, ttl: Duration, max: usize) -> Self {
        self.anonymous_ttl = ttl;
        self.max_anonymous = max.max(1);
        self
    }

    #[must_use]
    pub const fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    fn expired(&self, record: &SessionRecord, now: Instant) -> bool {
        let age = now.saturating_duration_since(record.created);
        if !record.data.logged_in && age >= self.anonymous_ttl {
            return true;
        }
        self.ttl.is_some_and(|ttl| age >= ttl)
    }

    /// Resolve a raw token; expired records are purged and reported absent.
    pub async fn lookup(&self, token: &str) -> Option<SessionData> {
        let key = cookie::hash_session_token(token);
        let now = Instant::now();
        {
            let records = self.records.read().await;
            match records.get(&key) {
                Some(record) if !self.expired(record, now) => return Some(record.data.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        debug!("session expired");
        self.records.write().await.remove(&key);
        None
    }

    async fn insert(&self, token: &str, data: SessionData) {
        let mut records = self.records.write().await;
        if !data.logged_in {
            let mut anonymous: Vec<(Instant, Vec<u8>)> = records
                .iter()
                .filter(|(_, record)| !record.data.logged_in)
                .map(|(key, record)| (record.created, key.clone()))
                .collect();
            if anonymous.len() >= self.max_anonymous {
                anonymous.sort_unstable();
                let excess = anonymous.len() + 1 - self.max_anonymous;
                for (_, key) in anonymous.into_iter().take(excess) {
                    records.remove(&key);
                }
                debug!("evicted {excess} anonymous sessions");
            }
        }
        records.insert(
            cookie::hash_session_token(token),
            SessionRecord {
                data,
                created: Instant::now(),
            },
        );
    }

    async fn update(&self, token: &str, data: SessionData) {
        if let Some(record) = self
            .records
            .write()
            .await
            .get_mut(&cookie::hash_session_token(token))
        {
            record.data = data;
        }
    }

    pub async fn remove(&self, token: &str) {
        self.records
            .write()
            .await
            .remove(&cookie::hash_session_token(token));
    }

    /// Drop every expired record, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| !self.expired(record, now));
        before - records.len()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

/// Periodically purge expired sessions.
pub fn spawn_sweeper(store: Arc<SessionStore>) -> JoinHandle<()> {
    let shortest = store
        .ttl
        .map_or(store.anonymous_ttl, |ttl| ttl.min(store.anonymous_ttl));
    let period = shortest.clamp(Duration::from_secs(1), Duration::from_secs(60));
    tokio::spawn(async move {
        let mut ticker = interval(period);
        loop {
            ticker.tick().await;
            let purged = store.purge_expired().await;
            if purged > 0 {
                info!("purged {purged} expired sessions");
            }
        }
    })
}

/// Axum middleware binding a [`Session`] to every request.
pub async fn layer(
    State(store): State<Arc<SessionStore>>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = cookie::extract_session_token(request.headers());
    let loaded = match &token {
        Some(token) => store.lookup(token).await,
        None => None,
    };
    let stale_cookie = token.is_some() && loaded.is_none();
    let existing = token.filter(|_| loaded.is_some());

    let session = Session::from_data(loaded.unwrap_or_default());
    request.extensions_mut().insert(session.clone());

    let mut response = next.run(request).await;

    let state = session.finish().await;
    let replace = state.rotate || state.cleared;

    if let Some(token) = &existing {
        if replace || state.data.is_empty() {
            store.remove(token).await;
        }
    }

    let set_cookie = if state.data.is_empty() {
        if existing.is_some() || stale_cookie {
            cookie::clear_session_cookie(store.secure_cookie).ok()
        } else {
            None
        }
    } else {
        match existing.as_deref() {
            Some(token) if !replace => {
                if state.dirty {
                    store.update(token, state.data).await;
                }
                None
            }
            _ => {
                let token = match cookie::generate_session_token() {
                    Ok(token) => token,
                    Err(err) => {
                        error!("Failed to create session: {err:#}");
                        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
                    }
                };
                store.insert(&token, state.data).await;
                debug!("session issued");
                match cookie::session_cookie(&token, store.ttl, store.secure_cookie) {
                    Ok(value) => Some(value),
                    Err(err) => {
                        error!("Failed to build session cookie: {err}");
                        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
                    }
                }
            }
        }
    };

    if let Some(value) = set_cookie {
        response.headers_mut().append(SET_COOKIE, value);
    }

    response
}
