use anyhow::Result;
use axum::{
    body::{to_bytes, Body},
    http::{
        header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
        Method, Request, StatusCode,
    },
    response::Response,
    Router,
};
use keyhole::{
    accounts::{Accounts, Hasher, PasswordPolicy},
    api::{self, session::SessionStore},
    store::{CredentialStore, JsonFileStore, MemoryStore},
};
use std::{sync::Arc, time::Duration};
use tower::ServiceExt;

const COOKIE_NAME: &str = "keyhole_session";

/// Router plus a one-cookie jar.
struct Browser {
    app: Router,
    sessions: Arc<SessionStore>,
    cookie: Option<String>,
}

impl Browser {
    fn new(store: Arc<dyn CredentialStore>) -> Result<Self> {
        Self::with_sessions(
            store,
            SessionStore::new(Some(Duration::from_secs(3600)), false),
        )
    }

    fn with_sessions(store: Arc<dyn CredentialStore>, sessions: SessionStore) -> Result<Self> {
        let accounts = Arc::new(Accounts::new(
            store,
            Hasher::with_cost(8, 1, 1)?,
            PasswordPolicy::default(),
        ));
        let sessions = Arc::new(sessions);
        Ok(Self {
            app: api::router(accounts, sessions.clone()),
            sessions,
            cookie: None,
        })
    }

    async fn send(&mut self, method: Method, uri: &str, form: Option<&str>) -> Result<Response> {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = &self.cookie {
            request = request.header(COOKIE, format!("{COOKIE_NAME}={token}"));
        }
        let body = match form {
            Some(form) => {
                request = request.header(CONTENT_TYPE, "application/x-www-form-urlencoded");
                Body::from(form.to_string())
            }
            None => Body::empty(),
        };

        let response = self.app.clone().oneshot(request.body(body)?).await?;

        for value in response.headers().get_all(SET_COOKIE) {
            let value = value.to_str()?;
            let token = value
                .split(';')
                .next()
                .and_then(|pair| pair.strip_prefix(&format!("{COOKIE_NAME}=")))
                .unwrap_or_default();
            self.cookie = (!token.is_empty()).then(|| token.to_string());
        }

        Ok(response)
    }

    async fn get(&mut self, uri: &str) -> Result<Response> {
        self.send(Method::GET, uri, None).await
    }

    async fn post(&mut self, uri: &str, form: &str) -> Result<Response> {
        self.send(Method::POST, uri, Some(form)).await
    }
}

fn location(response: &Response) -> Option<&str> {
    response.headers().get(LOCATION).and_then(|v| v.to_str().ok())
}

async fn text(response: Response) -> Result<String> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(String::from_utf8(bytes.to_vec())?)
}

const ALICE: &str = "username=alice&password=secret1&email=a%40x.com&full_name=Alice+Liddell";

#[tokio::test]
async fn register_login_browse_logout() -> Result<()> {
    let mut browser = Browser::new(Arc::new(MemoryStore::new()))?;

    let response = browser.post("/register", ALICE).await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login"));

    let page = text(browser.get("/login").await?).await?;
    assert!(page.contains("Registration successful! Please log in."));

    let response = browser.post("/", "username=alice&password=secret1").await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/dashboard"));
    let logged_in_cookie = browser.cookie.clone();
    assert!(logged_in_cookie.is_some());

    let response = browser.get("/dashboard").await?;
    assert_eq!(response.status(), StatusCode::OK);
    let page = text(response).await?;
    assert!(page.contains("Welcome back, alice!"));
    assert!(page.contains("Welcome, alice!"));
    assert!(page.contains("Dashboard Overview"));

    let page = text(browser.get("/profile").await?).await?;
    assert!(page.contains("User Profile"));
    assert!(page.contains("a@x.com"));
    assert!(page.contains("Alice Liddell"));
    assert!(!page.contains("Welcome back"));

    // Logged-in users skip the forms.
    let response = browser.get("/login").await?;
    assert_eq!(location(&response), Some("/dashboard"));

    let response = browser.get("/logout").await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login"));
    assert_ne!(browser.cookie, logged_in_cookie);

    let page = text(browser.get("/login").await?).await?;
    assert!(page.contains("Goodbye, alice! You have been logged out."));

    let response = browser.get("/dashboard").await?;
    assert_eq!(location(&response), Some("/login"));

    // Replaying the old cookie grants nothing.
    browser.cookie = logged_in_cookie;
    let response = browser.get("/dashboard").await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login"));
    Ok(())
}

#[tokio::test]
async fn protected_pages_redirect_anonymous_users() -> Result<()> {
    let mut browser = Browser::new(Arc::new(MemoryStore::new()))?;

    for (path, message) in [
        ("/dashboard", "Please log in to access the dashboard"),
        ("/profile", "Please log in to access your profile"),
    ] {
        let response = browser.get(path).await?;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), Some("/login"));

        let page = text(browser.get("/login").await?).await?;
        assert!(page.contains(message), "{path}: {page}");
    }

    let response = browser.get("/").await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(text(response).await?.contains("<h2>Login</h2>"));
    Ok(())
}

#[tokio::test]
async fn failed_login_and_registration_flash_errors() -> Result<()> {
    let mut browser = Browser::new(Arc::new(MemoryStore::new()))?;
    browser.post("/register", ALICE).await?;
    browser.get("/login").await?;

    let response = browser.post("/login", "username=alice&password=wrong").await?;
    assert_eq!(location(&response), Some("/login"));
    let page = text(browser.get("/login").await?).await?;
    assert!(page.contains("Invalid username or password"));

    let response = browser.post("/login", "username=nobody&password=secret1").await?;
    assert_eq!(location(&response), Some("/login"));
    let page = text(browser.get("/login").await?).await?;
    assert!(page.contains("Invalid username or password"));

    let response = browser.post("/register", ALICE).await?;
    assert_eq!(location(&response), Some("/register"));
    let page = text(browser.get("/register").await?).await?;
    assert!(page.contains("Username already exists"));

    browser
        .post("/register", "username=bob&password=secret1&email=&full_name=Bob")
        .await?;
    let page = text(browser.get("/register").await?).await?;
    assert!(page.contains("All fields are required"));

    browser
        .post("/register", "username=bob&password=abc&email=b%40x.com&full_name=Bob")
        .await?;
    let page = text(browser.get("/register").await?).await?;
    assert!(page.contains("Password must be at least 6 characters"));
    Ok(())
}

#[tokio::test]
async fn cookieless_clients_do_not_grow_session_table() -> Result<()> {
    let sessions = SessionStore::new(None, false).with_anonymous_limits(Duration::from_secs(300), 16);
    let mut browser = Browser::with_sessions(Arc::new(MemoryStore::new()), sessions)?;

    for _ in 0..200 {
        browser.cookie = None;
        let response = browser.get("/dashboard").await?;
        assert_eq!(location(&response), Some("/login"));
    }
    assert!(browser.sessions.len().await <= 16);

    // A real visitor still gets their flash after the flood.
    let page = text(browser.get("/login").await?).await?;
    assert!(page.contains("Please log in to access the dashboard"));
    Ok(())
}

#[tokio::test]
async fn login_rotates_session_token() -> Result<()> {
    let mut browser = Browser::new(Arc::new(MemoryStore::new()))?;
    browser.post("/register", ALICE).await?;
    let anonymous = browser.cookie.clone();
    assert!(anonymous.is_some());

    browser.post("/login", "username=alice&password=secret1").await?;
    assert!(browser.cookie.is_some());
    assert_ne!(browser.cookie, anonymous);

    browser.cookie = anonymous;
    let response = browser.get("/dashboard").await?;
    assert_eq!(location(&response), Some("/login"));
    Ok(())
}

#[tokio::test]
async fn file_store_persists_hashed_records() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("users.json");
    let mut browser = Browser::new(Arc::new(JsonFileStore::new(&path)))?;

    browser.post("/register", ALICE).await?;
    browser.post("/login", "username=alice&password=secret1").await?;

    let document: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    let alice = &document["alice"];
    assert_eq!(alice["email"], "a@x.com");
    assert!(alice["password_hash"]
        .as_str()
        .is_some_and(|hash| hash.starts_with("$argon2id$")));
    assert!(!document.to_string().contains("secret1"));
    assert!(alice["last_login"].is_string());
    Ok(())
}

#[tokio::test]
async fn health_reports_store_status() -> Result<()> {
    let mut browser = Browser::new(Arc::new(MemoryStore::new()))?;

    let response = browser.get("/health").await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get("X-App")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("keyhole:")));
    let health: serde_json::Value = serde_json::from_str(&text(response).await?)?;
    assert_eq!(health["store"], "ok");
    assert_eq!(health["name"], "keyhole");

    let response = browser.send(Method::OPTIONS, "/health", None).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(text(response).await?.is_empty());
    assert!(browser.cookie.is_none());
    Ok(())
}

#[tokio::test]
async fn health_fails_on_corrupt_store() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("users.json");
    std::fs::write(&path, "[not a map")?;
    let mut browser = Browser::new(Arc::new(JsonFileStore::new(&path)))?;

    let response = browser.get("/health").await?;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let health: serde_json::Value = serde_json::from_str(&text(response).await?)?;
    assert_eq!(health["store"], "error");

    let response = browser.post("/login", "username=alice&password=secret1").await?;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    Ok(())
}
