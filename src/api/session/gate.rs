use super::{FlashLevel, Session};
use axum::response::Redirect;
use tracing::debug;

pub const LOGIN_PATH: &str = "/login";

/// Resolve the logged-in username or send the caller back to the login form
/// with `message` flashed as an error.
///
/// # Errors
/// Returns the redirect when the session carries no login marker.
pub async fn require_session(session: &Session, message: &str) -> Result<String, Redirect> {
    if let Some(username) = session.username().await {
        return Ok(username);
    }
    debug!("no active session, redirecting to login");
    session.flash(FlashLevel::Error, message).await;
    Err(Redirect::to(LOGIN_PATH))
}
