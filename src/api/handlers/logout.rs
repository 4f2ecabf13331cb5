use crate::api::session::{FlashLevel, Session};
use axum::{
    extract::Extension,
    response::{IntoResponse, Redirect, Response},
};
use tracing::info;

#[utoipa::path(
    get,
    path = "/logout",
    responses(
        (status = 303, description = "Session cleared, redirect to /login")
    ),
    tag = "auth"
)]
pub async fn logout(Extension(session): Extension<Session>) -> Response {
    // Always clear, even when nobody was logged in.
    if let Some(username) = session.clear().await {
        info!("user {username} logged out");
        session
            .flash(
                FlashLevel::Info,
                format!("Goodbye, {username}! You have been logged out."),
            )
            .await;
    }
    Redirect::to("/login").into_response()
}
