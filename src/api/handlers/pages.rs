use crate::{
    accounts::Accounts,
    api::{
        html,
        session::{require_session, FlashLevel, Session},
    },
    store::UserRecord,
};
use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::{error, warn};

/// Gate the request and load the bound user's record.
async fn current_user(
    accounts: &Accounts,
    session: &Session,
    message: &str,
) -> Result<UserRecord, Response> {
    let username = require_session(session, message)
        .await
        .map_err(IntoResponse::into_response)?;

    match accounts.find(&username).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => {
            // The account vanished from the store; the session is worthless.
            warn!("session bound to unknown user {username}");
            session.clear().await;
            session.flash(FlashLevel::Error, message).await;
            Err(Redirect::to("/login").into_response())
        }
        Err(err) => {
            error!("Failed to load user: {err}");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error loading user".to_string(),
            )
                .into_response())
        }
    }
}

#[utoipa::path(
    get,
    path = "/dashboard",
    responses(
        (status = 200, description = "Dashboard for the logged-in user", body = String, content_type = "text/html"),
        (status = 303, description = "No session, redirect to /login")
    ),
    tag = "pages"
)]
pub async fn dashboard(
    Extension(accounts): Extension<Arc<Accounts>>,
    Extension(session): Extension<Session>,
) -> Response {
    match current_user(&accounts, &session, "Please log in to access the dashboard").await {
        Ok(user) => html::dashboard(&user, &session.take_flashes().await).into_response(),
        Err(response) => response,
    }
}

#[utoipa::path(
    get,
    path = "/profile",
    responses(
        (status = 200, description = "Profile of the logged-in user", body = String, content_type = "text/html"),
        (status = 303, description = "No session, redirect to /login")
    ),
    tag = "pages"
)]
pub async fn profile(
    Extension(accounts): Extension<Arc<Accounts>>,
    Extension(session): Extension<Session>,
) -> Response {
    match current_user(&accounts, &session, "Please log in to access your profile").await {
        Ok(user) => html::profile(&user, &session.take_flashes().await).into_response(),
        Err(response) => response,
    }
}
