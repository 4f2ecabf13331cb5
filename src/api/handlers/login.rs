use crate::{
    accounts::{Accounts, AuthFailure},
    api::{
        html,
        session::{FlashLevel, Session},
    },
};
use axum::{
    extract::{Extension, Form},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use secrecy::SecretString;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, instrument};
use utoipa::ToSchema;

#[derive(ToSchema, Deserialize, Debug)]
pub struct LoginForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    #[schema(value_type = String)]
    password: SecretString,
}

#[utoipa::path(
    get,
    path = "/login",
    responses(
        (status = 200, description = "Login form with pending flash messages", body = String, content_type = "text/html"),
        (status = 303, description = "Already logged in, redirect to /dashboard")
    ),
    tag = "auth"
)]
pub async fn login_form(Extension(session): Extension<Session>) -> Response {
    if session.username().await.is_some() {
        return Redirect::to("/dashboard").into_response();
    }
    html::login(&session.take_flashes().await).into_response()
}

#[utoipa::path(
    post,
    path = "/login",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Redirect to /dashboard on success, back to /login otherwise"),
        (status = 500, description = "Credential store unavailable")
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn login(
    Extension(accounts): Extension<Arc<Accounts>>,
    Extension(session): Extension<Session>,
    Form(form): Form<LoginForm>,
) -> Response {
    let username = form.username.trim();

    match accounts.authenticate(username, &form.password).await {
        Ok(user) => {
            session.login(&user.username).await;
            session
                .flash(
                    FlashLevel::Success,
                    format!("Welcome back, {}!", user.username),
                )
                .await;
            Redirect::to("/dashboard").into_response()
        }
        Err(AuthFailure::InvalidCredentials) => {
            session
                .flash(
                    FlashLevel::Error,
                    AuthFailure::InvalidCredentials.to_string(),
                )
                .await;
            Redirect::to("/login").into_response()
        }
        Err(err) => {
            error!("Login failed: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error processing login".to_string(),
            )
                .into_response()
        }
    }
}
