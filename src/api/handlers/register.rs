use crate::{
    accounts::{Accounts, NewUser},
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
use tracing::{debug, error, instrument};
use utoipa::ToSchema;

#[derive(ToSchema, Deserialize, Debug)]
pub struct RegisterForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    #[schema(value_type = String)]
    password: SecretString,
    #[serde(default)]
    email: String,
    #[serde(default)]
    full_name: String,
}

impl From<RegisterForm> for NewUser {
    fn from(form: RegisterForm) -> Self {
        Self {
            username: form.username,
            password: form.password,
            email: form.email,
            full_name: form.full_name,
        }
    }
}

#[utoipa::path(
    get,
    path = "/register",
    responses(
        (status = 200, description = "Registration form with pending flash messages", body = String, content_type = "text/html"),
        (status = 303, description = "Already logged in, redirect to /dashboard")
    ),
    tag = "register"
)]
pub async fn register_form(
    Extension(accounts): Extension<Arc<Accounts>>,
    Extension(session): Extension<Session>,
) -> Response {
    if session.username().await.is_some() {
        return Redirect::to("/dashboard").into_response();
    }
    let flashes = session.take_flashes().await;
    html::register(&flashes, accounts.policy().min_length).into_response()
}

#[utoipa::path(
    post,
    path = "/register",
    request_body(content = RegisterForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Redirect to /login on success, back to /register otherwise"),
        (status = 500, description = "Credential store unavailable")
    ),
    tag = "register"
)]
#[instrument(skip_all)]
pub async fn register(
    Extension(accounts): Extension<Arc<Accounts>>,
    Extension(session): Extension<Session>,
    Form(form): Form<RegisterForm>,
) -> Response {
    match accounts.register(form.into()).await {
        Ok(user) => {
            debug!("registered {}", user.username);
            session
                .flash(
                    FlashLevel::Success,
                    "Registration successful! Please log in.",
                )
                .await;
            Redirect::to("/login").into_response()
        }
        Err(err) if err.is_user_error() => {
            session.flash(FlashLevel::Error, err.to_string()).await;
            Redirect::to("/register").into_response()
        }
        Err(err) => {
            error!("Registration failed: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error creating user".to_string(),
            )
                .into_response()
        }
    }
}
