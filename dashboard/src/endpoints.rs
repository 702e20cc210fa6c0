//! Endpoints of HTTP server.
//!
use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Extension, Form, Json, Router,
};
use axum_extra::extract::cookie::{Key, SignedCookieJar};
use common::{
    records::{PredictionRecord, UserRecord, PREDICTIONS, USERS},
    store::{DocumentStore, Sort, StoreError},
};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::{
    auth::{self, AuthError},
    pages,
    session::{removal_cookie, session_cookie, SessionStore},
};

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("blocking task failed: {0}")]
    Blocking(#[from] tokio::task::JoinError),
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        log::error!("Request failed: {self}");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
    }
}

/// Form fields of the login and registration pages.
#[derive(Debug, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

/// Dependencies shared by all requests, built once at startup.
pub struct Dashboard {
    store: Arc<DocumentStore>,
    sessions: SessionStore,
}

impl Dashboard {
    pub fn new(store: Arc<DocumentStore>) -> Self {
        Self {
            store,
            sessions: SessionStore::new(),
        }
    }

    fn latest_for(&self, user: &str) -> Result<Vec<PredictionRecord>, DashboardError> {
        let latest = self
            .store
            .find_one(PREDICTIONS, Some(("user_id", user)), Sort::Newest)?;
        Ok(match latest {
            Some(doc) => vec![doc.deserialize()?],
            None => vec![],
        })
    }

    fn find_user(&self, username: &str) -> Result<Option<UserRecord>, DashboardError> {
        let user = self
            .store
            .find_one(USERS, Some(("username", username)), Sort::Oldest)?;
        Ok(match user {
            Some(doc) => Some(doc.deserialize()?),
            None => None,
        })
    }
}

/// Run store and password hashing work on the blocking pool.
async fn blocking<T, F>(f: F) -> Result<T, DashboardError>
where
    F: FnOnce() -> Result<T, DashboardError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

pub fn router(dashboard: Arc<Dashboard>, key: Key) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/data", get(data))
        .route("/login", get(login_page).post(login))
        .route("/register", get(register_page).post(register))
        .route("/logout", get(logout))
        .layer(Extension(dashboard))
        .with_state(key)
}

/// Home page with the latest prediction of the logged in user.
pub async fn index(
    Extension(dashboard): Extension<Arc<Dashboard>>,
    jar: SignedCookieJar,
) -> Result<Html<String>, DashboardError> {
    let user = dashboard.sessions.user(&jar);
    let history = match user.clone() {
        Some(user) => blocking(move || dashboard.latest_for(&user)).await?,
        None => vec![],
    };

    Ok(Html(pages::index(user.as_deref(), &history)))
}

/// Most recent prediction of any user.
pub async fn data(
    Extension(dashboard): Extension<Arc<Dashboard>>,
) -> Result<Json<Value>, DashboardError> {
    let latest =
        blocking(move || Ok(dashboard.store.find_one(PREDICTIONS, None, Sort::Newest)?)).await?;

    Ok(Json(match latest {
        Some(doc) => doc.into_json(),
        None => json!({ "message": "No data found." }),
    }))
}

pub async fn login_page() -> Html<String> {
    Html(pages::login(None))
}

pub async fn login(
    Extension(dashboard): Extension<Arc<Dashboard>>,
    jar: SignedCookieJar,
    Form(credentials): Form<Credentials>,
) -> Result<Response, DashboardError> {
    let username = credentials.username.trim().to_owned();
    let verified = {
        let dashboard = Arc::clone(&dashboard);
        let username = username.clone();
        blocking(move || match dashboard.find_user(&username)? {
            Some(user) => Ok(auth::verify_password(&credentials.password, &user.password_hash)?),
            None => Ok(false),
        })
        .await?
    };

    if !verified {
        log::info!("Failed login for {username:?}");
        return Ok(Html(pages::login(Some(pages::INVALID_CREDENTIALS))).into_response());
    }

    log::info!("{username} logged in");
    let token = dashboard.sessions.issue(&username);

    Ok((jar.add(session_cookie(token)), Redirect::to("/")).into_response())
}

pub async fn register_page() -> Html<String> {
    Html(pages::register(None))
}

pub async fn register(
    Extension(dashboard): Extension<Arc<Dashboard>>,
    Form(credentials): Form<Credentials>,
) -> Result<Response, DashboardError> {
    let username = credentials.username.trim().to_owned();
    if username.is_empty() || credentials.password.is_empty() {
        return Ok(Html(pages::register(Some(pages::MISSING_CREDENTIALS))).into_response());
    }

    let inserted = {
        let username = username.clone();
        blocking(move || {
            let user = UserRecord {
                username,
                password_hash: auth::hash_password(&credentials.password)?,
            };
            Ok(dashboard.store.insert_if_absent(USERS, "username", &user)?)
        })
        .await?
    };

    match inserted {
        Some(_) => {
            log::info!("Registered {username}");
            Ok(Redirect::to("/login").into_response())
        }
        None => Ok(Html(pages::register(Some(pages::USERNAME_TAKEN))).into_response()),
    }
}

pub async fn logout(
    Extension(dashboard): Extension<Arc<Dashboard>>,
    jar: SignedCookieJar,
) -> (SignedCookieJar, Redirect) {
    if let Some(cookie) = jar.get(crate::session::SESSION_COOKIE) {
        if let Some(user) = dashboard.sessions.revoke(cookie.value()) {
            log::info!("{user} logged out");
        }
    }

    (jar.remove(removal_cookie()), Redirect::to("/login"))
}
