//! Server-side sessions keyed by an opaque token carried in a signed cookie.
use std::{collections::HashMap, sync::Mutex};

use axum_extra::extract::cookie::{Cookie, Key, SignedCookieJar};
use sha2::{Digest, Sha512};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "session";

/// Cookie signing key derived from the configured secret.
pub fn session_key(secret: &str) -> Key {
    Key::from(Sha512::digest(secret.as_bytes()).as_slice())
}

#[derive(Default)]
pub struct SessionStore {
    tokens: Mutex<HashMap<String, String>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session for `username` and return its token.
    pub fn issue(&self, username: &str) -> String {
        let token = Uuid::new_v4().simple().to_string();
        self.tokens
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(token.clone(), username.to_owned());
        token
    }

    pub fn lookup(&self, token: &str) -> Option<String> {
        self.tokens
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(token)
            .cloned()
    }

    pub fn revoke(&self, token: &str) -> Option<String> {
        self.tokens
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(token)
    }

    /// User of the session carried by `jar`, if it is still active.
    pub fn user(&self, jar: &SignedCookieJar) -> Option<String> {
        jar.get(SESSION_COOKIE)
            .and_then(|cookie| self.lookup(cookie.value()))
    }
}

pub fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, token)
        .path("/")
        .http_only(true)
        .finish()
}

pub fn removal_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::named(SESSION_COOKIE);
    cookie.set_path("/");
    cookie
}
