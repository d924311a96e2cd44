//! Session store: cookie codec + session repository behind one `Session` value.
//!
//! The browser only ever holds the codec-encoded session key. The payload
//! lives server-side and is (de)serialized here.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponseParts, ResponseParts};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use cookie::{Cookie, SameSite};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, error};

use haven_auth::{CodecError, IdentityError, SecureCookieCodec, SessionPayload, generate_random_key};
use haven_infra::sessions::{SaveSession, SessionRepoError, SessionRepository};

pub const SESSION_COOKIE: &str = "session";
pub const DEFAULT_MAX_AGE_SECS: i64 = 7 * 24 * 60 * 60;

const SESSION_KEY_BYTES: usize = 32;

/// Request-scoped upper bound for storage calls.
#[derive(Debug, Clone, Copy)]
pub struct Deadline(Instant);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("request deadline elapsed")]
pub struct DeadlineElapsed;

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        Self(Instant::now() + timeout)
    }

    pub async fn run<F: Future>(self, fut: F) -> Result<F::Output, DeadlineElapsed> {
        tokio::time::timeout_at(self.0, fut).await.map_err(|_| DeadlineElapsed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieOptions {
    pub path: String,
    /// Seconds; negative marks the session for removal.
    pub max_age_secs: i64,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            max_age_secs: DEFAULT_MAX_AGE_SECS,
            http_only: true,
            secure: true,
            same_site: SameSite::Lax,
        }
    }
}

/// One browsing context. Fresh sessions have no key until first saved.
#[derive(Debug, Clone)]
pub struct Session {
    key: Option<String>,
    is_new: bool,
    pub payload: SessionPayload,
    pub options: CookieOptions,
}

impl Session {
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// Logout signal: the next save destroys the row and expires the cookie.
    pub fn mark_for_removal(&mut self) {
        self.options.max_age_secs = -1;
    }
}

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error(transparent)]
    Storage(#[from] SessionRepoError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Payload(#[from] IdentityError),
    #[error(transparent)]
    Deadline(#[from] DeadlineElapsed),
}

/// `Set-Cookie` produced by a save; usable as a response part or appended later.
#[derive(Debug, Clone)]
pub struct SetCookie(Cookie<'static>);

impl SetCookie {
    pub fn cookie(&self) -> &Cookie<'static> {
        &self.0
    }

    pub fn header_value(&self) -> Option<HeaderValue> {
        HeaderValue::from_str(&self.0.to_string()).ok()
    }

    pub fn append_to(&self, headers: &mut HeaderMap) {
        if let Some(value) = self.header_value() {
            headers.append(header::SET_COOKIE, value);
        }
    }
}

impl IntoResponseParts for SetCookie {
    type Error = StatusCode;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        let value = self.header_value().ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;
        res.headers_mut().append(header::SET_COOKIE, value);
        Ok(res)
    }
}

pub struct SessionStore {
    repo: Arc<dyn SessionRepository>,
    codec: Arc<SecureCookieCodec>,
    defaults: CookieOptions,
}

impl SessionStore {
    pub fn new(repo: Arc<dyn SessionRepository>, codec: Arc<SecureCookieCodec>, defaults: CookieOptions) -> Self {
        Self { repo, codec, defaults }
    }

    pub fn new_session(&self) -> Session {
        Session {
            key: None,
            is_new: true,
            payload: SessionPayload::default(),
            options: self.defaults.clone(),
        }
    }

    /// Resolve the request's session. Never fails: anything unusable yields a
    /// fresh anonymous session.
    pub async fn get(&self, headers: &HeaderMap, deadline: Deadline) -> Session {
        let Some(token) = session_cookie(headers) else {
            return self.new_session();
        };

        let key: String = match self.codec.decode(SESSION_COOKIE, &token) {
            Ok(key) => key,
            Err(err) => {
                debug!(error = %err, "session cookie rejected");
                return self.new_session();
            }
        };

        let record = match deadline.run(self.repo.load(&key)).await {
            Ok(Ok(record)) => record,
            Ok(Err(SessionRepoError::NotFound)) => {
                debug!("session not found or expired");
                return self.new_session();
            }
            Ok(Err(err)) => {
                error!(error = %err, "session storage unavailable");
                return self.new_session();
            }
            Err(elapsed) => {
                error!(error = %elapsed, "session load timed out");
                return self.new_session();
            }
        };

        match SessionPayload::from_bytes(&record.payload) {
            Ok(payload) => Session {
                key: Some(key),
                is_new: false,
                payload,
                options: self.defaults.clone(),
            },
            Err(err) => {
                debug!(error = %err, "session payload unreadable");
                self.new_session()
            }
        }
    }

    /// Persist the session and produce its cookie.
    ///
    /// A negative max-age destroys the row instead and returns an expired cookie.
    pub async fn save(&self, session: &mut Session, deadline: Deadline) -> Result<SetCookie, SessionStoreError> {
        if session.options.max_age_secs < 0 {
            if let Some(key) = &session.key {
                deadline.run(self.repo.destroy(key)).await??;
            }
            session.key = None;
            session.payload.clear();
            return Ok(self.expired_cookie());
        }

        let key = match &session.key {
            Some(key) => key.clone(),
            None => {
                let key = URL_SAFE_NO_PAD.encode(generate_random_key(SESSION_KEY_BYTES));
                session.key = Some(key.clone());
                key
            }
        };

        let record = SaveSession {
            key: key.clone(),
            payload: session.payload.to_bytes()?,
            expires_at: Utc::now() + chrono::Duration::seconds(session.options.max_age_secs),
            is_new: session.is_new,
        };
        deadline.run(self.repo.save(record)).await??;
        session.is_new = false;

        let value = self.codec.encode(SESSION_COOKIE, &key)?;
        Ok(SetCookie(build_cookie(value, &session.options)))
    }

    /// Delete a session row by key (rotation on login).
    pub async fn destroy(&self, key: &str, deadline: Deadline) -> Result<(), SessionStoreError> {
        deadline.run(self.repo.destroy(key)).await??;
        Ok(())
    }

    /// Whether the request presented a session cookie at all, valid or not.
    pub fn has_cookie(&self, headers: &HeaderMap) -> bool {
        session_cookie(headers).is_some()
    }

    pub fn expired_cookie(&self) -> SetCookie {
        let mut cookie = build_cookie(String::new(), &self.defaults);
        cookie.make_removal();
        SetCookie(cookie)
    }
}

fn build_cookie(value: String, options: &CookieOptions) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, value))
        .path(options.path.clone())
        .http_only(options.http_only)
        .secure(options.secure)
        .same_site(options.same_site)
        .max_age(cookie::time::Duration::seconds(options.max_age_secs))
        .build()
}

fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
}
