//! Cookie-bound sessions with a pluggable backing store.
//!
//! A single browser session may hold a student identity, an admin identity,
//! or both at once; the two roles log in and out independently. Pending
//! flash messages ride in the same record so they survive the redirect
//! after a form post.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Extension, FromRequest, RequestParts};
use axum::headers::Cookie;
use axum::http::header::SET_COOKIE;
use axum::http::HeaderValue;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::TypedHeader;
use chrono::{DateTime, Duration, Utc};
use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use crate::err::Error;
use crate::models::Identity;

pub const SESSION_COOKIE: &str = "sid";

const SESSION_TTL_DAYS: i64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlashKind {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlashMessage {
    pub kind: FlashKind,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionData {
    pub student: Option<Identity>,
    pub admin: Option<Identity>,
    pub flash: Vec<FlashMessage>,
}

pub type SessionHandle = Arc<dyn SessionStore>;

/// The seam for session persistence. Single-process deployments use the
/// in-memory store below; running several instances behind a balancer
/// requires an implementation backed by a shared external store.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, sid: &str) -> Option<SessionData>;
    async fn save(&self, sid: &str, data: SessionData);
    async fn destroy(&self, sid: &str);
}

struct StoredSession {
    data: SessionData,
    expires_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<String, StoredSession>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load(&self, sid: &str) -> Option<SessionData> {
        {
            let sessions = self.sessions.read().await;
            match sessions.get(sid) {
                Some(stored) if Utc::now().le(&stored.expires_at) => {
                    return Some(stored.data.clone())
                }
                Some(_) => {}
                None => return None,
            }
        }
        // expired
        self.sessions.write().await.remove(sid);
        None
    }

    async fn save(&self, sid: &str, data: SessionData) {
        let expires_at = Utc::now() + Duration::days(SESSION_TTL_DAYS);
        self.sessions
            .write()
            .await
            .insert(sid.to_owned(), StoredSession { data, expires_at });
    }

    async fn destroy(&self, sid: &str) {
        self.sessions.write().await.remove(sid);
    }
}

pub fn mint_sid() -> String {
    let bytes: [u8; 32] = thread_rng().gen();
    let mut hasher: Sha256 = Digest::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Per-request session context, handed to every handler as an extractor.
pub struct SessionContext {
    sid: String,
    data: SessionData,
    store: SessionHandle,
}

#[axum::async_trait]
impl<B: Send> FromRequest<B> for SessionContext {
    type Rejection = Error;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let Extension(store) = Extension::<SessionHandle>::from_request(req)
            .await
            .map_err(|err| Error::internal("SessionLayer", err.to_string()))?;

        let cookie = Option::<TypedHeader<Cookie>>::from_request(req)
            .await
            .ok()
            .flatten();
        if let Some(TypedHeader(cookie)) = &cookie {
            if let Some(sid) = cookie.get(SESSION_COOKIE) {
                if let Some(data) = store.load(sid).await {
                    return Ok(SessionContext {
                        sid: sid.to_owned(),
                        data,
                        store,
                    });
                }
            }
        }

        // Unknown, missing or expired sid: start a fresh anonymous record
        // immediately so pre-login flash messages have somewhere to live.
        let sid = mint_sid();
        let data = SessionData::default();
        store.save(&sid, data.clone()).await;
        Ok(SessionContext { sid, data, store })
    }
}

impl SessionContext {
    pub fn student(&self) -> Option<&Identity> {
        self.data.student.as_ref()
    }

    pub fn admin(&self) -> Option<&Identity> {
        self.data.admin.as_ref()
    }

    pub async fn login_student(&mut self, identity: Identity) {
        self.data.student = Some(identity);
        self.save().await;
    }

    pub async fn login_admin(&mut self, identity: Identity) {
        self.data.admin = Some(identity);
        self.save().await;
    }

    pub async fn logout_student(&mut self) {
        self.data.student = None;
        self.persist_or_drop().await;
    }

    pub async fn logout_admin(&mut self) {
        self.data.admin = None;
        self.persist_or_drop().await;
    }

    pub async fn flash_success<S: Into<String>>(&mut self, message: S) {
        self.push_flash(FlashKind::Success, message.into()).await;
    }

    pub async fn flash_error<S: Into<String>>(&mut self, message: S) {
        self.push_flash(FlashKind::Error, message.into()).await;
    }

    /// One-shot contract: a message renders once and is gone.
    pub async fn take_flash(&mut self) -> Vec<FlashMessage> {
        let flash = std::mem::take(&mut self.data.flash);
        if !flash.is_empty() {
            self.persist_or_drop().await;
        }
        flash
    }

    async fn push_flash(&mut self, kind: FlashKind, message: String) {
        self.data.flash.push(FlashMessage { kind, message });
        self.save().await;
    }

    async fn save(&self) {
        self.store.save(&self.sid, self.data.clone()).await;
    }

    // A record with no identity and no pending flash carries nothing worth
    // keeping; drop it and let the next request mint a fresh sid.
    async fn persist_or_drop(&self) {
        if self.data.student.is_none() && self.data.admin.is_none() && self.data.flash.is_empty() {
            self.store.destroy(&self.sid).await;
        } else {
            self.save().await;
        }
    }

    fn cookie_header(&self) -> Option<HeaderValue> {
        HeaderValue::from_str(&format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            SESSION_COOKIE, self.sid
        ))
        .ok()
    }

    fn with_cookie(&self, mut response: Response) -> Response {
        if let Some(value) = self.cookie_header() {
            response.headers_mut().insert(SET_COOKIE, value);
        }
        response
    }

    pub fn page(&self, html: String) -> Response {
        self.with_cookie(Html(html).into_response())
    }

    pub fn redirect(&self, to: &'static str) -> Response {
        self.with_cookie(Redirect::to(to).into_response())
    }

    pub fn file(&self, bytes: Vec<u8>) -> Response {
        self.with_cookie(bytes.into_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn identity(name: &str) -> Identity {
        Identity {
            id: Uuid::new_v4(),
            name: name.to_owned(),
            email: format!("{}@example.com", name.to_lowercase()),
        }
    }

    fn context(store: &Arc<MemoryStore>) -> SessionContext {
        let handle: SessionHandle = store.clone();
        SessionContext {
            sid: mint_sid(),
            data: SessionData::default(),
            store: handle,
        }
    }

    #[tokio::test]
    async fn load_returns_what_was_saved() {
        let store = MemoryStore::new();
        let mut data = SessionData::default();
        data.student = Some(identity("Asha"));
        store.save("sid-1", data).await;

        let loaded = store.load("sid-1").await.unwrap();
        assert_eq!(loaded.student.unwrap().name, "Asha");
        assert!(store.load("sid-2").await.is_none());
    }

    #[tokio::test]
    async fn destroy_removes_the_record() {
        let store = MemoryStore::new();
        store.save("sid-1", SessionData::default()).await;
        store.destroy("sid-1").await;
        assert!(store.load("sid-1").await.is_none());
    }

    #[tokio::test]
    async fn expired_records_are_dropped_on_load() {
        let store = MemoryStore::new();
        store.save("sid-1", SessionData::default()).await;
        store
            .sessions
            .write()
            .await
            .get_mut("sid-1")
            .unwrap()
            .expires_at = Utc::now() - Duration::days(1);

        assert!(store.load("sid-1").await.is_none());
        assert!(store.sessions.read().await.is_empty());
    }

    #[tokio::test]
    async fn flash_is_delivered_exactly_once() {
        let store = Arc::new(MemoryStore::new());
        let mut ctx = context(&store);

        ctx.flash_success("Details saved.").await;
        let flash = ctx.take_flash().await;
        assert_eq!(flash.len(), 1);
        assert_eq!(flash[0].kind, FlashKind::Success);
        assert_eq!(flash[0].message, "Details saved.");

        assert!(ctx.take_flash().await.is_empty());
    }

    #[tokio::test]
    async fn student_and_admin_slots_are_independent() {
        let store = Arc::new(MemoryStore::new());
        let mut ctx = context(&store);

        ctx.login_student(identity("Asha")).await;
        ctx.login_admin(identity("Rao")).await;
        ctx.logout_student().await;

        assert!(ctx.student().is_none());
        assert_eq!(ctx.admin().unwrap().name, "Rao");

        // the persisted record agrees
        let stored = store.load(&ctx.sid).await.unwrap();
        assert!(stored.student.is_none());
        assert_eq!(stored.admin.unwrap().name, "Rao");
    }

    #[tokio::test]
    async fn logging_out_the_last_identity_destroys_the_record() {
        let store = Arc::new(MemoryStore::new());
        let mut ctx = context(&store);

        ctx.login_student(identity("Asha")).await;
        ctx.logout_student().await;

        assert!(store.load(&ctx.sid).await.is_none());
    }

    #[test]
    fn minted_sids_are_opaque_hex() {
        let sid = mint_sid();
        assert_eq!(sid.len(), 64);
        assert!(sid.chars().all(|ch| ch.is_ascii_hexdigit()));
        assert_ne!(sid, mint_sid());
    }
}
