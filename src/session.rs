//! In-memory session store.
//!
//! Tokens live only for the lifetime of the process — a restart discards them
//! and the operator logs in again. Each browser session gets its own
//! [`AuthSession`] keyed by a signed cookie, so one process can hold tokens
//! for more than one authenticated user without them clobbering each other.

use std::collections::HashMap;
use std::sync::RwLock;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngExt;
use sha2::{Digest, Sha256};

use crate::oauth::TokenSet;

/// The authenticated channel, cached after the OAuth callback.
#[derive(Debug, Clone)]
pub struct ChannelInfo {
    pub id: String,
    pub title: String,
    pub subscriber_count: u64,
}

/// Everything held for one authenticated browser session.
#[derive(Debug, Clone, Default)]
pub struct AuthSession {
    pub tokens: Option<TokenSet>,
    pub channel: Option<ChannelInfo>,
    pub live_chat_id: Option<String>,
    /// CSRF state for an in-flight OAuth redirect, consumed by the callback.
    pub oauth_state: Option<String>,
}

impl AuthSession {
    pub fn access_token(&self) -> Option<&str> {
        self.tokens.as_ref().map(|t| t.access_token.as_str())
    }
}

pub struct SessionStore {
    secret: String,
    inner: RwLock<HashMap<String, AuthSession>>,
}

impl SessionStore {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: secret.to_string(),
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Create an empty session and return its id.
    pub fn create(&self) -> String {
        let sid = random_token();
        self.inner
            .write()
            .expect("session store poisoned")
            .insert(sid.clone(), AuthSession::default());
        sid
    }

    pub fn get(&self, sid: &str) -> Option<AuthSession> {
        self.inner
            .read()
            .expect("session store poisoned")
            .get(sid)
            .cloned()
    }

    /// Mutate a session in place. Returns false if the id is unknown.
    pub fn update(&self, sid: &str, f: impl FnOnce(&mut AuthSession)) -> bool {
        let mut guard = self.inner.write().expect("session store poisoned");
        match guard.get_mut(sid) {
            Some(session) => {
                f(session);
                true
            }
            None => false,
        }
    }

    /// Cookie value for a session id: `sid.signature`.
    pub fn cookie_value(&self, sid: &str) -> String {
        format!("{}.{}", sid, self.sign(sid))
    }

    /// Extract and verify a session id from a cookie value.
    pub fn verify_cookie(&self, value: &str) -> Option<String> {
        let (sid, sig) = value.split_once('.')?;
        if self.sign(sid) != sig {
            return None;
        }
        Some(sid.to_string())
    }

    fn sign(&self, sid: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(sid.as_bytes());
        URL_SAFE_NO_PAD.encode(hasher.finalize())
    }
}

/// Random URL-safe token, used for session ids and OAuth CSRF state.
pub fn random_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SessionStore {
        SessionStore::new("test-secret")
    }

    #[test]
    fn test_create_and_get() {
        let store = store();
        let sid = store.create();
        let session = store.get(&sid).unwrap();
        assert!(session.tokens.is_none());
        assert!(session.channel.is_none());
    }

    #[test]
    fn test_update_mutates() {
        let store = store();
        let sid = store.create();
        assert!(store.update(&sid, |s| {
            s.live_chat_id = Some("chat123".to_string());
        }));
        assert_eq!(store.get(&sid).unwrap().live_chat_id.as_deref(), Some("chat123"));
    }

    #[test]
    fn test_update_unknown_sid() {
        assert!(!store().update("nope", |_| {}));
    }

    #[test]
    fn test_cookie_roundtrip() {
        let store = store();
        let sid = store.create();
        let cookie = store.cookie_value(&sid);
        assert_eq!(store.verify_cookie(&cookie).unwrap(), sid);
    }

    #[test]
    fn test_tampered_cookie_rejected() {
        let store = store();
        let sid = store.create();
        let cookie = store.cookie_value(&sid);
        let tampered = cookie.replace(&sid, "other-sid");
        assert!(store.verify_cookie(&tampered).is_none());
        assert!(store.verify_cookie("garbage").is_none());
        assert!(store.verify_cookie("").is_none());
    }

    #[test]
    fn test_signature_depends_on_secret() {
        let a = SessionStore::new("secret-a");
        let b = SessionStore::new("secret-b");
        let sid = a.create();
        let cookie = a.cookie_value(&sid);
        assert!(b.verify_cookie(&cookie).is_none());
    }

    #[test]
    fn test_random_tokens_distinct() {
        assert_ne!(random_token(), random_token());
    }

    #[test]
    fn test_sessions_independent() {
        let store = store();
        let a = store.create();
        let b = store.create();
        store.update(&a, |s| s.live_chat_id = Some("chat-a".to_string()));
        assert!(store.get(&b).unwrap().live_chat_id.is_none());
    }
}
