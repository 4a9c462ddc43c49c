/**
 * Sessions and Signed Session Cookies
 *
 * The session id travels in the `session_id` cookie as an HS256 token signed
 * with the configured cookie secret. Sessions themselves live in a
 * `SessionStore`; the in-memory store is the default.
 *
 * A session is only saved once something was written to it, so requests
 * that never touch their session leave nothing behind in the store.
 */
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Name of the session cookie
pub const SESSION_COOKIE_NAME: &str = "session_id";

/// Lifetime of a signed session id (30 days)
pub const SESSION_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// Token claims of the session cookie
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Session ID
    pub sub: String,
    /// Issued at time (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Shared handle to a session
///
/// Clones point at the same session, so a user set by the auth hook is
/// visible to the route handling the request.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    id: String,
    user: RwLock<Option<Value>>,
    data: RwLock<Map<String, Value>>,
    modified: AtomicBool,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                id: id.into(),
                user: RwLock::new(None),
                data: RwLock::new(Map::new()),
                modified: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Authenticated user, `None` when nobody is signed in.
    pub fn user(&self) -> Option<Value> {
        self.inner.user.read().clone()
    }

    pub fn set_user(&self, user: Value) {
        *self.inner.user.write() = Some(user);
        self.touch();
    }

    pub fn clear_user(&self) {
        *self.inner.user.write() = None;
        self.touch();
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.data.read().get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.inner.data.write().insert(key.into(), value);
        self.touch();
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        let removed = self.inner.data.write().remove(key);
        self.touch();
        removed
    }

    /// True once the user or the data was written.
    pub fn is_modified(&self) -> bool {
        self.inner.modified.load(Ordering::Acquire)
    }

    fn touch(&self) {
        self.inner.modified.store(true, Ordering::Release);
    }
}

/// Storage of sessions keyed by id
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns the stored session `id`, if any.
    async fn load(&self, id: &str) -> Option<Session>;

    /// Stores `session` under its id.
    async fn save(&self, session: &Session);

    async fn destroy(&self, id: &str);
}

#[derive(Debug)]
struct StoredSession {
    session: Session,
    last_access: Instant,
}

/// Process-local session store
///
/// Sessions idle for longer than the TTL are dropped; expired entries are
/// pruned while loading.
#[derive(Debug)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, StoredSession>>,
    ttl: Duration,
    next_prune: RwLock<Instant>,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::with_ttl(Duration::from_secs(SESSION_TTL_SECS))
    }
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
            next_prune: RwLock::new(Instant::now()),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    fn prune(&self, now: Instant) {
        {
            let mut next_prune = self.next_prune.write();
            if now < *next_prune {
                return;
            }
            *next_prune = now + self.ttl.min(Duration::from_secs(60));
        }
        let ttl = self.ttl;
        self.sessions
            .write()
            .retain(|_, stored| now.duration_since(stored.last_access) < ttl);
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id: &str) -> Option<Session> {
        let now = Instant::now();
        self.prune(now);
        let mut sessions = self.sessions.write();
        let stored = sessions.get_mut(id)?;
        if now.duration_since(stored.last_access) >= self.ttl {
            sessions.remove(id);
            return None;
        }
        stored.last_access = now;
        Some(stored.session.clone())
    }

    async fn save(&self, session: &Session) {
        self.sessions.write().insert(
            session.id().to_string(),
            StoredSession {
                session: session.clone(),
                last_access: Instant::now(),
            },
        );
    }

    async fn destroy(&self, id: &str) {
        self.sessions.write().remove(id);
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Signs `session_id` into a cookie value.
pub fn sign_session_id(session_id: &str, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    let now = now_secs();
    let claims = Claims {
        sub: session_id.to_string(),
        iat: now,
        exp: now + SESSION_TTL_SECS,
    };
    let key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), &claims, &key)
}

/// Verifies a cookie value and returns the session id it carries.
pub fn verify_session_token(token: &str, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let token_data = decode::<Claims>(token, &key, &Validation::default())?;
    Ok(token_data.claims.sub)
}
