//! Session Module
//!
//! Sessions and the signed session cookie.
//!
//! # Flow
//!
//! 1. The session stage verifies the `session_id` cookie or issues a new id
//! 2. The session is loaded from the configured [`SessionStore`]
//! 3. The auth stage hands the session to the auth hook, which may set a user
//! 4. Routes with `require_auth` answer 401 when the session has no user
//!
//! Session ids are signed as HS256 tokens that expire after 30 days.

/// Session handle, stores and cookie signing
pub mod sessions;

pub use sessions::{
    sign_session_id, verify_session_token, MemorySessionStore, Session, SessionStore,
    SESSION_COOKIE_NAME,
};
