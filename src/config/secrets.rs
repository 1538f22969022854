//! Secret handling utilities.
//!
//! Re-exports secrecy types and provides a helper for building HTTP
//! authorization headers without leaking the token into logs.

pub use secrecy::{ExposeSecret, SecretBox, SecretString};

/// Format a bearer `Authorization` header value for the given token.
///
/// The result is a plain `String` and must not be logged.
pub fn bearer(token: &SecretString) -> String {
    format!("Bearer {}", token.expose_secret())
}
