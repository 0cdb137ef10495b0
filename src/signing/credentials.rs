//! Temporary AWS credentials supplied by an external session provider.

use crate::error::{Result, VoxlateError};
use std::fmt;

/// Environment variables holding the session credentials.
pub const ACCESS_KEY_ENV: &str = "AWS_ACCESS_KEY_ID";
pub const SECRET_KEY_ENV: &str = "AWS_SECRET_ACCESS_KEY";
pub const SESSION_TOKEN_ENV: &str = "AWS_SESSION_TOKEN";

/// Access key, secret key and session token, treated as opaque strings.
///
/// `Debug` never prints the secret or the token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
}

impl Credentials {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: impl Into<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: session_token.into(),
        }
    }

    /// Reads credentials from the standard AWS environment variables.
    ///
    /// Missing variables become empty fields; `validate` rejects them.
    pub fn from_env() -> Self {
        let read = |name| std::env::var(name).unwrap_or_default();
        Self::new(
            read(ACCESS_KEY_ENV),
            read(SECRET_KEY_ENV),
            read(SESSION_TOKEN_ENV),
        )
    }

    /// Fails with `SigningPrecondition` naming the first empty field.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("access_key_id", &self.access_key_id),
            ("secret_access_key", &self.secret_access_key),
            ("session_token", &self.session_token),
        ];
        for (field, value) in fields {
            if value.trim().is_empty() {
                return Err(VoxlateError::SigningPrecondition { field });
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &"<redacted>")
            .finish()
    }
}
