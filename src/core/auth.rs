// src/core/auth.rs

use reqwest::header::{HeaderMap, HeaderValue};

use crate::config::ConfigError;

/// The header every Cymulate endpoint authenticates with.
pub const TOKEN_HEADER: &str = "x-token";

/// Holds the API token and turns it into request headers.
///
/// The token is not checked locally: a revoked or mistyped token shows up as
/// an HTTP error on the first request.
#[derive(Clone)]
pub struct Authenticator {
    token: HeaderValue,
}

impl Authenticator {
    /// # Errors
    /// `ConfigError::MissingToken` if the token is blank, and
    /// `ConfigError::InvalidToken` if it cannot be sent as an HTTP header
    /// value (control characters, newlines).
    pub fn new(token: &str) -> Result<Self, ConfigError> {
        if token.trim().is_empty() {
            return Err(ConfigError::MissingToken);
        }
        let mut token = HeaderValue::from_str(token).map_err(|_| ConfigError::InvalidToken)?;
        token.set_sensitive(true);
        Ok(Self { token })
    }

    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(TOKEN_HEADER, self.token.clone());
        headers
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator").field("token", &"<redacted>").finish()
    }
}
