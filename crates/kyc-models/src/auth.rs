//! Login and token refresh payloads.

use serde::{Deserialize, Serialize};

/// Body of `POST /api/v1/auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Validate the request.
    pub fn validate(&self) -> Result<(), String> {
        if self.email.trim().is_empty() {
            return Err("Email is required".to_string());
        }

        if self.password.is_empty() {
            return Err("Password is required".to_string());
        }

        Ok(())
    }
}

/// Success body of the login and refresh endpoints.
///
/// The field is optional so that a malformed body deserializes and can be
/// rejected with a useful message instead of a serde error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessTokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
}

impl AccessTokenResponse {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            access_token: Some(token.into()),
        }
    }

    /// The access token, if present and non-empty.
    pub fn token(&self) -> Option<&str> {
        self.access_token
            .as_deref()
            .filter(|token| !token.trim().is_empty())
    }

    /// Consume the response, keeping only a usable token.
    pub fn into_token(self) -> Option<String> {
        self.access_token.filter(|token| !token.trim().is_empty())
    }
}
