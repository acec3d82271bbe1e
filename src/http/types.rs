//! Wire types for the auth service.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct OtpRequest<'a> {
    pub email: &'a str,
}

/// Reply to `POST {AUTH}/sent/otp`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OtpResponse {
    pub status: bool,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignInRequest<'a> {
    pub email: &'a str,
    pub otp: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshRequest<'a> {
    #[serde(rename = "refreshToken")]
    pub refresh_token: &'a str,
}

/// Reply to `POST {AUTH}/signIn` and `POST {AUTH}/refresh/token`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInResponse {
    pub status: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub jwt: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub two_step_verified: bool,
    #[serde(default)]
    pub two_step_verification_enabled: bool,
}

impl SignInResponse {
    /// The issued access token, when the call succeeded and carried one.
    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.jwt
            .as_deref()
            .filter(|jwt| self.status && !jwt.is_empty())
    }
}
