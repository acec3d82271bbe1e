//! Console configuration parsed from environment variables.
//!
//! Every microservice the console talks to has its own base URL. Endpoint
//! paths are fixed and joined onto those bases with [`api_url`].

use std::collections::BTreeMap;
use std::fmt;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_OTP_RESEND_SECS: u32 = 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid URL in {var}: {value}")]
    InvalidUrl { var: String, value: String },
    #[error("invalid value in {var}: {value}")]
    InvalidNumber { var: String, value: String },
}

// =============================================================================
// MICROSERVICES
// =============================================================================

/// Backend services reachable from the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Microservice {
    Admin,
    Auth,
    Core,
    Doc,
    Payment,
    Management,
    S3,
    Kyc,
    Seller,
    User,
}

impl Microservice {
    pub const ALL: [Self; 10] = [
        Self::Admin,
        Self::Auth,
        Self::Core,
        Self::Doc,
        Self::Payment,
        Self::Management,
        Self::S3,
        Self::Kyc,
        Self::Seller,
        Self::User,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Auth => "auth",
            Self::Core => "core",
            Self::Doc => "doc",
            Self::Payment => "payment",
            Self::Management => "management",
            Self::S3 => "s3",
            Self::Kyc => "kyc",
            Self::Seller => "seller",
            Self::User => "user",
        }
    }

    /// Environment variable overriding this service's base URL, e.g. `ADMIN_AUTH_URL`.
    #[must_use]
    pub fn env_key(self) -> String {
        format!("ADMIN_{}_URL", self.as_str().to_ascii_uppercase())
    }

    #[must_use]
    pub fn default_url(self) -> &'static str {
        match self {
            Self::Admin => "http://localhost:8081",
            Self::Auth => "http://localhost:8082",
            Self::Core => "http://localhost:8083",
            Self::Doc => "http://localhost:8084",
            Self::Payment => "http://localhost:8085",
            Self::Management => "http://localhost:8086",
            Self::S3 => "http://localhost:8087",
            Self::Kyc => "http://localhost:8088",
            Self::Seller => "http://localhost:8089",
            Self::User => "http://localhost:8091",
        }
    }
}

impl fmt::Display for Microservice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Microservice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|svc| svc.as_str() == lowered)
            .ok_or_else(|| format!("unknown microservice: {s}"))
    }
}

// =============================================================================
// ENDPOINTS
// =============================================================================

/// Fixed endpoints the session layer calls directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    SendOtp,
    SignIn,
    RefreshToken,
    NavbarList,
}

impl Endpoint {
    #[must_use]
    pub fn service(self) -> Microservice {
        match self {
            Self::SendOtp | Self::SignIn | Self::RefreshToken => Microservice::Auth,
            Self::NavbarList => Microservice::Core,
        }
    }

    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::SendOtp => "/sent/otp",
            Self::SignIn => "/signIn",
            Self::RefreshToken => "/refresh/token",
            Self::NavbarList => "/navbar/getNavbarListToDisplay",
        }
    }
}

/// Join a base URL and an endpoint path with exactly one slash between them.
#[must_use]
pub fn api_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

// =============================================================================
// APP CONFIG
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    services: BTreeMap<Microservice, String>,
    pub timeouts: HttpTimeouts,
    pub otp_resend_secs: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        let services = Microservice::ALL
            .into_iter()
            .map(|svc| (svc, svc.default_url().to_owned()))
            .collect();
        Self {
            services,
            timeouts: HttpTimeouts {
                request_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
                connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            },
            otp_resend_secs: DEFAULT_OTP_RESEND_SECS,
        }
    }
}

impl AppConfig {
    /// Build typed config from process environment variables.
    ///
    /// Optional:
    /// - `ADMIN_<SERVICE>_URL` for each [`Microservice`] (e.g. `ADMIN_AUTH_URL`)
    /// - `ADMIN_REQUEST_TIMEOUT_SECS`: default 30
    /// - `ADMIN_CONNECT_TIMEOUT_SECS`: default 10
    /// - `ADMIN_OTP_RESEND_SECS`: default 60
    ///
    /// # Errors
    ///
    /// Returns an error if a URL is not absolute http(s) or a number does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`AppConfig::from_env`] but reads variables through `lookup`.
    ///
    /// # Errors
    ///
    /// See [`AppConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        for svc in Microservice::ALL {
            let var = svc.env_key();
            if let Some(raw) = lookup(&var) {
                let url = parse_base_url(&var, &raw)?;
                config.services.insert(svc, url);
            }
        }

        config.timeouts.request_secs =
            parse_number(&lookup, "ADMIN_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?;
        config.timeouts.connect_secs =
            parse_number(&lookup, "ADMIN_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)?;
        config.otp_resend_secs = parse_number(&lookup, "ADMIN_OTP_RESEND_SECS", DEFAULT_OTP_RESEND_SECS)?;

        Ok(config)
    }

    /// Override one service's base URL.
    #[must_use]
    pub fn with_service_url(mut self, service: Microservice, url: impl Into<String>) -> Self {
        self.services.insert(service, url.into().trim_end_matches('/').to_owned());
        self
    }

    #[must_use]
    pub fn service_url(&self, service: Microservice) -> &str {
        self.services
            .get(&service)
            .map_or_else(|| service.default_url(), String::as_str)
    }

    /// Absolute URL of `path` on `service`.
    #[must_use]
    pub fn url(&self, service: Microservice, path: &str) -> String {
        api_url(self.service_url(service), path)
    }

    #[must_use]
    pub fn endpoint_url(&self, endpoint: Endpoint) -> String {
        self.url(endpoint.service(), endpoint.path())
    }
}

fn parse_base_url(var: &str, raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim();
    let invalid = || ConfigError::InvalidUrl { var: var.to_owned(), value: raw.to_owned() };
    let parsed = reqwest::Url::parse(trimmed).map_err(|_| invalid())?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid());
    }
    Ok(trimmed.trim_end_matches('/').to_owned())
}

fn parse_number<F, T>(lookup: &F, var: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { var: var.to_owned(), value: raw }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
