use crate::domain::age_gate::AgePolicy;
use crate::error::{EnrollError, Result};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";

/// Scheme placed in front of the token in the `Authorization` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthScheme {
    #[default]
    Bearer,
    /// Django REST framework's `Token <key>`.
    Token,
}

impl AuthScheme {
    pub fn header_value(&self, token: &str) -> String {
        match self {
            AuthScheme::Bearer => format!("Bearer {token}"),
            AuthScheme::Token => format!("Token {token}"),
        }
    }
}

impl FromStr for AuthScheme {
    type Err = EnrollError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bearer" => Ok(AuthScheme::Bearer),
            "token" => Ok(AuthScheme::Token),
            other => Err(EnrollError::Validation(format!("unknown auth scheme: {other}"))),
        }
    }
}

impl fmt::Display for AuthScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthScheme::Bearer => f.write_str("bearer"),
            AuthScheme::Token => f.write_str("token"),
        }
    }
}

/// How card details are turned into a payment payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TokenizerConfig {
    /// Raw card data goes to the backend, which tokenizes it.
    #[default]
    ServerSide,
    /// Cards are tokenized against the gateway before the payment request.
    Gateway { url: String, public_key: String },
}

/// Settings for the REST client and the flows built on it.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub api_url: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub auth_scheme: AuthScheme,
    pub age_policy: AgePolicy,
    pub session_file: Option<PathBuf>,
    pub tokenizer: TokenizerConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            poll_interval: Duration::from_secs(3),
            request_timeout: Duration::from_secs(30),
            auth_scheme: AuthScheme::default(),
            age_policy: AgePolicy::default(),
            session_file: None,
            tokenizer: TokenizerConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(EnrollError::Validation(format!(
                "api url must start with http:// or https://: {}",
                self.api_url
            )));
        }
        if self.poll_interval.is_zero() {
            return Err(EnrollError::Validation(
                "poll interval must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
