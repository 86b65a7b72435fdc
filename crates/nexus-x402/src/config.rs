//! Gateway and tracker configuration, with defaults and environment overrides.

use std::env;
use std::time::Duration;

use url::Url;

use crate::constants::{
    DEFAULT_HTTP_TIMEOUT, DEFAULT_NOT_FOUND_BUDGET, DEFAULT_PAYMENT_ENDPOINT,
    DEFAULT_POLL_INTERVAL, DEFAULT_POLL_TIMEOUT, DEFAULT_SIGNER_TIMEOUT,
    DEFAULT_TARGET_CONFIRMATIONS, DEFAULT_TRACKING_TIMEOUT, DESCRIPTOR_HEADER, PROOF_HEADER,
};
use crate::X402Error;

/// Settings for [`crate::PaymentGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Base URL that relative request URLs are joined onto (env: X402_API_URL).
    pub base_url: Option<String>,
    /// Per-request HTTP timeout (env: X402_TIMEOUT_MS, default: 30000).
    pub timeout: Duration,
    /// Extra headers sent on every request.
    pub headers: Vec<(String, String)>,
    /// Transfer status endpoint path (env: X402_PAYMENT_ENDPOINT, default: /payments).
    pub payment_endpoint: String,
    /// 402 response header holding the descriptor (env: X402_DESCRIPTOR_HEADER).
    pub descriptor_header: String,
    /// Retry request header holding the transfer id (env: X402_PROOF_HEADER).
    pub proof_header: String,
    /// Upper bound on one `Signer::transfer` call (env: X402_SIGNER_TIMEOUT_SECS, default: 30).
    pub signer_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: DEFAULT_HTTP_TIMEOUT,
            headers: Vec::new(),
            payment_endpoint: DEFAULT_PAYMENT_ENDPOINT.to_string(),
            descriptor_header: DESCRIPTOR_HEADER.to_string(),
            proof_header: PROOF_HEADER.to_string(),
            signer_timeout: DEFAULT_SIGNER_TIMEOUT,
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let base_url = lookup("X402_API_URL");
        if let Some(ref url) = base_url {
            Url::parse(url).map_err(|_| ConfigError::InvalidUrl(url.clone()))?;
        }

        let timeout = match lookup("X402_TIMEOUT_MS") {
            Some(v) => Duration::from_millis(parse_positive("X402_TIMEOUT_MS", &v)?),
            None => defaults.timeout,
        };

        let signer_timeout = match lookup("X402_SIGNER_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(parse_positive("X402_SIGNER_TIMEOUT_SECS", &v)?),
            None => defaults.signer_timeout,
        };

        Ok(Self {
            base_url,
            timeout,
            headers: defaults.headers,
            payment_endpoint: lookup("X402_PAYMENT_ENDPOINT").unwrap_or(defaults.payment_endpoint),
            descriptor_header: lookup("X402_DESCRIPTOR_HEADER")
                .unwrap_or(defaults.descriptor_header),
            proof_header: lookup("X402_PROOF_HEADER").unwrap_or(defaults.proof_header),
            signer_timeout,
        })
    }
}

/// Settings for [`crate::PaymentTracker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Delay between polls (env: X402_POLL_INTERVAL_SECS, default: 15).
    pub poll_interval: Duration,
    /// Upper bound on one provider call (env: X402_POLL_TIMEOUT_SECS, default: 30).
    pub poll_timeout: Duration,
    /// Upper bound on the whole tracking run (env: X402_TRACKING_TIMEOUT_SECS, default: 300).
    pub tracking_timeout: Duration,
    /// Depth at which tracking stops (env: X402_TARGET_CONFIRMATIONS, default: 3).
    pub target_confirmations: u64,
    /// Polls for which an unknown transfer is tolerated (env: X402_NOT_FOUND_BUDGET, default: 20).
    pub not_found_budget: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            tracking_timeout: DEFAULT_TRACKING_TIMEOUT,
            target_confirmations: DEFAULT_TARGET_CONFIRMATIONS,
            not_found_budget: DEFAULT_NOT_FOUND_BUDGET,
        }
    }
}

impl TrackerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let secs = |key: &'static str, default: Duration| -> Result<Duration, ConfigError> {
            match lookup(key) {
                Some(v) => Ok(Duration::from_secs(parse_positive(key, &v)?)),
                None => Ok(default),
            }
        };

        let target_confirmations = match lookup("X402_TARGET_CONFIRMATIONS") {
            Some(v) => parse_positive("X402_TARGET_CONFIRMATIONS", &v)?,
            None => defaults.target_confirmations,
        };

        let not_found_budget = match lookup("X402_NOT_FOUND_BUDGET") {
            Some(v) => u32::try_from(parse_positive("X402_NOT_FOUND_BUDGET", &v)?).map_err(
                |_| ConfigError::InvalidNumber {
                    var: "X402_NOT_FOUND_BUDGET",
                    value: v.clone(),
                },
            )?,
            None => defaults.not_found_budget,
        };

        Ok(Self {
            poll_interval: secs("X402_POLL_INTERVAL_SECS", defaults.poll_interval)?,
            poll_timeout: secs("X402_POLL_TIMEOUT_SECS", defaults.poll_timeout)?,
            tracking_timeout: secs("X402_TRACKING_TIMEOUT_SECS", defaults.tracking_timeout)?,
            target_confirmations,
            not_found_budget,
        })
    }
}

fn parse_positive(var: &'static str, value: &str) -> Result<u64, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidNumber {
            var,
            value: value.to_string(),
        }),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingRequired(&'static str),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("invalid value for {var}: {value:?} (expected a positive integer)")]
    InvalidNumber { var: &'static str, value: String },

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("invalid address for {var}: {value:?}")]
    InvalidAddress { var: &'static str, value: String },
}

impl From<ConfigError> for X402Error {
    fn from(e: ConfigError) -> Self {
        X402Error::ConfigError(e.to_string())
    }
}
