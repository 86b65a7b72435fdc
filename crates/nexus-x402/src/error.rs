use std::fmt;

use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::payment::TransferReceipt;

/// A 402 response that the gateway could not satisfy.
#[derive(Debug)]
pub struct UnpaidResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Set when a transfer was already submitted and the paid retry was refused too.
    pub receipt: Option<TransferReceipt>,
}

impl fmt::Display for UnpaidResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.receipt {
            Some(r) => write!(f, "{} after transfer {}", self.status, r.transfer_id),
            None => write!(f, "{}", self.status),
        }
    }
}

/// Errors returned by x402 operations.
#[derive(Debug, Error)]
pub enum X402Error {
    #[error("malformed payment descriptor: {0}")]
    MalformedPaymentDescriptor(String),

    #[error("payment required: {0}")]
    PaymentRequired(Box<UnpaidResponse>),

    #[error("signer unavailable: {0}")]
    SignerUnavailable(String),

    #[error("transfer rejected: {0}")]
    TransferRejected(String),

    #[error("transfer not found: {0}")]
    TransferNotFound(String),

    #[error("tracking timed out: {0}")]
    TrackingTimeout(String),

    #[error("chain provider unreachable: {0}")]
    ProviderUnreachable(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("config error: {0}")]
    ConfigError(String),

    #[error("http error: {0}")]
    HttpError(String),

    /// The transfer went out but the paid retry never got an answer.
    #[error("paid request failed after transfer {}: {source}", receipt.transfer_id)]
    PaidRequestFailed {
        receipt: TransferReceipt,
        source: Box<X402Error>,
    },

    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

/// Error category reported to [`crate::PaymentObserver::on_error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MalformedPaymentDescriptor,
    PaymentRequired,
    SignerUnavailable,
    TransferRejected,
    TransferNotFound,
    TrackingTimeout,
    ProviderUnreachable,
    InvalidAmount,
    Config,
    Http,
    PaidRequestFailed,
    Serialization,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MalformedPaymentDescriptor => "malformed_payment_descriptor",
            ErrorKind::PaymentRequired => "payment_required",
            ErrorKind::SignerUnavailable => "signer_unavailable",
            ErrorKind::TransferRejected => "transfer_rejected",
            ErrorKind::TransferNotFound => "transfer_not_found",
            ErrorKind::TrackingTimeout => "tracking_timeout",
            ErrorKind::ProviderUnreachable => "provider_unreachable",
            ErrorKind::InvalidAmount => "invalid_amount",
            ErrorKind::Config => "config",
            ErrorKind::Http => "http",
            ErrorKind::PaidRequestFailed => "paid_request_failed",
            ErrorKind::Serialization => "serialization",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl X402Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            X402Error::MalformedPaymentDescriptor(_) => ErrorKind::MalformedPaymentDescriptor,
            X402Error::PaymentRequired(_) => ErrorKind::PaymentRequired,
            X402Error::SignerUnavailable(_) => ErrorKind::SignerUnavailable,
            X402Error::TransferRejected(_) => ErrorKind::TransferRejected,
            X402Error::TransferNotFound(_) => ErrorKind::TransferNotFound,
            X402Error::TrackingTimeout(_) => ErrorKind::TrackingTimeout,
            X402Error::ProviderUnreachable(_) => ErrorKind::ProviderUnreachable,
            X402Error::InvalidAmount(_) => ErrorKind::InvalidAmount,
            X402Error::ConfigError(_) => ErrorKind::Config,
            X402Error::HttpError(_) => ErrorKind::Http,
            X402Error::PaidRequestFailed { .. } => ErrorKind::PaidRequestFailed,
            X402Error::SerdeError(_) => ErrorKind::Serialization,
        }
    }

    /// Whether the tracker should retry on the next scheduled poll.
    pub fn is_transient(&self) -> bool {
        matches!(self, X402Error::ProviderUnreachable(_))
    }

    /// Receipt of a transfer that was made before this error occurred.
    pub fn receipt(&self) -> Option<&TransferReceipt> {
        match self {
            X402Error::PaymentRequired(resp) => resp.receipt.as_ref(),
            X402Error::PaidRequestFailed { receipt, .. } => Some(receipt),
            _ => None,
        }
    }

    /// The unpaid 402 response, if this is a `PaymentRequired` error.
    pub fn unpaid_response(&self) -> Option<&UnpaidResponse> {
        match self {
            X402Error::PaymentRequired(resp) => Some(resp),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_provider_unreachable_is_transient() {
        assert!(X402Error::ProviderUnreachable("rpc down".into()).is_transient());
        assert!(!X402Error::TransferRejected("reverted".into()).is_transient());
        assert!(!X402Error::TrackingTimeout("5m".into()).is_transient());
        assert!(!X402Error::SignerUnavailable("locked".into()).is_transient());
    }

    #[test]
    fn test_kinds_stay_distinct() {
        let errors = [
            X402Error::MalformedPaymentDescriptor("x".into()),
            X402Error::SignerUnavailable("x".into()),
            X402Error::TransferRejected("x".into()),
            X402Error::TransferNotFound("x".into()),
            X402Error::TrackingTimeout("x".into()),
            X402Error::ProviderUnreachable("x".into()),
        ];
        let kinds: std::collections::HashSet<_> = errors.iter().map(X402Error::kind).collect();
        assert_eq!(kinds.len(), errors.len());
    }

    #[test]
    fn test_unpaid_response_display_mentions_transfer() {
        let resp = UnpaidResponse {
            status: StatusCode::PAYMENT_REQUIRED,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            receipt: Some(TransferReceipt::new("0xdeadbeef")),
        };
        let err = X402Error::PaymentRequired(Box::new(resp));
        assert_eq!(err.kind(), ErrorKind::PaymentRequired);
        assert!(err.to_string().contains("0xdeadbeef"));
        assert!(err.unpaid_response().is_some());
    }

    #[test]
    fn test_receipt_survives_failed_retry() {
        let err = X402Error::PaidRequestFailed {
            receipt: TransferReceipt::new("0xdeadbeef"),
            source: Box::new(X402Error::HttpError("connection reset".into())),
        };
        assert_eq!(err.kind(), ErrorKind::PaidRequestFailed);
        assert_eq!(err.receipt().map(|r| r.transfer_id.as_str()), Some("0xdeadbeef"));
        assert!(err.to_string().contains("connection reset"));
        assert!(X402Error::HttpError("x".into()).receipt().is_none());
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::TrackingTimeout).unwrap();
        assert_eq!(json, "\"tracking_timeout\"");
        assert_eq!(ErrorKind::TrackingTimeout.to_string(), "tracking_timeout");
    }
}
