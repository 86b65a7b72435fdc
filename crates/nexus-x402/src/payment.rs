use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::constants::{USDC_DECIMALS, USDC_SYMBOL};
use crate::X402Error;

/// What a server demands before it will serve a request.
///
/// Sent by the server in the descriptor header of a 402 response as JSON
/// (or base64-encoded JSON). `amount` is an integer string in the currency's
/// minor units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDescriptor {
    pub amount: String,
    pub currency: String,
    pub recipient: String,
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Map::is_empty"
    )]
    pub metadata: Map<String, Value>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

impl PaymentDescriptor {
    pub fn new(
        amount: impl Into<String>,
        currency: impl Into<String>,
        recipient: impl Into<String>,
    ) -> Self {
        Self {
            amount: amount.into(),
            currency: currency.into(),
            recipient: recipient.into(),
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Build a USDC descriptor from a human-readable amount such as `"10.5"`.
    pub fn usdc(
        recipient: impl Into<String>,
        amount: &str,
        metadata: Map<String, Value>,
    ) -> Result<Self, X402Error> {
        let minor = parse_minor_units(amount, USDC_DECIMALS)?;
        Ok(Self::new(minor, USDC_SYMBOL, recipient).with_metadata(metadata))
    }

    /// Parse the value of a descriptor header.
    ///
    /// Accepts plain JSON first, then falls back to base64-encoded JSON.
    pub fn from_header(raw: &str) -> Result<Self, X402Error> {
        let raw = raw.trim();
        let descriptor: Self = serde_json::from_str(raw).or_else(|json_err| {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(raw)
                .map_err(|_| {
                    X402Error::MalformedPaymentDescriptor(format!("not valid JSON: {json_err}"))
                })?;
            serde_json::from_slice(&bytes).map_err(|e| {
                X402Error::MalformedPaymentDescriptor(format!("invalid JSON after base64: {e}"))
            })
        })?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Check the structural rules a parsed descriptor must satisfy.
    pub fn validate(&self) -> Result<(), X402Error> {
        if self.amount.is_empty() || !self.amount.bytes().all(|b| b.is_ascii_digit()) {
            return Err(X402Error::MalformedPaymentDescriptor(format!(
                "amount must be an integer in minor units, got {:?}",
                self.amount
            )));
        }
        if self.currency.trim().is_empty() {
            return Err(X402Error::MalformedPaymentDescriptor(
                "currency is empty".to_string(),
            ));
        }
        if self.recipient.trim().is_empty() {
            return Err(X402Error::MalformedPaymentDescriptor(
                "recipient is empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Serialize for use as a descriptor header value.
    pub fn to_header(&self) -> Result<String, X402Error> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Convert a human decimal amount into an integer string of minor units.
pub fn parse_minor_units(amount: &str, decimals: u8) -> Result<String, X402Error> {
    let amount = amount.trim();
    if amount.is_empty() {
        return Err(X402Error::InvalidAmount("amount is empty".to_string()));
    }
    if amount.starts_with('-') {
        return Err(X402Error::InvalidAmount(format!(
            "amount must not be negative: {amount}"
        )));
    }
    let parsed = alloy::primitives::utils::parse_units(amount, decimals)
        .map_err(|e| X402Error::InvalidAmount(format!("{amount}: {e}")))?;
    Ok(parsed.get_absolute().to_string())
}

/// A transfer the signer accepted. The id is usually a transaction hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferReceipt {
    pub transfer_id: String,
    pub submitted_at: DateTime<Utc>,
}

impl TransferReceipt {
    /// Receipt stamped with the current time.
    pub fn new(transfer_id: impl Into<String>) -> Self {
        Self::at(transfer_id, Utc::now())
    }

    pub fn at(transfer_id: impl Into<String>, submitted_at: DateTime<Utc>) -> Self {
        Self {
            transfer_id: transfer_id.into(),
            submitted_at,
        }
    }
}

/// Settlement state as reported by the API's payment status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Pending,
    Confirmed,
    Failed,
}

/// Body of `GET {payment_endpoint}/{transfer_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub transaction_hash: String,
    pub status: RecordStatus,
    pub amount: String,
    pub currency: String,
    /// Unix time in milliseconds.
    pub timestamp: u64,
    #[serde(default)]
    pub confirmations: u64,
}
