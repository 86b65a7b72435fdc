use std::time::Duration;

/// Response header carrying the JSON payment descriptor on a 402.
pub const DESCRIPTOR_HEADER: &str = "x-payment-info";

/// Request header carrying the transfer id on the paid retry.
pub const PROOF_HEADER: &str = "X-Payment-Proof";

/// Protocol marker sent on every outgoing request.
pub const PROTOCOL_HEADER: &str = "X-Payment-Protocol";
pub const PROTOCOL_NAME: &str = "x402";

pub const VERSION_HEADER: &str = "X-Payment-Version";
pub const PROTOCOL_VERSION: &str = "1.0";

/// Path (relative to the API base URL) of the transfer status endpoint.
pub const DEFAULT_PAYMENT_ENDPOINT: &str = "/payments";

/// USDC has 6 decimal places.
pub const USDC_DECIMALS: u8 = 6;

/// Currency symbol used by [`crate::PaymentDescriptor::usdc`].
pub const USDC_SYMBOL: &str = "USDC";

pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_SIGNER_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_TRACKING_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Confirmation depth at which tracking stops.
pub const DEFAULT_TARGET_CONFIRMATIONS: u64 = 3;

/// Consecutive "transfer unknown to the chain" polls tolerated before failing.
pub const DEFAULT_NOT_FOUND_BUDGET: u32 = 20;
