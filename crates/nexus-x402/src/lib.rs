//! x402 payment-retry client for the Liquidity Nexus dashboard.
//!
//! Two pieces cooperate:
//!
//! - **Gateway** ([`PaymentGateway`]): issues HTTP requests; on a 402 with a
//!   payment descriptor it asks a [`Signer`] for a transfer and retries once
//!   with the transfer id as proof
//! - **Tracker** ([`PaymentTracker`]): polls a [`ChainStateProvider`] until
//!   the transfer reaches the target confirmation depth, reporting to a
//!   [`PaymentObserver`]
//!
//! Wallet and RPC implementations live in the `x402-client` crate.
//!
//! # Quick example
//!
//! ```no_run
//! use x402::{GatewayConfig, HttpRequest, PaymentGateway, Signer};
//!
//! # async fn run<S: Signer>(signer: S) -> Result<(), x402::X402Error> {
//! let gateway = PaymentGateway::new(GatewayConfig::default())?.with_signer(signer);
//!
//! let (resp, receipt) = gateway
//!     .request(HttpRequest::get("https://api.example.com/strategies"))
//!     .await?;
//!
//! if let Some(r) = receipt {
//!     println!("paid via transfer {}", r.transfer_id);
//! }
//! # let _ = resp;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod gateway;
pub mod observer;
pub mod payment;
pub mod scheme;
pub mod status;
pub mod tracker;

pub use config::{ConfigError, GatewayConfig, TrackerConfig};
pub use constants::*;
pub use error::{ErrorKind, UnpaidResponse, X402Error};
pub use gateway::{HttpRequest, PaymentGateway};
pub use observer::TracingObserver;
pub use payment::*;
pub use scheme::*;
pub use status::{Phase, PaymentStatus};
pub use tracker::{PaymentTracker, TrackOutcome};
