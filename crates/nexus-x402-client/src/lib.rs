//! Wallet-backed x402 client for the Liquidity Nexus API.
//!
//! Plugs alloy into the capability traits of the `x402` crate:
//!
//! - [`EvmSigner`] pays 402 challenges with USDC or native transfers
//! - [`RpcChainState`] reports receipt status and confirmation depth
//! - [`PaymentSession`] ties a gateway and a tracker together
//!
//! # Quick example
//!
//! ```no_run
//! use std::sync::Arc;
//! use x402_client::{connect_wallet, ChainConfig, EvmSigner, PaymentSession, RpcChainState};
//! use x402::{GatewayConfig, HttpRequest, PaymentGateway, TracingObserver, TrackerConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), x402::X402Error> {
//! let chain = ChainConfig::default();
//! let (provider, _address) = connect_wallet("0xYOUR_KEY", &chain.rpc_url)?;
//!
//! let gateway = PaymentGateway::new(GatewayConfig::default())?
//!     .with_signer(EvmSigner::with_chain_config(provider.clone(), chain));
//! let session = PaymentSession::new(
//!     gateway,
//!     RpcChainState::new(provider),
//!     TrackerConfig::default(),
//!     Arc::new(TracingObserver),
//! );
//!
//! let (resp, receipt) = session
//!     .fetch(HttpRequest::get("https://api.example.com/strategies"))
//!     .await?;
//! if receipt.is_some() {
//!     println!("settled: {:?}", session.wait_for_settlement().await);
//! }
//! # let _ = resp;
//! # Ok(())
//! # }
//! ```

mod chain;
mod session;
mod wallet;

pub use chain::{
    ChainConfig, RpcChainState, BASE_CHAIN_ID, BASE_EXPLORER, BASE_RPC_URL, BASE_USDC,
    NATIVE_SYMBOL,
};
pub use session::PaymentSession;
pub use wallet::{connect_wallet, EvmSigner};

// Re-export commonly needed types from core
pub use x402::{
    GatewayConfig, HttpRequest, PaymentDescriptor, PaymentGateway, PaymentObserver,
    PaymentStatus, Phase, TrackOutcome, TrackerConfig, TransferReceipt, X402Error,
};
