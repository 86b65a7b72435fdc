//! Capability traits for the external collaborators of the payment flow.
//!
//! - [`Signer`]: wallet side, turns a descriptor into a submitted transfer
//! - [`ChainStateProvider`]: chain side, reports inclusion and depth of a transfer
//! - [`PaymentObserver`]: caller side, receives tracker events
//!
//! Implementations live in the `x402-client` crate (alloy-backed) or in tests.

use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, X402Error};
use crate::payment::{PaymentDescriptor, TransferReceipt};
use crate::status::PaymentStatus;

/// Wallet-side capability: submits a funds transfer for a payment descriptor.
pub trait Signer: Send + Sync {
    /// Submit a transfer satisfying `descriptor`.
    ///
    /// Fails with [`X402Error::TransferRejected`] when the wallet or chain
    /// refuses the transfer and [`X402Error::SignerUnavailable`] when the
    /// wallet cannot be reached.
    fn transfer(
        &self,
        descriptor: &PaymentDescriptor,
    ) -> impl Future<Output = Result<TransferReceipt, X402Error>> + Send;
}

impl<T: Signer> Signer for Arc<T> {
    fn transfer(
        &self,
        descriptor: &PaymentDescriptor,
    ) -> impl Future<Output = Result<TransferReceipt, X402Error>> + Send {
        (**self).transfer(descriptor)
    }
}

/// Placeholder for a gateway built without a signer. Has no values.
#[derive(Debug, Clone, Copy)]
pub enum NoSigner {}

impl Signer for NoSigner {
    fn transfer(
        &self,
        _descriptor: &PaymentDescriptor,
    ) -> impl Future<Output = Result<TransferReceipt, X402Error>> + Send {
        let never: std::future::Ready<Result<TransferReceipt, X402Error>> = match *self {};
        never
    }
}

/// On-chain state of a submitted transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferOutcome {
    Pending,
    Included,
    Reverted,
}

/// Chain-side capability used by [`crate::PaymentTracker`].
pub trait ChainStateProvider: Send + Sync {
    /// Blocks on top of (and including) the transfer's block.
    ///
    /// `Ok(None)` means the chain does not know the transfer at all;
    /// `Ok(Some(0))` means it is known but not yet mined.
    fn confirmation_depth(
        &self,
        transfer_id: &str,
    ) -> impl Future<Output = Result<Option<u64>, X402Error>> + Send;

    fn transfer_outcome(
        &self,
        transfer_id: &str,
    ) -> impl Future<Output = Result<TransferOutcome, X402Error>> + Send;
}

impl<T: ChainStateProvider> ChainStateProvider for Arc<T> {
    fn confirmation_depth(
        &self,
        transfer_id: &str,
    ) -> impl Future<Output = Result<Option<u64>, X402Error>> + Send {
        (**self).confirmation_depth(transfer_id)
    }

    fn transfer_outcome(
        &self,
        transfer_id: &str,
    ) -> impl Future<Output = Result<TransferOutcome, X402Error>> + Send {
        (**self).transfer_outcome(transfer_id)
    }
}

/// Receives tracker events.
///
/// Called while the tracker's status lock is held, so events arrive in order
/// and never for a superseded transfer. Implementations must not call back
/// into the tracker.
pub trait PaymentObserver: Send + Sync + 'static {
    fn on_submitted(&self, _transfer_id: &str) {}

    fn on_status_change(&self, _status: &PaymentStatus) {}

    fn on_error(&self, _kind: ErrorKind, _message: &str) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PaymentObserver for NoopObserver {}
