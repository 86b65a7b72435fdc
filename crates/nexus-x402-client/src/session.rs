use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::{Map, Value};
use tokio::task::JoinHandle;

use x402::{
    ChainStateProvider, HttpRequest, NoSigner, PaymentDescriptor, PaymentGateway,
    PaymentObserver, PaymentRecord, PaymentStatus, PaymentTracker, Signer, TrackOutcome,
    TrackerConfig, TransferReceipt, X402Error,
};

/// One wallet's view of the payment flow: a gateway that pays 402 challenges
/// and a tracker that follows the resulting transfer to confirmation.
///
/// Errors on the payment path are reported to the observer's `on_error`
/// before being returned.
pub struct PaymentSession<C, S = NoSigner> {
    gateway: PaymentGateway<S>,
    tracker: PaymentTracker<C>,
    observer: Arc<dyn PaymentObserver>,
    settlement: Mutex<Option<JoinHandle<TrackOutcome>>>,
}

impl<C, S> PaymentSession<C, S>
where
    C: ChainStateProvider + 'static,
    S: Signer,
{
    pub fn new(
        gateway: PaymentGateway<S>,
        chain: C,
        tracker_config: TrackerConfig,
        observer: Arc<dyn PaymentObserver>,
    ) -> Self {
        let tracker = PaymentTracker::with_observer(chain, tracker_config, Arc::clone(&observer));
        Self {
            gateway,
            tracker,
            observer,
            settlement: Mutex::new(None),
        }
    }

    pub fn gateway(&self) -> &PaymentGateway<S> {
        &self.gateway
    }

    pub fn tracker(&self) -> &PaymentTracker<C> {
        &self.tracker
    }

    /// Whether a signer is attached, i.e. 402 challenges can be paid.
    pub fn is_ready(&self) -> bool {
        self.gateway.has_signer()
    }

    /// Swap the wallet used for future payments.
    pub fn set_signer(&mut self, signer: Option<S>) {
        self.gateway.set_signer(signer);
    }

    /// Issue `req`; if it had to be paid for, start tracking the transfer,
    /// also when the paid retry itself fails.
    ///
    /// Returns as soon as the paid response arrives. Use
    /// [`wait_for_settlement`](Self::wait_for_settlement) to follow the
    /// transfer to confirmation.
    pub async fn fetch(
        &self,
        req: HttpRequest,
    ) -> Result<(reqwest::Response, Option<TransferReceipt>), X402Error> {
        match self.gateway.request(req).await {
            Ok((resp, receipt)) => {
                if let Some(ref r) = receipt {
                    self.start_tracking(&r.transfer_id);
                }
                Ok((resp, receipt))
            }
            Err(e) => {
                if let Some(r) = e.receipt() {
                    self.start_tracking(&r.transfer_id);
                }
                Err(self.report(e))
            }
        }
    }

    /// Pay `descriptor` directly and start tracking the transfer.
    pub async fn send_payment(
        &self,
        descriptor: &PaymentDescriptor,
    ) -> Result<TransferReceipt, X402Error> {
        let receipt = self.gateway.pay(descriptor).await.map_err(|e| self.report(e))?;
        self.start_tracking(&receipt.transfer_id);
        Ok(receipt)
    }

    /// Pay `amount` USDC, given in whole units such as `"2.5"`, to `recipient`.
    pub async fn send_usdc_payment(
        &self,
        recipient: &str,
        amount: &str,
        metadata: Map<String, Value>,
    ) -> Result<TransferReceipt, X402Error> {
        let descriptor =
            PaymentDescriptor::usdc(recipient, amount, metadata).map_err(|e| self.report(e))?;
        self.send_payment(&descriptor).await
    }

    /// Ask the API for its settlement record of `transfer_id`.
    pub async fn check_transfer_status(
        &self,
        transfer_id: &str,
    ) -> Result<PaymentRecord, X402Error> {
        self.gateway.check_transfer_status(transfer_id).await
    }

    pub fn status(&self) -> PaymentStatus {
        self.tracker.status()
    }

    /// Stop tracking and return to idle.
    pub fn reset(&self) {
        self.tracker.reset();
        self.settlement_slot().take();
    }

    /// Wait for the most recently started tracking run to finish.
    ///
    /// Returns `None` if nothing is being tracked.
    pub async fn wait_for_settlement(&self) -> Option<TrackOutcome> {
        let handle = self.settlement_slot().take()?;
        match handle.await {
            Ok(outcome) => Some(outcome),
            Err(e) if e.is_cancelled() => Some(TrackOutcome::Superseded),
            Err(e) => {
                tracing::error!(error = %e, "tracking task panicked");
                Some(TrackOutcome::Failed(self.tracker.status()))
            }
        }
    }

    fn start_tracking(&self, transfer_id: &str) {
        let handle = self.tracker.track(transfer_id);
        *self.settlement_slot() = Some(handle);
    }

    fn report(&self, e: X402Error) -> X402Error {
        self.observer.on_error(e.kind(), &e.to_string());
        e
    }

    fn settlement_slot(&self) -> MutexGuard<'_, Option<JoinHandle<TrackOutcome>>> {
        match self.settlement.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("settlement mutex poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}
