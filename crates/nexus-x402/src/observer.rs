use crate::error::ErrorKind;
use crate::scheme::PaymentObserver;
use crate::status::{Phase, PaymentStatus};

/// Observer that logs every tracker event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl PaymentObserver for TracingObserver {
    fn on_submitted(&self, transfer_id: &str) {
        tracing::info!(transfer_id = %transfer_id, "transfer submitted");
    }

    fn on_status_change(&self, status: &PaymentStatus) {
        let transfer_id = status.transfer_id.as_deref().unwrap_or("-");
        match status.phase {
            Phase::Failed => tracing::warn!(
                transfer_id = %transfer_id,
                error = status.last_error.as_deref().unwrap_or("unknown"),
                "transfer failed"
            ),
            phase => tracing::info!(
                transfer_id = %transfer_id,
                phase = %phase,
                confirmations = status.confirmations,
                "payment status changed"
            ),
        }
    }

    fn on_error(&self, kind: ErrorKind, message: &str) {
        tracing::warn!(kind = %kind, error = %message, "payment error");
    }
}
