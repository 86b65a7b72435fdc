use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle phase of a tracked transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Submitted,
    Included,
    Confirmed,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Idle => "idle",
            Phase::Submitted => "submitted",
            Phase::Included => "included",
            Phase::Confirmed => "confirmed",
            Phase::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Observable state of one tracked transfer.
///
/// Transitions only move forward: `idle → submitted → included → confirmed`,
/// with `failed` reachable from any active phase and terminal. The mutators
/// return `true` when the record actually changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatus {
    pub transfer_id: Option<String>,
    pub phase: Phase,
    pub confirmations: u64,
    pub last_error: Option<String>,
}

impl Default for PaymentStatus {
    fn default() -> Self {
        Self::idle()
    }
}

impl PaymentStatus {
    pub fn idle() -> Self {
        Self {
            transfer_id: None,
            phase: Phase::Idle,
            confirmations: 0,
            last_error: None,
        }
    }

    /// A fresh record for a transfer that was just handed to the chain.
    pub fn submitted(transfer_id: impl Into<String>) -> Self {
        Self {
            transfer_id: Some(transfer_id.into()),
            phase: Phase::Submitted,
            ..Self::idle()
        }
    }

    pub fn is_failed(&self) -> bool {
        self.phase == Phase::Failed
    }

    /// Included in a block (possibly still short of the target depth).
    pub fn is_included(&self) -> bool {
        matches!(self.phase, Phase::Included | Phase::Confirmed)
    }

    /// Apply a confirmation depth observed on-chain.
    ///
    /// The first observation moves `submitted` to `included` with at least one
    /// confirmation; later increases move to `confirmed`. Lower depths (a
    /// reorg or a lagging RPC node) are ignored so the count never decreases.
    pub fn observe_depth(&mut self, depth: u64) -> bool {
        match self.phase {
            Phase::Idle | Phase::Failed => false,
            Phase::Submitted => {
                self.phase = Phase::Included;
                self.confirmations = depth.max(1);
                true
            }
            Phase::Included | Phase::Confirmed => {
                if depth <= self.confirmations {
                    return false;
                }
                self.phase = Phase::Confirmed;
                self.confirmations = depth;
                true
            }
        }
    }

    /// Promote an `included` record to `confirmed` once `target` is reached.
    pub fn promote(&mut self, target: u64) -> bool {
        if self.phase == Phase::Included && self.confirmations >= target {
            self.phase = Phase::Confirmed;
            return true;
        }
        false
    }

    pub fn reached(&self, target: u64) -> bool {
        self.is_included() && self.confirmations >= target
    }

    /// Move to the terminal `failed` phase.
    pub fn fail(&mut self, message: impl Into<String>) -> bool {
        if matches!(self.phase, Phase::Idle | Phase::Failed) {
            return false;
        }
        self.phase = Phase::Failed;
        self.last_error = Some(message.into());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_sequence() {
        let mut s = PaymentStatus::submitted("0xdeadbeef");
        assert_eq!(s.phase, Phase::Submitted);

        assert!(s.observe_depth(1));
        assert_eq!((s.phase, s.confirmations), (Phase::Included, 1));

        assert!(s.observe_depth(3));
        assert_eq!((s.phase, s.confirmations), (Phase::Confirmed, 3));
        assert!(s.reached(3));
    }

    #[test]
    fn test_inclusion_counts_at_least_one_confirmation() {
        let mut s = PaymentStatus::submitted("0x1");
        assert!(s.observe_depth(0));
        assert_eq!(s.confirmations, 1);
        assert_eq!(s.phase, Phase::Included);
    }

    #[test]
    fn test_confirmations_never_decrease() {
        let mut s = PaymentStatus::submitted("0x1");
        s.observe_depth(2);
        assert!(!s.observe_depth(1));
        assert!(!s.observe_depth(2));
        assert_eq!(s.confirmations, 2);
    }

    #[test]
    fn test_failed_is_terminal() {
        let mut s = PaymentStatus::submitted("0x1");
        assert!(s.fail("reverted"));
        assert!(!s.observe_depth(5));
        assert!(!s.fail("again"));
        assert_eq!(s.phase, Phase::Failed);
        assert_eq!(s.last_error.as_deref(), Some("reverted"));
    }

    #[test]
    fn test_idle_ignores_updates() {
        let mut s = PaymentStatus::idle();
        assert!(!s.observe_depth(1));
        assert!(!s.fail("boom"));
        assert_eq!(s, PaymentStatus::default());
    }

    #[test]
    fn test_promote_on_deep_first_observation() {
        let mut s = PaymentStatus::submitted("0x1");
        s.observe_depth(4);
        assert_eq!(s.phase, Phase::Included);
        assert!(s.promote(3));
        assert_eq!(s.phase, Phase::Confirmed);
        assert!(!s.promote(3));
    }

    #[test]
    fn test_status_wire_format() {
        let s = PaymentStatus::submitted("0xabc");
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["transferId"], "0xabc");
        assert_eq!(json["phase"], "submitted");
        assert_eq!(json["confirmations"], 0);
    }
}
