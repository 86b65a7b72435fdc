//! Background confirmation tracking for submitted transfers.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::TrackerConfig;
use crate::error::{ErrorKind, X402Error};
use crate::scheme::{ChainStateProvider, NoopObserver, PaymentObserver, TransferOutcome};
use crate::status::{Phase, PaymentStatus};

/// tokio's interval panics on a zero period.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// How a tracking run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackOutcome {
    /// Target confirmation depth reached.
    Confirmed(PaymentStatus),
    /// Reverted, rejected or never seen on-chain. Terminal.
    Failed(PaymentStatus),
    /// Overall tracking timeout elapsed; the phase is the last one observed.
    TimedOut(PaymentStatus),
    /// A newer `track`, `cancel` or `reset` took over before this run finished.
    Superseded,
}

struct TrackerState {
    generation: u64,
    status: PaymentStatus,
    active: Option<AbortHandle>,
}

struct Shared {
    state: Mutex<TrackerState>,
    observer: Arc<dyn PaymentObserver>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("tracker state mutex poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

/// Watches one transfer at a time until it reaches the target depth.
///
/// [`track`](Self::track) returns immediately; polling runs on a spawned
/// tokio task and reports through the [`PaymentObserver`]. Starting a new
/// transfer aborts the previous task, and a generation counter kept under
/// the status lock guarantees the old task cannot emit anything afterwards.
pub struct PaymentTracker<C> {
    provider: Arc<C>,
    config: TrackerConfig,
    shared: Arc<Shared>,
}

impl<C: ChainStateProvider + 'static> PaymentTracker<C> {
    pub fn new(provider: C, config: TrackerConfig) -> Self {
        Self::with_observer(provider, config, Arc::new(NoopObserver))
    }

    pub fn with_observer(
        provider: C,
        config: TrackerConfig,
        observer: Arc<dyn PaymentObserver>,
    ) -> Self {
        Self {
            provider: Arc::new(provider),
            config,
            shared: Arc::new(Shared {
                state: Mutex::new(TrackerState {
                    generation: 0,
                    status: PaymentStatus::idle(),
                    active: None,
                }),
                observer,
            }),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Snapshot of the current status record.
    pub fn status(&self) -> PaymentStatus {
        self.shared.lock().status.clone()
    }

    pub fn is_tracking(&self) -> bool {
        self.shared
            .lock()
            .active
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Start watching `transfer_id`, replacing whatever was tracked before.
    ///
    /// Must be called from within a tokio runtime.
    pub fn track(&self, transfer_id: impl Into<String>) -> JoinHandle<TrackOutcome> {
        let transfer_id = transfer_id.into();
        let mut state = self.shared.lock();

        if let Some(previous) = state.active.take() {
            previous.abort();
            tracing::debug!(
                previous = ?state.status.transfer_id,
                "cancelled tracking of previous transfer"
            );
        }
        state.generation += 1;
        state.status = PaymentStatus::submitted(transfer_id.as_str());
        self.shared.observer.on_submitted(&transfer_id);
        self.shared.observer.on_status_change(&state.status);

        tracing::info!(
            transfer_id = %transfer_id,
            target = self.config.target_confirmations,
            "tracking transfer"
        );

        let poller = Poller {
            provider: Arc::clone(&self.provider),
            config: self.config.clone(),
            shared: Arc::clone(&self.shared),
            generation: state.generation,
            transfer_id,
        };
        let handle = tokio::spawn(poller.run());
        state.active = Some(handle.abort_handle());
        handle
    }

    /// Stop polling. The status record keeps its last value.
    pub fn cancel(&self) {
        let mut state = self.shared.lock();
        state.generation += 1;
        if let Some(active) = state.active.take() {
            active.abort();
            tracing::debug!(transfer_id = ?state.status.transfer_id, "tracking cancelled");
        }
    }

    /// Stop polling and return to a fresh `idle` record.
    pub fn reset(&self) {
        let mut state = self.shared.lock();
        state.generation += 1;
        if let Some(active) = state.active.take() {
            active.abort();
        }
        if state.status.phase != Phase::Idle {
            state.status = PaymentStatus::idle();
            self.shared.observer.on_status_change(&state.status);
        }
    }
}

impl<C> Drop for PaymentTracker<C> {
    fn drop(&mut self) {
        if let Some(active) = self.shared.lock().active.take() {
            active.abort();
        }
    }
}

enum Step {
    Continue,
    Done(TrackOutcome),
}

/// State owned by one spawned polling task.
struct Poller<C> {
    provider: Arc<C>,
    config: TrackerConfig,
    shared: Arc<Shared>,
    generation: u64,
    transfer_id: String,
}

impl<C: ChainStateProvider> Poller<C> {
    async fn run(self) -> TrackOutcome {
        // A timeout too large to represent as an instant means no deadline.
        let Some(deadline) = Instant::now().checked_add(self.config.tracking_timeout) else {
            return self.poll_loop().await;
        };
        match tokio::time::timeout_at(deadline, self.poll_loop()).await {
            Ok(outcome) => outcome,
            Err(_) => self.give_up(),
        }
    }

    async fn poll_loop(&self) -> TrackOutcome {
        let mut ticker = tokio::time::interval(self.config.poll_interval.max(MIN_POLL_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut not_found = 0u32;

        loop {
            ticker.tick().await;
            if let Step::Done(outcome) = self.poll_once(&mut not_found).await {
                return outcome;
            }
        }
    }

    async fn poll_once(&self, not_found: &mut u32) -> Step {
        let id = self.transfer_id.as_str();

        let outcome = match self.bounded(self.provider.transfer_outcome(id)).await {
            Ok(outcome) => outcome,
            Err(e) => return self.provider_error(e),
        };

        match outcome {
            TransferOutcome::Reverted => self.fail(
                ErrorKind::TransferRejected,
                "transfer reverted on-chain".to_string(),
            ),
            TransferOutcome::Pending => {
                match self.bounded(self.provider.confirmation_depth(id)).await {
                    Ok(None) => {
                        match self.current_phase() {
                            None => return Step::Done(TrackOutcome::Superseded),
                            Some(Phase::Submitted) => {}
                            Some(_) => return Step::Continue,
                        }
                        *not_found += 1;
                        let budget = self.config.not_found_budget.max(1);
                        if *not_found >= budget {
                            return self.fail(
                                ErrorKind::TransferNotFound,
                                format!("transfer not found on-chain after {budget} polls"),
                            );
                        }
                        tracing::debug!(
                            transfer_id = %id,
                            polls = *not_found,
                            "transfer not visible on-chain yet"
                        );
                        Step::Continue
                    }
                    Ok(Some(_)) => {
                        *not_found = 0;
                        tracing::debug!(transfer_id = %id, "transfer pending");
                        Step::Continue
                    }
                    Err(e) => self.provider_error(e),
                }
            }
            TransferOutcome::Included => {
                match self.bounded(self.provider.confirmation_depth(id)).await {
                    Ok(Some(depth)) => self.record_depth(depth),
                    Ok(None) => {
                        tracing::debug!(transfer_id = %id, "included but depth not available yet");
                        Step::Continue
                    }
                    Err(e) => self.provider_error(e),
                }
            }
        }
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, X402Error>>,
    ) -> Result<T, X402Error> {
        let limit = self.config.poll_timeout;
        tokio::time::timeout(limit, call).await.map_err(|_| {
            X402Error::ProviderUnreachable(format!("no response within {}s", limit.as_secs()))
        })?
    }

    /// Lock the shared state if this run is still the current one.
    fn current(&self) -> Option<MutexGuard<'_, TrackerState>> {
        let state = self.shared.lock();
        (state.generation == self.generation).then_some(state)
    }

    fn current_phase(&self) -> Option<Phase> {
        self.current().map(|state| state.status.phase)
    }

    fn provider_error(&self, e: X402Error) -> Step {
        if e.is_transient() {
            tracing::warn!(
                transfer_id = %self.transfer_id,
                error = %e,
                "chain provider unavailable, retrying on next poll"
            );
            return Step::Continue;
        }
        self.fail(e.kind(), e.to_string())
    }

    fn record_depth(&self, depth: u64) -> Step {
        let target = self.config.target_confirmations.max(1);
        let Some(mut state) = self.current() else {
            return Step::Done(TrackOutcome::Superseded);
        };

        if state.status.observe_depth(depth) {
            self.shared.observer.on_status_change(&state.status);
        } else {
            tracing::debug!(
                transfer_id = %self.transfer_id,
                observed = depth,
                confirmations = state.status.confirmations,
                "no new confirmations"
            );
        }
        if state.status.promote(target) {
            self.shared.observer.on_status_change(&state.status);
        }

        if state.status.reached(target) {
            tracing::info!(
                transfer_id = %self.transfer_id,
                confirmations = state.status.confirmations,
                "target confirmation depth reached"
            );
            state.active = None;
            return Step::Done(TrackOutcome::Confirmed(state.status.clone()));
        }
        Step::Continue
    }

    fn fail(&self, kind: ErrorKind, message: String) -> Step {
        let Some(mut state) = self.current() else {
            return Step::Done(TrackOutcome::Superseded);
        };

        tracing::warn!(
            transfer_id = %self.transfer_id,
            kind = %kind,
            error = %message,
            "transfer failed"
        );
        if state.status.fail(message.as_str()) {
            self.shared.observer.on_status_change(&state.status);
        }
        self.shared.observer.on_error(kind, &message);
        state.active = None;
        Step::Done(TrackOutcome::Failed(state.status.clone()))
    }

    fn give_up(&self) -> TrackOutcome {
        let Some(mut state) = self.current() else {
            return TrackOutcome::Superseded;
        };

        let message = format!(
            "stopped watching {} after {}s in phase {} with {} confirmations",
            self.transfer_id,
            self.config.tracking_timeout.as_secs(),
            state.status.phase,
            state.status.confirmations
        );
        tracing::warn!(transfer_id = %self.transfer_id, "{message}");
        self.shared
            .observer
            .on_error(ErrorKind::TrackingTimeout, &message);
        state.active = None;
        TrackOutcome::TimedOut(state.status.clone())
    }
}
