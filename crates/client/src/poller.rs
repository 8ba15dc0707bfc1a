//! Fixed-interval polling of one job resource.
//!
//! A tracked job has two resources, the scene plan and the rendered
//! video, each polled by its own [`Poller`] at its own cadence. Pollers
//! are independent: they share the (immutable) job id and nothing else,
//! and may settle in either order.
//!
//! Each poller owns a [`PollableResource`] state machine:
//!
//! ```text
//! Idle -> Polling -> Settled
//!            |-----> Abandoned   (only with a not-found limit)
//!            '-----> Stopped     (view teardown)
//! ```
//!
//! Every attempt is reduced to a [`PollOutcome`] and logged here, at the
//! boundary. Failed attempts are absorbed and the timer keeps going; there
//! is no backoff and no attempt cap. A request that has not answered by the
//! next tick counts as failed and is replaced by a fresh one.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use manimgen_core::types::JobId;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::api::{ApiError, GenerationBackend, PLAN_FIELD, VIDEO_FIELD};

/// Default interval between plan polls.
pub const DEFAULT_PLAN_INTERVAL: Duration = Duration::from_millis(2000);

/// Default interval between video polls. Rendering takes longer than
/// planning, so the video is polled less often.
pub const DEFAULT_VIDEO_INTERVAL: Duration = Duration::from_millis(3000);

/// Failure recorded for a request still pending when the next tick fires.
const SUPERSEDED: &str = "superseded by next tick";

// ---------------------------------------------------------------------------
// Resource kinds
// ---------------------------------------------------------------------------

/// The two resources tracked per job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Plan,
    Video,
}

impl ResourceKind {
    pub fn name(self) -> &'static str {
        match self {
            ResourceKind::Plan => "plan",
            ResourceKind::Video => "video",
        }
    }

    /// Response field whose presence settles this resource.
    pub fn terminal_field(self) -> &'static str {
        match self {
            ResourceKind::Plan => PLAN_FIELD,
            ResourceKind::Video => VIDEO_FIELD,
        }
    }

    pub fn default_interval(self) -> Duration {
        match self {
            ResourceKind::Plan => DEFAULT_PLAN_INTERVAL,
            ResourceKind::Video => DEFAULT_VIDEO_INTERVAL,
        }
    }

    async fn fetch(
        self,
        backend: &dyn GenerationBackend,
        job_id: &JobId,
    ) -> Result<Option<String>, ApiError> {
        match self {
            ResourceKind::Plan => backend.fetch_plan(job_id).await,
            ResourceKind::Video => backend.fetch_video(job_id).await,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tunable parameters for one poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    /// Delay between the start of consecutive attempts.
    pub interval: Duration,
    /// Give up after this many consecutive not-found responses. `None`
    /// treats not-found like "not ready" and polls forever.
    pub not_found_limit: Option<u32>,
}

impl PollerConfig {
    pub fn for_kind(kind: ResourceKind) -> Self {
        Self {
            interval: kind.default_interval(),
            not_found_limit: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Outcomes and state
// ---------------------------------------------------------------------------

/// Result of a single poll attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    /// The terminal field is present.
    Ready(T),
    /// The job exists but the resource is not produced yet.
    NotReady,
    /// The backend does not recognise the job id.
    NotFound,
    /// Transport error or unexpected status; retried on the next tick.
    Failed(String),
}

impl<T> PollOutcome<T> {
    pub fn from_result(result: Result<Option<T>, ApiError>) -> Self {
        match result {
            Ok(Some(value)) => PollOutcome::Ready(value),
            Ok(None) => PollOutcome::NotReady,
            Err(e) if e.is_not_found() => PollOutcome::NotFound,
            Err(e) => PollOutcome::Failed(e.to_string()),
        }
    }
}

/// Lifecycle state of a polled resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Polling,
    Settled,
    Abandoned,
    Stopped,
}

impl PollerState {
    /// Whether requests are still being issued.
    pub fn is_active(self) -> bool {
        matches!(self, PollerState::Polling)
    }

    /// Whether the state can never change again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PollerState::Settled | PollerState::Abandoned | PollerState::Stopped
        )
    }
}

/// Effect of applying an outcome to a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Keep polling.
    Continue,
    /// The value was stored; polling ends.
    Settled,
    /// The not-found limit was hit; polling ends.
    Abandoned,
    /// The resource was not polling; nothing changed.
    Ignored,
}

/// Predicate deciding whether a fetched value is terminal.
pub type TerminalPredicate<T> = fn(&T) -> bool;

/// State machine for one polled resource.
///
/// Once settled, the stored value never changes and the resource never
/// becomes active again.
#[derive(Debug, Clone)]
pub struct PollableResource<T> {
    value: Option<T>,
    state: PollerState,
    interval: Duration,
    is_terminal: TerminalPredicate<T>,
    not_found_limit: Option<u32>,
    not_found_streak: u32,
    attempts: u32,
}

impl<T> PollableResource<T> {
    /// Create an idle resource. Any fetched value is terminal by default.
    pub fn new(config: PollerConfig) -> Self {
        Self {
            value: None,
            state: PollerState::Idle,
            interval: config.interval,
            is_terminal: |_| true,
            not_found_limit: config.not_found_limit,
            not_found_streak: 0,
            attempts: 0,
        }
    }

    /// Replace the terminal predicate.
    pub fn with_terminal(mut self, predicate: TerminalPredicate<T>) -> Self {
        self.is_terminal = predicate;
        self
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of outcomes applied while polling.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Enter `Polling`. Only an idle resource can begin.
    pub fn begin(&mut self) -> bool {
        if self.state != PollerState::Idle {
            return false;
        }
        self.state = PollerState::Polling;
        true
    }

    /// Stop polling for good unless the resource already finished.
    pub fn stop(&mut self) {
        if !self.state.is_terminal() {
            self.state = PollerState::Stopped;
        }
    }

    /// Apply the outcome of one attempt.
    pub fn apply(&mut self, outcome: PollOutcome<T>) -> Transition {
        if !self.state.is_active() {
            return Transition::Ignored;
        }
        self.attempts += 1;

        match outcome {
            PollOutcome::Ready(value) if (self.is_terminal)(&value) => {
                self.value = Some(value);
                self.state = PollerState::Settled;
                Transition::Settled
            }
            PollOutcome::NotFound => {
                self.not_found_streak += 1;
                match self.not_found_limit {
                    Some(limit) if self.not_found_streak >= limit => {
                        self.state = PollerState::Abandoned;
                        Transition::Abandoned
                    }
                    _ => Transition::Continue,
                }
            }
            PollOutcome::Ready(_) | PollOutcome::NotReady | PollOutcome::Failed(_) => {
                self.not_found_streak = 0;
                Transition::Continue
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Poller task
// ---------------------------------------------------------------------------

/// Milestones a poller reports to its owning session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollerEvent {
    /// The terminal field arrived. Sent at most once per poller.
    Settled { kind: ResourceKind, value: String },
    /// The poller gave up after consecutive not-found responses.
    Abandoned { kind: ResourceKind, attempts: u32 },
}

/// Snapshot of a poller's progress, published on a watch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerStatus {
    pub state: PollerState,
    pub attempts: u32,
}

impl<T> From<&PollableResource<T>> for PollerStatus {
    fn from(resource: &PollableResource<T>) -> Self {
        Self {
            state: resource.state(),
            attempts: resource.attempts(),
        }
    }
}

/// Handle to a running poll loop.
///
/// Dropping the handle cancels the loop.
pub struct Poller {
    kind: ResourceKind,
    cancel: CancellationToken,
    status: watch::Receiver<PollerStatus>,
    handle: JoinHandle<()>,
}

impl Poller {
    /// Spawn a poll loop for `kind` of `job_id`.
    ///
    /// The first request is issued immediately, then one per
    /// `config.interval`. Milestones go to `events`; the loop ends when the
    /// resource settles or is abandoned, or when `cancel` fires.
    pub fn start(
        kind: ResourceKind,
        job_id: JobId,
        backend: Arc<dyn GenerationBackend>,
        config: PollerConfig,
        events: mpsc::UnboundedSender<PollerEvent>,
        cancel: CancellationToken,
    ) -> Self {
        let resource = PollableResource::new(config);
        let (status_tx, status) = watch::channel(PollerStatus::from(&resource));
        let task_cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            tracing::info!(
                job_id = %job_id,
                resource = %kind,
                interval_ms = config.interval.as_millis() as u64,
                "Poller started",
            );
            run_poll_loop(kind, &job_id, backend, resource, &events, &status_tx, &task_cancel).await;
            tracing::info!(job_id = %job_id, resource = %kind, "Poller exited");
        });

        Self {
            kind,
            cancel,
            status,
            handle,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Latest published status.
    pub fn status(&self) -> PollerStatus {
        *self.status.borrow()
    }

    pub fn state(&self) -> PollerState {
        self.status().state
    }

    /// Whether requests are still being issued.
    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    /// Subscribe to status changes.
    pub fn watch(&self) -> watch::Receiver<PollerStatus> {
        self.status.clone()
    }

    /// Cancel the loop. Idempotent; a settled poller stays settled.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Core poll loop: tick -> fetch -> apply, until a terminal state.
async fn run_poll_loop(
    kind: ResourceKind,
    job_id: &JobId,
    backend: Arc<dyn GenerationBackend>,
    mut resource: PollableResource<String>,
    events: &mpsc::UnboundedSender<PollerEvent>,
    status_tx: &watch::Sender<PollerStatus>,
    cancel: &CancellationToken,
) {
    resource.begin();
    status_tx.send_replace(PollerStatus::from(&resource));

    let mut ticker = tokio::time::interval(resource.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // Set when the next tick fired while a request was still in flight.
    let mut superseded = false;

    loop {
        if !superseded {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
        }

        // At most one request in flight: a request still pending at the next
        // tick is dropped and replaced, and cancellation drops it too.
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = kind.fetch(backend.as_ref(), job_id) => {
                superseded = false;
                PollOutcome::from_result(result)
            }
            _ = ticker.tick() => {
                superseded = true;
                PollOutcome::Failed(SUPERSEDED.to_string())
            }
        };
        log_outcome(kind, job_id, &outcome);

        let transition = resource.apply(outcome);
        status_tx.send_replace(PollerStatus::from(&resource));

        match transition {
            Transition::Settled => {
                if let Some(value) = resource.value() {
                    let _ = events.send(PollerEvent::Settled {
                        kind,
                        value: value.clone(),
                    });
                }
                return;
            }
            Transition::Abandoned => {
                tracing::error!(
                    job_id = %job_id,
                    resource = %kind,
                    attempts = resource.attempts(),
                    "Job not found, giving up",
                );
                let _ = events.send(PollerEvent::Abandoned {
                    kind,
                    attempts: resource.attempts(),
                });
                return;
            }
            Transition::Continue | Transition::Ignored => {}
        }
    }

    resource.stop();
    status_tx.send_replace(PollerStatus::from(&resource));
}

fn log_outcome(kind: ResourceKind, job_id: &JobId, outcome: &PollOutcome<String>) {
    match outcome {
        PollOutcome::Ready(_) => {
            tracing::info!(job_id = %job_id, resource = %kind, "Resource ready");
        }
        PollOutcome::NotReady => {
            tracing::debug!(job_id = %job_id, resource = %kind, "Resource not ready");
        }
        PollOutcome::NotFound => {
            tracing::warn!(job_id = %job_id, resource = %kind, "Backend reports job not found");
        }
        PollOutcome::Failed(reason) => {
            tracing::warn!(job_id = %job_id, resource = %kind, error = %reason, "Poll attempt failed");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
