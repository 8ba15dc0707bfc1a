//! Tracking session for one submitted job.
//!
//! [`TrackingSession`] is the tracking view's state owner. On
//! [`start`](TrackingSession::start) it spawns the plan and video pollers;
//! pollers never touch view state themselves but report milestones over a
//! channel, and the session applies them one at a time through
//! [`next_update`](TrackingSession::next_update). Because the session is
//! the only writer, the plan value, video value and event log need no
//! locking and are never updated from two places at once.
//!
//! Dropping the session (or calling [`stop`](TrackingSession::stop))
//! cancels both pollers.

use std::sync::Arc;

use manimgen_core::event_log::{EventLog, LogTag};
use manimgen_core::job::{JobStatus, ResourceProgress};
use manimgen_core::plan::{self, FallbackReason, PlanView};
use manimgen_core::types::JobId;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::api::GenerationBackend;
use crate::poller::{Poller, PollerConfig, PollerEvent, ResourceKind};

/// Poller settings for both resources of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackingConfig {
    pub plan: PollerConfig,
    pub video: PollerConfig,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            plan: PollerConfig::for_kind(ResourceKind::Plan),
            video: PollerConfig::for_kind(ResourceKind::Video),
        }
    }
}

/// A change applied to the session's view state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionUpdate {
    PlanSettled,
    VideoSettled,
    Abandoned(ResourceKind),
}

/// Borrowed snapshot of everything the tracking view renders.
#[derive(Debug, Clone, Copy)]
pub struct TrackingView<'a> {
    pub job_id: &'a JobId,
    pub status: JobStatus,
    pub plan: &'a PlanView,
    pub video_url: Option<&'a str>,
    pub plan_polling: bool,
    pub video_polling: bool,
    pub log: &'a EventLog,
}

/// View-session state for one job plus the two pollers feeding it.
pub struct TrackingSession {
    job_id: JobId,
    log: EventLog,
    plan_raw: Option<String>,
    plan_view: PlanView,
    video_url: Option<String>,
    plan_progress: ResourceProgress,
    video_progress: ResourceProgress,
    plan_poller: Poller,
    video_poller: Poller,
    events: mpsc::UnboundedReceiver<PollerEvent>,
    cancel: CancellationToken,
}

impl TrackingSession {
    /// Start tracking `job_id`.
    ///
    /// `log` carries entries recorded before tracking began (e.g. the
    /// submission); new entries are appended after them. Must be called
    /// from within a tokio runtime.
    pub fn start(
        job_id: JobId,
        backend: Arc<dyn GenerationBackend>,
        config: TrackingConfig,
        mut log: EventLog,
    ) -> Self {
        let cancel = CancellationToken::new();
        let (tx, events) = mpsc::unbounded_channel();

        log.append_tagged(
            LogTag::Info,
            format_args!(
                "Tracking job {job_id}: polling plan every {}ms, video every {}ms",
                config.plan.interval.as_millis(),
                config.video.interval.as_millis(),
            ),
        );

        let plan_poller = Poller::start(
            ResourceKind::Plan,
            job_id.clone(),
            Arc::clone(&backend),
            config.plan,
            tx.clone(),
            cancel.child_token(),
        );
        let video_poller = Poller::start(
            ResourceKind::Video,
            job_id.clone(),
            backend,
            config.video,
            tx,
            cancel.child_token(),
        );

        Self {
            job_id,
            log,
            plan_raw: None,
            plan_view: PlanView::Waiting,
            video_url: None,
            plan_progress: ResourceProgress::Pending,
            video_progress: ResourceProgress::Pending,
            plan_poller,
            video_poller,
            events,
            cancel,
        }
    }

    /// Wait for the next poller milestone and apply it.
    ///
    /// Returns `None` once both pollers have exited, whether because both
    /// resources reached a terminal state or because the session was
    /// stopped.
    pub async fn next_update(&mut self) -> Option<SessionUpdate> {
        loop {
            let event = self.events.recv().await?;
            if let Some(update) = self.apply(event) {
                return Some(update);
            }
        }
    }

    /// Apply a poller milestone to the view state.
    ///
    /// A resource is set at most once; repeated milestones for an already
    /// settled resource change nothing and return `None`.
    pub fn apply(&mut self, event: PollerEvent) -> Option<SessionUpdate> {
        match event {
            PollerEvent::Settled {
                kind: ResourceKind::Plan,
                value,
            } => self.settle_plan(value),
            PollerEvent::Settled {
                kind: ResourceKind::Video,
                value,
            } => self.settle_video(value),
            PollerEvent::Abandoned { kind, attempts } => self.abandon(kind, attempts),
        }
    }

    /// Cancel both pollers. Idempotent.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn status(&self) -> JobStatus {
        JobStatus::derive(self.plan_progress, self.video_progress)
    }

    /// Whether both resources reached a terminal state.
    pub fn is_finished(&self) -> bool {
        self.plan_progress != ResourceProgress::Pending
            && self.video_progress != ResourceProgress::Pending
    }

    pub fn plan_view(&self) -> &PlanView {
        &self.plan_view
    }

    /// The plan payload exactly as received.
    pub fn plan_raw(&self) -> Option<&str> {
        self.plan_raw.as_deref()
    }

    pub fn video_url(&self) -> Option<&str> {
        self.video_url.as_deref()
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn poller(&self, kind: ResourceKind) -> &Poller {
        match kind {
            ResourceKind::Plan => &self.plan_poller,
            ResourceKind::Video => &self.video_poller,
        }
    }

    pub fn view(&self) -> TrackingView<'_> {
        TrackingView {
            job_id: &self.job_id,
            status: self.status(),
            plan: &self.plan_view,
            video_url: self.video_url.as_deref(),
            plan_polling: self.plan_poller.is_active(),
            video_polling: self.video_poller.is_active(),
            log: &self.log,
        }
    }

    // ---- private helpers ----

    fn settle_plan(&mut self, raw: String) -> Option<SessionUpdate> {
        if self.plan_raw.is_some() {
            tracing::warn!(job_id = %self.job_id, "Ignoring repeated plan settlement");
            return None;
        }

        self.plan_view = plan::render(Some(&raw));
        self.plan_raw = Some(raw);
        self.plan_progress = ResourceProgress::Ready;

        self.log.append_tagged(LogTag::Success, "Scene plan received");
        match &self.plan_view {
            PlanView::Structured(plan) => self.log.append_tagged(
                LogTag::Info,
                format_args!(
                    "Scene plan parsed: {} chapters, {} scenes, ~{}s total",
                    plan.chapter_count(),
                    plan.scene_count(),
                    plan.total_duration_seconds().round(),
                ),
            ),
            PlanView::RawText {
                reason: FallbackReason::NotJsonShaped,
                ..
            } => self.log.append_tagged(
                LogTag::Warn,
                "Scene plan is not JSON-shaped; showing raw text",
            ),
            PlanView::RawText {
                reason: FallbackReason::ParseError(detail),
                ..
            } => self.log.append_tagged(
                LogTag::Warn,
                format_args!("Scene plan parse error ({detail}); showing raw text"),
            ),
            PlanView::Waiting => {}
        }

        Some(SessionUpdate::PlanSettled)
    }

    fn settle_video(&mut self, url: String) -> Option<SessionUpdate> {
        if self.video_url.is_some() {
            tracing::warn!(job_id = %self.job_id, "Ignoring repeated video settlement");
            return None;
        }

        self.log
            .append_tagged(LogTag::Success, format_args!("Video ready: {url}"));
        self.video_url = Some(url);
        self.video_progress = ResourceProgress::Ready;
        Some(SessionUpdate::VideoSettled)
    }

    fn abandon(&mut self, kind: ResourceKind, attempts: u32) -> Option<SessionUpdate> {
        let progress = match kind {
            ResourceKind::Plan => &mut self.plan_progress,
            ResourceKind::Video => &mut self.video_progress,
        };
        if *progress != ResourceProgress::Pending {
            return None;
        }
        *progress = ResourceProgress::Unreachable;

        self.log.append_tagged(
            LogTag::Error,
            format_args!(
                "Job {} not found after {attempts} attempts; stopped polling {kind}",
                self.job_id,
            ),
        );
        Some(SessionUpdate::Abandoned(kind))
    }
}

impl Drop for TrackingSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
