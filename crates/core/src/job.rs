//! Job identity, prompt validation and derived lifecycle status.
//!
//! A [`Job`] is created once per user submission and never mutated
//! afterwards. Its lifecycle status is not stored anywhere; it is derived
//! on demand from the state of the two polled resources via
//! [`JobStatus::derive`].

use serde::Serialize;

use crate::error::CoreError;
use crate::types::JobId;

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// One user-initiated generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Job {
    pub id: JobId,
    /// The prompt text as submitted.
    pub prompt: String,
}

impl Job {
    pub fn new(id: JobId, prompt: impl Into<String>) -> Self {
        Self {
            id,
            prompt: prompt.into(),
        }
    }
}

/// Validate a prompt before submission and return its trimmed form.
///
/// Whitespace-only prompts are rejected.
pub fn validate_prompt(prompt: &str) -> Result<&str, CoreError> {
    let trimmed = prompt.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("prompt must not be empty".to_string()));
    }
    Ok(trimmed)
}

// ---------------------------------------------------------------------------
// Derived status
// ---------------------------------------------------------------------------

/// Observed terminal state of one polled resource, as far as status
/// derivation cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceProgress {
    /// Still waiting for the terminal field.
    Pending,
    /// The terminal field arrived.
    Ready,
    /// Polling gave up after repeated not-found responses.
    Unreachable,
}

/// Lifecycle status of a tracked job, derived from its two resources.
///
/// A job is `submitted` only until the backend returns its id; tracking
/// starts right after that, so the first tracked status is `AwaitingPlan`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Neither the plan nor the video is available yet.
    AwaitingPlan,
    /// The plan is available; the video is still rendering.
    PlanReady,
    /// The rendered video is available.
    VideoReady,
    /// A resource was abandoned because the backend does not know the job.
    Unreachable,
}

impl JobStatus {
    /// Derive the status from the plan and video resources.
    ///
    /// The two resources may settle in either order. A ready video wins
    /// over everything else since it is the final artifact; an abandoned
    /// resource otherwise marks the whole job unreachable.
    pub fn derive(plan: ResourceProgress, video: ResourceProgress) -> Self {
        use ResourceProgress::*;
        match (plan, video) {
            (_, Ready) => JobStatus::VideoReady,
            (Unreachable, _) | (_, Unreachable) => JobStatus::Unreachable,
            (Ready, Pending) => JobStatus::PlanReady,
            (Pending, Pending) => JobStatus::AwaitingPlan,
        }
    }

    /// Short badge label for display.
    pub fn label(self) -> &'static str {
        match self {
            JobStatus::AwaitingPlan => "Processing",
            JobStatus::PlanReady => "Rendering",
            JobStatus::VideoReady => "Completed",
            JobStatus::Unreachable => "Not Found",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
