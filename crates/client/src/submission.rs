//! Job submission.
//!
//! [`Submitter`] sends one creation request per call and extracts the
//! job identifier from the response. It does not start polling; the
//! caller moves to a tracking context keyed by the returned id.
//!
//! A submitter carries its own busy flag so a view cannot fire a second
//! submission while one is still in flight.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use manimgen_core::job::validate_prompt;
use manimgen_core::types::JobId;
use serde_json::Value;

use crate::api::{ApiError, GenerationBackend};

/// Why a submission did not produce a job id.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// The prompt was empty after trimming; nothing was sent.
    #[error("Prompt must not be empty")]
    EmptyPrompt,

    /// Another submission from this submitter is still in flight.
    #[error("A submission is already in progress")]
    Busy,

    /// Network error or non-success status.
    #[error("Failed to reach the generation service: {0}")]
    TransportFailure(String),

    /// The service answered with success but without a usable job id.
    #[error("Invalid response from the generation service: {0}")]
    InvalidResponse(String),
}

impl From<ApiError> for SubmitError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::Decode(detail) => SubmitError::InvalidResponse(detail),
            other => SubmitError::TransportFailure(other.to_string()),
        }
    }
}

/// Sends prompts to the backend, one at a time.
pub struct Submitter {
    backend: Arc<dyn GenerationBackend>,
    busy: AtomicBool,
}

/// Clears the busy flag when the submission finishes or is dropped.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Submitter {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self {
            backend,
            busy: AtomicBool::new(false),
        }
    }

    /// Whether a submission is currently in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Submit `prompt` and return the server-assigned job id.
    ///
    /// The prompt is trimmed before sending. Fails with
    /// [`SubmitError::EmptyPrompt`] or [`SubmitError::Busy`] without
    /// touching the network; otherwise a failure is exactly one of
    /// [`SubmitError::TransportFailure`] or [`SubmitError::InvalidResponse`].
    pub async fn submit(&self, prompt: &str) -> Result<JobId, SubmitError> {
        let prompt = validate_prompt(prompt).map_err(|_| SubmitError::EmptyPrompt)?;

        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SubmitError::Busy);
        }
        let _guard = BusyGuard(&self.busy);

        let body = self.backend.create_job(prompt).await.map_err(|e| {
            tracing::warn!(error = %e, "Job submission failed");
            SubmitError::from(e)
        })?;

        let id = extract_job_id(&body)?;
        tracing::info!(job_id = %id, "Job submitted");
        Ok(id)
    }
}

/// Pull the `id` field out of a creation response.
fn extract_job_id(body: &Value) -> Result<JobId, SubmitError> {
    let raw = body
        .get("id")
        .ok_or_else(|| SubmitError::InvalidResponse("no job id in response".to_string()))?;

    let raw = raw
        .as_str()
        .ok_or_else(|| SubmitError::InvalidResponse(format!("job id is not a string: {raw}")))?;

    JobId::parse(raw).map_err(|_| SubmitError::InvalidResponse("job id is empty".to_string()))
}
