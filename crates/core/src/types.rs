use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Event log timestamps are captured in local time.
pub type Timestamp = chrono::DateTime<chrono::Local>;

/// Number of characters kept by [`JobId::short`].
const SHORT_ID_LEN: usize = 8;

/// Server-assigned, opaque identifier of a generation job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Wrap a raw identifier. Surrounding whitespace is stripped; an empty
    /// identifier is rejected.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CoreError::Validation("job id must not be empty".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compact form for headers and sidebars, e.g. `65a1f0c2...`.
    ///
    /// Identifiers no longer than the preview are returned unchanged.
    pub fn short(&self) -> String {
        match self.0.char_indices().nth(SHORT_ID_LEN) {
            Some((cut, _)) => format!("{}...", &self.0[..cut]),
            None => self.0.clone(),
        }
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
