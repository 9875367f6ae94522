use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::config::MAX_ORIGINATOR_LEN;
use crate::error::{Result, SyncError};

/// Correlation token for one browser tab.
///
/// Pages embed it; the tab sends it back as `?originator=` when opening its
/// event stream and as `X-Originator-ID` on mutations, so its own changes are
/// not echoed back over the stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OriginatorId(String);

impl OriginatorId {
    /// Fresh id for a page load, e.g. `page-6f1c…`.
    pub fn generate(prefix: &str) -> Self {
        Self(format!("{}-{}", prefix, Uuid::new_v4().simple()))
    }

    /// Validate a client-supplied id. Must be non-empty after trimming, at
    /// most [`MAX_ORIGINATOR_LEN`] bytes and free of control characters.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SyncError::InvalidInput("originator id is empty".into()));
        }
        if trimmed.len() > MAX_ORIGINATOR_LEN {
            return Err(SyncError::InvalidInput(format!(
                "originator id longer than {MAX_ORIGINATOR_LEN} bytes"
            )));
        }
        if trimmed.chars().any(char::is_control) {
            return Err(SyncError::InvalidInput(
                "originator id contains control characters".into(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for OriginatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
