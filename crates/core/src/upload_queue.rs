//! Offline upload queue: payload shapes, statuses and retry policy.
//!
//! Items are written by devices that were offline and replayed by the
//! worker through the same workflow entry points as online calls.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};
use crate::workflow::WorkflowAction;

pub const DEFAULT_MAX_ATTEMPTS: i32 = 5;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(3600);

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str_db(s: &str) -> Result<Self, CoreError> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(CoreError::Validation(format!(
                "Invalid upload status '{other}'. Must be one of: pending, processing, completed, failed"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    Measurement,
    Photo,
    Comment,
}

impl ResultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Measurement => "measurement",
            Self::Photo => "photo",
            Self::Comment => "comment",
        }
    }

    pub fn from_str_db(s: &str) -> Result<Self, CoreError> {
        match s {
            "measurement" => Ok(Self::Measurement),
            "photo" => Ok(Self::Photo),
            "comment" => Ok(Self::Comment),
            other => Err(CoreError::Validation(format!(
                "Invalid result kind '{other}'. Must be one of: measurement, photo, comment"
            ))),
        }
    }
}

/// A result recorded against a checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultInput {
    pub kind: ResultKind,
    pub value_numeric: Option<f64>,
    pub value_text: Option<String>,
    pub photo_url: Option<String>,
}

impl ResultInput {
    pub fn validate(&self) -> Result<(), CoreError> {
        let ok = match self.kind {
            ResultKind::Measurement => self.value_numeric.is_some_and(f64::is_finite),
            ResultKind::Photo => self.photo_url.as_deref().is_some_and(|u| !u.trim().is_empty()),
            ResultKind::Comment => self.value_text.as_deref().is_some_and(|t| !t.trim().is_empty()),
        };
        if ok {
            Ok(())
        } else {
            Err(CoreError::Validation(format!(
                "A {} result is missing its value",
                self.kind.as_str()
            )))
        }
    }
}

/// The deferred operation carried by a queue item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UploadPayload {
    RecordResult {
        checkpoint_id: DbId,
        result: ResultInput,
    },
    Transition {
        checkpoint_id: DbId,
        action: WorkflowAction,
        comment: Option<String>,
        assignee: Option<String>,
    },
}

impl UploadPayload {
    pub fn checkpoint_id(&self) -> DbId {
        match self {
            Self::RecordResult { checkpoint_id, .. } | Self::Transition { checkpoint_id, .. } => {
                *checkpoint_id
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: i32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

/// What to do with an item whose replay just failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAt(Timestamp),
    GiveUp,
}

impl RetryPolicy {
    /// Delay before retry number `attempts` (1-based count of failures so
    /// far): `base * 2^(attempts-1)`, capped at `max_delay`.
    pub fn backoff(&self, attempts: i32) -> Duration {
        let exp = attempts.saturating_sub(1).clamp(0, 20) as u32;
        self.base_delay
            .checked_mul(1u32 << exp)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    /// Decide after the `attempts`-th failed replay.
    pub fn decide(&self, attempts: i32, retryable: bool, now: Timestamp) -> RetryDecision {
        if !retryable || attempts >= self.max_attempts {
            return RetryDecision::GiveUp;
        }
        let delay = chrono::Duration::from_std(self.backoff(attempts))
            .unwrap_or_else(|_| chrono::Duration::seconds(self.max_delay.as_secs() as i64));
        RetryDecision::RetryAt(now + delay)
    }
}
