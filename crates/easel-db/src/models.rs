use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Render status of a job.
///
/// `Rendering` and `InProgress` are both non-terminal worker states; the
/// render worker protocol historically reported either, so both are
/// accepted and treated equivalently by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RenderStatus {
    Queued,
    Rendering,
    InProgress,
    Done,
    Failed,
}

impl RenderStatus {
    /// Whether a job in this status can still change status (other than
    /// the operator `failed -> queued` requeue path).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for RenderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Rendering => "rendering",
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

impl FromStr for RenderStatus {
    type Err = RenderStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "rendering" => Ok(Self::Rendering),
            "in_progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            "failed" => Ok(Self::Failed),
            other => Err(RenderStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`RenderStatus`] string.
#[derive(Debug, Clone)]
pub struct RenderStatusParseError(pub String);

impl fmt::Display for RenderStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid render status: {:?}", self.0)
    }
}

impl std::error::Error for RenderStatusParseError {}

// ---------------------------------------------------------------------------
// Row structs
// ---------------------------------------------------------------------------

/// A render job -- one prompt committed for rendering by an external worker.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Job {
    pub id: Uuid,
    pub prompt: String,
    pub model: String,
    pub render_status: RenderStatus,
    /// Reference to the rendered artifact (object-store key or path).
    /// Set exactly once, when the job reaches `Done`.
    pub artifact_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_status_display_roundtrip() {
        let variants = [
            RenderStatus::Queued,
            RenderStatus::Rendering,
            RenderStatus::InProgress,
            RenderStatus::Done,
            RenderStatus::Failed,
        ];
        for v in &variants {
            let s = v.to_string();
            let parsed: RenderStatus = s.parse().expect("should parse");
            assert_eq!(*v, parsed);
        }
    }

    #[test]
    fn render_status_invalid() {
        let result = "bogus".parse::<RenderStatus>();
        assert!(result.is_err());
    }

    #[test]
    fn terminal_states() {
        assert!(RenderStatus::Done.is_terminal());
        assert!(RenderStatus::Failed.is_terminal());
        assert!(!RenderStatus::Queued.is_terminal());
        assert!(!RenderStatus::Rendering.is_terminal());
        assert!(!RenderStatus::InProgress.is_terminal());
    }

    #[test]
    fn render_status_serde_snake_case() {
        let json = serde_json::to_string(&RenderStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        let back: RenderStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, RenderStatus::InProgress);
    }
}
