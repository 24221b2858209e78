//! User-submitted command strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{GridbotError, Result};
use crate::types::{ActionKind, Status};

/// A raw instruction string queued for the robot, e.g. `"FFRB"`.
///
/// A command never runs itself. The parser expands it into one `Action`
/// per character and flips it to `Completed`; a failure cascade may flip a
/// still-queued command to `Withdrawn` instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub id: Uuid,
    pub text: String,
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Command {
    /// Create a new command in `Queued` state.
    pub fn new(text: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            status: Status::Queued,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check a submission before it is queued.
    ///
    /// Only the four action codes are accepted, and at least one is required.
    pub fn validate_text(text: &str) -> Result<()> {
        if text.is_empty() {
            return Err(GridbotError::InvalidCommand(
                "command must contain at least one action".into(),
            ));
        }
        if let Some((index, found)) = text
            .chars()
            .enumerate()
            .find(|(_, c)| ActionKind::from_code(*c).is_err())
        {
            return Err(GridbotError::InvalidCommand(format!(
                "unknown action code {found:?} at position {index}: expected only F, B, L, R"
            )));
        }
        Ok(())
    }
}
