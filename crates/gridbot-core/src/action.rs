//! Atomic robot actions expanded from a command.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::robot::Pose;
use crate::types::{ActionKind, Direction, Status};

/// One atomic instruction with its own lifecycle.
///
/// Transitions: `Queued → Running → Completed | Failed`, or
/// `Queued → Withdrawn`.
///
/// The executor writes `Running` *before* applying the action. The resulting
/// pose is only filled in once the action reaches `Completed` or `Failed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub id: Uuid,
    pub command_id: Uuid,
    /// One-character action code (`L`, `R`, `F`, `B`).
    pub code: char,
    pub status: Status,
    pub x: Option<i64>,
    pub y: Option<i64>,
    pub direction: Option<Direction>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Store-assigned update counter. Orders actions by last update even
    /// when two updates share a clock tick.
    #[serde(default)]
    pub revision: u64,
}

impl Action {
    /// Create a new action in `Queued` state.
    pub fn new(command_id: Uuid, kind: ActionKind) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            command_id,
            code: kind.code(),
            status: Status::Queued,
            x: None,
            y: None,
            direction: None,
            created_at: now,
            updated_at: now,
            revision: 0,
        }
    }

    /// The recorded pose, present once the action is `Completed` or `Failed`.
    pub fn pose(&self) -> Option<Pose> {
        match (self.x, self.y, self.direction) {
            (Some(x), Some(y), Some(direction)) => Some(Pose { x, y, direction }),
            _ => None,
        }
    }

    pub fn set_pose(&mut self, pose: Pose) {
        self.x = Some(pose.x);
        self.y = Some(pose.y);
        self.direction = Some(pose.direction);
    }
}
