//! Derived robot state.
//!
//! The robot is never stored as a record of its own. Its pose, status and
//! current command are recomputed on every read from the most recently
//! updated `Running`, `Completed` or `Failed` action.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::RobotConfig;
use crate::db::RobotDb;
use crate::error::Result;
use crate::robot::Pose;
use crate::types::{Direction, Status};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotStatus {
    pub x: i64,
    pub y: i64,
    pub direction: Direction,
    pub status: Status,
    pub command_id: Option<Uuid>,
}

impl RobotStatus {
    pub fn pose(&self) -> Pose {
        Pose::new(self.x, self.y, self.direction)
    }
}

/// Compute the robot's current state from durable history.
///
/// With no active action the robot sits at the configured start with status
/// `Completed` and no command. A `Running` action has no pose yet, so the
/// pose comes from the last action that recorded one.
pub fn current_status(db: &RobotDb, robot: &RobotConfig) -> Result<RobotStatus> {
    let Some(latest) = db.latest_active()? else {
        return Ok(at(robot.start_pose(), Status::Completed, None));
    };

    let pose = match latest.pose() {
        Some(pose) => pose,
        None => db
            .latest_positioned()?
            .and_then(|a| a.pose())
            .unwrap_or_else(|| robot.start_pose()),
    };
    Ok(at(pose, latest.status, Some(latest.command_id)))
}

fn at(pose: Pose, status: Status, command_id: Option<Uuid>) -> RobotStatus {
    RobotStatus {
        x: pose.x,
        y: pose.y,
        direction: pose.direction,
        status,
        command_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use crate::parser::expand;
    use tempfile::TempDir;

    fn open_tmp() -> (TempDir, RobotDb) {
        let dir = TempDir::new().unwrap();
        let db = RobotDb::open(&dir.path().join("status.redb")).unwrap();
        (dir, db)
    }

    #[test]
    fn fresh_store_reports_start_position() {
        let (_dir, db) = open_tmp();
        let status = current_status(&db, &RobotConfig::default()).unwrap();
        assert_eq!(
            status,
            RobotStatus {
                x: 4,
                y: 2,
                direction: Direction::West,
                status: Status::Completed,
                command_id: None,
            }
        );
    }

    #[test]
    fn queued_work_does_not_change_status() {
        let (_dir, db) = open_tmp();
        let cmd = Command::new("FF");
        db.insert_command(&cmd).unwrap();
        let actions = expand(&cmd).unwrap();
        db.commit_expansion(cmd.id, &actions).unwrap();

        let status = current_status(&db, &RobotConfig::default()).unwrap();
        assert_eq!(status.status, Status::Completed);
        assert_eq!(status.command_id, None);
    }

    #[test]
    fn running_action_keeps_last_recorded_pose() {
        let (_dir, db) = open_tmp();
        let cmd = Command::new("FF");
        db.insert_command(&cmd).unwrap();
        let actions = expand(&cmd).unwrap();
        db.commit_expansion(cmd.id, &actions).unwrap();

        db.mark_running(actions[0].id).unwrap();
        db.record_completed(actions[0].id, Pose::new(3, 2, Direction::West))
            .unwrap();
        db.mark_running(actions[1].id).unwrap();

        let status = current_status(&db, &RobotConfig::default()).unwrap();
        assert_eq!(status.status, Status::Running);
        assert_eq!(status.pose(), Pose::new(3, 2, Direction::West));
        assert_eq!(status.command_id, Some(cmd.id));
    }

    #[test]
    fn status_serializes_with_letter_direction() {
        let status = at(Pose::new(0, 2, Direction::West), Status::Completed, None);
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["direction"], "W");
        assert_eq!(json["status"], "COMPLETED");
        assert!(json["command_id"].is_null());
    }
}
