//! The "process" job: drain queued actions through the robot.
//!
//! One pass applies every `Queued` action in creation order against a robot
//! seeded from the derived state. Each transition is committed before the
//! next step, so an interrupted pass can always be resumed from the store:
//!
//! 1. `Queued → Running`, committed before the robot moves.
//! 2. On success, `Running → Completed` with the new pose.
//! 3. On an obstacle, the edge of the coordinate range or an unknown code,
//!    `Running → Failed` with the unchanged pose. The same commit withdraws
//!    every still-queued action and command, and the pass ends.

use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::RobotConfig;
use crate::db::RobotDb;
use crate::error::Result;
use crate::status::current_status;
use crate::types::ActionKind;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcessReport {
    /// Interrupted `Running` actions put back in the queue before the pass.
    pub recovered: usize,
    pub completed: usize,
    /// The action that hit an obstacle or carried an unknown code.
    pub failed: Option<Uuid>,
    pub withdrawn_actions: usize,
    pub withdrawn_commands: usize,
}

/// Run one executor pass.
///
/// Robot failures end in the cascade and return `Ok`. Store failures abort
/// the pass with `Err`, leaving every already-committed transition in place
/// for the next pass to resume from.
pub fn process_actions(db: &RobotDb, robot_cfg: &RobotConfig) -> Result<ProcessReport> {
    info!("processing queued actions");
    let mut report = ProcessReport {
        recovered: db.recover_interrupted()?,
        ..ProcessReport::default()
    };
    if report.recovered > 0 {
        warn!(count = report.recovered, "re-queued actions interrupted mid-run");
    }

    let start = current_status(db, robot_cfg)?.pose();
    let mut robot = robot_cfg.robot_at(start);

    for action in db.queued_actions()? {
        db.mark_running(action.id)?;

        let outcome =
            ActionKind::from_code(action.code).and_then(|kind| robot.apply(kind).map(|()| kind));
        match outcome {
            Ok(kind) => {
                db.record_completed(action.id, robot.pose())?;
                report.completed += 1;
                info!(action_id = %action.id, kind = %kind, pose = ?robot.pose(), "action completed");
            }
            Err(e) => {
                error!(
                    action_id = %action.id,
                    command_id = %action.command_id,
                    error = %e,
                    "action failed, withdrawing queued work"
                );
                let (actions, commands) = db.record_failure(action.id, robot.pose())?;
                report.failed = Some(action.id);
                report.withdrawn_actions = actions;
                report.withdrawn_commands = commands;
                info!(actions, commands, "queued work withdrawn");
                break;
            }
        }
    }

    info!(completed = report.completed, "finished processing queued actions");
    Ok(report)
}
