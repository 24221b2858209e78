//! The "parse" job: expand queued command strings into actions.

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::action::Action;
use crate::command::Command;
use crate::db::RobotDb;
use crate::error::{GridbotError, Result};
use crate::types::{ActionKind, Status};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParseReport {
    pub commands_parsed: usize,
    pub actions_created: usize,
}

/// Turn a command into one queued action per character, left to right.
///
/// Stops at the first character outside the alphabet; nothing is written
/// by this function, so a bad string never yields a partial expansion.
pub fn expand(command: &Command) -> Result<Vec<Action>> {
    command
        .text
        .chars()
        .enumerate()
        .map(|(index, found)| {
            ActionKind::from_code(found)
                .map(|kind| Action::new(command.id, kind))
                .map_err(|_| GridbotError::Parse {
                    command_id: command.id,
                    index,
                    found,
                })
        })
        .collect()
}

/// Expand every `Queued` command, oldest first.
///
/// Each command's actions and its flip to `Completed` are committed
/// together. A command with an unknown character is withdrawn on its own
/// and the run stops with the parse error; commands behind it wait for the
/// next run.
pub fn parse_commands(db: &RobotDb) -> Result<ParseReport> {
    info!("parsing queued commands");
    let mut report = ParseReport::default();

    for command in db.queued_commands()? {
        let actions = match expand(&command) {
            Ok(actions) => actions,
            Err(e) => {
                error!(command_id = %command.id, error = %e, "command rejected");
                withdraw_rejected(db, &command)?;
                return Err(e);
            }
        };

        match db.commit_expansion(command.id, &actions) {
            Ok(()) => {}
            // Withdrawn by an executor cascade after we listed it.
            Err(GridbotError::InvalidTransition { from, .. }) => {
                warn!(command_id = %command.id, status = %from, "command no longer queued, skipping");
                continue;
            }
            Err(e) => return Err(e),
        }

        debug!(command_id = %command.id, actions = actions.len(), "parsed command");
        report.commands_parsed += 1;
        report.actions_created += actions.len();
    }

    info!(
        commands = report.commands_parsed,
        actions = report.actions_created,
        "finished parsing queued commands"
    );
    Ok(report)
}

fn withdraw_rejected(db: &RobotDb, command: &Command) -> Result<()> {
    match db.set_command_status(command.id, Status::Withdrawn) {
        Ok(_) | Err(GridbotError::InvalidTransition { .. }) => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_tmp() -> (TempDir, RobotDb) {
        let dir = TempDir::new().unwrap();
        let db = RobotDb::open(&dir.path().join("parser.redb")).unwrap();
        (dir, db)
    }

    fn queue(db: &RobotDb, text: &str) -> Command {
        let cmd = Command::new(text);
        db.insert_command(&cmd).unwrap();
        cmd
    }

    #[test]
    fn expand_keeps_order_and_owner() {
        let cmd = Command::new("LFRB");
        let actions = expand(&cmd).unwrap();
        let codes: String = actions.iter().map(|a| a.code).collect();
        assert_eq!(codes, "LFRB");
        assert!(actions.iter().all(|a| a.command_id == cmd.id));
        assert!(actions.iter().all(|a| a.status == Status::Queued));
        assert!(actions.iter().all(|a| a.pose().is_none()));
    }

    #[test]
    fn expand_reports_first_bad_character() {
        let cmd = Command::new("FFqF");
        match expand(&cmd) {
            Err(GridbotError::Parse {
                command_id,
                index,
                found,
            }) => {
                assert_eq!(command_id, cmd.id);
                assert_eq!(index, 2);
                assert_eq!(found, 'q');
            }
            other => panic!("expected Parse error, got {other:?}"),
        }
    }

    #[test]
    fn parse_yields_one_action_per_character() {
        let (_dir, db) = open_tmp();
        let first = queue(&db, "FFFRFF");
        let second = queue(&db, "LB");

        let report = parse_commands(&db).unwrap();
        assert_eq!(
            report,
            ParseReport {
                commands_parsed: 2,
                actions_created: 8
            }
        );

        let actions = db.queued_actions().unwrap();
        let codes: String = actions.iter().map(|a| a.code).collect();
        assert_eq!(codes, "FFFRFFLB");
        assert!(actions[..6].iter().all(|a| a.command_id == first.id));
        assert!(actions[6..].iter().all(|a| a.command_id == second.id));
        assert_eq!(db.get_command(first.id).unwrap().status, Status::Completed);
        assert_eq!(db.get_command(second.id).unwrap().status, Status::Completed);
    }

    #[test]
    fn rerun_is_a_no_op() {
        let (_dir, db) = open_tmp();
        queue(&db, "FF");
        parse_commands(&db).unwrap();

        let report = parse_commands(&db).unwrap();
        assert_eq!(report, ParseReport::default());
        assert_eq!(db.list_actions().unwrap().len(), 2);
    }

    #[test]
    fn bad_command_is_withdrawn_and_stops_the_run() {
        let (_dir, db) = open_tmp();
        let good = queue(&db, "F");
        let bad = queue(&db, "FX");
        let later = queue(&db, "L");

        let err = parse_commands(&db).unwrap_err();
        assert!(matches!(err, GridbotError::Parse { index: 1, .. }));

        assert_eq!(db.get_command(good.id).unwrap().status, Status::Completed);
        assert_eq!(db.get_command(bad.id).unwrap().status, Status::Withdrawn);
        assert!(db.actions_for_command(bad.id).unwrap().is_empty());
        assert_eq!(db.get_command(later.id).unwrap().status, Status::Queued);

        // The next run picks up where this one stopped.
        let report = parse_commands(&db).unwrap();
        assert_eq!(report.commands_parsed, 1);
        assert_eq!(db.get_command(later.id).unwrap().status, Status::Completed);
    }
}
