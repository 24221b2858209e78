//! Durable storage for commands and actions using redb.
//!
//! # Table design
//!
//! `COMMANDS` and `ACTIONS` both use a 24-byte composite key:
//! ```text
//! [ sequence: u64 big-endian (8 bytes) | uuid: 16 bytes ]
//! ```
//!
//! The sequence is a store-wide counter bumped on every insert, so byte
//! ordering equals creation ordering. A plain iteration returns rows in the
//! order they were queued, including actions created within the same clock
//! tick. `COMMAND_KEYS` / `ACTION_KEYS` map a uuid back to its composite key.
//!
//! Secondary indexes keep the hot reads bounded by the rows they return
//! rather than by the size of the history:
//!
//! - `COMMAND_STATUS` / `ACTION_STATUS` are keyed `[status tag | composite
//!   key]`, so a prefix range yields every row in one status in creation
//!   order.
//! - `ACTIVE_ACTIONS` maps the revision of every `Running`, `Completed` or
//!   `Failed` action to its composite key; its last entry is the action the
//!   derived robot state is computed from.
//!
//! Every write bumps a `revision` counter stored in `META`; actions carry the
//! revision of their last update, which totally orders them by "most
//! recently updated".
//!
//! Every public write method is one redb write transaction committed before
//! it returns, and row writes go through [`ActionTables`] / [`CommandTables`]
//! so the indexes never drift from the rows.

use std::path::Path;

use chrono::Utc;
use redb::{Database, ReadableTable, Table, TableDefinition, WriteTransaction};
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use crate::action::Action;
use crate::command::Command;
use crate::error::{GridbotError, Result};
use crate::robot::Pose;
use crate::types::Status;

// ---------------------------------------------------------------------------
// Table definitions
// ---------------------------------------------------------------------------

/// Key: 24-byte composite (sequence big-endian ++ uuid bytes)
/// Value: JSON-encoded Command
const COMMANDS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("commands");

/// Key: 24-byte composite (sequence big-endian ++ uuid bytes)
/// Value: JSON-encoded Action
const ACTIONS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("actions");

/// Key: uuid bytes, value: composite key in `COMMANDS`
const COMMAND_KEYS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("command_keys");

/// Key: uuid bytes, value: composite key in `ACTIONS`
const ACTION_KEYS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("action_keys");

/// Key: status tag ++ composite key in `COMMANDS`
const COMMAND_STATUS: TableDefinition<&[u8], ()> = TableDefinition::new("command_status");

/// Key: status tag ++ composite key in `ACTIONS`
const ACTION_STATUS: TableDefinition<&[u8], ()> = TableDefinition::new("action_status");

/// Key: revision of an active action, value: composite key in `ACTIONS`
const ACTIVE_ACTIONS: TableDefinition<u64, &[u8]> = TableDefinition::new("active_actions");

const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

const SEQUENCE: &str = "sequence";
const REVISION: &str = "revision";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

type Rows<'txn> = Table<'txn, &'static [u8], &'static [u8]>;
type StatusIndex<'txn> = Table<'txn, &'static [u8], ()>;

fn store_err(e: impl std::fmt::Display) -> GridbotError {
    GridbotError::Store(e.to_string())
}

fn row_key(seq: u64, id: Uuid) -> [u8; 24] {
    let mut key = [0u8; 24];
    key[..8].copy_from_slice(&seq.to_be_bytes());
    key[8..].copy_from_slice(id.as_bytes());
    key
}

fn status_tag(status: Status) -> u8 {
    match status {
        Status::Queued => 0,
        Status::Running => 1,
        Status::Completed => 2,
        Status::Failed => 3,
        Status::Withdrawn => 4,
    }
}

fn status_key(status: Status, key: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(key.len() + 1);
    out.push(status_tag(status));
    out.extend_from_slice(key);
    out
}

/// Increment a `META` counter and return its new value.
fn bump(meta: &mut Table<'_, &'static str, u64>, counter: &str) -> Result<u64> {
    let current = meta
        .get(counter)
        .map_err(store_err)?
        .map(|v| v.value())
        .unwrap_or(0);
    let next = current + 1;
    meta.insert(counter, next).map_err(store_err)?;
    Ok(next)
}

fn put<T: Serialize>(table: &mut Rows<'_>, key: &[u8], row: &T) -> Result<()> {
    let value = serde_json::to_vec(row)?;
    table.insert(key, value.as_slice()).map_err(store_err)?;
    Ok(())
}

/// Move `key` from `old` to `new` in a status index. `old` is `None` for a
/// fresh row.
fn reindex(index: &mut StatusIndex<'_>, key: &[u8], old: Option<Status>, new: Status) -> Result<()> {
    if let Some(old) = old {
        index
            .remove(status_key(old, key).as_slice())
            .map_err(store_err)?;
    }
    index
        .insert(status_key(new, key).as_slice(), ())
        .map_err(store_err)?;
    Ok(())
}

fn lookup_key(
    index: &impl ReadableTable<&'static [u8], &'static [u8]>,
    id: Uuid,
) -> Result<Option<Vec<u8>>> {
    Ok(index
        .get(id.as_bytes().as_slice())
        .map_err(store_err)?
        .map(|v| v.value().to_vec()))
}

fn read_row<T: DeserializeOwned>(
    table: &impl ReadableTable<&'static [u8], &'static [u8]>,
    key: &[u8],
) -> Result<Option<T>> {
    match table.get(key).map_err(store_err)? {
        Some(v) => Ok(Some(serde_json::from_slice(v.value())?)),
        None => Ok(None),
    }
}

/// All rows in key (creation) order, paired with their keys.
fn scan<T: DeserializeOwned>(
    table: &impl ReadableTable<&'static [u8], &'static [u8]>,
) -> Result<Vec<(Vec<u8>, T)>> {
    let mut rows = Vec::new();
    for entry in table.iter().map_err(store_err)? {
        let (k, v) = entry.map_err(store_err)?;
        let row: T = serde_json::from_slice(v.value())?;
        rows.push((k.value().to_vec(), row));
    }
    Ok(rows)
}

/// Rows currently in `status`, in creation order, via the status index.
fn rows_with_status<T: DeserializeOwned>(
    rows: &impl ReadableTable<&'static [u8], &'static [u8]>,
    index: &impl ReadableTable<&'static [u8], ()>,
    status: Status,
) -> Result<Vec<(Vec<u8>, T)>> {
    let lower = [status_tag(status)];
    let upper = [status_tag(status) + 1];
    let mut found = Vec::new();
    for entry in index
        .range(lower.as_slice()..upper.as_slice())
        .map_err(store_err)?
    {
        let (k, _) = entry.map_err(store_err)?;
        let key = k.value()[1..].to_vec();
        let row = read_row(rows, &key)?
            .ok_or_else(|| GridbotError::Store("status index points at a missing row".into()))?;
        found.push((key, row));
    }
    Ok(found)
}

// ---------------------------------------------------------------------------
// Write-side table groups
// ---------------------------------------------------------------------------

/// The command tables of one write transaction.
struct CommandTables<'txn> {
    rows: Rows<'txn>,
    ids: Rows<'txn>,
    by_status: StatusIndex<'txn>,
}

impl<'txn> CommandTables<'txn> {
    fn open(wt: &'txn WriteTransaction) -> Result<Self> {
        Ok(Self {
            rows: wt.open_table(COMMANDS).map_err(store_err)?,
            ids: wt.open_table(COMMAND_KEYS).map_err(store_err)?,
            by_status: wt.open_table(COMMAND_STATUS).map_err(store_err)?,
        })
    }

    fn find(&self, id: Uuid) -> Result<(Vec<u8>, Command)> {
        let key = lookup_key(&self.ids, id)?.ok_or(GridbotError::CommandNotFound(id))?;
        let command = read_row(&self.rows, &key)?.ok_or(GridbotError::CommandNotFound(id))?;
        Ok((key, command))
    }

    fn queued(&self) -> Result<Vec<(Vec<u8>, Command)>> {
        rows_with_status(&self.rows, &self.by_status, Status::Queued)
    }

    fn write(&mut self, key: &[u8], previous: Option<&Command>, command: &Command) -> Result<()> {
        if previous.is_none() {
            self.ids
                .insert(command.id.as_bytes().as_slice(), key)
                .map_err(store_err)?;
        }
        reindex(
            &mut self.by_status,
            key,
            previous.map(|c| c.status),
            command.status,
        )?;
        put(&mut self.rows, key, command)
    }

    fn delete(&mut self, key: &[u8], command: &Command) -> Result<()> {
        self.rows.remove(key).map_err(store_err)?;
        self.ids
            .remove(command.id.as_bytes().as_slice())
            .map_err(store_err)?;
        self.by_status
            .remove(status_key(command.status, key).as_slice())
            .map_err(store_err)?;
        Ok(())
    }
}

/// The action tables of one write transaction.
struct ActionTables<'txn> {
    rows: Rows<'txn>,
    ids: Rows<'txn>,
    by_status: StatusIndex<'txn>,
    active: Table<'txn, u64, &'static [u8]>,
}

impl<'txn> ActionTables<'txn> {
    fn open(wt: &'txn WriteTransaction) -> Result<Self> {
        Ok(Self {
            rows: wt.open_table(ACTIONS).map_err(store_err)?,
            ids: wt.open_table(ACTION_KEYS).map_err(store_err)?,
            by_status: wt.open_table(ACTION_STATUS).map_err(store_err)?,
            active: wt.open_table(ACTIVE_ACTIONS).map_err(store_err)?,
        })
    }

    fn find(&self, id: Uuid) -> Result<(Vec<u8>, Action)> {
        let key = lookup_key(&self.ids, id)?.ok_or(GridbotError::ActionNotFound(id))?;
        let action = read_row(&self.rows, &key)?.ok_or(GridbotError::ActionNotFound(id))?;
        Ok((key, action))
    }

    fn with_status(&self, status: Status) -> Result<Vec<(Vec<u8>, Action)>> {
        rows_with_status(&self.rows, &self.by_status, status)
    }

    fn write(&mut self, key: &[u8], previous: Option<&Action>, action: &Action) -> Result<()> {
        match previous {
            Some(prev) if prev.status.is_active() => {
                self.active.remove(prev.revision).map_err(store_err)?;
            }
            Some(_) => {}
            None => {
                self.ids
                    .insert(action.id.as_bytes().as_slice(), key)
                    .map_err(store_err)?;
            }
        }
        reindex(
            &mut self.by_status,
            key,
            previous.map(|a| a.status),
            action.status,
        )?;
        if action.status.is_active() {
            self.active.insert(action.revision, key).map_err(store_err)?;
        }
        put(&mut self.rows, key, action)
    }

    fn delete(&mut self, key: &[u8], action: &Action) -> Result<()> {
        self.rows.remove(key).map_err(store_err)?;
        self.ids
            .remove(action.id.as_bytes().as_slice())
            .map_err(store_err)?;
        self.by_status
            .remove(status_key(action.status, key).as_slice())
            .map_err(store_err)?;
        if action.status.is_active() {
            self.active.remove(action.revision).map_err(store_err)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RobotDb
// ---------------------------------------------------------------------------

/// Persistent store for `Command` and `Action` records.
pub struct RobotDb {
    db: Database,
}

impl RobotDb {
    /// Open or create the redb database at `path`.
    ///
    /// Creates every table if it doesn't already exist.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path).map_err(store_err)?;
        // Ensure the tables exist before any reads
        let wt = db.begin_write().map_err(store_err)?;
        CommandTables::open(&wt)?;
        ActionTables::open(&wt)?;
        wt.open_table(META).map_err(store_err)?;
        wt.commit().map_err(store_err)?;
        Ok(Self { db })
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Queue a new command.
    pub fn insert_command(&self, command: &Command) -> Result<()> {
        let wt = self.db.begin_write().map_err(store_err)?;
        {
            let mut meta = wt.open_table(META).map_err(store_err)?;
            let mut commands = CommandTables::open(&wt)?;

            let key = row_key(bump(&mut meta, SEQUENCE)?, command.id);
            bump(&mut meta, REVISION)?;
            commands.write(&key, None, command)?;
        }
        wt.commit().map_err(store_err)?;
        Ok(())
    }

    pub fn get_command(&self, id: Uuid) -> Result<Command> {
        let rt = self.db.begin_read().map_err(store_err)?;
        let index = rt.open_table(COMMAND_KEYS).map_err(store_err)?;
        let table = rt.open_table(COMMANDS).map_err(store_err)?;
        let key = lookup_key(&index, id)?.ok_or(GridbotError::CommandNotFound(id))?;
        read_row(&table, &key)?.ok_or(GridbotError::CommandNotFound(id))
    }

    /// All `Queued` commands, oldest first.
    pub fn queued_commands(&self) -> Result<Vec<Command>> {
        let rt = self.db.begin_read().map_err(store_err)?;
        let table = rt.open_table(COMMANDS).map_err(store_err)?;
        let index = rt.open_table(COMMAND_STATUS).map_err(store_err)?;
        Ok(rows_with_status::<Command>(&table, &index, Status::Queued)?
            .into_iter()
            .map(|(_, c)| c)
            .collect())
    }

    /// All commands, oldest first.
    pub fn list_commands(&self) -> Result<Vec<Command>> {
        let rt = self.db.begin_read().map_err(store_err)?;
        let table = rt.open_table(COMMANDS).map_err(store_err)?;
        Ok(scan::<Command>(&table)?.into_iter().map(|(_, c)| c).collect())
    }

    /// Move a `Queued` command to `status`.
    pub fn set_command_status(&self, id: Uuid, status: Status) -> Result<Command> {
        let wt = self.db.begin_write().map_err(store_err)?;
        let command = {
            let mut meta = wt.open_table(META).map_err(store_err)?;
            let mut commands = CommandTables::open(&wt)?;

            let (key, previous) = commands.find(id)?;
            if previous.status != Status::Queued {
                return Err(GridbotError::InvalidTransition {
                    id,
                    from: previous.status,
                    to: status,
                });
            }
            let mut command = previous.clone();
            command.status = status;
            command.updated_at = Utc::now();
            bump(&mut meta, REVISION)?;
            commands.write(&key, Some(&previous), &command)?;
            command
        };
        wt.commit().map_err(store_err)?;
        Ok(command)
    }

    /// Append a command's actions and flip the command to `Completed` in a
    /// single transaction.
    ///
    /// Either both land or neither does, so a command can never be expanded
    /// twice. Fails with `InvalidTransition` if the command is no longer
    /// `Queued`.
    pub fn commit_expansion(&self, command_id: Uuid, actions: &[Action]) -> Result<()> {
        let wt = self.db.begin_write().map_err(store_err)?;
        {
            let mut meta = wt.open_table(META).map_err(store_err)?;
            let mut commands = CommandTables::open(&wt)?;
            let mut table = ActionTables::open(&wt)?;

            let (command_key, previous) = commands.find(command_id)?;
            if previous.status != Status::Queued {
                return Err(GridbotError::InvalidTransition {
                    id: command_id,
                    from: previous.status,
                    to: Status::Completed,
                });
            }

            for action in actions {
                let key = row_key(bump(&mut meta, SEQUENCE)?, action.id);
                let mut action = action.clone();
                action.command_id = command_id;
                action.status = Status::Queued;
                action.revision = bump(&mut meta, REVISION)?;
                table.write(&key, None, &action)?;
            }

            let mut command = previous.clone();
            command.status = Status::Completed;
            command.updated_at = Utc::now();
            bump(&mut meta, REVISION)?;
            commands.write(&command_key, Some(&previous), &command)?;
        }
        wt.commit().map_err(store_err)?;
        Ok(())
    }

    /// Delete a command together with all of its actions.
    ///
    /// Returns the number of actions removed.
    pub fn delete_command(&self, id: Uuid) -> Result<usize> {
        let wt = self.db.begin_write().map_err(store_err)?;
        let removed = {
            let mut commands = CommandTables::open(&wt)?;
            let mut table = ActionTables::open(&wt)?;

            let (key, command) = commands.find(id)?;
            commands.delete(&key, &command)?;

            let owned: Vec<(Vec<u8>, Action)> = scan::<Action>(&table.rows)?
                .into_iter()
                .filter(|(_, a)| a.command_id == id)
                .collect();
            for (key, action) in &owned {
                table.delete(key, action)?;
            }
            owned.len()
        };
        wt.commit().map_err(store_err)?;
        Ok(removed)
    }

    // -----------------------------------------------------------------------
    // Actions
    // -----------------------------------------------------------------------

    /// All actions, in creation order.
    pub fn list_actions(&self) -> Result<Vec<Action>> {
        let rt = self.db.begin_read().map_err(store_err)?;
        let table = rt.open_table(ACTIONS).map_err(store_err)?;
        Ok(scan::<Action>(&table)?.into_iter().map(|(_, a)| a).collect())
    }

    /// All `Queued` actions, in creation order.
    pub fn queued_actions(&self) -> Result<Vec<Action>> {
        let rt = self.db.begin_read().map_err(store_err)?;
        let table = rt.open_table(ACTIONS).map_err(store_err)?;
        let index = rt.open_table(ACTION_STATUS).map_err(store_err)?;
        Ok(rows_with_status::<Action>(&table, &index, Status::Queued)?
            .into_iter()
            .map(|(_, a)| a)
            .collect())
    }

    /// Actions expanded from `command_id`, in creation order.
    pub fn actions_for_command(&self, command_id: Uuid) -> Result<Vec<Action>> {
        Ok(self
            .list_actions()?
            .into_iter()
            .filter(|a| a.command_id == command_id)
            .collect())
    }

    /// The most recently updated action that is `Running`, `Completed` or
    /// `Failed`.
    pub fn latest_active(&self) -> Result<Option<Action>> {
        let rt = self.db.begin_read().map_err(store_err)?;
        let table = rt.open_table(ACTIONS).map_err(store_err)?;
        let active = rt.open_table(ACTIVE_ACTIONS).map_err(store_err)?;
        let result = match active.last().map_err(store_err)? {
            Some((_, key)) => read_row(&table, key.value()),
            None => Ok(None),
        };
        result
    }

    /// The most recently updated action that recorded a pose.
    ///
    /// Walks the active index from the newest end; only a `Running` action
    /// lacks a pose, so this stops within the first two entries.
    pub fn latest_positioned(&self) -> Result<Option<Action>> {
        let rt = self.db.begin_read().map_err(store_err)?;
        let table = rt.open_table(ACTIONS).map_err(store_err)?;
        let active = rt.open_table(ACTIVE_ACTIONS).map_err(store_err)?;
        for entry in active.iter().map_err(store_err)?.rev() {
            let (_, key) = entry.map_err(store_err)?;
            if let Some(action) = read_row::<Action>(&table, key.value())? {
                if action.pose().is_some() {
                    return Ok(Some(action));
                }
            }
        }
        Ok(None)
    }

    /// `Queued → Running`.
    pub fn mark_running(&self, id: Uuid) -> Result<Action> {
        self.update_action(id, |action| {
            if action.status != Status::Queued {
                return Err(GridbotError::InvalidTransition {
                    id,
                    from: action.status,
                    to: Status::Running,
                });
            }
            action.status = Status::Running;
            Ok(())
        })
    }

    /// `Running → Completed`, recording the pose after the move.
    pub fn record_completed(&self, id: Uuid, pose: Pose) -> Result<Action> {
        self.update_action(id, |action| {
            if action.status != Status::Running {
                return Err(GridbotError::InvalidTransition {
                    id,
                    from: action.status,
                    to: Status::Completed,
                });
            }
            action.status = Status::Completed;
            action.set_pose(pose);
            Ok(())
        })
    }

    /// `Running → Failed` plus the cascade, in one transaction.
    ///
    /// Records the unchanged `pose` on the failed action, then withdraws
    /// every `Queued` action and every `Queued` command. No reader or later
    /// pass can observe the failure without the withdrawal. Returns
    /// `(actions_withdrawn, commands_withdrawn)`.
    pub fn record_failure(&self, id: Uuid, pose: Pose) -> Result<(usize, usize)> {
        let wt = self.db.begin_write().map_err(store_err)?;
        let counts = {
            let mut meta = wt.open_table(META).map_err(store_err)?;
            let mut actions = ActionTables::open(&wt)?;
            let mut commands = CommandTables::open(&wt)?;
            let now = Utc::now();

            let (key, previous) = actions.find(id)?;
            if previous.status != Status::Running {
                return Err(GridbotError::InvalidTransition {
                    id,
                    from: previous.status,
                    to: Status::Failed,
                });
            }
            let mut failed = previous.clone();
            failed.status = Status::Failed;
            failed.set_pose(pose);
            failed.updated_at = now;
            failed.revision = bump(&mut meta, REVISION)?;
            actions.write(&key, Some(&previous), &failed)?;

            let queued_actions = actions.with_status(Status::Queued)?;
            for (key, previous) in &queued_actions {
                let mut action = previous.clone();
                action.status = Status::Withdrawn;
                action.updated_at = now;
                action.revision = bump(&mut meta, REVISION)?;
                actions.write(key, Some(previous), &action)?;
            }

            let queued_commands = commands.queued()?;
            for (key, previous) in &queued_commands {
                let mut command = previous.clone();
                command.status = Status::Withdrawn;
                command.updated_at = now;
                bump(&mut meta, REVISION)?;
                commands.write(key, Some(previous), &command)?;
            }

            (queued_actions.len(), queued_commands.len())
        };
        wt.commit().map_err(store_err)?;
        Ok(counts)
    }

    /// Return actions left `Running` by an interrupted run to `Queued`.
    ///
    /// A `Running` action never had its outcome recorded, so re-applying it
    /// on the next pass neither loses nor duplicates movement. Returns the
    /// number of actions recovered.
    pub fn recover_interrupted(&self) -> Result<usize> {
        let wt = self.db.begin_write().map_err(store_err)?;
        let count = {
            let mut meta = wt.open_table(META).map_err(store_err)?;
            let mut table = ActionTables::open(&wt)?;

            let running = table.with_status(Status::Running)?;
            for (key, previous) in &running {
                let mut action = previous.clone();
                action.status = Status::Queued;
                action.updated_at = Utc::now();
                action.revision = bump(&mut meta, REVISION)?;
                table.write(key, Some(previous), &action)?;
            }
            running.len()
        };
        wt.commit().map_err(store_err)?;
        Ok(count)
    }

    /// Read-modify-write a single action in its own transaction.
    fn update_action<F>(&self, id: Uuid, apply: F) -> Result<Action>
    where
        F: FnOnce(&mut Action) -> Result<()>,
    {
        let wt = self.db.begin_write().map_err(store_err)?;
        let action = {
            let mut meta = wt.open_table(META).map_err(store_err)?;
            let mut table = ActionTables::open(&wt)?;

            let (key, previous) = table.find(id)?;
            let mut action = previous.clone();
            apply(&mut action)?;
            action.updated_at = Utc::now();
            action.revision = bump(&mut meta, REVISION)?;
            table.write(&key, Some(&previous), &action)?;
            action
        };
        wt.commit().map_err(store_err)?;
        Ok(action)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::expand;
    use crate::types::Direction;
    use tempfile::TempDir;

    fn open_tmp() -> (TempDir, RobotDb) {
        let dir = TempDir::new().unwrap();
        let db = RobotDb::open(&dir.path().join("test.redb")).unwrap();
        (dir, db)
    }

    fn queue(db: &RobotDb, text: &str) -> Command {
        let cmd = Command::new(text);
        db.insert_command(&cmd).unwrap();
        cmd
    }

    fn parse(db: &RobotDb, cmd: &Command) -> Vec<Action> {
        let actions = expand(cmd).unwrap();
        db.commit_expansion(cmd.id, &actions).unwrap();
        actions
    }

    #[test]
    fn empty_db_has_nothing_queued() {
        let (_dir, db) = open_tmp();
        assert!(db.queued_commands().unwrap().is_empty());
        assert!(db.queued_actions().unwrap().is_empty());
        assert!(db.latest_active().unwrap().is_none());
        assert!(db.latest_positioned().unwrap().is_none());
    }

    #[test]
    fn commands_come_back_in_insertion_order() {
        let (_dir, db) = open_tmp();
        let first = queue(&db, "F");
        let second = queue(&db, "B");
        let third = queue(&db, "L");

        let ids: Vec<Uuid> = db.queued_commands().unwrap().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![first.id, second.id, third.id]);
    }

    #[test]
    fn expansion_preserves_character_order_and_flips_command() {
        let (_dir, db) = open_tmp();
        let cmd = queue(&db, "FBLRFF");
        parse(&db, &cmd);

        let codes: String = db.queued_actions().unwrap().iter().map(|a| a.code).collect();
        assert_eq!(codes, "FBLRFF");
        assert_eq!(db.get_command(cmd.id).unwrap().status, Status::Completed);
        assert!(db.queued_commands().unwrap().is_empty());
    }

    #[test]
    fn queued_actions_span_commands_in_creation_order() {
        let (_dir, db) = open_tmp();
        let first = queue(&db, "FF");
        let second = queue(&db, "LB");
        parse(&db, &first);
        let done = db.queued_actions().unwrap()[0].id;
        db.mark_running(done).unwrap();
        db.record_completed(done, Pose::new(3, 2, Direction::West))
            .unwrap();
        parse(&db, &second);

        let codes: String = db.queued_actions().unwrap().iter().map(|a| a.code).collect();
        assert_eq!(codes, "FLB");
    }

    #[test]
    fn second_expansion_is_rejected_without_duplicates() {
        let (_dir, db) = open_tmp();
        let cmd = queue(&db, "FF");
        parse(&db, &cmd);

        let again = expand(&cmd).unwrap();
        let err = db.commit_expansion(cmd.id, &again).unwrap_err();
        assert!(matches!(err, GridbotError::InvalidTransition { .. }));
        assert_eq!(db.list_actions().unwrap().len(), 2);
    }

    #[test]
    fn running_then_completed_records_pose() {
        let (_dir, db) = open_tmp();
        let cmd = queue(&db, "F");
        let id = parse(&db, &cmd)[0].id;

        let running = db.mark_running(id).unwrap();
        assert_eq!(running.status, Status::Running);
        assert!(running.pose().is_none());
        assert_eq!(db.latest_active().unwrap().unwrap().status, Status::Running);
        assert!(db.latest_positioned().unwrap().is_none());

        let done = db
            .record_completed(id, Pose::new(3, 2, Direction::West))
            .unwrap();
        assert_eq!(done.pose(), Some(Pose::new(3, 2, Direction::West)));
        let latest = db.latest_active().unwrap().unwrap();
        assert_eq!(latest.id, id);
        assert_eq!(latest.status, Status::Completed);
    }

    #[test]
    fn latest_positioned_skips_a_running_action() {
        let (_dir, db) = open_tmp();
        let cmd = queue(&db, "FF");
        let actions = parse(&db, &cmd);
        db.mark_running(actions[0].id).unwrap();
        db.record_completed(actions[0].id, Pose::new(3, 2, Direction::West))
            .unwrap();
        db.mark_running(actions[1].id).unwrap();

        assert_eq!(db.latest_active().unwrap().unwrap().id, actions[1].id);
        assert_eq!(db.latest_positioned().unwrap().unwrap().id, actions[0].id);
    }

    #[test]
    fn terminal_actions_cannot_be_rewritten() {
        let (_dir, db) = open_tmp();
        let cmd = queue(&db, "F");
        let id = parse(&db, &cmd)[0].id;
        db.mark_running(id).unwrap();
        db.record_completed(id, Pose::new(3, 2, Direction::West))
            .unwrap();

        assert!(db.mark_running(id).is_err());
        assert!(db
            .record_completed(id, Pose::new(0, 0, Direction::North))
            .is_err());
        assert!(matches!(
            db.record_failure(id, Pose::new(0, 0, Direction::North)),
            Err(GridbotError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn record_failure_withdraws_queued_work_in_the_same_commit() {
        let (_dir, db) = open_tmp();
        let parsed = queue(&db, "FF");
        let actions = parse(&db, &parsed);
        let pending = queue(&db, "LL");

        db.mark_running(actions[0].id).unwrap();
        let counts = db
            .record_failure(actions[0].id, Pose::new(4, 2, Direction::West))
            .unwrap();
        assert_eq!(counts, (1, 1));

        let statuses: Vec<Status> = db.list_actions().unwrap().iter().map(|a| a.status).collect();
        assert_eq!(statuses, vec![Status::Failed, Status::Withdrawn]);
        assert_eq!(db.get_command(pending.id).unwrap().status, Status::Withdrawn);
        assert_eq!(db.get_command(parsed.id).unwrap().status, Status::Completed);
        assert!(db.queued_actions().unwrap().is_empty());
        assert!(db.queued_commands().unwrap().is_empty());

        let latest = db.latest_active().unwrap().unwrap();
        assert_eq!(latest.id, actions[0].id);
        assert_eq!(latest.status, Status::Failed);
        assert_eq!(latest.pose(), Some(Pose::new(4, 2, Direction::West)));
    }

    #[test]
    fn record_failure_on_queued_action_changes_nothing() {
        let (_dir, db) = open_tmp();
        let cmd = queue(&db, "FF");
        let actions = parse(&db, &cmd);
        let pending = queue(&db, "L");

        assert!(db
            .record_failure(actions[0].id, Pose::new(4, 2, Direction::West))
            .is_err());
        assert_eq!(db.queued_actions().unwrap().len(), 2);
        assert_eq!(db.get_command(pending.id).unwrap().status, Status::Queued);
    }

    #[test]
    fn recover_interrupted_requeues_running_actions() {
        let (_dir, db) = open_tmp();
        let cmd = queue(&db, "FB");
        let actions = parse(&db, &cmd);
        db.mark_running(actions[0].id).unwrap();

        assert_eq!(db.recover_interrupted().unwrap(), 1);
        let queued: Vec<Uuid> = db.queued_actions().unwrap().iter().map(|a| a.id).collect();
        assert_eq!(queued, vec![actions[0].id, actions[1].id]);
        assert!(db.latest_active().unwrap().is_none());
    }

    #[test]
    fn recover_interrupted_on_empty_db_returns_zero() {
        let (_dir, db) = open_tmp();
        assert_eq!(db.recover_interrupted().unwrap(), 0);
    }

    #[test]
    fn delete_command_cascades_to_actions_and_indexes() {
        let (_dir, db) = open_tmp();
        let doomed = queue(&db, "FFF");
        let doomed_actions = parse(&db, &doomed);
        let kept = queue(&db, "L");
        parse(&db, &kept);

        db.mark_running(doomed_actions[0].id).unwrap();
        db.record_completed(doomed_actions[0].id, Pose::new(3, 2, Direction::West))
            .unwrap();

        assert_eq!(db.delete_command(doomed.id).unwrap(), 3);
        assert!(matches!(
            db.get_command(doomed.id),
            Err(GridbotError::CommandNotFound(_))
        ));
        let remaining = db.list_actions().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].command_id, kept.id);

        let queued: Vec<Uuid> = db.queued_actions().unwrap().iter().map(|a| a.id).collect();
        assert_eq!(queued, vec![remaining[0].id]);
        assert!(db.latest_active().unwrap().is_none());
    }

    #[test]
    fn reopen_keeps_rows_and_counters() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.redb");
        let first = {
            let db = RobotDb::open(&path).unwrap();
            queue(&db, "F")
        };
        let db = RobotDb::open(&path).unwrap();
        let second = queue(&db, "B");
        let ids: Vec<Uuid> = db.list_commands().unwrap().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
        assert_eq!(db.queued_commands().unwrap().len(), 2);
    }
}
