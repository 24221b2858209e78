use thiserror::Error;
use uuid::Uuid;

use crate::types::Status;

/// Failures raised by the robot itself while applying a single action.
///
/// These are business outcomes rather than bugs in the store: the executor
/// turns any of them into a `Failed` action and withdraws everything still
/// queued in the same commit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RobotError {
    #[error("obstacle detected: ({x}, {y})")]
    Obstacle { x: i64, y: i64 },

    #[error("unknown action: {0:?}")]
    UnknownAction(char),

    #[error("edge of grid reached at ({x}, {y})")]
    EdgeOfGrid { x: i64, y: i64 },
}

#[derive(Debug, Error)]
pub enum GridbotError {
    #[error("command {command_id}: unknown action code {found:?} at position {index}")]
    Parse {
        command_id: Uuid,
        index: usize,
        found: char,
    },

    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error("invalid transition for {id}: {from} -> {to}")]
    InvalidTransition { id: Uuid, from: Status, to: Status },

    #[error("command not found: {0}")]
    CommandNotFound(Uuid),

    #[error("action not found: {0}")]
    ActionNotFound(Uuid),

    #[error("store error: {0}")]
    Store(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GridbotError>;
