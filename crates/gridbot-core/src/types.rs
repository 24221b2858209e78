use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{GridbotError, RobotError};

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "N")]
    North,
    #[serde(rename = "S")]
    South,
    #[serde(rename = "E")]
    East,
    #[serde(rename = "W")]
    West,
}

impl Direction {
    /// One step counter-clockwise.
    pub fn left(self) -> Direction {
        match self {
            Direction::North => Direction::West,
            Direction::West => Direction::South,
            Direction::South => Direction::East,
            Direction::East => Direction::North,
        }
    }

    /// One step clockwise.
    pub fn right(self) -> Direction {
        match self {
            Direction::North => Direction::East,
            Direction::East => Direction::South,
            Direction::South => Direction::West,
            Direction::West => Direction::North,
        }
    }

    /// Unit vector for a forward move while facing this direction.
    pub fn delta(self) -> (i64, i64) {
        match self {
            Direction::North => (0, 1),
            Direction::South => (0, -1),
            Direction::East => (1, 0),
            Direction::West => (-1, 0),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::North => "N",
            Direction::South => "S",
            Direction::East => "E",
            Direction::West => "W",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Direction {
    type Err = GridbotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "N" => Ok(Direction::North),
            "S" => Ok(Direction::South),
            "E" => Ok(Direction::East),
            "W" => Ok(Direction::West),
            _ => Err(GridbotError::Config(format!(
                "unknown direction '{}': expected one of N, S, E, W",
                s.trim()
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// ActionKind
// ---------------------------------------------------------------------------

/// The four atomic instructions the robot understands.
///
/// Each kind has a one-character code; a command string is a sequence of
/// these codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    RotateLeft,
    RotateRight,
    MoveForward,
    MoveBackward,
}

impl ActionKind {
    pub fn code(self) -> char {
        match self {
            ActionKind::RotateLeft => 'L',
            ActionKind::RotateRight => 'R',
            ActionKind::MoveForward => 'F',
            ActionKind::MoveBackward => 'B',
        }
    }

    pub fn from_code(code: char) -> Result<Self, RobotError> {
        match code {
            'L' => Ok(ActionKind::RotateLeft),
            'R' => Ok(ActionKind::RotateRight),
            'F' => Ok(ActionKind::MoveForward),
            'B' => Ok(ActionKind::MoveBackward),
            other => Err(RobotError::UnknownAction(other)),
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActionKind::RotateLeft => "rotate_left",
            ActionKind::RotateRight => "rotate_right",
            ActionKind::MoveForward => "move_forward",
            ActionKind::MoveBackward => "move_backward",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle state shared by commands and actions.
///
/// Commands only ever go `Queued → Completed | Withdrawn`. Actions go
/// `Queued → Running → Completed | Failed`, or `Queued → Withdrawn` when a
/// failure cascades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Queued,
    Running,
    Completed,
    Failed,
    Withdrawn,
}

impl Status {
    /// Statuses that count toward the derived robot state.
    pub fn is_active(self) -> bool {
        matches!(self, Status::Running | Status::Completed | Status::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Queued => "QUEUED",
            Status::Running => "RUNNING",
            Status::Completed => "COMPLETED",
            Status::Failed => "FAILED",
            Status::Withdrawn => "WITHDRAWN",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
