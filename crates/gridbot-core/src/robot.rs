//! In-memory robot state machine.
//!
//! `Robot` holds a pose and the static obstacle set and applies one action
//! at a time. It performs no I/O: the executor seeds it from the derived
//! robot state and checkpoints its pose after every action.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::RobotError;
use crate::types::{ActionKind, Direction};

/// Position and heading of the robot on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pose {
    pub x: i64,
    pub y: i64,
    pub direction: Direction,
}

impl Pose {
    pub fn new(x: i64, y: i64, direction: Direction) -> Self {
        Self { x, y, direction }
    }
}

#[derive(Debug, Clone)]
pub struct Robot {
    pose: Pose,
    obstacles: HashSet<(i64, i64)>,
}

impl Robot {
    pub fn new(pose: Pose, obstacles: HashSet<(i64, i64)>) -> Self {
        Self { pose, obstacles }
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// Apply a single action. On an obstacle the pose is left untouched.
    pub fn apply(&mut self, kind: ActionKind) -> Result<(), RobotError> {
        match kind {
            ActionKind::RotateLeft => self.pose.direction = self.pose.direction.left(),
            ActionKind::RotateRight => self.pose.direction = self.pose.direction.right(),
            ActionKind::MoveForward => self.step(self.pose.direction.delta())?,
            ActionKind::MoveBackward => {
                let (dx, dy) = self.pose.direction.delta();
                self.step((-dx, -dy))?
            }
        }
        Ok(())
    }

    fn step(&mut self, (dx, dy): (i64, i64)) -> Result<(), RobotError> {
        let (Some(x), Some(y)) = (self.pose.x.checked_add(dx), self.pose.y.checked_add(dy)) else {
            return Err(RobotError::EdgeOfGrid {
                x: self.pose.x,
                y: self.pose.y,
            });
        };
        if self.obstacles.contains(&(x, y)) {
            return Err(RobotError::Obstacle { x, y });
        }
        self.pose.x = x;
        self.pose.y = y;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn robot_at(x: i64, y: i64, direction: Direction) -> Robot {
        let obstacles = [(1, 4), (3, 5), (7, 4)].into_iter().collect();
        Robot::new(Pose::new(x, y, direction), obstacles)
    }

    #[test]
    fn rotations_do_not_move() {
        let mut robot = robot_at(4, 2, Direction::West);
        robot.apply(ActionKind::RotateLeft).unwrap();
        assert_eq!(robot.pose(), Pose::new(4, 2, Direction::South));
        robot.apply(ActionKind::RotateRight).unwrap();
        robot.apply(ActionKind::RotateRight).unwrap();
        assert_eq!(robot.pose(), Pose::new(4, 2, Direction::North));
    }

    #[test]
    fn forward_then_backward_returns_home() {
        for d in [Direction::North, Direction::East, Direction::South, Direction::West] {
            let mut robot = robot_at(10, 10, d);
            robot.apply(ActionKind::MoveForward).unwrap();
            assert_ne!(robot.pose(), Pose::new(10, 10, d));
            robot.apply(ActionKind::MoveBackward).unwrap();
            assert_eq!(robot.pose(), Pose::new(10, 10, d));

            robot.apply(ActionKind::MoveBackward).unwrap();
            robot.apply(ActionKind::MoveForward).unwrap();
            assert_eq!(robot.pose(), Pose::new(10, 10, d));
        }
    }

    #[test]
    fn forward_follows_heading() {
        let mut robot = robot_at(0, 0, Direction::North);
        robot.apply(ActionKind::MoveForward).unwrap();
        assert_eq!((robot.pose().x, robot.pose().y), (0, 1));

        let mut robot = robot_at(0, 0, Direction::East);
        robot.apply(ActionKind::MoveBackward).unwrap();
        assert_eq!((robot.pose().x, robot.pose().y), (-1, 0));
    }

    #[test]
    fn obstacle_blocks_and_leaves_pose_unchanged() {
        let mut robot = robot_at(1, 3, Direction::North);
        let err = robot.apply(ActionKind::MoveForward).unwrap_err();
        assert_eq!(err, RobotError::Obstacle { x: 1, y: 4 });
        assert_eq!(robot.pose(), Pose::new(1, 3, Direction::North));
    }

    #[test]
    fn backward_into_obstacle_is_blocked() {
        let mut robot = robot_at(3, 6, Direction::North);
        let err = robot.apply(ActionKind::MoveBackward).unwrap_err();
        assert_eq!(err, RobotError::Obstacle { x: 3, y: 5 });
        assert_eq!(robot.pose(), Pose::new(3, 6, Direction::North));
    }

    #[test]
    fn stepping_past_the_coordinate_range_fails_in_place() {
        let mut robot = Robot::new(Pose::new(i64::MAX, 0, Direction::East), HashSet::new());
        let err = robot.apply(ActionKind::MoveForward).unwrap_err();
        assert_eq!(err, RobotError::EdgeOfGrid { x: i64::MAX, y: 0 });
        assert_eq!(robot.pose(), Pose::new(i64::MAX, 0, Direction::East));

        let mut robot = Robot::new(Pose::new(0, i64::MIN, Direction::North), HashSet::new());
        let err = robot.apply(ActionKind::MoveBackward).unwrap_err();
        assert_eq!(err, RobotError::EdgeOfGrid { x: 0, y: i64::MIN });

        // Moving back toward the origin from the edge is fine.
        robot.apply(ActionKind::MoveForward).unwrap();
        assert_eq!(robot.pose(), Pose::new(0, i64::MIN + 1, Direction::North));
    }

    #[test]
    fn same_input_same_outcome() {
        let run = || {
            let mut robot = robot_at(4, 2, Direction::West);
            for code in "FFFRFF".chars() {
                let kind = ActionKind::from_code(code).unwrap();
                if robot.apply(kind).is_err() {
                    break;
                }
            }
            robot.pose()
        };
        assert_eq!(run(), run());
        assert_eq!(run(), Pose::new(1, 3, Direction::North));
    }
}
