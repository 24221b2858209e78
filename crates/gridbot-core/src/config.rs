use crate::error::{GridbotError, Result};
use crate::robot::{Pose, Robot};
use crate::types::Direction;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// RobotConfig
// ---------------------------------------------------------------------------

/// Where the robot starts and what it can't drive through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobotConfig {
    #[serde(default = "default_start_x")]
    pub start_x: i64,
    #[serde(default = "default_start_y")]
    pub start_y: i64,
    #[serde(default = "default_start_direction")]
    pub start_direction: Direction,
    #[serde(default = "default_obstacles")]
    pub obstacles: Vec<[i64; 2]>,
}

fn default_start_x() -> i64 {
    4
}

fn default_start_y() -> i64 {
    2
}

fn default_start_direction() -> Direction {
    Direction::West
}

fn default_obstacles() -> Vec<[i64; 2]> {
    vec![[1, 4], [3, 5], [7, 4]]
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            start_x: default_start_x(),
            start_y: default_start_y(),
            start_direction: default_start_direction(),
            obstacles: default_obstacles(),
        }
    }
}

impl RobotConfig {
    pub fn start_pose(&self) -> Pose {
        Pose::new(self.start_x, self.start_y, self.start_direction)
    }

    pub fn obstacle_set(&self) -> HashSet<(i64, i64)> {
        self.obstacles.iter().map(|[x, y]| (*x, *y)).collect()
    }

    /// A robot at `pose` that knows this configuration's obstacles.
    pub fn robot_at(&self, pose: Pose) -> Robot {
        Robot::new(pose, self.obstacle_set())
    }
}

// ---------------------------------------------------------------------------
// WorkerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

fn default_interval_secs() -> u64 {
    30
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

impl WorkerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bearer token required on every request. `None` disables the check.
    #[serde(default)]
    pub api_token: Option<String>,
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            api_token: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub robot: RobotConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Read a YAML config file. Missing sections and fields take defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    /// Load `path` if given, otherwise start from defaults, then apply
    /// environment overrides from the process environment.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let cfg = match path {
            Some(p) => Self::load(p)?,
            None => Self::default(),
        };
        cfg.with_env(|key| std::env::var(key).ok())
    }

    /// Apply `START_POSITION`, `START_DIRECTION`, `API_TOKEN` and
    /// `JOB_INTERVAL_SECS` overrides looked up through `var`.
    pub fn with_env(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(raw) = var("START_POSITION") {
            let (x, y) = parse_position(&raw)?;
            self.robot.start_x = x;
            self.robot.start_y = y;
        }
        if let Some(raw) = var("START_DIRECTION") {
            self.robot.start_direction = raw.parse()?;
        }
        if let Some(token) = var("API_TOKEN") {
            self.server.api_token = Some(token).filter(|t| !t.is_empty());
        }
        if let Some(raw) = var("JOB_INTERVAL_SECS") {
            self.worker.interval_secs = raw.trim().parse().map_err(|_| {
                GridbotError::Config(format!("JOB_INTERVAL_SECS must be an integer, got '{raw}'"))
            })?;
        }
        Ok(self)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        // 1. The robot must not start inside an obstacle
        let start = [self.robot.start_x, self.robot.start_y];
        if self.robot.obstacles.contains(&start) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "start position ({}, {}) is an obstacle",
                    start[0], start[1]
                ),
            });
        }

        // 2. Duplicate obstacles are harmless but probably a typo
        let unique = self.robot.obstacle_set();
        if unique.len() != self.robot.obstacles.len() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "{} duplicate obstacle(s) in robot.obstacles",
                    self.robot.obstacles.len() - unique.len()
                ),
            });
        }

        // 3. A zero interval would spin the worker
        if self.worker.interval_secs == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "worker.interval_secs must be at least 1".to_string(),
            });
        }

        warnings
    }

    /// Fail on the first `Error`-level validation finding.
    pub fn ensure_valid(&self) -> Result<()> {
        match self
            .validate()
            .into_iter()
            .find(|w| w.level == WarnLevel::Error)
        {
            Some(w) => Err(GridbotError::Config(w.message)),
            None => Ok(()),
        }
    }
}

/// Parse `"x,y"`, tolerating whitespace around either number.
fn parse_position(raw: &str) -> Result<(i64, i64)> {
    let cleaned: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let invalid = || GridbotError::Config(format!("START_POSITION must look like 'x,y', got '{raw}'"));
    let (x, y) = cleaned.split_once(',').ok_or_else(invalid)?;
    Ok((
        x.parse().map_err(|_| invalid())?,
        y.parse().map_err(|_| invalid())?,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
