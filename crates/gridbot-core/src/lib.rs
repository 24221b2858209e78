pub mod action;
pub mod command;
pub mod config;
pub mod db;
pub mod error;
pub mod executor;
pub mod parser;
pub mod robot;
pub mod status;
pub mod types;

pub use error::{GridbotError, Result, RobotError};
