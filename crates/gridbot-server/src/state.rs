use gridbot_core::config::Config;
use gridbot_core::db::RobotDb;
use std::sync::Arc;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<RobotDb>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: RobotDb, config: Config) -> Self {
        Self {
            db: Arc::new(db),
            config: Arc::new(config),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_shares_config() {
        let dir = tempfile::TempDir::new().unwrap();
        let db = RobotDb::open(&dir.path().join("state.redb")).unwrap();
        let state = AppState::new(db, Config::default());
        let cloned = state.clone();
        assert!(Arc::ptr_eq(&state.config, &cloned.config));
        assert!(Arc::ptr_eq(&state.db, &cloned.db));
    }
}
