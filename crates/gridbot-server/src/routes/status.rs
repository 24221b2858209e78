use axum::extract::State;
use axum::Json;
use gridbot_core::status::{current_status, RobotStatus};

use crate::error::AppError;
use crate::state::AppState;

/// GET /status: the robot's current derived state.
pub async fn get_status(State(app): State<AppState>) -> Result<Json<RobotStatus>, AppError> {
    let db = app.db.clone();
    let config = app.config.clone();
    let status = tokio::task::spawn_blocking(move || current_status(&db, &config.robot))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(status))
}
