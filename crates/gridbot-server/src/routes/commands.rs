use axum::extract::{Path, State};
use axum::Json;
use gridbot_core::command::Command;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(serde::Deserialize)]
pub struct SubmitCommandBody {
    pub command: String,
}

/// POST /command: queue a command string for the robot.
pub async fn submit_command(
    State(app): State<AppState>,
    Json(body): Json<SubmitCommandBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    Command::validate_text(&body.command)?;

    let db = app.db.clone();
    let result = tokio::task::spawn_blocking(move || {
        let command = Command::new(body.command);
        db.insert_command(&command)?;
        tracing::info!(command_id = %command.id, text = %command.text, "command queued");

        Ok::<_, gridbot_core::GridbotError>(serde_json::json!({ "id": command.id }))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

/// GET /commands/{id}: a command together with its actions.
pub async fn get_command(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let id = Uuid::parse_str(&id)
        .map_err(|_| AppError::bad_request(format!("invalid command id '{id}'")))?;

    let db = app.db.clone();
    let result = tokio::task::spawn_blocking(move || {
        let command = db.get_command(id)?;
        let actions = db.actions_for_command(id)?;

        let actions: Vec<serde_json::Value> = actions
            .iter()
            .map(|a| {
                serde_json::json!({
                    "id": a.id,
                    "code": a.code,
                    "status": a.status,
                    "x": a.x,
                    "y": a.y,
                    "direction": a.direction,
                    "created_at": a.created_at,
                    "updated_at": a.updated_at,
                })
            })
            .collect();

        Ok::<_, gridbot_core::GridbotError>(serde_json::json!({
            "id": command.id,
            "command": command.text,
            "status": command.status,
            "created_at": command.created_at,
            "updated_at": command.updated_at,
            "actions": actions,
        }))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}
