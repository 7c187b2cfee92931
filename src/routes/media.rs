use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::error::{ApiError, AppJson};
use crate::media::{DestroyOutcome, MediaHost, ResourceType};
use crate::state::AppState;

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/cloudinary/delete/image", delete(delete_image))
        .route("/api/cloudinary/delete/video", delete(delete_video))
        .route("/api/cloudinary/delete/batch", post(delete_batch))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DestroyBody {
    #[serde(default)]
    public_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchBody {
    #[serde(default)]
    public_ids: Option<Vec<String>>,
}

fn media_host(state: &AppState) -> Result<&Arc<dyn MediaHost>, ApiError> {
    state.media.as_ref().ok_or_else(|| ApiError::Internal("Cloudinary configuration error".to_string()))
}

fn required_id(body: DestroyBody) -> Result<String, ApiError> {
    body.public_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::InvalidArgument("Public ID is required".to_string()))
}

async fn destroy(state: &AppState, public_id: &str, kind: ResourceType) -> Result<Response, ApiError> {
    let outcome = media_host(state)?.destroy(public_id, kind).await?;
    let result = json!({"result": outcome.as_str()});
    let response = match (&outcome, kind) {
        (DestroyOutcome::Ok, ResourceType::Image) => {
            Json(json!({"success": true, "message": "Image deleted successfully from Cloudinary", "result": result}))
                .into_response()
        }
        (DestroyOutcome::NotFound, ResourceType::Image) => {
            Json(json!({"success": true, "message": "Image not found (may already be deleted)", "result": result}))
                .into_response()
        }
        (DestroyOutcome::Ok | DestroyOutcome::NotFound, ResourceType::Video) => {
            Json(json!({"success": true, "message": "Video deleted successfully", "result": result})).into_response()
        }
        (DestroyOutcome::Other(status), _) => {
            tracing::warn!(public_id, kind = kind.as_str(), %status, "media host refused delete");
            let message = format!("Failed to delete {}", kind.as_str());
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"success": false, "message": message, "result": result})))
                .into_response()
        }
    };
    Ok(response)
}

async fn delete_image(State(state): State<AppState>, AppJson(body): AppJson<DestroyBody>) -> Result<Response, ApiError> {
    let public_id = required_id(body)?;
    destroy(&state, &public_id, ResourceType::Image).await
}

async fn delete_video(State(state): State<AppState>, AppJson(body): AppJson<DestroyBody>) -> Result<Response, ApiError> {
    let public_id = required_id(body)?;
    destroy(&state, &public_id, ResourceType::Video).await
}

async fn delete_batch(State(state): State<AppState>, AppJson(body): AppJson<BatchBody>) -> Result<Response, ApiError> {
    let public_ids = body
        .public_ids
        .filter(|ids| !ids.is_empty())
        .ok_or_else(|| ApiError::InvalidArgument("Public IDs array is required".to_string()))?;
    let deletion = media_host(&state)?.delete_images(&public_ids).await?;
    let deleted_count = deletion.deleted_count();
    Ok(Json(json!({
        "success": true,
        "message": format!("{deleted_count} images deleted successfully"),
        "result": {"deleted": deletion.deleted},
        "deletedCount": deleted_count,
        "totalRequested": public_ids.len(),
    }))
    .into_response())
}
