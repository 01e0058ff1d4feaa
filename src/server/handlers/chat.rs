use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use tracing::Instrument;
use uuid::Uuid;

use crate::chat::{ChatInput, ChatResponse};
use crate::core::errors::ApiError;
use crate::state::AppState;

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(input): Json<ChatInput>,
) -> Result<Json<ChatResponse>, ApiError> {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("chat", %request_id);

    async move {
        tracing::info!(chars = input.message.chars().count(), "chat request received");
        let response = state.chat.handle(&input.message).await?;
        tracing::info!(label = %response.emotion.label, "chat request completed");
        Ok::<_, ApiError>(Json(response))
    }
    .instrument(span)
    .await
}
