use axum::{extract::State, response::Json};
use std::sync::Arc;
use tracing::{error, info};

use crate::{
    errors::ApiError,
    gemini::TRUNCATION_MARKER,
    models::{ChatRequest, ChatResponse},
    session::{DocumentContext, SessionId},
    AppState,
};

/// Context budget for a chat prompt, smaller than the analysis budget since
/// the document shares the prompt with the question and instructions.
const MAX_CONTEXT_CHARS_FOR_CHAT: usize = 50_000;

/// Build the prompt for one chat turn. With a stored document the answer is
/// grounded in its text; without one the model answers as a general medical
/// assistant.
pub fn build_prompt(context: Option<&DocumentContext>, message: &str) -> String {
    match context {
        Some(ctx) => {
            let mut text = ctx.text.clone();
            if text.chars().count() > MAX_CONTEXT_CHARS_FOR_CHAT {
                text = text
                    .chars()
                    .take(MAX_CONTEXT_CHARS_FOR_CHAT)
                    .collect::<String>()
                    + TRUNCATION_MARKER;
            }

            format!(
                "You are a helpful medical assistant. The user has previously uploaded a medical document named '{}'. \
Use the following document content to answer the user's question. \
Prefer information from the document over general knowledge when they conflict. \
If the document does not contain the answer, say so and then answer from general medical knowledge. \
Do not mention that you are an AI. \
If you mention any medication or treatment, remind the user that it must only be taken under the supervision of a qualified doctor.\n\n\
--- DOCUMENT CONTENT ({}) ---\n{}\n--- END DOCUMENT CONTENT ---\n\n\
User question: {}",
                ctx.filename, ctx.filename, text, message
            )
        }
        None => format!(
            "You are a helpful medical assistant. Answer the user's question from general medical knowledge. \
Do not mention that you are an AI. \
If you mention any medication or treatment, remind the user that it must only be taken under the supervision of a qualified doctor.\n\n\
User question: {}",
            message
        ),
    }
}

#[utoipa::path(
    post,
    path = "/api/chat",
    tag = "chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Assistant reply, grounded in the session document when one exists", body = ChatResponse),
        (status = 400, description = "No message provided"),
        (status = 500, description = "Chat generation failed")
    )
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    SessionId(session_id): SessionId,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let message = request
        .message
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .ok_or_else(|| ApiError::BadRequest("No message provided".to_string()))?;

    let context = state.sessions.get(session_id).await;
    match &context {
        Some(ctx) => info!(
            "Chat request grounded in document '{}' ({} chars of context)",
            ctx.filename,
            ctx.text.len()
        ),
        None => info!("Chat request without document context"),
    }

    let prompt = build_prompt(context.as_ref(), message);
    let reply = state.gemini.chat(&prompt).await.map_err(|e| {
        error!("Chat generation failed: {}", e);
        ApiError::Upstream {
            message: e.to_string(),
            safety_ratings: e.safety_ratings().cloned(),
            details: None,
        }
    })?;

    Ok(Json(ChatResponse { response: reply }))
}
