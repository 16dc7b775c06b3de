use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::WithRejection;
use tracing::info;

use whisper_thread::{PREVIEW_ROOT_THREADS, build_thread, count_nodes, preview};
use whisper_types::api::{CreateMessageRequest, MessageThreadResponse, RepliesQuery};
use whisper_types::models::{Message, ThreadedReply};

use crate::auth::{AppState, Identity, with_db};
use crate::error::ApiError;
use crate::validate;

pub const MAX_MESSAGE_LENGTH: usize = 1000;

/// POST /messages: post to a user's or a listener's board.
pub async fn create_message(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<CreateMessageRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    validate::text("content", &req.content, MAX_MESSAGE_LENGTH)?;
    validate::nickname(&req.nickname)?;

    let message = with_db(&state, move |db| {
        match (req.owner_user_id, req.owner_admin_id) {
            (Some(user_id), None) => {
                if !db.user_exists(user_id)? {
                    return Err(ApiError::NotFound("User"));
                }
            }
            (None, Some(admin_id)) => {
                if !db.admin_exists(admin_id)? {
                    return Err(ApiError::NotFound("Listener"));
                }
            }
            _ => {
                return Err(ApiError::validation(
                    "exactly one of ownerUserId and ownerAdminId is required",
                ));
            }
        }

        let row = db.insert_message(
            req.owner_user_id,
            req.owner_admin_id,
            req.content.trim(),
            req.nickname.trim(),
        )?;
        Ok(row.into_message())
    })
    .await?;

    info!(message_id = message.id, "Message posted");
    Ok((StatusCode::CREATED, Json(message)))
}

/// GET /messages/{message_id}: the message with its full reply thread.
pub async fn get_message(
    State(state): State<AppState>,
    Path(message_id): Path<i64>,
) -> Result<Json<MessageThreadResponse>, ApiError> {
    let (message, replies) = load_thread(&state, message_id).await?;
    Ok(Json(MessageThreadResponse {
        message,
        reply_count: count_nodes(&replies),
        replies,
    }))
}

/// GET /messages/{message_id}/replies: the reply thread, optionally
/// collapsed to its first root threads.
pub async fn get_replies(
    State(state): State<AppState>,
    Path(message_id): Path<i64>,
    Query(query): Query<RepliesQuery>,
) -> Result<Response, ApiError> {
    let (_, replies) = load_thread(&state, message_id).await?;
    if query.preview {
        Ok(Json(preview(replies, PREVIEW_ROOT_THREADS)).into_response())
    } else {
        Ok(Json(replies).into_response())
    }
}

/// DELETE /messages/{message_id}: board owner or admin only.
pub async fn delete_message(
    State(state): State<AppState>,
    Path(message_id): Path<i64>,
    Extension(identity): Extension<Identity>,
) -> Result<StatusCode, ApiError> {
    with_db(&state, move |db| {
        let message = db
            .get_message(message_id)?
            .ok_or(ApiError::NotFound("Message"))?
            .into_message();
        if !identity.can_moderate(&message) {
            return Err(ApiError::Forbidden);
        }
        db.delete_message(message_id)?;
        Ok(())
    })
    .await?;

    info!(message_id, ?identity, "Message deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Fresh read of a message and all its replies, built into display order.
async fn load_thread(
    state: &AppState,
    message_id: i64,
) -> Result<(Message, Vec<ThreadedReply>), ApiError> {
    let (message, rows) = with_db(state, move |db| {
        let message = db
            .get_message(message_id)?
            .ok_or(ApiError::NotFound("Message"))?;
        let rows = db.fetch_replies(message_id)?;
        Ok((message, rows))
    })
    .await?;

    let replies = build_thread(
        rows.into_iter().map(|row| row.into_reply()),
        state.max_nesting_level,
    );
    Ok((message.into_message(), replies))
}
