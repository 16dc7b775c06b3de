use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::{debug, warn};

use whisper_db::models::NewNotification;
use whisper_types::models::{AuthorRef, Message, Notification, Reply};

use crate::auth::{AppState, Identity, message_owner, with_db};
use crate::error::ApiError;

/// Characters of the reply copied into the notification.
pub const PREVIEW_LENGTH: usize = 100;

const LIST_LIMIT: u32 = 100;

/// Who hears about a new reply: the registered author of the reply it
/// answers, or the board owner for a reply to the message itself.
pub fn recipient_for(message: &Message, parent: Option<&Reply>, reply: &Reply) -> Option<AuthorRef> {
    let recipient = match parent {
        Some(parent) => parent.author,
        None => message_owner(message),
    };
    match recipient {
        AuthorRef::Anonymous => None,
        r if r == reply.author => None,
        r => Some(r),
    }
}

/// Store a notification for a new reply. Failures are logged, never
/// surfaced: the reply itself already exists.
pub async fn notify_reply(state: &AppState, message: &Message, parent: Option<&Reply>, reply: &Reply) {
    let Some(recipient) = recipient_for(message, parent, reply) else {
        return;
    };

    let message_id = message.id;
    let reply_id = reply.id;
    let from = reply.author;
    let from_nickname = reply.nickname.clone();
    let content_preview: String = reply.content.chars().take(PREVIEW_LENGTH).collect();

    let result = with_db(state, move |db| {
        Ok(db.insert_notification(&NewNotification {
            recipient,
            message_id,
            reply_id,
            from,
            from_nickname: &from_nickname,
            content_preview: &content_preview,
        })?)
    })
    .await;

    match result {
        Ok(id) => debug!(notification_id = id, reply_id, ?recipient, "Notification queued"),
        Err(e) => warn!(reply_id, "Failed to store reply notification: {}", e),
    }
}

/// GET /notifications: the caller's notifications, newest first.
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let recipient = signed_in(identity)?;
    let rows = with_db(&state, move |db| Ok(db.get_notifications(recipient, LIST_LIMIT)?)).await?;
    Ok(Json(rows.into_iter().map(|row| row.into_notification()).collect()))
}

/// POST /notifications/{notification_id}/read
pub async fn mark_read(
    State(state): State<AppState>,
    Path(notification_id): Path<i64>,
    Extension(identity): Extension<Identity>,
) -> Result<StatusCode, ApiError> {
    let recipient = signed_in(identity)?;
    let updated = with_db(&state, move |db| {
        Ok(db.mark_notification_read(notification_id, recipient)?)
    })
    .await?;

    if updated {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("Notification"))
    }
}

fn signed_in(identity: Identity) -> Result<AuthorRef, ApiError> {
    match identity {
        Identity::Anonymous => Err(ApiError::Unauthorized),
        other => Ok(other.as_author()),
    }
}
