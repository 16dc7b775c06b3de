use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::info;

use whisper_thread::{MAX_REPLIES_PER_MESSAGE, MAX_REPLY_LENGTH};
use whisper_types::api::{CreateReplyRequest, DeleteRepliesResponse};
use whisper_types::models::{AuthorFields, AuthorRef};

use crate::auth::{AppState, Identity, with_db};
use crate::error::ApiError;
use crate::notifications;
use crate::validate;

/// POST /replies: reply to a message, or to another reply on it.
///
/// Anyone may reply under a nickname. Claiming a `userId` or `adminId`
/// requires the matching bearer token and an existing account.
pub async fn create_reply(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    WithRejection(Json(req), _): WithRejection<Json<CreateReplyRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    validate::text("content", &req.content, MAX_REPLY_LENGTH)?;
    validate::nickname(&req.nickname)?;

    let author = AuthorRef::try_from(AuthorFields {
        user_id: req.user_id,
        admin_id: req.admin_id,
    })
    .map_err(ApiError::Validation)?;
    if author != AuthorRef::Anonymous && !identity.is_author(author) {
        return Err(ApiError::Forbidden);
    }

    let (reply, message, parent) = with_db(&state, move |db| {
        let message = db
            .get_message(req.message_id)?
            .ok_or(ApiError::NotFound("Message"))?
            .into_message();

        match author {
            AuthorRef::User(user_id) if !db.user_exists(user_id)? => {
                return Err(ApiError::NotFound("User"));
            }
            AuthorRef::Admin(admin_id) if !db.admin_exists(admin_id)? => {
                return Err(ApiError::NotFound("Listener"));
            }
            _ => {}
        }

        if db.count_replies(message.id)? >= MAX_REPLIES_PER_MESSAGE {
            return Err(ApiError::ReplyLimit(MAX_REPLIES_PER_MESSAGE));
        }

        let parent = match req.parent_id {
            Some(parent_id) => {
                let parent = db
                    .get_reply(parent_id)?
                    .ok_or(ApiError::NotFound("Parent reply"))?
                    .into_reply();
                if parent.message_id != message.id {
                    return Err(ApiError::validation(
                        "parent reply belongs to a different message",
                    ));
                }
                Some(parent)
            }
            None => None,
        };

        let reply = db
            .insert_reply(
                message.id,
                req.parent_id,
                req.content.trim(),
                author,
                req.nickname.trim(),
            )?
            .into_reply();
        Ok((reply, message, parent))
    })
    .await?;

    info!(
        reply_id = reply.id,
        message_id = reply.message_id,
        parent_id = ?reply.parent_id,
        "Reply created"
    );

    notifications::notify_reply(&state, &message, parent.as_ref(), &reply).await;

    Ok((StatusCode::CREATED, Json(reply)))
}

/// DELETE /replies/{reply_id}: remove a reply and everything below it.
///
/// Allowed for admins, the reply's author, and the owner of the board the
/// message sits on. Deleting a reply that is already gone succeeds with an
/// empty `deleted` list.
pub async fn delete_reply(
    State(state): State<AppState>,
    Path(reply_id): Path<i64>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<DeleteRepliesResponse>, ApiError> {
    let deleted = with_db(&state, move |db| {
        let Some(reply) = db.get_reply(reply_id)? else {
            return Ok(Vec::new());
        };
        let reply = reply.into_reply();

        let allowed = identity.is_admin()
            || identity.is_author(reply.author)
            || match db.get_message(reply.message_id)? {
                Some(message) => identity.can_moderate(&message.into_message()),
                None => false,
            };
        if !allowed {
            return Err(ApiError::Forbidden);
        }

        Ok(db.delete_reply_cascade(reply_id)?)
    })
    .await?;

    if !deleted.is_empty() {
        info!(reply_id, count = deleted.len(), ?identity, "Replies deleted");
    }
    Ok(Json(DeleteRepliesResponse { deleted }))
}
