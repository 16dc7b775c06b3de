use serde::{Deserialize, Serialize};

use crate::models::{Message, ThreadedReply};

// -- Token claims --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

/// Bearer token claims. Tokens are minted by the identity provider that
/// shares `WHISPER_JWT_SECRET` with this server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub role: Role,
    pub exp: usize,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateMessageRequest {
    pub content: String,
    pub nickname: String,
    pub owner_user_id: Option<i64>,
    pub owner_admin_id: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageThreadResponse {
    #[serde(flatten)]
    pub message: Message,
    pub reply_count: usize,
    pub replies: Vec<ThreadedReply>,
}

#[derive(Debug, Deserialize)]
pub struct RepliesQuery {
    #[serde(default)]
    pub preview: bool,
}

/// Collapsed thread view: the first root threads plus how many were left out.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadPreview {
    pub threads: Vec<ThreadedReply>,
    pub hidden_count: usize,
}

// -- Replies --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateReplyRequest {
    pub message_id: i64,
    pub content: String,
    pub nickname: String,
    pub parent_id: Option<i64>,
    pub user_id: Option<i64>,
    pub admin_id: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRepliesResponse {
    pub deleted: Vec<i64>,
}
