use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who wrote a reply. Anonymous replies carry only their nickname.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "AuthorFields", into = "AuthorFields")]
pub enum AuthorRef {
    User(i64),
    Admin(i64),
    Anonymous,
}

/// Wire shape of [`AuthorRef`]: at most one of the two ids is set.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorFields {
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub admin_id: Option<i64>,
}

impl AuthorRef {
    /// Build from the nullable `user_id` / `admin_id` column pair.
    /// A row with both set is read as the user, matching how it was written.
    pub fn from_columns(user_id: Option<i64>, admin_id: Option<i64>) -> Self {
        match (user_id, admin_id) {
            (Some(id), _) => Self::User(id),
            (None, Some(id)) => Self::Admin(id),
            (None, None) => Self::Anonymous,
        }
    }

    pub fn user_id(&self) -> Option<i64> {
        match self {
            Self::User(id) => Some(*id),
            _ => None,
        }
    }

    pub fn admin_id(&self) -> Option<i64> {
        match self {
            Self::Admin(id) => Some(*id),
            _ => None,
        }
    }
}

impl TryFrom<AuthorFields> for AuthorRef {
    type Error = String;

    fn try_from(fields: AuthorFields) -> Result<Self, Self::Error> {
        match (fields.user_id, fields.admin_id) {
            (Some(_), Some(_)) => Err("author cannot be both a user and an admin".to_string()),
            (user_id, admin_id) => Ok(Self::from_columns(user_id, admin_id)),
        }
    }
}

impl From<AuthorRef> for AuthorFields {
    fn from(author: AuthorRef) -> Self {
        Self {
            user_id: author.user_id(),
            admin_id: author.admin_id(),
        }
    }
}

/// A reply attached to a message, or to another reply on the same message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub id: i64,
    pub message_id: i64,
    pub parent_id: Option<i64>,
    pub content: String,
    #[serde(flatten)]
    pub author: AuthorRef,
    pub nickname: String,
    pub created_at: DateTime<Utc>,
}

/// Display view of a reply: its direct replies in chronological order and
/// its indent level, capped at the configured maximum nesting level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadedReply {
    #[serde(flatten)]
    pub reply: Reply,
    pub level: u32,
    pub children: Vec<ThreadedReply>,
}

/// An anonymous message posted to a user's or a listener's board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub owner_user_id: Option<i64>,
    pub owner_admin_id: Option<i64>,
    pub content: String,
    pub nickname: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,
    pub user_id: Option<i64>,
    pub admin_id: Option<i64>,
    pub message_id: i64,
    pub reply_id: i64,
    pub from_nickname: String,
    pub from_user_id: Option<i64>,
    pub from_admin_id: Option<i64>,
    pub content_preview: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}
