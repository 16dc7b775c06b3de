//! Database row types. These map directly to SQLite rows; `into_*` converts
//! them into the shared models served by the API.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use tracing::warn;

use whisper_types::models::{AuthorRef, Message, Notification, Reply};

pub struct MessageRow {
    pub id: i64,
    pub owner_user_id: Option<i64>,
    pub owner_admin_id: Option<i64>,
    pub content: String,
    pub nickname: String,
    pub created_at: String,
}

pub struct ReplyRow {
    pub id: i64,
    pub message_id: i64,
    pub parent_id: Option<i64>,
    pub content: String,
    pub user_id: Option<i64>,
    pub admin_id: Option<i64>,
    pub nickname: String,
    pub created_at: String,
}

pub struct NotificationRow {
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
    pub created_at: String,
}

/// Columns for a new notification.
pub struct NewNotification<'a> {
    pub recipient: AuthorRef,
    pub message_id: i64,
    pub reply_id: i64,
    pub from: AuthorRef,
    pub from_nickname: &'a str,
    pub content_preview: &'a str,
}

impl MessageRow {
    pub fn into_message(self) -> Message {
        Message {
            created_at: parse_timestamp(&self.created_at, "message", self.id),
            id: self.id,
            owner_user_id: self.owner_user_id,
            owner_admin_id: self.owner_admin_id,
            content: self.content,
            nickname: self.nickname,
        }
    }
}

impl ReplyRow {
    pub fn into_reply(self) -> Reply {
        Reply {
            created_at: parse_timestamp(&self.created_at, "reply", self.id),
            id: self.id,
            message_id: self.message_id,
            parent_id: self.parent_id,
            content: self.content,
            author: AuthorRef::from_columns(self.user_id, self.admin_id),
            nickname: self.nickname,
        }
    }
}

impl NotificationRow {
    pub fn into_notification(self) -> Notification {
        Notification {
            created_at: parse_timestamp(&self.created_at, "notification", self.id),
            id: self.id,
            user_id: self.user_id,
            admin_id: self.admin_id,
            message_id: self.message_id,
            reply_id: self.reply_id,
            from_nickname: self.from_nickname,
            from_user_id: self.from_user_id,
            from_admin_id: self.from_admin_id,
            content_preview: self.content_preview,
            read: self.read,
        }
    }
}

/// Timestamp format written by this crate. Fixed width, so text order is
/// chronological order.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str, kind: &str, id: i64) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite's datetime('now') has no timezone; treat it as UTC.
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt created_at '{}' on {} {}: {}", raw, kind, id, e);
            DateTime::default()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_written_and_sqlite_formats() {
        let written = now_timestamp();
        assert!(parse_timestamp(&written, "reply", 1) > DateTime::<Utc>::default());

        let sqlite = parse_timestamp("2024-03-01 12:30:00", "reply", 1);
        assert_eq!(sqlite.to_rfc3339(), "2024-03-01T12:30:00+00:00");
    }

    #[test]
    fn corrupt_timestamp_defaults() {
        assert_eq!(parse_timestamp("yesterday", "reply", 1), DateTime::<Utc>::default());
    }
}
