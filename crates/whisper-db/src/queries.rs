use crate::Database;
use crate::models::{MessageRow, NewNotification, NotificationRow, ReplyRow, now_timestamp};
use anyhow::Result;
use rusqlite::{Connection, params, params_from_iter};
use tracing::debug;

use whisper_types::models::AuthorRef;

const MESSAGE_COLUMNS: &str = "id, owner_user_id, owner_admin_id, content, nickname, created_at";
const REPLY_COLUMNS: &str =
    "id, message_id, parent_id, content, user_id, admin_id, nickname, created_at";
const NOTIFICATION_COLUMNS: &str = "id, user_id, admin_id, message_id, reply_id, from_nickname, \
     from_user_id, from_admin_id, content_preview, is_read, created_at";

impl Database {
    // -- Accounts --

    pub fn create_user(&self, username: &str) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute("INSERT INTO users (username) VALUES (?1)", [username])?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn create_admin(&self, name: &str) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute("INSERT INTO admins (name) VALUES (?1)", [name])?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn user_exists(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| exists(conn, "SELECT 1 FROM users WHERE id = ?1", id))
    }

    pub fn admin_exists(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| exists(conn, "SELECT 1 FROM admins WHERE id = ?1", id))
    }

    // -- Messages --

    pub fn insert_message(
        &self,
        owner_user_id: Option<i64>,
        owner_admin_id: Option<i64>,
        content: &str,
        nickname: &str,
    ) -> Result<MessageRow> {
        let created_at = now_timestamp();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (owner_user_id, owner_admin_id, content, nickname, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![owner_user_id, owner_admin_id, content, nickname, created_at],
            )?;
            Ok(MessageRow {
                id: conn.last_insert_rowid(),
                owner_user_id,
                owner_admin_id,
                content: content.to_string(),
                nickname: nickname.to_string(),
                created_at,
            })
        })
    }

    pub fn get_message(&self, id: i64) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM messages WHERE id = ?1", MESSAGE_COLUMNS);
            conn.query_row(&sql, [id], message_from_row).optional()
        })
    }

    /// Remove a message together with all of its replies and their
    /// notifications. Returns false when the message did not exist.
    pub fn delete_message(&self, id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM notifications WHERE message_id = ?1", [id])?;
            let replies = tx.execute("DELETE FROM replies WHERE message_id = ?1", [id])?;
            let removed = tx.execute("DELETE FROM messages WHERE id = ?1", [id])?;
            tx.commit()?;

            debug!(message_id = id, replies, "Deleted message");
            Ok(removed > 0)
        })
    }

    // -- Replies --

    /// Every reply on a message, unordered.
    pub fn fetch_replies(&self, message_id: i64) -> Result<Vec<ReplyRow>> {
        self.with_conn(|conn| query_replies(conn, message_id))
    }

    pub fn get_reply(&self, id: i64) -> Result<Option<ReplyRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM replies WHERE id = ?1", REPLY_COLUMNS);
            conn.query_row(&sql, [id], reply_from_row).optional()
        })
    }

    pub fn count_replies(&self, message_id: i64) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM replies WHERE message_id = ?1",
                [message_id],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
    }

    pub fn insert_reply(
        &self,
        message_id: i64,
        parent_id: Option<i64>,
        content: &str,
        author: AuthorRef,
        nickname: &str,
    ) -> Result<ReplyRow> {
        let created_at = now_timestamp();
        let (user_id, admin_id) = (author.user_id(), author.admin_id());
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO replies (message_id, parent_id, content, user_id, admin_id, nickname, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![message_id, parent_id, content, user_id, admin_id, nickname, created_at],
            )?;
            Ok(ReplyRow {
                id: conn.last_insert_rowid(),
                message_id,
                parent_id,
                content: content.to_string(),
                user_id,
                admin_id,
                nickname: nickname.to_string(),
                created_at,
            })
        })
    }

    /// Delete a reply and its whole subtree in one transaction. Returns the
    /// deleted ids; an unknown `reply_id` deletes nothing and is not an error.
    pub fn delete_reply_cascade(&self, reply_id: i64) -> Result<Vec<i64>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let message_id: Option<i64> = tx
                .query_row(
                    "SELECT message_id FROM replies WHERE id = ?1",
                    [reply_id],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(message_id) = message_id else {
                return Ok(Vec::new());
            };

            let replies = query_replies(&tx, message_id)?
                .into_iter()
                .map(ReplyRow::into_reply);
            let ids = whisper_thread::subtree_ids(replies, reply_id);

            delete_where_in(&tx, "DELETE FROM notifications WHERE reply_id IN", &ids)?;
            let removed = delete_where_in(&tx, "DELETE FROM replies WHERE id IN", &ids)?;
            tx.commit()?;

            debug!(reply_id, message_id, removed, "Cascading reply delete");
            Ok(ids)
        })
    }

    // -- Notifications --

    pub fn insert_notification(&self, new: &NewNotification<'_>) -> Result<i64> {
        let created_at = now_timestamp();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notifications (user_id, admin_id, message_id, reply_id, from_nickname,
                     from_user_id, from_admin_id, content_preview, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    new.recipient.user_id(),
                    new.recipient.admin_id(),
                    new.message_id,
                    new.reply_id,
                    new.from_nickname,
                    new.from.user_id(),
                    new.from.admin_id(),
                    new.content_preview,
                    created_at,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Notifications for a user or admin, newest first.
    pub fn get_notifications(&self, recipient: AuthorRef, limit: u32) -> Result<Vec<NotificationRow>> {
        let Some((column, id)) = recipient_column(recipient) else {
            return Ok(Vec::new());
        };
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM notifications WHERE {} = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2",
                NOTIFICATION_COLUMNS, column
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![id, limit], notification_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Returns false when the notification does not exist or belongs to
    /// someone else.
    pub fn mark_notification_read(&self, id: i64, recipient: AuthorRef) -> Result<bool> {
        let Some((column, owner)) = recipient_column(recipient) else {
            return Ok(false);
        };
        self.with_conn(|conn| {
            let sql = format!(
                "UPDATE notifications SET is_read = 1 WHERE id = ?1 AND {} = ?2",
                column
            );
            Ok(conn.execute(&sql, params![id, owner])? > 0)
        })
    }
}

fn recipient_column(recipient: AuthorRef) -> Option<(&'static str, i64)> {
    match recipient {
        AuthorRef::User(id) => Some(("user_id", id)),
        AuthorRef::Admin(id) => Some(("admin_id", id)),
        AuthorRef::Anonymous => None,
    }
}

fn exists(conn: &Connection, sql: &str, id: i64) -> Result<bool> {
    Ok(conn.query_row(sql, [id], |_| Ok(())).optional()?.is_some())
}

fn query_replies(conn: &Connection, message_id: i64) -> Result<Vec<ReplyRow>> {
    let sql = format!("SELECT {} FROM replies WHERE message_id = ?1", REPLY_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([message_id], reply_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Run `<prefix> (?1, ?2, ...)` over `ids`. Returns affected rows.
fn delete_where_in(conn: &Connection, prefix: &str, ids: &[i64]) -> Result<usize> {
    if ids.is_empty() {
        return Ok(0);
    }
    let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!("{} ({})", prefix, placeholders.join(", "));
    Ok(conn.execute(&sql, params_from_iter(ids.iter()))?)
}

fn message_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        owner_user_id: row.get(1)?,
        owner_admin_id: row.get(2)?,
        content: row.get(3)?,
        nickname: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn reply_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReplyRow> {
    Ok(ReplyRow {
        id: row.get(0)?,
        message_id: row.get(1)?,
        parent_id: row.get(2)?,
        content: row.get(3)?,
        user_id: row.get(4)?,
        admin_id: row.get(5)?,
        nickname: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn notification_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<NotificationRow> {
    Ok(NotificationRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        admin_id: row.get(2)?,
        message_id: row.get(3)?,
        reply_id: row.get(4)?,
        from_nickname: row.get(5)?,
        from_user_id: row.get(6)?,
        from_admin_id: row.get(7)?,
        content_preview: row.get(8)?,
        read: row.get(9)?,
        created_at: row.get(10)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        db: Database,
        message_id: i64,
        other_message_id: i64,
    }

    fn fixture() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let owner = db.create_user("moon").unwrap();
        let message_id = db.insert_message(Some(owner), None, "hi", "anon").unwrap().id;
        let other_message_id = db.insert_message(Some(owner), None, "yo", "anon").unwrap().id;
        Fixture {
            db,
            message_id,
            other_message_id,
        }
    }

    fn add(f: &Fixture, message_id: i64, parent: Option<i64>) -> i64 {
        f.db.insert_reply(message_id, parent, "text", AuthorRef::Anonymous, "fox")
            .unwrap()
            .id
    }

    fn reply_ids(db: &Database, message_id: i64) -> Vec<i64> {
        let mut ids: Vec<i64> = db
            .fetch_replies(message_id)
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        ids.sort();
        ids
    }

    #[test]
    fn insert_and_fetch_reply() {
        let f = fixture();
        let admin = f.db.create_admin("listener").unwrap();
        let row = f
            .db
            .insert_reply(f.message_id, None, "hello", AuthorRef::Admin(admin), "L")
            .unwrap();

        let fetched = f.db.get_reply(row.id).unwrap().unwrap().into_reply();
        assert_eq!(fetched.author, AuthorRef::Admin(admin));
        assert_eq!(fetched.content, "hello");
        assert_eq!(f.db.count_replies(f.message_id).unwrap(), 1);
        assert!(f.db.get_reply(row.id + 100).unwrap().is_none());
    }

    #[test]
    fn cascade_removes_exact_subtree() {
        let f = fixture();
        let a = add(&f, f.message_id, None);
        let b = add(&f, f.message_id, Some(a));
        let c = add(&f, f.message_id, Some(b));
        let d = add(&f, f.message_id, Some(a));
        let sibling = add(&f, f.message_id, None);
        let elsewhere = add(&f, f.other_message_id, None);

        let mut deleted = f.db.delete_reply_cascade(a).unwrap();
        deleted.sort();
        assert_eq!(deleted, vec![a, b, c, d]);

        assert_eq!(reply_ids(&f.db, f.message_id), vec![sibling]);
        assert_eq!(reply_ids(&f.db, f.other_message_id), vec![elsewhere]);
    }

    #[test]
    fn cascade_twice_is_a_noop() {
        let f = fixture();
        let a = add(&f, f.message_id, None);
        let keep = add(&f, f.message_id, None);

        assert_eq!(f.db.delete_reply_cascade(a).unwrap(), vec![a]);
        assert!(f.db.delete_reply_cascade(a).unwrap().is_empty());
        assert_eq!(reply_ids(&f.db, f.message_id), vec![keep]);
    }

    #[test]
    fn cascade_clears_notifications() {
        let f = fixture();
        let owner = f.db.create_user("sun").unwrap();
        let a = add(&f, f.message_id, None);
        let b = add(&f, f.message_id, Some(a));
        f.db.insert_notification(&NewNotification {
            recipient: AuthorRef::User(owner),
            message_id: f.message_id,
            reply_id: b,
            from: AuthorRef::Anonymous,
            from_nickname: "fox",
            content_preview: "text",
        })
        .unwrap();

        f.db.delete_reply_cascade(a).unwrap();
        assert!(f.db.get_notifications(AuthorRef::User(owner), 50).unwrap().is_empty());
    }

    #[test]
    fn delete_message_takes_replies() {
        let f = fixture();
        let a = add(&f, f.message_id, None);
        add(&f, f.message_id, Some(a));

        assert!(f.db.delete_message(f.message_id).unwrap());
        assert!(f.db.get_message(f.message_id).unwrap().is_none());
        assert_eq!(f.db.count_replies(f.message_id).unwrap(), 0);
        assert!(!f.db.delete_message(f.message_id).unwrap());
    }

    #[test]
    fn notifications_are_per_recipient() {
        let f = fixture();
        let user = f.db.create_user("sun").unwrap();
        let admin = f.db.create_admin("listener").unwrap();
        let a = add(&f, f.message_id, None);

        let id = f
            .db
            .insert_notification(&NewNotification {
                recipient: AuthorRef::User(user),
                message_id: f.message_id,
                reply_id: a,
                from: AuthorRef::Admin(admin),
                from_nickname: "L",
                content_preview: "text",
            })
            .unwrap();

        assert!(f.db.get_notifications(AuthorRef::Admin(admin), 50).unwrap().is_empty());
        assert!(!f.db.mark_notification_read(id, AuthorRef::Admin(admin)).unwrap());
        assert!(f.db.mark_notification_read(id, AuthorRef::User(user)).unwrap());

        let rows = f.db.get_notifications(AuthorRef::User(user), 50).unwrap();
        assert_eq!(rows.len(), 1);
        let n = rows.into_iter().next().unwrap().into_notification();
        assert!(n.read);
        assert_eq!(n.from_admin_id, Some(admin));
    }

    #[test]
    fn account_existence() {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user("moon").unwrap();
        assert!(db.user_exists(user).unwrap());
        assert!(!db.user_exists(user + 1).unwrap());
        assert!(!db.admin_exists(user).unwrap());
    }
}
