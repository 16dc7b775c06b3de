use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            username    TEXT NOT NULL UNIQUE,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Listeners: staff accounts that run their own board and moderate all threads
        CREATE TABLE IF NOT EXISTS admins (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT NOT NULL UNIQUE,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS messages (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_user_id   INTEGER REFERENCES users(id),
            owner_admin_id  INTEGER REFERENCES admins(id),
            content         TEXT NOT NULL,
            nickname        TEXT NOT NULL,
            created_at      TEXT NOT NULL,
            CHECK ((owner_user_id IS NULL) <> (owner_admin_id IS NULL))
        );

        CREATE INDEX IF NOT EXISTS idx_messages_owner_user
            ON messages(owner_user_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_messages_owner_admin
            ON messages(owner_admin_id, created_at);

        -- parent_id is not a foreign key: a reply whose parent is gone is shown at the root
        CREATE TABLE IF NOT EXISTS replies (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            message_id  INTEGER NOT NULL REFERENCES messages(id),
            parent_id   INTEGER,
            content     TEXT NOT NULL,
            user_id     INTEGER REFERENCES users(id),
            admin_id    INTEGER REFERENCES admins(id),
            nickname    TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            CHECK (user_id IS NULL OR admin_id IS NULL)
        );

        CREATE INDEX IF NOT EXISTS idx_replies_message
            ON replies(message_id, created_at);

        CREATE TABLE IF NOT EXISTS notifications (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id          INTEGER REFERENCES users(id),
            admin_id         INTEGER REFERENCES admins(id),
            message_id       INTEGER NOT NULL,
            reply_id         INTEGER NOT NULL,
            from_nickname    TEXT NOT NULL,
            from_user_id     INTEGER,
            from_admin_id    INTEGER,
            content_preview  TEXT NOT NULL,
            is_read          INTEGER NOT NULL DEFAULT 0,
            created_at       TEXT NOT NULL,
            CHECK ((user_id IS NULL) <> (admin_id IS NULL))
        );

        CREATE INDEX IF NOT EXISTS idx_notifications_user
            ON notifications(user_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_notifications_admin
            ON notifications(admin_id, created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
