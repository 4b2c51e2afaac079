use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            -- Reference records managed outside the messaging core.
            -- The core only ever reads these.
            CREATE TABLE users (
                id              INTEGER PRIMARY KEY,
                display_name    TEXT NOT NULL,
                avatar          TEXT,
                created_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE properties (
                id              INTEGER PRIMARY KEY,
                owner_id        INTEGER NOT NULL REFERENCES users(id),
                title           TEXT NOT NULL,
                created_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_properties_owner
                ON properties(owner_id);

            -- One conversation per (property, guest). The host is derived
            -- through properties.owner_id, never stored here.
            CREATE TABLE conversations (
                id              INTEGER PRIMARY KEY,
                property_id     INTEGER NOT NULL REFERENCES properties(id),
                user_id         INTEGER NOT NULL REFERENCES users(id),
                created_at      TEXT NOT NULL,
                UNIQUE(property_id, user_id)
            );

            CREATE INDEX idx_conversations_user
                ON conversations(user_id);

            -- Append-only ledger. AUTOINCREMENT so ids are never reused and
            -- (created_at, id) stays a total order.
            CREATE TABLE messages (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id INTEGER NOT NULL REFERENCES conversations(id),
                sender_id       INTEGER NOT NULL REFERENCES users(id),
                message         TEXT,
                read            INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );

            CREATE INDEX idx_messages_ledger
                ON messages(conversation_id, created_at, id);

            CREATE TABLE message_files (
                id              INTEGER PRIMARY KEY,
                message_id      INTEGER NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
                type            TEXT NOT NULL CHECK (type IN ('image', 'video')),
                file_path       TEXT NOT NULL,
                file_name       TEXT NOT NULL,
                mime_type       TEXT NOT NULL,
                file_size       INTEGER NOT NULL
            );

            CREATE INDEX idx_message_files_message
                ON message_files(message_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
