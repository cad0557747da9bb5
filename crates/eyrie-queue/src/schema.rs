use rusqlite::Connection;

/// One row per scheduled delivery. `attempt` counts previous tries.
/// `scheduled_at` and `locked_until` are Unix milliseconds; a row whose
/// `locked_until` is in the future is leased to a consumer.
pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS queue (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    name          TEXT    NOT NULL,
    payload       BLOB    NOT NULL,
    attempt       INTEGER NOT NULL DEFAULT 0,
    scheduled_at  INTEGER NOT NULL,
    locked_until  INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS queue_due ON queue (name, scheduled_at);
";

pub fn migrate(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA)
}
