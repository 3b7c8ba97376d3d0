//! Version-tracked schema migrations for the libSQL store.
//!
//! `run_migrations()` reads the highest applied version from `_migrations`
//! and applies only newer steps, in order.

use libsql::Connection;

use crate::error::DatabaseError;

/// A single migration step.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. Add new versions to the end.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "initial_schema",
        sql: r#"
            CREATE TABLE IF NOT EXISTS inbox (
                id TEXT PRIMARY KEY,
                sender TEXT NOT NULL,
                body TEXT NOT NULL,
                unread INTEGER NOT NULL DEFAULT 1,
                received_at_ms INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_inbox_received ON inbox(received_at_ms);

            CREATE TABLE IF NOT EXISTS relay_state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
        "#,
    },
    Migration {
        version: 2,
        name: "inbox_sender_index",
        sql: r#"
            CREATE INDEX IF NOT EXISTS idx_inbox_sender_unread ON inbox(sender, unread);
        "#,
    },
];

/// Bring the schema up to the newest version.
pub async fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        (),
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("_migrations table: {e}")))?;

    let applied = get_current_version(conn).await?;
    let pending = MIGRATIONS.iter().filter(|m| m.version > applied);

    let mut latest = applied;
    for step in pending {
        tracing::info!(version = step.version, name = step.name, "Migrating relay schema");
        conn.execute_batch(step.sql)
            .await
            .map_err(|e| DatabaseError::Migration(format!("V{} {}: {e}", step.version, step.name)))?;
        record_version(conn, step).await?;
        latest = step.version;
    }

    tracing::debug!(from = applied, to = latest, "Relay schema up to date");
    Ok(())
}

/// Highest applied version; 0 on a fresh database.
async fn get_current_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("schema version: {e}")))?;

    let Some(row) = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Migration(format!("schema version: {e}")))?
    else {
        return Ok(0);
    };
    row.get::<i64>(0)
        .map_err(|e| DatabaseError::Migration(format!("schema version: {e}")))
}

async fn record_version(conn: &Connection, step: &Migration) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR IGNORE INTO _migrations (version, name) VALUES (?1, ?2)",
        libsql::params![step.version, step.name],
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("recording V{}: {e}", step.version)))?;
    Ok(())
}
