//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.
//! Timestamps are RFC 3339 text in UTC with millisecond precision.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: Initial schema
    r#"
    CREATE TABLE IF NOT EXISTS sessions (
        id               TEXT PRIMARY KEY,
        project_path     TEXT NOT NULL,
        git_repo_url     TEXT,
        started_at       TEXT NOT NULL,
        ended_at         TEXT,
        duration_ms      INTEGER,
        total_tokens     INTEGER DEFAULT 0,
        status           TEXT NOT NULL DEFAULT 'active'   -- active, completed, interrupted
    );

    CREATE TABLE IF NOT EXISTS tool_calls (
        id               TEXT PRIMARY KEY,
        session_id       TEXT NOT NULL REFERENCES sessions(id),
        tool_name        TEXT NOT NULL,
        started_at       TEXT NOT NULL,
        ended_at         TEXT,
        duration_ms      INTEGER,
        input_tokens     INTEGER DEFAULT 0,
        output_tokens    INTEGER DEFAULT 0,
        success          INTEGER,
        error_message    TEXT,
        parameters       TEXT,   -- JSON
        result           TEXT    -- JSON
    );

    CREATE TABLE IF NOT EXISTS user_prompts (
        id               TEXT PRIMARY KEY,
        session_id       TEXT NOT NULL REFERENCES sessions(id),
        timestamp        TEXT NOT NULL,
        prompt           TEXT NOT NULL,
        is_interruption  INTEGER DEFAULT 0,
        tokens_used      INTEGER DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS agent_calls (
        id               TEXT PRIMARY KEY,
        session_id       TEXT NOT NULL REFERENCES sessions(id),
        parent_agent_id  TEXT,   -- NULL for root agents
        agent_type       TEXT NOT NULL,
        started_at       TEXT NOT NULL,
        ended_at         TEXT,
        duration_ms      INTEGER,
        total_tokens     INTEGER DEFAULT 0,
        status           TEXT NOT NULL DEFAULT 'active',  -- active, completed, failed
        result           TEXT    -- JSON
    );

    CREATE TABLE IF NOT EXISTS model_responses (
        id               TEXT PRIMARY KEY,
        session_id       TEXT NOT NULL REFERENCES sessions(id),
        timestamp        TEXT NOT NULL,
        response         TEXT NOT NULL,
        input_tokens     INTEGER DEFAULT 0,
        output_tokens    INTEGER DEFAULT 0,
        model_name       TEXT
    );

    CREATE TABLE IF NOT EXISTS events (
        id               TEXT PRIMARY KEY,
        session_id       TEXT NOT NULL REFERENCES sessions(id),
        timestamp        TEXT NOT NULL,
        event_type       TEXT NOT NULL,   -- session_start, session_end, error, ...
        event_data       TEXT             -- JSON
    );
    "#,
    // Version 2: Indexes for hook lookups and listings
    r#"
    CREATE INDEX IF NOT EXISTS idx_sessions_started_at ON sessions(started_at);
    CREATE INDEX IF NOT EXISTS idx_tool_calls_open
        ON tool_calls(session_id, tool_name, ended_at);
    CREATE INDEX IF NOT EXISTS idx_user_prompts_session ON user_prompts(session_id);
    CREATE INDEX IF NOT EXISTS idx_agent_calls_session ON agent_calls(session_id);
    CREATE INDEX IF NOT EXISTS idx_agent_calls_parent ON agent_calls(parent_agent_id);
    CREATE INDEX IF NOT EXISTS idx_model_responses_session ON model_responses(session_id);
    CREATE INDEX IF NOT EXISTS idx_events_session ON events(session_id);
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    tracing::debug!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute_batch(&format!("PRAGMA user_version = {}", version))?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}
