//! Database repository layer
//!
//! Provides query and insert operations for all entity types.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::*;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Busy timeout used when no configuration is supplied
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Format a timestamp the way every table stores it.
///
/// Fixed millisecond precision keeps the text sortable in time order.
pub fn to_db_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn get_ts(row: &Row, column: &str) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(column)?;
    parse_ts(row, column, &raw)
}

fn get_opt_ts(row: &Row, column: &str) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(column)?;
    raw.map(|s| parse_ts(row, column, &s)).transpose()
}

fn parse_ts(row: &Row, column: &str, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            let idx = row.as_ref().column_index(column).unwrap_or(0);
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn parse_enum<T: std::str::FromStr<Err = String>>(
    row: &Row,
    column: &str,
) -> rusqlite::Result<T> {
    let raw: String = row.get(column)?;
    raw.parse().map_err(|e: String| {
        let idx = row.as_ref().column_index(column).unwrap_or(0);
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            e.into(),
        )
    })
}

/// Milliseconds from `start` to `end`, never negative
fn elapsed_ms(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    end.signed_duration_since(start).num_milliseconds().max(0)
}

/// Database handle owning a single SQLite connection
pub struct Database {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Open the database described by a resolved configuration
    pub fn open_configured(config: &Config) -> Result<Self> {
        Self::open_with_timeout(
            &config.database_path(),
            Duration::from_millis(config.storage.busy_timeout_ms),
        )
    }

    /// Open or create a database, waiting up to `busy_timeout` on locked writes
    pub fn open_with_timeout(path: &Path, busy_timeout: Duration) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
                tracing::info!(dir = %parent.display(), "Created directory");
            }
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;

        // Foreign keys are per-connection; WAL lets hook processes write concurrently
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        tracing::debug!(path = %path.display(), "Database opened");

        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self { conn, path: None })
    }

    /// Run pending migrations on this database
    pub fn migrate(&self) -> Result<()> {
        super::schema::run_migrations(&self.conn).map_err(|e| {
            tracing::error!(error = %e, "Migration failed");
            e
        })
    }

    /// Current `PRAGMA user_version`
    pub fn schema_version(&self) -> Result<i32> {
        super::schema::get_schema_version(&self.conn)
    }

    /// File this handle was opened at; `None` for in-memory databases
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    // ============================================
    // Session operations
    // ============================================

    /// Make sure a session row exists, creating an active one if absent.
    ///
    /// Returns `true` if this call created the row. Concurrent callers racing
    /// on the same id see exactly one winner; the rest are no-ops.
    pub fn ensure_session(&self, id: &str, project_path: &str) -> Result<bool> {
        self.insert_session_if_absent(&Session::started(id, project_path))
    }

    /// Insert a session unless one with the same id already exists
    pub fn insert_session_if_absent(&self, session: &Session) -> Result<bool> {
        let inserted = self.conn.execute(
            r#"
            INSERT INTO sessions (id, project_path, git_repo_url, started_at, ended_at,
                                  duration_ms, total_tokens, status)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(id) DO NOTHING
            "#,
            params![
                session.id,
                session.project_path,
                session.git_repo_url,
                to_db_timestamp(&session.started_at),
                session.ended_at.as_ref().map(to_db_timestamp),
                session.duration_ms,
                session.total_tokens,
                session.status.as_str(),
            ],
        )?;

        if inserted == 1 {
            tracing::debug!(session_id = %session.id, "Session created");
        }
        Ok(inserted == 1)
    }

    /// Get a session by ID
    pub fn get_session(&self, id: &str) -> Result<Option<Session>> {
        self.conn
            .query_row("SELECT * FROM sessions WHERE id = ?", [id], |row| {
                Self::row_to_session(row)
            })
            .optional()
            .map_err(Error::from)
    }

    /// Most recently started sessions, newest first
    pub fn recent_sessions(&self, limit: usize) -> Result<Vec<Session>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM sessions ORDER BY started_at DESC, id DESC LIMIT ?")?;
        let sessions = stmt
            .query_map([limit as i64], Self::row_to_session)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    /// Close a session that has not ended yet.
    ///
    /// Sets the end time, the duration since start and the final status.
    /// Returns `false` if the session is unknown or already ended.
    pub fn end_session(
        &self,
        id: &str,
        status: SessionStatus,
        ended_at: DateTime<Utc>,
    ) -> Result<bool> {
        let Some(session) = self.get_session(id)? else {
            return Ok(false);
        };
        if session.is_ended() {
            return Ok(false);
        }

        let updated = self.conn.execute(
            r#"
            UPDATE sessions
            SET ended_at = ?1, duration_ms = ?2, status = ?3
            WHERE id = ?4 AND ended_at IS NULL
            "#,
            params![
                to_db_timestamp(&ended_at),
                elapsed_ms(session.started_at, ended_at),
                status.as_str(),
                id,
            ],
        )?;
        Ok(updated == 1)
    }

    fn row_to_session(row: &Row) -> rusqlite::Result<Session> {
        Ok(Session {
            id: row.get("id")?,
            project_path: row.get("project_path")?,
            git_repo_url: row.get("git_repo_url")?,
            started_at: get_ts(row, "started_at")?,
            ended_at: get_opt_ts(row, "ended_at")?,
            duration_ms: row.get("duration_ms")?,
            total_tokens: row.get::<_, Option<i64>>("total_tokens")?.unwrap_or(0),
            status: parse_enum(row, "status")?,
        })
    }

    // ============================================
    // Tool call operations
    // ============================================

    /// Insert a tool call
    pub fn insert_tool_call(&self, call: &ToolCall) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO tool_calls (id, session_id, tool_name, started_at, ended_at, duration_ms,
                                    input_tokens, output_tokens, success, error_message,
                                    parameters, result)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                call.id,
                call.session_id,
                call.tool_name,
                to_db_timestamp(&call.started_at),
                call.ended_at.as_ref().map(to_db_timestamp),
                call.duration_ms,
                call.input_tokens,
                call.output_tokens,
                call.success,
                call.error_message,
                call.parameters,
                call.result,
            ],
        )?;
        Ok(())
    }

    /// Get a tool call by ID
    pub fn get_tool_call(&self, id: &str) -> Result<Option<ToolCall>> {
        self.conn
            .query_row("SELECT * FROM tool_calls WHERE id = ?", [id], |row| {
                Self::row_to_tool_call(row)
            })
            .optional()
            .map_err(Error::from)
    }

    /// The most recently started open call of `tool_name` in a session.
    ///
    /// Calls started in the same millisecond resolve to the later insert.
    pub fn find_open_tool_call(&self, session_id: &str, tool_name: &str) -> Result<Option<ToolCall>> {
        self.conn
            .query_row(
                r#"
                SELECT * FROM tool_calls
                WHERE session_id = ?1 AND tool_name = ?2 AND ended_at IS NULL
                ORDER BY started_at DESC, rowid DESC
                LIMIT 1
                "#,
                params![session_id, tool_name],
                Self::row_to_tool_call,
            )
            .optional()
            .map_err(Error::from)
    }

    /// Close an open tool call. Returns `false` if it was already closed.
    pub fn complete_tool_call(&self, id: &str, completion: &ToolCallCompletion) -> Result<bool> {
        let updated = self.conn.execute(
            r#"
            UPDATE tool_calls
            SET ended_at = ?1, duration_ms = ?2, success = ?3, error_message = ?4, result = ?5
            WHERE id = ?6 AND ended_at IS NULL
            "#,
            params![
                to_db_timestamp(&completion.ended_at),
                completion.duration_ms,
                completion.success,
                completion.error_message,
                completion.result,
                id,
            ],
        )?;
        Ok(updated == 1)
    }

    /// All tool calls of a session in start order
    pub fn list_session_tool_calls(&self, session_id: &str) -> Result<Vec<ToolCall>> {
        let mut stmt = self.conn.prepare(
            "SELECT * FROM tool_calls WHERE session_id = ? ORDER BY started_at ASC, rowid ASC",
        )?;
        let calls = stmt
            .query_map([session_id], Self::row_to_tool_call)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(calls)
    }

    fn row_to_tool_call(row: &Row) -> rusqlite::Result<ToolCall> {
        Ok(ToolCall {
            id: row.get("id")?,
            session_id: row.get("session_id")?,
            tool_name: row.get("tool_name")?,
            started_at: get_ts(row, "started_at")?,
            ended_at: get_opt_ts(row, "ended_at")?,
            duration_ms: row.get("duration_ms")?,
            input_tokens: row.get::<_, Option<i64>>("input_tokens")?.unwrap_or(0),
            output_tokens: row.get::<_, Option<i64>>("output_tokens")?.unwrap_or(0),
            success: row.get("success")?,
            error_message: row.get("error_message")?,
            parameters: row.get("parameters")?,
            result: row.get("result")?,
        })
    }

    // ============================================
    // User prompt operations
    // ============================================

    /// Insert a user prompt
    pub fn insert_user_prompt(&self, prompt: &UserPrompt) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO user_prompts (id, session_id, timestamp, prompt, is_interruption, tokens_used)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                prompt.id,
                prompt.session_id,
                to_db_timestamp(&prompt.timestamp),
                prompt.prompt,
                prompt.is_interruption,
                prompt.tokens_used,
            ],
        )?;
        Ok(())
    }

    /// Prompts of a session in submission order
    pub fn list_session_prompts(&self, session_id: &str) -> Result<Vec<UserPrompt>> {
        let mut stmt = self.conn.prepare(
            "SELECT * FROM user_prompts WHERE session_id = ? ORDER BY timestamp ASC, rowid ASC",
        )?;
        let prompts = stmt
            .query_map([session_id], |row| {
                Ok(UserPrompt {
                    id: row.get("id")?,
                    session_id: row.get("session_id")?,
                    timestamp: get_ts(row, "timestamp")?,
                    prompt: row.get("prompt")?,
                    is_interruption: row
                        .get::<_, Option<bool>>("is_interruption")?
                        .unwrap_or(false),
                    tokens_used: row.get::<_, Option<i64>>("tokens_used")?.unwrap_or(0),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(prompts)
    }

    // ============================================
    // Agent call operations
    // ============================================

    /// Insert an agent call
    pub fn insert_agent_call(&self, agent: &AgentCall) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO agent_calls (id, session_id, parent_agent_id, agent_type, started_at,
                                     ended_at, duration_ms, total_tokens, status, result)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                agent.id,
                agent.session_id,
                agent.parent_agent_id,
                agent.agent_type,
                to_db_timestamp(&agent.started_at),
                agent.ended_at.as_ref().map(to_db_timestamp),
                agent.duration_ms,
                agent.total_tokens,
                agent.status.as_str(),
                agent.result,
            ],
        )?;
        Ok(())
    }

    /// Get an agent call by ID
    pub fn get_agent_call(&self, id: &str) -> Result<Option<AgentCall>> {
        self.conn
            .query_row("SELECT * FROM agent_calls WHERE id = ?", [id], |row| {
                Self::row_to_agent_call(row)
            })
            .optional()
            .map_err(Error::from)
    }

    /// Agents spawned directly by `parent_agent_id`
    pub fn list_child_agents(&self, parent_agent_id: &str) -> Result<Vec<AgentCall>> {
        let mut stmt = self.conn.prepare(
            "SELECT * FROM agent_calls WHERE parent_agent_id = ? ORDER BY started_at ASC, rowid ASC",
        )?;
        let agents = stmt
            .query_map([parent_agent_id], Self::row_to_agent_call)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(agents)
    }

    /// Close an active agent call. Returns `false` if unknown or already closed.
    pub fn complete_agent_call(
        &self,
        id: &str,
        status: AgentStatus,
        ended_at: DateTime<Utc>,
        total_tokens: i64,
        result: Option<&str>,
    ) -> Result<bool> {
        let Some(agent) = self.get_agent_call(id)? else {
            return Ok(false);
        };

        let updated = self.conn.execute(
            r#"
            UPDATE agent_calls
            SET ended_at = ?1, duration_ms = ?2, total_tokens = ?3, status = ?4, result = ?5
            WHERE id = ?6 AND ended_at IS NULL
            "#,
            params![
                to_db_timestamp(&ended_at),
                elapsed_ms(agent.started_at, ended_at),
                total_tokens,
                status.as_str(),
                result,
                id,
            ],
        )?;
        Ok(updated == 1)
    }

    fn row_to_agent_call(row: &Row) -> rusqlite::Result<AgentCall> {
        Ok(AgentCall {
            id: row.get("id")?,
            session_id: row.get("session_id")?,
            parent_agent_id: row.get("parent_agent_id")?,
            agent_type: row.get("agent_type")?,
            started_at: get_ts(row, "started_at")?,
            ended_at: get_opt_ts(row, "ended_at")?,
            duration_ms: row.get("duration_ms")?,
            total_tokens: row.get::<_, Option<i64>>("total_tokens")?.unwrap_or(0),
            status: parse_enum(row, "status")?,
            result: row.get("result")?,
        })
    }

    // ============================================
    // Model responses and events
    // ============================================

    /// Insert a model response
    pub fn insert_model_response(&self, response: &ModelResponse) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO model_responses (id, session_id, timestamp, response, input_tokens,
                                         output_tokens, model_name)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                response.id,
                response.session_id,
                to_db_timestamp(&response.timestamp),
                response.response,
                response.input_tokens,
                response.output_tokens,
                response.model_name,
            ],
        )?;
        Ok(())
    }

    /// Insert a lifecycle event
    pub fn insert_event(&self, event: &Event) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO events (id, session_id, timestamp, event_type, event_data)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                event.id,
                event.session_id,
                to_db_timestamp(&event.timestamp),
                event.event_type,
                event.event_data,
            ],
        )?;
        Ok(())
    }

    // ============================================
    // Statistics
    // ============================================

    /// Row count of every table
    pub fn table_counts(&self) -> Result<TableCounts> {
        let counts = self.conn.query_row(
            r#"
            SELECT
                (SELECT COUNT(*) FROM sessions),
                (SELECT COUNT(*) FROM tool_calls),
                (SELECT COUNT(*) FROM user_prompts),
                (SELECT COUNT(*) FROM agent_calls),
                (SELECT COUNT(*) FROM model_responses),
                (SELECT COUNT(*) FROM events)
            "#,
            [],
            |row| {
                Ok(TableCounts {
                    sessions: row.get(0)?,
                    tool_calls: row.get(1)?,
                    user_prompts: row.get(2)?,
                    agent_calls: row.get(3)?,
                    model_responses: row.get(4)?,
                    events: row.get(5)?,
                })
            },
        )?;
        Ok(counts)
    }
}
