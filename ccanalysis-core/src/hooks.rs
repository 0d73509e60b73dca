//! Assistant hook handlers
//!
//! Each tracking command is invoked by the assistant's hook runner with a JSON
//! payload on stdin and must answer with a fixed JSON shape. Handling runs in
//! two tiers: [`Hook::parse`] and [`HookPayload::apply`] produce an ordinary
//! [`Result`], then [`Hook::respond`] maps any outcome to the response the
//! hook runner expects. Errors are logged, never surfaced.

use crate::db::Database;
use crate::error::{Error, Result};
use crate::types::{SessionStatus, ToolCall, ToolCallCompletion, UserPrompt};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

/// Lifecycle hooks ccanalysis can be attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    /// PreToolUse
    ToolStart,
    /// PostToolUse
    ToolEnd,
    /// UserPromptSubmit
    Prompt,
    /// Stop / SessionEnd
    SessionEnd,
}

/// Fixed response printed for a hook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookResponse {
    /// `{"decision":"allow"}`
    Allow,
    /// `{}`
    Empty,
}

impl HookResponse {
    pub fn to_json(&self) -> Value {
        match self {
            HookResponse::Allow => serde_json::json!({ "decision": "allow" }),
            HookResponse::Empty => serde_json::json!({}),
        }
    }
}

impl std::fmt::Display for HookResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

/// `track-tool-start` payload
#[derive(Debug, Clone, Deserialize)]
pub struct ToolStartInput {
    pub session_id: String,
    pub cwd: String,
    pub tool_name: String,
    #[serde(default)]
    pub tool_input: Option<Value>,
}

/// `track-tool-end` payload
#[derive(Debug, Clone, Deserialize)]
pub struct ToolEndInput {
    pub session_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub tool_response: Option<Value>,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// `track-prompt` payload
#[derive(Debug, Clone, Deserialize)]
pub struct PromptInput {
    pub session_id: String,
    pub cwd: String,
    pub user_prompt: String,
}

/// `track-session-end` payload
#[derive(Debug, Clone, Deserialize)]
pub struct SessionEndInput {
    pub session_id: String,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// A parsed hook payload, ready to be applied
#[derive(Debug, Clone)]
pub enum HookPayload {
    ToolStart(ToolStartInput),
    ToolEnd(ToolEndInput),
    Prompt(PromptInput),
    SessionEnd(SessionEndInput),
}

impl Hook {
    /// CLI command name for this hook
    pub fn command_name(&self) -> &'static str {
        match self {
            Hook::ToolStart => "track-tool-start",
            Hook::ToolEnd => "track-tool-end",
            Hook::Prompt => "track-prompt",
            Hook::SessionEnd => "track-session-end",
        }
    }

    /// The response this hook always answers with
    pub fn response(&self) -> HookResponse {
        match self {
            Hook::ToolStart => HookResponse::Allow,
            Hook::ToolEnd | Hook::Prompt | Hook::SessionEnd => HookResponse::Empty,
        }
    }

    /// Parse raw stdin into this hook's payload
    pub fn parse(&self, input: &str) -> Result<HookPayload> {
        let payload = match self {
            Hook::ToolStart => HookPayload::ToolStart(serde_json::from_str(input)?),
            Hook::ToolEnd => HookPayload::ToolEnd(serde_json::from_str(input)?),
            Hook::Prompt => HookPayload::Prompt(serde_json::from_str(input)?),
            Hook::SessionEnd => HookPayload::SessionEnd(serde_json::from_str(input)?),
        };
        payload.validate()?;
        Ok(payload)
    }

    /// Map the outcome of handling this hook to its fixed response.
    ///
    /// Failures are logged and otherwise ignored.
    pub fn respond<T>(&self, outcome: Result<T>) -> HookResponse {
        if let Err(e) = outcome {
            tracing::warn!(hook = self.command_name(), error = %e, "Hook tracking failed");
        }
        self.response()
    }
}

impl HookPayload {
    fn session_id(&self) -> &str {
        match self {
            HookPayload::ToolStart(p) => &p.session_id,
            HookPayload::ToolEnd(p) => &p.session_id,
            HookPayload::Prompt(p) => &p.session_id,
            HookPayload::SessionEnd(p) => &p.session_id,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.session_id().is_empty() {
            return Err(Error::Payload("session_id is empty".to_string()));
        }
        Ok(())
    }

    /// Record this payload in the database
    pub fn apply(self, db: &Database) -> Result<()> {
        match self {
            HookPayload::ToolStart(input) => track_tool_start(db, input).map(|_| ()),
            HookPayload::ToolEnd(input) => track_tool_end(db, input).map(|_| ()),
            HookPayload::Prompt(input) => track_prompt(db, input).map(|_| ()),
            HookPayload::SessionEnd(input) => track_session_end(db, input).map(|_| ()),
        }
    }
}

/// Open a tool call. Returns the new tool call id.
pub fn track_tool_start(db: &Database, input: ToolStartInput) -> Result<String> {
    db.ensure_session(&input.session_id, &input.cwd)?;

    let parameters = input.tool_input.as_ref().map(serde_json::to_string).transpose()?;
    let call = ToolCall::started(input.session_id, input.tool_name, parameters);
    db.insert_tool_call(&call)?;

    tracing::debug!(
        session_id = %call.session_id,
        tool_name = %call.tool_name,
        tool_call_id = %call.id,
        "Tool call started"
    );
    Ok(call.id)
}

/// Close the most recent open call of the tool in the session.
///
/// Returns the id of the closed call, or `None` when nothing was open.
pub fn track_tool_end(db: &Database, input: ToolEndInput) -> Result<Option<String>> {
    let Some(open) = db.find_open_tool_call(&input.session_id, &input.tool_name)? else {
        tracing::debug!(
            session_id = %input.session_id,
            tool_name = %input.tool_name,
            "No open tool call to close"
        );
        return Ok(None);
    };

    let ended_at = Utc::now();
    let result = match input.tool_response {
        Some(ref value) if !is_falsy(value) => Some(serde_json::to_string(value)?),
        _ => None,
    };
    let completion = ToolCallCompletion {
        ended_at,
        duration_ms: ended_at
            .signed_duration_since(open.started_at)
            .num_milliseconds()
            .max(0),
        success: input.success.unwrap_or(true),
        error_message: input.error_message,
        result,
    };

    if !db.complete_tool_call(&open.id, &completion)? {
        // Another process closed it between lookup and update
        return Ok(None);
    }

    tracing::debug!(
        tool_call_id = %open.id,
        duration_ms = completion.duration_ms,
        success = completion.success,
        "Tool call completed"
    );
    Ok(Some(open.id))
}

/// Record a submitted prompt. Returns the new prompt id.
pub fn track_prompt(db: &Database, input: PromptInput) -> Result<String> {
    db.ensure_session(&input.session_id, &input.cwd)?;

    let prompt = UserPrompt::submitted(input.session_id, input.user_prompt);
    db.insert_user_prompt(&prompt)?;
    Ok(prompt.id)
}

/// Mark a session as ended. Returns `false` if it had already ended.
pub fn track_session_end(db: &Database, input: SessionEndInput) -> Result<bool> {
    let project_path = input.cwd.as_deref().unwrap_or_default();
    db.ensure_session(&input.session_id, project_path)?;

    let status = match input.reason.as_deref() {
        Some("interrupted") | Some("interrupt") => SessionStatus::Interrupted,
        _ => SessionStatus::Completed,
    };
    let ended = db.end_session(&input.session_id, status, Utc::now())?;

    tracing::debug!(session_id = %input.session_id, %status, ended, "Session end tracked");
    Ok(ended)
}

/// `null`, `false`, `0` and `""` count as "no response"
fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}
