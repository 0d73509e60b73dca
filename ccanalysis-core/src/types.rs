//! Core domain types for ccanalysis
//!
//! These types mirror the rows recorded for a coding-assistant session.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Session** | One continuous assistant interaction, scoped to a project path |
//! | **ToolCall** | One tool invocation (Bash, Read, Edit, ...) with a start and an end |
//! | **UserPrompt** | Text submitted by the human |
//! | **AgentCall** | A sub-agent spawned by the assistant; may have a parent agent |
//! | **ModelResponse** | A response produced by the backing model |
//! | **Event** | A free-form lifecycle event (`session_start`, `error`, ...) |
//!
//! A tool call is *open* while `ended_at` is `None`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================
// Session
// ============================================

/// Lifecycle status of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Active,
    Completed,
    Interrupted,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Interrupted => "interrupted",
        }
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SessionStatus::Active),
            "completed" => Ok(SessionStatus::Completed),
            "interrupted" => Ok(SessionStatus::Interrupted),
            _ => Err(format!("unknown session status: {}", s)),
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A session represents one continuous interaction with the assistant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session id supplied by the assistant
    pub id: String,
    /// Working directory the session runs in
    pub project_path: String,
    /// Remote URL of the project's git repository, if known
    pub git_repo_url: Option<String>,
    /// When the session was first seen
    pub started_at: DateTime<Utc>,
    /// When the session ended
    pub ended_at: Option<DateTime<Utc>>,
    /// Milliseconds between start and end
    pub duration_ms: Option<i64>,
    /// Tokens consumed across the session
    pub total_tokens: i64,
    pub status: SessionStatus,
}

impl Session {
    /// A freshly started, active session with no tokens recorded
    pub fn started(id: impl Into<String>, project_path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            project_path: project_path.into(),
            git_repo_url: None,
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: None,
            total_tokens: 0,
            status: SessionStatus::Active,
        }
    }

    pub fn is_ended(&self) -> bool {
        self.ended_at.is_some()
    }
}

// ============================================
// Tool calls
// ============================================

/// A single tool invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub session_id: String,
    pub tool_name: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub input_tokens: i64,
    pub output_tokens: i64,
    /// `None` until the call completes
    pub success: Option<bool>,
    pub error_message: Option<String>,
    /// Tool input, serialized as JSON
    pub parameters: Option<String>,
    /// Tool response, serialized as JSON
    pub result: Option<String>,
}

impl ToolCall {
    /// An open tool call starting now, with zero token counts
    pub fn started(
        session_id: impl Into<String>,
        tool_name: impl Into<String>,
        parameters: Option<String>,
    ) -> Self {
        Self {
            id: crate::ids::generate_id(),
            session_id: session_id.into(),
            tool_name: tool_name.into(),
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: None,
            input_tokens: 0,
            output_tokens: 0,
            success: None,
            error_message: None,
            parameters,
            result: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// Fields written when an open tool call is closed
#[derive(Debug, Clone)]
pub struct ToolCallCompletion {
    pub ended_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub success: bool,
    pub error_message: Option<String>,
    pub result: Option<String>,
}

// ============================================
// User prompts
// ============================================

/// Text submitted by the human; immutable once recorded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPrompt {
    pub id: String,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub prompt: String,
    /// Whether the prompt interrupted the assistant mid-turn
    pub is_interruption: bool,
    pub tokens_used: i64,
}

impl UserPrompt {
    pub fn submitted(session_id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            id: crate::ids::generate_id(),
            session_id: session_id.into(),
            timestamp: Utc::now(),
            prompt: prompt.into(),
            is_interruption: false,
            tokens_used: 0,
        }
    }
}

// ============================================
// Agent calls
// ============================================

/// Lifecycle status of a sub-agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    #[default]
    Active,
    Completed,
    Failed,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Active => "active",
            AgentStatus::Completed => "completed",
            AgentStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for AgentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(AgentStatus::Active),
            "completed" => Ok(AgentStatus::Completed),
            "failed" => Ok(AgentStatus::Failed),
            _ => Err(format!("unknown agent status: {}", s)),
        }
    }
}

/// A sub-agent spawned during a session.
///
/// `parent_agent_id` links nested spawns into a tree; root agents have none.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCall {
    pub id: String,
    pub session_id: String,
    pub parent_agent_id: Option<String>,
    pub agent_type: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub total_tokens: i64,
    pub status: AgentStatus,
    /// Agent result, serialized as JSON
    pub result: Option<String>,
}

impl AgentCall {
    pub fn started(
        session_id: impl Into<String>,
        agent_type: impl Into<String>,
        parent_agent_id: Option<String>,
    ) -> Self {
        Self {
            id: crate::ids::generate_id(),
            session_id: session_id.into(),
            parent_agent_id,
            agent_type: agent_type.into(),
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: None,
            total_tokens: 0,
            status: AgentStatus::Active,
            result: None,
        }
    }
}

// ============================================
// Model responses and events
// ============================================

/// A response produced by the backing model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    pub id: String,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub response: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub model_name: Option<String>,
}

/// A free-form lifecycle event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    /// e.g. `session_start`, `session_end`, `error`
    pub event_type: String,
    /// Additional data, serialized as JSON
    pub event_data: Option<String>,
}

impl Event {
    pub fn now(
        session_id: impl Into<String>,
        event_type: impl Into<String>,
        event_data: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: crate::ids::generate_id(),
            session_id: session_id.into(),
            timestamp: Utc::now(),
            event_type: event_type.into(),
            event_data: event_data.map(|v| v.to_string()),
        }
    }
}

// ============================================
// Statistics
// ============================================

/// Row counts for every table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    pub sessions: i64,
    pub tool_calls: i64,
    pub user_prompts: i64,
    pub agent_calls: i64,
    pub model_responses: i64,
    pub events: i64,
}

impl TableCounts {
    /// `(label, count)` pairs in display order
    pub fn rows(&self) -> [(&'static str, i64); 6] {
        [
            ("Sessions", self.sessions),
            ("Tool Calls", self.tool_calls),
            ("User Prompts", self.user_prompts),
            ("Agent Calls", self.agent_calls),
            ("Model Responses", self.model_responses),
            ("Events", self.events),
        ]
    }
}
