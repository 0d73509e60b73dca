//! # ccanalysis-core
//!
//! Core library for ccanalysis - a coding assistant session tracker.
//!
//! This library provides:
//! - Domain types for sessions, tool calls, prompts, agents, responses and events
//! - Database storage layer with SQLite
//! - Hook handlers that turn assistant hook payloads into rows
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Example
//!
//! ```rust,no_run
//! use ccanalysis_core::{Config, Database, Hook};
//!
//! let config = Config::load().expect("failed to load config");
//! let db = Database::open_configured(&config).expect("failed to open database");
//! db.migrate().expect("failed to run migrations");
//!
//! let hook = Hook::Prompt;
//! let outcome = hook
//!     .parse(r#"{"session_id":"s1","cwd":"/p","user_prompt":"hi"}"#)
//!     .and_then(|payload| payload.apply(&db));
//! println!("{}", hook.respond(outcome));
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use db::Database;
pub use error::{Error, Result};
pub use hooks::{Hook, HookPayload, HookResponse};
pub use types::*;

// Public modules
pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod hooks;
pub mod ids;
pub mod logging;
pub mod types;
