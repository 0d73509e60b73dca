//! Database layer for ccanalysis
//!
//! This module provides the storage layer using SQLite with:
//! - Schema migrations
//! - Repository operations for every tracked entity

pub mod repo;
pub mod schema;

pub use repo::{to_db_timestamp, Database};
pub use schema::SCHEMA_VERSION;
