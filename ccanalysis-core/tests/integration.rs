//! Integration tests for file-backed databases
//!
//! Each hook invocation is a separate process with its own connection, so
//! these tests open several handles on one file to mimic that.

use ccanalysis_core::db::{Database, SCHEMA_VERSION};
use ccanalysis_core::{Config, Hook, HookResponse, SessionStatus};
use std::path::PathBuf;
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;

fn db_path(dir: &TempDir) -> PathBuf {
    dir.path().join(".ccanalysis").join("data.sqlite")
}

fn open_migrated(path: &PathBuf) -> Database {
    let db = Database::open(path).expect("open should succeed");
    db.migrate().expect("migrations should succeed");
    db
}

fn run_hook(path: &PathBuf, hook: Hook, input: &str) -> HookResponse {
    let outcome = hook.parse(input).and_then(|payload| {
        let db = open_migrated(path);
        payload.apply(&db)
    });
    hook.respond(outcome)
}

// ============================================
// Opening and migrating
// ============================================

#[test]
fn test_open_creates_directory_and_file() {
    let dir = TempDir::new().unwrap();
    let path = db_path(&dir);
    assert!(!path.parent().unwrap().exists());

    let db = open_migrated(&path);

    assert!(path.exists());
    assert_eq!(db.path(), Some(path.as_path()));
    assert_eq!(db.schema_version().unwrap(), SCHEMA_VERSION);
}

#[test]
fn test_reopen_keeps_data_and_version() {
    let dir = TempDir::new().unwrap();
    let path = db_path(&dir);

    {
        let db = open_migrated(&path);
        db.ensure_session("s1", "/p").unwrap();
    }

    let db = open_migrated(&path);
    assert_eq!(db.schema_version().unwrap(), SCHEMA_VERSION);
    assert_eq!(db.table_counts().unwrap().sessions, 1);
}

#[test]
fn test_open_configured_uses_storage_override() {
    let dir = TempDir::new().unwrap();
    let custom = dir.path().join("custom").join("tracker.sqlite");
    std::fs::create_dir_all(dir.path().join("app")).unwrap();
    std::fs::write(
        dir.path().join("app").join("config.toml"),
        format!(
            "[storage]\ndatabase_path = {:?}\nbusy_timeout_ms = 100\n",
            custom.display().to_string()
        ),
    )
    .unwrap();

    let config = Config::load_in(dir.path().join("app")).unwrap();
    let db = Database::open_configured(&config).unwrap();
    db.migrate().unwrap();

    assert_eq!(db.path(), Some(custom.as_path()));
    assert!(custom.exists());
}

// ============================================
// Hooks across connections
// ============================================

#[test]
fn test_tool_round_trip_across_processes() {
    let dir = TempDir::new().unwrap();
    let path = db_path(&dir);

    let start = run_hook(
        &path,
        Hook::ToolStart,
        r#"{"session_id":"s1","cwd":"/p","tool_name":"Read","tool_input":{"file":"a.txt"}}"#,
    );
    let end = run_hook(
        &path,
        Hook::ToolEnd,
        r#"{"session_id":"s1","tool_name":"Read","tool_response":"ok","success":true}"#,
    );
    assert_eq!(start, HookResponse::Allow);
    assert_eq!(end, HookResponse::Empty);

    let db = open_migrated(&path);
    let calls = db.list_session_tool_calls("s1").unwrap();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].started_at <= calls[0].ended_at.unwrap());
    assert_eq!(calls[0].result.as_deref(), Some(r#""ok""#));
    assert_eq!(
        db.get_session("s1").unwrap().unwrap().status,
        SessionStatus::Active
    );
}

#[test]
fn test_concurrent_session_creation_has_one_winner() {
    let dir = TempDir::new().unwrap();
    let path = db_path(&dir);
    open_migrated(&path);

    let workers = 8;
    let barrier = Arc::new(Barrier::new(workers));
    let handles: Vec<_> = (0..workers)
        .map(|_| {
            let barrier = Arc::clone(&barrier);
            let path = path.clone();
            thread::spawn(move || {
                let db = Database::open(&path).unwrap();
                barrier.wait();
                db.ensure_session("racy", "/p").unwrap()
            })
        })
        .collect();

    let winners = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|created| *created)
        .count();

    assert_eq!(winners, 1);
    let db = open_migrated(&path);
    assert_eq!(db.table_counts().unwrap().sessions, 1);
}

#[test]
fn test_concurrent_tool_starts_all_recorded() {
    let dir = TempDir::new().unwrap();
    let path = db_path(&dir);
    open_migrated(&path);

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let path = path.clone();
            thread::spawn(move || {
                run_hook(
                    &path,
                    Hook::ToolStart,
                    &format!(
                        r#"{{"session_id":"burst","cwd":"/p","tool_name":"Bash","tool_input":{{"n":{}}}}}"#,
                        i
                    ),
                )
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), HookResponse::Allow);
    }

    let db = open_migrated(&path);
    let counts = db.table_counts().unwrap();
    assert_eq!(counts.sessions, 1);
    assert_eq!(counts.tool_calls, 6);
}
