use ccanalysis_core::{Database, SessionStatus};
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let home = temp_dir.path().join("home");
        fs::create_dir_all(&home).expect("failed to create HOME");

        Self {
            _temp_dir: temp_dir,
            home,
        }
    }

    fn app_dir(&self) -> PathBuf {
        self.home.join(".ccanalysis")
    }

    fn db_path(&self) -> PathBuf {
        self.app_dir().join("data.sqlite")
    }

    fn open_db(&self) -> Database {
        let db = Database::open(&self.db_path()).expect("failed to open db");
        db.migrate().expect("failed to migrate db");
        db
    }
}

fn run_bin(env: &CliTestEnv, args: &[&str], stdin: Option<&str>) -> Output {
    let bin_path = PathBuf::from(assert_cmd::cargo::cargo_bin!("ccanalysis"));

    let mut child = Command::new(bin_path)
        .args(args)
        .env("HOME", &env.home)
        .env_remove("RUST_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap_or_else(|e| panic!("failed to execute ccanalysis: {e}"));

    {
        let mut pipe = child.stdin.take().expect("stdin should be piped");
        if let Some(input) = stdin {
            pipe.write_all(input.as_bytes())
                .expect("failed to write stdin");
        }
    }

    child
        .wait_with_output()
        .expect("failed to wait for ccanalysis")
}

fn assert_success(args: &[&str], output: &Output) {
    if output.status.success() {
        return;
    }

    let rendered_args = args
        .iter()
        .map(|arg| OsString::from(arg).to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    panic!(
        "ccanalysis {rendered_args} failed\nstatus: {}\nstdout:\n{}\nstderr:\n{}",
        output.status, stdout, stderr
    );
}

fn track(env: &CliTestEnv, command: &str, input: &str) -> String {
    let output = run_bin(env, &[command], Some(input));
    assert_success(&[command], &output);
    String::from_utf8_lossy(&output.stdout).trim_end().to_string()
}

#[test]
fn init_creates_database_under_home() {
    let env = CliTestEnv::new();

    let output = run_bin(&env, &["init"], None);
    assert_success(&["init"], &output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Database initialized successfully!"));
    assert!(stdout.contains(&env.db_path().display().to_string()));
    assert!(env.db_path().exists());
}

#[test]
fn tool_start_and_end_record_one_completed_call() {
    let env = CliTestEnv::new();

    let start = track(
        &env,
        "track-tool-start",
        r#"{"session_id":"s1","cwd":"/p","tool_name":"Read","tool_input":{"file":"a.txt"}}"#,
    );
    assert_eq!(start, r#"{"decision":"allow"}"#);

    let end = track(
        &env,
        "track-tool-end",
        r#"{"session_id":"s1","tool_name":"Read","tool_response":"ok","success":true}"#,
    );
    assert_eq!(end, "{}");

    let db = env.open_db();
    let session = db.get_session("s1").unwrap().expect("session s1");
    assert_eq!(session.status, SessionStatus::Active);

    let calls = db.list_session_tool_calls("s1").unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].tool_name, "Read");
    assert_eq!(calls[0].success, Some(true));
    assert!(calls[0].duration_ms.unwrap() >= 0);
    assert_eq!(calls[0].result.as_deref(), Some(r#""ok""#));
}

#[test]
fn tracking_never_fails_on_bad_input() {
    let env = CliTestEnv::new();

    assert_eq!(
        track(&env, "track-tool-start", "not json"),
        r#"{"decision":"allow"}"#
    );
    assert_eq!(track(&env, "track-tool-end", "{"), "{}");
    assert_eq!(track(&env, "track-prompt", r#"{"session_id":"s1"}"#), "{}");
    assert_eq!(track(&env, "track-session-end", ""), "{}");

    // Malformed input is rejected before the database is touched
    assert!(!env.db_path().exists());
}

#[test]
fn tracking_survives_unusable_database_path() {
    let env = CliTestEnv::new();
    // A directory where the database file should be makes opening fail
    fs::create_dir_all(env.db_path()).unwrap();

    let output = track(
        &env,
        "track-prompt",
        r#"{"session_id":"s1","cwd":"/p","user_prompt":"hello"}"#,
    );
    assert_eq!(output, "{}");
}

#[test]
fn tool_end_without_start_changes_nothing() {
    let env = CliTestEnv::new();

    let output = track(
        &env,
        "track-tool-end",
        r#"{"session_id":"ghost","tool_name":"Bash","tool_response":"x"}"#,
    );
    assert_eq!(output, "{}");

    let counts = env.open_db().table_counts().unwrap();
    assert_eq!(counts.sessions, 0);
    assert_eq!(counts.tool_calls, 0);
}

#[test]
fn status_reports_row_counts() {
    let env = CliTestEnv::new();

    track(
        &env,
        "track-prompt",
        r#"{"session_id":"s1","cwd":"/p","user_prompt":"first"}"#,
    );
    track(
        &env,
        "track-prompt",
        r#"{"session_id":"s1","cwd":"/p","user_prompt":"second"}"#,
    );
    track(
        &env,
        "track-tool-start",
        r#"{"session_id":"s2","cwd":"/q","tool_name":"Bash","tool_input":{"command":"ls"}}"#,
    );

    let output = run_bin(&env, &["status"], None);
    assert_success(&["status"], &output);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(stdout.contains("CCAnalysis Database Status"));
    assert!(stdout.contains("  Sessions: 2"), "stdout:\n{stdout}");
    assert!(stdout.contains("  Tool Calls: 1"), "stdout:\n{stdout}");
    assert!(stdout.contains("  User Prompts: 2"), "stdout:\n{stdout}");
    assert!(stdout.contains("  Agent Calls: 0"), "stdout:\n{stdout}");
    assert!(stdout.contains("  Model Responses: 0"), "stdout:\n{stdout}");
    assert!(stdout.contains("  Events: 0"), "stdout:\n{stdout}");
}

#[test]
fn sessions_lists_newest_first_and_caps_at_ten() {
    let env = CliTestEnv::new();

    for i in 0..12 {
        track(
            &env,
            "track-prompt",
            &format!(r#"{{"session_id":"session-{i:02}","cwd":"/p","user_prompt":"hi"}}"#),
        );
    }
    track(&env, "track-session-end", r#"{"session_id":"session-11"}"#);

    let output = run_bin(&env, &["sessions"], None);
    assert_success(&["sessions"], &output);
    let stdout = String::from_utf8_lossy(&output.stdout);

    let listed: Vec<&str> = stdout
        .lines()
        .filter_map(|line| line.strip_prefix("Session ID: "))
        .collect();
    assert_eq!(listed.len(), 10, "stdout:\n{stdout}");
    assert_eq!(listed[0], "session-11");
    assert_eq!(listed[9], "session-02");
    assert!(stdout.contains("  Status: completed"));
    assert!(stdout.contains("  Duration: "));
}

#[test]
fn sessions_on_empty_database() {
    let env = CliTestEnv::new();

    let output = run_bin(&env, &["sessions"], None);
    assert_success(&["sessions"], &output);
    assert!(String::from_utf8_lossy(&output.stdout).contains("No sessions found."));
}

#[test]
fn unknown_command_prints_usage() {
    let env = CliTestEnv::new();

    for args in [&["bogus"][..], &[][..], &["help"][..]] {
        let output = run_bin(&env, args, None);
        assert_success(args, &output);
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("track-tool-start"), "stdout:\n{stdout}");
        assert!(stdout.contains("sessions"), "stdout:\n{stdout}");
    }
}

#[test]
fn invalid_config_fails_admin_commands_only() {
    let env = CliTestEnv::new();
    fs::create_dir_all(env.app_dir()).unwrap();
    fs::write(env.app_dir().join("config.toml"), "[storage\n").unwrap();

    let status = run_bin(&env, &["status"], None);
    assert_eq!(status.status.code(), Some(1));

    let output = track(
        &env,
        "track-prompt",
        r#"{"session_id":"s1","cwd":"/p","user_prompt":"still tracked"}"#,
    );
    assert_eq!(output, "{}");
    assert_eq!(env.open_db().table_counts().unwrap().user_prompts, 1);
}
