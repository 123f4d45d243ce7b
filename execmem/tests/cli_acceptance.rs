use execmem_core::Database;
use serde_json::Value;
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

struct CliTestEnv {
    _temp_dir: TempDir,
    home: PathBuf,
    xdg_data: PathBuf,
    xdg_config: PathBuf,
    xdg_state: PathBuf,
    fixtures: PathBuf,
}

impl CliTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base = temp_dir.path().to_path_buf();
        let home = base.join("home");
        let xdg_data = base.join("xdg-data");
        let xdg_config = base.join("xdg-config");
        let xdg_state = base.join("xdg-state");
        let fixtures = base.join("fixtures");

        fs::create_dir_all(&home).expect("failed to create HOME");
        fs::create_dir_all(&xdg_data).expect("failed to create XDG_DATA_HOME");
        fs::create_dir_all(&xdg_config).expect("failed to create XDG_CONFIG_HOME");
        fs::create_dir_all(&xdg_state).expect("failed to create XDG_STATE_HOME");
        fs::create_dir_all(&fixtures).expect("failed to create fixture dir");

        Self {
            _temp_dir: temp_dir,
            home,
            xdg_data,
            xdg_config,
            xdg_state,
            fixtures,
        }
    }

    fn db_path(&self) -> PathBuf {
        self.xdg_data.join("execmem/executions.db")
    }

    fn write_config(&self, contents: &str) {
        let dir = self.xdg_config.join("execmem");
        fs::create_dir_all(&dir).expect("failed to create config dir");
        fs::write(dir.join("config.toml"), contents).expect("failed to write config");
    }

    fn write_fixture(&self, name: &str, document: &Value) -> PathBuf {
        let path = self.fixtures.join(name);
        fs::write(&path, document.to_string()).expect("failed to write fixture");
        path
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut command = Command::new(assert_cmd::cargo::cargo_bin!("execmem"));
        command
            .args(args)
            .env("HOME", &self.home)
            .env("XDG_DATA_HOME", &self.xdg_data)
            .env("XDG_CONFIG_HOME", &self.xdg_config)
            .env("XDG_STATE_HOME", &self.xdg_state)
            .env_remove("RUST_LOG");
        command
    }

    fn run(&self, args: &[&str]) -> Output {
        self.command(args)
            .output()
            .unwrap_or_else(|e| panic!("failed to execute execmem: {e}"))
    }

    fn run_ok(&self, args: &[&str]) -> String {
        let output = self.run(args);
        assert_success(args, &output);
        String::from_utf8_lossy(&output.stdout).into_owned()
    }

    fn run_json(&self, args: &[&str]) -> Value {
        let mut full = args.to_vec();
        full.extend(["--format", "json"]);
        let stdout = self.run_ok(&full);
        serde_json::from_str(&stdout)
            .unwrap_or_else(|e| panic!("invalid JSON output ({e}):\n{stdout}"))
    }

    /// Record an execution through a fixture file and return its id
    fn log(&self, document: Value) -> i64 {
        let name = format!("execution-{}.json", fs::read_dir(&self.fixtures).unwrap().count());
        let path = self.write_fixture(&name, &document);
        let path = path.to_string_lossy().into_owned();
        let output = self.run_json(&["log", "--file", &path]);
        output["id"].as_i64().expect("log should print an id")
    }
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
        "execmem {rendered_args} failed with status {:?}\nstdout:\n{stdout}\nstderr:\n{stderr}",
        output.status.code()
    );
}

fn parser_fix() -> Value {
    serde_json::json!({
        "prompt": "Fix null pointer in parser",
        "reasoning": "The tokenizer returned None at end of input.",
        "outcome": "Added a guard and a regression test",
        "success": true,
        "duration_ms": 4200,
        "model": "test-model",
        "tokens": 1800,
        "actions": [{
            "type": "tool",
            "command": "edit_file",
            "parameters": {"path": "src/parser.rs"},
            "timestamp": "2025-06-01T10:00:00Z",
            "duration_ms": 35,
            "status": "success"
        }],
        "code_changes": {"files": ["src/parser.rs"], "diff": "+ if token.is_none() { return None; }"},
        "annotations": {"tags": ["parser", "bug"], "category": "bugfix", "complexity": 6}
    })
}

#[test]
fn log_and_show_round_trip() {
    let env = CliTestEnv::new();
    let id = env.log(parser_fix());
    assert!(env.db_path().exists());

    let shown = env.run_json(&["show", &id.to_string()]);
    assert_eq!(shown["prompt"], "Fix null pointer in parser");
    assert_eq!(shown["actions"][0]["command"], "edit_file");
    assert_eq!(shown["metrics"].as_array().unwrap().len(), 3);

    let text = env.run_ok(&["show", &id.to_string()]);
    assert!(text.contains("Execution"));
    assert!(text.contains("edit_file"));
}

#[test]
fn log_reads_stdin() {
    let env = CliTestEnv::new();
    let mut child = env
        .command(&["log"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn execmem");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(br#"{"prompt": "Bump dependency versions", "success": false}"#)
        .unwrap();
    let output = child.wait_with_output().unwrap();
    assert_success(&["log"], &output);
    assert!(String::from_utf8_lossy(&output.stdout).contains("Recorded execution 1"));
}

#[test]
fn log_rejects_empty_prompt() {
    let env = CliTestEnv::new();
    let path = env.write_fixture("empty.json", &serde_json::json!({"prompt": "  ", "success": true}));
    let output = env.run(&["log", "--file", &path.to_string_lossy()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("prompt"));
}

#[test]
fn show_missing_execution_fails() {
    let env = CliTestEnv::new();
    let output = env.run(&["show", "42"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("not found"));
}

#[test]
fn advanced_search_ranks_with_metadata() {
    let env = CliTestEnv::new();
    let id = env.log(parser_fix());
    env.log(serde_json::json!({"prompt": "Update changelog for release", "success": true}));

    let results = env.run_json(&["search", "parser bug", "--advanced"]);
    let results = results.as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["id"].as_i64(), Some(id));
    assert_eq!(results[0]["context_type"], "solution");
    assert_eq!(results[0]["tags"], serde_json::json!(["parser", "bug"]));
    assert!(results[0]["relevance_score"].as_f64().unwrap() > 0.0);
    assert!(results[0]["factors"]["contextScore"].as_f64().unwrap() > 0.0);

    let basic = env.run_json(&["search", "changelog"]);
    assert_eq!(basic.as_array().unwrap().len(), 1);

    let none = env.run_ok(&["search", "kubernetes"]);
    assert!(none.contains("No matching executions."));
}

#[test]
fn weight_override_applies_to_one_search() {
    let env = CliTestEnv::new();
    env.log(parser_fix());

    let results = env.run_json(&[
        "search",
        "parser",
        "--advanced",
        "--weight",
        "contextScore=0",
        "--weight",
        "semanticScore=0",
    ]);
    assert_eq!(results.as_array().unwrap().len(), 1);

    let weights = env.run_json(&["weights"]);
    assert_eq!(weights["contextScore"].as_f64(), Some(0.12));

    let output = env.run(&["search", "parser", "-a", "--weight", "ftsScore=-1"]);
    assert!(!output.status.success());
}

#[test]
fn configured_weights_are_used() {
    let env = CliTestEnv::new();
    env.write_config("[scoring.weights]\nftsScore = 0.5\n");

    let weights = env.run_json(&["weights"]);
    assert_eq!(weights["ftsScore"].as_f64(), Some(0.5));
    assert_eq!(weights["recencyScore"].as_f64(), Some(0.12));
}

#[test]
fn stats_and_analytics_report_success_rate() {
    let env = CliTestEnv::new();
    env.log(parser_fix());
    env.log(serde_json::json!({"prompt": "Add caching layer", "success": true, "duration_ms": 100}));
    env.log(serde_json::json!({"prompt": "Deploy to production", "success": false, "duration_ms": 100}));

    let stats = env.run_json(&["stats"]);
    assert_eq!(stats["total_executions"], 3);
    assert_eq!(stats["success_rate"].as_f64(), Some(2.0 / 3.0));

    let report = env.run_json(&["analytics"]);
    assert_eq!(report["overview"]["failed_executions"], 1);
    assert_eq!(report["patterns"]["categories"][0]["name"], "bugfix");
    assert!(report["insights"]
        .as_array()
        .unwrap()
        .iter()
        .any(|i| i["kind"] == "recommendation"));

    let text = env.run_ok(&["analytics"]);
    assert!(text.contains("Executions:     3"));
    assert!(text.contains("Insights"));
}

#[test]
fn cleanup_removes_old_executions() {
    let env = CliTestEnv::new();
    env.log(serde_json::json!({
        "prompt": "Very old task",
        "success": true,
        "timestamp": "2020-01-01T00:00:00Z",
        "annotations": {"tags": ["old"]}
    }));
    env.log(serde_json::json!({"prompt": "Recent task", "success": true}));

    let cleaned = env.run_json(&["cleanup"]);
    assert_eq!(cleaned["retention_days"], 90);
    assert_eq!(cleaned["deleted"], 1);

    let db = Database::open(&env.db_path()).expect("failed to open db");
    assert_eq!(db.count_executions().unwrap(), 1);
    assert_eq!(db.count_orphaned_metrics().unwrap(), 0);

    let cleaned = env.run_json(&["cleanup", "--older-than-days", "0"]);
    assert_eq!(cleaned["deleted"], 1);
}

#[test]
fn repair_reports_clean_store() {
    let env = CliTestEnv::new();
    env.log(parser_fix());

    let repaired = env.run_json(&["repair"]);
    assert_eq!(repaired["orphaned"], 0);
    assert_eq!(repaired["removed"], 0);
    assert!(env.run_ok(&["repair"]).contains("No orphaned metric entries"));
}

#[test]
fn database_flag_overrides_location() {
    let env = CliTestEnv::new();
    let custom = env.fixtures.join("custom.db");
    let custom_arg = custom.to_string_lossy().into_owned();

    let path = env.write_fixture("one.json", &parser_fix());
    env.run_ok(&["--database", &custom_arg, "log", "--file", &path.to_string_lossy()]);

    assert!(custom.exists());
    assert!(!env.db_path().exists());
}
