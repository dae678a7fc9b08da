use std::fs;
use std::path::{Path, PathBuf};
use std::process::Output;

use tempfile::TempDir;

const SCHEMA_YAML: &str = r#"
cli:
  name: deploy
  options:
    - name: server
      alias: [s]
      default: 127.0.0.1:8080
  commands:
    - name: up
      options:
        - { name: detach, alias: [d], type: bool }
        - { name: replicas, alias: [r], type: int }
      arguments:
        - { name: service, required: true }
    - name: down
"#;

fn write_schema(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).expect("failed to write schema");
    path
}

fn argspec(args: &[&str]) -> Output {
    std::process::Command::new(env!("CARGO_BIN_EXE_argspec"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run argspec")
}

fn parse_json(schema: &Path, tokens: &[&str]) -> (Output, serde_json::Value) {
    let mut args = vec!["parse", "--schema", schema.to_str().unwrap(), "--"];
    args.extend_from_slice(tokens);
    let out = argspec(&args);
    let report = serde_json::from_slice(&out.stdout).unwrap_or_else(|err| {
        panic!(
            "stdout is not JSON ({err}): {}",
            String::from_utf8_lossy(&out.stdout)
        )
    });
    (out, report)
}

// ---------------------------------------------------------------------------
// check
// ---------------------------------------------------------------------------

#[test]
fn check_reports_schema_summary() {
    let dir = TempDir::new().unwrap();
    let schema = write_schema(&dir, "cli.yml", SCHEMA_YAML);

    let out = argspec(&["check", schema.to_str().unwrap()]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(
        stdout.contains("Schema 'deploy' is valid: 3 command(s), 3 option(s), 1 argument(s)."),
        "stdout: {stdout}"
    );
}

#[test]
fn check_lists_every_definition_error() {
    let dir = TempDir::new().unwrap();
    let schema = write_schema(
        &dir,
        "bad.yml",
        r#"
cli:
  name: bad
  options:
    - { name: x, alias: [extra] }
    - { name: level, type: float }
"#,
    );

    let out = argspec(&["check", schema.to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("2 error(s)"), "stderr: {stderr}");
    assert!(stderr.contains("bad[x]"), "stderr: {stderr}");
    assert!(stderr.contains("invalid type: float"), "stderr: {stderr}");
}

#[test]
fn check_accepts_json_schema() {
    let dir = TempDir::new().unwrap();
    let json = serde_json::json!({
        "cli": {
            "name": "tool",
            "arguments": [{"name": "input", "required": true}]
        }
    });
    let schema = write_schema(&dir, "cli.json", &json.to_string());

    let out = argspec(&["check", schema.to_str().unwrap()]);
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains("Schema 'tool' is valid"));
}

#[test]
fn check_missing_file_fails() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.yml");

    let out = argspec(&["check", missing.to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("Failed to load"));
}

// ---------------------------------------------------------------------------
// parse
// ---------------------------------------------------------------------------

#[test]
fn parse_prints_result_stack() {
    let dir = TempDir::new().unwrap();
    let schema = write_schema(&dir, "cli.yml", SCHEMA_YAML);

    let (out, report) = parse_json(&schema, &["deploy", "-s", "10.0.0.2", "up", "-dr3", "web"]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    assert_eq!(report["program"], "deploy");
    assert_eq!(report["missing_command"], false);
    assert_eq!(report["stack"][0]["command"], "deploy");
    assert_eq!(report["stack"][0]["vars"]["server"], "10.0.0.2");
    let up = &report["stack"][1];
    assert_eq!(up["command"], "up");
    assert_eq!(up["vars"]["detach"], true);
    assert_eq!(up["vars"]["replicas"], 3);
    assert_eq!(up["vars"]["service"], "web");
    assert_eq!(up["args"], serde_json::json!(["web"]));
    assert_eq!(up["errors"], serde_json::json!([]));
}

#[test]
fn parse_with_errors_exits_non_zero() {
    let dir = TempDir::new().unwrap();
    let schema = write_schema(&dir, "cli.yml", SCHEMA_YAML);

    let (out, report) = parse_json(&schema, &["deploy", "up", "--replicas=many", "--bogus"]);
    assert_eq!(out.status.code(), Some(1));

    let errors = report["stack"][1]["errors"].as_array().unwrap();
    let kinds: Vec<_> = errors
        .iter()
        .map(|e| (e["kind"].as_str().unwrap(), e["name"].as_str().unwrap()))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("invalid_value", "replicas"),
            ("undefined", "bogus"),
            ("missing_value", "service"),
        ]
    );
    assert_eq!(errors[0]["value"], "many");
    assert!(String::from_utf8_lossy(&out.stderr).contains("command line has errors"));
}

#[test]
fn parse_unknown_command_collects_unparsed() {
    let dir = TempDir::new().unwrap();
    let schema = write_schema(&dir, "cli.yml", SCHEMA_YAML);

    let (out, report) = parse_json(&schema, &["deploy", "restart", "-x", "web"]);
    assert_eq!(out.status.code(), Some(1));
    assert_eq!(report["missing_command"], true);
    assert_eq!(report["unparsed"], serde_json::json!(["restart", "-x", "web"]));
}

#[test]
fn parse_without_tokens_reports_too_few() {
    let dir = TempDir::new().unwrap();
    let schema = write_schema(&dir, "cli.yml", SCHEMA_YAML);

    let (out, report) = parse_json(&schema, &[]);
    assert_eq!(out.status.code(), Some(1));
    assert_eq!(report["error"], "too few tokens");
    assert_eq!(report["stack"], serde_json::json!([]));
}

#[test]
fn parse_help_flag_is_opt_in() {
    let dir = TempDir::new().unwrap();
    let schema = write_schema(&dir, "cli.yml", SCHEMA_YAML);
    let path = schema.to_str().unwrap();

    let out = argspec(&["parse", "--schema", path, "--help-flag", "--", "deploy", "up", "--help"]);
    assert_eq!(out.status.code(), Some(1));
    let report: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(report["error"], "help requested");
    assert_eq!(report["stack"][1]["errors"], serde_json::json!([]));

    let (_, report) = parse_json(&schema, &["deploy", "up", "--help"]);
    assert_eq!(report["error"], serde_json::Value::Null);
    assert_eq!(report["stack"][1]["errors"][0]["name"], "help");
}

#[test]
fn parse_yaml_output() {
    let dir = TempDir::new().unwrap();
    let schema = write_schema(&dir, "cli.yml", SCHEMA_YAML);

    let out = argspec(&[
        "parse",
        "--schema",
        schema.to_str().unwrap(),
        "--format",
        "yaml",
        "--",
        "deploy",
        "down",
    ]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("program: deploy"), "stdout: {stdout}");
    assert!(stdout.contains("command: down"), "stdout: {stdout}");
}
