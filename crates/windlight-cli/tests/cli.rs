use assert_cmd::Command;
use std::fs;
use tempfile::tempdir;

fn windlight(dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("windlight").unwrap();
    cmd.current_dir(dir).env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_missing_input_prints_one_error_line() {
    let dir = tempdir().unwrap();
    let output = windlight(dir.path()).args(["-i", "missing.css"]).output().unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());

    let stderr = String::from_utf8(output.stderr).unwrap();
    let lines: Vec<&str> = stderr.lines().collect();
    assert_eq!(lines.len(), 1, "stderr: {stderr}");
    assert!(lines[0].starts_with("Error: "));
    assert!(lines[0].contains("missing.css"));
}

#[test]
fn test_default_input_writes_stdout() {
    let dir = tempdir().unwrap();
    let output = windlight(dir.path()).output().unwrap();

    assert!(output.status.success());
    assert!(!output.stdout.is_empty());
}

#[test]
fn test_output_file_is_written() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("app.css"), ".card { color: red; }\n").unwrap();

    let output =
        windlight(dir.path()).args(["-i", "app.css", "-o", "dist/app.css"]).output().unwrap();

    assert!(output.status.success());
    assert!(output.stdout.is_empty());
    let css = fs::read_to_string(dir.path().join("dist/app.css")).unwrap();
    assert!(css.contains(".card"));
}

#[test]
fn test_config_file_options_apply() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("app.css"), ".a {\n  color: red;\n}\n").unwrap();
    fs::write(
        dir.path().join("windlight.json"),
        r#"{ "input": "app.css", "options": { "minify": true } }"#,
    )
    .unwrap();

    let output = windlight(dir.path()).output().unwrap();

    assert!(output.status.success());
    assert_eq!(String::from_utf8(output.stdout).unwrap().trim(), ".a{color:red}");
}

#[test]
fn test_explicit_missing_config_fails() {
    let dir = tempdir().unwrap();
    let output = windlight(dir.path()).args(["--config", "nope.json"]).output().unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.starts_with("Error: Config file not found"));
}

#[test]
fn test_disable_transforms_keeps_nesting() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("app.css"), ".a {\n  & .b {\n    color: red;\n  }\n}\n").unwrap();

    let raw = windlight(dir.path())
        .args(["-i", "app.css", "--disable-transforms"])
        .output()
        .unwrap();
    let transformed = windlight(dir.path()).args(["-i", "app.css"]).output().unwrap();

    assert!(raw.status.success());
    assert!(transformed.status.success());
    assert!(String::from_utf8(raw.stdout).unwrap().contains('&'));

    let transformed = String::from_utf8(transformed.stdout).unwrap();
    assert!(!transformed.contains('&'));
    assert!(transformed.contains(".a .b"));
}
