use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

fn i18n_patch_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("i18n-patch"))
}

const RULES: &str = r#"
translations:
  - name: greetings
    src: '**/*.js'
    patterns:
      - pattern: HELLO
        replace: '${greeting}'
"#;

fn setup(rules: &str, locale: &str) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let config = temp_dir.path().join("config");
    let src = temp_dir.path().join("src");
    fs::create_dir_all(&config).unwrap();
    fs::create_dir_all(src.join("lib")).unwrap();
    fs::write(config.join("i18n.yml"), rules).unwrap();
    fs::write(config.join("ja.yml"), locale).unwrap();
    fs::write(src.join("lib/app.js"), "alert('HELLO');\nconsole.log('bye');\n").unwrap();
    fs::write(src.join("README.md"), "HELLO\n").unwrap();
    temp_dir
}

fn run(root: &Path, extra: &[&str]) -> std::process::Output {
    let mut cmd = i18n_patch_cmd();
    cmd.current_dir(root)
        .args(["--config", "config", "--src", "src", "--out", "out"])
        .args(extra)
        .arg("ja")
        .env_remove("RUST_LOG");
    cmd.output().unwrap()
}

#[test]
fn test_patches_into_output_directory() {
    let temp_dir = setup(RULES, "greeting: こんにちは\n");
    let output = run(temp_dir.path(), &[]);
    assert!(
        output.status.success(),
        "CLI failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let out = temp_dir.path().join("out");
    assert_eq!(
        fs::read_to_string(out.join("lib/app.js")).unwrap(),
        "alert('こんにちは');\nconsole.log('bye');\n"
    );
    // Files outside the glob are copied untouched.
    assert_eq!(fs::read_to_string(out.join("README.md")).unwrap(), "HELLO\n");
    // The source tree is not modified.
    assert_eq!(
        fs::read_to_string(temp_dir.path().join("src/lib/app.js")).unwrap(),
        "alert('HELLO');\nconsole.log('bye');\n"
    );
}

#[test]
fn test_statistics_output() {
    let temp_dir = setup(RULES, "greeting: こんにちは\n");
    let output = run(temp_dir.path(), &["--statistics"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.starts_with("[1] (greetings): processed 1 files for 1 patterns in "),
        "unexpected stdout: {}",
        stdout
    );
    assert!(stdout.contains("(1 unmatched lines)"));
}

#[test]
fn test_statistics_json() {
    let temp_dir = setup(RULES, "greeting: こんにちは\n");
    let output = run(temp_dir.path(), &["--json"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let v: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(v["summary"]["translations"], 1);
    assert_eq!(v["summary"]["files"], 1);
    assert_eq!(v["translations"][0]["label"], "greetings");
    assert_eq!(v["translations"][0]["disposition"]["kind"], "processed");
}

#[test]
fn test_unmatched_lines_are_reported() {
    let temp_dir = setup(RULES, "greeting: こんにちは\n");
    let output = run(temp_dir.path(), &["--unmatched"]);
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("lib/app.js:2:console.log('bye');"),
        "unexpected stderr: {}",
        stderr
    );
}

#[test]
fn test_condition_flag() {
    let rules = r#"
translations:
  - src: '**/*.js'
    evaluateWhen: "semver.satisfies(version, '>=2.0.0') && edition == 'ee'"
    patterns:
      - pattern: HELLO
        replace: '${greeting}'
"#;
    let temp_dir = setup(rules, "greeting: こんにちは\n");
    let output = run(temp_dir.path(), &["--condition", "2.1.0,edition=ee"]);
    assert!(output.status.success());
    assert_eq!(
        fs::read_to_string(temp_dir.path().join("out/lib/app.js")).unwrap(),
        "alert('こんにちは');\nconsole.log('bye');\n"
    );

    let temp_dir = setup(rules, "greeting: こんにちは\n");
    let output = run(temp_dir.path(), &["--condition", "2.1.0,edition=ce"]);
    assert!(output.status.success());
    assert_eq!(
        fs::read_to_string(temp_dir.path().join("out/lib/app.js")).unwrap(),
        "alert('HELLO');\nconsole.log('bye');\n"
    );
}

#[test]
fn test_invalid_locale() {
    let temp_dir = setup(RULES, "greeting: こんにちは\n");
    let output = i18n_patch_cmd()
        .current_dir(temp_dir.path())
        .args(["--config", "config", "--src", "src", "not a locale"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error: Invalid locale"), "{}", stderr);
}

#[test]
fn test_missing_config_directory() {
    let temp_dir = TempDir::new().unwrap();
    fs::create_dir_all(temp_dir.path().join("src")).unwrap();
    let output = run(temp_dir.path(), &[]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Config directory does not exist"), "{}", stderr);
}

#[test]
fn test_broken_rules_fail() {
    let rules = r#"
translations:
  - src: '**/*.js'
    patterns:
      - pattern: '(HELLO'
        flags: g
        replace: x
"#;
    let temp_dir = setup(rules, "greeting: こんにちは\n");
    let output = run(temp_dir.path(), &[]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error: invalid pattern `(HELLO`"), "{}", stderr);
    assert!(!temp_dir.path().join("out").exists());
}

#[test]
fn test_missing_locale_argument() {
    let output = i18n_patch_cmd().output().unwrap();
    assert!(!output.status.success());
}
