use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn gitsage_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("gitsage");
    path
}

/// Config, a data directory, and one small repository under `widgets/`.
fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::create_dir_all(root.join("data")).unwrap();

    write_repo(&root.join("widgets"));

    let config_content = format!(
        r#"[db]
path = "{root}/data/gitsage.sqlite"

[retrieval]
top_k = 12

[embedding.code]
provider = "hashing"
dims = 128

[embedding.text]
provider = "hashing"
dims = 128

[generation]
provider = "disabled"

[sources]
cache_dir = "{root}/data/repos"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("gitsage.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn write_repo(dir: &Path) {
    fs::create_dir_all(dir.join("src")).unwrap();
    fs::create_dir_all(dir.join("assets")).unwrap();
    fs::write(
        dir.join("README.md"),
        "# Widgets\n\nWidgets is a tiny HTTP server for serving widget catalogs.\n\n## Install\n\nRun make install, then widgets serve.\n",
    )
    .unwrap();
    fs::write(
        dir.join("src/server.py"),
        "import flask\n\n\ndef serve(port):\n    app = flask.Flask(__name__)\n    app.run(port=port)\n\n\ndef catalog():\n    return [\"gear\", \"sprocket\"]\n",
    )
    .unwrap();
    fs::write(
        dir.join("requirements.txt"),
        "flask==2.3.2\nrequests>=2.31.0\nclick==8.1.7\ngunicorn==21.2.0\n",
    )
    .unwrap();
    fs::write(dir.join("assets/logo.png"), [0x89, b'P', b'N', b'G', 0, 0, 0, 13]).unwrap();
    fs::write(dir.join("notes.txt"), "todo\n").unwrap();
}

fn run_gitsage(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = gitsage_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run gitsage binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn repo_dir(config_path: &Path) -> String {
    config_path
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("widgets")
        .display()
        .to_string()
}

fn ingest(config_path: &Path) -> String {
    let (stdout, stderr, success) = run_gitsage(config_path, &["ingest", &repo_dir(config_path)]);
    assert!(success, "ingest failed: stdout={}, stderr={}", stdout, stderr);
    stdout
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_gitsage(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/gitsage.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_gitsage(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_gitsage(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_ingest_filters_and_reports() {
    let (_tmp, config_path) = setup_test_env();

    run_gitsage(&config_path, &["init"]);
    let stdout = ingest(&config_path);

    assert!(stdout.contains("files seen: 5"), "got: {}", stdout);
    assert!(stdout.contains("files accepted: 3"), "got: {}", stdout);
    assert!(stdout.contains("files rejected: 2"), "got: {}", stdout);
    assert!(stdout.trim_end().ends_with("ingested"), "got: {}", stdout);
}

#[test]
fn test_reingest_unchanged_is_skipped() {
    let (tmp, config_path) = setup_test_env();

    run_gitsage(&config_path, &["init"]);
    ingest(&config_path);

    let stdout = ingest(&config_path);
    assert!(stdout.contains("already ingested"), "got: {}", stdout);
    assert!(stdout.trim_end().ends_with("skipped"));

    // A content change produces a new version
    fs::write(
        tmp.path().join("widgets/src/server.py"),
        "def serve(port):\n    print(\"serving widgets on\", port)\n    return port\n",
    )
    .unwrap();
    let stdout = ingest(&config_path);
    assert!(stdout.trim_end().ends_with("ingested"), "got: {}", stdout);
}

#[test]
fn test_explicit_version_idempotence() {
    let (_tmp, config_path) = setup_test_env();
    let dir = repo_dir(&config_path);

    run_gitsage(&config_path, &["init"]);
    let (first, _, ok) = run_gitsage(&config_path, &["ingest", &dir, "--version", "v1"]);
    assert!(ok);
    assert!(first.contains("version: v1"));

    let (second, _, ok) = run_gitsage(&config_path, &["ingest", &dir, "--version", "v1"]);
    assert!(ok);
    assert!(second.trim_end().ends_with("skipped"));

    let (_, _, ok) = run_gitsage(
        &config_path,
        &["ask", "--repo", &dir, "--version", "v1", "What does serve do?"],
    );
    assert!(ok, "ask for the ingested version should succeed");

    let (_, stderr, ok) = run_gitsage(
        &config_path,
        &["ask", "--repo", &dir, "--version", "v2", "What does serve do?"],
    );
    assert!(!ok);
    assert!(stderr.contains("not ready"), "got: {}", stderr);
}

#[test]
fn test_search_returns_ranked_results() {
    let (_tmp, config_path) = setup_test_env();
    let dir = repo_dir(&config_path);

    run_gitsage(&config_path, &["init"]);
    ingest(&config_path);

    let (stdout, stderr, success) =
        run_gitsage(&config_path, &["search", "serve port flask", "--repo", &dir]);
    assert!(success, "search failed: {}", stderr);
    assert!(stdout.starts_with("1. ["), "got: {}", stdout);
    assert!(stdout.contains("(repository summary)"));
    assert!(stdout.contains("src/server.py"));
    assert!(stdout.contains("README.md"));
    assert!(!stdout.contains("logo.png"));
}

#[test]
fn test_search_json_and_limit() {
    let (_tmp, config_path) = setup_test_env();

    run_gitsage(&config_path, &["init"]);
    ingest(&config_path);

    let (stdout, _, success) =
        run_gitsage(&config_path, &["search", "widget catalog", "--limit", "2", "--json"]);
    assert!(success);
    let results: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let results = results.as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert!(results[0]["similarity"].as_f64().unwrap() >= results[1]["similarity"].as_f64().unwrap());
    assert!(results[0]["metadata"]["repo"].as_str().unwrap().ends_with("widgets"));
}

#[test]
fn test_search_deterministic() {
    let (_tmp, config_path) = setup_test_env();

    run_gitsage(&config_path, &["init"]);
    ingest(&config_path);

    let (stdout1, _, _) = run_gitsage(&config_path, &["search", "install widgets"]);
    let (stdout2, _, _) = run_gitsage(&config_path, &["search", "install widgets"]);
    assert_eq!(stdout1, stdout2);
}

#[test]
fn test_ask_structural_questions_are_deterministic() {
    let (_tmp, config_path) = setup_test_env();
    let dir = repo_dir(&config_path);

    run_gitsage(&config_path, &["init"]);
    ingest(&config_path);

    let (stdout, stderr, success) = run_gitsage(
        &config_path,
        &["ask", "--repo", &dir, "Which files implement the server?"],
    );
    assert!(success, "ask failed: {}", stderr);
    assert!(stdout.contains("Inventory of explicit artifacts found:"));
    assert!(stdout.contains("- src/server.py"));
    assert!(stdout.contains("mode: inventory"));

    let (stdout, _, success) = run_gitsage(
        &config_path,
        &["ask", "--repo", &dir, "How is the project structured?"],
    );
    assert!(success);
    assert!(stdout.contains("Repository Structure (from indexed files):"));
    assert!(stdout.contains("- src"));
}

#[test]
fn test_ask_explanation_without_generator() {
    let (_tmp, config_path) = setup_test_env();
    let dir = repo_dir(&config_path);

    run_gitsage(&config_path, &["init"]);
    ingest(&config_path);

    let (stdout, _, success) = run_gitsage(
        &config_path,
        &["ask", "--repo", &dir, "--json", "What does the serve function do?"],
    );
    assert!(success);
    let answer: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(answer["mode"], "explanation");
    assert_eq!(answer["text"], "I don't know based on the repository.");
}

#[test]
fn test_ask_unknown_repository_fails() {
    let (_tmp, config_path) = setup_test_env();

    run_gitsage(&config_path, &["init"]);
    let (_, stderr, success) = run_gitsage(
        &config_path,
        &["ask", "--repo", "https://github.com/acme/missing", "What is this?"],
    );
    assert!(!success);
    assert!(stderr.contains("not ready"), "got: {}", stderr);
}

#[test]
fn test_docs_written_to_file() {
    let (tmp, config_path) = setup_test_env();
    let dir = repo_dir(&config_path);
    let out = tmp.path().join("out/DOCS.md");

    run_gitsage(&config_path, &["init"]);
    ingest(&config_path);

    let (stdout, stderr, success) = run_gitsage(
        &config_path,
        &["docs", "--repo", &dir, "--output", out.to_str().unwrap()],
    );
    assert!(success, "docs failed: {}", stderr);
    assert!(stdout.contains("Wrote 6 sections"));

    let markdown = fs::read_to_string(&out).unwrap();
    assert!(markdown.starts_with("# Repository Documentation"));
    for title in ["## Overview", "## Architecture", "## Getting Started", "## Key Features", "## Dependencies", "## API Reference"] {
        assert!(markdown.contains(title), "missing {}", title);
    }
}

#[test]
fn test_compare_two_repositories() {
    let (tmp, config_path) = setup_test_env();
    let a = repo_dir(&config_path);
    let b_dir = tmp.path().join("gadgets");
    write_repo(&b_dir);
    let b = b_dir.display().to_string();

    run_gitsage(&config_path, &["init"]);
    ingest(&config_path);
    let (_, _, ok) = run_gitsage(&config_path, &["ingest", &b]);
    assert!(ok);

    let (stdout, stderr, success) = run_gitsage(&config_path, &["compare", &a, &b]);
    assert!(success, "compare failed: {}", stderr);
    assert!(stdout.contains("Repository Comparison"));
    assert!(stdout.contains("TypeScript Support"));
}

#[test]
fn test_stats_after_ingest() {
    let (_tmp, config_path) = setup_test_env();

    run_gitsage(&config_path, &["init"]);
    ingest(&config_path);

    let (stdout, _, success) = run_gitsage(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Ingestions:  1"));
    assert!(stdout.contains("widgets"));
    assert!(!stdout.contains("Code chunks: 0"));
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_gitsage(&tmp.path().join("nope.toml"), &["stats"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}
