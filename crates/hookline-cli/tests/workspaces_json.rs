//! Integration tests for `hookline workspaces --json` and `version`.

mod common;

use common::{hookline, json_stdout, workspace};

#[test]
fn test_workspaces_json_lists_slugs() {
    let dir = workspace();
    let output = hookline()
        .arg("--cwd")
        .arg(dir.path().join("packages/ui"))
        .args(["--json", "workspaces"])
        .output()
        .expect("Failed to run workspaces command");

    assert!(output.status.success());
    let json = json_stdout(&output);
    assert_eq!(json["ok"], true);
    assert_eq!(json["source"], "package.json");

    let packages = json["packages"].as_array().unwrap();
    let slugs: Vec<_> = packages.iter().map(|p| p["slug"].as_str().unwrap()).collect();
    assert_eq!(slugs, ["tools", "ui"]);
    assert_eq!(packages[1]["name"], "@acme/ui");
    assert_eq!(packages[1]["version"], "1.2.3");
    assert_eq!(packages[1]["format"], "module");
    assert_eq!(packages[0]["format"], "commonjs");
}

#[test]
fn test_workspaces_json_without_root() {
    let dir = tempfile::tempdir().unwrap();
    let output = hookline()
        .arg("--cwd")
        .arg(dir.path())
        .args(["--json", "workspaces"])
        .output()
        .expect("Failed to run workspaces command");

    assert!(!output.status.success());
    let json = json_stdout(&output);
    assert_eq!(json["error"]["code"], "NO_WORKSPACE_ROOT");
}

#[test]
fn test_version_json() {
    let output = hookline()
        .args(["--json", "version"])
        .output()
        .expect("Failed to run version command");

    assert!(output.status.success());
    let json = json_stdout(&output);
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}
