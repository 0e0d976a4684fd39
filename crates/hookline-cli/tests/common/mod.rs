#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

pub fn hookline() -> Command {
    Command::new(env!("CARGO_BIN_EXE_hookline"))
}

/// Root with two packages: `@acme/ui` (ESM, exports) and `tools` (CJS).
pub fn workspace() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        root,
        "package.json",
        r#"{"name": "root", "private": true, "type": "module", "workspaces": ["packages/*"]}"#,
    );
    write(
        root,
        "tsconfig.json",
        r#"{
  // comments are allowed
  "compilerOptions": { "baseUrl": ".", "paths": { "lib/*": ["lib/*"] } }
}"#,
    );
    write(root, "lib/util.ts", "export const util = (n: number): number => n;\n");
    write(
        root,
        "packages/ui/package.json",
        r#"{"name": "@acme/ui", "version": "1.2.3", "type": "module", "exports": {".": "./src/index.ts"}}"#,
    );
    write(root, "packages/ui/src/index.ts", "export const button: string = 'b';\n");
    write(
        root,
        "packages/tools/package.json",
        r#"{"name": "tools", "version": "0.1.0"}"#,
    );
    write(root, "src/main.ts", "import { util } from 'lib/util';\nexport default util;\n");
    write(root, "src/data.json", r#"{"answer": 42}"#);
    dir
}

pub fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

pub fn json_stdout(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.trim().starts_with('{'),
        "stdout should begin with '{{': {stdout}\nstderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_str(&stdout).expect("stdout should be valid JSON")
}
