//! Compiler backed by an external `esbuild` binary.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, trace};

use super::{Compiler, CompilerError, Diagnostic, TransformOptions, TransformOutput};
use crate::sourcemap::extract_inline;
use crate::specifier::extension;

/// Environment variable naming the esbuild binary.
pub const ESBUILD_ENV: &str = "HOOKLINE_ESBUILD";

/// Runs `esbuild` once per file, feeding the source on stdin.
#[derive(Debug, Clone)]
pub struct EsbuildCompiler {
    binary: PathBuf,
}

impl Default for EsbuildCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl EsbuildCompiler {
    /// Use `$HOOKLINE_ESBUILD`, or `esbuild` from `PATH`.
    #[must_use]
    pub fn new() -> Self {
        let binary = std::env::var_os(ESBUILD_ENV)
            .filter(|v| !v.is_empty())
            .map_or_else(|| PathBuf::from("esbuild"), PathBuf::from);
        Self { binary }
    }

    #[must_use]
    pub fn with_binary(binary: PathBuf) -> Self {
        Self { binary }
    }

    fn args(path: &Path, loader: &str, options: &TransformOptions) -> Vec<String> {
        vec![
            format!("--loader={loader}"),
            "--format=esm".to_string(),
            "--sourcemap=inline".to_string(),
            format!("--sourcefile={}", path.display()),
            format!("--tsconfig-raw={}", options.tsconfig_raw),
        ]
    }
}

fn loader_for(path: &Path) -> Option<&'static str> {
    match extension(&path.to_string_lossy()) {
        ".ts" | ".mts" | ".cts" => Some("ts"),
        ".tsx" => Some("tsx"),
        ".jsx" => Some("jsx"),
        ".json" => Some("json"),
        ".js" | ".mjs" | ".cjs" => Some("js"),
        _ => None,
    }
}

impl Compiler for EsbuildCompiler {
    fn name(&self) -> &'static str {
        "esbuild"
    }

    fn transform(
        &self,
        code: &str,
        path: &Path,
        options: &TransformOptions,
    ) -> Result<TransformOutput, CompilerError> {
        let loader = loader_for(path).ok_or_else(|| {
            CompilerError::unsupported_file(format!("{}: no esbuild loader", path.display()))
        })?;
        let args = Self::args(path, loader, options);
        debug!(binary = %self.binary.display(), path = %path.display(), loader, "running esbuild");

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                CompilerError::unavailable(format!(
                    "failed to start {}: {e}",
                    self.binary.display()
                ))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(code.as_bytes()).map_err(|e| {
                CompilerError::unavailable(format!("failed to write to esbuild: {e}"))
            })?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| CompilerError::unavailable(format!("esbuild did not finish: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            trace!(stderr = %stderr, "esbuild failed");
            return Err(CompilerError::syntax_error(format!(
                "esbuild failed to compile {}",
                path.display()
            ))
            .with_diagnostics(parse_diagnostics(&stderr, path)));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let (code, map) = extract_inline(&stdout);
        Ok(TransformOutput { code, map })
    }
}

/// Pull `[ERROR] message` blocks and their `file:line:col:` locations out of
/// esbuild's stderr.
fn parse_diagnostics(stderr: &str, path: &Path) -> Vec<Diagnostic> {
    let mut diagnostics: Vec<Diagnostic> = Vec::new();
    for line in stderr.lines() {
        let trimmed = line.trim();
        if let Some(idx) = trimmed.find("[ERROR]") {
            let message = trimmed[idx + "[ERROR]".len()..].trim();
            diagnostics.push(Diagnostic::new(message));
            continue;
        }
        let Some(last) = diagnostics.last_mut() else {
            continue;
        };
        if last.position.is_some() {
            continue;
        }
        if let Some((line_no, col)) = parse_location(trimmed) {
            *last = last.clone().at(path.to_path_buf(), line_no, col);
        }
    }
    if diagnostics.is_empty() && !stderr.trim().is_empty() {
        diagnostics.push(Diagnostic::new(stderr.trim()));
    }
    diagnostics
}

/// `<file>:<line>:<col>:` with esbuild's 0-based column.
fn parse_location(line: &str) -> Option<(u32, u32)> {
    let line = line.strip_suffix(':')?;
    let mut parts = line.rsplitn(3, ':');
    let col: u32 = parts.next()?.parse().ok()?;
    let line_no: u32 = parts.next()?.parse().ok()?;
    parts.next()?;
    Some((line_no, col + 1))
}
