pub mod load;
pub mod resolve;
pub mod version;
pub mod workspaces;

use hookline_core::{CompilerKind, Hooks, LoaderConfig};
use miette::{IntoDiagnostic, Result, WrapErr};
use std::path::{Path, PathBuf};
use url::Url;

/// Discover the workspace above `cwd` and build hooks for it.
fn build_hooks(cwd: &Path, compiler: Option<CompilerKind>) -> Result<Hooks> {
    let mut config = LoaderConfig::discover(cwd)
        .into_diagnostic()
        .wrap_err("failed to load workspace configuration")?;
    if let Some(kind) = compiler {
        config = config.with_compiler(kind);
    }
    Hooks::new(config)
        .into_diagnostic()
        .wrap_err("failed to initialize hooks")
}

/// URL of the importing module: `from` relative to `cwd`, or a synthetic
/// `index.ts` in `cwd` so typed-importer rules apply.
fn importer_url(cwd: &Path, from: Option<&Path>) -> Result<Url> {
    let path = match from {
        Some(p) if p.is_absolute() => p.to_path_buf(),
        Some(p) => cwd.join(p),
        None => cwd.join("index.ts"),
    };
    let path = absolute(&path);
    Url::from_file_path(&path).map_err(|()| miette::miette!("not a valid file path: {}", path.display()))
}

fn absolute(path: &Path) -> PathBuf {
    let normalized = hookline_util::path::normalize_path(path);
    match normalized.parent().and_then(|p| dunce::canonicalize(p).ok()) {
        Some(parent) => match normalized.file_name() {
            Some(name) => parent.join(name),
            None => parent,
        },
        None => normalized,
    }
}

/// Print a failure in the shared `{"ok": false}` shape and exit non-zero.
fn fail(json: bool, code: &str, message: &str) -> ! {
    if json {
        println!(
            "{}",
            serde_json::json!({
                "ok": false,
                "error": {
                    "code": code,
                    "message": message
                }
            })
        );
    } else {
        eprintln!("error[{code}]: {message}");
    }
    std::process::exit(1);
}
