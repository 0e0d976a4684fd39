//! Module format classification for resolved files.

use dashmap::DashMap;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::trace;
use url::Url;

use crate::hooks::ModuleFormat;
use crate::specifier::extension;
use crate::workspace::PACKAGE_JSON;

/// Decides module vs. script semantics for files the host left unclassified.
///
/// `.json` is JSON, `.mjs`/`.mts` are modules, `.cjs`/`.cts` are CommonJS;
/// anything else follows the `type` of the nearest package.json (CommonJS
/// when there is none). Directory lookups are cached for the process
/// lifetime and never invalidated.
#[derive(Debug, Default)]
pub struct FormatClassifier {
    package_types: DashMap<PathBuf, ModuleFormat>,
}

impl FormatClassifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify a `file:` URL; other schemes are left unclassified.
    #[must_use]
    pub fn classify_url(&self, url: &Url) -> Option<ModuleFormat> {
        if url.scheme() != "file" {
            return None;
        }
        let path = url.to_file_path().ok()?;
        Some(self.classify_path(&path))
    }

    #[must_use]
    pub fn classify_path(&self, path: &Path) -> ModuleFormat {
        match extension(&path.to_string_lossy()) {
            ".json" => ModuleFormat::Json,
            ".mjs" | ".mts" => ModuleFormat::Module,
            ".cjs" | ".cts" => ModuleFormat::CommonJs,
            _ => path
                .parent()
                .map_or(ModuleFormat::CommonJs, |dir| self.package_type(dir)),
        }
    }

    /// `type` of the nearest package.json at or above `dir`.
    #[must_use]
    pub fn package_type(&self, dir: &Path) -> ModuleFormat {
        let mut visited = Vec::new();
        let mut result = ModuleFormat::CommonJs;

        for current in dir.ancestors() {
            if let Some(cached) = self.package_types.get(current) {
                result = *cached;
                break;
            }
            visited.push(current.to_path_buf());
            let manifest = current.join(PACKAGE_JSON);
            if manifest.is_file() {
                result = read_type(&manifest);
                break;
            }
        }

        trace!(dir = %dir.display(), format = %result, cached = visited.len(), "package type");
        for path in visited {
            self.package_types.insert(path, result);
        }
        result
    }

    /// Number of cached directories.
    #[must_use]
    pub fn cached_dirs(&self) -> usize {
        self.package_types.len()
    }
}

fn read_type(manifest: &Path) -> ModuleFormat {
    let parsed = std::fs::read_to_string(manifest)
        .ok()
        .and_then(|s| serde_json::from_str::<Value>(&s).ok());
    match parsed.as_ref().and_then(|v| v.get("type")).and_then(Value::as_str) {
        Some("module") => ModuleFormat::Module,
        _ => ModuleFormat::CommonJs,
    }
}
