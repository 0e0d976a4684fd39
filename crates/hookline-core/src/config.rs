use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::compiler::CompilerKind;
use crate::error::Error;
use crate::tsconfig::TsConfig;
use crate::workspace::{find_workspace_root, PACKAGE_JSON};

/// Default prefix for workspace-scoped specifiers (`@-/pkg`).
pub const DEFAULT_SCOPE: &str = "@-/";

/// Environment variable overriding the tsconfig location.
pub const TSCONFIG_ENV: &str = "HOOKLINE_TSCONFIG";

/// The optional `"hookline"` section of the root package.json.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ManifestSection {
    scope: Option<String>,
    tsconfig: Option<PathBuf>,
    standalone: bool,
    compiler: Option<CompilerKind>,
}

/// Loader configuration for one workspace.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Workspace root (directory of the root package.json).
    pub root: PathBuf,

    /// Directory tsconfig discovery starts from.
    pub cwd: PathBuf,

    /// Workspace-scoped specifier prefix, always ending in `/`.
    pub scope: String,

    /// Explicit tsconfig path. Discovered from `cwd` when unset.
    pub tsconfig: Option<PathBuf>,

    /// Whether the root package is its own single-package workspace.
    pub standalone: bool,

    /// Compiler used for typed sources and JSON. JSX needs `esbuild`.
    pub compiler: CompilerKind,
}

impl LoaderConfig {
    /// Find the workspace root above `cwd` and read its configuration.
    ///
    /// # Errors
    /// Returns an error if no workspace root exists above `cwd` or the root
    /// manifest cannot be read.
    pub fn discover(cwd: &Path) -> Result<Self, Error> {
        let cwd = dunce::canonicalize(cwd)?;
        let root = find_workspace_root(&cwd).ok_or_else(|| Error::WorkspaceRootNotFound {
            start: cwd.clone(),
        })?;
        let mut config = Self::for_root(&root)?;
        config.cwd = cwd;
        Ok(config)
    }

    /// Read configuration for a known workspace root.
    ///
    /// # Errors
    /// Returns an error if the root manifest cannot be read or parsed.
    pub fn for_root(root: &Path) -> Result<Self, Error> {
        let root = dunce::canonicalize(root)?;
        let manifest_path = root.join(PACKAGE_JSON);
        let content = hookline_util::fs::read_to_string_lossy(&manifest_path).map_err(|source| {
            Error::ManifestRead {
                path: manifest_path.clone(),
                source,
            }
        })?;
        let manifest: Value =
            serde_json::from_str(&content).map_err(|source| Error::ManifestParse {
                path: manifest_path.clone(),
                source,
            })?;
        let section = match manifest.get("hookline") {
            Some(v) => ManifestSection::deserialize(v).map_err(|source| Error::ManifestParse {
                path: manifest_path,
                source,
            })?,
            None => ManifestSection::default(),
        };

        let mut config = Self {
            cwd: root.clone(),
            scope: normalize_scope(section.scope.as_deref().unwrap_or(DEFAULT_SCOPE)),
            tsconfig: section.tsconfig.map(|p| root.join(p)),
            standalone: section.standalone,
            compiler: section.compiler.unwrap_or_default(),
            root,
        };

        if let Ok(path) = std::env::var(TSCONFIG_ENV) {
            if !path.is_empty() {
                debug!(path = %path, "tsconfig overridden from environment");
                config.tsconfig = Some(config.root.join(path));
            }
        }

        Ok(config)
    }

    /// Set the workspace scope prefix.
    #[must_use]
    pub fn with_scope(mut self, scope: &str) -> Self {
        self.scope = normalize_scope(scope);
        self
    }

    /// Set an explicit tsconfig path.
    #[must_use]
    pub fn with_tsconfig(mut self, path: PathBuf) -> Self {
        self.tsconfig = Some(path);
        self
    }

    /// Set the compiler.
    #[must_use]
    pub fn with_compiler(mut self, compiler: CompilerKind) -> Self {
        self.compiler = compiler;
        self
    }

    /// tsconfig to load: the explicit one, else the nearest above `cwd`.
    #[must_use]
    pub fn tsconfig_path(&self) -> Option<PathBuf> {
        self.tsconfig
            .clone()
            .or_else(|| TsConfig::find(&self.cwd))
    }
}

fn normalize_scope(scope: &str) -> String {
    if scope.ends_with('/') {
        scope.to_string()
    } else {
        format!("{scope}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::tempdir;

    fn workspace(manifest: &str) -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("package.json"), manifest).unwrap();
        dir
    }

    #[test]
    #[serial]
    fn test_defaults() {
        std::env::remove_var(TSCONFIG_ENV);
        let dir = workspace(r#"{"workspaces": []}"#);
        let config = LoaderConfig::for_root(dir.path()).unwrap();
        assert_eq!(config.scope, "@-/");
        assert!(config.tsconfig.is_none());
        assert!(!config.standalone);
        assert_eq!(config.compiler, CompilerKind::Basic);
    }

    #[test]
    #[serial]
    fn test_manifest_section() {
        std::env::remove_var(TSCONFIG_ENV);
        let dir = workspace(
            r#"{"hookline": {"scope": "@acme", "tsconfig": "tsconfig.app.json", "standalone": true, "compiler": "esbuild"}}"#,
        );
        let config = LoaderConfig::for_root(dir.path()).unwrap();
        let root = dunce::canonicalize(dir.path()).unwrap();
        assert_eq!(config.scope, "@acme/");
        assert_eq!(config.tsconfig, Some(root.join("tsconfig.app.json")));
        assert!(config.standalone);
        assert_eq!(config.compiler, CompilerKind::Esbuild);
    }

    #[test]
    #[serial]
    fn test_env_overrides_tsconfig() {
        let dir = workspace(r#"{"workspaces": [], "hookline": {"tsconfig": "a.json"}}"#);
        std::env::set_var(TSCONFIG_ENV, "b.json");
        let config = LoaderConfig::for_root(dir.path()).unwrap();
        std::env::remove_var(TSCONFIG_ENV);
        let root = dunce::canonicalize(dir.path()).unwrap();
        assert_eq!(config.tsconfig, Some(root.join("b.json")));
    }

    #[test]
    #[serial]
    fn test_discover_from_nested_dir() {
        std::env::remove_var(TSCONFIG_ENV);
        let dir = workspace(r#"{"workspaces": ["packages/*"]}"#);
        let nested = dir.path().join("packages/a/src");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("packages/a/tsconfig.json"), "{}").unwrap();

        let config = LoaderConfig::discover(&nested).unwrap();
        let root = dunce::canonicalize(dir.path()).unwrap();
        assert_eq!(config.root, root);
        assert_eq!(config.tsconfig_path(), Some(root.join("packages/a/tsconfig.json")));
    }

    #[test]
    fn test_discover_without_root_fails() {
        let dir = tempdir().unwrap();
        let err = LoaderConfig::discover(dir.path()).unwrap_err();
        assert!(matches!(err, Error::WorkspaceRootNotFound { .. }));
    }

    #[test]
    fn test_invalid_manifest() {
        let dir = workspace("{ not json");
        let err = LoaderConfig::for_root(dir.path()).unwrap_err();
        assert!(matches!(err, Error::ManifestParse { .. }));
    }
}
