//! Workspace package index.
//!
//! Scans the monorepo once at startup and maps each package slug (its
//! `name` with any `@scope/` prefix removed) to its directory and parsed
//! manifest. The index is immutable afterwards.

use glob::Pattern;
use hookline_util::fs::{find_up, read_to_string_lossy};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

use crate::error::Error;
use crate::hooks::ModuleFormat;

pub const PACKAGE_JSON: &str = "package.json";
pub const PNPM_WORKSPACE: &str = "pnpm-workspace.yaml";

/// Where the workspace globs came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceSource {
    PackageJson,
    PnpmWorkspace,
    Standalone,
}

impl WorkspaceSource {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PackageJson => "package.json",
            Self::PnpmWorkspace => "pnpm-workspace.yaml",
            Self::Standalone => "standalone",
        }
    }
}

/// A package discovered in the workspace.
#[derive(Debug, Clone)]
pub struct WorkspacePackage {
    /// Package name with any `@scope/` prefix stripped.
    pub slug: String,
    /// Full package name from package.json.
    pub name: String,
    /// Absolute path to the package directory.
    pub dir: PathBuf,
    /// Parsed package.json.
    pub manifest: Value,
}

impl WorkspacePackage {
    /// Format of `.js` files in this package, from the manifest `type`.
    #[must_use]
    pub fn module_format(&self) -> ModuleFormat {
        match self.manifest.get("type").and_then(Value::as_str) {
            Some("module") => ModuleFormat::Module,
            _ => ModuleFormat::CommonJs,
        }
    }

    #[must_use]
    pub fn version(&self) -> &str {
        self.manifest
            .get("version")
            .and_then(Value::as_str)
            .unwrap_or("0.0.0")
    }
}

/// Slug → package map for a workspace root.
#[derive(Debug, Clone)]
pub struct WorkspaceIndex {
    root: PathBuf,
    source: WorkspaceSource,
    packages: BTreeMap<String, WorkspacePackage>,
}

#[derive(Debug, Deserialize)]
struct PnpmWorkspaceFile {
    packages: Option<Vec<String>>,
}

impl WorkspaceIndex {
    /// Build the index for `root`.
    ///
    /// Workspace globs are taken from, in order: the root package.json
    /// `workspaces` field, `pnpm-workspace.yaml`, or the root alone when the
    /// root manifest sets `"hookline": { "standalone": true }`.
    ///
    /// # Errors
    /// Returns an error if the root manifest is missing or invalid, if no
    /// strategy declares workspaces, or if a package manifest is invalid.
    pub fn build(root: &Path) -> Result<Self, Error> {
        let manifest_path = root.join(PACKAGE_JSON);
        if !manifest_path.is_file() {
            return Err(Error::ManifestRead {
                path: manifest_path,
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
            });
        }
        let manifest = read_manifest(&manifest_path)?;

        let (source, globs) = if let Some(globs) = manifest_workspaces(&manifest) {
            (WorkspaceSource::PackageJson, globs)
        } else if root.join(PNPM_WORKSPACE).is_file() {
            (WorkspaceSource::PnpmWorkspace, read_pnpm_workspace(&root.join(PNPM_WORKSPACE))?)
        } else if is_standalone(&manifest) {
            (WorkspaceSource::Standalone, vec![".".to_string()])
        } else {
            return Err(Error::WorkspacesNotDeclared {
                root: root.to_path_buf(),
            });
        };

        let packages = discover_packages(root, &globs)?;
        debug!(
            root = %root.display(),
            source = source.as_str(),
            count = packages.len(),
            "indexed workspace packages"
        );

        Ok(Self {
            root: root.to_path_buf(),
            source,
            packages,
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn source(&self) -> WorkspaceSource {
        self.source
    }

    /// Look up a package by slug.
    #[must_use]
    pub fn get(&self, slug: &str) -> Option<&WorkspacePackage> {
        self.packages.get(slug)
    }

    /// Packages ordered by slug.
    pub fn packages(&self) -> impl Iterator<Item = &WorkspacePackage> {
        self.packages.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

/// Strip a leading `@scope/` from a package name.
#[must_use]
pub fn package_slug(name: &str) -> &str {
    if name.starts_with('@') {
        if let Some((_, rest)) = name.split_once('/') {
            return rest;
        }
    }
    name
}

/// Find the workspace root by walking up from `start`.
///
/// A directory qualifies if it has a `pnpm-workspace.yaml`, or a
/// package.json with a `workspaces` field or the standalone marker.
#[must_use]
pub fn find_workspace_root(start: &Path) -> Option<PathBuf> {
    find_up(start, |dir| {
        if dir.join(PNPM_WORKSPACE).is_file() {
            return true;
        }
        let manifest_path = dir.join(PACKAGE_JSON);
        if !manifest_path.is_file() {
            return false;
        }
        match read_manifest(&manifest_path) {
            Ok(manifest) => manifest.get("workspaces").is_some() || is_standalone(&manifest),
            Err(_) => false,
        }
    })
}

fn read_manifest(path: &Path) -> Result<Value, Error> {
    let content = read_to_string_lossy(path).map_err(|source| Error::ManifestRead {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| Error::ManifestParse {
        path: path.to_path_buf(),
        source,
    })
}

fn is_standalone(manifest: &Value) -> bool {
    manifest
        .get("hookline")
        .and_then(|h| h.get("standalone"))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// `workspaces` as an array, or as `{ "packages": [...] }`.
fn manifest_workspaces(manifest: &Value) -> Option<Vec<String>> {
    let list = match manifest.get("workspaces")? {
        Value::Array(arr) => arr,
        Value::Object(obj) => obj.get("packages")?.as_array()?,
        _ => return None,
    };
    Some(list.iter().filter_map(|v| v.as_str().map(String::from)).collect())
}

fn read_pnpm_workspace(path: &Path) -> Result<Vec<String>, Error> {
    let content = read_to_string_lossy(path).map_err(|source| Error::ManifestRead {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed: Option<PnpmWorkspaceFile> =
        serde_yaml::from_str(&content).map_err(|source| Error::PnpmWorkspaceParse {
            path: path.to_path_buf(),
            source,
        })?;
    parsed
        .and_then(|p| p.packages)
        .ok_or_else(|| Error::PnpmWorkspaceMissingPackages {
            path: path.to_path_buf(),
        })
}

/// Expand globs to package manifests. `!`-prefixed globs exclude.
fn discover_packages(
    root: &Path,
    globs: &[String],
) -> Result<BTreeMap<String, WorkspacePackage>, Error> {
    let base = Pattern::escape(&root.to_string_lossy());
    let mut included = Vec::new();
    let mut excluded = HashSet::new();

    for glob in globs {
        let (negated, glob) = match glob.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, glob.as_str()),
        };
        let rel = glob.trim_start_matches("./").trim_end_matches('/');
        let pattern = if rel.is_empty() || rel == "." {
            format!("{base}/{PACKAGE_JSON}")
        } else {
            format!("{base}/{rel}/{PACKAGE_JSON}")
        };
        let entries = glob::glob(&pattern).map_err(|source| Error::InvalidGlob {
            pattern: glob.to_string(),
            source,
        })?;
        for entry in entries.flatten() {
            if negated {
                excluded.insert(entry);
            } else {
                included.push(entry);
            }
        }
    }

    included.sort();
    included.dedup();

    let mut packages: BTreeMap<String, WorkspacePackage> = BTreeMap::new();
    for manifest_path in included {
        if excluded.contains(&manifest_path) || in_node_modules(&manifest_path) {
            continue;
        }
        let manifest = read_manifest(&manifest_path)?;
        let Some(name) = manifest.get("name").and_then(Value::as_str).map(String::from) else {
            debug!(path = %manifest_path.display(), "skipping workspace manifest without name");
            continue;
        };
        let slug = package_slug(&name).to_string();
        let dir = manifest_path
            .parent()
            .map_or_else(|| root.to_path_buf(), Path::to_path_buf);

        if let Some(existing) = packages.get(&slug) {
            warn!(
                slug = %slug,
                kept = %existing.dir.display(),
                ignored = %dir.display(),
                "duplicate workspace package slug"
            );
            continue;
        }

        packages.insert(
            slug.clone(),
            WorkspacePackage {
                slug,
                name,
                dir,
                manifest,
            },
        );
    }

    Ok(packages)
}

fn in_node_modules(path: &Path) -> bool {
    path.components()
        .any(|c| matches!(c, Component::Normal(n) if n == "node_modules"))
}
