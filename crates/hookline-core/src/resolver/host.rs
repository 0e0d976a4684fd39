//! Strict ESM resolver used as the host's default `next_resolve`.
//!
//! Mirrors what the host runtime does natively: no extension probing, no
//! directory indexes, `exports`-aware `node_modules` lookup. The pipeline
//! layers its own fallbacks on top of the errors this produces.

use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::trace;
use url::Url;

use super::error::{ResolveError, ResolveErrorCode};
use super::exports::{effective_conditions, resolve_exports, resolve_imports};
use super::format::FormatClassifier;
use crate::hooks::{ModuleFormat, NextResolve, Resolution, ResolveContext};
use crate::specifier::{extension, is_relative, split_query, FILE_PROTOCOL};
use crate::workspace::PACKAGE_JSON;
use hookline_util::path::normalize_path;

const NODE_PROTOCOL: &str = "node:";

/// Host builtin modules addressable without the `node:` prefix.
const BUILTINS: &[&str] = &[
    "assert", "async_hooks", "buffer", "child_process", "cluster", "console", "constants",
    "crypto", "dgram", "diagnostics_channel", "dns", "domain", "events", "fs", "http", "http2",
    "https", "inspector", "module", "net", "os", "path", "perf_hooks", "process", "punycode",
    "querystring", "readline", "repl", "stream", "string_decoder", "sys", "timers", "tls",
    "trace_events", "tty", "url", "util", "v8", "vm", "wasi", "worker_threads", "zlib",
];

/// Legacy `main` probing order for packages without `exports`.
const MAIN_SUFFIXES: &[&str] = &["", ".js", ".json", ".node", "/index.js", "/index.json", "/index.node"];

/// The host's native resolution algorithm.
#[derive(Debug, Default)]
pub struct NodeResolver {
    cwd: Option<PathBuf>,
    classifier: FormatClassifier,
}

impl NodeResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative specifiers without a parent against `cwd`.
    #[must_use]
    pub fn with_cwd(mut self, cwd: PathBuf) -> Self {
        self.cwd = Some(cwd);
        self
    }

    fn cwd(&self) -> PathBuf {
        self.cwd
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("/"))
    }

    /// Directory the lookup starts from: the parent's directory or `cwd`.
    fn base_dir(&self, ctx: &ResolveContext) -> PathBuf {
        ctx.parent_url
            .as_ref()
            .filter(|u| u.scheme() == "file")
            .and_then(|u| u.to_file_path().ok())
            .and_then(|p| p.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| self.cwd())
    }

    /// How the importer is named in error messages.
    fn importer(&self, ctx: &ResolveContext) -> String {
        match &ctx.parent_url {
            Some(url) if url.scheme() == "file" => url
                .to_file_path()
                .map_or_else(|()| url.to_string(), |p| p.display().to_string()),
            Some(url) => url.to_string(),
            None => self.cwd().display().to_string(),
        }
    }

    /// Format for a resolved file, as the host decides it.
    fn host_format(&self, path: &Path) -> Option<ModuleFormat> {
        match extension(&path.to_string_lossy()) {
            ".mjs" => Some(ModuleFormat::Module),
            ".cjs" => Some(ModuleFormat::CommonJs),
            ".json" => Some(ModuleFormat::Json),
            ".js" => Some(self.classifier.classify_path(path)),
            _ => None,
        }
    }

    fn file_resolution(
        &self,
        path: &Path,
        query: Option<&str>,
        specifier: &str,
    ) -> Result<Resolution, ResolveError> {
        let mut url = Url::from_file_path(path).map_err(|()| {
            ResolveError::invalid_specifier(
                specifier,
                format!("Invalid module \"{specifier}\" is not a valid path"),
            )
        })?;
        url.set_query(query.map(|q| q.trim_start_matches('?')));
        Ok(Resolution::new(url, self.host_format(path)))
    }

    /// `file:` URLs, relative and absolute paths.
    fn resolve_location(
        &self,
        specifier: &str,
        ctx: &ResolveContext,
    ) -> Result<Resolution, ResolveError> {
        let url = if specifier.starts_with(FILE_PROTOCOL) {
            Url::parse(specifier).ok()
        } else if is_relative(specifier) {
            let base = match &ctx.parent_url {
                Some(parent) => Some(parent.clone()),
                None => Url::from_directory_path(self.cwd()).ok(),
            };
            base.and_then(|b| b.join(specifier).ok())
        } else {
            let (path, query) = split_query(specifier);
            Url::from_file_path(normalize_path(Path::new(path)))
                .ok()
                .map(|mut u| {
                    u.set_query(query.map(|q| q.trim_start_matches('?')));
                    u
                })
        };
        let url = url.ok_or_else(|| {
            ResolveError::invalid_specifier(
                specifier,
                format!("Invalid module \"{specifier}\" is not a valid URL or path"),
            )
        })?;

        if url.scheme() != "file" {
            return Ok(Resolution::new(url, None));
        }

        let path = url.to_file_path().map_err(|()| {
            ResolveError::invalid_specifier(
                specifier,
                format!("Invalid module \"{specifier}\" is not a valid file URL"),
            )
        })?;

        if path.is_dir() {
            return Err(ResolveError::new(
                ResolveErrorCode::UnsupportedDirImport,
                specifier,
                format!(
                    "Directory import '{}' is not supported resolving ES modules imported from {}",
                    path.display(),
                    self.importer(ctx)
                ),
            ));
        }
        if !path.is_file() {
            return Err(ResolveError::module_not_found(
                specifier,
                format!(
                    "Cannot find module '{}' imported from {}",
                    path.display(),
                    self.importer(ctx)
                ),
            ));
        }

        let format = self.host_format(&path);
        Ok(Resolution::new(url, format))
    }

    /// `#name` specifiers through the nearest package.json `imports`.
    fn resolve_package_import(
        &self,
        specifier: &str,
        ctx: &ResolveContext,
    ) -> Result<Resolution, ResolveError> {
        let base = self.base_dir(ctx);
        let (bare, query) = split_query(specifier);
        let manifest_path = hookline_util::fs::find_file_up(&base, PACKAGE_JSON);
        let not_defined = |pkg: &str| {
            ResolveError::new(
                ResolveErrorCode::PackageImportNotDefined,
                specifier,
                format!(
                    "Package import specifier \"{bare}\" is not defined{pkg} imported from {}",
                    self.importer(ctx)
                ),
            )
        };

        let Some(manifest_path) = manifest_path else {
            return Err(not_defined(""));
        };
        let manifest = read_manifest(&manifest_path, specifier)?;
        let pkg_dir = manifest_path.parent().unwrap_or(Path::new("/"));
        let conditions = effective_conditions(&ctx.conditions);
        let targets = resolve_imports(&manifest, bare, &conditions);
        if targets.is_empty() {
            return Err(not_defined(&format!(" in package {}", manifest_path.display())));
        }

        let mut first_err = None;
        for target in &targets {
            let attempt = if target.starts_with("./") {
                let path = normalize_path(&pkg_dir.join(target));
                if path.is_file() {
                    self.file_resolution(&path, query, specifier)
                } else {
                    Err(ResolveError::module_not_found(
                        specifier,
                        format!(
                            "Cannot find module '{}' imported from {}",
                            path.display(),
                            self.importer(ctx)
                        ),
                    ))
                }
            } else {
                self.resolve_bare(target, ctx)
            };
            match attempt {
                Ok(r) => return Ok(r),
                Err(e) => {
                    first_err.get_or_insert(e);
                }
            }
        }
        Err(first_err.unwrap_or_else(|| not_defined("")))
    }

    /// Bare specifiers through `node_modules`.
    fn resolve_bare(
        &self,
        specifier: &str,
        ctx: &ResolveContext,
    ) -> Result<Resolution, ResolveError> {
        let (bare, query) = split_query(specifier);
        let (name, subpath) = parse_bare_specifier(bare).ok_or_else(|| {
            ResolveError::invalid_specifier(
                specifier,
                format!("Invalid module \"{bare}\" is not a valid package name"),
            )
        })?;

        let base = self.base_dir(ctx);
        let Some(pkg_dir) = base
            .ancestors()
            .map(|dir| dir.join("node_modules").join(name))
            .find(|candidate| candidate.is_dir())
        else {
            return Err(ResolveError::module_not_found(
                specifier,
                format!(
                    "Cannot find package '{name}' imported from {}",
                    self.importer(ctx)
                ),
            ));
        };
        trace!(name, pkg_dir = %pkg_dir.display(), "found package");

        let manifest_path = pkg_dir.join(PACKAGE_JSON);
        let manifest = if manifest_path.is_file() {
            read_manifest(&manifest_path, specifier)?
        } else {
            Value::Null
        };

        if manifest.get("exports").is_some() {
            let export_subpath = subpath.map_or_else(|| ".".to_string(), |s| format!("./{s}"));
            let conditions = effective_conditions(&ctx.conditions);
            let targets = resolve_exports(&manifest, &export_subpath, &conditions);
            if targets.is_empty() {
                return Err(ResolveError::new(
                    ResolveErrorCode::PackagePathNotExported,
                    specifier,
                    format!(
                        "Package subpath '{export_subpath}' is not defined by \"exports\" in {} imported from {}",
                        manifest_path.display(),
                        self.importer(ctx)
                    ),
                ));
            }
            for target in &targets {
                let path = normalize_path(&pkg_dir.join(target));
                if path.is_file() {
                    return self.file_resolution(&path, query, specifier);
                }
            }
            let missing = normalize_path(&pkg_dir.join(&targets[0]));
            return Err(ResolveError::module_not_found(
                specifier,
                format!(
                    "Cannot find module '{}' imported from {}",
                    missing.display(),
                    self.importer(ctx)
                ),
            ));
        }

        if let Some(sub) = subpath {
            let path = normalize_path(&pkg_dir.join(sub));
            if path.is_dir() {
                return Err(ResolveError::new(
                    ResolveErrorCode::UnsupportedDirImport,
                    specifier,
                    format!(
                        "Directory import '{}' is not supported resolving ES modules imported from {}",
                        path.display(),
                        self.importer(ctx)
                    ),
                ));
            }
            if path.is_file() {
                return self.file_resolution(&path, query, specifier);
            }
            return Err(ResolveError::module_not_found(
                specifier,
                format!(
                    "Cannot find module '{}' imported from {}",
                    path.display(),
                    self.importer(ctx)
                ),
            ));
        }

        let main = manifest.get("main").and_then(Value::as_str);
        let mut candidates: Vec<PathBuf> = Vec::new();
        if let Some(main) = main {
            for suffix in MAIN_SUFFIXES {
                candidates.push(normalize_path(&pkg_dir.join(format!("{main}{suffix}"))));
            }
        }
        candidates.push(pkg_dir.join("index.js"));

        match candidates.iter().find(|c| c.is_file()) {
            Some(path) => self.file_resolution(path, query, specifier),
            None => Err(ResolveError::module_not_found(
                specifier,
                format!(
                    "Cannot find package '{}' imported from {}",
                    pkg_dir.display(),
                    self.importer(ctx)
                ),
            )),
        }
    }
}

impl NextResolve for NodeResolver {
    fn resolve(&self, specifier: &str, ctx: &ResolveContext) -> Result<Resolution, ResolveError> {
        if let Some(name) = specifier.strip_prefix(NODE_PROTOCOL) {
            return builtin(name, specifier);
        }
        if BUILTINS.contains(&specifier.split('/').next().unwrap_or(specifier)) {
            return builtin(specifier, specifier);
        }

        if specifier.starts_with(FILE_PROTOCOL)
            || is_relative(specifier)
            || Path::new(split_query(specifier).0).is_absolute()
        {
            return self.resolve_location(specifier, ctx);
        }

        if specifier.starts_with('#') {
            return self.resolve_package_import(specifier, ctx);
        }

        if let Ok(url) = Url::parse(specifier) {
            return Err(ResolveError::new(
                ResolveErrorCode::UnsupportedScheme,
                specifier,
                format!(
                    "Only URLs with a scheme in: file and node are supported by the default ESM loader. Received protocol '{}:'",
                    url.scheme()
                ),
            ));
        }

        self.resolve_bare(specifier, ctx)
    }
}

fn builtin(name: &str, specifier: &str) -> Result<Resolution, ResolveError> {
    let url = Url::parse(&format!("{NODE_PROTOCOL}{name}")).map_err(|_| {
        ResolveError::invalid_specifier(specifier, format!("Invalid builtin \"{specifier}\""))
    })?;
    Ok(Resolution::new(url, Some(ModuleFormat::Builtin)))
}

fn read_manifest(path: &Path, specifier: &str) -> Result<Value, ResolveError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        ResolveError::new(
            ResolveErrorCode::InvalidPackageConfig,
            specifier,
            format!("Invalid package config {}: {e}", path.display()),
        )
    })?;
    serde_json::from_str(&content).map_err(|e| {
        ResolveError::new(
            ResolveErrorCode::InvalidPackageConfig,
            specifier,
            format!("Invalid package config {}: {e}", path.display()),
        )
    })
}

/// Split a bare specifier into package name and subpath.
///
/// `"@scope/pkg/sub"` → `("@scope/pkg", Some("sub"))`, `"pkg"` → `("pkg", None)`.
fn parse_bare_specifier(spec: &str) -> Option<(&str, Option<&str>)> {
    if spec.is_empty() || spec.starts_with('.') || spec.contains('\\') || spec.contains('%') {
        return None;
    }
    let split_at = if spec.starts_with('@') {
        let first = spec.find('/')?;
        if first == 1 {
            return None;
        }
        spec[first + 1..].find('/').map(|i| first + 1 + i)
    } else {
        spec.find('/')
    };
    match split_at {
        Some(idx) => {
            let sub = &spec[idx + 1..];
            Some((&spec[..idx], (!sub.is_empty()).then_some(sub)))
        }
        None => Some((spec, None)),
    }
}
