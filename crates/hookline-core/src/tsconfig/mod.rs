//! tsconfig discovery and evaluation.
//!
//! A [`TsConfig`] is loaded once at startup and is read-only afterwards.
//! It supplies two things to the pipeline:
//! - a [`PathsMatcher`] for bare specifiers (`compilerOptions.paths` / `baseUrl`)
//! - the raw options handed to the compiler for files the config covers

pub mod jsonc;
pub mod paths;

pub use paths::PathsMatcher;

use glob::{MatchOptions, Pattern};
use hookline_util::fs::find_file_up;
use hookline_util::path::{normalize_path, to_slash};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::Error;

/// File name searched for when no explicit tsconfig is configured.
pub const TSCONFIG_FILE: &str = "tsconfig.json";

const DEFAULT_EXCLUDES: &[&str] = &["node_modules", "bower_components", "jspm_packages"];

/// A list of patterns together with the directory they are relative to.
#[derive(Debug, Clone)]
struct Scoped {
    dir: PathBuf,
    patterns: Vec<String>,
}

/// Everything one tsconfig file (plus its `extends` chain) contributes.
#[derive(Debug, Clone, Default)]
struct Layer {
    compiler_options: Map<String, Value>,
    base_url: Option<PathBuf>,
    paths: Option<(Map<String, Value>, PathBuf)>,
    files: Option<Scoped>,
    include: Option<Scoped>,
    exclude: Option<Scoped>,
}

impl Layer {
    /// Overlay `other` on top of `self`: `other` wins wherever it declares a
    /// value.
    fn merge(&mut self, other: Layer) {
        self.compiler_options.extend(other.compiler_options);
        if other.base_url.is_some() {
            self.base_url = other.base_url;
        }
        if other.paths.is_some() {
            self.paths = other.paths;
        }
        if other.files.is_some() {
            self.files = other.files;
        }
        if other.include.is_some() {
            self.include = other.include;
        }
        if other.exclude.is_some() {
            self.exclude = other.exclude;
        }
    }
}

/// A loaded tsconfig with its `extends` chain flattened.
#[derive(Debug, Clone)]
pub struct TsConfig {
    path: PathBuf,
    layer: Layer,
    matcher: FilesMatcher,
}

impl TsConfig {
    /// Find the nearest `tsconfig.json` at or above `start`.
    #[must_use]
    pub fn find(start: &Path) -> Option<PathBuf> {
        find_file_up(start, TSCONFIG_FILE)
    }

    /// Load a tsconfig file, following `extends`.
    ///
    /// # Errors
    /// Returns an error if the file (or an extended file) cannot be read,
    /// parsed, or located, or if the `extends` chain loops.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let path = dunce::canonicalize(path).map_err(|source| Error::TsConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let mut visited = Vec::new();
        let layer = load_layer(&path, &mut visited)?;
        let matcher = FilesMatcher::from_layer(&layer, &path);
        debug!(path = %path.display(), "loaded tsconfig");
        Ok(Self {
            path,
            layer,
            matcher,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Merged `compilerOptions` across the `extends` chain.
    #[must_use]
    pub fn compiler_options(&self) -> &Map<String, Value> {
        &self.layer.compiler_options
    }

    /// Path matcher for bare specifiers, if `paths` or `baseUrl` is set.
    #[must_use]
    pub fn paths_matcher(&self) -> Option<PathsMatcher> {
        let (paths, paths_dir) = match &self.layer.paths {
            Some((map, dir)) => (Some(map), dir.as_path()),
            None => (None, self.dir()),
        };
        PathsMatcher::new(paths, paths_dir, self.layer.base_url.as_deref())
    }

    /// Whether `file` is part of this project (`files` / `include` / `exclude`).
    #[must_use]
    pub fn matches_file(&self, file: &Path) -> bool {
        self.matcher.matches(file)
    }

    /// Raw tsconfig object for `file`, or `None` when the file is outside
    /// this project.
    #[must_use]
    pub fn raw_for(&self, file: &Path) -> Option<Value> {
        if !self.matches_file(file) {
            return None;
        }
        Some(json!({ "compilerOptions": Value::Object(self.layer.compiler_options.clone()) }))
    }

    fn dir(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new("/"))
    }
}

fn load_layer(path: &Path, visited: &mut Vec<PathBuf>) -> Result<Layer, Error> {
    if visited.iter().any(|p| p == path) {
        return Err(Error::TsConfigExtendsCycle {
            path: path.to_path_buf(),
        });
    }
    visited.push(path.to_path_buf());

    let source = hookline_util::fs::read_to_string_lossy(path).map_err(|source| {
        Error::TsConfigRead {
            path: path.to_path_buf(),
            source,
        }
    })?;
    let raw = jsonc::parse(&source).map_err(|source| Error::TsConfigParse {
        path: path.to_path_buf(),
        source,
    })?;
    let dir = path.parent().unwrap_or(Path::new("/")).to_path_buf();

    let mut layer = Layer::default();

    let extends: Vec<&str> = match raw.get("extends") {
        Some(Value::String(s)) => vec![s.as_str()],
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    };
    for spec in extends {
        let parent = resolve_extends(spec, &dir).ok_or_else(|| Error::TsConfigExtendsNotFound {
            specifier: spec.to_string(),
            from: path.to_path_buf(),
        })?;
        layer.merge(load_layer(&parent, visited)?);
    }

    layer.merge(own_layer(&raw, &dir));
    visited.pop();
    Ok(layer)
}

fn own_layer(raw: &Value, dir: &Path) -> Layer {
    let mut compiler_options = raw
        .get("compilerOptions")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    let base_url = compiler_options
        .get("baseUrl")
        .and_then(Value::as_str)
        .map(|b| normalize_path(&dir.join(b)));

    let paths = compiler_options
        .remove("paths")
        .and_then(|p| p.as_object().cloned())
        .map(|p| (p, dir.to_path_buf()));

    let scoped = |key: &str| {
        raw.get(key).and_then(Value::as_array).map(|items| Scoped {
            dir: dir.to_path_buf(),
            patterns: items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect(),
        })
    };

    Layer {
        compiler_options,
        base_url,
        paths,
        files: scoped("files"),
        include: scoped("include"),
        exclude: scoped("exclude"),
    }
}

/// Locate an `extends` target: a relative/absolute file or a package path
/// under `node_modules`.
fn resolve_extends(spec: &str, from_dir: &Path) -> Option<PathBuf> {
    let probe = |base: PathBuf| -> Option<PathBuf> {
        let mut with_json = base.clone().into_os_string();
        with_json.push(".json");
        let candidates = [
            base.clone(),
            PathBuf::from(with_json),
            base.join(TSCONFIG_FILE),
        ];
        candidates
            .into_iter()
            .find(|c| c.is_file())
            .and_then(|c| dunce::canonicalize(c).ok())
    };

    if spec.starts_with("./") || spec.starts_with("../") || Path::new(spec).is_absolute() {
        return probe(normalize_path(&from_dir.join(spec)));
    }

    from_dir
        .ancestors()
        .find_map(|dir| probe(dir.join("node_modules").join(spec)))
}

/// Decides which files a tsconfig covers.
#[derive(Debug, Clone)]
struct FilesMatcher {
    files: Vec<PathBuf>,
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl FilesMatcher {
    fn from_layer(layer: &Layer, config_path: &Path) -> Self {
        let config_dir = config_path.parent().unwrap_or(Path::new("/"));

        let files = layer
            .files
            .iter()
            .flat_map(|s| s.patterns.iter().map(|f| normalize_path(&s.dir.join(f))))
            .collect();

        let include = match (&layer.include, &layer.files) {
            (Some(scoped), _) => compile_patterns(scoped),
            (None, Some(_)) => Vec::new(),
            (None, None) => compile_patterns(&Scoped {
                dir: config_dir.to_path_buf(),
                patterns: vec!["**/*".to_string()],
            }),
        };

        let exclude = match &layer.exclude {
            Some(scoped) => compile_patterns(scoped),
            None => {
                let mut patterns: Vec<String> =
                    DEFAULT_EXCLUDES.iter().map(|s| (*s).to_string()).collect();
                if let Some(out_dir) = layer.compiler_options.get("outDir").and_then(Value::as_str) {
                    patterns.push(out_dir.to_string());
                }
                compile_patterns(&Scoped {
                    dir: config_dir.to_path_buf(),
                    patterns,
                })
            }
        };

        Self {
            files,
            include,
            exclude,
        }
    }

    fn matches(&self, file: &Path) -> bool {
        let file = normalize_path(file);
        if self.files.iter().any(|f| *f == file) {
            return true;
        }
        let slash = to_slash(&file);
        let opts = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };
        if self.exclude.iter().any(|p| p.matches_with(&slash, opts)) {
            return false;
        }
        self.include.iter().any(|p| p.matches_with(&slash, opts))
    }
}

/// Turn tsconfig-style patterns into absolute glob patterns. A pattern
/// without wildcards whose last segment has no extension names a directory.
fn compile_patterns(scoped: &Scoped) -> Vec<Pattern> {
    let base = Pattern::escape(&to_slash(&scoped.dir));
    let mut out = Vec::new();
    for raw in &scoped.patterns {
        let rel = raw.trim_start_matches("./").trim_end_matches('/');
        let has_magic = rel.contains(['*', '?']);
        let last = rel.rsplit('/').next().unwrap_or(rel);
        let mut variants = vec![format!("{base}/{rel}")];
        if !has_magic && !last.contains('.') {
            variants.push(format!("{base}/{rel}/**/*"));
        }
        for v in variants {
            match Pattern::new(&v) {
                Ok(p) => out.push(p),
                Err(e) => debug!(pattern = %v, error = %e, "skipping invalid tsconfig pattern"),
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_find_nearest() {
        let dir = tempdir().unwrap();
        write(&dir.path().join("tsconfig.json"), "{}");
        fs::create_dir_all(dir.path().join("src/a")).unwrap();
        assert_eq!(
            TsConfig::find(&dir.path().join("src/a")),
            Some(dir.path().join("tsconfig.json"))
        );
    }

    #[test]
    fn test_load_jsonc_and_paths() {
        let dir = tempdir().unwrap();
        let root = dunce::canonicalize(dir.path()).unwrap();
        write(
            &root.join("tsconfig.json"),
            r#"{
                // comment
                "compilerOptions": { "paths": { "x/*": ["lib/*"], }, "jsx": "react-jsx" },
            }"#,
        );
        let cfg = TsConfig::load(&root.join("tsconfig.json")).unwrap();
        assert_eq!(cfg.compiler_options()["jsx"], "react-jsx");
        assert!(cfg.compiler_options().get("paths").is_none());
        let m = cfg.paths_matcher().unwrap();
        assert_eq!(m.candidates("x/util"), vec![root.join("lib/util")]);
    }

    #[test]
    fn test_extends_merges_and_keeps_parent_paths_dir() {
        let dir = tempdir().unwrap();
        let root = dunce::canonicalize(dir.path()).unwrap();
        write(
            &root.join("tsconfig.base.json"),
            r#"{ "compilerOptions": { "strict": true, "target": "es2020", "paths": { "@/*": ["src/*"] } } }"#,
        );
        write(
            &root.join("app/tsconfig.json"),
            r#"{ "extends": "../tsconfig.base.json", "compilerOptions": { "target": "es2022" } }"#,
        );
        let cfg = TsConfig::load(&root.join("app/tsconfig.json")).unwrap();
        assert_eq!(cfg.compiler_options()["strict"], true);
        assert_eq!(cfg.compiler_options()["target"], "es2022");
        let m = cfg.paths_matcher().unwrap();
        assert_eq!(m.candidates("@/a"), vec![root.join("src/a")]);
    }

    #[test]
    fn test_extends_package_in_node_modules() {
        let dir = tempdir().unwrap();
        let root = dunce::canonicalize(dir.path()).unwrap();
        write(
            &root.join("node_modules/@tsconfig/node20/tsconfig.json"),
            r#"{ "compilerOptions": { "module": "node16" } }"#,
        );
        write(
            &root.join("tsconfig.json"),
            r#"{ "extends": "@tsconfig/node20/tsconfig.json" }"#,
        );
        let cfg = TsConfig::load(&root.join("tsconfig.json")).unwrap();
        assert_eq!(cfg.compiler_options()["module"], "node16");
    }

    #[test]
    fn test_extends_missing_is_error() {
        let dir = tempdir().unwrap();
        write(&dir.path().join("tsconfig.json"), r#"{ "extends": "./nope.json" }"#);
        let err = TsConfig::load(&dir.path().join("tsconfig.json")).unwrap_err();
        assert!(matches!(err, Error::TsConfigExtendsNotFound { .. }));
    }

    #[test]
    fn test_extends_cycle_is_error() {
        let dir = tempdir().unwrap();
        write(&dir.path().join("a.json"), r#"{ "extends": "./b.json" }"#);
        write(&dir.path().join("b.json"), r#"{ "extends": "./a.json" }"#);
        let err = TsConfig::load(&dir.path().join("a.json")).unwrap_err();
        assert!(matches!(err, Error::TsConfigExtendsCycle { .. }));
    }

    #[test]
    fn test_parse_error() {
        let dir = tempdir().unwrap();
        write(&dir.path().join("tsconfig.json"), "{ nope }");
        let err = TsConfig::load(&dir.path().join("tsconfig.json")).unwrap_err();
        assert!(matches!(err, Error::TsConfigParse { .. }));
    }

    #[test]
    fn test_files_matcher_defaults() {
        let dir = tempdir().unwrap();
        let root = dunce::canonicalize(dir.path()).unwrap();
        write(&root.join("tsconfig.json"), "{}");
        let cfg = TsConfig::load(&root.join("tsconfig.json")).unwrap();
        assert!(cfg.matches_file(&root.join("src/a.ts")));
        assert!(cfg.matches_file(&root.join("a.ts")));
        assert!(!cfg.matches_file(&root.join("node_modules/x/index.ts")));
        assert!(cfg.raw_for(&root.join("src/a.ts")).is_some());
    }

    #[test]
    fn test_files_matcher_include_exclude() {
        let dir = tempdir().unwrap();
        let root = dunce::canonicalize(dir.path()).unwrap();
        write(
            &root.join("tsconfig.json"),
            r#"{ "include": ["src"], "exclude": ["src/**/*.test.ts"], "files": ["scripts/build.ts"] }"#,
        );
        let cfg = TsConfig::load(&root.join("tsconfig.json")).unwrap();
        assert!(cfg.matches_file(&root.join("src/deep/a.ts")));
        assert!(!cfg.matches_file(&root.join("src/a.test.ts")));
        assert!(!cfg.matches_file(&root.join("other/a.ts")));
        assert!(cfg.matches_file(&root.join("scripts/build.ts")));
        assert!(cfg.raw_for(&root.join("other/a.ts")).is_none());
    }
}
