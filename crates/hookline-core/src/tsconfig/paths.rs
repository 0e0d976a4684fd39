//! `compilerOptions.paths` matching.

use hookline_util::path::normalize_path;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::specifier::is_relative;

#[derive(Debug, Clone, PartialEq, Eq)]
enum PathPattern {
    Exact(String),
    Star { prefix: String, suffix: String },
}

#[derive(Debug, Clone)]
struct PathEntry {
    pattern: PathPattern,
    /// Absolute substitution templates; may contain a single `*`.
    substitutions: Vec<String>,
}

/// Maps bare specifiers to candidate files using tsconfig `paths` and
/// `baseUrl`.
///
/// Matching rules:
/// - an exact key wins outright
/// - otherwise the `*` key with the longest prefix wins
/// - with no match, `baseUrl` (when set) yields `<baseUrl>/<specifier>`
/// - relative specifiers never match
#[derive(Debug, Clone)]
pub struct PathsMatcher {
    entries: Vec<PathEntry>,
    base_url: Option<PathBuf>,
}

impl PathsMatcher {
    /// Build a matcher. Substitutions resolve against `base_url` when set,
    /// otherwise against `paths_dir` (the directory of the tsconfig that
    /// declared `paths`).
    ///
    /// Returns `None` when neither `paths` nor `baseUrl` is configured.
    #[must_use]
    pub fn new(
        paths: Option<&Map<String, Value>>,
        paths_dir: &Path,
        base_url: Option<&Path>,
    ) -> Option<Self> {
        if paths.is_none() && base_url.is_none() {
            return None;
        }

        let resolve_base = base_url.unwrap_or(paths_dir);
        let mut entries = Vec::new();

        for (key, value) in paths.into_iter().flatten() {
            let Some(pattern) = parse_pattern(key) else {
                continue;
            };
            let Some(subs) = value.as_array() else {
                continue;
            };
            let substitutions = subs
                .iter()
                .filter_map(Value::as_str)
                .map(|s| {
                    normalize_path(&resolve_base.join(s))
                        .to_string_lossy()
                        .into_owned()
                })
                .collect();
            entries.push(PathEntry {
                pattern,
                substitutions,
            });
        }

        Some(Self {
            entries,
            base_url: base_url.map(Path::to_path_buf),
        })
    }

    /// Candidate absolute paths for `specifier`, best first.
    ///
    /// The specifier must already have its query removed.
    #[must_use]
    pub fn candidates(&self, specifier: &str) -> Vec<PathBuf> {
        if is_relative(specifier) {
            return Vec::new();
        }

        let mut best: Option<(&PathEntry, &str, &str)> = None;
        for entry in &self.entries {
            match &entry.pattern {
                PathPattern::Exact(key) if key == specifier => {
                    return entry.substitutions.iter().map(PathBuf::from).collect();
                }
                PathPattern::Exact(_) => {}
                PathPattern::Star { prefix, suffix } => {
                    let matches = specifier.len() >= prefix.len() + suffix.len()
                        && specifier.starts_with(prefix.as_str())
                        && specifier.ends_with(suffix.as_str());
                    let longer = best.map_or(true, |(_, p, _)| prefix.len() > p.len());
                    if matches && longer {
                        best = Some((entry, prefix.as_str(), suffix.as_str()));
                    }
                }
            }
        }

        let Some((entry, prefix, suffix)) = best else {
            return self
                .base_url
                .as_ref()
                .map(|base| vec![normalize_path(&base.join(specifier))])
                .unwrap_or_default();
        };

        let captured = &specifier[prefix.len()..specifier.len() - suffix.len()];
        entry
            .substitutions
            .iter()
            .map(|s| PathBuf::from(s.replacen('*', captured, 1)))
            .collect()
    }
}

fn parse_pattern(key: &str) -> Option<PathPattern> {
    match key.matches('*').count() {
        0 => Some(PathPattern::Exact(key.to_string())),
        1 => {
            let (prefix, suffix) = key.split_once('*')?;
            Some(PathPattern::Star {
                prefix: prefix.to_string(),
                suffix: suffix.to_string(),
            })
        }
        _ => None,
    }
}
