use hookline_util::path::normalize_path;
use std::path::{Path, PathBuf};
use url::Url;

use super::{importer_path, Expander, Expansion};
use crate::hooks::{ModuleFormat, Resolution, ResolveContext};
use crate::resolver::ResolveError;
use crate::specifier::split_query;

/// Extensions probed after the exact path.
const PROBE_EXTENSIONS: &[&str] = &[
    ".ts", ".tsx", ".js", ".jsx", ".mts", ".mjs", ".cts", ".cjs", ".json",
];

/// `~/x` → `<workspace root>/x`.
#[derive(Debug, Clone)]
pub struct TildeExpander {
    root: PathBuf,
}

impl TildeExpander {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Absolute path a tilde specifier (query removed) points at.
    #[must_use]
    pub fn expand_path(&self, specifier: &str) -> PathBuf {
        let rest = specifier.trim_start_matches('~').trim_start_matches('/');
        let base = normalize_path(&self.root.join(rest));
        probe(&base).unwrap_or(base)
    }
}

/// First existing file among `base`, `base.<ext>` and `base/index.<ext>`.
fn probe(base: &Path) -> Option<PathBuf> {
    if base.is_file() {
        return Some(base.to_path_buf());
    }
    let name = base.file_name()?.to_string_lossy().into_owned();
    PROBE_EXTENSIONS
        .iter()
        .map(|ext| base.with_file_name(format!("{name}{ext}")))
        .chain(
            PROBE_EXTENSIONS
                .iter()
                .map(|ext| base.join(format!("index{ext}"))),
        )
        .find(|candidate| candidate.is_file())
}

impl Expander for TildeExpander {
    fn name(&self) -> &'static str {
        "tilde"
    }

    fn expand(&self, specifier: &str, ctx: &ResolveContext) -> Result<Expansion, ResolveError> {
        if !specifier.starts_with('~') || importer_path(ctx).is_none() {
            return Ok(Expansion::NoMatch);
        }
        let (path, query) = split_query(specifier);
        let target = self.expand_path(path);
        let mut url = Url::from_file_path(&target).map_err(|()| {
            ResolveError::invalid_specifier(
                specifier,
                format!("Could not expand \"{specifier}\" to a file path"),
            )
        })?;
        url.set_query(query.map(|q| q.trim_start_matches('?')));
        Ok(Expansion::Resolved(Resolution::short_circuit(
            url,
            ModuleFormat::Module,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn setup() -> (tempfile::TempDir, PathBuf, ResolveContext) {
        let dir = tempdir().unwrap();
        let root = dunce::canonicalize(dir.path()).unwrap();
        fs::create_dir_all(root.join("src/utils")).unwrap();
        fs::write(root.join("src/config.ts"), "").unwrap();
        fs::write(root.join("src/utils/index.ts"), "").unwrap();
        let ctx =
            ResolveContext::with_parent(Url::from_file_path(root.join("src/main.ts")).unwrap());
        (dir, root, ctx)
    }

    fn resolved(expansion: Expansion) -> Resolution {
        match expansion {
            Expansion::Resolved(r) => r,
            Expansion::NoMatch => panic!("expected a resolution"),
        }
    }

    #[test]
    fn test_expands_with_extension_probe() {
        let (_d, root, ctx) = setup();
        let r = resolved(TildeExpander::new(root.clone()).expand("~/src/config", &ctx).unwrap());
        assert_eq!(r.url.to_file_path().unwrap(), root.join("src/config.ts"));
        assert_eq!(r.format, Some(ModuleFormat::Module));
        assert!(r.short_circuit);
    }

    #[test]
    fn test_expands_directory_index_and_keeps_query() {
        let (_d, root, ctx) = setup();
        let r = resolved(
            TildeExpander::new(root.clone())
                .expand("~/src/utils?v=2", &ctx)
                .unwrap(),
        );
        assert_eq!(r.url.to_file_path().unwrap(), root.join("src/utils/index.ts"));
        assert_eq!(r.url.query(), Some("v=2"));
    }

    #[test]
    fn test_missing_target_still_short_circuits() {
        let (_d, root, ctx) = setup();
        let r = resolved(TildeExpander::new(root.clone()).expand("~/nope.js", &ctx).unwrap());
        assert_eq!(r.url.to_file_path().unwrap(), root.join("nope.js"));
    }

    #[test]
    fn test_requires_importer() {
        let (_d, root, _ctx) = setup();
        let expansion = TildeExpander::new(root)
            .expand("~/src/config", &ResolveContext::default())
            .unwrap();
        assert_eq!(expansion, Expansion::NoMatch);
    }

    #[test]
    fn test_ignores_other_specifiers() {
        let (_d, root, ctx) = setup();
        let expansion = TildeExpander::new(root).expand("./src/config", &ctx).unwrap();
        assert_eq!(expansion, Expansion::NoMatch);
    }
}
