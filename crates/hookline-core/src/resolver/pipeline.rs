//! The resolution orchestrator.

use std::fmt;
use tracing::{debug, trace};
use url::Url;

use super::error::{ResolveError, ResolveErrorCode};
use super::fallback::typed_importer;
use super::format::FormatClassifier;
use crate::alias::{Expander, Expansion};
use crate::hooks::{NextResolve, Resolution, ResolveContext};
use crate::specifier::{
    is_dependency_path, is_explicit_directory, is_path_like, split_query, with_query,
};
use crate::tsconfig::PathsMatcher;

/// Turns a specifier and its importer into a resolved URL and format.
///
/// Strategies run in a fixed order and the first success wins:
///
/// 1. specifiers inside `node_modules` go straight to the host
/// 2. alias expanders (tilde, glob, workspace)
/// 3. explicit directories (`./dir/`)
/// 4. tsconfig `paths` for bare specifiers
/// 5. typed-source variants when the importer is TypeScript
/// 6. the specifier exactly as written
/// 7. directory or extension recovery after step 6 fails
///
/// When step 7 fails too, the step 6 error is what the caller sees.
pub struct SpecifierResolver {
    expanders: Vec<Box<dyn Expander>>,
    paths: Option<PathsMatcher>,
    classifier: FormatClassifier,
}

impl fmt::Debug for SpecifierResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpecifierResolver")
            .field(
                "expanders",
                &self.expanders.iter().map(|e| e.name()).collect::<Vec<_>>(),
            )
            .field("paths", &self.paths.is_some())
            .finish_non_exhaustive()
    }
}

impl SpecifierResolver {
    #[must_use]
    pub fn new(
        expanders: Vec<Box<dyn Expander>>,
        paths: Option<PathsMatcher>,
        classifier: FormatClassifier,
    ) -> Self {
        Self {
            expanders,
            paths,
            classifier,
        }
    }

    /// Resolve `specifier` imported from `ctx.parent_url`.
    ///
    /// # Errors
    /// Returns the most specific resolution error: the host's error for the
    /// specifier as written when every fallback fails.
    pub fn resolve(
        &self,
        specifier: &str,
        ctx: &ResolveContext,
        next: &dyn NextResolve,
    ) -> Result<Resolution, ResolveError> {
        let result = self.resolve_inner(specifier, ctx, next, false);
        match &result {
            Ok(resolution) => debug!(
                specifier,
                url = %resolution.url,
                format = ?resolution.format,
                short_circuit = resolution.short_circuit,
                "resolved"
            ),
            Err(err) => debug!(specifier, code = %err.code, "resolution failed"),
        }
        result
    }

    #[must_use]
    pub fn classifier(&self) -> &FormatClassifier {
        &self.classifier
    }

    fn resolve_inner(
        &self,
        specifier: &str,
        ctx: &ResolveContext,
        next: &dyn NextResolve,
        recursive: bool,
    ) -> Result<Resolution, ResolveError> {
        if is_dependency_path(specifier) {
            trace!(specifier, "dependency path, deferring to host");
            return next.resolve(specifier, ctx);
        }

        if !recursive {
            for expander in &self.expanders {
                if let Expansion::Resolved(resolution) = expander.expand(specifier, ctx)? {
                    trace!(specifier, expander = expander.name(), "expanded");
                    return Ok(resolution);
                }
            }
        }

        if is_explicit_directory(specifier) {
            return self.try_directory(specifier, ctx, next);
        }

        if !recursive && !is_path_like(specifier) {
            if let Some(resolution) = self.try_paths(specifier, ctx, next) {
                return Ok(resolution);
            }
        }

        if typed_importer(ctx) {
            if let Some(resolution) = self.try_typed_variants(specifier, ctx, next)? {
                return Ok(resolution);
            }
        }

        let err = match self.resolve_explicit(specifier, ctx, next) {
            Ok(resolution) => return Ok(resolution),
            Err(err) => err,
        };

        let recovered = match err.code {
            ResolveErrorCode::UnsupportedDirImport => self.try_directory(specifier, ctx, next),
            ResolveErrorCode::ModuleNotFound => self.try_extensions(specifier, ctx, next),
            _ => return Err(err),
        };
        recovered.map_err(|retry| {
            trace!(specifier, retry = %retry, "recovery failed, keeping original error");
            err
        })
    }

    /// Step 4: tsconfig `paths` candidates, each resolved as a `file:` URL.
    fn try_paths(
        &self,
        specifier: &str,
        ctx: &ResolveContext,
        next: &dyn NextResolve,
    ) -> Option<Resolution> {
        let paths = self.paths.as_ref()?;
        if ctx.parent_str().is_some_and(is_dependency_path) {
            return None;
        }

        let (bare, query) = split_query(specifier);
        for candidate in paths.candidates(bare) {
            let Ok(url) = Url::from_file_path(&candidate) else {
                continue;
            };
            let candidate_spec = with_query(url.as_str(), query);
            match self.resolve_inner(&candidate_spec, ctx, next, true) {
                Ok(resolution) => {
                    trace!(specifier, candidate = %candidate.display(), "resolved via tsconfig paths");
                    return Some(resolution);
                }
                Err(err) => trace!(specifier, candidate = %candidate.display(), code = %err.code, "paths candidate failed"),
            }
        }
        None
    }

    /// Host resolution plus format classification for unclassified files.
    pub(crate) fn resolve_explicit(
        &self,
        specifier: &str,
        ctx: &ResolveContext,
        next: &dyn NextResolve,
    ) -> Result<Resolution, ResolveError> {
        let mut resolution = next.resolve(specifier, ctx)?;
        if resolution.format.is_none() {
            resolution.format = self.classifier.classify_url(&resolution.url);
        }
        Ok(resolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::ModuleFormat;
    use crate::resolver::NodeResolver;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::tempdir;

    fn root() -> (tempfile::TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let root = dunce::canonicalize(dir.path()).unwrap();
        (dir, root)
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    fn ctx(importer: &Path) -> ResolveContext {
        ResolveContext::with_parent(Url::from_file_path(importer).unwrap())
    }

    fn plain() -> SpecifierResolver {
        SpecifierResolver::new(Vec::new(), None, FormatClassifier::new())
    }

    #[test]
    fn test_extensionless_finds_ts() {
        let (_d, root) = root();
        touch(&root.join("foo.ts"));
        let r = plain()
            .resolve("./foo", &ctx(&root.join("main.js")), &NodeResolver::new())
            .unwrap();
        assert_eq!(r.url.to_file_path().unwrap(), root.join("foo.ts"));
        assert_eq!(r.format, Some(ModuleFormat::CommonJs));
    }

    #[test]
    fn test_plain_importer_prefers_js() {
        let (_d, root) = root();
        touch(&root.join("foo.ts"));
        touch(&root.join("foo.js"));
        let r = plain()
            .resolve("./foo", &ctx(&root.join("main.js")), &NodeResolver::new())
            .unwrap();
        assert_eq!(r.url.to_file_path().unwrap(), root.join("foo.js"));
    }

    #[test]
    fn test_typed_importer_prefers_ts() {
        let (_d, root) = root();
        touch(&root.join("foo.ts"));
        touch(&root.join("foo.js"));
        let resolver = plain();
        let from = ctx(&root.join("main.ts"));

        let r = resolver.resolve("./foo", &from, &NodeResolver::new()).unwrap();
        assert_eq!(r.url.to_file_path().unwrap(), root.join("foo.ts"));

        let r = resolver.resolve("./foo.js", &from, &NodeResolver::new()).unwrap();
        assert_eq!(r.url.to_file_path().unwrap(), root.join("foo.ts"));
    }

    #[test]
    fn test_directory_index() {
        let (_d, root) = root();
        touch(&root.join("dir/index.ts"));
        let from = ctx(&root.join("main.ts"));
        let resolver = plain();

        let r = resolver.resolve("./dir", &from, &NodeResolver::new()).unwrap();
        assert_eq!(r.url.to_file_path().unwrap(), root.join("dir/index.ts"));

        let r = resolver.resolve("./dir/", &from, &NodeResolver::new()).unwrap();
        assert_eq!(r.url.to_file_path().unwrap(), root.join("dir/index.ts"));
    }

    #[test]
    fn test_explicit_directory_error_has_no_index() {
        let (_d, root) = root();
        fs::create_dir_all(root.join("empty")).unwrap();
        let err = plain()
            .resolve("./empty/", &ctx(&root.join("main.ts")), &NodeResolver::new())
            .unwrap_err();
        assert_eq!(err.specifier, "./empty/");
        assert!(!err.message.contains("index'"), "{}", err.message);
    }

    #[test]
    fn test_original_error_survives_recovery() {
        let (_d, root) = root();
        let err = plain()
            .resolve("./missing", &ctx(&root.join("main.ts")), &NodeResolver::new())
            .unwrap_err();
        assert_eq!(err.code, ResolveErrorCode::ModuleNotFound);
        assert_eq!(err.specifier, "./missing");
        assert!(err
            .message
            .contains(&format!("'{}'", root.join("missing").display())));
    }

    #[test]
    fn test_query_survives_fallback() {
        let (_d, root) = root();
        touch(&root.join("foo.ts"));
        let r = plain()
            .resolve("./foo?raw=1&x", &ctx(&root.join("main.ts")), &NodeResolver::new())
            .unwrap();
        assert_eq!(r.url.path(), Url::from_file_path(root.join("foo.ts")).unwrap().path());
        assert_eq!(r.url.query(), Some("raw=1&x"));
    }

    #[test]
    fn test_dependency_specifier_goes_to_host() {
        let next = |spec: &str, _: &ResolveContext| {
            Err::<Resolution, _>(ResolveError::new(
                ResolveErrorCode::InvalidPackageConfig,
                spec,
                "host only",
            ))
        };
        let err = plain()
            .resolve("/x/node_modules/a/index", &ResolveContext::default(), &next)
            .unwrap_err();
        assert_eq!(err.code, ResolveErrorCode::InvalidPackageConfig);
    }

    #[test]
    fn test_other_errors_are_not_recovered() {
        let calls = std::sync::atomic::AtomicUsize::new(0);
        let next = |spec: &str, _: &ResolveContext| {
            calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Err::<Resolution, _>(ResolveError::new(
                ResolveErrorCode::PackagePathNotExported,
                spec,
                "not exported",
            ))
        };
        let err = plain()
            .resolve("pkg/internal", &ResolveContext::default(), &next)
            .unwrap_err();
        assert_eq!(err.code, ResolveErrorCode::PackagePathNotExported);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_typed_variant_hard_error_propagates() {
        let next = |spec: &str, _: &ResolveContext| match spec {
            "./foo.ts" => Err(ResolveError::new(
                ResolveErrorCode::UnsupportedDirImport,
                spec,
                "Directory import './foo.ts' is not supported",
            )),
            _ => Ok(Resolution::new(
                Url::parse("file:///p/foo.js").unwrap(),
                Some(ModuleFormat::Module),
            )),
        };
        let from = ResolveContext::with_parent(Url::parse("file:///p/main.ts").unwrap());
        let err = plain().resolve("./foo.js", &from, &next).unwrap_err();
        assert_eq!(err.code, ResolveErrorCode::UnsupportedDirImport);
        assert_eq!(err.specifier, "./foo.ts");
    }

    #[test]
    fn test_missing_typed_variant_is_skipped() {
        let next = |spec: &str, _: &ResolveContext| match spec {
            "./foo.js" => Ok(Resolution::new(
                Url::parse("file:///p/foo.js").unwrap(),
                Some(ModuleFormat::Module),
            )),
            _ => Err(ResolveError::module_not_found(spec, "missing")),
        };
        let from = ResolveContext::with_parent(Url::parse("file:///p/main.ts").unwrap());
        let r = plain().resolve("./foo.js", &from, &next).unwrap();
        assert_eq!(r.url.as_str(), "file:///p/foo.js");
    }
}
