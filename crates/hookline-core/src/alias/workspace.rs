use hookline_util::path::normalize_path;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use super::{Expander, Expansion};
use crate::hooks::{Resolution, ResolveContext};
use crate::resolver::{effective_conditions, resolve_exports, ResolveError, ResolveErrorCode};
use crate::specifier::split_query;
use crate::workspace::WorkspaceIndex;

/// `@-/<slug>/<subpath>` → a file inside the workspace package `<slug>`,
/// through that package's `exports`.
#[derive(Debug, Clone)]
pub struct WorkspaceExpander {
    workspace: Arc<WorkspaceIndex>,
    scope: String,
}

impl WorkspaceExpander {
    /// `scope` is the specifier prefix including its trailing `/`.
    #[must_use]
    pub fn new(workspace: Arc<WorkspaceIndex>, scope: String) -> Self {
        Self { workspace, scope }
    }
}

impl Expander for WorkspaceExpander {
    fn name(&self) -> &'static str {
        "workspace"
    }

    fn expand(&self, specifier: &str, ctx: &ResolveContext) -> Result<Expansion, ResolveError> {
        let Some(rest) = specifier.strip_prefix(self.scope.as_str()) else {
            return Ok(Expansion::NoMatch);
        };
        let (rest, query) = split_query(rest);
        let (slug, remainder) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, ""),
        };

        if slug.is_empty() {
            return Err(ResolveError::invalid_specifier(
                specifier,
                format!("Could not extract workspace package slug from \"{specifier}\""),
            ));
        }

        let Some(package) = self.workspace.get(slug) else {
            return Err(ResolveError::new(
                ResolveErrorCode::WorkspacePackageNotFound,
                specifier,
                format!("Could not find workspace package \"{specifier}\""),
            ));
        };

        let subpath = format!(".{remainder}");
        let conditions = effective_conditions(&ctx.conditions);
        let targets = resolve_exports(&package.manifest, &subpath, &conditions);
        let Some(first) = targets.first() else {
            debug!(specifier, slug, subpath, "no exports match, falling through");
            return Ok(Expansion::NoMatch);
        };

        let path = normalize_path(&package.dir.join(first));
        let mut url = Url::from_file_path(&path).map_err(|()| {
            ResolveError::invalid_specifier(
                specifier,
                format!("Export target {} is not an absolute path", path.display()),
            )
        })?;
        url.set_query(query.map(|q| q.trim_start_matches('?')));

        Ok(Expansion::Resolved(Resolution::short_circuit(
            url,
            package.module_format(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::ModuleFormat;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn setup() -> (tempfile::TempDir, PathBuf, WorkspaceExpander) {
        let dir = tempdir().unwrap();
        let root = dunce::canonicalize(dir.path()).unwrap();
        fs::write(
            root.join("package.json"),
            r#"{"name": "mono", "workspaces": ["packages/*"]}"#,
        )
        .unwrap();
        fs::create_dir_all(root.join("packages/a/src")).unwrap();
        fs::write(
            root.join("packages/a/package.json"),
            r#"{"name": "@-/a", "type": "module", "exports": {".": "./src/index.ts", "./lib": "./src/lib.js"}}"#,
        )
        .unwrap();
        fs::create_dir_all(root.join("packages/b")).unwrap();
        fs::write(root.join("packages/b/package.json"), r#"{"name": "@-/b"}"#).unwrap();

        let index = Arc::new(WorkspaceIndex::build(&root).unwrap());
        (dir, root, WorkspaceExpander::new(index, "@-/".to_string()))
    }

    #[test]
    fn test_subpath_through_exports() {
        let (_d, root, expander) = setup();
        let Expansion::Resolved(r) = expander.expand("@-/a/lib", &ResolveContext::default()).unwrap()
        else {
            panic!("expected a resolution");
        };
        assert_eq!(r.url.to_file_path().unwrap(), root.join("packages/a/src/lib.js"));
        assert_eq!(r.format, Some(ModuleFormat::Module));
        assert!(r.short_circuit);
    }

    #[test]
    fn test_root_with_query() {
        let (_d, root, expander) = setup();
        let Expansion::Resolved(r) = expander.expand("@-/a?x=1", &ResolveContext::default()).unwrap()
        else {
            panic!("expected a resolution");
        };
        assert_eq!(r.url.to_file_path().unwrap(), root.join("packages/a/src/index.ts"));
        assert_eq!(r.url.query(), Some("x=1"));
    }

    #[test]
    fn test_unknown_slug_names_specifier() {
        let (_d, _root, expander) = setup();
        let err = expander
            .expand("@-/zzz/lib", &ResolveContext::default())
            .unwrap_err();
        assert_eq!(err.code, ResolveErrorCode::WorkspacePackageNotFound);
        assert_eq!(err.specifier, "@-/zzz/lib");
        assert!(err.message.contains("\"@-/zzz/lib\""));
    }

    #[test]
    fn test_empty_slug_is_invalid() {
        let (_d, _root, expander) = setup();
        let err = expander.expand("@-/", &ResolveContext::default()).unwrap_err();
        assert_eq!(err.code, ResolveErrorCode::InvalidModuleSpecifier);
    }

    #[test]
    fn test_no_exports_falls_through() {
        let (_d, _root, expander) = setup();
        assert_eq!(
            expander.expand("@-/b/x", &ResolveContext::default()).unwrap(),
            Expansion::NoMatch
        );
        assert_eq!(
            expander.expand("@-/a/missing", &ResolveContext::default()).unwrap(),
            Expansion::NoMatch
        );
    }

    #[test]
    fn test_other_scopes_ignored() {
        let (_d, _root, expander) = setup();
        assert_eq!(
            expander.expand("@other/a", &ResolveContext::default()).unwrap(),
            Expansion::NoMatch
        );
    }
}
