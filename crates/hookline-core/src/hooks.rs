//! Host hook contract and the [`Hooks`] entry point.
//!
//! The host runtime calls `resolve(specifier, ctx, next_resolve)` and
//! `load(url, ctx, next_load)`; `next_*` are the host's own defaults and are
//! modelled by the [`NextResolve`] and [`NextLoad`] traits.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use crate::alias::{Expander, GlobExpander, GlobfileManager, TildeExpander, WorkspaceExpander};
use crate::compiler::Compiler;
use crate::config::LoaderConfig;
use crate::error::Error;
use crate::loader::{LoadError, ModuleLoader};
use crate::resolver::{FormatClassifier, NodeResolver, ResolveError, SpecifierResolver};
use crate::sourcemap::SourceMapRegistry;
use crate::tsconfig::TsConfig;
use crate::workspace::WorkspaceIndex;

/// Module semantics the host applies to a resolved file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleFormat {
    Module,
    CommonJs,
    Json,
    Builtin,
}

impl ModuleFormat {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::CommonJs => "commonjs",
            Self::Json => "json",
            Self::Builtin => "builtin",
        }
    }
}

impl fmt::Display for ModuleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-call resolution context supplied by the host.
#[derive(Debug, Clone, Default)]
pub struct ResolveContext {
    /// URL of the importing module; `None` for the entry point.
    pub parent_url: Option<Url>,
    /// Export conditions, e.g. `["node", "import"]`.
    pub conditions: Vec<String>,
    pub import_attributes: BTreeMap<String, String>,
}

impl ResolveContext {
    #[must_use]
    pub fn with_parent(parent_url: Url) -> Self {
        Self {
            parent_url: Some(parent_url),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn parent_str(&self) -> Option<&str> {
        self.parent_url.as_ref().map(Url::as_str)
    }
}

/// Outcome of a resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Absolute `file:` URL or a host-understood scheme such as `node:`.
    pub url: Url,
    pub format: Option<ModuleFormat>,
    /// Set when the pipeline resolved the specifier itself.
    pub short_circuit: bool,
}

impl Resolution {
    #[must_use]
    pub fn new(url: Url, format: Option<ModuleFormat>) -> Self {
        Self {
            url,
            format,
            short_circuit: false,
        }
    }

    #[must_use]
    pub fn short_circuit(url: Url, format: ModuleFormat) -> Self {
        Self {
            url,
            format: Some(format),
            short_circuit: true,
        }
    }
}

/// Per-call load context supplied by the host.
#[derive(Debug, Clone, Default)]
pub struct LoadContext {
    /// Format hint from resolution.
    pub format: Option<ModuleFormat>,
    pub conditions: Vec<String>,
    pub import_attributes: BTreeMap<String, String>,
}

/// Module source returned by a load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleSource {
    Text(String),
    Bytes(Vec<u8>),
}

impl ModuleSource {
    /// Source as text; invalid UTF-8 is replaced.
    #[must_use]
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Self::Text(s) => Cow::Borrowed(s),
            Self::Bytes(b) => String::from_utf8_lossy(b),
        }
    }
}

/// Outcome of a load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadResult {
    pub format: Option<ModuleFormat>,
    /// `None` for modules the host provides itself (builtins).
    pub source: Option<ModuleSource>,
    pub short_circuit: bool,
}

/// The host's default resolver.
pub trait NextResolve: Send + Sync {
    /// # Errors
    /// Returns the host's resolution error.
    fn resolve(&self, specifier: &str, ctx: &ResolveContext) -> Result<Resolution, ResolveError>;
}

impl<F> NextResolve for F
where
    F: Fn(&str, &ResolveContext) -> Result<Resolution, ResolveError> + Send + Sync,
{
    fn resolve(&self, specifier: &str, ctx: &ResolveContext) -> Result<Resolution, ResolveError> {
        self(specifier, ctx)
    }
}

/// The host's default loader.
pub trait NextLoad: Send + Sync {
    /// # Errors
    /// Returns the host's load error.
    fn load(&self, url: &Url, ctx: &LoadContext) -> Result<LoadResult, LoadError>;
}

impl<F> NextLoad for F
where
    F: Fn(&Url, &LoadContext) -> Result<LoadResult, LoadError> + Send + Sync,
{
    fn load(&self, url: &Url, ctx: &LoadContext) -> Result<LoadResult, LoadError> {
        self(url, ctx)
    }
}

/// Resolve and load hooks for one workspace.
///
/// Built once at startup; all state afterwards is either immutable or an
/// append-only concurrent cache, so a `Hooks` can be shared across threads.
pub struct Hooks {
    config: LoaderConfig,
    workspace: Arc<WorkspaceIndex>,
    tsconfig: Option<Arc<TsConfig>>,
    resolver: SpecifierResolver,
    loader: ModuleLoader,
    host_resolver: Arc<dyn NextResolve>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("root", &self.config.root)
            .field("packages", &self.workspace.len())
            .field("tsconfig", &self.tsconfig.as_ref().map(|t| t.path()))
            .finish_non_exhaustive()
    }
}

impl Hooks {
    /// Discover the workspace from `cwd` and build hooks for it.
    ///
    /// # Errors
    /// Returns a configuration error if the workspace root, its manifest, or
    /// the tsconfig cannot be loaded.
    pub fn discover(cwd: &std::path::Path) -> Result<Self, Error> {
        Self::new(LoaderConfig::discover(cwd)?)
    }

    /// Build hooks from a loaded configuration, using the configured
    /// compiler and [`NodeResolver`] for load-time dynamic import rewriting.
    ///
    /// The default [`CompilerKind::Basic`](crate::compiler::CompilerKind::Basic) backend handles `.ts`, `.mts`,
    /// `.cts` and JSON only. `.tsx` and `.jsx` modules still resolve, but
    /// loading them fails with `ERR_COMPILE_UNSUPPORTED_FILE` unless the
    /// configuration selects [`CompilerKind::Esbuild`](crate::compiler::CompilerKind::Esbuild).
    ///
    /// # Errors
    /// See [`Hooks::discover`].
    pub fn new(config: LoaderConfig) -> Result<Self, Error> {
        let compiler = config.compiler.build();
        Self::with_parts(config, compiler, Arc::new(NodeResolver::new()))
    }

    /// Build hooks with an explicit compiler and host resolver.
    ///
    /// # Errors
    /// See [`Hooks::discover`].
    pub fn with_parts(
        config: LoaderConfig,
        compiler: Arc<dyn Compiler>,
        host_resolver: Arc<dyn NextResolve>,
    ) -> Result<Self, Error> {
        let workspace = Arc::new(WorkspaceIndex::build(&config.root)?);

        let tsconfig = match config.tsconfig_path() {
            Some(path) => Some(Arc::new(TsConfig::load(&path)?)),
            None => None,
        };
        let paths = tsconfig.as_ref().and_then(|t| t.paths_matcher());

        let globs = Arc::new(GlobfileManager::new(config.root.clone()));
        let expanders: Vec<Box<dyn Expander>> = vec![
            Box::new(TildeExpander::new(config.root.clone())),
            Box::new(GlobExpander::new(Arc::clone(&globs))),
            Box::new(WorkspaceExpander::new(
                Arc::clone(&workspace),
                config.scope.clone(),
            )),
        ];

        let resolver = SpecifierResolver::new(expanders, paths, FormatClassifier::new());
        let loader = ModuleLoader::new(
            globs,
            compiler,
            tsconfig.clone(),
            Arc::new(SourceMapRegistry::new()),
        );

        debug!(
            root = %config.root.display(),
            packages = workspace.len(),
            tsconfig = ?tsconfig.as_ref().map(|t| t.path()),
            "hooks ready"
        );

        Ok(Self {
            config,
            workspace,
            tsconfig,
            resolver,
            loader,
            host_resolver,
        })
    }

    /// Resolve hook.
    ///
    /// # Errors
    /// Returns the resolution error that survives every fallback.
    pub fn resolve(
        &self,
        specifier: &str,
        ctx: &ResolveContext,
        next: &dyn NextResolve,
    ) -> Result<Resolution, ResolveError> {
        self.resolver.resolve(specifier, ctx, next)
    }

    /// Load hook.
    ///
    /// # Errors
    /// Returns host load errors and compiler errors.
    pub fn load(
        &self,
        url: &Url,
        ctx: &LoadContext,
        next: &dyn NextLoad,
    ) -> Result<LoadResult, LoadError> {
        self.loader
            .load(url, ctx, next, &self.resolver, self.host_resolver.as_ref())
    }

    #[must_use]
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    #[must_use]
    pub fn workspace(&self) -> &WorkspaceIndex {
        &self.workspace
    }

    #[must_use]
    pub fn tsconfig(&self) -> Option<&TsConfig> {
        self.tsconfig.as_deref()
    }

    /// Source maps attached to transformed modules, keyed by URL.
    #[must_use]
    pub fn source_maps(&self) -> &SourceMapRegistry {
        self.loader.source_maps()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_serde_names() {
        assert_eq!(
            serde_json::to_string(&ModuleFormat::CommonJs).unwrap(),
            "\"commonjs\""
        );
        assert_eq!(ModuleFormat::Module.to_string(), "module");
    }

    #[test]
    fn test_source_as_text() {
        assert_eq!(ModuleSource::Text("a".into()).as_text(), "a");
        assert_eq!(ModuleSource::Bytes(b"b".to_vec()).as_text(), "b");
    }

    #[test]
    fn test_closure_as_next_resolve() {
        let next = |spec: &str, _ctx: &ResolveContext| {
            Err::<Resolution, _>(ResolveError::module_not_found(spec, "nope"))
        };
        let err = NextResolve::resolve(&next, "x", &ResolveContext::default()).unwrap_err();
        assert_eq!(err.specifier, "x");
    }

    #[test]
    fn test_hooks_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Hooks>();
    }
}
