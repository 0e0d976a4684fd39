//! The load hook.
//!
//! Given a resolved URL, produce the source the host should execute:
//! synthesized glob modules, verbatim extension-less scripts, compiled
//! TypeScript and JSON, and modules whose dynamic imports were rewritten
//! through the resolver.

mod dynamic_import;
mod error;
mod host;

pub use dynamic_import::{find_dynamic_imports, rewrite_dynamic_imports, DynamicImport};
pub use error::LoadError;
pub use host::FsLoader;

use serde_json::{json, Value};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace};
use url::Url;

use crate::alias::GlobfileManager;
use crate::compiler::{Compiler, TransformOptions, TransformOutput};
use crate::hooks::{
    LoadContext, LoadResult, ModuleFormat, ModuleSource, NextLoad, NextResolve, ResolveContext,
};
use crate::resolver::SpecifierResolver;
use crate::sourcemap::{apply_source_map, line_count, SourceMapBuilder, SourceMapRegistry};
use crate::specifier::{extension, is_json, is_typed_script};
use crate::tsconfig::TsConfig;

/// Load transformer state shared by every load.
pub struct ModuleLoader {
    globs: Arc<GlobfileManager>,
    compiler: Arc<dyn Compiler>,
    tsconfig: Option<Arc<TsConfig>>,
    source_maps: Arc<SourceMapRegistry>,
}

impl fmt::Debug for ModuleLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleLoader")
            .field("compiler", &self.compiler.name())
            .field("tsconfig", &self.tsconfig.as_ref().map(|t| t.path()))
            .field("source_maps", &self.source_maps.len())
            .finish_non_exhaustive()
    }
}

impl ModuleLoader {
    #[must_use]
    pub fn new(
        globs: Arc<GlobfileManager>,
        compiler: Arc<dyn Compiler>,
        tsconfig: Option<Arc<TsConfig>>,
        source_maps: Arc<SourceMapRegistry>,
    ) -> Self {
        Self {
            globs,
            compiler,
            tsconfig,
            source_maps,
        }
    }

    #[must_use]
    pub fn source_maps(&self) -> &SourceMapRegistry {
        &self.source_maps
    }

    /// Load `url`, delegating the read to `next` where needed.
    ///
    /// `resolver` and `host_resolver` rewrite literal dynamic imports in
    /// plain ES modules.
    ///
    /// # Errors
    /// Returns host load errors, glob module errors, and compiler errors.
    pub fn load(
        &self,
        url: &Url,
        ctx: &LoadContext,
        next: &dyn NextLoad,
        resolver: &SpecifierResolver,
        host_resolver: &dyn NextResolve,
    ) -> Result<LoadResult, LoadError> {
        let file_path = if url.scheme() == "file" {
            url.to_file_path().ok()
        } else {
            None
        };

        if let Some(path) = &file_path {
            if GlobfileManager::is_virtual(path) {
                let source = self.globs.contents(path)?;
                debug!(url = %url, "loaded glob module");
                return Ok(LoadResult {
                    format: Some(ModuleFormat::Module),
                    source: Some(ModuleSource::Text(source)),
                    short_circuit: true,
                });
            }

            if extension(url.path()).is_empty() {
                let source = hookline_util::fs::read_to_string_lossy(path).map_err(|source| {
                    LoadError::Read {
                        path: path.clone(),
                        source,
                    }
                })?;
                debug!(url = %url, "loaded extension-less file as commonjs");
                return Ok(LoadResult {
                    format: Some(ModuleFormat::CommonJs),
                    source: Some(ModuleSource::Text(source)),
                    short_circuit: true,
                });
            }
        }

        let mut ctx = ctx.clone();
        if is_json(url.path()) {
            ctx.import_attributes
                .insert("type".to_string(), "json".to_string());
        }

        let loaded = next.load(url, &ctx)?;
        let Some(source) = &loaded.source else {
            return Ok(loaded);
        };

        if loaded.format == Some(ModuleFormat::Json) || is_typed_script(url.path()) {
            let display_path = file_path
                .clone()
                .unwrap_or_else(|| url.path().into());
            let code = source.as_text();
            let options = TransformOptions {
                tsconfig_raw: self.tsconfig_raw(&display_path),
            };
            debug!(url = %url, compiler = self.compiler.name(), "compiling");
            let output = self.compiler.transform(&code, &display_path, &options)?;
            return Ok(LoadResult {
                format: Some(ModuleFormat::Module),
                source: Some(ModuleSource::Text(apply_source_map(
                    output,
                    url.as_str(),
                    &self.source_maps,
                ))),
                short_circuit: loaded.short_circuit,
            });
        }

        if loaded.format == Some(ModuleFormat::Module) {
            let code = source.as_text();
            let resolve_ctx = ResolveContext {
                parent_url: Some(url.clone()),
                conditions: ctx.conditions.clone(),
                import_attributes: std::collections::BTreeMap::new(),
            };
            let rewritten = rewrite_dynamic_imports(&code, |specifier| {
                match resolver.resolve(specifier, &resolve_ctx, host_resolver) {
                    Ok(resolution) => Some(resolution.url.to_string()),
                    Err(err) => {
                        trace!(specifier, code = %err.code, "dynamic import left as written");
                        None
                    }
                }
            });
            if let Some(rewritten) = rewritten {
                debug!(url = %url, "rewrote dynamic imports");
                let map = SourceMapBuilder::new(url.as_str())
                    .with_content(code.into_owned())
                    .identity(line_count(&rewritten))
                    .generate(url.as_str());
                let source = apply_source_map(
                    TransformOutput {
                        code: rewritten,
                        map: Some(map),
                    },
                    url.as_str(),
                    &self.source_maps,
                );
                return Ok(LoadResult {
                    source: Some(ModuleSource::Text(source)),
                    ..loaded
                });
            }
        }

        Ok(loaded)
    }

    /// tsconfig object for `path`, with decorators always enabled.
    fn tsconfig_raw(&self, path: &Path) -> Value {
        let mut raw = self
            .tsconfig
            .as_ref()
            .and_then(|t| t.raw_for(path))
            .unwrap_or_else(|| json!({}));
        if let Some(obj) = raw.as_object_mut() {
            let options = obj
                .entry("compilerOptions")
                .or_insert_with(|| json!({}));
            if let Some(options) = options.as_object_mut() {
                options.insert("experimentalDecorators".to_string(), Value::Bool(true));
            }
        }
        raw
    }
}
