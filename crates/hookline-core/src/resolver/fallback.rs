//! Extension and directory-index recovery for path-like specifiers.

use std::path::MAIN_SEPARATOR;
use tracing::trace;

use super::error::ResolveError;
use super::pipeline::SpecifierResolver;
use crate::hooks::{NextResolve, Resolution, ResolveContext};
use crate::specifier::{extension, is_explicit_directory, split_query, ts_path_variants, with_query};

/// Extensions appended to an extension-less specifier, in priority order.
pub const EXTENSIONS: &[&str] = &[".js", ".json", ".ts", ".tsx", ".jsx"];

impl SpecifierResolver {
    /// Try `specifier` with each of [`EXTENSIONS`] appended.
    ///
    /// With a typed importer, each candidate's typed variants are tried
    /// before the candidate itself. On total failure the first error is
    /// returned, with the appended extension removed from its message.
    pub(crate) fn try_extensions(
        &self,
        specifier: &str,
        ctx: &ResolveContext,
        next: &dyn NextResolve,
    ) -> Result<Resolution, ResolveError> {
        let (path, query) = split_query(specifier);
        let typed = typed_importer(ctx);
        let mut first_error: Option<ResolveError> = None;

        for ext in EXTENSIONS {
            let candidate = with_query(&format!("{path}{ext}"), query);

            if typed {
                match self.try_typed_variants(&candidate, ctx, next) {
                    Ok(Some(resolution)) => return Ok(resolution),
                    Ok(None) => {}
                    Err(mut err) => {
                        if first_error.is_none() {
                            let variant_ext = extension(split_query(&err.specifier).0).to_string();
                            err.strip_suffix_from_message(&variant_ext);
                            first_error = Some(err.with_specifier(specifier));
                        }
                    }
                }
            }

            match self.resolve_explicit(&candidate, ctx, next) {
                Ok(resolution) => {
                    trace!(specifier, ext, "resolved by extension");
                    return Ok(resolution);
                }
                Err(mut err) => {
                    if first_error.is_none() {
                        err.strip_suffix_from_message(ext);
                        first_error = Some(err.with_specifier(specifier));
                    }
                }
            }
        }

        Err(first_error.unwrap_or_else(|| {
            ResolveError::module_not_found(specifier, format!("Cannot find module '{specifier}'"))
        }))
    }

    /// Treat `specifier` as a directory and look for its index file.
    ///
    /// `dir/` gets `index` appended, `dir` gets `/index`; the latter also
    /// retries the specifier itself with extensions when no index exists.
    pub(crate) fn try_directory(
        &self,
        specifier: &str,
        ctx: &ResolveContext,
        next: &dyn NextResolve,
    ) -> Result<Resolution, ResolveError> {
        let explicit = is_explicit_directory(specifier);
        let append = if explicit { "index" } else { "/index" };
        let (path, query) = split_query(specifier);
        let indexed = with_query(&format!("{path}{append}"), query);

        match self.try_extensions(&indexed, ctx, next) {
            Ok(resolution) => Ok(resolution),
            Err(mut err) => {
                if !explicit {
                    if let Ok(resolution) = self.try_extensions(specifier, ctx, next) {
                        return Ok(resolution);
                    }
                }
                let needle = if explicit {
                    "index".to_string()
                } else {
                    format!("{MAIN_SEPARATOR}index")
                };
                err.strip_suffix_from_message(&needle);
                Err(err.with_specifier(specifier))
            }
        }
    }

    /// Resolve the typed-source variants of `specifier`, skipping variants
    /// that do not exist.
    ///
    /// `Ok(None)` when there are no variants or none of them exists.
    pub(crate) fn try_typed_variants(
        &self,
        specifier: &str,
        ctx: &ResolveContext,
        next: &dyn NextResolve,
    ) -> Result<Option<Resolution>, ResolveError> {
        let Some(variants) = ts_path_variants(specifier) else {
            return Ok(None);
        };
        for variant in &variants {
            match self.resolve_explicit(variant, ctx, next) {
                Ok(resolution) => {
                    trace!(specifier, variant = %variant, "resolved typed variant");
                    return Ok(Some(resolution));
                }
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err),
            }
        }
        Ok(None)
    }
}

/// Whether the importing module is TypeScript (`.ts`, `.tsx`, `.mts`, `.cts`).
pub(crate) fn typed_importer(ctx: &ResolveContext) -> bool {
    ctx.parent_str().is_some_and(|parent| {
        matches!(
            extension(split_query(parent).0),
            ".ts" | ".tsx" | ".mts" | ".cts"
        )
    })
}
