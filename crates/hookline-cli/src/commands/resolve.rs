//! `hookline resolve` command implementation.
//!
//! Resolves each specifier through the resolve hook with the filesystem
//! resolver as `next`. Specifiers are resolved in parallel; output keeps
//! argument order.

use hookline_core::{CompilerKind, NodeResolver, Resolution, ResolveContext, ResolveError};
use miette::Result;
use rayon::prelude::*;
use serde_json::{json, Value};
use std::path::Path;
use tracing::debug;

use super::{build_hooks, importer_url};

/// Run the resolve command.
pub fn run(
    cwd: &Path,
    specifiers: &[String],
    from: Option<&Path>,
    conditions: &[String],
    compiler: Option<CompilerKind>,
    json: bool,
) -> Result<()> {
    let hooks = build_hooks(cwd, compiler)?;
    let parent = importer_url(cwd, from)?;
    let next = NodeResolver::new().with_cwd(hooks.config().cwd.clone());

    let mut ctx = ResolveContext::with_parent(parent);
    ctx.conditions.extend(conditions.iter().cloned());

    debug!(count = specifiers.len(), parent = ?ctx.parent_str(), "resolving");
    let results: Vec<Result<Resolution, ResolveError>> = specifiers
        .par_iter()
        .map(|specifier| hooks.resolve(specifier, &ctx, &next))
        .collect();
    let all_ok = results.iter().all(Result::is_ok);

    if json {
        let entries: Vec<Value> = specifiers
            .iter()
            .zip(&results)
            .map(|(specifier, result)| match result {
                Ok(resolution) => json!({
                    "specifier": specifier,
                    "ok": true,
                    "url": resolution.url.as_str(),
                    "format": resolution.format.map(|f| f.as_str()),
                    "shortCircuit": resolution.short_circuit
                }),
                Err(err) => json!({
                    "specifier": specifier,
                    "ok": false,
                    "error": {
                        "code": err.code.as_str(),
                        "message": err.message
                    }
                }),
            })
            .collect();
        println!(
            "{}",
            json!({
                "ok": all_ok,
                "results": entries
            })
        );
    } else {
        for (specifier, result) in specifiers.iter().zip(&results) {
            match result {
                Ok(resolution) => {
                    let format = resolution.format.map_or("-", |f| f.as_str());
                    println!("{specifier} -> {} ({format})", resolution.url);
                }
                Err(err) => eprintln!("{specifier}: error[{}]: {}", err.code, err.message),
            }
        }
    }

    if !all_ok {
        std::process::exit(1);
    }
    Ok(())
}
