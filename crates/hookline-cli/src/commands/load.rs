//! `hookline load` command implementation.
//!
//! Resolves one specifier and runs the load hook on the result, printing
//! the source the host would execute.

use hookline_core::{
    CompilerKind, FsLoader, LoadContext, ModuleSource, NodeResolver, ResolveContext,
};
use miette::Result;
use std::path::Path;

use super::{build_hooks, fail, importer_url};

/// Run the load command.
pub fn run(
    cwd: &Path,
    specifier: &str,
    from: Option<&Path>,
    map: bool,
    compiler: Option<CompilerKind>,
    json: bool,
) -> Result<()> {
    let hooks = build_hooks(cwd, compiler)?;
    let parent = importer_url(cwd, from)?;
    let next_resolve = NodeResolver::new().with_cwd(hooks.config().cwd.clone());
    let ctx = ResolveContext::with_parent(parent);

    let resolution = match hooks.resolve(specifier, &ctx, &next_resolve) {
        Ok(r) => r,
        Err(err) => fail(json, err.code.as_str(), &err.message),
    };

    let load_ctx = LoadContext {
        format: resolution.format,
        conditions: ctx.conditions.clone(),
        ..LoadContext::default()
    };
    let loaded = match hooks.load(&resolution.url, &load_ctx, &FsLoader::new()) {
        Ok(l) => l,
        Err(err) => fail(json, err.code(), &err.to_string()),
    };

    let source_map = hooks.source_maps().get(resolution.url.as_str());
    let text = loaded.source.as_ref().map(ModuleSource::as_text);

    if json {
        println!(
            "{}",
            serde_json::json!({
                "ok": true,
                "url": resolution.url.as_str(),
                "format": loaded.format.map(|f| f.as_str()),
                "source": text.as_deref(),
                "sourceMap": source_map
            })
        );
    } else if map {
        match source_map {
            Some(m) => println!("{m}"),
            None => fail(false, "ERR_NO_SOURCE_MAP", "module has no source map"),
        }
    } else {
        print!("{}", text.as_deref().unwrap_or(""));
    }

    Ok(())
}
