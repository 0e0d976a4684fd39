//! `hookline workspaces` command implementation.
//!
//! Lists the packages reachable through `@-/<slug>`.

use hookline_core::workspace::find_workspace_root;
use hookline_core::WorkspaceIndex;
use miette::Result;
use std::path::Path;

use super::fail;

/// Run the workspaces command.
pub fn run(cwd: &Path, json: bool) -> Result<()> {
    let Some(root) = find_workspace_root(cwd) else {
        fail(
            json,
            "NO_WORKSPACE_ROOT",
            &format!("Could not find workspace root from {}", cwd.display()),
        );
    };

    let index = match WorkspaceIndex::build(&root) {
        Ok(index) => index,
        Err(e) => fail(json, "WORKSPACE_INVALID", &e.to_string()),
    };

    let mut packages: Vec<_> = index.packages().collect();
    packages.sort_by(|a, b| a.slug.cmp(&b.slug));

    if json {
        let pkg_list: Vec<_> = packages
            .iter()
            .map(|p| {
                serde_json::json!({
                    "slug": p.slug,
                    "name": p.name,
                    "version": p.version(),
                    "format": p.module_format().as_str(),
                    "path": p.dir.to_string_lossy()
                })
            })
            .collect();

        println!(
            "{}",
            serde_json::json!({
                "ok": true,
                "root": index.root().to_string_lossy(),
                "source": index.source().as_str(),
                "packages": pkg_list
            })
        );
    } else {
        println!("Workspace root: {} ({})", index.root().display(), index.source().as_str());
        println!();
        println!("Packages ({}):", packages.len());
        for pkg in &packages {
            println!("  @-/{} -> {} @ {}", pkg.slug, pkg.name, pkg.version());
            println!("    {}", pkg.dir.display());
        }
    }

    Ok(())
}
