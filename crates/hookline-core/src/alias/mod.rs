//! Alias expanders: specifier shapes resolved before generic resolution.
//!
//! Each expander recognises one unambiguous prefix syntax. They run in a
//! fixed order and the first [`Expansion::Resolved`] wins.

mod glob;
mod tilde;
mod workspace;

pub use glob::{GlobError, GlobExpander, GlobfileManager};
pub use tilde::TildeExpander;
pub use workspace::WorkspaceExpander;

use crate::hooks::{Resolution, ResolveContext};
use crate::resolver::ResolveError;

/// Outcome of one expander.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expansion {
    /// The expander fully resolved the specifier.
    Resolved(Resolution),
    /// Not this expander's syntax, or nothing to resolve to; try the next.
    NoMatch,
}

/// One alias syntax.
pub trait Expander: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// # Errors
    /// Returns an error when the specifier uses this expander's syntax but
    /// cannot be resolved (e.g. an unknown workspace package).
    fn expand(&self, specifier: &str, ctx: &ResolveContext) -> Result<Expansion, ResolveError>;
}

/// The importer as a filesystem path, when it is a `file:` URL.
pub(crate) fn importer_path(ctx: &ResolveContext) -> Option<std::path::PathBuf> {
    ctx.parent_url
        .as_ref()
        .filter(|url| url.scheme() == "file")
        .and_then(|url| url.to_file_path().ok())
}
