//! Specifier resolution.
//!
//! [`SpecifierResolver`] is the orchestrator the resolve hook runs;
//! [`NodeResolver`] is a stand-in for the host's own resolver, used where no
//! host is present (the CLI, tests, dynamic import rewriting).

mod error;
mod exports;
mod fallback;
mod format;
mod host;
mod pipeline;

pub use error::{ResolveError, ResolveErrorCode};
pub use exports::{effective_conditions, resolve_exports, resolve_imports, DEFAULT_CONDITIONS};
pub use fallback::EXTENSIONS;
pub use format::FormatClassifier;
pub use host::NodeResolver;
pub use pipeline::SpecifierResolver;
