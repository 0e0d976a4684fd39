#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

//! Module resolution and load hooks for TypeScript workspaces.
//!
//! [`Hooks`] is built once per process from a discovered workspace root and
//! exposes the two host hooks, [`Hooks::resolve`] and [`Hooks::load`].

pub mod alias;
pub mod compiler;
pub mod config;
pub mod error;
pub mod hooks;
pub mod loader;
pub mod resolver;
pub mod sourcemap;
pub mod specifier;
pub mod tsconfig;
pub mod version;
pub mod workspace;

pub use compiler::{Compiler, CompilerError, CompilerKind, TransformOptions, TransformOutput};
pub use config::LoaderConfig;
pub use error::Error;
pub use hooks::{
    Hooks, LoadContext, LoadResult, ModuleFormat, ModuleSource, NextLoad, NextResolve,
    Resolution, ResolveContext,
};
pub use loader::{FsLoader, LoadError};
pub use resolver::{NodeResolver, ResolveError, ResolveErrorCode};
pub use version::VERSION;
pub use workspace::{WorkspaceIndex, WorkspacePackage};
