//! Source-to-source compiler abstraction.
//!
//! The load transformer hands typed sources and JSON to a [`Compiler`] and
//! trusts its output verbatim. Two backends exist:
//! - [`BasicCompiler`]: in-process; JSON to ES module and light type stripping
//! - [`EsbuildCompiler`]: pipes the source through an `esbuild` binary

pub mod basic;
pub mod esbuild;

pub use basic::BasicCompiler;
pub use esbuild::EsbuildCompiler;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Options passed with every transform.
#[derive(Debug, Clone, Default)]
pub struct TransformOptions {
    /// tsconfig object (`{"compilerOptions": {...}}`) governing the file.
    pub tsconfig_raw: Value,
}

/// Compiled code plus its source map (JSON text), if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutput {
    pub code: String,
    pub map: Option<String>,
}

/// `file:line:column` a compiler message points at, 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePosition {
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.line, self.column)
    }
}

/// One message reported by a compiler backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub position: Option<SourcePosition>,
}

impl Diagnostic {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            position: None,
        }
    }

    #[must_use]
    pub fn at(mut self, file: PathBuf, line: u32, column: u32) -> Self {
        self.position = Some(SourcePosition { file, line, column });
        self
    }
}

/// A failed transform. Surfaces to the host as the module's load error.
#[derive(Error, Debug, Clone)]
#[error("{code}: {message}{}", render_diagnostics(.diagnostics))]
pub struct CompilerError {
    pub code: &'static str,
    pub message: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl CompilerError {
    #[must_use]
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            diagnostics: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: Vec<Diagnostic>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    #[must_use]
    pub fn syntax_error(message: impl Into<String>) -> Self {
        Self::new("ERR_COMPILE_SYNTAX", message)
    }

    /// The backend could not be started or did not finish.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new("ERR_COMPILER_UNAVAILABLE", message)
    }

    #[must_use]
    pub fn unsupported_file(message: impl Into<String>) -> Self {
        Self::new("ERR_COMPILE_UNSUPPORTED_FILE", message)
    }
}

fn render_diagnostics(diagnostics: &[Diagnostic]) -> String {
    let mut out = String::new();
    for diagnostic in diagnostics {
        out.push_str("\n  ");
        if let Some(position) = &diagnostic.position {
            out.push_str(&format!("{position}: "));
        }
        out.push_str(&diagnostic.message);
    }
    out
}

/// A source-to-source compiler.
///
/// `Send + Sync` so one instance serves concurrent loads.
pub trait Compiler: Send + Sync {
    /// Backend name, for logs.
    fn name(&self) -> &'static str;

    /// Compile `code` read from `path` into an ES module.
    ///
    /// # Errors
    /// Returns a `CompilerError` for syntax errors or when the backend
    /// cannot run.
    fn transform(
        &self,
        code: &str,
        path: &Path,
        options: &TransformOptions,
    ) -> Result<TransformOutput, CompilerError>;
}

/// Which compiler backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompilerKind {
    #[default]
    Basic,
    Esbuild,
}

impl CompilerKind {
    #[must_use]
    pub fn build(self) -> Arc<dyn Compiler> {
        match self {
            Self::Basic => Arc::new(BasicCompiler::new()),
            Self::Esbuild => Arc::new(EsbuildCompiler::new()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Esbuild => "esbuild",
        }
    }
}

impl std::str::FromStr for CompilerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(Self::Basic),
            "esbuild" => Ok(Self::Esbuild),
            other => Err(format!("unknown compiler '{other}' (expected basic or esbuild)")),
        }
    }
}
