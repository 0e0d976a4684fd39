use std::path::PathBuf;
use thiserror::Error;

use crate::alias::GlobError;
use crate::compiler::CompilerError;
use crate::resolver::ResolveError;

/// A failed load.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Module \"{url}\" needs an import attribute of \"type: json\"")]
    MissingJsonAttribute { url: String },

    #[error("Cannot load \"{url}\": only file and node URLs are supported")]
    UnsupportedUrl { url: String },

    #[error(transparent)]
    Compiler(#[from] CompilerError),

    #[error(transparent)]
    Glob(#[from] GlobError),
}

impl LoadError {
    /// Stable code for the error, in the host's `ERR_*` style where one exists.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::Resolve(err) => err.code.as_str(),
            Self::Read { source, .. } if source.kind() == std::io::ErrorKind::NotFound => {
                "ERR_MODULE_NOT_FOUND"
            }
            Self::Read { .. } => "ERR_READ_FAILED",
            Self::MissingJsonAttribute { .. } => "ERR_IMPORT_ATTRIBUTE_MISSING",
            Self::UnsupportedUrl { .. } => "ERR_UNSUPPORTED_ESM_URL_SCHEME",
            Self::Compiler(err) => err.code,
            Self::Glob(_) => "ERR_GLOB_MODULE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        let err = LoadError::Read {
            path: PathBuf::from("/a.ts"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert_eq!(err.code(), "ERR_MODULE_NOT_FOUND");
        assert_eq!(err.to_string(), "Cannot read /a.ts: gone");

        let err: LoadError = CompilerError::syntax_error("bad").into();
        assert_eq!(err.code(), "ERR_COMPILE_SYNTAX");

        let err: LoadError = ResolveError::module_not_found("x", "nope").into();
        assert_eq!(err.code(), "ERR_MODULE_NOT_FOUND");
        assert_eq!(err.to_string(), "nope");
    }
}
