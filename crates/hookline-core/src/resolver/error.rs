use std::fmt;
use thiserror::Error;

/// Error codes surfaced by resolution, rendered the way the host runtime
/// names them so callers can match on familiar strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolveErrorCode {
    ModuleNotFound,
    UnsupportedDirImport,
    PackagePathNotExported,
    PackageImportNotDefined,
    InvalidModuleSpecifier,
    InvalidPackageConfig,
    UnsupportedScheme,
    WorkspacePackageNotFound,
}

impl ResolveErrorCode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ModuleNotFound => "ERR_MODULE_NOT_FOUND",
            Self::UnsupportedDirImport => "ERR_UNSUPPORTED_DIR_IMPORT",
            Self::PackagePathNotExported => "ERR_PACKAGE_PATH_NOT_EXPORTED",
            Self::PackageImportNotDefined => "ERR_PACKAGE_IMPORT_NOT_DEFINED",
            Self::InvalidModuleSpecifier => "ERR_INVALID_MODULE_SPECIFIER",
            Self::InvalidPackageConfig => "ERR_INVALID_PACKAGE_CONFIG",
            Self::UnsupportedScheme => "ERR_UNSUPPORTED_ESM_URL_SCHEME",
            Self::WorkspacePackageNotFound => "ERR_WORKSPACE_PACKAGE_NOT_FOUND",
        }
    }
}

impl fmt::Display for ResolveErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed resolution.
///
/// `specifier` is the specifier the caller asked for. Fallbacks that probe
/// synthetic specifiers reset it to the original before surfacing the error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ResolveError {
    pub code: ResolveErrorCode,
    pub message: String,
    pub specifier: String,
}

impl ResolveError {
    #[must_use]
    pub fn new(
        code: ResolveErrorCode,
        specifier: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            specifier: specifier.into(),
        }
    }

    #[must_use]
    pub fn module_not_found(specifier: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ResolveErrorCode::ModuleNotFound, specifier, message)
    }

    #[must_use]
    pub fn invalid_specifier(specifier: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ResolveErrorCode::InvalidModuleSpecifier, specifier, message)
    }

    /// Whether this is one of the "nothing there" signals that typed-variant
    /// probing skips over.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self.code,
            ResolveErrorCode::ModuleNotFound | ResolveErrorCode::PackagePathNotExported
        )
    }

    /// Remove the first occurrence of `needle'` from the message, keeping the
    /// closing quote. Used to hide synthetic suffixes such as an extension or
    /// `/index` that a fallback appended.
    pub fn strip_suffix_from_message(&mut self, needle: &str) {
        let quoted = format!("{needle}'");
        if let Some(idx) = self.message.find(&quoted) {
            self.message
                .replace_range(idx..idx + quoted.len(), "'");
        }
    }

    /// Point the error back at the specifier the caller wrote.
    #[must_use]
    pub fn with_specifier(mut self, specifier: impl Into<String>) -> Self {
        self.specifier = specifier.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_display() {
        assert_eq!(
            ResolveErrorCode::ModuleNotFound.to_string(),
            "ERR_MODULE_NOT_FOUND"
        );
        assert_eq!(
            ResolveErrorCode::UnsupportedDirImport.to_string(),
            "ERR_UNSUPPORTED_DIR_IMPORT"
        );
    }

    #[test]
    fn test_strip_suffix_keeps_quote() {
        let mut err = ResolveError::module_not_found(
            "./foo.js",
            "Cannot find module '/p/foo.js' imported from /p/a.ts",
        );
        err.strip_suffix_from_message(".js");
        assert_eq!(err.message, "Cannot find module '/p/foo' imported from /p/a.ts");
    }

    #[test]
    fn test_strip_suffix_only_first_match() {
        let mut err = ResolveError::module_not_found("x", "'/a/index' '/b/index'");
        err.strip_suffix_from_message("/index");
        assert_eq!(err.message, "'/a' '/b/index'");
    }

    #[test]
    fn test_strip_suffix_no_match_unchanged() {
        let mut err = ResolveError::module_not_found("x", "Cannot find module '/a.ts'");
        err.strip_suffix_from_message(".js");
        assert_eq!(err.message, "Cannot find module '/a.ts'");
    }

    #[test]
    fn test_not_found_kinds() {
        assert!(ResolveError::module_not_found("a", "m").is_not_found());
        assert!(ResolveError::new(ResolveErrorCode::PackagePathNotExported, "a", "m").is_not_found());
        assert!(!ResolveError::new(ResolveErrorCode::UnsupportedDirImport, "a", "m").is_not_found());
    }
}
