use std::path::PathBuf;
use thiserror::Error;

/// Configuration and startup errors.
///
/// These are fatal: the hooks cannot be built without a workspace root and a
/// readable root manifest. Per-specifier failures use
/// [`ResolveError`](crate::resolver::ResolveError) instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not find workspace root from {start}")]
    WorkspaceRootNotFound { start: PathBuf },

    #[error("Failed to read manifest at {path}: {source}")]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse manifest at {path}: {source}")]
    ManifestParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    PnpmWorkspaceParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{path} does not declare any packages")]
    PnpmWorkspaceMissingPackages { path: PathBuf },

    #[error("No workspaces declared in {root} (expected package.json \"workspaces\" or pnpm-workspace.yaml)")]
    WorkspacesNotDeclared { root: PathBuf },

    #[error("Invalid workspace glob '{pattern}': {source}")]
    InvalidGlob {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("Failed to read tsconfig at {path}: {source}")]
    TsConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse tsconfig at {path}: {source}")]
    TsConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Cannot find tsconfig '{specifier}' extended from {from}")]
    TsConfigExtendsNotFound { specifier: String, from: PathBuf },

    #[error("tsconfig extends chain loops back to {path}")]
    TsConfigExtendsCycle { path: PathBuf },

    #[error("{0}")]
    Other(String),
}

impl Error {
    #[must_use]
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}
