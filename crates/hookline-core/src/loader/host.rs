//! Filesystem loader standing in for the host's default `next_load`.

use tracing::trace;
use url::Url;

use super::error::LoadError;
use crate::hooks::{LoadContext, LoadResult, ModuleFormat, ModuleSource, NextLoad};
use crate::resolver::FormatClassifier;

/// Reads `file:` URLs from disk.
///
/// JSON is only accepted with a `type: json` import attribute, builtins
/// yield no source, and everything else is an unsupported URL.
#[derive(Debug, Default)]
pub struct FsLoader {
    classifier: FormatClassifier,
}

impl FsLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl NextLoad for FsLoader {
    fn load(&self, url: &Url, ctx: &LoadContext) -> Result<LoadResult, LoadError> {
        match url.scheme() {
            "node" => {
                return Ok(LoadResult {
                    format: Some(ModuleFormat::Builtin),
                    source: None,
                    short_circuit: true,
                })
            }
            "file" => {}
            _ => {
                return Err(LoadError::UnsupportedUrl {
                    url: url.to_string(),
                })
            }
        }

        let path = url.to_file_path().map_err(|()| LoadError::UnsupportedUrl {
            url: url.to_string(),
        })?;
        let format = ctx
            .format
            .unwrap_or_else(|| self.classifier.classify_path(&path));

        if format == ModuleFormat::Json
            && ctx.import_attributes.get("type").map(String::as_str) != Some("json")
        {
            return Err(LoadError::MissingJsonAttribute {
                url: url.to_string(),
            });
        }

        let bytes = std::fs::read(&path).map_err(|source| LoadError::Read {
            path: path.clone(),
            source,
        })?;
        trace!(path = %path.display(), bytes = bytes.len(), %format, "read module");

        let source = match String::from_utf8(bytes) {
            Ok(text) => ModuleSource::Text(text),
            Err(err) => ModuleSource::Bytes(err.into_bytes()),
        };
        Ok(LoadResult {
            format: Some(format),
            source: Some(source),
            short_circuit: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_reads_file_with_format() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.mjs"), "export {};").unwrap();
        let url = Url::from_file_path(dir.path().join("a.mjs")).unwrap();
        let loaded = FsLoader::new().load(&url, &LoadContext::default()).unwrap();
        assert_eq!(loaded.format, Some(ModuleFormat::Module));
        assert_eq!(loaded.source, Some(ModuleSource::Text("export {};".into())));
    }

    #[test]
    fn test_json_requires_attribute() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("d.json"), "{}").unwrap();
        let url = Url::from_file_path(dir.path().join("d.json")).unwrap();

        let err = FsLoader::new().load(&url, &LoadContext::default()).unwrap_err();
        assert!(matches!(err, LoadError::MissingJsonAttribute { .. }));

        let mut ctx = LoadContext::default();
        ctx.import_attributes.insert("type".into(), "json".into());
        let loaded = FsLoader::new().load(&url, &ctx).unwrap();
        assert_eq!(loaded.format, Some(ModuleFormat::Json));
    }

    #[test]
    fn test_builtin_has_no_source() {
        let url = Url::parse("node:fs").unwrap();
        let loaded = FsLoader::new().load(&url, &LoadContext::default()).unwrap();
        assert_eq!(loaded.source, None);
        assert_eq!(loaded.format, Some(ModuleFormat::Builtin));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let url = Url::from_file_path(dir.path().join("gone.js")).unwrap();
        let err = FsLoader::new().load(&url, &LoadContext::default()).unwrap_err();
        assert_eq!(err.code(), "ERR_MODULE_NOT_FOUND");
    }

    #[test]
    fn test_unsupported_scheme() {
        let url = Url::parse("https://example.com/a.js").unwrap();
        let err = FsLoader::new().load(&url, &LoadContext::default()).unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedUrl { .. }));
    }
}
