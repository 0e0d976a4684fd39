//! Glob imports: `import routes from "./routes/*.ts"`.
//!
//! A glob specifier resolves to a virtual module path next to the importer
//! whose basename encodes the importer and the pattern. The loader asks
//! [`GlobfileManager::contents`] for its source when the path is loaded.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hookline_util::path::{normalize_path, relative_to, to_slash};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace};
use url::Url;

use super::{importer_path, Expander, Expansion};
use crate::hooks::{ModuleFormat, Resolution, ResolveContext};
use crate::resolver::ResolveError;
use crate::specifier::{is_glob, split_query, VIRTUAL_PREFIX};

/// Separates the importer from the pattern inside the encoded basename.
const FIELD_SEPARATOR: char = '\0';

#[derive(Debug, Error)]
pub enum GlobError {
    #[error("{path} is not a virtual glob module")]
    NotVirtual { path: PathBuf },

    #[error("virtual glob module {path} has a corrupt name")]
    CorruptName { path: PathBuf },

    #[error("invalid glob pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

/// Builds virtual glob module paths and their contents.
#[derive(Debug, Clone)]
pub struct GlobfileManager {
    root: PathBuf,
}

impl GlobfileManager {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Virtual module path for `pattern` imported from `importer`.
    #[must_use]
    pub fn path_for(&self, pattern: &str, importer: &Path) -> PathBuf {
        let importer_key = relative_to(importer, &self.root)
            .map_or_else(|| to_slash(importer), |rel| to_slash(&rel));
        let encoded = URL_SAFE_NO_PAD.encode(format!("{importer_key}{FIELD_SEPARATOR}{pattern}"));
        let dir = importer.parent().unwrap_or(&self.root);
        dir.join(format!("{VIRTUAL_PREFIX}{encoded}"))
    }

    /// Whether `path` names a virtual glob module.
    #[must_use]
    pub fn is_virtual(path: &Path) -> bool {
        path.file_name()
            .is_some_and(|name| name.to_string_lossy().starts_with(VIRTUAL_PREFIX))
    }

    /// Decode a virtual path back into `(importer, pattern)`.
    ///
    /// # Errors
    /// Returns an error if `path` is not a virtual module or its name does
    /// not decode.
    pub fn decode(&self, path: &Path) -> Result<(PathBuf, String), GlobError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .and_then(|n| n.strip_prefix(VIRTUAL_PREFIX).map(str::to_string))
            .ok_or_else(|| GlobError::NotVirtual {
                path: path.to_path_buf(),
            })?;
        let corrupt = || GlobError::CorruptName {
            path: path.to_path_buf(),
        };
        let bytes = URL_SAFE_NO_PAD.decode(name.as_bytes()).map_err(|_| corrupt())?;
        let decoded = String::from_utf8(bytes).map_err(|_| corrupt())?;
        let (importer, pattern) = decoded.split_once(FIELD_SEPARATOR).ok_or_else(corrupt)?;

        let importer = Path::new(importer);
        let importer = if importer.is_absolute() {
            importer.to_path_buf()
        } else {
            self.root.join(importer)
        };
        Ok((importer, pattern.to_string()))
    }

    /// Generated source of a virtual glob module.
    ///
    /// Every matching file (sorted, the importer excluded) is imported as a
    /// namespace and exposed on the default export keyed by its path relative
    /// to the importer.
    ///
    /// # Errors
    /// Returns an error if the path does not decode or the pattern is invalid.
    pub fn contents(&self, virtual_path: &Path) -> Result<String, GlobError> {
        let (importer, pattern) = self.decode(virtual_path)?;
        let importer_dir = importer.parent().unwrap_or(&self.root).to_path_buf();
        let files = self.matches(&importer, &importer_dir, &pattern)?;
        debug!(
            importer = %importer.display(),
            pattern,
            count = files.len(),
            "generated glob module"
        );

        let mut source = String::new();
        for (i, file) in files.iter().enumerate() {
            let url = Url::from_file_path(file)
                .map_or_else(|()| to_slash(file), |u| u.to_string());
            let _ = writeln!(source, "import * as ${i} from {};", json_string(&url));
        }
        source.push_str("export default {\n");
        for (i, file) in files.iter().enumerate() {
            let key = relative_to(file, &importer_dir)
                .map_or_else(|| to_slash(file), |rel| format!("./{}", to_slash(&rel)));
            let _ = writeln!(source, "  {}: ${i},", json_string(&key));
        }
        source.push_str("};\n");
        Ok(source)
    }

    fn matches(
        &self,
        importer: &Path,
        importer_dir: &Path,
        pattern: &str,
    ) -> Result<Vec<PathBuf>, GlobError> {
        let mut files = Vec::new();
        for expanded in expand_braces(pattern) {
            let absolute = normalize_path(&importer_dir.join(&expanded));
            let absolute = absolute.to_string_lossy();
            let paths = glob::glob(&absolute).map_err(|source| GlobError::Pattern {
                pattern: pattern.to_string(),
                source,
            })?;
            for entry in paths.flatten() {
                if entry.is_file() && entry != importer {
                    trace!(file = %entry.display(), "glob match");
                    files.push(entry);
                }
            }
        }
        files.sort();
        files.dedup();
        Ok(files)
    }
}

/// Expand `{a,b}` groups into separate patterns; the `glob` crate has no
/// brace support.
fn expand_braces(pattern: &str) -> Vec<String> {
    let Some(open) = pattern.find('{') else {
        return vec![pattern.to_string()];
    };
    let mut depth = 0usize;
    let mut close = None;
    for (i, c) in pattern[open..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(open + i);
                    break;
                }
            }
            _ => {}
        }
    }
    let Some(close) = close else {
        return vec![pattern.to_string()];
    };

    let (prefix, body, suffix) = (&pattern[..open], &pattern[open + 1..close], &pattern[close + 1..]);
    let mut alternatives = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in body.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                alternatives.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    alternatives.push(&body[start..]);

    alternatives
        .into_iter()
        .flat_map(|alt| expand_braces(&format!("{prefix}{alt}{suffix}")))
        .collect()
}

fn json_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

/// Resolves glob specifiers to virtual modules.
#[derive(Debug, Clone)]
pub struct GlobExpander {
    manager: Arc<GlobfileManager>,
}

impl GlobExpander {
    #[must_use]
    pub fn new(manager: Arc<GlobfileManager>) -> Self {
        Self { manager }
    }
}

impl Expander for GlobExpander {
    fn name(&self) -> &'static str {
        "glob"
    }

    fn expand(&self, specifier: &str, ctx: &ResolveContext) -> Result<Expansion, ResolveError> {
        if !is_glob(specifier) {
            return Ok(Expansion::NoMatch);
        }
        let Some(importer) = importer_path(ctx) else {
            return Ok(Expansion::NoMatch);
        };
        let (pattern, query) = split_query(specifier);
        let path = self.manager.path_for(pattern, &importer);
        let mut url = Url::from_file_path(&path).map_err(|()| {
            ResolveError::invalid_specifier(
                specifier,
                format!("Could not build a module path for glob \"{specifier}\""),
            )
        })?;
        url.set_query(query.map(|q| q.trim_start_matches('?')));
        Ok(Expansion::Resolved(Resolution::short_circuit(
            url,
            ModuleFormat::Module,
        )))
    }
}
