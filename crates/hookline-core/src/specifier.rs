//! Specifier classification helpers.
//!
//! All helpers work on the raw specifier string. A trailing `?query` is
//! split off before looking at the path and reattached unchanged, so query
//! strings survive every rewrite byte-for-byte.

use std::path::Path;

/// URL scheme prefix for file URLs.
pub const FILE_PROTOCOL: &str = "file:";

/// Basename prefix of synthesized glob modules.
pub const VIRTUAL_PREFIX: &str = "__virtual__:";

/// Split a specifier into its path and its query (including the leading `?`).
#[must_use]
pub fn split_query(specifier: &str) -> (&str, Option<&str>) {
    match specifier.find('?') {
        Some(idx) => (&specifier[..idx], Some(&specifier[idx..])),
        None => (specifier, None),
    }
}

/// Reattach a query previously removed by [`split_query`].
#[must_use]
pub fn with_query(path: &str, query: Option<&str>) -> String {
    match query {
        Some(q) => format!("{path}{q}"),
        None => path.to_string(),
    }
}

/// Whether the specifier names a directory explicitly (`./dir/`, `./dir/?q`).
#[must_use]
pub fn is_explicit_directory(specifier: &str) -> bool {
    split_query(specifier).0.ends_with('/')
}

/// `./x` or `../x`.
#[must_use]
pub fn is_relative(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../")
}

/// Whether the specifier addresses a location directly: a `file:` URL, a
/// relative path, or an absolute path. Everything else is bare.
#[must_use]
pub fn is_path_like(specifier: &str) -> bool {
    specifier.starts_with(FILE_PROTOCOL)
        || is_relative(specifier)
        || Path::new(split_query(specifier).0).is_absolute()
}

/// Whether the specifier (or URL) points inside a `node_modules` directory.
#[must_use]
pub fn is_dependency_path(specifier: &str) -> bool {
    specifier.contains("/node_modules/")
}

/// Extension of the last path segment, including the dot (`""` if none).
///
/// Dotfiles such as `.env` have no extension.
#[must_use]
pub fn extension(path: &str) -> &str {
    let base = path.rsplit('/').next().unwrap_or(path);
    match base.rfind('.') {
        Some(0) | None => "",
        Some(idx) => &base[idx..],
    }
}

/// Whether a URL or path names a source that must be compiled before the
/// host can run it: `.ts`, `.mts`, `.cts`, `.tsx` or `.jsx`.
#[must_use]
pub fn is_typed_script(url: &str) -> bool {
    matches!(
        extension(split_query(url).0),
        ".ts" | ".mts" | ".cts" | ".tsx" | ".jsx"
    )
}

/// Whether a URL or path names a JSON file.
#[must_use]
pub fn is_json(url: &str) -> bool {
    extension(split_query(url).0) == ".json"
}

/// Typed-source counterparts of a compiled-extension specifier.
///
/// `./a.js?x` becomes `["./a.ts?x", "./a.tsx?x"]`. Returns `None` when the
/// extension has no typed counterpart.
#[must_use]
pub fn ts_path_variants(specifier: &str) -> Option<Vec<String>> {
    let (path, query) = split_query(specifier);
    let ext = extension(path);
    let replacements: &[&str] = match ext {
        ".js" => &[".ts", ".tsx"],
        ".jsx" => &[".tsx"],
        ".cjs" => &[".cts"],
        ".mjs" => &[".mts"],
        _ => return None,
    };
    let stem = &path[..path.len() - ext.len()];
    Some(
        replacements
            .iter()
            .map(|r| with_query(&format!("{stem}{r}"), query))
            .collect(),
    )
}

/// Whether the specifier contains glob magic: `*` or a `{...}` group.
#[must_use]
pub fn is_glob(specifier: &str) -> bool {
    let (path, _) = split_query(specifier);
    if path.contains('*') {
        return true;
    }
    match (path.find('{'), path.rfind('}')) {
        (Some(open), Some(close)) => open < close,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_query() {
        assert_eq!(split_query("./a?x=1"), ("./a", Some("?x=1")));
        assert_eq!(split_query("./a"), ("./a", None));
        assert_eq!(split_query("./a?x?y"), ("./a", Some("?x?y")));
    }

    #[test]
    fn test_with_query_roundtrip_preserves_bytes() {
        let (path, query) = split_query("./dir?v=%20&x");
        assert_eq!(with_query(&format!("{path}/index.ts"), query), "./dir/index.ts?v=%20&x");
    }

    #[test]
    fn test_explicit_directory() {
        assert!(is_explicit_directory("./dir/"));
        assert!(is_explicit_directory("./dir/?q"));
        assert!(!is_explicit_directory("./dir"));
        assert!(!is_explicit_directory("./dir?q/"));
    }

    #[test]
    fn test_path_like() {
        assert!(is_path_like("./a"));
        assert!(is_path_like("../a"));
        assert!(is_path_like("file:///a.ts"));
        assert!(is_path_like("/abs/a.ts"));
        assert!(!is_path_like("lodash"));
        assert!(!is_path_like(".hidden"));
        assert!(!is_path_like("x/util"));
    }

    #[test]
    fn test_extension() {
        assert_eq!(extension("/a/b.ts"), ".ts");
        assert_eq!(extension("/a.d/b"), "");
        assert_eq!(extension("/a/.env"), "");
        assert_eq!(extension("x.test.tsx"), ".tsx");
    }

    #[test]
    fn test_typed_script() {
        assert!(is_typed_script("file:///a.ts"));
        assert!(is_typed_script("file:///a.mts?x"));
        assert!(is_typed_script("file:///a.cts"));
        assert!(is_typed_script("file:///a.tsx"));
        assert!(is_typed_script("file:///a.jsx"));
        assert!(!is_typed_script("file:///a.js"));
        assert!(!is_typed_script("file:///a.d/b"));
    }

    #[test]
    fn test_json() {
        assert!(is_json("file:///a.json?x"));
        assert!(!is_json("file:///a.jsonc"));
    }

    #[test]
    fn test_ts_path_variants() {
        assert_eq!(
            ts_path_variants("./a.js?x"),
            Some(vec!["./a.ts?x".to_string(), "./a.tsx?x".to_string()])
        );
        assert_eq!(ts_path_variants("./a.jsx"), Some(vec!["./a.tsx".to_string()]));
        assert_eq!(ts_path_variants("./a.cjs"), Some(vec!["./a.cts".to_string()]));
        assert_eq!(ts_path_variants("./a.mjs"), Some(vec!["./a.mts".to_string()]));
        assert_eq!(ts_path_variants("./a.ts"), None);
        assert_eq!(ts_path_variants("./a"), None);
    }

    #[test]
    fn test_is_glob() {
        assert!(is_glob("./pages/*.ts"));
        assert!(is_glob("./{a,b}.ts"));
        assert!(!is_glob("./a.ts?x=*"));
        assert!(!is_glob("./}{.ts"));
        assert!(!is_glob("lodash"));
    }
}
