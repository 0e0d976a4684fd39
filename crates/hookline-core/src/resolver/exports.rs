//! Package.json `exports` / `imports` evaluation.
//!
//! Implements the Node.js export-map rules the pipeline relies on:
//! - root exports (`"exports": "./x.js"`, `{".": ...}`, root condition objects)
//! - exact subpath keys (`"./feature"`)
//! - single-`*` pattern keys, most specific key wins
//! - condition objects, matched in object key order
//! - fallback arrays, all entries returned in order as candidates
//!
//! Every evaluation returns the ordered candidate list (possibly empty) and
//! leaves existence checks to the caller.

use serde_json::{Map, Value};

/// Conditions used for ESM resolution when the host supplies none.
pub const DEFAULT_CONDITIONS: &[&str] = &["import", "node", "default"];

/// Evaluate `exports` for `subpath` (`"."` or `"./..."`).
#[must_use]
pub fn resolve_exports(pkg_json: &Value, subpath: &str, conditions: &[String]) -> Vec<String> {
    let Some(exports) = pkg_json.get("exports") else {
        return Vec::new();
    };

    let mut out = Vec::new();

    // Sugar: a string, array, or condition object is the "." entry.
    let obj = match exports.as_object() {
        Some(obj) if has_subpath_keys(obj) => obj,
        _ => {
            if subpath == "." {
                collect_targets(exports, conditions, true, &mut out);
            }
            return out;
        }
    };

    if let Some(target) = obj.get(subpath) {
        collect_targets(target, conditions, true, &mut out);
        return out;
    }

    if let Some((target, star)) = match_pattern_key(obj, subpath) {
        let mut raw = Vec::new();
        collect_targets(target, conditions, true, &mut raw);
        out.extend(raw.iter().filter_map(|t| substitute_star(t, star)));
    }

    out
}

/// Evaluate `imports` for a `#`-prefixed specifier.
///
/// Targets may be package-relative (`./src/x.js`) or bare package names.
#[must_use]
pub fn resolve_imports(pkg_json: &Value, specifier: &str, conditions: &[String]) -> Vec<String> {
    if !specifier.starts_with('#') {
        return Vec::new();
    }
    let Some(imports) = pkg_json.get("imports").and_then(Value::as_object) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    if let Some(target) = imports.get(specifier) {
        collect_targets(target, conditions, false, &mut out);
        return out;
    }
    if let Some((target, star)) = match_pattern_key(imports, specifier) {
        let mut raw = Vec::new();
        collect_targets(target, conditions, false, &mut raw);
        out.extend(raw.into_iter().map(|t| t.replace('*', star)));
    }
    out
}

/// Check if exports object has subpath keys (keys starting with ".").
fn has_subpath_keys(obj: &Map<String, Value>) -> bool {
    obj.keys().any(|k| k.starts_with('.'))
}

/// Find the most specific single-`*` key matching `subpath`.
///
/// Longer prefix wins; ties go to the longer key.
fn match_pattern_key<'a>(
    obj: &'a Map<String, Value>,
    subpath: &'a str,
) -> Option<(&'a Value, &'a str)> {
    let mut best: Option<(&str, &Value, &str)> = None;

    for (key, value) in obj {
        let Some((prefix, suffix)) = key.split_once('*') else {
            continue;
        };
        if suffix.contains('*') {
            continue;
        }
        let Some(star) = match_pattern(prefix, suffix, subpath) else {
            continue;
        };
        let better = match best {
            None => true,
            Some((best_key, _, _)) => {
                let best_prefix = best_key.split_once('*').map_or(0, |(p, _)| p.len());
                prefix.len() > best_prefix
                    || (prefix.len() == best_prefix && key.len() > best_key.len())
            }
        };
        if better {
            best = Some((key.as_str(), value, star));
        }
    }

    best.map(|(_, value, star)| (value, star))
}

/// Match `prefix*suffix` against `subpath`, returning the `*` value.
fn match_pattern<'a>(prefix: &str, suffix: &str, subpath: &'a str) -> Option<&'a str> {
    if !subpath.starts_with(prefix) || !subpath.ends_with(suffix) {
        return None;
    }
    let start = prefix.len();
    let end = subpath.len() - suffix.len();
    if start >= end {
        return None;
    }
    Some(&subpath[start..end])
}

/// Substitute `*` in target with the star value.
///
/// Returns None if the result escapes the package (`..`) or is not
/// package-relative.
fn substitute_star(target: &str, star_value: &str) -> Option<String> {
    let result = target.replace('*', star_value);
    if !result.starts_with("./") {
        return None;
    }
    if result.split('/').any(|segment| segment == "..") {
        return None;
    }
    Some(result)
}

/// Flatten a target into candidate strings.
///
/// Condition objects take the first key (in object order) that is active;
/// `default` is always active.
fn collect_targets(target: &Value, conditions: &[String], relative_only: bool, out: &mut Vec<String>) {
    match target {
        Value::String(s) => {
            if !relative_only || s.starts_with("./") {
                out.push(s.clone());
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_targets(item, conditions, relative_only, out);
            }
        }
        Value::Object(obj) => {
            for (key, value) in obj {
                if key == "default" || conditions.iter().any(|c| c == key) {
                    collect_targets(value, conditions, relative_only, out);
                    return;
                }
            }
        }
        _ => {}
    }
}

/// `conditions` from the host, or [`DEFAULT_CONDITIONS`] when empty.
#[must_use]
pub fn effective_conditions(conditions: &[String]) -> Vec<String> {
    if conditions.is_empty() {
        DEFAULT_CONDITIONS.iter().map(|c| (*c).to_string()).collect()
    } else {
        conditions.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn esm() -> Vec<String> {
        effective_conditions(&[])
    }

    #[test]
    fn test_exports_string_root() {
        let pkg = json!({"exports": "./dist/index.js"});
        assert_eq!(resolve_exports(&pkg, ".", &esm()), vec!["./dist/index.js"]);
        assert!(resolve_exports(&pkg, "./x", &esm()).is_empty());
    }

    #[test]
    fn test_exports_dot_string() {
        let pkg = json!({"exports": {".": "./a.js"}});
        assert_eq!(resolve_exports(&pkg, ".", &esm()), vec!["./a.js"]);
    }

    #[test]
    fn test_exports_conditions_object_order() {
        let pkg = json!({"exports": {".": {"require": "./c.cjs", "import": "./e.mjs", "default": "./d.js"}}});
        assert_eq!(resolve_exports(&pkg, ".", &esm()), vec!["./e.mjs"]);

        let require = vec!["require".to_string()];
        assert_eq!(resolve_exports(&pkg, ".", &require), vec!["./c.cjs"]);
    }

    #[test]
    fn test_exports_default_first_wins() {
        let pkg = json!({"exports": {"default": "./d.js", "import": "./e.mjs"}});
        assert_eq!(resolve_exports(&pkg, ".", &esm()), vec!["./d.js"]);
    }

    #[test]
    fn test_exports_conditions_at_root() {
        let pkg = json!({"exports": {"import": "./esm.js", "require": "./cjs.js"}});
        assert_eq!(resolve_exports(&pkg, ".", &esm()), vec!["./esm.js"]);
    }

    #[test]
    fn test_exports_nested_conditions() {
        let pkg = json!({"exports": {".": {"node": {"import": "./node.mjs", "default": "./node.cjs"}, "default": "./browser.js"}}});
        assert_eq!(resolve_exports(&pkg, ".", &esm()), vec!["./node.mjs"]);
    }

    #[test]
    fn test_exports_fallback_array() {
        let pkg = json!({"exports": {"./lib": ["./src/lib.ts", "./dist/lib.js"]}});
        assert_eq!(
            resolve_exports(&pkg, "./lib", &esm()),
            vec!["./src/lib.ts", "./dist/lib.js"]
        );
    }

    #[test]
    fn test_exports_invalid_path_ignored() {
        let pkg = json!({"exports": {".": "dist/index.js", "./abs": "/abs.js"}});
        assert!(resolve_exports(&pkg, ".", &esm()).is_empty());
        assert!(resolve_exports(&pkg, "./abs", &esm()).is_empty());
    }

    #[test]
    fn test_no_exports_field() {
        let pkg = json!({"main": "./index.js"});
        assert!(resolve_exports(&pkg, ".", &esm()).is_empty());
    }

    #[test]
    fn test_exports_subpath() {
        let pkg = json!({"exports": {".": "./index.js", "./lib": "./src/lib.js"}});
        assert_eq!(resolve_exports(&pkg, "./lib", &esm()), vec!["./src/lib.js"]);
        assert!(resolve_exports(&pkg, "./missing", &esm()).is_empty());
    }

    #[test]
    fn test_exports_pattern_simple() {
        let pkg = json!({"exports": {"./*": "./dist/*.js"}});
        assert_eq!(resolve_exports(&pkg, "./foo", &esm()), vec!["./dist/foo.js"]);
    }

    #[test]
    fn test_exports_pattern_specificity() {
        let pkg = json!({"exports": {"./*": "./dist/*.js", "./features/*": "./features/*/index.js"}});
        assert_eq!(
            resolve_exports(&pkg, "./features/x", &esm()),
            vec!["./features/x/index.js"]
        );
    }

    #[test]
    fn test_exports_exact_before_pattern() {
        let pkg = json!({"exports": {"./*": "./dist/*.js", "./special": "./special.js"}});
        assert_eq!(resolve_exports(&pkg, "./special", &esm()), vec!["./special.js"]);
    }

    #[test]
    fn test_exports_pattern_path_traversal_rejected() {
        let pkg = json!({"exports": {"./*": "./dist/*"}});
        assert!(resolve_exports(&pkg, "./../secret", &esm()).is_empty());
    }

    #[test]
    fn test_exports_pattern_empty_star_rejected() {
        let pkg = json!({"exports": {"./x/*": "./dist/*.js"}});
        assert!(resolve_exports(&pkg, "./x/", &esm()).is_empty());
    }

    #[test]
    fn test_exports_null_target_blocks() {
        let pkg = json!({"exports": {"./*": "./*.js", "./internal/*": null}});
        assert!(resolve_exports(&pkg, "./internal/x", &esm()).is_empty());
    }

    #[test]
    fn test_imports_exact_and_pattern() {
        let pkg = json!({"imports": {"#db": {"node": "./src/db.js"}, "#utils/*": "./src/utils/*.js", "#dep": "lodash"}});
        assert_eq!(resolve_imports(&pkg, "#db", &esm()), vec!["./src/db.js"]);
        assert_eq!(resolve_imports(&pkg, "#utils/a", &esm()), vec!["./src/utils/a.js"]);
        assert_eq!(resolve_imports(&pkg, "#dep", &esm()), vec!["lodash"]);
        assert!(resolve_imports(&pkg, "#missing", &esm()).is_empty());
        assert!(resolve_imports(&pkg, "db", &esm()).is_empty());
    }
}
