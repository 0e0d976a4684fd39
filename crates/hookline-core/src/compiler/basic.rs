//! In-process compiler with no external tooling.
//!
//! JSON becomes an ES module with a default export and named exports for
//! identifier-safe keys. TypeScript gets a light, line-preserving type strip
//! that covers declarations and simple annotations; anything richer (enums,
//! JSX, decorators) needs [`EsbuildCompiler`](super::EsbuildCompiler).

use regex_lite::{Captures, Regex};
use serde_json::Value;
use std::fmt::Write;
use std::path::Path;
use std::sync::OnceLock;

use super::{Compiler, CompilerError, Diagnostic, TransformOptions, TransformOutput};
use crate::sourcemap::{line_count, SourceMapBuilder};
use crate::specifier::extension;

const JSON_BINDING: &str = "__json";

const RESERVED: &[&str] = &[
    "arguments", "await", "break", "case", "catch", "class", "const", "continue", "debugger",
    "default", "delete", "do", "else", "enum", "eval", "export", "extends", "false", "finally",
    "for", "function", "if", "implements", "import", "in", "instanceof", "interface", "let",
    "new", "null", "package", "private", "protected", "public", "return", "static", "super",
    "switch", "this", "throw", "true", "try", "typeof", "var", "void", "while", "with", "yield",
];

/// Compiler that runs entirely in-process.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicCompiler;

impl BasicCompiler {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Compiler for BasicCompiler {
    fn name(&self) -> &'static str {
        "basic"
    }

    fn transform(
        &self,
        code: &str,
        path: &Path,
        _options: &TransformOptions,
    ) -> Result<TransformOutput, CompilerError> {
        let path_str = path.to_string_lossy();
        match extension(&path_str) {
            ".json" => json_module(code, path),
            ".ts" | ".mts" | ".cts" => Ok(typescript_module(code, &path_str)),
            ".tsx" | ".jsx" => Err(CompilerError::unsupported_file(format!(
                "{path_str}: JSX requires the esbuild compiler"
            ))),
            other => Err(CompilerError::unsupported_file(format!(
                "{path_str}: cannot compile '{other}' files"
            ))),
        }
    }
}

fn json_module(code: &str, path: &Path) -> Result<TransformOutput, CompilerError> {
    let value: Value = serde_json::from_str(code).map_err(|e| {
        let line = u32::try_from(e.line()).unwrap_or(u32::MAX);
        let column = u32::try_from(e.column()).unwrap_or(u32::MAX);
        CompilerError::syntax_error(format!("Invalid JSON in {}", path.display())).with_diagnostics(
            vec![Diagnostic::new(e.to_string()).at(path.to_path_buf(), line, column)],
        )
    })?;

    let body = code.trim_end();
    let source_lines = line_count(body);
    let mut out = format!("const {JSON_BINDING} = {body};\nexport default {JSON_BINDING};\n");
    let mut extra_lines = 1;
    if let Value::Object(map) = &value {
        for key in map.keys().filter(|k| is_exportable(k)) {
            let _ = writeln!(out, "export const {key} = {JSON_BINDING}[{}];", Value::from(key.as_str()));
            extra_lines += 1;
        }
    }

    let path_str = path.to_string_lossy();
    let mut builder = SourceMapBuilder::new(path_str.as_ref())
        .with_content(code)
        .identity(source_lines);
    for line in source_lines..source_lines + extra_lines {
        builder.add_line(line, 0);
    }

    Ok(TransformOutput {
        code: out,
        map: Some(builder.generate(&path_str)),
    })
}

fn is_exportable(key: &str) -> bool {
    let mut chars = key.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_' || first == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        && key != JSON_BINDING
        && !RESERVED.contains(&key)
}

fn typescript_module(code: &str, path: &str) -> TransformOutput {
    let stripped = strip_types(code);
    let map = SourceMapBuilder::new(path)
        .with_content(code)
        .identity(line_count(code))
        .generate(path);
    TransformOutput {
        code: stripped,
        map: Some(map),
    }
}

struct TypePatterns {
    interface: Regex,
    type_alias: Regex,
    type_import: Regex,
    return_type: Regex,
    params: Regex,
    param_annotation: Regex,
    variable: Regex,
    generic_decl: Regex,
    assertion: Regex,
    modifier: Regex,
    implements: Regex,
}

fn patterns() -> Option<&'static TypePatterns> {
    static PATTERNS: OnceLock<Option<TypePatterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            Some(TypePatterns {
                interface: Regex::new(r"(?m)^[ \t]*(export\s+)?(declare\s+)?interface\s+\w+[^{]*\{[^}]*\}[ \t]*;?").ok()?,
                type_alias: Regex::new(r"(?m)^[ \t]*(export\s+)?(declare\s+)?type\s+\w+(<[^>]*>)?\s*=[^;]*;").ok()?,
                type_import: Regex::new(r"(?m)^[ \t]*(import|export)\s+type\s+[^;]*;").ok()?,
                return_type: Regex::new(r"\)\s*:\s*[\w.]+(<[\w., ]*>)?(\[\])*\s*(\{|=>)").ok()?,
                params: Regex::new(r"(function\s*\*?\s*\w*\s*|\b\w+\s*)\(([^()]*)\)(\s*\{)").ok()?,
                param_annotation: Regex::new(r"^(\s*(?:\.\.\.)?\w+)\??\s*:\s*[^=]+").ok()?,
                variable: Regex::new(r"\b(const|let|var)\s+(\w+)\s*:\s*[^=;]+=").ok()?,
                generic_decl: Regex::new(r"(function\s+\w+)<[^>()]*>\(").ok()?,
                assertion: Regex::new(r"\s+as\s+(const|[\w.]+(\[\])*)\b").ok()?,
                modifier: Regex::new(r"\b(private|protected|public|readonly)\s+(\w)").ok()?,
                implements: Regex::new(r"\s+implements\s+[\w.,\s]+\{").ok()?,
            })
        })
        .as_ref()
}

/// Replace a match with the newlines it contained so line numbers hold.
fn blank(caps: &Captures<'_>) -> String {
    "\n".repeat(caps[0].matches('\n').count())
}

/// Strip simple TypeScript syntax while keeping every line in place.
fn strip_types(source: &str) -> String {
    let Some(p) = patterns() else {
        return source.to_string();
    };

    let mut result = p.type_import.replace_all(source, blank).into_owned();
    result = p.interface.replace_all(&result, blank).into_owned();
    result = p.type_alias.replace_all(&result, blank).into_owned();
    result = p.generic_decl.replace_all(&result, "$1(").into_owned();
    result = p.return_type.replace_all(&result, ") $3").into_owned();
    result = p
        .params
        .replace_all(&result, |caps: &Captures<'_>| {
            let params: Vec<String> = caps[2]
                .split(',')
                .map(|param| p.param_annotation.replace(param, "$1 ").trim_end().to_string())
                .collect();
            format!("{}({}){}", &caps[1], params.join(","), &caps[3])
        })
        .into_owned();
    result = p.variable.replace_all(&result, "$1 $2 =").into_owned();
    result = p.implements.replace_all(&result, " {").into_owned();
    result = p.modifier.replace_all(&result, "$2").into_owned();

    result
        .split('\n')
        .map(|line| {
            let trimmed = line.trim_start();
            if trimmed.starts_with("import ") || trimmed.starts_with("export {") || trimmed.starts_with("export *") {
                line.to_string()
            } else {
                p.assertion.replace_all(line, "").into_owned()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
