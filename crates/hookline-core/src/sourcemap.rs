//! Source map construction and registration.
//!
//! Transformed modules carry their map twice: inline, as a base64
//! `sourceMappingURL` data comment the host's stack-trace support reads, and
//! in a [`SourceMapRegistry`] keyed by module URL.

use base64::Engine;
use dashmap::DashMap;
use serde_json::json;

use crate::compiler::TransformOutput;

const SOURCE_MAPPING_PREFIX: &str = "//# sourceMappingURL=data:application/json;base64,";

/// VLQ-encode a signed integer and append to output string.
fn vlq_encode(value: i64, out: &mut String) {
    const B64: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    #[allow(clippy::cast_sign_loss)]
    let mut v = (if value < 0 {
        ((-value) << 1) | 1
    } else {
        value << 1
    }) as u64;
    loop {
        #[allow(clippy::cast_possible_truncation)]
        let mut digit = (v & 0x1f) as u8;
        v >>= 5;
        if v > 0 {
            digit |= 0x20;
        }
        out.push(B64[digit as usize] as char);
        if v == 0 {
            break;
        }
    }
}

/// Builds a line-granular V3 source map for a single source file.
#[derive(Debug, Clone)]
pub struct SourceMapBuilder {
    source: String,
    content: Option<String>,
    /// `(generated_line, source_line)`, both 0-indexed.
    lines: Vec<(u32, u32)>,
}

impl SourceMapBuilder {
    #[must_use]
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            content: None,
            lines: Vec::new(),
        }
    }

    /// Embed the original source text as `sourcesContent`.
    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Map the start of `generated_line` to the start of `source_line`.
    pub fn add_line(&mut self, generated_line: u32, source_line: u32) {
        self.lines.push((generated_line, source_line));
    }

    /// Map every line to itself, for transforms that keep line structure.
    #[must_use]
    pub fn identity(mut self, line_count: u32) -> Self {
        for line in 0..line_count {
            self.add_line(line, line);
        }
        self
    }

    /// Render the map as JSON.
    #[must_use]
    pub fn generate(&self, file: &str) -> String {
        let mut sorted = self.lines.clone();
        sorted.sort_unstable();
        sorted.dedup_by_key(|(generated, _)| *generated);

        let mut mappings = String::new();
        let mut current_line: u32 = 0;
        let mut prev_source_line: i64 = 0;
        for (generated, source_line) in sorted {
            while current_line < generated {
                mappings.push(';');
                current_line += 1;
            }
            // column 0, source index 0 (delta), line delta, column 0 (delta)
            vlq_encode(0, &mut mappings);
            vlq_encode(0, &mut mappings);
            vlq_encode(i64::from(source_line) - prev_source_line, &mut mappings);
            vlq_encode(0, &mut mappings);
            prev_source_line = i64::from(source_line);
        }

        let mut map = json!({
            "version": 3,
            "file": file,
            "sources": [self.source],
            "names": [],
            "mappings": mappings,
        });
        if let Some(content) = &self.content {
            map["sourcesContent"] = json!([content]);
        }
        map.to_string()
    }
}

/// Number of lines in `text`, counting a trailing partial line.
#[must_use]
pub fn line_count(text: &str) -> u32 {
    u32::try_from(text.lines().count().max(1)).unwrap_or(u32::MAX)
}

/// Inline `sourceMappingURL` comment for a map.
#[must_use]
pub fn inline_comment(map: &str) -> String {
    let encoded = base64::prelude::BASE64_STANDARD.encode(map.as_bytes());
    format!("{SOURCE_MAPPING_PREFIX}{encoded}")
}

/// Split an inline source map off the end of `code`.
///
/// Returns the code without the comment and the decoded map, or the code
/// unchanged when it carries no (decodable) inline map.
#[must_use]
pub fn extract_inline(code: &str) -> (String, Option<String>) {
    let Some(idx) = code.rfind(SOURCE_MAPPING_PREFIX) else {
        return (code.to_string(), None);
    };
    let encoded = code[idx + SOURCE_MAPPING_PREFIX.len()..].trim();
    match base64::prelude::BASE64_STANDARD.decode(encoded) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(map) => (code[..idx].trim_end_matches('\n').to_string(), Some(map)),
            Err(_) => (code.to_string(), None),
        },
        Err(_) => (code.to_string(), None),
    }
}

/// Module URL → source map, shared with the host's stack-trace rewriter.
///
/// Append-only; re-registering a URL replaces the previous map, which is
/// identical for identical input.
#[derive(Debug, Default)]
pub struct SourceMapRegistry {
    maps: DashMap<String, String>,
}

impl SourceMapRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, url: &str, map: String) {
        self.maps.insert(url.to_string(), map);
    }

    #[must_use]
    pub fn get(&self, url: &str) -> Option<String> {
        self.maps.get(url).map(|m| m.value().clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.maps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}

/// Attach `output.map` to `output.code`: register it under `url` and append
/// the inline comment. Code without a map is returned unchanged.
#[must_use]
pub fn apply_source_map(output: TransformOutput, url: &str, registry: &SourceMapRegistry) -> String {
    let TransformOutput { code, map } = output;
    let Some(map) = map else {
        return code;
    };
    let comment = inline_comment(&map);
    registry.register(url, map);
    let mut out = code;
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(&comment);
    out
}
