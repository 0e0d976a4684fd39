//! Dynamic `import("...")` discovery and rewriting.
//!
//! Scans module source without parsing it. Comments, string and template
//! literals, and regular expression literals are skipped so their contents
//! are never mistaken for code. Only calls whose first argument is a plain
//! string literal are reported; `import(expr)` is left alone.

/// A literal dynamic import found in source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicImport {
    /// Specifier text between the quotes.
    pub specifier: String,
    /// Line number (1-indexed).
    pub line: u32,
    /// Char range of the literal including its quotes.
    start: usize,
    end: usize,
    quote: char,
}

/// Literal dynamic imports in first-appearance order.
#[must_use]
pub fn find_dynamic_imports(source: &str) -> Vec<DynamicImport> {
    let chars: Vec<char> = source.chars().collect();
    let len = chars.len();
    let mut results = Vec::new();
    let mut line_num: u32 = 1;
    let mut prev_significant: Option<char> = None;
    let mut after_keyword = false;
    let mut i = 0;

    while i < len {
        let c = chars[i];
        if c == '\n' {
            line_num += 1;
            i += 1;
            continue;
        }
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        // Comments
        if c == '/' && i + 1 < len && chars[i + 1] == '/' {
            while i < len && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }
        if c == '/' && i + 1 < len && chars[i + 1] == '*' {
            i += 2;
            while i + 1 < len && !(chars[i] == '*' && chars[i + 1] == '/') {
                if chars[i] == '\n' {
                    line_num += 1;
                }
                i += 1;
            }
            i += 2;
            continue;
        }

        // Regex literal where an operand is expected
        if c == '/' && (after_keyword || prev_significant.map_or(true, |p| "(,=:[!&|?{};+-*%<>~^".contains(p))) {
            i = skip_regex(&chars, i + 1);
            prev_significant = Some('/');
            after_keyword = false;
            continue;
        }

        if c == '"' || c == '\'' || c == '`' {
            i = skip_string(&chars, i, &mut line_num);
            prev_significant = Some(c);
            after_keyword = false;
            continue;
        }

        if is_word_char(c) {
            let start = i;
            while i < len && is_word_char(chars[i]) {
                i += 1;
            }
            let word: String = chars[start..i].iter().collect();
            let member = start > 0 && chars[start - 1] == '.';

            if word == "import" && !member {
                if let Some(found) = scan_import_call(&chars, i, line_num) {
                    i = found.end;
                    results.push(found);
                    prev_significant = Some(')');
                    after_keyword = false;
                    continue;
                }
            }
            prev_significant = Some('a');
            after_keyword = !member && REGEX_KEYWORDS.contains(&word.as_str());
            continue;
        }

        prev_significant = Some(c);
        after_keyword = false;
        i += 1;
    }

    results
}

/// Rewrite literal dynamic import specifiers.
///
/// `resolve` maps a specifier to its replacement, or `None` to keep it.
/// Returns `None` when nothing changed. Line structure is preserved.
pub fn rewrite_dynamic_imports<F>(source: &str, mut resolve: F) -> Option<String>
where
    F: FnMut(&str) -> Option<String>,
{
    let imports = find_dynamic_imports(source);
    if imports.is_empty() {
        return None;
    }

    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len());
    let mut cursor = 0;
    let mut changed = false;

    for import in &imports {
        let Some(replacement) = resolve(&import.specifier) else {
            continue;
        };
        if replacement == import.specifier || replacement.contains(import.quote) {
            continue;
        }
        out.extend(&chars[cursor..import.start]);
        out.push(import.quote);
        out.push_str(&replacement);
        out.push(import.quote);
        cursor = import.end;
        changed = true;
    }

    if !changed {
        return None;
    }
    out.extend(&chars[cursor..]);
    Some(out)
}

/// Keywords after which `/` starts a regex literal rather than a division.
const REGEX_KEYWORDS: &[&str] = &[
    "return", "typeof", "case", "in", "of", "delete", "void", "throw", "new", "instanceof",
    "yield", "await", "do", "else",
];

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// After `import`: `(` then a string literal then `)` or `,`.
fn scan_import_call(chars: &[char], start: usize, line: u32) -> Option<DynamicImport> {
    let len = chars.len();
    let mut i = skip_whitespace(chars, start);
    if i >= len || chars[i] != '(' {
        return None;
    }
    i = skip_whitespace(chars, i + 1);
    if i >= len || !matches!(chars[i], '"' | '\'' | '`') {
        return None;
    }

    let quote = chars[i];
    let literal_start = i;
    i += 1;
    let spec_start = i;
    while i < len && chars[i] != quote {
        if chars[i] == '\\' || chars[i] == '\n' {
            return None;
        }
        if quote == '`' && chars[i] == '$' && i + 1 < len && chars[i + 1] == '{' {
            return None;
        }
        i += 1;
    }
    if i >= len {
        return None;
    }
    let specifier: String = chars[spec_start..i].iter().collect();
    let literal_end = i + 1;

    let after = skip_whitespace(chars, literal_end);
    if after >= len || !matches!(chars[after], ')' | ',') {
        return None;
    }

    Some(DynamicImport {
        specifier,
        line,
        start: literal_start,
        end: literal_end,
        quote,
    })
}

fn skip_whitespace(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    i
}

/// Skip a string or template literal starting at its opening quote.
fn skip_string(chars: &[char], start: usize, line_num: &mut u32) -> usize {
    let quote = chars[start];
    let mut i = start + 1;
    while i < chars.len() && chars[i] != quote {
        if chars[i] == '\n' {
            *line_num += 1;
        }
        if chars[i] == '\\' {
            i += 1;
        }
        i += 1;
    }
    i + 1
}

/// Skip a regex literal body starting after the opening `/`.
fn skip_regex(chars: &[char], start: usize) -> usize {
    let mut i = start;
    let mut in_class = false;
    while i < chars.len() && chars[i] != '\n' {
        match chars[i] {
            '\\' => i += 1,
            '[' => in_class = true,
            ']' => in_class = false,
            '/' if !in_class => return i + 1,
            _ => {}
        }
        i += 1;
    }
    i
}
