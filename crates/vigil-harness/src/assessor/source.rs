//! Lightweight lexical inspection of component sources.
//!
//! Nothing here parses a full grammar. The scanner only needs to know what
//! is inside a string or comment, so that bracket balance and declaration
//! lookups are not fooled by text in literals.

use std::path::Path;

use regex::Regex;

/// Source dialect, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `//` and nestable `/* */` comments, raw strings, char literals.
    Rust,
    /// `#` comments, single/double and triple-quoted strings.
    Python,
    /// C-family and JS/TS: `//` and `/* */` comments, single, double and
    /// backtick-quoted strings.
    CLike,
}

impl Dialect {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("rs") => Dialect::Rust,
            Some("py") | Some("pyi") => Dialect::Python,
            _ => Dialect::CLike,
        }
    }
}

fn closing(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

/// Brackets balance outside literals and comments, and every literal and
/// block comment is terminated.
pub fn is_well_formed(src: &str, dialect: Dialect) -> bool {
    let chars: Vec<char> = src.chars().collect();
    let mut stack: Vec<char> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        match c {
            '(' | '[' | '{' => {
                stack.push(closing(c));
                i += 1;
            }
            ')' | ']' | '}' => {
                if stack.pop() != Some(c) {
                    return false;
                }
                i += 1;
            }
            '#' if dialect == Dialect::Python => i = skip_line(&chars, i),
            '/' if dialect != Dialect::Python && next == Some('/') => i = skip_line(&chars, i),
            '/' if dialect != Dialect::Python && next == Some('*') => {
                match skip_block_comment(&chars, i, dialect == Dialect::Rust) {
                    Some(end) => i = end,
                    None => return false,
                }
            }
            'r' if dialect == Dialect::Rust && starts_raw_string(&chars, i) => {
                match skip_raw_string(&chars, i) {
                    Some(end) => i = end,
                    None => return false,
                }
            }
            '"' => {
                let end = if dialect == Dialect::Python && is_triple(&chars, i, '"') {
                    skip_triple(&chars, i, '"')
                } else {
                    skip_quoted(&chars, i, '"')
                };
                match end {
                    Some(end) => i = end,
                    None => return false,
                }
            }
            '\'' => match dialect {
                // Char literal if it closes within a couple of chars, else a lifetime.
                Dialect::Rust => i = skip_char_literal(&chars, i).unwrap_or(i + 1),
                _ => {
                    let end = if dialect == Dialect::Python && is_triple(&chars, i, '\'') {
                        skip_triple(&chars, i, '\'')
                    } else {
                        skip_quoted(&chars, i, '\'')
                    };
                    match end {
                        Some(end) => i = end,
                        None => return false,
                    }
                }
            },
            // JS/TS template literal.
            '`' if dialect == Dialect::CLike => match skip_quoted(&chars, i, '`') {
                Some(end) => i = end,
                None => return false,
            },
            _ => i += 1,
        }
    }

    stack.is_empty()
}

fn skip_line(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && chars[i] != '\n' {
        i += 1;
    }
    i
}

fn skip_block_comment(chars: &[char], start: usize, nested: bool) -> Option<usize> {
    let mut depth = 1;
    let mut i = start + 2;
    while i + 1 < chars.len() {
        if chars[i] == '*' && chars[i + 1] == '/' {
            depth -= 1;
            i += 2;
            if depth == 0 {
                return Some(i);
            }
        } else if nested && chars[i] == '/' && chars[i + 1] == '*' {
            depth += 1;
            i += 2;
        } else {
            i += 1;
        }
    }
    None
}

fn skip_quoted(chars: &[char], start: usize, quote: char) -> Option<usize> {
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            c if c == quote => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}

fn is_triple(chars: &[char], i: usize, quote: char) -> bool {
    chars.get(i + 1) == Some(&quote) && chars.get(i + 2) == Some(&quote)
}

fn skip_triple(chars: &[char], start: usize, quote: char) -> Option<usize> {
    let mut i = start + 3;
    while i < chars.len() {
        if chars[i] == '\\' {
            i += 2;
        } else if chars[i] == quote && is_triple(chars, i, quote) {
            return Some(i + 3);
        } else {
            i += 1;
        }
    }
    None
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn starts_raw_string(chars: &[char], i: usize) -> bool {
    if i > 0 && is_ident_char(chars[i - 1]) && chars[i - 1] != 'b' {
        return false;
    }
    let mut j = i + 1;
    while chars.get(j) == Some(&'#') {
        j += 1;
    }
    chars.get(j) == Some(&'"')
}

fn skip_raw_string(chars: &[char], start: usize) -> Option<usize> {
    let mut i = start + 1;
    let mut hashes = 0;
    while chars.get(i) == Some(&'#') {
        hashes += 1;
        i += 1;
    }
    i += 1;
    while i < chars.len() {
        if chars[i] == '"' && (1..=hashes).all(|k| chars.get(i + k) == Some(&'#')) {
            return Some(i + 1 + hashes);
        }
        i += 1;
    }
    None
}

fn skip_char_literal(chars: &[char], start: usize) -> Option<usize> {
    match chars.get(start + 1)? {
        '\\' => (start + 3..chars.len().min(start + 12))
            .find(|&j| chars[j] == '\'')
            .map(|j| j + 1),
        _ if chars.get(start + 2) == Some(&'\'') => Some(start + 3),
        _ => None,
    }
}

/// Inline documentation is present.
pub fn has_documentation(src: &str, dialect: Dialect) -> bool {
    let doc_comment = src.lines().map(str::trim_start).any(|line| {
        line.starts_with("///") || line.starts_with("//!") || line.starts_with("/**")
    });
    let docstring = src.contains("\"\"\"") || src.contains("'''");

    match dialect {
        Dialect::Rust | Dialect::CLike => doc_comment,
        Dialect::Python => docstring,
    }
}

fn function_pattern(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::Rust => r"\bfn\s+([A-Za-z_][A-Za-z0-9_]*)",
        Dialect::Python => r"\bdef\s+([A-Za-z_][A-Za-z0-9_]*)",
        Dialect::CLike => {
            r"\b(?:fn|def|function|func)\s+([A-Za-z_][A-Za-z0-9_]*)|\b([A-Za-z_][A-Za-z0-9_]*)\s*\([^;{}]*\)\s*\{"
        }
    }
}

/// Names of functions declared in the source, in order of appearance.
pub fn function_names(src: &str, dialect: Dialect) -> Vec<String> {
    let Ok(re) = Regex::new(function_pattern(dialect)) else {
        return Vec::new();
    };
    re.captures_iter(src)
        .filter_map(|cap| cap.get(1).or_else(|| cap.get(2)))
        .map(|m| m.as_str().to_string())
        .filter(|name| !matches!(name.as_str(), "if" | "for" | "while" | "switch" | "catch"))
        .collect()
}

/// A function with exactly this name is declared.
pub fn declares_function(src: &str, name: &str, dialect: Dialect) -> bool {
    function_names(src, dialect).iter().any(|f| f == name)
}

/// A `struct`, `enum`, `class`, `trait` or `union` named `type_name` is declared.
pub fn declares_type(src: &str, type_name: &str) -> bool {
    let pattern = format!(
        r"\b(?:struct|enum|class|trait|union)\s+{}\b",
        regex::escape(type_name)
    );
    Regex::new(&pattern).is_ok_and(|re| re.is_match(src))
}

/// `model_saver` -> `ModelSaver`.
pub fn pascal_case(name: &str) -> String {
    name.split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}
