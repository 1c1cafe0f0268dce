//! Lightweight JavaScript minification
//!
//! A single pass over the source that understands strings, template
//! literals, regular expression literals and comments well enough to drop
//! comments and collapse whitespace without touching literal contents.

/// Strip comments and collapse whitespace
///
/// Runs of whitespace that contain a newline keep one newline so automatic
/// semicolon insertion still sees the line break.
pub fn minify(code: &str) -> String {
    scan(code, true)
}

/// Strip comments, leaving everything else in place
pub fn strip_comments(code: &str) -> String {
    scan(code, false)
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || !c.is_ascii()
}

/// Keywords after which a `/` starts an expression
const REGEX_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "case", "throw", "in", "of", "void", "delete", "yield",
    "await", "new", "else", "do",
];

/// Whether a `/` following the code emitted so far starts a regex literal
fn regex_allowed(emitted: &str) -> bool {
    let emitted = emitted.trim_end();
    match emitted.chars().next_back() {
        None => true,
        Some(c) if is_word(c) => {
            let start = emitted
                .char_indices()
                .rev()
                .take_while(|&(_, c)| is_word(c))
                .last()
                .map(|(i, _)| i)
                .unwrap_or(0);
            let before = emitted[..start].chars().next_back();
            before != Some('.') && REGEX_KEYWORDS.contains(&&emitted[start..])
        }
        Some(c) => "(,=:[!&|?{};+-*%<>~^".contains(c),
    }
}

/// Whether a space is needed between `a` and `b` to keep them apart
fn needs_space(a: char, b: char) -> bool {
    (is_word(a) && is_word(b))
        || (a == b && matches!(a, '+' | '-'))
        || a == '/'
        || (b == '/' && is_word(a))
}

fn scan(code: &str, collapse: bool) -> String {
    let chars: Vec<char> = code.chars().collect();
    let mut out = String::with_capacity(code.len());
    let mut last: Option<char> = None;
    let mut pending: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        if c == '/' && next == Some('/') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }

        if c == '/' && next == Some('*') {
            let mut newline = false;
            i += 2;
            while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                newline |= chars[i] == '\n';
                i += 1;
            }
            i += 2;
            let ws = if newline { '\n' } else { ' ' };
            if collapse {
                pending = merge_whitespace(pending, ws);
            } else {
                out.push(ws);
            }
            continue;
        }

        if c.is_whitespace() {
            if collapse {
                pending = merge_whitespace(pending, if c == '\n' { '\n' } else { ' ' });
            } else {
                out.push(c);
            }
            i += 1;
            continue;
        }

        if collapse {
            if let (Some(ws), Some(prev)) = (pending.take(), last) {
                if ws == '\n' || needs_space(prev, c) {
                    out.push(ws);
                }
            }
        }

        let end = match c {
            '"' | '\'' => literal_end(&chars, i, c, true),
            '`' => literal_end(&chars, i, c, false),
            '/' if regex_allowed(&out) => regex_end(&chars, i),
            _ => i + 1,
        };
        out.extend(&chars[i..end.min(chars.len())]);
        last = chars.get(end.min(chars.len()) - 1).copied();
        i = end;
    }

    out
}

fn merge_whitespace(pending: Option<char>, ws: char) -> Option<char> {
    match pending {
        Some('\n') => Some('\n'),
        _ => Some(ws),
    }
}

/// Index just past a quoted literal starting at `start`
fn literal_end(chars: &[char], start: usize, quote: char, stop_at_newline: bool) -> usize {
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '\n' if stop_at_newline => return i,
            c if c == quote => return i + 1,
            _ => i += 1,
        }
    }
    chars.len()
}

/// Index just past a regex literal body starting at `start`
fn regex_end(chars: &[char], start: usize) -> usize {
    let mut i = start + 1;
    let mut in_class = false;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '\n' => return i,
            '[' => {
                in_class = true;
                i += 1;
            }
            ']' => {
                in_class = false;
                i += 1;
            }
            '/' if !in_class => return i + 1,
            _ => i += 1,
        }
    }
    chars.len()
}
