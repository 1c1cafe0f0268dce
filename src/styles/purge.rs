//! Unused CSS removal
//!
//! Content files are split into candidate tokens and every style rule
//! selector is checked against them. A selector survives when each class,
//! id and type name it mentions appears among the tokens.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;

use lightningcss::rules::{CssRule, CssRuleList};
use lightningcss::selector::Selector;
use lightningcss::stylesheet::{PrinterOptions, StyleSheet};
use lightningcss::traits::ToCss;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::utils::{has_extension, FileLister};

/// Any run of characters that cannot end a markup or string token
static BROAD_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"[^<>"'`\s]*[^<>"'`\s:]"#).unwrap()
});

/// Narrower pass that also splits on dots and parentheses
static INNER_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"[^<>"'`\s.()]*[^<>"'`\s.():]"#).unwrap()
});

/// Extensions of files scanned for tokens
pub const CONTENT_EXTENSIONS: &[&str] = &["html", "js"];

/// Candidate selector tokens found in content files
#[derive(Debug, Default, Clone)]
pub struct ContentTokens {
    tokens: HashSet<String>,
}

impl ContentTokens {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan every HTML and JS file below `root`
    pub fn scan(root: &Path, lister: &dyn FileLister) -> io::Result<Self> {
        let mut tokens = Self::new();
        let mut scanned = 0;

        for file in lister.list(root)? {
            if !has_extension(&file, CONTENT_EXTENSIONS) {
                continue;
            }
            let content = fs::read_to_string(&file)?;
            tokens.add_content(&content);
            scanned += 1;
        }

        debug!("Collected {} tokens from {} content files", tokens.len(), scanned);

        Ok(tokens)
    }

    /// Split `content` into tokens with both extractor passes
    pub fn extract(content: &str) -> impl Iterator<Item = &str> {
        BROAD_TOKEN
            .find_iter(content)
            .chain(INNER_TOKEN.find_iter(content))
            .map(|m| m.as_str())
    }

    pub fn add_content(&mut self, content: &str) {
        for token in Self::extract(content) {
            self.insert(token);
        }
    }

    /// Names that are always considered used
    pub fn add_safelist<S: AsRef<str>>(&mut self, names: &[S]) {
        for name in names {
            self.insert(name.as_ref());
        }
    }

    fn insert(&mut self, token: &str) {
        let lower = token.to_ascii_lowercase();
        if lower != token {
            self.tokens.insert(lower);
        }
        self.tokens.insert(token.to_string());
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens.contains(token)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Whether a serialized selector only mentions known names
    pub fn selector_is_used(&self, selector: &str) -> bool {
        selector_words(selector).iter().all(|word| self.contains(word.name()))
    }
}

/// A name a selector depends on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorWord {
    Class(String),
    Id(String),
    Tag(String),
}

impl SelectorWord {
    pub fn name(&self) -> &str {
        match self {
            SelectorWord::Class(name) | SelectorWord::Id(name) | SelectorWord::Tag(name) => name,
        }
    }
}

/// Extract class, id and type names from a serialized selector
///
/// Attribute selectors, pseudo-classes (with their arguments), `*` and `&`
/// contribute nothing.
pub fn selector_words(selector: &str) -> Vec<SelectorWord> {
    let chars: Vec<char> = selector.chars().collect();
    let mut words = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '.' => {
                let (name, next) = read_ident(&chars, i + 1);
                if !name.is_empty() {
                    words.push(SelectorWord::Class(name));
                }
                i = next;
            }
            '#' => {
                let (name, next) = read_ident(&chars, i + 1);
                if !name.is_empty() {
                    words.push(SelectorWord::Id(name));
                }
                i = next;
            }
            '[' => i = skip_block(&chars, i, '[', ']'),
            ':' => {
                let mut next = i + 1;
                if chars.get(next) == Some(&':') {
                    next += 1;
                }
                let (_, after) = read_ident(&chars, next);
                i = if chars.get(after) == Some(&'(') {
                    skip_block(&chars, after, '(', ')')
                } else {
                    after
                };
            }
            c if is_ident_char(c) || c == '\\' => {
                let (name, next) = read_ident(&chars, i);
                if !name.is_empty() {
                    words.push(SelectorWord::Tag(name));
                }
                i = next.max(i + 1);
            }
            _ => i += 1,
        }
    }

    words
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_' || !c.is_ascii()
}

/// Read an identifier starting at `start`, resolving CSS escapes
fn read_ident(chars: &[char], start: usize) -> (String, usize) {
    let mut name = String::new();
    let mut i = start;

    while i < chars.len() {
        let c = chars[i];
        if c == '\\' {
            i += 1;
            let hex: String = chars[i..]
                .iter()
                .take(6)
                .take_while(|c| c.is_ascii_hexdigit())
                .collect();
            if hex.is_empty() {
                if let Some(&escaped) = chars.get(i) {
                    name.push(escaped);
                    i += 1;
                }
            } else {
                i += hex.len();
                let code = u32::from_str_radix(&hex, 16).unwrap_or(0xFFFD);
                name.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
                if chars.get(i).map(|c| c.is_whitespace()).unwrap_or(false) {
                    i += 1;
                }
            }
        } else if is_ident_char(c) {
            name.push(c);
            i += 1;
        } else {
            break;
        }
    }

    (name, i)
}

/// Skip a bracketed block starting at `start`, honoring nesting and quotes
fn skip_block(chars: &[char], start: usize, open: char, close: char) -> usize {
    let mut depth = 0;
    let mut quote: Option<char> = None;
    let mut i = start;

    while i < chars.len() {
        let c = chars[i];
        match quote {
            Some(q) => {
                if c == '\\' {
                    i += 1;
                } else if c == q {
                    quote = None;
                }
            }
            None => {
                if c == '"' || c == '\'' {
                    quote = Some(c);
                } else if c == open {
                    depth += 1;
                } else if c == close {
                    depth -= 1;
                    if depth == 0 {
                        return i + 1;
                    }
                }
            }
        }
        i += 1;
    }

    chars.len()
}

/// Remove unused selectors and rules from a parsed stylesheet
///
/// Returns the number of selectors removed.
pub fn purge_stylesheet(stylesheet: &mut StyleSheet<'_>, tokens: &ContentTokens) -> usize {
    purge_rules(&mut stylesheet.rules, tokens)
}

fn purge_rules(rules: &mut CssRuleList<'_>, tokens: &ContentTokens) -> usize {
    let mut removed = 0;

    rules.0.retain_mut(|rule| match rule {
        CssRule::Style(style) => {
            let before = style.selectors.0.len();
            style
                .selectors
                .0
                .retain(|selector| selector_in_use(selector, tokens));
            removed += before - style.selectors.0.len();

            if style.selectors.0.is_empty() {
                return false;
            }

            removed += purge_rules(&mut style.rules, tokens);
            true
        }
        CssRule::Media(media) => {
            removed += purge_rules(&mut media.rules, tokens);
            !media.rules.0.is_empty()
        }
        CssRule::Supports(supports) => {
            removed += purge_rules(&mut supports.rules, tokens);
            !supports.rules.0.is_empty()
        }
        CssRule::LayerBlock(layer) => {
            removed += purge_rules(&mut layer.rules, tokens);
            !layer.rules.0.is_empty()
        }
        _ => true,
    });

    removed
}

fn selector_in_use(selector: &Selector<'_>, tokens: &ContentTokens) -> bool {
    match selector.to_css_string(PrinterOptions::default()) {
        Ok(css) => tokens.selector_is_used(&css),
        // Keep what cannot be serialized
        Err(_) => true,
    }
}
