//! Code transformation
//!
//! Rewrites ES module syntax into the CommonJS shape the bundle runtime
//! executes, and wraps JSON files as modules.

use std::path::Path;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::debug;

use crate::bundler::ModuleType;

static EXPORT_FROM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^([ \t]*)export\s*(\*(?:\s*as\s+[\w$]+)?|\{[^}]*\})\s*from\s*["']([^"']+)["'][ \t]*;?"#).unwrap()
});

static IMPORT_FROM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^([ \t]*)import\s+([\w$*{}\s,]+?)\s*from\s*["']([^"']+)["'][ \t]*;?"#).unwrap()
});

static IMPORT_BARE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^([ \t]*)import\s*["']([^"']+)["'][ \t]*;?"#).unwrap()
});

static EXPORT_DEFAULT_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^([ \t]*)export\s+default\s+((?:async\s+)?function\b\s*\*?\s*([\w$]+)|class\s+([\w$]+))"#).unwrap()
});

static EXPORT_DEFAULT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)^([ \t]*)export\s+default\s+"#).unwrap());

static EXPORT_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^([ \t]*)export\s+((?:async\s+)?function\b\s*\*?\s*([\w$]+)|class\s+([\w$]+)|(?:const|let|var)\s+([\w$]+))"#).unwrap()
});

static EXPORT_LIST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)^([ \t]*)export\s*\{([^}]*)\}[ \t]*;?"#).unwrap());

static DYNAMIC_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(^|[^\w$.])import\s*\(\s*(["'][^"']+["'])\s*\)"#).unwrap()
});

const ES_MODULE_FLAG: &str = r#"Object.defineProperty(exports, "__esModule", { value: true });"#;

/// Code transformer
#[derive(Debug, Clone, Default)]
pub struct Transformer;

impl Transformer {
    /// Create a new transformer
    pub fn new() -> Self {
        Self
    }

    /// Transform source code based on module type
    pub fn transform(&self, source: &str, path: &Path, module_type: &ModuleType) -> Result<String> {
        match module_type {
            ModuleType::Json => self.transform_json(source, path),
            _ => {
                debug!("Transforming {}", path.display());
                Ok(esm_to_cjs(source))
            }
        }
    }

    /// Transform JSON to JS module
    fn transform_json(&self, source: &str, path: &Path) -> Result<String> {
        debug!("Transforming JSON: {}", path.display());

        serde_json::from_str::<serde_json::Value>(source)
            .with_context(|| format!("Invalid JSON in {}", path.display()))?;

        Ok(format!("module.exports = {};", source.trim()))
    }
}

/// Rewrite `import`/`export` statements into `require` and `exports`
///
/// Sources without module syntax come back unchanged apart from dynamic
/// `import()` calls, which become already-resolved promises.
pub fn esm_to_cjs(source: &str) -> String {
    let mut rewriter = Rewriter::default();
    let code = rewriter.rewrite(source);

    if !rewriter.is_module {
        return code;
    }

    let mut out = String::with_capacity(code.len() + 128);
    out.push_str(ES_MODULE_FLAG);
    for (exported, local) in &rewriter.hoisted {
        out.push_str(&format!(" exports.{} = {};", exported, local));
    }
    out.push('\n');
    out.push_str(&code);
    if !code.ends_with('\n') {
        out.push('\n');
    }
    for (exported, local) in &rewriter.trailing {
        out.push_str(&format!("exports.{} = {};\n", exported, local));
    }
    out
}

/// Parsed `import` clause
#[derive(Debug, Default, PartialEq)]
struct ImportClause {
    default: Option<String>,
    namespace: Option<String>,
    /// (imported, local)
    named: Vec<(String, String)>,
}

fn parse_import_clause(clause: &str) -> ImportClause {
    let (outside, inside) = match (clause.find('{'), clause.rfind('}')) {
        (Some(open), Some(close)) if open < close => (
            format!("{}{}", &clause[..open], &clause[close + 1..]),
            Some(&clause[open + 1..close]),
        ),
        _ => (clause.to_string(), None),
    };

    let mut parsed = ImportClause {
        named: inside.map(parse_specifiers).unwrap_or_default(),
        ..ImportClause::default()
    };

    for part in outside.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.strip_prefix('*') {
            Some(rest) => {
                let rest = rest.trim();
                let name = rest.strip_prefix("as").unwrap_or(rest).trim();
                parsed.namespace = Some(name.to_string());
            }
            None => parsed.default = Some(part.to_string()),
        }
    }

    parsed
}

/// Parse `a, b as c` into `[(a, a), (b, c)]`
fn parse_specifiers(list: &str) -> Vec<(String, String)> {
    list.split(',')
        .filter_map(|item| {
            let words: Vec<&str> = item.split_whitespace().collect();
            match words.as_slice() {
                [name] => Some((name.to_string(), name.to_string())),
                [name, "as", alias] => Some((name.to_string(), alias.to_string())),
                _ => None,
            }
        })
        .collect()
}

fn quoted(specifier: &str) -> String {
    serde_json::Value::String(specifier.to_string()).to_string()
}

#[derive(Default)]
struct Rewriter {
    is_module: bool,
    temps: usize,
    /// Exports assigned before the body runs (function declarations)
    hoisted: Vec<(String, String)>,
    /// Exports assigned after the body runs
    trailing: Vec<(String, String)>,
}

impl Rewriter {
    fn temp(&mut self) -> String {
        let name = format!("__sluice_import_{}__", self.temps);
        self.temps += 1;
        name
    }

    fn rewrite(&mut self, source: &str) -> String {
        let code = EXPORT_FROM
            .replace_all(source, |caps: &Captures| self.export_from(caps))
            .into_owned();
        let code = IMPORT_FROM
            .replace_all(&code, |caps: &Captures| self.import_from(caps))
            .into_owned();
        let code = IMPORT_BARE
            .replace_all(&code, |caps: &Captures| {
                self.is_module = true;
                format!("{}require({});", &caps[1], quoted(&caps[2]))
            })
            .into_owned();
        let code = EXPORT_DEFAULT_DECL
            .replace_all(&code, |caps: &Captures| self.export_declaration(caps, true))
            .into_owned();
        let code = EXPORT_DEFAULT
            .replace_all(&code, |caps: &Captures| {
                self.is_module = true;
                format!("{}exports.default = ", &caps[1])
            })
            .into_owned();
        let code = EXPORT_DECL
            .replace_all(&code, |caps: &Captures| self.export_declaration(caps, false))
            .into_owned();
        let code = EXPORT_LIST
            .replace_all(&code, |caps: &Captures| {
                self.is_module = true;
                for (local, exported) in parse_specifiers(&caps[2]) {
                    self.trailing.push((exported, local));
                }
                caps[1].to_string()
            })
            .into_owned();

        DYNAMIC_IMPORT
            .replace_all(&code, |caps: &Captures| {
                format!(
                    "{}Promise.resolve().then(function () {{ return require({}); }})",
                    &caps[1], &caps[2]
                )
            })
            .into_owned()
    }

    fn import_from(&mut self, caps: &Captures) -> String {
        self.is_module = true;
        let indent = &caps[1];
        let clause = parse_import_clause(&caps[2]);
        let temp = self.temp();

        let mut parts = vec![format!("{}var {} = require({});", indent, temp, quoted(&caps[3]))];
        if let Some(name) = clause.default {
            parts.push(format!(
                "var {} = {t} && {t}.__esModule ? {t}.default : {t};",
                name,
                t = temp
            ));
        }
        if let Some(name) = clause.namespace {
            parts.push(format!("var {} = {};", name, temp));
        }
        for (imported, local) in clause.named {
            parts.push(format!("var {} = {}.{};", local, temp, imported));
        }

        parts.join(" ")
    }

    fn export_from(&mut self, caps: &Captures) -> String {
        self.is_module = true;
        let indent = &caps[1];
        let what = caps[2].trim();
        let source = quoted(&caps[3]);

        if let Some(rest) = what.strip_prefix('*') {
            let rest = rest.trim();
            return match rest.strip_prefix("as") {
                Some(name) => format!("{}exports.{} = require({});", indent, name.trim(), source),
                None => format!(
                    "{}(function (m) {{ for (var k in m) if (k !== \"default\" && !(k in exports)) exports[k] = m[k]; }})(require({}));",
                    indent, source
                ),
            };
        }

        let temp = self.temp();
        let mut parts = vec![format!("{}var {} = require({});", indent, temp, source)];
        for (imported, exported) in parse_specifiers(what.trim_matches(|c| c == '{' || c == '}')) {
            parts.push(format!("exports.{} = {}.{};", exported, temp, imported));
        }
        parts.join(" ")
    }

    fn export_declaration(&mut self, caps: &Captures, is_default: bool) -> String {
        self.is_module = true;
        let function = caps.get(3).map(|m| m.as_str().to_string());
        let class = caps.get(4).map(|m| m.as_str().to_string());
        let binding = caps.get(5).map(|m| m.as_str().to_string());

        let exported = |local: &str| {
            if is_default {
                "default".to_string()
            } else {
                local.to_string()
            }
        };

        if let Some(name) = function {
            self.hoisted.push((exported(&name), name));
        } else if let Some(name) = class.or(binding) {
            self.trailing.push((exported(&name), name));
        }

        format!("{}{}", &caps[1], &caps[2])
    }
}
