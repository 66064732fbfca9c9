//! Variable resolution and macro-argument tokenizing.
//!
//! The two index policies differ on purpose: an out-of-range `name[i]` in
//! the document resolves to an empty string, while the same reference in an
//! `exec` argument list is an error.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::rules::{expand_tilde, Rules};
use crate::var::VarTable;

fn indexed_name() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([^\s\[\]]+?)(?:\[(\d+)\])?$").expect("indexed-name pattern is valid")
    })
}

/// Split `name` or `name[i]` into base name and optional index.  Returns
/// `None` for anything that is not shaped like a variable reference.
pub fn split_indexed(token: &str) -> Option<(&str, Option<usize>)> {
    let caps = indexed_name().captures(token)?;
    let name = caps.get(1)?.as_str();
    let index = match caps.get(2) {
        Some(m) => Some(m.as_str().parse().ok()?),
        None => None,
    };
    Some((name, index))
}

/// Resolve a bound variable at `index`.  Out-of-range yields `""` before
/// post-processing.
pub fn resolve_variable(vars: &VarTable, rules: &Rules, name: &str, index: usize) -> Result<String> {
    let raw = vars.get_at(name, index).unwrap_or("");
    finish_value(raw, name, rules)
}

/// Apply file injection, trimming and truncation to a raw value.
///
/// - `@@text` collapses to `@text`
/// - `@path` is replaced by the contents of `path`
pub fn finish_value(raw: &str, name: &str, rules: &Rules) -> Result<String> {
    let mut value = if let Some(rest) = raw.strip_prefix("@@") {
        format!("@{rest}")
    } else if let Some(path) = raw.strip_prefix('@') {
        let path = expand_tilde(path);
        std::fs::read_to_string(&path).map_err(|source| Error::Injection {
            path,
            variable: name.to_owned(),
            source,
        })?
    } else {
        raw.to_owned()
    };

    if rules.trim_start {
        value = value.trim_start_matches(' ').to_owned();
    }
    if rules.trim_end {
        value.truncate(value.trim_end_matches(' ').len());
    }
    if let Some(max) = rules.max_variable_length {
        if let Some((cut, _)) = value.char_indices().nth(max) {
            value.truncate(cut);
        }
    }
    Ok(value)
}

// ── Macro arguments ───────────────────────────────────────────────────────────

/// Split an `exec` argument string into values.
///
/// - `"quoted text"` is taken verbatim without the quotes
/// - `name#` is the element count of array `name`
/// - `name` / `name[i]` is the variable's value when bound, else the literal
///   word
pub fn tokenize_args(text: &str, vars: &VarTable) -> Result<Vec<String>> {
    let mut args = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some(&(start, ch)) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
            continue;
        }

        if ch == '"' {
            chars.next();
            let mut lit = String::new();
            let mut closed = false;
            for (_, c) in chars.by_ref() {
                if c == '"' {
                    closed = true;
                    break;
                }
                lit.push(c);
            }
            if !closed {
                return Err(Error::UnterminatedQuote(text[start..].to_owned()));
            }
            args.push(lit);
            continue;
        }

        let mut end = text.len();
        while let Some(&(i, c)) = chars.peek() {
            if c.is_whitespace() {
                end = i;
                break;
            }
            chars.next();
        }
        args.push(resolve_arg(&text[start..end], vars)?);
    }
    Ok(args)
}

fn resolve_arg(word: &str, vars: &VarTable) -> Result<String> {
    if let Some(name) = word.strip_suffix('#').filter(|n| !n.is_empty()) {
        let values = vars
            .get(name)
            .ok_or_else(|| Error::UnknownArrayCount(name.to_owned()))?;
        return Ok(values.len().to_string());
    }

    match split_indexed(word) {
        Some((name, index)) if vars.contains(name) => {
            let index = index.unwrap_or(0);
            vars.get_at(name, index).map(str::to_owned).ok_or_else(|| Error::ArgumentIndex {
                name: name.to_owned(),
                index,
                len: vars.get(name).map_or(0, <[String]>::len),
            })
        }
        _ => Ok(word.to_owned()),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
