//! Built-in double-underscore variables.
//!
//! Clock values come from the instant the engine was constructed, so every
//! `__TIME__` in one document agrees.  File values describe the file being
//! expanded: the innermost include, else the input file.

use std::path::Path;

use chrono::{DateTime, Local};

/// Every built-in name, in listing order.
pub const BUILTIN_NAMES: &[&str] = &[
    "__DATE__",
    "__TIME__",
    "__DATETIME__",
    "__YEAR__",
    "__MONTH__",
    "__DAY__",
    "__HOUR__",
    "__MINUTE__",
    "__SECOND__",
    "__UNIXTIMESTAMP__",
    "__USER__",
    "__HOST__",
    "__PWD__",
    "__VERSION__",
    "__FILE__",
    "__FILE_NAME__",
    "__FILE_PATH__",
    "__FILE_EXT__",
    "__FILE_SIZE__",
    "__FILE_MODIFIED__",
    "__FILE_CREATED__",
    "__LINE__",
];

/// What a built-in lookup can see.
pub struct BuiltinContext<'a> {
    pub started: &'a DateTime<Local>,
    pub file: Option<&'a Path>,
    pub line: usize,
}

pub fn is_builtin(name: &str) -> bool {
    BUILTIN_NAMES.contains(&name)
}

/// Resolve a built-in.  Returns `None` if `name` is not one.
pub fn lookup(name: &str, cx: &BuiltinContext<'_>) -> Option<String> {
    let now = cx.started;
    Some(match name {
        // ── Clock ────────────────────────────────────────────────────────────
        "__DATE__" => now.format("%Y-%m-%d").to_string(),
        "__TIME__" => now.format("%H:%M:%S").to_string(),
        "__DATETIME__" => now.format("%Y-%m-%d %H:%M:%S").to_string(),
        "__YEAR__" => now.format("%Y").to_string(),
        "__MONTH__" => now.format("%m").to_string(),
        "__DAY__" => now.format("%d").to_string(),
        "__HOUR__" => now.format("%H").to_string(),
        "__MINUTE__" => now.format("%M").to_string(),
        "__SECOND__" => now.format("%S").to_string(),
        "__UNIXTIMESTAMP__" => now.timestamp().to_string(),

        // ── Environment ──────────────────────────────────────────────────────
        "__USER__" => first_env(&["USER", "USERNAME"]),
        "__HOST__" => first_env(&["HOST", "HOSTNAME", "COMPUTERNAME"]),
        "__PWD__" => std::env::current_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_default(),
        "__VERSION__" => env!("CARGO_PKG_VERSION").to_owned(),

        // ── Current file ─────────────────────────────────────────────────────
        "__FILE__" => cx.file.map(|p| p.display().to_string()).unwrap_or_default(),
        "__FILE_NAME__" => cx
            .file
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        "__FILE_PATH__" => cx
            .file
            .and_then(|p| std::fs::canonicalize(p).ok())
            .and_then(|p| p.parent().map(|d| d.display().to_string()))
            .unwrap_or_default(),
        "__FILE_EXT__" => cx
            .file
            .and_then(Path::extension)
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default(),
        "__FILE_SIZE__" => cx
            .file
            .and_then(|p| std::fs::metadata(p).ok())
            .map(|m| m.len().to_string())
            .unwrap_or_default(),
        "__FILE_MODIFIED__" | "__FILE_CREATED__" => cx
            .file
            .and_then(|p| std::fs::metadata(p).ok())
            .and_then(|m| m.modified().ok())
            .map(|t| DateTime::<Local>::from(t).format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default(),

        "__LINE__" => cx.line.to_string(),
        _ => return None,
    })
}

fn first_env(keys: &[&str]) -> String {
    keys.iter()
        .find_map(|k| std::env::var(k).ok().filter(|v| !v.is_empty()))
        .unwrap_or_default()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
