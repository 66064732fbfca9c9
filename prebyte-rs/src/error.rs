//! Error type shared by the whole crate.
//!
//! Every fatal condition the engine can hit maps to exactly one variant.
//! Recoverable problems (macro redefinition, unknown profile keys, …) are
//! logged with `tracing::warn!` instead and never surface here.

use std::path::PathBuf;

/// A fatal preprocessing error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // ── Scanning ─────────────────────────────────────────────────────────────
    #[error("unmatched action prefix '{prefix}': no closing '{suffix}' found")]
    UnmatchedDelimiter { prefix: String, suffix: String },

    // ── Flow control ─────────────────────────────────────────────────────────
    #[error("unmatched 'endif'")]
    UnmatchedEndif,
    #[error("'{0}' without an open 'if'")]
    BranchOutsideIf(&'static str),
    #[error("unmatched 'endfor'")]
    UnmatchedEndfor,
    #[error("'enddef' without a pending macro or profile definition")]
    UnmatchedEnddef,
    #[error("unterminated '{0}' block")]
    Unterminated(&'static str),
    #[error("invalid directive: '{0}'")]
    InvalidDirective(String),
    #[error("invalid condition '{expr}': {message}")]
    Condition { expr: String, message: String },
    #[error("for loop needs a loop variable and an array name, got '{0}'")]
    ForHeader(String),
    #[error("for loop array '{0}' is not defined")]
    UndefinedArray(String),
    #[error("expansion depth limit of {0} exceeded")]
    RecursionLimit(usize),

    // ── Names and assignments ────────────────────────────────────────────────
    #[error("{0} name cannot be empty")]
    EmptyName(&'static str),
    #[error("malformed {kind} assignment '{text}': expected NAME=VALUE")]
    MalformedAssignment { kind: &'static str, text: String },
    #[error("{kind} value cannot be empty for '{name}'")]
    EmptyValue { kind: &'static str, name: String },

    // ── Rules ────────────────────────────────────────────────────────────────
    #[error("unknown rule: '{0}'")]
    UnknownRule(String),
    #[error("invalid value for rule '{rule}': {message}")]
    RuleValue { rule: String, message: String },

    // ── Values ───────────────────────────────────────────────────────────────
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: &'static str, found: &'static str },

    // ── Variables and arguments ──────────────────────────────────────────────
    #[error("variable '{0}' not found")]
    UndefinedVariable(String),
    #[error("file '{path}' for variable '{variable}' cannot be read")]
    Injection { path: PathBuf, variable: String, #[source] source: std::io::Error },
    #[error("ARGS used outside of a macro invocation")]
    ArgsOutsideMacro,
    #[error("ARGS must be indexed, e.g. ARGS[0]")]
    ArgsNotIndexed,
    #[error("ARGS index {index} out of range ({len} arguments)")]
    ArgsIndex { index: usize, len: usize },
    #[error("index {index} out of range for variable '{name}' ({len} values)")]
    ArgumentIndex { name: String, index: usize, len: usize },
    #[error("unterminated quote in arguments: {0}")]
    UnterminatedQuote(String),
    #[error("cannot count elements of undefined variable '{0}'")]
    UnknownArrayCount(String),

    // ── Macros, profiles, includes ───────────────────────────────────────────
    #[error("macro '{0}' is not defined")]
    UnknownMacro(String),
    #[error("profile '{0}' is not defined")]
    UnknownProfile(String),
    #[error("invalid profile '{name}': {message}")]
    InvalidProfile { name: String, message: String },
    #[error("circular include of {}", .0.display())]
    CircularInclude(PathBuf),
    #[error("include file '{0}' not found")]
    IncludeNotFound(String),

    // ── Settings and formats ─────────────────────────────────────────────────
    #[error("invalid settings: {0}")]
    Settings(String),
    #[error("unsupported format: '{0}'")]
    UnsupportedFormat(String),
    #[error("{format} parse error: {message}")]
    Parse { format: &'static str, message: String },

    #[error("{}: {source}", .path.display())]
    Io { path: PathBuf, #[source] source: std::io::Error },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io { path: path.into(), source }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
