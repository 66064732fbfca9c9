//! Engine rules.
//!
//! Rules are a fixed schema of settings that steer how tokens are resolved.
//! They can be changed at any point (settings file, profile, `-r` flag, or an
//! in-document `set rule`) and affect every token scanned afterwards.

use std::fmt;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::script::value::Value;

/// Logging verbosity requested through the `debug_level` rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum DebugLevel {
    Off,
    #[default]
    Error,
    Warning,
    Info,
    Debug,
    Trace,
}

impl DebugLevel {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s.trim().to_ascii_uppercase().as_str() {
            "OFF" => DebugLevel::Off,
            "ERROR" | "ERR" => DebugLevel::Error,
            "WARNING" | "WARN" => DebugLevel::Warning,
            "INFO" => DebugLevel::Info,
            "DEBUG" => DebugLevel::Debug,
            "TRACE" => DebugLevel::Trace,
            _ => return None,
        })
    }
}

impl fmt::Display for DebugLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DebugLevel::Off => "OFF",
            DebugLevel::Error => "ERROR",
            DebugLevel::Warning => "WARNING",
            DebugLevel::Info => "INFO",
            DebugLevel::Debug => "DEBUG",
            DebugLevel::Trace => "TRACE",
        })
    }
}

/// What the CLI reports after a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Benchmark {
    #[default]
    None,
    Time,
    Memory,
    All,
}

impl Benchmark {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s.trim().to_ascii_uppercase().as_str() {
            "NONE" => Benchmark::None,
            "TIME" => Benchmark::Time,
            "MEMORY" => Benchmark::Memory,
            "ALL" => Benchmark::All,
            _ => return None,
        })
    }

    pub fn reports_time(self) -> bool {
        matches!(self, Benchmark::Time | Benchmark::All)
    }

    pub fn reports_memory(self) -> bool {
        matches!(self, Benchmark::Memory | Benchmark::All)
    }
}

impl fmt::Display for Benchmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Benchmark::None => "NONE",
            Benchmark::Time => "TIME",
            Benchmark::Memory => "MEMORY",
            Benchmark::All => "ALL",
        })
    }
}

/// Names of every rule, in listing order.
pub const RULE_NAMES: &[&str] = &[
    "strict_variables",
    "set_default_variables",
    "trim_start",
    "trim_end",
    "allow_env",
    "allow_env_fallback",
    "debug_level",
    "max_variable_length",
    "default_variable_value",
    "variable_prefix",
    "variable_suffix",
    "include_path",
    "benchmark",
];

/// The live rule set of an engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Rules {
    pub strict_variables: bool,
    pub set_default_variables: bool,
    pub trim_start: bool,
    pub trim_end: bool,
    pub allow_env: bool,
    pub allow_env_fallback: bool,
    pub debug_level: DebugLevel,
    /// `None` means unlimited (`-1` in rule syntax).
    pub max_variable_length: Option<usize>,
    pub default_variable_value: String,
    pub variable_prefix: String,
    pub variable_suffix: String,
    pub include_path: PathBuf,
    pub benchmark: Benchmark,
}

impl Default for Rules {
    fn default() -> Self {
        Rules {
            strict_variables: false,
            set_default_variables: false,
            trim_start: false,
            trim_end: false,
            allow_env: true,
            allow_env_fallback: false,
            debug_level: DebugLevel::Error,
            max_variable_length: None,
            default_variable_value: "???".to_owned(),
            variable_prefix: "%%".to_owned(),
            variable_suffix: "%%".to_owned(),
            include_path: expand_tilde("~/.prebyte/includes"),
            benchmark: Benchmark::None,
        }
    }
}

impl Rules {
    /// Apply one rule by name.  Unknown names and values of the wrong shape
    /// are fatal.
    pub fn set(&mut self, name: &str, value: &Value) -> Result<()> {
        let bad = |message: String| Error::RuleValue { rule: name.to_owned(), message };
        let flag = || value.as_bool().map_err(|e| bad(e.to_string()));
        let text = || value.as_string().map_err(|e| bad(e.to_string()));

        match name {
            "strict_variables" => self.strict_variables = flag()?,
            "set_default_variables" => self.set_default_variables = flag()?,
            "trim_start" => self.trim_start = flag()?,
            "trim_end" => self.trim_end = flag()?,
            "allow_env" => self.allow_env = flag()?,
            "allow_env_fallback" => self.allow_env_fallback = flag()?,
            "debug_level" => {
                let s = text()?;
                self.debug_level =
                    DebugLevel::parse(&s).ok_or_else(|| bad(format!("unknown debug level '{s}'")))?;
            }
            "max_variable_length" => {
                let n = value.as_int().map_err(|e| bad(e.to_string()))?;
                self.max_variable_length = usize::try_from(n).ok();
            }
            "default_variable_value" => self.default_variable_value = text()?,
            "variable_prefix" | "variable_suffix" => {
                let s = text()?;
                if s.is_empty() {
                    return Err(bad("delimiter cannot be empty".into()));
                }
                if name == "variable_prefix" {
                    self.variable_prefix = s;
                } else {
                    self.variable_suffix = s;
                }
            }
            "include_path" => self.include_path = expand_tilde(&text()?),
            "benchmark" => {
                let s = text()?;
                self.benchmark =
                    Benchmark::parse(&s).ok_or_else(|| bad(format!("unknown benchmark mode '{s}'")))?;
            }
            _ => return Err(Error::UnknownRule(name.to_owned())),
        }
        Ok(())
    }

    /// Apply a `NAME=VALUE` rule string as given on the command line or in a
    /// `set rule` directive.
    pub fn set_assignment(&mut self, text: &str) -> Result<(String, Value)> {
        let (name, value) = text.split_once('=').ok_or_else(|| Error::MalformedAssignment {
            kind: "rule",
            text: text.to_owned(),
        })?;
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::EmptyName("rule"));
        }
        let value = Value::Str(value.trim().to_owned());
        self.set(name, &value)?;
        Ok((name.to_owned(), value))
    }

    /// Render the current value of a rule for listings.
    pub fn describe(&self, name: &str) -> Option<String> {
        Some(match name {
            "strict_variables" => self.strict_variables.to_string(),
            "set_default_variables" => self.set_default_variables.to_string(),
            "trim_start" => self.trim_start.to_string(),
            "trim_end" => self.trim_end.to_string(),
            "allow_env" => self.allow_env.to_string(),
            "allow_env_fallback" => self.allow_env_fallback.to_string(),
            "debug_level" => self.debug_level.to_string(),
            "max_variable_length" => match self.max_variable_length {
                Some(n) => n.to_string(),
                None => "no limit".to_owned(),
            },
            "default_variable_value" => self.default_variable_value.clone(),
            "variable_prefix" => self.variable_prefix.clone(),
            "variable_suffix" => self.variable_suffix.clone(),
            "include_path" => self.include_path.display().to_string(),
            "benchmark" => self.benchmark.to_string(),
            _ => return None,
        })
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(dirs) = directories::BaseDirs::new() {
            return dirs.home_dir().join(rest.trim_start_matches('/'));
        }
    }
    PathBuf::from(path)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
