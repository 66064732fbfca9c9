//! Embedded API.
//!
//! [`Prebyte`] is what a host program holds: it owns the engine state
//! (variables, profiles, macros, rules, ignore set), which persists across
//! `process*` calls.  Every failure comes back as an [`Error`]; nothing in
//! here exits the process.

use std::path::Path;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::{self, Define, Settings};
use crate::error::{Error, Result};
use crate::rules::Rules;
use crate::script::{Interpreter, LevelHook, Value};
use crate::var::VarTable;

pub struct Prebyte {
    interp: Interpreter,
    last_elapsed: Option<Duration>,
}

impl Default for Prebyte {
    fn default() -> Self {
        Self::new()
    }
}

impl Prebyte {
    /// An engine with default rules and nothing bound.
    pub fn new() -> Self {
        Prebyte { interp: Interpreter::default(), last_elapsed: None }
    }

    /// An engine initialised from an explicit settings file.
    pub fn with_settings(path: &Path) -> Result<Self> {
        let mut engine = Self::new();
        engine.load_settings(path)?;
        Ok(engine)
    }

    /// An engine initialised from `~/.prebyte/settings.*` when one exists.
    pub fn discover() -> Result<Self> {
        let mut engine = Self::new();
        if let Some(path) = config::discover_settings() {
            engine.load_settings(&path)?;
        }
        Ok(engine)
    }

    pub fn load_settings(&mut self, path: &Path) -> Result<()> {
        let settings = Settings::load_file(path)?;
        self.interp.state.apply_settings(&settings)
    }

    /// Merge an already-parsed settings document.
    pub fn apply_settings(&mut self, value: &Value) -> Result<()> {
        let settings = Settings::from_value(value)?;
        self.interp.state.apply_settings(&settings)
    }

    pub fn set_level_hook(&mut self, hook: LevelHook) {
        self.interp.state.set_level_hook(hook);
    }

    // ── Bindings ──────────────────────────────────────────────────────────────

    pub fn set_variable(&mut self, name: &str, value: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::EmptyName("variable"));
        }
        self.interp.state.vars.set(name, value);
        Ok(())
    }

    pub fn set_variable_list(&mut self, name: &str, values: Vec<String>) -> Result<()> {
        if name.is_empty() {
            return Err(Error::EmptyName("variable"));
        }
        self.interp.state.vars.set_list(name, values);
        Ok(())
    }

    /// Apply a command-line style define: `NAME=VALUE`, `NAME=[a,b]`, or a
    /// path to a structured file of variables.
    pub fn define(&mut self, text: &str) -> Result<()> {
        Define::parse(text)?.apply(&mut self.interp.state.vars)
    }

    pub fn set_profile(&mut self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::EmptyName("profile"));
        }
        self.interp.state.apply_profile(name)
    }

    pub fn set_ignore(&mut self, token: &str) {
        self.interp.state.ignore.insert(token.to_owned());
    }

    /// Set one rule from a `NAME=VALUE` string.
    pub fn set_rule(&mut self, assignment: &str) -> Result<()> {
        self.interp.state.set_rule_assignment(assignment)
    }

    /// Set one rule from a typed value.
    pub fn set_rule_value(&mut self, name: &str, value: &Value) -> Result<()> {
        self.interp.state.set_rule(name, value)
    }

    // ── Processing ────────────────────────────────────────────────────────────

    pub fn process(&mut self, text: &str) -> Result<String> {
        self.timed(text, None)
    }

    pub fn process_to(&mut self, text: &str, output: &Path) -> Result<()> {
        let out = self.process(text)?;
        write_output(output, &out)
    }

    pub fn process_file(&mut self, path: &Path) -> Result<String> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        self.timed(&text, Some(path))
    }

    pub fn process_file_to(&mut self, path: &Path, output: &Path) -> Result<()> {
        let out = self.process_file(path)?;
        write_output(output, &out)
    }

    fn timed(&mut self, text: &str, file: Option<&Path>) -> Result<String> {
        let start = Instant::now();
        let result = self.interp.run(text, file);
        let elapsed = start.elapsed();
        self.last_elapsed = Some(elapsed);
        debug!(?elapsed, ok = result.is_ok(), "run finished");
        result
    }

    // ── Introspection ─────────────────────────────────────────────────────────

    pub fn rules(&self) -> &Rules {
        &self.interp.state.rules
    }

    pub fn variables(&self) -> &VarTable {
        &self.interp.state.vars
    }

    /// Includes processed since the engine was created.
    pub fn include_count(&self) -> usize {
        self.interp.state.include_count
    }

    /// Wall time of the most recent `process*` call.
    pub fn last_elapsed(&self) -> Option<Duration> {
        self.last_elapsed
    }
}

fn write_output(path: &Path, text: &str) -> Result<()> {
    std::fs::write(path, text).map_err(|e| Error::io(path, e))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
