//! Execution state that outlives a single run: variables, ignore set,
//! profiles, macros, rules and the include counter.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Local};
use tracing::{debug, warn};

use crate::config::{parse_list, Settings};
use crate::error::{Error, Result};
use crate::profile::Profile;
use crate::rules::{DebugLevel, Rules};
use crate::var::VarTable;

use super::value::Value;

/// Called whenever the `debug_level` rule is set, so the host can adjust its
/// log filter.
pub type LevelHook = Arc<dyn Fn(DebugLevel) + Send + Sync>;

pub struct State {
    pub vars: VarTable,
    pub ignore: HashSet<String>,
    pub profiles: HashMap<String, Profile>,
    /// Macro name → unprocessed body.
    pub macros: HashMap<String, String>,
    pub rules: Rules,
    pub include_count: usize,
    /// Wall-clock instant used by the clock built-ins.
    pub started: DateTime<Local>,
    level_hook: Option<LevelHook>,
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("State")
            .field("vars", &self.vars.len())
            .field("macros", &self.macros.len())
            .field("profiles", &self.profiles.len())
            .field("rules", &self.rules)
            .finish()
    }
}

impl State {
    pub fn new() -> Self {
        State {
            vars: VarTable::new(),
            ignore: HashSet::new(),
            profiles: HashMap::new(),
            macros: HashMap::new(),
            rules: Rules::default(),
            include_count: 0,
            started: Local::now(),
            level_hook: None,
        }
    }

    pub fn set_level_hook(&mut self, hook: LevelHook) {
        self.level_hook = Some(hook);
    }

    // ── Rules ─────────────────────────────────────────────────────────────────

    pub fn set_rule(&mut self, name: &str, value: &Value) -> Result<()> {
        self.rules.set(name, value)?;
        self.rule_changed(name, value);
        Ok(())
    }

    /// Apply a `NAME=VALUE` rule string.
    pub fn set_rule_assignment(&mut self, text: &str) -> Result<()> {
        let (name, value) = self.rules.set_assignment(text)?;
        self.rule_changed(&name, &value);
        Ok(())
    }

    fn rule_changed(&self, name: &str, value: &Value) {
        debug!(rule = name, value = %value, "rule set");
        if name == "debug_level" {
            if let Some(hook) = &self.level_hook {
                hook(self.rules.debug_level);
            }
        }
    }

    // ── Variables ─────────────────────────────────────────────────────────────

    /// Apply a `set var` argument: `NAME=VALUE`, `NAME=[a,b]`, or a bare
    /// `NAME` (bound to an empty string).
    pub fn set_var_assignment(&mut self, text: &str) -> Result<()> {
        let (name, value) = text.split_once('=').unwrap_or((text, ""));
        let (name, value) = (name.trim(), value.trim());
        if name.is_empty() {
            return Err(Error::EmptyName("variable"));
        }
        match parse_list(value) {
            Some(values) => self.vars.set_list(name, values),
            None => self.vars.set(name, value),
        }
        Ok(())
    }

    // ── Profiles ──────────────────────────────────────────────────────────────

    /// Merge a named profile into the live state.
    pub fn apply_profile(&mut self, name: &str) -> Result<()> {
        let profile = self
            .profiles
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownProfile(name.to_owned()))?;
        debug!(profile = name, "applying profile");
        self.merge_profile(&profile)
    }

    pub fn merge_profile(&mut self, profile: &Profile) -> Result<()> {
        self.vars.extend(&profile.variables);
        self.ignore.extend(profile.ignore.iter().cloned());
        for (rule, value) in &profile.rules {
            self.set_rule(rule, value)?;
        }
        Ok(())
    }

    pub fn add_profile(&mut self, profile: Profile) {
        if self.profiles.contains_key(&profile.name) {
            debug!(profile = %profile.name, "replacing profile");
        }
        self.profiles.insert(profile.name.clone(), profile);
    }

    // ── Macros ────────────────────────────────────────────────────────────────

    /// Store a macro body.  An existing definition wins; the new body is
    /// dropped with a warning.
    pub fn define_macro(&mut self, name: &str, body: String) {
        if self.macros.contains_key(name) {
            warn!(name, "macro already defined, new definition ignored");
            return;
        }
        debug!(name, "macro defined");
        self.macros.insert(name.to_owned(), body);
    }

    // ── Settings ──────────────────────────────────────────────────────────────

    /// Merge a settings document: variables, profiles, ignore set, then rules.
    pub fn apply_settings(&mut self, settings: &Settings) -> Result<()> {
        self.vars.extend(&settings.variables);
        for profile in settings.profiles.values() {
            self.add_profile(profile.clone());
        }
        self.ignore.extend(settings.ignore.iter().cloned());
        for (rule, value) in &settings.rules {
            self.set_rule(rule, value)?;
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
