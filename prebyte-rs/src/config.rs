//! Settings files and variable defines.
//!
//! A settings document is any structured file whose top-level map may hold:
//!
//! | Key         | Shape                       |
//! |-------------|-----------------------------|
//! | `variables` | map of name → scalar/array  |
//! | `profiles`  | map of name → profile map   |
//! | `ignore`    | array of strings            |
//! | `rules`     | map of rule name → scalar   |
//!
//! Without an explicit path the first `settings.{json,yaml,yml,toml}` in
//! `~/.prebyte/` is used.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::format;
use crate::profile::{self, Profile, UnknownKeys};
use crate::script::value::Value;
use crate::var::VarTable;

const SETTINGS_EXTENSIONS: &[&str] = &["json", "yaml", "yml", "toml"];

// ── Settings ──────────────────────────────────────────────────────────────────

/// A parsed settings document.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub variables: VarTable,
    pub profiles: BTreeMap<String, Profile>,
    pub ignore: HashSet<String>,
    pub rules: BTreeMap<String, Value>,
}

impl Settings {
    /// Build settings from a parsed document.  A null document (empty file)
    /// yields empty settings.
    pub fn from_value(value: &Value) -> Result<Self> {
        let mut settings = Settings::default();
        if value.is_null() {
            return Ok(settings);
        }
        let map = value
            .as_map()
            .map_err(|e| Error::Settings(format!("document must be a map: {e}")))?;

        for (key, item) in map {
            match key.as_str() {
                "variables" => {
                    debug!("loading variables from settings");
                    settings.variables = profile::variables_from_value(item)?;
                }
                "profiles" => {
                    debug!("loading profiles from settings");
                    let profiles = item
                        .as_map()
                        .map_err(|e| Error::Settings(format!("profiles: {e}")))?;
                    for (name, body) in profiles {
                        if name.is_empty() {
                            return Err(Error::EmptyName("profile"));
                        }
                        let mut p = Profile::new(name.clone());
                        p.merge_value(body, UnknownKeys::Reject)?;
                        settings.profiles.insert(name.clone(), p);
                    }
                }
                "ignore" => settings.ignore = profile::ignore_from_value(item)?,
                "rules" => settings.rules = profile::rules_from_value(item)?,
                other => warn!(key = other, "unknown settings key, skipped"),
            }
        }
        Ok(settings)
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "loading settings");
        Self::from_value(&format::parse_file(path)?)
    }
}

/// `~/.prebyte`, if a home directory can be determined.
pub fn settings_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().join(".prebyte"))
}

/// First `settings.<ext>` regular file in `dir`.
pub fn find_settings_in(dir: &Path) -> Option<PathBuf> {
    SETTINGS_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("settings.{ext}")))
        .find(|p| p.is_file())
}

/// The default settings file, if there is one.
pub fn discover_settings() -> Option<PathBuf> {
    let dir = settings_dir()?;
    let found = find_settings_in(&dir);
    match &found {
        Some(p) => debug!(path = %p.display(), "found settings file"),
        None => warn!(dir = %dir.display(), "no settings file found"),
    }
    found
}

// ── Defines ───────────────────────────────────────────────────────────────────

/// One `-D`/`--define` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Define {
    /// `NAME=VALUE`
    Scalar { name: String, value: String },
    /// `NAME=[a,b,c]`
    List { name: String, values: Vec<String> },
    /// No `=`: a structured file of variables.
    File(PathBuf),
}

impl Define {
    pub fn parse(text: &str) -> Result<Self> {
        let Some((name, value)) = text.split_once('=') else {
            return Ok(Define::File(PathBuf::from(text)));
        };
        if name.is_empty() {
            return Err(Error::EmptyName("variable"));
        }
        if value.is_empty() {
            return Err(Error::EmptyValue { kind: "variable", name: name.to_owned() });
        }
        Ok(match parse_list(value) {
            Some(values) => Define::List { name: name.to_owned(), values },
            None => Define::Scalar { name: name.to_owned(), value: value.to_owned() },
        })
    }

    /// Apply this define to a variable table.
    pub fn apply(&self, vars: &mut VarTable) -> Result<()> {
        match self {
            Define::Scalar { name, value } => vars.set(name.clone(), value.clone()),
            Define::List { name, values } => vars.set_list(name.clone(), values.clone()),
            Define::File(path) => {
                debug!(path = %path.display(), "injecting variables from file");
                let value = format::parse_file(path)?;
                vars.extend(&profile::variables_from_value(&value)?);
            }
        }
        Ok(())
    }
}

/// `[a,b,c]` → `["a", "b", "c"]`, dropping empty items.  `None` if the text
/// is not bracketed.
pub fn parse_list(value: &str) -> Option<Vec<String>> {
    let inner = value.strip_prefix('[')?.strip_suffix(']')?;
    Some(
        inner
            .split(',')
            .filter(|item| !item.is_empty())
            .map(str::to_owned)
            .collect(),
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Format;

    #[test]
    fn settings_from_yaml() {
        let doc = Format::Yaml
            .parse_str(
                "variables:\n  NAME: prebyte\n  LIST: [a, b]\n\
                 profiles:\n  dev:\n    variables:\n      MODE: dev\n    ignore: [SKIP]\n\
                 ignore: [KEEP]\n\
                 rules:\n  strict_variables: true\n",
            )
            .unwrap();
        let s = Settings::from_value(&doc).unwrap();
        assert_eq!(s.variables.get_at("NAME", 0), Some("prebyte"));
        assert_eq!(s.variables.get("LIST").unwrap().len(), 2);
        let dev = &s.profiles["dev"];
        assert_eq!(dev.variables.get_at("MODE", 0), Some("dev"));
        assert!(dev.ignore.contains("SKIP"));
        assert!(s.ignore.contains("KEEP"));
        assert_eq!(s.rules["strict_variables"], Value::Bool(true));
    }

    #[test]
    fn unknown_profile_key_in_settings_is_fatal() {
        let doc = Format::Json.parse_str(r#"{"profiles": {"p": {"colour": 1}}}"#).unwrap();
        assert!(matches!(Settings::from_value(&doc), Err(Error::InvalidProfile { .. })));
    }

    #[test]
    fn empty_and_non_map_documents() {
        assert!(Settings::from_value(&Value::Null).unwrap().variables.is_empty());
        assert!(matches!(
            Settings::from_value(&Value::Array(vec![])),
            Err(Error::Settings(_))
        ));
    }

    #[test]
    fn load_and_discover_in_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(find_settings_in(dir.path()), None);
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[variables]\nX = 1\n").unwrap();
        assert_eq!(find_settings_in(dir.path()), Some(path.clone()));
        let s = Settings::load_file(&path).unwrap();
        assert_eq!(s.variables.get_at("X", 0), Some("1"));
    }

    #[test]
    fn define_forms() {
        assert_eq!(
            Define::parse("A=1").unwrap(),
            Define::Scalar { name: "A".into(), value: "1".into() }
        );
        assert_eq!(
            Define::parse("L=[a,,b]").unwrap(),
            Define::List { name: "L".into(), values: vec!["a".into(), "b".into()] }
        );
        assert_eq!(Define::parse("vars.json").unwrap(), Define::File("vars.json".into()));
        assert!(matches!(Define::parse("=1"), Err(Error::EmptyName("variable"))));
        assert!(matches!(Define::parse("A="), Err(Error::EmptyValue { .. })));
    }

    #[test]
    fn define_file_injects_map() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vars.json");
        std::fs::write(&path, r#"{"HOST": "example.org", "PORTS": [80, 443]}"#).unwrap();
        let mut vars = VarTable::new();
        Define::File(path).apply(&mut vars).unwrap();
        assert_eq!(vars.get_at("HOST", 0), Some("example.org"));
        assert_eq!(vars.get("PORTS").unwrap(), ["80", "443"]);
    }

    #[test]
    fn list_syntax() {
        assert_eq!(parse_list("[]"), Some(vec![]));
        assert_eq!(parse_list("plain"), None);
        assert_eq!(parse_list("[x]"), Some(vec!["x".to_owned()]));
    }
}
