//! Profiles: named bundles of variables, ignored tokens and rule overrides.
//!
//! A profile comes either from the `profiles` section of a settings file or
//! from an in-document `define profile` block.  Applying one (`set profile`,
//! `-p`) merges all three parts into the live engine state.

use std::collections::{BTreeMap, HashSet};

use tracing::{trace, warn};

use crate::error::{Error, Result};
use crate::script::value::Value;
use crate::var::VarTable;

/// How strictly to treat keys other than `variables`/`ignore`/`rules`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownKeys {
    /// Settings files: an unknown key is an error.
    Reject,
    /// In-document profile blocks: warn and skip.
    Warn,
}

#[derive(Debug, Clone, Default)]
pub struct Profile {
    pub name: String,
    pub variables: VarTable,
    pub ignore: HashSet<String>,
    pub rules: BTreeMap<String, Value>,
}

impl Profile {
    pub fn new(name: impl Into<String>) -> Self {
        Profile { name: name.into(), ..Default::default() }
    }

    /// Merge the keys of a profile map into this profile.
    pub fn merge_value(&mut self, value: &Value, unknown: UnknownKeys) -> Result<()> {
        let invalid = |message: String| Error::InvalidProfile { name: self.name.clone(), message };
        let map = value.as_map().map_err(|e| invalid(e.to_string()))?;

        for (key, item) in map {
            match key.as_str() {
                "variables" => {
                    trace!(profile = %self.name, "adding variables");
                    self.variables.extend(&variables_from_value(item)?);
                }
                "ignore" => self.ignore.extend(ignore_from_value(item)?),
                "rules" => self.rules.extend(rules_from_value(item)?),
                other => match unknown {
                    UnknownKeys::Reject => {
                        return Err(invalid(format!("unknown key '{other}'")));
                    }
                    UnknownKeys::Warn => {
                        warn!(profile = %self.name, key = other, "unknown key in profile, skipped");
                    }
                },
            }
        }
        Ok(())
    }
}

/// Convert a `variables` map into bindings.
///
/// Scalars become one-element lists, arrays of scalars become lists; null
/// values and nested containers are rejected.
pub fn variables_from_value(value: &Value) -> Result<VarTable> {
    let map = value
        .as_map()
        .map_err(|e| Error::Settings(format!("variables: {e}")))?;
    let mut vars = VarTable::new();
    for (name, item) in map {
        if name.is_empty() {
            return Err(Error::EmptyName("variable"));
        }
        match item {
            Value::Array(items) => {
                let values = items
                    .iter()
                    .map(|v| scalar_text(name, v))
                    .collect::<Result<Vec<_>>>()?;
                vars.set_list(name.clone(), values);
            }
            other => vars.set(name.clone(), scalar_text(name, other)?),
        }
    }
    Ok(vars)
}

fn scalar_text(name: &str, value: &Value) -> Result<String> {
    if value.is_scalar() {
        Ok(value.to_string())
    } else {
        Err(Error::Settings(format!(
            "variable '{name}' must be a scalar or an array of scalars, found {}",
            value.type_name()
        )))
    }
}

/// Convert an `ignore` array into a set of tokens.
pub fn ignore_from_value(value: &Value) -> Result<HashSet<String>> {
    let items = value
        .as_array()
        .map_err(|e| Error::Settings(format!("ignore: {e}")))?;
    items
        .iter()
        .map(|item| match item {
            Value::Str(s) => Ok(s.clone()),
            other => Err(Error::Settings(format!(
                "ignore items must be strings, found {}",
                other.type_name()
            ))),
        })
        .collect()
}

/// Convert a `rules` map into name → value pairs (validated when applied).
pub fn rules_from_value(value: &Value) -> Result<BTreeMap<String, Value>> {
    let map = value.as_map().map_err(|e| Error::Settings(format!("rules: {e}")))?;
    let mut rules = BTreeMap::new();
    for (name, item) in map {
        if name.is_empty() {
            return Err(Error::EmptyName("rule"));
        }
        if !item.is_scalar() {
            return Err(Error::RuleValue {
                rule: name.clone(),
                message: format!("expected a scalar, found {}", item.type_name()),
            });
        }
        rules.insert(name.clone(), item.clone());
    }
    Ok(rules)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: Vec<(&str, Value)>) -> Value {
        Value::Map(pairs.into_iter().map(|(k, v)| (k.to_owned(), v)).collect())
    }

    #[test]
    fn variables_convert_scalars_and_arrays() {
        let v = map(vec![
            ("a", Value::Int(1)),
            ("b", Value::Bool(true)),
            ("list", Value::Array(vec![Value::Str("x".into()), Value::Float(2.5)])),
        ]);
        let vars = variables_from_value(&v).unwrap();
        assert_eq!(vars.get_at("a", 0), Some("1"));
        assert_eq!(vars.get_at("b", 0), Some("true"));
        assert_eq!(vars.get("list").unwrap(), ["x", "2.5"]);
    }

    #[test]
    fn variables_reject_null_and_nesting() {
        assert!(variables_from_value(&map(vec![("a", Value::Null)])).is_err());
        let nested = map(vec![("a", Value::Array(vec![Value::Array(vec![])]))]);
        assert!(variables_from_value(&nested).is_err());
    }

    #[test]
    fn ignore_must_be_strings() {
        let ok = Value::Array(vec![Value::Str("KEEP".into())]);
        assert!(ignore_from_value(&ok).unwrap().contains("KEEP"));
        assert!(ignore_from_value(&Value::Array(vec![Value::Int(1)])).is_err());
        assert!(ignore_from_value(&Value::Str("x".into())).is_err());
    }

    #[test]
    fn merge_profile_block() {
        let mut p = Profile::new("dev");
        let v = map(vec![
            ("variables", map(vec![("a", Value::Int(1))])),
            ("ignore", Value::Array(vec![Value::Str("SKIP".into())])),
            ("rules", map(vec![("trim_end", Value::Bool(true))])),
        ]);
        p.merge_value(&v, UnknownKeys::Reject).unwrap();
        assert_eq!(p.variables.get_at("a", 0), Some("1"));
        assert!(p.ignore.contains("SKIP"));
        assert_eq!(p.rules.get("trim_end"), Some(&Value::Bool(true)));
    }

    #[test]
    fn unknown_key_policy() {
        let v = map(vec![("colour", Value::Str("red".into()))]);
        let mut p = Profile::new("p");
        assert!(p.merge_value(&v, UnknownKeys::Warn).is_ok());
        assert!(matches!(
            p.merge_value(&v, UnknownKeys::Reject),
            Err(Error::InvalidProfile { .. })
        ));
    }

    #[test]
    fn non_map_profile_is_invalid() {
        let mut p = Profile::new("p");
        assert!(p.merge_value(&Value::Str("x".into()), UnknownKeys::Warn).is_err());
    }
}
