//! Variable table.
//!
//! Every binding is an ordered list of strings: scalars are lists of length
//! one, arrays (used by `for` loops and `name[i]` lookups) are longer.
//! Names are case-sensitive.  Binding a name again replaces the old list.

use std::collections::HashMap;

/// Name → values store for one engine.
#[derive(Debug, Default, Clone)]
pub struct VarTable {
    vars: HashMap<String, Vec<String>>,
}

impl VarTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to a single value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), vec![value.into()]);
    }

    /// Bind `name` to a list of values.
    pub fn set_list(&mut self, name: impl Into<String>, values: Vec<String>) {
        self.vars.insert(name.into(), values);
    }

    /// All values bound to `name`.
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.vars.get(name).map(Vec::as_slice)
    }

    /// The value at `index`, or `None` when the name is unbound or the index
    /// is out of range.
    pub fn get_at(&self, name: &str, index: usize) -> Option<&str> {
        self.vars.get(name)?.get(index).map(String::as_str)
    }

    /// Remove a binding.  Returns `true` if it existed.
    pub fn unset(&mut self, name: &str) -> bool {
        self.vars.remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Merge every binding of `other` into this table, overwriting.
    pub fn extend(&mut self, other: &VarTable) {
        for (k, v) in &other.vars {
            self.vars.insert(k.clone(), v.clone());
        }
    }

    /// Bindings sorted by name.
    pub fn sorted(&self) -> Vec<(&str, &[String])> {
        let mut out: Vec<_> = self.vars.iter().map(|(k, v)| (k.as_str(), v.as_slice())).collect();
        out.sort_by(|a, b| a.0.cmp(b.0));
        out
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get() {
        let mut vars = VarTable::new();
        vars.set("project", "prebyte");
        assert_eq!(vars.get("project"), Some(&["prebyte".to_owned()][..]));
        assert_eq!(vars.get_at("project", 0), Some("prebyte"));
    }

    #[test]
    fn overwrite_replaces_list() {
        let mut vars = VarTable::new();
        vars.set_list("x", vec!["a".into(), "b".into()]);
        vars.set("x", "c");
        assert_eq!(vars.get("x").map(<[String]>::len), Some(1));
        assert_eq!(vars.len(), 1);
    }

    #[test]
    fn index_out_of_range_is_none() {
        let mut vars = VarTable::new();
        vars.set_list("list", vec!["a".into()]);
        assert_eq!(vars.get_at("list", 1), None);
        assert_eq!(vars.get_at("nope", 0), None);
    }

    #[test]
    fn empty_list_is_still_bound() {
        let mut vars = VarTable::new();
        vars.set_list("empty", Vec::new());
        assert!(vars.contains("empty"));
        assert_eq!(vars.get("empty").map(<[String]>::len), Some(0));
    }

    #[test]
    fn unset() {
        let mut vars = VarTable::new();
        vars.set("gone", "bye");
        assert!(vars.unset("gone"));
        assert!(!vars.contains("gone"));
        assert!(!vars.unset("gone"));
    }

    #[test]
    fn names_are_case_sensitive() {
        let mut vars = VarTable::new();
        vars.set("Name", "a");
        assert!(!vars.contains("name"));
    }

    #[test]
    fn sorted_and_extend() {
        let mut a = VarTable::new();
        a.set("b", "1");
        let mut b = VarTable::new();
        b.set("a", "2");
        b.set("b", "3");
        a.extend(&b);
        let names: Vec<_> = a.sorted().into_iter().map(|(k, _)| k).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(a.get_at("b", 0), Some("3"));
    }
}
