//! Directive parsing.
//!
//! An action whose first word is a directive keyword is parsed into a
//! [`Directive`]; anything else is left for variable resolution.  Once the
//! keyword matches, a malformed remainder is an error rather than a silent
//! fall-through.
//!
//! | Syntax                               | Variant                    |
//! |--------------------------------------|----------------------------|
//! | `set var NAME=VALUE`                 | [`Directive::SetVar`]      |
//! | `set rule NAME=VALUE`                | [`Directive::SetRule`]     |
//! | `set profile NAME`                   | [`Directive::SetProfile`]  |
//! | `set ignore TOKEN`                   | [`Directive::SetIgnore`]   |
//! | `unset var NAME` / `unset ignore T`  | `UnsetVar` / `UnsetIgnore` |
//! | `define macro NAME`                  | [`Directive::DefineMacro`] |
//! | `define profile NAME [FORMAT]`       | [`Directive::DefineProfile`] |
//! | `enddef`                             | [`Directive::EndDef`]      |
//! | `exec NAME ARGS…`                    | [`Directive::Exec`]        |
//! | `if COND` / `elif COND` / `else` / `endif` | conditionals         |
//! | `for VAR … ARRAY` / `endfor`         | loops                      |
//! | `include PATH`                       | [`Directive::Include`]     |
//!
//! `def` is accepted as a short form of `define`.

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive<'a> {
    SetVar(&'a str),
    SetRule(&'a str),
    SetProfile(&'a str),
    SetIgnore(&'a str),
    UnsetVar(&'a str),
    UnsetIgnore(&'a str),
    DefineMacro(&'a str),
    DefineProfile { name: &'a str, format: Option<&'a str> },
    EndDef,
    Exec { name: &'a str, args: &'a str },
    If(&'a str),
    Elif(&'a str),
    Else,
    EndIf,
    /// The raw loop header; validated when the loop closes.
    For(&'a str),
    EndFor,
    Include(&'a str),
}

const KEYWORDS: &[&str] = &[
    "set", "unset", "define", "def", "enddef", "exec", "if", "elif", "else", "endif", "for",
    "endfor", "include",
];

/// Split off the first whitespace-delimited word.
fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], s[i..].trim()),
        None => (s, ""),
    }
}

impl<'a> Directive<'a> {
    /// Parse `text`.  `Ok(None)` means the first word is not a directive
    /// keyword.
    pub fn parse(text: &'a str) -> Result<Option<Self>> {
        let (keyword, rest) = split_word(text);
        if !KEYWORDS.contains(&keyword) {
            return Ok(None);
        }
        let invalid = || Error::InvalidDirective(text.to_owned());
        let needs_arg = |arg: &'a str| if arg.is_empty() { Err(invalid()) } else { Ok(arg) };
        let no_arg = |d: Directive<'a>| if rest.is_empty() { Ok(d) } else { Err(invalid()) };

        let directive = match keyword {
            "set" => {
                let (what, arg) = split_word(rest);
                match what {
                    "var" => Directive::SetVar(arg),
                    "rule" => Directive::SetRule(arg),
                    "profile" => Directive::SetProfile(needs_arg(arg)?),
                    "ignore" => Directive::SetIgnore(needs_arg(arg)?),
                    _ => return Err(invalid()),
                }
            }
            "unset" => {
                let (what, arg) = split_word(rest);
                match what {
                    "var" => Directive::UnsetVar(needs_arg(arg)?),
                    "ignore" => Directive::UnsetIgnore(needs_arg(arg)?),
                    _ => return Err(invalid()),
                }
            }
            "define" | "def" => {
                let (what, arg) = split_word(rest);
                match what {
                    "macro" => {
                        if arg.is_empty() {
                            return Err(Error::EmptyName("macro"));
                        }
                        Directive::DefineMacro(arg)
                    }
                    "profile" => {
                        let (name, format) = split_word(arg);
                        if name.is_empty() {
                            return Err(Error::EmptyName("profile"));
                        }
                        let format = (!format.is_empty()).then_some(format);
                        Directive::DefineProfile { name, format }
                    }
                    _ => return Err(invalid()),
                }
            }
            "enddef" => no_arg(Directive::EndDef)?,
            "exec" => {
                let (name, args) = split_word(rest);
                Directive::Exec { name: needs_arg(name)?, args }
            }
            "if" => Directive::If(needs_arg(rest)?),
            "elif" => Directive::Elif(needs_arg(rest)?),
            "else" => no_arg(Directive::Else)?,
            "endif" => no_arg(Directive::EndIf)?,
            "for" => Directive::For(rest),
            "endfor" => no_arg(Directive::EndFor)?,
            "include" => Directive::Include(needs_arg(rest)?),
            _ => return Ok(None),
        };
        Ok(Some(directive))
    }

    /// `true` for the directives that stay live while output is suppressed.
    pub fn is_conditional(&self) -> bool {
        matches!(self, Directive::If(_) | Directive::Elif(_) | Directive::Else | Directive::EndIf)
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Directive::SetVar(_) => "set var",
            Directive::SetRule(_) => "set rule",
            Directive::SetProfile(_) => "set profile",
            Directive::SetIgnore(_) => "set ignore",
            Directive::UnsetVar(_) => "unset var",
            Directive::UnsetIgnore(_) => "unset ignore",
            Directive::DefineMacro(_) => "define macro",
            Directive::DefineProfile { .. } => "define profile",
            Directive::EndDef => "enddef",
            Directive::Exec { .. } => "exec",
            Directive::If(_) => "if",
            Directive::Elif(_) => "elif",
            Directive::Else => "else",
            Directive::EndIf => "endif",
            Directive::For(_) => "for",
            Directive::EndFor => "endfor",
            Directive::Include(_) => "include",
        }
    }
}

/// Split a loop header into loop variable and array name: the first and the
/// last word, so both `item LIST` and `item in LIST` work.
pub fn split_for_header(header: &str) -> Result<(&str, &str)> {
    let words: Vec<&str> = header.split_whitespace().collect();
    match words.as_slice() {
        [var, .., array] => Ok((var, array)),
        _ => Err(Error::ForHeader(header.to_owned())),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Directive<'_> {
        Directive::parse(s).unwrap().unwrap()
    }

    #[test]
    fn non_keywords_fall_through() {
        assert_eq!(Directive::parse("NAME").unwrap(), None);
        assert_eq!(Directive::parse("settings").unwrap(), None);
        assert_eq!(Directive::parse("").unwrap(), None);
    }

    #[test]
    fn set_and_unset() {
        assert_eq!(parse("set var X=1"), Directive::SetVar("X=1"));
        assert_eq!(parse("set rule trim_end = true"), Directive::SetRule("trim_end = true"));
        assert_eq!(parse("set profile dev"), Directive::SetProfile("dev"));
        assert_eq!(parse("set ignore SKIP"), Directive::SetIgnore("SKIP"));
        assert_eq!(parse("unset var X"), Directive::UnsetVar("X"));
        assert_eq!(parse("unset ignore SKIP"), Directive::UnsetIgnore("SKIP"));
    }

    #[test]
    fn malformed_keyword_led_directives() {
        for bad in ["set banana x", "unset var", "else now", "endif x", "if", "include", "exec"] {
            assert!(
                matches!(Directive::parse(bad), Err(Error::InvalidDirective(_))),
                "{bad} should be invalid"
            );
        }
    }

    #[test]
    fn define_forms() {
        assert_eq!(parse("define macro greet"), Directive::DefineMacro("greet"));
        assert_eq!(parse("def macro greet"), Directive::DefineMacro("greet"));
        assert_eq!(
            parse("define profile p json"),
            Directive::DefineProfile { name: "p", format: Some("json") }
        );
        assert_eq!(parse("define profile p"), Directive::DefineProfile { name: "p", format: None });
        assert!(matches!(Directive::parse("define macro"), Err(Error::EmptyName("macro"))));
        assert!(matches!(Directive::parse("define profile"), Err(Error::EmptyName("profile"))));
    }

    #[test]
    fn exec_splits_name_and_args() {
        assert_eq!(
            parse("exec greet \"World\" X"),
            Directive::Exec { name: "greet", args: "\"World\" X" }
        );
        assert_eq!(parse("exec greet"), Directive::Exec { name: "greet", args: "" });
    }

    #[test]
    fn flow_keywords() {
        assert_eq!(parse("if A == B"), Directive::If("A == B"));
        assert_eq!(parse("elif !A"), Directive::Elif("!A"));
        assert!(parse("else").is_conditional());
        assert!(!parse("endfor").is_conditional());
        assert_eq!(parse("for item in LIST"), Directive::For("item in LIST"));
        assert_eq!(parse("include a/b.txt"), Directive::Include("a/b.txt"));
    }

    #[test]
    fn for_header() {
        assert_eq!(split_for_header("item in LIST").unwrap(), ("item", "LIST"));
        assert_eq!(split_for_header("item LIST").unwrap(), ("item", "LIST"));
        assert!(matches!(split_for_header("item"), Err(Error::ForHeader(_))));
        assert!(split_for_header("  ").is_err());
    }
}
