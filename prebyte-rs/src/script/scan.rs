//! Token scanner.
//!
//! Splits raw text into literal spans and action tokens.  Two token forms
//! exist:
//!
//! - inline: `PREFIX text SUFFIX`
//! - line directive: `PREFIX#text` up to and including the next newline (or
//!   end of input); no suffix is needed.
//!
//! The delimiters are passed to every [`Scanner::next_segment`] call rather
//! than fixed at construction, so a `set rule variable_prefix=…` takes effect
//! for the very next token.

use aho_corasick::AhoCorasick;

use crate::error::{Error, Result};

// ── Delimiters ────────────────────────────────────────────────────────────────

/// Prefix/suffix pair with prebuilt substring finders.
pub struct Delimiters {
    prefix: String,
    suffix: String,
    prefix_finder: AhoCorasick,
    suffix_finder: AhoCorasick,
}

impl std::fmt::Debug for Delimiters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delimiters")
            .field("prefix", &self.prefix)
            .field("suffix", &self.suffix)
            .finish()
    }
}

impl Delimiters {
    pub fn new(prefix: &str, suffix: &str) -> Self {
        Delimiters {
            prefix: prefix.to_owned(),
            suffix: suffix.to_owned(),
            prefix_finder: AhoCorasick::new([prefix]),
            suffix_finder: AhoCorasick::new([suffix]),
        }
    }

    /// `true` if this pair was built for exactly these strings.
    pub fn is_for(&self, prefix: &str, suffix: &str) -> bool {
        self.prefix == prefix && self.suffix == suffix
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    fn find_prefix(&self, hay: &str) -> Option<usize> {
        self.prefix_finder.find(hay).map(|m| m.start())
    }

    fn find_suffix(&self, hay: &str) -> Option<usize> {
        self.suffix_finder.find(hay).map(|m| m.start())
    }
}

// ── Segments ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionForm {
    Inline,
    Line,
}

/// One action token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Action<'a> {
    /// Text between the delimiters, trimmed.
    pub text: &'a str,
    /// The exact source slice, delimiters (and a line directive's newline)
    /// included.  Re-emitted verbatim while capturing.
    pub raw: &'a str,
    /// 1-based line of the token's prefix.
    pub line: usize,
    pub form: ActionForm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Literal(&'a str),
    Action(Action<'a>),
}

// ── Scanner ───────────────────────────────────────────────────────────────────

pub struct Scanner<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
    /// An action found together with the literal before it, returned on the
    /// following call.
    pending: Option<Action<'a>>,
}

impl<'a> Scanner<'a> {
    pub fn new(src: &'a str) -> Self {
        Scanner { src, pos: 0, line: 1, pending: None }
    }

    /// Next literal span or action, or `None` at end of input.
    pub fn next_segment(&mut self, delims: &Delimiters) -> Result<Option<Segment<'a>>> {
        if let Some(action) = self.pending.take() {
            return Ok(Some(Segment::Action(action)));
        }
        let rest = &self.src[self.pos..];
        if rest.is_empty() {
            return Ok(None);
        }

        let Some(at) = delims.find_prefix(rest) else {
            self.advance(rest.len());
            return Ok(Some(Segment::Literal(rest)));
        };

        let literal = &rest[..at];
        self.advance(at);
        let action = self.read_action(delims)?;
        if literal.is_empty() {
            Ok(Some(Segment::Action(action)))
        } else {
            self.pending = Some(action);
            Ok(Some(Segment::Literal(literal)))
        }
    }

    /// Read the action starting at `self.pos`, which sits on a prefix.
    fn read_action(&mut self, delims: &Delimiters) -> Result<Action<'a>> {
        let start = self.pos;
        let line = self.line;
        let body_start = start + delims.prefix().len();
        let body = &self.src[body_start..];

        if let Some(directive) = body.strip_prefix('#') {
            let (text, consumed) = match directive.find('\n') {
                Some(nl) => (&directive[..nl], nl + 1),
                None => (directive, directive.len()),
            };
            let end = body_start + 1 + consumed;
            self.advance(end - start);
            return Ok(Action {
                text: text.trim(),
                raw: &self.src[start..end],
                line,
                form: ActionForm::Line,
            });
        }

        let close = delims.find_suffix(body).ok_or_else(|| Error::UnmatchedDelimiter {
            prefix: delims.prefix().to_owned(),
            suffix: delims.suffix().to_owned(),
        })?;
        let end = body_start + close + delims.suffix().len();
        self.advance(end - start);
        Ok(Action {
            text: body[..close].trim(),
            raw: &self.src[start..end],
            line,
            form: ActionForm::Inline,
        })
    }

    fn advance(&mut self, n: usize) {
        let consumed = &self.src[self.pos..self.pos + n];
        self.line += consumed.bytes().filter(|&b| b == b'\n').count();
        self.pos += n;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn collect<'a>(src: &'a str, d: &Delimiters) -> Result<Vec<Segment<'a>>> {
        let mut sc = Scanner::new(src);
        let mut out = Vec::new();
        while let Some(seg) = sc.next_segment(d)? {
            out.push(seg);
        }
        Ok(out)
    }

    fn pct() -> Delimiters {
        Delimiters::new("%%", "%%")
    }

    #[test]
    fn plain_text_is_one_literal() {
        let d = pct();
        assert_eq!(collect("no tokens here", &d).unwrap(), [Segment::Literal("no tokens here")]);
        assert!(collect("", &d).unwrap().is_empty());
    }

    #[test]
    fn inline_action() {
        let d = pct();
        let segs = collect("a %% name %% b", &d).unwrap();
        assert_eq!(segs.len(), 3);
        assert_eq!(segs[0], Segment::Literal("a "));
        match segs[1] {
            Segment::Action(a) => {
                assert_eq!(a.text, "name");
                assert_eq!(a.raw, "%% name %%");
                assert_eq!(a.form, ActionForm::Inline);
            }
            _ => panic!("expected action"),
        }
        assert_eq!(segs[2], Segment::Literal(" b"));
    }

    #[test]
    fn line_directive_consumes_newline() {
        let d = pct();
        let segs = collect("%%#set var X=1\nrest", &d).unwrap();
        match segs[0] {
            Segment::Action(a) => {
                assert_eq!(a.text, "set var X=1");
                assert_eq!(a.raw, "%%#set var X=1\n");
                assert_eq!(a.form, ActionForm::Line);
            }
            _ => panic!("expected action"),
        }
        assert_eq!(segs[1], Segment::Literal("rest"));
    }

    #[test]
    fn line_directive_at_end_of_input() {
        let d = pct();
        let segs = collect("%%#endif", &d).unwrap();
        assert!(matches!(segs[0], Segment::Action(Action { text: "endif", .. })));
    }

    #[test]
    fn unmatched_prefix_is_fatal() {
        let d = pct();
        assert!(matches!(collect("x %%open", &d), Err(Error::UnmatchedDelimiter { .. })));
    }

    #[test]
    fn line_numbers() {
        let d = pct();
        let segs = collect("a\nb %%X%%\n\n%%Y%%", &d).unwrap();
        let lines: Vec<usize> = segs
            .iter()
            .filter_map(|s| match s {
                Segment::Action(a) => Some(a.line),
                _ => None,
            })
            .collect();
        assert_eq!(lines, [2, 4]);
    }

    #[test]
    fn asymmetric_delimiters() {
        let d = Delimiters::new("{{", "}}");
        let segs = collect("{{ a }}%%b%%", &d).unwrap();
        assert!(matches!(segs[0], Segment::Action(Action { text: "a", .. })));
        assert_eq!(segs[1], Segment::Literal("%%b%%"));
        assert!(d.is_for("{{", "}}"));
    }
}
