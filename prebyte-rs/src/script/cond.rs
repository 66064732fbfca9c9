//! Condition lexer, parser and evaluator for `if`/`elif`.
//!
//! Precedence (lowest → highest):
//!   or (`||`)  →  and (`&&`)  →  not (`!`, parentheses)  →  comparison
//!
//! Operands are double-quoted literals or bare words.  A bare word names a
//! variable (optionally `name[i]`) and stands for its value; an unbound word
//! stands for its own text.  Alone, a bare word is true iff it is bound and a
//! quoted literal is true iff it is non-empty.

use crate::error::{Error, Result};

// ── CondContext ───────────────────────────────────────────────────────────────

/// Variable access needed by the evaluator.
pub trait CondContext {
    /// The value of `name` at `index`, `Some("")` when the index is out of
    /// range, or `None` when `name` is unbound.
    fn lookup(&self, name: &str, index: usize) -> Option<String>;
}

// ── Token ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Str(String),
    Word(String),
    Eq,
    Ne,
    And,
    Or,
    Bang,
    LParen,
    RParen,
    Eof,
}

// ── Lexer ─────────────────────────────────────────────────────────────────────

struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Lexer { src: src.as_bytes(), pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let ch = self.peek();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn eat(&mut self, ch: u8) -> bool {
        if self.peek() == Some(ch) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn is_word_byte(b: u8) -> bool {
        !b.is_ascii_whitespace() && !matches!(b, b'(' | b')' | b'!' | b'=' | b'&' | b'|' | b'"')
    }

    fn next_token(&mut self) -> std::result::Result<Token, String> {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
        let Some(b) = self.advance() else { return Ok(Token::Eof) };
        Ok(match b {
            b'(' => Token::LParen,
            b')' => Token::RParen,
            b'!' if self.eat(b'=') => Token::Ne,
            b'!' => Token::Bang,
            b'=' if self.eat(b'=') => Token::Eq,
            b'&' if self.eat(b'&') => Token::And,
            b'|' if self.eat(b'|') => Token::Or,
            b'"' => {
                let start = self.pos;
                loop {
                    match self.advance() {
                        Some(b'"') => break,
                        Some(_) => {}
                        None => return Err("unterminated string".into()),
                    }
                }
                let s = &self.src[start..self.pos - 1];
                Token::Str(String::from_utf8_lossy(s).into_owned())
            }
            b if Self::is_word_byte(b) => {
                let start = self.pos - 1;
                while self.peek().is_some_and(Self::is_word_byte) {
                    self.pos += 1;
                }
                Token::Word(String::from_utf8_lossy(&self.src[start..self.pos]).into_owned())
            }
            other => return Err(format!("unexpected '{}'", other as char)),
        })
    }

    fn tokenize(mut self) -> std::result::Result<Vec<Token>, String> {
        let mut out = Vec::new();
        loop {
            let tok = self.next_token()?;
            let done = tok == Token::Eof;
            out.push(tok);
            if done {
                return Ok(out);
            }
        }
    }
}

// ── AST ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Literal(String),
    Word(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Cond {
    Or(Box<Cond>, Box<Cond>),
    And(Box<Cond>, Box<Cond>),
    Not(Box<Cond>),
    Compare { left: Operand, right: Operand, equal: bool },
    Truthy(Operand),
}

// ── Parser ────────────────────────────────────────────────────────────────────

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

type ParseResult<T> = std::result::Result<T, String>;

impl Parser {
    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn bump(&mut self) -> Token {
        let tok = self.peek().clone();
        self.pos += 1;
        tok
    }

    fn parse_or(&mut self) -> ParseResult<Cond> {
        let mut left = self.parse_and()?;
        while *self.peek() == Token::Or {
            self.bump();
            let right = self.parse_and()?;
            left = Cond::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> ParseResult<Cond> {
        let mut left = self.parse_not()?;
        while *self.peek() == Token::And {
            self.bump();
            let right = self.parse_not()?;
            left = Cond::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> ParseResult<Cond> {
        match self.peek() {
            Token::Bang => {
                self.bump();
                Ok(Cond::Not(Box::new(self.parse_not()?)))
            }
            Token::LParen => {
                self.bump();
                let inner = self.parse_or()?;
                match self.bump() {
                    Token::RParen => Ok(inner),
                    other => Err(format!("expected ')', found {other:?}")),
                }
            }
            _ => self.parse_comparison(),
        }
    }

    fn parse_operand(&mut self) -> ParseResult<Operand> {
        match self.bump() {
            Token::Str(s) => Ok(Operand::Literal(s)),
            Token::Word(w) => Ok(Operand::Word(w)),
            Token::Eof => Err("unexpected end of condition".into()),
            other => Err(format!("expected an operand, found {other:?}")),
        }
    }

    fn parse_comparison(&mut self) -> ParseResult<Cond> {
        let left = self.parse_operand()?;
        let equal = match self.peek() {
            Token::Eq => true,
            Token::Ne => false,
            _ => return Ok(Cond::Truthy(left)),
        };
        self.bump();
        let right = self.parse_operand()?;
        Ok(Cond::Compare { left, right, equal })
    }
}

fn parse(src: &str) -> ParseResult<Cond> {
    let tokens = Lexer::new(src).tokenize()?;
    let mut p = Parser { tokens, pos: 0 };
    let cond = p.parse_or()?;
    match p.peek() {
        Token::Eof => Ok(cond),
        other => Err(format!("unexpected {other:?} after condition")),
    }
}

// ── Evaluation ────────────────────────────────────────────────────────────────

/// Split `name[i]` into its parts.  Anything else is a plain name.
fn split_index(word: &str) -> (&str, usize) {
    if let Some(open) = word.find('[') {
        if let Some(idx) = word[open + 1..].strip_suffix(']').and_then(|i| i.parse().ok()) {
            return (&word[..open], idx);
        }
    }
    (word, 0)
}

fn operand_value(op: &Operand, ctx: &dyn CondContext) -> String {
    match op {
        Operand::Literal(s) => s.clone(),
        Operand::Word(w) => {
            let (name, index) = split_index(w);
            ctx.lookup(name, index).unwrap_or_else(|| w.clone())
        }
    }
}

fn eval(cond: &Cond, ctx: &dyn CondContext) -> bool {
    match cond {
        Cond::Or(a, b) => eval(a, ctx) || eval(b, ctx),
        Cond::And(a, b) => eval(a, ctx) && eval(b, ctx),
        Cond::Not(c) => !eval(c, ctx),
        Cond::Compare { left, right, equal } => {
            (operand_value(left, ctx) == operand_value(right, ctx)) == *equal
        }
        Cond::Truthy(Operand::Literal(s)) => !s.is_empty(),
        Cond::Truthy(Operand::Word(w)) => {
            let (name, index) = split_index(w);
            ctx.lookup(name, index).is_some()
        }
    }
}

/// Parse and evaluate a condition.
pub fn evaluate(src: &str, ctx: &dyn CondContext) -> Result<bool> {
    let cond = parse(src).map_err(|message| Error::Condition { expr: src.to_owned(), message })?;
    Ok(eval(&cond, ctx))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Vars(HashMap<&'static str, Vec<&'static str>>);

    impl CondContext for Vars {
        fn lookup(&self, name: &str, index: usize) -> Option<String> {
            self.0
                .get(name)
                .map(|vals| vals.get(index).map(|v| (*v).to_owned()).unwrap_or_default())
        }
    }

    fn ctx() -> Vars {
        let mut m = HashMap::new();
        m.insert("A", vec!["1"]);
        m.insert("B", vec!["1"]);
        m.insert("C", vec!["2"]);
        m.insert("LIST", vec!["x", "y"]);
        m.insert("EMPTY", vec![""]);
        Vars(m)
    }

    fn ev(s: &str) -> bool {
        evaluate(s, &ctx()).unwrap()
    }

    #[test]
    fn equality() {
        assert!(ev("A == B"));
        assert!(!ev("A == C"));
        assert!(ev("A != C"));
        assert!(ev("A == \"1\""));
        assert!(ev("A==B"));
    }

    #[test]
    fn unbound_words_are_literal() {
        assert!(ev("hello == \"hello\""));
        assert!(ev("C == 2"));
        assert!(!ev("NOPE == A"));
    }

    #[test]
    fn bare_words_test_binding() {
        assert!(ev("A"));
        assert!(ev("EMPTY"));
        assert!(!ev("NOPE"));
        assert!(ev("!NOPE"));
    }

    #[test]
    fn bare_literals_test_emptiness() {
        assert!(ev("\"x\""));
        assert!(!ev("\"\""));
    }

    #[test]
    fn indexing() {
        assert!(ev("LIST[1] == y"));
        assert!(ev("LIST[5] == \"\""));
        assert!(ev("LIST == x"));
    }

    #[test]
    fn precedence_and_grouping() {
        // && binds tighter than ||
        assert!(ev("A == C && NOPE || A == B"));
        assert!(!ev("A == C && (NOPE || A == B)"));
        assert!(ev("!(A == C) && (C == 2 || A == C)"));
        assert!(ev("!!A"));
    }

    #[test]
    fn syntax_errors() {
        for bad in ["", "A ==", "(A == B", "A = B", "A == B)", "\"open", "A B"] {
            assert!(
                matches!(evaluate(bad, &ctx()), Err(Error::Condition { .. })),
                "{bad:?} should fail"
            );
        }
    }
}
