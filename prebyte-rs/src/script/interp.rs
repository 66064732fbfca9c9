//! Engine driver, action dispatcher and flow state machine.
//!
//! The [`Interpreter`] owns the persistent [`State`] plus the per-run
//! bookkeeping: the stack of if/elif/else frames, the macro-argument frames,
//! the include stack and the expansion depth.  One pass scans a text and
//! writes into a sink that is either the pass output or, while a `for` or
//! `define` body is open, a capture buffer holding the body unprocessed.
//!
//! Resolution order for an action:
//!
//! 1. ignore set
//! 2. built-ins (`__DATE__`, `__FILE__`, …)
//! 3. `ARGS[i]`
//! 4. bound variables (`name`, `name[i]`)
//! 5. directives
//! 6. environment (`$NAME`, or any name with `allow_env_fallback`)
//! 7. `set_default_variables`
//! 8. strict error, or the token re-emitted unchanged

use std::path::{Path, PathBuf};

use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::format::Format;
use crate::profile::{Profile, UnknownKeys};
use crate::rules::expand_tilde;

use super::builtins::{self, BuiltinContext};
use super::cond::{self, CondContext};
use super::directive::{split_for_header, Directive};
use super::resolve::{resolve_variable, split_indexed, tokenize_args};
use super::scan::{Action, Delimiters, Scanner, Segment};
use super::state::State;

/// Maximum nesting of passes (for bodies, macro calls, includes).
pub const MAX_DEPTH: usize = 128;

// ── Flow frames ───────────────────────────────────────────────────────────────

/// One open `if` chain.
#[derive(Debug, Clone, Copy)]
struct CondFrame {
    /// Some branch of this chain has already run (or none may run).
    taken: bool,
    /// The current branch is producing output.
    active: bool,
}

// ── Output sink ───────────────────────────────────────────────────────────────

#[derive(Debug)]
enum Capture {
    For { header: String, nesting: usize },
    Macro { name: String },
    Profile { name: String, format: Option<String> },
}

impl Capture {
    fn keyword(&self) -> &'static str {
        match self {
            Capture::For { .. } => "for",
            Capture::Macro { .. } | Capture::Profile { .. } => "define",
        }
    }
}

#[derive(Debug)]
enum Sink {
    Direct,
    Capture { kind: Capture, body: String },
}

/// Output state of one pass over a text.
struct Pass {
    out: String,
    sink: Sink,
}

impl Pass {
    fn new() -> Self {
        Pass { out: String::new(), sink: Sink::Direct }
    }

    fn open(&mut self, kind: Capture) {
        trace!(capture = kind.keyword(), "capture opened");
        self.sink = Sink::Capture { kind, body: String::new() };
    }

    fn capturing(&self) -> bool {
        matches!(self.sink, Sink::Capture { .. })
    }
}

fn first_word(text: &str) -> &str {
    text.split_whitespace().next().unwrap_or("")
}

// ── Interpreter ───────────────────────────────────────────────────────────────

pub struct Interpreter {
    pub state: State,
    frames: Vec<CondFrame>,
    args: Vec<Vec<String>>,
    /// Canonical paths of the includes being expanded, innermost last.
    includes: Vec<PathBuf>,
    input_file: Option<PathBuf>,
    input_canonical: Option<PathBuf>,
    depth: usize,
    delims: Delimiters,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(State::new())
    }
}

impl Interpreter {
    pub fn new(state: State) -> Self {
        let delims = Delimiters::new(&state.rules.variable_prefix, &state.rules.variable_suffix);
        Interpreter {
            state,
            frames: Vec::new(),
            args: Vec::new(),
            includes: Vec::new(),
            input_file: None,
            input_canonical: None,
            depth: 0,
            delims,
        }
    }

    /// Expand a whole document.  `file` is the document's path, if it came
    /// from one; it feeds the `__FILE__` family and the include cycle check.
    pub fn run(&mut self, text: &str, file: Option<&Path>) -> Result<String> {
        self.frames.clear();
        self.args.clear();
        self.includes.clear();
        self.depth = 0;
        self.input_file = file.map(Path::to_path_buf);
        self.input_canonical = file.and_then(|p| std::fs::canonicalize(p).ok());

        let out = self.expand(text)?;
        if !self.frames.is_empty() {
            warn!(open = self.frames.len(), "'if' left open at end of input");
        }
        Ok(out)
    }

    fn expand(&mut self, text: &str) -> Result<String> {
        if self.depth >= MAX_DEPTH {
            return Err(Error::RecursionLimit(MAX_DEPTH));
        }
        self.depth += 1;
        let result = self.expand_pass(text);
        self.depth -= 1;
        result
    }

    fn expand_pass(&mut self, text: &str) -> Result<String> {
        let mut scanner = Scanner::new(text);
        let mut pass = Pass::new();

        loop {
            self.refresh_delimiters();
            let Some(segment) = scanner.next_segment(&self.delims)? else { break };
            match segment {
                Segment::Literal(s) => self.emit(&mut pass, s),
                Segment::Action(action) => self.action(&mut pass, &action)?,
            }
        }

        if let Sink::Capture { kind, .. } = &pass.sink {
            return Err(Error::Unterminated(kind.keyword()));
        }
        Ok(pass.out)
    }

    fn refresh_delimiters(&mut self) {
        let rules = &self.state.rules;
        if !self.delims.is_for(&rules.variable_prefix, &rules.variable_suffix) {
            self.delims = Delimiters::new(&rules.variable_prefix, &rules.variable_suffix);
        }
    }

    fn active(&self) -> bool {
        self.frames.last().map_or(true, |f| f.active)
    }

    fn emit(&self, pass: &mut Pass, text: &str) {
        match &mut pass.sink {
            Sink::Capture { body, .. } => body.push_str(text),
            Sink::Direct if self.active() => pass.out.push_str(text),
            Sink::Direct => {}
        }
    }

    fn current_file(&self) -> Option<&Path> {
        self.includes.last().or(self.input_file.as_ref()).map(PathBuf::as_path)
    }

    // ── Actions ───────────────────────────────────────────────────────────────

    fn action(&mut self, pass: &mut Pass, action: &Action<'_>) -> Result<()> {
        if pass.capturing() {
            return self.capture_action(pass, action);
        }
        if !self.active() {
            // Only the if-chain stays live while suppressed.
            if let Some(d) = Directive::parse(action.text)? {
                if d.is_conditional() {
                    self.flow(pass, d)?;
                }
            }
            return Ok(());
        }
        let text = self.dispatch(pass, action)?;
        self.emit(pass, &text);
        Ok(())
    }

    /// While capturing, every token goes into the body unevaluated except
    /// the one that closes the capture.
    fn capture_action(&mut self, pass: &mut Pass, action: &Action<'_>) -> Result<()> {
        let word = first_word(action.text);
        let closes = match &mut pass.sink {
            Sink::Direct => false,
            Sink::Capture { kind: Capture::For { nesting, .. }, .. } => {
                match word {
                    "for" => *nesting += 1,
                    "endfor" => *nesting -= 1,
                    _ => {}
                }
                *nesting == 0
            }
            Sink::Capture { .. } => word == "enddef",
        };
        if !closes {
            self.emit(pass, action.raw);
            return Ok(());
        }

        let Sink::Capture { kind, body } = std::mem::replace(&mut pass.sink, Sink::Direct) else {
            return Ok(());
        };
        let out = self.close_capture(kind, &body)?;
        self.emit(pass, &out);
        Ok(())
    }

    fn close_capture(&mut self, kind: Capture, body: &str) -> Result<String> {
        match kind {
            Capture::For { header, .. } => self.run_for(&header, body),
            Capture::Macro { name } => {
                self.state.define_macro(&name, body.to_owned());
                Ok(String::new())
            }
            Capture::Profile { name, format } => {
                self.define_profile(name, format.as_deref(), body)?;
                Ok(String::new())
            }
        }
    }

    fn dispatch(&mut self, pass: &mut Pass, action: &Action<'_>) -> Result<String> {
        let text = action.text;
        trace!(action = text, line = action.line, "dispatch");

        if self.state.ignore.contains(text) {
            return Ok(String::new());
        }

        if builtins::is_builtin(text) {
            let cx = BuiltinContext {
                started: &self.state.started,
                file: self.current_file(),
                line: action.line,
            };
            if let Some(value) = builtins::lookup(text, &cx) {
                return Ok(value);
            }
        }

        if text == "ARGS" || text.starts_with("ARGS[") {
            return self.macro_arg(text);
        }

        if self.state.vars.contains(text) {
            return resolve_variable(&self.state.vars, &self.state.rules, text, 0);
        }
        if let Some((name, index)) = split_indexed(text) {
            if self.state.vars.contains(name) {
                return resolve_variable(&self.state.vars, &self.state.rules, name, index.unwrap_or(0));
            }
        }

        if let Some(directive) = Directive::parse(text)? {
            return self.flow(pass, directive);
        }

        if let Some(value) = self.env_lookup(text) {
            return Ok(value);
        }

        let rules = &self.state.rules;
        if rules.set_default_variables {
            let default = rules.default_variable_value.clone();
            if self.state.vars.contains(&default) {
                return resolve_variable(&self.state.vars, &self.state.rules, &default, 0);
            }
            return Ok(default);
        }
        if rules.strict_variables {
            return Err(Error::UndefinedVariable(text.to_owned()));
        }
        Ok(action.raw.to_owned())
    }

    fn macro_arg(&self, text: &str) -> Result<String> {
        let frame = self.args.last().ok_or(Error::ArgsOutsideMacro)?;
        let Some((_, Some(index))) = split_indexed(text) else {
            return Err(Error::ArgsNotIndexed);
        };
        frame
            .get(index)
            .cloned()
            .ok_or(Error::ArgsIndex { index, len: frame.len() })
    }

    fn env_lookup(&self, text: &str) -> Option<String> {
        let rules = &self.state.rules;
        match text.strip_prefix('$') {
            Some(name) if rules.allow_env => std::env::var(name).ok(),
            _ if rules.allow_env_fallback => std::env::var(text).ok(),
            _ => None,
        }
    }

    // ── Flow state machine ────────────────────────────────────────────────────

    fn flow(&mut self, pass: &mut Pass, directive: Directive<'_>) -> Result<String> {
        trace!(directive = directive.keyword(), "flow");
        match directive {
            Directive::SetVar(arg) => self.state.set_var_assignment(arg)?,
            Directive::SetRule(arg) => self.state.set_rule_assignment(arg)?,
            Directive::SetProfile(name) => self.state.apply_profile(name)?,
            Directive::SetIgnore(token) => {
                self.state.ignore.insert(token.to_owned());
            }
            Directive::UnsetVar(name) => {
                self.state.vars.unset(name);
            }
            Directive::UnsetIgnore(token) => {
                self.state.ignore.remove(token);
            }
            Directive::DefineMacro(name) => pass.open(Capture::Macro { name: name.to_owned() }),
            Directive::DefineProfile { name, format } => pass.open(Capture::Profile {
                name: name.to_owned(),
                format: format.map(str::to_owned),
            }),
            Directive::EndDef => return Err(Error::UnmatchedEnddef),
            Directive::Exec { name, args } => return self.exec_macro(name, args),
            Directive::If(expr) => {
                let frame = if self.active() {
                    let hit = self.condition(expr)?;
                    CondFrame { taken: hit, active: hit }
                } else {
                    CondFrame { taken: true, active: false }
                };
                self.frames.push(frame);
            }
            Directive::Elif(expr) => {
                let taken = self.frames.last().ok_or(Error::BranchOutsideIf("elif"))?.taken;
                let hit = !taken && self.condition(expr)?;
                if let Some(frame) = self.frames.last_mut() {
                    frame.active = hit;
                    frame.taken |= hit;
                }
            }
            Directive::Else => {
                let frame = self.frames.last_mut().ok_or(Error::BranchOutsideIf("else"))?;
                frame.active = !frame.taken;
                frame.taken = true;
            }
            Directive::EndIf => {
                self.frames.pop().ok_or(Error::UnmatchedEndif)?;
            }
            Directive::For(header) => {
                pass.open(Capture::For { header: header.to_owned(), nesting: 1 })
            }
            Directive::EndFor => return Err(Error::UnmatchedEndfor),
            Directive::Include(path) => return self.include(path),
        }
        Ok(String::new())
    }

    fn condition(&self, expr: &str) -> Result<bool> {
        let hit = cond::evaluate(expr, self)?;
        trace!(expr, hit, "condition");
        Ok(hit)
    }

    fn run_for(&mut self, header: &str, body: &str) -> Result<String> {
        let (var, array) = split_for_header(header)?;
        let values = self
            .state
            .vars
            .get(array)
            .ok_or_else(|| Error::UndefinedArray(array.to_owned()))?
            .to_vec();
        trace!(var, array, count = values.len(), "for");

        let mut out = String::new();
        for value in values {
            self.state.vars.set(var, value);
            out.push_str(&self.expand(body)?);
        }
        Ok(out)
    }

    fn exec_macro(&mut self, name: &str, args: &str) -> Result<String> {
        let body = self
            .state
            .macros
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownMacro(name.to_owned()))?;
        let values = tokenize_args(args, &self.state.vars)?;
        trace!(name, args = ?values, "exec");

        self.args.push(values);
        let result = self.expand(&body);
        self.args.pop();
        result
    }

    fn define_profile(&mut self, name: String, format: Option<&str>, body: &str) -> Result<()> {
        let format = match format {
            Some(f) => Format::from_name(f)?,
            None => Format::default(),
        };
        let value = format
            .parse_str(body)
            .map_err(|e| Error::InvalidProfile { name: name.clone(), message: e.to_string() })?;

        let mut profile = Profile::new(name);
        if !value.is_null() {
            profile.merge_value(&value, UnknownKeys::Warn)?;
        }
        debug!(profile = %profile.name, %format, "profile defined");
        self.state.add_profile(profile);
        Ok(())
    }

    fn include(&mut self, target: &str) -> Result<String> {
        let path = self.resolve_include(target)?;
        if self.includes.contains(&path) || self.input_canonical.as_ref() == Some(&path) {
            return Err(Error::CircularInclude(path));
        }
        let text = std::fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
        debug!(path = %path.display(), "include");

        self.includes.push(path);
        let result = self.expand(&text);
        self.includes.pop();

        let out = result?;
        self.state.include_count += 1;
        Ok(out)
    }

    /// The path as given (relative to the working directory), else relative
    /// to the `include_path` rule.
    fn resolve_include(&self, target: &str) -> Result<PathBuf> {
        let direct = expand_tilde(target);
        let found = if direct.is_file() {
            direct
        } else {
            let fallback = self.state.rules.include_path.join(target);
            if !fallback.is_file() {
                return Err(Error::IncludeNotFound(target.to_owned()));
            }
            fallback
        };
        std::fs::canonicalize(&found).map_err(|e| Error::io(&found, e))
    }
}

impl CondContext for Interpreter {
    fn lookup(&self, name: &str, index: usize) -> Option<String> {
        let values = if name == "ARGS" {
            self.args.last().map(Vec::as_slice)
        } else {
            self.state.vars.get(name)
        }?;
        Some(values.get(index).cloned().unwrap_or_default())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn run(src: &str) -> Result<String> {
        Interpreter::default().run(src, None)
    }

    fn ok(src: &str) -> String {
        run(src).unwrap_or_else(|e| panic!("{src:?}: {e}"))
    }

    #[test]
    fn literal_text_unchanged() {
        assert_eq!(ok("hello\nworld"), "hello\nworld");
    }

    #[test]
    fn unknown_tokens_pass_through() {
        assert_eq!(ok("a %%NOPE%% b"), "a %%NOPE%% b");
    }

    #[test]
    fn set_then_use() {
        assert_eq!(ok("%%set var X=1%%[%%X%%]"), "[1]");
        assert_eq!(ok("%%#set var X=2\n%%X%%"), "2");
    }

    #[test]
    fn ignore_beats_variables() {
        assert_eq!(ok("%%set var X=1%%%%set ignore X%%[%%X%%]%%unset ignore X%%%%X%%"), "[]1");
    }

    #[test]
    fn if_elif_else_chain() {
        let src = "%%set var A=2%%%%if A == 1%%one%%elif A == 2%%two%%else%%other%%endif%%";
        assert_eq!(ok(src), "two");
        let src = "%%set var A=3%%%%if A == 1%%one%%elif A == 2%%two%%else%%other%%endif%%";
        assert_eq!(ok(src), "other");
        let src = "%%set var A=1%%%%if A == 1%%one%%elif A == 1%%again%%else%%other%%endif%%";
        assert_eq!(ok(src), "one");
    }

    #[test]
    fn suppressed_branch_has_no_side_effects() {
        let src = "%%if NOPE%%%%set var X=1%%%%endif%%%%X%%";
        assert_eq!(ok(src), "%%X%%");
    }

    #[test]
    fn nested_if_in_false_branch_cannot_activate() {
        let src = "%%if NOPE%%%%if \"x\"%%in%%else%%else%%endif%%out%%else%%yes%%endif%%";
        assert_eq!(ok(src), "yes");
    }

    #[test]
    fn flow_errors() {
        assert!(matches!(run("%%endif%%"), Err(Error::UnmatchedEndif)));
        assert!(matches!(run("%%else%%"), Err(Error::BranchOutsideIf("else"))));
        assert!(matches!(run("%%elif A%%"), Err(Error::BranchOutsideIf("elif"))));
        assert!(matches!(run("%%endfor%%"), Err(Error::UnmatchedEndfor)));
        assert!(matches!(run("%%enddef%%"), Err(Error::UnmatchedEnddef)));
        assert!(matches!(run("%%for x in L%%body"), Err(Error::Unterminated("for"))));
        assert!(matches!(run("%%define macro m%%body"), Err(Error::Unterminated("define"))));
    }

    #[test]
    fn unclosed_if_is_only_a_warning() {
        assert_eq!(ok("%%if \"x\"%%kept"), "kept");
    }

    #[test]
    fn for_loop_binds_and_keeps_last() {
        let src = "%%set var L=[a,b]%%%%for item in L%%[%%item%%]%%endfor%%|%%item%%";
        assert_eq!(ok(src), "[a][b]|b");
    }

    #[test]
    fn nested_for_loops() {
        let src = "%%set var A=[1,2]%%%%set var B=[x,y]%%\
                   %%for a in A%%%%for b in B%%%%a%%%%b%% %%endfor%%%%endfor%%";
        assert_eq!(ok(src), "1x 1y 2x 2y ");
    }

    #[test]
    fn for_errors() {
        assert!(matches!(run("%%for item in NOPE%%x%%endfor%%"), Err(Error::UndefinedArray(_))));
        assert!(matches!(run("%%for%%x%%endfor%%"), Err(Error::ForHeader(_))));
    }

    #[test]
    fn macro_with_args() {
        let src = "%%define macro greet%%Hi %%ARGS[0]%%!%%enddef%%%%exec greet \"World\"%%";
        assert_eq!(ok(src), "Hi World!");
    }

    #[test]
    fn macro_args_are_call_scoped() {
        let src = "%%define macro inner%%<%%ARGS[0]%%>%%enddef%%\
                   %%define macro outer%%%%ARGS[0]%%%%exec inner b%%%%ARGS[0]%%%%enddef%%\
                   %%exec outer a%%";
        assert_eq!(ok(src), "a<b>a");
    }

    #[test]
    fn macro_condition_on_args() {
        let src = "%%define macro m%%%%if ARGS[0] == yes%%Y%%else%%N%%endif%%%%enddef%%\
                   %%exec m yes%%%%exec m no%%";
        assert_eq!(ok(src), "YN");
    }

    #[test]
    fn args_errors() {
        assert!(matches!(run("%%ARGS[0]%%"), Err(Error::ArgsOutsideMacro)));
        let src = "%%define macro m%%%%ARGS%%%%enddef%%%%exec m a%%";
        assert!(matches!(run(src), Err(Error::ArgsNotIndexed)));
        let src = "%%define macro m%%%%ARGS[1]%%%%enddef%%%%exec m a%%";
        assert!(matches!(run(src), Err(Error::ArgsIndex { index: 1, len: 1 })));
        assert!(matches!(run("%%exec nope%%"), Err(Error::UnknownMacro(_))));
    }

    #[test]
    fn runaway_recursion_is_bounded() {
        let src = "%%define macro loop%%%%exec loop%%%%enddef%%%%exec loop%%";
        assert!(matches!(run(src), Err(Error::RecursionLimit(MAX_DEPTH))));
    }

    #[test]
    fn profile_block_then_apply() {
        let src = "%%#define profile p\nvariables:\n  a: 1\n%%#enddef\n%%set profile p%%%%a%%";
        assert_eq!(ok(src), "1");
    }

    #[test]
    fn profile_block_json_and_errors() {
        let src = "%%define profile p json%%{\"rules\": {\"trim_end\": true}}%%enddef%%";
        let mut interp = Interpreter::default();
        interp.run(src, None).unwrap();
        assert!(interp.state.profiles.contains_key("p"));
        assert!(matches!(run("%%set profile missing%%"), Err(Error::UnknownProfile(_))));
        let src = "%%define profile p json%%{oops%%enddef%%";
        assert!(matches!(run(src), Err(Error::InvalidProfile { .. })));
    }

    #[test]
    fn strict_and_defaults() {
        assert!(matches!(
            run("%%set rule strict_variables=true%%%%X%%"),
            Err(Error::UndefinedVariable(n)) if n == "X"
        ));
        assert_eq!(ok("%%set rule set_default_variables=true%%%%X%%"), "???");
        let src = "%%set var FALLBACK=fb%%%%set rule default_variable_value=FALLBACK%%\
                   %%set rule set_default_variables=true%%%%X%%";
        assert_eq!(ok(src), "fb");
    }

    #[test]
    fn environment_lookup() {
        std::env::set_var("PREBYTE_INTERP_TEST", "env!");
        assert_eq!(ok("%%$PREBYTE_INTERP_TEST%%"), "env!");
        assert_eq!(ok("%%PREBYTE_INTERP_TEST%%"), "%%PREBYTE_INTERP_TEST%%");
        let src = "%%set rule allow_env_fallback=true%%%%PREBYTE_INTERP_TEST%%";
        assert_eq!(ok(src), "env!");
        let src = "%%set rule allow_env=false%%%%$PREBYTE_INTERP_TEST%%";
        assert_eq!(ok(src), "%%$PREBYTE_INTERP_TEST%%");
    }

    #[test]
    fn delimiter_change_applies_to_next_token() {
        // The suffix rule is written with the new prefix and the old suffix.
        let src = "%%set var X=1%%%%#set rule variable_prefix={{\n{{set rule variable_suffix=}}%%{{X}} %%X%%";
        assert_eq!(ok(src), "1 %%X%%");
    }

    #[test]
    fn line_builtin_counts_pass_lines() {
        assert_eq!(ok("a\nb\n%%__LINE__%%"), "3");
    }
}
