//! Command-line argument parsing.
//!
//! Usage:
//!   prebyte [options] [<input>]
//!
//! Without an input file (or with `-`) the document is read from stdin.

use std::path::PathBuf;

use crate::rules::{DebugLevel, Rules, RULE_NAMES};
use crate::var::VarTable;

// ── Public types ──────────────────────────────────────────────────────────────

/// What the invocation asks for.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    #[default]
    Process,
    Help,
    Version,
    Explain,
    ListRules,
    ListVariables,
}

/// Parsed command-line arguments.
#[derive(Debug, Default)]
pub struct CliArgs {
    pub command: Command,
    /// Input document; `None` reads stdin.
    pub input: Option<PathBuf>,
    /// Output file (`-o`); `None` writes stdout.
    pub output: Option<PathBuf>,
    /// Settings file (`-s`); `None` searches `~/.prebyte/`.
    pub settings: Option<PathBuf>,
    /// Profiles to apply (`-p`, `-P<name>`), in order.
    pub profiles: Vec<String>,
    /// Variable defines (`-d`, `-D<k=v>`), in order.
    pub defines: Vec<String>,
    /// Tokens to ignore (`-i`).
    pub ignore: Vec<String>,
    /// Rule assignments (`-r`).
    pub rules: Vec<String>,
    /// Log level pinned by a log flag.
    pub log_level: Option<DebugLevel>,
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parse `std::env::args()` and return [`CliArgs`] or an error message.
pub fn parse_args() -> Result<CliArgs, String> {
    let raw: Vec<String> = std::env::args().collect();
    parse_argv(raw.get(1..).unwrap_or(&[]))
}

/// Parse a slice of argument strings (exposed for testing).
pub fn parse_argv(argv: &[String]) -> Result<CliArgs, String> {
    let mut args = CliArgs::default();
    let mut positional: Vec<String> = Vec::new();
    let mut i = 0;

    // Value of a flag that takes the next argument.
    let value_of = |i: &mut usize, flag: &str| -> Result<String, String> {
        *i += 1;
        argv.get(*i).cloned().ok_or_else(|| format!("{flag} requires an argument"))
    };

    while i < argv.len() {
        let arg = argv[i].as_str();

        // `--` ends flag processing.
        if arg == "--" {
            positional.extend(argv[i + 1..].iter().cloned());
            break;
        }

        // Non-flag argument (`-` is stdin).
        if !arg.starts_with('-') || arg == "-" {
            positional.push(arg.to_owned());
            i += 1;
            continue;
        }

        match arg {
            "-h" | "--help" => args.command = Command::Help,
            "-v" | "--version" => args.command = Command::Version,
            "-e" | "--explain" => args.command = Command::Explain,
            "-lsr" | "--list-rules" => args.command = Command::ListRules,
            "-lsv" | "--list-variables" => args.command = Command::ListVariables,

            "-o" | "--output" => args.output = Some(PathBuf::from(value_of(&mut i, arg)?)),
            "-s" | "--settings" => args.settings = Some(PathBuf::from(value_of(&mut i, arg)?)),
            "-r" | "--rule" => args.rules.push(value_of(&mut i, arg)?),
            "-i" | "--ignore" => args.ignore.push(value_of(&mut i, arg)?),
            "-p" | "--profile" => args.profiles.push(value_of(&mut i, arg)?),
            "-d" | "--define" => args.defines.push(value_of(&mut i, arg)?),

            "--trace" => args.log_level = Some(DebugLevel::Trace),
            "--debug" | "-X" => args.log_level = Some(DebugLevel::Debug),
            "--info" => args.log_level = Some(DebugLevel::Info),
            "--warn" | "--warning" => args.log_level = Some(DebugLevel::Warning),
            "--error" | "--err" => args.log_level = Some(DebugLevel::Error),
            "--off" => args.log_level = Some(DebugLevel::Off),

            // -P<name>
            _ if arg.starts_with("-P") => {
                let name = &arg[2..];
                if name.is_empty() {
                    return Err("-P requires a profile name, e.g. -Pdev".to_owned());
                }
                args.profiles.push(name.to_owned());
            }
            // -D<name>=<value>
            _ if arg.starts_with("-D") => {
                let define = &arg[2..];
                if define.is_empty() {
                    return Err("-D requires a definition, e.g. -DNAME=value".to_owned());
                }
                args.defines.push(define.to_owned());
            }

            _ => return Err(format!("unknown option: {arg}")),
        }
        i += 1;
    }

    match positional.len() {
        0 => {}
        1 => {
            let input = positional.remove(0);
            if input != "-" {
                args.input = Some(PathBuf::from(input));
            }
        }
        n => return Err(format!("too many arguments ({n}); expected at most one input file")),
    }

    Ok(args)
}

// ── Meta output ───────────────────────────────────────────────────────────────

pub const USAGE: &str = "\
Usage: prebyte [options] [<input>]

Reads <input> (or stdin) and writes the expanded text to stdout.

Options:
  -o, --output <file>       Write output to <file>
  -s, --settings <file>     Use this settings file instead of ~/.prebyte/settings.*
  -p, --profile <name>      Apply a profile (also -P<name>)
  -d, --define <k=v>        Define a variable (also -D<k=v>; k=[a,b] for arrays;
                            a bare path injects a file of variables)
  -i, --ignore <token>      Leave <token> unexpanded (it expands to nothing)
  -r, --rule <k=v>          Set a rule
  -h, --help                Show this help message
  -v, --version             Show version information
  -e, --explain             Explain the template language
  -lsr, --list-rules        List rules and their current values
  -lsv, --list-variables    List defined variables
  --trace | --debug | -X | --info | --warn | --error | --off
                            Set the log level
";

pub const EXPLAIN: &str = "\
Tokens are written %%...%% (delimiters set by the variable_prefix and
variable_suffix rules).  A token of the form %%#... runs to the end of the line.

  %%name%%  %%name[i]%%           variable value (arrays are indexed from 0)
  %%$NAME%%                       environment variable (allow_env rule)
  %%__DATE__%% %%__FILE__%% ...   built-in values
  %%set var NAME=VALUE%%          bind a variable (NAME=[a,b] binds an array)
  %%set rule NAME=VALUE%%         change a rule
  %%set profile NAME%%            apply a profile
  %%set ignore TOKEN%%  %%unset ignore TOKEN%%  %%unset var NAME%%
  %%if COND%% ... %%elif COND%% ... %%else%% ... %%endif%%
      COND: a == b, a != b, &&, ||, !, ( ); a bare name is true if bound
  %%for item in LIST%% ... %%endfor%%
  %%define macro NAME%% ... %%enddef%%   then   %%exec NAME arg \"quoted\" LIST#%%
      inside a macro, %%ARGS[i]%% is the i-th argument
  %%define profile NAME [yaml|json|toml|ini|env|csv|xml]%%
      ... %%enddef%%
  %%include path%%                searched as given, then in include_path
";

/// Output of the commands that need no settings or engine state.
pub fn static_output(command: Command) -> Option<String> {
    match command {
        Command::Help => Some(USAGE.to_owned()),
        Command::Version => Some(format!("Prebyte Version: {}\n", env!("CARGO_PKG_VERSION"))),
        Command::Explain => Some(EXPLAIN.to_owned()),
        Command::Process | Command::ListRules | Command::ListVariables => None,
    }
}

/// Every rule with its current value, one per line.
pub fn format_rules(rules: &Rules) -> String {
    let mut out = String::new();
    for name in RULE_NAMES {
        let value = rules.describe(name).unwrap_or_default();
        out.push_str(&format!("{name}: {value}\n"));
    }
    out
}

/// Defined variables sorted by name: `name = value` or `name = [a, b]`.
pub fn format_variables(vars: &VarTable) -> String {
    if vars.is_empty() {
        return "No variables defined.\n".to_owned();
    }
    let mut out = String::new();
    for (name, values) in vars.sorted() {
        match values {
            [single] => out.push_str(&format!("{name} = {single}\n")),
            many => out.push_str(&format!("{name} = [{}]\n", many.join(", "))),
        }
    }
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|&s| s.to_owned()).collect()
    }

    #[test]
    fn empty_args_read_stdin() {
        let a = parse_argv(&argv(&[])).unwrap();
        assert_eq!(a.command, Command::Process);
        assert_eq!(a.input, None);
        assert_eq!(a.output, None);
    }

    #[test]
    fn input_and_output() {
        let a = parse_argv(&argv(&["in.txt", "-o", "out.txt"])).unwrap();
        assert_eq!(a.input, Some(PathBuf::from("in.txt")));
        assert_eq!(a.output, Some(PathBuf::from("out.txt")));
        let a = parse_argv(&argv(&["-"])).unwrap();
        assert_eq!(a.input, None);
    }

    #[test]
    fn meta_commands() {
        assert_eq!(parse_argv(&argv(&["-h"])).unwrap().command, Command::Help);
        assert_eq!(parse_argv(&argv(&["--version"])).unwrap().command, Command::Version);
        assert_eq!(parse_argv(&argv(&["-e"])).unwrap().command, Command::Explain);
        assert_eq!(parse_argv(&argv(&["-lsr"])).unwrap().command, Command::ListRules);
        assert_eq!(parse_argv(&argv(&["--list-variables"])).unwrap().command, Command::ListVariables);
    }

    #[test]
    fn repeated_options_keep_order() {
        let a = parse_argv(&argv(&[
            "-p", "a", "-Pb", "-d", "X=1", "-DY=[1,2]", "-i", "SKIP", "-r", "trim_end=true",
        ]))
        .unwrap();
        assert_eq!(a.profiles, ["a", "b"]);
        assert_eq!(a.defines, ["X=1", "Y=[1,2]"]);
        assert_eq!(a.ignore, ["SKIP"]);
        assert_eq!(a.rules, ["trim_end=true"]);
    }

    #[test]
    fn log_flags() {
        assert_eq!(parse_argv(&argv(&["-X"])).unwrap().log_level, Some(DebugLevel::Debug));
        assert_eq!(parse_argv(&argv(&["--warning"])).unwrap().log_level, Some(DebugLevel::Warning));
        assert_eq!(parse_argv(&argv(&["--off"])).unwrap().log_level, Some(DebugLevel::Off));
    }

    #[test]
    fn missing_values() {
        assert!(parse_argv(&argv(&["-o"])).is_err());
        assert!(parse_argv(&argv(&["-P"])).is_err());
        assert!(parse_argv(&argv(&["-D"])).is_err());
    }

    #[test]
    fn settings_path() {
        let a = parse_argv(&argv(&["-s", "conf.yaml"])).unwrap();
        assert_eq!(a.settings, Some(PathBuf::from("conf.yaml")));
    }

    #[test]
    fn too_many_positional() {
        assert!(parse_argv(&argv(&["a", "b"])).is_err());
    }

    #[test]
    fn unknown_flag() {
        assert!(parse_argv(&argv(&["-z"])).is_err());
        assert!(parse_argv(&argv(&["--nope"])).is_err());
    }

    #[test]
    fn double_dash_ends_flags() {
        let a = parse_argv(&argv(&["--", "-weird-name"])).unwrap();
        assert_eq!(a.input, Some(PathBuf::from("-weird-name")));
    }

    #[test]
    fn stateless_commands() {
        assert_eq!(static_output(Command::Help).as_deref(), Some(USAGE));
        assert!(static_output(Command::Version).unwrap().starts_with("Prebyte Version: "));
        assert!(static_output(Command::Explain).is_some());
        assert_eq!(static_output(Command::ListRules), None);
        assert_eq!(static_output(Command::ListVariables), None);
        assert_eq!(static_output(Command::Process), None);
    }

    #[test]
    fn rule_listing() {
        let text = format_rules(&Rules::default());
        assert!(text.contains("variable_prefix: %%\n"));
        assert!(text.contains("max_variable_length: no limit\n"));
        assert_eq!(text.lines().count(), RULE_NAMES.len());
    }

    #[test]
    fn variable_listing() {
        let mut vars = VarTable::new();
        assert_eq!(format_variables(&vars), "No variables defined.\n");
        vars.set("b", "2");
        vars.set_list("a", vec!["x".into(), "y".into()]);
        assert_eq!(format_variables(&vars), "a = [x, y]\nb = 2\n");
    }
}
