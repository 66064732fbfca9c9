use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, level_filters::LevelFilter};
use tracing_subscriber::{fmt, prelude::*, reload, Registry};

use prebyte::cli::{self, CliArgs, Command};
use prebyte::config;
use prebyte::rules::DebugLevel;
use prebyte::script::LevelHook;
use prebyte::{Prebyte, Result};

fn main() {
    let args = match cli::parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("prebyte: {e}");
            eprintln!("Use -h or --help for usage.");
            std::process::exit(1);
        }
    };

    // ── Logging ───────────────────────────────────────────────────────────────
    // The level follows the debug_level rule unless a log flag pinned it.
    let initial = args.log_level.map(level_filter).unwrap_or(LevelFilter::ERROR);
    let (filter, handle) = reload::Layer::<LevelFilter, Registry>::new(initial);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();

    let mut engine = Prebyte::new();
    if args.log_level.is_none() {
        engine.set_level_hook(level_hook(handle));
    }

    if let Err(e) = run(&mut engine, &args) {
        eprintln!("prebyte: {e}");
        std::process::exit(1);
    }
}

fn run(engine: &mut Prebyte, args: &CliArgs) -> Result<()> {
    // Help, version and explain run before any settings are read.
    if let Some(text) = cli::static_output(args.command) {
        print!("{text}");
        return Ok(());
    }

    match &args.settings {
        Some(path) => engine.load_settings(path)?,
        None => {
            if let Some(path) = config::discover_settings() {
                engine.load_settings(&path)?;
            }
        }
    }
    for name in &args.profiles {
        engine.set_profile(name)?;
    }
    for define in &args.defines {
        engine.define(define)?;
    }
    for token in &args.ignore {
        engine.set_ignore(token);
    }
    for rule in &args.rules {
        engine.set_rule(rule)?;
    }

    match args.command {
        Command::ListRules => print!("Used Rules:\n\n{}", cli::format_rules(engine.rules())),
        Command::ListVariables => print!("{}", cli::format_variables(engine.variables())),
        _ => process(engine, args)?,
    }
    Ok(())
}

fn process(engine: &mut Prebyte, args: &CliArgs) -> Result<()> {
    let (out, input_bytes) = match &args.input {
        Some(path) => {
            let len = std::fs::metadata(path).map(|m| m.len() as usize).unwrap_or(0);
            (engine.process_file(path)?, len)
        }
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .map_err(|e| prebyte::Error::io(Path::new("<stdin>"), e))?;
            (engine.process(&text)?, text.len())
        }
    };
    debug!(input_bytes, output_bytes = out.len(), "processed");

    match &args.output {
        Some(path) => std::fs::write(path, &out).map_err(|e| prebyte::Error::io(path, e))?,
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(out.as_bytes())
                .and_then(|_| stdout.flush())
                .map_err(|e| prebyte::Error::io(Path::new("<stdout>"), e))?;
        }
    }

    report(engine, input_bytes, out.len());
    Ok(())
}

/// Benchmark summary on stderr, as selected by the `benchmark` rule.
fn report(engine: &Prebyte, input_bytes: usize, output_bytes: usize) {
    let mode = engine.rules().benchmark;
    if mode.reports_time() {
        if let Some(elapsed) = engine.last_elapsed() {
            eprintln!("Elapsed time: {:.3} ms", elapsed.as_secs_f64() * 1000.0);
        }
    }
    if mode.reports_memory() {
        eprintln!("Input size: {input_bytes} bytes");
        eprintln!("Output size: {output_bytes} bytes");
    }
    if mode.reports_time() || mode.reports_memory() {
        eprintln!("Includes processed: {}", engine.include_count());
    }
}

/// Route `debug_level` rule changes to the subscriber's reload handle.
fn level_hook(handle: reload::Handle<LevelFilter, Registry>) -> LevelHook {
    Arc::new(move |level| {
        if let Err(e) = handle.modify(|f| *f = level_filter(level)) {
            eprintln!("prebyte: cannot change log level: {e}");
        }
    })
}

fn level_filter(level: DebugLevel) -> LevelFilter {
    match level {
        DebugLevel::Off => LevelFilter::OFF,
        DebugLevel::Error => LevelFilter::ERROR,
        DebugLevel::Warning => LevelFilter::WARN,
        DebugLevel::Info => LevelFilter::INFO,
        DebugLevel::Debug => LevelFilter::DEBUG,
        DebugLevel::Trace => LevelFilter::TRACE,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
