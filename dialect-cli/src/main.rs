//! Command-line driver for the dialect interpreter core (spec §6).
//!
//! Loads a program file and runs it, or falls back to an interactive
//! `]`-prompt REPL when no file is given. Everything renderer-shaped on
//! the CLI surface (`--scale`, `--composite-blur`, `--autosnap-*`, ...)
//! is parsed and threaded through to [`dialect_cli::TextRenderer`],
//! which logs the commands instead of rasterizing them; the pixel back
//! end itself is out of this crate's scope.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use dialect::interpreter::RunOutcome;
use dialect::Interpreter;
use dialect_cli::{RendererOptions, StdinSource, TextRenderer};

/// Runs a program written in the dialect, or starts an interactive session.
#[derive(Parser, Debug)]
#[command(name = "dialect-cli", version, about, long_about = None)]
struct Cli {
    /// Program file to load and run. Omit to start an interactive `]` session.
    program: Option<PathBuf>,

    /// Seconds to wait for INPUT/GET before raising an Input Timeout error.
    #[arg(long, default_value_t = 30)]
    input_timeout: u64,

    /// Seconds the whole run is allowed before it is stopped.
    #[arg(long)]
    exec_timeout: Option<u64>,

    /// Keep the renderer window open after the program ends.
    #[arg(long)]
    no_keep_open: bool,

    /// Close the renderer window automatically at program end.
    #[arg(long)]
    auto_close: bool,

    /// Take a renderer screenshot every N characters printed.
    #[arg(long)]
    autosnap_every: Option<u32>,

    /// Take a renderer screenshot when the program ends.
    #[arg(long)]
    autosnap_on_end: bool,

    /// Disable NTSC artifact-color synthesis in the renderer.
    #[arg(long)]
    no_artifact: bool,

    /// Apply a composite blur pass in the renderer.
    #[arg(long)]
    composite_blur: bool,

    /// Seconds to sleep after each executed statement.
    #[arg(long)]
    delay: Option<f64>,

    /// Integer scale factor for the renderer window.
    #[arg(long, default_value_t = 1)]
    scale: u32,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let _ = (cli.no_keep_open, cli.auto_close); // renderer window lifetime; no-op without a window.

    let renderer_options = RendererOptions {
        no_artifact: cli.no_artifact,
        composite_blur: cli.composite_blur,
        scale: cli.scale,
        autosnap_every: cli.autosnap_every,
        autosnap_on_end: cli.autosnap_on_end,
    };

    let mut interpreter = Interpreter::new(
        Box::new(TextRenderer::new(renderer_options)),
        Box::new(StdinSource::new()),
        Box::new(io::stdout()),
    );
    interpreter.input_timeout = Duration::from_secs(cli.input_timeout);
    interpreter.exec_timeout = cli.exec_timeout.map(Duration::from_secs);
    interpreter.statement_delay = cli.delay.map(Duration::from_secs_f64);

    match cli.program {
        Some(path) => run_file(&mut interpreter, &path),
        None => run_repl(&mut interpreter),
    }
}

fn run_file(interpreter: &mut Interpreter, path: &PathBuf) {
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("{}: {}", path.display(), e);
            std::process::exit(1);
        }
    };
    if let Err(kind) = interpreter.load_program(&text) {
        println!("SYNTAX ERROR\nDetail: {kind}");
        std::process::exit(0);
    }
    report(interpreter.run());
}

/// Interactive `]`-prompt session (spec §6): each entered line either
/// carries a leading line number (stored verbatim) or is an immediate
/// command (`RUN`, `LIST`, `NEW`) executed on the spot.
fn run_repl(interpreter: &mut Interpreter) {
    let stdin = io::stdin();
    loop {
        print!("]");
        let _ = io::stdout().flush();
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(_) => break,
        }
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            continue;
        }
        let first_char = trimmed.trim_start().chars().next();
        if first_char.is_some_and(|c| c.is_ascii_digit()) {
            if let Err(kind) = interpreter.enter_line(trimmed) {
                println!("SYNTAX ERROR\nDetail: {kind}");
            }
            continue;
        }
        let upper = trimmed.trim().to_ascii_uppercase();
        if upper == "RUN" {
            report(interpreter.run());
            continue;
        }
        if upper == "NEW" {
            interpreter.new_program();
            continue;
        }
        if let Some(rest) = upper.strip_prefix("LIST") {
            let (lo, hi) = parse_list_range(rest.trim());
            print!("{}", interpreter.list(lo, hi));
            continue;
        }
        println!("SYNTAX ERROR");
    }
}

/// Parses `LIST`'s optional argument (spec §4.F): nothing (whole
/// program), a single line number, or a `lo-hi` range with either
/// endpoint optionally omitted.
fn parse_list_range(arg: &str) -> (Option<u32>, Option<u32>) {
    if arg.is_empty() {
        return (None, None);
    }
    match arg.split_once('-') {
        Some((lo, hi)) => (lo.trim().parse().ok(), hi.trim().parse().ok()),
        None => {
            let n = arg.parse().ok();
            (n, n)
        }
    }
}

/// Reports a [`RunOutcome`] the way spec §4.H/§7 describe (a program
/// ending, stopping, or hitting an uncaught error are all clean exits
/// from the host's point of view; only file-not-found and similar host
/// errors exit non-zero).
fn report(outcome: RunOutcome) {
    match outcome {
        RunOutcome::Ended => {}
        RunOutcome::Stopped(line) => println!("BREAK IN {line}"),
        RunOutcome::UncaughtError(msg) => println!("{msg}"),
        RunOutcome::Timeout => println!("EXECUTION TIMEOUT"),
        RunOutcome::Cancelled => println!("BREAK"),
    }
}
