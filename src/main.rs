mod cli;
mod commands;
mod config;
mod engine;
mod paths;
mod progress;
mod state;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;
use std::process::ExitCode;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    match run(&ctx, cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            ui::report_error(&e);
            ExitCode::FAILURE
        }
    }
}

fn run(ctx: &Context, cli: Cli) -> Result<()> {
    let file = cli.file.as_deref();

    match cli.command {
        Command::Plan => commands::plan::plan(ctx, file),
        Command::Apply(args) => commands::plan::apply(ctx, file, &args),
        Command::Refresh => commands::refresh::run(ctx),
        Command::Import { label, id } => commands::import::run(ctx, file, &label, &id),
        Command::Destroy { label, yes } => commands::destroy::run(ctx, label.as_deref(), yes),
        Command::Show { label } => commands::show::run(ctx, label.as_deref()),
        Command::Id(cmd) => commands::id::run(ctx, cmd),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "authpol", &mut io::stdout());
            Ok(())
        }
    }
}
