// src/bin/loupe.rs

//! The `loupe` command-line entry point.

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use env_logger::{Env, Target};
use loupe::{
    cli::Cli,
    core::{session::Session, session_loop, settings::Settings},
    models::Stream,
    system::{multiplexer::Multiplexer, supervisor::ProcessSupervisor},
    ui::{input, terminal, viewer::Viewer},
};
use std::fs::{self, OpenOptions};

/// The main entry point of the `loupe` application.
/// Errors surface here after the terminal has been restored.
fn main() {
    if let Err(e) = run(Cli::parse()) {
        eprintln!("\n{}: {:#}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load().context("Failed to load settings")?;
    init_logging(&settings);
    log::debug!("CLI args parsed: {:?}", cli);

    let mut supervisor = ProcessSupervisor::spawn(&settings, &cli.command)?;
    log::info!(
        "Tracing '{}' (pid {}) in {}",
        supervisor.command_line(),
        supervisor.pid(),
        supervisor.workspace_dir().display()
    );

    let mux = Multiplexer::new(supervisor.cancellation_token());
    mux.attach_reader(Stream::Stdout, supervisor.take_stdout()?)?;
    mux.attach_reader(Stream::Stderr, supervisor.take_stderr()?)?;
    mux.attach_trace(supervisor.trace_channel())?;
    mux.attach_exit_watcher(supervisor.exit_watcher())?;
    let input_handle = mux.input_handle();
    let feed = mux.into_feed();

    let term = terminal::enter().context("Failed to set up the terminal")?;
    // Dropped before `feed` and `supervisor`: the screen is back before teardown waits.
    let _restore = scopeguard::guard((), |()| terminal::restore());
    input::spawn_reader(input_handle).context("Failed to start the input thread")?;

    let mut viewer = Viewer::new(term);
    let session = session_loop::run(
        &feed,
        Session::new(supervisor.command_line()),
        &mut viewer,
    )?;
    log::info!("Session closed with process status {:?}", session.status());
    Ok(())
}

/// Sends log output to the configured file, or to stderr if it can't be opened.
fn init_logging(settings: &Settings) {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("warn"));

    let path = match settings.resolve_log_path() {
        Ok(path) => path,
        Err(e) => {
            eprintln!("{}: {}", "Warning".yellow().bold(), e);
            None
        }
    };
    if let Some(path) = path {
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => {
                builder.target(Target::Pipe(Box::new(file)));
            }
            Err(e) => eprintln!(
                "{}: could not open log file '{}': {}",
                "Warning".yellow().bold(),
                path.display(),
                e
            ),
        }
    }
    builder.init();
}
