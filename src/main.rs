//! `consul-backup` — snapshot a Consul KV store to disk and restore it.
//!
//! # Overview
//!
//! Backup lists every key in the store and mirrors the keyspace as a
//! directory tree: key `app/db/url` becomes the file `data/app/db/url`
//! holding the raw value.  Restore does the reverse: it wipes the store and
//! puts one key per file found under the snapshot directory.
//!
//! # Usage
//!
//! ```text
//! consul-backup -backup      # store → ./data
//! consul-backup -restore     # ./data → store (deletes every existing key first)
//! consul-backup -v           # print the version
//! ```
//!
//! # Module layout
//!
//! | Module                | Responsibility                                  |
//! |-----------------------|-------------------------------------------------|
//! | [`cli`]               | Argument types, flag normalisation, [`Mode`]    |
//! | [`config`]            | Layered TOML + environment configuration        |
//! | [`store`]             | `KvStore` trait, `KvPair`, store errors         |
//! | [`consul`]            | Blocking Consul HTTP client                     |
//! | [`snapshot`]          | Key ↔ path mapping, tree reset/write/walk       |
//! | [`ui`]                | Spinner, stage lines, summary banner            |
//! | [`commands::backup`]  | Backup pipeline                                 |
//! | [`commands::restore`] | Restore pipeline                                |
//!
//! # Exit codes
//!
//! `0` on success (and for `-v` / `--help`), `1` for a usage error, `2` when
//! configuration, the store or the filesystem fails.

mod cli;
mod commands;
mod config;
mod consul;
mod snapshot;
mod store;
mod ui;

use std::{io::IsTerminal, path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use cli::{Cli, Mode};
use console::style;
use consul::ConsulClient;

const EXIT_USAGE: u8 = 1;
const EXIT_FAILURE: u8 = 2;

fn main() -> ExitCode {
    let cli = match Cli::try_parse_from(cli::normalize_args(std::env::args_os())) {
        Ok(cli) => cli,
        Err(e) => {
            // `--help` comes through here too and is not an error.
            let code = if e.use_stderr() { EXIT_USAGE } else { 0 };
            let _ = e.print();
            return ExitCode::from(code);
        },
    };

    let mode = match cli.mode() {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("{} {e}\n", style("error:").red().bold());
            eprintln!("{}", Cli::command().render_help());
            return ExitCode::from(EXIT_USAGE);
        },
    };

    init_tracing();

    match run(mode, &cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {e:#}", style("Error:").red().bold());
            ExitCode::from(EXIT_FAILURE)
        },
    }
}

/// Diagnostics go to stderr; stdout belongs to the stage UI.
fn init_tracing() {
    let is_tty = std::io::stderr().is_terminal();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_ansi(is_tty)
        .with_writer(std::io::stderr)
        .init();
}

fn run(mode: Mode, cli: &Cli) -> Result<()> {
    match mode {
        Mode::Version => println!("{}", cli::VERSION),
        Mode::Backup => {
            let (client, root) = prepare(cli)?;
            commands::backup::run(&client, &root)?;
        },
        Mode::Restore => {
            let (client, root) = prepare(cli)?;
            commands::restore::run(&client, &root)?;
        },
    }
    Ok(())
}

/// Load `.env` and the layered config, then build the client and resolve the
/// snapshot directory.
fn prepare(cli: &Cli) -> Result<(ConsulClient, PathBuf)> {
    // A missing .env is normal; real environment variables still win.
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "loaded .env");
    }

    let mut cfg = config::load_merged(
        config::global_config_path().as_deref(),
        &cli.config,
        |name| std::env::var(name).ok(),
    )?;
    if let Some(dir) = &cli.data_dir {
        cfg.snapshot.dir.clone_from(dir);
    }

    let client = ConsulClient::connect(&cfg.consul).context("connecting to Consul")?;
    Ok((client, cfg.snapshot.dir))
}
