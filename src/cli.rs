//! Command-line interface definition.
//!
//! All argument parsing lives here so the rest of the codebase can stay
//! agnostic to `clap`.  [`Cli`] is parsed once in `main`, validated into a
//! [`Mode`], and the mode is what drives dispatch.
//!
//! The tool historically took Go-style flags (`-backup`, `-restore`, `-v`).
//! [`normalize_args`] rewrites those into the double-dash spelling clap
//! expects, so both `-backup` and `--backup` work.

use std::{ffi::OsString, path::PathBuf};

use clap::Parser;
use thiserror::Error;

/// Printed by `-v`.
pub const VERSION: &str = concat!("v", env!("CARGO_PKG_VERSION"));

/// Long flags that may also be written with a single dash.
const LONG_FLAGS: [&str; 5] = ["backup", "restore", "version", "config", "data-dir"];

/// Top-level CLI arguments.
#[derive(Parser, Debug)]
#[command(
    name    = "consul-backup",
    about   = "Snapshot a Consul KV store into a directory tree, or restore it",
    version,
    disable_version_flag = true,
    after_help = "Exactly one of -v, -backup or -restore must be given.\n\
                  The store is located via Consul_Address / CONSUL_HTTP_ADDR and \
                  Consul_Token / CONSUL_HTTP_TOKEN.",
    // Show a compact two-column help layout.
    help_template = "\
{before-help}{name} {version}
{about}

{usage-heading} {usage}

{all-args}{after-help}"
)]
pub struct Cli {
    /// Print the version and exit.
    #[arg(short = 'v', long = "version")]
    pub version: bool,

    /// Back up every key into the snapshot directory.
    ///
    /// The snapshot directory is deleted and rebuilt from scratch on every
    /// run.
    #[arg(long)]
    pub backup: bool,

    /// Replace every key in the store with the snapshot directory.
    ///
    /// All existing keys are deleted before the snapshot is read.
    #[arg(long)]
    pub restore: bool,

    /// Path to the local configuration file.
    ///
    /// Missing files are fine; settings then come from the global config
    /// and the environment.
    #[arg(short, long, default_value = "consul-backup.toml")]
    pub config: PathBuf,

    /// Snapshot directory, overriding `[snapshot].dir`.
    #[arg(short, long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,
}

/// What this invocation should do.  Exactly one per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Version,
    Backup,
    Restore,
}

/// Mode flags were missing or combined.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UsageError {
    #[error("no mode given: pass one of -v, -backup or -restore")]
    NoMode,

    #[error("conflicting modes {}: pass exactly one", .0.join(", "))]
    Conflicting(Vec<&'static str>),
}

impl Cli {
    /// The single mode selected on the command line.
    pub fn mode(&self) -> Result<Mode, UsageError> {
        let selected: Vec<(Mode, &'static str)> = [
            (self.version, Mode::Version, "-v"),
            (self.backup, Mode::Backup, "-backup"),
            (self.restore, Mode::Restore, "-restore"),
        ]
        .into_iter()
        .filter(|(set, ..)| *set)
        .map(|(_, mode, flag)| (mode, flag))
        .collect();

        match selected.as_slice() {
            [] => Err(UsageError::NoMode),
            [(mode, _)] => Ok(*mode),
            many => Err(UsageError::Conflicting(
                many.iter().map(|(_, flag)| *flag).collect(),
            )),
        }
    }
}

/// Rewrite Go-style flags into clap's spelling.
///
/// `-backup` → `--backup`, `-config=x` → `--config=x`, `--v` → `-v`.
/// The program name, short flags, values and anything after `--` pass
/// through unchanged.
pub fn normalize_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut out = Vec::new();
    let mut passthrough = false;

    for (i, arg) in args.into_iter().enumerate() {
        let arg: OsString = arg.into();
        if i == 0 || passthrough {
            out.push(arg);
            continue;
        }
        let Some(s) = arg.to_str() else {
            out.push(arg);
            continue;
        };
        if s == "--" {
            passthrough = true;
            out.push(arg);
            continue;
        }

        let rewritten = if s == "--v" {
            Some("-v".to_string())
        } else if let Some(rest) = s.strip_prefix('-').filter(|r| !r.starts_with('-')) {
            let name = rest.split_once('=').map_or(rest, |(n, _)| n);
            LONG_FLAGS.contains(&name).then(|| format!("-{s}"))
        } else {
            None
        };

        out.push(rewritten.map_or(arg, OsString::from));
    }
    out
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(normalize_args(
            std::iter::once("consul-backup").chain(args.iter().copied()),
        ))
        .expect("arguments should parse")
    }

    fn normalized(args: &[&str]) -> Vec<String> {
        normalize_args(std::iter::once("prog").chain(args.iter().copied()))
            .into_iter()
            .skip(1)
            .map(|a| a.into_string().unwrap())
            .collect()
    }

    // ── normalize_args ────────────────────────────────────────────────────────

    #[test]
    fn go_style_flags_gain_a_dash() {
        insta::assert_debug_snapshot!(
            normalized(&["-backup", "-restore", "-version", "-config=x.toml", "-data-dir", "d"]),
            @r#"
        [
            "--backup",
            "--restore",
            "--version",
            "--config=x.toml",
            "--data-dir",
            "d",
        ]
        "#
        );
    }

    #[test]
    fn short_and_double_dash_flags_are_untouched() {
        assert_eq!(normalized(&["-v", "--backup", "-c", "f.toml"]), vec![
            "-v", "--backup", "-c", "f.toml"
        ]);
    }

    #[test]
    fn double_dash_v_becomes_short_v() {
        assert_eq!(normalized(&["--v"]), vec!["-v"]);
    }

    #[test]
    fn arguments_after_separator_pass_through() {
        assert_eq!(normalized(&["--", "-backup"]), vec!["--", "-backup"]);
    }

    #[test]
    fn program_name_is_never_rewritten() {
        let out = normalize_args(["-backup", "-backup"]);
        assert_eq!(out, vec![OsString::from("-backup"), OsString::from("--backup")]);
    }

    // ── mode ──────────────────────────────────────────────────────────────────

    #[test]
    fn each_flag_selects_its_mode() {
        assert_eq!(parse(&["-v"]).mode(), Ok(Mode::Version));
        assert_eq!(parse(&["-backup"]).mode(), Ok(Mode::Backup));
        assert_eq!(parse(&["-restore"]).mode(), Ok(Mode::Restore));
        assert_eq!(parse(&["--backup"]).mode(), Ok(Mode::Backup));
    }

    #[test]
    fn no_flag_is_a_usage_error() {
        assert_eq!(parse(&[]).mode(), Err(UsageError::NoMode));
    }

    #[test]
    fn backup_and_restore_together_is_a_usage_error() {
        assert_eq!(
            parse(&["-backup", "-restore"]).mode(),
            Err(UsageError::Conflicting(vec!["-backup", "-restore"]))
        );
    }

    #[test]
    fn version_with_another_mode_is_a_usage_error() {
        let err = parse(&["-v", "-backup"]).mode().unwrap_err();
        assert_eq!(err.to_string(), "conflicting modes -v, -backup: pass exactly one");
    }

    #[test]
    fn config_and_data_dir_do_not_count_as_modes() {
        let cli = parse(&["-backup", "-config", "other.toml", "-d", "snap"]);
        assert_eq!(cli.mode(), Ok(Mode::Backup));
        assert_eq!(cli.config, PathBuf::from("other.toml"));
        assert_eq!(cli.data_dir, Some(PathBuf::from("snap")));
    }

    #[test]
    fn config_defaults_to_local_toml() {
        assert_eq!(parse(&["-v"]).config, PathBuf::from("consul-backup.toml"));
    }

    #[test]
    fn version_string_is_v_prefixed_release() {
        assert_eq!(VERSION, "v0.0.1");
    }

    #[test]
    fn unknown_flag_is_rejected_by_clap() {
        let result = Cli::try_parse_from(normalize_args(["consul-backup", "-x"]));
        assert!(result.is_err());
    }
}
