// command-line surface: a thin driver over the library crate.

use std::path::PathBuf;

use clap::Parser;

use crate::snapshot::{DEFAULT_BIN_PATH, DEFAULT_JSON_PATH};

/// A virtual machine for the Synacor Challenge bytecode.
#[derive(Debug, Parser)]
#[command(name = "synacor-vm", version, about)]
pub struct Cli {
    /// Program image to load. Defaults to `challenge.bin`.
    #[arg(default_value = "challenge.bin")]
    pub image: PathBuf,

    /// Start with trace mode enabled.
    #[arg(short = 'd', long = "debug")]
    pub debug: bool,

    /// Boot from a previously written snapshot instead of `image`.
    #[arg(short = 'l', long = "load")]
    pub load: bool,

    /// Snapshot memory image path used with --load and Ctrl-S.
    #[arg(long = "snapshot-bin", default_value = DEFAULT_BIN_PATH)]
    pub snapshot_bin: PathBuf,

    /// Snapshot state path used with --load and Ctrl-S.
    #[arg(long = "snapshot-json", default_value = DEFAULT_JSON_PATH)]
    pub snapshot_json: PathBuf,

    /// Operator-facing log verbosity (independent of VM trace mode).
    #[arg(long = "log-level", default_value = "warn")]
    pub log_level: String,
}
