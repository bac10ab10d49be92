use std::path::PathBuf;

use clap::{Parser, ValueHint};

#[derive(Parser, Debug, Clone)]
#[command(
    about = env!("CARGO_PKG_DESCRIPTION"),
    version = env!("CARGO_PKG_VERSION")
)]
pub struct Args {
    #[arg(
        long,
        value_name = "PATH",
        value_hint = ValueHint::FilePath,
        help = "Path to a TOML settings file; environment variables always override it (defaults to an optional config.toml)"
    )]
    pub config: Option<PathBuf>,
}
