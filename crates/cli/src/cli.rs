use clap::Parser;
use clap_verbosity_flag::{Verbosity, WarnLevel};
use std::path::{Path, PathBuf};

/// Sedum: the desk companion's keeper
///
/// Sedum keeps the companion's memory durable across power loss and walks
/// the device down its sleep tiers when nobody is around, waking it the
/// moment presence returns.
#[derive(Debug, Parser, Clone)]
#[command(about, long_about, version)]
pub struct Cli {
    /// Path to configuration file.
    #[arg(short, long, value_parser = validate_file)]
    pub conffile: Option<PathBuf>,

    /// Directory holding the state file and its backup.
    ///
    /// Overrides the configured data directory.
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,

    /// Check the configuration and exit.
    #[arg(long)]
    pub validate: bool,

    /// Print the effective configuration as TOML and exit.
    #[arg(long)]
    pub print_config: bool,

    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,
}

/// Check if the file exists.
#[inline(always)]
fn validate_file(file: &str) -> Result<PathBuf, String> {
    let path = Path::new(file);
    if path.exists() {
        Ok(path.to_owned())
    } else {
        Err(format!("File not found: {:?}", path))
    }
}
