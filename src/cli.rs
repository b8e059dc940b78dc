use clap::{Args, Parser, Subcommand, ValueHint};
use std::path::PathBuf;

/// Demand-model pipeline CLI (argument schema only)
#[derive(Parser, Debug)]
#[command(name = "demandmap", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch raw features for every configured region
    Download(DownloadArgs),

    /// Transform raw artifacts into the sink datasets
    Process(ProcessArgs),
}

#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// Configuration file (region list + tuning knobs)
    #[arg(short, long, value_hint = ValueHint::FilePath, default_value = "config.json")]
    pub config: PathBuf,

    /// Directory receiving raw per-region artifacts
    #[arg(long, value_hint = ValueHint::DirPath, default_value = "raw-data")]
    pub raw_dir: PathBuf,
}

#[derive(Args, Debug)]
pub struct ProcessArgs {
    /// Configuration file (region list + tuning knobs)
    #[arg(short, long, value_hint = ValueHint::FilePath, default_value = "config.json")]
    pub config: PathBuf,

    /// Directory holding raw per-region artifacts
    #[arg(long, value_hint = ValueHint::DirPath, default_value = "raw-data")]
    pub raw_dir: PathBuf,

    /// Output sink directory
    #[arg(short, long, value_hint = ValueHint::DirPath, default_value = "processed-data")]
    pub out: PathBuf,
}
