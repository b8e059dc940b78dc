use anyhow::Result;
use clap::Parser;

use demandmap::cli::{Cli, Commands};
use demandmap::commands::{download, process};

fn main() -> Result<()> {
    let cli = Cli::parse();
    match &cli.command {
        Commands::Download(args) => download::run(&cli, args),
        Commands::Process(args) => process::run(&cli, args),
    }
}
