use anyhow::Result;

use crate::cli::DownloadArgs;
use crate::config::Config;
use crate::pipeline::Pipeline;

pub fn run(cli: &crate::cli::Cli, args: &DownloadArgs) -> Result<()> {
    let config = Config::from_file(&args.config)?;

    if cli.verbose > 0 {
        eprintln!("[download] {} regions -> {}", config.regions.len(), args.raw_dir.display());
    }

    let pipeline = Pipeline::new(&config, &args.raw_dir, &args.raw_dir, cli.verbose);
    pipeline.download_all()?;

    println!("Downloaded {} regions into {}", config.regions.len(), args.raw_dir.display());
    Ok(())
}
