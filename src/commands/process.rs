use anyhow::Result;

use crate::cli::ProcessArgs;
use crate::config::Config;
use crate::pipeline::Pipeline;

pub fn run(cli: &crate::cli::Cli, args: &ProcessArgs) -> Result<()> {
    let config = Config::from_file(&args.config)?;

    if cli.verbose > 0 {
        eprintln!(
            "[process] {} regions: {} -> {}",
            config.regions.len(),
            args.raw_dir.display(),
            args.out.display()
        );
    }

    let pipeline = Pipeline::new(&config, &args.raw_dir, &args.out, cli.verbose);
    let totals = pipeline.process_all()?;

    println!(
        "Processed {} regions: {} buildings, {} neighborhoods, {} connections, population {}, jobs {}, movement {}",
        config.regions.len(),
        totals.buildings,
        totals.neighborhoods,
        totals.connections,
        totals.population,
        totals.jobs,
        totals.movement
    );
    Ok(())
}
