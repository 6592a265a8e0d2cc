use std::time::Instant;

use anyhow::{Context, Result};
use human_repr::HumanDuration;
use prism_core::{
    seeds::validate_startpoints, BuildEvent, ChainBuilder, RainbowTable, RandomStartpoints,
    SimpleTable,
};
use tracing::{debug, info};

use crate::{print_trace, read_lines, rng_from_seed, Generate};

pub fn generate(args: Generate) -> Result<()> {
    let ctx = args.table.ctx()?;

    let startpoints = match &args.seeds {
        Some(path) => {
            let seeds = read_lines(path)?;
            validate_startpoints(&seeds, &ctx).context("Invalid startpoint")?
        }
        None => {
            let count = args
                .startpoints
                .unwrap_or_else(|| ctx.startpoints_for_alpha(args.alpha));
            let mut rng = rng_from_seed(args.rng_seed);
            RandomStartpoints::new(&mut rng, count, &ctx)?.collect()
        }
    };

    if args.trace {
        let builder = ChainBuilder::new(&ctx);
        for &startpoint in &startpoints {
            builder.build_traced(startpoint, &mut print_trace);
        }
    }

    info!(
        startpoints = startpoints.len(),
        space = ctx.password_space(),
        "generating the table"
    );

    let start = Instant::now();
    let startpoint_count = startpoints.len();
    let handle = SimpleTable::build_nonblocking(startpoints, ctx)?;

    while let Some(event) = handle.recv() {
        match event {
            BuildEvent::Batch {
                batch_number,
                batch_count,
                chains,
            } => debug!("running batch {batch_number}/{batch_count} of chains {chains:?}"),
            BuildEvent::Progress(progress) => info!("{progress:.1}%"),
        }
    }

    let table = handle.join()?;
    let duration = start.elapsed();

    table
        .store(&args.output)
        .context("Unable to store the generated rainbow table to the disk")?;

    println!(
        "Generated {} chains from {} startpoints ({} merged) in {}",
        table.len(),
        startpoint_count,
        startpoint_count - table.len(),
        duration.as_secs_f64().human_duration()
    );

    Ok(())
}
