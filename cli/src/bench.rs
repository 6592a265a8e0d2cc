use anyhow::{Context, Result};
use comfy_table::{presets::UTF8_BORDERS_ONLY, Cell, Table};
use human_repr::HumanDuration;
use prism_core::{run_benchmark, BenchmarkConfig, CrackMode, ReductionPolicy, Summary};

use crate::{rng_from_seed, Bench, ModeArg};

pub fn bench(args: Bench) -> Result<()> {
    let ctx = args.table.ctx()?;

    let mode = match args.mode {
        ModeArg::Exhaustive => CrackMode::Exhaustive,
        ModeArg::MonteCarlo => CrackMode::MonteCarlo {
            samples: args.samples,
        },
    };
    let config = BenchmarkConfig {
        startpoints: args
            .startpoints
            .unwrap_or_else(|| ctx.startpoints_for_alpha(args.alpha)),
        mode,
        trials: args.trials as usize,
    };

    let mut rng = rng_from_seed(args.rng_seed);
    let result = run_benchmark(&ctx, &config, &mut rng).context("The benchmark failed")?;

    let mut display_table = Table::new();
    display_table.load_preset(UTF8_BORDERS_ONLY);
    display_table.set_header(vec![
        "Trial",
        "Build time",
        "Chains",
        "Merged",
        "Cracked",
        "Success rate",
        "Theoretical",
        "Merge ratio",
        "Mean crack time",
        "Mean iterations",
    ]);

    for (i, trial) in result.trials.iter().enumerate() {
        let cracked = match trial.ground_truth {
            Some(ground_truth) => {
                format!("{}/{} (truth {ground_truth})", trial.cracked, trial.targets)
            }
            None => format!("{}/{}", trial.cracked, trial.targets),
        };

        display_table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(trial.build_time.as_secs_f64().human_duration()),
            Cell::new(trial.chains),
            Cell::new(trial.merges),
            Cell::new(cracked),
            Cell::new(format!(
                "{:.2}% ± {:.2}",
                trial.success_rate * 100.,
                trial.std_error * 100.
            )),
            Cell::new(format!("{:.2}%", trial.theoretical_coverage * 100.)),
            Cell::new(format!("{:.3}", trial.merge_ratio)),
            Cell::new(trial.crack_times.mean.human_duration()),
            Cell::new(format!("{:.1}", trial.iterations.mean)),
        ]);
    }

    println!(
        "{} {}, charset of {} characters, passwords up to {} characters ({} passwords), t = {}",
        ctx.hash_function,
        match ctx.reduction {
            ReductionPolicy::StepDependent => "step-dependent reduction",
            ReductionPolicy::Fixed => "fixed reduction",
        },
        ctx.charset.len(),
        ctx.max_password_length,
        ctx.password_space(),
        ctx.t
    );
    println!("{display_table}");

    print_summary("Success rate (%)", &result.success_rate, 100.);
    print_summary("Build time (s)", &result.build_time, 1.);
    print_summary("Merge ratio", &result.merge_ratio, 1.);

    Ok(())
}

fn print_summary(name: &str, summary: &Summary, scale: f64) {
    println!(
        "{name:<20} min {:.3}  max {:.3}  mean {:.3}  stdev {:.3}",
        summary.min * scale,
        summary.max * scale,
        summary.mean * scale,
        summary.stdev * scale
    );
}
