use std::{
    collections::HashSet,
    time::{Duration, Instant},
};

use rand::Rng;
use rayon::prelude::*;
use tracing::info;

use crate::{
    chain::ChainWalk,
    ctx::RainbowTableCtx,
    error::{ConfigError, PrismResult},
    rainbow_table::{RainbowTable, SimpleTable},
    reduction::counter_to_plaintext,
    seeds::RandomStartpoints,
    CompressedPassword, MAX_EXHAUSTIVE_SPACE,
};

/// How the targets of a benchmark trial are chosen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CrackMode {
    /// Every non-empty password of the space is a target.
    Exhaustive,
    /// `samples` distinct passwords drawn uniformly at random.
    MonteCarlo { samples: u64 },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BenchmarkConfig {
    /// Number of random startpoints drawn for every table.
    pub startpoints: u64,
    pub mode: CrackMode,
    /// Number of tables built and attacked.
    pub trials: usize,
}

/// Descriptive statistics of a set of measurements.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Summary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Sample standard deviation, 0 with less than two measurements.
    pub stdev: f64,
}

impl Summary {
    pub fn from_samples(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let count = samples.len() as f64;
        let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = samples.iter().sum::<f64>() / count;
        let stdev = if samples.len() < 2 {
            0.
        } else {
            let variance =
                samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (count - 1.);
            variance.sqrt()
        };

        Self {
            min,
            max,
            mean,
            stdev,
        }
    }
}

/// The measurements of a single table.
#[derive(Clone, Debug, PartialEq)]
pub struct TrialResult {
    pub build_time: Duration,
    /// Number of chains computed.
    pub chains: u64,
    /// Number of chains discarded because their endpoint was already stored.
    pub merges: u64,
    pub targets: u64,
    pub cracked: u64,
    /// Number of targets that appear in a stored chain, exhaustive mode only.
    pub ground_truth: Option<u64>,
    /// Wall time of every lookup, in seconds.
    pub crack_times: Summary,
    /// Hash and reduction calls of every lookup.
    pub iterations: Summary,
    pub success_rate: f64,
    /// Standard error of the success rate. Exhaustive trials measure the
    /// whole space, so it is 0.
    pub std_error: f64,
    /// `1 - exp(-m * t / N)`.
    pub theoretical_coverage: f64,
    /// Empirical success rate over theoretical coverage.
    pub merge_ratio: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BenchmarkResult {
    pub trials: Vec<TrialResult>,
    pub success_rate: Summary,
    /// Build times in seconds.
    pub build_time: Summary,
    pub merge_ratio: Summary,
}

/// Builds `config.trials` tables from random startpoints and attacks each of them.
pub fn run_benchmark<R: Rng + ?Sized>(
    ctx: &RainbowTableCtx,
    config: &BenchmarkConfig,
    rng: &mut R,
) -> PrismResult<BenchmarkResult> {
    if config.trials == 0 {
        return Err(ConfigError::Other("at least one trial is required".to_owned()).into());
    }
    if config.startpoints == 0 {
        return Err(ConfigError::Other("at least one startpoint is required".to_owned()).into());
    }
    match config.mode {
        CrackMode::MonteCarlo { samples: 0 } => {
            return Err(ConfigError::Other("the sample size cannot be 0".to_owned()).into())
        }
        CrackMode::Exhaustive if ctx.password_space() > MAX_EXHAUSTIVE_SPACE => {
            return Err(ConfigError::Other(format!(
                "the password space ({}) is too large for an exhaustive benchmark, \
                 the limit is {MAX_EXHAUSTIVE_SPACE}",
                ctx.password_space()
            ))
            .into())
        }
        _ => (),
    }

    let mut trials = Vec::with_capacity(config.trials);
    for trial in 1..=config.trials {
        let result = run_trial(ctx, config, rng)?;

        info!(
            trial,
            chains = result.chains,
            cracked = result.cracked,
            targets = result.targets,
            success_rate = result.success_rate,
            "trial done"
        );

        trials.push(result);
    }

    let summarize = |f: fn(&TrialResult) -> f64| {
        Summary::from_samples(&trials.iter().map(f).collect::<Vec<_>>())
    };

    Ok(BenchmarkResult {
        success_rate: summarize(|t| t.success_rate),
        build_time: summarize(|t| t.build_time.as_secs_f64()),
        merge_ratio: summarize(|t| t.merge_ratio),
        trials,
    })
}

fn run_trial<R: Rng + ?Sized>(
    ctx: &RainbowTableCtx,
    config: &BenchmarkConfig,
    rng: &mut R,
) -> PrismResult<TrialResult> {
    let startpoints: Vec<_> = RandomStartpoints::new(rng, config.startpoints, ctx)?.collect();
    let chains = startpoints.len() as u64;

    let start = Instant::now();
    let table = SimpleTable::build_compressed(&startpoints, ctx.clone())?;
    let build_time = start.elapsed();

    let (targets, ground_truth) = match config.mode {
        CrackMode::Exhaustive => {
            let targets: Vec<_> = (1..ctx.n).collect();
            let covered = covered_passwords(&table);
            let ground_truth = targets.iter().filter(|&t| covered.contains(t)).count() as u64;
            (targets, Some(ground_truth))
        }
        CrackMode::MonteCarlo { samples } => {
            (RandomStartpoints::new(rng, samples, ctx)?.collect(), None)
        }
    };

    let lookups: Vec<(bool, f64, f64)> = targets
        .par_iter()
        .map(|&target| {
            let password = counter_to_plaintext(target, ctx);
            let digest = ctx.hash_function.hash(&password);

            let start = Instant::now();
            let (found, stats) = table.search_with_stats(&digest);
            let crack_time = start.elapsed().as_secs_f64();

            (
                found.as_deref() == Some(password.as_slice()),
                crack_time,
                stats.iterations() as f64,
            )
        })
        .collect();

    let target_count = targets.len() as u64;
    let cracked = lookups.iter().filter(|(found, _, _)| *found).count() as u64;
    let crack_times: Vec<_> = lookups.iter().map(|&(_, time, _)| time).collect();
    let iterations: Vec<_> = lookups.iter().map(|&(_, _, it)| it).collect();

    let success_rate = cracked as f64 / target_count as f64;
    let std_error = match config.mode {
        CrackMode::Exhaustive => 0.,
        CrackMode::MonteCarlo { .. } => {
            // sampled without replacement, hence the finite population correction
            let population = ctx.password_space() as f64;
            let k = target_count as f64;
            let correction = if population > 1. {
                (population - k) / (population - 1.)
            } else {
                0.
            };
            (success_rate * (1. - success_rate) / k * correction).sqrt()
        }
    };
    let theoretical_coverage = theoretical_coverage(chains, ctx);

    Ok(TrialResult {
        build_time,
        chains,
        merges: chains - table.len() as u64,
        targets: target_count,
        cracked,
        ground_truth,
        crack_times: Summary::from_samples(&crack_times),
        iterations: Summary::from_samples(&iterations),
        success_rate,
        std_error,
        theoretical_coverage,
        merge_ratio: success_rate / theoretical_coverage,
    })
}

/// Estimated coverage of `chains` chains if they never merged.
/// `N` in `1 - exp(-m t / N)` is `ctx.n`, the whole reduction space with the
/// empty password, not the space of non-empty targets.
pub fn theoretical_coverage(chains: u64, ctx: &RainbowTableCtx) -> f64 {
    1. - (-(chains as f64) * ctx.t as f64 / ctx.n as f64).exp()
}

/// Every password hashed by a stored chain.
fn covered_passwords(table: &SimpleTable) -> HashSet<CompressedPassword> {
    let ctx = table.ctx();

    table
        .iter()
        .flat_map(|chain| {
            let mut column = chain.startpoint;
            ChainWalk::new(chain.startpoint, ctx).map(move |step| {
                let password = column;
                column = step.next;
                password
            })
        })
        .collect()
}
