mod attack;
mod bench;
mod generate;
mod hash;

use std::{
    fs,
    io::{self, BufRead},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use clap::{value_parser, Args, Parser, Subcommand, ValueEnum};
use prism_core::{
    HashFunction, RainbowTableCtx, RainbowTableCtxBuilder, ReductionPolicy, TraceEvent,
    DEFAULT_ALPHA, DEFAULT_CHAIN_LENGTH, DEFAULT_CHARSET, DEFAULT_MAX_PASSWORD_LENGTH,
};
use rand::{rngs::StdRng, SeedableRng};
use tracing_subscriber::EnvFilter;

use attack::attack;
use bench::bench;
use generate::generate;
use hash::hash;

/// Rainbow table generation, attack and benchmarking.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// The default log level, overridden by RUST_LOG.
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    Generate(Generate),
    Attack(Attack),
    Bench(Bench),
    Hash(Hash),
}

/// The parameters defining a table.
#[derive(Args)]
pub struct TableArgs {
    /// The hash function.
    #[arg(short = 'H', long = "hash", default_value_t = HashFunction::Sha1)]
    hash_function: HashFunction,

    /// The charset to use.
    /// The order of the characters defines the reduction function.
    #[arg(short, long, value_parser = check_charset, default_value_t = String::from_utf8_lossy(DEFAULT_CHARSET).to_string())]
    charset: String,

    /// The maximum password length in the table.
    #[arg(short = 'l', long, value_parser = value_parser!(u8).range(1..), default_value_t = DEFAULT_MAX_PASSWORD_LENGTH)]
    max_password_length: u8,

    /// The chain length.
    /// Increasing the chain length will reduce the memory used
    /// to store the table but increase the time taken to attack.
    #[arg(short = 't', long, value_parser = value_parser!(u64).range(1..), default_value_t = DEFAULT_CHAIN_LENGTH)]
    chain_length: u64,

    /// Use the same reduction function at every column.
    /// Chains merge a lot more, this is only useful for comparison.
    #[arg(long)]
    fixed_reduction: bool,
}

impl TableArgs {
    fn ctx(&self) -> Result<RainbowTableCtx> {
        let reduction = if self.fixed_reduction {
            ReductionPolicy::Fixed
        } else {
            ReductionPolicy::StepDependent
        };

        RainbowTableCtxBuilder::new()
            .hash(self.hash_function)
            .charset(self.charset.as_bytes())
            .max_password_length(self.max_password_length)
            .chain_length(self.chain_length)
            .reduction(reduction)
            .build()
            .context("Invalid table parameters")
    }
}

/// Generate a rainbow table.
#[derive(Args)]
pub struct Generate {
    /// The file where the generated table should be stored.
    output: PathBuf,

    #[command(flatten)]
    table: TableArgs,

    /// A file containing the startpoints, one per line. Use - for stdin.
    #[arg(short = 'f', long, group = "startpoint")]
    seeds: Option<PathBuf>,

    /// The number of random startpoints to use.
    /// Prefer using alpha if you don't know what you're doing.
    #[arg(short, long, value_parser = value_parser!(u64).range(1..), group = "startpoint")]
    startpoints: Option<u64>,

    /// Set the maximality factor (alpha).
    /// It is used to determine the number of random startpoints.
    /// It is an indicator of how well the table will perform compared to a maximum table.
    #[arg(short, long, value_parser = check_alpha, default_value_t = DEFAULT_ALPHA, group = "startpoint")]
    alpha: f64,

    /// Seed of the random startpoints, for reproducible tables.
    #[arg(long)]
    rng_seed: Option<u64>,

    /// Print every step of every chain.
    #[arg(long)]
    trace: bool,
}

/// Find the passwords producing some hash digests.
#[derive(Args)]
pub struct Attack {
    /// The rainbow table to use.
    table: PathBuf,

    /// The digests to attack, in hexadecimal. Read from stdin if omitted.
    #[arg(value_parser = check_hex)]
    digests: Vec<String>,

    /// Print every step of every lookup.
    #[arg(long)]
    trace: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    /// Attack every password of the space.
    Exhaustive,
    /// Attack a random sample of the space.
    MonteCarlo,
}

/// Measure the success rate of random tables.
#[derive(Args)]
pub struct Bench {
    #[command(flatten)]
    table: TableArgs,

    /// How the attacked passwords are chosen.
    #[arg(short, long, value_enum, default_value_t = ModeArg::MonteCarlo)]
    mode: ModeArg,

    /// The number of attacked passwords in Monte Carlo mode.
    #[arg(short = 'k', long, value_parser = value_parser!(u64).range(1..), default_value_t = 1_000)]
    samples: u64,

    /// The number of random startpoints of every table.
    #[arg(short, long, value_parser = value_parser!(u64).range(1..), group = "startpoint")]
    startpoints: Option<u64>,

    /// Set the maximality factor (alpha) used to determine the number of startpoints.
    #[arg(short, long, value_parser = check_alpha, default_value_t = DEFAULT_ALPHA, group = "startpoint")]
    alpha: f64,

    /// The number of tables to build and attack.
    #[arg(short = 'n', long, value_parser = value_parser!(u64).range(1..), default_value_t = 1)]
    trials: u64,

    /// Seed of the random generator, for reproducible benchmarks.
    #[arg(long)]
    rng_seed: Option<u64>,
}

/// Print the digest of a password.
#[derive(Args)]
pub struct Hash {
    /// The password to hash.
    password: String,

    /// The hash function.
    #[arg(short = 'H', long = "hash", default_value_t = HashFunction::Sha1)]
    hash_function: HashFunction,
}

/// Checks if the charset is made of ASCII characters.
fn check_charset(charset: &str) -> Result<String> {
    if !charset.is_ascii() {
        bail!("The charset can only contain ASCII characters");
    }

    Ok(charset.to_owned())
}

/// Checks if the alpha coefficient is a float between 0 and 1.
fn check_alpha(alpha: &str) -> Result<f64> {
    let alpha = alpha.parse::<f64>().context("Alpha should be a number")?;

    if !(0. ..=1.).contains(&alpha) {
        bail!("Alpha should be comprised between 0 and 1");
    }

    Ok(alpha)
}

/// Checks if the digest is valid hexadecimal.
fn check_hex(hex: &str) -> Result<String> {
    hex::decode(hex).context("The digest is not valid hexadecimal")?;
    Ok(hex.to_owned())
}

/// Creates the random generator, seeded from the OS if no seed is given.
fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Reads the non-empty lines of a file, or of stdin if the path is `-`.
fn read_lines(path: &Path) -> Result<Vec<String>> {
    let lines = if path == Path::new("-") {
        io::stdin()
            .lock()
            .lines()
            .collect::<io::Result<Vec<_>>>()
            .context("Unable to read stdin")?
    } else {
        fs::read_to_string(path)
            .with_context(|| format!("Unable to read {}", path.display()))?
            .lines()
            .map(str::to_owned)
            .collect()
    };

    Ok(lines
        .into_iter()
        .map(|line| line.trim_end_matches('\r').to_owned())
        .filter(|line| !line.is_empty())
        .collect())
}

/// Prints a chain or lookup step.
fn print_trace(event: TraceEvent) {
    let lossy = |p: &[u8]| String::from_utf8_lossy(p).into_owned();

    match event {
        TraceEvent::ChainStep {
            column,
            password,
            digest,
        } => println!("  [{column}] {} -> {}", lossy(&password), hex::encode(digest)),
        TraceEvent::ChainEnd {
            startpoint,
            endpoint,
        } => println!("chain {} ... {}", lossy(&startpoint), lossy(&endpoint)),
        TraceEvent::ColumnEndpoint { column, endpoint } => {
            println!("  column {column}: endpoint {}", lossy(&endpoint))
        }
        TraceEvent::EndpointHit { column, startpoint } => {
            println!("  column {column}: hit, rebuilding from {}", lossy(&startpoint))
        }
        TraceEvent::FalseAlarm { column } => println!("  column {column}: false alarm"),
        TraceEvent::Found {
            column,
            step,
            password,
        } => println!("  column {column}: found {} at step {step}", lossy(&password)),
        TraceEvent::NotFound => println!("  not found"),
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).context("Invalid log level")?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    match cli.commands {
        Commands::Generate(gen) => generate(gen)?,
        Commands::Attack(atk) => attack(atk)?,
        Commands::Bench(bch) => bench(bch)?,
        Commands::Hash(hsh) => hash(hsh)?,
    }

    Ok(())
}
