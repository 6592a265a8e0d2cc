//! Rainbow table construction, lookup and benchmarking.
//!
//! A table is built from startpoints by alternating a hash function and a
//! reduction function `t` times; only the `(endpoint, startpoint)` pairs are
//! kept. Looking up a digest replays the end of every possible chain and
//! rebuilds the chains whose endpoint matches.

pub mod bench;
pub mod chain;
pub mod ctx;
pub mod error;
pub mod event;
pub mod hash;
pub mod rainbow_table;
pub mod reduction;
pub mod scheduling;
pub mod seeds;
mod storage;

pub use {
    bench::{run_benchmark, BenchmarkConfig, BenchmarkResult, CrackMode, Summary, TrialResult},
    chain::{ChainBuilder, ChainStep, ChainWalk, RainbowChain},
    ctx::{RainbowTableCtx, RainbowTableCtxBuilder, ReductionPolicy},
    error::{ConfigError, PrismError, PrismResult},
    event::{BuildEvent, NoTrace, SimpleTableHandle, TraceEvent, TraceSink},
    hash::HashFunction,
    rainbow_table::{LookupStats, RainbowTable, SimpleTable},
    seeds::RandomStartpoints,
    storage::FORMAT_VERSION,
};

/// The default chain length.
pub const DEFAULT_CHAIN_LENGTH: u64 = 1_000;

/// The default maximality factor.
pub const DEFAULT_ALPHA: f64 = 0.952;

/// The default maximum password length.
pub const DEFAULT_MAX_PASSWORD_LENGTH: u8 = 4;

/// The default charset.
pub const DEFAULT_CHARSET: &[u8] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz-_";

/// The largest space the exhaustive benchmark accepts to enumerate.
pub const MAX_EXHAUSTIVE_SPACE: u64 = 1 << 24;

/// An ASCII password.
pub type Password = Vec<u8>;

/// A digest produced by one of the supported hash functions.
pub type Digest = Vec<u8>;

/// A password stored as its index in the reduction space of a table.
/// It doesn't make any assumption on the charset used, so two compressed
/// passwords from two tables using different charsets are not equal if their
/// inner u64 is equal.
pub type CompressedPassword = u64;
