mod simple;

use rayon::prelude::*;
use tracing::{debug, trace};

use crate::{
    chain::{ChainWalk, RainbowChain},
    ctx::RainbowTableCtx,
    event::{emit, NoTrace, TraceEvent, TraceSink},
    reduction::{counter_to_plaintext, reduce},
    CompressedPassword, Digest, Password,
};

pub use simple::{SimpleTable, SimpleTableIterator};

/// Counters of the work done by a single lookup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LookupStats {
    /// Number of calls to the reduction function.
    pub reductions: u64,
    /// Number of calls to the hash function.
    pub hashes: u64,
    /// Number of replayed endpoints found in the table.
    pub endpoint_hits: u64,
    /// Number of rebuilt chains that did not contain the digest.
    pub false_alarms: u64,
}

impl LookupStats {
    /// Total number of hash and reduction calls.
    pub fn iterations(&self) -> u64 {
        self.reductions + self.hashes
    }
}

/// Trait that data structures implement to be used as rainbow tables.
pub trait RainbowTable: Sized + Sync {
    /// The type of the iterator over the chains of the table.
    type Iter<'a>: Iterator<Item = RainbowChain>
    where
        Self: 'a;

    /// Returns the number of chains stored in the table.
    fn len(&self) -> usize;

    /// Returns true if the table is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns an iterator over the chains of the table.
    /// The chains are not expected to be returned in a particular order.
    fn iter(&self) -> Self::Iter<'_>;

    /// Searches the endpoints for a password.
    /// Returns the startpoint of the chain if the password was found in the endpoints.
    fn search_endpoints(&self, endpoint: CompressedPassword) -> Option<CompressedPassword>;

    /// Returns the context.
    fn ctx(&self) -> &RainbowTableCtx;

    /// Searches for a password assuming the digest sits at the given column.
    fn search_column<S: TraceSink + ?Sized>(
        &self,
        column: u64,
        digest: &[u8],
        stats: &mut LookupStats,
        sink: &mut S,
    ) -> Option<Password> {
        let ctx = self.ctx();
        let mut column_digest = digest.to_vec();
        let mut endpoint = 0;

        // replay the end of the chain from the assumed column
        for k in column..ctx.t {
            endpoint = reduce(&column_digest, k, ctx);
            stats.reductions += 1;

            if k < ctx.t - 1 {
                column_digest = ctx.hash_function.hash(&counter_to_plaintext(endpoint, ctx));
                stats.hashes += 1;
            }
        }

        emit(sink, || TraceEvent::ColumnEndpoint {
            column,
            endpoint: counter_to_plaintext(endpoint, ctx),
        });

        let startpoint = self.search_endpoints(endpoint)?;
        stats.endpoint_hits += 1;

        emit(sink, || TraceEvent::EndpointHit {
            column,
            startpoint: counter_to_plaintext(startpoint, ctx),
        });

        // we found a matching endpoint, rebuild the chain and look for the digest in it
        for step in ChainWalk::new(startpoint, ctx) {
            stats.hashes += 1;
            stats.reductions += 1;

            if step.digest == digest {
                emit(sink, || TraceEvent::Found {
                    column,
                    step: step.column,
                    password: step.password.clone(),
                });

                return Some(step.password);
            }
        }

        // two chains merged or collided at their end
        debug!(column, "false alarm");
        stats.false_alarms += 1;
        emit(sink, || TraceEvent::FalseAlarm { column });

        None
    }

    /// Searches for a password that hashes to the given digest.
    #[inline]
    fn search(&self, digest: &[u8]) -> Option<Password> {
        self.search_with_stats(digest).0
    }

    /// Searches for a password and counts the work done.
    #[inline]
    fn search_with_stats(&self, digest: &[u8]) -> (Option<Password>, LookupStats) {
        self.search_traced(digest, &mut NoTrace)
    }

    /// Searches for a password, reporting every step to `sink`.
    /// Columns are tried from the end of the chains to their start, and the
    /// first confirmed match is returned.
    fn search_traced<S: TraceSink + ?Sized>(
        &self,
        digest: &[u8],
        sink: &mut S,
    ) -> (Option<Password>, LookupStats) {
        let mut stats = LookupStats::default();

        let found = (0..self.ctx().t)
            .rev()
            .find_map(|column| self.search_column(column, digest, &mut stats, &mut *sink));

        if found.is_none() {
            emit(sink, || TraceEvent::NotFound);
        }

        trace!(
            found = found.is_some(),
            reductions = stats.reductions,
            false_alarms = stats.false_alarms,
            "lookup done"
        );

        (found, stats)
    }

    /// Searches for multiple digests in parallel.
    /// The results are in the same order as the digests.
    fn search_many(&self, digests: &[Digest]) -> Vec<Option<Password>> {
        digests
            .par_iter()
            .map(|digest| self.search(digest))
            .collect()
    }
}
