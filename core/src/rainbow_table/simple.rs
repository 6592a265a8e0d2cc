use std::{
    collections::{hash_map::Entry, hash_map::Iter},
    sync::mpsc::{self, Sender},
    thread,
};

use nohash_hasher::IntMap;
use rand::Rng;
use rayon::prelude::*;
use tracing::{debug, info};

use super::RainbowTable;
use crate::{
    chain::{ChainBuilder, RainbowChain},
    ctx::RainbowTableCtx,
    error::{PrismError, PrismResult},
    event::{BuildEvent, SimpleTableHandle},
    reduction::counter_to_plaintext,
    scheduling::BatchIterator,
    seeds::{validate_startpoints, RandomStartpoints},
    CompressedPassword,
};

/// A simple rainbow table, mapping endpoints to startpoints.
///
/// When two startpoints lead to the same endpoint, the chain of the
/// startpoint that comes first in the build order is kept and the other one
/// is discarded.
#[derive(Clone, PartialEq, Eq)]
pub struct SimpleTable {
    /// The chains of the table, indexed by endpoint.
    pub(crate) chains: IntMap<CompressedPassword, CompressedPassword>,
    /// The context.
    pub(crate) ctx: RainbowTableCtx,
}

impl SimpleTable {
    /// Creates an empty table.
    pub fn new(ctx: RainbowTableCtx) -> Self {
        Self {
            chains: IntMap::default(),
            ctx,
        }
    }

    /// Builds a table from explicit seeds.
    /// Every seed is validated before any chain is computed.
    pub fn build<I, P>(seeds: I, ctx: RainbowTableCtx) -> PrismResult<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<[u8]>,
    {
        let startpoints = validate_startpoints(seeds, &ctx)?;
        Self::build_compressed(&startpoints, ctx)
    }

    /// Builds a table from `count` random startpoints drawn with `rng`.
    pub fn build_random<R: Rng + ?Sized>(
        rng: &mut R,
        count: u64,
        ctx: RainbowTableCtx,
    ) -> PrismResult<Self> {
        let startpoints: Vec<_> = RandomStartpoints::new(rng, count, &ctx)?.collect();
        Self::build_compressed(&startpoints, ctx)
    }

    /// Builds a table from compressed startpoints.
    pub fn build_compressed(
        startpoints: &[CompressedPassword],
        ctx: RainbowTableCtx,
    ) -> PrismResult<Self> {
        let mut table = Self::new(ctx);
        table.extend_compressed(startpoints)?;

        Ok(table)
    }

    /// Builds a table on another thread.
    /// Returns an handle to get events related to the generation and to get the generated table.
    pub fn build_nonblocking(
        startpoints: Vec<CompressedPassword>,
        ctx: RainbowTableCtx,
    ) -> PrismResult<SimpleTableHandle> {
        check_startpoints(&startpoints, &ctx)?;

        let (sender, receiver) = mpsc::channel();
        let handle = thread::spawn(move || {
            let mut table = Self::new(ctx);
            table.insert_chains(&startpoints, Some(&sender));
            Ok(table)
        });

        Ok(SimpleTableHandle { handle, receiver })
    }

    /// Adds the chains of new seeds to the table.
    /// Existing chains are never modified.
    /// Returns the number of chains that were added.
    pub fn extend<I, P>(&mut self, seeds: I) -> PrismResult<usize>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<[u8]>,
    {
        let startpoints = validate_startpoints(seeds, &self.ctx)?;
        Ok(self.insert_chains(&startpoints, None))
    }

    /// Adds the chains of new compressed startpoints to the table.
    /// Returns the number of chains that were added.
    pub fn extend_compressed(&mut self, startpoints: &[CompressedPassword]) -> PrismResult<usize> {
        check_startpoints(startpoints, &self.ctx)?;
        Ok(self.insert_chains(startpoints, None))
    }

    /// Computes the chains in parallel, batch by batch, and inserts them in startpoint order.
    fn insert_chains(
        &mut self,
        startpoints: &[CompressedPassword],
        events: Option<&Sender<BuildEvent>>,
    ) -> usize {
        let builder = ChainBuilder::new(&self.ctx);
        let batch_iter = BatchIterator::new(startpoints.len());
        let batch_count = batch_iter.len();
        let mut inserted = 0;

        for (batch_number, range) in batch_iter.enumerate() {
            if let Some(sender) = events {
                sender
                    .send(BuildEvent::Batch {
                        batch_number: batch_number + 1,
                        batch_count,
                        chains: range.clone(),
                    })
                    .ok();
            }

            let batch_chains: Vec<RainbowChain> = startpoints[range]
                .par_iter()
                .map(|&startpoint| builder.build(startpoint))
                .collect();

            for chain in batch_chains {
                match self.chains.entry(chain.endpoint) {
                    Entry::Vacant(entry) => {
                        entry.insert(chain.startpoint);
                        inserted += 1;
                    }
                    Entry::Occupied(_) => debug!(
                        startpoint = chain.startpoint,
                        endpoint = chain.endpoint,
                        "merged chain discarded"
                    ),
                }
            }

            if let Some(sender) = events {
                let progress = (batch_number + 1) as f64 / batch_count as f64 * 100.;
                sender.send(BuildEvent::Progress(progress)).ok();
            }
        }

        info!(
            startpoints = startpoints.len(),
            inserted,
            merged = startpoints.len() - inserted,
            "chains computed"
        );

        inserted
    }

    /// Replays every chain and checks that it still reaches its endpoint.
    pub fn verify(&self) -> PrismResult<()> {
        let builder = ChainBuilder::new(&self.ctx);

        let invalid = self
            .chains
            .par_iter()
            .find_any(|&(&endpoint, &startpoint)| builder.build(startpoint).endpoint != endpoint);

        match invalid {
            None => Ok(()),
            Some((&endpoint, &startpoint)) => Err(PrismError::Format(format!(
                "the chain starting at \"{}\" does not end at \"{}\"",
                String::from_utf8_lossy(&counter_to_plaintext(startpoint, &self.ctx)),
                String::from_utf8_lossy(&counter_to_plaintext(endpoint, &self.ctx)),
            ))),
        }
    }
}

/// Checks that every compressed startpoint is a non-empty password of the context.
fn check_startpoints(startpoints: &[CompressedPassword], ctx: &RainbowTableCtx) -> PrismResult<()> {
    match startpoints
        .iter()
        .find(|&&startpoint| startpoint == 0 || startpoint >= ctx.n)
    {
        Some(startpoint) => Err(PrismError::Validation(format!(
            "{startpoint} is not a startpoint of a space of {} passwords",
            ctx.password_space()
        ))),
        None => Ok(()),
    }
}

impl RainbowTable for SimpleTable {
    type Iter<'a> = SimpleTableIterator<'a>;

    fn len(&self) -> usize {
        self.chains.len()
    }

    fn iter(&self) -> Self::Iter<'_> {
        self.into_iter()
    }

    #[inline]
    fn search_endpoints(&self, endpoint: CompressedPassword) -> Option<CompressedPassword> {
        self.chains.get(&endpoint).copied()
    }

    fn ctx(&self) -> &RainbowTableCtx {
        &self.ctx
    }
}

impl<'a> IntoIterator for &'a SimpleTable {
    type Item = RainbowChain;
    type IntoIter = <SimpleTable as RainbowTable>::Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        Self::IntoIter::new(self)
    }
}

pub struct SimpleTableIterator<'a> {
    inner: Iter<'a, CompressedPassword, CompressedPassword>,
}

impl<'a> SimpleTableIterator<'a> {
    pub fn new(table: &'a SimpleTable) -> Self {
        Self {
            inner: table.chains.iter(),
        }
    }
}

impl Iterator for SimpleTableIterator<'_> {
    type Item = RainbowChain;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|(&endpoint, &startpoint)| RainbowChain::from_compressed(startpoint, endpoint))
    }
}

impl std::fmt::Debug for SimpleTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let chains_count = self.chains.len().min(10);
        let some_chains = self.chains.iter().take(chains_count);

        for (&endpoint, &startpoint) in some_chains {
            writeln!(
                f,
                "{} -> {}",
                String::from_utf8_lossy(&counter_to_plaintext(startpoint, &self.ctx)),
                String::from_utf8_lossy(&counter_to_plaintext(endpoint, &self.ctx)),
            )?;
        }
        writeln!(f, "...")
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use crate::{
        ctx::build_test_ctx,
        error::PrismError,
        event::{BuildEvent, TraceEvent},
        rainbow_table::{LookupStats, RainbowTable, SimpleTable},
        reduction::counter_to_plaintext,
        RainbowTableCtxBuilder,
    };

    fn worked_example() -> SimpleTable {
        SimpleTable::build(["a", "bb", "ccc"], build_test_ctx()).unwrap()
    }

    fn plaintext_chains(table: &SimpleTable) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut chains: Vec<_> = table
            .iter()
            .map(|chain| {
                (
                    counter_to_plaintext(chain.startpoint, table.ctx()),
                    counter_to_plaintext(chain.endpoint, table.ctx()),
                )
            })
            .collect();
        chains.sort();
        chains
    }

    #[test]
    fn test_build_worked_example() {
        let table = worked_example();

        assert_eq!(3, table.len());
        assert_eq!(
            vec![
                (b"a".to_vec(), b"bcc".to_vec()),
                (b"bb".to_vec(), b"bca".to_vec()),
                (b"ccc".to_vec(), b"cca".to_vec()),
            ],
            plaintext_chains(&table)
        );
        assert!(table.verify().is_ok());
    }

    #[test]
    fn test_search_worked_example() {
        let table = worked_example();
        let digest = table.ctx().hash_function.hash(b"bbb");
        let mut events = Vec::new();

        let (found, _) = table.search_traced(&digest, &mut |event: TraceEvent| events.push(event));

        assert_eq!(Some(b"bbb".to_vec()), found);
        assert_eq!(
            Some(&TraceEvent::Found {
                column: 1,
                step: 1,
                password: b"bbb".to_vec(),
            }),
            events.last()
        );
    }

    #[test]
    fn test_search_chain_members() {
        let table = worked_example();
        let hash = |p: &[u8]| table.ctx().hash_function.hash(p);

        for password in ["a", "bb", "ccc", "bac", "ac", "bbb", "bca", "cbc", "bbc"] {
            assert_eq!(
                Some(password.as_bytes().to_vec()),
                table.search(&hash(password.as_bytes())),
                "{password}"
            );
        }
    }

    #[test]
    fn test_search_not_found() {
        let table = worked_example();
        let hash = |p: &[u8]| table.ctx().hash_function.hash(p);

        // endpoints are never hashed in their own chain
        for password in ["cca", "bcc", "aaa", "abc", "c"] {
            assert_eq!(None, table.search(&hash(password.as_bytes())), "{password}");
        }
    }

    #[test]
    fn test_search_false_alarm_then_found() {
        let table = worked_example();
        let digest = table.ctx().hash_function.hash(b"bac");

        let (found, stats) = table.search_with_stats(&digest);

        assert_eq!(Some(b"bac".to_vec()), found);
        assert_eq!(1, stats.false_alarms);
        assert_eq!(2, stats.endpoint_hits);
    }

    #[test]
    fn test_search_bounded_iterations() {
        let ctx = RainbowTableCtxBuilder::new()
            .charset(b"abc")
            .max_password_length(3)
            .chain_length(17)
            .build()
            .unwrap();
        let t = ctx.t;
        let table = SimpleTable::new(ctx);
        let digest = table.ctx().hash_function.hash(b"abc");

        let (found, stats) = table.search_with_stats(&digest);

        assert_eq!(None, found);
        assert_eq!(
            LookupStats {
                reductions: t * (t + 1) / 2,
                hashes: t * (t - 1) / 2,
                endpoint_hits: 0,
                false_alarms: 0,
            },
            stats
        );
    }

    #[test]
    fn test_search_wrong_digest_length() {
        let table = worked_example();

        assert_eq!(None, table.search(b"not a sha1 digest"));
    }

    #[test]
    fn test_first_startpoint_wins() {
        let ctx = build_test_ctx();
        // the chains of "a" and "ca" merge into the endpoint "bcc"
        let table = SimpleTable::build(["ca", "a"], ctx.clone()).unwrap();
        let reversed = SimpleTable::build(["a", "ca"], ctx).unwrap();

        assert_eq!(1, table.len());
        assert_eq!(
            vec![(b"ca".to_vec(), b"bcc".to_vec())],
            plaintext_chains(&table)
        );
        assert_eq!(
            vec![(b"a".to_vec(), b"bcc".to_vec())],
            plaintext_chains(&reversed)
        );
    }

    #[test]
    fn test_extend_keeps_existing_chains() {
        let mut table = worked_example();

        let inserted = table.extend(["ca", "b"]).unwrap();

        assert_eq!(1, inserted);
        assert_eq!(4, table.len());
        assert!(plaintext_chains(&table).contains(&(b"a".to_vec(), b"bcc".to_vec())));
    }

    #[test]
    fn test_build_rejects_invalid_seeds() {
        let ctx = build_test_ctx();

        assert!(matches!(
            SimpleTable::build(["a", "d"], ctx.clone()),
            Err(PrismError::Validation(_))
        ));
        assert!(matches!(
            SimpleTable::build([""], ctx.clone()),
            Err(PrismError::Validation(_))
        ));
        assert!(matches!(
            SimpleTable::build_compressed(&[ctx.n], ctx),
            Err(PrismError::Validation(_))
        ));
    }

    #[test]
    fn test_build_random_is_reproducible() {
        let ctx = build_test_ctx();

        let first = SimpleTable::build_random(&mut StdRng::seed_from_u64(3), 12, ctx.clone()).unwrap();
        let second = SimpleTable::build_random(&mut StdRng::seed_from_u64(3), 12, ctx).unwrap();

        assert_eq!(first, second);
        assert!(first.len() <= 12);
    }

    #[test]
    fn test_build_nonblocking() {
        let ctx = build_test_ctx();
        let startpoints = vec![1, 8, 39];

        let handle = SimpleTable::build_nonblocking(startpoints.clone(), ctx.clone()).unwrap();
        let mut events = Vec::new();
        while let Some(event) = handle.recv() {
            events.push(event);
        }
        let table = handle.join().unwrap();

        assert_eq!(SimpleTable::build_compressed(&startpoints, ctx).unwrap(), table);
        assert_eq!(
            vec![
                BuildEvent::Batch {
                    batch_number: 1,
                    batch_count: 1,
                    chains: 0..3,
                },
                BuildEvent::Progress(100.),
            ],
            events
        );
    }

    #[test]
    fn test_search_many() {
        let table = worked_example();
        let hash = |p: &[u8]| table.ctx().hash_function.hash(p);

        let results = table.search_many(&[hash(b"bbb"), hash(b"aaa"), hash(b"a")]);

        assert_eq!(vec![Some(b"bbb".to_vec()), None, Some(b"a".to_vec())], results);
    }

    #[test]
    fn test_verify_detects_broken_chain() {
        let mut table = worked_example();
        table.chains.insert(1, 2);

        assert!(matches!(table.verify(), Err(PrismError::Format(_))));
    }
}
