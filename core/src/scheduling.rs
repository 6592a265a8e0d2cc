use std::ops::Range;

/// An iterator that batches the chains to process.
/// Every batch is computed in parallel, and progress is reported between batches.
#[derive(Clone, Debug)]
pub struct BatchIterator {
    range_start: usize,
    batch_size: usize,
    chains_remainder: usize,
    batch_number: usize,
    batches: usize,
}

impl BatchIterator {
    /// A batch size should not be under this value so that the thread pool
    /// has enough work between two progress reports.
    pub const DESIRED_CHAINS_PER_BATCH: usize = 1 << 16;

    /// Creates a new batch iterator where `chains_len` is the total number of chains to generate.
    pub fn new(chains_len: usize) -> BatchIterator {
        Self::with_batch_size(chains_len, Self::DESIRED_CHAINS_PER_BATCH)
    }

    /// Creates a new batch iterator with a custom desired batch size.
    pub fn with_batch_size(chains_len: usize, desired_batch_size: usize) -> BatchIterator {
        // this is the number of batches we need to process all the chains, rounded down
        let mut batches = chains_len / desired_batch_size.max(1);
        // compute the size of a batch and the chains remainder that should have made the last
        // batch.
        let (batch_size, chains_remainder) = if batches == 0 {
            // we need at least one batch
            batches += 1;
            (chains_len, 0)
        } else {
            (chains_len / batches, chains_len % batches)
        };

        BatchIterator {
            range_start: 0,
            batch_size,
            chains_remainder,
            batches,
            batch_number: 0,
        }
    }
}

impl Iterator for BatchIterator {
    type Item = Range<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.batch_number == self.batches {
            return None;
        }

        // Add part of the remainder that should have made the last batch.
        // A small trailing batch would leave most threads idle.
        let batch_size = if self.batch_number < self.chains_remainder {
            self.batch_size + 1
        } else {
            self.batch_size
        };

        let range_end = self.range_start + batch_size;
        let range = self.range_start..range_end;
        self.range_start = range_end;

        self.batch_number += 1;
        Some(range)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (
            self.batches - self.batch_number,
            Some(self.batches - self.batch_number),
        )
    }
}

impl ExactSizeIterator for BatchIterator {}
