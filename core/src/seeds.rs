use rand::{
    seq::index::{self, IndexVecIntoIter},
    Rng,
};

use crate::{
    ctx::RainbowTableCtx,
    error::{ConfigError, PrismResult},
    CompressedPassword,
};

/// Startpoints drawn uniformly at random from the non-empty passwords of a
/// context, without replacement.
/// At most `password_space()` startpoints are produced.
/// All indices are drawn when the iterator is created, so memory grows with
/// the number of startpoints. They are then yielded one by one.
pub struct RandomStartpoints {
    inner: IndexVecIntoIter,
}

impl RandomStartpoints {
    /// Draws `count` distinct startpoints using `rng`.
    pub fn new<R: Rng + ?Sized>(
        rng: &mut R,
        count: u64,
        ctx: &RainbowTableCtx,
    ) -> PrismResult<Self> {
        let space = usize::try_from(ctx.password_space()).map_err(|_| {
            ConfigError::Other("the password space is too large for this platform".to_owned())
        })?;
        let amount = usize::try_from(count).unwrap_or(usize::MAX).min(space);

        Ok(Self {
            inner: index::sample(rng, space, amount).into_iter(),
        })
    }
}

impl Iterator for RandomStartpoints {
    type Item = CompressedPassword;

    fn next(&mut self) -> Option<Self::Item> {
        // counter 0 is the empty password
        self.inner.next().map(|i| i as CompressedPassword + 1)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for RandomStartpoints {}

/// Validates explicit startpoints and compresses them, in order.
/// Fails on the first password that is not part of the context.
pub fn validate_startpoints<I, P>(seeds: I, ctx: &RainbowTableCtx) -> PrismResult<Vec<CompressedPassword>>
where
    I: IntoIterator<Item = P>,
    P: AsRef<[u8]>,
{
    seeds
        .into_iter()
        .map(|seed| ctx.validate(seed.as_ref()))
        .collect()
}
