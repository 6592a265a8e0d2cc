use crate::{
    ctx::RainbowTableCtx,
    event::{emit, NoTrace, TraceEvent, TraceSink},
    reduction::{counter_to_plaintext, reduce},
    CompressedPassword, Digest, Password,
};

/// A chain of the rainbow table, made of a startpoint and an endpoint.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq, Hash)]
pub struct RainbowChain {
    pub startpoint: CompressedPassword,
    pub endpoint: CompressedPassword,
}

impl RainbowChain {
    pub fn from_compressed(startpoint: CompressedPassword, endpoint: CompressedPassword) -> Self {
        RainbowChain {
            startpoint,
            endpoint,
        }
    }
}

/// One column of a chain: `digest` is the hash of `password`, and
/// `next` is the reduction of `digest` for this column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainStep {
    pub column: u64,
    pub password: Password,
    pub digest: Digest,
    pub next: CompressedPassword,
}

/// Walks the `t` columns of a chain from its startpoint.
pub struct ChainWalk<'a> {
    ctx: &'a RainbowTableCtx,
    current: CompressedPassword,
    column: u64,
}

impl<'a> ChainWalk<'a> {
    pub fn new(startpoint: CompressedPassword, ctx: &'a RainbowTableCtx) -> Self {
        Self {
            ctx,
            current: startpoint,
            column: 0,
        }
    }

    /// Consumes the remaining columns and returns the endpoint of the chain.
    pub fn endpoint(mut self) -> CompressedPassword {
        self.by_ref().for_each(drop);
        self.current
    }
}

impl Iterator for ChainWalk<'_> {
    type Item = ChainStep;

    fn next(&mut self) -> Option<Self::Item> {
        if self.column == self.ctx.t {
            return None;
        }

        let password = counter_to_plaintext(self.current, self.ctx);
        let digest = self.ctx.hash_function.hash(&password);
        let next = reduce(&digest, self.column, self.ctx);

        let step = ChainStep {
            column: self.column,
            password,
            digest,
            next,
        };

        self.current = next;
        self.column += 1;

        Some(step)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.ctx.t - self.column) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ChainWalk<'_> {}

/// Builds chains for a context.
#[derive(Clone, Copy)]
pub struct ChainBuilder<'a> {
    ctx: &'a RainbowTableCtx,
}

impl<'a> ChainBuilder<'a> {
    pub fn new(ctx: &'a RainbowTableCtx) -> Self {
        Self { ctx }
    }

    /// Builds the chain starting at `startpoint`.
    #[inline]
    pub fn build(&self, startpoint: CompressedPassword) -> RainbowChain {
        self.build_traced(startpoint, &mut NoTrace)
    }

    /// Builds the chain starting at `startpoint`, reporting every column to `sink`.
    /// The resulting chain is the same as with `ChainBuilder::build`.
    pub fn build_traced<S: TraceSink + ?Sized>(
        &self,
        startpoint: CompressedPassword,
        sink: &mut S,
    ) -> RainbowChain {
        let endpoint = if sink.enabled() {
            let mut walk = self.walk(startpoint);
            for step in walk.by_ref() {
                sink.record(TraceEvent::ChainStep {
                    column: step.column,
                    password: step.password,
                    digest: step.digest,
                });
            }
            walk.endpoint()
        } else {
            self.walk(startpoint).endpoint()
        };

        emit(sink, || TraceEvent::ChainEnd {
            startpoint: counter_to_plaintext(startpoint, self.ctx),
            endpoint: counter_to_plaintext(endpoint, self.ctx),
        });

        RainbowChain::from_compressed(startpoint, endpoint)
    }

    /// Returns an iterator over the columns of the chain starting at `startpoint`.
    pub fn walk(&self, startpoint: CompressedPassword) -> ChainWalk<'a> {
        ChainWalk::new(startpoint, self.ctx)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        chain::ChainBuilder,
        ctx::{build_test_ctx, ReductionPolicy},
        event::TraceEvent,
        reduction::counter_to_plaintext,
    };

    fn endpoint_of(seed: &[u8], ctx: &crate::RainbowTableCtx) -> Vec<u8> {
        let chain = ChainBuilder::new(ctx).build(ctx.validate(seed).unwrap());
        counter_to_plaintext(chain.endpoint, ctx)
    }

    #[test]
    fn test_worked_example_endpoints() {
        let ctx = build_test_ctx();

        assert_eq!(b"bcc".to_vec(), endpoint_of(b"a", &ctx));
        assert_eq!(b"bca".to_vec(), endpoint_of(b"bb", &ctx));
        assert_eq!(b"cca".to_vec(), endpoint_of(b"ccc", &ctx));
    }

    #[test]
    fn test_fixed_reduction_endpoints() {
        let mut ctx = build_test_ctx();
        ctx.reduction = ReductionPolicy::Fixed;

        assert_eq!(b"cca".to_vec(), endpoint_of(b"a", &ctx));
        assert_eq!(b"aca".to_vec(), endpoint_of(b"bb", &ctx));
        assert_eq!(b"acc".to_vec(), endpoint_of(b"ccc", &ctx));
    }

    #[test]
    fn test_build_is_deterministic() {
        let ctx = build_test_ctx();
        let builder = ChainBuilder::new(&ctx);

        for startpoint in 1..ctx.n {
            assert_eq!(builder.build(startpoint), builder.build(startpoint));
        }
    }

    #[test]
    fn test_walk() {
        let ctx = build_test_ctx();
        let builder = ChainBuilder::new(&ctx);
        let startpoint = ctx.validate(b"ccc").unwrap();

        let passwords: Vec<_> = builder
            .walk(startpoint)
            .map(|step| step.password)
            .collect();

        assert_eq!(
            vec![b"ccc".to_vec(), b"bbb".to_vec(), b"bbc".to_vec()],
            passwords
        );
        assert_eq!(3, builder.walk(startpoint).len());
        assert_eq!(
            builder.build(startpoint).endpoint,
            builder.walk(startpoint).endpoint()
        );
    }

    #[test]
    fn test_trace_does_not_change_chain() {
        let ctx = build_test_ctx();
        let builder = ChainBuilder::new(&ctx);
        let startpoint = ctx.validate(b"a").unwrap();
        let mut events = Vec::new();

        let chain = builder.build_traced(startpoint, &mut |event: TraceEvent| events.push(event));

        assert_eq!(builder.build(startpoint), chain);
        assert_eq!(4, events.len());
        assert_eq!(
            TraceEvent::ChainStep {
                column: 0,
                password: b"a".to_vec(),
                digest: ctx.hash_function.hash(b"a"),
            },
            events[0]
        );
        assert_eq!(
            TraceEvent::ChainEnd {
                startpoint: b"a".to_vec(),
                endpoint: b"bcc".to_vec(),
            },
            events[3]
        );
    }
}
