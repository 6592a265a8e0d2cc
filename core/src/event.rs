use std::{ops::Range, sync::mpsc::Receiver, thread::JoinHandle};

use crate::{
    error::{PrismError, PrismResult},
    rainbow_table::SimpleTable,
    Digest, Password,
};

/// An event to track the progress of the generation of a rainbow table.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildEvent {
    /// The nth batch of chains is being computed.
    Batch {
        batch_number: usize,
        batch_count: usize,
        chains: Range<usize>,
    },
    /// Overall progress of the rainbow table generation in percent.
    Progress(f64),
}

pub struct SimpleTableHandle {
    pub(crate) handle: JoinHandle<PrismResult<SimpleTable>>,
    pub(crate) receiver: Receiver<BuildEvent>,
}

impl SimpleTableHandle {
    /// Returns the generated rainbow table.
    /// Blocks until the table is finished.
    pub fn join(self) -> PrismResult<SimpleTable> {
        self.handle.join().map_err(|_| PrismError::Thread)?
    }

    /// Blocks until an event is received.
    /// Returns `None` if the rainbow table is finished.
    pub fn recv(&self) -> Option<BuildEvent> {
        self.receiver.recv().ok()
    }
}

/// A single step of a chain construction or of a lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// A column of a chain was computed: `digest` is the hash of `password`.
    ChainStep {
        column: u64,
        password: Password,
        digest: Digest,
    },
    /// A chain was fully computed.
    ChainEnd {
        startpoint: Password,
        endpoint: Password,
    },
    /// The target digest was assumed to be at `column` and was
    /// replayed until the end of the chain.
    ColumnEndpoint { column: u64, endpoint: Password },
    /// The replayed endpoint exists in the table.
    EndpointHit { column: u64, startpoint: Password },
    /// The rebuilt chain did not contain the target digest.
    FalseAlarm { column: u64 },
    /// The target digest was found while rebuilding a chain.
    Found {
        column: u64,
        step: u64,
        password: Password,
    },
    /// No column matched.
    NotFound,
}

/// A receiver for trace events.
/// Any `FnMut(TraceEvent)` closure is a sink.
pub trait TraceSink {
    /// Records an event.
    fn record(&mut self, event: TraceEvent);

    /// Whether events should be built at all.
    fn enabled(&self) -> bool {
        true
    }
}

impl<F: FnMut(TraceEvent)> TraceSink for F {
    fn record(&mut self, event: TraceEvent) {
        self(event)
    }
}

/// A sink discarding every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTrace;

impl TraceSink for NoTrace {
    fn record(&mut self, _: TraceEvent) {}

    fn enabled(&self) -> bool {
        false
    }
}

/// Records an event, building it only if the sink is enabled.
#[inline]
pub(crate) fn emit<S: TraceSink + ?Sized>(sink: &mut S, event: impl FnOnce() -> TraceEvent) {
    if sink.enabled() {
        sink.record(event());
    }
}
