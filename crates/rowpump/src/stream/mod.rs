//! The row stream coupling producers and consumers.
//!
//! A [`RowStream`] is a bounded channel of typed rows plus a *prelude*: rows
//! the producer buffered up front so the consumer can infer a schema before
//! the first row is published. The prelude is an explicit buffer yielded
//! before the channel is first polled, which keeps cancellation during
//! inference clean.
//!
//! Each stream has exactly one producer ([`RowSender`]). Consumers observe
//! every row at most once and see the channel close exactly once. `closed`
//! reports whether the producer finished of its own accord; a cancelled or
//! failed producer leaves it false.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::{Column, Dataset, Row};

/// Default channel capacity for cursor-paced streams.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Channel capacity for warehouse fan-in streams.
pub const FANIN_CAPACITY: usize = 100_000;

#[derive(Debug, Default)]
struct StreamShared {
    /// Rows ever placed onto the stream, prelude included.
    count: AtomicU64,
    /// Set only on natural completion of the producer.
    closed: AtomicBool,
}

/// Producer handle for a [`RowStream`].
///
/// Cloneable so fan-in streams can hand one handle per worker; the channel
/// closes when every clone is dropped, and `finish` on the coordinator's
/// handle records natural completion.
#[derive(Clone)]
pub struct RowSender {
    tx: mpsc::Sender<Row>,
    shared: Arc<StreamShared>,
    cancel: CancellationToken,
}

impl RowSender {
    /// Send one row downstream.
    ///
    /// Returns `false` when the stream is cancelled or the consumer is
    /// gone; the producer must stop promptly in that case.
    pub async fn send(&self, row: Row) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            sent = self.tx.send(row) => {
                if sent.is_ok() {
                    self.shared.count.fetch_add(1, Ordering::Relaxed);
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Blocking variant for producers running under `spawn_blocking`.
    pub fn blocking_send(&self, row: Row) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        if self.tx.blocking_send(row).is_ok() {
            self.shared.count.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Mark natural completion and close the channel.
    ///
    /// Dropping the sender without calling this also closes the channel,
    /// but leaves `closed` false so callers can tell completion from
    /// cancellation or producer failure.
    pub fn finish(self) {
        self.shared.closed.store(true, Ordering::Release);
    }
}

/// Consumer side of a row stream.
pub struct RowStream {
    pub columns: Vec<Column>,
    prelude: VecDeque<Row>,
    rx: mpsc::Receiver<Row>,
    shared: Arc<StreamShared>,
    cancel: CancellationToken,
}

impl RowStream {
    /// Create a bounded stream. The producer keeps the [`RowSender`]; the
    /// consumer keeps the [`RowStream`]. `cancel` should be a child of the
    /// owning adapter's token so `kill` reaches in-flight streams.
    pub fn channel(capacity: usize, cancel: CancellationToken) -> (RowSender, RowStream) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let shared = Arc::new(StreamShared::default());
        let sender = RowSender {
            tx,
            shared: Arc::clone(&shared),
            cancel: cancel.clone(),
        };
        let stream = RowStream {
            columns: Vec::new(),
            prelude: VecDeque::new(),
            rx,
            shared,
            cancel,
        };
        (sender, stream)
    }

    /// A stream over already-materialized rows, used by tests and by the
    /// CSV sampling path.
    pub fn from_dataset(data: Dataset) -> RowStream {
        let cancel = CancellationToken::new();
        let (sender, mut stream) = RowStream::channel(1, cancel);
        stream.columns = data.columns;
        for row in data.rows {
            stream.push_prelude(row);
        }
        sender.finish();
        stream
    }

    /// Buffer a row into the prelude. Producer-side only, before the
    /// consumer starts polling.
    pub fn push_prelude(&mut self, row: Row) {
        self.shared.count.fetch_add(1, Ordering::Relaxed);
        self.prelude.push_back(row);
    }

    /// The buffered prelude as a dataset, for schema inference and DDL
    /// synthesis. Does not consume the rows.
    pub fn prelude_dataset(&self) -> Dataset {
        Dataset::new(
            self.columns.clone(),
            self.prelude.iter().cloned().collect(),
        )
    }

    /// Next row: prelude first, then the channel, `None` once the channel
    /// is closed and drained.
    pub async fn next(&mut self) -> Option<Row> {
        if let Some(row) = self.prelude.pop_front() {
            return Some(row);
        }
        self.rx.recv().await
    }

    /// Rows ever placed onto the stream.
    pub fn count(&self) -> u64 {
        self.shared.count.load(Ordering::Relaxed)
    }

    /// True iff the producer finished naturally.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Ask the producer to stop; pending consumers will observe the
    /// channel close.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Drain the stream into a dataset.
    pub async fn collect(mut self) -> Dataset {
        let mut rows = Vec::new();
        while let Some(row) = self.next().await {
            rows.push(row);
        }
        Dataset::new(self.columns, rows)
    }
}
