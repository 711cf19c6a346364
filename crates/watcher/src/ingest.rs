//! The ingest pump: the single logical writer for a mount's journal
//!
//! Raw event batches arrive on an unbounded channel (event sources are
//! never backpressured), get coalesced, and are appended in order. Flush
//! markers fire only after every event that preceded them in the stream
//! has been appended, which is what makes the barrier handshake honest.

use std::mem;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use chronicle_journal::Journal;

use crate::barrier::SyncBarrier;
use crate::coalesce::Coalescer;
use crate::RawEvent;

pub struct IngestPump {
    journal: Arc<Journal>,
    coalescer: Coalescer,
    barrier: Arc<SyncBarrier>,
}

impl IngestPump {
    pub fn new(journal: Arc<Journal>, coalescer: Coalescer, barrier: Arc<SyncBarrier>) -> Self {
        Self {
            journal,
            coalescer,
            barrier,
        }
    }

    /// Run on a background task until the event channel closes
    pub fn spawn(self, events: mpsc::UnboundedReceiver<Vec<RawEvent>>) -> JoinHandle<()> {
        tokio::spawn(self.run(events))
    }

    pub async fn run(self, mut events: mpsc::UnboundedReceiver<Vec<RawEvent>>) {
        while let Some(batch) = events.recv().await {
            trace!(len = batch.len(), "ingest batch");
            self.process(batch);
        }
        debug!("event channel closed, ingest pump stopping");
    }

    /// Append one batch. Markers split the batch: everything before a
    /// marker is coalesced and appended before the marker is observed.
    fn process(&self, batch: Vec<RawEvent>) {
        let mut run: Vec<RawEvent> = Vec::new();
        for event in batch {
            match event {
                RawEvent::FlushMarker { token } => {
                    self.flush(&mut run);
                    self.barrier.observe_marker(token);
                }
                other => run.push(other),
            }
        }
        self.flush(&mut run);
    }

    fn flush(&self, run: &mut Vec<RawEvent>) {
        if run.is_empty() {
            return;
        }
        for change in self.coalescer.coalesce(mem::take(run)) {
            self.journal.append(change);
        }
    }
}
