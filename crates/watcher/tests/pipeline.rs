//! Full intake pipeline: event source -> coalescer -> journal -> barrier

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use chronicle_core::{ChangeNotification, Dtype, SmallChange};
use chronicle_journal::{changes_since, ChangesSinceParams, Journal, JournalConfig};
use chronicle_watcher::{
    Coalescer, ContentId, DeliveryMode, EventSource, IngestPump, RawEvent, SyncBarrier,
    SyncOutcome,
};

fn init_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Test double for an asynchronous-delivery backend: events and flush
/// markers both travel the ordered ingest channel.
struct ChannelSource {
    mode: DeliveryMode,
    events: mpsc::UnboundedSender<Vec<RawEvent>>,
    /// A stalled backend accepts flush requests but never echoes them
    stalled: bool,
}

impl EventSource for ChannelSource {
    fn delivery_mode(&self) -> DeliveryMode {
        self.mode
    }

    fn request_flush(&self, token: u64) -> anyhow::Result<()> {
        if self.stalled {
            return Ok(());
        }
        self.events
            .send(vec![RawEvent::FlushMarker { token }])
            .map_err(|_| anyhow::anyhow!("ingest channel closed"))
    }
}

struct Pipeline {
    journal: Arc<Journal>,
    barrier: Arc<SyncBarrier>,
    events: mpsc::UnboundedSender<Vec<RawEvent>>,
}

fn pipeline(mode: DeliveryMode, stalled: bool, timeout: Duration) -> Pipeline {
    let journal = Arc::new(Journal::new(&JournalConfig::default()));
    let (tx, rx) = mpsc::unbounded_channel();
    let source = Arc::new(ChannelSource {
        mode,
        events: tx.clone(),
        stalled,
    });
    let barrier = Arc::new(SyncBarrier::new(source, timeout));
    IngestPump::new(
        Arc::clone(&journal),
        Coalescer::new(mode),
        Arc::clone(&barrier),
    )
    .spawn(rx);
    Pipeline {
        journal,
        barrier,
        events: tx,
    }
}

fn created(path: &str, content: &[u8]) -> RawEvent {
    RawEvent::Created {
        path: path.into(),
        dtype: Dtype::Regular,
        content: Some(ContentId::of_bytes(content)),
    }
}

#[tokio::test]
async fn synchronize_makes_prior_writes_visible() {
    init_logging();
    let p = pipeline(DeliveryMode::Coalesced, false, Duration::from_secs(5));
    let before = p.journal.current_position();

    p.events
        .send(vec![
            created("a", b"a bytes"),
            RawEvent::Modified {
                path: "a".into(),
                dtype: Dtype::Regular,
            },
        ])
        .unwrap();

    assert_eq!(p.barrier.synchronize().await, SyncOutcome::Synchronized);

    let result = changes_since(&p.journal, before, &ChangesSinceParams::default()).unwrap();
    // Coalesced backend: the create+write pair folded into one Added
    assert_eq!(
        result.changes,
        vec![ChangeNotification::Small(SmallChange::Added {
            path: "a".into(),
            dtype: Dtype::Regular,
        })]
    );
}

#[tokio::test]
async fn synchronous_pipeline_reports_create_then_write() {
    init_logging();
    let p = pipeline(DeliveryMode::Synchronous, false, Duration::from_secs(5));
    let before = p.journal.current_position();

    p.events
        .send(vec![
            created("f", b"contents"),
            RawEvent::Modified {
                path: "f".into(),
                dtype: Dtype::Regular,
            },
        ])
        .unwrap();

    // Synchronous delivery: the barrier is a no-op, so poll for the pump
    assert_eq!(p.barrier.synchronize().await, SyncOutcome::Synchronized);
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let result =
            changes_since(&p.journal, before, &ChangesSinceParams::default()).unwrap();
        if result.changes.len() == 2 {
            assert!(matches!(
                result.changes[0],
                ChangeNotification::Small(SmallChange::Added { .. })
            ));
            assert!(matches!(
                result.changes[1],
                ChangeNotification::Small(SmallChange::Modified { .. })
            ));
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "pump never caught up");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn rename_with_identical_content_collapses_through_the_pipeline() {
    init_logging();
    let p = pipeline(DeliveryMode::Coalesced, false, Duration::from_secs(5));
    let before = p.journal.current_position();

    p.events
        .send(vec![
            RawEvent::Removed {
                path: "old_name".into(),
                dtype: Dtype::Regular,
                content: Some(ContentId::of_bytes(b"same")),
            },
            created("new_name", b"same"),
        ])
        .unwrap();
    p.barrier.synchronize().await;

    let result = changes_since(&p.journal, before, &ChangesSinceParams::default()).unwrap();
    assert_eq!(
        result.changes,
        vec![ChangeNotification::Small(SmallChange::Renamed {
            from: "old_name".into(),
            to: "new_name".into(),
            dtype: Dtype::Regular,
        })]
    );
}

#[tokio::test]
async fn stalled_backend_times_out_and_queries_still_work() {
    init_logging();
    let p = pipeline(DeliveryMode::Coalesced, true, Duration::from_millis(50));
    let before = p.journal.current_position();

    p.events.send(vec![created("f", b"x")]).unwrap();
    assert_eq!(p.barrier.synchronize().await, SyncOutcome::TimedOut);

    // The timeout does not poison the subsequent query
    let result = changes_since(&p.journal, before, &ChangesSinceParams::default());
    assert!(result.is_ok());
}

#[tokio::test]
async fn interleaved_synchronize_calls_each_observe_their_prefix() {
    init_logging();
    let p = pipeline(DeliveryMode::Coalesced, false, Duration::from_secs(5));
    let mut cursor = p.journal.current_position();

    for round in 0..5 {
        p.events
            .send(vec![created(&format!("round{round}"), b"data")])
            .unwrap();
        assert_eq!(p.barrier.synchronize().await, SyncOutcome::Synchronized);
        let result = changes_since(&p.journal, cursor, &ChangesSinceParams::default()).unwrap();
        assert_eq!(result.changes.len(), 1, "round {round}");
        cursor = result.to_position;
    }
}
