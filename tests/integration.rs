//! Integration tests for `hosts-sync`.
//!
//! Every test drives the full loop against a scratch hosts file in a
//! tempdir; nothing touches the real `/etc/hosts`.

use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hosts_sync::{
    LabelSelector, PodLister, PodStatus, QueryError, StaticLister, SyncConfig, SyncEngine,
    stop_channel, trigger_channel,
};
use tokio::sync::{Notify, Semaphore};

const SECTION: &str =
    "# Generate by Rainbond. DO NOT EDIT\n10.0.0.5 registry.local\n# End of Section\n";

fn config(path: &Path) -> SyncConfig {
    SyncConfig::new("rbd", "name=rbd-hub", "registry.local").with_hosts_path(path)
}

fn ready_hub() -> StaticLister {
    StaticLister::new().with_pod(
        "rbd",
        [("name", "rbd-hub")],
        PodStatus::new("rbd-hub-0", Some("10.0.0.5".parse().unwrap()), true),
    )
}

async fn wait_for_content(path: &Path, expected: &str) {
    for _ in 0..500 {
        if std::fs::read_to_string(path).unwrap() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("hosts file never reached expected content");
}

/// Counts queries and holds each one until the test releases it.
struct GatedLister {
    inner: StaticLister,
    calls: AtomicUsize,
    entered: Notify,
    gate: Semaphore,
}

#[async_trait]
impl PodLister for GatedLister {
    async fn list_pods(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<PodStatus>, QueryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        self.gate.acquire().await?.forget();
        self.inner.list_pods(namespace, selector).await
    }
}

/// Log sink shared between the subscriber and the test.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn lines(&self) -> Vec<String> {
        let bytes = self.0.lock().unwrap();
        String::from_utf8_lossy(&bytes)
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Runs one triggered loop pass over `path` and returns the cycle count.
async fn run_once<L: PodLister>(path: &Path, lister: L) -> usize {
    let (trigger, queue) = trigger_channel();
    let (_stop, signal) = stop_channel();
    let engine = SyncEngine::new(config(path), lister, queue, signal).unwrap();
    assert!(trigger.fire());
    drop(trigger);
    engine.run().await
}

// ---------------------------------------------------------------------------
// Loop behaviour
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sync_cycle_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hosts");
    std::fs::write(&path, "10.0.0.1 other.local\n").unwrap();

    let (trigger, queue) = trigger_channel();
    let (_stop, signal) = stop_channel();
    let engine = SyncEngine::new(config(&path), ready_hub(), queue, signal).unwrap();
    let handle = tokio::spawn(engine.run());

    let expected = format!("10.0.0.1 other.local\n{SECTION}");
    assert!(trigger.fire());
    wait_for_content(&path, &expected).await;

    // Second cycle with the same endpoint; the buffered trigger is drained
    // before the loop sees the queue close.
    assert!(trigger.fire());
    drop(trigger);
    assert_eq!(handle.await.unwrap(), 2);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), expected);
}

#[tokio::test]
async fn stop_ends_loop_without_cycles() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hosts");
    std::fs::write(&path, "10.0.0.1 other.local\n").unwrap();

    let (trigger, queue) = trigger_channel();
    let (stop, signal) = stop_channel();
    let engine = SyncEngine::new(config(&path), ready_hub(), queue, signal).unwrap();

    assert!(stop.stop());
    assert!(!stop.stop());
    // Already pending when the loop starts; stop wins.
    assert!(trigger.fire());

    assert_eq!(engine.run().await, 0);
    assert!(trigger.is_closed());
    assert!(!trigger.fire());
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "10.0.0.1 other.local\n"
    );
}

#[tokio::test]
async fn bursts_collapse_into_one_resync() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hosts");
    std::fs::write(&path, "").unwrap();

    let lister = Arc::new(GatedLister {
        inner: ready_hub(),
        calls: AtomicUsize::new(0),
        entered: Notify::new(),
        gate: Semaphore::new(0),
    });
    let (trigger, queue) = trigger_channel();
    let (_stop, signal) = stop_channel();
    let engine = SyncEngine::new(config(&path), Arc::clone(&lister), queue, signal).unwrap();
    let handle = tokio::spawn(engine.run());

    assert!(trigger.fire());
    lister.entered.notified().await;

    // The first cycle is blocked in the query: one slot, then coalescing.
    let accepted = (0..5).filter(|_| trigger.fire()).count();
    assert_eq!(accepted, 1);

    lister.gate.add_permits(10);
    drop(trigger);
    assert_eq!(handle.await.unwrap(), 2);
    assert_eq!(lister.calls.load(Ordering::SeqCst), 2);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), SECTION);
}

// ---------------------------------------------------------------------------
// Failure isolation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_cycles_do_not_stop_the_loop() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hosts");
    let corrupted = "10.0.0.1 other.local\n# Generate by Rainbond. DO NOT EDIT\n10.0.0.4 registry.local\n";
    std::fs::write(&path, corrupted).unwrap();

    let (trigger, queue) = trigger_channel();
    let (_stop, signal) = stop_channel();
    let engine = SyncEngine::new(config(&path), ready_hub(), queue, signal).unwrap();
    let handle = tokio::spawn(engine.run());

    assert!(trigger.fire());
    // Give the loop a moment to process the corrupted file, then repair it.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(std::fs::read_to_string(&path).unwrap(), corrupted);

    std::fs::write(&path, "10.0.0.1 other.local\n").unwrap();
    assert!(trigger.fire());
    wait_for_content(&path, &format!("10.0.0.1 other.local\n{SECTION}")).await;

    drop(trigger);
    assert_eq!(handle.await.unwrap(), 2);
}

#[tokio::test]
async fn unresolved_endpoint_keeps_previous_section() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hosts");
    let content = format!("10.0.0.1 other.local\n{SECTION}");
    std::fs::write(&path, &content).unwrap();

    let not_ready = StaticLister::new().with_pod(
        "rbd",
        [("name", "rbd-hub")],
        PodStatus::new("rbd-hub-0", Some("10.0.0.8".parse().unwrap()), false),
    );
    let (trigger, queue) = trigger_channel();
    let (_stop, signal) = stop_channel();
    let engine = SyncEngine::new(config(&path), not_ready, queue, signal).unwrap();
    let handle = tokio::spawn(engine.run());

    assert!(trigger.fire());
    drop(trigger);
    assert_eq!(handle.await.unwrap(), 1);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), content);
}

#[tokio::test]
async fn failures_are_logged_by_kind() {
    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hosts");
    std::fs::write(&path, "10.0.0.1 other.local\n").unwrap();
    let not_ready = StaticLister::new().with_pod(
        "rbd",
        [("name", "rbd-hub")],
        PodStatus::new("rbd-hub-0", Some("10.0.0.8".parse().unwrap()), false),
    );
    assert_eq!(run_once(&path, not_ready).await, 1);

    std::fs::write(
        &path,
        "10.0.0.1 other.local\n# Generate by Rainbond. DO NOT EDIT\n10.0.0.4 registry.local\n",
    )
    .unwrap();
    assert_eq!(run_once(&path, ready_hub()).await, 1);

    let lines = logs.lines();
    let count = |level: &str, kind: &str| {
        lines
            .iter()
            .filter(|l| l.contains(level) && l.contains(kind))
            .count()
    };
    assert_eq!(count(" WARN ", "kind=resolution_not_found"), 1, "{lines:#?}");
    assert_eq!(count(" ERROR ", "kind=structural_integrity"), 1, "{lines:#?}");
    assert_eq!(lines.iter().filter(|l| l.contains(" WARN ")).count(), 1);
    assert_eq!(lines.iter().filter(|l| l.contains(" ERROR ")).count(), 1);
}

#[tokio::test]
async fn non_utf8_hosts_file_is_synced() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hosts");
    let preamble: &[u8] = b"127.0.0.1 localhost\n# caf\xe9 entries\n10.0.0.1 other.local\n";
    std::fs::write(&path, preamble).unwrap();

    assert_eq!(run_once(&path, ready_hub()).await, 1);
    let mut expected = preamble.to_vec();
    expected.extend_from_slice(SECTION.as_bytes());
    assert_eq!(std::fs::read(&path).unwrap(), expected);
}

// ---------------------------------------------------------------------------
// File preservation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unrelated_lines_survive_many_cycles() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hosts");
    let preamble = "127.0.0.1\tlocalhost\n::1 localhost ip6-localhost\n\n# static entries\nnot-an-ip stray.local\n10.0.0.1 other.local # keep\n";
    std::fs::write(&path, preamble).unwrap();

    let (_trigger, queue) = trigger_channel();
    let (_stop, signal) = stop_channel();
    let mut engine = SyncEngine::new(config(&path), ready_hub(), queue, signal).unwrap();

    for _ in 0..3 {
        engine.run_cycle().await.unwrap();
    }

    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content, format!("{preamble}{SECTION}"));
    assert_eq!(
        content
            .matches("# Generate by Rainbond. DO NOT EDIT")
            .count(),
        1
    );
    assert_eq!(content.matches("# End of Section").count(), 1);

    let doc = engine.document().unwrap();
    assert!(doc.lines()[4].parse_error.is_some());
    assert_eq!(
        doc.hostnames_for("10.0.0.5".parse().unwrap()).unwrap(),
        ["registry.local"]
    );
}
