//! Common test utilities for integration tests
//!
//! Provides shared fixtures and helpers used across multiple integration
//! test files.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use taskforge::{EventBus, Scheduler, Subtask, SubtaskKind};

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
/// Call this at the beginning of tests that need logging.
#[allow(dead_code)]
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Wait for an async condition to be true with timeout
///
/// Polls the predicate every 10ms until it returns true or the timeout
/// elapses. Returns whether the condition was met.
#[allow(dead_code)]
pub async fn wait_for<F, Fut>(mut predicate: F, timeout_ms: u64) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = Instant::now();
    let timeout = Duration::from_millis(timeout_ms);

    while start.elapsed() < timeout {
        if predicate().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    false
}

/// Scheduler on a fresh bus.
#[allow(dead_code)]
pub fn scheduler() -> (Arc<Scheduler>, Arc<EventBus>) {
    let bus = Arc::new(EventBus::new());
    (Arc::new(Scheduler::new(Arc::clone(&bus))), bus)
}

/// Implementation subtask with no dependencies.
#[allow(dead_code)]
pub fn implementation(task_id: &str, id: &str) -> Subtask {
    Subtask::new(id, task_id, format!("Implement {id}")).with_kind(SubtaskKind::Implementation)
}
