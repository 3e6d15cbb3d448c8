//! Background status reporter.
use crossbeam::channel::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Monotonic counters shared with the reporter thread.
#[derive(Debug, Default)]
pub struct Counters {
    pub records: AtomicU64,
    pub groups: AtomicU64,
    pub emitted: AtomicU64,
}

impl Counters {
    pub fn add_records(&self, n: u64) {
        self.records.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_group(&self, emitted: u64) {
        self.groups.fetch_add(1, Ordering::Relaxed);
        self.emitted.fetch_add(emitted, Ordering::Relaxed);
    }

    fn log(&self) {
        tracing::info!(
            records = self.records.load(Ordering::Relaxed),
            groups = self.groups.load(Ordering::Relaxed),
            emitted = self.emitted.load(Ordering::Relaxed),
            "progress"
        );
    }
}

pub struct StatusReporter {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

impl StatusReporter {
    pub fn spawn(counters: Arc<Counters>, interval: Duration) -> Self {
        let (stop, rx) = channel::bounded::<()>(1);
        let handle = thread::spawn(move || {
            loop {
                match rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => counters.log(),
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        });
        Self { stop, handle }
    }

    pub fn stop(self) {
        let _ = self.stop.send(());
        if self.handle.join().is_err() {
            tracing::warn!("status reporter thread panicked");
        }
    }
}
