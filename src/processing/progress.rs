//! Progress reporting for processing and apply runs

use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc::UnboundedSender;

/// One progress update: `current` of `total` items finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub current: usize,
    pub total: usize,
}

/// Receiver of progress updates
///
/// Called from worker tasks, so updates may arrive out of order. The last
/// update of a run always has `current == total`.
pub trait ProgressSink: Send + Sync {
    fn report(&self, current: usize, total: usize);
}

impl<F> ProgressSink for F
where
    F: Fn(usize, usize) + Send + Sync,
{
    fn report(&self, current: usize, total: usize) {
        self(current, total)
    }
}

/// Discards every update
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _current: usize, _total: usize) {}
}

/// Forwards updates into a channel; a closed receiver is ignored
#[derive(Debug, Clone)]
pub struct ChannelProgress(pub UnboundedSender<Progress>);

impl ProgressSink for ChannelProgress {
    fn report(&self, current: usize, total: usize) {
        let _ = self.0.send(Progress { current, total });
    }
}

/// Keeps the highest `current` seen, for callers that only care about the high-water mark
#[derive(Debug, Default)]
pub struct MaxProgress {
    current: AtomicUsize,
    total: AtomicUsize,
    updates: AtomicUsize,
}

impl MaxProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

impl ProgressSink for MaxProgress {
    fn report(&self, current: usize, total: usize) {
        self.current.fetch_max(current, Ordering::SeqCst);
        self.total.store(total, Ordering::SeqCst);
        self.updates.fetch_add(1, Ordering::SeqCst);
    }
}
