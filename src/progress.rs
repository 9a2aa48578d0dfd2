//! Progress reporting and cancellation support.
//!
//! This module provides [`ProgressCallback`] for monitoring extraction
//! progress, [`CancellationToken`] for cooperative cancellation, and
//! [`ProgressInfo`] for progress snapshots.
//!
//! Progress is measured in bytes of the container consumed by the demuxer
//! and reported as an integer percentage. A callback only fires when that
//! percentage changes, so a full extraction produces at most 101 reports.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use unflv::{ExtractOptions, FlvFile, ProgressCallback, ProgressInfo, UnflvError};
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("{}% complete", info.percentage);
//!     }
//! }
//!
//! let options = ExtractOptions::new().with_progress(Arc::new(PrintProgress));
//! let report = FlvFile::open("download.flv")?.extract_audio_with_options("song", &options)?;
//! println!("wrote {}", report.output_path.display());
//! # Ok::<(), UnflvError>(())
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};

/// A snapshot of extraction progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressInfo {
    /// Completion percentage, `0..=100`, rounded down.
    pub percentage: u8,
    /// Bytes of the container consumed so far.
    pub bytes_read: u64,
    /// Total size of the container in bytes.
    pub total_bytes: u64,
    /// Wall-clock time elapsed since the extraction started.
    pub elapsed: Duration,
}

/// Trait for receiving progress updates during extraction.
///
/// Callbacks run synchronously on the extraction thread; a slow callback
/// slows the extraction down. They are **infallible** and cannot halt the
/// operation. Use [`CancellationToken`] for that.
pub trait ProgressCallback: Send + Sync {
    /// Called each time the integer completion percentage changes.
    fn on_progress(&self, info: &ProgressInfo);
}

/// A no-op implementation that discards all progress notifications.
///
/// This is the default when no callback is configured.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Cooperative cancellation token backed by an [`AtomicBool`].
///
/// Clone this token and share it between threads; call
/// [`cancel`](CancellationToken::cancel) from any thread to stop the
/// associated extraction. The demuxer checks the token once per tag.
///
/// # Example
///
/// ```
/// use unflv::CancellationToken;
///
/// let token = CancellationToken::new();
/// assert!(!token.is_cancelled());
///
/// token.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, non-cancelled token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation.
    ///
    /// All clones of this token will observe the cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Internal helper that converts byte positions into percentage reports.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    total_bytes: u64,
    last_percentage: Option<u8>,
    start_time: Instant,
}

impl ProgressTracker {
    pub(crate) fn new(callback: Arc<dyn ProgressCallback>, total_bytes: u64) -> Self {
        Self {
            callback,
            total_bytes,
            last_percentage: None,
            start_time: Instant::now(),
        }
    }

    /// Record the current read position and fire the callback if the
    /// integer percentage moved.
    pub(crate) fn update(&mut self, bytes_read: u64) {
        let percentage = percentage_of(bytes_read, self.total_bytes);
        if self.last_percentage.is_some_and(|last| percentage <= last) {
            return;
        }
        self.last_percentage = Some(percentage);

        let info = ProgressInfo {
            percentage,
            bytes_read,
            total_bytes: self.total_bytes,
            elapsed: self.start_time.elapsed(),
        };
        self.callback.on_progress(&info);
    }
}

/// `floor(part * 100 / total)`, clamped to 100. An empty total counts as done.
fn percentage_of(part: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let scaled = u128::from(part) * 100 / u128::from(total);
    scaled.min(100) as u8
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct Recorder(Mutex<Vec<u8>>);

    impl ProgressCallback for Recorder {
        fn on_progress(&self, info: &ProgressInfo) {
            self.0.lock().unwrap().push(info.percentage);
        }
    }

    #[test]
    fn percentage_rounds_down() {
        assert_eq!(percentage_of(0, 1000), 0);
        assert_eq!(percentage_of(9, 1000), 0);
        assert_eq!(percentage_of(10, 1000), 1);
        assert_eq!(percentage_of(999, 1000), 99);
        assert_eq!(percentage_of(1000, 1000), 100);
        assert_eq!(percentage_of(5, 0), 100);
        assert_eq!(percentage_of(u64::MAX, u64::MAX), 100);
    }

    #[test]
    fn tracker_reports_each_value_once() {
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        let mut tracker = ProgressTracker::new(recorder.clone(), 200);

        for position in [13, 14, 15, 100, 101, 100, 200, 200] {
            tracker.update(position);
        }

        assert_eq!(*recorder.0.lock().unwrap(), vec![6, 7, 50, 100]);
    }
}
