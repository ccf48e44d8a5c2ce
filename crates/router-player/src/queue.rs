//! Thread-safe bounded queue for mono audio samples.
//!
//! One queue carries exactly one clip's worth of audio between the (blocking)
//! play call and the CPAL output callback:
//! - play call → `push_blocking` + `close()`
//! - CPAL callback drains with `pop_up_to` (non-blocking)
//!
//! `close()` plus the draining semantics make "block until this channel has
//! fully played" deterministic for the caller.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Thread-safe bounded queue of mono `f32` samples.
///
/// ## Design
/// - **Bounded** by `max_queued` to cap memory and latency.
/// - Uses a single [`Condvar`] as a general "state changed" signal.
/// - The `closed` flag is stored *under the same mutex* as the queue to avoid
///   races between the producer finishing and the consumer draining.
pub struct SampleQueue {
    inner: Mutex<QueueInner>,
    cv: Condvar,
    max_queued: usize,
}

struct QueueInner {
    samples: VecDeque<f32>,
    closed: bool,
}

/// Compute a queue capacity in samples for a `(rate, seconds)` target.
///
/// If `buffer_seconds` is non-finite or `<= 0.0`, a safe fallback is used.
pub fn queue_capacity(rate_hz: u32, buffer_seconds: f32) -> usize {
    let secs = if buffer_seconds.is_finite() && buffer_seconds > 0.0 {
        buffer_seconds
    } else {
        2.0
    };

    (rate_hz as f32 * secs).ceil() as usize
}

impl SampleQueue {
    /// Create a new bounded queue holding at most `max_queued` samples.
    pub fn new(max_queued: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                samples: VecDeque::new(),
                closed: false,
            }),
            cv: Condvar::new(),
            max_queued: max_queued.max(1),
        }
    }

    /// Current queued sample count (best-effort snapshot).
    pub fn len(&self) -> usize {
        let g = self.inner.lock().unwrap();
        g.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the producer has finished pushing.
    ///
    /// Closed queues may still contain buffered samples until drained.
    pub fn is_closed(&self) -> bool {
        let g = self.inner.lock().unwrap();
        g.closed
    }

    /// Mark the queue as finished and wake all waiters.
    ///
    /// After this, a blocked `push_blocking` returns early and drops its
    /// remaining samples. Idempotent.
    pub fn close(&self) {
        let mut g = self.inner.lock().unwrap();
        g.closed = true;
        drop(g);
        self.cv.notify_all();
    }

    /// Push samples into the queue, blocking while the queue is full.
    ///
    /// If the queue is closed while waiting, this returns early and drops the
    /// remaining samples.
    pub fn push_blocking(&self, samples: &[f32]) {
        let mut offset = 0;

        while offset < samples.len() {
            let mut g = self.inner.lock().unwrap();

            while g.samples.len() >= self.max_queued && !g.closed {
                g = self.cv.wait(g).unwrap();
            }
            if g.closed {
                return;
            }

            let mut pushed_any = false;
            while offset < samples.len() && g.samples.len() < self.max_queued {
                g.samples.push_back(samples[offset]);
                offset += 1;
                pushed_any = true;
            }

            drop(g);
            if pushed_any {
                self.cv.notify_all();
            }
        }
    }

    /// Pop up to `max_samples` without blocking.
    ///
    /// Returns `None` when the queue is currently empty. The audio callback
    /// must never wait, so there is no blocking variant.
    pub fn pop_up_to(&self, max_samples: usize) -> Option<Vec<f32>> {
        let mut g = self.inner.lock().unwrap();

        let take = g.samples.len().min(max_samples);
        if take == 0 {
            return None;
        }

        let out: Vec<f32> = g.samples.drain(..take).collect();
        drop(g);
        self.cv.notify_all();
        Some(out)
    }
}

/// Block until `q` is closed+empty OR `failed` becomes true.
///
/// Returns `true` if the queue drained normally, `false` if the stream error
/// callback raised the failure flag first.
pub fn wait_until_drained_or_failed(q: &Arc<SampleQueue>, failed: &Arc<AtomicBool>) -> bool {
    let mut g = q.inner.lock().unwrap();
    loop {
        if failed.load(Ordering::Relaxed) {
            return false;
        }

        if g.closed && g.samples.is_empty() {
            return true;
        }

        let (ng, _timeout) = q.cv.wait_timeout(g, Duration::from_millis(50)).unwrap();
        g = ng;
    }
}
