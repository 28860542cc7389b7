use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Progress report emitted after each chunk the server accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Session id the server returned for the chunk.
    pub upload_id: String,
    /// Chunks accepted so far, including this one.
    pub chunks_completed: u64,
    /// Failed upload attempts so far (each retried attempt counts once).
    pub chunks_failed: u64,
    /// Bytes the server has accepted (the session offset).
    pub bytes_transferred: u64,
    /// Caller-supplied total size, if any.
    pub total_size_hint: Option<u64>,
}

impl ProgressEvent {
    /// Fraction done in `[0.0, 1.0]`, if a non-zero size hint is known.
    pub fn fraction(&self) -> Option<f64> {
        match self.total_size_hint {
            Some(total) if total > 0 => {
                Some((self.bytes_transferred as f64 / total as f64).clamp(0.0, 1.0))
            }
            _ => None,
        }
    }
}

/// Callback invoked with upload progress.
pub type ProgressCallback = Box<dyn Fn(ProgressEvent) + Send + Sync>;

// ---------------------------------------------------------------------------
// ThroughputMeter
// ---------------------------------------------------------------------------

/// Estimates upload throughput from acknowledged offsets over a sliding window.
pub struct ThroughputMeter {
    inner: Mutex<MeterInner>,
}

struct MeterInner {
    samples: VecDeque<(Instant, u64)>,
    window: Duration,
    max_samples: usize,
}

impl ThroughputMeter {
    /// Creates a meter.
    ///
    /// - `window`: time span considered (default 5 s).
    /// - `max_samples`: retained samples (default 100).
    pub fn new(window: Option<Duration>, max_samples: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(MeterInner {
                samples: VecDeque::new(),
                window: window.unwrap_or(Duration::from_secs(5)),
                max_samples: max_samples.unwrap_or(100).max(2),
            }),
        }
    }

    /// Records that the server acknowledged `offset` bytes now.
    pub fn record(&self, offset: u64) {
        self.record_at(Instant::now(), offset);
    }

    /// Records an acknowledged offset at a given instant.
    pub fn record_at(&self, at: Instant, offset: u64) {
        let Ok(mut m) = self.inner.lock() else {
            return;
        };
        m.samples.push_back((at, offset));

        let window = m.window;
        while m
            .samples
            .front()
            .is_some_and(|(t, _)| at.saturating_duration_since(*t) > window)
        {
            m.samples.pop_front();
        }
        while m.samples.len() > m.max_samples {
            m.samples.pop_front();
        }
    }

    /// Average bytes per second across the retained samples.
    ///
    /// Returns 0.0 with fewer than 2 samples.
    pub fn bytes_per_second(&self) -> f64 {
        let Ok(m) = self.inner.lock() else {
            return 0.0;
        };
        let (Some(&(t0, first)), Some(&(t1, last))) = (m.samples.front(), m.samples.back())
        else {
            return 0.0;
        };
        let elapsed = t1.saturating_duration_since(t0);
        if elapsed.is_zero() || last <= first {
            return 0.0;
        }
        (last - first) as f64 / elapsed.as_secs_f64()
    }

    /// Estimated time to reach `total` bytes from the latest offset.
    ///
    /// Returns `None` if the rate is unknown.
    pub fn eta(&self, total: u64) -> Option<Duration> {
        let speed = self.bytes_per_second();
        if speed <= 0.0 {
            return None;
        }
        let latest = self
            .inner
            .lock()
            .ok()
            .and_then(|m| m.samples.back().map(|&(_, offset)| offset))
            .unwrap_or(0);
        let remaining = total.saturating_sub(latest);
        Some(Duration::from_secs_f64(remaining as f64 / speed))
    }

    /// Clears all samples.
    pub fn reset(&self) {
        if let Ok(mut m) = self.inner.lock() {
            m.samples.clear();
        }
    }
}
