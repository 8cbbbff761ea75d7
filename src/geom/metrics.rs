//! Opt-in phase timings for the trimming pipeline.
//!
//! Timing is collected only when the `metrics` feature is enabled and the
//! target is not `wasm32` (`std::time::Instant` is unavailable there). In every
//! other configuration the calls below compile down to invoking the closure.
//!
//! ```ignore
//! use trim_engine::geom::{TimingBucket, TrimMetrics};
//!
//! let mut metrics = TrimMetrics::default();
//! metrics.begin();
//! let loops = metrics.time(TimingBucket::Chaining, || chain_into_loops(segments, &ctx))?;
//! if let Some(report) = metrics.end() {
//!     println!("chaining: {} ns", report.chaining_ns);
//! }
//! ```

use serde::Serialize;

/// Pipeline phases that accumulate wall time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimingBucket {
    /// Trimming curves to polylines.
    Approximation,
    /// Segment chaining and healing.
    Chaining,
    /// Subdivision-line re-trimming.
    Retrim,
    /// Loop nesting and island merging.
    Classification,
    /// Ear clipping and rectangle triangulation.
    Triangulation,
    /// Surface evaluation and vertex welding.
    Evaluation,
}

/// Cumulative nanoseconds per [`TimingBucket`].
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct TrimTimingReport {
    pub approximation_ns: u64,
    pub chaining_ns: u64,
    pub retrim_ns: u64,
    pub classification_ns: u64,
    pub triangulation_ns: u64,
    pub evaluation_ns: u64,
}

impl TrimTimingReport {
    #[must_use]
    pub fn total_ns(&self) -> u64 {
        self.approximation_ns
            .saturating_add(self.chaining_ns)
            .saturating_add(self.retrim_ns)
            .saturating_add(self.classification_ns)
            .saturating_add(self.triangulation_ns)
            .saturating_add(self.evaluation_ns)
    }

    #[must_use]
    pub fn total_ms(&self) -> f64 {
        self.total_ns() as f64 / 1_000_000.0
    }

    /// Mutable counter for `bucket`.
    pub fn bucket_mut(&mut self, bucket: TimingBucket) -> &mut u64 {
        match bucket {
            TimingBucket::Approximation => &mut self.approximation_ns,
            TimingBucket::Chaining => &mut self.chaining_ns,
            TimingBucket::Retrim => &mut self.retrim_ns,
            TimingBucket::Classification => &mut self.classification_ns,
            TimingBucket::Triangulation => &mut self.triangulation_ns,
            TimingBucket::Evaluation => &mut self.evaluation_ns,
        }
    }
}

/// Accumulator handed through one polygonization run.
///
/// Without the `metrics` feature (or on wasm) this is a zero-sized no-op and
/// [`end`](Self::end) returns `None`.
#[derive(Debug, Default)]
pub struct TrimMetrics {
    #[cfg(all(feature = "metrics", not(target_arch = "wasm32")))]
    report: TrimTimingReport,
}

impl TrimMetrics {
    /// Resets all counters.
    pub fn begin(&mut self) {
        #[cfg(all(feature = "metrics", not(target_arch = "wasm32")))]
        {
            self.report = TrimTimingReport::default();
        }
    }

    #[must_use]
    pub fn end(&self) -> Option<TrimTimingReport> {
        #[cfg(all(feature = "metrics", not(target_arch = "wasm32")))]
        {
            Some(self.report.clone())
        }
        #[cfg(not(all(feature = "metrics", not(target_arch = "wasm32"))))]
        {
            None
        }
    }

    /// Runs `f` and adds its elapsed time to `bucket`.
    pub fn time<R>(&mut self, bucket: TimingBucket, f: impl FnOnce() -> R) -> R {
        #[cfg(all(feature = "metrics", not(target_arch = "wasm32")))]
        {
            let start = std::time::Instant::now();
            let result = f();
            let nanos = start.elapsed().as_nanos().min(u128::from(u64::MAX)) as u64;
            let slot = self.report.bucket_mut(bucket);
            *slot = slot.saturating_add(nanos);
            result
        }

        #[cfg(not(all(feature = "metrics", not(target_arch = "wasm32"))))]
        {
            let _ = bucket;
            f()
        }
    }
}
