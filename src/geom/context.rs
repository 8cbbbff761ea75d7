//! Explicit configuration threaded through every trimming entry point.

use serde::{Deserialize, Serialize};

use super::core::Tolerance;
use super::trim::TrimError;

/// Observer invoked for every fatal condition before it propagates.
///
/// A hook may panic to turn errors into process termination.
pub type FatalHook = fn(&TrimError);

/// How a trimming curve is sampled into a polyline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolylineMethod {
    /// `samples` points per knot span, evenly spaced in parameter.
    Uniform,
    /// Sample density follows local curvature.
    CurvatureAdaptive,
    /// Recursive bisection until the chord deviation is within `tolerance`.
    #[default]
    ChordalError,
}

/// Piecewise-linear approximation settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolylineOptions {
    pub method: PolylineMethod,
    /// Maximum chord deviation in parameter units.
    pub tolerance: f64,
    /// Samples per knot span for `Uniform`, minimum for the adaptive methods.
    pub samples: usize,
    /// Hard cap on segments produced for one curve.
    pub max_segments: usize,
}

impl Default for PolylineOptions {
    fn default() -> Self {
        Self {
            method: PolylineMethod::ChordalError,
            tolerance: 1e-3,
            samples: 8,
            max_segments: 4096,
        }
    }
}

impl PolylineOptions {
    /// Same settings, tolerance never coarser than `max_tolerance`.
    #[must_use]
    pub fn no_coarser_than(self, max_tolerance: f64) -> Self {
        let tolerance = if max_tolerance.is_finite() && max_tolerance > 0.0 {
            self.tolerance.min(max_tolerance)
        } else {
            self.tolerance
        };
        Self { tolerance, ..self }
    }
}

/// Geometric tolerance escalation used while chaining segments into loops.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainOptions {
    pub start: f64,
    pub growth: f64,
    pub max: f64,
}

impl Default for ChainOptions {
    fn default() -> Self {
        Self {
            start: 1e-9,
            growth: 10.0,
            max: 1.0,
        }
    }
}

impl ChainOptions {
    /// The escalation ladder, ending exactly at `max`.
    #[must_use]
    pub fn levels(&self) -> Vec<f64> {
        let growth = if self.growth > 1.0 { self.growth } else { 10.0 };
        let max = self.max.max(self.start);
        let mut levels = Vec::new();
        let mut tol = self.start.max(f64::MIN_POSITIVE);
        while tol < max * (1.0 - 1e-6) {
            levels.push(tol);
            tol *= growth;
        }
        levels.push(max);
        levels
    }
}

/// Settings shared by chaining, re-trimming, classification and polygonization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrimContext {
    /// Snapping and coincidence tolerance in parameter units.
    pub tolerance: Tolerance,
    /// Allowed overshoot of trimming curves beyond the surface domain.
    pub domain_tolerance: Tolerance,
    pub chain: ChainOptions,
    pub polyline: PolylineOptions,
    /// Capacity of the subdivision-line crossing buffer.
    pub max_line_crossings: usize,
    #[serde(skip)]
    pub fatal_hook: Option<FatalHook>,
}

impl Default for TrimContext {
    fn default() -> Self {
        Self {
            tolerance: Tolerance::DEFAULT,
            domain_tolerance: Tolerance::DOMAIN,
            chain: ChainOptions::default(),
            polyline: PolylineOptions::default(),
            max_line_crossings: 4096,
            fatal_hook: None,
        }
    }
}

impl TrimContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_fatal_hook(mut self, hook: FatalHook) -> Self {
        self.fatal_hook = Some(hook);
        self
    }

    #[must_use]
    pub fn with_polyline(mut self, polyline: PolylineOptions) -> Self {
        self.polyline = polyline;
        self
    }

    /// Reports a fatal condition and hands it back for propagation.
    #[must_use]
    pub fn fatal(&self, err: TrimError) -> TrimError {
        log::error!("trim: {err}");
        if let Some(hook) = self.fatal_hook {
            hook(&err);
        }
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static HOOK_CALLS: AtomicUsize = AtomicUsize::new(0);

    fn counting_hook(_: &TrimError) {
        HOOK_CALLS.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn escalation_ladder_is_geometric_and_ends_at_max() {
        let levels = ChainOptions::default().levels();
        assert_eq!(levels.first(), Some(&1e-9));
        assert_eq!(levels.last(), Some(&1.0));
        assert!(levels.windows(2).all(|w| w[1] > w[0]));
        assert_eq!(levels.len(), 10);
    }

    #[test]
    fn fatal_invokes_installed_hook() {
        let ctx = TrimContext::new().with_fatal_hook(counting_hook);
        let before = HOOK_CALLS.load(Ordering::SeqCst);
        let err = ctx.fatal(TrimError::Capacity { limit: 3 });
        assert_eq!(err, TrimError::Capacity { limit: 3 });
        assert_eq!(HOOK_CALLS.load(Ordering::SeqCst), before + 1);
    }

    #[test]
    fn polyline_tolerance_is_never_coarser() {
        let opts = PolylineOptions::default().no_coarser_than(1e-4);
        assert_eq!(opts.tolerance, 1e-4);
        let opts = PolylineOptions::default().no_coarser_than(1.0);
        assert_eq!(opts.tolerance, 1e-3);
    }
}
