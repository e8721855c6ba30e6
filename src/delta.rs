// Delta Rule - Change and deviation detection for telemetry datapoints
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Moving delta (running baseline) and percentage deviation.

use crate::config::AveragingKind;

/// Running baseline for a single numeric datapoint.
#[derive(Debug, Clone, PartialEq)]
pub struct MovingDelta {
    baseline: f64,
    samples: u64,
}

impl MovingDelta {
    /// Start a delta from its first sample.
    pub fn new(first: f64) -> Self {
        Self {
            baseline: first,
            samples: 1,
        }
    }

    /// Current baseline.
    pub fn baseline(&self) -> f64 {
        self.baseline
    }

    /// Number of samples folded into the baseline.
    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Fold a sample into the baseline.
    ///
    /// The simple delta divides by the sample count, which keeps the baseline
    /// equal to the arithmetic mean. The exponential delta caps the divisor
    /// at `factor`, so older samples decay once the window is full.
    ///
    /// A sample that would leave the baseline non-finite is not folded in
    /// and the delta is left unchanged. Returns whether the sample was kept.
    pub fn add_sample(&mut self, value: f64, kind: AveragingKind, factor: u32) -> bool {
        let samples = self.samples + 1;
        let divisor = match kind {
            AveragingKind::Simple => samples,
            AveragingKind::Exponential => samples.min(u64::from(factor.max(1))),
        };
        let next = self.baseline + (value - self.baseline) / divisor as f64;
        if !next.is_finite() {
            return false;
        }

        self.samples = samples;
        self.baseline = next;
        true
    }
}

/// Percentage deviation of `value` from `baseline`.
///
/// Returns `None` when the baseline is exactly zero, or when the deviation
/// overflows to a non-finite number. Such readings never trigger.
pub fn deviation_pct(value: f64, baseline: f64) -> Option<f64> {
    if baseline == 0.0 {
        return None;
    }
    Some((value - baseline) * 100.0 / baseline).filter(|pct| pct.is_finite())
}
