// spriteforge-core/src/domain/metrics/baseline.rs

use serde::{Deserialize, Serialize};

use crate::domain::image::{Pixmap, ops};
use crate::domain::metrics::{METRIC_BASELINE, MetricResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineDirection {
    Aligned,
    /// Candidate baseline above the anchor's (negative drift).
    Floating,
    /// Candidate baseline below the anchor's (positive drift).
    Sinking,
}

/// Signed drift of the candidate's baseline against the anchor's, in
/// pixels. Positive means the sprite sank below the ground line.
pub fn evaluate(candidate: &Pixmap, anchor_baseline_y: u32, drift_max: u32) -> MetricResult {
    let (drift_px, direction) = match ops::baseline_y(candidate) {
        Some(candidate_baseline) => {
            let drift = candidate_baseline as i64 - anchor_baseline_y as i64;
            let direction = match drift {
                0 => BaselineDirection::Aligned,
                d if d > 0 => BaselineDirection::Sinking,
                _ => BaselineDirection::Floating,
            };
            (drift, direction)
        }
        // No opaque pixel at all: maximal drift, caught by other gates too.
        None => (candidate.height as i64, BaselineDirection::Floating),
    };

    let abs_drift = drift_px.unsigned_abs() as f64;
    let passed = abs_drift <= drift_max as f64;

    // Normalized for the composite: full marks inside the limit, then a
    // linear falloff that hits zero at twice the limit.
    let score = if drift_max == 0 {
        if passed { 1.0 } else { 0.0 }
    } else {
        (1.0 - (abs_drift / (2.0 * drift_max as f64))).clamp(0.0, 1.0)
    };

    MetricResult::new(
        METRIC_BASELINE,
        score,
        drift_max as f64,
        passed,
        serde_json::json!({
            "drift_px": drift_px,
            "direction": direction,
            "anchor_baseline_y": anchor_baseline_y,
        }),
    )
}
