// spriteforge-core/src/domain/metrics/mod.rs
//
// One engine per quality axis. Every engine returns the same shape so the
// auditor can fold them into a composite score without knowing what each
// one measures.

pub mod alpha;
pub mod baseline;
pub mod gates;
pub mod identity;
pub mod noise;
pub mod palette;

use serde::{Deserialize, Serialize};

use crate::domain::manifest::MetricWeights;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricResult {
    pub name: String,
    /// Normalized to [0, 1]; 1.0 is flawless.
    pub score: f64,
    pub threshold: f64,
    pub passed: bool,
    pub details: serde_json::Value,
}

impl MetricResult {
    pub fn new(
        name: &str,
        score: f64,
        threshold: f64,
        passed: bool,
        details: serde_json::Value,
    ) -> Self {
        Self {
            name: name.to_string(),
            score: score.clamp(0.0, 1.0),
            threshold,
            passed,
            details,
        }
    }
}

pub const METRIC_IDENTITY: &str = "identity";
pub const METRIC_PALETTE: &str = "palette";
pub const METRIC_BASELINE: &str = "baseline";
pub const METRIC_ALPHA: &str = "alpha_artifact";
pub const METRIC_NOISE: &str = "pixel_noise";

/// Weighted mean of the soft-metric scores. Weights are renormalized so
/// operator overrides do not have to sum to exactly 1.
pub fn composite_score(results: &[MetricResult], weights: &MetricWeights) -> f64 {
    let weight_of = |name: &str| -> f64 {
        match name {
            METRIC_IDENTITY => weights.identity,
            METRIC_PALETTE => weights.palette,
            METRIC_BASELINE => weights.baseline,
            METRIC_ALPHA => weights.alpha,
            METRIC_NOISE => weights.noise,
            _ => 0.0,
        }
    };

    let total: f64 = results.iter().map(|r| weight_of(&r.name)).sum();
    if total <= 0.0 {
        return 0.0;
    }

    results
        .iter()
        .map(|r| r.score * weight_of(&r.name) / total)
        .sum()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn result(name: &str, score: f64) -> MetricResult {
        MetricResult::new(name, score, 0.5, true, serde_json::json!({}))
    }

    #[test]
    fn test_composite_is_weighted_mean() {
        let results = vec![
            result(METRIC_IDENTITY, 1.0),
            result(METRIC_PALETTE, 1.0),
            result(METRIC_BASELINE, 1.0),
            result(METRIC_ALPHA, 1.0),
            result(METRIC_NOISE, 0.0),
        ];
        let composite = composite_score(&results, &MetricWeights::default());
        // Everything perfect except noise (weight 0.10).
        assert!((composite - 0.90).abs() < 1e-9);
    }

    #[test]
    fn test_composite_renormalizes_partial_battery() {
        let results = vec![result(METRIC_IDENTITY, 0.8), result(METRIC_PALETTE, 0.4)];
        let composite = composite_score(&results, &MetricWeights::default());
        // identity 0.40, palette 0.25 -> (0.8*0.40 + 0.4*0.25) / 0.65
        assert!((composite - (0.32 + 0.10) / 0.65).abs() < 1e-9);
    }

    #[test]
    fn test_score_is_clamped() {
        let r = MetricResult::new("x", 1.7, 0.5, true, serde_json::json!({}));
        assert_eq!(r.score, 1.0);
    }
}
