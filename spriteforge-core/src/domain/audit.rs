// spriteforge-core/src/domain/audit.rs
//
// The auditor runs the fixed battery: hard gates first (fail fast), then
// every soft metric (all evaluated, so the operator sees every fault at
// once, not just the first). It produces values only; persisting the audit
// log is the application layer's job.

use serde::{Deserialize, Serialize};

use crate::domain::anchor::AnchorAnalysis;
use crate::domain::error::DomainError;
use crate::domain::image::Pixmap;
use crate::domain::manifest::AuditorConfig;
use crate::domain::metrics::gates::CandidateFileInfo;
use crate::domain::metrics::identity::IdentityConfig;
use crate::domain::metrics::{self, MetricResult};
use crate::domain::reason;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditResult {
    pub passed: bool,
    pub composite_score: f64,
    pub per_metric: Vec<MetricResult>,
    /// Every failed gate or metric, in battery order.
    pub reason_codes: Vec<String>,
    /// Non-blocking observations (e.g. soft metrics that passed but sit
    /// close to their threshold).
    pub flags: Vec<String>,
}

impl AuditResult {
    fn hard_failure(code: &str) -> Self {
        Self {
            passed: false,
            composite_score: 0.0,
            per_metric: Vec::new(),
            reason_codes: vec![code.to_string()],
            flags: Vec::new(),
        }
    }

    pub fn identity_score(&self) -> Option<f64> {
        self.per_metric
            .iter()
            .find(|m| m.name == metrics::METRIC_IDENTITY)
            .map(|m| m.score)
    }
}

/// Soft metrics that pass within this margin of their threshold are
/// flagged for the reviewer.
const NEAR_MISS_MARGIN: f64 = 0.03;

pub fn audit(
    candidate: &Pixmap,
    file_info: &CandidateFileInfo,
    reference: &Pixmap,
    analysis: &AnchorAnalysis,
    config: &AuditorConfig,
    identity_config: &IdentityConfig,
) -> Result<AuditResult, DomainError> {
    // --- HARD GATES (fail fast) ---
    // The reference image carries the canonical target size.
    if let Some(code) = metrics::gates::check_hard_gates(file_info, reference.width) {
        return Ok(AuditResult::hard_failure(code));
    }

    let t = &config.thresholds;

    // --- SOFT METRICS (all evaluated) ---
    let identity = metrics::identity::evaluate(candidate, reference, t.identity_min, identity_config)?;
    let palette = metrics::palette::evaluate(candidate, &analysis.palette, t.palette_min);
    let baseline = metrics::baseline::evaluate(candidate, analysis.baseline_y, t.baseline_drift_max);
    let alpha = metrics::alpha::evaluate(candidate, t.alpha_artifact_max);
    let noise = metrics::noise::evaluate(candidate);

    let mut reason_codes = Vec::new();
    if !identity.passed {
        reason_codes.push(reason::SF01_IDENTITY_DRIFT.to_string());
    }
    if !palette.passed {
        reason_codes.push(reason::SF02_PALETTE_DRIFT.to_string());
    }
    if !baseline.passed {
        reason_codes.push(reason::SF03_BASELINE_DRIFT.to_string());
    }
    if !alpha.passed {
        reason_codes.push(reason::SF_ALPHA_HALO.to_string());
    }
    if !noise.passed {
        reason_codes.push(reason::SF_PIXEL_NOISE.to_string());
    }

    let per_metric = vec![identity, palette, baseline, alpha, noise];

    let mut flags = Vec::new();
    for m in &per_metric {
        // Near-miss flagging only makes sense for floor-style thresholds.
        if m.passed
            && m.name != metrics::METRIC_BASELINE
            && m.name != metrics::METRIC_ALPHA
            && (m.score - m.threshold).abs() <= NEAR_MISS_MARGIN
        {
            flags.push(format!("near_threshold:{}", m.name));
        }
    }

    let composite_score = metrics::composite_score(&per_metric, &config.weights);
    let passed = reason_codes.is_empty() && composite_score >= t.composite_min;
    if reason_codes.is_empty() && !passed {
        reason_codes.push("COMPOSITE_BELOW_MIN".to_string());
    }

    Ok(AuditResult {
        passed,
        composite_score,
        per_metric,
        reason_codes,
        flags,
    })
}
