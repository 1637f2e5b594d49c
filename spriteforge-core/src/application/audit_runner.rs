// spriteforge-core/src/application/audit_runner.rs
//
// Runs the domain auditor against a normalized frame on disk and owns the
// audit artifacts: one append-only JSONL line per audit plus a per-frame
// metrics file. The auditor itself never does IO.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::application::context::RunContext;
use crate::domain::audit::{self, AuditResult};
use crate::error::ForgeError;
use crate::infrastructure::fs::{append_jsonl, write_json};
use crate::infrastructure::png;

#[derive(Debug, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub timestamp: chrono::DateTime<Utc>,
    pub run_id: String,
    pub frame_index: u32,
    pub attempt_index: u32,
    pub passed: bool,
    pub composite_score: f64,
    pub reason_codes: Vec<String>,
    pub flags: Vec<String>,
}

#[instrument(skip(ctx), fields(run_id = %ctx.run_id))]
pub fn run_audit(
    ctx: &RunContext,
    frame_index: u32,
    attempt_index: u32,
) -> Result<AuditResult, ForgeError> {
    let normalized_path = ctx.layout.normalized_file(frame_index, attempt_index);

    let file_info = png::inspect_candidate(&normalized_path).map_err(ForgeError::Infrastructure)?;
    let candidate = png::load_pixmap(&normalized_path).map_err(ForgeError::Infrastructure)?;

    let result = audit::audit(
        &candidate,
        &file_info,
        &ctx.reference.image,
        &ctx.reference.analysis,
        &ctx.manifest.auditor,
        &ctx.identity_config,
    )
    .map_err(ForgeError::Domain)?;

    append_jsonl(
        &ctx.layout.audit_log_file(),
        &AuditLogEntry {
            timestamp: Utc::now(),
            run_id: ctx.run_id.clone(),
            frame_index,
            attempt_index,
            passed: result.passed,
            composite_score: result.composite_score,
            reason_codes: result.reason_codes.clone(),
            flags: result.flags.clone(),
        },
    )
    .map_err(ForgeError::Infrastructure)?;

    // Latest full metric breakdown per frame, overwritten each attempt.
    write_json(&ctx.layout.frame_metrics_file(frame_index), &result)
        .map_err(ForgeError::Infrastructure)?;

    info!(
        frame_index,
        attempt_index,
        passed = result.passed,
        composite = result.composite_score,
        reasons = ?result.reason_codes,
        "audit complete"
    );

    Ok(result)
}
