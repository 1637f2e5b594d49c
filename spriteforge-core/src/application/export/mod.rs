// spriteforge-core/src/application/export/mod.rs
//
// approved/ -> staging -> packer subprocess -> structural validation ->
// release gate. Assets are never deleted on failure; a failed export
// leaves everything in place for inspection.

pub mod atlas;
pub mod checklist;
pub mod stage;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::application::context::RunContext;
use crate::infrastructure::fs::{atomic_write, write_json};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ExportStatus {
    ReleaseReady,
    ValidationFailed,
    DebugOnly,
    Pending,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExportReport {
    pub status: ExportStatus,
    pub checklist: checklist::ChecklistReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub atlas: Option<atlas::AtlasValidationReport>,
    pub errors: Vec<String>,
}

/// Run the full export pipeline over the approved frames.
pub async fn run_export(
    ctx: &RunContext,
    allow_validation_fail: bool,
) -> Result<ExportReport, crate::error::ForgeError> {
    let move_id = &ctx.manifest.identity.move_id;
    let frame_count = ctx.manifest.identity.frame_count as usize;
    let target_size = ctx.manifest.canvas.target_size;

    // --- PRE-EXPORT CHECKLIST ---
    let checklist_report =
        checklist::run_checklist(&ctx.layout.approved_dir(), frame_count, target_size)?;
    if !checklist_report.critical_passed() {
        warn!("pre-export checklist failed; export blocked");
        let report = ExportReport {
            status: if allow_validation_fail {
                ExportStatus::DebugOnly
            } else {
                ExportStatus::ValidationFailed
            },
            checklist: checklist_report,
            atlas: None,
            errors: vec!["pre-export checklist failed".to_string()],
        };
        write_json(&ctx.layout.validation_results_file(), &report)?;
        return Ok(report);
    }

    // --- STAGING ---
    let staging_root = ctx.layout.export_dir().join("staging");
    stage::prepare(&ctx.layout.approved_dir(), move_id, &staging_root)?;

    // --- PACK (subprocess) ---
    let out_base = ctx
        .layout
        .export_base(&ctx.manifest.identity.character, move_id);
    let pack_result = ctx
        .packer
        .pack(
            &staging_root,
            &out_base,
            &ctx.manifest.export.packer_flags,
        )
        .await;

    let output = match pack_result {
        Ok(output) => {
            let log = format!("--- stdout ---\n{}\n--- stderr ---\n{}\n", output.stdout, output.stderr);
            atomic_write(&ctx.layout.packer_log_file(), log)?;
            output
        }
        Err(e) => {
            // Approved frames are untouched; only the atlas is missing.
            warn!(error = %e, "atlas packer failed; approved frames preserved");
            let report = ExportReport {
                status: if allow_validation_fail {
                    ExportStatus::DebugOnly
                } else {
                    ExportStatus::ValidationFailed
                },
                checklist: checklist_report,
                atlas: None,
                errors: vec![format!("{}: {e}", crate::domain::reason::DEP_PACKER_FAIL)],
            };
            write_json(&ctx.layout.validation_results_file(), &report)?;
            return Ok(report);
        }
    };

    // --- STRUCTURAL VALIDATION ---
    let atlas_report = atlas::validate(&output.data_json, frame_count, move_id)?;

    let status = if atlas_report.passed {
        ExportStatus::ReleaseReady
    } else if allow_validation_fail {
        ExportStatus::DebugOnly
    } else {
        ExportStatus::ValidationFailed
    };

    let errors = atlas_report.errors.clone();
    let report = ExportReport {
        status,
        checklist: checklist_report,
        atlas: Some(atlas_report),
        errors,
    };
    write_json(&ctx.layout.validation_results_file(), &report)?;

    info!(status = ?report.status, "export pipeline finished");
    Ok(report)
}
