// spriteforge-core/src/domain/manifest/validate.rs
//
// Semantic validation, applied after serde has accepted the raw shape.
// Every failure names the dotted field path, what was expected, what was
// received, and a one-sentence fix hint. Validation errors are always
// recoverable: they are reported to the operator, never panicked.

use std::path::Path;

use crate::domain::error::DomainError;
use crate::domain::manifest::Manifest;
use crate::domain::retry::{RetryAction, is_known_reason};

/// Maximum frames a single manifest may declare. Atlas keys are 4-digit,
/// but the production ceiling is far lower: one move is at most 32 frames.
pub const MAX_FRAME_COUNT: u32 = 32;

pub fn validate_manifest(manifest: &Manifest, base_dir: &Path) -> Result<(), DomainError> {
    // --- IDENTITY ---
    if manifest.identity.character.trim().is_empty() {
        return Err(invalid(
            "identity.character",
            "non-empty character name",
            "empty string",
            "Set the character id, e.g. \"BLAZE\".",
        ));
    }

    if manifest.identity.move_id.is_empty()
        || !manifest
            .identity
            .move_id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c == '_')
    {
        return Err(invalid(
            "identity.move",
            "lowercase move id matching [a-z_]+",
            &format!("\"{}\"", manifest.identity.move_id),
            "Move ids become atlas folder names; use snake_case like \"walk_cycle\".",
        ));
    }

    if manifest.identity.frame_count == 0 || manifest.identity.frame_count > MAX_FRAME_COUNT {
        return Err(invalid(
            "identity.frame_count",
            "integer in 1..=32",
            &manifest.identity.frame_count.to_string(),
            "Split longer moves into multiple manifests.",
        ));
    }

    // --- INPUTS ---
    let anchor_path = base_dir.join(&manifest.inputs.anchor);
    if !anchor_path.exists() {
        return Err(invalid(
            "inputs.anchor",
            "path to an existing PNG file",
            &format!("missing file {:?}", anchor_path),
            "Point inputs.anchor at the character's master anchor image.",
        ));
    }

    for (field, refs) in [
        ("inputs.style_refs", &manifest.inputs.style_refs),
        ("inputs.pose_refs", &manifest.inputs.pose_refs),
        ("inputs.guides", &manifest.inputs.guides),
    ] {
        for (i, p) in refs.iter().enumerate() {
            if !base_dir.join(p).exists() {
                return Err(invalid(
                    &format!("{}[{}]", field, i),
                    "path to an existing file",
                    &format!("missing file {:?}", p),
                    "Remove the entry or fix the path.",
                ));
            }
        }
    }

    // --- GENERATOR ---
    if manifest.generator.mode != "edit" {
        return Err(invalid(
            "generator.mode",
            "\"edit\"",
            &format!("\"{}\"", manifest.generator.mode),
            "Only image-edit mode preserves the anchor identity; other modes are not supported.",
        ));
    }

    if manifest.generator.prompts.master.trim().is_empty() {
        return Err(invalid(
            "generator.prompts.master",
            "non-empty prompt template",
            "empty string",
            "Describe the character and art style in the master prompt.",
        ));
    }

    if manifest.generator.max_attempts_per_frame == 0 {
        return Err(invalid(
            "generator.max_attempts_per_frame",
            "integer >= 1",
            "0",
            "Allow at least one attempt per frame.",
        ));
    }

    // --- CANVAS ---
    if manifest.canvas.generation_size != 512 {
        return Err(invalid(
            "canvas.generation_size",
            "512",
            &manifest.canvas.generation_size.to_string(),
            "The backend generates at 512 px; the normalizer downsamples from there.",
        ));
    }

    if !matches!(manifest.canvas.target_size, 128 | 256) {
        return Err(invalid(
            "canvas.target_size",
            "128 or 256",
            &manifest.canvas.target_size.to_string(),
            "Only integer downsample ratios of 512 are allowed.",
        ));
    }

    let ratio = manifest.canvas.alignment.root_zone_ratio;
    if !(ratio > 0.0 && ratio <= 1.0) {
        return Err(invalid(
            "canvas.alignment.root_zone_ratio",
            "number in (0, 1]",
            &ratio.to_string(),
            "Use the fraction of the visible sprite that counts as ground contact, e.g. 0.25.",
        ));
    }

    // --- AUDITOR THRESHOLDS ---
    let t = &manifest.auditor.thresholds;
    for (field, value) in [
        ("auditor.thresholds.identity_min", t.identity_min),
        ("auditor.thresholds.palette_min", t.palette_min),
        ("auditor.thresholds.alpha_artifact_max", t.alpha_artifact_max),
        ("auditor.thresholds.composite_min", t.composite_min),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return Err(invalid(
                field,
                "number in [0, 1]",
                &value.to_string(),
                "Scores are normalized; thresholds must be too.",
            ));
        }
    }

    let w = &manifest.auditor.weights;
    let weight_sum = w.identity + w.palette + w.baseline + w.alpha + w.noise;
    if weight_sum <= 0.0 {
        return Err(invalid(
            "auditor.weights",
            "weights with a positive sum",
            &format!("sum = {}", weight_sum),
            "At least one metric must carry weight.",
        ));
    }

    // --- RETRY LADDER OVERRIDES ---
    for (code, actions) in &manifest.retry.ladder {
        if !is_known_reason(code) {
            return Err(invalid(
                &format!("retry.ladder.{}", code),
                "a known soft-failure reason code",
                &format!("\"{}\"", code),
                "Valid keys: SF01_IDENTITY_DRIFT, SF02_PALETTE_DRIFT, SF03_BASELINE_DRIFT, SF_ALPHA_HALO, SF_PIXEL_NOISE.",
            ));
        }
        for (i, action) in actions.iter().enumerate() {
            if RetryAction::parse(action).is_none() {
                return Err(invalid(
                    &format!("retry.ladder.{}[{}]", code, i),
                    "a known retry action name",
                    &format!("\"{}\"", action),
                    "See `spriteforge schema` for the list of retry actions.",
                ));
            }
        }
    }

    // --- EXPORT ---
    for (i, flag) in manifest.export.packer_flags.iter().enumerate() {
        if !flag.starts_with("--") {
            return Err(invalid(
                &format!("export.packer_flags[{}]", i),
                "a long flag starting with --",
                &format!("\"{}\"", flag),
                "Pass packer options as long flags, e.g. \"--png-opt-level 2\".",
            ));
        }
    }

    Ok(())
}

fn invalid(field: &str, expected: &str, received: &str, hint: &str) -> DomainError {
    DomainError::ValidationError {
        field: field.to_string(),
        expected: expected.to_string(),
        received: received.to_string(),
        hint: hint.to_string(),
    }
}
