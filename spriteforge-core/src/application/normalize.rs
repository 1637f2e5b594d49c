// spriteforge-core/src/application/normalize.rs
//
// The four-step normalization pipeline. Step order is a contract, not an
// optimization: alignment must happen at generation resolution (sub-pixel
// precision is gone after downsampling), transparency enforcement must see
// the downsampled colors, and canvas fit is always last.

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::anchor::{AnchorAnalysis, color_distance, root_zone_top};
use crate::domain::image::{OPAQUE_ALPHA, Pixmap, ops};
use crate::domain::manifest::CanvasConfig;
use crate::error::ForgeError;
use crate::infrastructure::png;

/// Total pipeline time beyond which we warn. Timing never fails a frame.
const SOFT_BUDGET_MS: u128 = 2_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    pub name: String,
    pub duration_ms: u64,
    pub success: bool,
    pub details: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct AlignmentApplied {
    pub shift_x: i32,
    pub shift_y: i32,
    pub clamped: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizationReport {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub processing_steps: Vec<StepReport>,
    pub duration_ms: u64,
    pub alignment_applied: AlignmentApplied,
    pub dimensions: Dimensions,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Dimensions {
    pub original: (u32, u32),
    pub r#final: (u32, u32),
}

/// Normalize a raw candidate into an exact-size frame and write it
/// atomically to `output_path`.
pub fn normalize_candidate(
    raw: &Pixmap,
    anchor_analysis: &AnchorAnalysis,
    canvas: &CanvasConfig,
    input_path: &Path,
    output_path: &Path,
) -> Result<(Pixmap, NormalizationReport), ForgeError> {
    let total_start = Instant::now();
    let original_dims = (raw.width, raw.height);
    let mut steps = Vec::new();

    // --- STEP 1: CONTACT-PATCH ALIGNMENT (at generation resolution) ---
    let step_start = Instant::now();
    let mut image = if raw.width != canvas.generation_size || raw.height != canvas.generation_size {
        ops::resize_nearest(raw, canvas.generation_size, canvas.generation_size)
    } else {
        raw.clone()
    };

    let mut alignment = AlignmentApplied::default();
    let align_detail;
    let mut align_ok = true;

    match candidate_centroid(&image, canvas.alignment.root_zone_ratio) {
        Some((cand_cx, cand_cy, cand_baseline)) => {
            let (anchor_cx, anchor_cy) = anchor_analysis.root_zone_centroid;

            let raw_shift_x = (anchor_cx - cand_cx).round() as i32;
            let max_shift = canvas.alignment.max_shift_x as i32;
            let shift_x = raw_shift_x.clamp(-max_shift, max_shift);

            let shift_y = if canvas.alignment.vertical_lock {
                anchor_analysis.baseline_y as i32 - cand_baseline as i32
            } else {
                (anchor_cy - cand_cy).round() as i32
            };

            alignment = AlignmentApplied {
                shift_x,
                shift_y,
                clamped: raw_shift_x != shift_x,
            };

            if shift_x != 0 || shift_y != 0 {
                image = ops::shift(&image, shift_x, shift_y);
            }
            align_detail = format!(
                "shift=({}, {}), clamped={}",
                shift_x, shift_y, alignment.clamped
            );
        }
        None => {
            align_ok = false;
            align_detail = "no opaque pixels in root zone; alignment skipped".to_string();
        }
    }
    steps.push(step(
        "contact_patch_alignment",
        step_start,
        align_ok,
        align_detail,
    ));

    // --- STEP 2: DOWNSAMPLE (nearest-neighbour, integer ratio) ---
    let step_start = Instant::now();
    image = ops::resize_nearest(&image, canvas.target_size, canvas.target_size);
    steps.push(step(
        "downsample",
        step_start,
        true,
        format!("{} -> {} (nearest)", canvas.generation_size, canvas.target_size),
    ));

    // --- STEP 3: TRANSPARENCY ENFORCEMENT ---
    let step_start = Instant::now();
    let uniformly_opaque = image.is_uniformly_opaque();
    let cleared = clear_chroma_fringes(&mut image);
    let transparency_detail = format!(
        "uniformly_opaque={}, chroma_pixels_cleared={}",
        uniformly_opaque, cleared
    );
    steps.push(step(
        "transparency_enforcement",
        step_start,
        !uniformly_opaque,
        transparency_detail,
    ));

    // --- STEP 4: CANVAS FIT ---
    let step_start = Instant::now();
    image = ops::fit_to_canvas(&image, canvas.target_size, canvas.target_size);
    steps.push(step(
        "canvas_fit",
        step_start,
        true,
        format!("{0}x{0}", canvas.target_size),
    ));

    png::save_pixmap(output_path, &image).map_err(ForgeError::Infrastructure)?;

    let duration_ms = total_start.elapsed().as_millis();
    if duration_ms > SOFT_BUDGET_MS {
        warn!(duration_ms, "normalization exceeded its soft time budget");
    }
    for s in &steps {
        debug!(step = %s.name, duration_ms = s.duration_ms, success = s.success, "{}", s.details);
    }

    let report = NormalizationReport {
        input_path: input_path.to_path_buf(),
        output_path: output_path.to_path_buf(),
        processing_steps: steps,
        duration_ms: duration_ms as u64,
        alignment_applied: alignment,
        dimensions: Dimensions {
            original: original_dims,
            r#final: (image.width, image.height),
        },
    };

    Ok((image, report))
}

fn step(name: &str, start: Instant, success: bool, details: String) -> StepReport {
    StepReport {
        name: name.to_string(),
        duration_ms: start.elapsed().as_millis() as u64,
        success,
        details,
    }
}

/// Root-zone centroid and baseline of the candidate, computed with the
/// same ratio the anchor was analyzed with.
fn candidate_centroid(image: &Pixmap, root_zone_ratio: f64) -> Option<(f64, f64, u32)> {
    let bounds = ops::bounding_box(image, OPAQUE_ALPHA)?;
    let baseline = ops::baseline_y(image)?;
    let zone_top = root_zone_top(baseline, bounds.height(), root_zone_ratio);
    let (cx, cy) = ops::weighted_centroid_below(image, zone_top)?;
    Some((cx, cy, baseline))
}

/// Clear chroma-key colors on edge pixels to full transparency. Interior
/// pixels are left alone: a genuinely green character is not an artifact.
fn clear_chroma_fringes(image: &mut Pixmap) -> usize {
    const KEYS: [[u8; 3]; 3] = [[0, 255, 0], [255, 0, 255], [0, 255, 255]];
    const TOLERANCE: f64 = 50.0;

    let mut cleared = 0;
    for (x, y) in ops::edge_pixels(image) {
        let px = image.pixel(x, y);
        let color = [px[0], px[1], px[2]];
        if KEYS.iter().any(|k| color_distance(*k, color) < TOLERANCE) {
            image.set_pixel(x, y, [0, 0, 0, 0]);
            cleared += 1;
        }
    }
    cleared
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::anchor::analyze_anchor;

    fn canvas() -> CanvasConfig {
        serde_json::from_str("{}").unwrap()
    }

    /// 512-px anchor: body x 200..320, y 100..420 (baseline 419).
    fn anchor() -> Pixmap {
        let mut img = Pixmap::new(512, 512);
        for y in 100..420 {
            for x in 200..320 {
                img.set_pixel(x, y, [200, 40, 40, 255]);
            }
        }
        img
    }

    #[test]
    fn test_aligned_candidate_passes_through() {
        let tmp = tempfile::tempdir().unwrap();
        let anchor = anchor();
        let analysis = analyze_anchor(&anchor, 0.25).unwrap();

        let (normalized, report) = normalize_candidate(
            &anchor,
            &analysis,
            &canvas(),
            &tmp.path().join("in.png"),
            &tmp.path().join("out.png"),
        )
        .unwrap();

        assert_eq!(normalized.width, 128);
        assert_eq!(normalized.height, 128);
        assert_eq!(report.alignment_applied.shift_x, 0);
        assert_eq!(report.alignment_applied.shift_y, 0);
        assert!(!report.alignment_applied.clamped);
        assert_eq!(report.processing_steps.len(), 4);
        assert!(tmp.path().join("out.png").exists());
    }

    #[test]
    fn test_vertical_lock_snaps_baseline() {
        let tmp = tempfile::tempdir().unwrap();
        let anchor = anchor();
        let analysis = analyze_anchor(&anchor, 0.25).unwrap();

        // Same body, floating 6 px higher.
        let candidate = ops::shift(&anchor, 0, -6);

        let (normalized, report) = normalize_candidate(
            &candidate,
            &analysis,
            &canvas(),
            &tmp.path().join("in.png"),
            &tmp.path().join("out.png"),
        )
        .unwrap();

        assert_eq!(report.alignment_applied.shift_y, 6);
        // After alignment + 4x downsample the baseline lands where the
        // anchor's does: row 419 / 4.
        assert_eq!(ops::baseline_y(&normalized), Some(104));
    }

    #[test]
    fn test_horizontal_shift_is_clamped() {
        let tmp = tempfile::tempdir().unwrap();
        let anchor = anchor();
        let analysis = analyze_anchor(&anchor, 0.25).unwrap();

        // 40 px sideways: far beyond the default max_shift_x of 8.
        let candidate = ops::shift(&anchor, -40, 0);

        let (_, report) = normalize_candidate(
            &candidate,
            &analysis,
            &canvas(),
            &tmp.path().join("in.png"),
            &tmp.path().join("out.png"),
        )
        .unwrap();

        assert_eq!(report.alignment_applied.shift_x, 8);
        assert!(report.alignment_applied.clamped);
    }

    #[test]
    fn test_chroma_fringe_cleared_on_edges() {
        let tmp = tempfile::tempdir().unwrap();
        let mut candidate = anchor();
        // Paint a green rim down the left side of the body.
        for y in 100..420 {
            candidate.set_pixel(199, y, [0, 250, 10, 255]);
        }
        let analysis = analyze_anchor(&anchor(), 0.25).unwrap();

        let (normalized, report) = normalize_candidate(
            &candidate,
            &analysis,
            &canvas(),
            &tmp.path().join("in.png"),
            &tmp.path().join("out.png"),
        )
        .unwrap();

        let transparency = &report.processing_steps[2];
        assert_eq!(transparency.name, "transparency_enforcement");
        assert!(transparency.details.contains("chroma_pixels_cleared"));

        // No green survives in the normalized output's edges.
        for (x, y) in ops::edge_pixels(&normalized) {
            let px = normalized.pixel(x, y);
            assert!(
                color_distance([px[0], px[1], px[2]], [0, 255, 0]) >= 50.0,
                "green fringe at ({x},{y})"
            );
        }
    }

    #[test]
    fn test_centroid_alignment_without_vertical_lock() {
        let tmp = tempfile::tempdir().unwrap();
        let anchor = anchor();
        let analysis = analyze_anchor(&anchor, 0.25).unwrap();

        let mut config = canvas();
        config.alignment.vertical_lock = false;

        // Floating 6 px: without the lock the vertical shift comes from
        // the centroid delta, which for a rigid translation is the same 6.
        let candidate = ops::shift(&anchor, 0, -6);

        let (_, report) = normalize_candidate(
            &candidate,
            &analysis,
            &config,
            &tmp.path().join("in.png"),
            &tmp.path().join("out.png"),
        )
        .unwrap();

        assert_eq!(report.alignment_applied.shift_y, 6);
    }

    #[test]
    fn test_empty_candidate_reports_failed_alignment() {
        let tmp = tempfile::tempdir().unwrap();
        let analysis = analyze_anchor(&anchor(), 0.25).unwrap();

        let (_, report) = normalize_candidate(
            &Pixmap::new(512, 512),
            &analysis,
            &canvas(),
            &tmp.path().join("in.png"),
            &tmp.path().join("out.png"),
        )
        .unwrap();

        assert!(!report.processing_steps[0].success);
        // Pipeline still completes: the auditor owns the rejection.
        assert_eq!(report.dimensions.r#final, (128, 128));
    }
}
