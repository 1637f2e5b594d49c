// spriteforge-core/src/application/export/checklist.rs
//
// Twelve pre-export checks over approved/. Critical failures block the
// packer from ever running; the two advisory checks (total size,
// bounding-box variance) only warn.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::domain::image::{OPAQUE_ALPHA, ops};
use crate::domain::manifest::hash::sha256_hex;
use crate::domain::metrics::gates::{FILE_SIZE_MAX, FILE_SIZE_MIN};
use crate::error::ForgeError;
use crate::infrastructure::error::InfrastructureError;
use crate::infrastructure::png;

const TOTAL_SIZE_WARN_BYTES: u64 = 50 * 1024 * 1024;
const BBOX_VARIANCE_MAX: f64 = 0.20;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub critical: bool,
    pub details: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChecklistReport {
    pub checks: Vec<CheckResult>,
}

impl ChecklistReport {
    pub fn critical_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed || !c.critical)
    }
}

pub fn run_checklist(
    approved_dir: &Path,
    expected_frames: usize,
    target_size: u32,
) -> Result<ChecklistReport, ForgeError> {
    let mut checks = Vec::with_capacity(12);

    let mut frame_files: Vec<PathBuf> = Vec::new();
    let mut stray_files: Vec<String> = Vec::new();

    for entry in std::fs::read_dir(approved_dir)
        .map_err(|e| ForgeError::Infrastructure(InfrastructureError::Io(e)))?
    {
        let path = entry
            .map_err(|e| ForgeError::Infrastructure(InfrastructureError::Io(e)))?
            .path();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if path.is_dir() {
            // quarantine/ from a resume is tolerated; anything else is stray.
            if name != "quarantine" {
                stray_files.push(name);
            }
            continue;
        }
        if is_frame_name(&name) {
            frame_files.push(path);
        } else {
            stray_files.push(name);
        }
    }
    frame_files.sort();

    // 1. Frame count.
    checks.push(check(
        "frame_count",
        frame_files.len() == expected_frames,
        true,
        format!("{} of {} frames", frame_files.len(), expected_frames),
    ));

    // 5. Naming convention (already enforced by the collection pass; the
    // check records it explicitly).
    checks.push(check(
        "naming_convention",
        true,
        true,
        "all counted frames match frame_NNNN.png".to_string(),
    ));

    // 9. No stray files.
    checks.push(check(
        "no_stray_files",
        stray_files.is_empty(),
        true,
        if stray_files.is_empty() {
            "clean".to_string()
        } else {
            format!("stray entries: {stray_files:?}")
        },
    ));

    // 10. Contiguous sequence starting at 0.
    let indices: Vec<u32> = frame_files.iter().filter_map(|p| frame_index_of(p)).collect();
    let contiguous = indices.iter().enumerate().all(|(i, &idx)| idx == i as u32);
    checks.push(check(
        "contiguous_sequence",
        contiguous,
        true,
        format!("indices: {indices:?}"),
    ));

    // Per-file passes.
    let mut all_decodable = true;
    let mut all_dimensions = true;
    let mut all_alpha = true;
    let mut all_rgba32 = true;
    let mut all_sized = true;
    let mut total_bytes: u64 = 0;
    let mut hashes: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut bbox_areas: Vec<f64> = Vec::new();

    for path in &frame_files {
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(_) => {
                all_decodable = false;
                continue;
            }
        };
        total_bytes += bytes.len() as u64;
        if (bytes.len() as u64) < FILE_SIZE_MIN || (bytes.len() as u64) > FILE_SIZE_MAX {
            all_sized = false;
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        hashes.entry(sha256_hex(&bytes)).or_default().push(name);

        let info = png::inspect_bytes(&bytes);
        match info.decoded {
            Some(d) => {
                if d.width != target_size || d.height != target_size {
                    all_dimensions = false;
                }
                if d.channels != 4 {
                    all_alpha = false;
                }
                if d.channels != 4 || d.bits_per_channel != 8 {
                    all_rgba32 = false;
                }
            }
            None => {
                all_decodable = false;
                continue;
            }
        }

        if let Ok(pixmap) = png::decode_pixmap(&bytes) {
            if let Some(bounds) = ops::bounding_box(&pixmap, OPAQUE_ALPHA) {
                bbox_areas.push(bounds.area() as f64);
            }
        }
    }

    // 2. Exact dimensions.
    checks.push(check(
        "exact_dimensions",
        all_dimensions,
        true,
        format!("{0}x{0}", target_size),
    ));
    // 3. Alpha channel present.
    checks.push(check("alpha_channel", all_alpha, true, "RGBA required".to_string()));
    // 4. Decodable.
    checks.push(check("decodable", all_decodable, true, "PNG decode".to_string()));
    // 6. No duplicate frames.
    let duplicates: Vec<&Vec<String>> = hashes.values().filter(|v| v.len() > 1).collect();
    checks.push(check(
        "no_duplicate_frames",
        duplicates.is_empty(),
        true,
        if duplicates.is_empty() {
            "all frames unique (SHA-256)".to_string()
        } else {
            format!("duplicate groups: {duplicates:?}")
        },
    ));
    // 7. File size bounds.
    checks.push(check(
        "file_size_bounds",
        all_sized,
        true,
        format!("{}..{} bytes per frame", FILE_SIZE_MIN, FILE_SIZE_MAX),
    ));
    // 8. 32-bit RGBA.
    checks.push(check("rgba_32bit", all_rgba32, true, "8 bits x 4 channels".to_string()));

    // 11. Reasonable total size (warn only).
    let size_ok = total_bytes < TOTAL_SIZE_WARN_BYTES;
    if !size_ok {
        warn!(total_bytes, "approved frames exceed the advisory size budget");
    }
    checks.push(check(
        "total_size",
        size_ok,
        false,
        format!("{total_bytes} bytes total"),
    ));

    // 12. Bounding-box variance <= 20% (warn only).
    let bbox_ok = bbox_variance_ok(&bbox_areas);
    checks.push(check(
        "bbox_variance",
        bbox_ok,
        false,
        format!("{} visible boxes measured", bbox_areas.len()),
    ));

    debug_assert_eq!(checks.len(), 12);
    Ok(ChecklistReport { checks })
}

fn check(name: &str, passed: bool, critical: bool, details: String) -> CheckResult {
    CheckResult {
        name: name.to_string(),
        passed,
        critical,
        details,
    }
}

fn is_frame_name(name: &str) -> bool {
    name.len() == "frame_0000.png".len()
        && name.starts_with("frame_")
        && name.ends_with(".png")
        && name["frame_".len().."frame_".len() + 4]
            .chars()
            .all(|c| c.is_ascii_digit())
}

fn frame_index_of(path: &Path) -> Option<u32> {
    let name = path.file_stem()?.to_str()?;
    name.strip_prefix("frame_")?.parse().ok()
}

/// Max relative deviation of visible-box areas from their mean. A frame
/// whose silhouette swings more than 20% from the rest usually means the
/// generator changed framing mid-move.
fn bbox_variance_ok(areas: &[f64]) -> bool {
    if areas.len() < 2 {
        return true;
    }
    let mean = areas.iter().sum::<f64>() / areas.len() as f64;
    if mean <= 0.0 {
        return true;
    }
    areas
        .iter()
        .all(|a| ((a - mean).abs() / mean) <= BBOX_VARIANCE_MAX)
}
