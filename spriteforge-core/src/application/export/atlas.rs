// spriteforge-core/src/application/export/atlas.rs
//
// Structural validation of the packer's JSON output. Two shapes exist:
// a single atlas carries a top-level `frames` object, a multi-page atlas
// carries `textures[]` with per-page frame arrays. Frame keys from all
// pages are pooled into one set before any count is checked.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

use crate::error::ForgeError;
use crate::infrastructure::fs::read_bytes;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AtlasKind {
    Single,
    Multi,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AtlasValidationReport {
    pub kind: AtlasKind,
    pub pages: usize,
    pub frame_keys_found: usize,
    pub errors: Vec<String>,
    pub passed: bool,
}

pub fn validate(
    atlas_json: &Path,
    frame_count: usize,
    move_id: &str,
) -> Result<AtlasValidationReport, ForgeError> {
    let bytes = read_bytes(atlas_json).map_err(ForgeError::Infrastructure)?;
    let value: serde_json::Value = serde_json::from_slice(&bytes)
        .map_err(|e| ForgeError::Infrastructure(e.into()))?;

    let base_dir = atlas_json.parent().unwrap_or_else(|| Path::new("."));
    let mut errors = Vec::new();
    let mut keys: BTreeSet<String> = BTreeSet::new();

    let (kind, pages) = if value.get("frames").is_some_and(|f| f.is_object()) {
        validate_single(&value, base_dir, &mut keys, &mut errors);
        (AtlasKind::Single, 1)
    } else if let Some(textures) = value.get("textures").and_then(|t| t.as_array()) {
        for texture in textures {
            validate_texture(texture, base_dir, &mut keys, &mut errors);
        }
        (AtlasKind::Multi, textures.len())
    } else {
        errors.push("atlas JSON has neither a frames object nor a textures array".to_string());
        (AtlasKind::Single, 0)
    };

    // --- KEY SET CHECKS ---
    if keys.len() != frame_count {
        errors.push(format!(
            "expected {} unique frame keys, found {}",
            frame_count,
            keys.len()
        ));
    }

    let key_pattern = regex::Regex::new(&format!("^{}/\\d{{4}}$", regex::escape(move_id)))
        .map_err(|e| ForgeError::InternalError(format!("key regex: {e}")))?;
    for key in &keys {
        if !key_pattern.is_match(key) {
            errors.push(format!("frame key '{key}' does not match {move_id}/NNNN"));
        }
    }

    let passed = errors.is_empty();
    Ok(AtlasValidationReport {
        kind,
        pages,
        frame_keys_found: keys.len(),
        errors,
        passed,
    })
}

fn validate_single(
    value: &serde_json::Value,
    base_dir: &Path,
    keys: &mut BTreeSet<String>,
    errors: &mut Vec<String>,
) {
    if let Some(frames) = value["frames"].as_object() {
        for (key, frame) in frames {
            keys.insert(trim_png_suffix(key));
            check_not_rotated(key, frame, errors);
        }
    }

    let meta = &value["meta"];
    check_meta(meta, base_dir, errors);
}

fn validate_texture(
    texture: &serde_json::Value,
    base_dir: &Path,
    keys: &mut BTreeSet<String>,
    errors: &mut Vec<String>,
) {
    if let Some(frames) = texture["frames"].as_array() {
        for frame in frames {
            match frame["filename"].as_str() {
                Some(name) => {
                    keys.insert(trim_png_suffix(name));
                    check_not_rotated(name, frame, errors);
                }
                None => errors.push("texture frame without a filename".to_string()),
            }
        }
    } else {
        errors.push("texture page without a frames array".to_string());
    }

    check_meta(texture, base_dir, errors);
}

/// format, scale and the referenced sheet PNG, shared by both shapes
/// (single-atlas nests these under `meta`, multi-atlas inlines them).
fn check_meta(meta: &serde_json::Value, base_dir: &Path, errors: &mut Vec<String>) {
    match meta["format"].as_str() {
        Some("RGBA8888") => {}
        Some(other) => errors.push(format!("format is '{other}', expected RGBA8888")),
        None => errors.push("missing format field".to_string()),
    }

    match &meta["scale"] {
        serde_json::Value::String(s) if s == "1" => {}
        serde_json::Value::Number(n) if n.as_f64() == Some(1.0) => {}
        other => errors.push(format!("scale is {other}, expected \"1\"")),
    }

    match meta["image"].as_str() {
        Some(image) => {
            if !base_dir.join(image).exists() {
                errors.push(format!("referenced sheet '{image}' not found on disk"));
            }
        }
        None => errors.push("missing image reference".to_string()),
    }
}

fn check_not_rotated(key: &str, frame: &serde_json::Value, errors: &mut Vec<String>) {
    if frame["rotated"].as_bool() != Some(false) {
        errors.push(format!("frame '{key}' is rotated (rotation is disabled)"));
    }
}

/// TexturePacker emits keys with or without the extension depending on
/// --trim-sprite-names; the contract key is extension-free.
fn trim_png_suffix(key: &str) -> String {
    key.strip_suffix(".png").unwrap_or(key).to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::fs;

    fn single_atlas_json(move_id: &str, count: usize, image: &str) -> serde_json::Value {
        let mut frames = serde_json::Map::new();
        for i in 0..count {
            frames.insert(
                format!("{move_id}/{i:04}"),
                serde_json::json!({ "rotated": false, "trimmed": true }),
            );
        }
        serde_json::json!({
            "frames": frames,
            "meta": { "image": image, "format": "RGBA8888", "scale": "1" }
        })
    }

    #[test]
    fn test_single_atlas_passes() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("blaze_idle.png"), b"sheet").unwrap();
        let json_path = tmp.path().join("blaze_idle.json");
        fs::write(
            &json_path,
            serde_json::to_string(&single_atlas_json("idle", 4, "blaze_idle.png")).unwrap(),
        )
        .unwrap();

        let report = validate(&json_path, 4, "idle").unwrap();
        assert!(report.passed, "errors: {:?}", report.errors);
        assert_eq!(report.kind, AtlasKind::Single);
        assert_eq!(report.frame_keys_found, 4);
    }

    #[test]
    fn test_multi_atlas_aggregates_pages() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("blaze_idle_0.png"), b"sheet").unwrap();
        fs::write(tmp.path().join("blaze_idle_1.png"), b"sheet").unwrap();

        let frames_page = |range: std::ops::Range<usize>| -> Vec<serde_json::Value> {
            range
                .map(|i| serde_json::json!({ "filename": format!("idle/{i:04}"), "rotated": false }))
                .collect()
        };

        let json_path = tmp.path().join("blaze_idle.json");
        fs::write(
            &json_path,
            serde_json::to_string(&serde_json::json!({
                "textures": [
                    { "image": "blaze_idle_0.png", "format": "RGBA8888", "scale": "1",
                      "frames": frames_page(0..20) },
                    { "image": "blaze_idle_1.png", "format": "RGBA8888", "scale": "1",
                      "frames": frames_page(20..32) },
                ]
            }))
            .unwrap(),
        )
        .unwrap();

        let report = validate(&json_path, 32, "idle").unwrap();
        assert!(report.passed, "errors: {:?}", report.errors);
        assert_eq!(report.kind, AtlasKind::Multi);
        assert_eq!(report.pages, 2);
        assert_eq!(report.frame_keys_found, 32);
    }

    #[test]
    fn test_missing_sheet_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let json_path = tmp.path().join("a.json");
        fs::write(
            &json_path,
            serde_json::to_string(&single_atlas_json("idle", 2, "gone.png")).unwrap(),
        )
        .unwrap();

        let report = validate(&json_path, 2, "idle").unwrap();
        assert!(!report.passed);
        assert!(report.errors.iter().any(|e| e.contains("gone.png")));
    }

    #[test]
    fn test_rotated_frame_fails() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("s.png"), b"sheet").unwrap();
        let mut atlas = single_atlas_json("idle", 1, "s.png");
        atlas["frames"]["idle/0000"]["rotated"] = serde_json::json!(true);

        let json_path = tmp.path().join("a.json");
        fs::write(&json_path, serde_json::to_string(&atlas).unwrap()).unwrap();

        let report = validate(&json_path, 1, "idle").unwrap();
        assert!(!report.passed);
    }

    #[test]
    fn test_wrong_key_shape_fails() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("s.png"), b"sheet").unwrap();
        let json_path = tmp.path().join("a.json");
        fs::write(
            &json_path,
            serde_json::to_string(&serde_json::json!({
                "frames": { "idle/12": { "rotated": false } },
                "meta": { "image": "s.png", "format": "RGBA8888", "scale": "1" }
            }))
            .unwrap(),
        )
        .unwrap();

        let report = validate(&json_path, 1, "idle").unwrap();
        assert!(!report.passed);
        assert!(report.errors.iter().any(|e| e.contains("does not match")));
    }

    #[test]
    fn test_numeric_scale_is_accepted() {
        // Some packer versions emit scale as a bare number.
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("s.png"), b"sheet").unwrap();
        let mut atlas = single_atlas_json("idle", 1, "s.png");
        atlas["meta"]["scale"] = serde_json::json!(1.0);

        let json_path = tmp.path().join("a.json");
        fs::write(&json_path, serde_json::to_string(&atlas).unwrap()).unwrap();

        let report = validate(&json_path, 1, "idle").unwrap();
        assert!(report.passed, "errors: {:?}", report.errors);
    }

    #[test]
    fn test_duplicate_keys_across_pages_collapse() {
        // The same frame appearing on two pages must not satisfy the
        // count: keys are pooled into a set first.
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("p0.png"), b"sheet").unwrap();
        fs::write(tmp.path().join("p1.png"), b"sheet").unwrap();

        let page = |image: &str| {
            serde_json::json!({
                "image": image,
                "format": "RGBA8888",
                "scale": "1",
                "frames": [{ "filename": "idle/0000", "rotated": false }]
            })
        };
        let json_path = tmp.path().join("a.json");
        fs::write(
            &json_path,
            serde_json::to_string(&serde_json::json!({ "textures": [page("p0.png"), page("p1.png")] }))
                .unwrap(),
        )
        .unwrap();

        let report = validate(&json_path, 2, "idle").unwrap();
        assert!(!report.passed);
        assert_eq!(report.frame_keys_found, 1);
    }

    #[test]
    fn test_count_mismatch_fails() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("s.png"), b"sheet").unwrap();
        let json_path = tmp.path().join("a.json");
        fs::write(
            &json_path,
            serde_json::to_string(&single_atlas_json("idle", 3, "s.png")).unwrap(),
        )
        .unwrap();

        let report = validate(&json_path, 4, "idle").unwrap();
        assert!(!report.passed);
        assert!(report.errors.iter().any(|e| e.contains("expected 4")));
    }
}
