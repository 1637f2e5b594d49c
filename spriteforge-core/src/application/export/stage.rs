// spriteforge-core/src/application/export/stage.rs
//
// Deterministic staging: approved frames are renamed into the folder
// structure the packer turns into atlas keys ({move_id}/{nnnn}).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::ForgeError;
use crate::infrastructure::fs::write_json;

#[derive(Debug, Serialize, Deserialize)]
pub struct FrameMapping {
    pub move_id: String,
    /// staged name -> original approved file name
    pub frames: BTreeMap<String, String>,
}

/// Copy `approved/frame_{NNNN}.png` into `{staging}/{move_id}/{nnnn}.png`,
/// re-indexed to a contiguous 0-based sequence, and record the mapping.
pub fn prepare(
    approved_dir: &Path,
    move_id: &str,
    staging_root: &Path,
) -> Result<PathBuf, ForgeError> {
    // Zero-Trust Path Traversal Guard: the move id normally comes from a
    // validated manifest, but `validate <run_id>` re-reads it from a lock
    // file anyone could have edited.
    if move_id.contains(['/', '\\']) || move_id.contains("..") {
        return Err(ForgeError::UnsafePath(move_id.to_string()));
    }

    let move_dir = staging_root.join(move_id);
    if move_dir.exists() {
        // Stale staging from an earlier export attempt would leak frames
        // into the new atlas.
        std::fs::remove_dir_all(&move_dir)?;
    }
    std::fs::create_dir_all(&move_dir)?;

    let mut approved: Vec<PathBuf> = std::fs::read_dir(approved_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension().and_then(|e| e.to_str()) == Some("png")
                && p.file_stem()
                    .and_then(|s| s.to_str())
                    .is_some_and(|s| s.starts_with("frame_"))
        })
        .collect();
    approved.sort();

    let mut mapping = BTreeMap::new();
    for (index, source) in approved.iter().enumerate() {
        let staged_name = format!("{index:04}.png");
        let target = move_dir.join(&staged_name);
        std::fs::copy(source, &target)?;

        let original = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        mapping.insert(format!("{move_id}/{staged_name}"), original);
    }

    write_json(
        &staging_root.join("frame_mapping.json"),
        &FrameMapping {
            move_id: move_id.to_string(),
            frames: mapping,
        },
    )
    .map_err(ForgeError::Infrastructure)?;

    info!(staged = approved.len(), dir = ?move_dir, "staging prepared");
    Ok(move_dir)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_prepare_renames_contiguously() {
        let tmp = tempfile::tempdir().unwrap();
        let approved = tmp.path().join("approved");
        fs::create_dir_all(&approved).unwrap();
        // A run where frame 1 was rejected: approved indices are 0, 2, 3.
        for i in [0u32, 2, 3] {
            fs::write(approved.join(format!("frame_{i:04}.png")), b"png").unwrap();
        }

        let staging = tmp.path().join("staging");
        let move_dir = prepare(&approved, "idle", &staging).unwrap();

        for i in 0..3 {
            assert!(move_dir.join(format!("{i:04}.png")).exists());
        }
        assert!(!move_dir.join("0003.png").exists());

        let mapping: FrameMapping =
            serde_json::from_str(&fs::read_to_string(staging.join("frame_mapping.json")).unwrap())
                .unwrap();
        assert_eq!(mapping.frames["idle/0001.png"], "frame_0002.png");
    }

    #[test]
    fn test_prepare_clears_stale_staging() {
        let tmp = tempfile::tempdir().unwrap();
        let approved = tmp.path().join("approved");
        fs::create_dir_all(&approved).unwrap();
        fs::write(approved.join("frame_0000.png"), b"png").unwrap();

        let staging = tmp.path().join("staging");
        fs::create_dir_all(staging.join("idle")).unwrap();
        fs::write(staging.join("idle/0009.png"), b"stale").unwrap();

        let move_dir = prepare(&approved, "idle", &staging).unwrap();
        assert!(move_dir.join("0000.png").exists());
        assert!(!move_dir.join("0009.png").exists());
    }

    #[test]
    fn test_prepare_rejects_traversal_in_move_id() {
        let tmp = tempfile::tempdir().unwrap();
        let approved = tmp.path().join("approved");
        fs::create_dir_all(&approved).unwrap();

        let staging = tmp.path().join("staging");
        let err = prepare(&approved, "../outside", &staging).unwrap_err();
        assert!(matches!(err, ForgeError::UnsafePath(_)));
    }

    #[test]
    fn test_prepare_ignores_stray_files() {
        let tmp = tempfile::tempdir().unwrap();
        let approved = tmp.path().join("approved");
        fs::create_dir_all(approved.join("quarantine")).unwrap();
        fs::write(approved.join("frame_0000.png"), b"png").unwrap();
        fs::write(approved.join("notes.txt"), b"not a frame").unwrap();

        let staging = tmp.path().join("staging");
        let move_dir = prepare(&approved, "idle", &staging).unwrap();

        let staged: Vec<_> = fs::read_dir(&move_dir).unwrap().collect();
        assert_eq!(staged.len(), 1);
    }
}
