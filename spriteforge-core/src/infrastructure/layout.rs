// spriteforge-core/src/infrastructure/layout.rs
//
// Canonical run-directory layout. Every component asks this module for a
// path instead of formatting its own; file naming is a wire contract with
// the atlas validator and the review UI.

use std::path::{Path, PathBuf};

use crate::domain::reason::sanitize_for_filename;
use crate::error::ForgeError;
use crate::infrastructure::error::InfrastructureError;

#[derive(Debug, Clone)]
pub struct RunLayout {
    root: PathBuf,
}

impl RunLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Layout for an operator-supplied run id.
    ///
    /// Zero-Trust Path Traversal Guard: `join` does not normalize "..",
    /// so a run id like `../elsewhere` would lexically pass `starts_with`
    /// while escaping the output root. Reject separators and dot-dot
    /// outright.
    pub fn for_run(out_dir: &Path, run_id: &str) -> Result<Self, ForgeError> {
        if run_id.is_empty() || run_id.contains(['/', '\\']) || run_id.contains("..") {
            return Err(ForgeError::UnsafePath(run_id.to_string()));
        }
        Ok(Self::new(out_dir.join(run_id)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create every directory of the layout. Idempotent.
    pub fn create_dirs(&self) -> Result<(), InfrastructureError> {
        for dir in [
            self.root.clone(),
            self.candidates_dir(),
            self.approved_dir(),
            self.rejected_dir(),
            self.audit_dir(),
            self.logs_dir(),
            self.export_dir(),
            self.validation_dir(),
        ] {
            std::fs::create_dir_all(&dir).map_err(InfrastructureError::Io)?;
        }
        Ok(())
    }

    // --- STATE FILES ---

    pub fn state_file(&self) -> PathBuf {
        self.root.join("state.json")
    }

    pub fn lock_file(&self) -> PathBuf {
        self.root.join("manifest.lock.json")
    }

    pub fn anchor_analysis_file(&self) -> PathBuf {
        self.root.join("anchor_analysis.json")
    }

    pub fn summary_file(&self) -> PathBuf {
        self.root.join("summary.json")
    }

    pub fn session_file(&self) -> PathBuf {
        self.root.join("director_session.json")
    }

    // --- DIRECTORIES ---

    pub fn candidates_dir(&self) -> PathBuf {
        self.root.join("candidates")
    }

    pub fn approved_dir(&self) -> PathBuf {
        self.root.join("approved")
    }

    pub fn rejected_dir(&self) -> PathBuf {
        self.root.join("rejected")
    }

    pub fn audit_dir(&self) -> PathBuf {
        self.root.join("audit")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn export_dir(&self) -> PathBuf {
        self.root.join("export")
    }

    pub fn validation_dir(&self) -> PathBuf {
        self.root.join("validation")
    }

    // --- FRAME FILES ---

    pub fn candidate_file(&self, frame_index: u32, attempt: u32) -> PathBuf {
        self.candidates_dir()
            .join(format!("frame_{frame_index:04}_attempt_{attempt:02}.png"))
    }

    pub fn normalized_file(&self, frame_index: u32, attempt: u32) -> PathBuf {
        self.candidates_dir()
            .join(format!("frame_{frame_index:04}_attempt_{attempt:02}_norm.png"))
    }

    pub fn approved_file(&self, frame_index: u32) -> PathBuf {
        self.approved_dir().join(format!("frame_{frame_index:04}.png"))
    }

    pub fn rejected_file(&self, frame_index: u32, reason: &str) -> PathBuf {
        self.rejected_dir().join(format!(
            "frame_{frame_index:04}_{}.png",
            sanitize_for_filename(reason)
        ))
    }

    pub fn rejected_metadata_file(&self, frame_index: u32, reason: &str) -> PathBuf {
        self.rejected_dir().join(format!(
            "frame_{frame_index:04}_{}_metadata.json",
            sanitize_for_filename(reason)
        ))
    }

    // --- AUDIT / LOG FILES ---

    pub fn audit_log_file(&self) -> PathBuf {
        self.audit_dir().join("audit_log.jsonl")
    }

    pub fn frame_metrics_file(&self, frame_index: u32) -> PathBuf {
        self.audit_dir().join(format!("frame_{frame_index}_metrics.json"))
    }

    pub fn pipeline_log_file(&self) -> PathBuf {
        self.logs_dir().join("pipeline.log")
    }

    pub fn packer_log_file(&self) -> PathBuf {
        self.logs_dir().join("texturepacker.log")
    }

    pub fn validation_results_file(&self) -> PathBuf {
        self.validation_dir().join("test-results.json")
    }

    // --- EXPORT ---

    pub fn export_base(&self, character: &str, move_id: &str) -> PathBuf {
        self.export_dir().join(format!(
            "{}_{}",
            character.to_lowercase(),
            move_id
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_file_naming() {
        let layout = RunLayout::new("/runs/run_1");
        assert!(
            layout
                .candidate_file(3, 1)
                .ends_with("candidates/frame_0003_attempt_01.png")
        );
        assert!(
            layout
                .normalized_file(3, 12)
                .ends_with("candidates/frame_0003_attempt_12_norm.png")
        );
        assert!(layout.approved_file(0).ends_with("approved/frame_0000.png"));
    }

    #[test]
    fn test_rejected_naming_sanitizes_reason() {
        let layout = RunLayout::new("/runs/run_1");
        assert!(
            layout
                .rejected_file(7, "SF01_IDENTITY_DRIFT")
                .ends_with("rejected/frame_0007_SF01_IDENTITY_DRIFT.png")
        );
        assert!(
            layout
                .rejected_file(7, "weird/reason code")
                .ends_with("rejected/frame_0007_weird_reason_code.png")
        );
    }

    #[test]
    fn test_for_run_rejects_traversal() {
        assert!(RunLayout::for_run(Path::new("runs"), "../elsewhere").is_err());
        assert!(RunLayout::for_run(Path::new("runs"), "a/b").is_err());
        assert!(RunLayout::for_run(Path::new("runs"), "a\\b").is_err());
        assert!(RunLayout::for_run(Path::new("runs"), "").is_err());
        assert!(RunLayout::for_run(Path::new("runs"), "run_20260801_idle").is_ok());
    }

    #[test]
    fn test_create_dirs_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = RunLayout::new(tmp.path().join("run_x"));
        layout.create_dirs().unwrap();
        layout.create_dirs().unwrap();
        assert!(layout.candidates_dir().is_dir());
        assert!(layout.validation_dir().is_dir());
    }

    #[test]
    fn test_export_base_lowercases_character() {
        let layout = RunLayout::new("/runs/run_1");
        assert!(
            layout
                .export_base("BLAZE", "idle")
                .ends_with("export/blaze_idle")
        );
    }
}
