// spriteforge-core/src/domain/manifest/lock.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::manifest::Manifest;

pub const REDACTED: &str = "[REDACTED]";

/// Frozen record of what a run was started with. Written once at INIT into
/// the run directory and never touched again.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LockFile {
    pub run_id: String,
    pub run_start: DateTime<Utc>,
    /// Absolute path, forward slashes on every platform.
    pub manifest_path: String,
    pub manifest_hash: String,
    pub environment: LockEnvironment,
    /// Fully resolved manifest with secrets replaced by `[REDACTED]`.
    pub manifest: Manifest,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LockEnvironment {
    pub adapter_version: String,
    pub model_id: String,
}

impl LockFile {
    pub fn build(
        run_id: &str,
        run_start: DateTime<Utc>,
        manifest_path: &std::path::Path,
        manifest_hash: &str,
        adapter_version: &str,
        resolved: &Manifest,
    ) -> Self {
        let mut manifest = resolved.clone();
        if manifest.generator.api_key.is_some() {
            manifest.generator.api_key = Some(REDACTED.to_string());
        }

        Self {
            run_id: run_id.to_string(),
            run_start,
            manifest_path: forward_slashes(manifest_path),
            manifest_hash: manifest_hash.to_string(),
            environment: LockEnvironment {
                adapter_version: adapter_version.to_string(),
                model_id: resolved.generator.model.clone(),
            },
            manifest,
        }
    }
}

fn forward_slashes(path: &std::path::Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_redacts_api_key() {
        let json = r#"
        {
            "identity": { "character": "BLAZE", "move": "idle", "version": "1", "frame_count": 1 },
            "inputs": { "anchor": "a.png" },
            "generator": {
                "backend": "gemini",
                "model": "gemini-2.5-flash-image",
                "api_key": "sk-live-supersecret",
                "prompts": { "master": "pixel art" }
            }
        }
        "#;
        let manifest: Manifest = serde_json::from_str(json).unwrap();

        let lock = LockFile::build(
            "run_20260801_0001",
            Utc::now(),
            std::path::Path::new("/work/manifest.json"),
            "abc123",
            "spriteforge-core/0.1.0",
            &manifest,
        );

        assert_eq!(lock.manifest.generator.api_key.as_deref(), Some(REDACTED));
        assert_eq!(lock.environment.model_id, "gemini-2.5-flash-image");

        // The secret must not survive serialization either.
        let serialized = serde_json::to_string(&lock).unwrap();
        assert!(!serialized.contains("supersecret"));
    }

    #[test]
    fn test_lock_path_uses_forward_slashes() {
        assert_eq!(
            forward_slashes(std::path::Path::new("C:\\runs\\manifest.json")),
            "C:/runs/manifest.json"
        );
    }
}
