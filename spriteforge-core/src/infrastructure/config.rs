// spriteforge-core/src/infrastructure/config.rs
//
// Manifest loading and environment layering. Precedence is always
// manifest > built-in defaults > environment; serde fills the defaults,
// this module fills the environment layer.

use std::path::Path;

use tracing::{info, instrument, warn};

use crate::domain::manifest::{Manifest, hash::raw_json_hash, validate_manifest};
use crate::error::ForgeError;
use crate::infrastructure::error::InfrastructureError;

pub const ENV_API_KEY: &str = "GEMINI_API_KEY";
pub const ENV_PACKER_BIN: &str = "SPRITEFORGE_PACKER_BIN";
pub const ENV_DEBUG: &str = "DEBUG";

pub const ADAPTER_VERSION: &str = concat!("spriteforge-core/", env!("CARGO_PKG_VERSION"));

/// Everything read from the process environment, captured once at startup
/// so the rest of the run never touches `std::env`.
#[derive(Debug, Clone, Default)]
pub struct EnvSettings {
    pub api_key: Option<String>,
    pub packer_bin: Option<String>,
    pub debug: bool,
}

impl EnvSettings {
    pub fn capture() -> Self {
        Self {
            api_key: std::env::var(ENV_API_KEY).ok().filter(|v| !v.is_empty()),
            packer_bin: std::env::var(ENV_PACKER_BIN).ok().filter(|v| !v.is_empty()),
            debug: std::env::var(ENV_DEBUG).is_ok(),
        }
    }
}

/// A manifest that passed validation, with the environment layered in.
#[derive(Debug, Clone)]
pub struct ResolvedManifest {
    pub manifest: Manifest,
    pub manifest_hash: String,
    /// Effective API key (manifest wins over environment). Never persisted.
    pub api_key: Option<String>,
    pub packer_bin: Option<String>,
}

/// Load, validate and resolve a manifest file.
#[instrument(skip(env))]
pub fn load_manifest(
    manifest_path: &Path,
    base_dir: &Path,
    env: &EnvSettings,
) -> Result<ResolvedManifest, ForgeError> {
    let raw = std::fs::read_to_string(manifest_path).map_err(|e| {
        ForgeError::Infrastructure(InfrastructureError::ConfigError(format!(
            "Failed to read manifest at {:?}: {}",
            manifest_path, e
        )))
    })?;

    let manifest: Manifest = serde_json::from_str(&raw)
        .map_err(|e| ForgeError::Infrastructure(InfrastructureError::JsonError(e)))?;

    validate_manifest(&manifest, base_dir).map_err(ForgeError::Domain)?;

    // Hash the canonical form of the raw text, not the deserialized
    // struct: serde defaults must not silently change the resume identity
    // of an already-started run.
    let manifest_hash = raw_json_hash(&raw)
        .map_err(|e| ForgeError::Infrastructure(InfrastructureError::JsonError(e)))?;

    info!(path = ?manifest_path, hash = %manifest_hash, "Loaded manifest");

    if manifest.generator.temperature.is_some() {
        warn!("generator.temperature is locked to 1.0; manifest value accepted but overridden");
    }

    let api_key = manifest.generator.api_key.clone().or_else(|| env.api_key.clone());
    if manifest.generator.api_key.is_some() {
        warn!("API key found inline in the manifest; prefer the {} environment variable", ENV_API_KEY);
    }

    Ok(ResolvedManifest {
        manifest,
        manifest_hash,
        api_key,
        packer_bin: env.packer_bin.clone(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::fs;

    const MANIFEST_JSON: &str = r#"
    {
        "identity": { "character": "BLAZE", "move": "idle", "version": "1.0.0", "frame_count": 2 },
        "inputs": { "anchor": "anchor.png" },
        "generator": {
            "backend": "gemini",
            "model": "gemini-2.5-flash-image",
            "prompts": { "master": "pixel art fighter" }
        }
    }
    "#;

    #[test]
    fn test_load_manifest_resolves_env_key() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("anchor.png"), b"png").unwrap();
        let manifest_path = dir.path().join("manifest.json");
        fs::write(&manifest_path, MANIFEST_JSON).unwrap();

        let env = EnvSettings {
            api_key: Some("env-key".to_string()),
            packer_bin: None,
            debug: false,
        };

        let resolved = load_manifest(&manifest_path, dir.path(), &env).unwrap();
        assert_eq!(resolved.api_key.as_deref(), Some("env-key"));
        assert_eq!(resolved.manifest.identity.frame_count, 2);
        assert!(!resolved.manifest_hash.is_empty());
    }

    #[test]
    fn test_manifest_key_wins_over_env() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("anchor.png"), b"png").unwrap();
        let manifest_path = dir.path().join("manifest.json");
        let json = MANIFEST_JSON.replace(
            "\"backend\": \"gemini\",",
            "\"backend\": \"gemini\", \"api_key\": \"inline-key\",",
        );
        fs::write(&manifest_path, json).unwrap();

        let env = EnvSettings {
            api_key: Some("env-key".to_string()),
            ..Default::default()
        };

        let resolved = load_manifest(&manifest_path, dir.path(), &env).unwrap();
        assert_eq!(resolved.api_key.as_deref(), Some("inline-key"));
    }

    #[test]
    fn test_invalid_manifest_surfaces_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("anchor.png"), b"png").unwrap();
        let manifest_path = dir.path().join("manifest.json");
        fs::write(&manifest_path, MANIFEST_JSON.replace("\"frame_count\": 2", "\"frame_count\": 99"))
            .unwrap();

        let err = load_manifest(&manifest_path, dir.path(), &EnvSettings::default()).unwrap_err();
        assert!(matches!(err, ForgeError::Domain(_)));
    }

    #[test]
    fn test_hash_stable_across_reformat() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("anchor.png"), b"png").unwrap();

        let path_a = dir.path().join("a.json");
        fs::write(&path_a, MANIFEST_JSON).unwrap();

        // Same content, different formatting.
        let value: serde_json::Value = serde_json::from_str(MANIFEST_JSON).unwrap();
        let path_b = dir.path().join("b.json");
        fs::write(&path_b, serde_json::to_string(&value).unwrap()).unwrap();

        let env = EnvSettings::default();
        let a = load_manifest(&path_a, dir.path(), &env).unwrap();
        let b = load_manifest(&path_b, dir.path(), &env).unwrap();
        assert_eq!(a.manifest_hash, b.manifest_hash);
    }
}
