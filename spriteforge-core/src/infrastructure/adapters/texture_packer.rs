// spriteforge-core/src/infrastructure/adapters/texture_packer.rs
//
// TexturePacker subprocess behind the AtlasPacker port. The flag set below
// is locked: it defines the atlas geometry the game engine was tuned
// against, so operator flags may only add, never override.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};

use crate::error::ForgeError;
use crate::infrastructure::error::InfrastructureError;
use crate::ports::packer::{AtlasPacker, PackOutput};

pub const DEFAULT_PACKER_BIN: &str = "TexturePacker";
pub const PACKER_TIMEOUT_SECS: u64 = 120;

/// Locked flag set, in invocation order.
pub const LOCKED_FLAGS: &[&str] = &[
    "--format",
    "phaser",
    "--trim-mode",
    "Trim",
    "--extrude",
    "1",
    "--shape-padding",
    "2",
    "--border-padding",
    "2",
    "--disable-rotation",
    "--alpha-handling",
    "ReduceBorderArtifacts",
    "--max-size",
    "2048",
    "--trim-sprite-names",
    "--prepend-folder-name",
];

/// Flag names the operator may not supply a second time.
const LOCKED_FLAG_NAMES: &[&str] = &[
    "--format",
    "--trim-mode",
    "--extrude",
    "--shape-padding",
    "--border-padding",
    "--disable-rotation",
    "--alpha-handling",
    "--max-size",
    "--trim-sprite-names",
    "--prepend-folder-name",
    "--data",
    "--sheet",
];

pub struct TexturePackerAdapter {
    binary: PathBuf,
}

impl TexturePackerAdapter {
    pub fn new(binary_override: Option<&str>) -> Self {
        Self {
            binary: PathBuf::from(binary_override.unwrap_or(DEFAULT_PACKER_BIN)),
        }
    }

    /// Operator extras minus anything colliding with the locked set. A
    /// dropped flag is logged, not an error: the manifest stays portable
    /// across packer upgrades.
    fn filter_extra_flags(extra: &[String]) -> Vec<String> {
        let mut kept = Vec::new();
        let mut skip_value = false;

        for flag in extra {
            if skip_value {
                skip_value = false;
                continue;
            }
            if flag.starts_with("--") {
                let name = flag.split('=').next().unwrap_or(flag);
                if LOCKED_FLAG_NAMES.contains(&name) {
                    warn!(flag = %flag, "operator flag collides with the locked set; dropped");
                    // A separated value form ("--max-size 4096") drags its
                    // value along.
                    skip_value = !flag.contains('=');
                    continue;
                }
            }
            kept.push(flag.clone());
        }
        kept
    }
}

#[async_trait]
impl AtlasPacker for TexturePackerAdapter {
    async fn pack(
        &self,
        staging_dir: &Path,
        out_base: &Path,
        extra_flags: &[String],
    ) -> Result<PackOutput, ForgeError> {
        let data_json = out_base.with_extension("json");
        let sheet_png = out_base.with_extension("png");

        let mut command = Command::new(&self.binary);
        command
            .args(LOCKED_FLAGS)
            .args(Self::filter_extra_flags(extra_flags))
            .arg("--data")
            .arg(&data_json)
            .arg("--sheet")
            .arg(&sheet_png)
            .arg(staging_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!(binary = ?self.binary, staging = ?staging_dir, "invoking atlas packer");

        let child = command.spawn().map_err(|e| {
            ForgeError::Infrastructure(match e.kind() {
                std::io::ErrorKind::NotFound => {
                    InfrastructureError::PackerNotFound(self.binary.to_string_lossy().into_owned())
                }
                _ => InfrastructureError::Io(e),
            })
        })?;

        let output = tokio::time::timeout(
            Duration::from_secs(PACKER_TIMEOUT_SECS),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| {
            // kill_on_drop reaps the child when the future is dropped here.
            ForgeError::Infrastructure(InfrastructureError::PackerTimeout(PACKER_TIMEOUT_SECS))
        })?
        .map_err(|e| ForgeError::Infrastructure(InfrastructureError::Io(e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(ForgeError::Infrastructure(InfrastructureError::PackerFailed {
                code: output.status.code(),
                stderr: stderr.clone(),
            }));
        }

        Ok(PackOutput { data_json, sheet_png, stdout, stderr })
    }

    async fn verify(&self) -> Result<String, ForgeError> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                ForgeError::Infrastructure(match e.kind() {
                    std::io::ErrorKind::NotFound => InfrastructureError::PackerNotFound(
                        self.binary.to_string_lossy().into_owned(),
                    ),
                    _ => InfrastructureError::Io(e),
                })
            })?;

        let version = String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .unwrap_or("unknown")
            .to_string();
        Ok(version)
    }
}
