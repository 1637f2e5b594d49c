// spriteforge-core/src/ports/packer.rs

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::ForgeError;

/// Outcome of one packer invocation: where the atlas landed plus the raw
/// process output (mirrored into logs/texturepacker.log by the caller).
#[derive(Debug, Clone)]
pub struct PackOutput {
    pub data_json: PathBuf,
    pub sheet_png: PathBuf,
    pub stdout: String,
    pub stderr: String,
}

#[async_trait]
pub trait AtlasPacker: Send + Sync {
    /// Pack the staging directory into `{out_base}.png` / `{out_base}.json`.
    /// Implementations must enforce the locked flag set and the 120 s timeout.
    async fn pack(
        &self,
        staging_dir: &Path,
        out_base: &Path,
        extra_flags: &[String],
    ) -> Result<PackOutput, ForgeError>;

    /// Cheap availability probe for `doctor` (binary resolvable, executable).
    async fn verify(&self) -> Result<String, ForgeError>;
}
