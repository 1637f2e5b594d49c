// spriteforge-core/src/infrastructure/error.rs

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum InfrastructureError {
    // --- FILESYSTEM (IO) ---
    #[error("File System Error: {0}")]
    #[diagnostic(
        code(spriteforge::infra::io),
        help("Check file permissions or path validity.")
    )]
    Io(#[from] std::io::Error),

    // --- JSON STATE FILES ---
    #[error("JSON Parsing Error: {0}")]
    #[diagnostic(
        code(spriteforge::infra::json),
        help("The state file is corrupted or was written by an incompatible version.")
    )]
    JsonError(#[from] serde_json::Error),

    #[error("State file not found at '{0}'")]
    #[diagnostic(code(spriteforge::infra::state_missing))]
    StateNotFound(String),

    // --- PNG CODEC ---
    #[error("PNG Decode Error: {0}")]
    #[diagnostic(
        code(spriteforge::infra::png),
        help("The file is not a decodable RGBA PNG.")
    )]
    PngError(String),

    // --- ATLAS PACKER (SUBPROCESS) ---
    // Generator backend failures live on the ImageGenerator port
    // (ports/generator.rs), not here.
    #[error("Atlas packer failed (exit {code:?}): {stderr}")]
    #[diagnostic(
        code(spriteforge::infra::dep_packer),
        help("Inspect logs/texturepacker.log for the full packer output.")
    )]
    PackerFailed { code: Option<i32>, stderr: String },

    #[error("Atlas packer binary not found at '{0}'")]
    #[diagnostic(
        code(spriteforge::infra::dep_packer_missing),
        help("Install TexturePacker or set SPRITEFORGE_PACKER_BIN to its location.")
    )]
    PackerNotFound(String),

    #[error("Atlas packer timed out after {0} s")]
    #[diagnostic(code(spriteforge::infra::dep_packer_timeout))]
    PackerTimeout(u64),

    #[error("Configuration Error: {0}")]
    ConfigError(String),
}
