// spriteforge-core/src/domain/error.rs

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum DomainError {
    #[error("Manifest validation failed at '{field}': expected {expected}, got {received}")]
    #[diagnostic(code(spriteforge::domain::validation), help("{hint}"))]
    ValidationError {
        field: String,
        expected: String,
        received: String,
        hint: String,
    },

    #[error(
        "{}: anchor image has no pixel with alpha >= 128",
        crate::domain::reason::ANCHOR_FULLY_TRANSPARENT
    )]
    #[diagnostic(
        code(spriteforge::domain::anchor),
        help("Export the anchor with a real subject on a transparent background.")
    )]
    AnchorFullyTransparent,

    #[error(
        "{}: manifest hash differs from the one the run was started with",
        crate::domain::reason::MANIFEST_CHANGED
    )]
    #[diagnostic(
        code(spriteforge::domain::manifest_changed),
        help("Re-run with --force to accept the new manifest, or restore the original file.")
    )]
    ManifestChanged,

    #[error("Illegal state transition: {from} -> {to}")]
    #[diagnostic(code(spriteforge::domain::transition))]
    IllegalTransition { from: String, to: String },

    #[error("Director session is '{0}' and can no longer be modified")]
    #[diagnostic(code(spriteforge::domain::session_terminal))]
    SessionTerminal(String),

    #[error("Audit Error: {0}")]
    #[diagnostic(code(spriteforge::domain::audit))]
    AuditError(String),

    #[error("Image Error: {0}")]
    #[diagnostic(code(spriteforge::domain::image))]
    ImageError(String),
}
