// spriteforge-core/src/ports/generator.rs

// This file defines what the orchestrator needs from a generative backend,
// without knowing how it's done. The concrete adapter (Gemini HTTP, local
// stub...) lives in infrastructure and is swappable in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One part of the Semantic Interleaving payload. Order matters: the backend
/// sees the anchor before the pose reference, then the hierarchy text.
#[derive(Debug, Clone)]
pub enum PromptPart {
    Text(String),
    InlinePng { label: String, bytes: Vec<u8> },
}

/// Sampling parameters sent with every request. Temperature is locked at 1.0
/// by the adapter regardless of what the manifest asks for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SamplingParams {
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: u32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            top_p: 0.95,
            top_k: 40,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeneratorRequest {
    pub parts: Vec<PromptPart>,
    /// CRC32-derived seed on attempt 1; None lets the backend randomize.
    pub seed: Option<u32>,
    pub sampling: SamplingParams,
}

#[derive(Debug, Clone)]
pub struct GeneratorResult {
    pub png_bytes: Vec<u8>,
    pub thought_signature: Option<String>,
    pub thought_content: Option<String>,
    /// The sampling parameters the backend actually used, echoed back.
    pub sampling: SamplingParams,
}

/// Error kinds the orchestrator is allowed to react to. Anything else is a
/// bug in the adapter, not a retry candidate.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GeneratorError {
    #[error("generator backend unavailable: {0}")]
    Unavailable(String),

    #[error("generator rate limited (retry after {retry_after_ms} ms)")]
    RateLimited { retry_after_ms: u64 },

    #[error("generator call timed out after {0} s")]
    Timeout(u64),

    #[error("generator returned an invalid response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, request: GeneratorRequest) -> Result<GeneratorResult, GeneratorError>;

    /// Human-readable backend identity ("gemini-2.5-flash-image" etc.) for
    /// the lock file and logs.
    fn describe(&self) -> String;

    /// Release any held resources (connection pools, temp state).
    async fn close(&self);
}
