// spriteforge-core/src/infrastructure/adapters/request.rs
//
// Builds the generator request the orchestrator sends on every attempt:
// the Semantic Interleaving payload, the drift-gated pose reference and
// the deterministic attempt-1 seed. Backend-independent; every concrete
// adapter receives the same request shape.

use tracing::{debug, info};

use crate::domain::manifest::{GeneratorConfig, SeedPolicy};
use crate::domain::retry::RetryAction;
use crate::ports::generator::{GeneratorRequest, PromptPart, SamplingParams};

/// Previous-frame references below this identity score are dropped from
/// the payload: a drifted pose reference poisons the next frame too.
pub const DRIFT_GATE_MIN_IDENTITY: f64 = 0.9;

pub const ANCHOR_LABEL: &str = "[IMAGE 1]: MASTER ANCHOR (IDENTITY TRUTH)";
pub const PREV_FRAME_LABEL: &str = "[IMAGE 2]: PREVIOUS FRAME (POSE REFERENCE)";
pub const HIERARCHY_TEXT: &str =
    "HIERARCHY: If [IMAGE 2] conflicts with [IMAGE 1], [IMAGE 1] wins.";

#[derive(Debug, Clone)]
pub struct PrevFrameRef {
    pub png_bytes: Vec<u8>,
    pub identity_score: f64,
}

/// Deterministic attempt-1 seed: CRC32 over `run_id::frame::attempt`.
/// Stable across platforms, so a re-run of attempt 1 is reproducible.
pub fn deterministic_seed(run_id: &str, frame_index: u32, attempt_index: u32) -> u32 {
    crc32fast::hash(format!("{run_id}::{frame_index}::{attempt_index}").as_bytes())
}

pub fn build_request(
    config: &GeneratorConfig,
    anchor_png: &[u8],
    prev_frame: Option<&PrevFrameRef>,
    action: Option<RetryAction>,
    run_id: &str,
    frame_index: u32,
    attempt_index: u32,
) -> GeneratorRequest {
    let mut parts = Vec::new();

    parts.push(PromptPart::InlinePng {
        label: ANCHOR_LABEL.to_string(),
        bytes: anchor_png.to_vec(),
    });

    // Re-anchoring and identity rescue deliberately regenerate from the
    // anchor alone; otherwise the pose reference rides along when its
    // identity held up.
    let anchor_only = matches!(
        action,
        Some(RetryAction::ReAnchor) | Some(RetryAction::IdentityRescue)
    );

    if let Some(prev) = prev_frame {
        if anchor_only {
            debug!(frame_index, "anchor-only action; omitting PrevFrame reference");
        } else if prev.identity_score >= DRIFT_GATE_MIN_IDENTITY {
            parts.push(PromptPart::InlinePng {
                label: PREV_FRAME_LABEL.to_string(),
                bytes: prev.png_bytes.clone(),
            });
        } else {
            info!(
                frame_index,
                identity_score = prev.identity_score,
                "skipping PrevFrame reference due to drift"
            );
        }
    }

    parts.push(PromptPart::Text(HIERARCHY_TEXT.to_string()));
    parts.push(PromptPart::Text(prompt_for(config, action, frame_index)));

    let seed = match (config.seed_policy, attempt_index) {
        (SeedPolicy::FixedThenRandom, 1) => {
            Some(deterministic_seed(run_id, frame_index, attempt_index))
        }
        _ => None,
    };

    GeneratorRequest {
        parts,
        seed,
        // Locked regardless of the manifest; an attempted override was
        // already logged at load time.
        sampling: SamplingParams::default(),
    }
}

/// Compose the text prompt for this attempt from the manifest templates
/// and the recovery action in play.
fn prompt_for(config: &GeneratorConfig, action: Option<RetryAction>, frame_index: u32) -> String {
    let p = &config.prompts;
    let mut prompt = if frame_index == 0 {
        p.master.clone()
    } else if p.variation.is_empty() {
        p.master.clone()
    } else {
        format!("{}\n{}", p.master, p.variation)
    };

    match action {
        Some(RetryAction::IdentityRescue) | Some(RetryAction::ReAnchor) => {
            if !p.lock.is_empty() {
                prompt.push('\n');
                prompt.push_str(&p.lock);
            }
        }
        Some(RetryAction::TightenNegative) => {
            if !p.negative.is_empty() {
                prompt.push_str("\nAVOID: ");
                prompt.push_str(&p.negative);
            }
        }
        Some(RetryAction::PostProcess) | Some(RetryAction::TwoStageInpaint) => {
            prompt.push_str("\nHard-edged pixels only. No soft alpha edges, no halos, no chroma fringes.");
        }
        Some(RetryAction::RegenerateHighres) => {
            prompt.push_str("\nRender clean contiguous shapes; no stray pixels.");
        }
        Some(RetryAction::PoseRescue) => {
            prompt.push_str("\nKeep the feet planted on the same ground line as the reference.");
        }
        Some(RetryAction::RerollSeed) | Some(RetryAction::DefaultRegenerate) | None => {}
    }

    if !p.negative.is_empty() && !matches!(action, Some(RetryAction::TightenNegative)) {
        prompt.push_str("\nNEGATIVE: ");
        prompt.push_str(&p.negative);
    }

    prompt
}
