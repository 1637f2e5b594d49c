// spriteforge-core/src/domain/reason.rs
//
// Reason codes are the shared vocabulary between the auditor, the retry
// manager, the reporter and the operator. They are plain tokens, not types:
// they end up in JSONL logs, file names, summaries and error messages.

// --- SOFT FAILURES (quality; recoverable via the retry ladder) ---
pub const SF01_IDENTITY_DRIFT: &str = "SF01_IDENTITY_DRIFT";
pub const SF02_PALETTE_DRIFT: &str = "SF02_PALETTE_DRIFT";
pub const SF03_BASELINE_DRIFT: &str = "SF03_BASELINE_DRIFT";
/// Reserved for temporal flicker detection; declared so the numbering is
/// stable, not emitted by the current battery.
pub const SF04_TEMPORAL_FLICKER: &str = "SF04_TEMPORAL_FLICKER";
pub const SF_ALPHA_HALO: &str = "SF_ALPHA_HALO";
pub const SF_PIXEL_NOISE: &str = "SF_PIXEL_NOISE";

// --- HARD FAILURES (structural; terminate the frame, never the run) ---
pub const HF01_DIMENSION_MISMATCH: &str = "HF01_DIMENSION_MISMATCH";
pub const HF02_CHANNEL_COUNT: &str = "HF02_CHANNEL_COUNT";
pub const HF03_DECODE_FAILED: &str = "HF03_DECODE_FAILED";
pub const HF04_FILE_SIZE: &str = "HF04_FILE_SIZE";
pub const HF05_BIT_DEPTH: &str = "HF05_BIT_DEPTH";
pub const HF_IDENTITY_COLLAPSE: &str = "HF_IDENTITY_COLLAPSE";

// --- STOP REASONS (orchestrator halts; artifacts preserved) ---
pub const STOP_REJECT_RATE_EXCEEDED: &str = "REJECT_RATE_EXCEEDED";
pub const STOP_CONSECUTIVE_FAILURES: &str = "CONSECUTIVE_FAILURES";
pub const STOP_ATTEMPT_BUDGET_EXHAUSTED: &str = "ATTEMPT_BUDGET_EXHAUSTED";
pub const STOP_USER_INTERRUPT: &str = "USER_INTERRUPT";
pub const STOP_GENERATOR_FATAL: &str = "GENERATOR_FATAL";

// --- ANALYZER / RESUME ---
pub const ANCHOR_FULLY_TRANSPARENT: &str = "ANCHOR_FULLY_TRANSPARENT";
pub const MANIFEST_CHANGED: &str = "MANIFEST_CHANGED";

// --- DEPENDENCY ---
pub const DEP_PACKER_FAIL: &str = "DEP_PACKER_FAIL";
pub const DEP_GENERATOR_FAIL: &str = "DEP_GENERATOR_FAIL";

/// Sanitize a reason code for embedding in a file name
/// (`rejected/frame_0003_SF01_IDENTITY_DRIFT.png`).
pub fn sanitize_for_filename(reason: &str) -> String {
    reason
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_passthrough() {
        assert_eq!(
            sanitize_for_filename(SF01_IDENTITY_DRIFT),
            "SF01_IDENTITY_DRIFT"
        );
    }

    #[test]
    fn test_sanitize_strips_separators() {
        assert_eq!(sanitize_for_filename("SF-01/IDENTITY"), "SF_01_IDENTITY");
    }
}
