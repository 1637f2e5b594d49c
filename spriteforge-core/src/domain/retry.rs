// spriteforge-core/src/domain/retry.rs
//
// The retry manager turns a failed audit into exactly one of three things:
// another attempt (with a recovery action), a terminal rejection, or a run
// stop. It owns all per-frame retry bookkeeping.

use std::collections::HashMap;

use crate::domain::audit::AuditResult;
use crate::domain::reason;
use crate::domain::state::{AttemptOutcome, FrameState, OSCILLATION_WINDOW, OscillationEntry};

/// Below this identity score a re-anchor attempt counts towards collapse.
pub const COLLAPSE_SCORE_CEILING: f64 = 0.9;

/// Re-anchor attempts with sub-ceiling scores needed to declare collapse.
pub const COLLAPSE_REANCHOR_COUNT: u32 = 2;

/// Reject-rate stop threshold, checked after every rejection.
pub const REJECT_RATE_MAX: f64 = 0.30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetryAction {
    RerollSeed,
    IdentityRescue,
    ReAnchor,
    TightenNegative,
    PoseRescue,
    PostProcess,
    TwoStageInpaint,
    RegenerateHighres,
    DefaultRegenerate,
}

impl RetryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetryAction::RerollSeed => "REROLL_SEED",
            RetryAction::IdentityRescue => "IDENTITY_RESCUE",
            RetryAction::ReAnchor => "RE_ANCHOR",
            RetryAction::TightenNegative => "TIGHTEN_NEGATIVE",
            RetryAction::PoseRescue => "POSE_RESCUE",
            RetryAction::PostProcess => "POST_PROCESS",
            RetryAction::TwoStageInpaint => "TWO_STAGE_INPAINT",
            RetryAction::RegenerateHighres => "REGENERATE_HIGHRES",
            RetryAction::DefaultRegenerate => "DEFAULT_REGENERATE",
        }
    }

    pub fn parse(name: &str) -> Option<RetryAction> {
        Some(match name {
            "REROLL_SEED" => RetryAction::RerollSeed,
            "IDENTITY_RESCUE" => RetryAction::IdentityRescue,
            "RE_ANCHOR" => RetryAction::ReAnchor,
            "TIGHTEN_NEGATIVE" => RetryAction::TightenNegative,
            "POSE_RESCUE" => RetryAction::PoseRescue,
            "POST_PROCESS" => RetryAction::PostProcess,
            "TWO_STAGE_INPAINT" => RetryAction::TwoStageInpaint,
            "REGENERATE_HIGHRES" => RetryAction::RegenerateHighres,
            "DEFAULT_REGENERATE" => RetryAction::DefaultRegenerate,
            _ => return None,
        })
    }
}

/// Built-in reason-to-action ladders. Order is the escalation order.
pub fn default_ladder(reason_code: &str) -> &'static [RetryAction] {
    match reason_code {
        reason::SF01_IDENTITY_DRIFT => &[
            RetryAction::RerollSeed,
            RetryAction::IdentityRescue,
            RetryAction::ReAnchor,
        ],
        reason::SF02_PALETTE_DRIFT => {
            &[RetryAction::TightenNegative, RetryAction::IdentityRescue]
        }
        reason::SF03_BASELINE_DRIFT => &[RetryAction::PoseRescue, RetryAction::ReAnchor],
        reason::SF_ALPHA_HALO => &[RetryAction::PostProcess, RetryAction::TwoStageInpaint],
        reason::SF_PIXEL_NOISE => {
            &[RetryAction::RegenerateHighres, RetryAction::PostProcess]
        }
        _ => &[],
    }
}

pub fn is_known_reason(code: &str) -> bool {
    matches!(
        code,
        reason::SF01_IDENTITY_DRIFT
            | reason::SF02_PALETTE_DRIFT
            | reason::SF03_BASELINE_DRIFT
            | reason::SF_ALPHA_HALO
            | reason::SF_PIXEL_NOISE
    )
}

#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    /// Retry the frame with this recovery action.
    Retry {
        action: RetryAction,
        ladder_exhausted: bool,
    },
    /// Frame is terminally rejected; never retried again this run.
    Reject { code: String },
}

/// Decide what happens after a failed audit. Mutates the frame's retry
/// bookkeeping (identity history, re-anchor streak, oscillation window);
/// the caller persists the frame state afterwards.
pub fn decide(
    frame: &mut FrameState,
    audit: &AuditResult,
    ladder_overrides: &HashMap<String, Vec<String>>,
    max_attempts_per_frame: u32,
) -> RetryDecision {
    // --- BOOKKEEPING ---
    let identity_score = audit.identity_score().unwrap_or(0.0);
    frame.push_sf01_score(identity_score);

    // The attempt under audit carries no action yet (it is set from this
    // decision); whether it was re-anchored is recorded on the previous one.
    let last_was_reanchor = frame
        .attempts
        .len()
        .checked_sub(2)
        .and_then(|i| frame.attempts.get(i))
        .and_then(|a| a.action_taken.as_deref())
        == Some(RetryAction::ReAnchor.as_str());

    frame.oscillation_history.push(OscillationEntry {
        outcome: if identity_score >= COLLAPSE_SCORE_CEILING {
            AttemptOutcome::Pass
        } else {
            AttemptOutcome::Fail
        },
        re_anchored: last_was_reanchor,
    });

    // --- COLLAPSE DETECTION ---
    if is_identity_collapse(frame) || is_oscillating(frame) {
        return RetryDecision::Reject {
            code: reason::HF_IDENTITY_COLLAPSE.to_string(),
        };
    }

    // --- ATTEMPT BUDGET ---
    if frame.attempts.len() as u32 >= max_attempts_per_frame {
        let code = audit
            .reason_codes
            .first()
            .cloned()
            .unwrap_or_else(|| "MAX_ATTEMPTS".to_string());
        return RetryDecision::Reject { code };
    }

    // --- LADDER SELECTION ---
    let action = select_action(frame, &audit.reason_codes, ladder_overrides);

    if action.0 == RetryAction::ReAnchor {
        frame.consecutive_reanchor_count += 1;
    } else {
        frame.consecutive_reanchor_count = 0;
    }

    RetryDecision::Retry {
        action: action.0,
        ladder_exhausted: action.1,
    }
}

/// Walk the triggered reasons in battery order and take the first untried
/// action. RE_ANCHOR, as the terminal rung, is allowed to repeat: the
/// collapse detector needs consecutive re-anchors to ever observe two.
/// Everything exhausted -> one plain regeneration.
fn select_action(
    frame: &FrameState,
    reason_codes: &[String],
    overrides: &HashMap<String, Vec<String>>,
) -> (RetryAction, bool) {
    let tried = frame.tried_actions();
    let mut last_rung: Option<RetryAction> = None;

    for code in reason_codes {
        let override_ladder: Option<Vec<RetryAction>> = overrides
            .get(code)
            .map(|names| names.iter().filter_map(|n| RetryAction::parse(n)).collect());
        let ladder: &[RetryAction] = match &override_ladder {
            Some(custom) => custom,
            None => default_ladder(code),
        };

        for action in ladder {
            if !tried.contains(&action.as_str()) {
                return (*action, false);
            }
        }
        if let Some(last) = ladder.last() {
            last_rung = Some(*last);
        }
    }

    match last_rung {
        Some(RetryAction::ReAnchor) => (RetryAction::ReAnchor, false),
        _ => (RetryAction::DefaultRegenerate, true),
    }
}

/// Two or more consecutive re-anchor attempts whose identity scores both
/// stayed under the ceiling.
fn is_identity_collapse(frame: &FrameState) -> bool {
    if frame.consecutive_reanchor_count < COLLAPSE_REANCHOR_COUNT {
        return false;
    }
    let scores = &frame.last_sf01_scores;
    if scores.len() < 2 {
        return false;
    }
    scores[scores.len() - 2] < COLLAPSE_SCORE_CEILING
        && scores[scores.len() - 1] < COLLAPSE_SCORE_CEILING
}

/// Pass/fail strictly alternating over the last four entries with more
/// than two re-anchors among them: the ladder is thrashing, not converging.
fn is_oscillating(frame: &FrameState) -> bool {
    let history = &frame.oscillation_history;
    if history.len() < OSCILLATION_WINDOW {
        return false;
    }
    let window = &history[history.len() - OSCILLATION_WINDOW..];

    let alternating = window
        .windows(2)
        .all(|pair| pair[0].outcome != pair[1].outcome);
    let reanchors = window.iter().filter(|e| e.re_anchored).count();

    alternating && reanchors > 2
}

/// Stop condition, recomputed by the orchestrator after every rejection.
pub fn reject_rate_exceeded(rejected_count: usize, attempted_count: usize) -> bool {
    if attempted_count == 0 {
        return false;
    }
    (rejected_count as f64 / attempted_count as f64) > REJECT_RATE_MAX
}
