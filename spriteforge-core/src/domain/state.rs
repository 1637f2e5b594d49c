// spriteforge-core/src/domain/state.rs
//
// Everything the orchestrator persists between transitions. The run state
// is the single source of truth for resume: if it is not in here (or in a
// file it references), it did not happen.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Cap on the identity-score history kept per frame.
pub const SF01_HISTORY_CAP: usize = 8;

/// Cap on the oscillation window examined for collapse.
pub const OSCILLATION_WINDOW: usize = 4;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrchestratorState {
    Init,
    Generating,
    Auditing,
    RetryDeciding,
    Approving,
    NextFrame,
    Completed,
    Stopped,
    Failed,
}

impl OrchestratorState {
    /// The transition table. Anything not listed here is a bug, not a
    /// recoverable condition.
    pub fn can_transition_to(&self, next: &OrchestratorState) -> bool {
        use OrchestratorState::*;
        matches!(
            (self, next),
            (Init, Generating)
                | (Init, Failed)
                | (Generating, Auditing)
                | (Generating, Stopped)
                | (Auditing, Approving)
                | (Auditing, RetryDeciding)
                | (RetryDeciding, Generating)
                | (RetryDeciding, NextFrame)
                | (Approving, NextFrame)
                | (NextFrame, Generating)
                | (NextFrame, Completed)
                | (NextFrame, Stopped)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrchestratorState::Completed | OrchestratorState::Stopped | OrchestratorState::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrchestratorState::Init => "INIT",
            OrchestratorState::Generating => "GENERATING",
            OrchestratorState::Auditing => "AUDITING",
            OrchestratorState::RetryDeciding => "RETRY_DECIDING",
            OrchestratorState::Approving => "APPROVING",
            OrchestratorState::NextFrame => "NEXT_FRAME",
            OrchestratorState::Completed => "COMPLETED",
            OrchestratorState::Stopped => "STOPPED",
            OrchestratorState::Failed => "FAILED",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FrameStatus {
    #[default]
    Pending,
    Generating,
    Auditing,
    Approved,
    Rejected,
    Failed,
}

impl FrameStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FrameStatus::Approved | FrameStatus::Rejected | FrameStatus::Failed
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RunStatus {
    InProgress,
    Completed,
    Stopped,
    Failed,
}

/// One generation attempt, recorded whether it passed or not.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AttemptRecord {
    /// 1-based; `attempts[k].attempt_index == k + 1` always holds.
    pub attempt_index: u32,
    pub candidate_path: PathBuf,
    pub seed_used: Option<u32>,
    pub reason_codes: Vec<String>,
    pub composite_score: f64,
    pub per_metric_scores: BTreeMap<String, f64>,
    /// The retry action decided in response to this attempt's audit, if
    /// the audit failed and a retry was granted.
    pub action_taken: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Pass,
    Fail,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct OscillationEntry {
    /// Outcome of the identity metric (not the whole audit): the signal
    /// that oscillates under repeated re-anchoring.
    pub outcome: AttemptOutcome,
    pub re_anchored: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct FrameState {
    pub status: FrameStatus,
    pub attempts: Vec<AttemptRecord>,
    pub consecutive_reanchor_count: u32,
    /// Most recent last, capped at [`SF01_HISTORY_CAP`].
    pub last_sf01_scores: Vec<f64>,
    pub oscillation_history: Vec<OscillationEntry>,
    /// Terminal failure code for rejected/failed frames.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_code: Option<String>,
}

impl FrameState {
    pub fn push_sf01_score(&mut self, score: f64) {
        self.last_sf01_scores.push(score);
        if self.last_sf01_scores.len() > SF01_HISTORY_CAP {
            let excess = self.last_sf01_scores.len() - SF01_HISTORY_CAP;
            self.last_sf01_scores.drain(0..excess);
        }
    }

    pub fn tried_actions(&self) -> Vec<&str> {
        self.attempts
            .iter()
            .filter_map(|a| a.action_taken.as_deref())
            .collect()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RunState {
    pub run_id: String,
    pub current_state: OrchestratorState,
    pub current_frame_index: u32,
    /// 1-based attempt counter for the frame in flight.
    pub current_attempt: u32,
    /// Frame indices in approval order.
    pub approved_frames: Vec<u32>,
    pub frame_states: BTreeMap<u32, FrameState>,
    pub manifest_hash: String,
    pub run_status: RunStatus,
    pub stop_reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl RunState {
    pub fn new(run_id: &str, manifest_hash: &str, frame_count: u32) -> Self {
        let frame_states = (0..frame_count).map(|i| (i, FrameState::default())).collect();
        Self {
            run_id: run_id.to_string(),
            current_state: OrchestratorState::Init,
            current_frame_index: 0,
            current_attempt: 0,
            approved_frames: Vec::new(),
            frame_states,
            manifest_hash: manifest_hash.to_string(),
            run_status: RunStatus::InProgress,
            stop_reason: None,
            updated_at: Utc::now(),
        }
    }

    pub fn total_attempts(&self) -> usize {
        self.frame_states.values().map(|f| f.attempts.len()).sum()
    }

    /// Frames with at least one attempt on record.
    pub fn attempted_count(&self) -> usize {
        self.frame_states
            .values()
            .filter(|f| !f.attempts.is_empty())
            .count()
    }

    pub fn rejected_count(&self) -> usize {
        self.frame_states
            .values()
            .filter(|f| matches!(f.status, FrameStatus::Rejected | FrameStatus::Failed))
            .count()
    }

    pub fn terminal_count(&self) -> usize {
        self.frame_states
            .values()
            .filter(|f| f.status.is_terminal())
            .count()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table_permits_production_paths() {
        use OrchestratorState::*;
        for (from, to) in [
            (Init, Generating),
            (Generating, Auditing),
            (Auditing, Approving),
            (Auditing, RetryDeciding),
            (RetryDeciding, Generating),
            (RetryDeciding, NextFrame),
            (Approving, NextFrame),
            (NextFrame, Generating),
            (NextFrame, Completed),
            (NextFrame, Stopped),
            (Init, Failed),
            (Generating, Stopped),
        ] {
            assert!(from.can_transition_to(&to), "{from:?} -> {to:?}");
        }
    }

    #[test]
    fn test_transition_table_rejects_shortcuts() {
        use OrchestratorState::*;
        for (from, to) in [
            (Init, Auditing),
            (Generating, Approving),
            (Approving, Generating),
            (Completed, Generating),
            (Stopped, Generating),
            (Auditing, NextFrame),
        ] {
            assert!(!from.can_transition_to(&to), "{from:?} -> {to:?}");
        }
    }

    #[test]
    fn test_sf01_history_is_capped() {
        let mut frame = FrameState::default();
        for i in 0..12 {
            frame.push_sf01_score(i as f64 / 100.0);
        }
        assert_eq!(frame.last_sf01_scores.len(), SF01_HISTORY_CAP);
        assert_eq!(frame.last_sf01_scores[0], 0.04);
        assert_eq!(*frame.last_sf01_scores.last().unwrap(), 0.11);
    }

    #[test]
    fn test_run_state_counters() {
        let mut state = RunState::new("run_x", "hash", 3);
        assert_eq!(state.total_attempts(), 0);
        assert_eq!(state.attempted_count(), 0);

        let frame = state.frame_states.get_mut(&0).unwrap();
        frame.attempts.push(AttemptRecord {
            attempt_index: 1,
            candidate_path: PathBuf::from("candidates/frame_0000_attempt_01.png"),
            seed_used: Some(42),
            reason_codes: vec![],
            composite_score: 0.9,
            per_metric_scores: BTreeMap::new(),
            action_taken: None,
        });
        frame.status = FrameStatus::Rejected;

        assert_eq!(state.total_attempts(), 1);
        assert_eq!(state.attempted_count(), 1);
        assert_eq!(state.rejected_count(), 1);
        assert_eq!(state.terminal_count(), 1);
    }

    #[test]
    fn test_state_serializes_screaming_case() {
        let json = serde_json::to_string(&OrchestratorState::RetryDeciding).unwrap();
        assert_eq!(json, "\"RETRY_DECIDING\"");
        let status = serde_json::to_string(&RunStatus::InProgress).unwrap();
        assert_eq!(status, "\"in-progress\"");
    }
}
