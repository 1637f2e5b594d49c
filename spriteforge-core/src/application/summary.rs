// spriteforge-core/src/application/summary.rs

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::state::{FrameStatus, RunState, RunStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub run_status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    pub frames: FrameCounts,
    pub rates: Rates,
    /// Terminal failure codes ranked by frequency, most common first.
    pub top_failures: Vec<FailureCount>,
    pub total_attempts: usize,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FrameCounts {
    pub approved: usize,
    pub rejected: usize,
    pub failed: usize,
    pub pending: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Rates {
    /// Fraction of attempted frames that needed more than one attempt.
    pub retry_rate: f64,
    /// Fraction of attempted frames that ended rejected or failed.
    pub reject_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailureCount {
    pub code: String,
    pub count: usize,
}

pub fn build_summary(state: &RunState) -> RunSummary {
    let mut approved = 0;
    let mut rejected = 0;
    let mut failed = 0;
    let mut pending = 0;
    let mut retried = 0;
    let mut attempted = 0;
    let mut failure_counts: HashMap<String, usize> = HashMap::new();

    for frame in state.frame_states.values() {
        match frame.status {
            FrameStatus::Approved => approved += 1,
            FrameStatus::Rejected => rejected += 1,
            FrameStatus::Failed => failed += 1,
            _ => pending += 1,
        }
        if !frame.attempts.is_empty() {
            attempted += 1;
            if frame.attempts.len() > 1 {
                retried += 1;
            }
        }
        if let Some(code) = &frame.rejection_code {
            *failure_counts.entry(code.clone()).or_insert(0) += 1;
        }
    }

    let mut top_failures: Vec<FailureCount> = failure_counts
        .into_iter()
        .map(|(code, count)| FailureCount { code, count })
        .collect();
    top_failures.sort_by(|a, b| b.count.cmp(&a.count).then(a.code.cmp(&b.code)));

    let (retry_rate, reject_rate) = if attempted == 0 {
        (0.0, 0.0)
    } else {
        (
            retried as f64 / attempted as f64,
            (rejected + failed) as f64 / attempted as f64,
        )
    };

    RunSummary {
        run_id: state.run_id.clone(),
        run_status: state.run_status,
        stop_reason: state.stop_reason.clone(),
        frames: FrameCounts { approved, rejected, failed, pending },
        rates: Rates { retry_rate, reject_rate },
        top_failures,
        total_attempts: state.total_attempts(),
        updated_at: chrono::Utc::now(),
    }
}
