// spriteforge-core/src/application/orchestrator.rs
//
// The eight-state production loop. One generator call, one normalization,
// one audit at a time; the full run state is persisted through the atomic
// store after every transition, so a kill between any two operations
// resumes exactly where it stopped.

use std::collections::BTreeMap;
use std::time::Instant;

use tracing::{error, info, instrument, warn};

use crate::application::audit_runner::run_audit;
use crate::application::context::RunContext;
use crate::application::normalize::normalize_candidate;
use crate::application::summary::{RunSummary, build_summary};
use crate::domain::audit::AuditResult;
use crate::domain::error::DomainError;
use crate::domain::manifest::LockFile;
use crate::domain::metrics::MetricResult;
use crate::domain::reason;
use crate::domain::retry::{self, RetryAction, RetryDecision};
use crate::domain::state::{
    AttemptRecord, FrameState, FrameStatus, OrchestratorState, RunState, RunStatus,
};
use crate::error::ForgeError;
use crate::infrastructure::adapters::request::{PrevFrameRef, build_request};
use crate::infrastructure::config::ADAPTER_VERSION;
use crate::infrastructure::fs::{atomic_write, quarantine, read_bytes, read_json, write_json};
use crate::infrastructure::png;
use crate::ports::generator::GeneratorError;

/// Run stops after this many consecutive rejected frames.
pub const MAX_CONSECUTIVE_REJECTS: usize = 3;

/// Circuit breaker on the total attempt count across all frames.
pub const TOTAL_ATTEMPT_BREAKER: usize = 256;

pub struct Orchestrator {
    ctx: RunContext,
    state: RunState,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("run_id", &self.ctx.run_id)
            .field("state", &self.state)
            .finish()
    }
}

impl Orchestrator {
    /// Fresh run: a new run state, nothing on disk yet.
    pub fn new(ctx: RunContext) -> Self {
        let state = RunState::new(
            &ctx.run_id,
            &ctx.manifest_hash,
            ctx.manifest.identity.frame_count,
        );
        Self { ctx, state }
    }

    /// Resume from a persisted run directory. The manifest hash must match
    /// the lock file unless `force` is given; approved frames are
    /// integrity-checked and corrupted ones demoted to pending.
    pub fn resume(ctx: RunContext, force: bool) -> Result<Self, ForgeError> {
        let lock: LockFile = read_json(&ctx.layout.lock_file()).map_err(ForgeError::Infrastructure)?;

        if lock.manifest_hash != ctx.manifest_hash {
            if force {
                warn!(
                    stored = %lock.manifest_hash,
                    current = %ctx.manifest_hash,
                    "manifest hash mismatch overridden with --force"
                );
            } else {
                return Err(ForgeError::Domain(DomainError::ManifestChanged));
            }
        }

        let mut state: RunState =
            read_json(&ctx.layout.state_file()).map_err(ForgeError::Infrastructure)?;
        state.manifest_hash = ctx.manifest_hash.clone();

        Self::verify_approved_frames(&ctx, &mut state)?;

        // An interrupted run parks with run_status=stopped but a live
        // current_state; picking it back up reopens the run.
        if state.run_status == RunStatus::Stopped
            && state.stop_reason.as_deref() == Some(reason::STOP_USER_INTERRUPT)
        {
            state.run_status = RunStatus::InProgress;
            state.stop_reason = None;
        }

        info!(
            run_id = %state.run_id,
            state = state.current_state.as_str(),
            frame = state.current_frame_index,
            approved = state.approved_frames.len(),
            "resuming run"
        );

        Ok(Self { ctx, state })
    }

    /// Every file in `approved_frames` must exist and decode as RGBA of
    /// the target size. Anything else is quarantined and its frame reset.
    fn verify_approved_frames(ctx: &RunContext, state: &mut RunState) -> Result<(), ForgeError> {
        let target = ctx.manifest.canvas.target_size;
        let mut demoted = Vec::new();

        for &index in &state.approved_frames {
            let path = ctx.layout.approved_file(index);
            let intact = png::load_pixmap(&path)
                .map(|img| img.width == target && img.height == target)
                .unwrap_or(false);

            if !intact {
                if path.exists() {
                    let moved = quarantine(&path).map_err(ForgeError::Infrastructure)?;
                    warn!(frame = index, quarantined = ?moved, "approved frame corrupted");
                } else {
                    warn!(frame = index, "approved frame missing on disk");
                }
                demoted.push(index);
            }
        }

        for index in demoted {
            state.approved_frames.retain(|&i| i != index);
            state.frame_states.insert(index, FrameState::default());
        }
        Ok(())
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Hand the context back once the run loop is done (the export
    /// pipeline and the session bridge reuse it).
    pub fn into_context(self) -> RunContext {
        self.ctx
    }

    // --- TRANSITION MACHINERY ---

    /// Validate against the table, apply, persist, log. A persistence
    /// failure rolls the in-memory state back: the last persisted state
    /// stays authoritative.
    fn transition(&mut self, to: OrchestratorState) -> Result<(), ForgeError> {
        let from = self.state.current_state;
        if !from.can_transition_to(&to) {
            return Err(ForgeError::Domain(DomainError::IllegalTransition {
                from: from.as_str().to_string(),
                to: to.as_str().to_string(),
            }));
        }

        let start = Instant::now();
        self.state.current_state = to;
        self.state.updated_at = chrono::Utc::now();

        if let Err(e) = write_json(&self.ctx.layout.state_file(), &self.state) {
            self.state.current_state = from;
            error!(from = from.as_str(), to = to.as_str(), "state persistence failed");
            return Err(ForgeError::Infrastructure(e));
        }

        info!(
            target: "transitions",
            from = from.as_str(),
            persist_ms = start.elapsed().as_millis() as u64,
            "entering {}",
            to.as_str()
        );
        self.log_line(&format!(
            "entering {} (from {}, frame {}, attempt {})",
            to.as_str(),
            from.as_str(),
            self.state.current_frame_index,
            self.state.current_attempt
        ));
        Ok(())
    }

    /// Plain append-only operator log next to the run artifacts. Best
    /// effort: a failed log write never takes the run down.
    fn log_line(&self, message: &str) {
        let line = format!("{} {}\n", chrono::Utc::now().to_rfc3339(), message);
        let result = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.ctx.layout.pipeline_log_file())
            .and_then(|mut f| std::io::Write::write_all(&mut f, line.as_bytes()));
        if let Err(e) = result {
            warn!(error = %e, "pipeline log write failed");
        }
    }

    fn persist(&mut self) -> Result<(), ForgeError> {
        self.state.updated_at = chrono::Utc::now();
        write_json(&self.ctx.layout.state_file(), &self.state).map_err(ForgeError::Infrastructure)
    }

    // --- MAIN LOOP ---

    #[instrument(skip(self), fields(run_id = %self.ctx.run_id))]
    pub async fn run(&mut self) -> Result<RunSummary, ForgeError> {
        let started = Instant::now();

        loop {
            if self.ctx.abort_requested() && !self.state.current_state.is_terminal() {
                // Park, do not transition: current_state stays resumable.
                self.state.run_status = RunStatus::Stopped;
                self.state.stop_reason = Some(reason::STOP_USER_INTERRUPT.to_string());
                self.persist()?;
                warn!("run interrupted by operator; state parked for resume");
                break;
            }

            match self.state.current_state {
                OrchestratorState::Init => self.do_init()?,
                OrchestratorState::Generating => self.do_generate().await?,
                OrchestratorState::Auditing => self.do_audit()?,
                OrchestratorState::RetryDeciding => self.do_retry_decide()?,
                OrchestratorState::Approving => self.do_approve()?,
                OrchestratorState::NextFrame => self.do_next_frame()?,
                OrchestratorState::Completed
                | OrchestratorState::Stopped
                | OrchestratorState::Failed => break,
            }
        }

        let summary = build_summary(&self.state);
        write_json(&self.ctx.layout.summary_file(), &summary)
            .map_err(ForgeError::Infrastructure)?;

        info!(
            status = ?summary.run_status,
            approved = summary.frames.approved,
            rejected = summary.frames.rejected,
            elapsed_s = started.elapsed().as_secs(),
            "run finished"
        );
        Ok(summary)
    }

    // --- STATE HANDLERS ---

    fn do_init(&mut self) -> Result<(), ForgeError> {
        let setup = (|| -> Result<(), ForgeError> {
            self.ctx.layout.create_dirs().map_err(ForgeError::Infrastructure)?;

            let lock = LockFile::build(
                &self.ctx.run_id,
                chrono::Utc::now(),
                &self.ctx.manifest_path,
                &self.ctx.manifest_hash,
                ADAPTER_VERSION,
                &self.ctx.manifest,
            );
            write_json(&self.ctx.layout.lock_file(), &lock).map_err(ForgeError::Infrastructure)?;
            write_json(&self.ctx.layout.anchor_analysis_file(), &self.ctx.anchor_analysis)
                .map_err(ForgeError::Infrastructure)?;
            Ok(())
        })();

        match setup {
            Ok(()) => self.transition(OrchestratorState::Generating),
            Err(e) => {
                error!(error = %e, "run initialization failed");
                self.state.run_status = RunStatus::Failed;
                self.state.stop_reason = Some(format!("INIT: {e}"));
                self.transition(OrchestratorState::Failed)?;
                Err(e)
            }
        }
    }

    async fn do_generate(&mut self) -> Result<(), ForgeError> {
        let frame_index = self.state.current_frame_index;
        let attempt_index = self
            .frame(frame_index)
            .map(|f| f.attempts.len() as u32 + 1)
            .unwrap_or(1);
        self.state.current_attempt = attempt_index;

        let action = self
            .frame(frame_index)
            .and_then(|f| f.attempts.last())
            .and_then(|a| a.action_taken.as_deref())
            .and_then(RetryAction::parse);

        let prev_frame = self.previous_frame_reference(frame_index)?;

        let request = build_request(
            &self.ctx.manifest.generator,
            &self.ctx.anchor_png,
            prev_frame.as_ref(),
            action,
            &self.ctx.run_id,
            frame_index,
            attempt_index,
        );
        let seed_used = request.seed;

        info!(frame_index, attempt_index, ?action, seed = ?seed_used, "generating candidate");
        let generate_start = Instant::now();

        match self.ctx.generator.generate(request).await {
            Ok(result) => {
                info!(
                    frame_index,
                    attempt_index,
                    elapsed_ms = generate_start.elapsed().as_millis() as u64,
                    bytes = result.png_bytes.len(),
                    "candidate received"
                );

                let candidate_path = self.ctx.layout.candidate_file(frame_index, attempt_index);
                atomic_write(&candidate_path, &result.png_bytes)
                    .map_err(ForgeError::Infrastructure)?;

                if let Some(frame) = self.state.frame_states.get_mut(&frame_index) {
                    frame.status = FrameStatus::Generating;
                    frame.attempts.push(AttemptRecord {
                        attempt_index,
                        candidate_path,
                        seed_used,
                        reason_codes: Vec::new(),
                        composite_score: 0.0,
                        per_metric_scores: BTreeMap::new(),
                        action_taken: None,
                    });
                }

                self.transition(OrchestratorState::Auditing)
            }
            Err(e) => {
                // Fail fast: dependency errors were already retried inside
                // the adapter. The run stops; approved work is untouched.
                error!(frame_index, attempt_index, error = %e, "generator fatal error");
                self.state.run_status = RunStatus::Stopped;
                self.state.stop_reason = Some(match e {
                    GeneratorError::RateLimited { .. } | GeneratorError::Unavailable(_) => {
                        format!("{}: {e}", reason::DEP_GENERATOR_FAIL)
                    }
                    _ => reason::STOP_GENERATOR_FATAL.to_string(),
                });
                self.transition(OrchestratorState::Stopped)
            }
        }
    }

    fn do_audit(&mut self) -> Result<(), ForgeError> {
        let frame_index = self.state.current_frame_index;
        let attempt_index = self.state.current_attempt;

        if let Some(frame) = self.state.frame_states.get_mut(&frame_index) {
            frame.status = FrameStatus::Auditing;
        }

        let candidate_path = self.ctx.layout.candidate_file(frame_index, attempt_index);
        let raw_bytes = read_bytes(&candidate_path).map_err(ForgeError::Infrastructure)?;
        let raw = png::decode_pixmap(&raw_bytes).map_err(ForgeError::Infrastructure)?;

        let normalized_path = self.ctx.layout.normalized_file(frame_index, attempt_index);
        let (_, report) = normalize_candidate(
            &raw,
            &self.ctx.anchor_analysis,
            &self.ctx.manifest.canvas,
            &candidate_path,
            &normalized_path,
        )?;
        info!(
            frame_index,
            attempt_index,
            duration_ms = report.duration_ms,
            shift_x = report.alignment_applied.shift_x,
            shift_y = report.alignment_applied.shift_y,
            "candidate normalized"
        );

        let audit = run_audit(&self.ctx, frame_index, attempt_index)?;

        if let Some(frame) = self.state.frame_states.get_mut(&frame_index) {
            if let Some(attempt) = frame.attempts.last_mut() {
                attempt.reason_codes = audit.reason_codes.clone();
                attempt.composite_score = audit.composite_score;
                attempt.per_metric_scores = audit
                    .per_metric
                    .iter()
                    .map(|m| (m.name.clone(), m.score))
                    .collect();
            }
        }

        if audit.passed {
            self.transition(OrchestratorState::Approving)
        } else {
            self.transition(OrchestratorState::RetryDeciding)
        }
    }

    fn do_approve(&mut self) -> Result<(), ForgeError> {
        let frame_index = self.state.current_frame_index;
        let attempt_index = self.state.current_attempt;

        let normalized_path = self.ctx.layout.normalized_file(frame_index, attempt_index);
        let approved_path = self.ctx.layout.approved_file(frame_index);
        let bytes = read_bytes(&normalized_path).map_err(ForgeError::Infrastructure)?;
        atomic_write(&approved_path, bytes).map_err(ForgeError::Infrastructure)?;

        if let Some(frame) = self.state.frame_states.get_mut(&frame_index) {
            frame.status = FrameStatus::Approved;
        }
        self.state.approved_frames.push(frame_index);

        info!(frame_index, attempt_index, "frame approved");
        self.transition(OrchestratorState::NextFrame)
    }

    fn do_retry_decide(&mut self) -> Result<(), ForgeError> {
        let frame_index = self.state.current_frame_index;
        let max_attempts = self.ctx.manifest.generator.max_attempts_per_frame;
        let ladder_overrides = self.ctx.manifest.retry.ladder.clone();

        let frame = self
            .state
            .frame_states
            .get_mut(&frame_index)
            .ok_or_else(|| ForgeError::InternalError(format!("no state for frame {frame_index}")))?;

        let audit = audit_from_attempt(frame.attempts.last());
        let decision = retry::decide(frame, &audit, &ladder_overrides, max_attempts);

        match decision {
            RetryDecision::Retry { action, ladder_exhausted } => {
                if let Some(attempt) = frame.attempts.last_mut() {
                    attempt.action_taken = Some(action.as_str().to_string());
                }
                if ladder_exhausted {
                    info!(frame_index, "ladder_exhausted_retry");
                }
                info!(frame_index, action = action.as_str(), "retrying frame");
                self.transition(OrchestratorState::Generating)
            }
            RetryDecision::Reject { code } => {
                frame.status = FrameStatus::Rejected;
                frame.rejection_code = Some(code.clone());
                warn!(frame_index, code = %code, "frame rejected");
                self.archive_rejected(frame_index, &code)?;
                self.transition(OrchestratorState::NextFrame)
            }
        }
    }

    /// Preserve the last candidate and its full attempt history next to
    /// the rejection for post-mortems. Best effort on the image copy: the
    /// run must not die because a reject artifact could not be written.
    fn archive_rejected(&mut self, frame_index: u32, code: &str) -> Result<(), ForgeError> {
        let attempt_index = self.state.current_attempt;
        let normalized_path = self.ctx.layout.normalized_file(frame_index, attempt_index);
        let rejected_path = self.ctx.layout.rejected_file(frame_index, code);

        match read_bytes(&normalized_path) {
            Ok(bytes) => {
                atomic_write(&rejected_path, bytes).map_err(ForgeError::Infrastructure)?;
            }
            Err(e) => warn!(frame_index, error = %e, "no normalized candidate to archive"),
        }

        if let Some(frame) = self.state.frame_states.get(&frame_index) {
            let metadata = serde_json::json!({
                "frame_index": frame_index,
                "rejection_code": code,
                "attempts": frame.attempts,
                "last_sf01_scores": frame.last_sf01_scores,
            });
            write_json(
                &self.ctx.layout.rejected_metadata_file(frame_index, code),
                &metadata,
            )
            .map_err(ForgeError::Infrastructure)?;
        }
        Ok(())
    }

    fn do_next_frame(&mut self) -> Result<(), ForgeError> {
        // Stop conditions, in precedence order. Each produces a distinct
        // stop_reason for the reporter.
        if self.ctx.abort_requested() {
            return self.stop_run(reason::STOP_USER_INTERRUPT);
        }
        if retry::reject_rate_exceeded(self.state.rejected_count(), self.state.attempted_count()) {
            return self.stop_run(reason::STOP_REJECT_RATE_EXCEEDED);
        }
        if self.trailing_reject_streak() >= MAX_CONSECUTIVE_REJECTS {
            return self.stop_run(reason::STOP_CONSECUTIVE_FAILURES);
        }
        if self.state.total_attempts() >= TOTAL_ATTEMPT_BREAKER {
            return self.stop_run(reason::STOP_ATTEMPT_BUDGET_EXHAUSTED);
        }

        let next = self
            .state
            .frame_states
            .iter()
            .find(|(_, f)| !f.status.is_terminal())
            .map(|(&i, _)| i);

        match next {
            Some(index) => {
                self.state.current_frame_index = index;
                self.state.current_attempt = 0;
                self.transition(OrchestratorState::Generating)
            }
            None => {
                self.state.run_status = RunStatus::Completed;
                self.transition(OrchestratorState::Completed)
            }
        }
    }

    fn stop_run(&mut self, stop_reason: &str) -> Result<(), ForgeError> {
        self.state.run_status = RunStatus::Stopped;
        self.state.stop_reason = Some(stop_reason.to_string());
        warn!(stop_reason, "stop condition triggered");
        self.log_line(&format!("stop condition triggered: {stop_reason}"));
        self.transition(OrchestratorState::Stopped)
    }

    // --- HELPERS ---

    fn frame(&self, index: u32) -> Option<&FrameState> {
        self.state.frame_states.get(&index)
    }

    /// Most recent approved frame below the current one, as a drift-gated
    /// pose reference.
    fn previous_frame_reference(
        &self,
        frame_index: u32,
    ) -> Result<Option<PrevFrameRef>, ForgeError> {
        let prev_index = match self
            .state
            .approved_frames
            .iter()
            .filter(|&&i| i < frame_index)
            .max()
        {
            Some(&i) => i,
            None => return Ok(None),
        };

        let identity_score = self
            .frame(prev_index)
            .and_then(|f| f.attempts.last())
            .and_then(|a| a.per_metric_scores.get("identity").copied())
            .unwrap_or(0.0);

        let png_bytes =
            read_bytes(&self.ctx.layout.approved_file(prev_index)).map_err(ForgeError::Infrastructure)?;

        Ok(Some(PrevFrameRef { png_bytes, identity_score }))
    }

    /// Consecutive rejected/failed frames ending at the most recently
    /// terminalized index.
    fn trailing_reject_streak(&self) -> usize {
        let mut streak = 0;
        for frame in self
            .state
            .frame_states
            .values()
            .take_while(|f| f.status.is_terminal())
        {
            if matches!(frame.status, FrameStatus::Rejected | FrameStatus::Failed) {
                streak += 1;
            } else {
                streak = 0;
            }
        }
        streak
    }
}

/// Rebuild the minimal audit view a retry decision needs from the
/// persisted attempt record. Keeps RETRY_DECIDING resumable without
/// holding the full AuditResult in memory across a crash.
fn audit_from_attempt(attempt: Option<&AttemptRecord>) -> AuditResult {
    let attempt = match attempt {
        Some(a) => a,
        None => {
            return AuditResult {
                passed: false,
                composite_score: 0.0,
                per_metric: Vec::new(),
                reason_codes: vec![reason::HF03_DECODE_FAILED.to_string()],
                flags: Vec::new(),
            };
        }
    };

    AuditResult {
        passed: false,
        composite_score: attempt.composite_score,
        per_metric: attempt
            .per_metric_scores
            .iter()
            .map(|(name, &score)| MetricResult::new(name, score, 0.0, false, serde_json::json!({})))
            .collect(),
        reason_codes: attempt.reason_codes.clone(),
        flags: Vec::new(),
    }
}

/// Use-case entry point: build or resume an orchestrator and drive it to a
/// terminal state.
pub async fn run_pipeline(
    ctx: RunContext,
    resume: bool,
    force: bool,
) -> Result<RunSummary, ForgeError> {
    let mut orchestrator = if resume {
        Orchestrator::resume(ctx, force)?
    } else {
        Orchestrator::new(ctx)
    };
    orchestrator.run().await
}
