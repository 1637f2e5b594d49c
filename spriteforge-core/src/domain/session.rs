// spriteforge-core/src/domain/session.rs
//
// The director session is a human-review overlay on top of the frame
// states. The review UI reads it and POSTs overrides back; nothing in here
// touches pixels, committing (application/session_bridge) does.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::error::DomainError;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Committed,
    Discarded,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Committed | SessionStatus::Discarded)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewFrameStatus {
    Pending,
    Generated,
    AuditFail,
    AuditWarn,
    Approved,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DirectorSession {
    pub session_id: String,
    pub run_id: String,
    pub move_id: String,
    pub anchor_frame_id: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub frames: BTreeMap<u32, ReviewFrame>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ReviewFrame {
    pub id: String,
    pub frame_index: u32,
    pub status: ReviewFrameStatus,
    pub image_path: String,
    #[serde(default)]
    pub audit_report: serde_json::Value,
    #[serde(default)]
    pub director_overrides: DirectorOverrides,
    #[serde(default)]
    pub attempt_history: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct DirectorOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alignment: Option<AlignmentOverride>,
    #[serde(default)]
    pub is_patched: bool,
    #[serde(default)]
    pub patch_history: Vec<PatchRecord>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct AlignmentOverride {
    pub user_override_x: i32,
    pub user_override_y: i32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PatchRecord {
    pub original_path: String,
    pub patched_path: String,
    pub mask_path: String,
    pub prompt: String,
    pub timestamp: DateTime<Utc>,
}

impl DirectorSession {
    pub fn new(session_id: &str, run_id: &str, move_id: &str, anchor_frame_id: &str) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.to_string(),
            run_id: run_id.to_string(),
            move_id: move_id.to_string(),
            anchor_frame_id: anchor_frame_id.to_string(),
            status: SessionStatus::Active,
            created_at: now,
            last_modified: now,
            frames: BTreeMap::new(),
        }
    }

    /// Guard every mutation: a committed or discarded session is frozen.
    pub fn ensure_active(&self) -> Result<(), DomainError> {
        if self.status.is_terminal() {
            return Err(DomainError::SessionTerminal(
                match self.status {
                    SessionStatus::Committed => "committed",
                    SessionStatus::Discarded => "discarded",
                    SessionStatus::Active => "active",
                }
                .to_string(),
            ));
        }
        Ok(())
    }

    pub fn set_alignment_override(
        &mut self,
        frame_index: u32,
        dx: i32,
        dy: i32,
    ) -> Result<(), DomainError> {
        self.ensure_active()?;
        let frame = self.frames.get_mut(&frame_index).ok_or_else(|| {
            DomainError::AuditError(format!("no frame {frame_index} in session"))
        })?;
        frame.director_overrides.alignment = Some(AlignmentOverride {
            user_override_x: dx,
            user_override_y: dy,
            timestamp: Utc::now(),
        });
        self.last_modified = Utc::now();
        Ok(())
    }

    pub fn record_patch(
        &mut self,
        frame_index: u32,
        patch: PatchRecord,
    ) -> Result<(), DomainError> {
        self.ensure_active()?;
        let frame = self.frames.get_mut(&frame_index).ok_or_else(|| {
            DomainError::AuditError(format!("no frame {frame_index} in session"))
        })?;
        frame.director_overrides.is_patched = true;
        frame.director_overrides.patch_history.push(patch);
        self.last_modified = Utc::now();
        Ok(())
    }

    pub fn mark_committed(&mut self) -> Result<(), DomainError> {
        self.ensure_active()?;
        self.status = SessionStatus::Committed;
        self.last_modified = Utc::now();
        Ok(())
    }
}
