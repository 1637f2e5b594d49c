// spriteforge-core/src/application/session_bridge.rs
//
// Bridge between a finished (or stopped) run and the human review pass.
// The review UI owns the session file's override fields; this module owns
// creating the session from run state and committing it back into
// approved/ pixels.

use tracing::{info, instrument};

use crate::domain::image::ops;
use crate::domain::session::{
    DirectorSession, ReviewFrame, ReviewFrameStatus, SessionStatus,
};
use crate::domain::state::{FrameStatus, RunState};
use crate::error::ForgeError;
use crate::infrastructure::fs::{read_json, write_json};
use crate::infrastructure::layout::RunLayout;
use crate::infrastructure::png;

/// Build a fresh director session over the run's frames and persist it.
pub fn create_session(
    layout: &RunLayout,
    state: &RunState,
    move_id: &str,
) -> Result<DirectorSession, ForgeError> {
    let session_id = format!("sess_{}", state.run_id);
    let mut session = DirectorSession::new(&session_id, &state.run_id, move_id, "frame_0000");

    for (&index, frame) in &state.frame_states {
        let status = match frame.status {
            FrameStatus::Approved => ReviewFrameStatus::Approved,
            FrameStatus::Rejected | FrameStatus::Failed => ReviewFrameStatus::AuditFail,
            FrameStatus::Auditing => ReviewFrameStatus::AuditWarn,
            FrameStatus::Generating => ReviewFrameStatus::Generated,
            FrameStatus::Pending => ReviewFrameStatus::Pending,
        };

        let image_path = match frame.status {
            FrameStatus::Approved => layout
                .approved_file(index)
                .to_string_lossy()
                .into_owned(),
            _ => frame
                .attempts
                .last()
                .map(|a| a.candidate_path.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };

        session.frames.insert(
            index,
            ReviewFrame {
                id: format!("frame_{index:04}"),
                frame_index: index,
                status,
                image_path,
                audit_report: frame
                    .attempts
                    .last()
                    .map(|a| {
                        serde_json::json!({
                            "composite_score": a.composite_score,
                            "reason_codes": a.reason_codes,
                        })
                    })
                    .unwrap_or(serde_json::Value::Null),
                director_overrides: Default::default(),
                attempt_history: frame
                    .attempts
                    .iter()
                    .map(|a| serde_json::to_value(a).unwrap_or(serde_json::Value::Null))
                    .collect(),
            },
        );
    }

    write_json(&layout.session_file(), &session).map_err(ForgeError::Infrastructure)?;
    Ok(session)
}

pub fn load_session(layout: &RunLayout) -> Result<DirectorSession, ForgeError> {
    read_json(&layout.session_file()).map_err(ForgeError::Infrastructure)
}

/// Apply every director override to the approved frames, then flip the
/// session to its terminal `committed` status. Alignment deltas become
/// pixel translations on a transparent background; patched frames replace
/// the approved file wholesale.
#[instrument(skip(layout))]
pub fn commit_session(layout: &RunLayout) -> Result<DirectorSession, ForgeError> {
    let mut session = load_session(layout)?;
    session.ensure_active().map_err(ForgeError::Domain)?;

    let mut frames_touched = 0usize;

    for (&index, frame) in &session.frames {
        if frame.status != ReviewFrameStatus::Approved {
            continue;
        }
        let approved_path = layout.approved_file(index);
        let overrides = &frame.director_overrides;
        let mut touched = false;

        // Patches first: the alignment delta applies to the patched pixels.
        if overrides.is_patched {
            if let Some(patch) = overrides.patch_history.last() {
                let patched = png::load_pixmap(std::path::Path::new(&patch.patched_path))
                    .map_err(ForgeError::Infrastructure)?;
                png::save_pixmap(&approved_path, &patched).map_err(ForgeError::Infrastructure)?;
                touched = true;
            }
        }

        if let Some(alignment) = &overrides.alignment {
            if alignment.user_override_x != 0 || alignment.user_override_y != 0 {
                let image = png::load_pixmap(&approved_path).map_err(ForgeError::Infrastructure)?;
                let shifted =
                    ops::shift(&image, alignment.user_override_x, alignment.user_override_y);
                png::save_pixmap(&approved_path, &shifted).map_err(ForgeError::Infrastructure)?;
                touched = true;
            }
        }

        if touched {
            frames_touched += 1;
        }
    }

    session.mark_committed().map_err(ForgeError::Domain)?;
    write_json(&layout.session_file(), &session).map_err(ForgeError::Infrastructure)?;

    info!(frames_touched, "director session committed");
    Ok(session)
}

/// Discard without touching any pixels.
pub fn discard_session(layout: &RunLayout) -> Result<DirectorSession, ForgeError> {
    let mut session = load_session(layout)?;
    session.ensure_active().map_err(ForgeError::Domain)?;
    session.status = SessionStatus::Discarded;
    session.last_modified = chrono::Utc::now();
    write_json(&layout.session_file(), &session).map_err(ForgeError::Infrastructure)?;
    Ok(session)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::image::Pixmap;
    use crate::domain::state::RunState;

    fn layout_with_approved(tmp: &std::path::Path) -> RunLayout {
        let layout = RunLayout::new(tmp.join("run_1"));
        layout.create_dirs().unwrap();

        let mut img = Pixmap::new(16, 16);
        img.set_pixel(4, 4, [200, 10, 10, 255]);
        png::save_pixmap(&layout.approved_file(0), &img).unwrap();
        layout
    }

    fn state_with_approved_frame() -> RunState {
        let mut state = RunState::new("run_1", "hash", 1);
        state
            .frame_states
            .get_mut(&0)
            .unwrap()
            .status = FrameStatus::Approved;
        state.approved_frames.push(0);
        state
    }

    #[test]
    fn test_create_session_maps_statuses() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = layout_with_approved(tmp.path());
        let state = state_with_approved_frame();

        let session = create_session(&layout, &state, "idle").unwrap();
        assert_eq!(session.status, SessionStatus::Active);
        assert_eq!(session.frames[&0].status, ReviewFrameStatus::Approved);
        assert!(layout.session_file().exists());
    }

    #[test]
    fn test_commit_applies_alignment_shift() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = layout_with_approved(tmp.path());
        let state = state_with_approved_frame();

        let mut session = create_session(&layout, &state, "idle").unwrap();
        session.set_alignment_override(0, 2, 1).unwrap();
        write_json(&layout.session_file(), &session).unwrap();

        let committed = commit_session(&layout).unwrap();
        assert_eq!(committed.status, SessionStatus::Committed);

        let shifted = png::load_pixmap(&layout.approved_file(0)).unwrap();
        assert_eq!(shifted.pixel(6, 5), [200, 10, 10, 255]);
        assert_eq!(shifted.alpha(4, 4), 0);
    }

    #[test]
    fn test_commit_twice_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = layout_with_approved(tmp.path());
        let state = state_with_approved_frame();
        create_session(&layout, &state, "idle").unwrap();

        commit_session(&layout).unwrap();
        assert!(commit_session(&layout).is_err());
    }

    #[test]
    fn test_commit_applies_patch_over_approved() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = layout_with_approved(tmp.path());
        let state = state_with_approved_frame();

        // The director painted a replacement frame.
        let mut patched = Pixmap::new(16, 16);
        patched.set_pixel(8, 8, [10, 200, 10, 255]);
        let patched_path = tmp.path().join("patched.png");
        png::save_pixmap(&patched_path, &patched).unwrap();

        let mut session = create_session(&layout, &state, "idle").unwrap();
        session
            .record_patch(
                0,
                crate::domain::session::PatchRecord {
                    original_path: layout.approved_file(0).to_string_lossy().into_owned(),
                    patched_path: patched_path.to_string_lossy().into_owned(),
                    mask_path: String::new(),
                    prompt: "repaint".into(),
                    timestamp: chrono::Utc::now(),
                },
            )
            .unwrap();
        write_json(&layout.session_file(), &session).unwrap();

        commit_session(&layout).unwrap();

        let committed_img = png::load_pixmap(&layout.approved_file(0)).unwrap();
        assert_eq!(committed_img.pixel(8, 8), [10, 200, 10, 255]);
    }

    #[test]
    fn test_discard_leaves_pixels_alone() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = layout_with_approved(tmp.path());
        let state = state_with_approved_frame();

        let mut session = create_session(&layout, &state, "idle").unwrap();
        session.set_alignment_override(0, 5, 5).unwrap();
        write_json(&layout.session_file(), &session).unwrap();

        let discarded = discard_session(&layout).unwrap();
        assert_eq!(discarded.status, SessionStatus::Discarded);

        let img = png::load_pixmap(&layout.approved_file(0)).unwrap();
        assert_eq!(img.pixel(4, 4), [200, 10, 10, 255]);
    }
}
