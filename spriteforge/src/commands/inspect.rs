// spriteforge/src/commands/inspect.rs
//
// USE CASE: Show the state of a run: one row per frame with status,
// attempts and last scores.

use std::path::Path;

use comfy_table::{Cell, Table};
use spriteforge_core::domain::state::RunState;
use spriteforge_core::infrastructure::fs::read_json;
use spriteforge_core::infrastructure::layout::RunLayout;

use crate::{EXIT_OK, EXIT_SYSTEM};

pub fn execute(run_id: &str, out_dir: &Path) -> anyhow::Result<i32> {
    let layout = match RunLayout::for_run(out_dir, run_id) {
        Ok(layout) => layout,
        Err(e) => {
            eprintln!("❌ {e}");
            return Ok(EXIT_SYSTEM);
        }
    };
    if !layout.state_file().exists() {
        eprintln!(
            "❌ No run state at {:?}\n👉 Check the run id with 'ls {}'",
            layout.state_file(),
            out_dir.display()
        );
        return Ok(EXIT_SYSTEM);
    }

    let state: RunState = read_json(&layout.state_file())?;

    println!("\n🔍 Run '{}'", state.run_id);
    println!("   State: {} ({:?})", state.current_state.as_str(), state.run_status);
    if let Some(reason) = &state.stop_reason {
        println!("   Stop reason: {reason}");
    }
    println!("   Manifest hash: {}…", &state.manifest_hash[..16.min(state.manifest_hash.len())]);
    println!("   Updated: {}", state.updated_at.to_rfc3339());

    let mut table = Table::new();
    table.set_header(["frame", "status", "attempts", "composite", "last reasons", "actions"]);

    for (index, frame) in &state.frame_states {
        let last = frame.attempts.last();
        table.add_row([
            Cell::new(format!("{index:04}")),
            Cell::new(format!("{:?}", frame.status)),
            Cell::new(frame.attempts.len().to_string()),
            Cell::new(
                last.map(|a| format!("{:.3}", a.composite_score))
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(
                last.map(|a| a.reason_codes.join(", "))
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new({
                let actions: Vec<&str> = frame.tried_actions();
                if actions.is_empty() { "-".to_string() } else { actions.join(" → ") }
            }),
        ]);
    }
    println!("{table}");

    println!(
        "   Approved order: {:?} | total attempts: {}",
        state.approved_frames,
        state.total_attempts()
    );

    Ok(EXIT_OK)
}
