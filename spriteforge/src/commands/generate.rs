// spriteforge/src/commands/generate.rs
//
// USE CASE: Produce one move end to end (the `gen` subcommand):
// generate -> audit -> retry -> approve -> export, with crash-safe resume.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Context;
use spriteforge_core::application::export::{ExportStatus, run_export};
use spriteforge_core::application::orchestrator::Orchestrator;
use spriteforge_core::application::session_bridge;
use spriteforge_core::application::{RunContext, RunSummary};
use spriteforge_core::domain::manifest::hash::manifest_hash;
use spriteforge_core::domain::reason;
use spriteforge_core::domain::state::RunStatus;
use spriteforge_core::infrastructure::adapters::gemini::GeminiImageConnector;
use spriteforge_core::infrastructure::adapters::stub::StubGenerator;
use spriteforge_core::infrastructure::adapters::texture_packer::TexturePackerAdapter;
use spriteforge_core::infrastructure::config::{ENV_API_KEY, EnvSettings, load_manifest};
use spriteforge_core::infrastructure::layout::RunLayout;
use spriteforge_core::ports::generator::ImageGenerator;
use spriteforge_core::ports::packer::AtlasPacker;

use crate::{EXIT_OK, EXIT_STOPPED, EXIT_SYSTEM, EXIT_VALIDATION_FAILED};

/// Seconds an interrupted run is given to finish its current operation.
const ABORT_GRACE_SECS: u64 = 10;

const DEFAULT_GENERATOR_TIMEOUT_SECS: u64 = 120;

pub struct GenOptions {
    pub move_id: String,
    pub manifest: Option<PathBuf>,
    pub out_dir: PathBuf,
    pub interactive: bool,
    pub port: u16,
    pub skip_validation: bool,
    pub allow_validation_fail: bool,
    pub frames: Option<u32>,
    pub resume: Option<String>,
    pub force: bool,
}

pub async fn execute(options: GenOptions) -> anyhow::Result<i32> {
    let start = std::time::Instant::now();

    // A. Load the manifest (Infra)
    println!("⚙️  Loading manifest...");
    let env = EnvSettings::capture();
    let manifest_path = options
        .manifest
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("manifests/{}.json", options.move_id)));
    let base_dir = manifest_path
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    let mut resolved = match load_manifest(&manifest_path, &base_dir, &env) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("❌ {e}");
            return Ok(EXIT_SYSTEM);
        }
    };

    if resolved.manifest.identity.move_id != options.move_id {
        eprintln!(
            "❌ Manifest declares move '{}' but --move is '{}'",
            resolved.manifest.identity.move_id, options.move_id
        );
        return Ok(EXIT_SYSTEM);
    }

    if let Some(frames) = options.frames {
        println!("   Overriding frame_count: {frames}");
        resolved.manifest.identity.frame_count = frames;
        resolved.manifest_hash = manifest_hash(&resolved.manifest)
            .context("re-hashing manifest after --frames override")?;
    }

    println!(
        "   {} / {} ({} frames @ {}px)",
        resolved.manifest.identity.character,
        resolved.manifest.identity.move_id,
        resolved.manifest.identity.frame_count,
        resolved.manifest.canvas.target_size
    );

    // B. Instantiate the adapters behind their ports
    let generator: Arc<dyn ImageGenerator> = match resolved.manifest.generator.backend.as_str() {
        "stub" => {
            println!("   Generator: offline stub 🧪");
            Arc::new(StubGenerator::new())
        }
        backend => {
            let api_key = match &resolved.api_key {
                Some(key) => key.clone(),
                None => {
                    eprintln!(
                        "❌ No API key available for backend '{backend}'.\n👉 Set {ENV_API_KEY} or run 'spriteforge doctor'."
                    );
                    return Ok(EXIT_SYSTEM);
                }
            };
            println!("   Generator: {} ✨", resolved.manifest.generator.model);
            Arc::new(
                GeminiImageConnector::new(
                    api_key,
                    &resolved.manifest.generator.model,
                    DEFAULT_GENERATOR_TIMEOUT_SECS,
                )
                .map_err(|e| anyhow::anyhow!("generator init: {e}"))?,
            )
        }
    };
    let packer: Arc<dyn AtlasPacker> =
        Arc::new(TexturePackerAdapter::new(resolved.packer_bin.as_deref()));

    // C. Run directory + context
    let resume = options.resume.is_some();
    let run_id = options.resume.clone().unwrap_or_else(|| {
        format!(
            "run_{}_{}",
            chrono::Utc::now().format("%Y%m%d_%H%M%S"),
            options.move_id
        )
    });
    let layout = match RunLayout::for_run(&options.out_dir, &run_id) {
        Ok(layout) => layout,
        Err(e) => {
            eprintln!("❌ {e}");
            return Ok(EXIT_SYSTEM);
        }
    };
    println!("🚀 Run {} -> {}", run_id, layout.root().display());

    let anchor_path = base_dir.join(&resolved.manifest.inputs.anchor);
    let anchor_png = std::fs::read(&anchor_path)
        .with_context(|| format!("reading anchor at {:?}", anchor_path))?;

    let abort = Arc::new(AtomicBool::new(false));
    let ctx = match RunContext::prepare(
        &run_id,
        layout,
        resolved.manifest.clone(),
        &resolved.manifest_hash,
        &manifest_path,
        anchor_png,
        generator,
        packer,
        abort.clone(),
    ) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("❌ {e}");
            return Ok(EXIT_SYSTEM);
        }
    };

    // D. Drive the orchestrator, with SIGINT handled cooperatively.
    let mut orchestrator = if resume {
        match Orchestrator::resume(ctx, options.force) {
            Ok(o) => o,
            Err(e) => {
                eprintln!("❌ Resume refused: {e}");
                return Ok(EXIT_SYSTEM);
            }
        }
    } else {
        Orchestrator::new(ctx)
    };

    let summary = match drive_with_interrupts(&mut orchestrator, &abort).await {
        Ok(summary) => summary,
        Err(e) => {
            eprintln!("\n💥 CRITICAL PIPELINE ERROR: {e}");
            return Ok(EXIT_SYSTEM);
        }
    };

    println!(
        "\n📊 {} approved / {} rejected / {} pending ({} attempts, {:.1?})",
        summary.frames.approved,
        summary.frames.rejected,
        summary.frames.pending,
        summary.total_attempts,
        start.elapsed()
    );

    // E. Post-run: stop/failure short-circuits
    match summary.run_status {
        RunStatus::Failed => return Ok(EXIT_SYSTEM),
        RunStatus::Stopped => {
            let reason_text = summary.stop_reason.as_deref().unwrap_or("unknown");
            if reason_text == reason::STOP_USER_INTERRUPT {
                println!("🛑 Interrupted; resume with --resume {run_id}");
                return Ok(EXIT_OK);
            }
            eprintln!("🛑 Run stopped: {reason_text}");
            return Ok(EXIT_STOPPED);
        }
        RunStatus::InProgress | RunStatus::Completed => {}
    }

    let ctx = orchestrator.into_context();

    // F. Export stage
    let exit = if options.skip_validation {
        println!("⏭️  Export skipped (--skip-validation)");
        EXIT_OK
    } else {
        println!("📦 Packing atlas...");
        let report = match run_export(&ctx, options.allow_validation_fail).await {
            Ok(report) => report,
            Err(e) => {
                eprintln!("❌ Export failed: {e}");
                return Ok(EXIT_SYSTEM);
            }
        };
        match report.status {
            ExportStatus::ReleaseReady => {
                println!("✨ RELEASE-READY in {:.1?}", start.elapsed());
                EXIT_OK
            }
            ExportStatus::DebugOnly => {
                println!("⚠️  Export kept as debug-only (validation failed, override active)");
                EXIT_OK
            }
            ExportStatus::ValidationFailed | ExportStatus::Pending => {
                eprintln!("❌ Export validation failed:");
                for error in &report.errors {
                    eprintln!("   - {error}");
                }
                EXIT_VALIDATION_FAILED
            }
        }
    };

    // G. Hand off to the review UI when asked
    if options.interactive {
        let state = spriteforge_core::infrastructure::fs::read_json(&ctx.layout.state_file())?;
        session_bridge::create_session(&ctx.layout, &state, &ctx.manifest.identity.move_id)?;
        println!(
            "🎬 Director session ready: {} (review UI attaches on port {})",
            ctx.layout.session_file().display(),
            options.port
        );
    }

    Ok(exit)
}

/// First Ctrl-C asks the orchestrator to park at the next safe point and
/// waits up to the grace window; a second Ctrl-C (or an expired window)
/// force-quits.
async fn drive_with_interrupts(
    orchestrator: &mut Orchestrator,
    abort: &Arc<AtomicBool>,
) -> Result<RunSummary, spriteforge_core::ForgeError> {
    let run = orchestrator.run();
    tokio::pin!(run);

    tokio::select! {
        result = &mut run => result,
        _ = tokio::signal::ctrl_c() => {
            abort.store(true, Ordering::Relaxed);
            eprintln!("\n⏳ Interrupt received; finishing the current operation (Ctrl-C again to force quit)");

            tokio::select! {
                result = &mut run => result,
                _ = tokio::signal::ctrl_c() => {
                    eprintln!("💥 Forced quit");
                    std::process::exit(crate::EXIT_VALIDATION_FAILED);
                }
                _ = tokio::time::sleep(Duration::from_secs(ABORT_GRACE_SECS)) => {
                    eprintln!("💥 Grace window expired; quitting");
                    std::process::exit(crate::EXIT_VALIDATION_FAILED);
                }
            }
        }
    }
}
