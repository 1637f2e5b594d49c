// spriteforge/src/main.rs

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

// Exit codes are a CI contract:
// 0 success / release-ready, 1 validation failed, 2 stopped, 3 system or
// dependency error.
pub const EXIT_OK: i32 = 0;
pub const EXIT_VALIDATION_FAILED: i32 = 1;
pub const EXIT_STOPPED: i32 = 2;
pub const EXIT_SYSTEM: i32 = 3;

#[derive(Parser)]
#[command(name = "spriteforge")]
#[command(about = "The Sprite-Sheet Production Pipeline (generate -> audit -> retry -> approve -> export)", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 🎨 Generates, audits and exports the frames of one move
    Gen {
        /// Move id to produce (ex: "idle")
        #[arg(long = "move")]
        move_id: String,

        /// Manifest path (default: manifests/<move>.json)
        #[arg(long)]
        manifest: Option<PathBuf>,

        /// Root directory where run directories are created
        #[arg(long, default_value = "runs")]
        out_dir: PathBuf,

        /// Hand the finished frames to the interactive review UI
        #[arg(long)]
        interactive: bool,

        /// Port for the review UI bridge
        #[arg(long, default_value = "7341")]
        port: u16,

        /// Skip the export stage entirely
        #[arg(long)]
        skip_validation: bool,

        /// Keep debug assets when export validation fails
        #[arg(long)]
        allow_validation_fail: bool,

        /// Override the manifest's frame count
        #[arg(long)]
        frames: Option<u32>,

        /// Resume an existing run by id
        #[arg(long)]
        resume: Option<String>,

        /// Allow resuming against a changed manifest
        #[arg(long)]
        force: bool,
    },

    /// 🩺 Checks external dependencies (packer binary, API key, disk)
    Doctor {
        #[arg(long, default_value = "runs")]
        out_dir: PathBuf,
    },

    /// 📜 Prints the manifest schema with defaults
    Schema,

    /// 🔍 Shows the state of a run (frames, attempts, failures)
    Inspect {
        run_id: String,
        #[arg(long, default_value = "runs")]
        out_dir: PathBuf,
    },

    /// ✅ Re-runs export validation for a finished run
    Validate {
        run_id: String,
        #[arg(long, default_value = "runs")]
        out_dir: PathBuf,
        #[arg(long)]
        allow_validation_fail: bool,
    },

    /// 📚 Prints the operator walkthrough
    Guide,

    /// 🧪 Scaffolds an offline demo project (stub generator, no API key)
    Demo {
        #[arg(long, default_value = "demo")]
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG=debug spriteforge gen ... pour voir les détails;
    // DEBUG=1 est l'équivalent court supporté par la doc opérateur.
    let default_filter = if std::env::var("DEBUG").is_ok() { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();

    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Gen {
            move_id,
            manifest,
            out_dir,
            interactive,
            port,
            skip_validation,
            allow_validation_fail,
            frames,
            resume,
            force,
        } => {
            commands::generate::execute(commands::generate::GenOptions {
                move_id,
                manifest,
                out_dir,
                interactive,
                port,
                skip_validation,
                allow_validation_fail,
                frames,
                resume,
                force,
            })
            .await?
        }
        Commands::Doctor { out_dir } => commands::doctor::execute(&out_dir).await?,
        Commands::Schema => commands::schema::execute()?,
        Commands::Inspect { run_id, out_dir } => commands::inspect::execute(&run_id, &out_dir)?,
        Commands::Validate { run_id, out_dir, allow_validation_fail } => {
            commands::validate::execute(&run_id, &out_dir, allow_validation_fail).await?
        }
        Commands::Guide => commands::guide::execute(),
        Commands::Demo { dir } => commands::demo::execute(&dir)?,
    };

    if exit_code != EXIT_OK {
        std::process::exit(exit_code);
    }
    Ok(())
}
