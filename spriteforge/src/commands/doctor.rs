// spriteforge/src/commands/doctor.rs
//
// USE CASE: Check every external dependency before an operator burns API
// quota on a run that cannot finish.

use std::path::Path;

use spriteforge_core::infrastructure::adapters::texture_packer::TexturePackerAdapter;
use spriteforge_core::infrastructure::config::{ENV_API_KEY, ENV_PACKER_BIN, EnvSettings};
use spriteforge_core::ports::packer::AtlasPacker;

use crate::{EXIT_OK, EXIT_SYSTEM};

pub async fn execute(out_dir: &Path) -> anyhow::Result<i32> {
    println!("🩺 spriteforge doctor\n");
    let env = EnvSettings::capture();
    let mut healthy = true;

    // --- GENERATOR API KEY ---
    match &env.api_key {
        Some(_) => println!("   ✅ {ENV_API_KEY} is set"),
        None => {
            healthy = false;
            println!("   ❌ {ENV_API_KEY} is not set");
            println!("      👉 export {ENV_API_KEY}=<your key> (or use the stub backend)");
        }
    }

    // --- ATLAS PACKER ---
    let packer = TexturePackerAdapter::new(env.packer_bin.as_deref());
    match packer.verify().await {
        Ok(version) => println!("   ✅ TexturePacker found: {version}"),
        Err(e) => {
            healthy = false;
            println!("   ❌ Atlas packer unavailable: {e}");
            println!("      👉 Install TexturePacker or set {ENV_PACKER_BIN}");
        }
    }

    // --- OUTPUT ROOT WRITABLE ---
    match probe_writable(out_dir) {
        Ok(()) => println!("   ✅ Output root {:?} is writable", out_dir),
        Err(e) => {
            healthy = false;
            println!("   ❌ Output root {:?} not writable: {e}", out_dir);
        }
    }

    if healthy {
        println!("\n✨ All dependencies healthy.");
        Ok(EXIT_OK)
    } else {
        println!("\n🛑 Fix the issues above before running 'spriteforge gen'.");
        Ok(EXIT_SYSTEM)
    }
}

fn probe_writable(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let probe = dir.join(".doctor_probe");
    std::fs::write(&probe, b"ok")?;
    std::fs::remove_file(&probe)?;
    Ok(())
}
