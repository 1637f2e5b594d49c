// spriteforge/src/commands/schema.rs
//
// USE CASE: Print the manifest schema with defaults, as JSON, so an
// operator (or an editor integration) can scaffold a manifest without
// reading source code.

use crate::EXIT_OK;

pub fn execute() -> anyhow::Result<i32> {
    let schema = serde_json::json!({
        "identity": {
            "character": "string (required): character id, e.g. \"BLAZE\"",
            "move": "string (required): [a-z_]+, becomes the atlas folder",
            "version": "string (required)",
            "frame_count": "integer 1..=32 (required)",
            "is_loop": "bool (default false)"
        },
        "inputs": {
            "anchor": "path (required, must exist): master identity image",
            "style_refs": "paths (default [])",
            "pose_refs": "paths (default [])",
            "guides": "paths (default [])"
        },
        "generator": {
            "backend": "string (required): \"gemini\" or \"stub\"",
            "model": "string (required)",
            "mode": "\"edit\" (fixed)",
            "seed_policy": "\"fixed_then_random\" (default) | \"always_random\"",
            "max_attempts_per_frame": "integer >= 1 (default 6)",
            "prompts": {
                "master": "string (required)",
                "variation": "string (default \"\")",
                "lock": "string (default \"\")",
                "negative": "string (default \"\")"
            },
            "temperature": "number (accepted, always overridden to 1.0)",
            "api_key": "string (optional; prefer GEMINI_API_KEY; always redacted)"
        },
        "canvas": {
            "generation_size": "512 (fixed)",
            "target_size": "128 (default) | 256",
            "downsample_method": "\"nearest\" (fixed)",
            "alignment": {
                "vertical_lock": "bool (default true)",
                "root_zone_ratio": "number in (0,1] (default 0.25)",
                "max_shift_x": "integer px (default 8)"
            }
        },
        "auditor": {
            "thresholds": {
                "identity_min": 0.85,
                "palette_min": 0.90,
                "alpha_artifact_max": 0.20,
                "baseline_drift_max": 4,
                "composite_min": 0.70
            },
            "weights": {
                "identity": 0.40, "palette": 0.25, "baseline": 0.15,
                "alpha": 0.10, "noise": 0.10
            }
        },
        "retry": {
            "ladder": {
                "<reason code>": "ordered action list overriding the default ladder",
                "reason codes": [
                    "SF01_IDENTITY_DRIFT", "SF02_PALETTE_DRIFT", "SF03_BASELINE_DRIFT",
                    "SF_ALPHA_HALO", "SF_PIXEL_NOISE"
                ],
                "actions": [
                    "REROLL_SEED", "IDENTITY_RESCUE", "RE_ANCHOR", "TIGHTEN_NEGATIVE",
                    "POSE_RESCUE", "POST_PROCESS", "TWO_STAGE_INPAINT",
                    "REGENERATE_HIGHRES", "DEFAULT_REGENERATE"
                ]
            }
        },
        "export": {
            "packer_flags": "extra TexturePacker flags (locked set may not be overridden)"
        }
    });

    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(EXIT_OK)
}
