// spriteforge/src/commands/guide.rs

use crate::EXIT_OK;

pub fn execute() -> i32 {
    println!(
        r#"
📚 spriteforge operator guide

1. Author an anchor
   Export your character's identity frame as a 512x512 RGBA PNG on a
   transparent background. The lowest opaque row becomes the ground line.

2. Write a manifest
   'spriteforge schema' prints every field with its default. Start from
   'spriteforge demo' if you want a working offline example.

3. Check your environment
   'spriteforge doctor' verifies the API key, the TexturePacker binary
   and the output directory. Fix everything red before spending quota.

4. Produce a move
   spriteforge gen --move idle --manifest manifests/idle.json
   Frames are generated one at a time, audited against the anchor, and
   retried along the recovery ladder when a quality gate fails.

5. Interrupt freely
   Ctrl-C parks the run after the current operation; resume with
   'spriteforge gen --move idle --resume <run_id>'. Approved frames are
   never regenerated. If you edit the manifest, resume requires --force.

6. Review and ship
   'spriteforge inspect <run_id>' shows per-frame attempts and reasons.
   'spriteforge validate <run_id>' re-checks the exported atlas. The
   atlas and its JSON land in <run_dir>/export/.

Exit codes: 0 success/release-ready · 1 validation failed · 2 stopped ·
3 system or dependency error.
"#
    );
    EXIT_OK
}
