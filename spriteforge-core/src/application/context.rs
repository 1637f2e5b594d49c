// spriteforge-core/src/application/context.rs
//
// The RunContext replaces every global: it carries the run directory
// layout, the external ports and the frozen anchor analysis on each
// operation. Built once, then read-only for the life of the run.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::domain::anchor::{AnchorAnalysis, analyze_anchor};
use crate::domain::image::{Pixmap, ops};
use crate::domain::manifest::Manifest;
use crate::domain::metrics::identity::IdentityConfig;
use crate::error::ForgeError;
use crate::infrastructure::layout::RunLayout;
use crate::infrastructure::png;
use crate::ports::generator::ImageGenerator;
use crate::ports::packer::AtlasPacker;

/// The anchor rendered at audit scale, with its own derived analysis.
/// Baselines and centroids measured at 512 px are not comparable to a
/// normalized 128 px frame, so the auditor gets this instead.
#[derive(Debug, Clone)]
pub struct AuditReference {
    pub image: Pixmap,
    pub analysis: AnchorAnalysis,
}

pub struct RunContext {
    pub run_id: String,
    pub layout: RunLayout,
    pub manifest: Manifest,
    pub manifest_hash: String,
    /// Absolute path of the manifest file this run was started from.
    pub manifest_path: std::path::PathBuf,
    pub generator: Arc<dyn ImageGenerator>,
    pub packer: Arc<dyn AtlasPacker>,
    /// Anchor at generation resolution; the normalizer aligns against it.
    pub anchor: Pixmap,
    /// Raw anchor bytes as sent to the generator on every attempt.
    pub anchor_png: Vec<u8>,
    pub anchor_analysis: AnchorAnalysis,
    pub reference: AuditReference,
    pub identity_config: IdentityConfig,
    abort: Arc<AtomicBool>,
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("run_id", &self.run_id)
            .field("manifest_hash", &self.manifest_hash)
            .field("manifest_path", &self.manifest_path)
            .finish()
    }
}

impl RunContext {
    #[allow(clippy::too_many_arguments)]
    pub fn prepare(
        run_id: &str,
        layout: RunLayout,
        manifest: Manifest,
        manifest_hash: &str,
        manifest_path: &std::path::Path,
        anchor_png: Vec<u8>,
        generator: Arc<dyn ImageGenerator>,
        packer: Arc<dyn AtlasPacker>,
        abort: Arc<AtomicBool>,
    ) -> Result<Self, ForgeError> {
        let generation_size = manifest.canvas.generation_size;
        let target_size = manifest.canvas.target_size;
        let ratio = manifest.canvas.alignment.root_zone_ratio;

        let mut anchor = png::decode_pixmap(&anchor_png).map_err(ForgeError::Infrastructure)?;
        if anchor.width != generation_size || anchor.height != generation_size {
            anchor = ops::resize_nearest(&anchor, generation_size, generation_size);
        }

        let anchor_analysis = analyze_anchor(&anchor, ratio).map_err(ForgeError::Domain)?;

        let reference_image = ops::fit_to_canvas(
            &ops::resize_nearest(&anchor, target_size, target_size),
            target_size,
            target_size,
        );
        let reference_analysis =
            analyze_anchor(&reference_image, ratio).map_err(ForgeError::Domain)?;

        let manifest_path = manifest_path
            .canonicalize()
            .unwrap_or_else(|_| manifest_path.to_path_buf());

        Ok(Self {
            run_id: run_id.to_string(),
            layout,
            manifest,
            manifest_hash: manifest_hash.to_string(),
            manifest_path,
            generator,
            packer,
            anchor,
            anchor_png,
            anchor_analysis,
            reference: AuditReference {
                image: reference_image,
                analysis: reference_analysis,
            },
            identity_config: IdentityConfig::default(),
            abort,
        })
    }

    pub fn abort_requested(&self) -> bool {
        self.abort.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::stub::StubGenerator;
    use crate::infrastructure::adapters::texture_packer::TexturePackerAdapter;

    fn sample_manifest() -> Manifest {
        serde_json::from_str(
            r#"
            {
                "identity": { "character": "BLAZE", "move": "idle", "version": "1", "frame_count": 2 },
                "inputs": { "anchor": "anchor.png" },
                "generator": {
                    "backend": "gemini",
                    "model": "gemini-2.5-flash-image",
                    "prompts": { "master": "pixel art" }
                }
            }
            "#,
        )
        .unwrap()
    }

    fn anchor_png_512() -> Vec<u8> {
        let mut img = Pixmap::new(512, 512);
        for y in 100..420 {
            for x in 200..320 {
                img.set_pixel(x, y, [200, 40, 40, 255]);
            }
        }
        png::encode_png(&img).unwrap()
    }

    #[test]
    fn test_prepare_builds_both_analyses() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = RunContext::prepare(
            "run_1",
            RunLayout::new(tmp.path()),
            sample_manifest(),
            "hash",
            std::path::Path::new("manifest.json"),
            anchor_png_512(),
            Arc::new(StubGenerator::new()),
            Arc::new(TexturePackerAdapter::new(None)),
            Arc::new(AtomicBool::new(false)),
        )
        .unwrap();

        assert_eq!(ctx.anchor.width, 512);
        assert_eq!(ctx.reference.image.width, 128);
        assert_eq!(ctx.anchor_analysis.baseline_y, 419);
        // Reference baseline lands at roughly a quarter of the 512 one.
        assert!(ctx.reference.analysis.baseline_y >= 103);
        assert!(ctx.reference.analysis.baseline_y <= 105);
        assert!(!ctx.abort_requested());
    }

    #[test]
    fn test_fully_transparent_anchor_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let empty = png::encode_png(&Pixmap::new(512, 512)).unwrap();
        let err = RunContext::prepare(
            "run_1",
            RunLayout::new(tmp.path()),
            sample_manifest(),
            "hash",
            std::path::Path::new("manifest.json"),
            empty,
            Arc::new(StubGenerator::new()),
            Arc::new(TexturePackerAdapter::new(None)),
            Arc::new(AtomicBool::new(false)),
        )
        .unwrap_err();
        assert!(matches!(err, ForgeError::Domain(_)));
    }
}
