// spriteforge-core/src/domain/metrics/noise.rs

use crate::domain::image::{Pixmap, ops};
use crate::domain::metrics::{METRIC_NOISE, MetricResult};

/// Components of at most this many pixels count as orphan specks.
pub const ORPHAN_AREA_MAX: usize = 2;

/// Fraction of opaque pixels allowed to live in orphan components.
pub const ORPHAN_RATIO_MAX: f64 = 0.01;

/// Counts connected components of opaque pixels and flags stray specks.
/// Pixel art legitimately has disconnected parts (a thrown fist, a
/// projectile), so only near-zero-area components are suspicious.
pub fn evaluate(candidate: &Pixmap) -> MetricResult {
    let areas = ops::opaque_component_areas(candidate);
    let component_count = areas.len();
    let opaque_pixels: usize = areas.iter().sum();

    let orphan_components: Vec<usize> = areas
        .iter()
        .copied()
        .filter(|&a| a <= ORPHAN_AREA_MAX)
        .collect();
    let orphan_pixels: usize = orphan_components.iter().sum();

    let orphan_ratio = if opaque_pixels == 0 {
        1.0
    } else {
        orphan_pixels as f64 / opaque_pixels as f64
    };

    let passed = orphan_ratio <= ORPHAN_RATIO_MAX;

    MetricResult::new(
        METRIC_NOISE,
        1.0 - orphan_ratio,
        ORPHAN_RATIO_MAX,
        passed,
        serde_json::json!({
            "component_count": component_count,
            "orphan_count": orphan_components.len(),
            "orphan_pixels": orphan_pixels,
            "opaque_pixels": opaque_pixels,
            "orphan_ratio": orphan_ratio,
        }),
    )
}
