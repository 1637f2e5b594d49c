// spriteforge-core/src/domain/metrics/palette.rs

use crate::domain::anchor::color_distance;
use crate::domain::image::{OPAQUE_ALPHA, Pixmap};
use crate::domain::metrics::{METRIC_PALETTE, MetricResult};

/// Euclidean RGB distance within which a pixel counts as on-palette.
pub const MEMBERSHIP_TOLERANCE: f64 = 5.0;

/// Fraction of opaque pixels whose color sits within tolerance of some
/// anchor palette entry.
pub fn evaluate(candidate: &Pixmap, palette: &[[u8; 3]], palette_min: f64) -> MetricResult {
    let mut opaque = 0usize;
    let mut on_palette = 0usize;

    for px in candidate.rgba.chunks_exact(4) {
        if px[3] < OPAQUE_ALPHA {
            continue;
        }
        opaque += 1;
        let color = [px[0], px[1], px[2]];
        if palette
            .iter()
            .any(|p| color_distance(*p, color) <= MEMBERSHIP_TOLERANCE)
        {
            on_palette += 1;
        }
    }

    let score = if opaque == 0 {
        0.0
    } else {
        on_palette as f64 / opaque as f64
    };

    MetricResult::new(
        METRIC_PALETTE,
        score,
        palette_min,
        score >= palette_min,
        serde_json::json!({
            "opaque_pixels": opaque,
            "on_palette_pixels": on_palette,
            "palette_size": palette.len(),
            "membership_tolerance": MEMBERSHIP_TOLERANCE,
        }),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_palette_match_scores_one() {
        let mut img = Pixmap::new(2, 2);
        img.set_pixel(0, 0, [10, 20, 30, 255]);
        img.set_pixel(1, 1, [40, 50, 60, 255]);

        let palette = vec![[10, 20, 30], [40, 50, 60]];
        let result = evaluate(&img, &palette, 0.9);
        assert_eq!(result.score, 1.0);
        assert!(result.passed);
    }

    #[test]
    fn test_near_palette_within_tolerance_counts() {
        let mut img = Pixmap::new(1, 1);
        img.set_pixel(0, 0, [13, 24, 30, 255]); // distance 5 from (10,20,30)

        let result = evaluate(&img, &[[10, 20, 30]], 0.9);
        assert_eq!(result.score, 1.0);
    }

    #[test]
    fn test_off_palette_fraction() {
        let mut img = Pixmap::new(2, 1);
        img.set_pixel(0, 0, [10, 20, 30, 255]);
        img.set_pixel(1, 0, [200, 200, 200, 255]);

        let result = evaluate(&img, &[[10, 20, 30]], 0.9);
        assert_eq!(result.score, 0.5);
        assert!(!result.passed);
    }

    #[test]
    fn test_empty_candidate_scores_zero() {
        let img = Pixmap::new(2, 2);
        let result = evaluate(&img, &[[0, 0, 0]], 0.9);
        assert_eq!(result.score, 0.0);
        assert!(!result.passed);
    }
}
