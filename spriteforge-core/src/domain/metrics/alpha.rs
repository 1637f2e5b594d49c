// spriteforge-core/src/domain/metrics/alpha.rs
//
// Edge-pixel pathology. Two distinct failure shapes come out of generative
// backends: halos (soft semi-transparent rims brighter than the body) and
// chroma fringes (leftover green/magenta/cyan keying colors).

use crate::domain::anchor::color_distance;
use crate::domain::image::{Pixmap, ops};
use crate::domain::metrics::{METRIC_ALPHA, MetricResult};

/// Chebyshev search radius when looking for the nearest fully opaque
/// neighbour of a suspected halo pixel.
const OPAQUE_SEARCH_RADIUS: i64 = 3;

/// RGB distance under which an edge pixel counts as a chroma-key fringe.
const FRINGE_TOLERANCE: f64 = 50.0;

const KEY_COLORS: [[u8; 3]; 3] = [
    [0, 255, 0],   // green screen
    [255, 0, 255], // magenta
    [0, 255, 255], // cyan
];

const HALO_WEIGHT: f64 = 0.6;
const FRINGE_WEIGHT: f64 = 0.4;

pub fn evaluate(candidate: &Pixmap, alpha_artifact_max: f64) -> MetricResult {
    let edges = ops::edge_pixels(candidate);
    let edge_count = edges.len();

    let mut halo_count = 0usize;
    let mut fringe_count = 0usize;

    for &(x, y) in &edges {
        let px = candidate.pixel(x, y);
        if is_halo(candidate, x, y, px) {
            halo_count += 1;
        }
        if is_fringe(px) {
            fringe_count += 1;
        }
    }

    let (halo_severity, fringe_severity) = if edge_count == 0 {
        (0.0, 0.0)
    } else {
        (
            halo_count as f64 / edge_count as f64,
            fringe_count as f64 / edge_count as f64,
        )
    };

    let severity = HALO_WEIGHT * halo_severity + FRINGE_WEIGHT * fringe_severity;
    let passed = severity <= alpha_artifact_max;

    MetricResult::new(
        METRIC_ALPHA,
        1.0 - severity,
        alpha_artifact_max,
        passed,
        serde_json::json!({
            "edge_pixels": edge_count,
            "halo_count": halo_count,
            "fringe_count": fringe_count,
            "halo_severity": halo_severity,
            "fringe_severity": fringe_severity,
            "severity": severity,
        }),
    )
}

/// Halo: partial alpha AND brighter than the nearest fully opaque
/// neighbour. A soft edge that stays darker than the body is shading, not
/// an artifact.
fn is_halo(img: &Pixmap, x: u32, y: u32, px: [u8; 4]) -> bool {
    if px[3] == 0 || px[3] == 255 {
        return false;
    }
    match nearest_opaque_luminance(img, x, y) {
        Some(neighbour_lum) => luminance(px) > neighbour_lum,
        None => false,
    }
}

fn is_fringe(px: [u8; 4]) -> bool {
    let color = [px[0], px[1], px[2]];
    KEY_COLORS
        .iter()
        .any(|key| color_distance(*key, color) < FRINGE_TOLERANCE)
}

/// Scan outward ring by ring for the first fully opaque pixel.
fn nearest_opaque_luminance(img: &Pixmap, cx: u32, cy: u32) -> Option<f64> {
    for radius in 1..=OPAQUE_SEARCH_RADIUS {
        let mut best: Option<f64> = None;
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx.abs() != radius && dy.abs() != radius {
                    continue; // only the ring at this radius
                }
                let x = cx as i64 + dx;
                let y = cy as i64 + dy;
                if x < 0 || y < 0 || x >= img.width as i64 || y >= img.height as i64 {
                    continue;
                }
                let px = img.pixel(x as u32, y as u32);
                if px[3] == 255 {
                    let lum = luminance(px);
                    best = Some(match best {
                        Some(b) => b.max(lum),
                        None => lum,
                    });
                }
            }
        }
        if best.is_some() {
            return best;
        }
    }
    None
}

fn luminance(px: [u8; 4]) -> f64 {
    0.299 * px[0] as f64 + 0.587 * px[1] as f64 + 0.114 * px[2] as f64
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dark_block() -> Pixmap {
        let mut img = Pixmap::new(8, 8);
        for y in 2..6 {
            for x in 2..6 {
                img.set_pixel(x, y, [40, 40, 40, 255]);
            }
        }
        img
    }

    #[test]
    fn test_clean_sprite_has_no_artifacts() {
        let result = evaluate(&dark_block(), 0.20);
        assert!(result.passed);
        assert_eq!(result.score, 1.0);
        assert_eq!(result.details["halo_count"], 0);
        assert_eq!(result.details["fringe_count"], 0);
    }

    #[test]
    fn test_bright_partial_rim_is_halo() {
        let mut img = dark_block();
        // Bright semi-transparent pixel hugging the left edge of the body.
        img.set_pixel(1, 3, [240, 240, 240, 120]);

        let result = evaluate(&img, 0.20);
        assert_eq!(result.details["halo_count"], 1);
    }

    #[test]
    fn test_dark_partial_rim_is_not_halo() {
        let mut img = dark_block();
        // Soft shading darker than the body: legitimate.
        img.set_pixel(1, 3, [10, 10, 10, 120]);

        let result = evaluate(&img, 0.20);
        assert_eq!(result.details["halo_count"], 0);
    }

    #[test]
    fn test_green_key_pixel_is_fringe() {
        let mut img = dark_block();
        img.set_pixel(6, 3, [20, 250, 20, 255]);

        let result = evaluate(&img, 0.20);
        assert_eq!(result.details["fringe_count"], 1);
    }

    #[test]
    fn test_severity_weighting() {
        // One edge pixel that is both halo and fringe would dominate a tiny
        // sprite; check the 0.6/0.4 split instead on a single-pixel image.
        let mut img = Pixmap::new(3, 3);
        img.set_pixel(1, 1, [30, 30, 30, 255]);
        img.set_pixel(0, 1, [40, 250, 40, 255]); // fringe, fully opaque

        let result = evaluate(&img, 0.05);
        // 2 edge pixels, 1 fringe, 0 halos -> severity 0.4 * 0.5 = 0.2
        assert_eq!(result.details["severity"], 0.2);
        assert!(!result.passed);
    }
}
