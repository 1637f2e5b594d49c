// spriteforge-core/src/domain/anchor.rs
//
// The anchor is the identity truth for a whole run. It is analyzed exactly
// once at INIT; every audit afterwards compares candidates against this
// frozen record.

use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;
use crate::domain::image::{Bounds, OPAQUE_ALPHA, Pixmap, ops};

/// Unique colors above this count trigger clustering.
pub const PALETTE_CLUSTER_TRIGGER: usize = 256;

/// Euclidean RGB distance within which two colors merge during clustering.
pub const PALETTE_CLUSTER_TOLERANCE: f64 = 5.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnchorAnalysis {
    /// Row of the lowest opaque pixel.
    pub baseline_y: u32,
    /// Alpha-weighted centroid of the root zone (bottom slice of the
    /// visible bounds).
    pub root_zone_centroid: (f64, f64),
    /// Sorted unique RGB triples of opaque pixels, clustered when the
    /// anchor exceeds [`PALETTE_CLUSTER_TRIGGER`] unique colors.
    pub palette: Vec<[u8; 3]>,
    pub visible_bounds: Bounds,
}

pub fn analyze_anchor(anchor: &Pixmap, root_zone_ratio: f64) -> Result<AnchorAnalysis, DomainError> {
    let visible_bounds =
        ops::bounding_box(anchor, OPAQUE_ALPHA).ok_or(DomainError::AnchorFullyTransparent)?;

    // baseline_y is guaranteed by the bounding box existing.
    let baseline_y = ops::baseline_y(anchor).ok_or(DomainError::AnchorFullyTransparent)?;

    let zone_top = root_zone_top(baseline_y, visible_bounds.height(), root_zone_ratio);
    let root_zone_centroid = ops::weighted_centroid_below(anchor, zone_top)
        .ok_or(DomainError::AnchorFullyTransparent)?;

    let palette = extract_palette(anchor);

    Ok(AnchorAnalysis {
        baseline_y,
        root_zone_centroid,
        palette,
        visible_bounds,
    })
}

/// First row of the root zone: `baseline_y - floor(ratio * visible_height)`.
pub fn root_zone_top(baseline_y: u32, visible_height: u32, ratio: f64) -> u32 {
    let depth = (ratio * visible_height as f64).floor() as u32;
    baseline_y.saturating_sub(depth)
}

/// Collect unique opaque colors; cluster when the count exceeds the
/// trigger, keeping the most frequent color of each cluster as its
/// representative.
pub fn extract_palette(img: &Pixmap) -> Vec<[u8; 3]> {
    use std::collections::HashMap;

    let mut counts: HashMap<[u8; 3], u64> = HashMap::new();
    for px in img.rgba.chunks_exact(4) {
        if px[3] >= OPAQUE_ALPHA {
            *counts.entry([px[0], px[1], px[2]]).or_insert(0) += 1;
        }
    }

    let mut colors: Vec<([u8; 3], u64)> = counts.into_iter().collect();

    if colors.len() > PALETTE_CLUSTER_TRIGGER {
        colors = cluster_colors(colors, PALETTE_CLUSTER_TOLERANCE);
    }

    let mut palette: Vec<[u8; 3]> = colors.into_iter().map(|(c, _)| c).collect();
    palette.sort_unstable();
    palette
}

/// Greedy clustering: colors are visited most-frequent first, and each one
/// either founds a cluster or merges into the first representative within
/// tolerance.
fn cluster_colors(mut colors: Vec<([u8; 3], u64)>, tolerance: f64) -> Vec<([u8; 3], u64)> {
    colors.sort_unstable_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut representatives: Vec<([u8; 3], u64)> = Vec::new();
    for (color, count) in colors {
        match representatives
            .iter_mut()
            .find(|(rep, _)| color_distance(*rep, color) <= tolerance)
        {
            Some((_, rep_count)) => *rep_count += count,
            None => representatives.push((color, count)),
        }
    }
    representatives
}

pub fn color_distance(a: [u8; 3], b: [u8; 3]) -> f64 {
    let dr = a[0] as f64 - b[0] as f64;
    let dg = a[1] as f64 - b[1] as f64;
    let db = a[2] as f64 - b[2] as f64;
    (dr * dr + dg * dg + db * db).sqrt()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn opaque(r: u8, g: u8, b: u8) -> [u8; 4] {
        [r, g, b, 255]
    }

    fn simple_anchor() -> Pixmap {
        // 8x8: a 4-wide, 5-tall body standing on row 6.
        let mut img = Pixmap::new(8, 8);
        for y in 2..=6 {
            for x in 2..=5 {
                img.set_pixel(x, y, opaque(200, 40, 40));
            }
        }
        img
    }

    #[test]
    fn test_analysis_geometry() {
        let analysis = analyze_anchor(&simple_anchor(), 0.25).unwrap();

        assert_eq!(analysis.baseline_y, 6);
        assert_eq!(
            analysis.visible_bounds,
            Bounds { left: 2, top: 2, right: 5, bottom: 6 }
        );
        assert_eq!(analysis.palette, vec![[200, 40, 40]]);

        // Root zone: baseline 6 - floor(0.25 * 5) = row 5 and below.
        // Rows 5..=6, x 2..=5 -> centroid x 3.5, y 5.5.
        assert!((analysis.root_zone_centroid.0 - 3.5).abs() < 1e-9);
        assert!((analysis.root_zone_centroid.1 - 5.5).abs() < 1e-9);
    }

    #[test]
    fn test_fully_transparent_anchor_fails() {
        let img = Pixmap::new(4, 4);
        assert!(matches!(
            analyze_anchor(&img, 0.25),
            Err(DomainError::AnchorFullyTransparent)
        ));
    }

    #[test]
    fn test_palette_sorted_unique() {
        let mut img = Pixmap::new(3, 1);
        img.set_pixel(0, 0, opaque(9, 9, 9));
        img.set_pixel(1, 0, opaque(1, 1, 1));
        img.set_pixel(2, 0, opaque(9, 9, 9));

        let analysis = analyze_anchor(&img, 1.0).unwrap();
        assert_eq!(analysis.palette, vec![[1, 1, 1], [9, 9, 9]]);
    }

    #[test]
    fn test_palette_clustering_kicks_in_above_trigger() {
        // 300 unique reds, each one step apart in blue: clustering must
        // collapse near-identical colors.
        let mut img = Pixmap::new(300, 1);
        for x in 0..300u32 {
            img.set_pixel(x, 0, opaque(200, 0, (x % 256) as u8));
        }

        let palette = extract_palette(&img);
        assert!(palette.len() <= PALETTE_CLUSTER_TRIGGER);
        assert!(!palette.is_empty());
    }

    #[test]
    fn test_root_zone_top_saturates() {
        assert_eq!(root_zone_top(3, 100, 0.25), 0);
        assert_eq!(root_zone_top(10, 8, 0.5), 6);
    }

    #[test]
    fn test_color_distance() {
        assert_eq!(color_distance([0, 0, 0], [3, 4, 0]), 5.0);
    }
}
