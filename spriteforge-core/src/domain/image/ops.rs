// spriteforge-core/src/domain/image/ops.rs
//
// Pure functions over RGBA buffers. All resizing is nearest-neighbour:
// pixel art must never gain interpolated colors.

use crate::domain::image::{Bounds, OPAQUE_ALPHA, Pixmap};

/// Nearest-neighbour resize. No interpolation, no new colors.
pub fn resize_nearest(src: &Pixmap, width: u32, height: u32) -> Pixmap {
    let mut dst = Pixmap::new(width, height);
    if src.width == 0 || src.height == 0 {
        return dst;
    }

    for y in 0..height {
        let src_y = ((y as u64 * src.height as u64) / height as u64) as u32;
        for x in 0..width {
            let src_x = ((x as u64 * src.width as u64) / width as u64) as u32;
            dst.set_pixel(x, y, src.pixel(src_x, src_y));
        }
    }
    dst
}

/// Center-crop if larger, transparent-pad if smaller, per axis.
pub fn fit_to_canvas(src: &Pixmap, width: u32, height: u32) -> Pixmap {
    let mut dst = Pixmap::new(width, height);

    // Signed offset of the destination origin inside the source.
    let off_x = (src.width as i64 - width as i64) / 2;
    let off_y = (src.height as i64 - height as i64) / 2;

    for y in 0..height {
        let sy = y as i64 + off_y;
        if sy < 0 || sy >= src.height as i64 {
            continue;
        }
        for x in 0..width {
            let sx = x as i64 + off_x;
            if sx < 0 || sx >= src.width as i64 {
                continue;
            }
            dst.set_pixel(x, y, src.pixel(sx as u32, sy as u32));
        }
    }
    dst
}

/// Tight box of pixels with alpha >= `alpha_threshold`, or None when the
/// image has no such pixel.
pub fn bounding_box(img: &Pixmap, alpha_threshold: u8) -> Option<Bounds> {
    let mut bounds: Option<Bounds> = None;

    for y in 0..img.height {
        for x in 0..img.width {
            if img.alpha(x, y) < alpha_threshold {
                continue;
            }
            bounds = Some(match bounds {
                None => Bounds { left: x, top: y, right: x, bottom: y },
                Some(b) => Bounds {
                    left: b.left.min(x),
                    top: b.top.min(y),
                    right: b.right.max(x),
                    bottom: b.bottom.max(y),
                },
            });
        }
    }
    bounds
}

/// Y of the lowest row containing an opaque pixel (bottom-up scan).
pub fn baseline_y(img: &Pixmap) -> Option<u32> {
    for y in (0..img.height).rev() {
        for x in 0..img.width {
            if img.is_opaque(x, y) {
                return Some(y);
            }
        }
    }
    None
}

/// Visible pixels (alpha > 0) that touch a fully transparent or
/// out-of-image neighbour in the 4-neighbourhood. These are the pixels the
/// alpha-artifact metric classifies.
pub fn edge_pixels(img: &Pixmap) -> Vec<(u32, u32)> {
    let mut edges = Vec::new();

    for y in 0..img.height {
        for x in 0..img.width {
            if img.alpha(x, y) == 0 {
                continue;
            }
            let at_border = x == 0 || y == 0 || x == img.width - 1 || y == img.height - 1;
            let touches_transparent = (x > 0 && img.alpha(x - 1, y) == 0)
                || (x + 1 < img.width && img.alpha(x + 1, y) == 0)
                || (y > 0 && img.alpha(x, y - 1) == 0)
                || (y + 1 < img.height && img.alpha(x, y + 1) == 0);

            if at_border || touches_transparent {
                edges.push((x, y));
            }
        }
    }
    edges
}

/// Translate by (dx, dy) onto a transparent background of the same size.
/// Pixels shifted out of frame are discarded.
pub fn shift(src: &Pixmap, dx: i32, dy: i32) -> Pixmap {
    let mut dst = Pixmap::new(src.width, src.height);

    for y in 0..src.height {
        let ty = y as i64 + dy as i64;
        if ty < 0 || ty >= src.height as i64 {
            continue;
        }
        for x in 0..src.width {
            let tx = x as i64 + dx as i64;
            if tx < 0 || tx >= src.width as i64 {
                continue;
            }
            let px = src.pixel(x, y);
            if px[3] > 0 {
                dst.set_pixel(tx as u32, ty as u32, px);
            }
        }
    }
    dst
}

/// Alpha-weighted centroid of opaque pixels with `y >= zone_top`, in image
/// coordinates. Returns None when the zone holds no opaque pixel.
pub fn weighted_centroid_below(img: &Pixmap, zone_top: u32) -> Option<(f64, f64)> {
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut total_weight = 0.0;

    for y in zone_top..img.height {
        for x in 0..img.width {
            let a = img.alpha(x, y);
            if a < OPAQUE_ALPHA {
                continue;
            }
            let w = a as f64 / 255.0;
            sum_x += x as f64 * w;
            sum_y += y as f64 * w;
            total_weight += w;
        }
    }

    if total_weight == 0.0 {
        None
    } else {
        Some((sum_x / total_weight, sum_y / total_weight))
    }
}

/// Connected components of opaque pixels (4-connectivity), returned as
/// areas. Used by the pixel-noise metric to find orphan specks.
pub fn opaque_component_areas(img: &Pixmap) -> Vec<usize> {
    let w = img.width as usize;
    let h = img.height as usize;
    let mut visited = vec![false; w * h];
    let mut areas = Vec::new();
    let mut stack = Vec::new();

    for y in 0..h {
        for x in 0..w {
            let idx = y * w + x;
            if visited[idx] || !img.is_opaque(x as u32, y as u32) {
                continue;
            }

            let mut area = 0usize;
            stack.push((x, y));
            visited[idx] = true;

            while let Some((cx, cy)) = stack.pop() {
                area += 1;
                let neighbours = [
                    (cx.wrapping_sub(1), cy),
                    (cx + 1, cy),
                    (cx, cy.wrapping_sub(1)),
                    (cx, cy + 1),
                ];
                for (nx, ny) in neighbours {
                    if nx >= w || ny >= h {
                        continue;
                    }
                    let nidx = ny * w + nx;
                    if !visited[nidx] && img.is_opaque(nx as u32, ny as u32) {
                        visited[nidx] = true;
                        stack.push((nx, ny));
                    }
                }
            }
            areas.push(area);
        }
    }
    areas
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn opaque(r: u8, g: u8, b: u8) -> [u8; 4] {
        [r, g, b, 255]
    }

    #[test]
    fn test_resize_nearest_downsample_exact() {
        // 4x4 checkerboard of 2x2 blocks -> 2x2 keeps block corners, no blending.
        let mut src = Pixmap::new(4, 4);
        for y in 0..4 {
            for x in 0..4 {
                let white = (x / 2 + y / 2) % 2 == 0;
                src.set_pixel(x, y, if white { opaque(255, 255, 255) } else { opaque(0, 0, 0) });
            }
        }

        let dst = resize_nearest(&src, 2, 2);
        assert_eq!(dst.pixel(0, 0), opaque(255, 255, 255));
        assert_eq!(dst.pixel(1, 0), opaque(0, 0, 0));
        assert_eq!(dst.pixel(0, 1), opaque(0, 0, 0));
        assert_eq!(dst.pixel(1, 1), opaque(255, 255, 255));
    }

    #[test]
    fn test_resize_introduces_no_new_colors() {
        let mut src = Pixmap::new(3, 3);
        src.set_pixel(1, 1, opaque(200, 100, 50));

        let dst = resize_nearest(&src, 9, 9);
        for px in dst.rgba.chunks_exact(4) {
            assert!(px == [0, 0, 0, 0] || px == [200, 100, 50, 255]);
        }
    }

    #[test]
    fn test_fit_to_canvas_pads_centered() {
        let mut src = Pixmap::new(2, 2);
        src.set_pixel(0, 0, opaque(1, 2, 3));

        let dst = fit_to_canvas(&src, 4, 4);
        assert_eq!(dst.pixel(1, 1), opaque(1, 2, 3));
        assert_eq!(dst.alpha(0, 0), 0);
    }

    #[test]
    fn test_fit_to_canvas_crops_centered() {
        let mut src = Pixmap::new(4, 4);
        src.set_pixel(1, 1, opaque(9, 9, 9));
        src.set_pixel(0, 0, opaque(1, 1, 1)); // lost by the crop

        let dst = fit_to_canvas(&src, 2, 2);
        assert_eq!(dst.pixel(0, 0), opaque(9, 9, 9));
    }

    #[test]
    fn test_bounding_box_tight() {
        let mut img = Pixmap::new(8, 8);
        img.set_pixel(2, 3, opaque(0, 0, 0));
        img.set_pixel(5, 6, opaque(0, 0, 0));

        let b = bounding_box(&img, OPAQUE_ALPHA).unwrap();
        assert_eq!(b, Bounds { left: 2, top: 3, right: 5, bottom: 6 });
        assert!(bounding_box(&Pixmap::new(4, 4), OPAQUE_ALPHA).is_none());
    }

    #[test]
    fn test_baseline_is_lowest_opaque_row() {
        let mut img = Pixmap::new(4, 6);
        img.set_pixel(1, 2, opaque(0, 0, 0));
        img.set_pixel(3, 4, opaque(0, 0, 0));
        assert_eq!(baseline_y(&img), Some(4));

        // Semi-transparent pixels below the threshold do not count.
        img.set_pixel(0, 5, [0, 0, 0, 100]);
        assert_eq!(baseline_y(&img), Some(4));
    }

    #[test]
    fn test_edge_pixels_interior_excluded() {
        // 3x3 solid block in a 5x5 canvas: 8 ring pixels are edges, the
        // center is not.
        let mut img = Pixmap::new(5, 5);
        for y in 1..4 {
            for x in 1..4 {
                img.set_pixel(x, y, opaque(0, 0, 0));
            }
        }

        let edges = edge_pixels(&img);
        assert_eq!(edges.len(), 8);
        assert!(!edges.contains(&(2, 2)));
    }

    #[test]
    fn test_shift_discards_out_of_frame() {
        let mut img = Pixmap::new(3, 3);
        img.set_pixel(0, 0, opaque(5, 5, 5));
        img.set_pixel(2, 2, opaque(7, 7, 7));

        let shifted = shift(&img, 1, 1);
        assert_eq!(shifted.pixel(1, 1), opaque(5, 5, 5));
        // (2,2) went out of frame.
        assert_eq!(shifted.opaque_pixel_count(), 1);
    }

    #[test]
    fn test_component_areas_finds_orphans() {
        let mut img = Pixmap::new(8, 8);
        // One 2x2 blob and one orphan pixel.
        for (x, y) in [(1, 1), (2, 1), (1, 2), (2, 2)] {
            img.set_pixel(x, y, opaque(0, 0, 0));
        }
        img.set_pixel(6, 6, opaque(0, 0, 0));

        let mut areas = opaque_component_areas(&img);
        areas.sort_unstable();
        assert_eq!(areas, vec![1, 4]);
    }

    #[test]
    fn test_weighted_centroid_respects_zone() {
        let mut img = Pixmap::new(3, 6);
        img.set_pixel(0, 0, opaque(0, 0, 0)); // above the zone
        img.set_pixel(2, 5, opaque(0, 0, 0));

        let (cx, cy) = weighted_centroid_below(&img, 4).unwrap();
        assert_eq!((cx, cy), (2.0, 5.0));
    }
}
