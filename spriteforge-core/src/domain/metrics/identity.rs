// spriteforge-core/src/domain/metrics/identity.rs
//
// Structural similarity of the candidate against the anchor, restricted to
// the visible sprite. The SSIM constants are frozen here: changing them
// silently re-grades every run, so they are configuration, not tunables.

use serde::{Deserialize, Serialize};

use crate::domain::error::DomainError;
use crate::domain::image::Pixmap;
use crate::domain::metrics::{METRIC_IDENTITY, MetricResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct IdentityConfig {
    pub window: usize,
    pub sigma: f64,
    pub k1: f64,
    pub k2: f64,
    pub dynamic_range: f64,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            window: 11,
            sigma: 1.5,
            k1: 0.01,
            k2: 0.03,
            dynamic_range: 255.0,
        }
    }
}

pub fn evaluate(
    candidate: &Pixmap,
    anchor: &Pixmap,
    identity_min: f64,
    config: &IdentityConfig,
) -> Result<MetricResult, DomainError> {
    let (score, windows) = ssim_masked(candidate, anchor, config)?;
    let passed = score >= identity_min;

    Ok(MetricResult::new(
        METRIC_IDENTITY,
        score,
        identity_min,
        passed,
        serde_json::json!({
            "mean_ssim": score,
            "windows_compared": windows,
            "window_size": config.window,
        }),
    ))
}

/// Mean SSIM over windows centered on pixels opaque in either image.
/// Covering both masks means a candidate that lost (or grew) body mass is
/// penalized instead of silently skipped.
pub fn ssim_masked(
    a: &Pixmap,
    b: &Pixmap,
    config: &IdentityConfig,
) -> Result<(f64, usize), DomainError> {
    if a.width != b.width || a.height != b.height {
        return Err(DomainError::ImageError(format!(
            "identity metric requires equal dimensions ({}x{} vs {}x{})",
            a.width, a.height, b.width, b.height
        )));
    }

    let width = a.width as i64;
    let height = a.height as i64;
    let lum_a = luminance_plane(a);
    let lum_b = luminance_plane(b);

    let kernel = gaussian_kernel(config.window, config.sigma);
    let half = (config.window / 2) as i64;

    let c1 = (config.k1 * config.dynamic_range).powi(2);
    let c2 = (config.k2 * config.dynamic_range).powi(2);

    let mut sum = 0.0;
    let mut count = 0usize;

    for cy in 0..height {
        for cx in 0..width {
            let (x, y) = (cx as u32, cy as u32);
            if !a.is_opaque(x, y) && !b.is_opaque(x, y) {
                continue;
            }

            let mut w_sum = 0.0;
            let mut mu_a = 0.0;
            let mut mu_b = 0.0;

            for ky in -half..=half {
                for kx in -half..=half {
                    let px = cx + kx;
                    let py = cy + ky;
                    if px < 0 || py < 0 || px >= width || py >= height {
                        continue;
                    }
                    let w = kernel[(ky + half) as usize][(kx + half) as usize];
                    let idx = (py * width + px) as usize;
                    w_sum += w;
                    mu_a += w * lum_a[idx];
                    mu_b += w * lum_b[idx];
                }
            }

            if w_sum <= 0.0 {
                continue;
            }
            mu_a /= w_sum;
            mu_b /= w_sum;

            let mut var_a = 0.0;
            let mut var_b = 0.0;
            let mut covar = 0.0;

            for ky in -half..=half {
                for kx in -half..=half {
                    let px = cx + kx;
                    let py = cy + ky;
                    if px < 0 || py < 0 || px >= width || py >= height {
                        continue;
                    }
                    let w = kernel[(ky + half) as usize][(kx + half) as usize] / w_sum;
                    let idx = (py * width + px) as usize;
                    let da = lum_a[idx] - mu_a;
                    let db = lum_b[idx] - mu_b;
                    var_a += w * da * da;
                    var_b += w * db * db;
                    covar += w * da * db;
                }
            }

            let ssim = ((2.0 * mu_a * mu_b + c1) * (2.0 * covar + c2))
                / ((mu_a * mu_a + mu_b * mu_b + c1) * (var_a + var_b + c2));

            sum += ssim;
            count += 1;
        }
    }

    if count == 0 {
        // Both images empty in every window: nothing to compare.
        return Ok((0.0, 0));
    }

    Ok(((sum / count as f64).clamp(0.0, 1.0), count))
}

/// Rec. 601 luma, transparent pixels contributing zero.
fn luminance_plane(img: &Pixmap) -> Vec<f64> {
    img.rgba
        .chunks_exact(4)
        .map(|px| {
            if px[3] == 0 {
                0.0
            } else {
                0.299 * px[0] as f64 + 0.587 * px[1] as f64 + 0.114 * px[2] as f64
            }
        })
        .collect()
}

fn gaussian_kernel(size: usize, sigma: f64) -> Vec<Vec<f64>> {
    let half = (size / 2) as i64;
    let mut kernel = vec![vec![0.0; size]; size];
    let denom = 2.0 * sigma * sigma;

    for y in -half..=half {
        for x in -half..=half {
            let v = (-((x * x + y * y) as f64) / denom).exp();
            kernel[(y + half) as usize][(x + half) as usize] = v;
        }
    }
    kernel
}
