//! Tangent-space normal map from the linear height grid.
//!
//! Per pixel, the surface tangent and bitangent are taken from 4-neighbor
//! finite differences (edge-replicated at the border) and crossed to get the
//! normal. A rescale loop widens the horizontal scale until no normal x/y
//! component saturates near +-1, so an ill-scaled height field cannot
//! flatten the whole map.

use image::{Rgb, RgbImage};

use super::gridded::HeightGrid;

const SATURATION_LIMIT: f64 = 0.99;
const SCALE_STEP: f64 = 0.05;
const SCALE_BOUND: f64 = 5.0;

/// Height with NaN cells (outside the interpolation hull) replaced by the
/// mean of the finite cells, keeping border gradients finite.
fn fill_nan_with_mean(height: &HeightGrid) -> Vec<f64> {
    let finite: Vec<f64> = height.data.iter().copied().filter(|v| v.is_finite()).collect();
    let mean = if finite.is_empty() {
        0.0
    } else {
        finite.iter().sum::<f64>() / finite.len() as f64
    };
    height
        .data
        .iter()
        .map(|&v| if v.is_finite() { v } else { mean })
        .collect()
}

/// Compute unit normals for every cell at the given horizontal scale.
/// Returns the normals and whether any x/y component saturated.
fn compute_normals(data: &[f64], size: usize, scale: f64) -> (Vec<[f64; 3]>, bool) {
    let at = |x: i64, y: i64| -> f64 {
        let x = x.clamp(0, size as i64 - 1) as usize;
        let y = y.clamp(0, size as i64 - 1) as usize;
        data[y * size + x]
    };

    let mut normals = vec![[0.0; 3]; size * size];
    let mut saturated = false;

    for y in 0..size as i64 {
        for x in 0..size as i64 {
            let dx = at(x + 1, y) - at(x - 1, y);
            let dy = at(x, y + 1) - at(x, y - 1);

            // (scale, 0, dx) x (0, scale, dy), normalized.
            let n = [-scale * dx, -scale * dy, scale * scale];
            let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
            let n = [n[0] / len, n[1] / len, n[2] / len];

            if n[0].abs() >= SATURATION_LIMIT || n[1].abs() >= SATURATION_LIMIT {
                saturated = true;
            }
            normals[(y as usize) * size + x as usize] = n;
        }
    }
    (normals, saturated)
}

/// Render the tangent-space normal map for `height`.
///
/// Channels are the normal remapped from [-1, 1] to [0, 1], with the green
/// channel flipped for the OpenGL up convention.
pub fn render_normal_map(height: &HeightGrid) -> RgbImage {
    let size = height.size;
    let data = fill_nan_with_mean(height);

    let mut scale = SCALE_STEP;
    let normals = loop {
        let (normals, saturated) = compute_normals(&data, size, scale);
        if !saturated || scale > SCALE_BOUND {
            break normals;
        }
        scale += SCALE_STEP;
    };

    let mut img = RgbImage::new(size as u32, size as u32);
    for y in 0..size {
        for x in 0..size {
            let n = normals[y * size + x];
            let r = (n[0] / 2.0 + 0.5).clamp(0.0, 1.0);
            let g = (0.5 - n[1] / 2.0).clamp(0.0, 1.0);
            let b = (n[2] / 2.0 + 0.5).clamp(0.0, 1.0);
            img.put_pixel(
                x as u32,
                y as u32,
                Rgb([(r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8]),
            );
        }
    }
    img
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(size: usize, f: impl Fn(usize, usize) -> f64) -> HeightGrid {
        let mut data = Vec::with_capacity(size * size);
        for y in 0..size {
            for x in 0..size {
                data.push(f(x, y));
            }
        }
        HeightGrid { size, data }
    }

    #[test]
    fn test_flat_field_points_straight_up() {
        let img = render_normal_map(&grid(8, |_, _| 42.0));
        for p in img.pixels() {
            // (0, 0, 1) remaps to (127, 127, 255).
            assert_eq!(p.0, [127, 127, 255]);
        }
    }

    #[test]
    fn test_slope_tilts_red_channel() {
        // Rising to the east: normal leans west, red below midpoint.
        let img = render_normal_map(&grid(8, |x, _| x as f64 * 0.2));
        let center = img.get_pixel(4, 4).0;
        assert!(center[0] < 127);
        assert_eq!(center[1], 127);
    }

    #[test]
    fn test_rescale_loop_desaturates_steep_fields() {
        // A ramp steep enough to saturate at the initial 0.05 scale; the
        // loop must widen the scale until components fit inside the limit.
        let img = render_normal_map(&grid(8, |x, _| x as f64 * 0.5));
        let mut tilted = false;
        for p in img.pixels() {
            let nx = p.0[0] as f64 / 255.0 * 2.0 - 1.0;
            // Inside the saturation limit, with slack for u8 quantization.
            assert!(nx.abs() < SATURATION_LIMIT + 0.005);
            if nx < -0.5 {
                tilted = true;
            }
        }
        assert!(tilted, "slope should still read as a strong tilt");
    }

    #[test]
    fn test_nan_cells_use_mean() {
        let mut height = grid(8, |_, _| 10.0);
        height.data[0] = f64::NAN;
        let img = render_normal_map(&height);
        // With the NaN filled by the mean the whole field is flat.
        assert_eq!(img.get_pixel(0, 0).0, [127, 127, 255]);
    }
}
