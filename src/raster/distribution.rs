//! Sample distribution overlay.
//!
//! Marks where samples actually landed: each sample's grid offsets are
//! normalized into [0, 1] by the observed offset range, mapped to a pixel,
//! and the resulting one-pixel dots are dilated so they stay visible at
//! satellite-image resolutions. Rendered as solid red with the dilated mask
//! as the alpha channel.

use image::{Rgba, RgbaImage};

use crate::dataset::ElevationSample;

/// Binary dilation with the plus-shaped structuring element.
fn dilate_plus(mask: &[bool], width: usize, height: usize, iterations: usize) -> Vec<bool> {
    let mut current = mask.to_vec();
    for _ in 0..iterations {
        let mut next = current.clone();
        for y in 0..height {
            for x in 0..width {
                if current[y * width + x] {
                    continue;
                }
                let hit = (x > 0 && current[y * width + x - 1])
                    || (x + 1 < width && current[y * width + x + 1])
                    || (y > 0 && current[(y - 1) * width + x])
                    || (y + 1 < height && current[(y + 1) * width + x]);
                if hit {
                    next[y * width + x] = true;
                }
            }
        }
        current = next;
    }
    current
}

/// Render the distribution map at exactly `width` x `height` pixels.
pub fn render_distribution(
    samples: &[ElevationSample],
    width: u32,
    height: u32,
) -> RgbaImage {
    let (w, h) = (width as usize, height as usize);
    let mut mask = vec![false; w * h];

    let (mut min_x, mut max_x) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut min_y, mut max_y) = (f64::INFINITY, f64::NEG_INFINITY);
    for s in samples {
        min_x = min_x.min(s.x_offset_m);
        max_x = max_x.max(s.x_offset_m);
        min_y = min_y.min(s.y_offset_m);
        max_y = max_y.max(s.y_offset_m);
    }
    let span_x = (max_x - min_x).max(f64::MIN_POSITIVE);
    let span_y = (max_y - min_y).max(f64::MIN_POSITIVE);

    for s in samples {
        let x = ((s.x_offset_m - min_x) / span_x * w as f64) as usize;
        let y = ((s.y_offset_m - min_y) / span_y * h as f64) as usize;
        mask[y.min(h - 1) * w + x.min(w - 1)] = true;
    }

    let mask = dilate_plus(&mask, w, h, 2);

    let mut img = RgbaImage::from_pixel(width, height, Rgba([255, 0, 0, 0]));
    for y in 0..h {
        for x in 0..w {
            if mask[y * w + x] {
                img.put_pixel(x as u32, y as u32, Rgba([255, 0, 0, 255]));
            }
        }
    }
    img
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_at(x_offset_m: f64, y_offset_m: f64) -> ElevationSample {
        ElevationSample {
            latitude: 0.0,
            longitude: 0.0,
            elevation: 0.0,
            resolution: 9.54,
            x_offset_m,
            y_offset_m,
        }
    }

    #[test]
    fn test_dilation_grows_plus_shape() {
        // Single center pixel in a 7x7 mask.
        let mut mask = vec![false; 49];
        mask[3 * 7 + 3] = true;

        let once = dilate_plus(&mask, 7, 7, 1);
        assert_eq!(once.iter().filter(|&&b| b).count(), 5);
        assert!(once[2 * 7 + 3] && once[4 * 7 + 3] && once[3 * 7 + 2] && once[3 * 7 + 4]);
        // Diagonals untouched by the plus kernel.
        assert!(!once[2 * 7 + 2]);

        // Two iterations: the 13-pixel diamond.
        let twice = dilate_plus(&mask, 7, 7, 2);
        assert_eq!(twice.iter().filter(|&&b| b).count(), 13);
    }

    #[test]
    fn test_distribution_spans_corners() {
        let samples = vec![
            sample_at(0.0, 0.0),
            sample_at(100.0, 0.0),
            sample_at(0.0, 100.0),
            sample_at(100.0, 100.0),
        ];
        let img = render_distribution(&samples, 32, 24);
        assert_eq!(img.dimensions(), (32, 24));

        // Corner dots are present (dilated) and red.
        assert_eq!(img.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(31, 23).0, [255, 0, 0, 255]);
        // Middle is transparent.
        assert_eq!(img.get_pixel(16, 12).0[3], 0);
    }
}
