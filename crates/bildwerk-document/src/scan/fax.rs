// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Fax filter — reduces a photo or scan to a clean black-and-white rendition
// that survives fax transmission.
//
// Pipeline:
//   1. Grayscale
//   2. Flat-field: divide every pixel by a Gaussian-blurred copy, which removes
//      uneven lighting and paper tint
//   3. Normalize the result to the full 0..255 range
//   4. Threshold at 80 %: bright pixels become white, everything else black

use image::{DynamicImage, GrayImage, Luma};
use imageproc::filter::gaussian_blur_f32;
use tracing::{debug, instrument};

/// Standard deviation of the background estimate.
pub const FAX_BLUR_SIGMA: f32 = 5.0;

/// Fraction of full scale at or above which a normalized pixel turns white.
pub const FAX_THRESHOLD: f32 = 0.8;

/// Ratio spread below which an image is treated as flat.
const MIN_CONTRAST: f32 = 0.02;

/// Produce the bilevel fax rendition of `image`. Every output pixel is 0 or 255.
#[instrument(skip_all, fields(width = image.width(), height = image.height()))]
pub fn fax_filter(image: &DynamicImage) -> GrayImage {
    let gray = image.to_luma8();
    let background = gaussian_blur_f32(&gray, FAX_BLUR_SIGMA);

    let ratios: Vec<f32> = gray
        .pixels()
        .zip(background.pixels())
        .map(|(pixel, blurred)| flat_field(pixel.0[0], blurred.0[0]))
        .collect();

    let (low, high) = ratios
        .iter()
        .fold((f32::MAX, f32::MIN), |(lo, hi), &r| (lo.min(r), hi.max(r)));
    let range = high - low;

    let (width, height) = gray.dimensions();
    let output = GrayImage::from_fn(width, height, |x, y| {
        let ratio = ratios[(y * width + x) as usize];
        // A flat image has nothing to separate; treat it as blank paper.
        let normalized = if range > MIN_CONTRAST {
            (ratio - low) / range
        } else {
            1.0
        };
        if normalized >= FAX_THRESHOLD {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    });

    debug!(low, high, "Fax filter applied");
    output
}

/// Pixel over its local background, clamped to 1.0 (pure white).
fn flat_field(pixel: u8, background: u8) -> f32 {
    if background == 0 {
        return 1.0;
    }
    (pixel as f32 / background as f32).min(1.0)
}
