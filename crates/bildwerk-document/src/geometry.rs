// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Geometry resolver — the oriented size of one image as it will appear on the
// page.
//
// The user's crop/rotate/flip edit is already baked into the pixels by the
// raster step, so only the EXIF orientation that survived into the stored
// pixels is resolved here.

use bildwerk_core::error::{BildwerkError, Result};
use bildwerk_core::types::{ImageDescriptor, Rotation};

/// Oriented size of an image and the correction still owed when drawing it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedGeometry {
    /// Width in pixels as displayed.
    pub effective_width: u32,
    /// Height in pixels as displayed.
    pub effective_height: u32,
    /// True when EXIF demands a quarter turn, so stored width and height are
    /// exchanged on the page.
    pub is_effectively_rotated: bool,
    pub rotation: Rotation,
    pub flipped: bool,
}

impl ResolvedGeometry {
    /// Height over width.
    pub fn aspect_ratio(&self) -> f64 {
        self.effective_height as f64 / self.effective_width as f64
    }
}

/// Resolve the displayed geometry of the image at position `index`.
pub fn resolve(index: usize, descriptor: &ImageDescriptor) -> Result<ResolvedGeometry> {
    let (width, height) = (descriptor.intrinsic_width, descriptor.intrinsic_height);
    if width == 0 || height == 0 {
        return Err(BildwerkError::InvalidDimensions {
            index,
            source_name: descriptor.source.display_name(),
            width,
            height,
        });
    }

    let orientation = descriptor.exif_orientation;
    let swapped = orientation.swaps_axes();
    let (effective_width, effective_height) = if swapped {
        (height, width)
    } else {
        (width, height)
    };

    Ok(ResolvedGeometry {
        effective_width,
        effective_height,
        is_effectively_rotated: swapped,
        rotation: orientation.rotation(),
        flipped: orientation.is_mirrored(),
    })
}
