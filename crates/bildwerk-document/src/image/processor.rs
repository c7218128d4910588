// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor — decode, apply a user edit (rotate, scale/flip, crop), and
// hand back raw pixels. Operates on in-memory images using the `image` and
// `imageproc` crates; EXIF orientation is read with `kamadak-exif`.

use std::io::Cursor;

use bildwerk_core::error::{BildwerkError, Result};
use bildwerk_core::types::{
    CropRegion, ExifOrientation, ImageDescriptor, PixelBuffer, PixelFormat, Rotation, SourceRef,
    UserTransform,
};
use image::{DynamicImage, ImageReader};
use tracing::{debug, info, instrument};

use crate::scan::fax::fax_filter;

/// Image processing pipeline operating on a single in-memory image.
///
/// Each method consumes `self` and returns a new `ImageProcessor` wrapping the
/// transformed image, enabling method chaining:
///
/// ```ignore
/// let buffer = ImageProcessor::from_source(&source)?
///     .rotate(Rotation::Clockwise90)
///     .scale(-1.0, 1.0)?
///     .crop(region)?
///     .into_buffer(false);
/// ```
pub struct ImageProcessor {
    /// The current working image.
    image: DynamicImage,
    /// Display name of the source, for error messages.
    source_name: String,
    /// EXIF orientation of the source file, carried through untouched.
    orientation: ExifOrientation,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Decode the image behind `source` and read its EXIF orientation.
    #[instrument(skip_all, fields(source = %source.display_name()))]
    pub fn from_source(source: &SourceRef) -> Result<Self> {
        let bytes = source_bytes(source)?;
        let image = image::load_from_memory(&bytes).map_err(|err| unsupported(source, err))?;
        let orientation = read_exif_orientation(&bytes);
        info!(
            width = image.width(),
            height = image.height(),
            orientation = orientation.to_exif(),
            "Image decoded"
        );
        Ok(Self {
            image,
            source_name: source.display_name(),
            orientation,
        })
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    // -- Transformations (consume self, return new Self) -----------------------

    /// Apply a whole user edit in its fixed order: rotate, scale, crop.
    #[instrument(skip(self), fields(source = %self.source_name))]
    pub fn apply(self, transform: &UserTransform) -> Result<Self> {
        if transform.is_identity() {
            return Ok(self);
        }
        // Validate the full edit against the source size before touching pixels.
        transform
            .output_size(self.width(), self.height())
            .map_err(|reason| self.invalid(reason))?;
        let rotation = transform.rotation().map_err(|reason| self.invalid(reason))?;

        let processor = self.rotate(rotation).scale(transform.scale_x, transform.scale_y)?;
        match transform.crop {
            Some(region) => processor.crop(region),
            None => Ok(processor),
        }
    }

    /// Lossless clockwise quarter-turn rotation.
    pub fn rotate(self, rotation: Rotation) -> Self {
        let image = match rotation {
            Rotation::None => return self,
            Rotation::Clockwise90 => self.image.rotate90(),
            Rotation::Clockwise180 => self.image.rotate180(),
            Rotation::Clockwise270 => self.image.rotate270(),
        };
        debug!(degrees = rotation.degrees(), "Rotated");
        Self { image, ..self }
    }

    /// Resize by the magnitude of each factor; a negative factor also mirrors
    /// along that axis.
    pub fn scale(self, scale_x: f64, scale_y: f64) -> Result<Self> {
        let scaling = UserTransform {
            scale_x,
            scale_y,
            ..UserTransform::identity()
        };
        let (width, height) = scaling
            .scaled_size(self.width(), self.height())
            .map_err(|reason| self.invalid(reason))?;

        let mut image = self.image;
        if (width, height) != (image.width(), image.height()) {
            image = image.resize_exact(width, height, image::imageops::FilterType::Lanczos3);
        }
        if scaling.flips_horizontally() {
            image = image.fliph();
        }
        if scaling.flips_vertically() {
            image = image.flipv();
        }
        debug!(width, height, scale_x, scale_y, "Scaled");
        Ok(Self { image, ..self })
    }

    /// Cut out `region`, which must lie entirely inside the current image.
    pub fn crop(self, region: CropRegion) -> Result<Self> {
        let inside = region.width > 0
            && region.height > 0
            && region.x as u64 + region.width as u64 <= self.width() as u64
            && region.y as u64 + region.height as u64 <= self.height() as u64;
        if !inside {
            let reason = format!(
                "crop {}x{}+{}+{} lies outside the {}x{} image",
                region.width,
                region.height,
                region.x,
                region.y,
                self.width(),
                self.height()
            );
            return Err(self.invalid(reason));
        }
        let image = self
            .image
            .crop_imm(region.x, region.y, region.width, region.height);
        debug!(width = region.width, height = region.height, "Cropped");
        Ok(Self { image, ..self })
    }

    // -- Output ---------------------------------------------------------------

    /// Hand back raw pixels, through the fax filter when `fax` is set.
    pub fn into_buffer(self, transform: UserTransform, fax: bool) -> PixelBuffer {
        let (width, height) = (self.width(), self.height());
        let (format, pixels) = if fax {
            (PixelFormat::Luma8, fax_filter(&self.image).into_raw())
        } else {
            (PixelFormat::Rgb8, self.image.to_rgb8().into_raw())
        };
        PixelBuffer {
            width,
            height,
            format,
            pixels,
            residual_orientation: self.orientation,
            baked_transform: transform,
            fax,
        }
    }

    fn invalid(&self, reason: String) -> BildwerkError {
        BildwerkError::InvalidTransform {
            index: 0,
            source_name: self.source_name.clone(),
            reason,
        }
    }
}

// -- Probing ------------------------------------------------------------------

/// Read dimensions and EXIF orientation without decoding pixel data.
#[instrument(skip_all, fields(source = %source.display_name()))]
pub fn probe(source: &SourceRef) -> Result<ImageDescriptor> {
    let bytes = source_bytes(source)?;
    let (width, height) = ImageReader::new(Cursor::new(&bytes))
        .with_guessed_format()
        .map_err(|err| unsupported(source, err))?
        .into_dimensions()
        .map_err(|err| unsupported(source, err))?;
    let orientation = read_exif_orientation(&bytes);
    debug!(width, height, orientation = orientation.to_exif(), "Probed");
    Ok(ImageDescriptor::new(source.clone(), width, height).with_exif_orientation(orientation))
}

/// EXIF orientation tag of an encoded image; upright when absent.
pub fn read_exif_orientation(bytes: &[u8]) -> ExifOrientation {
    let mut cursor = Cursor::new(bytes);
    let Ok(exif) = exif::Reader::new().read_from_container(&mut cursor) else {
        return ExifOrientation::Normal;
    };
    let value = exif
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
        .unwrap_or(1);
    ExifOrientation::from_exif(value)
}

fn source_bytes(source: &SourceRef) -> Result<Vec<u8>> {
    match source {
        SourceRef::Path(path) => std::fs::read(path).map_err(|err| unsupported(source, err)),
        SourceRef::Memory { bytes, .. } => Ok(bytes.to_vec()),
    }
}

fn unsupported(source: &SourceRef, err: impl std::fmt::Display) -> BildwerkError {
    BildwerkError::UnsupportedInput {
        index: 0,
        source_name: source.display_name(),
        reason: err.to_string(),
    }
}
