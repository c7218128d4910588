// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Bildwerk image-to-PDF composer.
//
// All lengths on the page are PostScript points (1/72 inch) with a top-left
// origin; all lengths inside an image are pixels.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{BildwerkError, Result};

/// Aspect-ratio tolerance for treating an image as "full page".
pub const DEFAULT_FULL_PAGE_TOLERANCE: f64 = 0.05;

/// Tolerance used by earlier releases; still selectable through the config.
pub const LEGACY_FULL_PAGE_TOLERANCE: f64 = 0.02;

/// MIME type of every document Bildwerk produces.
pub const PDF_MIME_TYPE: &str = "application/pdf";

/// Unique identifier for one generation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// -- Sources ------------------------------------------------------------------

/// Where the pixels of one input come from. Owned by the caller; the core only
/// ever reads through it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRef {
    /// An encoded image file on disk.
    Path(PathBuf),
    /// An encoded image already in memory (e.g. pasted or downloaded).
    Memory { name: String, bytes: Arc<[u8]> },
}

impl SourceRef {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self::Memory {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Short human-readable name used in logs and error messages.
    pub fn display_name(&self) -> String {
        match self {
            Self::Path(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            Self::Memory { name, .. } => name.clone(),
        }
    }

    /// Filesystem path, if this source lives on disk.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Path(path) => Some(path),
            Self::Memory { .. } => None,
        }
    }
}

// -- Orientation --------------------------------------------------------------

/// Clockwise rotation in quarter turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    None,
    Clockwise90,
    Clockwise180,
    Clockwise270,
}

impl Rotation {
    pub fn degrees(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Clockwise90 => 90,
            Self::Clockwise180 => 180,
            Self::Clockwise270 => 270,
        }
    }

    /// Parse any multiple of 90 (negative values rotate counter-clockwise).
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        if degrees % 90 != 0 {
            return None;
        }
        match degrees.rem_euclid(360) {
            0 => Some(Self::None),
            90 => Some(Self::Clockwise90),
            180 => Some(Self::Clockwise180),
            270 => Some(Self::Clockwise270),
            _ => None,
        }
    }

    /// Whether this rotation exchanges width and height.
    pub fn swaps_axes(self) -> bool {
        matches!(self, Self::Clockwise90 | Self::Clockwise270)
    }
}

/// EXIF orientation tag (0x0112): how the stored pixels must be transformed to
/// display upright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExifOrientation {
    /// 1: stored upright.
    #[default]
    Normal,
    /// 2: mirrored left to right.
    MirrorHorizontal,
    /// 3: upside down.
    Rotate180,
    /// 4: mirrored top to bottom.
    MirrorVertical,
    /// 5: mirrored, then rotated 270° clockwise (reflection on the main diagonal).
    Transpose,
    /// 6: rotate 90° clockwise to display.
    Rotate90,
    /// 7: mirrored, then rotated 90° clockwise (reflection on the anti-diagonal).
    Transverse,
    /// 8: rotate 270° clockwise to display.
    Rotate270,
}

impl ExifOrientation {
    /// Map a raw tag value. Anything outside 1..=8 is treated as upright.
    pub fn from_exif(value: u32) -> Self {
        match value {
            2 => Self::MirrorHorizontal,
            3 => Self::Rotate180,
            4 => Self::MirrorVertical,
            5 => Self::Transpose,
            6 => Self::Rotate90,
            7 => Self::Transverse,
            8 => Self::Rotate270,
            _ => Self::Normal,
        }
    }

    pub fn to_exif(self) -> u32 {
        match self {
            Self::Normal => 1,
            Self::MirrorHorizontal => 2,
            Self::Rotate180 => 3,
            Self::MirrorVertical => 4,
            Self::Transpose => 5,
            Self::Rotate90 => 6,
            Self::Transverse => 7,
            Self::Rotate270 => 8,
        }
    }

    /// Whether displaying this image exchanges its width and height.
    pub fn swaps_axes(self) -> bool {
        matches!(
            self,
            Self::Transpose | Self::Rotate90 | Self::Transverse | Self::Rotate270
        )
    }

    /// Net clockwise rotation still owed at placement time.
    ///
    /// Mirrored variants decompose as a left-to-right mirror of the stored
    /// pixels followed by this rotation; the mirror is reported by
    /// [`ExifOrientation::is_mirrored`].
    pub fn rotation(self) -> Rotation {
        match self {
            Self::Normal | Self::MirrorHorizontal => Rotation::None,
            Self::Rotate180 | Self::MirrorVertical => Rotation::Clockwise180,
            Self::Rotate90 | Self::Transverse => Rotation::Clockwise90,
            Self::Rotate270 | Self::Transpose => Rotation::Clockwise270,
        }
    }

    pub fn is_mirrored(self) -> bool {
        matches!(
            self,
            Self::MirrorHorizontal | Self::MirrorVertical | Self::Transpose | Self::Transverse
        )
    }
}

// -- User edits ---------------------------------------------------------------

/// Crop rectangle in pixels, measured on the image after rotation and scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Largest image, in pixels, an edit may enlarge to (about 800 MB as RGB).
pub const MAX_EDITED_PIXELS: u64 = 1 << 28;

/// The crop/rotate/flip edit a user made to one image.
///
/// Applied in the order rotate, scale, crop. Negative scale factors mirror the
/// image along that axis; their magnitude zooms it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UserTransform {
    pub rotation_degrees: i32,
    pub scale_x: f64,
    pub scale_y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop: Option<CropRegion>,
}

impl Default for UserTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl UserTransform {
    pub const fn identity() -> Self {
        Self {
            rotation_degrees: 0,
            scale_x: 1.0,
            scale_y: 1.0,
            crop: None,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.rotation_degrees.rem_euclid(360) == 0
            && self.scale_x == 1.0
            && self.scale_y == 1.0
            && self.crop.is_none()
    }

    pub fn rotation(&self) -> std::result::Result<Rotation, String> {
        Rotation::from_degrees(self.rotation_degrees).ok_or_else(|| {
            format!(
                "rotation must be a multiple of 90 degrees, got {}",
                self.rotation_degrees
            )
        })
    }

    pub fn flips_horizontally(&self) -> bool {
        self.scale_x < 0.0
    }

    pub fn flips_vertically(&self) -> bool {
        self.scale_y < 0.0
    }

    /// Size of an image of `width` x `height` after rotation and scaling, but
    /// before cropping.
    pub fn scaled_size(&self, width: u32, height: u32) -> std::result::Result<(u32, u32), String> {
        for (axis, factor) in [("x", self.scale_x), ("y", self.scale_y)] {
            if !factor.is_finite() || factor == 0.0 {
                return Err(format!("scale_{axis} must be finite and non-zero, got {factor}"));
            }
        }

        let (w, h) = if self.rotation()?.swaps_axes() {
            (height, width)
        } else {
            (width, height)
        };
        let scaled_w = (w as f64 * self.scale_x.abs()).round();
        let scaled_h = (h as f64 * self.scale_y.abs()).round();
        if scaled_w < 1.0 || scaled_h < 1.0 {
            return Err(format!(
                "scaling {w}x{h} by {}x{} leaves no pixels",
                self.scale_x, self.scale_y
            ));
        }
        // Only an enlarging edit is held to the cap; the source already decoded.
        let limit = (MAX_EDITED_PIXELS as f64).max(w as f64 * h as f64);
        let too_wide = scaled_w.max(scaled_h) > u32::MAX as f64;
        if too_wide || scaled_w * scaled_h > limit {
            return Err(format!(
                "scaling {w}x{h} by {}x{} gives {scaled_w}x{scaled_h}, more than {MAX_EDITED_PIXELS} pixels",
                self.scale_x, self.scale_y
            ));
        }
        Ok((scaled_w as u32, scaled_h as u32))
    }

    /// Final size after the whole edit, checking that the crop lies inside the
    /// rotated and scaled image.
    pub fn output_size(&self, width: u32, height: u32) -> std::result::Result<(u32, u32), String> {
        let (scaled_w, scaled_h) = self.scaled_size(width, height)?;
        match self.crop {
            None => Ok((scaled_w, scaled_h)),
            Some(crop) => {
                let inside = crop.width > 0
                    && crop.height > 0
                    && crop.x as u64 + crop.width as u64 <= scaled_w as u64
                    && crop.y as u64 + crop.height as u64 <= scaled_h as u64;
                if inside {
                    Ok((crop.width, crop.height))
                } else {
                    Err(format!(
                        "crop {}x{}+{}+{} lies outside the {}x{} edited image",
                        crop.width, crop.height, crop.x, crop.y, scaled_w, scaled_h
                    ))
                }
            }
        }
    }
}

// -- Descriptors --------------------------------------------------------------

/// One page-producing unit handed to the layout engine.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageDescriptor {
    pub source: SourceRef,
    /// Width in pixels, as stored in the file.
    pub intrinsic_width: u32,
    /// Height in pixels, as stored in the file.
    pub intrinsic_height: u32,
    pub exif_orientation: ExifOrientation,
    pub user_transform: UserTransform,
}

impl ImageDescriptor {
    pub fn new(source: SourceRef, intrinsic_width: u32, intrinsic_height: u32) -> Self {
        Self {
            source,
            intrinsic_width,
            intrinsic_height,
            exif_orientation: ExifOrientation::Normal,
            user_transform: UserTransform::identity(),
        }
    }

    pub fn with_exif_orientation(mut self, orientation: ExifOrientation) -> Self {
        self.exif_orientation = orientation;
        self
    }

    pub fn with_user_transform(mut self, transform: UserTransform) -> Self {
        self.user_transform = transform;
        self
    }

    /// Descriptor of the materialized pixels: the buffer's own dimensions, the
    /// EXIF orientation that survived the raster step, and the user edit that
    /// is now baked in.
    pub fn from_buffer(source: SourceRef, buffer: &PixelBuffer) -> Self {
        Self {
            source,
            intrinsic_width: buffer.width,
            intrinsic_height: buffer.height,
            exif_orientation: buffer.residual_orientation,
            user_transform: buffer.baked_transform,
        }
    }
}

// -- Pixel buffers ------------------------------------------------------------

/// Channel layout of a materialized buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit RGB, three bytes per pixel.
    Rgb8,
    /// 8-bit grey, one byte per pixel.
    Luma8,
}

impl PixelFormat {
    pub fn channels(self) -> usize {
        match self {
            Self::Rgb8 => 3,
            Self::Luma8 => 1,
        }
    }
}

/// Output of the raster step: pixels with the user edit baked in.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub pixels: Vec<u8>,
    /// EXIF orientation not applied to `pixels`; corrected at placement time.
    pub residual_orientation: ExifOrientation,
    /// The user edit already applied to `pixels`.
    pub baked_transform: UserTransform,
    /// Whether `pixels` went through the fax filter.
    pub fax: bool,
}

impl PixelBuffer {
    /// Number of bytes `pixels` must hold for the declared size and format.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.channels()
    }
}

// -- Page geometry ------------------------------------------------------------

/// Supported output page sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSize {
    A4,
    Letter,
}

impl PageSize {
    /// Portrait dimensions in points (width, height).
    pub fn dimensions_pt(self) -> (f64, f64) {
        match self {
            Self::A4 => (595.28, 841.89),
            Self::Letter => (612.0, 792.0),
        }
    }
}

/// Page orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    Portrait,
    Landscape,
}

/// Layout options for one generation run.
///
/// Deliberately has no `Default`: every run states its full configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub page_size: PageSize,
    pub orientation: Orientation,
    pub margin_points: f64,
    pub spacing_points: f64,
    /// Place images matching the page aspect ratio edge-to-edge.
    pub omit_full_page_margin: bool,
    /// Replace every image with its bilevel fax rendition before embedding.
    pub optimize_for_fax: bool,
    /// Maximum |image aspect - page aspect| for an image to count as full page.
    pub full_page_tolerance: f64,
}

impl LayoutConfig {
    /// Page width in points after orientation.
    pub fn full_page_width(&self) -> f64 {
        self.page_dimensions().0
    }

    /// Page height in points after orientation.
    pub fn full_page_height(&self) -> f64 {
        self.page_dimensions().1
    }

    fn page_dimensions(&self) -> (f64, f64) {
        let (w, h) = self.page_size.dimensions_pt();
        match self.orientation {
            Orientation::Portrait => (w, h),
            Orientation::Landscape => (h, w),
        }
    }

    pub fn available_width(&self) -> f64 {
        self.full_page_width() - 2.0 * self.margin_points
    }

    pub fn available_height(&self) -> f64 {
        self.full_page_height() - 2.0 * self.margin_points
    }

    /// Height over width of the full page.
    pub fn page_aspect_ratio(&self) -> f64 {
        self.full_page_height() / self.full_page_width()
    }

    /// Reject configurations the layout engine cannot honour.
    pub fn validate(&self) -> Result<()> {
        let non_negative = [
            ("margin_points", self.margin_points),
            ("spacing_points", self.spacing_points),
            ("full_page_tolerance", self.full_page_tolerance),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(BildwerkError::InvalidConfig(format!(
                    "{name} must be a finite, non-negative number (got {value})"
                )));
            }
        }

        if self.available_width() <= 0.0 || self.available_height() <= 0.0 {
            return Err(BildwerkError::InvalidConfig(format!(
                "margin of {} pt leaves no printable area on a {:.2} x {:.2} pt page",
                self.margin_points,
                self.full_page_width(),
                self.full_page_height()
            )));
        }

        Ok(())
    }
}

/// Where one image lands in the output document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PagePlacement {
    /// 0-based output page.
    pub page_index: usize,
    /// Distance from the left page edge, in points.
    pub offset_x: f64,
    /// Distance from the top page edge, in points.
    pub offset_y: f64,
    pub render_width: f64,
    pub render_height: f64,
    /// Clockwise rotation still owed to the stored pixels (from EXIF), applied
    /// when drawing.
    pub rotation_quadrant: Rotation,
    /// Mirror the stored pixels left to right before applying
    /// `rotation_quadrant`.
    pub flipped: bool,
    pub uses_full_page: bool,
}
