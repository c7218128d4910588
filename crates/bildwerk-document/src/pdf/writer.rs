// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF writer — turns materialized pixel buffers and their placements into PDF
// bytes using `printpdf` 0.8.
//
// printpdf 0.8 uses a data-oriented API: documents are built by constructing
// `PdfPage` structs containing `Vec<Op>` operation lists, then serialised via
// `PdfDocument::save()`.
//
// Every image is drawn at unit size inside a save/transform/restore block. The
// transformation matrix maps that unit square onto the placement rectangle and
// folds in whatever EXIF rotation and mirroring the stored pixels still need.

use bildwerk_core::error::{BildwerkError, Result};
use bildwerk_core::types::{LayoutConfig, PagePlacement, PixelBuffer, PixelFormat, Rotation};
use printpdf::{
    CurTransMat, Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, RawImage,
    RawImageData, RawImageFormat, XObjectTransform,
};
use tracing::{debug, info, instrument, warn};

const MM_PER_PT: f64 = 25.4 / 72.0;

/// Document-level settings that do not affect layout.
#[derive(Debug, Clone)]
pub struct EmitOptions {
    /// Title metadata embedded in the PDF /Info dictionary.
    pub title: String,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            title: "Bildwerk Document".into(),
        }
    }
}

/// Render `buffers[i]` at `placements[i]` and serialise the document.
///
/// Pages are opened as the placement page index advances; placements must
/// therefore be ordered with contiguous page indices starting at 0, which is
/// what the compositor produces.
#[instrument(skip_all, fields(images = buffers.len(), title = %options.title))]
pub fn emit(
    buffers: &[PixelBuffer],
    placements: &[PagePlacement],
    config: &LayoutConfig,
    options: &EmitOptions,
) -> Result<Vec<u8>> {
    if buffers.len() != placements.len() {
        return Err(BildwerkError::EmissionFailure(format!(
            "{} buffers but {} placements",
            buffers.len(),
            placements.len()
        )));
    }
    if buffers.is_empty() {
        return Err(BildwerkError::EmissionFailure("nothing to emit".into()));
    }

    let page_width = config.full_page_width();
    let page_height = config.full_page_height();
    let (media_w, media_h) = (points_to_mm(page_width), points_to_mm(page_height));

    let mut doc = PdfDocument::new(&options.title);
    let mut pages: Vec<PdfPage> = Vec::new();
    let mut ops: Vec<Op> = Vec::new();
    let mut open_page: Option<usize> = None;

    for (index, (buffer, placement)) in buffers.iter().zip(placements).enumerate() {
        match open_page {
            Some(current) if current == placement.page_index => {}
            Some(current) if current + 1 == placement.page_index => {
                pages.push(PdfPage::new(media_w, media_h, std::mem::take(&mut ops)));
                open_page = Some(placement.page_index);
            }
            None if placement.page_index == 0 => open_page = Some(0),
            _ => {
                return Err(BildwerkError::EmissionFailure(format!(
                    "image #{index} is placed on page {} after page {:?}",
                    placement.page_index, open_page
                )));
            }
        }

        let raw = raw_image(index, buffer)?;
        let xobject_id = doc.add_image(&raw);

        let matrix = placement_matrix(placement, page_height);
        ops.push(Op::SaveGraphicsState);
        ops.push(Op::SetTransformationMatrix {
            matrix: CurTransMat::Raw(matrix),
        });
        // Draw the image as a 1 x 1 pt square; the matrix above sizes it.
        ops.push(Op::UseXobject {
            id: xobject_id,
            transform: XObjectTransform {
                translate_x: None,
                translate_y: None,
                scale_x: Some(1.0 / buffer.width as f32),
                scale_y: Some(1.0 / buffer.height as f32),
                dpi: Some(72.0),
                rotate: None,
            },
        });
        ops.push(Op::RestoreGraphicsState);

        debug!(
            index,
            page = placement.page_index,
            width = buffer.width,
            height = buffer.height,
            rotation = placement.rotation_quadrant.degrees(),
            flipped = placement.flipped,
            fax = buffer.fax,
            "Image drawn"
        );
    }
    pages.push(PdfPage::new(media_w, media_h, ops));

    let page_count = pages.len();
    doc.with_pages(pages);

    let mut warnings: Vec<PdfWarnMsg> = Vec::new();
    let output = doc.save(&PdfSaveOptions::default(), &mut warnings);
    for warning in &warnings {
        warn!(?warning, "PDF serialisation warning");
    }

    info!(pages = page_count, bytes = output.len(), "PDF emitted");
    Ok(output)
}

fn points_to_mm(points: f64) -> Mm {
    Mm((points * MM_PER_PT) as f32)
}

/// Wrap a buffer's pixels for embedding: fax output as grey, the rest as RGB.
fn raw_image(index: usize, buffer: &PixelBuffer) -> Result<RawImage> {
    if buffer.width == 0 || buffer.height == 0 || buffer.pixels.len() != buffer.expected_len() {
        return Err(BildwerkError::EmissionFailure(format!(
            "image #{index} buffer holds {} bytes for {}x{} {:?}",
            buffer.pixels.len(),
            buffer.width,
            buffer.height,
            buffer.format
        )));
    }

    let data_format = match buffer.format {
        PixelFormat::Rgb8 => RawImageFormat::RGB8,
        PixelFormat::Luma8 => RawImageFormat::R8,
    };

    Ok(RawImage {
        pixels: RawImageData::U8(buffer.pixels.clone()),
        width: buffer.width as usize,
        height: buffer.height as usize,
        data_format,
        tag: Vec::new(),
    })
}

/// Affine map `(x, y) = (α·u + β·v + γ, δ·u + ε·v + ζ)` over the unit square,
/// in PDF's y-up orientation.
#[derive(Debug, Clone, Copy, PartialEq)]
struct UnitMap {
    alpha: f64,
    beta: f64,
    gamma: f64,
    delta: f64,
    epsilon: f64,
    zeta: f64,
}

impl UnitMap {
    /// Where stored pixel coordinates `(u, v)` land once the displayed image
    /// has been mirrored left-to-right and then turned clockwise.
    fn for_orientation(rotation: Rotation, flipped: bool) -> Self {
        let (alpha, beta, gamma, delta, epsilon, zeta) = match rotation {
            Rotation::None => (1.0, 0.0, 0.0, 0.0, 1.0, 0.0),
            Rotation::Clockwise90 => (0.0, 1.0, 0.0, -1.0, 0.0, 1.0),
            Rotation::Clockwise180 => (-1.0, 0.0, 1.0, 0.0, -1.0, 1.0),
            Rotation::Clockwise270 => (0.0, -1.0, 1.0, 1.0, 0.0, 0.0),
        };
        let map = Self {
            alpha,
            beta,
            gamma,
            delta,
            epsilon,
            zeta,
        };
        if flipped { map.mirrored() } else { map }
    }

    /// Substitute `u -> 1 - u`, mirroring the source before the map applies.
    fn mirrored(self) -> Self {
        Self {
            alpha: -self.alpha,
            gamma: self.gamma + self.alpha,
            delta: -self.delta,
            zeta: self.zeta + self.delta,
            ..self
        }
    }
}

/// The `cm` operands that draw a unit-size image into `placement`.
fn placement_matrix(placement: &PagePlacement, page_height: f64) -> [f32; 6] {
    let map = UnitMap::for_orientation(placement.rotation_quadrant, placement.flipped);
    let (w, h) = (placement.render_width, placement.render_height);
    let x0 = placement.offset_x;
    let y0 = page_height - placement.offset_y - h;

    [
        (w * map.alpha) as f32,
        (h * map.delta) as f32,
        (w * map.beta) as f32,
        (h * map.epsilon) as f32,
        (x0 + w * map.gamma) as f32,
        (y0 + h * map.zeta) as f32,
    ]
}
