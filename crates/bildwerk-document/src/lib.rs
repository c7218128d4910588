// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// bildwerk-document — Layout and PDF generation for Bildwerk.
//
// Provides the geometry resolver and page compositor, the raster stage
// (decode, crop/rotate/flip, fax filter), input discovery with PDF page
// expansion, the `printpdf` emitter, and the async pipeline tying them together.

pub mod compose;
pub mod geometry;
pub mod image;
pub mod inputs;
pub mod pdf;
pub mod pipeline;
pub mod raster;
pub mod scan;

// Re-export the primary entry points so callers can use `bildwerk_document::layout` etc.
pub use compose::{LayoutSummary, layout, page_count};
pub use geometry::{ResolvedGeometry, resolve};
pub use image::processor::{ImageProcessor, probe};
pub use inputs::{InputSet, MagickRasterizer, PdfRasterizer, discover};
pub use pdf::reader::PdfInspector;
pub use pdf::writer::{EmitOptions, emit};
pub use pipeline::{ComposeInput, ComposedDocument, Composer};
pub use raster::{ImageRasterProcessor, RasterProcessor};
pub use scan::fax::fax_filter;
