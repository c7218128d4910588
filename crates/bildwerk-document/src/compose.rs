// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page compositor — decides page breaks, scale, and position for every image.
//
// Images flow top to bottom, each scaled to the available width (never
// taller than a page), separated by the configured spacing. An image that
// does not fit in what is left of the current page starts a new one. Images
// whose aspect ratio matches the page may be placed edge-to-edge on a page
// of their own.
//
// The layout is a pure fold over the input: the page cursor lives only inside
// `layout` and identical input always yields identical placements.

use bildwerk_core::error::Result;
use bildwerk_core::types::{ImageDescriptor, LayoutConfig, PagePlacement};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::geometry::resolve;

/// Assign a page, offset, and size to every image, in input order.
#[instrument(skip_all, fields(images = descriptors.len()))]
pub fn layout(descriptors: &[ImageDescriptor], config: &LayoutConfig) -> Result<Vec<PagePlacement>> {
    config.validate()?;
    let metrics = PageMetrics::new(config);

    let (placements, cursor) = descriptors.iter().enumerate().try_fold(
        (Vec::with_capacity(descriptors.len()), LayoutCursor::start(&metrics)),
        |(mut placements, cursor), (index, descriptor)| {
            let (next, placement) = cursor.place(&metrics, index, descriptor)?;
            placements.push(placement);
            Ok::<_, bildwerk_core::BildwerkError>((placements, next))
        },
    )?;

    info!(
        pages = cursor.pages_opened(),
        images = placements.len(),
        "Layout complete"
    );
    Ok(placements)
}

/// Number of pages a placement list spans.
pub fn page_count(placements: &[PagePlacement]) -> usize {
    placements
        .iter()
        .map(|placement| placement.page_index + 1)
        .max()
        .unwrap_or(0)
}

/// Totals of a finished layout, for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LayoutSummary {
    pub pages: usize,
    pub images: usize,
    pub full_page_images: usize,
}

impl LayoutSummary {
    pub fn of(placements: &[PagePlacement]) -> Self {
        Self {
            pages: page_count(placements),
            images: placements.len(),
            full_page_images: placements.iter().filter(|p| p.uses_full_page).count(),
        }
    }
}

// -- Fold state ---------------------------------------------------------------

/// Per-run constants derived once from the configuration.
#[derive(Debug, Clone, Copy)]
struct PageMetrics {
    full_width: f64,
    full_height: f64,
    available_width: f64,
    available_height: f64,
    page_aspect_ratio: f64,
    margin: f64,
    spacing: f64,
    tolerance: f64,
    omit_full_page_margin: bool,
}

impl PageMetrics {
    fn new(config: &LayoutConfig) -> Self {
        Self {
            full_width: config.full_page_width(),
            full_height: config.full_page_height(),
            available_width: config.available_width(),
            available_height: config.available_height(),
            page_aspect_ratio: config.page_aspect_ratio(),
            margin: config.margin_points,
            spacing: config.spacing_points,
            tolerance: config.full_page_tolerance,
            omit_full_page_margin: config.omit_full_page_margin,
        }
    }
}

/// Position of the flow on the current page.
#[derive(Debug, Clone, Copy)]
struct LayoutCursor {
    /// Page currently being filled; `None` until the first image is placed.
    page_index: Option<usize>,
    /// Top edge of the next image, in points from the top of the page.
    current_y: f64,
}

impl LayoutCursor {
    /// A cursor that reports the (non-existent) current page as full, so the
    /// first image always opens page 0.
    fn start(metrics: &PageMetrics) -> Self {
        Self {
            page_index: None,
            current_y: metrics.available_height,
        }
    }

    fn pages_opened(&self) -> usize {
        self.page_index.map_or(0, |index| index + 1)
    }

    fn place(
        self,
        metrics: &PageMetrics,
        index: usize,
        descriptor: &ImageDescriptor,
    ) -> Result<(Self, PagePlacement)> {
        let geometry = resolve(index, descriptor)?;
        let (width, height) = (
            geometry.effective_width as f64,
            geometry.effective_height as f64,
        );

        let aspect_ratio = geometry.aspect_ratio();
        let is_full_page = (aspect_ratio - metrics.page_aspect_ratio).abs() <= metrics.tolerance;
        let uses_full_page = metrics.omit_full_page_margin && is_full_page;

        let scaled_height = height * (metrics.available_width / width);
        let required_height = metrics.available_height.min(scaled_height).ceil();
        let required_width = metrics
            .available_width
            .min(required_height * width / height);

        let height_available = metrics.available_height - self.current_y;
        let starts_page =
            self.page_index.is_none() || uses_full_page || required_height > height_available;

        let (page_index, top) = if starts_page {
            (self.page_index.map_or(0, |current| current + 1), metrics.margin)
        } else {
            (self.page_index.unwrap_or(0), self.current_y)
        };

        let placement = if uses_full_page {
            PagePlacement {
                page_index,
                offset_x: 0.0,
                offset_y: 0.0,
                render_width: metrics.full_width,
                render_height: metrics.full_height,
                rotation_quadrant: geometry.rotation,
                flipped: geometry.flipped,
                uses_full_page: true,
            }
        } else {
            PagePlacement {
                page_index,
                offset_x: metrics.margin,
                offset_y: top,
                render_width: required_width,
                render_height: required_height,
                rotation_quadrant: geometry.rotation,
                flipped: geometry.flipped,
                uses_full_page: false,
            }
        };

        // An edge-to-edge image owns its page. Advancing by its height alone
        // would stack the next image on top of it.
        let current_y = if uses_full_page {
            metrics.available_height
        } else {
            top + required_height + metrics.spacing
        };

        debug!(
            index,
            source = %descriptor.source.display_name(),
            width = geometry.effective_width,
            height = geometry.effective_height,
            page = page_index,
            y = placement.offset_y,
            render_width = placement.render_width,
            render_height = placement.render_height,
            starts_page,
            uses_full_page,
            "Placed image"
        );

        Ok((
            Self {
                page_index: Some(page_index),
                current_y,
            },
            placement,
        ))
    }
}
