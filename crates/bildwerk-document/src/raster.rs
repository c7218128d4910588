// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raster stage — turns one input plus its user edit into a pixel buffer.

use bildwerk_core::error::Result;
use bildwerk_core::types::{PixelBuffer, SourceRef, UserTransform};
use tracing::instrument;

use crate::image::processor::ImageProcessor;

/// Materializes one image with its user edit baked in.
///
/// Implementations must be callable from several worker threads at once.
/// Errors carry index 0; the caller re-tags them with the input position.
/// The EXIF orientation is not applied to the pixels; it is reported in
/// [`PixelBuffer::residual_orientation`].
pub trait RasterProcessor: Send + Sync {
    fn process(
        &self,
        source: &SourceRef,
        transform: &UserTransform,
        fax: bool,
    ) -> Result<PixelBuffer>;
}

/// In-process raster processor built on the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageRasterProcessor;

impl RasterProcessor for ImageRasterProcessor {
    #[instrument(skip_all, fields(source = %source.display_name(), fax))]
    fn process(
        &self,
        source: &SourceRef,
        transform: &UserTransform,
        fax: bool,
    ) -> Result<PixelBuffer> {
        Ok(ImageProcessor::from_source(source)?
            .apply(transform)?
            .into_buffer(*transform, fax))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bildwerk_core::error::BildwerkError;

    #[test]
    fn missing_file_is_unsupported_input() {
        let err = ImageRasterProcessor
            .process(
                &SourceRef::from_path("/definitely/not/here.png"),
                &UserTransform::identity(),
                false,
            )
            .unwrap_err();
        assert!(matches!(err, BildwerkError::UnsupportedInput { .. }));
    }

    #[test]
    fn processor_is_usable_as_a_trait_object() {
        let boxed: Box<dyn RasterProcessor> = Box::new(ImageRasterProcessor);
        let err = boxed
            .process(
                &SourceRef::from_bytes("empty.png", Vec::<u8>::new()),
                &UserTransform::identity(),
                true,
            )
            .unwrap_err();
        assert_eq!(err.image_index(), Some(0));
    }
}
