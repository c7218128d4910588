// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Composition pipeline — raster, layout, emit.
//
//   inputs ──▶ raster (parallel, bounded) ──▶ layout ──▶ emit ──▶ PDF bytes
//
// Only the raster stage runs concurrently, through a window of at most
// `pool_size` workers; its results are consumed in input order so layout and
// emission see the images exactly as the user listed them. The first failure
// aborts the run and no further input is started. A run cancelled at any point
// before emission produces no bytes.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

use bildwerk_core::error::{BildwerkError, Result};
use bildwerk_core::types::{
    ImageDescriptor, LayoutConfig, PDF_MIME_TYPE, PagePlacement, PixelBuffer, RunId, SourceRef,
    UserTransform,
};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::compose::{LayoutSummary, layout, page_count};
use crate::image::processor::probe;
use crate::pdf::writer::{EmitOptions, emit};
use crate::raster::RasterProcessor;

/// One image to compose, with the edit the user made to it.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposeInput {
    pub source: SourceRef,
    pub transform: UserTransform,
}

impl ComposeInput {
    pub fn new(source: SourceRef) -> Self {
        Self {
            source,
            transform: UserTransform::identity(),
        }
    }

    pub fn with_transform(mut self, transform: UserTransform) -> Self {
        self.transform = transform;
        self
    }
}

/// The finished PDF together with the layout that produced it.
#[derive(Debug, Clone)]
pub struct ComposedDocument {
    pub run_id: RunId,
    pub created_at: DateTime<Utc>,
    pub bytes: Vec<u8>,
    /// Hex SHA-256 of `bytes`.
    pub document_hash: String,
    pub placements: Vec<PagePlacement>,
    pub page_count: usize,
}

impl ComposedDocument {
    pub const MIME_TYPE: &'static str = PDF_MIME_TYPE;

    pub fn summary(&self) -> LayoutSummary {
        LayoutSummary::of(&self.placements)
    }

    /// Write the PDF bytes to `path`.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path.as_ref(), &self.bytes)?;
        info!(
            run = %self.run_id,
            path = %path.as_ref().display(),
            bytes = self.bytes.len(),
            "PDF written"
        );
        Ok(())
    }
}

/// Runs whole compositions with a shared raster processor.
pub struct Composer {
    processor: Arc<dyn RasterProcessor>,
    pool_size: usize,
    emit_options: EmitOptions,
}

impl Composer {
    /// `pool_size` bounds how many images are rasterized at once (minimum 1).
    pub fn new(processor: impl RasterProcessor + 'static, pool_size: usize) -> Self {
        Self {
            processor: Arc::new(processor),
            pool_size: pool_size.max(1),
            emit_options: EmitOptions::default(),
        }
    }

    pub fn with_emit_options(mut self, options: EmitOptions) -> Self {
        self.emit_options = options;
        self
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Rasterize, lay out, and emit `inputs` as one PDF.
    #[instrument(skip_all, fields(images = inputs.len(), pool = self.pool_size))]
    pub async fn compose(
        &self,
        inputs: Vec<ComposeInput>,
        config: &LayoutConfig,
        cancel: &CancellationToken,
    ) -> Result<ComposedDocument> {
        if inputs.is_empty() {
            return Err(BildwerkError::NoInputs);
        }
        config.validate()?;

        let run_id = RunId::new();
        info!(run = %run_id, fax = config.optimize_for_fax, "Composition started");

        let buffers = self.rasterize_all(&inputs, config.optimize_for_fax, cancel).await?;

        check_cancelled(cancel)?;
        let descriptors: Vec<ImageDescriptor> = inputs
            .iter()
            .zip(&buffers)
            .map(|(input, buffer)| ImageDescriptor::from_buffer(input.source.clone(), buffer))
            .collect();
        let placements = layout(&descriptors, config)?;

        check_cancelled(cancel)?;
        let bytes = {
            let placements = placements.clone();
            let config = *config;
            let options = self.emit_options.clone();
            tokio::task::spawn_blocking(move || emit(&buffers, &placements, &config, &options))
                .await
                .map_err(|err| BildwerkError::EmissionFailure(err.to_string()))??
        };

        let page_count = page_count(&placements);
        let document_hash = sha256_hex(&bytes);
        info!(
            run = %run_id,
            pages = page_count,
            bytes = bytes.len(),
            hash = %document_hash,
            "Composition finished"
        );
        Ok(ComposedDocument {
            run_id,
            created_at: Utc::now(),
            bytes,
            document_hash,
            placements,
            page_count,
        })
    }

    /// Lay out `inputs` from their headers alone, without decoding pixels.
    ///
    /// Gives the same placements [`Composer::compose`] would, for previews
    /// and dry runs.
    #[instrument(skip_all, fields(images = inputs.len()))]
    pub fn plan(&self, inputs: &[ComposeInput], config: &LayoutConfig) -> Result<Vec<PagePlacement>> {
        if inputs.is_empty() {
            return Err(BildwerkError::NoInputs);
        }
        let descriptors = inputs
            .iter()
            .enumerate()
            .map(|(index, input)| planned_descriptor(index, input))
            .collect::<Result<Vec<_>>>()?;
        layout(&descriptors, config)
    }

    /// Run the processor over every input, at most `pool_size` at a time,
    /// returning buffers in input order.
    ///
    /// Workers are joined oldest first. The first failure in input order, or
    /// a cancellation, stops the stage before any further input is started.
    async fn rasterize_all(
        &self,
        inputs: &[ComposeInput],
        fax: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<PixelBuffer>> {
        let mut pending = inputs.iter().enumerate();
        let mut in_flight = InFlight::with_capacity(self.pool_size);
        let mut buffers = Vec::with_capacity(inputs.len());

        loop {
            check_cancelled(cancel)?;
            while in_flight.len() < self.pool_size {
                let Some((index, input)) = pending.next() else {
                    break;
                };
                in_flight.push(index, self.spawn_worker(index, input, fax));
            }
            let Some((index, mut handle)) = in_flight.pop() else {
                break;
            };

            let joined = tokio::select! {
                joined = &mut handle => joined,
                _ = cancel.cancelled() => {
                    handle.abort();
                    info!(index, "Raster stage cancelled");
                    return Err(BildwerkError::Cancelled);
                }
            };
            let buffer = joined.map_err(|err| BildwerkError::ExternalProcessingFailure {
                index,
                source_name: inputs[index].source.display_name(),
                reason: format!("raster worker failed: {err}"),
            })??;
            buffers.push(buffer);
        }
        Ok(buffers)
    }

    fn spawn_worker(
        &self,
        index: usize,
        input: &ComposeInput,
        fax: bool,
    ) -> JoinHandle<Result<PixelBuffer>> {
        let processor = Arc::clone(&self.processor);
        let ComposeInput { source, transform } = input.clone();
        tokio::task::spawn_blocking(move || {
            debug!(index, source = %source.display_name(), "Rasterizing");
            processor
                .process(&source, &transform, fax)
                .map_err(|err| err.at_index(index))
        })
    }
}

/// Raster workers not yet joined, oldest first. Dropping the queue aborts
/// every worker that has not started running.
struct InFlight(VecDeque<(usize, JoinHandle<Result<PixelBuffer>>)>);

impl InFlight {
    fn with_capacity(capacity: usize) -> Self {
        Self(VecDeque::with_capacity(capacity))
    }

    fn len(&self) -> usize {
        self.0.len()
    }

    fn push(&mut self, index: usize, handle: JoinHandle<Result<PixelBuffer>>) {
        self.0.push_back((index, handle));
    }

    fn pop(&mut self) -> Option<(usize, JoinHandle<Result<PixelBuffer>>)> {
        self.0.pop_front()
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        for (_, handle) in &self.0 {
            handle.abort();
        }
    }
}

/// Descriptor of what the raster stage will produce for `input`: the edited
/// size of the stored pixels and the untouched EXIF orientation.
fn planned_descriptor(index: usize, input: &ComposeInput) -> Result<ImageDescriptor> {
    let probed = probe(&input.source).map_err(|err| err.at_index(index))?;
    let (width, height) = input
        .transform
        .output_size(probed.intrinsic_width, probed.intrinsic_height)
        .map_err(|reason| BildwerkError::InvalidTransform {
            index,
            source_name: input.source.display_name(),
            reason,
        })?;
    Ok(ImageDescriptor::new(input.source.clone(), width, height)
        .with_exif_orientation(probed.exif_orientation)
        .with_user_transform(input.transform))
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        info!("Composition cancelled");
        Err(BildwerkError::Cancelled)
    } else {
        Ok(())
    }
}
