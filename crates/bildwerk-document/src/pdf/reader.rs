// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF inspector — read-only look at existing PDF documents using `lopdf`.
//
// Used to learn how many pages a PDF input has before it is rasterized, and to
// check the documents we emit.

use std::path::Path;

use bildwerk_core::error::{BildwerkError, Result};
use lopdf::{Document, Object};
use tracing::{debug, instrument};

/// A loaded PDF document, opened for inspection only.
pub struct PdfInspector {
    document: Document,
}

impl PdfInspector {
    /// Open a PDF from the filesystem.
    ///
    /// Errors are reported against image #0; callers that know the input's
    /// position re-tag them with [`BildwerkError::at_index`].
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        let document = Document::load(path_ref).map_err(|err| BildwerkError::UnsupportedInput {
            index: 0,
            source_name: path_ref.display().to_string(),
            reason: format!("not a readable PDF: {err}"),
        })?;
        debug!(pages = document.get_pages().len(), "PDF loaded");
        Ok(Self { document })
    }

    /// Inspect PDF bytes already in memory.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let document = Document::load_mem(data).map_err(|err| BildwerkError::UnsupportedInput {
            index: 0,
            source_name: "<memory>".into(),
            reason: format!("not a readable PDF: {err}"),
        })?;
        Ok(Self { document })
    }

    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    /// Media box width and height in points of page `page_number` (1-indexed).
    pub fn page_size(&self, page_number: u32) -> Option<(f64, f64)> {
        let page_id = *self.document.get_pages().get(&page_number)?;
        let page = self.document.get_object(page_id).ok()?.as_dict().ok()?;
        let media_box = page.get(b"MediaBox").ok()?.as_array().ok()?;
        let corners: Vec<f64> = media_box
            .iter()
            .map(|value| match value {
                Object::Integer(i) => Some(*i as f64),
                Object::Real(r) => Some(*r as f64),
                _ => None,
            })
            .collect::<Option<_>>()?;
        match corners.as_slice() {
            [x0, y0, x1, y1] => Some((x1 - x0, y1 - y0)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_is_unsupported_input() {
        let err = PdfInspector::from_bytes(b"not a pdf").err().unwrap();
        assert!(matches!(err, BildwerkError::UnsupportedInput { .. }));
    }

    #[test]
    fn missing_file_is_unsupported_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = PdfInspector::open(dir.path().join("absent.pdf")).err().unwrap();
        assert!(matches!(err, BildwerkError::UnsupportedInput { .. }));
    }
}
