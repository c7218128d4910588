// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Input discovery — filters the user's file list down to supported images and
// expands every PDF into one image per page.
//
// Missing files and unknown extensions are skipped with a warning rather than
// failing the run. PDF pages are rendered into a scratch directory that lives
// exactly as long as the `InputSet` holding it.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::process::Command;

use bildwerk_core::error::{BildwerkError, Result, TOOL_NOT_RUNNABLE};
use bildwerk_core::types::SourceRef;
use tempfile::TempDir;
use tracing::{debug, info, instrument, warn};

use crate::pdf::reader::PdfInspector;

/// File extensions accepted as input, compared case-insensitively.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "pdf"];

/// Resolution PDF pages are rendered at unless configured otherwise.
pub const DEFAULT_PDF_DENSITY: u32 = 216;

/// What an input path turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Image,
    Pdf,
}

/// Classify `path` by extension; `None` when the extension is not supported.
pub fn classify(path: &Path) -> Option<InputKind> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "pdf" => Some(InputKind::Pdf),
        ext if SUPPORTED_EXTENSIONS.contains(&ext) => Some(InputKind::Image),
        _ => None,
    }
}

// -- PDF rasterization --------------------------------------------------------

/// Renders every page of a PDF into image files inside `out_dir`.
pub trait PdfRasterizer: Send + Sync {
    /// Returns the produced page images in page order.
    fn rasterize(&self, pdf: &Path, out_dir: &Path) -> Result<Vec<PathBuf>>;
}

/// Rasterizes PDFs with ImageMagick's `magick` command.
#[derive(Debug, Clone)]
pub struct MagickRasterizer {
    program: PathBuf,
    density: u32,
}

impl Default for MagickRasterizer {
    fn default() -> Self {
        Self {
            program: PathBuf::from("magick"),
            density: DEFAULT_PDF_DENSITY,
        }
    }
}

impl MagickRasterizer {
    pub fn new(program: impl Into<PathBuf>, density: u32) -> Self {
        Self {
            program: program.into(),
            density,
        }
    }

    pub fn with_density(density: u32) -> Self {
        Self {
            density,
            ..Self::default()
        }
    }

    fn failure(&self, pdf: &Path, reason: String) -> BildwerkError {
        BildwerkError::ExternalProcessingFailure {
            index: 0,
            source_name: display_name(pdf),
            reason,
        }
    }
}

impl PdfRasterizer for MagickRasterizer {
    #[instrument(skip(self), fields(density = self.density))]
    fn rasterize(&self, pdf: &Path, out_dir: &Path) -> Result<Vec<PathBuf>> {
        let target = out_dir.join(format!("{}.jpg", display_name(pdf)));
        let program = self.program.display().to_string();

        let output = Command::new(&self.program)
            .arg("-density")
            .arg(self.density.to_string())
            .arg(pdf)
            .arg(&target)
            .output()
            .map_err(|err| self.failure(pdf, format!("{TOOL_NOT_RUNNABLE} `{program}`: {err}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.failure(
                pdf,
                format!("`{program}` exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        let pages = list_sorted(out_dir)?;
        match PdfInspector::open(pdf) {
            Ok(inspector) if inspector.page_count() != pages.len() => {
                return Err(self.failure(
                    pdf,
                    format!(
                        "`{program}` produced {} page images for a {}-page PDF",
                        pages.len(),
                        inspector.page_count()
                    ),
                ));
            }
            Ok(_) => {}
            Err(err) => warn!(%err, "Could not read page count; skipping page check"),
        }

        debug!(pages = pages.len(), "PDF rasterized");
        Ok(pages)
    }
}

// -- Discovery ----------------------------------------------------------------

/// The usable inputs of one run, in order.
///
/// Owns the scratch directories holding rendered PDF pages; they are removed
/// when the set is dropped.
#[derive(Debug)]
pub struct InputSet {
    pub sources: Vec<SourceRef>,
    scratch: Vec<TempDir>,
}

impl InputSet {
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Scratch directories created for PDF pages.
    pub fn scratch_dirs(&self) -> impl Iterator<Item = &Path> {
        self.scratch.iter().map(|dir| dir.path())
    }
}

/// Filter `paths` to supported inputs and expand PDFs into page images.
#[instrument(skip_all, fields(paths = paths.len()))]
pub fn discover(paths: &[PathBuf], rasterizer: &dyn PdfRasterizer) -> Result<InputSet> {
    let mut sources = Vec::with_capacity(paths.len());
    let mut scratch = Vec::new();

    for (index, path) in paths.iter().enumerate() {
        if !path.is_file() {
            warn!(path = %path.display(), "Input file does not exist; skipping");
            continue;
        }
        match classify(path) {
            None => warn!(path = %path.display(), "Unsupported file extension; skipping"),
            Some(InputKind::Image) => sources.push(SourceRef::from_path(path)),
            Some(InputKind::Pdf) => {
                let dir = tempfile::Builder::new()
                    .prefix("bildwerk-pdf-")
                    .tempdir()?;
                info!(pdf = %path.display(), dir = %dir.path().display(), "Expanding PDF");
                let pages = rasterizer
                    .rasterize(path, dir.path())
                    .map_err(|err| err.at_index(index))?;
                sources.extend(pages.into_iter().map(SourceRef::from_path));
                scratch.push(dir);
            }
        }
    }

    if sources.is_empty() {
        return Err(BildwerkError::NoInputs);
    }
    info!(inputs = sources.len(), "Inputs discovered");
    Ok(InputSet { sources, scratch })
}

// -- Natural ordering ---------------------------------------------------------

/// Regular files in `dir`, in natural file-name order.
fn list_sorted(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect::<Vec<_>>();
    files.sort_by(|a, b| natural_cmp(&display_name(a), &display_name(b)));
    Ok(files)
}

/// Case-insensitive comparison that orders embedded numbers by value, so
/// `page-2` sorts before `page-10`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();

    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let l_run = take_digits(&mut left);
                let r_run = take_digits(&mut right);
                let ordering = compare_digit_runs(&l_run, &r_run);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            (Some(l), Some(r)) => {
                let ordering = l.to_lowercase().cmp(r.to_lowercase());
                if ordering != Ordering::Equal {
                    return ordering;
                }
                left.next();
                right.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut run = String::new();
    while let Some(c) = chars.next_if(char::is_ascii_digit) {
        run.push(c);
    }
    run
}

/// Compare two digit strings by numeric value without parsing, so arbitrarily
/// long runs cannot overflow.
fn compare_digit_runs(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
