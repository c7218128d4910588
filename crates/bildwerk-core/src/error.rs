// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Bildwerk.
//
// Every per-image failure carries the index of the offending input and a
// display name for its source so callers can point the user at the file.

use thiserror::Error;

/// Top-level error type for all Bildwerk operations.
#[derive(Debug, Error)]
pub enum BildwerkError {
    // -- Per-image errors --
    #[error("image #{index} ({source_name}) has invalid dimensions {width}x{height}")]
    InvalidDimensions {
        index: usize,
        source_name: String,
        width: u32,
        height: u32,
    },

    #[error("image #{index} ({source_name}) cannot be read: {reason}")]
    UnsupportedInput {
        index: usize,
        source_name: String,
        reason: String,
    },

    #[error("image #{index} ({source_name}) has an invalid edit: {reason}")]
    InvalidTransform {
        index: usize,
        source_name: String,
        reason: String,
    },

    #[error("processing image #{index} ({source_name}) failed: {reason}")]
    ExternalProcessingFailure {
        index: usize,
        source_name: String,
        reason: String,
    },

    // -- Whole-run errors --
    #[error("PDF emission failed: {0}")]
    EmissionFailure(String),

    #[error("invalid layout configuration: {0}")]
    InvalidConfig(String),

    #[error("no usable input images")]
    NoInputs,

    #[error("generation run was cancelled")]
    Cancelled,

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BildwerkError {
    /// Index of the input image that triggered the failure, when the error is
    /// tied to a single image.
    pub fn image_index(&self) -> Option<usize> {
        match self {
            Self::InvalidDimensions { index, .. }
            | Self::UnsupportedInput { index, .. }
            | Self::InvalidTransform { index, .. }
            | Self::ExternalProcessingFailure { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// Re-tag a per-image error with its position in the run.
    ///
    /// Raster processors report errors without knowing where the image sits in
    /// the batch; the pipeline fills the index in once results come back.
    pub fn at_index(self, position: usize) -> Self {
        match self {
            Self::InvalidDimensions {
                source_name,
                width,
                height,
                ..
            } => Self::InvalidDimensions {
                index: position,
                source_name,
                width,
                height,
            },
            Self::UnsupportedInput {
                source_name, reason, ..
            } => Self::UnsupportedInput {
                index: position,
                source_name,
                reason,
            },
            Self::InvalidTransform {
                source_name, reason, ..
            } => Self::InvalidTransform {
                index: position,
                source_name,
                reason,
            },
            Self::ExternalProcessingFailure {
                source_name, reason, ..
            } => Self::ExternalProcessingFailure {
                index: position,
                source_name,
                reason,
            },
            other => other,
        }
    }
}

/// Prefix of the `ExternalProcessingFailure` reason given when an external
/// tool could not be started at all.
pub const TOOL_NOT_RUNNABLE: &str = "failed to run";

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BildwerkError>;
