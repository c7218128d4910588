// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages.
//
// Every technical error is mapped to plain English with a clear suggestion,
// naming the image that caused it where one is known.

use crate::error::{BildwerkError, TOOL_NOT_RUNNABLE};

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Running again may succeed (temporary file or tool trouble).
    Transient,
    /// The user must change something (edit, option, file).
    ActionRequired,
    /// The input cannot be used as it is.
    Permanent,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary.
    pub message: String,
    /// What the user should try.
    pub suggestion: String,
    /// Whether running the same command again could succeed.
    pub retriable: bool,
    pub severity: Severity,
}

/// Convert a `BildwerkError` into a `HumanError`.
pub fn humanize_error(err: &BildwerkError) -> HumanError {
    match err {
        BildwerkError::InvalidDimensions { source_name, .. } => HumanError {
            message: format!("\"{source_name}\" has no usable picture in it."),
            suggestion: "The file reports a width or height of zero. Open it in an image viewer to check it, or remove it from the list.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        BildwerkError::UnsupportedInput { source_name, .. } => HumanError {
            message: format!("\"{source_name}\" couldn't be opened."),
            suggestion: "Supported files are JPEG, PNG, BMP, TIFF and PDF. Try saving the file as a JPEG or PNG first.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        BildwerkError::InvalidTransform { source_name, reason, .. } => HumanError {
            message: format!("The edit for \"{source_name}\" doesn't fit the picture."),
            suggestion: format!("Reset the crop and rotation for this image and try again. ({reason})"),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        BildwerkError::ExternalProcessingFailure { source_name, reason, .. }
            if reason.starts_with(TOOL_NOT_RUNNABLE) =>
        {
            HumanError {
                message: format!("\"{source_name}\" couldn't be prepared for the PDF."),
                suggestion: "Converting PDF pages needs ImageMagick. Check that the `magick` command is installed, then try again.".into(),
                retriable: false,
                severity: Severity::ActionRequired,
            }
        }

        BildwerkError::ExternalProcessingFailure { source_name, reason, .. } => HumanError {
            message: format!("\"{source_name}\" couldn't be prepared for the PDF."),
            suggestion: format!("Try again. If this keeps happening, remove this image from the list. ({reason})"),
            retriable: true,
            severity: Severity::Transient,
        },

        BildwerkError::EmissionFailure(_) => HumanError {
            message: "The PDF couldn't be written.".into(),
            suggestion: "Try again with fewer images. If this keeps happening, please report it.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        BildwerkError::InvalidConfig(detail) => HumanError {
            message: "The page settings don't work together.".into(),
            suggestion: format!("Use a smaller margin or a bigger page. ({detail})"),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        BildwerkError::NoInputs => HumanError {
            message: "There are no pictures to put in the PDF.".into(),
            suggestion: "Add at least one JPEG, PNG, BMP, TIFF or PDF file.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        BildwerkError::Cancelled => HumanError {
            message: "Creating the PDF was stopped.".into(),
            suggestion: "Nothing was saved. Start again when you're ready.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        BildwerkError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::NotFound {
                HumanError {
                    message: "A file couldn't be found.".into(),
                    suggestion: "It may have been moved or deleted. Try choosing the file again.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else if io_err.kind() == std::io::ErrorKind::PermissionDenied {
                HumanError {
                    message: "Bildwerk doesn't have permission to use that file.".into(),
                    suggestion: "Check the file permissions, or save to a different folder.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else {
                HumanError {
                    message: "There was a problem reading or writing a file.".into(),
                    suggestion: "Try again. If this keeps happening, your disk may be full.".into(),
                    retriable: true,
                    severity: Severity::Transient,
                }
            }
        }

        BildwerkError::Serialization(_) => HumanError {
            message: "The settings file couldn't be read.".into(),
            suggestion: "Check the file is valid JSON, or write a fresh one with `bildwerk config --write`.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_dimensions_name_the_file() {
        let err = BildwerkError::InvalidDimensions {
            index: 1,
            source_name: "blank.png".into(),
            width: 0,
            height: 0,
        };
        let human = humanize_error(&err);
        assert_eq!(human.severity, Severity::Permanent);
        assert!(human.message.contains("blank.png"));
        assert!(!human.retriable);
    }

    #[test]
    fn missing_magick_gets_install_hint() {
        let err = BildwerkError::ExternalProcessingFailure {
            index: 0,
            source_name: "contract.pdf".into(),
            reason: "failed to run `magick`: No such file or directory".into(),
        };
        let human = humanize_error(&err);
        assert!(human.suggestion.contains("ImageMagick"));
        assert_eq!(human.severity, Severity::ActionRequired);
        assert!(!human.retriable);
    }

    #[test]
    fn worker_crash_is_worth_retrying() {
        let err = BildwerkError::ExternalProcessingFailure {
            index: 2,
            source_name: "photo.jpg".into(),
            reason: "raster worker failed: task panicked".into(),
        };
        let human = humanize_error(&err);
        assert_eq!(human.severity, Severity::Transient);
        assert!(human.retriable);
        assert!(human.suggestion.contains("task panicked"));
    }

    #[test]
    fn config_problems_are_action_required() {
        let human = humanize_error(&BildwerkError::InvalidConfig("margin too large".into()));
        assert_eq!(human.severity, Severity::ActionRequired);
        assert!(human.suggestion.contains("margin too large"));
    }

    #[test]
    fn missing_file_is_action_required() {
        let err = BildwerkError::Io(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert_eq!(humanize_error(&err).severity, Severity::ActionRequired);
    }
}
