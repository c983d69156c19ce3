use std::fmt::Formatter;
use std::path::PathBuf;

use crate::style::StyleKey;
use crate::types::{ImageRef, Rect};

/// Where in the conversion a fatal error happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Open,
    /// 1-based page number.
    Page(u32),
    Save,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            Stage::Open => write!(f, "opening"),
            Stage::Page(n) => write!(f, "page {}", n),
            Stage::Save => write!(f, "saving"),
        }
    }
}

/// Errors that abort a whole conversion.
#[derive(Debug)]
pub enum ConvertError {
    InvalidPath(String),
    InputNotFound(PathBuf),
    InputCorrupt { path: PathBuf, source: lopdf::Error },
    Unexpected { stage: Stage, message: String },
    IoError(std::io::Error),
    PdfError(lopdf::Error),
}

impl ConvertError {
    pub(crate) fn unexpected(stage: Stage, message: impl Into<String>) -> ConvertError {
        ConvertError::Unexpected {
            stage,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ConvertError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            ConvertError::InvalidPath(e) => write!(f, "Invalid path: {}", e),
            ConvertError::InputNotFound(p) => write!(f, "Input file not found: {}", p.display()),
            ConvertError::InputCorrupt { path, source } => {
                write!(f, "Cannot open {} as PDF: {}", path.display(), source)
            }
            ConvertError::Unexpected { stage, message } => {
                write!(f, "Unexpected failure while {}: {}", stage, message)
            }
            ConvertError::IoError(e) => write!(f, "IO error: {}", e),
            ConvertError::PdfError(e) => write!(f, "PDF error: {}", e),
        }
    }
}

impl std::error::Error for ConvertError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConvertError::InputCorrupt { source, .. } => Some(source),
            ConvertError::IoError(e) => Some(e),
            ConvertError::PdfError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConvertError {
    fn from(e: std::io::Error) -> Self {
        ConvertError::IoError(e)
    }
}

impl From<lopdf::Error> for ConvertError {
    fn from(e: lopdf::Error) -> Self {
        ConvertError::PdfError(e)
    }
}

/// Why a single span, image or fallback style was given up on.
///
/// None of these abort a conversion; they are logged and collected in the
/// [`ConversionReport`](crate::ConversionReport).
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    FontLoadFailure {
        style: StyleKey,
        message: String,
    },
    GlyphResolutionFailure {
        font: String,
        missing: Vec<char>,
    },
    FallbackExhausted {
        font: String,
        attempted: Vec<StyleKey>,
    },
    FontRegistrationFailure {
        font: String,
        message: String,
    },
    TextInsertionFailure {
        font: String,
        message: String,
    },
    InvalidImageBounds {
        bbox: Rect,
    },
    ImageExtractionFailure {
        image: ImageRef,
        message: String,
    },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            SkipReason::FontLoadFailure { style, message } => {
                write!(f, "fallback font '{}' failed to load: {}", style, message)
            }
            SkipReason::GlyphResolutionFailure { font, missing } => {
                write!(f, "font '{}' has no glyphs for {:?}", font, missing)
            }
            SkipReason::FallbackExhausted { font, attempted } => {
                let attempted: Vec<&str> = attempted.iter().map(|s| s.as_str()).collect();
                write!(
                    f,
                    "font '{}' unusable and no fallback resolved (tried: {})",
                    font,
                    attempted.join(", ")
                )
            }
            SkipReason::FontRegistrationFailure { font, message } => {
                write!(f, "registering font '{}' failed: {}", font, message)
            }
            SkipReason::TextInsertionFailure { font, message } => {
                write!(f, "inserting text with font '{}' failed: {}", font, message)
            }
            SkipReason::InvalidImageBounds { bbox } => {
                write!(f, "image bounding box {} is empty or infinite", bbox)
            }
            SkipReason::ImageExtractionFailure { image, message } => {
                write!(f, "image {} could not be extracted: {}", image, message)
            }
        }
    }
}
