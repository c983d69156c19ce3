//! Dark-mode conversion of PDF documents
//!
//! Every page is redrawn on a black background: text in white (with a
//! style-matched fallback font when the original cannot be used), table
//! borders and cell fills in white, and images copied as they are.

mod convert;
mod data;
mod error;
mod extract;
mod fallback;
mod fonts;
mod output;
mod page;
mod processor;
mod reclassify;
mod redraw;
mod standard_fonts;
mod style;
mod types;
mod utils;
mod writer;

// Re-export conversion API
pub use convert::{
    ConversionReport, DarkModeConverter, DarkModeConverterBuilder, SkippedItem, SkippedKind,
    convert_to_dark_mode,
};

// Re-export error types
pub use error::{ConvertError, SkipReason, Stage};

// Re-export building blocks
pub use extract::{ImageData, SourceDocument};
pub use fallback::{
    FallbackFont, FallbackFontCache, FallbackFontPaths, FontHandle, FontLoadError, FontLoader,
    FontProgram, FsFontLoader,
};
pub use page::{EncodedText, FontSelection, PageCommand, PagePlan};
pub use reclassify::{MAX_STRUCTURAL_WIDTH, MIN_DRAW_WIDTH, classify, is_structural};
pub use redraw::{FontHost, SpanOutcome, TextRedrawEngine};
pub use standard_fonts::StandardFont;
pub use style::{DerivedStyle, StyleKey, derive_style, fallback_order};
pub use types::{
    Color, ImagePlacement, ImageRef, MediaBox, PathItem, PathItemKind, Point, Rect, SourcePage,
    SpanFlags, TextBlock, TextLine, TextSpan, VectorPath,
};
pub use writer::{OutputDocument, SaveOptions};
