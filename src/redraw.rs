//! Redraws extracted text spans in white, in their own font when the output
//! can render it and in a style-matched fallback font otherwise.

use tracing::{debug, error, warn};

use crate::error::SkipReason;
use crate::fallback::{FallbackFontCache, FallbackFontPaths, FontHandle, FontLoader};
use crate::page::{EncodedText, FontSelection, PageCommand, PagePlan};
use crate::style::{derive_style, fallback_order};
use crate::types::{Color, TextSpan};

/// Characters of span text quoted in log messages.
const LOG_PREFIX_CHARS: usize = 25;

/// The font capabilities of an output document.
pub trait FontHost {
    /// Look a font up by name among the fonts the output can use without
    /// embedding anything.
    fn resolve_font(&self, name: &str) -> Option<FontSelection>;

    /// Characters of `text` that `font` has no glyph for. Control characters
    /// below U+0020 are never reported.
    fn missing_glyphs(&self, font: &FontSelection, text: &str) -> Vec<char>;

    fn is_registered(&self, name: &str) -> bool;

    /// Make `font` available under `name`.
    fn register_font(&mut self, name: &str, font: &FontHandle) -> Result<(), String>;

    /// Encode `text` for `font`, recording the glyphs it uses.
    fn encode_text(&mut self, font: &FontSelection, text: &str) -> Result<EncodedText, String>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum SpanOutcome {
    Inserted,
    /// Drawn with the fallback font registered under this name.
    InsertedViaFallback(String),
    Skipped(SkipReason),
}

/// Why the span's own font was not used.
enum Unusable {
    Unresolvable,
    MissingGlyphs(Vec<char>),
    InsertionFailed(String),
}

pub struct TextRedrawEngine<'c, L: FontLoader> {
    cache: &'c mut FallbackFontCache<L>,
    paths: &'c FallbackFontPaths,
}

impl<'c, L: FontLoader> TextRedrawEngine<'c, L> {
    pub fn new(cache: &'c mut FallbackFontCache<L>, paths: &'c FallbackFontPaths) -> Self {
        TextRedrawEngine { cache, paths }
    }

    fn push_text(plan: &mut PagePlan, span: &TextSpan, text: EncodedText) {
        plan.push(PageCommand::Text {
            origin: span.origin,
            size: span.size,
            color: Color::WHITE,
            text,
        });
    }

    fn try_original<H: FontHost>(host: &mut H, span: &TextSpan) -> Result<EncodedText, Unusable> {
        let font = host
            .resolve_font(&span.font_name)
            .ok_or(Unusable::Unresolvable)?;
        let missing = host.missing_glyphs(&font, &span.text);
        if !missing.is_empty() {
            return Err(Unusable::MissingGlyphs(missing));
        }
        host.encode_text(&font, &span.text)
            .map_err(Unusable::InsertionFailed)
    }

    /// Draw `span` onto `plan`. Failures are reported in the outcome; they
    /// never abort the page.
    pub fn render_span<H: FontHost>(
        &mut self,
        span: &TextSpan,
        host: &mut H,
        plan: &mut PagePlan,
    ) -> SpanOutcome {
        let unusable = match Self::try_original(host, span) {
            Ok(text) => {
                Self::push_text(plan, span, text);
                return SpanOutcome::Inserted;
            }
            Err(unusable) => unusable,
        };
        match &unusable {
            Unusable::Unresolvable => debug!("Font '{}' is not available by name", span.font_name),
            Unusable::MissingGlyphs(missing) => debug!(
                "{}",
                SkipReason::GlyphResolutionFailure {
                    font: span.font_name.clone(),
                    missing: missing.clone(),
                }
            ),
            Unusable::InsertionFailed(e) => {
                debug!("Font '{}' failed to insert text: {}", span.font_name, e)
            }
        }

        let style = derive_style(span.flags, &span.font_name);
        let Some((name, font)) =
            self.cache
                .select_for_span(style.is_bold, style.is_italic, self.paths)
        else {
            error!(
                "Font '{}' unusable and no usable fallback provided/loaded. Skipping text: '{}...'",
                span.font_name,
                span.text_prefix(LOG_PREFIX_CHARS)
            );
            return SpanOutcome::Skipped(SkipReason::FallbackExhausted {
                font: span.font_name.clone(),
                attempted: fallback_order(style).to_vec(),
            });
        };

        warn!(
            "Font '{}' unusable. Using fallback font '{}'. Text: '{}...'",
            span.font_name,
            name,
            span.text_prefix(LOG_PREFIX_CHARS)
        );

        if !host.is_registered(&name) {
            if let Err(message) = host.register_font(&name, &font) {
                error!(
                    "Registering fallback font '{}' failed: {}. Skipping text: '{}...'",
                    name,
                    message,
                    span.text_prefix(LOG_PREFIX_CHARS)
                );
                return SpanOutcome::Skipped(SkipReason::FontRegistrationFailure {
                    font: name,
                    message,
                });
            }
        }

        match host.encode_text(&FontSelection::Registered(name.clone()), &span.text) {
            Ok(text) => {
                Self::push_text(plan, span, text);
                SpanOutcome::InsertedViaFallback(name)
            }
            Err(message) => {
                error!(
                    "Fallback font insertion failed for '{}': {}. Skipping text: '{}...'",
                    name,
                    message,
                    span.text_prefix(LOG_PREFIX_CHARS)
                );
                SpanOutcome::Skipped(SkipReason::TextInsertionFailure {
                    font: name,
                    message,
                })
            }
        }
    }
}
