use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::error::{ConvertError, SkipReason, Stage};
use crate::extract::SourceDocument;
use crate::fallback::{FallbackFontCache, FallbackFontPaths, FontLoader};
use crate::page::{PageCommand, PagePlan};
use crate::reclassify::classify;
use crate::redraw::{SpanOutcome, TextRedrawEngine};
use crate::style::StyleKey;
use crate::types::SourcePage;
use crate::writer::{OutputDocument, SaveOptions};

/// What kind of item was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkippedKind {
    Span,
    Image,
    FallbackFont,
}

impl fmt::Display for SkippedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SkippedKind::Span => "text",
            SkippedKind::Image => "image",
            SkippedKind::FallbackFont => "fallback font",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedItem {
    /// 1-based page the item was on.
    pub page: u32,
    pub kind: SkippedKind,
    pub reason: SkipReason,
}

impl fmt::Display for SkippedItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page {}: {}: {}", self.page, self.kind, self.reason)
    }
}

/// Tally of a successful conversion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversionReport {
    pub pages: u32,
    pub spans_inserted: usize,
    pub spans_via_fallback: usize,
    pub spans_skipped: usize,
    pub paths_redrawn: usize,
    pub paths_discarded: usize,
    pub images_copied: usize,
    pub images_skipped: usize,
    pub skipped: Vec<SkippedItem>,
}

impl ConversionReport {
    fn skip(&mut self, page: u32, kind: SkippedKind, reason: SkipReason) {
        self.skipped.push(SkippedItem { page, kind, reason });
    }
}

/// Builder for a [`DarkModeConverter`].
///
/// # Examples
///
/// ```no_run
/// use pdf_darkmode::{DarkModeConverter, StyleKey};
///
/// let report = DarkModeConverter::builder()
///     .fallback_font(StyleKey::Regular, "/usr/share/fonts/DejaVuSans.ttf")
///     .fallback_font(StyleKey::Bold, "/usr/share/fonts/DejaVuSans-Bold.ttf")
///     .build()
///     .convert("in.pdf", "out.pdf")?;
/// println!("{} pages", report.pages);
/// # Ok::<(), pdf_darkmode::ConvertError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct DarkModeConverterBuilder {
    fonts: FallbackFontPaths,
    password: Option<String>,
    save: SaveOptions,
}

impl DarkModeConverterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Font file used for spans of `style` whose own font cannot be drawn.
    pub fn fallback_font(mut self, style: StyleKey, path: impl Into<PathBuf>) -> Self {
        self.fonts.set(style, path);
        self
    }

    pub fn fallback_fonts(mut self, fonts: FallbackFontPaths) -> Self {
        self.fonts = fonts;
        self
    }

    /// Password for encrypted input.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn compress(mut self, compress: bool) -> Self {
        self.save.compress = compress;
        self
    }

    /// Drop unreferenced objects before saving.
    pub fn garbage(mut self, garbage: bool) -> Self {
        self.save.garbage = garbage;
        self
    }

    pub fn build(self) -> DarkModeConverter {
        DarkModeConverter {
            fonts: self.fonts,
            password: self.password,
            save: self.save,
        }
    }
}

/// Converts PDFs to a dark-mode rendition: black pages, white text and
/// table lines, untouched images.
#[derive(Debug, Clone, Default)]
pub struct DarkModeConverter {
    fonts: FallbackFontPaths,
    password: Option<String>,
    save: SaveOptions,
}

fn require_pdf_extension(path: &Path, role: &str) -> Result<(), ConvertError> {
    let is_pdf = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
    if is_pdf {
        Ok(())
    } else {
        Err(ConvertError::InvalidPath(format!(
            "{} must be a .pdf file: {}",
            role,
            path.display()
        )))
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}

fn notify_progress<F: FnMut(u32, u32)>(progress: &mut F, done: u32, total: u32) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(|| progress(done, total))) {
        error!(
            "Progress callback failed at page {}/{}: {}",
            done,
            total,
            panic_message(panic.as_ref())
        );
    }
}

impl DarkModeConverter {
    pub fn builder() -> DarkModeConverterBuilder {
        DarkModeConverterBuilder::new()
    }

    pub fn fallback_fonts(&self) -> &FallbackFontPaths {
        &self.fonts
    }

    pub fn convert<I: AsRef<Path>, O: AsRef<Path>>(
        &self,
        input: I,
        output: O,
    ) -> Result<ConversionReport, ConvertError> {
        self.convert_with_progress(input, output, |_, _| {})
    }

    /// Convert `input` into `output`, calling `progress(done, total)` after
    /// each page.
    pub fn convert_with_progress<I, O, F>(
        &self,
        input: I,
        output: O,
        progress: F,
    ) -> Result<ConversionReport, ConvertError>
    where
        I: AsRef<Path>,
        O: AsRef<Path>,
        F: FnMut(u32, u32),
    {
        let mut cache = FallbackFontCache::new();
        self.convert_with_cache(input, output, &mut cache, progress)
    }

    /// Like [`convert_with_progress`](Self::convert_with_progress), loading
    /// fallback fonts through `cache`. The cache is cleared first.
    pub fn convert_with_cache<I, O, L, F>(
        &self,
        input: I,
        output: O,
        cache: &mut FallbackFontCache<L>,
        mut progress: F,
    ) -> Result<ConversionReport, ConvertError>
    where
        I: AsRef<Path>,
        O: AsRef<Path>,
        L: FontLoader,
        F: FnMut(u32, u32),
    {
        let (input, output) = (input.as_ref(), output.as_ref());
        require_pdf_extension(input, "input")?;
        require_pdf_extension(output, "output")?;

        info!(
            "Converting {} to dark mode as {}",
            input.display(),
            output.display()
        );
        let source = SourceDocument::open(input, self.password.as_deref())?;
        let mut out = OutputDocument::new();
        cache.clear();
        let mut report = ConversionReport::default();

        let total = source.page_count();
        for index in 0..total {
            let page = source.page(index)?;
            let plan = self.plan_page(&source, &page, &mut out, cache, &mut report);
            out.add_page(&plan)?;
            report.pages += 1;
            debug!("Finished page {}/{}", index + 1, total);
            notify_progress(&mut progress, index + 1, total);
        }

        out.save(output, self.save).map_err(|e| match e {
            ConvertError::IoError(e) => ConvertError::unexpected(Stage::Save, e.to_string()),
            ConvertError::PdfError(e) => ConvertError::unexpected(Stage::Save, e.to_string()),
            e => e,
        })?;

        info!(
            "Converted {} pages: {} spans ({} via fallback, {} skipped), {} paths redrawn, {} images copied ({} skipped)",
            report.pages,
            report.spans_inserted + report.spans_via_fallback,
            report.spans_via_fallback,
            report.spans_skipped,
            report.paths_redrawn,
            report.images_copied,
            report.images_skipped
        );
        Ok(report)
    }

    /// Build the ordered draw list for one page: background, structural
    /// paths, text, images.
    fn plan_page<L: FontLoader>(
        &self,
        source: &SourceDocument,
        page: &SourcePage,
        out: &mut OutputDocument,
        cache: &mut FallbackFontCache<L>,
        report: &mut ConversionReport,
    ) -> PagePlan {
        let mut plan = PagePlan::new(page.width, page.height, page.rotation);

        for path in &page.paths {
            let commands = classify(path);
            if commands.is_empty() {
                report.paths_discarded += 1;
            } else {
                report.paths_redrawn += 1;
                plan.extend(commands);
            }
        }

        {
            let mut engine = TextRedrawEngine::new(cache, &self.fonts);
            for span in page.spans() {
                match engine.render_span(span, out, &mut plan) {
                    SpanOutcome::Inserted => report.spans_inserted += 1,
                    SpanOutcome::InsertedViaFallback(_) => report.spans_via_fallback += 1,
                    SpanOutcome::Skipped(reason) => {
                        report.spans_skipped += 1;
                        report.skip(page.number, SkippedKind::Span, reason);
                    }
                }
            }
        }
        for reason in cache.take_load_failures() {
            report.skip(page.number, SkippedKind::FallbackFont, reason);
        }

        for placement in &page.images {
            let bbox = placement.bbox;
            if bbox.is_empty() || !bbox.is_finite() {
                warn!(
                    "Skipping image {} on page {}: invalid bounds {}",
                    placement.image, page.number, bbox
                );
                report.images_skipped += 1;
                report.skip(
                    page.number,
                    SkippedKind::Image,
                    SkipReason::InvalidImageBounds { bbox },
                );
                continue;
            }
            match source.extract_image(placement.image) {
                Ok(image) => {
                    plan.push(PageCommand::Image {
                        bbox,
                        image: Box::new(image),
                    });
                    report.images_copied += 1;
                }
                Err(message) => {
                    warn!(
                        "Skipping image {} on page {}: {}",
                        placement.image, page.number, message
                    );
                    report.images_skipped += 1;
                    report.skip(
                        page.number,
                        SkippedKind::Image,
                        SkipReason::ImageExtractionFailure {
                            image: placement.image,
                            message,
                        },
                    );
                }
            }
        }
        plan
    }
}

/// Convert `input` to dark mode, writing `output`.
///
/// Returns `None` on success and a description of the failure otherwise.
/// Nothing is thrown across this boundary, panics included.
pub fn convert_to_dark_mode<I, O, F>(
    input: I,
    output: O,
    fallback_fonts: &FallbackFontPaths,
    progress: F,
) -> Option<String>
where
    I: AsRef<Path>,
    O: AsRef<Path>,
    F: FnMut(u32, u32),
{
    let converter = DarkModeConverter::builder()
        .fallback_fonts(fallback_fonts.clone())
        .build();
    let result = catch_unwind(AssertUnwindSafe(|| {
        converter.convert_with_progress(input.as_ref(), output.as_ref(), progress)
    }));
    match result {
        Ok(Ok(report)) => {
            for item in &report.skipped {
                warn!("Skipped {}", item);
            }
            None
        }
        Ok(Err(e)) => {
            error!("Conversion failed: {}", e);
            Some(e.to_string())
        }
        Err(panic) => {
            let message = format!("Unexpected failure: {}", panic_message(panic.as_ref()));
            error!("{}", message);
            Some(message)
        }
    }
}
