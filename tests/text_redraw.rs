mod common;

use pdf_darkmode::{
    Color, EncodedText, FallbackFontCache, FallbackFontPaths, FontHandle, FontHost,
    FontSelection, OutputDocument, PageCommand, PagePlan, Point, SkipReason, SpanFlags,
    SpanOutcome, StandardFont, StyleKey, TextRedrawEngine, TextSpan,
};

fn span(text: &str, font: &str, flags: SpanFlags) -> TextSpan {
    TextSpan {
        text: text.to_owned(),
        font_name: font.to_owned(),
        size: 11.,
        origin: Point::new(72., 100.),
        flags,
    }
}

/// Delegates to an [`OutputDocument`], counting registrations.
#[derive(Default)]
struct CountingHost {
    inner: OutputDocument,
    registrations: usize,
    reject_registration: bool,
}

impl FontHost for CountingHost {
    fn resolve_font(&self, name: &str) -> Option<FontSelection> {
        self.inner.resolve_font(name)
    }

    fn missing_glyphs(&self, font: &FontSelection, text: &str) -> Vec<char> {
        self.inner.missing_glyphs(font, text)
    }

    fn is_registered(&self, name: &str) -> bool {
        self.inner.is_registered(name)
    }

    fn register_font(&mut self, name: &str, font: &FontHandle) -> Result<(), String> {
        if self.reject_registration {
            return Err("font resource rejected".to_owned());
        }
        self.registrations += 1;
        self.inner.register_font(name, font)
    }

    fn encode_text(&mut self, font: &FontSelection, text: &str) -> Result<EncodedText, String> {
        self.inner.encode_text(font, text)
    }
}

#[test_log::test]
fn standard_font_text_is_inserted_in_place() {
    let paths = FallbackFontPaths::new();
    let mut cache = FallbackFontCache::new();
    let mut host = CountingHost::default();
    let mut plan = PagePlan::new(612., 792., 0);

    let mut engine = TextRedrawEngine::new(&mut cache, &paths);
    let outcome = engine.render_span(
        &span("Hello", "ABCDEF+Helvetica", SpanFlags::empty()),
        &mut host,
        &mut plan,
    );
    assert_eq!(outcome, SpanOutcome::Inserted);

    match &plan.commands()[1] {
        PageCommand::Text {
            origin,
            size,
            color,
            text,
        } => {
            assert_eq!(*origin, Point::new(72., 100.));
            assert_eq!(*size, 11.);
            assert_eq!(*color, Color::WHITE);
            assert_eq!(text.font, FontSelection::Standard(StandardFont::Helvetica));
            assert_eq!(text.bytes, b"Hello");
        }
        other => panic!("expected text, got {:?}", other),
    }
    assert_eq!(host.registrations, 0);
}

#[test_log::test]
fn missing_glyphs_use_the_fallback_registered_once() {
    let dir = tempfile::tempdir().unwrap();
    let paths = FallbackFontPaths::new().with(
        StyleKey::Regular,
        common::write_font(dir.path(), "regular.ttf", "Привет мир"),
    );
    let mut cache = FallbackFontCache::new();
    let mut host = CountingHost::default();
    let mut plan = PagePlan::new(612., 792., 0);

    let mut engine = TextRedrawEngine::new(&mut cache, &paths);
    for text in ["Привет", "мир", "Привет мир"] {
        let outcome = engine.render_span(
            &span(text, "Helvetica", SpanFlags::empty()),
            &mut host,
            &mut plan,
        );
        assert_eq!(
            outcome,
            SpanOutcome::InsertedViaFallback("Fallback-regular".to_owned())
        );
    }
    assert_eq!(host.registrations, 1);
    assert!(host.is_registered("Fallback-regular"));

    let texts: Vec<&EncodedText> = plan
        .commands()
        .iter()
        .filter_map(|c| match c {
            PageCommand::Text { text, .. } => Some(text),
            _ => None,
        })
        .collect();
    assert_eq!(texts.len(), 3);
    // two bytes per glyph
    assert_eq!(texts[1].bytes.len(), 6);
    assert_eq!(
        texts[0].font,
        FontSelection::Registered("Fallback-regular".to_owned())
    );
}

#[test_log::test]
fn bold_span_without_bold_font_uses_regular() {
    let dir = tempfile::tempdir().unwrap();
    let paths = FallbackFontPaths::new().with(
        StyleKey::Regular,
        common::write_font(dir.path(), "regular.ttf", "abc"),
    );
    let mut cache = FallbackFontCache::new();
    let mut host = CountingHost::default();
    let mut plan = PagePlan::new(612., 792., 0);

    let mut engine = TextRedrawEngine::new(&mut cache, &paths);
    let outcome = engine.render_span(
        &span("abc", "EmbeddedSans", SpanFlags::BOLD),
        &mut host,
        &mut plan,
    );
    assert_eq!(
        outcome,
        SpanOutcome::InsertedViaFallback("Fallback-regular".to_owned())
    );
}

#[test_log::test]
fn unresolvable_font_without_fallback_is_skipped() {
    let paths = FallbackFontPaths::new();
    let mut cache = FallbackFontCache::new();
    let mut host = CountingHost::default();
    let mut plan = PagePlan::new(612., 792., 0);

    let mut engine = TextRedrawEngine::new(&mut cache, &paths);
    let outcome = engine.render_span(
        &span("Total", "Garamond-BoldItalic", SpanFlags::empty()),
        &mut host,
        &mut plan,
    );
    assert_eq!(
        outcome,
        SpanOutcome::Skipped(SkipReason::FallbackExhausted {
            font: "Garamond-BoldItalic".to_owned(),
            attempted: vec![
                StyleKey::BoldItalic,
                StyleKey::Bold,
                StyleKey::Italic,
                StyleKey::Regular
            ],
        })
    );
    // only the background
    assert_eq!(plan.commands().len(), 1);
}

#[test_log::test]
fn registration_failure_skips_the_span() {
    let dir = tempfile::tempdir().unwrap();
    let paths = FallbackFontPaths::new().with(
        StyleKey::Regular,
        common::write_font(dir.path(), "regular.ttf", "Ж"),
    );
    let mut cache = FallbackFontCache::new();
    let mut host = CountingHost {
        reject_registration: true,
        ..Default::default()
    };
    let mut plan = PagePlan::new(612., 792., 0);

    let mut engine = TextRedrawEngine::new(&mut cache, &paths);
    let outcome = engine.render_span(
        &span("Ж", "Helvetica", SpanFlags::empty()),
        &mut host,
        &mut plan,
    );
    assert_eq!(
        outcome,
        SpanOutcome::Skipped(SkipReason::FontRegistrationFailure {
            font: "Fallback-regular".to_owned(),
            message: "font resource rejected".to_owned(),
        })
    );
    assert_eq!(plan.commands().len(), 1);
}
