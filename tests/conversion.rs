mod common;

use std::path::Path;

use common::{TestPage, TestPdf, as_f32, op, operators, page_operations, show_text};
use lopdf::{Dictionary, Document, Object};
use pdf_darkmode::{
    ConvertError, DarkModeConverter, FallbackFontPaths, SkipReason, SkippedKind, StyleKey,
    convert_to_dark_mode,
};

fn nums(ops: &[Object]) -> Vec<f32> {
    ops.iter().map(as_f32).collect()
}

fn assert_close(actual: Vec<f32>, expected: &[f32]) {
    assert_eq!(actual.len(), expected.len(), "{:?} vs {:?}", actual, expected);
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < 0.01, "{:?} vs {:?}", actual, expected);
    }
}

fn page_dict(doc: &Document, page: u32) -> &Dictionary {
    doc.get_dictionary(doc.get_pages()[&page]).unwrap()
}

fn resource<'a>(doc: &'a Document, page: u32, kind: &[u8]) -> Vec<&'a Dictionary> {
    let resources = page_dict(doc, page)
        .get(b"Resources")
        .and_then(|r| doc.dereference(r))
        .and_then(|(_, r)| r.as_dict())
        .unwrap();
    match resources.get(kind).and_then(Object::as_dict) {
        Ok(dict) => dict
            .iter()
            .map(|(_, v)| match v {
                Object::Reference(id) => match doc.get_object(*id).unwrap() {
                    Object::Stream(s) => &s.dict,
                    Object::Dictionary(d) => d,
                    other => panic!("unexpected resource {:?}", other),
                },
                other => panic!("unexpected resource {:?}", other),
            })
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// One page: a gray filled rectangle, "Hello" in Helvetica and a full-page
/// image.
fn hello_pdf(path: &Path) {
    let mut pdf = TestPdf::new();
    let font = pdf.helvetica();
    let image = pdf.image();
    let mut page = TestPage::new(612., 792.);
    page.fonts.set("F1", font);
    page.xobjects.set("Im1", image);
    page.operations.extend([
        op("g", vec![0.5f32.into()]),
        op("re", vec![100.into(), 600.into(), 200.into(), 50.into()]),
        op("f", vec![]),
    ]);
    page.operations
        .extend(show_text("F1", 12., 72., 700., b"Hello"));
    page.operations.extend([
        op("q", vec![]),
        op(
            "cm",
            vec![612.into(), 0.into(), 0.into(), 792.into(), 0.into(), 0.into()],
        ),
        op("Do", vec![Object::Name(b"Im1".to_vec())]),
        op("Q", vec![]),
    ]);
    pdf.add_page(page);
    pdf.save(path);
}

#[test_log::test]
fn hello_page_is_redrawn_in_dark_mode() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("hello.pdf");
    let output = dir.path().join("hello-dark.pdf");
    hello_pdf(&input);

    let mut progress = Vec::new();
    let report = DarkModeConverter::builder()
        .compress(false)
        .build()
        .convert_with_progress(&input, &output, |done, total| progress.push((done, total)))
        .unwrap();

    assert_eq!(progress, vec![(1, 1)]);
    assert_eq!(report.pages, 1);
    assert_eq!(report.spans_inserted, 1);
    assert_eq!(report.spans_via_fallback, 0);
    assert_eq!(report.paths_redrawn, 1);
    assert_eq!(report.images_copied, 1);
    assert!(report.skipped.is_empty());

    let doc = Document::load(&output).unwrap();
    assert_eq!(doc.get_pages().len(), 1);
    let media_box = page_dict(&doc, 1).get(b"MediaBox").unwrap().as_array().unwrap();
    assert_close(nums(media_box), &[0., 0., 612., 792.]);

    let ops = page_operations(&doc, 1);
    assert_eq!(
        operators(&ops),
        vec![
            "q", "rg", "re", "f", "Q", // background
            "q", "RG", "rg", "w", "re", "B", "Q", // table cell
            "BT", "Tf", "rg", "Tm", "Tj", "ET", // text
            "q", "cm", "Do", "Q", // image
        ]
    );
    // black full-page background
    assert_close(nums(&ops[1].operands), &[0., 0., 0.]);
    assert_close(nums(&ops[2].operands), &[0., 0., 612., 792.]);
    // white filled rectangle at the source position
    assert_close(nums(&ops[6].operands), &[1., 1., 1.]);
    assert_close(nums(&ops[7].operands), &[1., 1., 1.]);
    assert_close(nums(&ops[8].operands), &[1.]);
    assert_close(nums(&ops[9].operands), &[100., 600., 200., 50.]);
    // white "Hello" at the original origin and size
    assert_close(nums(&ops[13].operands[1..]), &[12.]);
    assert_close(nums(&ops[14].operands), &[1., 1., 1.]);
    assert_close(nums(&ops[15].operands), &[1., 0., 0., 1., 72., 700.]);
    assert_eq!(ops[16].operands[0].as_str().unwrap(), b"Hello");
    // image over the full page
    assert_close(nums(&ops[19].operands), &[612., 0., 0., 792., 0., 0.]);

    let fonts = resource(&doc, 1, b"Font");
    assert_eq!(fonts.len(), 1);
    assert_eq!(fonts[0].get(b"BaseFont").unwrap().as_name().unwrap(), b"Helvetica");
    let images = resource(&doc, 1, b"XObject");
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].get(b"Subtype").unwrap().as_name().unwrap(), b"Image");
    assert_eq!(images[0].get(b"Width").unwrap().as_i64().unwrap(), 2);
}

#[test_log::test]
fn page_count_and_sizes_are_preserved() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("sizes.pdf");
    let output = dir.path().join("sizes-dark.pdf");
    let sizes = [(612., 792.), (595., 842.), (300., 400.)];

    let mut pdf = TestPdf::new();
    for (w, h) in sizes {
        pdf.add_page(TestPage::new(w, h));
    }
    pdf.save(&input);

    let mut progress = Vec::new();
    let report = DarkModeConverter::default()
        .convert_with_progress(&input, &output, |done, total| progress.push((done, total)))
        .unwrap();
    assert_eq!(report.pages, 3);
    assert_eq!(progress, vec![(1, 3), (2, 3), (3, 3)]);

    let doc = Document::load(&output).unwrap();
    assert_eq!(doc.get_pages().len(), 3);
    for (i, (w, h)) in sizes.iter().enumerate() {
        let media_box = page_dict(&doc, i as u32 + 1)
            .get(b"MediaBox")
            .unwrap()
            .as_array()
            .unwrap();
        assert_close(nums(media_box), &[0., 0., *w, *h]);
    }
}

#[test_log::test]
fn cyrillic_text_is_embedded_with_the_fallback_font() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("cyrillic.pdf");
    let output = dir.path().join("cyrillic-dark.pdf");
    let font_path = common::write_font(dir.path(), "regular.ttf", "Жук");

    let mut pdf = TestPdf::new();
    let font = pdf.helvetica_with("Жук");
    let mut page = TestPage::new(612., 792.);
    page.fonts.set("F1", font);
    page.operations
        .extend(show_text("F1", 12., 72., 700., &[128, 129, 130]));
    page.operations
        .extend(show_text("F1", 12., 72., 600., &[130, 129]));
    pdf.add_page(page);
    pdf.save(&input);

    let report = DarkModeConverter::builder()
        .fallback_font(StyleKey::Regular, &font_path)
        .build()
        .convert(&input, &output)
        .unwrap();
    assert_eq!(report.spans_via_fallback, 2);
    assert_eq!(report.spans_inserted, 0);
    assert!(report.skipped.is_empty());

    let doc = Document::load(&output).unwrap();
    let fonts = resource(&doc, 1, b"Font");
    assert_eq!(fonts.len(), 1);
    let type0 = fonts[0];
    assert_eq!(type0.get(b"Subtype").unwrap().as_name().unwrap(), b"Type0");
    assert_eq!(type0.get(b"Encoding").unwrap().as_name().unwrap(), b"Identity-H");
    assert!(type0.get(b"ToUnicode").unwrap().as_reference().is_ok());

    let descendants = type0.get(b"DescendantFonts").unwrap().as_array().unwrap();
    let cid_font = doc
        .get_dictionary(descendants[0].as_reference().unwrap())
        .unwrap();
    assert_eq!(cid_font.get(b"Subtype").unwrap().as_name().unwrap(), b"CIDFontType2");
    let descriptor = doc
        .get_dictionary(cid_font.get(b"FontDescriptor").unwrap().as_reference().unwrap())
        .unwrap();
    assert!(descriptor.get(b"FontFile2").unwrap().as_reference().is_ok());

    let ops = page_operations(&doc, 1);
    let shown: Vec<&[u8]> = ops
        .iter()
        .filter(|o| o.operator == "Tj")
        .map(|o| o.operands[0].as_str().unwrap())
        .collect();
    // glyph ids follow the sorted cmap: Ж=1, к=2, у=3
    assert_eq!(shown, vec![&[0, 1, 0, 3, 0, 2][..], &[0, 2, 0, 3][..]]);
}

#[test_log::test]
fn unrenderable_text_is_skipped_and_reported() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("skip.pdf");
    let output = dir.path().join("skip-dark.pdf");

    let mut pdf = TestPdf::new();
    let font = pdf.helvetica_with("Ж");
    let mut page = TestPage::new(612., 792.);
    page.fonts.set("F1", font);
    page.operations
        .extend(show_text("F1", 12., 72., 700., &[128]));
    pdf.add_page(page);
    pdf.save(&input);

    let report = DarkModeConverter::default().convert(&input, &output).unwrap();
    assert_eq!(report.spans_skipped, 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].page, 1);
    assert_eq!(report.skipped[0].kind, SkippedKind::Span);
    assert!(matches!(
        report.skipped[0].reason,
        SkipReason::FallbackExhausted { .. }
    ));
    assert!(output.exists());
}

#[test_log::test]
fn thick_strokes_and_degenerate_images_are_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("art.pdf");
    let output = dir.path().join("art-dark.pdf");

    let mut pdf = TestPdf::new();
    let image = pdf.image();
    let mut page = TestPage::new(612., 792.);
    page.xobjects.set("Im1", image);
    page.operations.extend([
        op("w", vec![5.into()]),
        op("m", vec![10.into(), 10.into()]),
        op("l", vec![200.into(), 10.into()]),
        op("S", vec![]),
        op("w", vec![0.5f32.into()]),
        op("m", vec![10.into(), 20.into()]),
        op("l", vec![200.into(), 20.into()]),
        op("S", vec![]),
        op("q", vec![]),
        op("cm", vec![0.into(), 0.into(), 0.into(), 0.into(), 50.into(), 50.into()]),
        op("Do", vec![Object::Name(b"Im1".to_vec())]),
        op("Q", vec![]),
    ]);
    pdf.add_page(page);
    pdf.save(&input);

    let report = DarkModeConverter::default().convert(&input, &output).unwrap();
    assert_eq!(report.paths_discarded, 1);
    assert_eq!(report.paths_redrawn, 1);
    assert_eq!(report.images_copied, 0);
    assert_eq!(report.images_skipped, 1);
    assert_eq!(report.skipped[0].kind, SkippedKind::Image);
    assert!(matches!(
        report.skipped[0].reason,
        SkipReason::InvalidImageBounds { .. }
    ));
}

#[test_log::test]
fn panicking_progress_sink_does_not_abort() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("hello.pdf");
    let output = dir.path().join("out.pdf");
    hello_pdf(&input);

    let report = DarkModeConverter::default()
        .convert_with_progress(&input, &output, |_, _| panic!("progress window closed"))
        .unwrap();
    assert_eq!(report.pages, 1);
    assert!(output.exists());
}

#[test_log::test]
fn missing_input_leaves_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.pdf");
    let err = DarkModeConverter::default()
        .convert(dir.path().join("nope.pdf"), &output)
        .unwrap_err();
    assert!(matches!(err, ConvertError::InputNotFound(_)));
    assert!(!output.exists());
}

#[test_log::test]
fn corrupt_input_leaves_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("broken.pdf");
    let output = dir.path().join("out.pdf");
    std::fs::write(&input, b"this is not a pdf").unwrap();

    let err = DarkModeConverter::default()
        .convert(&input, &output)
        .unwrap_err();
    assert!(matches!(err, ConvertError::InputCorrupt { .. }));
    assert!(!output.exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test_log::test]
fn non_pdf_paths_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("hello.pdf");
    hello_pdf(&input);

    let err = DarkModeConverter::default()
        .convert(&input, dir.path().join("out.png"))
        .unwrap_err();
    assert!(matches!(err, ConvertError::InvalidPath(_)));
    assert!(!dir.path().join("out.png").exists());
}

#[test_log::test]
fn sentinel_api_reports_success_and_failure() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("hello.pdf");
    let output = dir.path().join("hello-dark.pdf");
    hello_pdf(&input);

    let mut calls = 0;
    let result = convert_to_dark_mode(&input, &output, &FallbackFontPaths::new(), |_, _| {
        calls += 1
    });
    assert_eq!(result, None);
    assert_eq!(calls, 1);
    assert!(output.exists());

    let message = convert_to_dark_mode(
        dir.path().join("missing.pdf"),
        dir.path().join("x.pdf"),
        &FallbackFontPaths::new(),
        |_, _| {},
    )
    .unwrap();
    assert!(message.contains("not found"), "{}", message);
}
