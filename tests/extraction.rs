mod common;

use common::{TestPage, TestPdf, op, show_text};
use lopdf::{Object, Stream, dictionary};
use pdf_darkmode::{Color, PathItem, PathItemKind, Point, Rect, SourceDocument, SpanFlags};

fn approx(a: Point, b: Point) -> bool {
    (a.x - b.x).abs() < 0.01 && (a.y - b.y).abs() < 0.01
}

#[test_log::test]
fn spans_come_out_in_reading_order() {
    let mut pdf = TestPdf::new();
    let font = pdf.helvetica();
    let mut page = TestPage::new(400., 300.);
    page.fonts.set("F1", font);
    page.operations.extend(show_text("F1", 10., 20., 280., b"Title"));
    page.operations.extend([
        op("BT", vec![]),
        op("Tf", vec![Object::Name(b"F1".to_vec()), 8.into()]),
        op("Td", vec![20.into(), 250.into()]),
        op("Tj", vec![Object::string_literal("first line")]),
        op("Td", vec![0.into(), (-12).into()]),
        op("Tj", vec![Object::string_literal("second line")]),
        op("ET", vec![]),
    ]);
    pdf.add_page(page);

    let source = SourceDocument::from_bytes(&pdf.to_bytes(), None).unwrap();
    assert_eq!(source.page_count(), 1);
    let page = source.page(0).unwrap();
    assert_eq!(page.number, 1);
    assert_eq!((page.width, page.height), (400., 300.));

    assert_eq!(page.blocks.len(), 2);
    assert_eq!(page.blocks[1].len(), 2);
    let texts: Vec<&str> = page.spans().map(|s| s.text.as_str()).collect();
    assert_eq!(texts, vec!["Title", "first line", "second line"]);

    let title = page.spans().next().unwrap();
    assert_eq!(title.font_name, "Helvetica");
    assert_eq!(title.size, 10.);
    assert!(approx(title.origin, Point::new(20., 20.)));
    assert_eq!(title.flags, SpanFlags::empty());
}

#[test_log::test]
fn differences_decode_to_unicode() {
    let mut pdf = TestPdf::new();
    let font = pdf.helvetica_with("Жук");
    let mut page = TestPage::new(200., 200.);
    page.fonts.set("F1", font);
    page.operations
        .extend(show_text("F1", 12., 10., 100., &[128, 129, 130, b'!']));
    pdf.add_page(page);

    let source = SourceDocument::from_bytes(&pdf.to_bytes(), None).unwrap();
    let page = source.page(0).unwrap();
    let span = page.spans().next().unwrap();
    assert_eq!(span.text, "Жук!");
}

#[test_log::test]
fn paths_keep_kind_color_and_width() {
    let mut pdf = TestPdf::new();
    let mut page = TestPage::new(200., 200.);
    page.operations.extend([
        // red stroked line, 2pt
        op("RG", vec![1.into(), 0.into(), 0.into()]),
        op("w", vec![2.into()]),
        op("m", vec![10.into(), 190.into()]),
        op("l", vec![110.into(), 190.into()]),
        op("S", vec![]),
        // gray filled rectangle
        op("g", vec![0.5f32.into()]),
        op("re", vec![10.into(), 10.into(), 50.into(), 20.into()]),
        op("f", vec![]),
        // stroked curve under a 2x scale
        op("q", vec![]),
        op("cm", vec![2.into(), 0.into(), 0.into(), 2.into(), 0.into(), 0.into()]),
        op("w", vec![1.into()]),
        op("m", vec![0.into(), 0.into()]),
        op("c", vec![10.into(), 0.into(), 10.into(), 10.into(), 20.into(), 10.into()]),
        op("S", vec![]),
        op("Q", vec![]),
    ]);
    pdf.add_page(page);

    let source = SourceDocument::from_bytes(&pdf.to_bytes(), None).unwrap();
    let page = source.page(0).unwrap();
    assert_eq!(page.paths.len(), 3);

    let line = &page.paths[0];
    assert_eq!(line.first_kind(), Some(PathItemKind::Line));
    assert_eq!(line.stroke_color, Some(Color::rgb(1., 0., 0.)));
    assert!(line.is_stroked());
    assert!(!line.is_filled());
    assert_eq!(line.width, Some(2.));
    match &line.items[0] {
        PathItem::Line(from, to) => {
            assert!(approx(*from, Point::new(10., 10.)));
            assert!(approx(*to, Point::new(110., 10.)));
        }
        other => panic!("expected a line, got {:?}", other),
    }

    let rect = &page.paths[1];
    assert_eq!(rect.first_kind(), Some(PathItemKind::Rect));
    assert!(rect.is_filled());
    assert!(!rect.is_stroked());
    assert_eq!(rect.fill_color, Some(Color::gray(0.5)));
    assert_eq!(rect.items[0], PathItem::Rect(Rect::new(10., 170., 60., 190.)));

    let curve = &page.paths[2];
    assert_eq!(curve.first_kind(), Some(PathItemKind::Curve));
    assert_eq!(curve.width, Some(2.));
    match &curve.items[0] {
        PathItem::Curve(points) => assert!(approx(points[3], Point::new(40., 180.))),
        other => panic!("expected a curve, got {:?}", other),
    }
}

#[test_log::test]
fn images_inside_forms_are_found() {
    let mut pdf = TestPdf::new();
    let image = pdf.image();
    let form = pdf.doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(1), Object::Integer(1)],
            "Matrix" => vec![Object::Integer(100), Object::Integer(0), Object::Integer(0), Object::Integer(50), Object::Integer(10), Object::Integer(20)],
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image },
            },
        },
        b"/Im0 Do".to_vec(),
    ));
    let mut page = TestPage::new(200., 200.);
    page.xobjects.set("Fm1", form);
    page.operations
        .push(op("Do", vec![Object::Name(b"Fm1".to_vec())]));
    pdf.add_page(page);

    let source = SourceDocument::from_bytes(&pdf.to_bytes(), None).unwrap();
    let page = source.page(0).unwrap();
    assert_eq!(page.images.len(), 1);
    assert_eq!(page.images[0].bbox, Rect::new(10., 130., 110., 180.));

    let data = source.extract_image(page.images[0].image).unwrap();
    assert_eq!(data.width(), Some(2));
    assert_eq!(data.height(), Some(2));
    assert_eq!(data.bytes(), &[0x00, 0x40, 0x80, 0xff]);
}

#[test_log::test]
fn rotation_and_offset_media_box_are_read() {
    let mut pdf = TestPdf::new();
    let page_id = pdf.add_page(TestPage::new(300., 500.));
    let page = pdf.doc.get_object_mut(page_id).unwrap().as_dict_mut().unwrap();
    page.set("Rotate", 90);
    page.set(
        "MediaBox",
        vec![Object::Integer(50), Object::Integer(50), Object::Integer(350), Object::Integer(550)],
    );

    let source = SourceDocument::from_bytes(&pdf.to_bytes(), None).unwrap();
    let page = source.page(0).unwrap();
    assert_eq!(page.rotation, 90);
    assert_eq!((page.width, page.height), (300., 500.));
}

#[test]
fn garbage_is_not_a_pdf() {
    assert!(SourceDocument::from_bytes(b"hello", None).is_err());
}
