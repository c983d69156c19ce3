#![allow(dead_code)]

use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};

/// A minimal TrueType font mapping each of `chars` to its own glyph.
///
/// It has just enough tables (`cmap`, `head`, `hhea`, `hmtx`, `maxp`) to
/// parse; glyphs have no outlines.
pub fn truetype_font(chars: &str) -> Vec<u8> {
    let mut chars: Vec<char> = chars.chars().collect();
    chars.sort();
    chars.dedup();
    let num_glyphs = chars.len() as u16 + 1;

    let mut head = Vec::new();
    head.extend_from_slice(&0x0001_0000u32.to_be_bytes()); // version
    head.extend_from_slice(&0x0001_0000u32.to_be_bytes()); // fontRevision
    head.extend_from_slice(&0u32.to_be_bytes()); // checkSumAdjustment
    head.extend_from_slice(&0x5F0F_3CF5u32.to_be_bytes()); // magicNumber
    head.extend_from_slice(&0u16.to_be_bytes()); // flags
    head.extend_from_slice(&1000u16.to_be_bytes()); // unitsPerEm
    head.extend_from_slice(&[0; 16]); // created, modified
    for v in [0i16, -200, 1000, 800] {
        head.extend_from_slice(&v.to_be_bytes());
    }
    head.extend_from_slice(&0u16.to_be_bytes()); // macStyle
    head.extend_from_slice(&8u16.to_be_bytes()); // lowestRecPPEM
    head.extend_from_slice(&2i16.to_be_bytes()); // fontDirectionHint
    head.extend_from_slice(&0i16.to_be_bytes()); // indexToLocFormat
    head.extend_from_slice(&0i16.to_be_bytes()); // glyphDataFormat

    let mut hhea = Vec::new();
    hhea.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    for v in [800i16, -200, 0] {
        hhea.extend_from_slice(&v.to_be_bytes());
    }
    hhea.extend_from_slice(&600u16.to_be_bytes()); // advanceWidthMax
    for v in [0i16, 0, 600, 1, 0, 0, 0, 0, 0, 0, 0] {
        hhea.extend_from_slice(&v.to_be_bytes());
    }
    hhea.extend_from_slice(&num_glyphs.to_be_bytes()); // numberOfHMetrics

    let mut hmtx = Vec::new();
    for _ in 0..num_glyphs {
        hmtx.extend_from_slice(&600u16.to_be_bytes());
        hmtx.extend_from_slice(&0i16.to_be_bytes());
    }

    let mut maxp = Vec::new();
    maxp.extend_from_slice(&0x0000_5000u32.to_be_bytes());
    maxp.extend_from_slice(&num_glyphs.to_be_bytes());

    // Windows Unicode, format 12, one group per character
    let mut cmap = Vec::new();
    cmap.extend_from_slice(&0u16.to_be_bytes());
    cmap.extend_from_slice(&1u16.to_be_bytes());
    cmap.extend_from_slice(&3u16.to_be_bytes());
    cmap.extend_from_slice(&10u16.to_be_bytes());
    cmap.extend_from_slice(&12u32.to_be_bytes());
    cmap.extend_from_slice(&12u16.to_be_bytes());
    cmap.extend_from_slice(&0u16.to_be_bytes());
    cmap.extend_from_slice(&(16 + 12 * chars.len() as u32).to_be_bytes());
    cmap.extend_from_slice(&0u32.to_be_bytes());
    cmap.extend_from_slice(&(chars.len() as u32).to_be_bytes());
    for (i, c) in chars.iter().enumerate() {
        cmap.extend_from_slice(&(*c as u32).to_be_bytes());
        cmap.extend_from_slice(&(*c as u32).to_be_bytes());
        cmap.extend_from_slice(&(i as u32 + 1).to_be_bytes());
    }

    let tables: [(&[u8; 4], Vec<u8>); 5] = [
        (b"cmap", cmap),
        (b"head", head),
        (b"hhea", hhea),
        (b"hmtx", hmtx),
        (b"maxp", maxp),
    ];

    let mut font = Vec::new();
    font.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    font.extend_from_slice(&(tables.len() as u16).to_be_bytes());
    font.extend_from_slice(&[0, 64, 0, 2, 0, 16]); // searchRange, entrySelector, rangeShift
    let mut offset = 12 + 16 * tables.len();
    let mut body = Vec::new();
    for (tag, data) in &tables {
        font.extend_from_slice(*tag);
        font.extend_from_slice(&0u32.to_be_bytes());
        font.extend_from_slice(&(offset as u32).to_be_bytes());
        font.extend_from_slice(&(data.len() as u32).to_be_bytes());
        body.extend_from_slice(data);
        while body.len() % 4 != 0 {
            body.push(0);
        }
        offset = 12 + 16 * tables.len() + body.len();
    }
    font.extend_from_slice(&body);
    font
}

pub fn write_font(dir: &Path, name: &str, chars: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, truetype_font(chars)).unwrap();
    path
}

pub fn op(operator: &str, operands: Vec<Object>) -> Operation {
    Operation::new(operator, operands)
}

/// One page of a test document.
pub struct TestPage {
    pub width: f32,
    pub height: f32,
    pub operations: Vec<Operation>,
    pub fonts: Dictionary,
    pub xobjects: Dictionary,
}

impl TestPage {
    pub fn new(width: f32, height: f32) -> Self {
        TestPage {
            width,
            height,
            operations: Vec::new(),
            fonts: Dictionary::new(),
            xobjects: Dictionary::new(),
        }
    }
}

/// Builds a source document in memory.
pub struct TestPdf {
    pub doc: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
}

impl TestPdf {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        TestPdf {
            doc,
            pages_id,
            kids: Vec::new(),
        }
    }

    pub fn helvetica(&mut self) -> ObjectId {
        self.doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        })
    }

    /// Helvetica re-encoded so that codes from 128 on show `chars`.
    pub fn helvetica_with(&mut self, chars: &str) -> ObjectId {
        let mut differences: Vec<Object> = vec![128.into()];
        for c in chars.chars() {
            differences.push(Object::Name(format!("uni{:04X}", c as u32).into_bytes()));
        }
        self.doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => dictionary! {
                "Type" => "Encoding",
                "BaseEncoding" => "WinAnsiEncoding",
                "Differences" => differences,
            },
        })
    }

    /// A 2×2 gray image.
    pub fn image(&mut self) -> ObjectId {
        self.doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 2,
                "Height" => 2,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            vec![0x00, 0x40, 0x80, 0xff],
        ))
    }

    pub fn add_page(&mut self, page: TestPage) -> ObjectId {
        let content = Content {
            operations: page.operations,
        }
        .encode()
        .unwrap();
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, content));
        let mut resources = Dictionary::new();
        resources.set("Font", page.fonts);
        resources.set("XObject", page.xobjects);
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![Object::Integer(0), Object::Integer(0), page.width.into(), page.height.into()],
            "Contents" => content_id,
            "Resources" => resources,
        });
        self.kids.push(page_id.into());
        page_id
    }

    pub fn to_bytes(mut self) -> Vec<u8> {
        let count = self.kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => self.kids,
                "Count" => count,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);
        let mut bytes = Vec::new();
        self.doc.save_to(&mut bytes).unwrap();
        bytes
    }

    pub fn save(self, path: &Path) {
        std::fs::write(path, self.to_bytes()).unwrap();
    }
}

/// `BT /F1 size Tf x y Td (text) Tj ET`
pub fn show_text(font: &str, size: f32, x: f32, y: f32, text: &[u8]) -> Vec<Operation> {
    vec![
        op("BT", vec![]),
        op("Tf", vec![Object::Name(font.as_bytes().to_vec()), size.into()]),
        op("Td", vec![x.into(), y.into()]),
        op("Tj", vec![Object::string_literal(text.to_vec())]),
        op("ET", vec![]),
    ]
}

/// Content operations of the 1-based `page` of `doc`.
pub fn page_operations(doc: &Document, page: u32) -> Vec<Operation> {
    let id = doc.get_pages()[&page];
    let content = doc.get_page_content(id).unwrap();
    Content::decode(&content).unwrap().operations
}

pub fn operators(ops: &[Operation]) -> Vec<&str> {
    ops.iter().map(|o| o.operator.as_str()).collect()
}

pub fn as_f32(o: &Object) -> f32 {
    match o {
        Object::Integer(i) => *i as f32,
        Object::Real(r) => *r as f32,
        _ => panic!("not a number: {:?}", o),
    }
}
