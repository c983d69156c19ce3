//! Builds the dark-mode output document with lopdf.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat, dictionary};
use tracing::{debug, info, warn};
use ttf_parser::GlyphId;

use crate::error::{ConvertError, Stage};
use crate::extract::ImageData;
use crate::fallback::{FontHandle, FontProgram};
use crate::page::{EncodedText, FontSelection, PageCommand, PagePlan};
use crate::redraw::FontHost;
use crate::standard_fonts::StandardFont;
use crate::types::{Color, Point};

/// How the output file is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOptions {
    /// Flate-compress every stream.
    pub compress: bool,
    /// Drop unreferenced objects and renumber the rest.
    pub garbage: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        SaveOptions {
            compress: true,
            garbage: true,
        }
    }
}

struct RegisteredFont {
    handle: FontHandle,
    /// Reserved for the Type0 font dictionary, written on save.
    id: ObjectId,
    /// Glyph id → text, for widths and ToUnicode.
    used: BTreeMap<u16, String>,
}

/// An output PDF under construction.
pub struct OutputDocument {
    doc: Document,
    pages_id: ObjectId,
    page_ids: Vec<ObjectId>,
    standard_fonts: HashMap<StandardFont, ObjectId>,
    registered: BTreeMap<String, RegisteredFont>,
    /// Source image object → transplanted copy.
    images: HashMap<ObjectId, ObjectId>,
}

impl Default for OutputDocument {
    fn default() -> Self {
        Self::new()
    }
}

fn num(v: f32) -> Object {
    v.into()
}

fn color_operands(color: Color) -> Vec<Object> {
    vec![num(color.r), num(color.g), num(color.b)]
}

impl OutputDocument {
    pub fn new() -> OutputDocument {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        OutputDocument {
            doc,
            pages_id,
            page_ids: Vec::new(),
            standard_fonts: HashMap::new(),
            registered: BTreeMap::new(),
            images: HashMap::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    fn standard_font_id(&mut self, font: StandardFont) -> ObjectId {
        if let Some(id) = self.standard_fonts.get(&font) {
            return *id;
        }
        let mut dict = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => font.base_name(),
        };
        if !font.is_symbolic() {
            dict.set("Encoding", "WinAnsiEncoding");
        }
        let id = self.doc.add_object(dict);
        self.standard_fonts.insert(font, id);
        id
    }

    fn font_id(&mut self, font: &FontSelection) -> Option<ObjectId> {
        match font {
            FontSelection::Standard(font) => Some(self.standard_font_id(*font)),
            FontSelection::Registered(name) => self.registered.get(name).map(|f| f.id),
        }
    }

    /// Copy an image and everything it references into this document.
    fn transplant_image(&mut self, image: &ImageData) -> ObjectId {
        if let Some(id) = self.images.get(&image.id) {
            return *id;
        }
        let mut map = HashMap::new();
        map.insert(image.id, self.doc.new_object_id());
        for (old, _) in &image.dependencies {
            map.insert(*old, self.doc.new_object_id());
        }

        let mut stream = image.stream.clone();
        remap_dictionary(&mut stream.dict, &map);
        for (old, object) in &image.dependencies {
            let mut object = object.clone();
            remap_references(&mut object, &map);
            self.doc.objects.insert(map[old], object);
        }
        let id = map[&image.id];
        self.doc.objects.insert(id, Object::Stream(stream));
        self.images.insert(image.id, id);
        id
    }

    /// Append a page built from `plan`.
    pub fn add_page(&mut self, plan: &PagePlan) -> Result<(), ConvertError> {
        let height = plan.height;
        let flip = |p: Point| (p.x, height - p.y);
        let mut operations = Vec::new();
        let mut fonts = Dictionary::new();
        let mut xobjects = Dictionary::new();
        let mut font_names: HashMap<ObjectId, String> = HashMap::new();

        for command in plan.commands() {
            match command {
                PageCommand::Background(color) => {
                    operations.push(Operation::new("q", vec![]));
                    operations.push(Operation::new("rg", color_operands(*color)));
                    operations.push(Operation::new(
                        "re",
                        vec![num(0.), num(0.), num(plan.width), num(plan.height)],
                    ));
                    operations.push(Operation::new("f", vec![]));
                    operations.push(Operation::new("Q", vec![]));
                }
                PageCommand::Line {
                    from,
                    to,
                    color,
                    width,
                } => {
                    let (x0, y0) = flip(*from);
                    let (x1, y1) = flip(*to);
                    operations.push(Operation::new("q", vec![]));
                    operations.push(Operation::new("RG", color_operands(*color)));
                    operations.push(Operation::new("w", vec![num(*width)]));
                    operations.push(Operation::new("m", vec![num(x0), num(y0)]));
                    operations.push(Operation::new("l", vec![num(x1), num(y1)]));
                    operations.push(Operation::new("S", vec![]));
                    operations.push(Operation::new("Q", vec![]));
                }
                PageCommand::Rect {
                    rect,
                    stroke,
                    fill,
                    width,
                } => {
                    let (x, y) = flip(Point::new(rect.x0, rect.y1));
                    operations.push(Operation::new("q", vec![]));
                    operations.push(Operation::new("RG", color_operands(*stroke)));
                    if let Some(fill) = fill {
                        operations.push(Operation::new("rg", color_operands(*fill)));
                    }
                    operations.push(Operation::new("w", vec![num(*width)]));
                    operations.push(Operation::new(
                        "re",
                        vec![num(x), num(y), num(rect.width()), num(rect.height())],
                    ));
                    operations.push(Operation::new(
                        if fill.is_some() { "B" } else { "S" },
                        vec![],
                    ));
                    operations.push(Operation::new("Q", vec![]));
                }
                PageCommand::Text {
                    origin,
                    size,
                    color,
                    text,
                } => {
                    let Some(font_id) = self.font_id(&text.font) else {
                        return Err(ConvertError::unexpected(
                            Stage::Page(self.page_ids.len() as u32 + 1),
                            format!("font '{}' is not registered", text.font.name()),
                        ));
                    };
                    let next = font_names.len() + 1;
                    let resource = font_names
                        .entry(font_id)
                        .or_insert_with(|| format!("F{}", next))
                        .clone();
                    fonts.set(resource.as_bytes(), font_id);

                    let format = match text.font {
                        FontSelection::Standard(_) => StringFormat::Literal,
                        FontSelection::Registered(_) => StringFormat::Hexadecimal,
                    };
                    let (x, y) = flip(*origin);
                    operations.push(Operation::new("BT", vec![]));
                    operations.push(Operation::new(
                        "Tf",
                        vec![Object::Name(resource.into_bytes()), num(*size)],
                    ));
                    operations.push(Operation::new("rg", color_operands(*color)));
                    operations.push(Operation::new(
                        "Tm",
                        vec![num(1.), num(0.), num(0.), num(1.), num(x), num(y)],
                    ));
                    operations.push(Operation::new(
                        "Tj",
                        vec![Object::String(text.bytes.clone(), format)],
                    ));
                    operations.push(Operation::new("ET", vec![]));
                }
                PageCommand::Image { bbox, image } => {
                    let id = self.transplant_image(image);
                    let name = format!("Im{}", xobjects.len() + 1);
                    xobjects.set(name.as_bytes(), id);
                    let (x, y) = flip(Point::new(bbox.x0, bbox.y1));
                    operations.push(Operation::new("q", vec![]));
                    operations.push(Operation::new(
                        "cm",
                        vec![
                            num(bbox.width()),
                            num(0.),
                            num(0.),
                            num(bbox.height()),
                            num(x),
                            num(y),
                        ],
                    ));
                    operations.push(Operation::new("Do", vec![Object::Name(name.into_bytes())]));
                    operations.push(Operation::new("Q", vec![]));
                }
            }
        }

        let content = Content { operations }.encode()?;
        let content_id = self
            .doc
            .add_object(Stream::new(dictionary! {}, content));
        let mut resources = Dictionary::new();
        if !fonts.is_empty() {
            resources.set("Font", fonts);
        }
        if !xobjects.is_empty() {
            resources.set("XObject", xobjects);
        }
        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![num(0.), num(0.), num(plan.width), num(plan.height)],
            "Contents" => content_id,
            "Resources" => resources,
        };
        if plan.rotation.rem_euclid(360) != 0 {
            page.set("Rotate", plan.rotation.rem_euclid(360));
        }
        let page_id = self.doc.add_object(page);
        self.page_ids.push(page_id);
        debug!(
            "Added page {} with {} commands",
            self.page_ids.len(),
            plan.commands().len()
        );
        Ok(())
    }

    fn finish_fonts(&mut self) {
        let registered = std::mem::take(&mut self.registered);
        for (name, font) in &registered {
            self.write_type0_font(name, font);
        }
        self.registered = registered;
    }

    fn write_type0_font(&mut self, name: &str, font: &RegisteredFont) {
        let handle = &font.handle;
        let base_font = {
            let ps: String = handle
                .postscript_name()
                .chars()
                .filter(|c| c.is_ascii_graphic() && !"()<>[]{}/%#".contains(*c))
                .collect();
            if ps.is_empty() { name.to_owned() } else { ps }
        };

        let mut file_dict = dictionary! { "Length1" => handle.data().len() as i64 };
        if handle.program() == FontProgram::OpenTypeCff {
            file_dict.set("Subtype", "OpenType");
        }
        let file_id = self
            .doc
            .add_object(Stream::new(file_dict, handle.data().to_vec()));

        let mut flags: i64 = 32;
        if handle.is_monospaced {
            flags |= 1;
        }
        if handle.italic_angle != 0. {
            flags |= 64;
        }
        let scaled = |v: i16| num(handle.to_glyph_space(v as f32).round());
        let descriptor_id = self.doc.add_object(dictionary! {
            "Type" => "FontDescriptor",
            "FontName" => Object::Name(base_font.clone().into_bytes()),
            "Flags" => flags,
            "FontBBox" => handle.bbox.iter().map(|v| scaled(*v)).collect::<Vec<_>>(),
            "ItalicAngle" => num(handle.italic_angle),
            "Ascent" => scaled(handle.ascent),
            "Descent" => scaled(handle.descent),
            "CapHeight" => scaled(handle.cap_height),
            "StemV" => 80,
        });
        if let Ok(Object::Dictionary(descriptor)) = self.doc.get_object_mut(descriptor_id) {
            let key = match handle.program() {
                FontProgram::OpenTypeCff => "FontFile3",
                FontProgram::TrueType => "FontFile2",
            };
            descriptor.set(key, file_id);
        }

        let widths: Vec<Object> = font
            .used
            .keys()
            .flat_map(|&gid| {
                let advance = handle
                    .with_face(|face| face.glyph_hor_advance(GlyphId(gid)))
                    .flatten()
                    .unwrap_or(0);
                let width = handle.to_glyph_space(advance as f32).round();
                [Object::Integer(gid as i64), vec![num(width)].into()]
            })
            .collect();

        let mut cid_font = dictionary! {
            "Type" => "Font",
            "Subtype" => if handle.program() == FontProgram::OpenTypeCff { "CIDFontType0" } else { "CIDFontType2" },
            "BaseFont" => Object::Name(base_font.clone().into_bytes()),
            "CIDSystemInfo" => dictionary! {
                "Registry" => Object::string_literal("Adobe"),
                "Ordering" => Object::string_literal("Identity"),
                "Supplement" => 0,
            },
            "FontDescriptor" => descriptor_id,
            "DW" => 1000,
            "W" => widths,
        };
        if handle.program() == FontProgram::TrueType {
            cid_font.set("CIDToGIDMap", "Identity");
        }
        let cid_font_id = self.doc.add_object(cid_font);

        let to_unicode_id = self.doc.add_object(Stream::new(
            dictionary! {},
            to_unicode_cmap(&font.used).into_bytes(),
        ));

        self.doc.objects.insert(
            font.id,
            Object::Dictionary(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type0",
                "BaseFont" => Object::Name(base_font.into_bytes()),
                "Encoding" => "Identity-H",
                "DescendantFonts" => vec![Object::Reference(cid_font_id)],
                "ToUnicode" => to_unicode_id,
            }),
        );
        debug!(
            "Embedded fallback font '{}' with {} glyphs",
            name,
            font.used.len()
        );
    }

    /// Finish the document and write it to `path`. The file is written to a
    /// temporary sibling first and only moved into place once complete.
    pub fn save(mut self, path: &Path, options: SaveOptions) -> Result<(), ConvertError> {
        self.finish_fonts();

        let kids: Vec<Object> = self.page_ids.iter().map(|id| (*id).into()).collect();
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => self.page_ids.len() as i64,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        if options.garbage {
            let pruned = self.doc.prune_objects();
            if !pruned.is_empty() {
                debug!("Pruned {} unreferenced objects", pruned.len());
            }
            self.doc.renumber_objects();
        }
        if options.compress {
            self.doc.compress();
        }

        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let mut file = tempfile::NamedTempFile::new_in(dir)?;
        self.doc.save_to(&mut file)?;
        file.as_file().sync_all()?;
        file.persist(path).map_err(|e| ConvertError::IoError(e.error))?;
        info!(
            "Saved {} pages to {}",
            self.page_ids.len(),
            path.display()
        );
        Ok(())
    }
}

impl FontHost for OutputDocument {
    fn resolve_font(&self, name: &str) -> Option<FontSelection> {
        StandardFont::lookup(name).map(FontSelection::Standard)
    }

    fn missing_glyphs(&self, font: &FontSelection, text: &str) -> Vec<char> {
        match font {
            FontSelection::Standard(font) => font.missing_glyphs(text),
            // Fallback fonts are never glyph-checked; characters they lack
            // are encoded as glyph 0 by `encode_text`.
            FontSelection::Registered(_) => Vec::new(),
        }
    }

    fn is_registered(&self, name: &str) -> bool {
        self.registered.contains_key(name)
    }

    fn register_font(&mut self, name: &str, font: &FontHandle) -> Result<(), String> {
        if self.registered.contains_key(name) {
            return Ok(());
        }
        if font.with_face(|_| ()).is_none() {
            return Err(format!("font data for '{}' no longer parses", name));
        }
        let id = self.doc.new_object_id();
        self.registered.insert(
            name.to_owned(),
            RegisteredFont {
                handle: font.clone(),
                id,
                used: BTreeMap::new(),
            },
        );
        info!("Registered fallback font '{}' ({})", name, font.postscript_name());
        Ok(())
    }

    fn encode_text(&mut self, font: &FontSelection, text: &str) -> Result<EncodedText, String> {
        let bytes = match font {
            FontSelection::Standard(standard) => standard
                .encode(text)
                .map_err(|c| format!("no glyph for {:?} in {}", c, standard.base_name()))?,
            FontSelection::Registered(name) => {
                let font = self
                    .registered
                    .get_mut(name)
                    .ok_or_else(|| format!("font '{}' is not registered", name))?;
                let glyphs: Vec<(char, u16)> = font
                    .handle
                    .with_face(|face| {
                        text.chars()
                            .filter(|c| (*c as u32) >= 0x20)
                            .map(|c| (c, face.glyph_index(c).map(|g| g.0).unwrap_or(0)))
                            .collect()
                    })
                    .ok_or_else(|| format!("font data for '{}' no longer parses", name))?;
                let mut bytes = Vec::with_capacity(glyphs.len() * 2);
                for (c, gid) in glyphs {
                    if gid == 0 {
                        warn!("Fallback font '{}' has no glyph for {:?}", name, c);
                    } else {
                        font.used.entry(gid).or_insert_with(|| c.to_string());
                    }
                    bytes.extend_from_slice(&gid.to_be_bytes());
                }
                bytes
            }
        };
        Ok(EncodedText {
            font: font.clone(),
            bytes,
        })
    }
}

fn remap_dictionary(dict: &mut Dictionary, map: &HashMap<ObjectId, ObjectId>) {
    for (_, value) in dict.iter_mut() {
        remap_references(value, map);
    }
}

fn remap_references(object: &mut Object, map: &HashMap<ObjectId, ObjectId>) {
    match object {
        Object::Reference(id) => {
            if let Some(new) = map.get(id) {
                *id = *new;
            }
        }
        Object::Array(items) => items.iter_mut().for_each(|o| remap_references(o, map)),
        Object::Dictionary(dict) => remap_dictionary(dict, map),
        Object::Stream(stream) => remap_dictionary(&mut stream.dict, map),
        _ => {}
    }
}

fn to_unicode_cmap(used: &BTreeMap<u16, String>) -> String {
    let entries: Vec<(&u16, &String)> = used.iter().collect();
    let mut out = String::new();
    out.push_str("/CIDInit /ProcSet findresource begin\n");
    out.push_str("12 dict begin\n");
    out.push_str("begincmap\n");
    out.push_str("/CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n");
    out.push_str("/CMapName /Adobe-Identity-UCS def\n");
    out.push_str("/CMapType 2 def\n");
    out.push_str("1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n");
    for chunk in entries.chunks(100) {
        let _ = writeln!(out, "{} beginbfchar", chunk.len());
        for (gid, text) in chunk {
            let hex: String = text.encode_utf16().map(|u| format!("{:04X}", u)).collect();
            let _ = writeln!(out, "<{:04X}> <{}>", gid, hex);
        }
        out.push_str("endbfchar\n");
    }
    out.push_str("endcmap\n");
    out.push_str("CMapName currentdict /CMap defineresource pop\n");
    out.push_str("end\nend\n");
    out
}
