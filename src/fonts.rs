use std::collections::{HashMap, hash_map::Entry};
use std::fmt::{self, Debug};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;
use std::slice::Iter;

use adobe_cmap_parser::{ByteMapping, CIDRange, CodeRange};
use lopdf::{Dictionary, Document, Object};
use tracing::{debug, warn};
use unicode_normalization::UnicodeNormalization;

use crate::data::{
    encoding_table, glyph_name_to_unicode, pdf_doc_encoding, standard_encoding, win_ansi_encoding,
};
use crate::standard_fonts::StandardFont;
use crate::types::SpanFlags;
use crate::utils::*;

pub(crate) type CharCode = u32;

// Font descriptor /Flags bits.
const FLAG_FIXED_PITCH: i64 = 1;
const FLAG_SERIF: i64 = 1 << 1;
const FLAG_ITALIC: i64 = 1 << 6;
const FLAG_FORCE_BOLD: i64 = 1 << 18;

pub(crate) struct PdfSimpleFont<'a> {
    font: &'a Dictionary,
    base_name: String,
    standard: Option<StandardFont>,
    encoding: Option<Vec<u16>>,
    unicode_map: Option<HashMap<CharCode, String>>,
    widths: HashMap<CharCode, f32>,
    missing_width: f32,
    flags: SpanFlags,
}

pub(crate) struct PdfType3Font<'a> {
    font: &'a Dictionary,
    base_name: String,
    encoding: Option<Vec<u16>>,
    unicode_map: Option<HashMap<CharCode, String>>,
    widths: HashMap<CharCode, f32>,
    /// Glyph space to 1000-unit text space.
    width_scale: f32,
}

pub(crate) struct PdfCIDFont<'a> {
    font: &'a Dictionary,
    base_name: String,
    encoding: ByteMapping,
    to_unicode: Option<HashMap<CharCode, String>>,
    fallback_unicode: Option<HashMap<CharCode, String>>,
    widths: HashMap<CharCode, f32>,
    default_width: f32,
    flags: SpanFlags,
}

pub(crate) struct PdfFontIter<'a> {
    i: Iter<'a, u8>,
    font: &'a dyn PdfFont,
}

impl<'a> Iterator for PdfFontIter<'a> {
    type Item = (CharCode, u8);
    fn next(&mut self) -> Option<(CharCode, u8)> {
        self.font.next_char(&mut self.i)
    }
}

pub(crate) trait PdfFont: Debug {
    /// Advance width in thousandths of text space.
    fn get_width(&self, id: CharCode) -> f32;
    fn next_char(&self, iter: &mut Iter<u8>) -> Option<(CharCode, u8)>;
    fn decode_char(&self, char: CharCode) -> String;
    fn get_font_name(&self) -> &str;
    fn style_flags(&self) -> SpanFlags;
}

impl<'a> dyn PdfFont + 'a {
    pub(crate) fn char_codes(&'a self, chars: &'a [u8]) -> PdfFontIter<'a> {
        PdfFontIter {
            i: chars.iter(),
            font: self,
        }
    }
}

pub(crate) fn make_font<'a>(doc: &'a Document, font: &'a Dictionary) -> Rc<dyn PdfFont + 'a> {
    let subtype = maybe_get_name_string(doc, font, b"Subtype").unwrap_or_default();
    debug!("MakeFont({})", subtype);
    if subtype == "Type0" {
        if let Some(cid_font) = PdfCIDFont::new(doc, font) {
            return Rc::new(cid_font);
        }
        warn!("Type0 font without a usable descendant; decoding it as a simple font");
    }
    if subtype == "Type3" {
        Rc::new(PdfType3Font::new(doc, font))
    } else {
        Rc::new(PdfSimpleFont::new(doc, font))
    }
}

fn unicode_units(s: &str) -> Option<u16> {
    let mut units = s.encode_utf16();
    match (units.next(), units.next()) {
        (Some(u), None) => Some(u),
        _ => None,
    }
}

/// Apply a `/Differences` array onto `table`, reconciling with an existing
/// ToUnicode map.
fn apply_differences(
    doc: &Document,
    differences: &[Object],
    table: &mut [u16],
    unicode_map: &mut Option<HashMap<CharCode, String>>,
    base_name: &str,
) {
    let mut code: i64 = 0;
    for o in differences {
        match maybe_deref(doc, o) {
            &Object::Integer(i) => code = i,
            Object::Name(n) => {
                let name = pdf_to_utf8(n);
                let unicode = glyph_name_to_unicode(&name);
                match (&unicode, usize::try_from(code)) {
                    (Some(s), Ok(idx)) if idx < table.len() => {
                        if let Some(u) = unicode_units(s) {
                            table[idx] = u;
                        }
                        if let Some(unicode_map) = unicode_map {
                            match unicode_map.entry(code as CharCode) {
                                Entry::Vacant(v) => {
                                    v.insert(s.clone());
                                }
                                Entry::Occupied(e) => {
                                    if e.get() != s && !e.get().nfkc().eq(s.nfkc()) {
                                        warn!(
                                            "Unicode mismatch for {} in {}: ToUnicode {:?}, glyph name {:?}",
                                            name,
                                            base_name,
                                            e.get(),
                                            s
                                        );
                                    }
                                }
                            }
                        }
                    }
                    _ => debug!("unknown glyph name '{}' for font {}", name, base_name),
                }
                code += 1;
            }
            other => debug!("unexpected Differences entry {:?}", other),
        }
    }
}

/// The code → UTF-16 table for a simple font's `/Encoding`.
fn simple_encoding_table(
    doc: &Document,
    font: &Dictionary,
    builtin: Option<Vec<u16>>,
    default: Option<Vec<u16>>,
    unicode_map: &mut Option<HashMap<CharCode, String>>,
    base_name: &str,
) -> Option<Vec<u16>> {
    match maybe_get_obj(doc, font, b"Encoding") {
        Some(Object::Name(name)) => {
            debug!("encoding {:?}", pdf_to_utf8(name));
            let table = encoding_table(name);
            if table.is_none() {
                warn!(
                    "unexpected encoding {:?} for font {}",
                    pdf_to_utf8(name),
                    base_name
                );
            }
            table.or(builtin).or(default)
        }
        Some(Object::Dictionary(encoding)) => {
            let mut table = maybe_get_name(doc, encoding, b"BaseEncoding")
                .and_then(encoding_table)
                .or(builtin)
                .or(default)
                .unwrap_or_else(standard_encoding);
            if let Some(differences) = maybe_get_array(doc, encoding, b"Differences") {
                apply_differences(doc, differences, &mut table, unicode_map, base_name);
            }
            Some(table)
        }
        None => builtin.or(default),
        Some(other) => {
            warn!("unsupported encoding object {:?} for {}", other, base_name);
            builtin.or(default)
        }
    }
}

/// Encoding stored inside an embedded Type 1 font program.
fn type1_builtin_encoding(doc: &Document, descriptor: &Dictionary) -> Option<Vec<u16>> {
    let file = match maybe_get_obj(doc, descriptor, b"FontFile") {
        Some(Object::Stream(s)) => s,
        _ => return None,
    };
    let contents = get_contents(file);
    let map = type1_encoding_parser::get_encoding_map(&contents).ok()?;
    let mut table = vec![0u16; 256];
    for (code, name) in map {
        let name = pdf_to_utf8(&name);
        let unicode = glyph_name_to_unicode(&name).and_then(|s| unicode_units(&s));
        match (usize::try_from(code), unicode) {
            (Ok(idx), Some(u)) if idx < table.len() => table[idx] = u,
            _ => debug!("unknown character {} in builtin encoding", name),
        }
    }
    Some(table)
}

/// Style flags from a font descriptor.
fn descriptor_flags(doc: &Document, descriptor: &Dictionary) -> SpanFlags {
    let bits = maybe_get::<i64>(doc, descriptor, b"Flags").unwrap_or(0);
    let mut flags = SpanFlags::empty();
    if bits & FLAG_FIXED_PITCH != 0 {
        flags |= SpanFlags::MONOSPACE;
    }
    if bits & FLAG_SERIF != 0 {
        flags |= SpanFlags::SERIF;
    }
    if bits & FLAG_ITALIC != 0
        || maybe_get::<f32>(doc, descriptor, b"ItalicAngle").is_some_and(|a| a != 0.)
    {
        flags |= SpanFlags::ITALIC;
    }
    if bits & FLAG_FORCE_BOLD != 0
        || maybe_get::<f32>(doc, descriptor, b"FontWeight").is_some_and(|w| w >= 600.)
    {
        flags |= SpanFlags::BOLD;
    }
    flags
}

fn first_char_widths(doc: &Document, font: &Dictionary) -> HashMap<CharCode, f32> {
    let mut width_map = HashMap::new();
    if let (Some(first_char), Some(widths)) = (
        maybe_get::<i64>(doc, font, b"FirstChar"),
        maybe_get::<Vec<f32>>(doc, font, b"Widths"),
    ) {
        let last_char = maybe_get::<i64>(doc, font, b"LastChar");
        if last_char.is_some_and(|l| l != first_char + widths.len() as i64 - 1) {
            debug!(
                "Widths length {} disagrees with FirstChar {} / LastChar {:?}",
                widths.len(),
                first_char,
                last_char
            );
        }
        for (i, w) in widths.into_iter().enumerate() {
            width_map.insert((first_char + i as i64) as CharCode, w);
        }
    }
    width_map
}

fn decode_with_tables(
    char: CharCode,
    unicode_map: &Option<HashMap<CharCode, String>>,
    encoding: &Option<Vec<u16>>,
) -> String {
    if let Some(s) = unicode_map.as_ref().and_then(|m| m.get(&char)) {
        return s.clone();
    }
    let slice = [char as u8];
    match encoding {
        Some(encoding) => to_utf8(encoding, &slice),
        None => to_utf8(pdf_doc_encoding(), &slice),
    }
}

impl<'a> PdfSimpleFont<'a> {
    fn new(doc: &'a Document, font: &'a Dictionary) -> PdfSimpleFont<'a> {
        let base_name = maybe_get_name_string(doc, font, b"BaseFont").unwrap_or_default();
        let subtype = maybe_get_name_string(doc, font, b"Subtype").unwrap_or_default();
        let standard = StandardFont::lookup(&base_name);
        debug!("base_name {} {} standard:{:?}", base_name, subtype, standard);

        let descriptor: Option<&Dictionary> = maybe_get(doc, font, b"FontDescriptor");
        let builtin = match descriptor {
            Some(descriptor) if subtype == "Type1" => type1_builtin_encoding(doc, descriptor),
            _ => None,
        };

        let default = if standard.is_some_and(|s| s.is_symbolic()) {
            None
        } else if subtype == "TrueType" {
            Some(win_ansi_encoding())
        } else {
            Some(standard_encoding())
        };

        let mut unicode_map = get_unicode_map(doc, font);
        let encoding = simple_encoding_table(
            doc,
            font,
            builtin,
            default,
            &mut unicode_map,
            &base_name,
        );

        let flags = match (descriptor, standard) {
            (Some(descriptor), _) => descriptor_flags(doc, descriptor),
            (None, Some(standard)) => standard.style_flags(),
            (None, None) => SpanFlags::empty(),
        };

        let missing_width = descriptor
            .and_then(|d| maybe_get::<f32>(doc, d, b"MissingWidth"))
            .or_else(|| maybe_get::<f32>(doc, font, b"MissingWidth"))
            .unwrap_or(0.);

        PdfSimpleFont {
            font,
            base_name,
            standard,
            widths: first_char_widths(doc, font),
            encoding,
            missing_width,
            unicode_map,
            flags,
        }
    }
}

impl<'a> PdfFont for PdfSimpleFont<'a> {
    fn get_width(&self, id: CharCode) -> f32 {
        if let Some(width) = self.widths.get(&id) {
            return *width;
        }
        match self.standard {
            Some(standard) if self.widths.is_empty() => self
                .decode_char(id)
                .chars()
                .next()
                .map(|c| standard.glyph_width(c))
                .unwrap_or(self.missing_width),
            _ => {
                debug!(
                    "missing width for {} in {}, falling back to missing_width",
                    id, self.base_name
                );
                self.missing_width
            }
        }
    }

    fn next_char(&self, iter: &mut Iter<u8>) -> Option<(CharCode, u8)> {
        iter.next().map(|x| (*x as CharCode, 1))
    }

    fn decode_char(&self, char: CharCode) -> String {
        decode_with_tables(char, &self.unicode_map, &self.encoding)
    }

    fn get_font_name(&self) -> &str {
        &self.base_name
    }

    fn style_flags(&self) -> SpanFlags {
        self.flags
    }
}

impl<'a> fmt::Debug for PdfSimpleFont<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.font.fmt(f)
    }
}

impl<'a> PdfType3Font<'a> {
    fn new(doc: &'a Document, font: &'a Dictionary) -> PdfType3Font<'a> {
        let base_name = maybe_get_name_string(doc, font, b"Name")
            .or_else(|| maybe_get_name_string(doc, font, b"BaseFont"))
            .unwrap_or_else(|| "Type3".to_owned());
        let mut unicode_map = get_unicode_map(doc, font);
        let encoding =
            simple_encoding_table(doc, font, None, None, &mut unicode_map, &base_name);

        let width_scale = maybe_get::<Vec<f32>>(doc, font, b"FontMatrix")
            .and_then(|m| m.first().copied())
            .map(|a| a * 1000.)
            .unwrap_or(1.);

        PdfType3Font {
            font,
            base_name,
            widths: first_char_widths(doc, font),
            encoding,
            unicode_map,
            width_scale,
        }
    }
}

impl<'a> PdfFont for PdfType3Font<'a> {
    fn get_width(&self, id: CharCode) -> f32 {
        match self.widths.get(&id) {
            Some(width) => *width * self.width_scale,
            None => {
                debug!("missing width for {} in Type3 font {}", id, self.base_name);
                0.
            }
        }
    }

    fn next_char(&self, iter: &mut Iter<u8>) -> Option<(CharCode, u8)> {
        iter.next().map(|x| (*x as CharCode, 1))
    }

    fn decode_char(&self, char: CharCode) -> String {
        decode_with_tables(char, &self.unicode_map, &self.encoding)
    }

    fn get_font_name(&self) -> &str {
        &self.base_name
    }

    fn style_flags(&self) -> SpanFlags {
        SpanFlags::empty()
    }
}

impl<'a> fmt::Debug for PdfType3Font<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.font.fmt(f)
    }
}

fn get_unicode_map(doc: &Document, font: &Dictionary) -> Option<HashMap<CharCode, String>> {
    match maybe_get_obj(doc, font, b"ToUnicode") {
        Some(Object::Stream(stream)) => {
            let contents = get_contents(stream);
            // the CMap parser panics on some malformed input
            let cmap = match catch_unwind(AssertUnwindSafe(|| {
                adobe_cmap_parser::get_unicode_map(&contents)
            })) {
                Ok(Ok(cmap)) => cmap,
                Ok(Err(e)) => {
                    warn!("unreadable ToUnicode CMap: {:?}", e);
                    return None;
                }
                Err(_) => {
                    warn!("ToUnicode CMap parser failed, ignoring the map");
                    return None;
                }
            };

            let mut unicode = HashMap::new();
            for (&k, v) in cmap.iter() {
                let be: Vec<u16> = v
                    .chunks_exact(2)
                    .map(|c| u16::from_be_bytes([c[0], c[1]]))
                    .collect();
                if let [0xd800..=0xdfff] = &be[..] {
                    continue;
                }
                match String::from_utf16(&be) {
                    Ok(s) => {
                        unicode.insert(k, s);
                    }
                    Err(_) => debug!("invalid UTF-16 for code {} in ToUnicode", k),
                }
            }
            Some(unicode)
        }
        Some(Object::Name(name)) => {
            let name = pdf_to_utf8(name);
            if name != "Identity-H" {
                debug!("unsupported ToUnicode name: {:?}", name);
            }
            None
        }
        None => None,
        Some(other) => {
            debug!("unsupported ToUnicode object {:?}", other);
            None
        }
    }
}

/// CID → text recovered from the cmap of an embedded TrueType program.
fn get_fallback_unicode_from_font(
    doc: &Document,
    ciddict: &Dictionary,
) -> Option<HashMap<CharCode, String>> {
    let font_descriptor: &Dictionary = maybe_get(doc, ciddict, b"FontDescriptor")?;

    let cid_to_gid = match maybe_get_obj(doc, ciddict, b"CIDToGIDMap") {
        Some(Object::Stream(stream)) => {
            let data = get_contents(stream);
            let map: HashMap<u32, u32> = data
                .chunks_exact(2)
                .enumerate()
                .filter_map(|(cid, chunk)| {
                    let gid = u16::from_be_bytes([chunk[0], chunk[1]]) as u32;
                    (gid != 0).then_some((cid as u32, gid))
                })
                .collect();
            debug!("Loaded CIDToGIDMap with {} entries", map.len());
            Some(map)
        }
        _ => None,
    };

    let font_stream: &lopdf::Stream = maybe_get(doc, font_descriptor, b"FontFile2")
        .or_else(|| maybe_get(doc, font_descriptor, b"FontFile3"))?;
    let font_data = get_contents(font_stream);
    let face = ttf_parser::Face::parse(&font_data, 0).ok()?;

    let mut gid_to_unicode: HashMap<u32, String> = HashMap::new();
    for subtable in face.tables().cmap.iter().flat_map(|cmap| cmap.subtables) {
        if !subtable.is_unicode() {
            continue;
        }
        subtable.codepoints(|codepoint| {
            if let (Some(gid), Some(c)) = (subtable.glyph_index(codepoint), char::from_u32(codepoint))
            {
                gid_to_unicode
                    .entry(gid.0 as u32)
                    .or_insert_with(|| c.to_string());
            }
        });
    }

    let fallback_map: HashMap<CharCode, String> = match cid_to_gid {
        Some(cid_to_gid) => cid_to_gid
            .iter()
            .filter_map(|(&cid, gid)| gid_to_unicode.get(gid).map(|s| (cid, s.clone())))
            .collect(),
        None => gid_to_unicode,
    };
    debug!(
        "Built fallback Unicode map from embedded font with {} entries",
        fallback_map.len()
    );
    (!fallback_map.is_empty()).then_some(fallback_map)
}

fn identity_mapping() -> ByteMapping {
    ByteMapping {
        codespace: vec![CodeRange {
            width: 2,
            start: 0,
            end: 0xffff,
        }],
        cid: vec![CIDRange {
            src_code_lo: 0,
            src_code_hi: 0xffff,
            dst_CID_lo: 0,
        }],
    }
}

/// Parse a CID font `/W` array.
fn cid_widths(doc: &Document, w: &[Object]) -> HashMap<CharCode, f32> {
    let mut widths = HashMap::new();
    let mut i = 0;
    while i < w.len() {
        let first = match maybe_deref(doc, &w[i]) {
            &Object::Integer(first) => first,
            other => {
                debug!("unexpected /W entry {:?}", other);
                break;
            }
        };
        match w.get(i + 1).map(|o| maybe_deref(doc, o)) {
            Some(Object::Array(wa)) => {
                for (j, width) in wa.iter().enumerate() {
                    if let Some(width) = as_num(maybe_deref(doc, width)) {
                        widths.insert((first + j as i64) as CharCode, width);
                    }
                }
                i += 2;
            }
            Some(&Object::Integer(last)) => {
                if let Some(width) = w.get(i + 2).and_then(|o| as_num(maybe_deref(doc, o))) {
                    for id in first..=last {
                        widths.insert(id as CharCode, width);
                    }
                }
                i += 3;
            }
            _ => break,
        }
    }
    widths
}

impl<'a> PdfCIDFont<'a> {
    fn new(doc: &'a Document, font: &'a Dictionary) -> Option<PdfCIDFont<'a>> {
        let base_name = maybe_get_name_string(doc, font, b"BaseFont").unwrap_or_default();
        let descendants = maybe_get_array(doc, font, b"DescendantFonts")?;
        let ciddict = maybe_deref(doc, descendants.first()?).as_dict().ok()?;

        let encoding = match maybe_get_obj(doc, font, b"Encoding") {
            Some(Object::Name(name)) => {
                let name = pdf_to_utf8(name);
                if name != "Identity-H" && name != "Identity-V" {
                    warn!("unsupported CMap {}, reading codes as Identity", name);
                }
                identity_mapping()
            }
            Some(Object::Stream(stream)) => {
                let contents = get_contents(stream);
                match catch_unwind(AssertUnwindSafe(|| {
                    adobe_cmap_parser::get_byte_mapping(&contents)
                })) {
                    Ok(Ok(mapping)) => mapping,
                    Ok(Err(e)) => {
                        warn!("unreadable encoding CMap ({:?}), reading codes as Identity", e);
                        identity_mapping()
                    }
                    Err(_) => {
                        warn!("encoding CMap parser failed, reading codes as Identity");
                        identity_mapping()
                    }
                }
            }
            _ => identity_mapping(),
        };

        let default_width = maybe_get::<f32>(doc, ciddict, b"DW").unwrap_or(1000.);
        let widths = maybe_get_array(doc, ciddict, b"W")
            .map(|w| cid_widths(doc, w))
            .unwrap_or_default();
        let flags = maybe_get::<&Dictionary>(doc, ciddict, b"FontDescriptor")
            .map(|d| descriptor_flags(doc, d))
            .unwrap_or_default();

        Some(PdfCIDFont {
            font,
            base_name,
            widths,
            to_unicode: get_unicode_map(doc, font),
            fallback_unicode: get_fallback_unicode_from_font(doc, ciddict),
            encoding,
            default_width,
            flags,
        })
    }
}

impl<'a> PdfFont for PdfCIDFont<'a> {
    fn get_width(&self, id: CharCode) -> f32 {
        self.widths.get(&id).copied().unwrap_or(self.default_width)
    }

    fn next_char(&self, iter: &mut Iter<u8>) -> Option<(CharCode, u8)> {
        let mut c = *iter.next()? as u32;
        let mut code = None;
        'outer: for width in 1..=4 {
            for range in &self.encoding.codespace {
                if c >= range.start && c <= range.end && range.width == width {
                    code = Some((c, width));
                    break 'outer;
                }
            }
            let next = *iter.next()?;
            c = (c << 8) | next as u32;
        }
        let code = code?;
        for range in &self.encoding.cid {
            if code.0 >= range.src_code_lo && code.0 <= range.src_code_hi {
                return Some((code.0 - range.src_code_lo + range.dst_CID_lo, code.1 as u8));
            }
        }
        None
    }

    fn decode_char(&self, char: CharCode) -> String {
        if let Some(s) = self.to_unicode.as_ref().and_then(|x| x.get(&char)) {
            if !s.is_empty() && !s.contains('\0') {
                return s.clone();
            }
        }
        if let Some(s) = self.fallback_unicode.as_ref().and_then(|x| x.get(&char)) {
            return s.clone();
        }
        debug!("Unknown character {} in {}", char, self.base_name);
        String::new()
    }

    fn get_font_name(&self) -> &str {
        &self.base_name
    }

    fn style_flags(&self) -> SpanFlags {
        self.flags
    }
}

impl<'a> fmt::Debug for PdfCIDFont<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.font.fmt(f)
    }
}
