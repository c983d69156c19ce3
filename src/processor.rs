use std::collections::HashMap;
use std::rc::Rc;

use euclid::{Transform2D, point2};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, warn};

use crate::fonts::{PdfFont, make_font};
use crate::output::PageCollector;
use crate::types::{
    Color, ImagePlacement, ImageRef, PathItem, Point, Rect, SpanFlags, Transform, VectorPath,
};
use crate::utils::*;

/// Form XObjects nested deeper than this are not entered.
const MAX_FORM_DEPTH: usize = 32;

#[derive(Clone)]
pub(crate) struct TextState<'a> {
    pub(crate) font: Option<Rc<dyn PdfFont + 'a>>,
    pub(crate) font_size: f32,
    pub(crate) character_spacing: f32,
    pub(crate) word_spacing: f32,
    pub(crate) horizontal_scaling: f32,
    pub(crate) leading: f32,
    pub(crate) rise: f32,
    pub(crate) tm: Transform,
}

#[derive(Clone)]
pub(crate) struct GraphicsState<'a> {
    pub(crate) ctm: Transform,
    pub(crate) ts: TextState<'a>,
    pub(crate) line_width: f32,
    /// `None` while a pattern or unknown color space is selected.
    pub(crate) stroke_color: Option<Color>,
    pub(crate) fill_color: Option<Color>,
    pub(crate) stroke_opacity: f32,
    pub(crate) fill_opacity: f32,
}

impl<'a> GraphicsState<'a> {
    fn new(ctm: Transform) -> GraphicsState<'a> {
        GraphicsState {
            ts: TextState {
                font: None,
                font_size: f32::NAN,
                character_spacing: 0.,
                word_spacing: 0.,
                horizontal_scaling: 1.,
                leading: 0.,
                rise: 0.,
                tm: Transform2D::identity(),
            },
            line_width: 1.,
            ctm,
            stroke_color: Some(Color::BLACK),
            fill_color: Some(Color::BLACK),
            stroke_opacity: 1.,
            fill_opacity: 1.,
        }
    }

    /// Line width in page units.
    fn device_line_width(&self) -> f32 {
        let det = self.ctm.m11 * self.ctm.m22 - self.ctm.m12 * self.ctm.m21;
        self.line_width * det.abs().sqrt()
    }
}

/// Path under construction, already in page coordinates.
#[derive(Default)]
struct PathBuilder {
    items: Vec<PathItem>,
    current: Option<Point>,
    start: Option<Point>,
}

impl PathBuilder {
    fn move_to(&mut self, p: Point) {
        self.current = Some(p);
        self.start = Some(p);
    }

    fn line_to(&mut self, p: Point) {
        if let Some(current) = self.current {
            self.items.push(PathItem::Line(current, p));
        } else {
            self.start = Some(p);
        }
        self.current = Some(p);
    }

    fn curve_to(&mut self, c1: Option<Point>, c2: Option<Point>, p: Point) {
        let current = match self.current {
            Some(current) => current,
            None => {
                self.move_to(p);
                return;
            }
        };
        let c1 = c1.unwrap_or(current);
        let c2 = c2.unwrap_or(p);
        self.items.push(PathItem::Curve([current, c1, c2, p]));
        self.current = Some(p);
    }

    fn close(&mut self) {
        if let (Some(current), Some(start)) = (self.current, self.start) {
            if current != start {
                self.items.push(PathItem::Line(current, start));
            }
            self.current = Some(start);
        }
    }

    fn rect(&mut self, corners: [Point; 4], axis_aligned: bool) {
        let item = if axis_aligned {
            match Rect::from_points(&corners) {
                Some(rect) => PathItem::Rect(rect),
                None => return,
            }
        } else {
            PathItem::Quad(corners)
        };
        self.items.push(item);
        self.move_to(corners[0]);
    }

    fn take(&mut self) -> Vec<PathItem> {
        self.current = None;
        self.start = None;
        std::mem::take(&mut self.items)
    }
}

fn show_text(gs: &mut GraphicsState, s: &[u8], output: &mut PageCollector) {
    let ts = &mut gs.ts;
    let font = match ts.font.as_ref() {
        Some(font) => font.clone(),
        None => {
            debug!("text shown without a font: {:?}", s);
            return;
        }
    };
    let mut flags = font.style_flags();
    if ts.rise > 0. {
        flags |= SpanFlags::SUPERSCRIPT;
    }

    for (c, length) in font.char_codes(s) {
        // Trm = Tsm × Tm × CTM
        let tsm = Transform2D::new(ts.horizontal_scaling, 0., 0., 1.0, 0., ts.rise);
        let trm = tsm.then(&ts.tm.then(&gs.ctm));

        let w0 = font.get_width(c) / 1000.;

        let mut spacing = ts.character_spacing;
        // Word spacing only applies to the single-byte code 32.
        if c == 32 && length == 1 {
            spacing += ts.word_spacing
        }

        output.output_character(
            &trm,
            w0,
            font.get_font_name(),
            ts.font_size,
            flags,
            &font.decode_char(c),
        );
        let tx = ts.horizontal_scaling * (w0 * ts.font_size + spacing);
        ts.tm = Transform2D::translation(tx, 0.).then(&ts.tm);
    }
}

fn adjust_text(ts: &mut TextState, tj: f32) {
    let tx = ts.horizontal_scaling * (-tj / 1000. * ts.font_size);
    ts.tm = Transform2D::translation(tx, 0.).then(&ts.tm);
}

fn apply_state(doc: &Document, gs: &mut GraphicsState, state: &Dictionary) {
    for (k, v) in state.iter() {
        let k: &[u8] = k.as_ref();
        let value = as_num(maybe_deref(doc, v));
        match (k, value) {
            (b"CA", Some(v)) => gs.stroke_opacity = v,
            (b"ca", Some(v)) => gs.fill_opacity = v,
            (b"LW", Some(v)) => gs.line_width = v,
            _ => debug!("unapplied state: {:?} {:?}", String::from_utf8_lossy(k), v),
        }
    }
}

/// Number of color components for a color space operand, if it is a
/// space whose components convert to RGB.
fn color_space_components(doc: &Document, resources: &Dictionary, name: &[u8]) -> Option<usize> {
    match name {
        b"DeviceGray" | b"CalGray" | b"G" => return Some(1),
        b"DeviceRGB" | b"CalRGB" | b"RGB" => return Some(3),
        b"DeviceCMYK" | b"CMYK" => return Some(4),
        b"Pattern" => return None,
        _ => {}
    }
    let spaces: &Dictionary = maybe_get(doc, resources, b"ColorSpace")?;
    let space = maybe_get_obj(doc, spaces, name)?;
    match space {
        Object::Name(n) => color_space_components(doc, resources, n),
        Object::Array(a) => match a.first().map(|o| maybe_deref(doc, o)) {
            Some(Object::Name(family)) if family == b"ICCBased" => {
                let profile: &Stream = FromObj::from_obj(doc, a.get(1)?)?;
                maybe_get::<i64>(doc, &profile.dict, b"N").map(|n| n as usize)
            }
            Some(Object::Name(family)) => color_space_components(doc, resources, family),
            _ => None,
        },
        _ => None,
    }
}

fn color_from_operands(operands: &[Object]) -> Option<Color> {
    // A trailing name selects a pattern.
    if matches!(operands.last(), Some(Object::Name(_))) {
        return None;
    }
    as_nums(operands).and_then(|c| Color::from_components(&c))
}

fn default_color(components: Option<usize>) -> Option<Color> {
    match components {
        Some(4) => Some(Color::cmyk(0., 0., 0., 1.)),
        Some(_) => Some(Color::BLACK),
        None => None,
    }
}

fn nums<const N: usize>(operation: &Operation) -> Option<[f32; N]> {
    let nums = as_nums(&operation.operands)?;
    let nums: [f32; N] = nums.try_into().ok()?;
    Some(nums)
}

fn is_axis_aligned(t: &Transform) -> bool {
    (t.m12.abs() < 1e-6 && t.m21.abs() < 1e-6) || (t.m11.abs() < 1e-6 && t.m22.abs() < 1e-6)
}

#[derive(Debug, Default)]
pub(crate) struct Processor {
    depth: usize,
    /// Form XObjects currently being interpreted, outermost first.
    active_forms: Vec<ObjectId>,
}

impl Processor {
    pub(crate) fn new() -> Processor {
        Processor::default()
    }

    /// Interpret a content stream. `ctm` is the initial transformation (the
    /// identity for a page, the form matrix for a form XObject).
    pub(crate) fn process_stream<'a>(
        &mut self,
        doc: &'a Document,
        content: Vec<u8>,
        resources: &'a Dictionary,
        ctm: Transform,
        output: &mut PageCollector,
        page_num: u32,
    ) {
        let content = match Content::decode(&content) {
            Ok(content) => content,
            Err(e) => {
                warn!(
                    "Failed to decode content stream for page {}: {}. Skipping this content.",
                    page_num, e
                );
                return;
            }
        };
        let mut font_table: HashMap<Vec<u8>, Rc<dyn PdfFont + 'a>> = HashMap::new();
        let mut gs = GraphicsState::new(ctm);
        let mut gs_stack = Vec::new();
        let mut path = PathBuilder::default();
        let mut tlm: Transform = Transform2D::identity();
        let flip_ctm = *output.flip_ctm();

        for operation in &content.operations {
            let to_page = |gs: &GraphicsState, x: f32, y: f32| {
                let p = gs.ctm.then(&flip_ctm).transform_point(point2(x, y));
                Point::new(p.x, p.y)
            };
            match operation.operator.as_str() {
                "BT" => {
                    tlm = Transform2D::identity();
                    gs.ts.tm = tlm;
                    output.begin_text_object();
                }
                "ET" => {
                    tlm = Transform2D::identity();
                    gs.ts.tm = tlm;
                    output.end_text_object();
                }
                "cm" => match nums::<6>(operation) {
                    Some([a, b, c, d, e, f]) => {
                        gs.ctm = Transform2D::new(a, b, c, d, e, f).then(&gs.ctm);
                    }
                    None => debug!("malformed cm {:?}", operation.operands),
                },
                "TJ" => match operation.operands.first() {
                    Some(Object::Array(array)) => {
                        for e in array {
                            match e {
                                Object::String(s, _) => show_text(&mut gs, s, output),
                                &Object::Integer(i) => adjust_text(&mut gs.ts, i as f32),
                                &Object::Real(i) => adjust_text(&mut gs.ts, i),
                                _ => debug!("kind of {:?}", e),
                            }
                        }
                    }
                    _ => debug!("malformed TJ {:?}", operation.operands),
                },
                "Tj" => match operation.operands.first() {
                    Some(Object::String(s, _)) => show_text(&mut gs, s, output),
                    _ => debug!("malformed Tj {:?}", operation.operands),
                },
                "'" | "\"" => {
                    let (string, spacing) = match operation.operands.as_slice() {
                        [Object::String(s, _)] => (s, None),
                        [aw, ac, Object::String(s, _)] => (s, as_num(aw).zip(as_num(ac))),
                        _ => {
                            debug!("malformed {} {:?}", operation.operator, operation.operands);
                            continue;
                        }
                    };
                    if let Some((aw, ac)) = spacing {
                        gs.ts.word_spacing = aw;
                        gs.ts.character_spacing = ac;
                    }
                    tlm = Transform2D::translation(0., -gs.ts.leading).then(&tlm);
                    gs.ts.tm = tlm;
                    show_text(&mut gs, string, output);
                }
                "Tc" | "Tw" | "Tz" | "TL" | "Ts" => match nums::<1>(operation) {
                    Some([v]) => match operation.operator.as_str() {
                        "Tc" => gs.ts.character_spacing = v,
                        "Tw" => gs.ts.word_spacing = v,
                        "Tz" => gs.ts.horizontal_scaling = v / 100.,
                        "TL" => gs.ts.leading = v,
                        _ => gs.ts.rise = v,
                    },
                    None => debug!("malformed {} {:?}", operation.operator, operation.operands),
                },
                "Tf" => {
                    let (name, size) = match operation.operands.as_slice() {
                        [Object::Name(name), size] => (name, as_num(size)),
                        _ => {
                            debug!("malformed Tf {:?}", operation.operands);
                            continue;
                        }
                    };
                    let font = match font_table.get(name) {
                        Some(font) => Some(font.clone()),
                        None => {
                            let dict = maybe_get::<&Dictionary>(doc, resources, b"Font")
                                .and_then(|fonts| maybe_get::<&Dictionary>(doc, fonts, name));
                            dict.map(|dict| {
                                let font = make_font(doc, dict);
                                font_table.insert(name.clone(), font.clone());
                                font
                            })
                        }
                    };
                    if font.is_none() {
                        warn!("font {} not found in page {} resources", pdf_to_utf8(name), page_num);
                    }
                    gs.ts.font = font;
                    gs.ts.font_size = size.unwrap_or(f32::NAN);
                    debug!("font {} size: {}", pdf_to_utf8(name), gs.ts.font_size);
                }
                "Tm" => match nums::<6>(operation) {
                    Some([a, b, c, d, e, f]) => {
                        tlm = Transform2D::new(a, b, c, d, e, f);
                        gs.ts.tm = tlm;
                    }
                    None => debug!("malformed Tm {:?}", operation.operands),
                },
                "Td" | "TD" => match nums::<2>(operation) {
                    Some([tx, ty]) => {
                        if operation.operator == "TD" {
                            gs.ts.leading = -ty;
                        }
                        tlm = Transform2D::translation(tx, ty).then(&tlm);
                        gs.ts.tm = tlm;
                    }
                    None => debug!("malformed {} {:?}", operation.operator, operation.operands),
                },
                "T*" => {
                    tlm = Transform2D::translation(0., -gs.ts.leading).then(&tlm);
                    gs.ts.tm = tlm;
                }
                "q" => {
                    gs_stack.push(gs.clone());
                }
                "Q" => match gs_stack.pop() {
                    Some(s) => gs = s,
                    None => warn!("No state to pop"),
                },
                "gs" => {
                    let state = match operation.operands.first() {
                        Some(Object::Name(name)) => {
                            maybe_get::<&Dictionary>(doc, resources, b"ExtGState")
                                .and_then(|states| maybe_get::<&Dictionary>(doc, states, name))
                        }
                        _ => None,
                    };
                    match state {
                        Some(state) => apply_state(doc, &mut gs, state),
                        None => debug!("unknown graphics state {:?}", operation.operands),
                    }
                }
                "w" => match nums::<1>(operation) {
                    Some([w]) => gs.line_width = w,
                    None => debug!("malformed w {:?}", operation.operands),
                },
                "g" | "rg" | "k" => gs.fill_color = color_from_operands(&operation.operands),
                "G" | "RG" | "K" => gs.stroke_color = color_from_operands(&operation.operands),
                "sc" | "scn" => gs.fill_color = color_from_operands(&operation.operands),
                "SC" | "SCN" => gs.stroke_color = color_from_operands(&operation.operands),
                "cs" | "CS" => {
                    let components = match operation.operands.first() {
                        Some(Object::Name(name)) => color_space_components(doc, resources, name),
                        _ => None,
                    };
                    if operation.operator == "cs" {
                        gs.fill_color = default_color(components);
                    } else {
                        gs.stroke_color = default_color(components);
                    }
                }
                "m" => match nums::<2>(operation) {
                    Some([x, y]) => path.move_to(to_page(&gs, x, y)),
                    None => debug!("malformed m {:?}", operation.operands),
                },
                "l" => match nums::<2>(operation) {
                    Some([x, y]) => path.line_to(to_page(&gs, x, y)),
                    None => debug!("malformed l {:?}", operation.operands),
                },
                "c" => match nums::<6>(operation) {
                    Some([x1, y1, x2, y2, x3, y3]) => path.curve_to(
                        Some(to_page(&gs, x1, y1)),
                        Some(to_page(&gs, x2, y2)),
                        to_page(&gs, x3, y3),
                    ),
                    None => debug!("malformed c {:?}", operation.operands),
                },
                "v" => match nums::<4>(operation) {
                    Some([x2, y2, x3, y3]) => {
                        path.curve_to(None, Some(to_page(&gs, x2, y2)), to_page(&gs, x3, y3))
                    }
                    None => debug!("malformed v {:?}", operation.operands),
                },
                "y" => match nums::<4>(operation) {
                    Some([x1, y1, x3, y3]) => {
                        path.curve_to(Some(to_page(&gs, x1, y1)), None, to_page(&gs, x3, y3))
                    }
                    None => debug!("malformed y {:?}", operation.operands),
                },
                "h" => path.close(),
                "re" => match nums::<4>(operation) {
                    Some([x, y, w, h]) => {
                        let corners = [
                            to_page(&gs, x, y),
                            to_page(&gs, x + w, y),
                            to_page(&gs, x + w, y + h),
                            to_page(&gs, x, y + h),
                        ];
                        path.rect(corners, is_axis_aligned(&gs.ctm));
                    }
                    None => debug!("malformed re {:?}", operation.operands),
                },
                "S" | "s" | "f" | "F" | "f*" | "B" | "B*" | "b" | "b*" | "n" => {
                    let op = operation.operator.as_str();
                    if matches!(op, "s" | "b" | "b*") {
                        path.close();
                    }
                    let items = path.take();
                    let stroked = matches!(op, "S" | "s" | "B" | "B*" | "b" | "b*");
                    let filled = matches!(op, "f" | "F" | "f*" | "B" | "B*" | "b" | "b*");
                    if items.is_empty() || !(stroked || filled) {
                        continue;
                    }
                    output.add_path(VectorPath {
                        items,
                        stroke_color: if stroked { gs.stroke_color } else { None },
                        fill_color: if filled { gs.fill_color } else { None },
                        stroke_opacity: gs.stroke_opacity,
                        fill_opacity: gs.fill_opacity,
                        width: stroked.then(|| gs.device_line_width()),
                    });
                }
                "W" | "W*" => {
                    // Clipping is not tracked; the path is still painted or
                    // discarded by the following operator.
                }
                "Do" => match operation.operands.first() {
                    Some(Object::Name(name)) => {
                        self.do_xobject(doc, resources, name, &gs, output, page_num)
                    }
                    _ => debug!("malformed Do {:?}", operation.operands),
                },
                "BI" | "ID" | "EI" => debug!("inline image on page {} not copied", page_num),
                _ => {
                    debug!("unknown operation {:?}", operation);
                }
            }
        }
    }

    fn do_xobject<'a>(
        &mut self,
        doc: &'a Document,
        resources: &'a Dictionary,
        name: &[u8],
        gs: &GraphicsState,
        output: &mut PageCollector,
        page_num: u32,
    ) {
        let xobjects: &Dictionary = match maybe_get(doc, resources, b"XObject") {
            Some(xobjects) => xobjects,
            None => {
                debug!("no XObject resources for {}", pdf_to_utf8(name));
                return;
            }
        };
        let entry = match xobjects.get(name) {
            Ok(entry) => entry,
            Err(_) => {
                debug!("XObject {} not found", pdf_to_utf8(name));
                return;
            }
        };
        let xf: &Stream = match FromObj::from_obj(doc, entry) {
            Some(xf) => xf,
            None => return,
        };
        match maybe_get_name(doc, &xf.dict, b"Subtype") {
            Some(b"Image") => {
                let id = match entry {
                    Object::Reference(id) => *id,
                    _ => {
                        debug!("direct image object {} not copied", pdf_to_utf8(name));
                        return;
                    }
                };
                let flip_ctm = output.flip_ctm();
                let corners: Vec<Point> = [(0., 0.), (1., 0.), (1., 1.), (0., 1.)]
                    .iter()
                    .map(|&(x, y)| {
                        let p = gs.ctm.then(flip_ctm).transform_point(point2(x, y));
                        Point::new(p.x, p.y)
                    })
                    .collect();
                if let Some(bbox) = Rect::from_points(&corners) {
                    output.add_image(ImagePlacement {
                        image: ImageRef(id),
                        bbox,
                    });
                }
            }
            Some(b"Form") => {
                if self.depth >= MAX_FORM_DEPTH {
                    warn!("form XObjects nested too deeply on page {}", page_num);
                    return;
                }
                let form_id = match entry {
                    Object::Reference(id) => Some(*id),
                    _ => None,
                };
                if let Some(id) = form_id {
                    if self.active_forms.contains(&id) {
                        warn!(
                            "form {} on page {} draws itself, skipping the nested Do",
                            pdf_to_utf8(name),
                            page_num
                        );
                        return;
                    }
                    self.active_forms.push(id);
                }
                let matrix = maybe_get::<Vec<f32>>(doc, &xf.dict, b"Matrix")
                    .and_then(|m| <[f32; 6]>::try_from(m).ok())
                    .map(|[a, b, c, d, e, f]| Transform2D::new(a, b, c, d, e, f))
                    .unwrap_or_else(Transform2D::identity);
                let form_resources = maybe_get::<&Dictionary>(doc, &xf.dict, b"Resources")
                    .unwrap_or(resources);
                let contents = get_contents(xf);
                self.depth += 1;
                self.process_stream(
                    doc,
                    contents,
                    form_resources,
                    matrix.then(&gs.ctm),
                    output,
                    page_num,
                );
                self.depth -= 1;
                if form_id.is_some() {
                    self.active_forms.pop();
                }
            }
            other => debug!("unsupported XObject subtype {:?}", other.map(pdf_to_utf8)),
        }
    }
}
