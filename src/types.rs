use std::fmt;

use bitflags::bitflags;
use euclid::Transform2D;
use lopdf::ObjectId;

pub struct Space;
pub type Transform = Transform2D<f32, Space, Space>;

#[derive(Debug, Clone, Copy)]
pub struct MediaBox {
    pub llx: f32,
    pub lly: f32,
    pub urx: f32,
    pub ury: f32,
}

impl MediaBox {
    pub fn width(&self) -> f32 {
        (self.urx - self.llx).abs()
    }

    pub fn height(&self) -> f32 {
        (self.ury - self.lly).abs()
    }
}

/// A point in page space: origin at the top-left corner, y grows downwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Point {
        Point { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1})", self.x, self.y)
    }
}

/// Axis-aligned rectangle in page space, `x0/y0` top-left and `x1/y1` bottom-right.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Rect {
        Rect { x0, y0, x1, y1 }
    }

    /// Smallest rectangle containing all `points`.
    pub fn from_points(points: &[Point]) -> Option<Rect> {
        let first = points.first()?;
        let mut rect = Rect::new(first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            rect.x0 = rect.x0.min(p.x);
            rect.y0 = rect.y0.min(p.y);
            rect.x1 = rect.x1.max(p.x);
            rect.y1 = rect.y1.max(p.y);
        }
        Some(rect)
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    pub fn is_finite(&self) -> bool {
        self.x0.is_finite() && self.y0.is_finite() && self.x1.is_finite() && self.y1.is_finite()
    }

    /// A rectangle without area (or with inverted edges).
    pub fn is_empty(&self) -> bool {
        !(self.x0 < self.x1 && self.y0 < self.y1)
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:.1}, {:.1}, {:.1}, {:.1}]",
            self.x0, self.y0, self.x1, self.y1
        )
    }
}

/// Device RGB color with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color {
        r: 0.,
        g: 0.,
        b: 0.,
    };
    pub const WHITE: Color = Color {
        r: 1.,
        g: 1.,
        b: 1.,
    };

    pub fn rgb(r: f32, g: f32, b: f32) -> Color {
        Color { r, g, b }
    }

    pub fn gray(v: f32) -> Color {
        Color { r: v, g: v, b: v }
    }

    pub fn cmyk(c: f32, m: f32, y: f32, k: f32) -> Color {
        Color {
            r: (1.0 - c) * (1.0 - k),
            g: (1.0 - m) * (1.0 - k),
            b: (1.0 - y) * (1.0 - k),
        }
    }

    /// Interpret a list of color operands by component count.
    pub fn from_components(components: &[f32]) -> Option<Color> {
        match components {
            [v] => Some(Color::gray(*v)),
            [r, g, b] => Some(Color::rgb(*r, *g, *b)),
            [c, m, y, k] => Some(Color::cmyk(*c, *m, *y, *k)),
            _ => None,
        }
    }
}

bitflags! {
    /// Style flags of an extracted span.
    ///
    /// The bit assignment belongs to this crate's extractor; it is derived from
    /// the font descriptor and the text rise, not read from the PDF verbatim.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SpanFlags: u32 {
        const SUPERSCRIPT = 1;
        const ITALIC = 1 << 1;
        const SERIF = 1 << 2;
        const MONOSPACE = 1 << 3;
        const BOLD = 1 << 4;
    }
}

/// A run of text sharing one font, size and style within a line.
#[derive(Debug, Clone)]
pub struct TextSpan {
    pub text: String,
    pub font_name: String,
    pub size: f32,
    /// Baseline origin of the first glyph.
    pub origin: Point,
    pub flags: SpanFlags,
}

impl TextSpan {
    /// First `n` characters of the text, for diagnostics.
    pub fn text_prefix(&self, n: usize) -> String {
        self.text.chars().take(n).collect()
    }
}

pub type TextLine = Vec<TextSpan>;
pub type TextBlock = Vec<TextLine>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathItemKind {
    Line,
    Rect,
    Curve,
    Quad,
}

impl fmt::Display for PathItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PathItemKind::Line => "line",
            PathItemKind::Rect => "rect",
            PathItemKind::Curve => "curve",
            PathItemKind::Quad => "quad",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PathItem {
    Line(Point, Point),
    Rect(Rect),
    /// Start point, two control points, end point.
    Curve([Point; 4]),
    /// Corners of a rectangle drawn under a rotating or skewing transform.
    Quad([Point; 4]),
}

impl PathItem {
    pub fn kind(&self) -> PathItemKind {
        match self {
            PathItem::Line(..) => PathItemKind::Line,
            PathItem::Rect(_) => PathItemKind::Rect,
            PathItem::Curve(_) => PathItemKind::Curve,
            PathItem::Quad(_) => PathItemKind::Quad,
        }
    }
}

/// A painted path as extracted from a content stream.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorPath {
    pub items: Vec<PathItem>,
    pub stroke_color: Option<Color>,
    pub fill_color: Option<Color>,
    pub stroke_opacity: f32,
    pub fill_opacity: f32,
    /// Line width in page units; absent for paths that are only filled.
    pub width: Option<f32>,
}

impl VectorPath {
    pub fn is_stroked(&self) -> bool {
        self.stroke_opacity != 0. && self.stroke_color.is_some()
    }

    pub fn is_filled(&self) -> bool {
        self.fill_opacity != 0. && self.fill_color.is_some()
    }

    pub fn first_kind(&self) -> Option<PathItemKind> {
        self.items.first().map(PathItem::kind)
    }
}

/// Reference to an image XObject of the source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageRef(pub(crate) ObjectId);

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.0.0, self.0.1)
    }
}

#[derive(Debug, Clone)]
pub struct ImagePlacement {
    pub image: ImageRef,
    pub bbox: Rect,
}

/// Everything extracted from one source page.
#[derive(Debug, Clone)]
pub struct SourcePage {
    /// 1-based page number.
    pub number: u32,
    pub width: f32,
    pub height: f32,
    pub rotation: i64,
    pub blocks: Vec<TextBlock>,
    pub paths: Vec<VectorPath>,
    pub images: Vec<ImagePlacement>,
}

impl SourcePage {
    /// Spans in block → line → span order.
    pub fn spans(&self) -> impl Iterator<Item = &TextSpan> {
        self.blocks.iter().flatten().flatten()
    }
}
