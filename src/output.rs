use euclid::Transform2D;

use crate::types::{
    ImagePlacement, MediaBox, Point, SpanFlags, TextBlock, TextLine, TextSpan, Transform,
    VectorPath,
};

/// Collects what the content stream interpreter finds on one page.
///
/// Glyphs are merged into spans, spans into lines and lines into blocks (one
/// block per text object). Paths and images are kept in paint order.
pub(crate) struct PageCollector {
    flip_ctm: Transform,
    buf: String,
    buf_origin: Point,
    buf_end_x: f32,
    buf_font: String,
    buf_size: f32,
    buf_flags: SpanFlags,
    line: TextLine,
    block: TextBlock,
    blocks: Vec<TextBlock>,
    paths: Vec<VectorPath>,
    images: Vec<ImagePlacement>,
}

/// Everything collected for a page.
pub(crate) struct PageContent {
    pub(crate) blocks: Vec<TextBlock>,
    pub(crate) paths: Vec<VectorPath>,
    pub(crate) images: Vec<ImagePlacement>,
}

impl PageCollector {
    // Gap > this ratio of the font size starts a new span
    const CHAR_FLUSH_THRESHOLD_RATIO: f32 = 1.2;
    // Gap > this ratio inserts a space within the current span
    const CHAR_SPACE_THRESHOLD_RATIO: f32 = 0.15;
    // Baseline shift > this ratio starts a new line
    const LINE_THRESHOLD_RATIO: f32 = 0.5;

    pub(crate) fn new(media_box: &MediaBox) -> PageCollector {
        PageCollector {
            // PDF user space → top-left origin, relative to the media box
            flip_ctm: Transform2D::new(1., 0., 0., -1., -media_box.llx, media_box.ury),
            buf: String::new(),
            buf_origin: Point::new(0., 0.),
            buf_end_x: 0.,
            buf_font: String::new(),
            buf_size: 0.,
            buf_flags: SpanFlags::empty(),
            line: Vec::new(),
            block: Vec::new(),
            blocks: Vec::new(),
            paths: Vec::new(),
            images: Vec::new(),
        }
    }

    pub(crate) fn flip_ctm(&self) -> &Transform {
        &self.flip_ctm
    }

    fn flush_span(&mut self) {
        if self.buf.trim().is_empty() {
            self.buf.clear();
            return;
        }
        self.line.push(TextSpan {
            text: std::mem::take(&mut self.buf),
            font_name: self.buf_font.clone(),
            size: self.buf_size,
            origin: self.buf_origin,
            flags: self.buf_flags,
        });
    }

    fn end_line(&mut self) {
        self.flush_span();
        if !self.line.is_empty() {
            self.block.push(std::mem::take(&mut self.line));
        }
    }

    pub(crate) fn begin_text_object(&mut self) {
        self.end_text_object();
    }

    pub(crate) fn end_text_object(&mut self) {
        self.end_line();
        if !self.block.is_empty() {
            self.blocks.push(std::mem::take(&mut self.block));
        }
    }

    /// Add one glyph. `trm` is the text rendering matrix without the font
    /// size; `width` is the advance in unscaled text space.
    pub(crate) fn output_character(
        &mut self,
        trm: &Transform,
        width: f32,
        font_name: &str,
        font_size: f32,
        flags: SpanFlags,
        char: &str,
    ) {
        let position = trm.then(&self.flip_ctm);
        let (x, y) = (position.m31, position.m32);
        let scale = trm.m21.hypot(trm.m22);
        let size = font_size * scale;
        if !size.is_finite() || size <= 0. {
            return;
        }
        let advance = width * font_size * trm.m11.hypot(trm.m12);
        let normalized_char = if char == "\t" { " " } else { char };

        if !self.buf.is_empty() {
            let y_gap = (y - self.buf_origin.y).abs();
            let gap = x - self.buf_end_x;
            if y_gap > self.buf_size * Self::LINE_THRESHOLD_RATIO {
                self.end_line();
            } else if self.buf_font != font_name
                || (self.buf_size - size).abs() > 0.01
                || self.buf_flags != flags
                || y_gap > 0.01
                || gap.abs() > size * Self::CHAR_FLUSH_THRESHOLD_RATIO
            {
                self.flush_span();
            } else {
                let prev_char_is_space = self.buf.chars().last().is_some_and(|c| c.is_whitespace());
                if !prev_char_is_space && gap > size * Self::CHAR_SPACE_THRESHOLD_RATIO {
                    self.buf.push(' ');
                }
                self.buf += normalized_char;
                self.buf_end_x = x + advance;
                return;
            }
        }

        if normalized_char.trim().is_empty() {
            // Leading whitespace does not start a span.
            return;
        }
        self.buf_origin = Point::new(x, y);
        self.buf_font = font_name.to_owned();
        self.buf_size = size;
        self.buf_flags = flags;
        self.buf = normalized_char.to_owned();
        self.buf_end_x = x + advance;
    }

    pub(crate) fn add_path(&mut self, path: VectorPath) {
        self.paths.push(path);
    }

    pub(crate) fn add_image(&mut self, image: ImagePlacement) {
        self.images.push(image);
    }

    pub(crate) fn finish(mut self) -> PageContent {
        self.end_text_object();
        PageContent {
            blocks: self.blocks,
            paths: self.paths,
            images: self.images,
        }
    }
}
