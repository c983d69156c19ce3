//! A destination page as an ordered list of drawing commands.
//!
//! Commands are played back in list order, so later commands paint over
//! earlier ones.

use crate::extract::ImageData;
use crate::standard_fonts::StandardFont;
use crate::types::{Color, Point, Rect};

/// Font a text command is set in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FontSelection {
    Standard(StandardFont),
    /// A fallback font registered with the output document under this name.
    Registered(String),
}

impl FontSelection {
    pub fn name(&self) -> &str {
        match self {
            FontSelection::Standard(font) => font.base_name(),
            FontSelection::Registered(name) => name,
        }
    }
}

/// Text already encoded for the font it is set in.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedText {
    pub font: FontSelection,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub enum PageCommand {
    /// Fill the whole page.
    Background(Color),
    Line {
        from: Point,
        to: Point,
        color: Color,
        width: f32,
    },
    Rect {
        rect: Rect,
        stroke: Color,
        fill: Option<Color>,
        width: f32,
    },
    Text {
        /// Baseline origin of the first glyph.
        origin: Point,
        size: f32,
        color: Color,
        text: EncodedText,
    },
    Image {
        bbox: Rect,
        image: Box<ImageData>,
    },
}

/// Everything needed to build one output page. Coordinates use the same
/// top-left origin as the extracted source page.
#[derive(Debug, Clone)]
pub struct PagePlan {
    pub width: f32,
    pub height: f32,
    pub rotation: i64,
    commands: Vec<PageCommand>,
}

impl PagePlan {
    /// A plan with only the black background.
    pub fn new(width: f32, height: f32, rotation: i64) -> PagePlan {
        PagePlan {
            width,
            height,
            rotation,
            commands: vec![PageCommand::Background(Color::BLACK)],
        }
    }

    pub fn push(&mut self, command: PageCommand) {
        self.commands.push(command);
    }

    pub fn commands(&self) -> &[PageCommand] {
        &self.commands
    }
}

impl Extend<PageCommand> for PagePlan {
    fn extend<T: IntoIterator<Item = PageCommand>>(&mut self, iter: T) {
        self.commands.extend(iter);
    }
}
