use std::fmt;
use std::str::FromStr;

use crate::types::SpanFlags;

/// The four-way style classification used to pick a fallback font.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StyleKey {
    Regular,
    Bold,
    Italic,
    BoldItalic,
}

impl StyleKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            StyleKey::Regular => "regular",
            StyleKey::Bold => "bold",
            StyleKey::Italic => "italic",
            StyleKey::BoldItalic => "bold_italic",
        }
    }

    /// Name a fallback font of this style is registered under in the output document.
    pub fn registration_name(&self) -> String {
        format!("Fallback-{}", self.as_str())
    }
}

impl fmt::Display for StyleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StyleKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "regular" => Ok(StyleKey::Regular),
            "bold" => Ok(StyleKey::Bold),
            "italic" => Ok(StyleKey::Italic),
            "bold_italic" | "bolditalic" => Ok(StyleKey::BoldItalic),
            other => Err(format!("unknown style key '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DerivedStyle {
    pub is_bold: bool,
    pub is_italic: bool,
}

/// Boldness and italics of a span, from its flags OR its font name.
///
/// Either source being true is enough: a flag cannot veto a name match and
/// vice versa.
pub fn derive_style(flags: SpanFlags, font_name: &str) -> DerivedStyle {
    let name = font_name.to_lowercase();
    let name_bold = name.contains("bold") || name.contains("-bd");
    let name_italic = name.contains("italic") || name.contains("oblique") || name.contains("-it");

    DerivedStyle {
        is_bold: flags.contains(SpanFlags::BOLD) || name_bold,
        is_italic: flags.contains(SpanFlags::ITALIC) || name_italic,
    }
}

/// Fallback styles to try, most faithful first.
pub fn fallback_order(style: DerivedStyle) -> &'static [StyleKey] {
    match (style.is_bold, style.is_italic) {
        (true, true) => &[
            StyleKey::BoldItalic,
            StyleKey::Bold,
            StyleKey::Italic,
            StyleKey::Regular,
        ],
        (true, false) => &[StyleKey::Bold, StyleKey::Regular],
        (false, true) => &[StyleKey::Italic, StyleKey::Regular],
        (false, false) => &[StyleKey::Regular],
    }
}
