//! The fourteen standard PDF fonts, which every consumer can render by name.

use crate::data::win_ansi_code;
use crate::types::SpanFlags;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StandardFont {
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
    HelveticaBoldOblique,
    TimesRoman,
    TimesBold,
    TimesItalic,
    TimesBoldItalic,
    Courier,
    CourierBold,
    CourierOblique,
    CourierBoldOblique,
    Symbol,
    ZapfDingbats,
}

use StandardFont::*;

const ALL: [StandardFont; 14] = [
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
    HelveticaBoldOblique,
    TimesRoman,
    TimesBold,
    TimesItalic,
    TimesBoldItalic,
    Courier,
    CourierBold,
    CourierOblique,
    CourierBoldOblique,
    Symbol,
    ZapfDingbats,
];

/// Short names and common alternates, lowercase with spaces removed.
const ALIASES: &[(&str, StandardFont)] = &[
    ("helv", Helvetica),
    ("hebo", HelveticaBold),
    ("heit", HelveticaOblique),
    ("hebi", HelveticaBoldOblique),
    ("tiro", TimesRoman),
    ("tibo", TimesBold),
    ("tiit", TimesItalic),
    ("tibi", TimesBoldItalic),
    ("cour", Courier),
    ("cobo", CourierBold),
    ("coit", CourierOblique),
    ("cobi", CourierBoldOblique),
    ("symb", Symbol),
    ("zadb", ZapfDingbats),
    ("arial", Helvetica),
    ("arialmt", Helvetica),
    ("arial,bold", HelveticaBold),
    ("arial-boldmt", HelveticaBold),
    ("arial,italic", HelveticaOblique),
    ("arial-italicmt", HelveticaOblique),
    ("arial,bolditalic", HelveticaBoldOblique),
    ("arial-bolditalicmt", HelveticaBoldOblique),
    ("helvetica,bold", HelveticaBold),
    ("helvetica,italic", HelveticaOblique),
    ("helvetica,bolditalic", HelveticaBoldOblique),
    ("times", TimesRoman),
    ("timesnewroman", TimesRoman),
    ("timesnewromanpsmt", TimesRoman),
    ("timesnewroman,bold", TimesBold),
    ("timesnewromanps-boldmt", TimesBold),
    ("timesnewroman,italic", TimesItalic),
    ("timesnewromanps-italicmt", TimesItalic),
    ("timesnewroman,bolditalic", TimesBoldItalic),
    ("timesnewromanps-bolditalicmt", TimesBoldItalic),
    ("couriernew", Courier),
    ("couriernewpsmt", Courier),
    ("couriernew,bold", CourierBold),
    ("couriernewps-boldmt", CourierBold),
    ("couriernew,italic", CourierOblique),
    ("couriernewps-italicmt", CourierOblique),
    ("couriernew,bolditalic", CourierBoldOblique),
    ("couriernewps-bolditalicmt", CourierBoldOblique),
    ("courier,bold", CourierBold),
    ("courier,italic", CourierOblique),
    ("courier,bolditalic", CourierBoldOblique),
];

/// Helvetica advance widths for 0x20..=0x7e.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, 556, 556, 556,
    556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, 1015, 667, 667, 722, 722, 667,
    611, 778, 722, 278, 500, 667, 556, 833, 722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667,
    667, 611, 278, 278, 278, 469, 556, 333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500,
    222, 833, 556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

/// Times-Roman advance widths for 0x20..=0x7e.
const TIMES_WIDTHS: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278, 500, 500, 500,
    500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444, 921, 722, 667, 667, 722, 611,
    556, 722, 722, 333, 389, 722, 611, 889, 722, 722, 556, 722, 667, 556, 611, 722, 722, 944, 722,
    722, 611, 333, 278, 333, 469, 500, 333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500,
    278, 778, 500, 500, 500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541,
];

/// Drop a subset tag such as `ABCDEF+`.
pub(crate) fn strip_subset_tag(name: &str) -> &str {
    match name.split_once('+') {
        Some((tag, rest)) if tag.len() == 6 && tag.bytes().all(|b| b.is_ascii_uppercase()) => {
            rest
        }
        _ => name,
    }
}

impl StandardFont {
    /// Resolve a font name as used in a content stream or span.
    pub fn lookup(name: &str) -> Option<StandardFont> {
        let name = strip_subset_tag(name.trim());
        if let Some(&font) = ALL.iter().find(|f| f.base_name() == name) {
            return Some(font);
        }
        let key: String = name
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        if let Some(&font) = ALL.iter().find(|f| f.base_name().to_lowercase() == key) {
            return Some(font);
        }
        ALIASES
            .iter()
            .find(|(alias, _)| *alias == key)
            .map(|&(_, font)| font)
    }

    pub fn base_name(&self) -> &'static str {
        match self {
            Helvetica => "Helvetica",
            HelveticaBold => "Helvetica-Bold",
            HelveticaOblique => "Helvetica-Oblique",
            HelveticaBoldOblique => "Helvetica-BoldOblique",
            TimesRoman => "Times-Roman",
            TimesBold => "Times-Bold",
            TimesItalic => "Times-Italic",
            TimesBoldItalic => "Times-BoldItalic",
            Courier => "Courier",
            CourierBold => "Courier-Bold",
            CourierOblique => "Courier-Oblique",
            CourierBoldOblique => "Courier-BoldOblique",
            Symbol => "Symbol",
            ZapfDingbats => "ZapfDingbats",
        }
    }

    pub fn is_symbolic(&self) -> bool {
        matches!(self, Symbol | ZapfDingbats)
    }

    pub fn is_bold(&self) -> bool {
        matches!(
            self,
            HelveticaBold
                | HelveticaBoldOblique
                | TimesBold
                | TimesBoldItalic
                | CourierBold
                | CourierBoldOblique
        )
    }

    pub fn is_italic(&self) -> bool {
        matches!(
            self,
            HelveticaOblique
                | HelveticaBoldOblique
                | TimesItalic
                | TimesBoldItalic
                | CourierOblique
                | CourierBoldOblique
        )
    }

    /// Style flags for a standard font used without a font descriptor.
    pub(crate) fn style_flags(&self) -> SpanFlags {
        let mut flags = SpanFlags::empty();
        if self.is_bold() {
            flags |= SpanFlags::BOLD;
        }
        if self.is_italic() {
            flags |= SpanFlags::ITALIC;
        }
        match self {
            TimesRoman | TimesBold | TimesItalic | TimesBoldItalic => flags |= SpanFlags::SERIF,
            Courier | CourierBold | CourierOblique | CourierBoldOblique => {
                flags |= SpanFlags::MONOSPACE
            }
            _ => {}
        }
        flags
    }

    /// Whether the font has a glyph for `c` under the encoding this crate
    /// writes it with.
    pub fn covers(&self, c: char) -> bool {
        match self {
            Symbol => c == ' ' || c.is_ascii_digit() || "!#%&()+,./:;<=>?[]_{|}".contains(c),
            ZapfDingbats => c == ' ',
            _ => win_ansi_code(c).is_some(),
        }
    }

    /// Characters of `text` the font cannot draw, ignoring control characters.
    pub fn missing_glyphs(&self, text: &str) -> Vec<char> {
        let mut missing = Vec::new();
        for c in text.chars() {
            if (c as u32) >= 0x20 && !self.covers(c) && !missing.contains(&c) {
                missing.push(c);
            }
        }
        missing
    }

    /// Encode `text` as single-byte codes; control characters are dropped.
    pub fn encode(&self, text: &str) -> Result<Vec<u8>, char> {
        let mut bytes = Vec::with_capacity(text.len());
        for c in text.chars() {
            if (c as u32) < 0x20 {
                continue;
            }
            if !self.covers(c) {
                return Err(c);
            }
            match self {
                Symbol | ZapfDingbats => bytes.push(c as u8),
                _ => bytes.push(win_ansi_code(c).ok_or(c)?),
            }
        }
        Ok(bytes)
    }

    /// Approximate advance width in glyph space, used when a font dictionary
    /// carries no widths.
    pub(crate) fn glyph_width(&self, c: char) -> f32 {
        let table = match self {
            Courier | CourierBold | CourierOblique | CourierBoldOblique => return 600.,
            Symbol | ZapfDingbats => return 500.,
            TimesRoman | TimesBold | TimesItalic | TimesBoldItalic => &TIMES_WIDTHS,
            _ => &HELVETICA_WIDTHS,
        };
        let code = c as u32;
        if (0x20..=0x7e).contains(&code) {
            table[(code - 0x20) as usize] as f32
        } else {
            500.
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_and_aliases() {
        assert_eq!(StandardFont::lookup("Helvetica"), Some(Helvetica));
        assert_eq!(StandardFont::lookup("ABCDEF+Times-Bold"), Some(TimesBold));
        assert_eq!(StandardFont::lookup("helv"), Some(Helvetica));
        assert_eq!(StandardFont::lookup("Arial,Bold"), Some(HelveticaBold));
        assert_eq!(StandardFont::lookup("Times New Roman"), Some(TimesRoman));
        assert_eq!(StandardFont::lookup("courier-bold"), Some(CourierBold));
        assert_eq!(StandardFont::lookup("abcdef+Helvetica"), None);
        assert_eq!(StandardFont::lookup("NotoSans-Regular"), None);
    }

    #[test]
    fn coverage() {
        assert!(Helvetica.missing_glyphs("Héllo wörld €").is_empty());
        assert_eq!(Helvetica.missing_glyphs("Привет"), vec!['П', 'р', 'и', 'в', 'е', 'т']);
        assert_eq!(Helvetica.missing_glyphs("a\tb\u{1}"), Vec::<char>::new());
        assert_eq!(ZapfDingbats.missing_glyphs("a b"), vec!['a', 'b']);
        assert!(Symbol.covers('7'));
    }

    #[test]
    fn encoding() {
        assert_eq!(Helvetica.encode("Hé\n"), Ok(vec![b'H', 0xe9]));
        assert_eq!(Courier.encode("Ж"), Err('Ж'));
    }

    #[test]
    fn widths() {
        assert_eq!(Courier.glyph_width('W'), 600.);
        assert_eq!(Helvetica.glyph_width(' '), 278.);
        assert_eq!(TimesRoman.glyph_width('a'), 444.);
    }
}
