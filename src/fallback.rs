//! Style-matched fallback fonts for text whose original font cannot be used.
//!
//! Fonts are loaded lazily, once per style, from caller-supplied files. Both
//! successes and failures are cached for the lifetime of the cache, which is
//! one conversion.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::{debug, info, warn};
use ttf_parser::{Face, name_id};

use crate::error::SkipReason;
use crate::style::{DerivedStyle, StyleKey, fallback_order};

/// Outline format of a font program, which decides how it is embedded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontProgram {
    TrueType,
    OpenTypeCff,
}

/// A parsed, embeddable font file.
pub struct FallbackFont {
    data: Vec<u8>,
    program: FontProgram,
    postscript_name: String,
    units_per_em: u16,
    pub(crate) ascent: i16,
    pub(crate) descent: i16,
    pub(crate) cap_height: i16,
    pub(crate) bbox: [i16; 4],
    pub(crate) italic_angle: f32,
    pub(crate) is_monospaced: bool,
}

pub type FontHandle = Rc<FallbackFont>;

impl FallbackFont {
    /// Validate `data` as a font this crate can embed.
    pub fn from_bytes(data: Vec<u8>) -> Result<FallbackFont, FontLoadError> {
        let face = Face::parse(&data, 0).map_err(|e| FontLoadError::Parse(e.to_string()))?;

        let has_unicode_cmap = face
            .tables()
            .cmap
            .map(|cmap| cmap.subtables.into_iter().any(|s| s.is_unicode()))
            .unwrap_or(false);
        if !has_unicode_cmap {
            return Err(FontLoadError::Unsupported("no Unicode cmap subtable"));
        }
        if face.tables().hmtx.is_none() {
            return Err(FontLoadError::Unsupported("no horizontal metrics"));
        }

        let program = if face.tables().cff.is_some() {
            FontProgram::OpenTypeCff
        } else {
            FontProgram::TrueType
        };
        let postscript_name = face
            .names()
            .into_iter()
            .filter(|n| n.name_id == name_id::POST_SCRIPT_NAME)
            .find_map(|n| n.to_string())
            .unwrap_or_default();
        let bbox = face.global_bounding_box();
        let units_per_em = face.units_per_em();
        let ascent = face.ascender();
        let descent = face.descender();
        let cap_height = face.capital_height().unwrap_or(ascent);
        let italic_angle = face.italic_angle();
        let is_monospaced = face.is_monospaced();

        Ok(FallbackFont {
            data,
            program,
            postscript_name,
            units_per_em,
            ascent,
            descent,
            cap_height,
            bbox: [bbox.x_min, bbox.y_min, bbox.x_max, bbox.y_max],
            italic_angle,
            is_monospaced,
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn program(&self) -> FontProgram {
        self.program
    }

    pub fn postscript_name(&self) -> &str {
        &self.postscript_name
    }

    pub fn has_glyph(&self, c: char) -> bool {
        self.with_face(|face| face.glyph_index(c).is_some())
            .unwrap_or(false)
    }

    /// Run `f` against the parsed face. The data was validated on load, so
    /// this only yields `None` if the bytes were somehow corrupted since.
    pub(crate) fn with_face<R>(&self, f: impl FnOnce(&Face<'_>) -> R) -> Option<R> {
        Face::parse(&self.data, 0).ok().map(|face| f(&face))
    }

    /// Convert font units to the 1000-unit glyph space PDF uses.
    pub(crate) fn to_glyph_space(&self, v: f32) -> f32 {
        v * 1000. / self.units_per_em as f32
    }
}

impl fmt::Debug for FallbackFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackFont")
            .field("postscript_name", &self.postscript_name)
            .field("program", &self.program)
            .field("bytes", &self.data.len())
            .finish()
    }
}

#[derive(Debug)]
pub enum FontLoadError {
    Io(std::io::Error),
    Parse(String),
    Unsupported(&'static str),
}

impl fmt::Display for FontLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FontLoadError::Io(e) => write!(f, "IO error: {}", e),
            FontLoadError::Parse(e) => write!(f, "unreadable font: {}", e),
            FontLoadError::Unsupported(e) => write!(f, "unsupported font: {}", e),
        }
    }
}

impl std::error::Error for FontLoadError {}

impl From<std::io::Error> for FontLoadError {
    fn from(e: std::io::Error) -> Self {
        FontLoadError::Io(e)
    }
}

/// Turns a font file into a [`FallbackFont`].
pub trait FontLoader {
    fn load(&self, path: &Path) -> Result<FallbackFont, FontLoadError>;
}

/// Reads font files from the filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsFontLoader;

impl FontLoader for FsFontLoader {
    fn load(&self, path: &Path) -> Result<FallbackFont, FontLoadError> {
        let data = std::fs::read(path)?;
        FallbackFont::from_bytes(data)
    }
}

/// Caller-supplied font file per style.
#[derive(Debug, Clone, Default)]
pub struct FallbackFontPaths {
    paths: HashMap<StyleKey, PathBuf>,
}

impl FallbackFontPaths {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, style: StyleKey, path: impl Into<PathBuf>) -> Self {
        self.set(style, path);
        self
    }

    pub fn set(&mut self, style: StyleKey, path: impl Into<PathBuf>) {
        self.paths.insert(style, path.into());
    }

    pub fn get(&self, style: StyleKey) -> Option<&Path> {
        self.paths.get(&style).map(PathBuf::as_path)
    }
}

/// Per-conversion cache of fallback fonts, keyed by style.
///
/// A style maps to either a loaded font or a cached failure; neither is ever
/// retried until [`clear`](FallbackFontCache::clear).
pub struct FallbackFontCache<L = FsFontLoader> {
    loader: L,
    entries: HashMap<StyleKey, Option<FontHandle>>,
    load_failures: Vec<SkipReason>,
}

impl FallbackFontCache<FsFontLoader> {
    pub fn new() -> Self {
        Self::with_loader(FsFontLoader)
    }
}

impl Default for FallbackFontCache<FsFontLoader> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: FontLoader> FallbackFontCache<L> {
    pub fn with_loader(loader: L) -> Self {
        FallbackFontCache {
            loader,
            entries: HashMap::new(),
            load_failures: Vec::new(),
        }
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.load_failures.clear();
    }

    /// Whether `style` has been looked up, successfully or not.
    pub fn is_cached(&self, style: StyleKey) -> bool {
        self.entries.contains_key(&style)
    }

    /// Load failures seen since the last call, for reporting.
    pub fn take_load_failures(&mut self) -> Vec<SkipReason> {
        std::mem::take(&mut self.load_failures)
    }

    /// The font for `style`, loading it on first request.
    pub fn resolve(&mut self, style: StyleKey, paths: &FallbackFontPaths) -> Option<FontHandle> {
        if let Some(entry) = self.entries.get(&style) {
            return entry.clone();
        }

        let entry = match paths.get(style) {
            Some(path) if path.exists() => match self.loader.load(path) {
                Ok(font) => {
                    info!(
                        "Loaded fallback font '{}' ({}) from {}",
                        style,
                        font.postscript_name(),
                        path.display()
                    );
                    Some(Rc::new(font))
                }
                Err(e) => {
                    let reason = SkipReason::FontLoadFailure {
                        style,
                        message: format!("{}: {}", path.display(), e),
                    };
                    warn!("{}", reason);
                    self.load_failures.push(reason);
                    None
                }
            },
            Some(path) => {
                warn!(
                    "Fallback font file for style '{}' not found: {}",
                    style,
                    path.display()
                );
                None
            }
            None => {
                debug!("No fallback font configured for style '{}'", style);
                None
            }
        };

        self.entries.insert(style, entry.clone());
        entry
    }

    /// Pick the best available fallback for a span's derived style.
    ///
    /// Returns the registration name with the font, or `None` when every
    /// candidate style is unavailable.
    pub fn select_for_span(
        &mut self,
        is_bold: bool,
        is_italic: bool,
        paths: &FallbackFontPaths,
    ) -> Option<(String, FontHandle)> {
        let order = fallback_order(DerivedStyle { is_bold, is_italic });
        for &style in order {
            if let Some(font) = self.resolve(style, paths) {
                return Some((style.registration_name(), font));
            }
        }
        None
    }
}
