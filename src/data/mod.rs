mod encodings;
mod glyphnames;

pub(crate) use encodings::*;
pub(crate) use glyphnames::glyph_name_to_unicode;
