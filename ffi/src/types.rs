use std::ffi::CStr;
use std::os::raw::c_char;

use pdf_darkmode::{ConversionReport, FallbackFontPaths, StyleKey};

/// Fallback font file per style. Null entries are not configured.
#[repr(C)]
pub struct FfiFallbackFonts {
    pub regular: *const c_char,
    pub bold: *const c_char,
    pub italic: *const c_char,
    pub bold_italic: *const c_char,
}

impl FfiFallbackFonts {
    /// # Safety
    ///
    /// Every non-null entry must point to a NUL-terminated string.
    pub unsafe fn to_paths(&self) -> Result<FallbackFontPaths, String> {
        let mut paths = FallbackFontPaths::new();
        for (style, ptr) in [
            (StyleKey::Regular, self.regular),
            (StyleKey::Bold, self.bold),
            (StyleKey::Italic, self.italic),
            (StyleKey::BoldItalic, self.bold_italic),
        ] {
            if ptr.is_null() {
                continue;
            }
            let path = CStr::from_ptr(ptr)
                .to_str()
                .map_err(|e| format!("Invalid UTF-8 in {} font path: {}", style, e))?;
            paths.set(style, path);
        }
        Ok(paths)
    }
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FfiReport {
    pub pages: u32,
    pub spans_inserted: usize,
    pub spans_via_fallback: usize,
    pub spans_skipped: usize,
    pub paths_redrawn: usize,
    pub paths_discarded: usize,
    pub images_copied: usize,
    pub images_skipped: usize,
}

impl From<&ConversionReport> for FfiReport {
    fn from(report: &ConversionReport) -> Self {
        FfiReport {
            pages: report.pages,
            spans_inserted: report.spans_inserted,
            spans_via_fallback: report.spans_via_fallback,
            spans_skipped: report.spans_skipped,
            paths_redrawn: report.paths_redrawn,
            paths_discarded: report.paths_discarded,
            images_copied: report.images_copied,
            images_skipped: report.images_skipped,
        }
    }
}
