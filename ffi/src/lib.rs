mod types;

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_void};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr;

use pdf_darkmode::{convert_to_dark_mode, DarkModeConverter, FallbackFontPaths};

pub use types::{FfiFallbackFonts, FfiReport};

/// Called after every page with `(pages_done, pages_total, user_data)`.
pub type FfiProgressCallback = extern "C" fn(u32, u32, *mut c_void);

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = RefCell::new(None);
}

fn set_last_error(err: String) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(err).ok();
    });
}

fn into_c_string(message: String) -> *mut c_char {
    match CString::new(message.replace('\0', " ")) {
        Ok(s) => s.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

unsafe fn path_arg<'a>(ptr: *const c_char, what: &str) -> Result<&'a str, String> {
    if ptr.is_null() {
        return Err(format!("{} pointer is null", what));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|e| format!("Invalid UTF-8 in {}: {}", what, e))
}

unsafe fn fonts_arg(fonts: *const FfiFallbackFonts) -> Result<FallbackFontPaths, String> {
    if fonts.is_null() {
        Ok(FallbackFontPaths::new())
    } else {
        (*fonts).to_paths()
    }
}

/// Convert `input` to a dark-mode PDF at `output`.
///
/// Returns null on success. On failure returns an error message that must be
/// released with [`pdf_darkmode_string_free`]. `fonts` and `progress` may be
/// null.
///
/// # Safety
///
/// `input` and `output` must be NUL-terminated strings; `fonts`, when not
/// null, must point to a valid [`FfiFallbackFonts`].
#[no_mangle]
pub unsafe extern "C" fn pdf_darkmode_convert(
    input: *const c_char,
    output: *const c_char,
    fonts: *const FfiFallbackFonts,
    progress: Option<FfiProgressCallback>,
    user_data: *mut c_void,
) -> *mut c_char {
    let args = path_arg(input, "input path").and_then(|input| {
        let output = path_arg(output, "output path")?;
        Ok((input, output, fonts_arg(fonts)?))
    });
    let (input, output, fonts) = match args {
        Ok(args) => args,
        Err(e) => return into_c_string(e),
    };

    let result = convert_to_dark_mode(input, output, &fonts, |done, total| {
        if let Some(callback) = progress {
            callback(done, total, user_data);
        }
    });
    match result {
        None => ptr::null_mut(),
        Some(message) => into_c_string(message),
    }
}

/// Like [`pdf_darkmode_convert`], with an optional password, filling `report`
/// on success. Returns 0 on success and -1 on failure; the message is then
/// available from [`pdf_darkmode_last_error`].
///
/// # Safety
///
/// Same as [`pdf_darkmode_convert`]; `password` may be null and `report`, when
/// not null, must be writable.
#[no_mangle]
pub unsafe extern "C" fn pdf_darkmode_convert_with_report(
    input: *const c_char,
    output: *const c_char,
    fonts: *const FfiFallbackFonts,
    password: *const c_char,
    report: *mut FfiReport,
) -> i32 {
    let args = path_arg(input, "input path").and_then(|input| {
        let output = path_arg(output, "output path")?;
        let password = if password.is_null() {
            None
        } else {
            Some(path_arg(password, "password")?)
        };
        Ok((input, output, fonts_arg(fonts)?, password))
    });
    let (input, output, fonts, password) = match args {
        Ok(args) => args,
        Err(e) => {
            set_last_error(e);
            return -1;
        }
    };

    let mut builder = DarkModeConverter::builder().fallback_fonts(fonts);
    if let Some(password) = password {
        builder = builder.password(password);
    }
    let converter = builder.build();
    let result = catch_unwind(AssertUnwindSafe(|| converter.convert(input, output)));
    match result {
        Ok(Ok(converted)) => {
            if !report.is_null() {
                *report = FfiReport::from(&converted);
            }
            0
        }
        Ok(Err(e)) => {
            set_last_error(format!("Failed to convert PDF: {}", e));
            -1
        }
        Err(_) => {
            set_last_error("Failed to convert PDF: unexpected failure".to_string());
            -1
        }
    }
}

/// # Safety
///
/// `s` must be null or a string returned by this library.
#[no_mangle]
pub unsafe extern "C" fn pdf_darkmode_string_free(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

#[no_mangle]
pub extern "C" fn pdf_darkmode_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match e.borrow().as_ref() {
        Some(err) => err.as_ptr(),
        None => ptr::null(),
    })
}
