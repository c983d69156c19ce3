//! Single-byte base encodings, as code → UTF-16 tables (0 = unmapped).

use std::sync::OnceLock;

use encoding_rs::{Encoding, MACINTOSH, WINDOWS_1252};

/// Bytes WinAnsiEncoding leaves undefined even though Windows-1252 passes
/// them through as C1 controls.
const WIN_ANSI_UNDEFINED: [u8; 5] = [0x81, 0x8d, 0x8f, 0x90, 0x9d];

const STANDARD_HIGH: &[(u8, u16)] = &[
    (0xa1, 0x00a1),
    (0xa2, 0x00a2),
    (0xa3, 0x00a3),
    (0xa4, 0x2044),
    (0xa5, 0x00a5),
    (0xa6, 0x0192),
    (0xa7, 0x00a7),
    (0xa8, 0x00a4),
    (0xa9, 0x0027),
    (0xaa, 0x201c),
    (0xab, 0x00ab),
    (0xac, 0x2039),
    (0xad, 0x203a),
    (0xae, 0xfb01),
    (0xaf, 0xfb02),
    (0xb1, 0x2013),
    (0xb2, 0x2020),
    (0xb3, 0x2021),
    (0xb4, 0x00b7),
    (0xb6, 0x00b6),
    (0xb7, 0x2022),
    (0xb8, 0x201a),
    (0xb9, 0x201e),
    (0xba, 0x201d),
    (0xbb, 0x00bb),
    (0xbc, 0x2026),
    (0xbd, 0x2030),
    (0xbf, 0x00bf),
    (0xc1, 0x0060),
    (0xc2, 0x00b4),
    (0xc3, 0x02c6),
    (0xc4, 0x02dc),
    (0xc5, 0x00af),
    (0xc6, 0x02d8),
    (0xc7, 0x02d9),
    (0xc8, 0x00a8),
    (0xca, 0x02da),
    (0xcb, 0x00b8),
    (0xcd, 0x02dd),
    (0xce, 0x02db),
    (0xcf, 0x02c7),
    (0xd0, 0x2014),
    (0xe1, 0x00c6),
    (0xe3, 0x00aa),
    (0xe8, 0x0141),
    (0xe9, 0x00d8),
    (0xea, 0x0152),
    (0xeb, 0x00ba),
    (0xf1, 0x00e6),
    (0xf5, 0x0131),
    (0xf8, 0x0142),
    (0xf9, 0x00f8),
    (0xfa, 0x0153),
    (0xfb, 0x00df),
];

/// Where PDFDocEncoding departs from Latin-1.
const PDF_DOC_DIFFERENCES: &[(u8, u16)] = &[
    (0x18, 0x02d8),
    (0x19, 0x02c7),
    (0x1a, 0x02c6),
    (0x1b, 0x02d9),
    (0x1c, 0x02dd),
    (0x1d, 0x02db),
    (0x1e, 0x02da),
    (0x1f, 0x02dc),
    (0x7f, 0),
    (0x80, 0x2022),
    (0x81, 0x2020),
    (0x82, 0x2021),
    (0x83, 0x2026),
    (0x84, 0x2014),
    (0x85, 0x2013),
    (0x86, 0x0192),
    (0x87, 0x2044),
    (0x88, 0x2039),
    (0x89, 0x203a),
    (0x8a, 0x2212),
    (0x8b, 0x2030),
    (0x8c, 0x201e),
    (0x8d, 0x201c),
    (0x8e, 0x201d),
    (0x8f, 0x2018),
    (0x90, 0x2019),
    (0x91, 0x201a),
    (0x92, 0x2122),
    (0x93, 0xfb01),
    (0x94, 0xfb02),
    (0x95, 0x0141),
    (0x96, 0x0152),
    (0x97, 0x0160),
    (0x98, 0x0178),
    (0x99, 0x017d),
    (0x9a, 0x0131),
    (0x9b, 0x0142),
    (0x9c, 0x0153),
    (0x9d, 0x0161),
    (0x9e, 0x017e),
    (0x9f, 0),
    (0xa0, 0x20ac),
    (0xad, 0),
];

/// The encoding of PDF text strings outside content streams.
pub(crate) fn pdf_doc_encoding() -> &'static [u16] {
    static TABLE: OnceLock<Vec<u16>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table: Vec<u16> = (0..=255u16).collect();
        table[0] = 0;
        for &(code, u) in PDF_DOC_DIFFERENCES {
            table[code as usize] = u;
        }
        table
    })
}

fn decode_single_byte(encoding: &'static Encoding) -> Vec<u16> {
    (0..=255u8)
        .map(|b| {
            let bytes = [b];
            let (s, _, had_errors) = encoding.decode(&bytes);
            match s.chars().next() {
                Some(c) if !had_errors && (c as u32) <= 0xffff => c as u16,
                _ => 0,
            }
        })
        .collect()
}

pub(crate) fn standard_encoding() -> Vec<u16> {
    let mut table = vec![0u16; 256];
    for code in 0x20..0x7f {
        table[code] = code as u16;
    }
    table[0x27] = 0x2019;
    table[0x60] = 0x2018;
    for &(code, u) in STANDARD_HIGH {
        table[code as usize] = u;
    }
    table
}

pub(crate) fn win_ansi_encoding() -> Vec<u16> {
    let mut table = decode_single_byte(WINDOWS_1252);
    for code in 0..0x20 {
        table[code] = 0;
    }
    for code in WIN_ANSI_UNDEFINED {
        table[code as usize] = 0;
    }
    table
}

pub(crate) fn mac_roman_encoding() -> Vec<u16> {
    let mut table = decode_single_byte(MACINTOSH);
    for code in 0..0x20 {
        table[code] = 0;
    }
    table
}

/// Table for a named base encoding. MacExpertEncoding only holds small caps
/// and old-style figures; it is read as StandardEncoding.
pub(crate) fn encoding_table(name: &[u8]) -> Option<Vec<u16>> {
    match name {
        b"WinAnsiEncoding" => Some(win_ansi_encoding()),
        b"MacRomanEncoding" => Some(mac_roman_encoding()),
        b"StandardEncoding" | b"MacExpertEncoding" => Some(standard_encoding()),
        _ => None,
    }
}

/// WinAnsi code for `c`, if it has one.
pub(crate) fn win_ansi_code(c: char) -> Option<u8> {
    if (c as u32) < 0x20 {
        return None;
    }
    let mut buf = [0u8; 4];
    let s = c.encode_utf8(&mut buf);
    let (bytes, _, had_errors) = WINDOWS_1252.encode(s);
    match &bytes[..] {
        [b] if !had_errors && !WIN_ANSI_UNDEFINED.contains(b) => Some(*b),
        _ => None,
    }
}
