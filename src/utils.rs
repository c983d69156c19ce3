use encoding_rs::UTF_16BE;
use lopdf::{Dictionary, Document, Object, Stream};

use crate::data::pdf_doc_encoding;

static NULL_OBJECT: Object = Object::Null;

fn decode_utf16be(s: &[u8]) -> String {
    UTF_16BE
        .decode_without_bom_handling(s)
        .0
        .into_owned()
}

pub(crate) fn pdf_to_utf8(s: &[u8]) -> String {
    to_utf8(pdf_doc_encoding(), s)
}

pub(crate) fn to_utf8(encoding: &[u16], s: &[u8]) -> String {
    if s.len() > 2 && s[0] == 0xfe && s[1] == 0xff {
        return decode_utf16be(&s[2..]);
    }
    let r: Vec<u8> = s
        .iter()
        .flat_map(|&x| {
            let k = encoding.get(x as usize).copied().unwrap_or(0);
            if k == 0 {
                vec![].into_iter()
            } else {
                vec![(k >> 8) as u8, k as u8].into_iter()
            }
        })
        .collect();
    decode_utf16be(&r)
}

/// Follow a reference; dangling references read as `null`.
pub(crate) fn maybe_deref<'a>(doc: &'a Document, o: &'a Object) -> &'a Object {
    match o {
        &Object::Reference(r) => doc.get_object(r).unwrap_or(&NULL_OBJECT),
        _ => o,
    }
}

pub(crate) fn maybe_get_obj<'a>(
    doc: &'a Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Object> {
    dict.get(key)
        .map(|o| maybe_deref(doc, o))
        .ok()
        .filter(|o| !matches!(o, Object::Null))
}

pub(crate) trait FromObj<'a>
where
    Self: std::marker::Sized,
{
    fn from_obj(doc: &'a Document, obj: &'a Object) -> Option<Self>;
}

impl<'a, T: FromObj<'a>> FromObj<'a> for Vec<T> {
    fn from_obj(doc: &'a Document, obj: &'a Object) -> Option<Self> {
        maybe_deref(doc, obj)
            .as_array()
            .ok()?
            .iter()
            .map(|x| T::from_obj(doc, x))
            .collect()
    }
}

impl<'a> FromObj<'a> for f32 {
    fn from_obj(doc: &Document, obj: &Object) -> Option<Self> {
        match maybe_deref(doc, obj) {
            &Object::Integer(i) => Some(i as f32),
            &Object::Real(f) => Some(f),
            _ => None,
        }
    }
}

impl<'a> FromObj<'a> for i64 {
    fn from_obj(doc: &Document, obj: &Object) -> Option<Self> {
        match maybe_deref(doc, obj) {
            &Object::Integer(i) => Some(i),
            _ => None,
        }
    }
}

impl<'a> FromObj<'a> for &'a Dictionary {
    fn from_obj(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
        maybe_deref(doc, obj).as_dict().ok()
    }
}

impl<'a> FromObj<'a> for &'a Stream {
    fn from_obj(doc: &'a Document, obj: &'a Object) -> Option<&'a Stream> {
        maybe_deref(doc, obj).as_stream().ok()
    }
}

impl<'a> FromObj<'a> for &'a Object {
    fn from_obj(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
        Some(maybe_deref(doc, obj))
    }
}

pub(crate) fn maybe_get<'a, T: FromObj<'a>>(
    doc: &'a Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<T> {
    maybe_get_obj(doc, dict, key).and_then(|o| T::from_obj(doc, o))
}

pub(crate) fn maybe_get_name_string<'a>(
    doc: &'a Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<String> {
    maybe_get_name(doc, dict, key).map(pdf_to_utf8)
}

pub(crate) fn maybe_get_name<'a>(
    doc: &'a Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a [u8]> {
    maybe_get_obj(doc, dict, key).and_then(|n| n.as_name().ok())
}

pub(crate) fn maybe_get_array<'a>(
    doc: &'a Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Vec<Object>> {
    maybe_get_obj(doc, dict, key).and_then(|n| n.as_array().ok())
}

pub(crate) fn as_num(o: &Object) -> Option<f32> {
    match o {
        &Object::Integer(i) => Some(i as f32),
        &Object::Real(f) => Some(f),
        _ => None,
    }
}

/// All operands as numbers, or `None` if any of them is not one.
pub(crate) fn as_nums(operands: &[Object]) -> Option<Vec<f32>> {
    operands.iter().map(as_num).collect()
}

pub(crate) fn get_contents(contents: &Stream) -> Vec<u8> {
    if contents.filters().is_ok() {
        contents
            .decompressed_content()
            .unwrap_or_else(|_| contents.content.clone())
    } else {
        contents.content.clone()
    }
}

/// Look `key` up on a page node, walking up the page tree if needed.
pub(crate) fn get_inherited<'a, T: FromObj<'a>>(
    doc: &'a Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<T> {
    let o: Option<T> = maybe_get(doc, dict, key);
    if let Some(o) = o {
        Some(o)
    } else {
        let parent = dict
            .get(b"Parent")
            .and_then(|parent| parent.as_reference())
            .and_then(|id| doc.get_dictionary(id))
            .ok()?;
        get_inherited(doc, parent, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdfdoc_and_utf16_strings() {
        assert_eq!(pdf_to_utf8(b"Hello"), "Hello");
        assert_eq!(pdf_to_utf8(&[0xfe, 0xff, 0x04, 0x16]), "Ж");
        // 0x84 is an em dash in PDFDocEncoding
        assert_eq!(pdf_to_utf8(&[0x84]), "\u{2014}");
    }

    #[test]
    fn numbers() {
        assert_eq!(as_num(&Object::Integer(3)), Some(3.));
        assert_eq!(as_num(&Object::Real(0.5)), Some(0.5));
        assert_eq!(as_num(&Object::Null), None);
        assert_eq!(
            as_nums(&[Object::Integer(1), Object::Real(2.)]),
            Some(vec![1., 2.])
        );
        assert_eq!(as_nums(&[Object::Integer(1), Object::Null]), None);
    }
}
