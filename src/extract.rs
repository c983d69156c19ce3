use std::collections::HashSet;
use std::path::{Path, PathBuf};

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, info, warn};

use crate::error::{ConvertError, Stage};
use crate::output::PageCollector;
use crate::processor::Processor;
use crate::types::{ImageRef, MediaBox, SourcePage, Transform};
use crate::utils::{get_inherited, maybe_get_name};

/// US Letter, used when a page tree carries no media box at all.
const DEFAULT_MEDIA_BOX: [f32; 4] = [0., 0., 612., 792.];

/// An image XObject lifted out of the source document together with every
/// object it references, ready to be copied into another document.
#[derive(Debug, Clone)]
pub struct ImageData {
    pub(crate) id: ObjectId,
    pub(crate) stream: Stream,
    pub(crate) dependencies: Vec<(ObjectId, Object)>,
}

impl ImageData {
    pub fn width(&self) -> Option<i64> {
        self.stream.dict.get(b"Width").and_then(Object::as_i64).ok()
    }

    pub fn height(&self) -> Option<i64> {
        self.stream.dict.get(b"Height").and_then(Object::as_i64).ok()
    }

    /// Raw, still-encoded sample bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.stream.content
    }
}

/// A PDF opened for reading.
pub struct SourceDocument {
    doc: Document,
    pages: Vec<ObjectId>,
}

impl SourceDocument {
    /// Open and, if needed, decrypt a PDF. Encrypted files are tried with the
    /// empty password unless one is given.
    pub fn open<P: AsRef<Path>>(path: P, password: Option<&str>) -> Result<Self, ConvertError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConvertError::InputNotFound(path.to_path_buf()));
        }
        let doc = Document::load(path).map_err(|source| ConvertError::InputCorrupt {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_document(doc, password).map_err(|source| ConvertError::InputCorrupt {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Open a PDF held in memory.
    pub fn from_bytes(bytes: &[u8], password: Option<&str>) -> Result<Self, ConvertError> {
        let corrupt = |source| ConvertError::InputCorrupt {
            path: PathBuf::from("<memory>"),
            source,
        };
        let doc = Document::load_mem(bytes).map_err(corrupt)?;
        Self::from_document(doc, password).map_err(corrupt)
    }

    fn from_document(mut doc: Document, password: Option<&str>) -> Result<Self, lopdf::Error> {
        if doc.is_encrypted() {
            doc.decrypt(password.unwrap_or(""))?;
        }
        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        info!("Opened document with {} pages", pages.len());
        Ok(SourceDocument { doc, pages })
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Extract text, paths and images of the page at 0-based `index`.
    pub fn page(&self, index: u32) -> Result<SourcePage, ConvertError> {
        let number = index + 1;
        let stage = Stage::Page(number);
        let id = *self
            .pages
            .get(index as usize)
            .ok_or_else(|| ConvertError::unexpected(stage, "page index out of range"))?;
        let page_dict = self
            .doc
            .get_dictionary(id)
            .map_err(|e| ConvertError::unexpected(stage, e.to_string()))?;

        let media_box = self.media_box(page_dict, number);
        let rotation = get_inherited::<i64>(&self.doc, page_dict, b"Rotate").unwrap_or(0);

        let empty_resources = Dictionary::new();
        let resources: &Dictionary =
            get_inherited(&self.doc, page_dict, b"Resources").unwrap_or(&empty_resources);
        let content = match self.doc.get_page_content(id) {
            Ok(content) => content,
            Err(e) => {
                warn!("Page {} content unreadable: {}", number, e);
                Vec::new()
            }
        };

        let mut collector = PageCollector::new(&media_box);
        Processor::new().process_stream(
            &self.doc,
            content,
            resources,
            Transform::identity(),
            &mut collector,
            number,
        );
        let content = collector.finish();
        debug!(
            "Page {}: {} blocks, {} paths, {} images",
            number,
            content.blocks.len(),
            content.paths.len(),
            content.images.len()
        );

        Ok(SourcePage {
            number,
            width: media_box.width(),
            height: media_box.height(),
            rotation,
            blocks: content.blocks,
            paths: content.paths,
            images: content.images,
        })
    }

    fn media_box(&self, page_dict: &Dictionary, number: u32) -> MediaBox {
        let values = get_inherited::<Vec<f32>>(&self.doc, page_dict, b"MediaBox")
            .filter(|v| v.len() == 4)
            .unwrap_or_else(|| {
                warn!("Page {} has no usable MediaBox, assuming Letter", number);
                DEFAULT_MEDIA_BOX.to_vec()
            });
        MediaBox {
            llx: values[0].min(values[2]),
            lly: values[1].min(values[3]),
            urx: values[0].max(values[2]),
            ury: values[1].max(values[3]),
        }
    }

    /// Lift an image XObject and its dependencies out of the document.
    pub fn extract_image(&self, image: ImageRef) -> Result<ImageData, String> {
        let stream = self
            .doc
            .get_object(image.0)
            .and_then(Object::as_stream)
            .map_err(|e| e.to_string())?;
        if maybe_get_name(&self.doc, &stream.dict, b"Subtype") != Some(b"Image".as_slice()) {
            return Err("not an image XObject".to_owned());
        }

        let mut seen = HashSet::from([image.0]);
        let mut dependencies = Vec::new();
        let mut pending = Vec::new();
        collect_references(&Object::Dictionary(stream.dict.clone()), &mut pending);
        while let Some(id) = pending.pop() {
            if !seen.insert(id) {
                continue;
            }
            let object = self.doc.get_object(id).map_err(|e| e.to_string())?;
            collect_references(object, &mut pending);
            dependencies.push((id, object.clone()));
        }

        Ok(ImageData {
            id: image.0,
            stream: stream.clone(),
            dependencies,
        })
    }
}

fn collect_references(object: &Object, out: &mut Vec<ObjectId>) {
    match object {
        Object::Reference(id) => out.push(*id),
        Object::Array(items) => items.iter().for_each(|o| collect_references(o, out)),
        Object::Dictionary(dict) => dict.iter().for_each(|(_, o)| collect_references(o, out)),
        Object::Stream(stream) => stream
            .dict
            .iter()
            .for_each(|(_, o)| collect_references(o, out)),
        _ => {}
    }
}
