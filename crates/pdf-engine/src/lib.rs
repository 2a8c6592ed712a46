mod blank;
mod overlay;

pub use blank::blank_pdf;
pub use overlay::{DrawCommand, PageOverlay, Rgb};

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_PAGE_SIZE: PageSize = PageSize { width_pt: 612.0, height_pt: 792.0 };
const OVERLAY_XOBJECT: &str = "AnnotOverlay";
/// Guards against cyclic `Parent` chains in malformed page trees.
const MAX_PAGE_TREE_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(u64);

impl DocumentHandle {
    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

#[derive(Debug, Clone)]
pub enum OpenSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<PathBuf> for OpenSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for OpenSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for OpenSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("invalid handle {0}")]
    InvalidHandle(u64),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("encrypted PDFs are not supported in the default backend")]
    EncryptedUnsupported,
    #[error("backend error: {0}")]
    Backend(String),
}

/// Boundary to the PDF library: page geometry for laying out annotations and
/// the ability to burn drawn overlays into a copy of the document.
pub trait PdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError>;
    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError>;
    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError>;
    /// The bytes the document was opened from, unchanged.
    fn document_bytes(&self, handle: DocumentHandle) -> Result<&[u8], PdfEngineError>;
    /// Returns a new PDF with every overlay drawn on top of its page.
    fn flatten(
        &self,
        handle: DocumentHandle,
        overlays: &[PageOverlay],
    ) -> Result<Vec<u8>, PdfEngineError>;
    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError>;
}

#[derive(Debug, Clone)]
struct DocumentRecord {
    bytes: Vec<u8>,
    page_sizes: Vec<PageSize>,
}

#[derive(Debug, Default)]
pub struct LopdfEngine {
    next_handle: u64,
    docs: HashMap<DocumentHandle, DocumentRecord>,
}

impl LopdfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse_sizes(bytes: &[u8]) -> Result<Vec<PageSize>, PdfEngineError> {
        if bytes.windows("/Encrypt".len()).any(|window| window == b"/Encrypt") {
            return Err(PdfEngineError::EncryptedUnsupported);
        }

        let doc = Document::load_mem(bytes)?;
        let sizes: Vec<PageSize> = doc
            .get_pages()
            .into_values()
            .map(|page_id| {
                media_box(&doc, page_id)
                    .map(|[x0, y0, x1, y1]| PageSize {
                        width_pt: (x1 - x0).abs(),
                        height_pt: (y1 - y0).abs(),
                    })
                    .unwrap_or(DEFAULT_PAGE_SIZE)
            })
            .collect();

        if sizes.is_empty() {
            return Err(PdfEngineError::Backend("document has no pages".to_owned()));
        }

        Ok(sizes)
    }

    fn record(&self, handle: DocumentHandle) -> Result<&DocumentRecord, PdfEngineError> {
        self.docs.get(&handle).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

impl PdfEngine for LopdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
        let bytes = match source {
            OpenSource::Path(path) => fs::read(path)?,
            OpenSource::Bytes(bytes) => bytes,
        };

        let page_sizes = Self::parse_sizes(&bytes)?;

        self.next_handle += 1;
        let handle = DocumentHandle(self.next_handle);
        tracing::debug!(handle = handle.raw(), pages = page_sizes.len(), "opened document");
        self.docs.insert(handle, DocumentRecord { bytes, page_sizes });

        Ok(handle)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
        Ok(self.record(handle)?.page_sizes.len() as u32)
    }

    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError> {
        let record = self.record(handle)?;
        record.page_sizes.get(page_index as usize).copied().ok_or(PdfEngineError::PageOutOfRange {
            page: page_index,
            page_count: record.page_sizes.len() as u32,
        })
    }

    fn document_bytes(&self, handle: DocumentHandle) -> Result<&[u8], PdfEngineError> {
        Ok(&self.record(handle)?.bytes)
    }

    fn flatten(
        &self,
        handle: DocumentHandle,
        overlays: &[PageOverlay],
    ) -> Result<Vec<u8>, PdfEngineError> {
        let record = self.record(handle)?;
        let mut doc = Document::load_mem(&record.bytes)?;
        let pages = doc.get_pages();
        let page_count = pages.len() as u32;

        for overlay in overlays.iter().filter(|overlay| !overlay.is_empty()) {
            let page_id = *pages
                .get(&(overlay.page_index + 1))
                .ok_or(PdfEngineError::PageOutOfRange { page: overlay.page_index, page_count })?;
            apply_overlay(&mut doc, page_id, overlay)?;
        }

        let mut output = Vec::new();
        doc.save_to(&mut output)?;
        tracing::debug!(
            handle = handle.raw(),
            overlays = overlays.len(),
            bytes = output.len(),
            "flattened document"
        );
        Ok(output)
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        self.docs.remove(&handle).map(|_| ()).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

pub fn default_engine() -> LopdfEngine {
    LopdfEngine::new()
}

/// MediaBox of a page, following inherited values up the page tree.
fn media_box(doc: &Document, page_id: ObjectId) -> Option<[f32; 4]> {
    let mut current = Some(page_id);
    for _ in 0..MAX_PAGE_TREE_DEPTH {
        let dict = doc.get_dictionary(current?).ok()?;
        if let Some(found) = dict.get(b"MediaBox").ok().and_then(|raw| read_box(doc, raw)) {
            return Some(found);
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}

fn read_box(doc: &Document, raw: &Object) -> Option<[f32; 4]> {
    let resolved = match raw {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };
    let array = resolved.as_array().ok()?;
    if array.len() != 4 {
        return None;
    }
    let mut values = [0.0; 4];
    for (slot, value) in values.iter_mut().zip(array) {
        *slot = value.as_float().ok()?;
    }
    Some(values)
}

fn apply_overlay(
    doc: &mut Document,
    page_id: ObjectId,
    overlay: &PageOverlay,
) -> Result<(), PdfEngineError> {
    let [x0, y0, x1, y1] = media_box(doc, page_id).unwrap_or([
        0.0,
        0.0,
        DEFAULT_PAGE_SIZE.width_pt,
        DEFAULT_PAGE_SIZE.height_pt,
    ]);
    let (origin_x, origin_y) = (x0.min(x1), y0.min(y1));
    let (mut width, mut height) = ((x1 - x0).abs(), (y1 - y0).abs());

    if let Some((new_width, new_height)) = overlay.resize {
        width = new_width;
        height = new_height;
        let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
        let media_box: Vec<Object> = vec![
            origin_x.into(),
            origin_y.into(),
            (origin_x + width).into(),
            (origin_y + height).into(),
        ];
        page.set("MediaBox", media_box);
        page.remove(b"CropBox");
    }

    if overlay.commands.is_empty() {
        return Ok(());
    }

    let encoded = overlay::encode_commands(&overlay.commands)
        .map_err(|err| PdfEngineError::Backend(format!("failed to encode overlay: {err}")))?;

    let mut alpha_states = Dictionary::new();
    for (name, alpha) in &encoded.alpha_states {
        alpha_states.set(
            name.as_str(),
            dictionary! { "Type" => "ExtGState", "ca" => *alpha, "CA" => *alpha },
        );
    }

    let resources = dictionary! {
        "Font" => dictionary! {
            overlay::OVERLAY_FONT => dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => "Helvetica",
                "Encoding" => "WinAnsiEncoding",
            },
        },
        "ExtGState" => alpha_states,
    };

    let form = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => vec![0.into(), 0.into(), width.into(), height.into()],
            "Matrix" => vec![
                1.into(),
                0.into(),
                0.into(),
                1.into(),
                origin_x.into(),
                origin_y.into(),
            ],
            "Resources" => resources,
        },
        encoded.content,
    );
    let form_id = doc.add_object(form);

    // Resources may be shared with other pages or inherited from the page
    // tree, so the page gets its own copy before the form is registered.
    let mut resources = effective_resources(doc, page_id);
    let mut xobjects = resources
        .get(b"XObject")
        .ok()
        .and_then(|raw| resolve_dictionary(doc, raw))
        .unwrap_or_else(Dictionary::new);
    let name = unused_name(&xobjects, overlay.page_index);
    xobjects.set(name.as_bytes().to_vec(), form_id);
    resources.set("XObject", xobjects);
    doc.get_object_mut(page_id)?.as_dict_mut()?.set("Resources", resources);

    isolate_page_contents(doc, page_id, format!("q /{name} Do Q\n").into_bytes())
}

/// Resources in effect for a page, following inherited values up the page tree.
fn effective_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    let mut current = Some(page_id);
    for _ in 0..MAX_PAGE_TREE_DEPTH {
        let Some(dict) = current.and_then(|id| doc.get_dictionary(id).ok()) else {
            break;
        };
        let found = dict.get(b"Resources").ok().and_then(|raw| resolve_dictionary(doc, raw));
        if let Some(found) = found {
            return found;
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    Dictionary::new()
}

fn resolve_dictionary(doc: &Document, raw: &Object) -> Option<Dictionary> {
    match raw {
        Object::Reference(id) => doc.get_dictionary(*id).ok().cloned(),
        Object::Dictionary(dict) => Some(dict.clone()),
        _ => None,
    }
}

/// `AnnotOverlay<page>`, suffixed when a previous export already used it.
fn unused_name(xobjects: &Dictionary, page_index: u32) -> String {
    let base = format!("{OVERLAY_XOBJECT}{page_index}");
    let mut name = base.clone();
    let mut suffix = 1;
    while xobjects.has(name.as_bytes()) {
        name = format!("{base}_{suffix}");
        suffix += 1;
    }
    name
}

/// Wraps the existing page content in `q`/`Q` so graphics state it leaves behind
/// cannot leak into the appended overlay invocation.
fn isolate_page_contents(
    doc: &mut Document,
    page_id: ObjectId,
    appended: Vec<u8>,
) -> Result<(), PdfEngineError> {
    let mut contents: Vec<Object> = match doc.get_dictionary(page_id)?.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    };

    let open_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let mut closing = b"Q\n".to_vec();
    closing.extend_from_slice(&appended);
    let close_id = doc.add_object(Stream::new(Dictionary::new(), closing));

    contents.insert(0, open_id.into());
    contents.push(close_id.into());

    doc.get_object_mut(page_id)?.as_dict_mut()?.set("Contents", contents);
    Ok(())
}
