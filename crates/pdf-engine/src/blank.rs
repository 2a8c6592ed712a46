use crate::{PageSize, PdfEngineError};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};

/// Builds a document of empty pages with the given sizes.
pub fn blank_pdf(pages: &[PageSize]) -> Result<Vec<u8>, PdfEngineError> {
    if pages.is_empty() {
        return Err(PdfEngineError::Backend("document has no pages".to_owned()));
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids = Vec::with_capacity(pages.len());
    for size in pages {
        let content_id = doc.add_object(Stream::new(Dictionary::new(), Vec::new()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), size.width_pt.into(), size.height_pt.into()],
            "Contents" => content_id,
            "Resources" => Dictionary::new(),
        });
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => pages.len() as i64,
            "Kids" => kids,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}
