//! Saved-annotation records and the binary container
//!
//! The container is a little-endian `u32` length, that many bytes of JSON
//! holding the annotation records, then the original PDF bytes verbatim.
//! Record geometry is stored at zoom 1.0 so a container reloads congruently
//! whatever zoom it was written at.

use crate::color::{Color, ColorParseError};
use crate::comment::Comment;
use crate::geometry::{PolygonParseError, Quad, SelectionGeometry};
use crate::highlight::{Highlight, HighlightError};
use crate::id::AnnotationId;
use crate::notation::Notation;
use crate::registry::{Entry, PageAnnotations};
use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Size of the length prefix.
pub const LENGTH_PREFIX_BYTES: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("container is {0} bytes, too short for the length prefix")]
    Truncated(usize),
    #[error("container declares a {declared} byte record block but only {available} bytes follow")]
    LengthExceedsBuffer { declared: usize, available: usize },
    #[error("record block of {0} bytes does not fit the length prefix")]
    TooLarge(usize),
    #[error("record block is not valid: {0}")]
    Json(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error(transparent)]
    Polygon(#[from] PolygonParseError),
    #[error("invalid color: {0}")]
    Color(#[from] ColorParseError),
    #[error(transparent)]
    Highlight(#[from] HighlightError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationRecord {
    pub page_number: u32,
    pub identifier: AnnotationId,
    pub clip_path_id: String,
    pub clip_path_polygon_points: Vec<String>,
    pub left_offset: f64,
    pub top_offset: f64,
    pub toolbar_left_offset: f64,
    pub toolbar_top_offset: f64,
    pub width: f64,
    pub height: f64,
    pub annotation_color: String,
}

impl AnnotationRecord {
    /// Captures a highlight, normalizing its geometry from `zoom` to 1.0.
    pub fn from_highlight(page_index: u32, highlight: &Highlight, zoom: f64) -> Self {
        let geometry = highlight.unscaled_geometry(zoom);
        Self {
            page_number: page_index,
            identifier: highlight.id().clone(),
            clip_path_id: highlight.clip_path_id().to_owned(),
            clip_path_polygon_points: geometry.polygons.iter().map(Quad::to_string).collect(),
            left_offset: geometry.left_offset,
            top_offset: geometry.top_offset,
            toolbar_left_offset: geometry.toolbar_left_offset,
            toolbar_top_offset: geometry.toolbar_top_offset,
            width: geometry.width,
            height: geometry.height,
            annotation_color: highlight.color().to_string(),
        }
    }

    /// Rebuilds the highlight at `zoom`, taking geometry verbatim from the record.
    pub fn to_highlight(&self, zoom: f64) -> Result<Highlight, RecordError> {
        let polygons = self
            .clip_path_polygon_points
            .iter()
            .map(|points| Quad::parse_points(points))
            .collect::<Result<Vec<_>, _>>()?;

        let mut geometry = SelectionGeometry {
            left_offset: self.left_offset,
            top_offset: self.top_offset,
            width: self.width,
            height: self.height,
            polygons,
            toolbar_left_offset: self.toolbar_left_offset,
            toolbar_top_offset: self.toolbar_top_offset,
        };
        geometry.scale(zoom);

        let color: Color = self.annotation_color.parse()?;
        Ok(Highlight::restore(self.identifier.clone(), self.clip_path_id.clone(), geometry, color)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotationRecord {
    pub page_number: u32,
    pub identifier: AnnotationId,
    pub text_commented: String,
    pub comment: String,
    pub matching_color: String,
}

impl NotationRecord {
    pub fn from_notation(page_index: u32, notation: &Notation) -> Self {
        Self {
            page_number: page_index,
            identifier: notation.id().clone(),
            text_commented: notation.text_commented().to_owned(),
            comment: notation.comment().to_owned(),
            matching_color: notation.matching_color().to_string(),
        }
    }

    pub fn to_notation(&self) -> Result<Notation, RecordError> {
        let color: Color = self.matching_color.parse()?;
        Ok(Notation::restore(self.identifier.clone(), &*self.text_commented, &*self.comment, color))
    }
}

/// Pairs a notation with its highlight by identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentLink {
    #[serde(rename = "notationID")]
    pub notation_id: AnnotationId,
    #[serde(rename = "annotationID")]
    pub annotation_id: AnnotationId,
}

/// The structured record block of a container.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SavedAnnotations {
    #[serde(default)]
    pub annotations: Vec<AnnotationRecord>,
    #[serde(default)]
    pub notations: Vec<NotationRecord>,
    #[serde(default)]
    pub comments: Vec<CommentLink>,
}

impl SavedAnnotations {
    /// Records every live annotation across `pages`, geometry normalized by `zoom`.
    pub fn snapshot<'a>(pages: impl IntoIterator<Item = &'a PageAnnotations>, zoom: f64) -> Self {
        let mut saved = Self::default();
        for page in pages {
            let page_index = page.page_index();
            for entry in page.entries() {
                let record = AnnotationRecord::from_highlight(page_index, entry.highlight(), zoom);
                saved.annotations.push(record);
                if let Entry::Comment(comment) = entry {
                    let notation = NotationRecord::from_notation(page_index, comment.notation());
                    saved.notations.push(notation);
                    saved.comments.push(CommentLink {
                        notation_id: comment.notation().id().clone(),
                        annotation_id: comment.highlight().id().clone(),
                    });
                }
            }
        }
        saved
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty() && self.notations.is_empty() && self.comments.is_empty()
    }
}

/// A decoded container borrowing the embedded document.
#[derive(Debug, Clone, PartialEq)]
pub struct Container<'a> {
    pub annotations: SavedAnnotations,
    pub document: &'a [u8],
}

pub fn encode_container(
    saved: &SavedAnnotations,
    document: &[u8],
) -> Result<Vec<u8>, ContainerError> {
    let block = serde_json::to_vec(saved)?;
    let length = u32::try_from(block.len()).map_err(|_| ContainerError::TooLarge(block.len()))?;

    let mut output = Vec::with_capacity(LENGTH_PREFIX_BYTES + block.len() + document.len());
    output.write_u32::<LittleEndian>(length)?;
    output.extend_from_slice(&block);
    output.extend_from_slice(document);
    Ok(output)
}

pub fn decode_container(bytes: &[u8]) -> Result<Container<'_>, ContainerError> {
    if bytes.len() < LENGTH_PREFIX_BYTES {
        return Err(ContainerError::Truncated(bytes.len()));
    }

    let declared = LittleEndian::read_u32(&bytes[..LENGTH_PREFIX_BYTES]) as usize;
    let rest = &bytes[LENGTH_PREFIX_BYTES..];
    if declared > rest.len() {
        return Err(ContainerError::LengthExceedsBuffer { declared, available: rest.len() });
    }

    let (block, document) = rest.split_at(declared);
    let annotations = serde_json::from_slice(block)?;
    Ok(Container { annotations, document })
}

/// Counts of what an import did with each record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ImportReport {
    /// Standalone highlights attached.
    pub highlights: usize,
    /// Highlight and notation pairs attached.
    pub comments: usize,
    /// Links whose annotation or notation record was missing.
    pub dangling_links: usize,
    /// Notation records no link refers to.
    pub orphaned_notations: usize,
    /// Records whose identifier already existed on their page.
    pub duplicates: usize,
    /// Records addressing a page the document does not have.
    pub out_of_range: usize,
    /// Records with unreadable polygons, colors or geometry.
    pub malformed: usize,
}

impl ImportReport {
    pub fn skipped(&self) -> usize {
        self.dangling_links
            + self.orphaned_notations
            + self.duplicates
            + self.out_of_range
            + self.malformed
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportItem {
    Highlight { page_index: u32, highlight: Highlight },
    Comment { page_index: u32, comment: Comment },
}

impl ImportItem {
    pub fn page_index(&self) -> u32 {
        match self {
            ImportItem::Highlight { page_index, .. } | ImportItem::Comment { page_index, .. } => {
                *page_index
            }
        }
    }
}

/// Entities rebuilt from saved records, ready to attach to pages.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImportPlan {
    /// Comments first, then the remaining standalone highlights, each in record order.
    pub items: Vec<ImportItem>,
    pub report: ImportReport,
}

/// Resolves links and rebuilds entities at `zoom`.
///
/// A link whose annotation record is missing drops the link and its notation.
/// A link whose notation record is missing leaves the annotation to be imported
/// as a standalone highlight. Notations no link reaches are dropped.
pub fn plan_import(saved: &SavedAnnotations, zoom: f64) -> ImportPlan {
    let mut plan = ImportPlan::default();

    let mut annotations_by_id: IndexMap<&AnnotationId, Vec<usize>> = IndexMap::new();
    for (index, record) in saved.annotations.iter().enumerate() {
        annotations_by_id.entry(&record.identifier).or_default().push(index);
    }
    let mut notations_by_id: IndexMap<&AnnotationId, Vec<usize>> = IndexMap::new();
    for (index, record) in saved.notations.iter().enumerate() {
        notations_by_id.entry(&record.identifier).or_default().push(index);
    }

    let mut annotation_used = vec![false; saved.annotations.len()];
    let mut notation_used = vec![false; saved.notations.len()];

    for link in &saved.comments {
        let notation_index = notations_by_id
            .get(&link.notation_id)
            .and_then(|indices| indices.iter().copied().find(|&index| !notation_used[index]));
        let Some(notation_index) = notation_index else {
            tracing::warn!(
                notation = %link.notation_id,
                annotation = %link.annotation_id,
                "comment link references a missing notation"
            );
            plan.report.dangling_links += 1;
            continue;
        };
        let notation_record = &saved.notations[notation_index];

        // Prefer the annotation on the notation's own page.
        let candidates =
            annotations_by_id.get(&link.annotation_id).map(Vec::as_slice).unwrap_or_default();
        let mut annotation_index = None;
        for &index in candidates.iter().filter(|&&index| !annotation_used[index]) {
            if saved.annotations[index].page_number == notation_record.page_number {
                annotation_index = Some(index);
                break;
            }
            annotation_index.get_or_insert(index);
        }
        let Some(annotation_index) = annotation_index else {
            tracing::warn!(
                notation = %link.notation_id,
                annotation = %link.annotation_id,
                "comment link references a missing annotation; dropping its notation"
            );
            plan.report.dangling_links += 1;
            notation_used[notation_index] = true;
            continue;
        };
        let annotation_record = &saved.annotations[annotation_index];

        notation_used[notation_index] = true;
        annotation_used[annotation_index] = true;

        let page_index = annotation_record.page_number;
        let highlight = match annotation_record.to_highlight(zoom) {
            Ok(highlight) => highlight,
            Err(err) => {
                tracing::warn!(
                    annotation = %annotation_record.identifier,
                    error = %err,
                    "skipping malformed comment records"
                );
                plan.report.malformed += 1;
                continue;
            }
        };
        match notation_record.to_notation() {
            Ok(notation) => plan.items.push(ImportItem::Comment {
                page_index,
                comment: Comment::restore(highlight, notation),
            }),
            Err(err) => {
                tracing::warn!(
                    notation = %notation_record.identifier,
                    error = %err,
                    "importing highlight without its malformed notation"
                );
                plan.report.malformed += 1;
                plan.items.push(ImportItem::Highlight { page_index, highlight });
            }
        }
    }

    for (index, record) in saved.annotations.iter().enumerate() {
        if annotation_used[index] {
            continue;
        }
        match record.to_highlight(zoom) {
            Ok(highlight) => {
                plan.items.push(ImportItem::Highlight { page_index: record.page_number, highlight })
            }
            Err(err) => {
                tracing::warn!(
                    annotation = %record.identifier,
                    error = %err,
                    "skipping malformed annotation record"
                );
                plan.report.malformed += 1;
            }
        }
    }

    for (index, record) in saved.notations.iter().enumerate() {
        if !notation_used[index] {
            tracing::warn!(
                notation = %record.identifier,
                "dropping notation without a comment link"
            );
            plan.report.orphaned_notations += 1;
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Palette;
    use crate::geometry::tests::three_line_selection;

    fn annotation(page: u32, id: &str) -> AnnotationRecord {
        AnnotationRecord {
            page_number: page,
            identifier: AnnotationId::from(id),
            clip_path_id: format!("clipPath-{id}"),
            clip_path_polygon_points: vec!["0 0, 100 0, 100 18, 0 18".to_owned()],
            left_offset: 20.0,
            top_offset: 30.0,
            toolbar_left_offset: 120.0,
            toolbar_top_offset: 48.0,
            width: 100.0,
            height: 18.0,
            annotation_color: "rgba(215, 255, 39, 0.548)".to_owned(),
        }
    }

    fn notation(page: u32, id: &str) -> NotationRecord {
        NotationRecord {
            page_number: page,
            identifier: AnnotationId::from(id),
            text_commented: "quick fox".to_owned(),
            comment: "check this".to_owned(),
            matching_color: "rgba(215, 255, 39, 0.548)".to_owned(),
        }
    }

    fn link(notation: &str, annotation: &str) -> CommentLink {
        CommentLink {
            notation_id: AnnotationId::from(notation),
            annotation_id: AnnotationId::from(annotation),
        }
    }

    #[test]
    fn container_layout_is_length_json_document() {
        let saved =
            SavedAnnotations { annotations: vec![annotation(0, "a")], ..Default::default() };
        let document = b"%PDF-1.5 fake body";

        let bytes = encode_container(&saved, document).expect("encode should succeed");
        let declared = LittleEndian::read_u32(&bytes[..4]) as usize;

        assert_eq!(bytes.len(), 4 + declared + document.len());
        assert!(bytes[4..4 + declared].starts_with(b"{\"annotations\":[{\"pageNumber\":0,"));
        assert_eq!(&bytes[4 + declared..], document);

        let container = decode_container(&bytes).expect("decode should succeed");
        assert_eq!(container.annotations, saved);
        assert_eq!(container.document, document);
    }

    #[test]
    fn decode_rejects_short_and_overlong_buffers() {
        assert!(matches!(decode_container(&[1, 0]), Err(ContainerError::Truncated(2))));

        let mut bytes = 100u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(b"{}");
        assert!(matches!(
            decode_container(&bytes),
            Err(ContainerError::LengthExceedsBuffer { declared: 100, available: 2 })
        ));
    }

    #[test]
    fn decode_rejects_malformed_json() {
        let mut bytes = 5u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(b"{oops%PDF");
        assert!(matches!(decode_container(&bytes), Err(ContainerError::Json(_))));
    }

    #[test]
    fn missing_arrays_default_to_empty() {
        let mut bytes = 2u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(b"{}%PDF");

        let container = decode_container(&bytes).expect("decode should succeed");
        assert!(container.annotations.is_empty());
        assert_eq!(container.document, b"%PDF");
    }

    #[test]
    fn records_use_wire_field_names() {
        let saved = SavedAnnotations {
            annotations: vec![annotation(1, "7")],
            notations: vec![notation(1, "7")],
            comments: vec![link("7", "7")],
        };
        let value = serde_json::to_value(&saved).expect("serialize");

        let record = &value["annotations"][0];
        for key in [
            "pageNumber",
            "identifier",
            "clipPathId",
            "clipPathPolygonPoints",
            "leftOffset",
            "topOffset",
            "toolbarLeftOffset",
            "toolbarTopOffset",
            "width",
            "height",
            "annotationColor",
        ] {
            assert!(record.get(key).is_some(), "missing {key}");
        }
        assert_eq!(value["notations"][0]["textCommented"], "quick fox");
        assert_eq!(value["notations"][0]["matchingColor"], "rgba(215, 255, 39, 0.548)");
        assert_eq!(value["comments"][0]["notationID"], "7");
        assert_eq!(value["comments"][0]["annotationID"], "7");
    }

    #[test]
    fn numeric_identifiers_link_up() {
        let json = r#"{
            "annotations": [{"pageNumber": 0, "identifier": 7, "clipPathId": "c7",
                "clipPathPolygonPoints": ["0 0, 10 0, 10 10, 0 10"],
                "leftOffset": 1, "topOffset": 2,
                "toolbarLeftOffset": 11, "toolbarTopOffset": 12, "width": 10, "height": 10,
                "annotationColor": "rgba(15, 127, 255, 0.548)"}],
            "notations": [{"pageNumber": 0, "identifier": 7, "textCommented": "fox", "comment": "",
                "matchingColor": "rgba(15, 127, 255, 0.548)"}],
            "comments": [{"notationID": 7, "annotationID": "7"}]
        }"#;
        let saved: SavedAnnotations = serde_json::from_str(json).expect("records should decode");

        let plan = plan_import(&saved, 1.0);
        assert_eq!(plan.items.len(), 1);
        assert!(matches!(&plan.items[0], ImportItem::Comment { page_index: 0, .. }));
        assert_eq!(plan.report.skipped(), 0);
    }

    #[test]
    fn paired_annotation_is_not_imported_twice() {
        let saved = SavedAnnotations {
            annotations: vec![annotation(0, "a"), annotation(0, "b")],
            notations: vec![notation(0, "b")],
            comments: vec![link("b", "b")],
        };

        let plan = plan_import(&saved, 1.0);

        assert_eq!(plan.items.len(), 2);
        match &plan.items[0] {
            ImportItem::Comment { comment, .. } => {
                assert_eq!(comment.id(), &AnnotationId::from("b"));
                assert_eq!(comment.notation().comment(), "check this");
            }
            other => panic!("expected comment first, got {other:?}"),
        }
        match &plan.items[1] {
            ImportItem::Highlight { highlight, .. } => {
                assert_eq!(highlight.id(), &AnnotationId::from("a"))
            }
            other => panic!("expected standalone highlight, got {other:?}"),
        }
    }

    #[test]
    fn link_to_missing_annotation_drops_notation() {
        let saved = SavedAnnotations {
            annotations: vec![annotation(0, "a")],
            notations: vec![notation(0, "5")],
            comments: vec![link("5", "7")],
        };

        let plan = plan_import(&saved, 1.0);

        assert_eq!(plan.items.len(), 1);
        assert!(matches!(&plan.items[0], ImportItem::Highlight { .. }));
        assert_eq!(plan.report.dangling_links, 1);
        assert_eq!(plan.report.orphaned_notations, 0);
    }

    #[test]
    fn link_to_missing_notation_keeps_highlight() {
        let saved = SavedAnnotations {
            annotations: vec![annotation(0, "7")],
            notations: Vec::new(),
            comments: vec![link("5", "7")],
        };

        let plan = plan_import(&saved, 1.0);

        assert_eq!(plan.items.len(), 1);
        assert!(matches!(&plan.items[0], ImportItem::Highlight { .. }));
        assert_eq!(plan.report.dangling_links, 1);
    }

    #[test]
    fn mismatched_link_identifiers_survive_round_trip() {
        let saved = SavedAnnotations {
            annotations: vec![annotation(0, "7")],
            notations: vec![notation(0, "5")],
            comments: vec![link("5", "7")],
        };

        let plan = plan_import(&saved, 1.0);
        let mut page = PageAnnotations::new(0, Palette::Yellow.color());
        for item in plan.items {
            match item {
                ImportItem::Comment { comment, .. } => {
                    page.import_comment(comment).expect("unique")
                }
                other => panic!("expected a comment, got {other:?}"),
            }
        }

        let resaved = SavedAnnotations::snapshot([&page], 1.0);
        assert_eq!(resaved.comments, vec![link("5", "7")]);
        assert_eq!(resaved.notations[0].identifier, AnnotationId::from("5"));
    }

    #[test]
    fn malformed_notation_keeps_its_highlight() {
        let mut broken = notation(0, "7");
        broken.matching_color = "not a color".to_owned();
        let saved = SavedAnnotations {
            annotations: vec![annotation(0, "7")],
            notations: vec![broken],
            comments: vec![link("7", "7")],
        };

        let plan = plan_import(&saved, 1.0);

        assert_eq!(plan.items.len(), 1);
        match &plan.items[0] {
            ImportItem::Highlight { highlight, .. } => {
                assert_eq!(highlight.id(), &AnnotationId::from("7"))
            }
            other => panic!("expected standalone highlight, got {other:?}"),
        }
        assert_eq!(plan.report.malformed, 1);
        assert_eq!(plan.report.orphaned_notations, 0);
    }

    #[test]
    fn unlinked_notations_and_malformed_records_are_counted() {
        let mut broken_polygon = annotation(0, "x");
        broken_polygon.clip_path_polygon_points = vec!["1 2, 3".to_owned()];
        let mut broken_color = annotation(0, "y");
        broken_color.annotation_color = "chartreuse".to_owned();
        let mut empty = annotation(0, "z");
        empty.clip_path_polygon_points.clear();

        let saved = SavedAnnotations {
            annotations: vec![broken_polygon, broken_color, empty],
            notations: vec![notation(0, "lonely")],
            comments: Vec::new(),
        };

        let plan = plan_import(&saved, 1.0);

        assert!(plan.items.is_empty());
        assert_eq!(plan.report.malformed, 3);
        assert_eq!(plan.report.orphaned_notations, 1);
        assert_eq!(plan.report.skipped(), 4);
    }

    #[test]
    fn snapshot_normalizes_and_import_rescales() {
        let mut page = PageAnnotations::new(2, Palette::Purple.color());
        let selection = three_line_selection(2);
        let comment_id = page.add_comment(&selection, Palette::Purple.color()).expect("comment");
        let highlight_id =
            page.add_highlight(&selection, Palette::Green.color()).expect("highlight");
        page.set_comment(&comment_id, "line one\nline two");

        page.resize_all(2.0);
        let saved = SavedAnnotations::snapshot([&page], 2.0);

        assert_eq!(saved.annotations.len(), 2);
        assert_eq!(saved.notations.len(), 1);
        assert_eq!(
            saved.comments,
            vec![CommentLink { notation_id: comment_id.clone(), annotation_id: comment_id.clone() }]
        );
        assert_eq!(saved.annotations[0].left_offset, 20.0);
        assert_eq!(saved.annotations[0].page_number, 2);

        let plan = plan_import(&saved, 2.0);
        let mut restored = PageAnnotations::new(2, Palette::Yellow.color());
        for item in plan.items {
            match item {
                ImportItem::Highlight { highlight, .. } => {
                    restored.import_highlight(highlight).expect("unique")
                }
                ImportItem::Comment { comment, .. } => {
                    restored.import_comment(comment).expect("unique")
                }
            }
        }

        for id in [&comment_id, &highlight_id] {
            let original = page.get(id).expect("original entry");
            let copy = restored.get(id).expect("restored entry");
            assert_eq!(copy.highlight().geometry(), original.highlight().geometry());
            assert_eq!(copy.highlight().color(), original.highlight().color());
            assert_eq!(copy.highlight().clip_path_id(), original.highlight().clip_path_id());
            assert_eq!(copy.notation(), original.notation());
        }
    }
}
