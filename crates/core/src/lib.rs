//! PDF Annotator Core Library
//!
//! Highlights, comments and their notation boxes, kept per page, plus the
//! flattened and container export formats.

pub mod color;
pub mod comment;
pub mod document;
pub mod geometry;
pub mod highlight;
pub mod id;
pub mod notation;
pub mod pdf_export;
pub mod persistence;
pub mod registry;
pub mod settings;
pub mod text_layout;

pub use color::{Color, ColorParseError, Palette, HIGHLIGHT_ALPHA};
pub use comment::Comment;
pub use document::{AnnotatedDocument, DocumentError, DocumentResult};
pub use geometry::{
    extract, ExtractionError, PageAnchor, Point, Quad, Rect, SelectionGeometry, SelectionRange,
};
pub use highlight::{Highlight, HighlightError};
pub use id::AnnotationId;
pub use notation::Notation;
pub use pdf_export::{layout_notations, pack_columns, page_overlay, ColumnLayout, NotationPlacement};
pub use persistence::{
    decode_container, encode_container, plan_import, AnnotationRecord, CommentLink, Container,
    ContainerError, ImportReport, NotationRecord, SavedAnnotations,
};
pub use registry::{AnnotationMode, Entry, PageAnnotations, RegistryError};
pub use settings::{SettingsError, ViewerSettings};
