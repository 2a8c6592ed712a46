//! Document controller
//!
//! Owns the open PDF and the annotation registries of its materialized pages,
//! and routes viewer commands (zoom, modes, colors, pointer events) to them.
//! Pages are materialized progressively: a prefix on open, more as the user
//! scrolls or navigates, and on demand while importing saved annotations.

use crate::color::Color;
use crate::geometry::{Point, SelectionRange};
use crate::id::AnnotationId;
use crate::pdf_export::page_overlay;
use crate::persistence::{
    decode_container, encode_container, plan_import, ContainerError, ImportItem, ImportReport,
    SavedAnnotations,
};
use crate::registry::{AnnotationMode, PageAnnotations, RegistryError};
use crate::settings::{SettingsError, ViewerSettings};
use pdf_engine::{
    default_engine, DocumentHandle, LopdfEngine, OpenSource, PdfEngine, PdfEngineError,
};

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("no document is loaded")]
    NoDocument,
    #[error("failed to open PDF: {0}")]
    Engine(#[from] PdfEngineError),
    #[error("malformed annotation container: {0}")]
    Container(#[from] ContainerError),
    #[error("zoom factor must stay positive (requested {0})")]
    InvalidZoom(f64),
    #[error("page {page} is not loaded ({loaded} of {page_count} pages materialized)")]
    PageNotLoaded { page: u32, loaded: u32, page_count: u32 },
    #[error("annotation {id} not found on page {page}")]
    UnknownAnnotation { page: u32, id: AnnotationId },
    #[error("invalid settings: {0}")]
    Settings(#[from] SettingsError),
}

pub type DocumentResult<T> = Result<T, DocumentError>;

#[derive(Debug)]
struct LoadedDocument {
    handle: DocumentHandle,
    page_count: u32,
    /// Registries for pages `0..pages.len()`.
    pages: Vec<PageAnnotations>,
}

impl LoadedDocument {
    /// Ensures at least `count` pages (capped at the page count) exist.
    fn materialize(&mut self, count: u32, mode: AnnotationMode, color: Color) {
        let target = count.min(self.page_count) as usize;
        while self.pages.len() < target {
            let mut page = PageAnnotations::new(self.pages.len() as u32, color);
            page.set_mode(mode);
            self.pages.push(page);
        }
    }

    fn loaded(&self) -> u32 {
        self.pages.len() as u32
    }
}

/// A PDF open for annotation.
#[derive(Debug)]
pub struct AnnotatedDocument<E: PdfEngine = LopdfEngine> {
    engine: E,
    settings: ViewerSettings,
    document: Option<LoadedDocument>,
    zoom: f64,
    mode: AnnotationMode,
    color: Color,
}

impl AnnotatedDocument<LopdfEngine> {
    pub fn with_default_engine(settings: ViewerSettings) -> DocumentResult<Self> {
        Self::new(default_engine(), settings)
    }
}

impl<E: PdfEngine> AnnotatedDocument<E> {
    pub fn new(engine: E, settings: ViewerSettings) -> DocumentResult<Self> {
        settings.validate()?;
        Ok(Self {
            engine,
            zoom: settings.initial_zoom,
            mode: AnnotationMode::Idle,
            color: settings.default_color.color(),
            settings,
            document: None,
        })
    }

    pub fn settings(&self) -> &ViewerSettings {
        &self.settings
    }

    pub fn is_loaded(&self) -> bool {
        self.document.is_some()
    }

    pub fn page_count(&self) -> DocumentResult<u32> {
        Ok(self.loaded()?.page_count)
    }

    /// Number of pages whose registries exist.
    pub fn materialized_pages(&self) -> u32 {
        self.document.as_ref().map_or(0, LoadedDocument::loaded)
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn mode(&self) -> AnnotationMode {
        self.mode
    }

    /// Color applied to annotations created from now on.
    pub fn annotation_color(&self) -> Color {
        self.color
    }

    pub fn page(&self, page_index: u32) -> Option<&PageAnnotations> {
        self.document.as_ref()?.pages.get(page_index as usize)
    }

    pub fn pages(&self) -> impl Iterator<Item = &PageAnnotations> {
        self.document.iter().flat_map(|document| document.pages.iter())
    }

    /// Opens a plain PDF. The previous document stays active if this fails.
    pub fn load(&mut self, bytes: Vec<u8>) -> DocumentResult<()> {
        let handle = self.engine.open(OpenSource::Bytes(bytes))?;
        let staged = match self.stage(handle) {
            Ok(staged) => staged,
            Err(err) => {
                self.discard(handle);
                return Err(err);
            }
        };
        self.commit(staged);
        tracing::info!(pages = self.materialized_pages(), "document loaded");
        Ok(())
    }

    /// Opens a container and restores its annotations. Nothing changes unless
    /// the container decodes and its document opens.
    pub fn load_container(&mut self, bytes: &[u8]) -> DocumentResult<ImportReport> {
        let container = decode_container(bytes)?;
        let handle = self.engine.open(OpenSource::Bytes(container.document.to_vec()))?;

        let mut staged = match self.stage(handle) {
            Ok(staged) => staged,
            Err(err) => {
                self.discard(handle);
                return Err(err);
            }
        };
        let report = self.import_into(&mut staged, &container.annotations);
        self.commit(staged);

        tracing::info!(
            highlights = report.highlights,
            comments = report.comments,
            skipped = report.skipped(),
            pages = self.materialized_pages(),
            "annotation container loaded"
        );
        Ok(report)
    }

    /// Closes the current document, if any.
    pub fn close(&mut self) {
        if let Some(document) = self.document.take() {
            self.discard(document.handle);
        }
    }

    /// Moves to a page, clamped to the document, materializing the pages after
    /// it. Returns the page actually targeted.
    pub fn go_to_page(&mut self, page_index: u32) -> DocumentResult<u32> {
        let (mode, color, lookahead) = (self.mode, self.color, self.settings.navigation_lookahead);
        let document = self.loaded_mut()?;
        let target = page_index.min(document.page_count.saturating_sub(1));
        document.materialize(target.saturating_add(lookahead).saturating_add(1), mode, color);
        Ok(target)
    }

    /// Reports the scroll position as a fraction of the scrollable height.
    /// Returns how many pages are materialized afterwards.
    pub fn on_scroll(&mut self, fraction: f64) -> DocumentResult<u32> {
        let (mode, color) = (self.mode, self.color);
        let (threshold, batch) = (self.settings.scroll_threshold, self.settings.scroll_batch);
        let document = self.loaded_mut()?;
        if fraction > threshold {
            let loaded = document.loaded();
            document.materialize(loaded.saturating_add(batch), mode, color);
            tracing::debug!(from = loaded, to = document.loaded(), "materialized pages on scroll");
        }
        Ok(document.loaded())
    }

    /// Sets an absolute zoom factor, rescaling every highlight by `new / old`.
    pub fn set_zoom(&mut self, factor: f64) -> DocumentResult<f64> {
        if !(factor.is_finite() && factor > 0.0) {
            return Err(DocumentError::InvalidZoom(factor));
        }
        let ratio = factor / self.zoom;
        if let Some(document) = self.document.as_mut() {
            for page in &mut document.pages {
                page.resize_all(ratio);
            }
        }
        self.zoom = factor;
        Ok(factor)
    }

    /// Adds `delta` to the zoom factor; a result at or below zero is rejected.
    pub fn zoom_by(&mut self, delta: f64) -> DocumentResult<f64> {
        self.set_zoom(self.zoom + delta)
    }

    pub fn zoom_in(&mut self) -> DocumentResult<f64> {
        self.zoom_by(self.settings.zoom_step)
    }

    pub fn zoom_out(&mut self) -> DocumentResult<f64> {
        self.zoom_by(-self.settings.zoom_step)
    }

    /// Highlighting on (commenting off), or back to idle.
    pub fn toggle_highlight_mode(&mut self) -> AnnotationMode {
        let mode = match self.mode {
            AnnotationMode::Highlighting => AnnotationMode::Idle,
            AnnotationMode::Idle | AnnotationMode::Commenting => AnnotationMode::Highlighting,
        };
        self.apply_mode(mode)
    }

    /// Commenting on (highlighting off), or back to idle.
    pub fn toggle_comment_mode(&mut self) -> AnnotationMode {
        let mode = match self.mode {
            AnnotationMode::Commenting => AnnotationMode::Idle,
            AnnotationMode::Idle | AnnotationMode::Highlighting => AnnotationMode::Commenting,
        };
        self.apply_mode(mode)
    }

    /// Color for future annotations on every page; existing ones keep theirs.
    pub fn set_annotation_color(&mut self, color: Color) {
        self.color = color;
        if let Some(document) = self.document.as_mut() {
            for page in &mut document.pages {
                page.recolor_future(color);
            }
        }
    }

    pub fn on_pointer_up(
        &mut self,
        page_index: u32,
        range: &SelectionRange,
    ) -> DocumentResult<Option<AnnotationId>> {
        Ok(self.page_mut(page_index)?.on_pointer_up(range))
    }

    pub fn on_click(
        &mut self,
        page_index: u32,
        point: Point,
    ) -> DocumentResult<Option<(AnnotationId, bool)>> {
        Ok(self.page_mut(page_index)?.on_click(point))
    }

    /// Removes an annotation and, for comments, its notation.
    pub fn remove(&mut self, page_index: u32, id: &AnnotationId) -> DocumentResult<()> {
        self.page_mut(page_index)?
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| DocumentError::UnknownAnnotation { page: page_index, id: id.clone() })
    }

    pub fn change_color(
        &mut self,
        page_index: u32,
        id: &AnnotationId,
        color: Color,
    ) -> DocumentResult<()> {
        if self.page_mut(page_index)?.change_color(id, color) {
            Ok(())
        } else {
            Err(DocumentError::UnknownAnnotation { page: page_index, id: id.clone() })
        }
    }

    pub fn set_comment(
        &mut self,
        page_index: u32,
        id: &AnnotationId,
        text: &str,
    ) -> DocumentResult<()> {
        if self.page_mut(page_index)?.set_comment(id, text) {
            Ok(())
        } else {
            Err(DocumentError::UnknownAnnotation { page: page_index, id: id.clone() })
        }
    }

    /// PDF with every annotation drawn into its page.
    pub fn export_flattened(&self) -> DocumentResult<Vec<u8>> {
        let document = self.loaded()?;

        let mut overlays = Vec::new();
        for page in &document.pages {
            let size = self.engine.page_size(document.handle, page.page_index())?;
            overlays.extend(page_overlay(page, size, self.zoom));
        }

        let bytes = self.engine.flatten(document.handle, &overlays)?;
        tracing::info!(pages = overlays.len(), bytes = bytes.len(), "exported flattened PDF");
        Ok(bytes)
    }

    /// Container holding the annotation records and the original PDF bytes.
    pub fn export_container(&self) -> DocumentResult<Vec<u8>> {
        let saved = self.saved_annotations()?;
        let document = self.loaded()?;
        let bytes = encode_container(&saved, self.engine.document_bytes(document.handle)?)?;
        tracing::info!(
            annotations = saved.annotations.len(),
            notations = saved.notations.len(),
            bytes = bytes.len(),
            "exported annotation container"
        );
        Ok(bytes)
    }

    /// Records for every live annotation, normalized to zoom 1.0.
    pub fn saved_annotations(&self) -> DocumentResult<SavedAnnotations> {
        Ok(SavedAnnotations::snapshot(&self.loaded()?.pages, self.zoom))
    }

    fn stage(&self, handle: DocumentHandle) -> DocumentResult<LoadedDocument> {
        let page_count = self.engine.page_count(handle)?;
        let mut staged = LoadedDocument { handle, page_count, pages: Vec::new() };
        staged.materialize(self.settings.initial_pages, self.mode, self.color);
        Ok(staged)
    }

    fn import_into(&self, staged: &mut LoadedDocument, saved: &SavedAnnotations) -> ImportReport {
        // The new document opens at the initial zoom.
        let plan = plan_import(saved, self.settings.initial_zoom);
        let mut report = plan.report;

        for item in plan.items {
            let page_index = item.page_index();
            if page_index >= staged.page_count {
                tracing::warn!(
                    page = page_index,
                    page_count = staged.page_count,
                    "skipping annotation for missing page"
                );
                report.out_of_range += 1;
                continue;
            }
            staged.materialize(page_index + 1, self.mode, self.color);
            let page = &mut staged.pages[page_index as usize];

            let (result, comment) = match item {
                ImportItem::Highlight { highlight, .. } => {
                    (page.import_highlight(highlight), false)
                }
                ImportItem::Comment { comment, .. } => (page.import_comment(comment), true),
            };
            match result {
                Ok(()) if comment => report.comments += 1,
                Ok(()) => report.highlights += 1,
                Err(RegistryError::DuplicateId(id)) => {
                    tracing::warn!(
                        page = page_index,
                        %id,
                        "skipping duplicate annotation identifier"
                    );
                    report.duplicates += 1;
                }
            }
        }

        report
    }

    fn commit(&mut self, staged: LoadedDocument) {
        if let Some(previous) = self.document.replace(staged) {
            self.discard(previous.handle);
        }
        self.zoom = self.settings.initial_zoom;
    }

    fn discard(&mut self, handle: DocumentHandle) {
        if let Err(err) = self.engine.close(handle) {
            tracing::warn!(handle = handle.raw(), error = %err, "failed to close document");
        }
    }

    fn apply_mode(&mut self, mode: AnnotationMode) -> AnnotationMode {
        self.mode = mode;
        if let Some(document) = self.document.as_mut() {
            for page in &mut document.pages {
                page.set_mode(mode);
            }
        }
        mode
    }

    fn loaded(&self) -> DocumentResult<&LoadedDocument> {
        self.document.as_ref().ok_or(DocumentError::NoDocument)
    }

    fn loaded_mut(&mut self) -> DocumentResult<&mut LoadedDocument> {
        self.document.as_mut().ok_or(DocumentError::NoDocument)
    }

    fn page_mut(&mut self, page_index: u32) -> DocumentResult<&mut PageAnnotations> {
        let document = self.loaded_mut()?;
        let (loaded, page_count) = (document.loaded(), document.page_count);
        document
            .pages
            .get_mut(page_index as usize)
            .ok_or(DocumentError::PageNotLoaded { page: page_index, loaded, page_count })
    }
}
