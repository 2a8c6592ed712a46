//! Per-page registry of live annotations
//!
//! Each page keeps a single insertion-ordered map from identifier to entry. An
//! entry is either a bare highlight or a comment (highlight plus notation), so
//! removing an identifier drops every part of the annotation in one step.

use crate::color::Color;
use crate::comment::Comment;
use crate::geometry::{self, Point, SelectionRange};
use crate::highlight::Highlight;
use crate::id::AnnotationId;
use crate::notation::Notation;
use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnnotationMode {
    #[default]
    Idle,
    Highlighting,
    Commenting,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("annotation {0} already exists on this page")]
    DuplicateId(AnnotationId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Highlight(Highlight),
    Comment(Comment),
}

impl Entry {
    pub fn id(&self) -> &AnnotationId {
        self.highlight().id()
    }

    pub fn highlight(&self) -> &Highlight {
        match self {
            Entry::Highlight(highlight) => highlight,
            Entry::Comment(comment) => comment.highlight(),
        }
    }

    pub fn notation(&self) -> Option<&Notation> {
        match self {
            Entry::Highlight(_) => None,
            Entry::Comment(comment) => Some(comment.notation()),
        }
    }

    pub fn is_comment(&self) -> bool {
        matches!(self, Entry::Comment(_))
    }

    fn change_color(&mut self, color: Color) {
        match self {
            Entry::Highlight(highlight) => {
                highlight.change_color(color);
            }
            Entry::Comment(comment) => {
                comment.change_color(color);
            }
        }
    }

    fn resize(&mut self, ratio: f64) {
        match self {
            Entry::Highlight(highlight) => highlight.resize(ratio),
            Entry::Comment(comment) => comment.resize(ratio),
        }
    }

    fn toggle_selected(&mut self) -> bool {
        match self {
            Entry::Highlight(highlight) => highlight.toggle_selected(),
            Entry::Comment(comment) => comment.toggle_selected(),
        }
    }

    fn deselect(&mut self) {
        match self {
            Entry::Highlight(highlight) => highlight.deselect(),
            Entry::Comment(comment) => comment.deselect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageAnnotations {
    page_index: u32,
    mode: AnnotationMode,
    future_color: Color,
    entries: IndexMap<AnnotationId, Entry>,
}

impl PageAnnotations {
    pub fn new(page_index: u32, future_color: Color) -> Self {
        Self { page_index, mode: AnnotationMode::Idle, future_color, entries: IndexMap::new() }
    }

    pub fn page_index(&self) -> u32 {
        self.page_index
    }

    pub fn mode(&self) -> AnnotationMode {
        self.mode
    }

    pub fn future_color(&self) -> Color {
        self.future_color
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &AnnotationId) -> Option<&Entry> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &AnnotationId) -> bool {
        self.entries.contains_key(id)
    }

    /// Entries in creation order.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    /// Every highlight on the page, paired or not.
    pub fn highlights(&self) -> impl Iterator<Item = &Highlight> {
        self.entries.values().map(Entry::highlight)
    }

    pub fn notations(&self) -> impl Iterator<Item = &Notation> {
        self.entries.values().filter_map(Entry::notation)
    }

    pub fn comments(&self) -> impl Iterator<Item = &Comment> {
        self.entries.values().filter_map(|entry| match entry {
            Entry::Comment(comment) => Some(comment),
            Entry::Highlight(_) => None,
        })
    }

    /// Highlights the selection in `color`. Returns `None` when the selection
    /// does not resolve to geometry on this page.
    pub fn add_highlight(&mut self, range: &SelectionRange, color: Color) -> Option<AnnotationId> {
        let geometry = self.extract(range)?;
        let id = self.fresh_id();
        match Highlight::create(id.clone(), geometry, color) {
            Ok(highlight) => {
                self.entries.insert(id.clone(), Entry::Highlight(highlight));
                tracing::debug!(page = self.page_index, %id, "added highlight");
                Some(id)
            }
            Err(err) => {
                tracing::debug!(page = self.page_index, error = %err, "highlight rejected");
                None
            }
        }
    }

    /// Highlights the selection and pairs it with an empty notation.
    pub fn add_comment(&mut self, range: &SelectionRange, color: Color) -> Option<AnnotationId> {
        let geometry = self.extract(range)?;
        let id = self.fresh_id();
        match Comment::create(id.clone(), geometry, color, range.text.clone()) {
            Ok(comment) => {
                self.entries.insert(id.clone(), Entry::Comment(comment));
                tracing::debug!(page = self.page_index, %id, "added comment");
                Some(id)
            }
            Err(err) => {
                tracing::debug!(page = self.page_index, error = %err, "comment rejected");
                None
            }
        }
    }

    /// Removes the highlight, its notation and the pairing together.
    pub fn remove(&mut self, id: &AnnotationId) -> Option<Entry> {
        self.entries.shift_remove(id)
    }

    /// Scales every highlight; notation boxes keep their size.
    pub fn resize_all(&mut self, ratio: f64) {
        for entry in self.entries.values_mut() {
            entry.resize(ratio);
        }
    }

    /// Color for annotations created after this call.
    pub fn recolor_future(&mut self, color: Color) {
        self.future_color = color;
    }

    /// Recolors one annotation. Paired notations follow the highlight.
    pub fn change_color(&mut self, id: &AnnotationId, color: Color) -> bool {
        match self.entries.get_mut(id) {
            Some(entry) => {
                entry.change_color(color);
                true
            }
            None => false,
        }
    }

    /// Replaces a comment's text. Returns `false` when `id` is not a comment.
    pub fn set_comment(&mut self, id: &AnnotationId, text: impl Into<String>) -> bool {
        match self.entries.get_mut(id) {
            Some(Entry::Comment(comment)) => {
                comment.set_comment(text);
                true
            }
            _ => false,
        }
    }

    pub fn import_highlight(&mut self, highlight: Highlight) -> Result<(), RegistryError> {
        self.insert_unique(Entry::Highlight(highlight))
    }

    pub fn import_comment(&mut self, comment: Comment) -> Result<(), RegistryError> {
        self.insert_unique(Entry::Comment(comment))
    }

    pub fn set_mode(&mut self, mode: AnnotationMode) {
        self.mode = mode;
    }

    /// Turns highlighting on (switching commenting off) or back to idle.
    pub fn toggle_highlighting(&mut self) -> AnnotationMode {
        self.mode = match self.mode {
            AnnotationMode::Highlighting => AnnotationMode::Idle,
            AnnotationMode::Idle | AnnotationMode::Commenting => AnnotationMode::Highlighting,
        };
        self.mode
    }

    /// Turns commenting on (switching highlighting off) or back to idle.
    pub fn toggle_commenting(&mut self) -> AnnotationMode {
        self.mode = match self.mode {
            AnnotationMode::Commenting => AnnotationMode::Idle,
            AnnotationMode::Idle | AnnotationMode::Highlighting => AnnotationMode::Commenting,
        };
        self.mode
    }

    /// Pointer released over the text layer: annotate according to the mode.
    pub fn on_pointer_up(&mut self, range: &SelectionRange) -> Option<AnnotationId> {
        match self.mode {
            AnnotationMode::Idle => None,
            AnnotationMode::Highlighting => self.add_highlight(range, self.future_color),
            AnnotationMode::Commenting => self.add_comment(range, self.future_color),
        }
    }

    /// Toggles selection of the topmost highlight whose clip region contains
    /// the page-relative point. Returns it with its new selection state.
    /// A click that hits nothing clears every selection on the page.
    pub fn on_click(&mut self, point: Point) -> Option<(AnnotationId, bool)> {
        let hit = self.entries.values_mut().rev().find(|entry| entry.highlight().hit_test(point));
        let Some(entry) = hit else {
            self.entries.values_mut().for_each(Entry::deselect);
            return None;
        };
        let selected = entry.toggle_selected();
        Some((entry.id().clone(), selected))
    }

    fn insert_unique(&mut self, entry: Entry) -> Result<(), RegistryError> {
        let id = entry.id().clone();
        if self.entries.contains_key(&id) {
            return Err(RegistryError::DuplicateId(id));
        }
        self.entries.insert(id, entry);
        Ok(())
    }

    fn extract(&self, range: &SelectionRange) -> Option<geometry::SelectionGeometry> {
        if let Some(anchor) = range.anchor {
            if anchor.page_index != self.page_index {
                tracing::debug!(
                    page = self.page_index,
                    anchor = anchor.page_index,
                    "selection belongs to another page"
                );
                return None;
            }
        }
        match geometry::extract(range) {
            Ok(geometry) => Some(geometry),
            Err(err) => {
                tracing::debug!(page = self.page_index, error = %err, "selection ignored");
                None
            }
        }
    }

    fn fresh_id(&self) -> AnnotationId {
        loop {
            let id = AnnotationId::new();
            if !self.entries.contains_key(&id) {
                return id;
            }
        }
    }
}
