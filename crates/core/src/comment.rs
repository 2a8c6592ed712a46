//! Comment pairing: one highlight and one notation. Live comments share one
//! identifier; restored ones keep the identifiers their records carried.

use crate::color::Color;
use crate::geometry::SelectionGeometry;
use crate::highlight::{Highlight, HighlightError};
use crate::id::AnnotationId;
use crate::notation::Notation;

/// A highlight paired with its notation.
///
/// The highlight is never handed out mutably, so every color change goes
/// through [`Comment::change_color`] and reaches the notation. Notation colors
/// never flow back to the highlight.
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    highlight: Highlight,
    notation: Notation,
}

impl Comment {
    /// Pairs a new highlight with a notation snapshotting `text_commented`.
    pub fn create(
        id: AnnotationId,
        geometry: SelectionGeometry,
        color: Color,
        text_commented: impl Into<String>,
    ) -> Result<Self, HighlightError> {
        let highlight = Highlight::create(id.clone(), geometry, color)?;
        let notation = Notation::create(id, text_commented, color);
        Ok(Self { highlight, notation })
    }

    /// Pairs restored entities as-is, so the saved link survives the next save.
    /// The pair is addressed by the highlight's identifier.
    pub fn restore(highlight: Highlight, notation: Notation) -> Self {
        Self { highlight, notation }
    }

    pub fn id(&self) -> &AnnotationId {
        self.highlight.id()
    }

    pub fn highlight(&self) -> &Highlight {
        &self.highlight
    }

    pub fn notation(&self) -> &Notation {
        &self.notation
    }

    /// Recolors the highlight and forwards the color to the notation.
    pub fn change_color(&mut self, color: Color) -> Color {
        let previous = self.highlight.change_color(color);
        self.notation.change_color(color);
        previous
    }

    pub fn set_comment(&mut self, text: impl Into<String>) {
        self.notation.set_comment(text);
    }

    pub fn resize(&mut self, ratio: f64) {
        self.highlight.resize(ratio);
    }

    pub fn toggle_selected(&mut self) -> bool {
        self.highlight.toggle_selected()
    }

    pub fn deselect(&mut self) {
        self.highlight.deselect();
    }
}
