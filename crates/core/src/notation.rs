//! Notation (comment body) entity
//!
//! A notation is the margin box paired with a highlight: a snapshot of the
//! highlighted text, the user's comment, and a copy of the highlight color.
//! Its size follows its text and never changes with zoom.

use crate::color::Color;
use crate::id::AnnotationId;
use crate::text_layout::{self, LayoutConfig};

/// Fixed width of every notation box.
pub const NOTATION_WIDTH: f64 = 250.0;
/// Height of a box with one label line and one comment line.
pub const NOTATION_BASE_HEIGHT: f64 = 69.0;
pub const LABEL_FONT_SIZE: f64 = 10.0;
pub const COMMENT_FONT_SIZE: f64 = 11.0;
/// Radius of the color marker drawn before the label.
pub const MARKER_RADIUS: f64 = 5.0;
pub const MARKER_GAP: f64 = 8.0;
pub const TEXT_INSET: f64 = 10.0;

/// Width available to label and comment text.
pub fn text_column_width() -> f64 {
    NOTATION_WIDTH - 2.0 * MARKER_RADIUS - MARKER_GAP - TEXT_INSET
}

pub fn label_layout() -> LayoutConfig {
    LayoutConfig::new(LABEL_FONT_SIZE, text_column_width())
}

pub fn comment_layout() -> LayoutConfig {
    LayoutConfig::new(COMMENT_FONT_SIZE, text_column_width())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notation {
    id: AnnotationId,
    text_commented: String,
    comment: String,
    matching_color: Color,
    width: f64,
    height: f64,
}

impl Notation {
    /// New notation for a fresh selection; the comment starts empty.
    pub fn create(
        id: AnnotationId,
        text_commented: impl Into<String>,
        matching_color: Color,
    ) -> Self {
        Self::restore(id, text_commented, String::new(), matching_color)
    }

    /// Rebuilds a notation from saved state and fits the box to it.
    pub fn restore(
        id: AnnotationId,
        text_commented: impl Into<String>,
        comment: impl Into<String>,
        matching_color: Color,
    ) -> Self {
        let mut notation = Self {
            id,
            text_commented: text_commented.into(),
            comment: comment.into(),
            matching_color,
            width: NOTATION_WIDTH,
            height: NOTATION_BASE_HEIGHT,
        };
        notation.resize_to_content();
        notation
    }

    pub fn id(&self) -> &AnnotationId {
        &self.id
    }

    pub fn text_commented(&self) -> &str {
        &self.text_commented
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn matching_color(&self) -> Color {
        self.matching_color
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    /// Replaces the comment text and refits the box.
    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.comment = comment.into();
        self.resize_to_content();
    }

    /// Updates the matching color only.
    pub fn change_color(&mut self, color: Color) {
        self.matching_color = color;
    }

    pub fn label(&self) -> String {
        format!("Annotated: [ {} ]", self.text_commented)
    }

    pub fn comment_text(&self) -> String {
        format!("Comment: \"{}\"", self.comment)
    }

    pub fn label_lines(&self) -> Vec<String> {
        text_layout::wrap(&self.label(), &label_layout())
    }

    pub fn comment_lines(&self) -> Vec<String> {
        text_layout::wrap(&self.comment_text(), &comment_layout())
    }

    pub fn resize_to_content(&mut self) {
        let extra_label = self.label_lines().len().saturating_sub(1) as f64;
        let extra_comment = self.comment_lines().len().saturating_sub(1) as f64;

        self.width = NOTATION_WIDTH;
        self.height = NOTATION_BASE_HEIGHT
            + extra_label * label_layout().line_height()
            + extra_comment * comment_layout().line_height();
    }
}
