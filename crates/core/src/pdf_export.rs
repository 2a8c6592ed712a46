//! Flattened export
//!
//! Turns one page's live annotations into drawing commands for the PDF engine.
//! Notations are stacked in columns added to the right of the page. Highlights
//! become translucent rectangles over the original content. Geometry is first
//! normalized from the live zoom back to PDF points.

use crate::color::Color;
use crate::notation::{
    comment_layout, label_layout, Notation, COMMENT_FONT_SIZE, LABEL_FONT_SIZE, MARKER_GAP,
    MARKER_RADIUS, NOTATION_WIDTH,
};
use crate::registry::PageAnnotations;
use pdf_engine::{DrawCommand, PageOverlay, PageSize, Rgb};

/// Horizontal space around each notation column.
pub const H_PADDING: f64 = 10.0;
/// Vertical space around and between notation boxes.
pub const V_PADDING: f64 = 10.0;
const BORDER_WIDTH: f64 = 1.0;
/// Drop from the box top to the first label baseline, centering it on the marker.
const LABEL_BASELINE_DROP: f64 = MARKER_RADIUS + MARKER_GAP + 3.5;
const COMMENT_GAP: f64 = 8.0;

/// Where one notation box lands on the expanded page, in PDF points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NotationPlacement {
    pub column: usize,
    /// Lower-left corner of the box.
    pub x: f64,
    pub y: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnLayout {
    /// Tallest a column may grow.
    pub limit: f64,
    pub page_width: f64,
    pub page_height: f64,
    /// One entry per input height, same order.
    pub placements: Vec<NotationPlacement>,
    pub columns: usize,
}

/// Greedy first-fit into columns: a box joins the current column while the
/// column's running height (boxes plus the gaps between them) stays within
/// `limit`, otherwise it opens the next column.
pub fn pack_columns(heights: &[f64], limit: f64) -> Vec<usize> {
    let mut assignment = Vec::with_capacity(heights.len());
    let mut column = 0;
    let mut running: Option<f64> = None;

    for &height in heights {
        running = match running {
            Some(used) if used + height <= limit => Some(used + height + V_PADDING),
            Some(_) => {
                column += 1;
                Some(height + V_PADDING)
            }
            None => Some(height + V_PADDING),
        };
        assignment.push(column);
    }

    assignment
}

/// Lays out notation boxes of the given heights beside a page of `page_size`.
pub fn layout_notations(page_size: PageSize, heights: &[f64]) -> ColumnLayout {
    let original_width = page_size.width_pt as f64;
    let original_height = page_size.height_pt as f64;

    let tallest = heights.iter().copied().fold(0.0_f64, f64::max);
    let limit = tallest.max(original_height) + V_PADDING / 2.0;
    let assignment = pack_columns(heights, limit);
    let columns = assignment.last().map_or(0, |last| last + 1);

    let page_width = original_width + columns as f64 * (NOTATION_WIDTH + H_PADDING);
    let page_height = if columns == 0 { original_height } else { limit + V_PADDING };

    let mut placements = Vec::with_capacity(heights.len());
    let mut cursor_column = usize::MAX;
    let mut start_y = page_height;
    for (&height, &column) in heights.iter().zip(&assignment) {
        if column != cursor_column {
            cursor_column = column;
            start_y = page_height;
        }
        let start_x = original_width + column as f64 * (NOTATION_WIDTH + H_PADDING);
        placements.push(NotationPlacement {
            column,
            x: start_x + H_PADDING / 2.0,
            y: start_y - height - V_PADDING / 2.0,
            height,
        });
        start_y -= height + V_PADDING;
    }

    ColumnLayout { limit, page_width, page_height, placements, columns }
}

/// Drawing commands for one page, or `None` when it has nothing to draw.
pub fn page_overlay(page: &PageAnnotations, page_size: PageSize, zoom: f64) -> Option<PageOverlay> {
    if page.is_empty() {
        return None;
    }

    let mut overlay = PageOverlay::new(page.page_index());
    let original_height = page_size.height_pt as f64;

    for highlight in page.highlights() {
        let geometry = highlight.unscaled_geometry(zoom);
        let color = highlight.color();
        for quad in geometry.page_polygons() {
            let bounds = quad.bounds();
            overlay.commands.push(DrawCommand::FillRect {
                x: bounds.left as f32,
                y: (original_height - bounds.top - bounds.height) as f32,
                width: bounds.width as f32,
                height: bounds.height as f32,
                color: to_rgb(color),
                opacity: color.opacity(),
            });
        }
    }

    let notations: Vec<&Notation> = page.notations().collect();
    if !notations.is_empty() {
        let heights: Vec<f64> = notations.iter().map(|notation| notation.height()).collect();
        let layout = layout_notations(page_size, &heights);
        overlay.resize = Some((layout.page_width as f32, layout.page_height as f32));

        for (notation, placement) in notations.iter().zip(&layout.placements) {
            draw_notation(&mut overlay.commands, notation, placement);
        }
    }

    Some(overlay)
}

fn draw_notation(
    commands: &mut Vec<DrawCommand>,
    notation: &Notation,
    placement: &NotationPlacement,
) {
    let top = placement.y + placement.height;
    let label = label_layout();
    let comment = comment_layout();
    let label_lines = notation.label_lines();
    let text_x = placement.x + 2.0 * MARKER_RADIUS + MARKER_GAP;
    let label_y = top - LABEL_BASELINE_DROP;
    let comment_y = label_y - label_lines.len() as f64 * label.line_height() - COMMENT_GAP;

    commands.push(DrawCommand::StrokeRect {
        x: placement.x as f32,
        y: placement.y as f32,
        width: NOTATION_WIDTH as f32,
        height: placement.height as f32,
        color: Rgb::BLACK,
        line_width: BORDER_WIDTH as f32,
    });
    commands.push(DrawCommand::Circle {
        cx: (placement.x + MARKER_RADIUS + MARKER_GAP) as f32,
        cy: (top - MARKER_RADIUS - MARKER_GAP) as f32,
        radius: MARKER_RADIUS as f32,
        fill: to_rgb(notation.matching_color()),
        stroke: Rgb::BLACK,
        line_width: BORDER_WIDTH as f32,
    });
    commands.push(DrawCommand::Text {
        x: text_x as f32,
        y: label_y as f32,
        size: LABEL_FONT_SIZE as f32,
        line_height: label.line_height() as f32,
        color: Rgb::BLACK,
        lines: label_lines,
    });
    commands.push(DrawCommand::Text {
        x: text_x as f32,
        y: comment_y as f32,
        size: COMMENT_FONT_SIZE as f32,
        line_height: comment.line_height() as f32,
        color: Rgb::BLACK,
        lines: notation.comment_lines(),
    });
}

/// Opaque drawing color; translucency is applied separately through `opacity()`.
fn to_rgb(color: Color) -> Rgb {
    let base = color.base();
    Rgb::from_u8(base.r, base.g, base.b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Palette;
    use crate::geometry::tests::three_line_selection;
    use crate::notation::NOTATION_BASE_HEIGHT;
    use crate::registry::Entry;

    const LETTER: PageSize = PageSize { width_pt: 612.0, height_pt: 792.0 };

    #[test]
    fn packing_is_greedy_first_fit() {
        // Running height includes the 10pt gap after each box.
        assert_eq!(pack_columns(&[40.0, 40.0, 40.0], 100.0), vec![0, 0, 1]);
        assert_eq!(pack_columns(&[90.0, 10.0, 75.0, 5.0], 100.0), vec![0, 1, 1, 2]);
        assert!(pack_columns(&[], 100.0).is_empty());
    }

    #[test]
    fn packing_is_deterministic() {
        let heights = [69.0, 300.0, 81.0, 69.0, 500.0, 69.0, 120.0];
        assert_eq!(pack_columns(&heights, 797.0), pack_columns(&heights, 797.0));
    }

    #[test]
    fn layout_expands_page_by_columns() {
        let heights = vec![400.0, 380.0, 69.0];
        let layout = layout_notations(LETTER, &heights);

        assert_eq!(layout.limit, 797.0);
        assert_eq!(layout.columns, 2);
        assert_eq!(layout.page_width, 612.0 + 2.0 * 260.0);
        assert_eq!(layout.page_height, 807.0);

        let first = layout.placements[0];
        assert_eq!((first.column, first.x, first.y), (0, 617.0, 807.0 - 400.0 - 5.0));
        let second = layout.placements[1];
        assert_eq!((second.column, second.y), (0, 807.0 - 410.0 - 380.0 - 5.0));
        let third = layout.placements[2];
        assert_eq!((third.column, third.x, third.y), (1, 877.0, 807.0 - 69.0 - 5.0));

        for placement in &layout.placements {
            assert!(placement.y >= 0.0, "box must stay on the page");
        }
    }

    #[test]
    fn tall_notation_raises_limit() {
        let layout = layout_notations(PageSize { width_pt: 200.0, height_pt: 100.0 }, &[150.0]);
        assert_eq!(layout.limit, 155.0);
        assert_eq!(layout.page_height, 165.0);
        assert_eq!(layout.placements[0].y, 10.0);
    }

    #[test]
    fn empty_page_has_no_overlay() {
        let page = PageAnnotations::new(0, Palette::Yellow.color());
        assert!(page_overlay(&page, LETTER, 1.0).is_none());
    }

    #[test]
    fn highlight_only_page_is_drawn_without_resize() {
        let mut page = PageAnnotations::new(0, Palette::Yellow.color());
        page.add_highlight(&three_line_selection(0), Palette::Yellow.color()).expect("highlight");
        page.resize_all(2.0);

        let overlay = page_overlay(&page, LETTER, 2.0).expect("page has annotations");

        assert_eq!(overlay.resize, None);
        assert_eq!(overlay.commands.len(), 3);
        match &overlay.commands[0] {
            DrawCommand::FillRect { x, y, width, height, opacity, .. } => {
                // First line: page-relative (100, 30), 220 x 18 at zoom 1.
                assert_eq!((*x, *y, *width, *height), (100.0, 792.0 - 30.0 - 18.0, 220.0, 18.0));
                assert_eq!(*opacity, 0.548);
            }
            other => panic!("expected a fill, got {other:?}"),
        }
    }

    #[test]
    fn comment_page_draws_box_marker_and_text() {
        let mut page = PageAnnotations::new(0, Palette::Red.color());
        let id = page.add_comment(&three_line_selection(0), Palette::Red.color()).expect("comment");
        page.set_comment(&id, "needs a citation");

        let overlay = page_overlay(&page, LETTER, 1.0).expect("page has annotations");
        // The label wraps onto a second line, so the box is taller than the base.
        let box_height =
            page.get(&id).and_then(Entry::notation).map(Notation::height).expect("notation");
        assert!(box_height > NOTATION_BASE_HEIGHT);

        assert_eq!(overlay.resize, Some((872.0, 807.0)));
        assert_eq!(overlay.commands.len(), 3 + 4);

        let box_top = 807.0 - 5.0;
        assert!(matches!(
            overlay.commands[3],
            DrawCommand::StrokeRect { x, y, height, .. }
                if x == 617.0 && y == (box_top - box_height) as f32 && height == box_height as f32
        ));
        assert!(matches!(
            &overlay.commands[4],
            DrawCommand::Circle { fill, radius, .. }
                if *fill == Rgb::from_u8(255, 15, 75) && *radius == 5.0
        ));
        match (&overlay.commands[5], &overlay.commands[6]) {
            (
                DrawCommand::Text { lines: label, size: label_size, .. },
                DrawCommand::Text { lines: body, y, .. },
            ) => {
                assert_eq!(*label_size, 10.0);
                assert!(label[0].starts_with("Annotated: [ the quick brown"));
                assert_eq!(body, &vec!["Comment: \"needs a citation\"".to_owned()]);
                assert_eq!(label.len(), 2);
                assert!(*y > (box_top - box_height) as f32);
            }
            other => panic!("expected label and comment text, got {other:?}"),
        }
    }
}
