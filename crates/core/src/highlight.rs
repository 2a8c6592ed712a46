//! Highlight annotation entity

use crate::color::{Color, Palette};
use crate::geometry::{Point, SelectionGeometry};
use crate::id::{fresh_clip_path_id, AnnotationId};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HighlightError {
    #[error("highlight has no clip polygons")]
    NoPolygons,
    #[error("highlight geometry is not finite")]
    NonFiniteGeometry,
}

/// One highlighted region of a page.
///
/// Geometry is held at the current zoom. Live highlights and highlights restored
/// from a saved container differ only in how they are constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct Highlight {
    id: AnnotationId,
    clip_path_id: String,
    geometry: SelectionGeometry,
    color: Color,
    selected: bool,
}

impl Highlight {
    /// Creates a highlight from freshly extracted selection geometry.
    pub fn create(
        id: AnnotationId,
        geometry: SelectionGeometry,
        color: Color,
    ) -> Result<Self, HighlightError> {
        Self::restore(id, fresh_clip_path_id(), geometry, color)
    }

    /// Rebuilds a highlight from persisted state, keeping its clip-path tag.
    pub fn restore(
        id: AnnotationId,
        clip_path_id: String,
        geometry: SelectionGeometry,
        color: Color,
    ) -> Result<Self, HighlightError> {
        if geometry.polygons.is_empty() {
            return Err(HighlightError::NoPolygons);
        }
        let scalars = [
            geometry.left_offset,
            geometry.top_offset,
            geometry.width,
            geometry.height,
            geometry.toolbar_left_offset,
            geometry.toolbar_top_offset,
        ];
        let finite_points = geometry
            .polygons
            .iter()
            .flat_map(|quad| quad.points().iter())
            .all(|point| point.x.is_finite() && point.y.is_finite());
        if !finite_points || !scalars.iter().all(|value| value.is_finite()) {
            return Err(HighlightError::NonFiniteGeometry);
        }

        Ok(Self { id, clip_path_id, geometry, color, selected: false })
    }

    pub fn id(&self) -> &AnnotationId {
        &self.id
    }

    pub fn clip_path_id(&self) -> &str {
        &self.clip_path_id
    }

    pub fn geometry(&self) -> &SelectionGeometry {
        &self.geometry
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    /// Toolbar swatch that should appear active for this highlight.
    pub fn selected_swatch(&self) -> Option<Palette> {
        Palette::matching(&self.color)
    }

    /// Sets the color and returns the previous one.
    ///
    /// A highlight that belongs to a comment is only reachable through
    /// [`crate::comment::Comment::change_color`], which forwards the new color
    /// to the notation.
    pub fn change_color(&mut self, color: Color) -> Color {
        std::mem::replace(&mut self.color, color)
    }

    /// Uniformly scales all geometry. Non-positive or non-finite ratios are ignored.
    pub fn resize(&mut self, ratio: f64) {
        if !(ratio.is_finite() && ratio > 0.0) {
            tracing::warn!(id = %self.id, ratio, "ignoring invalid resize ratio");
            return;
        }
        self.geometry.scale(ratio);
    }

    /// Geometry divided back to zoom 1.0.
    pub fn unscaled_geometry(&self, zoom: f64) -> SelectionGeometry {
        self.geometry.scaled(1.0 / zoom)
    }

    /// Whether a page-relative point lands on the visible clip region.
    pub fn hit_test(&self, point: Point) -> bool {
        let local =
            Point::new(point.x - self.geometry.left_offset, point.y - self.geometry.top_offset);
        self.geometry.polygons.iter().any(|quad| quad.contains(local))
    }

    pub fn toggle_selected(&mut self) -> bool {
        self.selected = !self.selected;
        self.selected
    }

    pub fn deselect(&mut self) {
        self.selected = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::tests::three_line_selection;
    use crate::geometry::{extract, Quad, Rect};
    use proptest::prelude::*;

    fn sample() -> Highlight {
        let geometry = extract(&three_line_selection(0)).expect("extraction should succeed");
        Highlight::create(AnnotationId::from("h1"), geometry, Palette::Yellow.color())
            .expect("highlight should build")
    }

    fn assert_geometry_close(left: &SelectionGeometry, right: &SelectionGeometry) {
        let close = |a: f64, b: f64| (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0);
        assert!(close(left.left_offset, right.left_offset));
        assert!(close(left.top_offset, right.top_offset));
        assert!(close(left.width, right.width));
        assert!(close(left.height, right.height));
        assert!(close(left.toolbar_left_offset, right.toolbar_left_offset));
        assert!(close(left.toolbar_top_offset, right.toolbar_top_offset));
        for (a, b) in left.polygons.iter().zip(&right.polygons) {
            for (p, q) in a.points().iter().zip(b.points()) {
                assert!(close(p.x, q.x) && close(p.y, q.y));
            }
        }
    }

    #[test]
    fn rejects_empty_polygons() {
        let mut geometry = sample().geometry().clone();
        geometry.polygons.clear();

        let err = Highlight::create(AnnotationId::new(), geometry, Color::BLACK)
            .expect_err("empty polygons must be rejected");
        assert_eq!(err, HighlightError::NoPolygons);
    }

    #[test]
    fn rejects_non_finite_geometry() {
        let mut geometry = sample().geometry().clone();
        geometry.width = f64::NAN;

        assert_eq!(
            Highlight::create(AnnotationId::new(), geometry, Color::BLACK),
            Err(HighlightError::NonFiniteGeometry)
        );
    }

    #[test]
    fn clip_path_ids_are_fresh() {
        assert_ne!(sample().clip_path_id(), sample().clip_path_id());
        assert!(sample().clip_path_id().starts_with("clipPath-"));
    }

    #[test]
    fn change_color_returns_previous() {
        let mut highlight = sample();
        let previous = highlight.change_color(Palette::Blue.color());

        assert_eq!(previous, Palette::Yellow.color());
        assert_eq!(highlight.selected_swatch(), Some(Palette::Blue));
    }

    #[test]
    fn hit_test_ignores_bounding_box_gaps() {
        let highlight = sample();

        // First line starts 80px into the selection; its left is empty.
        assert!(!highlight.hit_test(Point::new(30.0, 35.0)));
        assert!(highlight.hit_test(Point::new(110.0, 35.0)));
        assert!(highlight.hit_test(Point::new(30.0, 80.0)));
        // Below the short last line, still within the bounding box.
        assert!(!highlight.hit_test(Point::new(250.0, 85.0)));
    }

    #[test]
    fn toggle_selected_flips_state() {
        let mut highlight = sample();
        assert!(highlight.toggle_selected());
        assert!(highlight.is_selected());
        assert!(!highlight.toggle_selected());
    }

    #[test]
    fn zoom_in_and_back_restores_geometry() {
        let mut highlight = sample();
        let original = highlight.geometry().clone();

        highlight.resize(1.5);
        highlight.resize(1.0 / 1.5);

        assert_geometry_close(highlight.geometry(), &original);
    }

    #[test]
    fn invalid_resize_is_ignored() {
        let mut highlight = sample();
        let original = highlight.geometry().clone();

        highlight.resize(0.0);
        highlight.resize(-2.0);
        highlight.resize(f64::INFINITY);

        assert_eq!(highlight.geometry(), &original);
    }

    proptest! {
        #[test]
        fn resize_composes(a in 0.05f64..8.0, b in 0.05f64..8.0) {
            let mut stepped = sample();
            stepped.resize(a);
            stepped.resize(b);

            let mut direct = sample();
            direct.resize(a * b);

            assert_geometry_close(stepped.geometry(), direct.geometry());
        }

        #[test]
        fn resize_matches_fresh_capture_at_new_zoom(zoom in 0.25f64..4.0, ratio in 0.25f64..4.0) {
            let capture = |scale: f64| {
                let mut range = three_line_selection(0);
                let scale_rect = |rect: Rect| {
                    Rect::new(
                        rect.left * scale,
                        rect.top * scale,
                        rect.width * scale,
                        rect.height * scale,
                    )
                };
                range.bounds = scale_rect(range.bounds);
                range.line_rects = range.line_rects.into_iter().map(scale_rect).collect();
                if let Some(anchor) = range.anchor.as_mut() {
                    anchor.container = scale_rect(anchor.container);
                }
                extract(&range).expect("extraction should succeed")
            };

            let mut resized = Highlight::create(AnnotationId::new(), capture(zoom), Color::BLACK)
                .expect("highlight should build");
            resized.resize(ratio);

            assert_geometry_close(resized.geometry(), &capture(zoom * ratio));
        }
    }

    #[test]
    fn unscaled_geometry_divides_by_zoom() {
        let mut highlight = sample();
        highlight.resize(2.0);

        let unscaled = highlight.unscaled_geometry(2.0);
        assert_geometry_close(&unscaled, sample().geometry());
        assert_eq!(unscaled.polygons[0], Quad::from_rect(Rect::new(80.0, 0.0, 220.0, 18.0)));
    }
}
