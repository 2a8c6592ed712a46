//! Selection geometry
//!
//! Converts an on-screen text selection into page-relative highlight geometry.
//! All values are screen pixels at the zoom active when the selection was made,
//! with the origin at the page's top-left corner and y growing downward.

use std::fmt;

/// Rectangles closer than this (in pixels) on every edge are the same line box.
const DUPLICATE_RECT_TOLERANCE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self { left, top, width, height }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// True unless the rectangle has a positive, finite area.
    pub fn is_degenerate(&self) -> bool {
        !(self.width.is_finite()
            && self.height.is_finite()
            && self.width > 0.0
            && self.height > 0.0)
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.left
            && point.x <= self.right()
            && point.y >= self.top
            && point.y <= self.bottom()
    }

    fn approx_eq(&self, other: &Rect) -> bool {
        (self.left - other.left).abs() < DUPLICATE_RECT_TOLERANCE
            && (self.top - other.top).abs() < DUPLICATE_RECT_TOLERANCE
            && (self.right() - other.right()).abs() < DUPLICATE_RECT_TOLERANCE
            && (self.bottom() - other.bottom()).abs() < DUPLICATE_RECT_TOLERANCE
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("malformed polygon points: {0:?}")]
pub struct PolygonParseError(pub String);

/// Clip quadrilateral: top-left, top-right, bottom-right, bottom-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad(pub [Point; 4]);

impl Quad {
    pub fn from_rect(rect: Rect) -> Self {
        Self([
            Point::new(rect.left, rect.top),
            Point::new(rect.right(), rect.top),
            Point::new(rect.right(), rect.bottom()),
            Point::new(rect.left, rect.bottom()),
        ])
    }

    pub fn points(&self) -> &[Point; 4] {
        &self.0
    }

    pub fn scale(&mut self, ratio: f64) {
        for point in &mut self.0 {
            point.x *= ratio;
            point.y *= ratio;
        }
    }

    /// Axis-aligned bounds of the four points.
    pub fn bounds(&self) -> Rect {
        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for point in &self.0 {
            min_x = min_x.min(point.x);
            min_y = min_y.min(point.y);
            max_x = max_x.max(point.x);
            max_y = max_y.max(point.y);
        }
        Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    /// Even-odd containment test, so non-rectangular quads hit-test correctly.
    pub fn contains(&self, point: Point) -> bool {
        let mut inside = false;
        let mut j = self.0.len() - 1;
        for i in 0..self.0.len() {
            let (a, b) = (self.0[i], self.0[j]);
            if (a.y > point.y) != (b.y > point.y) {
                let crossing = (b.x - a.x) * (point.y - a.y) / (b.y - a.y) + a.x;
                if point.x < crossing {
                    inside = !inside;
                }
            }
            j = i;
        }
        // Ray casting excludes the right and bottom edges; rectangles keep them.
        inside || (self.is_axis_aligned_rect() && self.bounds().contains(point))
    }

    fn is_axis_aligned_rect(&self) -> bool {
        let [tl, tr, br, bl] = self.0;
        tl.y == tr.y && bl.y == br.y && tl.x == bl.x && tr.x == br.x
    }

    /// Parses the `"x y, x y, x y, x y"` form used in saved records.
    pub fn parse_points(text: &str) -> Result<Self, PolygonParseError> {
        let error = || PolygonParseError(text.to_owned());
        let mut points = [Point::default(); 4];
        let mut parts = text.split(',');

        for slot in &mut points {
            let mut coords = parts.next().ok_or_else(error)?.split_whitespace();
            let x: f64 = coords.next().ok_or_else(error)?.parse().map_err(|_| error())?;
            let y: f64 = coords.next().ok_or_else(error)?.parse().map_err(|_| error())?;
            if coords.next().is_some() || !x.is_finite() || !y.is_finite() {
                return Err(error());
            }
            *slot = Point::new(x, y);
        }

        if parts.next().is_some() {
            return Err(error());
        }
        Ok(Self(points))
    }
}

impl fmt::Display for Quad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, point) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} {}", point.x, point.y)?;
        }
        Ok(())
    }
}

/// The page text-layer container a selection resolved to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageAnchor {
    pub page_index: u32,
    /// Screen rectangle of the page's text layer.
    pub container: Rect,
}

/// A text selection as reported by the viewer, in screen coordinates.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectionRange {
    pub text: String,
    /// Bounding rectangle of the whole selection.
    pub bounds: Rect,
    /// One rectangle per visual line fragment, in selection order.
    pub line_rects: Vec<Rect>,
    /// `None` when the selection's common ancestor is not a page text layer.
    pub anchor: Option<PageAnchor>,
}

/// Page-relative geometry for a highlight, at the zoom it was captured at.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionGeometry {
    pub left_offset: f64,
    pub top_offset: f64,
    pub width: f64,
    pub height: f64,
    /// Line polygons relative to `(left_offset, top_offset)`.
    pub polygons: Vec<Quad>,
    pub toolbar_left_offset: f64,
    pub toolbar_top_offset: f64,
}

impl SelectionGeometry {
    /// Uniformly scales every coordinate and extent.
    pub fn scale(&mut self, ratio: f64) {
        self.left_offset *= ratio;
        self.top_offset *= ratio;
        self.width *= ratio;
        self.height *= ratio;
        self.toolbar_left_offset *= ratio;
        self.toolbar_top_offset *= ratio;
        for polygon in &mut self.polygons {
            polygon.scale(ratio);
        }
    }

    pub fn scaled(&self, ratio: f64) -> Self {
        let mut copy = self.clone();
        copy.scale(ratio);
        copy
    }

    /// Polygons translated into page-relative coordinates.
    pub fn page_polygons(&self) -> impl Iterator<Item = Quad> + '_ {
        self.polygons.iter().map(move |quad| {
            let mut shifted = *quad;
            for point in &mut shifted.0 {
                point.x += self.left_offset;
                point.y += self.top_offset;
            }
            shifted
        })
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("selection is empty")]
    EmptySelection,
    #[error("selection is not inside a page text layer")]
    OutsidePage,
    #[error("selection has no visible line rectangles")]
    NoLineRects,
    #[error("selection bounds have no area")]
    DegenerateBounds,
}

/// Converts a selection into highlight geometry relative to its page.
pub fn extract(range: &SelectionRange) -> Result<SelectionGeometry, ExtractionError> {
    if range.text.is_empty() {
        return Err(ExtractionError::EmptySelection);
    }
    let anchor = range.anchor.ok_or(ExtractionError::OutsidePage)?;
    if range.bounds.is_degenerate() {
        return Err(ExtractionError::DegenerateBounds);
    }

    let page = anchor.container;
    let left_offset = range.bounds.left - page.left;
    let top_offset = range.bounds.top - page.top;

    let mut lines: Vec<Rect> = Vec::with_capacity(range.line_rects.len());
    for rect in range.line_rects.iter().filter(|rect| !rect.is_degenerate()) {
        if lines.iter().any(|seen| seen.approx_eq(rect)) {
            continue;
        }
        lines.push(*rect);
    }
    let last = *lines.last().ok_or(ExtractionError::NoLineRects)?;

    let polygons = lines
        .iter()
        .map(|rect| {
            Quad::from_rect(Rect::new(
                rect.left - page.left - left_offset,
                rect.top - page.top - top_offset,
                rect.width,
                rect.height,
            ))
        })
        .collect();

    Ok(SelectionGeometry {
        left_offset,
        top_offset,
        width: range.bounds.width,
        height: range.bounds.height,
        polygons,
        toolbar_left_offset: last.right() - page.left,
        toolbar_top_offset: last.bottom() - page.top,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn three_line_selection(page_index: u32) -> SelectionRange {
        SelectionRange {
            text: "the quick brown fox jumps over the lazy dog".to_owned(),
            bounds: Rect::new(120.0, 230.0, 300.0, 60.0),
            line_rects: vec![
                Rect::new(200.0, 230.0, 220.0, 18.0),
                Rect::new(120.0, 250.0, 300.0, 18.0),
                Rect::new(120.0, 270.0, 140.0, 20.0),
            ],
            anchor: Some(PageAnchor {
                page_index,
                container: Rect::new(100.0, 200.0, 612.0, 792.0),
            }),
        }
    }

    #[test]
    fn extracts_offsets_polygons_and_toolbar() {
        let geometry = extract(&three_line_selection(0)).expect("extraction should succeed");

        assert_eq!(geometry.left_offset, 20.0);
        assert_eq!(geometry.top_offset, 30.0);
        assert_eq!(geometry.width, 300.0);
        assert_eq!(geometry.height, 60.0);
        assert_eq!(geometry.polygons.len(), 3);
        assert_eq!(geometry.polygons[0].to_string(), "80 0, 300 0, 300 18, 80 18");
        assert_eq!(geometry.polygons[2].to_string(), "0 40, 140 40, 140 60, 0 60");
        assert_eq!(geometry.toolbar_left_offset, 160.0);
        assert_eq!(geometry.toolbar_top_offset, 90.0);
    }

    #[test]
    fn page_polygons_are_page_relative() {
        let geometry = extract(&three_line_selection(0)).expect("extraction should succeed");
        let first = geometry.page_polygons().next().expect("has polygons");

        assert_eq!(first.points()[0], Point::new(100.0, 30.0));
    }

    #[test]
    fn rejects_empty_and_unanchored_selections() {
        let mut range = three_line_selection(0);
        range.text.clear();
        assert_eq!(extract(&range), Err(ExtractionError::EmptySelection));

        let mut range = three_line_selection(0);
        range.anchor = None;
        assert_eq!(extract(&range), Err(ExtractionError::OutsidePage));
    }

    #[test]
    fn drops_degenerate_and_duplicate_line_rects() {
        let mut range = three_line_selection(0);
        range.line_rects.insert(1, Rect::new(120.0, 250.0, 0.0, 18.0));
        range.line_rects.push(Rect::new(120.2, 270.1, 140.0, 20.0));

        let geometry = extract(&range).expect("extraction should succeed");
        assert_eq!(geometry.polygons.len(), 3);

        range.line_rects = vec![Rect::new(0.0, 0.0, 10.0, 0.0)];
        assert_eq!(extract(&range), Err(ExtractionError::NoLineRects));

        range.bounds = Rect::new(0.0, 0.0, 0.0, 0.0);
        assert_eq!(extract(&range), Err(ExtractionError::DegenerateBounds));
    }

    #[test]
    fn polygon_points_parse_back() {
        let quad = Quad::from_rect(Rect::new(1.5, 2.0, 3.25, 4.0));
        let parsed = Quad::parse_points(&quad.to_string()).expect("points should parse");
        assert_eq!(parsed, quad);

        assert!(Quad::parse_points("1 2, 3 4, 5 6").is_err());
        assert!(Quad::parse_points("1 2, 3 4, 5 6, 7 8, 9 10").is_err());
        assert!(Quad::parse_points("1 2 3, 3 4, 5 6, 7 8").is_err());
        assert!(Quad::parse_points("a b, 3 4, 5 6, 7 8").is_err());
    }

    #[test]
    fn quad_containment_uses_polygon_not_bounds() {
        let diamond = Quad([
            Point::new(5.0, 0.0),
            Point::new(10.0, 5.0),
            Point::new(5.0, 10.0),
            Point::new(0.0, 5.0),
        ]);

        assert!(diamond.contains(Point::new(5.0, 5.0)));
        assert!(!diamond.contains(Point::new(0.5, 0.5)));

        let rect = Quad::from_rect(Rect::new(0.0, 0.0, 10.0, 10.0));
        assert!(rect.contains(Point::new(10.0, 10.0)));
        assert!(!rect.contains(Point::new(10.5, 5.0)));
    }
}
