//! Geometry nodes: rectangles, ellipses and free paths.

use super::NodeBehavior;
use crate::property::PropertyMap;
use glam::Vec2;
use kurbo::{BezPath, Point, Shape as _};
use lottie_data::model::BezierPath;

/// Tolerance used when flattening primitive shapes to Béziers.
const PATH_TOLERANCE: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Rectangle,
    Ellipse,
    Path,
}

#[derive(Debug)]
pub struct ShapeNode {
    kind: ShapeKind,
    geometry: BezPath,
}

impl ShapeNode {
    pub fn new(kind: ShapeKind) -> Self {
        Self {
            kind,
            geometry: BezPath::new(),
        }
    }

    pub fn kind(&self) -> ShapeKind {
        self.kind
    }

    /// Geometry in the owning group's coordinate space.
    pub fn geometry(&self) -> &BezPath {
        &self.geometry
    }
}

impl NodeBehavior for ShapeNode {
    fn perform_additional_output_updates(&mut self, properties: &PropertyMap) {
        self.geometry = match self.kind {
            ShapeKind::Rectangle => {
                let size = properties.vector2("Size", Vec2::ZERO);
                let center = properties.vector2("Position", Vec2::ZERO);
                let radius = properties.scalar("Roundness", 0.0);
                rectangle(size, center, radius)
            }
            ShapeKind::Ellipse => {
                let size = properties.vector2("Size", Vec2::ZERO);
                let center = properties.vector2("Position", Vec2::ZERO);
                ellipse(size, center)
            }
            ShapeKind::Path => properties.path("Path").map(bezier_path).unwrap_or_default(),
        };
    }
}

fn rectangle(size: Vec2, center: Vec2, radius: f32) -> BezPath {
    let half = size / 2.0;
    let rect = kurbo::Rect::new(
        (center.x - half.x) as f64,
        (center.y - half.y) as f64,
        (center.x + half.x) as f64,
        (center.y + half.y) as f64,
    );
    if radius > 0.0 {
        // Corner radius cannot exceed half the shorter side.
        let radius = radius.min(half.x.abs()).min(half.y.abs());
        kurbo::RoundedRect::from_rect(rect, radius as f64).to_path(PATH_TOLERANCE)
    } else {
        rect.to_path(PATH_TOLERANCE)
    }
}

fn ellipse(size: Vec2, center: Vec2) -> BezPath {
    let half = size / 2.0;
    kurbo::Ellipse::new(
        (center.x as f64, center.y as f64),
        (half.x as f64, half.y as f64),
        0.0,
    )
    .to_path(PATH_TOLERANCE)
}

/// Converts vertices with relative in/out tangents into absolute cubics.
pub(crate) fn bezier_path(path: &BezierPath) -> BezPath {
    let mut bp = BezPath::new();
    let Some(&first) = path.v.first() else {
        return bp;
    };
    let point = |v: [f32; 2]| Point::new(v[0] as f64, v[1] as f64);
    let tangent = |list: &[[f32; 2]], idx: usize| list.get(idx).copied().unwrap_or([0.0, 0.0]);

    bp.move_to(point(first));
    let segment = |bp: &mut BezPath, from: usize, to: usize| {
        let p0 = path.v[from];
        let p1 = path.v[to];
        let out = tangent(&path.o, from);
        let inn = tangent(&path.i, to);
        bp.curve_to(
            point([p0[0] + out[0], p0[1] + out[1]]),
            point([p1[0] + inn[0], p1[1] + inn[1]]),
            point(p1),
        );
    };
    for idx in 1..path.v.len() {
        segment(&mut bp, idx - 1, idx);
    }
    if path.c {
        segment(&mut bp, path.v.len() - 1, 0);
        bp.close_path();
    }
    bp
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::NodeProperty;
    use kurbo::PathEl;

    #[test]
    fn test_rectangle_bounds() {
        let mut props = PropertyMap::new();
        props.insert("Size", NodeProperty::constant(Vec2::new(20.0, 10.0)));
        props.insert("Position", NodeProperty::constant(Vec2::new(5.0, 5.0)));
        props.insert("Roundness", NodeProperty::constant(0.0f32));
        props.update(0.0);

        let mut node = ShapeNode::new(ShapeKind::Rectangle);
        node.perform_additional_output_updates(&props);
        let bounds = node.geometry().bounding_box();
        assert_eq!((bounds.x0, bounds.y0), (-5.0, 0.0));
        assert_eq!((bounds.x1, bounds.y1), (15.0, 10.0));
    }

    #[test]
    fn test_ellipse_bounds() {
        let mut props = PropertyMap::new();
        props.insert("Size", NodeProperty::constant(Vec2::new(10.0, 4.0)));
        props.insert("Position", NodeProperty::constant(Vec2::ZERO));
        props.update(0.0);

        let mut node = ShapeNode::new(ShapeKind::Ellipse);
        node.perform_additional_output_updates(&props);
        let bounds = node.geometry().bounding_box();
        assert!((bounds.width() - 10.0).abs() < 1e-6);
        assert!((bounds.height() - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_closed_path_tangents_are_relative() {
        let path = BezierPath {
            c: true,
            v: vec![[0.0, 0.0], [10.0, 0.0]],
            i: vec![[0.0, 0.0], [0.0, -5.0]],
            o: vec![[2.0, 0.0], [0.0, 0.0]],
        };
        let bp = bezier_path(&path);
        let elements = bp.elements();
        assert_eq!(elements.len(), 4);
        assert_eq!(
            elements[1],
            PathEl::CurveTo(
                Point::new(2.0, 0.0),
                Point::new(10.0, -5.0),
                Point::new(10.0, 0.0)
            )
        );
        assert_eq!(elements[3], PathEl::ClosePath);
    }

    #[test]
    fn test_missing_path_is_empty() {
        let mut node = ShapeNode::new(ShapeKind::Path);
        node.perform_additional_output_updates(&PropertyMap::new());
        assert!(node.geometry().elements().is_empty());
    }
}
