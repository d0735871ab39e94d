//! Geometry kernel: points, segments and axis-aligned rectangles
//!
//! All tests are boundary-inclusive. A segment that only grazes a corner of a
//! rectangle, or two segments that share a single endpoint, still count as
//! intersecting.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in world space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    /// Build from two opposite corners in any order
    pub fn from_corners(a: Vec2, b: Vec2) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Build from a top-left position and a size
    ///
    /// Returns `None` for non-finite input or a negative extent.
    pub fn from_origin_size(origin: Vec2, width: f32, height: f32) -> Option<Self> {
        if !origin.is_finite() || !width.is_finite() || !height.is_finite() {
            return None;
        }
        if width < 0.0 || height < 0.0 {
            return None;
        }
        Some(Self {
            min: origin,
            max: origin + Vec2::new(width, height),
        })
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    /// The four edges, clockwise from the top
    pub fn edges(&self) -> [(Vec2, Vec2); 4] {
        let top_left = self.min;
        let top_right = Vec2::new(self.max.x, self.min.y);
        let bottom_right = self.max;
        let bottom_left = Vec2::new(self.min.x, self.max.y);
        [
            (top_left, top_right),
            (top_right, bottom_right),
            (bottom_right, bottom_left),
            (bottom_left, top_left),
        ]
    }
}

/// Is `p` inside `rect` (edges included)?
pub fn point_in_rect(p: Vec2, rect: &Rect) -> bool {
    p.x >= rect.min.x && p.x <= rect.max.x && p.y >= rect.min.y && p.y <= rect.max.y
}

/// Turn direction of `c` relative to the line `a -> b`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Orientation {
    Collinear,
    Clockwise,
    CounterClockwise,
}

fn orientation(a: Vec2, b: Vec2, c: Vec2) -> Orientation {
    let cross = (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x);
    if cross > 0.0 {
        Orientation::CounterClockwise
    } else if cross < 0.0 {
        Orientation::Clockwise
    } else {
        Orientation::Collinear
    }
}

/// Given collinear `a`, `q`, `b`: does `q` lie within the bounding box of `a..b`?
fn on_segment(a: Vec2, q: Vec2, b: Vec2) -> bool {
    q.x >= a.x.min(b.x) && q.x <= a.x.max(b.x) && q.y >= a.y.min(b.y) && q.y <= a.y.max(b.y)
}

/// Do segments `p1-p2` and `q1-q2` intersect?
///
/// Touching endpoints and collinear overlap both count.
pub fn segments_intersect(p1: Vec2, p2: Vec2, q1: Vec2, q2: Vec2) -> bool {
    let o1 = orientation(p1, p2, q1);
    let o2 = orientation(p1, p2, q2);
    let o3 = orientation(q1, q2, p1);
    let o4 = orientation(q1, q2, p2);

    // Proper crossing
    if o1 != o2 && o3 != o4 {
        return true;
    }

    // An endpoint of one segment lies on the other
    (o1 == Orientation::Collinear && on_segment(p1, q1, p2))
        || (o2 == Orientation::Collinear && on_segment(p1, q2, p2))
        || (o3 == Orientation::Collinear && on_segment(q1, p1, q2))
        || (o4 == Orientation::Collinear && on_segment(q1, p2, q2))
}

/// Does segment `p1-p2` touch `rect`?
pub fn segment_intersects_rect(p1: Vec2, p2: Vec2, rect: &Rect) -> bool {
    if point_in_rect(p1, rect) || point_in_rect(p2, rect) {
        return true;
    }
    rect.edges()
        .iter()
        .any(|&(a, b)| segments_intersect(p1, p2, a, b))
}
