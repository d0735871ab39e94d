//! Spatial primitives shared by the cover resolver

pub mod geometry;

pub use geometry::{point_in_rect, segment_intersects_rect, segments_intersect, Rect};
