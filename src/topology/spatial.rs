//! Axis-aligned bounding boxes attached to maps and datasets.

use serde::{Deserialize, Serialize};

/// A 3-D bounding box in map coordinates.
///
/// 2-D operations ignore `top` and `bottom`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SpatialExtent {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
    pub top: f64,
    pub bottom: f64,
}

impl SpatialExtent {
    pub fn new(north: f64, south: f64, east: f64, west: f64, top: f64, bottom: f64) -> Self {
        Self { north, south, east, west, top, bottom }
    }

    /// A flat box with `top == bottom == 0`.
    pub fn new_2d(north: f64, south: f64, east: f64, west: f64) -> Self {
        Self::new(north, south, east, west, 0.0, 0.0)
    }

    /// Closed-box test: touching edges count as intersecting.
    pub fn intersects_2d(&self, other: &SpatialExtent) -> bool {
        self.west <= other.east
            && self.east >= other.west
            && self.south <= other.north
            && self.north >= other.south
    }

    /// Closed-box test including the vertical axis.
    pub fn intersects_3d(&self, other: &SpatialExtent) -> bool {
        self.intersects_2d(other) && self.bottom <= other.top && self.top >= other.bottom
    }

    /// Strict test: the boxes share a region of positive area.
    pub fn overlaps_2d(&self, other: &SpatialExtent) -> bool {
        self.west < other.east
            && self.east > other.west
            && self.south < other.north
            && self.north > other.south
    }

    /// Strict test including the vertical axis.
    pub fn overlaps_3d(&self, other: &SpatialExtent) -> bool {
        self.overlaps_2d(other) && self.bottom < other.top && self.top > other.bottom
    }

    /// Smallest box covering both.
    pub fn union(&self, other: &SpatialExtent) -> SpatialExtent {
        SpatialExtent {
            north: self.north.max(other.north),
            south: self.south.min(other.south),
            east: self.east.max(other.east),
            west: self.west.min(other.west),
            top: self.top.max(other.top),
            bottom: self.bottom.min(other.bottom),
        }
    }

    /// Union over all boxes, `None` for an empty input.
    pub fn union_all<'a, I>(boxes: I) -> Option<SpatialExtent>
    where
        I: IntoIterator<Item = &'a SpatialExtent>,
    {
        boxes.into_iter().copied().reduce(|acc, b| acc.union(&b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touching_boxes_intersect_but_do_not_overlap() {
        let a = SpatialExtent::new_2d(10.0, 0.0, 10.0, 0.0);
        let b = SpatialExtent::new_2d(10.0, 0.0, 20.0, 10.0);
        assert!(a.intersects_2d(&b));
        assert!(!a.overlaps_2d(&b));
        let c = SpatialExtent::new_2d(10.0, 0.0, 15.0, 5.0);
        assert!(a.overlaps_2d(&c));
    }

    #[test]
    fn vertical_axis() {
        let a = SpatialExtent::new(1.0, 0.0, 1.0, 0.0, 1.0, 0.0);
        let b = SpatialExtent::new(1.0, 0.0, 1.0, 0.0, 3.0, 2.0);
        assert!(a.intersects_2d(&b));
        assert!(!a.intersects_3d(&b));
        let u = a.union(&b);
        assert_eq!((u.top, u.bottom), (3.0, 0.0));
    }
}
