//! Update rectangles
//!
//! Coordinates are half-open: `x1..x2` by `y1..y2`. Two rectangles that only
//! touch along an edge are not disjoint, so adjacent dirty strips coalesce.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Screen rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Region {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl Region {
    /// Create a region from corner coordinates, or `None` if it is empty
    pub const fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Option<Self> {
        if x1 < x2 && y1 < y2 {
            Some(Self { x1, y1, x2, y2 })
        } else {
            None
        }
    }

    /// Create a region from origin and size, or `None` if it is empty
    pub const fn from_size(x: u32, y: u32, width: u32, height: u32) -> Option<Self> {
        match (x.checked_add(width), y.checked_add(height)) {
            (Some(x2), Some(y2)) => Self::new(x, y, x2, y2),
            _ => None,
        }
    }

    /// The whole panel
    pub const fn full(width: u32, height: u32) -> Self {
        Self {
            x1: 0,
            y1: 0,
            x2: width,
            y2: height,
        }
    }

    pub const fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    pub const fn height(&self) -> u32 {
        self.y2 - self.y1
    }

    /// Whether the bounding boxes are separated on either axis
    pub const fn is_disjoint(&self, other: &Region) -> bool {
        self.x1 > other.x2 || other.x1 > self.x2 || self.y1 > other.y2 || other.y1 > self.y2
    }

    /// Smallest region covering both
    pub fn union(&self, other: &Region) -> Region {
        Region {
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
            x2: self.x2.max(other.x2),
            y2: self.y2.max(other.y2),
        }
    }

    /// Whether `other` lies entirely inside `self`
    pub const fn contains(&self, other: &Region) -> bool {
        other.x1 >= self.x1 && other.y1 >= self.y1 && other.x2 <= self.x2 && other.y2 <= self.y2
    }

    /// Whether the region fits on a `width` x `height` panel
    pub const fn fits(&self, width: u32, height: u32) -> bool {
        self.x1 < self.x2 && self.y1 < self.y2 && self.x2 <= width && self.y2 <= height
    }
}
