//! Shared geometry types
//!
//! Rectangle math used by window placement, workarea resolution, and
//! strut computation.

use serde::{Deserialize, Serialize};

/// A position + size rectangle in screen coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Right edge (exclusive)
    pub fn end_x(&self) -> i32 {
        self.x + self.width as i32
    }

    /// Bottom edge (exclusive)
    pub fn end_y(&self) -> i32 {
        self.y + self.height as i32
    }

    /// Whether the given point falls inside this rectangle
    pub fn contains(&self, px: i32, py: i32) -> bool {
        px >= self.x && py >= self.y && px < self.end_x() && py < self.end_y()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_is_inclusive_of_origin_exclusive_of_end() {
        let r = Rect::new(10, 20, 100, 50);
        assert!(r.contains(10, 20));
        assert!(r.contains(109, 69));
        assert!(!r.contains(110, 69));
        assert!(!r.contains(9, 20));
    }

    #[test]
    fn edges() {
        let r = Rect::new(-5, 0, 10, 10);
        assert_eq!(r.end_x(), 5);
        assert_eq!(r.end_y(), 10);
    }
}
