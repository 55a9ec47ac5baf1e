//! Inclusive integer screen rectangles.
//!
//! A `Bounds` covers `x_min..=x_max` by `y_min..=y_max` in the global screen
//! coordinate system shared by every rank. A rectangle whose max is below its
//! min on either axis is empty: it has zero area and denotes "no contribution".

use std::fmt;

/// Inclusive pixel rectangle in global screen space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bounds {
    pub x_min: i32,
    pub x_max: i32,
    pub y_min: i32,
    pub y_max: i32,
}

impl Bounds {
    pub const fn new(x_min: i32, x_max: i32, y_min: i32, y_max: i32) -> Self {
        Self { x_min, x_max, y_min, y_max }
    }

    /// Rectangle with its lower-left corner at `(x, y)`.
    pub fn from_origin(x: i32, y: i32, width: usize, height: usize) -> Self {
        Self::new(x, x + width as i32 - 1, y, y + height as i32 - 1)
    }

    /// The canonical empty rectangle.
    pub const fn empty() -> Self {
        Self::new(0, -1, 0, -1)
    }

    pub fn width(&self) -> usize {
        extent(self.x_min, self.x_max)
    }

    pub fn height(&self) -> usize {
        extent(self.y_min, self.y_max)
    }

    /// Pixel count; saturates at `usize::MAX` for rectangles no buffer
    /// could hold.
    pub fn area(&self) -> usize {
        self.width().saturating_mul(self.height())
    }

    pub fn is_empty(&self) -> bool {
        self.area() == 0
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x_min && x <= self.x_max && y >= self.y_min && y <= self.y_max
    }

    /// Overlap of two rectangles; empty when they are disjoint.
    pub fn intersect(&self, other: &Bounds) -> Bounds {
        let b = Bounds::new(
            self.x_min.max(other.x_min),
            self.x_max.min(other.x_max),
            self.y_min.max(other.y_min),
            self.y_max.min(other.y_max),
        );
        if b.is_empty() { Bounds::empty() } else { b }
    }

    /// Smallest rectangle covering both; empty inputs are ignored.
    pub fn union(&self, other: &Bounds) -> Bounds {
        match (self.is_empty(), other.is_empty()) {
            (true, _) => *other,
            (_, true) => *self,
            _ => Bounds::new(
                self.x_min.min(other.x_min),
                self.x_max.max(other.x_max),
                self.y_min.min(other.y_min),
                self.y_max.max(other.y_max),
            ),
        }
    }

    pub fn overlaps(&self, other: &Bounds) -> bool {
        !self.intersect(other).is_empty()
    }

    /// Row-major pixel index of `(x, y)`, or `None` outside the rectangle.
    pub fn index_of(&self, x: i32, y: i32) -> Option<usize> {
        if !self.contains(x, y) {
            return None;
        }
        let row = (i64::from(y) - i64::from(self.y_min)) as usize;
        let col = (i64::from(x) - i64::from(self.x_min)) as usize;
        Some(row * self.width() + col)
    }

    /// Split along the longer axis into `k` balanced, disjoint slabs and
    /// return slab `i`. Slabs beyond the number of available rows or columns
    /// come back empty.
    pub fn split(&self, k: usize, i: usize) -> Bounds {
        debug_assert!(i < k);
        if self.is_empty() {
            return Bounds::empty();
        }
        if self.width() >= self.height() {
            let (lo, hi) = balanced_range(self.x_min, self.width(), k, i);
            Bounds::new(lo, hi, self.y_min, self.y_max).normalized()
        } else {
            let (lo, hi) = balanced_range(self.y_min, self.height(), k, i);
            Bounds::new(self.x_min, self.x_max, lo, hi).normalized()
        }
    }

    fn normalized(self) -> Bounds {
        if self.is_empty() { Bounds::empty() } else { self }
    }
}

/// Cell count of the inclusive range `lo..=hi`, computed wide so that
/// extreme coordinates cannot overflow.
fn extent(lo: i32, hi: i32) -> usize {
    if hi < lo { 0 } else { usize::try_from(i64::from(hi) - i64::from(lo) + 1).unwrap_or(usize::MAX) }
}

/// Inclusive range `[lo, hi]` of chunk `i` when `len` cells starting at
/// `start` are dealt into `k` chunks; the first `len % k` chunks get one
/// extra cell.
pub(crate) fn balanced_range(start: i32, len: usize, k: usize, i: usize) -> (i32, i32) {
    let base = len / k;
    let extra = len % k;
    let offset = i * base + i.min(extra);
    let size = base + usize::from(i < extra);
    let lo = start + offset as i32;
    (lo, lo + size as i32 - 1)
}

impl Default for Bounds {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "[empty]")
        } else {
            write!(f, "[{}..{}]x[{}..{}]", self.x_min, self.x_max, self.y_min, self.y_max)
        }
    }
}
