/// Surface dimensions in device units (pixels for native surfaces, cells for terminals).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }
}

/// Horizontal range `[left, right)` occupied by a block after paint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub left: i32,
    pub right: i32,
}

impl Span {
    pub const fn new(left: i32, right: i32) -> Self {
        Self { left, right }
    }

    pub fn from_right(right: i32, width: i32) -> Self {
        Self {
            left: right.saturating_sub(width),
            right,
        }
    }

    pub fn width(&self) -> i32 {
        self.right.saturating_sub(self.left)
    }

    pub fn contains(&self, x: i32) -> bool {
        x >= self.left && x < self.right
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_is_half_open() {
        let span = Span::from_right(200, 90);
        assert_eq!(span.left, 110);
        assert!(span.contains(110));
        assert!(span.contains(199));
        assert!(!span.contains(200));
        assert!(!span.contains(109));
    }

    #[test]
    fn zero_width_span_contains_nothing() {
        let span = Span::from_right(50, 0);
        assert_eq!(span.width(), 0);
        assert!(!span.contains(50));
        assert!(!span.contains(49));
    }
}
