//! Bounding-box math in canvas pixel space.

use serde::{Deserialize, Serialize};

/// Anchor of an element's `(left, top)` reference point on one axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    #[default]
    #[serde(alias = "left", alias = "top")]
    Start,
    Center,
}

impl Origin {
    /// Offset from the reference point to the element's center.
    pub fn center_offset(self, effective_len: f64) -> f64 {
        match self {
            Origin::Start => effective_len / 2.0,
            Origin::Center => 0.0,
        }
    }

    /// Offset from the reference point to the element's leading edge.
    pub fn start_offset(self, effective_len: f64) -> f64 {
        match self {
            Origin::Start => 0.0,
            Origin::Center => -effective_len / 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: f64,
    pub height: f64,
}

impl CanvasSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::new(0.0, 0.0, self.width, self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self { left, top, width, height }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn center(&self) -> (f64, f64) {
        (self.left + self.width / 2.0, self.top + self.height / 2.0)
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// True when `other` lies fully inside `self`, edges inclusive,
    /// within `EPSILON` of floating-point slack.
    pub fn contains(&self, other: &BoundingBox) -> bool {
        other.left >= self.left - EPSILON
            && other.top >= self.top - EPSILON
            && other.right() <= self.right() + EPSILON
            && other.bottom() <= self.bottom() + EPSILON
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.left < other.right()
            && other.left < self.right()
            && self.top < other.bottom()
            && other.top < self.bottom()
    }

    /// Area shared with `other`, zero when disjoint.
    pub fn intersection_area(&self, other: &BoundingBox) -> f64 {
        let w = self.right().min(other.right()) - self.left.max(other.left);
        let h = self.bottom().min(other.bottom()) - self.top.max(other.top);
        if w <= 0.0 || h <= 0.0 {
            0.0
        } else {
            w * h
        }
    }
}

/// Slack used by containment checks.
pub const EPSILON: f64 = 1e-6;

/// The canvas minus a margin of `safe_zone * dimension` on every edge.
pub fn safe_area(canvas: CanvasSize, safe_zone: f64) -> BoundingBox {
    let mx = canvas.width * safe_zone;
    let my = canvas.height * safe_zone;
    BoundingBox::new(mx, my, canvas.width - 2.0 * mx, canvas.height - 2.0 * my)
}

/// Clamp a leading edge so a span of `len` stays within `[min, max]`.
///
/// When the span is longer than the range the edge is pinned to `min`.
pub fn clamp_span(start: f64, len: f64, min: f64, max: f64) -> f64 {
    if len > max - min {
        min
    } else {
        start.clamp(min, max - len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_offsets() {
        assert_eq!(Origin::Start.center_offset(100.0), 50.0);
        assert_eq!(Origin::Center.center_offset(100.0), 0.0);
        assert_eq!(Origin::Center.start_offset(100.0), -50.0);
    }

    #[test]
    fn origin_accepts_canvas_aliases() {
        let o: Origin = serde_json::from_str("\"left\"").unwrap();
        assert_eq!(o, Origin::Start);
        let o: Origin = serde_json::from_str("\"center\"").unwrap();
        assert_eq!(o, Origin::Center);
    }

    #[test]
    fn containment_and_intersection() {
        let outer = BoundingBox::new(0.0, 0.0, 100.0, 100.0);
        assert!(outer.contains(&BoundingBox::new(0.0, 0.0, 100.0, 100.0)));
        assert!(!outer.contains(&BoundingBox::new(50.0, 50.0, 60.0, 10.0)));
        assert!(outer.intersects(&BoundingBox::new(90.0, 90.0, 20.0, 20.0)));
        assert!(!outer.intersects(&BoundingBox::new(100.0, 0.0, 10.0, 10.0)));
        assert_eq!(outer.intersection_area(&BoundingBox::new(90.0, 90.0, 20.0, 20.0)), 100.0);
    }

    #[test]
    fn safe_area_margins() {
        let area = safe_area(CanvasSize::new(1000.0, 500.0), 0.1);
        assert_eq!(area, BoundingBox::new(100.0, 50.0, 800.0, 400.0));
    }

    #[test]
    fn clamp_span_pins_oversized() {
        assert_eq!(clamp_span(-5.0, 10.0, 0.0, 100.0), 0.0);
        assert_eq!(clamp_span(95.0, 10.0, 0.0, 100.0), 90.0);
        assert_eq!(clamp_span(30.0, 10.0, 0.0, 100.0), 30.0);
        assert_eq!(clamp_span(30.0, 150.0, 10.0, 90.0), 10.0);
    }
}
