//! Smart Resize - retarget a layout to a new canvas.
//!
//! Elements keep their relative center position and are scaled uniformly by
//! the contain factor, so composition survives aspect-ratio changes. The
//! background is scaled by the cover factor and re-centered so the new
//! canvas has no gaps. Elements are then clamped into the format safe area;
//! an element larger than the safe area is pinned to its top-left corner.

use crate::error::{ComplianceError, InputError};
use crate::formats::FormatDescriptor;
use crate::geometry::{clamp_span, safe_area, CanvasSize, Origin};
use crate::layout::{Element, LayoutGraph};

/// Scale factors between a source canvas and a target format.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalePlan {
    pub scale_x: f64,
    pub scale_y: f64,
    /// Fills the target, may crop. Background only.
    pub cover: f64,
    /// Fits the target, may leave gaps. Every other element.
    pub contain: f64,
}

impl ScalePlan {
    pub fn new(source: CanvasSize, target: CanvasSize) -> Self {
        let scale_x = target.width / source.width;
        let scale_y = target.height / source.height;
        Self {
            scale_x,
            scale_y,
            cover: scale_x.max(scale_y),
            contain: scale_x.min(scale_y),
        }
    }
}

/// Retarget `graph` from `source_width`x`source_height` to `format`.
///
/// Returns a new graph whose canvas is the format size. The input is
/// borrowed immutably and never changed.
pub fn resize(
    graph: &LayoutGraph,
    source_width: f64,
    source_height: f64,
    format: &FormatDescriptor,
) -> Result<LayoutGraph, ComplianceError> {
    graph.check()?;
    format.validate()?;
    let source = CanvasSize::new(source_width, source_height);
    if !source.is_valid() {
        return Err(InputError::InvalidCanvas {
            width: source_width,
            height: source_height,
        }
        .into());
    }

    let target = format.canvas();
    let plan = ScalePlan::new(source, target);
    tracing::debug!(
        format = %format.id,
        cover = plan.cover,
        contain = plan.contain,
        "resizing layout"
    );

    let mut out = graph.clone();
    out.canvas = Some(target);
    out.background = graph.background.as_ref().map(|bg| fit_background(bg, target, &plan));
    out.elements = graph
        .elements
        .iter()
        .map(|e| {
            let moved = reposition(e, source, target, &plan);
            clamp_to_safe_area(&moved, target, format.safe_zone)
        })
        .collect();
    Ok(out)
}

fn fit_background(background: &Element, target: CanvasSize, plan: &ScalePlan) -> Element {
    let mut bg = background.clone();
    bg.scale_x *= plan.cover;
    bg.scale_y *= plan.cover;
    bg.origin_x = Origin::Center;
    bg.origin_y = Origin::Center;
    bg.left = target.width / 2.0;
    bg.top = target.height / 2.0;
    bg
}

/// Map the element's relative center onto the target, then scale it.
fn reposition(element: &Element, source: CanvasSize, target: CanvasSize, plan: &ScalePlan) -> Element {
    let (cx, cy) = element.center();
    let rel_x = cx / source.width;
    let rel_y = cy / source.height;

    let mut out = element.clone();
    out.scale_x *= plan.contain;
    out.scale_y *= plan.contain;

    let new_cx = rel_x * target.width;
    let new_cy = rel_y * target.height;
    out.left = new_cx - out.origin_x.center_offset(out.effective_width());
    out.top = new_cy - out.origin_y.center_offset(out.effective_height());
    out
}

fn clamp_to_safe_area(element: &Element, target: CanvasSize, safe_zone: f64) -> Element {
    let safe = safe_area(target, safe_zone);
    let bbox = element.bounding_box();
    let left = clamp_span(bbox.left, bbox.width, safe.left, safe.right());
    let top = clamp_span(bbox.top, bbox.height, safe.top, safe.bottom());

    let mut out = element.clone();
    // Shift the reference point by however far the box moved.
    out.left += left - bbox.left;
    out.top += top - bbox.top;
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(width: u32, height: u32, safe_zone: f64) -> FormatDescriptor {
        FormatDescriptor::new("target", "Target", "test", width, height, safe_zone)
    }

    #[test]
    fn scale_plan_cover_and_contain() {
        let plan = ScalePlan::new(CanvasSize::new(1000.0, 1000.0), CanvasSize::new(2000.0, 500.0));
        assert_eq!(plan.cover, 2.0);
        assert_eq!(plan.contain, 0.5);
    }

    #[test]
    fn start_origin_keeps_relative_center() {
        // Center at (250, 250) in a 1000x1000 source.
        let graph = LayoutGraph::new(vec![Element::rect("r", 200.0, 200.0, 100.0, 100.0)]);
        let out = resize(&graph, 1000.0, 1000.0, &format(2000, 1000, 0.0)).unwrap();
        let r = &out.elements[0];
        assert_eq!(r.scale_x, 1.0);
        assert_eq!(r.center(), (500.0, 250.0));
        assert_eq!((r.left, r.top), (450.0, 200.0));
    }

    #[test]
    fn background_covers_and_recenters() {
        let bg = Element::image("bg", "photo.jpg", 0.0, 0.0, 1080.0, 1080.0);
        let graph = LayoutGraph::new(vec![Element::rect("r", 10.0, 10.0, 10.0, 10.0)]).with_background(bg);
        let out = resize(&graph, 1080.0, 1080.0, &format(1920, 1080, 0.1)).unwrap();
        let bg = out.background.as_ref().unwrap();
        assert_eq!(bg.origin_x, Origin::Center);
        assert_eq!((bg.left, bg.top), (960.0, 540.0));
        assert!(bg.effective_width() >= 1920.0 - 1e-9);
        assert!(bg.effective_height() >= 1080.0 - 1e-9);
    }

    #[test]
    fn clamps_into_safe_area() {
        let graph = LayoutGraph::new(vec![Element::rect("corner", 0.0, 0.0, 100.0, 100.0)]);
        let out = resize(&graph, 1000.0, 1000.0, &format(1000, 1000, 0.1)).unwrap();
        let bbox = out.elements[0].bounding_box();
        assert_eq!((bbox.left, bbox.top), (100.0, 100.0));
    }

    #[test]
    fn oversized_element_pins_to_safe_origin() {
        let big = Element::rect("big", 500.0, 500.0, 1000.0, 1000.0).with_origin(Origin::Center);
        let graph = LayoutGraph::new(vec![big]);
        let out = resize(&graph, 1000.0, 1000.0, &format(1000, 1000, 0.1)).unwrap();
        let e = &out.elements[0];
        let bbox = e.bounding_box();
        assert_eq!((bbox.left, bbox.top), (100.0, 100.0));
        // Reference point stays the center.
        assert_eq!((e.left, e.top), (600.0, 600.0));
    }

    #[test]
    fn rejects_bad_input() {
        let graph = LayoutGraph::new(vec![Element::rect("r", 0.0, 0.0, 1.0, 1.0)]);
        assert!(matches!(
            resize(&graph, 0.0, 100.0, &format(10, 10, 0.0)),
            Err(ComplianceError::Input(InputError::InvalidCanvas { .. }))
        ));
        assert!(matches!(
            resize(&graph, 100.0, 100.0, &format(0, 10, 0.0)),
            Err(ComplianceError::Input(InputError::InvalidFormat { .. }))
        ));
        assert!(matches!(
            resize(&LayoutGraph::new(vec![]), 100.0, 100.0, &format(10, 10, 0.0)),
            Err(ComplianceError::Input(InputError::EmptyLayout))
        ));
    }
}
