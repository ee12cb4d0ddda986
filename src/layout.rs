//! Layout Graph - the creative's element tree as an immutable value.
//!
//! Transformations (resize, brand kit) take `&LayoutGraph` and return a new
//! graph. Nothing in the crate mutates a caller's graph.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::color::{nearest_color, parse_hex, Rgb};
use crate::error::InputError;
use crate::geometry::{BoundingBox, CanvasSize, Origin};

pub type ElementId = String;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutGraph {
    pub elements: Vec<Element>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<Element>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canvas: Option<CanvasSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub id: ElementId,
    #[serde(flatten)]
    pub kind: ElementKind,
    #[serde(default)]
    pub left: f64,
    #[serde(default)]
    pub top: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default = "default_scale")]
    pub scale_x: f64,
    #[serde(default = "default_scale")]
    pub scale_y: f64,
    #[serde(default)]
    pub origin_x: Origin,
    #[serde(default)]
    pub origin_y: Origin,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

fn default_scale() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ElementKind {
    #[serde(alias = "rectangle")]
    Rect,
    Image {
        #[serde(default)]
        src: String,
    },
    #[serde(alias = "textbox", alias = "i-text")]
    Text {
        text: String,
        #[serde(default, rename = "fontFamily", skip_serializing_if = "Option::is_none")]
        font_family: Option<String>,
        #[serde(default, rename = "fontSize", skip_serializing_if = "Option::is_none")]
        font_size: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        role: Option<String>,
    },
    Group {
        #[serde(default)]
        children: Vec<Element>,
    },
}

impl Element {
    fn with_kind(id: impl Into<ElementId>, kind: ElementKind, left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            id: id.into(),
            kind,
            left,
            top,
            width,
            height,
            scale_x: 1.0,
            scale_y: 1.0,
            origin_x: Origin::Start,
            origin_y: Origin::Start,
            fill: None,
            stroke: None,
            tags: vec![],
        }
    }

    pub fn rect(id: impl Into<ElementId>, left: f64, top: f64, width: f64, height: f64) -> Self {
        Self::with_kind(id, ElementKind::Rect, left, top, width, height)
    }

    pub fn image(id: impl Into<ElementId>, src: impl Into<String>, left: f64, top: f64, width: f64, height: f64) -> Self {
        Self::with_kind(id, ElementKind::Image { src: src.into() }, left, top, width, height)
    }

    pub fn text(id: impl Into<ElementId>, text: impl Into<String>, left: f64, top: f64, width: f64, height: f64) -> Self {
        let kind = ElementKind::Text {
            text: text.into(),
            font_family: None,
            font_size: None,
            role: None,
        };
        Self::with_kind(id, kind, left, top, width, height)
    }

    pub fn group(id: impl Into<ElementId>, children: Vec<Element>, left: f64, top: f64, width: f64, height: f64) -> Self {
        Self::with_kind(id, ElementKind::Group { children }, left, top, width, height)
    }

    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin_x = origin;
        self.origin_y = origin;
        self
    }

    pub fn with_scale(mut self, scale_x: f64, scale_y: f64) -> Self {
        self.scale_x = scale_x;
        self.scale_y = scale_y;
        self
    }

    pub fn with_fill(mut self, fill: impl Into<String>) -> Self {
        self.fill = Some(fill.into());
        self
    }

    pub fn with_stroke(mut self, stroke: impl Into<String>) -> Self {
        self.stroke = Some(stroke.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Sets the text role. No effect on non-text elements.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        if let ElementKind::Text { role: r, .. } = &mut self.kind {
            *r = Some(role.into());
        }
        self
    }

    pub fn effective_width(&self) -> f64 {
        self.width * self.scale_x
    }

    pub fn effective_height(&self) -> f64 {
        self.height * self.scale_y
    }

    pub fn bounding_box(&self) -> BoundingBox {
        let w = self.effective_width();
        let h = self.effective_height();
        BoundingBox::new(
            self.left + self.origin_x.start_offset(w),
            self.top + self.origin_y.start_offset(h),
            w,
            h,
        )
    }

    pub fn center(&self) -> (f64, f64) {
        (
            self.left + self.origin_x.center_offset(self.effective_width()),
            self.top + self.origin_y.center_offset(self.effective_height()),
        )
    }

    pub fn text_content(&self) -> Option<&str> {
        match &self.kind {
            ElementKind::Text { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn text_role(&self) -> Option<&str> {
        match &self.kind {
            ElementKind::Text { role, .. } => role.as_deref(),
            _ => None,
        }
    }

    pub fn children(&self) -> &[Element] {
        match &self.kind {
            ElementKind::Group { children } => children,
            _ => &[],
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    /// Tagged `logo`, or an image whose id or source mentions "logo".
    pub fn is_logo(&self) -> bool {
        if self.has_tag("logo") {
            return true;
        }
        match &self.kind {
            ElementKind::Image { src } => {
                self.id.to_ascii_lowercase().contains("logo") || src.to_ascii_lowercase().contains("logo")
            }
            _ => false,
        }
    }

    /// This element followed by its descendants, depth first.
    pub fn walk(&self) -> Vec<&Element> {
        let mut out = vec![self];
        for child in self.children() {
            out.extend(child.walk());
        }
        out
    }

    /// Like [`walk`](Self::walk), but every element is a copy in canvas
    /// coordinates. Group children are positioned relative to the group's
    /// top-left corner in the group's unscaled units, so the group's scale
    /// multiplies into theirs. Placed groups carry no children.
    pub fn walk_placed(&self) -> Vec<Element> {
        let mut out = vec![];
        self.place_into((0.0, 0.0), (1.0, 1.0), &mut out);
        out
    }

    fn place_into(&self, offset: (f64, f64), scale: (f64, f64), out: &mut Vec<Element>) {
        let mut placed = self.clone();
        if let ElementKind::Group { children } = &mut placed.kind {
            children.clear();
        }
        placed.left = offset.0 + self.left * scale.0;
        placed.top = offset.1 + self.top * scale.1;
        placed.scale_x *= scale.0;
        placed.scale_y *= scale.1;

        let bbox = placed.bounding_box();
        let inner = (placed.scale_x, placed.scale_y);
        out.push(placed);
        for child in self.children() {
            child.place_into((bbox.left, bbox.top), inner, out);
        }
    }

    fn check(&self) -> Result<(), InputError> {
        let invalid = |reason: &str| InputError::InvalidElement {
            element_id: self.id.clone(),
            reason: reason.to_string(),
        };
        if self.id.trim().is_empty() {
            return Err(invalid("element id must not be empty"));
        }
        if ![self.left, self.top, self.width, self.height, self.scale_x, self.scale_y]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(invalid("geometry must be finite"));
        }
        if self.width < 0.0 || self.height < 0.0 {
            return Err(invalid("width and height must not be negative"));
        }
        if self.scale_x <= 0.0 || self.scale_y <= 0.0 {
            return Err(invalid("scale factors must be positive"));
        }
        Ok(())
    }
}

impl LayoutGraph {
    pub fn new(elements: Vec<Element>) -> Self {
        Self {
            elements,
            background: None,
            canvas: None,
            background_color: None,
        }
    }

    pub fn with_canvas(mut self, width: f64, height: f64) -> Self {
        self.canvas = Some(CanvasSize::new(width, height));
        self
    }

    pub fn with_background(mut self, background: Element) -> Self {
        self.background = Some(background);
        self
    }

    pub fn with_background_color(mut self, color: impl Into<String>) -> Self {
        self.background_color = Some(color.into());
        self
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Every element including group descendants, in document order.
    /// The background is not included.
    pub fn all_elements(&self) -> Vec<&Element> {
        self.elements.iter().flat_map(Element::walk).collect()
    }

    /// [`all_elements`](Self::all_elements) in canvas coordinates.
    pub fn placed_elements(&self) -> Vec<Element> {
        self.elements.iter().flat_map(Element::walk_placed).collect()
    }

    pub fn find(&self, id: &str) -> Option<&Element> {
        self.all_elements().into_iter().find(|e| e.id == id)
    }

    /// Structural checks run before validation or resize.
    pub fn check(&self) -> Result<(), InputError> {
        if self.elements.is_empty() {
            return Err(InputError::EmptyLayout);
        }
        if let Some(canvas) = self.canvas {
            if !canvas.is_valid() {
                return Err(InputError::InvalidCanvas {
                    width: canvas.width,
                    height: canvas.height,
                });
            }
        }

        let mut seen = HashSet::new();
        let background = self.background.iter().flat_map(Element::walk);
        for element in self.all_elements().into_iter().chain(background) {
            element.check()?;
            if !seen.insert(element.id.as_str()) {
                return Err(InputError::DuplicateElement(element.id.clone()));
            }
        }
        Ok(())
    }
}

/// Brand assets applied to a layout in one pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandKit {
    #[serde(default)]
    pub palette: Vec<String>,
    #[serde(default)]
    pub font_family: Option<String>,
    #[serde(default)]
    pub logo_src: Option<String>,
}

impl BrandKit {
    /// Returns a new graph with brand fonts, palette-snapped fills and
    /// strokes, and the brand logo source on logo images.
    pub fn apply(&self, graph: &LayoutGraph) -> LayoutGraph {
        let palette: Vec<Rgb> = self.palette.iter().filter_map(|c| parse_hex(c)).collect();
        let mut out = graph.clone();
        for element in &mut out.elements {
            self.apply_element(element, &palette);
        }
        out
    }

    fn apply_element(&self, element: &mut Element, palette: &[Rgb]) {
        element.fill = element.fill.take().map(|c| snap(&c, palette));
        element.stroke = element.stroke.take().map(|c| snap(&c, palette));

        let is_logo = element.is_logo();
        match &mut element.kind {
            ElementKind::Text { font_family, .. } => {
                if let Some(font) = &self.font_family {
                    *font_family = Some(font.clone());
                }
            }
            ElementKind::Image { src } if is_logo => {
                if let Some(logo) = &self.logo_src {
                    *src = logo.clone();
                }
            }
            ElementKind::Group { children } => {
                for child in children {
                    self.apply_element(child, palette);
                }
            }
            _ => {}
        }
    }
}

fn snap(color: &str, palette: &[Rgb]) -> String {
    match parse_hex(color) {
        Some(rgb) => match nearest_color(rgb, palette) {
            Some((idx, _)) => palette[idx].to_hex(),
            None => color.to_string(),
        },
        None => color.to_string(),
    }
}
