//! Predicate evaluation against a layout graph.
//!
//! Each check returns findings; the validator attaches the rule's id and
//! severity to turn them into violations.

use crate::color::{contrast_ratio, nearest_color, parse_hex, suggest_text_color, Rgb, WHITE};
use crate::geometry::{safe_area, BoundingBox, CanvasSize};
use crate::layout::{Element, LayoutGraph};
use crate::rules::{
    BrandColorParams, ContrastParams, DisclaimerParams, ElementCountParams, LogoSizeParams, Predicate,
    SafeZoneParams, TextDensityParams,
};
use crate::validation::ValidationMetadata;
use crate::vision::VisionSignal;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Finding {
    pub message: String,
    pub element_id: Option<String>,
    pub suggested_fix: Option<String>,
}

impl Finding {
    fn on(element: &Element, message: String, fix: String) -> Self {
        Self {
            message,
            element_id: Some(element.id.clone()),
            suggested_fix: Some(fix),
        }
    }

    fn creative(message: String, fix: String) -> Self {
        Self {
            message,
            element_id: None,
            suggested_fix: Some(fix),
        }
    }
}

pub(crate) struct CheckContext<'a> {
    pub graph: &'a LayoutGraph,
    pub canvas: CanvasSize,
    pub metadata: &'a ValidationMetadata,
    pub vision: Option<&'a VisionSignal>,
    /// Every element in canvas coordinates, group transforms applied.
    pub placed: Vec<Element>,
}

impl<'a> CheckContext<'a> {
    pub fn new(
        graph: &'a LayoutGraph,
        canvas: CanvasSize,
        metadata: &'a ValidationMetadata,
        vision: Option<&'a VisionSignal>,
    ) -> Self {
        Self {
            graph,
            canvas,
            metadata,
            vision,
            placed: graph.placed_elements(),
        }
    }
}

pub(crate) fn run(predicate: &Predicate, ctx: &CheckContext<'_>) -> Vec<Finding> {
    match predicate {
        Predicate::MinLogoSize(p) => logo_size(p, ctx),
        Predicate::MaxTextDensity(p) => text_density(p, ctx),
        Predicate::BrandColorMembership(p) => brand_colors(p, ctx),
        Predicate::SafeZoneContainment(p) => safe_zone(p, ctx),
        Predicate::RequiredDisclaimer(p) => disclaimer(p, ctx),
        Predicate::MinContrast(p) => contrast(p, ctx),
        Predicate::MaxElementCount(p) => element_count(p, ctx),
    }
}

fn px(v: f64) -> String {
    format!("{:.0}", v)
}

fn logo_size(p: &LogoSizeParams, ctx: &CheckContext<'_>) -> Vec<Finding> {
    let minimum = format!("{}x{}px", px(p.min_width), px(p.min_height));
    let logos: Vec<&Element> = ctx.placed.iter().filter(|e| e.is_logo()).collect();

    if logos.is_empty() {
        // A logo baked into the background is only visible to vision analysis.
        let detected = ctx.vision.and_then(|v| v.logo.as_ref()).filter(|d| d.present);
        if let Some(detection) = detected {
            return match detection.bounding_box {
                Some(bbox) if bbox.width < p.min_width || bbox.height < p.min_height => vec![Finding::creative(
                    format!(
                        "Logo detected in rendered image is {}x{}px, below the {} minimum",
                        px(bbox.width),
                        px(bbox.height),
                        minimum
                    ),
                    format!("Enlarge the logo to at least {}", minimum),
                )],
                _ => vec![],
            };
        }
        if p.required {
            return vec![Finding::creative(
                "No logo found in the creative".to_string(),
                format!("Add the logo at a size of at least {}", minimum),
            )];
        }
        return vec![];
    }

    logos
        .into_iter()
        .filter(|e| e.effective_width() < p.min_width || e.effective_height() < p.min_height)
        .map(|e| {
            Finding::on(
                e,
                format!(
                    "Logo {} is {}x{}px, below the {} minimum",
                    e.id,
                    px(e.effective_width()),
                    px(e.effective_height()),
                    minimum
                ),
                format!("Scale the logo up to at least {}", minimum),
            )
        })
        .collect()
}

fn text_elements(elements: &[Element]) -> impl Iterator<Item = (&Element, &str)> {
    elements.iter().filter_map(|e| e.text_content().map(|t| (e, t)))
}

fn text_density(p: &TextDensityParams, ctx: &CheckContext<'_>) -> Vec<Finding> {
    let mut findings = vec![];
    for (element, text) in text_elements(&ctx.placed) {
        let limit = p.limit_for(element.text_role());
        let count = text.trim().chars().count();
        if count > limit {
            let role = element.text_role().unwrap_or("text");
            findings.push(Finding::on(
                element,
                format!("{} {} has {} characters, limit is {}", role, element.id, count, limit),
                format!("Shorten the copy by {} characters", count - limit),
            ));
        }
    }

    if let Some(max_coverage) = p.max_coverage {
        let canvas = ctx.canvas.bounds();
        let covered: f64 = text_elements(&ctx.placed)
            .map(|(e, _)| canvas.intersection_area(&e.bounding_box()))
            .sum();
        let coverage = covered / ctx.canvas.area();
        if coverage > max_coverage {
            findings.push(Finding::creative(
                format!(
                    "Text covers {:.0}% of the canvas, limit is {:.0}%",
                    coverage * 100.0,
                    max_coverage * 100.0
                ),
                "Reduce the number or size of text blocks".to_string(),
            ));
        }
    }
    findings
}

fn brand_colors(p: &BrandColorParams, ctx: &CheckContext<'_>) -> Vec<Finding> {
    let source = if p.palette.is_empty() {
        &ctx.metadata.brand_colors
    } else {
        &p.palette
    };
    let palette: Vec<Rgb> = source.iter().filter_map(|c| parse_hex(c)).collect();
    if palette.is_empty() {
        tracing::debug!("no approved palette, skipping color check");
        return vec![];
    }

    let background = ctx.graph.background.iter().flat_map(Element::walk);
    let mut findings = vec![];
    for element in ctx.graph.all_elements().into_iter().chain(background) {
        for (property, value) in [("fill", &element.fill), ("stroke", &element.stroke)] {
            let Some(value) = value else { continue };
            let Some(rgb) = parse_hex(value) else { continue };
            let Some((idx, distance)) = nearest_color(rgb, &palette) else { continue };
            if distance > p.tolerance {
                let nearest = palette[idx].to_hex();
                findings.push(Finding::on(
                    element,
                    format!(
                        "{} {} {} is not an approved color (nearest {} at distance {:.1})",
                        element.id,
                        property,
                        rgb.to_hex(),
                        nearest,
                        distance
                    ),
                    format!("Change {} to {}", property, nearest),
                ));
            }
        }
    }
    findings
}

fn safe_zone(p: &SafeZoneParams, ctx: &CheckContext<'_>) -> Vec<Finding> {
    let margin = ctx.metadata.safe_zone.or(p.margin).unwrap_or(0.0);
    let canvas = ctx.canvas.bounds();
    let safe = safe_area(ctx.canvas, margin);

    ctx.graph
        .elements
        .iter()
        .filter_map(|element| {
            let bbox = element.bounding_box();
            let fix = format!("Move {} inside {}", element.id, describe(&safe));
            if !canvas.contains(&bbox) {
                Some(Finding::on(
                    element,
                    format!("{} extends outside the canvas at {}", element.id, describe(&bbox)),
                    fix,
                ))
            } else if !safe.contains(&bbox) {
                Some(Finding::on(
                    element,
                    format!(
                        "{} intrudes into the {:.0}% safe zone at {}",
                        element.id,
                        margin * 100.0,
                        describe(&bbox)
                    ),
                    fix,
                ))
            } else {
                None
            }
        })
        .collect()
}

fn describe(b: &BoundingBox) -> String {
    format!("[{}, {}]-[{}, {}]", px(b.left), px(b.top), px(b.right()), px(b.bottom()))
}

fn normalize(text: &str, case_sensitive: bool) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if case_sensitive {
        collapsed
    } else {
        collapsed.to_lowercase()
    }
}

fn disclaimer(p: &DisclaimerParams, ctx: &CheckContext<'_>) -> Vec<Finding> {
    let all_text = text_elements(&ctx.placed).map(|(_, t)| t).collect::<Vec<_>>().join("\n");
    let haystack = normalize(&all_text, p.case_sensitive);

    let missing: Vec<&str> = p
        .phrases
        .iter()
        .filter(|phrase| !haystack.contains(&normalize(phrase, p.case_sensitive)))
        .map(String::as_str)
        .collect();

    if missing.is_empty() {
        return vec![];
    }
    let quoted = missing.iter().map(|m| format!("\"{}\"", m)).collect::<Vec<_>>().join(", ");
    vec![Finding::creative(
        format!("Required disclaimer missing: {}", quoted),
        format!("Add a text element containing {}", quoted),
    )]
}

fn contrast(p: &ContrastParams, ctx: &CheckContext<'_>) -> Vec<Finding> {
    let background = match ctx.graph.background_color.as_deref().and_then(parse_hex) {
        Some(color) => color,
        // Image backgrounds have no single color; vision covers those.
        None if ctx.graph.background.is_some() => return vec![],
        None => WHITE,
    };

    text_elements(&ctx.placed)
        .filter_map(|(element, _)| {
            let fill = element.fill.as_deref().and_then(parse_hex)?;
            let ratio = contrast_ratio(fill, background);
            (ratio < p.min_ratio).then(|| {
                Finding::on(
                    element,
                    format!(
                        "{} contrast is {:.2}:1 against {}, minimum is {:.1}:1",
                        element.id,
                        ratio,
                        background.to_hex(),
                        p.min_ratio
                    ),
                    format!("Use {} text", suggest_text_color(background).to_hex()),
                )
            })
        })
        .collect()
}

fn element_count(p: &ElementCountParams, ctx: &CheckContext<'_>) -> Vec<Finding> {
    let count = ctx.graph.all_elements().len();
    if count > p.max {
        vec![Finding::creative(
            format!("Creative has {} elements, limit is {}", count, p.max),
            format!("Remove or merge {} elements", count - p.max),
        )]
    } else {
        vec![]
    }
}
