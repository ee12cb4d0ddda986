//! Vision-enhanced validation.
//!
//! An external image-analysis service looks at the rendered creative and
//! reports what the object graph cannot show, such as a logo baked into the
//! background photo. The signal is supplementary: any failed sub-analysis
//! is logged and dropped, and validation carries on with what is left.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{CollaboratorError, ComplianceError, InputError};
use crate::geometry::BoundingBox;
use crate::layout::LayoutGraph;
use crate::rules::{Predicate, Severity};
use crate::validation::{ComplianceReport, ValidationMetadata, Validator, Violation, ViolationSource};

pub const VISION_TEXT_RULE: &str = "vision.text";
pub const VISION_COLOR_RULE: &str = "vision.color";
pub const VISION_LAYOUT_RULE: &str = "vision.layout";

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoDetection {
    pub present: bool,
    #[serde(default)]
    pub bounding_box: Option<BoundingBox>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisionFinding {
    pub severity: Severity,
    pub message: String,
    #[serde(default)]
    pub suggested_fix: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisionFindings {
    #[serde(default)]
    pub violations: Vec<VisionFinding>,
}

/// Image-analysis collaborator.
#[async_trait]
pub trait VisionAnalyzer: Send + Sync {
    async fn detect_logo(&self, image_url: &str) -> Result<LogoDetection, CollaboratorError>;

    async fn analyze_text_compliance(&self, image_url: &str) -> Result<VisionFindings, CollaboratorError>;

    async fn analyze_color_compliance(
        &self,
        image_url: &str,
        brand_colors: &[String],
    ) -> Result<VisionFindings, CollaboratorError>;

    async fn analyze_layout_compliance(
        &self,
        image_url: &str,
        safe_zone_margin: f64,
    ) -> Result<VisionFindings, CollaboratorError>;
}

/// Everything the vision service reported for one image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisionSignal {
    pub logo: Option<LogoDetection>,
    pub text: Vec<VisionFinding>,
    pub color: Vec<VisionFinding>,
    pub layout: Vec<VisionFinding>,
    /// True when at least one sub-analysis succeeded.
    pub applied: bool,
}

impl VisionSignal {
    /// Run the four sub-analyses concurrently.
    pub async fn collect(
        analyzer: &dyn VisionAnalyzer,
        image_url: &str,
        brand_colors: &[String],
        safe_zone_margin: f64,
    ) -> Self {
        let (logo, text, color, layout) = futures::join!(
            analyzer.detect_logo(image_url),
            analyzer.analyze_text_compliance(image_url),
            analyzer.analyze_color_compliance(image_url, brand_colors),
            analyzer.analyze_layout_compliance(image_url, safe_zone_margin),
        );

        let mut signal = VisionSignal::default();
        signal.logo = accept("logo", logo, &mut signal.applied);
        signal.text = accept("text", text, &mut signal.applied).map(|f| f.violations).unwrap_or_default();
        signal.color = accept("color", color, &mut signal.applied).map(|f| f.violations).unwrap_or_default();
        signal.layout = accept("layout", layout, &mut signal.applied).map(|f| f.violations).unwrap_or_default();
        signal
    }

    pub fn violations(&self) -> Vec<Violation> {
        let groups = [
            (VISION_TEXT_RULE, &self.text),
            (VISION_COLOR_RULE, &self.color),
            (VISION_LAYOUT_RULE, &self.layout),
        ];
        groups
            .into_iter()
            .flat_map(|(rule_id, findings)| {
                findings.iter().map(move |f| Violation {
                    rule_id: rule_id.to_string(),
                    severity: f.severity,
                    message: f.message.clone(),
                    element_id: None,
                    suggested_fix: f.suggested_fix.clone(),
                    source: ViolationSource::Vision,
                })
            })
            .collect()
    }
}

fn accept<T>(analysis: &str, result: Result<T, CollaboratorError>, applied: &mut bool) -> Option<T> {
    match result {
        Ok(value) => {
            *applied = true;
            Some(value)
        }
        Err(e) => {
            tracing::warn!(analysis, error = %e, "vision analysis failed, continuing without it");
            None
        }
    }
}

impl Validator {
    /// Validate the object graph, adding signals from the rendered image.
    ///
    /// Every input error, including canvas and safe-zone problems, is
    /// reported before the vision service is called. Vision failures never
    /// fail the call.
    pub async fn validate_with_vision(
        &self,
        graph: &LayoutGraph,
        image_url: &str,
        metadata: &ValidationMetadata,
        analyzer: &dyn VisionAnalyzer,
    ) -> Result<ComplianceReport, ComplianceError> {
        self.prepare(graph, metadata)?;
        if image_url.trim().is_empty() {
            return Err(InputError::InvalidMetadata {
                field: "imageUrl",
                reason: "must not be empty".into(),
            }
            .into());
        }

        let brand_colors = self.brand_colors_for(metadata);
        let margin = self.safe_zone_for(metadata);
        let signal = VisionSignal::collect(analyzer, image_url, &brand_colors, margin).await;
        if !signal.applied {
            tracing::warn!(image_url, "vision unavailable, using object graph only");
        }
        self.evaluate(graph, metadata, Some(&signal))
    }

    /// Metadata brand colors, else the palettes of in-scope color rules.
    fn brand_colors_for(&self, metadata: &ValidationMetadata) -> Vec<String> {
        if !metadata.brand_colors.is_empty() {
            return metadata.brand_colors.clone();
        }
        let mut colors: Vec<String> = vec![];
        for rule in self.catalog().rules_for(metadata.retailer.as_deref()) {
            if let Ok(Predicate::BrandColorMembership(p)) = rule.predicate() {
                for color in p.palette {
                    if !colors.contains(&color) {
                        colors.push(color);
                    }
                }
            }
        }
        colors
    }

    /// Metadata safe zone, else the largest in-scope safe-zone margin.
    fn safe_zone_for(&self, metadata: &ValidationMetadata) -> f64 {
        if let Some(zone) = metadata.safe_zone {
            return zone;
        }
        self.catalog()
            .rules_for(metadata.retailer.as_deref())
            .into_iter()
            .filter_map(|rule| match rule.predicate() {
                Ok(Predicate::SafeZoneContainment(p)) => p.margin,
                _ => None,
            })
            .fold(0.0, f64::max)
    }
}
