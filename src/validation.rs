//! Validation System - rules produce violations, scoring produces a report.
//!
//! Every enabled rule in scope is run against the layout graph. A rule that
//! cannot be parsed is logged and skipped; the report is always produced.
//! Only bad input (no elements, no canvas) fails the call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::checks::{self, CheckContext};
use crate::config::ScoringConfig;
use crate::error::{ComplianceError, InputError};
use crate::geometry::CanvasSize;
use crate::layout::LayoutGraph;
use crate::rules::{RuleCatalog, RuleId, Severity};
use crate::vision::VisionSignal;

pub const MAX_SCORE: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    Pass,
    Warning,
    Fail,
}

impl ComplianceStatus {
    pub fn label(self) -> &'static str {
        match self {
            ComplianceStatus::Pass => "pass",
            ComplianceStatus::Warning => "warning",
            ComplianceStatus::Fail => "fail",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSource {
    #[default]
    Layout,
    Vision,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub rule_id: RuleId,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_fix: Option<String>,
    #[serde(default)]
    pub source: ViolationSource,
}

impl Violation {
    pub fn new(rule_id: impl Into<RuleId>, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.into(),
            severity,
            message: message.into(),
            element_id: None,
            suggested_fix: None,
            source: ViolationSource::Layout,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedRule {
    pub rule_id: RuleId,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceReport {
    pub id: Uuid,
    pub status: ComplianceStatus,
    pub score: f64,
    pub violations: Vec<Violation>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub retailer: Option<String>,
    #[serde(default)]
    pub rules_evaluated: usize,
    #[serde(default)]
    pub skipped_rules: Vec<SkippedRule>,
    #[serde(default)]
    pub vision_applied: bool,
}

impl ComplianceReport {
    /// Build a report from violations: sorts them, scores them, derives status.
    pub fn from_violations(mut violations: Vec<Violation>, scoring: &ScoringConfig) -> Self {
        // Stable: equal severities keep catalog order.
        violations.sort_by_key(|v| v.severity);
        Self {
            id: Uuid::new_v4(),
            status: compute_status(&violations),
            score: compute_score(&violations, scoring),
            violations,
            timestamp: Utc::now(),
            retailer: None,
            rules_evaluated: 0,
            skipped_rules: vec![],
            vision_applied: false,
        }
    }

    pub fn has_errors(&self) -> bool {
        self.count(Severity::Error) > 0
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.violations.iter().filter(|v| v.severity == severity).count()
    }

    pub fn violations_with(&self, severity: Severity) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(move |v| v.severity == severity)
    }
}

/// 100 minus the per-severity penalties, clamped to `[0, 100]`.
pub fn compute_score(violations: &[Violation], scoring: &ScoringConfig) -> f64 {
    let penalty: f64 = violations.iter().map(|v| scoring.penalty(v.severity)).sum();
    (MAX_SCORE - penalty).clamp(0.0, MAX_SCORE)
}

pub fn compute_status(violations: &[Violation]) -> ComplianceStatus {
    if violations.iter().any(|v| v.severity == Severity::Error) {
        ComplianceStatus::Fail
    } else if violations.iter().any(|v| v.severity == Severity::Warning) {
        ComplianceStatus::Warning
    } else {
        ComplianceStatus::Pass
    }
}

/// Caller-supplied context for a validation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationMetadata {
    pub retailer: Option<String>,
    /// Overrides the layout's own canvas size.
    pub canvas: Option<CanvasSize>,
    /// Overrides the margin of safe-zone rules.
    pub safe_zone: Option<f64>,
    /// Palette used by color rules that do not carry their own.
    pub brand_colors: Vec<String>,
}

impl ValidationMetadata {
    pub fn for_retailer(retailer: impl Into<String>) -> Self {
        Self {
            retailer: Some(retailer.into()),
            ..Self::default()
        }
    }

    pub fn with_canvas(mut self, width: f64, height: f64) -> Self {
        self.canvas = Some(CanvasSize::new(width, height));
        self
    }
}

/// Validator - evaluates a rule catalog against layout graphs.
pub struct Validator {
    catalog: RuleCatalog,
    scoring: ScoringConfig,
}

impl Validator {
    pub fn new(catalog: RuleCatalog) -> Self {
        Self {
            catalog,
            scoring: ScoringConfig::default(),
        }
    }

    pub fn with_scoring(catalog: RuleCatalog, scoring: ScoringConfig) -> Self {
        Self { catalog, scoring }
    }

    pub fn catalog(&self) -> &RuleCatalog {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut RuleCatalog {
        &mut self.catalog
    }

    pub fn scoring(&self) -> &ScoringConfig {
        &self.scoring
    }

    /// Validate the object graph alone.
    pub fn validate(
        &self,
        graph: &LayoutGraph,
        metadata: &ValidationMetadata,
    ) -> Result<ComplianceReport, ComplianceError> {
        self.evaluate(graph, metadata, None)
    }

    /// Input checks shared by every validation path. Returns the canvas
    /// the rules are evaluated against.
    pub(crate) fn prepare(&self, graph: &LayoutGraph, metadata: &ValidationMetadata) -> Result<CanvasSize, InputError> {
        graph.check()?;
        let canvas = resolve_canvas(graph, metadata)?;
        if let Some(zone) = metadata.safe_zone {
            if !zone.is_finite() || !(0.0..0.5).contains(&zone) {
                return Err(InputError::InvalidMetadata {
                    field: "safeZone",
                    reason: format!("{} is outside [0, 0.5)", zone),
                });
            }
        }
        Ok(canvas)
    }

    pub(crate) fn evaluate(
        &self,
        graph: &LayoutGraph,
        metadata: &ValidationMetadata,
        vision: Option<&VisionSignal>,
    ) -> Result<ComplianceReport, ComplianceError> {
        let canvas = self.prepare(graph, metadata)?;
        let ctx = CheckContext::new(graph, canvas, metadata, vision);

        let rules = self.catalog.rules_for(metadata.retailer.as_deref());
        let mut violations = vec![];
        let mut skipped = vec![];
        let mut evaluated = 0;

        for rule in rules {
            let predicate = match rule.predicate() {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(rule_id = %rule.id, error = %e, "skipping rule");
                    skipped.push(SkippedRule {
                        rule_id: rule.id.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            evaluated += 1;
            let findings = checks::run(&predicate, &ctx);
            tracing::debug!(rule_id = %rule.id, findings = findings.len(), "rule evaluated");
            violations.extend(findings.into_iter().map(|f| Violation {
                rule_id: rule.id.clone(),
                severity: rule.severity,
                message: f.message,
                element_id: f.element_id,
                suggested_fix: f.suggested_fix,
                source: ViolationSource::Layout,
            }));
        }

        if let Some(signal) = vision {
            violations.extend(signal.violations());
        }

        let mut report = ComplianceReport::from_violations(violations, &self.scoring);
        report.retailer = metadata.retailer.clone();
        report.rules_evaluated = evaluated;
        report.skipped_rules = skipped;
        report.vision_applied = vision.is_some_and(|v| v.applied);

        tracing::debug!(
            status = report.status.label(),
            score = report.score,
            violations = report.violations.len(),
            "validation complete"
        );
        Ok(report)
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(RuleCatalog::builtin())
    }
}

fn resolve_canvas(graph: &LayoutGraph, metadata: &ValidationMetadata) -> Result<CanvasSize, InputError> {
    let canvas = metadata.canvas.or(graph.canvas).ok_or(InputError::MissingCanvas)?;
    if !canvas.is_valid() {
        return Err(InputError::InvalidCanvas {
            width: canvas.width,
            height: canvas.height,
        });
    }
    Ok(canvas)
}
