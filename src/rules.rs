//! Rule Definitions - the retailer compliance catalog.
//!
//! Rules are stored with a raw validator descriptor (`type` + `params`) and
//! parsed into a [`Predicate`] when evaluated, so one malformed rule can be
//! skipped without rejecting the catalog.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::RuleError;

pub type RuleId = String;

/// Scope name whose rules apply to every retailer.
pub const GENERAL_SCOPE: &str = "general";

pub const CATALOG_VERSION: &str = "1.2.0";

/// Declaration order is severity order: errors sort first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleCategory {
    Logo,
    Text,
    Color,
    Layout,
    Disclaimer,
    General,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorDescriptor {
    #[serde(rename = "type")]
    pub predicate_type: String,
    #[serde(default)]
    pub params: Value,
}

impl ValidatorDescriptor {
    pub fn new(predicate_type: impl Into<String>, params: Value) -> Self {
        Self {
            predicate_type: predicate_type.into(),
            params,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceRule {
    pub id: RuleId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: RuleCategory,
    pub severity: Severity,
    #[serde(default = "default_scope")]
    pub retailer: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub validator: ValidatorDescriptor,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_scope() -> String {
    GENERAL_SCOPE.to_string()
}

fn default_version() -> String {
    "1.0.0".to_string()
}

fn default_true() -> bool {
    true
}

impl ComplianceRule {
    pub fn new(
        id: impl Into<RuleId>,
        name: impl Into<String>,
        category: RuleCategory,
        severity: Severity,
        retailer: impl Into<String>,
        validator: ValidatorDescriptor,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            category,
            severity,
            retailer: retailer.into(),
            version: default_version(),
            enabled: true,
            validator,
            tags: vec![],
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn applies_to(&self, retailer: Option<&str>) -> bool {
        self.retailer.eq_ignore_ascii_case(GENERAL_SCOPE)
            || retailer.is_some_and(|r| self.retailer.eq_ignore_ascii_case(r))
    }

    pub fn predicate(&self) -> Result<Predicate, RuleError> {
        Predicate::from_descriptor(&self.id, &self.validator)
    }
}

// --- Predicates ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoSizeParams {
    pub min_width: f64,
    pub min_height: f64,
    #[serde(default = "default_true")]
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextDensityParams {
    pub default_max_chars: usize,
    #[serde(default)]
    pub role_limits: BTreeMap<String, usize>,
    /// Maximum fraction of the canvas covered by text boxes.
    #[serde(default)]
    pub max_coverage: Option<f64>,
}

impl TextDensityParams {
    pub fn limit_for(&self, role: Option<&str>) -> usize {
        role.and_then(|r| self.role_limits.get(&r.to_ascii_lowercase()))
            .copied()
            .unwrap_or(self.default_max_chars)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandColorParams {
    #[serde(default)]
    pub palette: Vec<String>,
    /// Euclidean RGB distance accepted as a match.
    #[serde(default)]
    pub tolerance: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeZoneParams {
    #[serde(default)]
    pub margin: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisclaimerParams {
    pub phrases: Vec<String>,
    #[serde(default)]
    pub case_sensitive: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContrastParams {
    #[serde(default = "default_min_ratio")]
    pub min_ratio: f64,
}

fn default_min_ratio() -> f64 {
    crate::color::WCAG_AA_CONTRAST
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementCountParams {
    pub max: usize,
}

/// One variant per predicate kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    MinLogoSize(LogoSizeParams),
    MaxTextDensity(TextDensityParams),
    BrandColorMembership(BrandColorParams),
    SafeZoneContainment(SafeZoneParams),
    RequiredDisclaimer(DisclaimerParams),
    MinContrast(ContrastParams),
    MaxElementCount(ElementCountParams),
}

impl Predicate {
    pub const KNOWN_TYPES: [&'static str; 7] = [
        "min-logo-size",
        "max-text-density",
        "brand-color-membership",
        "safe-zone-containment",
        "required-disclaimer",
        "min-contrast",
        "max-element-count",
    ];

    /// Parse a descriptor. Type names are matched case-insensitively and
    /// `_` is accepted in place of `-`.
    pub fn from_descriptor(rule_id: &str, descriptor: &ValidatorDescriptor) -> Result<Self, RuleError> {
        let kind = descriptor.predicate_type.trim().to_ascii_lowercase().replace('_', "-");
        // A missing params object means "all defaults".
        let params = match &descriptor.params {
            Value::Null => json!({}),
            other => other.clone(),
        };

        let malformed = |e: serde_json::Error| RuleError::MalformedParams {
            rule_id: rule_id.to_string(),
            predicate: kind.clone(),
            reason: e.to_string(),
        };

        let predicate = match kind.as_str() {
            "min-logo-size" => Predicate::MinLogoSize(serde_json::from_value(params).map_err(malformed)?),
            "max-text-density" => Predicate::MaxTextDensity(serde_json::from_value(params).map_err(malformed)?),
            "brand-color-membership" => {
                Predicate::BrandColorMembership(serde_json::from_value(params).map_err(malformed)?)
            }
            "safe-zone-containment" => {
                Predicate::SafeZoneContainment(serde_json::from_value(params).map_err(malformed)?)
            }
            "required-disclaimer" => Predicate::RequiredDisclaimer(serde_json::from_value(params).map_err(malformed)?),
            "min-contrast" => Predicate::MinContrast(serde_json::from_value(params).map_err(malformed)?),
            "max-element-count" => Predicate::MaxElementCount(serde_json::from_value(params).map_err(malformed)?),
            _ => {
                return Err(RuleError::UnknownPredicate {
                    rule_id: rule_id.to_string(),
                    predicate: descriptor.predicate_type.clone(),
                })
            }
        };

        predicate.check_ranges(rule_id, &kind)?;
        Ok(predicate)
    }

    fn check_ranges(&self, rule_id: &str, kind: &str) -> Result<(), RuleError> {
        let bad = |reason: &str| RuleError::MalformedParams {
            rule_id: rule_id.to_string(),
            predicate: kind.to_string(),
            reason: reason.to_string(),
        };
        match self {
            Predicate::MinLogoSize(p) if p.min_width < 0.0 || p.min_height < 0.0 => {
                Err(bad("minimum logo size must not be negative"))
            }
            Predicate::MaxTextDensity(TextDensityParams {
                max_coverage: Some(c), ..
            }) if !(0.0..=1.0).contains(c) => Err(bad("maxCoverage must be within [0, 1]")),
            Predicate::BrandColorMembership(p) if p.tolerance < 0.0 => Err(bad("tolerance must not be negative")),
            Predicate::SafeZoneContainment(SafeZoneParams { margin: Some(m) }) if !(0.0..0.5).contains(m) => {
                Err(bad("margin must be within [0, 0.5)"))
            }
            Predicate::RequiredDisclaimer(p) if p.phrases.is_empty() => Err(bad("at least one phrase is required")),
            Predicate::MinContrast(p) if p.min_ratio < 1.0 => Err(bad("minRatio must be at least 1")),
            _ => Ok(()),
        }
    }
}

// --- Catalog ---

#[derive(Deserialize)]
#[serde(untagged)]
enum RuleFile {
    Many(Vec<ComplianceRule>),
    One(ComplianceRule),
}

/// Ordered, versioned rule list. Order is evaluation and report order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleCatalog {
    pub version: String,
    rules: Vec<ComplianceRule>,
}

impl RuleCatalog {
    pub fn new() -> Self {
        Self {
            version: CATALOG_VERSION.to_string(),
            rules: vec![],
        }
    }

    pub fn with_rules(rules: Vec<ComplianceRule>) -> Result<Self, RuleError> {
        let mut catalog = Self::new();
        for rule in rules {
            catalog.upsert_rule(rule)?;
        }
        Ok(catalog)
    }

    /// Insert or replace by rule id. A replaced rule keeps its position.
    pub fn upsert_rule(&mut self, rule: ComplianceRule) -> Result<RuleId, RuleError> {
        if rule.id.trim().is_empty() {
            return Err(RuleError::EmptyId);
        }
        if semver::Version::parse(&rule.version).is_err() {
            return Err(RuleError::InvalidVersion {
                rule_id: rule.id.clone(),
                version: rule.version.clone(),
            });
        }

        let id = rule.id.clone();
        match self.rules.iter_mut().find(|r| r.id == id) {
            Some(existing) => {
                tracing::debug!(rule_id = %id, "updating rule");
                *existing = rule;
            }
            None => {
                tracing::debug!(rule_id = %id, "adding rule");
                self.rules.push(rule);
            }
        }
        Ok(id)
    }

    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> Result<(), RuleError> {
        let rule = self
            .rules
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| RuleError::NotFound(id.to_string()))?;
        rule.enabled = enabled;
        Ok(())
    }

    /// Soft-disable. The rule stays in the catalog.
    pub fn disable(&mut self, id: &str) -> Result<(), RuleError> {
        self.set_enabled(id, false)
    }

    pub fn enable(&mut self, id: &str) -> Result<(), RuleError> {
        self.set_enabled(id, true)
    }

    pub fn get(&self, id: &str) -> Option<&ComplianceRule> {
        self.rules.iter().find(|r| r.id == id)
    }

    pub fn list(&self) -> &[ComplianceRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Enabled rules for the retailer plus general rules, in catalog order.
    pub fn rules_for(&self, retailer: Option<&str>) -> Vec<&ComplianceRule> {
        self.rules.iter().filter(|r| r.enabled && r.applies_to(retailer)).collect()
    }

    /// Load `*.json` files (one rule or an array of rules each) in file-name
    /// order. Unreadable or invalid files are logged and skipped.
    pub fn load_from_dir(dir: &Path) -> Result<Self, std::io::Error> {
        let mut catalog = Self::new();
        if !dir.exists() {
            return Ok(catalog);
        }

        let mut paths: Vec<_> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|e| e == "json"))
            .collect();
        paths.sort();

        for path in paths {
            let parsed = fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|content| serde_json::from_str::<RuleFile>(&content).map_err(|e| e.to_string()));
            let rules = match parsed {
                Ok(RuleFile::Many(rules)) => rules,
                Ok(RuleFile::One(rule)) => vec![rule],
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping rule file");
                    continue;
                }
            };
            for rule in rules {
                if let Err(e) = catalog.upsert_rule(rule) {
                    tracing::warn!(path = %path.display(), error = %e, "skipping rule");
                }
            }
        }
        Ok(catalog)
    }

    /// General rules plus two sample retailer profiles.
    pub fn builtin() -> Self {
        let rules = vec![
            ComplianceRule::new(
                "general.safe-zone",
                "Content inside safe zone",
                RuleCategory::Layout,
                Severity::Error,
                GENERAL_SCOPE,
                ValidatorDescriptor::new("safe-zone-containment", json!({"margin": 0.05})),
            )
            .with_description("Every element must sit inside the canvas minus the platform safe zone."),
            ComplianceRule::new(
                "general.text-density",
                "Copy length",
                RuleCategory::Text,
                Severity::Warning,
                GENERAL_SCOPE,
                ValidatorDescriptor::new(
                    "max-text-density",
                    json!({
                        "defaultMaxChars": 120,
                        "roleLimits": {"headline": 40, "subheadline": 70, "cta": 20},
                        "maxCoverage": 0.4
                    }),
                ),
            )
            .with_description("Text blocks must stay short enough to read at a glance."),
            ComplianceRule::new(
                "general.text-contrast",
                "Readable text contrast",
                RuleCategory::Text,
                Severity::Warning,
                GENERAL_SCOPE,
                ValidatorDescriptor::new("min-contrast", json!({"minRatio": 4.5})),
            )
            .with_description("Text must meet WCAG AA contrast against the background."),
            ComplianceRule::new(
                "general.element-count",
                "Visual clutter",
                RuleCategory::General,
                Severity::Info,
                GENERAL_SCOPE,
                ValidatorDescriptor::new("max-element-count", json!({"max": 25})),
            ),
            ComplianceRule::new(
                "tesco.logo-size",
                "Retailer logo minimum size",
                RuleCategory::Logo,
                Severity::Error,
                "tesco",
                ValidatorDescriptor::new("min-logo-size", json!({"minWidth": 100, "minHeight": 40})),
            ),
            ComplianceRule::new(
                "tesco.brand-colors",
                "Approved palette",
                RuleCategory::Color,
                Severity::Warning,
                "tesco",
                ValidatorDescriptor::new(
                    "brand-color-membership",
                    json!({"palette": ["#00539f", "#ee1c2e", "#ffffff", "#000000"], "tolerance": 12.0}),
                ),
            ),
            ComplianceRule::new(
                "tesco.disclaimer",
                "Availability disclaimer",
                RuleCategory::Disclaimer,
                Severity::Error,
                "tesco",
                ValidatorDescriptor::new(
                    "required-disclaimer",
                    json!({"phrases": ["Selected stores. Subject to availability."]}),
                ),
            ),
            ComplianceRule::new(
                "asda.logo-size",
                "Retailer logo minimum size",
                RuleCategory::Logo,
                Severity::Error,
                "asda",
                ValidatorDescriptor::new("min-logo-size", json!({"minWidth": 120, "minHeight": 60})),
            ),
            ComplianceRule::new(
                "asda.brand-colors",
                "Approved palette",
                RuleCategory::Color,
                Severity::Info,
                "asda",
                ValidatorDescriptor::new(
                    "brand-color-membership",
                    json!({"palette": ["#78be20", "#ffffff", "#000000"], "tolerance": 0.0}),
                ),
            ),
        ];

        let mut catalog = Self::new();
        catalog.rules = rules;
        catalog
    }
}

impl Default for RuleCatalog {
    fn default() -> Self {
        Self::new()
    }
}
