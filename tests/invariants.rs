//! Contract Invariant Tests
//!
//! These tests verify the non-negotiable guarantees.

use creative_compliance::{
    geometry::Origin,
    hashing::canonical_json,
    rules::{ComplianceRule, RuleCatalog, RuleCategory, Severity, ValidatorDescriptor, GENERAL_SCOPE},
    Certifier, ComplianceError, ComplianceStatus, CreativeEngine, CreativeSubmission, Ed25519Signer, Element,
    EngineConfig, FormatRegistry, InputError, LayoutGraph, ValidationMetadata, Validator,
};
use serde_json::json;

fn logo_rule(severity: Severity) -> ComplianceRule {
    ComplianceRule::new(
        "logo-size",
        "Logo size",
        RuleCategory::Logo,
        severity,
        GENERAL_SCOPE,
        ValidatorDescriptor::new("min-logo-size", json!({"minWidth": 100, "minHeight": 50})),
    )
}

fn color_rule(severity: Severity) -> ComplianceRule {
    ComplianceRule::new(
        "palette",
        "Palette",
        RuleCategory::Color,
        severity,
        GENERAL_SCOPE,
        ValidatorDescriptor::new("brand-color-membership", json!({"palette": ["#ffffff", "#000000"]})),
    )
}

fn tesco_creative() -> CreativeSubmission {
    let layout = LayoutGraph::new(vec![
        Element::text("headline", "Summer BBQ", 540.0, 300.0, 600.0, 120.0)
            .with_origin(Origin::Center)
            .with_role("headline")
            .with_fill("#00539f"),
        Element::text("legal", "Selected stores. Subject to availability.", 540.0, 900.0, 800.0, 40.0)
            .with_origin(Origin::Center)
            .with_fill("#000000"),
        Element::image("tesco-logo", "https://cdn.example.com/tesco-logo.png", 800.0, 80.0, 200.0, 80.0),
    ])
    .with_canvas(1080.0, 1080.0)
    .with_background_color("#ffffff");

    CreativeSubmission {
        creative_id: "creative-001".to_string(),
        name: "Summer BBQ".to_string(),
        layout,
        metadata: ValidationMetadata::for_retailer("tesco"),
    }
}

fn create_engine() -> CreativeEngine {
    CreativeEngine::new(RuleCatalog::builtin(), FormatRegistry::builtin(), EngineConfig::default())
}

fn certifier() -> Certifier<Ed25519Signer> {
    Certifier::new(Ed25519Signer::from_hex(&"2a".repeat(32)).unwrap())
}

#[test]
fn invariant_builtin_tesco_creative_passes() {
    let engine = create_engine();
    let validated = engine.validate_creative(&tesco_creative()).unwrap();

    assert_eq!(validated.report.status, ComplianceStatus::Pass, "{:#?}", validated.report.violations);
    assert_eq!(validated.report.score, 100.0);
    assert!(validated.report.skipped_rules.is_empty());
    assert!(!validated.layout_hash.is_empty());
}

#[test]
fn invariant_certify_calls_validate() {
    // A certificate can only come from an internally produced report,
    // so a failing creative must be rejected.
    let engine = create_engine();
    let mut submission = tesco_creative();
    submission.layout.elements.retain(|e| e.id != "legal");

    let result = engine.certify_creative(&certifier(), &submission);
    assert!(matches!(result, Err(ComplianceError::BusinessRule(_))));
}

#[test]
fn invariant_passing_creative_certifies() {
    let engine = create_engine();
    let certifier = certifier();
    let (validated, certificate) = engine.certify_creative(&certifier, &tesco_creative()).unwrap();

    assert_eq!(certificate.report_id(), validated.report.id);
    assert_eq!(certificate.creative_id(), "creative-001");
    assert_eq!(certificate.retailer(), Some("tesco"));
    assert!(creative_compliance::verify_certificate(&certificate, &certifier.signer().verifying_key()));
    assert!(certificate.snapshot().contains("\"creativeName\":\"Summer BBQ\""));
}

#[test]
fn invariant_layout_hash_stable() {
    let engine = create_engine();
    let a = engine.validate_creative(&tesco_creative()).unwrap();
    let b = engine.validate_creative(&tesco_creative()).unwrap();

    assert_eq!(a.layout_hash, b.layout_hash);
    assert_eq!(a.report.violations, b.report.violations);
    assert_eq!(a.report.score, b.report.score);
}

#[test]
fn invariant_canonical_json_deterministic() {
    let obj1 = json!({"z": 1, "a": 2, "m": {"b": 1, "a": 2}});
    let obj2 = json!({"a": 2, "m": {"a": 2, "b": 1}, "z": 1});

    assert_eq!(canonical_json(&obj1).unwrap(), canonical_json(&obj2).unwrap());
}

#[test]
fn invariant_empty_layout_is_input_error() {
    let validator = Validator::default();
    let empty = LayoutGraph::new(vec![]).with_canvas(1080.0, 1080.0);

    let result = validator.validate(&empty, &ValidationMetadata::default());
    assert!(matches!(result, Err(ComplianceError::Input(InputError::EmptyLayout))));
}

#[test]
fn invariant_error_dominates_info() {
    let layout = LayoutGraph::new(vec![
        Element::image("logo", "logo.png", 10.0, 10.0, 40.0, 20.0),
        Element::rect("panel", 100.0, 100.0, 200.0, 200.0).with_fill("#ff00ff"),
    ])
    .with_canvas(1080.0, 1080.0);
    let meta = ValidationMetadata::default();

    let both = Validator::new(RuleCatalog::with_rules(vec![logo_rule(Severity::Error), color_rule(Severity::Info)]).unwrap());
    let info_only = Validator::new(RuleCatalog::with_rules(vec![color_rule(Severity::Info)]).unwrap());

    let both = both.validate(&layout, &meta).unwrap();
    let info_only = info_only.validate(&layout, &meta).unwrap();

    assert_eq!(both.status, ComplianceStatus::Fail);
    assert_eq!(info_only.status, ComplianceStatus::Pass);
    assert!(both.score < info_only.score);
    assert_eq!(both.violations[0].rule_id, "logo-size");
    assert_eq!(both.violations[0].element_id.as_deref(), Some("logo"));
}

#[test]
fn invariant_unknown_format_error() {
    let engine = create_engine();
    let layout = tesco_creative().layout;

    let result = engine.resize_to_format(&layout, 1080.0, 1080.0, "billboard-96-sheet");
    assert!(matches!(result, Err(ComplianceError::Input(InputError::UnknownFormat(_)))));
}

#[test]
fn invariant_violation_structure() {
    let engine = create_engine();
    let mut submission = tesco_creative();
    submission.layout.elements.push(Element::rect("stray", 1050.0, 1050.0, 100.0, 100.0).with_fill("#123456"));

    let report = engine.validate_creative(&submission).unwrap().report;
    assert_eq!(report.status, ComplianceStatus::Fail);
    assert!(!report.violations.is_empty());
    for v in &report.violations {
        assert!(!v.rule_id.is_empty());
        assert!(!v.message.is_empty());
    }
    // Errors come first.
    let first_non_error = report.violations.iter().position(|v| v.severity != Severity::Error);
    if let Some(idx) = first_non_error {
        assert!(report.violations[idx..].iter().all(|v| v.severity != Severity::Error));
    }
    assert!(report
        .violations
        .iter()
        .any(|v| v.rule_id == "general.safe-zone" && v.element_id.as_deref() == Some("stray")));
}

#[test]
fn invariant_upsert_is_keyed_by_rule_id() {
    let mut engine = create_engine();
    let before = engine.validator().catalog().len();

    let mut relaxed = engine.validator().catalog().get("tesco.disclaimer").unwrap().clone();
    relaxed.severity = Severity::Info;
    relaxed.version = "1.1.0".into();
    engine.catalog_mut().upsert_rule(relaxed).unwrap();

    assert_eq!(engine.validator().catalog().len(), before);
    assert_eq!(engine.validator().catalog().get("tesco.disclaimer").unwrap().severity, Severity::Info);

    let mut submission = tesco_creative();
    submission.layout.elements.retain(|e| e.id != "legal");
    let report = engine.validate_creative(&submission).unwrap().report;
    assert_eq!(report.status, ComplianceStatus::Pass);
}

#[test]
fn invariant_resized_layout_is_validated_at_rendered_size() {
    let lockup = Element::group(
        "lockup",
        vec![Element::image("brand-logo", "https://cdn.example.com/mark.png", 0.0, 0.0, 200.0, 100.0)],
        100.0,
        100.0,
        300.0,
        150.0,
    );
    let layout = LayoutGraph::new(vec![lockup]).with_canvas(1080.0, 1080.0);
    let validator = Validator::new(RuleCatalog::with_rules(vec![logo_rule(Severity::Error)]).unwrap());
    let meta = ValidationMetadata::default();

    let before = validator.validate(&layout, &meta).unwrap();
    assert_eq!(before.status, ComplianceStatus::Pass, "{:#?}", before.violations);

    // Leaderboard height shrinks everything by 90/1080.
    let resized = create_engine().resize_to_format(&layout, 1080.0, 1080.0, "leaderboard").unwrap();
    let after = validator.validate(&resized, &meta).unwrap();

    assert_eq!(after.status, ComplianceStatus::Fail);
    assert_eq!(after.violations.len(), 1);
    assert_eq!(after.violations[0].element_id.as_deref(), Some("brand-logo"));
}
