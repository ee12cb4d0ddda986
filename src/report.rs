//! Human-readable compliance reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::rules::Severity;
use crate::validation::{ComplianceReport, ComplianceStatus, ViolationSource};

/// One audit trail line. Supplied by the caller's persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub action: String,
    #[serde(default)]
    pub details: Option<String>,
}

const SECTIONS: [(Severity, &str); 3] = [
    (Severity::Error, "Errors"),
    (Severity::Warning, "Warnings"),
    (Severity::Info, "Info"),
];

/// Render `report` as markdown. Output depends only on the arguments.
pub fn render_compliance_report(report: &ComplianceReport, creative_name: &str, audit_log: &[AuditEntry]) -> String {
    let badge = match report.status {
        ComplianceStatus::Pass => "PASS",
        ComplianceStatus::Warning => "WARNING",
        ComplianceStatus::Fail => "FAIL",
    };

    let mut lines = vec![
        format!("# Compliance Report: {}", creative_name),
        String::new(),
        format!("- **Status:** {}", badge),
        format!("- **Score:** {}/100", report.score),
    ];
    if let Some(retailer) = &report.retailer {
        lines.push(format!("- **Retailer:** {}", retailer));
    }
    lines.push(format!("- **Report ID:** {}", report.id));
    lines.push(format!("- **Generated:** {}", report.timestamp.to_rfc3339()));
    lines.push(format!("- **Rules evaluated:** {}", report.rules_evaluated));
    if report.vision_applied {
        lines.push("- **Image analysis:** applied".to_string());
    }
    lines.push(String::new());

    lines.push("## Violations".to_string());
    lines.push(String::new());
    if report.violations.is_empty() {
        lines.push("No violations found.".to_string());
        lines.push(String::new());
    }
    for (severity, title) in SECTIONS {
        let group: Vec<_> = report.violations_with(severity).collect();
        if group.is_empty() {
            continue;
        }
        lines.push(format!("### {} ({})", title, group.len()));
        lines.push(String::new());
        for v in group {
            let element = v.element_id.as_ref().map(|e| format!(" `{}`", e)).unwrap_or_default();
            let source = if v.source == ViolationSource::Vision { " (image analysis)" } else { "" };
            lines.push(format!("- **{}**{}{}: {}", v.rule_id, element, source, v.message));
            if let Some(fix) = &v.suggested_fix {
                lines.push(format!("  - Suggested fix: {}", fix));
            }
        }
        lines.push(String::new());
    }

    if !report.skipped_rules.is_empty() {
        lines.push("## Skipped Rules".to_string());
        lines.push(String::new());
        for skipped in &report.skipped_rules {
            lines.push(format!("- **{}**: {}", skipped.rule_id, skipped.reason));
        }
        lines.push(String::new());
    }

    if !audit_log.is_empty() {
        lines.push("## Audit Trail".to_string());
        lines.push(String::new());
        lines.push("| Time | Actor | Action | Details |".to_string());
        lines.push("|------|-------|--------|---------|".to_string());
        for entry in audit_log {
            lines.push(format!(
                "| {} | {} | {} | {} |",
                entry.timestamp.to_rfc3339(),
                cell(&entry.actor),
                cell(&entry.action),
                cell(entry.details.as_deref().unwrap_or(""))
            ));
        }
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn cell(s: &str) -> String {
    s.replace('|', "\\|").replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoringConfig;
    use crate::validation::{SkippedRule, Violation};
    use chrono::TimeZone;

    fn sample() -> ComplianceReport {
        let mut logo = Violation::new("tesco.logo-size", Severity::Error, "Logo too small");
        logo.element_id = Some("logo".into());
        logo.suggested_fix = Some("Scale up".into());
        let mut report = ComplianceReport::from_violations(
            vec![Violation::new("general.element-count", Severity::Info, "Busy"), logo],
            &ScoringConfig::default(),
        );
        report.timestamp = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        report.retailer = Some("tesco".into());
        report
    }

    #[test]
    fn groups_by_severity_in_order() {
        let text = render_compliance_report(&sample(), "Summer Sale", &[]);
        assert!(text.starts_with("# Compliance Report: Summer Sale\n"));
        assert!(text.contains("- **Status:** FAIL"));
        assert!(text.contains("- **Score:** 73/100"));
        let errors = text.find("### Errors (1)").unwrap();
        let info = text.find("### Info (1)").unwrap();
        assert!(errors < info);
        assert!(!text.contains("### Warnings"));
        assert!(text.contains("- **tesco.logo-size** `logo`: Logo too small\n  - Suggested fix: Scale up"));
        assert!(!text.contains("Audit Trail"));
    }

    #[test]
    fn deterministic_with_audit_trail() {
        let report = sample();
        let log = vec![AuditEntry {
            timestamp: Utc.with_ymd_and_hms(2026, 1, 2, 3, 0, 0).unwrap(),
            actor: "jo@example.com".into(),
            action: "validated".into(),
            details: Some("score | 73".into()),
        }];
        let a = render_compliance_report(&report, "Summer Sale", &log);
        let b = render_compliance_report(&report, "Summer Sale", &log);
        assert_eq!(a, b);
        assert!(a.contains("| 2026-01-02T03:00:00+00:00 | jo@example.com | validated | score \\| 73 |"));
    }

    #[test]
    fn clean_report_says_so() {
        let report = ComplianceReport::from_violations(vec![], &ScoringConfig::default());
        let text = render_compliance_report(&report, "Clean", &[]);
        assert!(text.contains("- **Status:** PASS"));
        assert!(text.contains("No violations found."));
    }

    #[test]
    fn vision_findings_and_skipped_rules_are_listed() {
        let mut finding = Violation::new("vision.text", Severity::Warning, "Text overlaps logo");
        finding.source = ViolationSource::Vision;
        let mut report = ComplianceReport::from_violations(vec![finding], &ScoringConfig::default());
        report.skipped_rules.push(SkippedRule {
            rule_id: "custom.glow".into(),
            reason: "unknown predicate".into(),
        });

        let text = render_compliance_report(&report, "Glow", &[]);
        assert!(text.contains("### Warnings (1)\n\n- **vision.text** (image analysis): Text overlaps logo\n\n"));
        assert!(text.ends_with("## Skipped Rules\n\n- **custom.glow**: unknown predicate\n\n"));
    }
}
