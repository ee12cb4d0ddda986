//! Creative Compliance - retail creative validation and smart resize
//!
//! # Guarantees
//! 1. Layouts Are Values: nothing mutates a caller's graph
//! 2. Bad Input Fails Loudly, bad rules are skipped
//! 3. Deterministic Reports for identical input
//! 4. Certificates Only For Passing Reports
//! 5. Vision Is Supplementary

pub mod certificate;
mod checks;
pub mod color;
pub mod config;
pub mod error;
pub mod formats;
pub mod geometry;
pub mod hashing;
pub mod layout;
pub mod pipeline;
pub mod reliability;
pub mod report;
pub mod resize;
pub mod rules;
pub mod validation;
pub mod vision;

pub use certificate::{verify_certificate, Certificate, Certifier, Ed25519Signer, Signer};
pub use config::EngineConfig;
pub use error::{CollaboratorError, ComplianceError, InputError, RuleError};
pub use formats::{FormatDescriptor, FormatRegistry};
pub use hashing::{canonical_json, compute_layout_hash};
pub use layout::{BrandKit, Element, ElementKind, LayoutGraph};
pub use pipeline::{CreativeEngine, CreativeSubmission, ResizedLayout, ValidatedCreative};
pub use report::{render_compliance_report, AuditEntry};
pub use resize::resize;
pub use rules::{ComplianceRule, RuleCatalog, RuleCategory, Severity, ValidatorDescriptor};
pub use validation::{ComplianceReport, ComplianceStatus, ValidationMetadata, Validator, Violation};
pub use vision::{VisionAnalyzer, VisionSignal};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
