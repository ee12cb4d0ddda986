//! Creative Engine - single entry point for validation, resize and
//! certification.
//!
//! CRITICAL: certify_creative MUST validate internally. A certificate is
//! never issued from a caller-supplied report.

use serde::{Deserialize, Serialize};

use crate::certificate::{Certificate, Certifier, Signer};
use crate::config::{ConfigError, EngineConfig};
use crate::error::ComplianceError;
use crate::formats::{FormatId, FormatRegistry};
use crate::hashing::compute_layout_hash;
use crate::layout::LayoutGraph;
use crate::resize::resize;
use crate::rules::RuleCatalog;
use crate::validation::{ComplianceReport, ValidationMetadata, Validator};
use crate::vision::VisionAnalyzer;
use crate::ENGINE_VERSION;

#[cfg(feature = "test-hooks")]
use std::sync::atomic::{AtomicU32, Ordering};

#[cfg(feature = "test-hooks")]
static VALIDATION_CALL_COUNT: AtomicU32 = AtomicU32::new(0);

#[cfg(feature = "test-hooks")]
pub fn get_validation_call_count() -> u32 {
    VALIDATION_CALL_COUNT.load(Ordering::SeqCst)
}

#[cfg(feature = "test-hooks")]
pub fn reset_validation_call_count() {
    VALIDATION_CALL_COUNT.store(0, Ordering::SeqCst);
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreativeSubmission {
    pub creative_id: String,
    pub name: String,
    pub layout: LayoutGraph,
    #[serde(default)]
    pub metadata: ValidationMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedCreative {
    pub creative_id: String,
    pub layout_hash: String,
    pub catalog_version: String,
    pub engine_version: String,
    pub report: ComplianceReport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResizedLayout {
    pub format_id: FormatId,
    pub layout_hash: String,
    pub layout: LayoutGraph,
}

pub struct CreativeEngine {
    validator: Validator,
    formats: FormatRegistry,
    config: EngineConfig,
}

impl CreativeEngine {
    pub fn new(catalog: RuleCatalog, formats: FormatRegistry, config: EngineConfig) -> Self {
        Self {
            validator: Validator::with_scoring(catalog, config.scoring.clone()),
            formats,
            config,
        }
    }

    /// Load rules and formats from the configured directories, falling back
    /// to the built-in catalogs.
    pub fn from_config(config: EngineConfig) -> Result<Self, ComplianceError> {
        config.validate()?;
        let catalog = match &config.rules_dir {
            Some(dir) => RuleCatalog::load_from_dir(dir).map_err(|source| ConfigError::Read {
                path: dir.clone(),
                source,
            })?,
            None => RuleCatalog::builtin(),
        };
        let formats = match &config.formats_dir {
            Some(dir) => FormatRegistry::load_from_dir(dir).map_err(|source| ConfigError::Read {
                path: dir.clone(),
                source,
            })?,
            None => FormatRegistry::builtin(),
        };
        tracing::info!(rules = catalog.len(), formats = formats.list().len(), "engine ready");
        Ok(Self::new(catalog, formats, config))
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn catalog_mut(&mut self) -> &mut RuleCatalog {
        self.validator.catalog_mut()
    }

    pub fn formats(&self) -> &FormatRegistry {
        &self.formats
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validate a creative's object graph.
    ///
    /// This is the ONLY validation entry point for submissions.
    pub fn validate_creative(&self, submission: &CreativeSubmission) -> Result<ValidatedCreative, ComplianceError> {
        #[cfg(feature = "test-hooks")]
        VALIDATION_CALL_COUNT.fetch_add(1, Ordering::SeqCst);

        let report = self.validator.validate(&submission.layout, &submission.metadata)?;
        self.wrap(submission, report)
    }

    /// Validate with image analysis when vision is enabled in config.
    pub async fn validate_creative_with_vision(
        &self,
        submission: &CreativeSubmission,
        image_url: &str,
        analyzer: &dyn VisionAnalyzer,
    ) -> Result<ValidatedCreative, ComplianceError> {
        if !self.config.vision.enabled {
            tracing::debug!("vision disabled, validating object graph only");
            return self.validate_creative(submission);
        }

        #[cfg(feature = "test-hooks")]
        VALIDATION_CALL_COUNT.fetch_add(1, Ordering::SeqCst);

        let report = self
            .validator
            .validate_with_vision(&submission.layout, image_url, &submission.metadata, analyzer)
            .await?;
        self.wrap(submission, report)
    }

    fn wrap(&self, submission: &CreativeSubmission, report: ComplianceReport) -> Result<ValidatedCreative, ComplianceError> {
        let catalog_version = self.validator.catalog().version.clone();
        let layout_hash = compute_layout_hash(&submission.creative_id, &catalog_version, &submission.layout, ENGINE_VERSION)?;
        tracing::info!(
            creative_id = %submission.creative_id,
            status = report.status.label(),
            score = report.score,
            "creative validated"
        );
        Ok(ValidatedCreative {
            creative_id: submission.creative_id.clone(),
            layout_hash,
            catalog_version,
            engine_version: ENGINE_VERSION.to_string(),
            report,
        })
    }

    pub fn resize_to_format(
        &self,
        layout: &LayoutGraph,
        source_width: f64,
        source_height: f64,
        format_id: &str,
    ) -> Result<LayoutGraph, ComplianceError> {
        let format = self.formats.require(format_id)?;
        resize(layout, source_width, source_height, format)
    }

    /// Resize to each format in order. Stops at the first failure.
    pub fn resize_to_formats(
        &self,
        layout: &LayoutGraph,
        source_width: f64,
        source_height: f64,
        format_ids: &[&str],
    ) -> Result<Vec<ResizedLayout>, ComplianceError> {
        format_ids
            .iter()
            .map(|id| -> Result<ResizedLayout, ComplianceError> {
                let resized = self.resize_to_format(layout, source_width, source_height, id)?;
                Ok(ResizedLayout {
                    format_id: id.to_string(),
                    layout_hash: crate::hashing::canonical_hash(&resized)?,
                    layout: resized,
                })
            })
            .collect()
    }

    /// Validate and certify.
    ///
    /// CRITICAL: This ALWAYS validates first. No bypass possible.
    pub fn certify_creative<S: Signer>(
        &self,
        certifier: &Certifier<S>,
        submission: &CreativeSubmission,
    ) -> Result<(ValidatedCreative, Certificate), ComplianceError> {
        let validated = self.validate_creative(submission)?;
        let certificate = certifier.generate_certificate(&validated.report, &submission.creative_id, &submission.name)?;
        Ok((validated, certificate))
    }
}

impl Default for CreativeEngine {
    fn default() -> Self {
        Self::new(RuleCatalog::builtin(), FormatRegistry::builtin(), EngineConfig::default())
    }
}
