//! Error kinds shared across the engine.
//!
//! Input and business-rule errors reach the caller. Rule and collaborator
//! errors are recorded and skipped by the validator.

use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum ComplianceError {
    #[error("Invalid input: {0}")]
    Input(#[from] InputError),

    #[error("Rule error: {0}")]
    Rule(#[from] RuleError),

    #[error("Business rule violation: {0}")]
    BusinessRule(String),

    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Malformed caller input. Never defaulted.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum InputError {
    #[error("layout graph has no elements")]
    EmptyLayout,

    #[error("canvas size is required (set it on the layout or in metadata)")]
    MissingCanvas,

    #[error("invalid canvas size {width}x{height}")]
    InvalidCanvas { width: f64, height: f64 },

    #[error("element {element_id}: {reason}")]
    InvalidElement { element_id: String, reason: String },

    #[error("duplicate element id {0}")]
    DuplicateElement(String),

    #[error("format {format_id}: {reason}")]
    InvalidFormat { format_id: String, reason: String },

    #[error("unknown format {0}")]
    UnknownFormat(String),

    #[error("metadata {field}: {reason}")]
    InvalidMetadata { field: &'static str, reason: String },
}

/// A single rule that cannot be used. The validator logs and skips it.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RuleError {
    #[error("rule id must not be empty")]
    EmptyId,

    #[error("rule {rule_id}: invalid version {version}")]
    InvalidVersion { rule_id: String, version: String },

    #[error("rule {rule_id}: unknown predicate type {predicate}")]
    UnknownPredicate { rule_id: String, predicate: String },

    #[error("rule {rule_id}: malformed parameters for {predicate}: {reason}")]
    MalformedParams {
        rule_id: String,
        predicate: String,
        reason: String,
    },

    #[error("rule {0} not found")]
    NotFound(String),
}

impl RuleError {
    pub fn rule_id(&self) -> Option<&str> {
        match self {
            RuleError::EmptyId => None,
            RuleError::InvalidVersion { rule_id, .. }
            | RuleError::UnknownPredicate { rule_id, .. }
            | RuleError::MalformedParams { rule_id, .. } => Some(rule_id),
            RuleError::NotFound(id) => Some(id),
        }
    }
}

/// Failure of an external service (vision analysis).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CollaboratorError {
    #[error("{service} request failed: {message}")]
    RequestFailed { service: String, message: String },

    #[error("{service} timed out")]
    Timeout { service: String },

    #[error("{service} circuit open")]
    CircuitOpen { service: String },
}

impl CollaboratorError {
    pub fn request_failed(service: impl Into<String>, message: impl Into<String>) -> Self {
        CollaboratorError::RequestFailed {
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn service(&self) -> &str {
        match self {
            CollaboratorError::RequestFailed { service, .. }
            | CollaboratorError::Timeout { service }
            | CollaboratorError::CircuitOpen { service } => service,
        }
    }
}
