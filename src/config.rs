//! Engine configuration, loaded from TOML.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rules::Severity;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub scoring: ScoringConfig,
    pub vision: VisionConfig,
    pub rules_dir: Option<PathBuf>,
    pub formats_dir: Option<PathBuf>,
}

/// Score penalty per violation, by severity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoringConfig {
    pub error_penalty: f64,
    pub warning_penalty: f64,
    pub info_penalty: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            error_penalty: 25.0,
            warning_penalty: 10.0,
            info_penalty: 2.0,
        }
    }
}

impl ScoringConfig {
    pub fn penalty(&self, severity: Severity) -> f64 {
        match severity {
            Severity::Error => self.error_penalty,
            Severity::Warning => self.warning_penalty,
            Severity::Info => self.info_penalty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VisionConfig {
    pub enabled: bool,
    /// Per-attempt limit on a single vision request.
    pub request_timeout_ms: u64,
    pub retry: RetryConfig,
    pub breaker: BreakerConfig,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            request_timeout_ms: 10_000,
            retry: RetryConfig::default(),
            breaker: BreakerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 2_000,
        }
    }
}

impl VisionConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub reset_timeout_ms: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_ms: 30_000,
        }
    }
}

impl BreakerConfig {
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.scoring;
        let penalties = [s.error_penalty, s.warning_penalty, s.info_penalty];
        if penalties.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(ConfigError::Invalid {
                field: "scoring",
                reason: "penalties must be finite and non-negative".into(),
            });
        }
        if !(s.error_penalty >= s.warning_penalty && s.warning_penalty >= s.info_penalty) {
            return Err(ConfigError::Invalid {
                field: "scoring",
                reason: "penalties must satisfy error >= warning >= info".into(),
            });
        }
        if self.vision.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "vision.requestTimeoutMs",
                reason: "must be positive".into(),
            });
        }
        if self.vision.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "vision.retry.maxAttempts",
                reason: "must be at least 1".into(),
            });
        }
        if self.vision.breaker.failure_threshold == 0 {
            return Err(ConfigError::Invalid {
                field: "vision.breaker.failureThreshold",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}
