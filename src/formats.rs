//! Output formats - target canvases for the resize engine.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::InputError;
use crate::geometry::CanvasSize;

pub type FormatId = String;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatDescriptor {
    pub id: FormatId,
    pub name: String,
    pub platform: String,
    pub width: u32,
    pub height: u32,
    /// Fraction of each dimension reserved as a margin on every edge.
    #[serde(default)]
    pub safe_zone: f64,
    #[serde(default)]
    pub max_file_size_kb: Option<u32>,
}

impl FormatDescriptor {
    pub fn new(id: impl Into<FormatId>, name: impl Into<String>, platform: impl Into<String>, width: u32, height: u32, safe_zone: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            platform: platform.into(),
            width,
            height,
            safe_zone,
            max_file_size_kb: None,
        }
    }

    pub fn canvas(&self) -> CanvasSize {
        CanvasSize::new(self.width as f64, self.height as f64)
    }

    pub fn validate(&self) -> Result<(), InputError> {
        let invalid = |reason: &str| InputError::InvalidFormat {
            format_id: self.id.clone(),
            reason: reason.to_string(),
        };
        if self.id.trim().is_empty() {
            return Err(invalid("format id must not be empty"));
        }
        if self.width == 0 || self.height == 0 {
            return Err(invalid("width and height must be positive"));
        }
        if !self.safe_zone.is_finite() || !(0.0..0.5).contains(&self.safe_zone) {
            return Err(invalid("safeZone must be within [0, 0.5)"));
        }
        Ok(())
    }
}

/// Format registry - built-in formats plus any loaded from disk.
pub struct FormatRegistry {
    formats: BTreeMap<FormatId, FormatDescriptor>,
}

impl FormatRegistry {
    pub fn new() -> Self {
        Self { formats: BTreeMap::new() }
    }

    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for format in [
            FormatDescriptor::new("instagram-post", "Instagram Post", "instagram", 1080, 1080, 0.05),
            FormatDescriptor::new("instagram-story", "Instagram Story", "instagram", 1080, 1920, 0.1),
            FormatDescriptor::new("facebook-feed", "Facebook Feed", "facebook", 1200, 628, 0.05),
            FormatDescriptor::new("leaderboard", "Leaderboard Banner", "display", 728, 90, 0.0),
            FormatDescriptor::new("mpu", "Medium Rectangle", "display", 300, 250, 0.0),
            FormatDescriptor::new("skyscraper", "Wide Skyscraper", "display", 160, 600, 0.0),
            FormatDescriptor::new("in-store-screen", "In-store Screen", "in-store", 1920, 1080, 0.03),
        ] {
            registry.formats.insert(format.id.clone(), format);
        }
        registry
    }

    /// Load `*.json` descriptors from `dir` on top of the built-ins.
    /// Invalid files are logged and skipped.
    pub fn load_from_dir(dir: &Path) -> Result<Self, std::io::Error> {
        let mut registry = Self::builtin();
        if dir.exists() {
            for entry in fs::read_dir(dir)? {
                let path = entry?.path();
                if !path.extension().is_some_and(|e| e == "json") {
                    continue;
                }
                let parsed = fs::read_to_string(&path)
                    .map_err(|e| e.to_string())
                    .and_then(|c| serde_json::from_str::<FormatDescriptor>(&c).map_err(|e| e.to_string()));
                match parsed {
                    Ok(format) => {
                        if let Err(e) = registry.register(format) {
                            tracing::warn!(path = %path.display(), error = %e, "skipping format");
                        }
                    }
                    Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping format file"),
                }
            }
        }
        Ok(registry)
    }

    pub fn register(&mut self, format: FormatDescriptor) -> Result<(), InputError> {
        format.validate()?;
        self.formats.insert(format.id.clone(), format);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&FormatDescriptor> {
        self.formats.get(id)
    }

    pub fn require(&self, id: &str) -> Result<&FormatDescriptor, InputError> {
        self.get(id).ok_or_else(|| InputError::UnknownFormat(id.to_string()))
    }

    pub fn list(&self) -> Vec<&FormatDescriptor> {
        self.formats.values().collect()
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
