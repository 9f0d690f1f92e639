//! Pipeline settings.
//!
//! Every section falls back to the values the sprite wiki used, so an empty
//! or missing settings file reproduces the historical outputs.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use crate::adapter::Selection;
use crate::detector::{DetectionQuery, default_model_path, default_model_urls};
use crate::error::{AnchorError, Result};
use crate::geometry::{CssParams, DEFAULT_INSET, DEFAULT_MULTIPLIER, PortraitSize};
use crate::naming::NamingRule;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub paths: PathSettings,
    pub detection: DetectionSettings,
    pub naming: NamingRule,
    pub css: CssSettings,
    pub crop: CropSettings,
    pub heights: HeightSettings,
    pub fetch: FetchSettings,
}

/// Working files. Relative paths resolve against the current directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathSettings {
    pub images_dir: PathBuf,
    /// Where annotated detections go; `None` disables overlays.
    pub overlay_dir: Option<PathBuf>,
    /// Automatic layer, rewritten by every detection run.
    pub store: PathBuf,
    /// Hand-maintained overrides, never written by the pipeline.
    pub manual: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            images_dir: PathBuf::from("portraits"),
            overlay_dir: Some(PathBuf::from("segmented")),
            store: PathBuf::from("seg-result.json"),
            manual: PathBuf::from("seg-result-manual.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectionSettings {
    pub detector: String,
    pub model_path: PathBuf,
    pub model_urls: Vec<String>,
    pub concept: String,
    pub box_threshold: f32,
    pub text_threshold: f32,
    pub selection: Selection,
    /// Image extensions picked up from `images_dir`.
    pub extensions: Vec<String>,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            detector: "rustface".to_string(),
            model_path: default_model_path(),
            model_urls: default_model_urls(),
            concept: "face".to_string(),
            box_threshold: 0.25,
            text_threshold: 0.20,
            selection: Selection::First,
            extensions: vec!["png".to_string()],
        }
    }
}

impl DetectionSettings {
    pub fn query(&self) -> DetectionQuery {
        DetectionQuery {
            concept: self.concept.clone(),
            box_threshold: self.box_threshold,
            text_threshold: self.text_threshold,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CssSettings {
    pub multiplier: f64,
    pub inset: f64,
    pub selector_prefix: String,
}

impl Default for CssSettings {
    fn default() -> Self {
        Self {
            multiplier: DEFAULT_MULTIPLIER,
            inset: DEFAULT_INSET,
            selector_prefix: "story-image-".to_string(),
        }
    }
}

impl CssSettings {
    pub fn params(&self) -> CssParams {
        CssParams {
            multiplier: self.multiplier,
            inset: self.inset,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CropSettings {
    pub width: u32,
    pub height: u32,
    /// Crop executor the generated commands invoke.
    pub program: String,
    /// Extension used in the per-subject glob.
    pub extension: String,
}

impl Default for CropSettings {
    fn default() -> Self {
        Self {
            width: 300,
            height: 300,
            program: "mogrify".to_string(),
            extension: "png".to_string(),
        }
    }
}

impl CropSettings {
    pub fn portrait(&self) -> PortraitSize {
        PortraitSize {
            width: self.width,
            height: self.height,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HeightSettings {
    /// Subjects at this height are left out of the height list.
    pub reference_height: u32,
}

impl Default for HeightSettings {
    fn default() -> Self {
        Self {
            reference_height: 1280,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FetchSettings {
    /// MediaWiki `api.php` endpoint of the sprite wiki.
    pub api_url: Option<String>,
    pub category: String,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            api_url: None,
            category: "Character sprites".to_string(),
            user_agent: concat!("sprite_anchor/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl PipelineConfig {
    /// Load settings from a JSON file; absent sections take their defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&contents).map_err(|err| {
            AnchorError::Config(format!("failed to parse {}: {err}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize settings to disk in pretty-printed JSON.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let payload = serde_json::to_string_pretty(self)
            .map_err(|err| AnchorError::Config(format!("failed to serialize settings: {err}")))?;
        fs::write(path, payload)?;
        Ok(())
    }

    /// Reject values that would make derived geometry meaningless.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(AnchorError::Config(msg));

        let d = &self.detection;
        for (name, value) in [
            ("box_threshold", d.box_threshold),
            ("text_threshold", d.text_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return fail(format!("detection.{name} must lie in [0, 1], got {value}"));
            }
        }
        if d.extensions.is_empty() {
            return fail("detection.extensions cannot be empty".to_string());
        }

        if !(self.css.multiplier.is_finite() && self.css.multiplier > 0.0) {
            return fail(format!(
                "css.multiplier must be positive, got {}",
                self.css.multiplier
            ));
        }
        if !(self.css.inset.is_finite() && self.css.inset >= 0.0) {
            return fail(format!(
                "css.inset must be non-negative, got {}",
                self.css.inset
            ));
        }

        if self.crop.width == 0 || self.crop.height == 0 {
            return fail(format!(
                "crop size must be positive, got {}x{}",
                self.crop.width, self.crop.height
            ));
        }
        if self.heights.reference_height == 0 {
            return fail("heights.reference_height must be positive".to_string());
        }

        let n = &self.naming;
        if n.variant_digits == 0 {
            return fail("naming.variant_digits must be positive".to_string());
        }
        let is_index =
            |v: &str| v.len() == n.variant_digits && v.chars().all(|c| c.is_ascii_digit());
        if !is_index(n.canonical_variant.as_str()) {
            return fail(format!(
                "naming.canonical_variant '{}' is not a {}-digit index",
                n.canonical_variant, n.variant_digits
            ));
        }
        if let Some(bad) = n.accepted_variants.iter().find(|v| !is_index(v.as_str())) {
            return fail(format!(
                "naming.accepted_variants entry '{bad}' is not a {}-digit index",
                n.variant_digits
            ));
        }
        Ok(())
    }
}

/// Returns the default settings path (`config/anchor_settings.json`).
pub fn default_settings_path() -> PathBuf {
    PathBuf::from("config/anchor_settings.json")
}

/// Load settings from `config_path`, the default path when it exists, or defaults.
pub fn load_settings(config_path: Option<&Path>) -> Result<PipelineConfig> {
    if let Some(path) = config_path {
        let settings = PipelineConfig::load_from_path(path)?;
        info!("Loaded settings from {}", path.display());
        return Ok(settings);
    }

    let default_path = default_settings_path();
    if default_path.exists() {
        let settings = PipelineConfig::load_from_path(&default_path)?;
        info!("Loaded settings from {}", default_path.display());
        Ok(settings)
    } else {
        Ok(PipelineConfig::default())
    }
}
