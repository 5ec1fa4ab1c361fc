use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chords::{notation_by_name, ChordLineClassifier};
use crate::format::FontSpec;
use crate::layout::LayoutConfig;
use crate::sink::RetryPolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub match_threshold: u8,
    pub y_tolerance: f64,
    pub fallback_pitch: f64,
    pub pitch_min: f64,
    pub pitch_max: f64,
    pub blank_line_min_spacing: f64,
    pub doc_title: String,
    pub doc_title_template: String,
    pub font_family: String,
    pub font_size_pt: u32,
    pub insert_anchor: usize,
    pub tab_title_max: usize,
    pub output_dir: String,
    pub retry: RetryPolicy,
    pub chord_notations: Vec<String>,
    pub chord_line_ratio: f64,
}

impl Default for Config {
    fn default() -> Self {
        let layout = LayoutConfig::default();
        let font = FontSpec::default();
        Config {
            match_threshold: 70,
            y_tolerance: layout.y_tolerance,
            fallback_pitch: layout.fallback_pitch,
            pitch_min: layout.pitch_min,
            pitch_max: layout.pitch_max,
            blank_line_min_spacing: layout.min_line_spacing,
            doc_title: "Setlist".to_string(),
            doc_title_template: "{title}_{timestamp}".to_string(),
            font_family: font.family,
            font_size_pt: font.size_pt,
            insert_anchor: 1,
            tab_title_max: 50,
            output_dir: "./output".to_string(),
            retry: RetryPolicy::default(),
            chord_notations: vec!["symbols".to_string()],
            chord_line_ratio: 0.8,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Read(String),
    #[error("Failed to parse config: {0}")]
    Parse(String),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl Config {
    pub fn from_yaml_str(raw: &str) -> Result<Config, ConfigError> {
        let cfg: Config = if raw.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));
        if self.match_threshold > 100 {
            return invalid("match_threshold must be within 0..=100");
        }
        if self.y_tolerance <= 0.0 || self.fallback_pitch <= 0.0 {
            return invalid("y_tolerance and fallback_pitch must be positive");
        }
        if self.pitch_min >= self.pitch_max {
            return invalid("pitch_min must be below pitch_max");
        }
        if !(self.chord_line_ratio > 0.0 && self.chord_line_ratio <= 1.0) {
            return invalid("chord_line_ratio must be within (0, 1]");
        }
        if self.font_family.trim().is_empty() || self.font_size_pt == 0 {
            return invalid("font_family must be set and font_size_pt positive");
        }
        if self.tab_title_max < 4 {
            return invalid("tab_title_max must be at least 4");
        }
        if self.insert_anchor < 1 {
            return invalid("insert_anchor must be at least 1");
        }
        if self.retry.max_attempts == 0 {
            return invalid("retry.max_attempts must be at least 1");
        }
        if !self.doc_title_template.contains("{title}") {
            return invalid("doc_title_template must contain {title}");
        }
        if self.chord_notations.is_empty() {
            return invalid("chord_notations must not be empty");
        }
        if let Some(unknown) = self.chord_notations.iter().find(|n| notation_by_name(n).is_none()) {
            return Err(ConfigError::Invalid(format!("unknown chord notation: {}", unknown)));
        }
        Ok(())
    }

    pub fn layout(&self) -> LayoutConfig {
        LayoutConfig {
            y_tolerance: self.y_tolerance,
            fallback_pitch: self.fallback_pitch,
            pitch_min: self.pitch_min,
            pitch_max: self.pitch_max,
            min_line_spacing: self.blank_line_min_spacing,
        }
    }

    pub fn font(&self) -> FontSpec {
        FontSpec { family: self.font_family.clone(), size_pt: self.font_size_pt }
    }

    pub fn classifier(&self) -> ChordLineClassifier {
        let notations = self.chord_notations.iter().filter_map(|n| notation_by_name(n)).collect();
        ChordLineClassifier::new(notations, self.chord_line_ratio)
    }

    /// Render the document title from the template.
    pub fn document_title(&self, timestamp: &str) -> String {
        self.doc_title_template
            .replace("{title}", &self.doc_title)
            .replace("{timestamp}", timestamp)
    }
}

/// Load and validate a YAML config. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        log::info!("no config at {}, using defaults", path.display());
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read(e.to_string()))?;
    Config::from_yaml_str(&raw)
}
