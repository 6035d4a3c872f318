use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::color::{self, ColorInput, ColorOverrides};
use crate::error::SettingsError;
use crate::models::Attribute;

pub const MIN_SPEED_MS: u64 = 1_000;
pub const MAX_SPEED_MS: u64 = 10_000;
pub const DEFAULT_SPEED_MS: u64 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Test,
    #[default]
    Live,
}

impl DataSource {
    pub fn is_test(&self) -> bool {
        matches!(self, DataSource::Test)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThemeColors {
    pub background: &'static str,
    pub text: &'static str,
    pub muted: &'static str,
    pub stroke: &'static str,
}

/// Process-wide display settings. Held in memory only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    pub color_overrides: ColorOverrides,
    pub auto_play: bool,
    pub auto_play_speed_ms: u64,
    pub theme: Theme,
    pub data_source: DataSource,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            color_overrides: ColorOverrides::new(),
            auto_play: true,
            auto_play_speed_ms: DEFAULT_SPEED_MS,
            theme: Theme::default(),
            data_source: DataSource::default(),
        }
    }
}

impl DisplaySettings {
    /// Initial settings from a JSON file. Invalid colours are dropped and the
    /// speed is clamped into range.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let raw = std::fs::read_to_string(path)?;
        let mut settings: DisplaySettings = serde_json::from_str(&raw)?;

        for (attribute, values) in settings.color_overrides.iter_mut() {
            values.retain(|value, color| {
                let keep = color::is_valid_hex(color);
                if !keep {
                    warn!(%attribute, %value, %color, "ignoring invalid colour override");
                }
                keep
            });
        }
        settings.color_overrides.retain(|_, values| !values.is_empty());
        settings.set_speed(settings.auto_play_speed_ms);

        info!(path = %path.display(), "display settings loaded");
        Ok(settings)
    }

    pub fn color_for(&self, attribute: Attribute, value: &str) -> &str {
        color::resolve(attribute, value, &self.color_overrides)
    }

    /// Apply a typed colour edit followed by loss of focus. Returns true when
    /// the displayed colour changed; invalid input leaves it untouched.
    pub fn set_color(&mut self, attribute: Attribute, value: &str, text: &str) -> bool {
        let current = self.color_for(attribute, value).to_string();
        let mut input = ColorInput::new(&current);
        let changed = input.edit(text);
        input.blur();

        if changed {
            self.color_overrides
                .entry(attribute)
                .or_default()
                .insert(value.to_string(), input.committed().to_string());
        }
        changed
    }

    /// Clamp to the slider range and return the applied speed.
    pub fn set_speed(&mut self, speed_ms: u64) -> u64 {
        self.auto_play_speed_ms = speed_ms.clamp(MIN_SPEED_MS, MAX_SPEED_MS);
        self.auto_play_speed_ms
    }

    pub fn toggle_theme(&mut self) -> Theme {
        self.theme = match self.theme {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        };
        self.theme
    }

    pub fn toggle_data_source(&mut self) -> DataSource {
        self.data_source = match self.data_source {
            DataSource::Test => DataSource::Live,
            DataSource::Live => DataSource::Test,
        };
        self.data_source
    }

    pub fn reset(&mut self) {
        *self = DisplaySettings::default();
    }

    pub fn colors(&self) -> ThemeColors {
        match self.theme {
            Theme::Light => ThemeColors {
                background: "#FFFFFF",
                text: "#170F5F",
                muted: "#707070",
                stroke: "#22223B",
            },
            Theme::Dark => ThemeColors {
                background: "#0A0A0F",
                text: "#FFFFFF",
                muted: "#A0A0A0",
                stroke: "#2A2A2F",
            },
        }
    }
}
