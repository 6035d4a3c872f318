use std::collections::BTreeMap;

use tracing::debug;

use crate::models::Attribute;

/// Attribute → value → `#RRGGBB` colour.
pub type ColorOverrides = BTreeMap<Attribute, BTreeMap<String, String>>;

pub const FALLBACK_COLOR: &str = "#8884D8";

/// Five even steps from `#0077CC` towards `#00A3E0`.
const TENURE_PALETTE: &[(&str, &str)] = &[
    ("0-5", "#0080D0"),
    ("6-10", "#0089D4"),
    ("11-15", "#0091D8"),
    ("16-20", "#009ADC"),
    ("20+", "#00A3E0"),
];

const LEARNING_STYLE_PALETTE: &[(&str, &str)] = &[
    ("Visual", "#FF6B6B"),
    ("Auditory", "#4ECDC4"),
    ("Reading/Writing", "#96CEB4"),
    ("Kinesthetic (Doing)", "#45B7D1"),
    ("Interactive/Collaborative", "#FF9F1C"),
];

const SHAPED_BY_PALETTE: &[(&str, &str)] = &[
    ("Education or School Environment", "#FF9F1C"),
    ("Personal Challenges or Adversity", "#2EC4B6"),
    ("Travel or Exposure to Different Cultures", "#E71D36"),
    ("Family Traditions", "#011627"),
    ("Religion or Spiritual Practices", "#FF6B6B"),
    ("Community or Neighbors", "#4ECDC4"),
    ("Sports or the Arts", "#45B7D1"),
];

const PEAK_PERFORMANCE_PALETTE: &[(&str, &str)] = &[
    ("Extrovert, Morning", "#FFD166"),
    ("Extrovert, Evening", "#06D6A0"),
    ("Introvert, Morning", "#118AB2"),
    ("Introvert, Night", "#073B4C"),
    ("Ambivert, Morning", "#FF6B6B"),
    ("Ambivert, Night", "#4ECDC4"),
];

const MOTIVATION_PALETTE: &[(&str, &str)] = &[
    ("Learning and growth", "#4ECDC4"),
    ("Making a difference", "#FF6B6B"),
    ("Building strong relationships", "#45B7D1"),
    ("Finding balance or peace", "#96CEB4"),
    ("Leading or mentoring others", "#FF9F1C"),
    ("Exploring new possibilities", "#9467BD"),
    ("Achieving personal goals", "#FFD166"),
];

pub fn palette(attribute: Attribute) -> &'static [(&'static str, &'static str)] {
    match attribute {
        Attribute::Tenure => TENURE_PALETTE,
        Attribute::LearningStyle => LEARNING_STYLE_PALETTE,
        Attribute::ShapedBy => SHAPED_BY_PALETTE,
        Attribute::PeakPerformance => PEAK_PERFORMANCE_PALETTE,
        Attribute::Motivation => MOTIVATION_PALETTE,
    }
}

/// Colour for a category value: override table, then the built-in palette,
/// then [`FALLBACK_COLOR`].
pub fn resolve<'a>(attribute: Attribute, value: &str, overrides: &'a ColorOverrides) -> &'a str {
    if let Some(color) = overrides.get(&attribute).and_then(|values| values.get(value)) {
        return color.as_str();
    }

    palette(attribute)
        .iter()
        .find(|(candidate, _)| *candidate == value)
        .map(|(_, color)| *color)
        .unwrap_or(FALLBACK_COLOR)
}

/// Strict `#RRGGBB` check.
pub fn is_valid_hex(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub fn parse(hex: &str) -> Option<Rgb> {
        if !is_valid_hex(hex) {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
        Some(Rgb(channel(1..3)?, channel(3..5)?, channel(5..7)?))
    }

    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }
}

/// Linear RGB interpolation between two hex colours. Falls back to `from`
/// when either side is not a valid hex colour.
pub fn blend(from: &str, to: &str, t: f64) -> String {
    let (Some(a), Some(b)) = (Rgb::parse(from), Rgb::parse(to)) else {
        return from.to_string();
    };
    let t = t.clamp(0.0, 1.0);
    let mix = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * t).round() as u8;
    Rgb(mix(a.0, b.0), mix(a.1, b.1), mix(a.2, b.2)).to_hex()
}

/// Text-field model for a colour swatch: edits commit only when valid and
/// losing focus reverts an invalid draft to the committed colour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorInput {
    committed: String,
    draft: String,
}

impl ColorInput {
    pub fn new(color: &str) -> Self {
        Self {
            committed: color.to_string(),
            draft: color.to_string(),
        }
    }

    /// Returns true when the edit changed the committed colour.
    pub fn edit(&mut self, text: &str) -> bool {
        self.draft = text.to_string();
        if is_valid_hex(text) && text != self.committed {
            self.committed = text.to_string();
            return true;
        }
        false
    }

    pub fn blur(&mut self) {
        if !is_valid_hex(&self.draft) {
            debug!(draft = %self.draft, "discarding invalid colour input");
            self.draft = self.committed.clone();
        }
    }

    pub fn committed(&self) -> &str {
        &self.committed
    }
}
