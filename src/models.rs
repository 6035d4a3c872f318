use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::binning::TenureBucket;
use crate::error::SubmissionError;

pub const LEARNING_STYLES: &[&str] = &[
    "Visual",
    "Auditory",
    "Reading/Writing",
    "Kinesthetic (Doing)",
    "Interactive/Collaborative",
];

pub const SHAPED_BY: &[&str] = &[
    "Education or School Environment",
    "Personal Challenges or Adversity",
    "Travel or Exposure to Different Cultures",
    "Family Traditions",
    "Religion or Spiritual Practices",
    "Community or Neighbors",
    "Sports or the Arts",
];

pub const PEAK_PERFORMANCE: &[&str] = &[
    "Introvert, Morning",
    "Extrovert, Morning",
    "Ambivert, Morning",
    "Introvert, Night",
    "Extrovert, Evening",
    "Ambivert, Night",
];

pub const MOTIVATIONS: &[&str] = &[
    "Learning and growth",
    "Making a difference",
    "Building strong relationships",
    "Finding balance or peace",
    "Leading or mentoring others",
    "Exploring new possibilities",
    "Achieving personal goals",
];

/// Upper bound accepted for tenure on submission.
pub const MAX_TENURE_YEARS: i32 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationStatus {
    Pending,
    Approved,
    Rejected,
}

impl ModerationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModerationStatus::Pending => "pending",
            ModerationStatus::Approved => "approved",
            ModerationStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ModerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModerationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(ModerationStatus::Pending),
            "approved" => Ok(ModerationStatus::Approved),
            "rejected" => Ok(ModerationStatus::Rejected),
            other => Err(format!("unknown moderation status '{other}'")),
        }
    }
}

/// One attendee's survey answers joined with the attendee identity.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseRecord {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: Option<String>,
    pub is_anonymous: bool,
    pub tenure: Option<i32>,
    pub learning_style: Option<String>,
    pub shaped_by: Option<String>,
    pub peak_performance: Option<String>,
    pub motivation: Option<String>,
    pub unique_quality: Option<String>,
    pub status: ModerationStatus,
    pub tag: Option<String>,
    pub test_data: bool,
    pub created_at: DateTime<Utc>,
}

/// A survey question that can be placed on either side of a flow diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    Tenure,
    LearningStyle,
    ShapedBy,
    PeakPerformance,
    Motivation,
}

impl Attribute {
    pub const ALL: [Attribute; 5] = [
        Attribute::Tenure,
        Attribute::LearningStyle,
        Attribute::ShapedBy,
        Attribute::PeakPerformance,
        Attribute::Motivation,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Attribute::Tenure => "tenure",
            Attribute::LearningStyle => "learning_style",
            Attribute::ShapedBy => "shaped_by",
            Attribute::PeakPerformance => "peak_performance",
            Attribute::Motivation => "motivation",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Attribute::Tenure => "Years at Company",
            Attribute::LearningStyle => "Learning Style",
            Attribute::ShapedBy => "Shaped By",
            Attribute::PeakPerformance => "Peak Performance",
            Attribute::Motivation => "Motivation",
        }
    }

    /// Known values in domain order. Tenure yields the bucket labels.
    pub fn options(&self) -> &'static [&'static str] {
        match self {
            Attribute::Tenure => &TenureBucket::LABELS,
            Attribute::LearningStyle => LEARNING_STYLES,
            Attribute::ShapedBy => SHAPED_BY,
            Attribute::PeakPerformance => PEAK_PERFORMANCE,
            Attribute::Motivation => MOTIVATIONS,
        }
    }

    /// The value this attribute takes for a record, with tenure already bucketed.
    pub fn value_of<'a>(&self, record: &'a ResponseRecord) -> Option<Cow<'a, str>> {
        let raw = match self {
            Attribute::Tenure => {
                return record
                    .tenure
                    .map(|years| Cow::Borrowed(TenureBucket::from_years(years).label()))
            }
            Attribute::LearningStyle => record.learning_style.as_deref(),
            Attribute::ShapedBy => record.shaped_by.as_deref(),
            Attribute::PeakPerformance => record.peak_performance.as_deref(),
            Attribute::Motivation => record.motivation.as_deref(),
        };

        raw.filter(|value| !value.trim().is_empty()).map(Cow::Borrowed)
    }

    /// Target rotation used by the auto-cycle: every attribute except the source.
    pub fn rotation(source: Attribute) -> Vec<Attribute> {
        Attribute::ALL
            .into_iter()
            .filter(|attribute| *attribute != source)
            .collect()
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Attribute {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase().replace('-', "_");
        match needle.as_str() {
            "tenure" | "years" | "years_at_company" => Ok(Attribute::Tenure),
            "learning_style" => Ok(Attribute::LearningStyle),
            "shaped_by" => Ok(Attribute::ShapedBy),
            "peak_performance" => Ok(Attribute::PeakPerformance),
            "motivation" => Ok(Attribute::Motivation),
            _ => Err(format!("unknown attribute '{s}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub question: String,
    pub answer: String,
}

/// Payload accepted by the submission interface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub is_anonymous: bool,
    #[serde(default)]
    pub test_data: bool,
    pub answers: Vec<Answer>,
}

impl Submission {
    /// Email normalised for storage, or `None` when blank.
    pub fn email(&self) -> Option<String> {
        self.email
            .as_deref()
            .map(|email| email.trim().to_ascii_lowercase())
            .filter(|email| !email.is_empty())
    }
}

/// Validated answers folded into the columns of one response row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurveyAnswers {
    pub tenure: Option<i32>,
    pub learning_style: Option<String>,
    pub shaped_by: Option<String>,
    pub peak_performance: Option<String>,
    pub motivation: Option<String>,
    pub unique_quality: Option<String>,
}

impl SurveyAnswers {
    pub fn from_answers(answers: &[Answer]) -> Result<Self, SubmissionError> {
        let mut folded = SurveyAnswers::default();
        let mut seen: Vec<&str> = Vec::new();

        for answer in answers {
            let question = answer.question.trim();
            if seen.contains(&question) {
                return Err(SubmissionError::Invalid(format!(
                    "question '{question}' answered more than once"
                )));
            }
            seen.push(question);

            let value = answer.answer.trim();
            if value.is_empty() {
                continue;
            }

            if question == "unique_quality" {
                folded.unique_quality = Some(value.to_string());
                continue;
            }

            let attribute: Attribute = question
                .parse()
                .map_err(|_| SubmissionError::Invalid(format!("unknown question '{question}'")))?;

            match folded.categorical_mut(attribute) {
                Some(slot) => {
                    if !attribute.options().contains(&value) {
                        return Err(SubmissionError::Invalid(format!(
                            "'{value}' is not an option for {}",
                            attribute.label()
                        )));
                    }
                    *slot = Some(value.to_string());
                }
                None => {
                    let years: i32 = value.parse().map_err(|_| {
                        SubmissionError::Invalid(format!("tenure '{value}' is not a whole number"))
                    })?;
                    if !(0..=MAX_TENURE_YEARS).contains(&years) {
                        return Err(SubmissionError::Invalid(format!(
                            "tenure must be between 0 and {MAX_TENURE_YEARS} years"
                        )));
                    }
                    folded.tenure = Some(years);
                }
            }
        }

        Ok(folded)
    }

    fn categorical_mut(&mut self, attribute: Attribute) -> Option<&mut Option<String>> {
        match attribute {
            Attribute::Tenure => None,
            Attribute::LearningStyle => Some(&mut self.learning_style),
            Attribute::ShapedBy => Some(&mut self.shaped_by),
            Attribute::PeakPerformance => Some(&mut self.peak_performance),
            Attribute::Motivation => Some(&mut self.motivation),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueueItem {
    pub response_id: Uuid,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub unique_quality: String,
    pub tag: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ModerationDecision {
    pub response_id: Uuid,
    pub status: ModerationStatus,
    pub notes: Option<String>,
    pub tag: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ModerationRecord {
    pub id: Uuid,
    pub response_id: Uuid,
    pub status: ModerationStatus,
    pub moderator_id: Uuid,
    pub notes: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApprovedQuote {
    pub text: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub is_anonymous: bool,
}

impl ApprovedQuote {
    pub fn author(&self) -> String {
        if self.is_anonymous || self.first_name.trim().is_empty() {
            return "Anonymous".to_string();
        }
        match self.last_name.as_deref().filter(|name| !name.trim().is_empty()) {
            Some(last) => format!("{} {}", self.first_name, last),
            None => self.first_name.clone(),
        }
    }
}
