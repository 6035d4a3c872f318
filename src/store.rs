use std::collections::BTreeMap;

use chrono::{Duration, TimeZone, Utc};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db;
use crate::models::{ModerationStatus, ResponseRecord};
use crate::settings::DataSource;

/// In-memory records behind the display, keyed by response id.
#[derive(Debug, Clone, Default)]
pub struct WorkingSet {
    source: DataSource,
    records: BTreeMap<Uuid, ResponseRecord>,
    sample: bool,
}

impl WorkingSet {
    pub fn new(source: DataSource, records: Vec<ResponseRecord>) -> Self {
        let mut set = Self {
            source,
            records: BTreeMap::new(),
            sample: false,
        };
        for record in records {
            set.upsert(record);
        }
        set
    }

    pub fn sample(source: DataSource) -> Self {
        Self {
            source,
            records: sample_records().into_iter().map(|r| (r.id, r)).collect(),
            sample: true,
        }
    }

    pub fn source(&self) -> DataSource {
        self.source
    }

    /// True when the records are the built-in fallback rather than stored data.
    pub fn is_sample(&self) -> bool {
        self.sample
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &ResponseRecord> {
        self.records.values()
    }

    /// Insert or replace by id. A record from the other data source is
    /// dropped, and removes any stale copy. Returns true when the set changed.
    pub fn upsert(&mut self, record: ResponseRecord) -> bool {
        if record.test_data != self.source.is_test() {
            return self.records.remove(&record.id).is_some();
        }
        if self.sample {
            self.records.clear();
            self.sample = false;
        }
        match self.records.get(&record.id) {
            Some(existing) if *existing == record => false,
            _ => {
                self.records.insert(record.id, record);
                true
            }
        }
    }

    pub fn remove(&mut self, id: &Uuid) -> Option<ResponseRecord> {
        if self.sample {
            return None;
        }
        self.records.remove(id)
    }
}

/// Fetch the working set for `source`, falling back to sample data when the
/// store is unreachable or has nothing to show.
pub async fn load(pool: &PgPool, source: DataSource) -> WorkingSet {
    match db::fetch_responses(pool, source).await {
        Ok(records) if records.is_empty() => {
            info!(?source, "no stored responses, showing sample data");
            WorkingSet::sample(source)
        }
        Ok(records) => {
            info!(?source, count = records.len(), "loaded responses");
            WorkingSet::new(source, records)
        }
        Err(err) => {
            warn!(?source, error = %err, "failed to fetch responses, showing sample data");
            WorkingSet::sample(source)
        }
    }
}

const SAMPLE_ROWS: &[(i32, &str, &str, &str, &str)] = &[
    (2, "Visual", "Education or School Environment", "Extrovert, Morning", "Learning and growth"),
    (4, "Kinesthetic (Doing)", "Sports or the Arts", "Ambivert, Morning", "Making a difference"),
    (1, "Interactive/Collaborative", "Community or Neighbors", "Extrovert, Evening", "Building strong relationships"),
    (7, "Visual", "Travel or Exposure to Different Cultures", "Introvert, Morning", "Exploring new possibilities"),
    (9, "Reading/Writing", "Family Traditions", "Introvert, Night", "Learning and growth"),
    (6, "Auditory", "Personal Challenges or Adversity", "Ambivert, Night", "Achieving personal goals"),
    (12, "Visual", "Education or School Environment", "Introvert, Morning", "Leading or mentoring others"),
    (14, "Interactive/Collaborative", "Family Traditions", "Extrovert, Morning", "Making a difference"),
    (11, "Kinesthetic (Doing)", "Religion or Spiritual Practices", "Ambivert, Morning", "Finding balance or peace"),
    (18, "Reading/Writing", "Personal Challenges or Adversity", "Introvert, Night", "Leading or mentoring others"),
    (17, "Visual", "Community or Neighbors", "Extrovert, Evening", "Building strong relationships"),
    (24, "Auditory", "Family Traditions", "Ambivert, Night", "Finding balance or peace"),
    (31, "Reading/Writing", "Religion or Spiritual Practices", "Introvert, Morning", "Leading or mentoring others"),
    (22, "Interactive/Collaborative", "Travel or Exposure to Different Cultures", "Extrovert, Morning", "Exploring new possibilities"),
    (3, "Auditory", "Sports or the Arts", "Extrovert, Evening", "Achieving personal goals"),
    (8, "Kinesthetic (Doing)", "Education or School Environment", "Ambivert, Morning", "Making a difference"),
];

const SAMPLE_NAMES: &[&str] = &[
    "Avery", "Jules", "Kiara", "Mateo", "Priya", "Noah", "Lena", "Omar", "Sofia", "Theo", "Hana",
    "Diego", "Ines", "Ravi", "Maya", "Felix",
];

/// Deterministic stand-in data used when nothing can be fetched.
pub fn sample_records() -> Vec<ResponseRecord> {
    let start = Utc
        .with_ymd_and_hms(2025, 3, 4, 9, 0, 0)
        .single()
        .unwrap_or_else(Utc::now);

    SAMPLE_ROWS
        .iter()
        .zip(SAMPLE_NAMES)
        .enumerate()
        .map(|(index, (&(tenure, style, shaped, peak, motivation), name))| ResponseRecord {
            id: Uuid::from_u128(0x5a3b_0000 + index as u128),
            first_name: name.to_string(),
            last_name: None,
            is_anonymous: index % 4 == 3,
            tenure: Some(tenure),
            learning_style: Some(style.to_string()),
            shaped_by: Some(shaped.to_string()),
            peak_performance: Some(peak.to_string()),
            motivation: Some(motivation.to_string()),
            unique_quality: None,
            status: ModerationStatus::Pending,
            tag: None,
            test_data: true,
            created_at: start + Duration::minutes(index as i64 * 7),
        })
        .collect()
}
