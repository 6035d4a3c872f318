use std::collections::HashSet;

use anyhow::Context;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ModerationError, SubmissionError};
use crate::models::{
    Answer, ApprovedQuote, ModerationDecision, ModerationRecord, ModerationStatus, QueueItem,
    ResponseRecord, Submission, SurveyAnswers,
};
use crate::settings::DataSource;

/// Only the free-text statement goes through moderation.
pub const MODERATED_FIELD: &str = "unique_quality";

const RESPONSE_SELECT: &str = r#"
    SELECT r.id, a.first_name, a.last_name, a.is_anonymous,
           r.tenure, r.learning_style, r.shaped_by, r.peak_performance, r.motivation,
           r.unique_quality, r.status, r.tag, r.test_data, r.created_at
    FROM conference_pulse.survey_responses r
    JOIN conference_pulse.attendees a ON a.id = r.attendee_id
"#;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn response_from_row(row: &PgRow) -> anyhow::Result<ResponseRecord> {
    let status: String = row.get("status");
    let status: ModerationStatus = status.parse().map_err(|err: String| anyhow::anyhow!(err))?;

    Ok(ResponseRecord {
        id: row.get("id"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        is_anonymous: row.get("is_anonymous"),
        tenure: row.get("tenure"),
        learning_style: row.get("learning_style"),
        shaped_by: row.get("shaped_by"),
        peak_performance: row.get("peak_performance"),
        motivation: row.get("motivation"),
        unique_quality: row.get("unique_quality"),
        status,
        tag: row.get("tag"),
        test_data: row.get("test_data"),
        created_at: row.get("created_at"),
    })
}

/// Every response of one data source, oldest first.
pub async fn fetch_responses(pool: &PgPool, source: DataSource) -> anyhow::Result<Vec<ResponseRecord>> {
    let query = format!("{RESPONSE_SELECT} WHERE r.test_data = $1 ORDER BY r.created_at, r.id");
    let rows = sqlx::query(&query)
        .bind(source.is_test())
        .fetch_all(pool)
        .await
        .context("failed to fetch survey responses")?;

    rows.iter().map(response_from_row).collect()
}

pub async fn fetch_response(pool: &PgPool, id: Uuid) -> anyhow::Result<Option<ResponseRecord>> {
    let query = format!("{RESPONSE_SELECT} WHERE r.id = $1");
    let row = sqlx::query(&query).bind(id).fetch_optional(pool).await?;
    row.as_ref().map(response_from_row).transpose()
}

async fn insert_attendee(
    conn: &mut PgConnection,
    first_name: &str,
    last_name: Option<&str>,
    email: Option<&str>,
    is_anonymous: bool,
) -> Result<Uuid, sqlx::Error> {
    let row = sqlx::query(
        r#"
        INSERT INTO conference_pulse.attendees (id, first_name, last_name, email, is_anonymous)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(first_name)
    .bind(last_name)
    .bind(email)
    .bind(is_anonymous)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row.get("id"))
}

/// Insert one response row and its raw answers. Returns `None` when a row
/// with the same `source_key` already exists.
async fn insert_response(
    conn: &mut PgConnection,
    attendee_id: Uuid,
    folded: &SurveyAnswers,
    answers: &[Answer],
    test_data: bool,
    source_key: Option<&str>,
) -> Result<Option<Uuid>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        INSERT INTO conference_pulse.survey_responses
        (id, attendee_id, tenure, learning_style, shaped_by, peak_performance, motivation,
         unique_quality, test_data, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (source_key) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(attendee_id)
    .bind(folded.tenure)
    .bind(&folded.learning_style)
    .bind(&folded.shaped_by)
    .bind(&folded.peak_performance)
    .bind(&folded.motivation)
    .bind(&folded.unique_quality)
    .bind(test_data)
    .bind(source_key)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let response_id: Uuid = row.get("id");

    for answer in answers.iter().filter(|a| !a.answer.trim().is_empty()) {
        sqlx::query(
            r#"
            INSERT INTO conference_pulse.survey_answers (id, response_id, question, answer)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(response_id)
        .bind(answer.question.trim())
        .bind(answer.answer.trim())
        .execute(&mut *conn)
        .await?;
    }

    Ok(Some(response_id))
}

/// Validate and store a submission: one attendee, one response, one row per
/// answered question, all or nothing.
pub async fn submit_survey(pool: &PgPool, submission: &Submission) -> Result<Uuid, SubmissionError> {
    let folded = SurveyAnswers::from_answers(&submission.answers)?;

    let first_name = submission.first_name.trim();
    let first_name = match (first_name.is_empty(), submission.is_anonymous) {
        (false, _) => first_name,
        (true, true) => "Anonymous",
        (true, false) => {
            return Err(SubmissionError::Invalid("first name is required".to_string()))
        }
    };
    let last_name = submission
        .last_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());
    let email = submission.email();

    let mut tx = pool.begin().await?;
    let attendee_id = insert_attendee(
        &mut tx,
        first_name,
        last_name,
        email.as_deref(),
        submission.is_anonymous,
    )
    .await?;
    let response_id = insert_response(
        &mut tx,
        attendee_id,
        &folded,
        &submission.answers,
        submission.test_data,
        None,
    )
    .await?
    .ok_or(SubmissionError::Duplicate)?;
    tx.commit().await?;

    info!(%response_id, anonymous = submission.is_anonymous, "survey submitted");
    Ok(response_id)
}

pub async fn moderation_queue(pool: &PgPool) -> anyhow::Result<Vec<QueueItem>> {
    let rows = sqlx::query(
        r#"
        SELECT r.id, a.first_name, a.last_name, a.email, r.unique_quality, r.tag, r.created_at
        FROM conference_pulse.survey_responses r
        JOIN conference_pulse.attendees a ON a.id = r.attendee_id
        WHERE r.status = 'pending'
          AND r.unique_quality IS NOT NULL
          AND btrim(r.unique_quality) <> ''
        ORDER BY r.created_at
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut queue = Vec::new();
    for row in rows {
        queue.push(QueueItem {
            response_id: row.get("id"),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            email: row.get("email"),
            unique_quality: row.get("unique_quality"),
            tag: row.get("tag"),
            created_at: row.get("created_at"),
        });
    }

    Ok(queue)
}

#[derive(Debug, Clone)]
pub struct ModeratorSession {
    pub moderator_id: Uuid,
    pub email: String,
    pub started_at: DateTime<Utc>,
}

/// Look up an active moderator by email.
pub async fn authenticate_moderator(pool: &PgPool, email: &str) -> Result<ModeratorSession, ModerationError> {
    let email = email.trim().to_ascii_lowercase();
    let row = sqlx::query(
        "SELECT id FROM conference_pulse.moderators WHERE lower(email) = $1 AND active",
    )
    .bind(&email)
    .fetch_optional(pool)
    .await?;

    let row = row.ok_or(ModerationError::PermissionDenied)?;
    Ok(ModeratorSession {
        moderator_id: row.get("id"),
        email,
        started_at: Utc::now(),
    })
}

pub async fn refresh_session(pool: &PgPool, session: &ModeratorSession) -> Result<ModeratorSession, ModerationError> {
    authenticate_moderator(pool, &session.email).await
}

async fn apply_decision(
    pool: &PgPool,
    session: &ModeratorSession,
    decision: &ModerationDecision,
) -> Result<ModerationRecord, ModerationError> {
    let mut tx = pool.begin().await?;

    let active: Option<bool> =
        sqlx::query("SELECT active FROM conference_pulse.moderators WHERE id = $1")
            .bind(session.moderator_id)
            .fetch_optional(&mut *tx)
            .await?
            .map(|row| row.get("active"));
    if active != Some(true) {
        return Err(ModerationError::PermissionDenied);
    }

    let status: String = sqlx::query(
        "SELECT status FROM conference_pulse.survey_responses WHERE id = $1 FOR UPDATE",
    )
    .bind(decision.response_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(ModerationError::NotFound(decision.response_id))?
    .get("status");
    if status != ModerationStatus::Pending.as_str() {
        return Err(ModerationError::AlreadyModerated(decision.response_id));
    }

    let row = sqlx::query(
        r#"
        INSERT INTO conference_pulse.moderation
        (id, response_id, field_name, status, moderator_id, notes)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (response_id, field_name) DO UPDATE
        SET status = EXCLUDED.status,
            moderator_id = EXCLUDED.moderator_id,
            notes = EXCLUDED.notes,
            updated_at = now()
        RETURNING id, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(decision.response_id)
    .bind(MODERATED_FIELD)
    .bind(decision.status.as_str())
    .bind(session.moderator_id)
    .bind(&decision.notes)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        UPDATE conference_pulse.survey_responses
        SET status = $2, moderated_at = now(), tag = COALESCE($3, tag), updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(decision.response_id)
    .bind(decision.status.as_str())
    .bind(&decision.tag)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(ModerationRecord {
        id: row.get("id"),
        response_id: decision.response_id,
        status: decision.status,
        moderator_id: session.moderator_id,
        notes: decision.notes.clone(),
        updated_at: row.get("updated_at"),
    })
}

/// Approve or reject a pending response. A permission failure refreshes the
/// moderator session and retries once before giving up.
pub async fn moderate(
    pool: &PgPool,
    moderator_email: &str,
    decision: &ModerationDecision,
) -> Result<ModerationRecord, ModerationError> {
    if decision.status == ModerationStatus::Pending {
        return Err(ModerationError::InvalidDecision);
    }

    let session = authenticate_moderator(pool, moderator_email).await?;
    match apply_decision(pool, &session, decision).await {
        Err(ModerationError::PermissionDenied) => {
            warn!(
                moderator = %session.email,
                session_started = %session.started_at,
                "permission denied, refreshing session"
            );
            let session = refresh_session(pool, &session).await?;
            apply_decision(pool, &session, decision).await
        }
        result => result,
    }
}

pub async fn approved_quotes(pool: &PgPool, source: DataSource) -> anyhow::Result<Vec<ApprovedQuote>> {
    let rows = sqlx::query(
        r#"
        SELECT r.unique_quality, a.first_name, a.last_name, a.is_anonymous
        FROM conference_pulse.survey_responses r
        JOIN conference_pulse.attendees a ON a.id = r.attendee_id
        WHERE r.status = 'approved'
          AND r.test_data = $1
          AND r.unique_quality IS NOT NULL
          AND btrim(r.unique_quality) <> ''
        ORDER BY r.moderated_at DESC NULLS LAST, r.created_at DESC
        "#,
    )
    .bind(source.is_test())
    .fetch_all(pool)
    .await?;

    let mut quotes = Vec::new();
    for row in rows {
        quotes.push(ApprovedQuote {
            text: row.get("unique_quality"),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            is_anonymous: row.get("is_anonymous"),
        });
    }

    Ok(quotes)
}

#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    first_name: String,
    last_name: Option<String>,
    email: Option<String>,
    #[serde(default)]
    is_anonymous: bool,
    tenure: Option<i32>,
    learning_style: Option<String>,
    shaped_by: Option<String>,
    peak_performance: Option<String>,
    motivation: Option<String>,
    unique_quality: Option<String>,
    #[serde(default)]
    test_data: bool,
    source_key: Option<String>,
}

impl CsvRow {
    fn answers(&self) -> Vec<Answer> {
        let columns = [
            ("tenure", self.tenure.map(|years| years.to_string())),
            ("learning_style", self.learning_style.clone()),
            ("shaped_by", self.shaped_by.clone()),
            ("peak_performance", self.peak_performance.clone()),
            ("motivation", self.motivation.clone()),
            ("unique_quality", self.unique_quality.clone()),
        ];

        columns
            .into_iter()
            .filter_map(|(question, value)| {
                value.map(|answer| Answer {
                    question: question.to_string(),
                    answer,
                })
            })
            .collect()
    }

    fn email(&self) -> Option<String> {
        self.email
            .as_deref()
            .map(|email| email.trim().to_ascii_lowercase())
            .filter(|email| !email.is_empty())
    }
}

/// A CSV row that passed deserialisation and validation.
#[derive(Debug)]
struct ImportRow {
    line: usize,
    row: CsvRow,
    answers: Vec<Answer>,
    folded: SurveyAnswers,
    source_key: String,
}

impl CsvRow {
    /// Rows without an explicit key get one derived from their content, so
    /// re-importing the same file always produces the same keys.
    fn source_key(&self, answers: &[Answer]) -> String {
        if let Some(key) = self.source_key.as_deref().map(str::trim).filter(|key| !key.is_empty()) {
            return key.to_string();
        }

        let mut content = format!(
            "{}|{}|{}|{}",
            self.first_name.trim(),
            self.last_name.as_deref().unwrap_or_default().trim(),
            self.email().unwrap_or_default(),
            self.test_data
        );
        for answer in answers {
            content.push('|');
            content.push_str(&answer.question);
            content.push('=');
            content.push_str(answer.answer.trim());
        }
        format!("import-{}", Uuid::new_v5(&Uuid::NAMESPACE_OID, content.as_bytes()))
    }
}

/// Read every usable row. Malformed and invalid rows are logged with their
/// line number and skipped, as are repeated keys within the file.
fn read_rows<R: std::io::Read>(mut reader: csv::Reader<R>) -> Vec<ImportRow> {
    let mut rows = Vec::new();
    let mut keys = HashSet::new();

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let line = index + 2;
        let row = match result {
            Ok(row) => row,
            Err(err) => {
                warn!(line, error = %err, "skipping malformed csv row");
                continue;
            }
        };
        let answers = row.answers();
        let folded = match SurveyAnswers::from_answers(&answers) {
            Ok(folded) => folded,
            Err(err) => {
                warn!(line, error = %err, "skipping invalid csv row");
                continue;
            }
        };

        let source_key = row.source_key(&answers);
        if !keys.insert(source_key.clone()) {
            warn!(line, %source_key, "skipping repeated source key");
            continue;
        }
        rows.push(ImportRow {
            line,
            row,
            answers,
            folded,
            source_key,
        });
    }

    rows
}

fn unseen(rows: Vec<ImportRow>, existing: &HashSet<String>) -> Vec<ImportRow> {
    rows.into_iter()
        .filter(|row| {
            let seen = existing.contains(&row.source_key);
            if seen {
                debug!(line = row.line, source_key = %row.source_key, "already imported");
            }
            !seen
        })
        .collect()
}

async fn existing_source_keys(pool: &PgPool, rows: &[ImportRow]) -> anyhow::Result<HashSet<String>> {
    let keys: Vec<String> = rows.iter().map(|row| row.source_key.clone()).collect();
    let found = sqlx::query(
        r#"
        SELECT source_key
        FROM conference_pulse.survey_responses
        WHERE source_key = ANY($1)
        "#,
    )
    .bind(keys)
    .fetch_all(pool)
    .await
    .context("failed to look up imported source keys")?;

    Ok(found.iter().map(|row| row.get("source_key")).collect())
}

/// Import full survey rows. Rows already imported under the same
/// `source_key` are skipped; malformed or invalid rows and rows whose email
/// already belongs to another attendee are logged and skipped.
pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let rows = read_rows(reader);
    let existing = existing_source_keys(pool, &rows).await?;
    let rows = unseen(rows, &existing);
    let mut inserted = 0usize;

    for ImportRow {
        line,
        row,
        answers,
        folded,
        source_key,
    } in rows
    {
        let email = row.email();
        let mut tx = pool.begin().await?;
        let attendee_id = match insert_attendee(
            &mut tx,
            row.first_name.trim(),
            row.last_name.as_deref(),
            email.as_deref(),
            row.is_anonymous,
        )
        .await
        .map_err(SubmissionError::from)
        {
            Ok(id) => id,
            Err(SubmissionError::EmailExists) => {
                warn!(line, %source_key, "skipping csv row with an email already on file");
                continue;
            }
            Err(err) => {
                return Err(err).with_context(|| format!("failed to insert attendee on line {line}"))
            }
        };

        let response = insert_response(
            &mut tx,
            attendee_id,
            &folded,
            &answers,
            row.test_data,
            Some(&source_key),
        )
        .await?;

        // A concurrent import of the same key rolls back the attendee as well.
        if response.is_some() {
            tx.commit().await?;
            inserted += 1;
        }
    }

    info!(inserted, already_imported = existing.len(), "csv import finished");
    Ok(inserted)
}

const SEED_MODERATOR: (&str, &str, &str) = (
    "8f0e4c1a-6d2b-4b7e-9c3a-1f5d7e9b2a40",
    "moderator@conference-pulse.dev",
    "Event Moderator",
);

type SeedRow = (
    &'static str,
    &'static str,
    Option<&'static str>,
    bool,
    i32,
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    ModerationStatus,
);

const SEED_ROWS: &[SeedRow] = &[
    ("seed-001", "Avery", Some("Lee"), false, 3, "Visual", "Education or School Environment", "Extrovert, Morning", "Learning and growth", "I remember every customer's dog's name.", ModerationStatus::Approved),
    ("seed-002", "Jules", Some("Moreno"), false, 8, "Auditory", "Travel or Exposure to Different Cultures", "Ambivert, Night", "Exploring new possibilities", "I have lived in six countries.", ModerationStatus::Approved),
    ("seed-003", "Kiara", Some("Patel"), true, 22, "Visual", "Family Traditions", "Introvert, Morning", "Leading or mentoring others", "I mentor every new hire on my floor.", ModerationStatus::Approved),
    ("seed-004", "Mateo", Some("Silva"), false, 14, "Kinesthetic (Doing)", "Sports or the Arts", "Extrovert, Evening", "Making a difference", "I coach a youth football team on weekends.", ModerationStatus::Pending),
    ("seed-005", "Priya", None, false, 1, "Interactive/Collaborative", "Community or Neighbors", "Ambivert, Morning", "Building strong relationships", "I started the office book club.", ModerationStatus::Pending),
    ("seed-006", "Noah", Some("Becker"), false, 17, "Reading/Writing", "Personal Challenges or Adversity", "Introvert, Night", "Finding balance or peace", "I write haiku during stand-ups.", ModerationStatus::Rejected),
    ("seed-007", "Lena", Some("Okafor"), true, 6, "Visual", "Religion or Spiritual Practices", "Introvert, Morning", "Achieving personal goals", "", ModerationStatus::Pending),
];

/// Seed a moderator and a small test dataset. Safe to run repeatedly.
pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let (moderator_id, moderator_email, moderator_name) = SEED_MODERATOR;
    sqlx::query(
        r#"
        INSERT INTO conference_pulse.moderators (id, email, display_name)
        VALUES ($1, $2, $3)
        ON CONFLICT (email) DO UPDATE
        SET display_name = EXCLUDED.display_name, active = TRUE
        "#,
    )
    .bind(Uuid::parse_str(moderator_id)?)
    .bind(moderator_email)
    .bind(moderator_name)
    .execute(pool)
    .await?;

    for &(source_key, first_name, last_name, is_anonymous, tenure, style, shaped, peak, motivation, quality, status) in
        SEED_ROWS
    {
        let answers = vec![
            Answer { question: "tenure".to_string(), answer: tenure.to_string() },
            Answer { question: "learning_style".to_string(), answer: style.to_string() },
            Answer { question: "shaped_by".to_string(), answer: shaped.to_string() },
            Answer { question: "peak_performance".to_string(), answer: peak.to_string() },
            Answer { question: "motivation".to_string(), answer: motivation.to_string() },
            Answer { question: "unique_quality".to_string(), answer: quality.to_string() },
        ];
        let folded = SurveyAnswers::from_answers(&answers)?;

        let mut tx = pool.begin().await?;
        let attendee_id = insert_attendee(&mut tx, first_name, last_name, None, is_anonymous).await?;
        let Some(response_id) =
            insert_response(&mut tx, attendee_id, &folded, &answers, true, Some(source_key)).await?
        else {
            continue;
        };

        if status != ModerationStatus::Pending {
            sqlx::query(
                r#"
                UPDATE conference_pulse.survey_responses
                SET status = $2, moderated_at = now()
                WHERE id = $1
                "#,
            )
            .bind(response_id)
            .bind(status.as_str())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csv_row(tenure: Option<i32>, style: Option<&str>) -> CsvRow {
        CsvRow {
            first_name: "Avery".to_string(),
            last_name: None,
            email: Some("  Avery.Lee@Example.com ".to_string()),
            is_anonymous: false,
            tenure,
            learning_style: style.map(str::to_string),
            shaped_by: None,
            peak_performance: None,
            motivation: Some("Learning and growth".to_string()),
            unique_quality: None,
            test_data: false,
            source_key: Some("row-1".to_string()),
        }
    }

    #[test]
    fn csv_rows_become_answers_for_present_columns() {
        let row = csv_row(Some(4), Some("Visual"));
        let answers = row.answers();
        let questions: Vec<&str> = answers.iter().map(|a| a.question.as_str()).collect();
        assert_eq!(questions, vec!["tenure", "learning_style", "motivation"]);

        let folded = SurveyAnswers::from_answers(&answers).unwrap();
        assert_eq!(folded.tenure, Some(4));
        assert_eq!(row.email().as_deref(), Some("avery.lee@example.com"));
    }

    #[test]
    fn csv_rows_with_unknown_options_fail_validation() {
        let row = csv_row(Some(4), Some("Osmosis"));
        assert!(SurveyAnswers::from_answers(&row.answers()).is_err());
    }

    #[test]
    fn csv_header_parses() {
        let data = "first_name,last_name,email,is_anonymous,tenure,learning_style,shaped_by,peak_performance,motivation,unique_quality,test_data,source_key\n\
                    Jules,,,true,12,Auditory,,,,I juggle,true,k-1\n";
        let mut reader = csv::Reader::from_reader(data.as_bytes());
        let rows: Vec<CsvRow> = reader.deserialize().collect::<Result<_, _>>().unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_anonymous);
        assert_eq!(rows[0].tenure, Some(12));
        assert_eq!(rows[0].email(), None);
        assert_eq!(rows[0].answers().len(), 3);
    }

    const HEADER: &str = "first_name,last_name,email,is_anonymous,tenure,learning_style,shaped_by,peak_performance,motivation,unique_quality,test_data,source_key\n";

    fn rows_from(body: &str) -> Vec<ImportRow> {
        let data = format!("{HEADER}{body}");
        read_rows(csv::Reader::from_reader(data.as_bytes()))
    }

    #[test]
    fn malformed_rows_are_skipped_without_stopping_the_import() {
        let rows = rows_from(
            "Avery,Lee,avery@example.com,false,4,Visual,,,,,false,k-1\n\
             Jules,,,maybe,abc,Auditory,,,,,false,k-2\n\
             Kiara,Patel,,true,22,Visual,,,,,false,k-3\n",
        );
        let keys: Vec<&str> = rows.iter().map(|row| row.source_key.as_str()).collect();
        assert_eq!(keys, vec!["k-1", "k-3"]);
        assert_eq!(rows[1].line, 4);
    }

    #[test]
    fn invalid_and_repeated_rows_are_skipped() {
        let rows = rows_from(
            "Avery,Lee,,false,4,Osmosis,,,,,false,k-1\n\
             Jules,,,false,9,Auditory,,,,,false,k-2\n\
             Jules,,,false,9,Auditory,,,,,false,k-2\n",
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].source_key, "k-2");
    }

    #[test]
    fn reimporting_a_file_inserts_nothing() {
        let body = "Avery,Lee,avery@example.com,false,4,Visual,,,,,false,k-1\n\
                    Jules,,,true,12,Auditory,,,,I juggle,true,\n";
        let first = unseen(rows_from(body), &HashSet::new());
        assert_eq!(first.len(), 2);

        let stored: HashSet<String> = first.iter().map(|row| row.source_key.clone()).collect();
        assert!(unseen(rows_from(body), &stored).is_empty());
    }

    #[test]
    fn keyless_rows_get_a_stable_content_key() {
        let mut row = csv_row(Some(4), Some("Visual"));
        row.source_key = Some("  ".to_string());
        let answers = row.answers();
        let key = row.source_key(&answers);
        assert!(key.starts_with("import-"));
        assert_eq!(key, row.source_key(&answers));

        row.tenure = Some(5);
        assert_ne!(key, row.source_key(&row.answers()));
    }

    #[test]
    fn seed_rows_are_valid_submissions() {
        for &(key, _, _, _, tenure, style, shaped, peak, motivation, _, _) in SEED_ROWS {
            let answers = vec![
                Answer { question: "tenure".into(), answer: tenure.to_string() },
                Answer { question: "learning_style".into(), answer: style.into() },
                Answer { question: "shaped_by".into(), answer: shaped.into() },
                Answer { question: "peak_performance".into(), answer: peak.into() },
                Answer { question: "motivation".into(), answer: motivation.into() },
            ];
            assert!(SurveyAnswers::from_answers(&answers).is_ok(), "{key}");
        }
    }
}
