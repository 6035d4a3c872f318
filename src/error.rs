use thiserror::Error;
use uuid::Uuid;

/// Postgres `unique_violation`.
pub const UNIQUE_VIOLATION: &str = "23505";
/// Postgres `insufficient_privilege`.
pub const INSUFFICIENT_PRIVILEGE: &str = "42501";

pub const ATTENDEE_EMAIL_CONSTRAINT: &str = "attendees_email_key";

#[derive(Error, Debug)]
pub enum SubmissionError {
    #[error("An account with this email already exists. Use a different email or submit anonymously.")]
    EmailExists,

    #[error("This data already exists. Check your information and try again.")]
    Duplicate,

    #[error("Invalid submission: {0}")]
    Invalid(String),

    #[error("Error submitting survey")]
    Backend(#[source] sqlx::Error),
}

impl From<sqlx::Error> for SubmissionError {
    fn from(err: sqlx::Error) -> Self {
        let (code, constraint) = database_error_parts(&err);
        match classify_submission(code.as_deref(), constraint.as_deref()) {
            SubmissionFailure::EmailExists => SubmissionError::EmailExists,
            SubmissionFailure::Duplicate => SubmissionError::Duplicate,
            SubmissionFailure::Other => SubmissionError::Backend(err),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionFailure {
    EmailExists,
    Duplicate,
    Other,
}

pub fn classify_submission(code: Option<&str>, constraint: Option<&str>) -> SubmissionFailure {
    match (code, constraint) {
        (Some(UNIQUE_VIOLATION), Some(ATTENDEE_EMAIL_CONSTRAINT)) => SubmissionFailure::EmailExists,
        (Some(UNIQUE_VIOLATION), _) => SubmissionFailure::Duplicate,
        _ => SubmissionFailure::Other,
    }
}

#[derive(Error, Debug)]
pub enum ModerationError {
    #[error("Permission denied. Check that this moderator has admin access.")]
    PermissionDenied,

    #[error("Response {0} not found")]
    NotFound(Uuid),

    #[error("Response {0} has already been moderated")]
    AlreadyModerated(Uuid),

    #[error("A moderation decision must be approved or rejected")]
    InvalidDecision,

    #[error("Failed to update moderation status")]
    Backend(#[source] sqlx::Error),
}

impl From<sqlx::Error> for ModerationError {
    fn from(err: sqlx::Error) -> Self {
        let (code, _) = database_error_parts(&err);
        if code.as_deref() == Some(INSUFFICIENT_PRIVILEGE) {
            return ModerationError::PermissionDenied;
        }
        ModerationError::Backend(err)
    }
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed settings file: {0}")]
    Parse(#[from] serde_json::Error),
}

fn database_error_parts(err: &sqlx::Error) -> (Option<String>, Option<String>) {
    match err {
        sqlx::Error::Database(db_err) => (
            db_err.code().map(|code| code.into_owned()),
            db_err.constraint().map(str::to_string),
        ),
        _ => (None, None),
    }
}
