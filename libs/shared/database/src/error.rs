use serde::Deserialize;
use thiserror::Error;

use shared_models::error::AppError;

/// PostgreSQL SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";
/// PostgreSQL SQLSTATE for `foreign_key_violation`.
const FOREIGN_KEY_VIOLATION: &str = "23503";

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    #[error("Authentication error: {0}")]
    Unauthorized(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid header value: {0}")]
    InvalidHeader(String),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Error body returned by PostgREST.
#[derive(Debug, Deserialize)]
struct PostgrestError {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
}

impl DbError {
    /// Classify a failed PostgREST response.
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed = serde_json::from_str::<PostgrestError>(body).ok();
        let message = parsed
            .as_ref()
            .map(|e| match (&e.message, &e.details) {
                (Some(message), Some(details)) => format!("{} ({})", message, details),
                (Some(message), None) => message.clone(),
                _ => body.to_string(),
            })
            .unwrap_or_else(|| body.to_string());

        match parsed.as_ref().and_then(|e| e.code.as_deref()) {
            Some(UNIQUE_VIOLATION) => return DbError::UniqueViolation(message),
            Some(FOREIGN_KEY_VIOLATION) => return DbError::ForeignKeyViolation(message),
            _ => {}
        }

        match status {
            401 | 403 => DbError::Unauthorized(message),
            404 => DbError::NotFound(message),
            _ => DbError::Api { status, message },
        }
    }
}

impl From<DbError> for AppError {
    fn from(error: DbError) -> Self {
        match error {
            DbError::NotFound(msg) => AppError::NotFound(msg),
            DbError::UniqueViolation(_) => {
                AppError::Conflict("The requested change conflicts with existing data".to_string())
            }
            DbError::ForeignKeyViolation(_) => AppError::ValidationError(
                "The requested change references or is referenced by other records".to_string(),
            ),
            other => AppError::Database(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn classifies_constraint_violations_by_sqlstate() {
        let unique = DbError::from_response(
            409,
            r#"{"code":"23505","message":"duplicate key value","details":"Key exists"}"#,
        );
        assert_matches!(unique, DbError::UniqueViolation(msg) if msg.contains("duplicate key"));

        let fk = DbError::from_response(409, r#"{"code":"23503","message":"violates foreign key"}"#);
        assert_matches!(fk, DbError::ForeignKeyViolation(_));
    }

    #[test]
    fn classifies_by_status_when_no_code() {
        assert_matches!(DbError::from_response(401, "nope"), DbError::Unauthorized(_));
        assert_matches!(DbError::from_response(404, "missing"), DbError::NotFound(_));
        assert_matches!(
            DbError::from_response(500, "boom"),
            DbError::Api { status: 500, .. }
        );
    }

    #[test]
    fn foreign_key_violation_is_a_validation_error() {
        let app: AppError = DbError::ForeignKeyViolation("fk".to_string()).into();
        assert_matches!(app, AppError::ValidationError(_));
    }
}
