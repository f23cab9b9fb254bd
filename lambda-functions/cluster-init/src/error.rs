use serde::Serialize;
use std::error::Error as StdError;
use thiserror::Error;

/// Joins an error with every cause in its `source()` chain.
pub fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// A database failure reduced to what the caller gets to see: the SQLSTATE
/// (when the server sent one) and the message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{message}")]
pub struct DbError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub message: String,
}

impl DbError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    /// JSON rendering used in response bodies.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.message.clone())
    }
}

impl From<tokio_postgres::Error> for DbError {
    fn from(err: tokio_postgres::Error) -> Self {
        match err.as_db_error() {
            Some(db_err) => Self::with_code(db_err.code().code(), db_err.message()),
            None => Self::new(error_chain(&err)),
        }
    }
}

#[derive(Debug, Error)]
pub enum SecretStoreError {
    #[error("secret store request failed: {0}")]
    Request(String),

    #[error("secret {0} has no string value")]
    MissingSecretString(String),

    #[error("secret payload is not a valid credential bundle: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Every way an initialization run can stop. The `Display` text of each
/// variant is the body returned to the caller.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Error fetching secret from SecretsManager")]
    SecretFetch(#[source] SecretStoreError),

    #[error("Error connecting to database: {}", .0.to_json())]
    Connection(DbError),

    // Never escalated, only logged.
    #[error("Error ensuring extension: {}", .0.to_json())]
    ExtensionSetup(DbError),

    #[error("Error creating table: {}", .0.to_json())]
    SchemaCreation(DbError),

    #[error("Error inserting row: {}", .0.to_json())]
    Insert(DbError),

    #[error("Error selecting rows: {}", .0.to_json())]
    Select(DbError),

    #[error("Error verifying round trip: expected {expected}, found {found}")]
    Verification { expected: String, found: String },
}
