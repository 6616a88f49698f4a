//! Typed error type for the storage crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    // ------ Configuration errors (raised before any I/O) ------

    /// A required environment variable is absent or empty.
    #[error("{0} environment variable is required")]
    MissingEnv(&'static str),

    /// An optional environment variable holds an unparseable value.
    #[error("invalid value for {var}: '{value}'")]
    InvalidEnv { var: &'static str, value: String },

    // ------ Store errors ------

    #[error("sqlx error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("session store error: {0}")]
    Session(#[from] tower_sessions::session_store::Error),

    /// Uniqueness constraint failure reported by the in-memory store.
    #[error("duplicate value for {table}.{column}")]
    UniqueViolation {
        table: &'static str,
        column: &'static str,
    },

    /// Reference to a missing parent row, reported by the in-memory store.
    #[error("{table}.{column} references a missing row")]
    ForeignKeyViolation {
        table: &'static str,
        column: &'static str,
    },

    /// Text that does not parse as the column's type, reported by the
    /// in-memory store.
    #[error("invalid value for {table}.{column}: '{value}'")]
    InvalidValue {
        table: &'static str,
        column: &'static str,
        value: String,
    },

    /// The table's id sequence reached `i32::MAX`, reported by the
    /// in-memory store.
    #[error("id sequence for {table} is exhausted")]
    SequenceExhausted { table: &'static str },
}

/// Postgres `invalid_text_representation`.
const INVALID_TEXT_REPRESENTATION: &str = "22P02";

impl StorageError {
    /// `true` when the store rejected a write because of a uniqueness
    /// constraint, whichever backend reported it.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::UniqueViolation { .. } => true,
            Self::Database(sqlx::Error::Database(db)) => db.is_unique_violation(),
            _ => false,
        }
    }

    /// `true` when a write referenced a parent row that does not exist.
    pub fn is_foreign_key_violation(&self) -> bool {
        match self {
            Self::ForeignKeyViolation { .. } => true,
            Self::Database(sqlx::Error::Database(db)) => db.is_foreign_key_violation(),
            _ => false,
        }
    }

    /// `true` when a written value could not be parsed as the column's type.
    pub fn is_invalid_value(&self) -> bool {
        match self {
            Self::InvalidValue { .. } => true,
            Self::Database(sqlx::Error::Database(db)) => {
                db.code().as_deref() == Some(INVALID_TEXT_REPRESENTATION)
            }
            _ => false,
        }
    }

    /// `true` for errors raised while validating configuration.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::MissingEnv(_) | Self::InvalidEnv { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_violation_is_detected() {
        let err = StorageError::UniqueViolation { table: "users", column: "username" };
        assert!(err.is_unique_violation());
        assert_eq!(err.to_string(), "duplicate value for users.username");
    }

    #[test]
    fn other_sqlx_errors_are_not_unique_violations() {
        let err = StorageError::from(sqlx::Error::RowNotFound);
        assert!(!err.is_unique_violation());
        assert!(!err.is_config());
    }

    #[test]
    fn invalid_value_is_detected() {
        let err = StorageError::InvalidValue {
            table: "energy_readings",
            column: "consumption",
            value: "lots".into(),
        };
        assert!(err.is_invalid_value());
        assert!(!err.is_unique_violation());
        assert_eq!(err.to_string(), "invalid value for energy_readings.consumption: 'lots'");
    }

    #[test]
    fn missing_env_message_names_the_variable() {
        let err = StorageError::MissingEnv("DATABASE_URL");
        assert!(err.is_config());
        assert_eq!(err.to_string(), "DATABASE_URL environment variable is required");
    }
}
