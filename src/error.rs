// ⚠️ Error taxonomy for the resolution + profiling run
//
// Only configuration/shape problems are errors. Unresolvable owners and
// metrics with too few events are encoded in the data (null / sentinel).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// Required columns absent from an input relation. Fatal, aborts before any write.
    #[error("Relation '{table}' is missing required columns: {}", columns.join(", "))]
    MissingColumns { table: String, columns: Vec<String> },

    #[error("Relation not found: {0}")]
    MissingTable(String),

    /// A required cell is null or cannot be parsed
    #[error("Invalid value in '{table}.{column}' at row {row}: {message}")]
    InvalidValue {
        table: String,
        column: String,
        row: usize,
        message: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn invalid_value(table: &str, column: &str, row: usize, message: impl Into<String>) -> Self {
        EngineError::InvalidValue {
            table: table.to_string(),
            column: column.to_string(),
            row,
            message: message.into(),
        }
    }

    /// Configuration errors abort the run before anything is written
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            EngineError::MissingColumns { .. } | EngineError::MissingTable(_) | EngineError::InvalidConfig(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_columns_message_lists_columns() {
        let err = EngineError::MissingColumns {
            table: "cleaned_transactions".to_string(),
            columns: vec!["accountno".to_string(), "benfullname".to_string()],
        };

        assert_eq!(
            err.to_string(),
            "Relation 'cleaned_transactions' is missing required columns: accountno, benfullname"
        );
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_invalid_value_is_not_configuration_error() {
        let err = EngineError::invalid_value("cleaned_transactions", "amountinbirr", 3, "value is null");
        assert!(!err.is_configuration_error());
        assert!(err.to_string().contains("amountinbirr"));
    }
}
