use std::{fmt, path::PathBuf};

/// Result alias that carries the custom [`CosmologyError`] type.
pub type Result<T> = std::result::Result<T, CosmologyError>;

/// Location of a problem inside one of the canonical tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLocation {
    pub table: &'static str,
    /// Source line number, or `None` when the problem concerns the header
    /// or the table as a whole.
    pub row: Option<u64>,
    pub field: String,
}

impl TableLocation {
    pub fn new(table: &'static str, row: Option<u64>, field: impl Into<String>) -> Self {
        Self {
            table,
            row,
            field: field.into(),
        }
    }
}

impl fmt::Display for TableLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.row {
            Some(row) => write!(f, "{} line {} field `{}`", self.table, row, self.field),
            None => write!(f, "{} field `{}`", self.table, self.field),
        }
    }
}

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum CosmologyError {
    /// A table is malformed: missing column, duplicate key, unparsable cell.
    #[error("validation failed at {location}: {reason}")]
    Validation {
        location: TableLocation,
        reason: String,
    },
    /// The tables are well formed but do not fit together: dangling
    /// foreign key, orphaned mode, wrong mode count.
    #[error("integrity check failed at {location}: {reason}")]
    Integrity {
        location: TableLocation,
        reason: String,
    },
    #[error("nothing matches `{query}`{}", nearest_hint(.nearest))]
    NotFound {
        query: String,
        nearest: Option<String>,
    },
    #[error("`{query}` is ambiguous between {}", .candidates.join(", "))]
    AmbiguousQuery {
        query: String,
        candidates: Vec<String>,
    },
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Csv(#[from] csv::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Message(String),
}

fn nearest_hint(nearest: &Option<String>) -> String {
    match nearest {
        Some(alias) => format!(" (did you mean `{alias}`?)"),
        None => String::new(),
    }
}

impl CosmologyError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn validation(location: TableLocation, reason: impl Into<String>) -> Self {
        Self::Validation {
            location,
            reason: reason.into(),
        }
    }

    pub fn integrity(location: TableLocation, reason: impl Into<String>) -> Self {
        Self::Integrity {
            location,
            reason: reason.into(),
        }
    }

    /// True for errors that abort building a registry.
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. }
                | Self::Integrity { .. }
                | Self::Read { .. }
                | Self::Io(_)
                | Self::Csv(_)
        )
    }

    /// True for per-call lookup failures the caller can recover from.
    pub fn is_query_error(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::AmbiguousQuery { .. })
    }
}

impl From<&str> for CosmologyError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for CosmologyError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_errors_name_table_row_and_field() {
        let err = CosmologyError::validation(
            TableLocation::new("modes.csv", Some(7), "cardinality"),
            "expected an integer",
        );
        let text = err.to_string();
        assert!(text.contains("modes.csv"));
        assert!(text.contains("line 7"));
        assert!(text.contains("cardinality"));
        assert!(err.is_load_error());
        assert!(!err.is_query_error());
    }

    #[test]
    fn not_found_mentions_nearest_alias() {
        let err = CosmologyError::NotFound {
            query: "dorain".to_string(),
            nearest: Some("dorian".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "nothing matches `dorain` (did you mean `dorian`?)"
        );
        assert!(err.is_query_error());
    }
}
