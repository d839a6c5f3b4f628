//! Error types for the Rill query core.

use alloc::string::String;
use core::fmt;

/// Result type alias for Rill operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Broad classification of an error, matching the engine's abort policy:
/// configuration and schema errors abort the pipeline they belong to at
/// build or first-push time; invariant violations indicate an upstream bug
/// and are never swallowed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Schema,
    Invariant,
}

/// Error raised by the Rill query core.
#[derive(Debug, PartialEq)]
pub enum Error {
    /// Query references a table no source is registered for.
    UnknownTable { name: String },
    /// Query references a column the table schema does not declare.
    UnknownColumn { table: String, column: String },
    /// Aggregate kind is not supported at this position in the pipeline.
    UnsupportedAggregate { aggregate: String, context: String },
    /// A LIKE pattern ends with a dangling escape character.
    DanglingEscape { pattern: String },
    /// Condition or registration is malformed.
    InvalidQuery { message: String },
    /// Schema definition is invalid (empty primary key, reserved name, ...).
    InvalidSchema { message: String },
    /// A row is missing one of its primary-key columns.
    MissingPrimaryKey { column: String },
    /// A row carries NULL in a primary-key column.
    NullPrimaryKey { column: String },
    /// Two adds for one primary key without an intervening remove.
    DuplicateRow { table: String, key: String },
    /// Remove (or child change) addressed a row that is not present.
    MissingRow { table: String, key: String },
    /// Join constructed with the same operator as parent and child.
    SelfJoin { relationship: String },
    /// A structural invariant of the operator graph was violated.
    InvariantViolation { message: String },
}

impl Error {
    /// Returns the broad classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnknownTable { .. }
            | Error::UnknownColumn { .. }
            | Error::UnsupportedAggregate { .. }
            | Error::DanglingEscape { .. }
            | Error::InvalidQuery { .. } => ErrorKind::Configuration,
            Error::InvalidSchema { .. }
            | Error::MissingPrimaryKey { .. }
            | Error::NullPrimaryKey { .. } => ErrorKind::Schema,
            Error::DuplicateRow { .. }
            | Error::MissingRow { .. }
            | Error::SelfJoin { .. }
            | Error::InvariantViolation { .. } => ErrorKind::Invariant,
        }
    }

    /// Creates an unknown-table error.
    pub fn unknown_table(name: impl Into<String>) -> Self {
        Error::UnknownTable { name: name.into() }
    }

    /// Creates an unknown-column error.
    pub fn unknown_column(table: impl Into<String>, column: impl Into<String>) -> Self {
        Error::UnknownColumn {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Creates an unsupported-aggregate error.
    pub fn unsupported_aggregate(aggregate: impl Into<String>, context: impl Into<String>) -> Self {
        Error::UnsupportedAggregate {
            aggregate: aggregate.into(),
            context: context.into(),
        }
    }

    /// Creates a dangling-escape error.
    pub fn dangling_escape(pattern: impl Into<String>) -> Self {
        Error::DanglingEscape {
            pattern: pattern.into(),
        }
    }

    /// Creates an invalid-query error.
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Error::InvalidQuery {
            message: message.into(),
        }
    }

    /// Creates an invalid-schema error.
    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Error::InvalidSchema {
            message: message.into(),
        }
    }

    /// Creates a duplicate-row error.
    pub fn duplicate_row(table: impl Into<String>, key: impl Into<String>) -> Self {
        Error::DuplicateRow {
            table: table.into(),
            key: key.into(),
        }
    }

    /// Creates a missing-row error.
    pub fn missing_row(table: impl Into<String>, key: impl Into<String>) -> Self {
        Error::MissingRow {
            table: table.into(),
            key: key.into(),
        }
    }

    /// Creates an invariant-violation error.
    pub fn invariant(message: impl Into<String>) -> Self {
        Error::InvariantViolation {
            message: message.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnknownTable { name } => write!(f, "unknown table: {}", name),
            Error::UnknownColumn { table, column } => {
                write!(f, "unknown column {} in table {}", column, table)
            }
            Error::UnsupportedAggregate { aggregate, context } => {
                write!(f, "aggregate {} is not supported in {}", aggregate, context)
            }
            Error::DanglingEscape { pattern } => {
                write!(f, "LIKE pattern ends with dangling escape: {}", pattern)
            }
            Error::InvalidQuery { message } => write!(f, "invalid query: {}", message),
            Error::InvalidSchema { message } => write!(f, "invalid schema: {}", message),
            Error::MissingPrimaryKey { column } => {
                write!(f, "row is missing primary-key column {}", column)
            }
            Error::NullPrimaryKey { column } => {
                write!(f, "primary-key column {} is null", column)
            }
            Error::DuplicateRow { table, key } => {
                write!(f, "duplicate add for {} key {}", table, key)
            }
            Error::MissingRow { table, key } => {
                write!(f, "row not present in {}: {}", table, key)
            }
            Error::SelfJoin { relationship } => {
                write!(f, "join {} uses one operator as both parent and child", relationship)
            }
            Error::InvariantViolation { message } => {
                write!(f, "invariant violation: {}", message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn kinds() {
        assert_eq!(Error::unknown_table("t").kind(), ErrorKind::Configuration);
        assert_eq!(
            Error::invalid_schema("no pk").kind(),
            ErrorKind::Schema
        );
        assert_eq!(
            Error::duplicate_row("t", "[1]").kind(),
            ErrorKind::Invariant
        );
    }

    #[test]
    fn display() {
        let err = Error::unknown_column("issue", "priority");
        assert!(err.to_string().contains("priority"));
        let err = Error::dangling_escape("abc\\");
        assert!(err.to_string().contains("dangling"));
    }
}
