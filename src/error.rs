use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error("token table {origin} contains no synonym groups")]
    EmptyTokenTable { origin: String },
}

/// A single wire line or record that could not be parsed. Never fatal: the
/// drivers count these and move on.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("line has no group key separator")]
    MissingKey,
    #[error("malformed record json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("record has {found} fields, expected at least {expected}")]
    TooFewFields { found: usize, expected: usize },
    #[error("field {field} has the wrong type: expected {expected}")]
    FieldType {
        field: &'static str,
        expected: &'static str,
    },
    #[error("field {field} is not a finite number")]
    NonFinite { field: &'static str },
    #[error("field {field} is outside the Mercator grid")]
    OutOfRange { field: &'static str },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("could not spawn sort: {0}")]
    SortSpawn(#[source] std::io::Error),
    #[error("sort exited with {0}")]
    SortFailed(std::process::ExitStatus),
    #[error("sort produced no readable output")]
    SortStdout,
}

/// Process exit status for a failed run: 2 for configuration problems
/// anywhere in the chain, 1 otherwise.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    if err.chain().any(|c| c.is::<ConfigError>()) {
        2
    } else {
        1
    }
}
