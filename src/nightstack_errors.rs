use thiserror::Error;

use crate::constants::ObsId;

#[derive(Error, Debug)]
pub enum NightstackError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid stage value: {0}")]
    InvalidStage(i64),

    #[error("Unknown status value: {0}")]
    UnknownStatus(String),

    #[error("Data integrity violation for exposure {id}: {reason}")]
    DataIntegrity { id: ObsId, reason: String },

    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsingError(#[from] toml::de::Error),

    #[error("Date parsing error: {0}")]
    DateParsingError(#[from] chrono::ParseError),
}

impl PartialEq for NightstackError {
    fn eq(&self, other: &Self) -> bool {
        use NightstackError::*;
        match (self, other) {
            (InvalidConfiguration(a), InvalidConfiguration(b)) => a == b,
            (InvalidStage(a), InvalidStage(b)) => a == b,
            (UnknownStatus(a), UnknownStatus(b)) => a == b,
            (
                DataIntegrity { id: a, reason: ra },
                DataIntegrity { id: b, reason: rb },
            ) => a == b && ra == rb,

            // Wrapped errors are not comparable: equal on same variant
            (SqliteError(_), SqliteError(_)) => true,
            (IoError(_), IoError(_)) => true,
            (TomlParsingError(_), TomlParsingError(_)) => true,

            (DateParsingError(a), DateParsingError(b)) => a == b,

            _ => false,
        }
    }
}
