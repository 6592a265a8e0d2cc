use std::io;

use thiserror::Error;

pub type PrismResult<T> = std::result::Result<T, PrismError>;

/// An invalid set of table parameters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unknown hash function \"{0}\"")]
    UnknownHashFunction(String),

    #[error("The charset cannot be empty")]
    EmptyCharset,

    #[error("The charset contains the character {0:?} more than once")]
    DuplicateCharacter(char),

    #[error("The maximum password length should be at least 1")]
    MaxPasswordLength,

    #[error("The chain length should be at least 1")]
    ChainLength,

    #[error("Prism only supports spaces up to 2^64, but the provided space is 2^{0}")]
    Space(u8),

    #[error("{0}")]
    Other(String),
}

#[derive(Error, Debug)]
pub enum PrismError {
    #[error("Invalid configuration: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Invalid password: {0}")]
    Validation(String),

    #[error("Failed to validate the rainbow table: {0}. Is the file corrupted?")]
    Format(String),

    #[error(
        "Unable to access the file at the given path. Make sure the right permissions are available"
    )]
    Io(#[from] io::Error),

    #[error("Failed to serialize the rainbow table")]
    Serialize,

    #[error("The rainbow table generation thread panicked")]
    Thread,
}
