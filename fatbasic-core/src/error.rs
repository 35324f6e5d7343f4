//! Error types for the file-command bridge.

use thiserror::Error;

/// Numeric error codes in the interpreter's taxonomy.
///
/// These are the values the error reporter prints; the bridge treats them as
/// opaque integers.
pub mod code {
    /// Generic syntax error.
    pub const SYNTAX: u16 = 1;
    /// Destination could not be created.
    pub const CREATE: u16 = 14;
    /// Generic I/O failure (bad drive, directory ops, source open).
    pub const IO: u16 = 15;
    /// Unexpected read failure mid-stream.
    pub const READ: u16 = 30;
    /// File write error (short write).
    pub const WRITE: u16 = 60;
    /// Path argument exceeds the path buffer.
    pub const PATH_LEN: u16 = 61;
}

/// Failures a bridge operation can signal back to the interpreter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BasicError {
    #[error("Syntax error")]
    Syntax,

    #[error("I/O error")]
    IoFailure,

    /// Source of a COPY could not be opened. Distinct class from the
    /// directory failures even though it shares their numeric code.
    #[error("Cannot open source")]
    SourceOpen,

    #[error("Cannot create destination")]
    CreateFailed,

    #[error("Unexpected read failure")]
    ReadFailed,

    #[error("File write error")]
    WriteFailed,

    #[error("Path too long")]
    PathTooLong,
}

impl BasicError {
    /// The numeric code surfaced to the interpreter's error reporter.
    pub fn code(&self) -> u16 {
        match self {
            BasicError::Syntax => code::SYNTAX,
            BasicError::IoFailure | BasicError::SourceOpen => code::IO,
            BasicError::CreateFailed => code::CREATE,
            BasicError::ReadFailed => code::READ,
            BasicError::WriteFailed => code::WRITE,
            BasicError::PathTooLong => code::PATH_LEN,
        }
    }
}

/// Result type for bridge operations.
pub type BasicResult<T> = Result<T, BasicError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_taxonomy() {
        assert_eq!(BasicError::Syntax.code(), 1);
        assert_eq!(BasicError::CreateFailed.code(), 14);
        assert_eq!(BasicError::IoFailure.code(), 15);
        assert_eq!(BasicError::SourceOpen.code(), 15);
        assert_eq!(BasicError::ReadFailed.code(), 30);
        assert_eq!(BasicError::WriteFailed.code(), 60);
        assert_eq!(BasicError::PathTooLong.code(), 61);
    }

    #[test]
    fn test_source_open_distinct_from_io() {
        // Same code, but the classes stay distinguishable in the type.
        assert_ne!(BasicError::SourceOpen, BasicError::IoFailure);
    }
}
