use thiserror::Error;

/// Errors raised by the block store, the journal and the VSFS metadata layer
#[derive(Debug, Error)]
pub enum VsfsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Short {what}: expected {expected} bytes, transferred {actual}")]
    ShortTransfer {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Journal full: append needs {needed} bytes but only {available} remain")]
    JournalFull { needed: usize, available: usize },

    #[error("Out of bounds: offset {offset} + length {len} exceeds limit {limit}")]
    OutOfBounds { offset: u64, len: usize, limit: u64 },

    #[error("Journal corrupt: {0}")]
    Corrupt(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Journal holds {used_bytes} bytes of unreplayed records; run install first")]
    DirtyJournal { used_bytes: u32 },

    #[error("Image is not a formatted VSFS image")]
    NotFormatted,

    #[error("No space left: {0}")]
    NoSpace(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),
}

/// Failure class of a [`VsfsError`], used for diagnostics at the command boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPhase {
    Io,
    Capacity,
    Corruption,
    Input,
}

impl VsfsError {
    pub fn phase(&self) -> ErrorPhase {
        match self {
            VsfsError::Io(_) | VsfsError::ShortTransfer { .. } => ErrorPhase::Io,
            VsfsError::JournalFull { .. } | VsfsError::NoSpace(_) => ErrorPhase::Capacity,
            VsfsError::OutOfBounds { .. } | VsfsError::Corrupt(_) | VsfsError::NotFormatted => {
                ErrorPhase::Corruption
            }
            VsfsError::InvalidInput(_)
            | VsfsError::DirtyJournal { .. }
            | VsfsError::AlreadyExists(_) => ErrorPhase::Input,
        }
    }

    /// Build a corruption error from anything displayable
    pub fn corrupt(msg: impl Into<String>) -> Self {
        VsfsError::Corrupt(msg.into())
    }
}

impl std::fmt::Display for ErrorPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorPhase::Io => "I/O",
            ErrorPhase::Capacity => "capacity",
            ErrorPhase::Corruption => "corruption",
            ErrorPhase::Input => "input",
        };
        f.write_str(name)
    }
}

pub type Result<T> = std::result::Result<T, VsfsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_classification() {
        let io = VsfsError::from(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        assert_eq!(io.phase(), ErrorPhase::Io);

        let full = VsfsError::JournalFull { needed: 4108, available: 12 };
        assert_eq!(full.phase(), ErrorPhase::Capacity);

        assert_eq!(VsfsError::corrupt("bad kind").phase(), ErrorPhase::Corruption);
        assert_eq!(VsfsError::DirtyJournal { used_bytes: 12324 }.phase(), ErrorPhase::Input);
    }

    #[test]
    fn test_messages_name_the_numbers() {
        let err = VsfsError::JournalFull { needed: 12316, available: 3940 };
        let msg = err.to_string();
        assert!(msg.contains("12316"));
        assert!(msg.contains("3940"));
    }
}
