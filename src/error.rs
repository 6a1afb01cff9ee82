use thiserror::Error;

/// Errors raised by the task engine and the sequence it drives.
///
/// Only `InvalidConfiguration` is fatal: it is returned from construction and
/// no engine is produced. Everything else is local to one run and leaves the
/// engine state untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NBackError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The cursor was asked to move past the last position. COMPLETE should
    /// always pre-empt this, so seeing it means a policy bug.
    #[error("sequence exhausted: cannot advance past {length} numbers")]
    SequenceExhausted { length: usize },

    #[error("a response was already recorded for tick {index}")]
    DuplicateResponse { index: usize },

    #[error("the task has not been started")]
    NotStarted,

    #[error("the task is already complete")]
    Completed,
}

impl NBackError {
    /// Errors a presentation layer can log and carry on from.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            NBackError::DuplicateResponse { .. } | NBackError::NotStarted | NBackError::Completed
        )
    }
}

pub type Result<T, E = NBackError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_errors_are_fatal() {
        assert!(!NBackError::InvalidConfiguration("n".into()).is_recoverable());
        assert!(!NBackError::SequenceExhausted { length: 3 }.is_recoverable());
    }

    #[test]
    fn mid_run_errors_are_recoverable() {
        assert!(NBackError::DuplicateResponse { index: 2 }.is_recoverable());
        assert!(NBackError::NotStarted.is_recoverable());
        assert!(NBackError::Completed.is_recoverable());
    }

    #[test]
    fn messages_name_the_tick() {
        let err = NBackError::DuplicateResponse { index: 4 };
        assert_eq!(err.to_string(), "a response was already recorded for tick 4");
    }
}
