//! Error types for the event stream core.

use crate::registry::{EventCode, EventType};
use thiserror::Error;

/// Result type alias for evstream operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while decoding or tracking evdev events.
///
/// Buffer overflows and empty non-blocking reads are not errors; they are
/// reported through [`ReadOutcome`](crate::reader::ReadOutcome).
#[derive(Debug, Error)]
pub enum Error {
    /// The raw integer is not a known event type.
    #[error("unknown event type {0:#x}")]
    UnknownType(u16),

    /// The raw integer is outside the known code range of its type.
    #[error("unknown event code {code:#x} for {ty}")]
    UnknownCode {
        /// The event type the code was looked up in.
        ty: EventType,
        /// The raw code.
        code: u16,
    },

    /// No event type, code or property has this name.
    #[error("unknown event name: {0}")]
    UnknownName(String),

    /// The device has never reported a value for this code.
    #[error("no value recorded for {0}")]
    NoSuchAxis(EventCode),

    /// A raw record could not be decoded.
    ///
    /// When the record held an unknown type or code, `source` carries the
    /// registry error.
    #[error("malformed record: {reason}")]
    MalformedRecord {
        /// What was wrong with the record.
        reason: String,
        /// The registry lookup that failed, if any.
        #[source]
        source: Option<Box<Error>>,
    },

    /// An argument was outside its valid range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The byte source reached end-of-file during a blocking read.
    #[error("event source closed")]
    Closed,

    /// The byte source failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to serialize or deserialize a recording.
    #[cfg(feature = "recorder")]
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// A [`Error::MalformedRecord`] without an underlying cause.
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Error::MalformedRecord {
            reason: reason.into(),
            source: None,
        }
    }

    /// A [`Error::MalformedRecord`] caused by a failed registry lookup.
    pub(crate) fn undecodable(cause: Error) -> Self {
        Error::MalformedRecord {
            reason: cause.to_string(),
            source: Some(Box::new(cause)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_malformed_keeps_cause() {
        let err = Error::undecodable(Error::UnknownType(0x09));
        assert_eq!(err.to_string(), "malformed record: unknown event type 0x9");
        assert!(err.source().is_some());
        assert!(matches!(
            &err,
            Error::MalformedRecord { source: Some(cause), .. }
                if matches!(**cause, Error::UnknownType(0x09))
        ));

        let err = Error::malformed("short read");
        assert!(err.source().is_none());
    }
}
