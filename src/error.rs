// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `victrola_sync` library.
//!
//! Failures are grouped by where they happen:
//!
//! - [`ValueError`]: a requested value was rejected before anything was sent
//! - [`CommandError`]: the device could not be reached or refused a request
//! - [`BackendError`]: a speaker backend could not list its speakers
//! - [`ParseError`]: a device response did not have the expected shape
//!
//! A verification drift is not an error. It is published as a
//! [`VerificationResult`](crate::sync::VerificationResult) after the request
//! was already accepted.

use thiserror::Error;

use crate::types::SourceType;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// The requested value was rejected before dispatch.
    #[error("invalid value: {0}")]
    Value(#[from] ValueError),

    /// The command could not be delivered to the device.
    #[error("command dispatch failed: {0}")]
    CommandDispatch(CommandError),

    /// Fetching the device state failed.
    #[error("state poll failed: {0}")]
    Poll(CommandError),

    /// A speaker backend failed.
    #[error("speaker backend error: {0}")]
    Backend(#[from] BackendError),

    /// Error occurred while parsing a response.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Device was not found in the manager.
    #[error("device not found")]
    DeviceNotFound,

    /// The configuration is invalid or could not be loaded.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Errors related to value validation and constraints.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// A numeric value is outside the allowed range.
    #[error("value {actual} is out of range [{min}, {max}]")]
    OutOfRange {
        /// Minimum allowed value.
        min: i64,
        /// Maximum allowed value.
        max: i64,
        /// The actual value that was provided.
        actual: i64,
    },

    /// The speaker id is not part of the source's current speaker list.
    #[error("unknown {source_type} speaker: {id}")]
    UnknownSpeaker {
        /// The source the speaker was requested for.
        source_type: SourceType,
        /// The requested speaker id.
        id: String,
    },

    /// A label did not name any known option.
    #[error("invalid label: {0}")]
    InvalidLabel(String),
}

/// Discriminant of a [`CommandError`], used where only the kind matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum CommandErrorKind {
    /// The device could not be reached.
    Unreachable,
    /// The device answered with an error or an invalid response.
    Rejected,
    /// The request did not complete in time.
    Timeout,
}

/// Errors raised by a single request to the device.
///
/// A command channel makes exactly one attempt per call; retrying is up to
/// the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Connection to the device failed.
    #[error("device unreachable: {0}")]
    Unreachable(String),

    /// The device returned an error or an unusable response.
    #[error("device rejected request: {0}")]
    Rejected(String),

    /// Request timed out.
    #[error("request timed out after {0} ms")]
    Timeout(u64),
}

impl CommandError {
    /// Returns the kind of this error.
    #[must_use]
    pub fn kind(&self) -> CommandErrorKind {
        match self {
            Self::Unreachable(_) => CommandErrorKind::Unreachable,
            Self::Rejected(_) => CommandErrorKind::Rejected,
            Self::Timeout(_) => CommandErrorKind::Timeout,
        }
    }
}

impl From<ParseError> for CommandError {
    fn from(err: ParseError) -> Self {
        Self::Rejected(err.to_string())
    }
}

/// Errors reported by speaker backends.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The backend is not available right now.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The backend answered but listing failed.
    #[error("backend failed: {0}")]
    Failed(String),
}

/// Errors related to parsing device responses.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Expected field is missing from the response.
    #[error("missing field in response: {0}")]
    MissingField(String),

    /// Unexpected response format.
    #[error("unexpected response format: {0}")]
    UnexpectedFormat(String),

    /// Failed to parse a specific value.
    #[error("failed to parse {field}: {message}")]
    InvalidValue {
        /// The field that failed to parse.
        field: String,
        /// Description of the parsing failure.
        message: String,
    },
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_error_display() {
        let err = ValueError::OutOfRange {
            min: 0,
            max: 500,
            actual: 600,
        };
        assert_eq!(err.to_string(), "value 600 is out of range [0, 500]");
    }

    #[test]
    fn unknown_speaker_display() {
        let err = ValueError::UnknownSpeaker {
            source_type: SourceType::Sonos,
            id: "sonos-42".to_string(),
        };
        assert_eq!(err.to_string(), "unknown Sonos speaker: sonos-42");
    }

    #[test]
    fn error_from_value_error() {
        let err: Error = ValueError::InvalidLabel("loud".to_string()).into();
        assert!(matches!(err, Error::Value(ValueError::InvalidLabel(_))));
    }

    #[test]
    fn command_error_kinds() {
        assert_eq!(
            CommandError::Unreachable("refused".into()).kind(),
            CommandErrorKind::Unreachable
        );
        assert_eq!(
            CommandError::Rejected("HTTP 500".into()).kind(),
            CommandErrorKind::Rejected
        );
        assert_eq!(CommandError::Timeout(5000).kind(), CommandErrorKind::Timeout);
    }

    #[test]
    fn parse_error_becomes_rejection() {
        let err: CommandError = ParseError::MissingField("knob brightness".to_string()).into();
        assert_eq!(
            err,
            CommandError::Rejected("missing field in response: knob brightness".to_string())
        );
    }

    #[test]
    fn dispatch_error_display() {
        let err = Error::CommandDispatch(CommandError::Timeout(5000));
        assert_eq!(
            err.to_string(),
            "command dispatch failed: request timed out after 5000 ms"
        );
    }
}
