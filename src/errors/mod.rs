//! Structured error codes for the pipeline.
//!
//! Codes are grouped by leading digit so a code alone tells you which
//! stage category produced it, without parsing the message:
//!
//! | Range | Category                    |
//! |-------|------------------------------|
//! | E1xxx | Input validation            |
//! | E2xxx | Per-item parse failure       |
//! | E3xxx | Per-test transport failure   |
//! | E4xxx | Unexpected replay exception  |
//! | E5xxx | Internal / analyzer skip     |

use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorCode(u16);

impl ErrorCode {
    // E1xxx: input validation. Fails the run before any stage work starts.
    pub const MISSING_INPUT_FILE: Self = Self(1001);
    pub const MALFORMED_CAPTURE_LOG: Self = Self(1002);
    pub const MALFORMED_ENDPOINT_SET: Self = Self(1003);
    pub const MALFORMED_TEST_SET: Self = Self(1004);
    pub const MALFORMED_SESSION_FILE: Self = Self(1005);
    pub const EMPTY_CAPTURE_LOG: Self = Self(1006);
    pub const MALFORMED_RESULT_SET: Self = Self(1007);

    // E2xxx: per-item parse failure. Logged at debug, item skipped.
    pub const REQUEST_BODY_NOT_JSON: Self = Self(2001);
    pub const REQUEST_MISSING_RESPONSE: Self = Self(2002);
    pub const SAMPLE_BODY_NOT_OBJECT: Self = Self(2003);

    // E3xxx: per-test transport failure. Captured as a failed TestResult.
    pub const REQUEST_TIMEOUT: Self = Self(3001);
    pub const REQUEST_TRANSPORT_ERROR: Self = Self(3002);

    // E4xxx: unexpected exception during replay. Never escapes the engine.
    pub const REPLAY_UNEXPECTED_ERROR: Self = Self(4001);
    pub const REPLAY_CANCELLED: Self = Self(4002);

    // E5xxx: internal invariant violations / analyzer skip conditions.
    pub const DUPLICATE_TEST_ID: Self = Self(5001);
    pub const BASELINE_LOOKUP_MISS: Self = Self(5002);
    pub const ARTIFACT_WRITE_FAILED: Self = Self(5003);

    pub fn code(&self) -> u16 {
        self.0
    }

    pub fn formatted(&self) -> String {
        format!("E{:04}", self.0)
    }

    pub fn category(&self) -> ErrorCategory {
        match self.0 / 1000 {
            1 => ErrorCategory::InputValidation,
            2 => ErrorCategory::ItemParse,
            3 => ErrorCategory::Transport,
            4 => ErrorCategory::ReplayUnexpected,
            5 => ErrorCategory::Internal,
            _ => ErrorCategory::Unknown,
        }
    }

    pub fn description(&self) -> &'static str {
        match self.0 {
            1001 => "Missing input file",
            1002 => "Malformed capture log",
            1003 => "Malformed endpoint set",
            1004 => "Malformed test set",
            1005 => "Malformed session file",
            1006 => "Capture log has no usable requests",
            1007 => "Malformed test result set",
            2001 => "Request body failed JSON parse",
            2002 => "Captured request has no response",
            2003 => "Sample body is not a JSON object",
            3001 => "Request timed out",
            3002 => "Transport error",
            4001 => "Unexpected error during replay",
            4002 => "Task cancelled during replay",
            5001 => "Duplicate test_id in result set",
            5002 => "No baseline found for test result",
            5003 => "Failed to write artifact file",
            _ => "Unknown error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.formatted())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    InputValidation,
    ItemParse,
    Transport,
    ReplayUnexpected,
    Internal,
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InputValidation => write!(f, "input validation"),
            Self::ItemParse => write!(f, "item parse"),
            Self::Transport => write!(f, "transport"),
            Self::ReplayUnexpected => write!(f, "replay unexpected"),
            Self::Internal => write!(f, "internal"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// An error with a stable numeric identity and optional contextual detail.
#[derive(Debug, Error)]
#[error("[{code}] {message}{}", detail.as_deref().map(|d| format!(" ({d})")).unwrap_or_default())]
pub struct StructuredError {
    pub code: ErrorCode,
    pub message: String,
    pub detail: Option<String>,
}

impl StructuredError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_formatting() {
        assert_eq!(ErrorCode::MISSING_INPUT_FILE.formatted(), "E1001");
        assert_eq!(ErrorCode::REQUEST_TIMEOUT.formatted(), "E3001");
    }

    #[test]
    fn test_error_code_category() {
        assert_eq!(ErrorCode::MALFORMED_CAPTURE_LOG.category(), ErrorCategory::InputValidation);
        assert_eq!(ErrorCode::REQUEST_TRANSPORT_ERROR.category(), ErrorCategory::Transport);
        assert_eq!(ErrorCode::REPLAY_UNEXPECTED_ERROR.category(), ErrorCategory::ReplayUnexpected);
        assert_eq!(ErrorCode::BASELINE_LOOKUP_MISS.category(), ErrorCategory::Internal);
    }

    #[test]
    fn test_structured_error_display() {
        let err = StructuredError::new(ErrorCode::REQUEST_TIMEOUT, "GET /api/users/42 timed out")
            .with_detail("30s budget exceeded");
        let msg = err.user_message();
        assert!(msg.contains("E3001"));
        assert!(msg.contains("30s budget"));
    }
}
