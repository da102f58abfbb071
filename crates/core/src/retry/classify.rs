//! Default retryability classification

use regex::Regex;
use std::sync::OnceLock;

use crate::error::CoreError;

/// Gateway statuses that indicate a transient condition.
const RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

fn transient_text_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(
            r"(?i)econnrefused|econnreset|etimedout|epipe|connection.?(refused|reset|closed|aborted)|timed?.?out|broken.?pipe|rate.?limit|overloaded|service.?unavailable|temporarily.?unavailable",
        )
        .expect("transient error regex must compile")
    })
}

/// True when an error message reads like a transient network failure
pub fn is_transient_message(text: &str) -> bool {
    transient_text_regex().is_match(text)
}

/// Errors the retry executor can classify without a custom predicate
pub trait RetryClassify {
    /// Whether retrying the failed operation may succeed
    fn is_retryable(&self) -> bool;
}

impl RetryClassify for CoreError {
    fn is_retryable(&self) -> bool {
        if self.is_authorization() {
            return false;
        }
        match self {
            CoreError::ConnectionRefused(_)
            | CoreError::ConnectionReset(_)
            | CoreError::ConnectionClosed
            | CoreError::Timeout(_)
            | CoreError::NotConnected
            | CoreError::Connection(_) => true,
            CoreError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::UnexpectedEof
            ) || is_transient_message(&e.to_string()),
            CoreError::Status { status, message } => {
                RETRYABLE_STATUSES.contains(status) || is_transient_message(message)
            }
            CoreError::Protocol(message) => is_transient_message(message),
            _ => false,
        }
    }
}
