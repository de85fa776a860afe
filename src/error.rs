//! Failure taxonomy for the resolution pipeline
//!
//! None of these reach the user as hard errors. Each component absorbs its own
//! failures at the boundary, logs them, and degrades to an empty result.

use std::time::Duration;
use thiserror::Error;

/// Pipeline failures, absorbed close to where they originate
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Request timed out after {}ms: {url}", .after.as_millis())]
    NetworkTimeout { url: String, after: Duration },

    #[error("All {attempts} network tiers failed for {url}")]
    NetworkExhausted { url: String, attempts: usize },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("No playable source for {0}")]
    NoPlayableSource(String),

    #[error("No comment track matched {0}")]
    NoCommentMatch(String),

    #[error("Invalid backend endpoint: {0}")]
    InvalidEndpoint(String),
}

impl Error {
    /// True for failures caused by the network rather than by payload content
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            Error::NetworkTimeout { .. } | Error::NetworkExhausted { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_classification() {
        let timeout = Error::NetworkTimeout {
            url: "http://a".into(),
            after: Duration::from_millis(250),
        };
        assert!(timeout.is_network());
        assert_eq!(timeout.to_string(), "Request timed out after 250ms: http://a");

        assert!(!Error::MalformedResponse("not json".into()).is_network());
        assert!(!Error::NoCommentMatch("Show".into()).is_network());
    }
}
