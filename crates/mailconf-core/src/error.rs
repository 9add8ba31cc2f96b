use thiserror::Error;

/// Result type alias for discovery operations
pub type Result<T> = std::result::Result<T, DiscoverError>;

/// Errors that can occur during SMTP configuration discovery
#[derive(Error, Debug)]
pub enum DiscoverError {
    /// No lookup strategy produced a configuration for the domain
    #[error("no mail server found")]
    NotFound,

    /// The overall discovery deadline expired before a decision was made
    #[error("discovery aborted before completion")]
    Cancelled,

    /// The input string is not an e-mail address
    #[error("invalid e-mail address: {0}")]
    InvalidAddress(String),

    /// DNS resolution failed for a reason other than "no such record"
    #[error("DNS lookup failed: {0}")]
    Dns(String),

    /// A single lookup exceeded its time budget
    #[error("lookup timed out")]
    Timeout,

    /// An autoconfig endpoint answered with an unexpected HTTP status
    #[error("HTTP error ({code}): {message}")]
    Http {
        /// HTTP status code
        code: u16,
        /// Status line or response body excerpt
        message: String,
    },

    /// HTTP transport failure (connect, TLS, read)
    #[error("network error: {0}")]
    Transport(String),

    /// The autoconfig document could not be parsed
    #[error("malformed autoconfig document: {0}")]
    Xml(String),

    /// The SMTP dialogue with a probed server went off the rails
    #[error("SMTP error: {0}")]
    Smtp(String),

    /// TLS setup or handshake failure outside the connect phase
    #[error("TLS error: {0}")]
    Tls(String),

    /// Generic internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl DiscoverError {
    /// Returns true if this is the "nothing found" sentinel
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Returns true if the error is treated like `NotFound` when
    /// combining provider outcomes.
    ///
    /// A lookup that ran out of time has no opinion about the domain,
    /// so it must not shadow an answer from a lower-priority provider.
    #[must_use]
    pub const fn is_suppressed(&self) -> bool {
        matches!(self, Self::NotFound | Self::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suppressed_kinds() {
        assert!(DiscoverError::NotFound.is_suppressed());
        assert!(DiscoverError::Timeout.is_suppressed());
        assert!(!DiscoverError::Dns("servfail".into()).is_suppressed());
        assert!(!DiscoverError::Cancelled.is_suppressed());
        assert!(!DiscoverError::Http {
            code: 500,
            message: "Internal Server Error".into()
        }
        .is_suppressed());
    }

    #[test]
    fn not_found_display() {
        assert_eq!(DiscoverError::NotFound.to_string(), "no mail server found");
    }
}
