//! Value types describing a discovered SMTP submission server.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How TLS is negotiated with the submission server
///
/// The serde tokens match the `Display` output, so text and JSON
/// renderings of a configuration agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Encryption {
    /// TLS immediately on connect, before any SMTP command (port 465)
    #[serde(rename = "implicit-tls")]
    ImplicitTls,
    /// Plaintext connection upgraded via the STARTTLS command (port 587)
    #[serde(rename = "starttls")]
    StartTls,
    /// No transport security
    #[serde(rename = "none")]
    None,
}

impl Encryption {
    /// The conventional submission port for this mode
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::ImplicitTls => 465,
            Self::StartTls => 587,
            Self::None => 25,
        }
    }
}

impl fmt::Display for Encryption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ImplicitTls => write!(f, "implicit-tls"),
            Self::StartTls => write!(f, "starttls"),
            Self::None => write!(f, "none"),
        }
    }
}

/// Outbound mail server configuration produced by discovery
///
/// Immutable once constructed; the orchestrator fills in a missing
/// `username` with the queried address before handing the record to
/// the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// Server hostname, without a trailing root label
    pub hostname: String,
    /// TCP port
    pub port: u16,
    /// TLS negotiation mode
    pub encryption: Encryption,
    /// Login username; defaults to the queried address when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl SmtpConfig {
    /// Create a configuration with no username
    #[must_use]
    pub fn new(hostname: impl Into<String>, port: u16, encryption: Encryption) -> Self {
        Self {
            hostname: hostname.into(),
            port,
            encryption,
            username: None,
        }
    }
}

impl fmt::Display for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} ({})", self.hostname, self.port, self.encryption)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ports() {
        assert_eq!(Encryption::ImplicitTls.default_port(), 465);
        assert_eq!(Encryption::StartTls.default_port(), 587);
        assert_eq!(Encryption::None.default_port(), 25);
    }

    #[test]
    fn json_omits_missing_username() {
        let config = SmtpConfig::new("smtp.example.org", 587, Encryption::StartTls);
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["hostname"], "smtp.example.org");
        assert_eq!(json["port"], 587);
        assert_eq!(json["encryption"], "starttls");
        assert!(json.get("username").is_none());
    }

    #[test]
    fn serde_tokens_match_display() {
        for encryption in [Encryption::ImplicitTls, Encryption::StartTls, Encryption::None] {
            let json = serde_json::to_value(encryption).unwrap();
            assert_eq!(json, encryption.to_string());
        }
    }

    #[test]
    fn display_is_compact() {
        let config = SmtpConfig::new("mx.example.org", 465, Encryption::ImplicitTls);
        assert_eq!(config.to_string(), "mx.example.org:465 (implicit-tls)");
    }
}
