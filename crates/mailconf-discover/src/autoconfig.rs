//! Mozilla-style autoconfiguration over HTTPS.
//!
//! Two providers share the Thunderbird autoconfig XML schema:
//!
//! - [`IspdbProvider`] queries the central ISPDB directory
//! - [`AutoconfigSubdomainProvider`] queries the well-known
//!   `autoconfig.<domain>` endpoint published by the domain itself
//!
//! See <https://wiki.mozilla.org/Thunderbird:Autoconfiguration> for the
//! document format.

use crate::provider::{Outcome, Provider, Query};
use async_trait::async_trait;
use mailconf_core::{DiscoverError, Encryption, SmtpConfig};
use serde::Deserialize;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::debug;

/// The Mozilla ISPDB base URL
const ISPDB_BASE_URL: &str = "https://autoconfig.thunderbird.net/v1.1/";

/// Per-request HTTP timeout; the session deadline still applies on top
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent(concat!("mailconf/", env!("CARGO_PKG_VERSION")))
        .build()
        .expect("Failed to build HTTP client")
}

// Serde view of the autoconfig document. Only the outgoing-server
// entries matter here; everything else is skipped by the deserializer.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClientConfig {
    email_provider: Option<EmailProvider>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmailProvider {
    #[serde(default)]
    outgoing_server: Vec<OutgoingServer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OutgoingServer {
    #[serde(rename = "@type", default)]
    kind: String,
    #[serde(default)]
    hostname: String,
    #[serde(default)]
    port: String,
    #[serde(default)]
    socket_type: String,
    #[serde(default)]
    authentication: Vec<String>,
}

impl OutgoingServer {
    /// Only SMTP entries a mail client can log into with a password are
    /// usable here.
    fn eligible(&self) -> bool {
        self.kind == "smtp" && self.authentication.iter().any(|a| a == "password-cleartext")
    }
}

/// Pick the outgoing server from a parsed document.
///
/// The first implicit-TLS (`SSL`) entry short-circuits the scan; the
/// first STARTTLS entry is kept as a fallback and used only when no
/// SSL entry exists anywhere in the document.
fn select_outgoing(doc: &ClientConfig) -> Option<SmtpConfig> {
    let provider = doc.email_provider.as_ref()?;
    let mut starttls: Option<SmtpConfig> = None;

    for server in &provider.outgoing_server {
        if !server.eligible() {
            continue;
        }
        let Ok(port) = server.port.parse::<u16>() else {
            // An entry without a usable port cannot be returned; skip
            // it rather than failing the whole document.
            continue;
        };
        match server.socket_type.as_str() {
            "SSL" => {
                return Some(SmtpConfig::new(
                    server.hostname.clone(),
                    port,
                    Encryption::ImplicitTls,
                ));
            }
            "STARTTLS" if starttls.is_none() => {
                starttls = Some(SmtpConfig::new(
                    server.hostname.clone(),
                    port,
                    Encryption::StartTls,
                ));
            }
            _ => {}
        }
    }
    starttls
}

/// Fetch and evaluate one autoconfig URL.
///
/// HTTP 404 means the directory has no entry for the domain; any other
/// non-success status, a transport failure, or an unparsable document
/// is a hard error.
async fn fetch_autoconfig(
    http: &reqwest::Client,
    url: &str,
    deadline: Instant,
) -> Result<Option<SmtpConfig>, DiscoverError> {
    debug!(url = %url, "fetching autoconfig document");

    let response = timeout_at(deadline, http.get(url).send())
        .await
        .map_err(|_| DiscoverError::Timeout)?
        .map_err(|e| DiscoverError::Transport(e.to_string()))?;

    let status = response.status();
    match status.as_u16() {
        404 => return Ok(None),
        code if !status.is_success() => {
            return Err(DiscoverError::Http {
                code,
                message: status.to_string(),
            });
        }
        _ => {}
    }

    let body = timeout_at(deadline, response.text())
        .await
        .map_err(|_| DiscoverError::Timeout)?
        .map_err(|e| DiscoverError::Transport(e.to_string()))?;

    let doc: ClientConfig =
        quick_xml::de::from_str(&body).map_err(|e| DiscoverError::Xml(e.to_string()))?;
    Ok(select_outgoing(&doc))
}

/// Provider backed by the central Mozilla ISPDB directory.
pub(crate) struct IspdbProvider {
    http: reqwest::Client,
    base_url: String,
}

impl IspdbProvider {
    pub(crate) fn new() -> Self {
        Self::with_base_url(ISPDB_BASE_URL)
    }

    /// Override the directory URL (used by tests).
    pub(crate) fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http: http_client(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl Provider for IspdbProvider {
    fn name(&self) -> &str {
        "ispdb"
    }

    async fn discover(&self, query: &Query) -> Outcome {
        let url = format!("{}{}", self.base_url, query.domain);
        Outcome::from_lookup(fetch_autoconfig(&self.http, &url, query.deadline).await)
    }
}

/// Provider querying the domain's own `autoconfig.` endpoint.
///
/// Unlike the ISPDB, the endpoint itself is a guess: most domains do
/// not publish one. Transport-level failures (unresolvable host,
/// refused connection, timeout) therefore mean "no opinion" rather
/// than a broken domain; HTTP-level failures keep the ISPDB policy.
pub(crate) struct AutoconfigSubdomainProvider {
    http: reqwest::Client,
}

impl AutoconfigSubdomainProvider {
    pub(crate) fn new() -> Self {
        Self {
            http: http_client(),
        }
    }
}

#[async_trait]
impl Provider for AutoconfigSubdomainProvider {
    fn name(&self) -> &str {
        "autoconfig-subdomain"
    }

    async fn discover(&self, query: &Query) -> Outcome {
        let url = format!(
            "https://autoconfig.{}/mail/config-v1.1.xml",
            query.domain
        );
        match fetch_autoconfig(&self.http, &url, query.deadline).await {
            Err(DiscoverError::Transport(reason)) => {
                debug!(domain = %query.domain, %reason, "no autoconfig endpoint");
                Outcome::NotFound
            }
            Err(DiscoverError::Timeout) => Outcome::NotFound,
            other => Outcome::from_lookup(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SAMPLE: &str = r#"<?xml version="1.0"?>
<clientConfig version="1.1">
  <emailProvider id="example.org">
    <domain>example.org</domain>
    <incomingServer type="imap">
      <hostname>imap.example.org</hostname>
      <port>993</port>
      <socketType>SSL</socketType>
      <authentication>password-cleartext</authentication>
    </incomingServer>
    <outgoingServer type="smtp">
      <hostname>smtp.example.org</hostname>
      <port>587</port>
      <socketType>STARTTLS</socketType>
      <username>%EMAILADDRESS%</username>
      <authentication>password-cleartext</authentication>
    </outgoingServer>
    <outgoingServer type="smtp">
      <hostname>mail.example.org</hostname>
      <port>465</port>
      <socketType>SSL</socketType>
      <username>%EMAILADDRESS%</username>
      <authentication>password-cleartext</authentication>
    </outgoingServer>
  </emailProvider>
</clientConfig>"#;

    fn parse(xml: &str) -> ClientConfig {
        quick_xml::de::from_str(xml).unwrap()
    }

    fn query_for(domain: &str) -> Query {
        Query::new(
            &format!("alice@{domain}"),
            domain,
            Instant::now() + Duration::from_secs(15),
        )
    }

    #[test]
    fn implicit_tls_beats_earlier_starttls() {
        let config = select_outgoing(&parse(SAMPLE)).unwrap();
        assert_eq!(config.hostname, "mail.example.org");
        assert_eq!(config.port, 465);
        assert_eq!(config.encryption, Encryption::ImplicitTls);
    }

    #[test]
    fn first_starttls_entry_wins_without_ssl() {
        let xml = r#"<clientConfig version="1.1">
  <emailProvider id="example.org">
    <outgoingServer type="smtp">
      <hostname>a.example.org</hostname>
      <port>587</port>
      <socketType>STARTTLS</socketType>
      <authentication>password-cleartext</authentication>
    </outgoingServer>
    <outgoingServer type="smtp">
      <hostname>b.example.org</hostname>
      <port>587</port>
      <socketType>STARTTLS</socketType>
      <authentication>password-cleartext</authentication>
    </outgoingServer>
  </emailProvider>
</clientConfig>"#;
        let config = select_outgoing(&parse(xml)).unwrap();
        assert_eq!(config.hostname, "a.example.org");
        assert_eq!(config.encryption, Encryption::StartTls);
    }

    #[test]
    fn non_smtp_and_non_cleartext_entries_are_skipped() {
        let xml = r#"<clientConfig version="1.1">
  <emailProvider id="example.org">
    <outgoingServer type="smtp">
      <hostname>oauth.example.org</hostname>
      <port>465</port>
      <socketType>SSL</socketType>
      <authentication>OAuth2</authentication>
    </outgoingServer>
  </emailProvider>
</clientConfig>"#;
        assert!(select_outgoing(&parse(xml)).is_none());
    }

    #[test]
    fn multiple_authentication_elements() {
        let xml = r#"<clientConfig version="1.1">
  <emailProvider id="example.org">
    <outgoingServer type="smtp">
      <hostname>smtp.example.org</hostname>
      <port>465</port>
      <socketType>SSL</socketType>
      <authentication>OAuth2</authentication>
      <authentication>password-cleartext</authentication>
    </outgoingServer>
  </emailProvider>
</clientConfig>"#;
        let config = select_outgoing(&parse(xml)).unwrap();
        assert_eq!(config.hostname, "smtp.example.org");
    }

    #[tokio::test]
    async fn ispdb_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1.1/example.org"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SAMPLE))
            .mount(&server)
            .await;

        let provider = IspdbProvider::with_base_url(format!("{}/v1.1/", server.uri()));
        match provider.discover(&query_for("example.org")).await {
            Outcome::Found(config) => {
                assert_eq!(config.hostname, "mail.example.org");
                assert_eq!(config.encryption, Encryption::ImplicitTls);
            }
            other => panic!("expected Found, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn ispdb_404_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let provider = IspdbProvider::with_base_url(format!("{}/v1.1/", server.uri()));
        assert!(matches!(
            provider.discover(&query_for("nowhere.example")).await,
            Outcome::NotFound
        ));
    }

    #[tokio::test]
    async fn ispdb_500_is_hard_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let provider = IspdbProvider::with_base_url(format!("{}/v1.1/", server.uri()));
        match provider.discover(&query_for("example.org")).await {
            Outcome::Failed(DiscoverError::Http { code, .. }) => assert_eq!(code, 500),
            other => panic!("expected HTTP error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn ispdb_garbage_is_hard_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not xml at all <"))
            .mount(&server)
            .await;

        let provider = IspdbProvider::with_base_url(format!("{}/v1.1/", server.uri()));
        assert!(matches!(
            provider.discover(&query_for("example.org")).await,
            Outcome::Failed(DiscoverError::Xml(_))
        ));
    }

    #[tokio::test]
    async fn autoconfig_subdomain_connect_failure_is_not_found() {
        // Reserved TLD, resolution is guaranteed to fail.
        let provider = AutoconfigSubdomainProvider::new();
        assert!(matches!(
            provider.discover(&query_for("domain.invalid")).await,
            Outcome::NotFound
        ));
    }
}
