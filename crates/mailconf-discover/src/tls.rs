//! TLS connector helper for the socket probes.

use mailconf_core::DiscoverError;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::TlsConnector;

/// Build a rustls connector configured with system root certificates.
pub(crate) fn connector() -> Result<TlsConnector, DiscoverError> {
    let mut root_store = rustls::RootCertStore::empty();
    let rustls_native_certs::CertificateResult { certs, errors, .. } =
        rustls_native_certs::load_native_certs();
    if certs.is_empty() {
        if let Some(err) = errors.into_iter().next() {
            return Err(DiscoverError::Tls(format!(
                "failed to load system root certificates: {err}"
            )));
        }
    }
    let _ = root_store.add_parsable_certificates(certs);
    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();
    Ok(TlsConnector::from(Arc::new(config)))
}

/// Establish TLS over an existing stream, verifying against `host`.
pub(crate) async fn connect<S>(
    connector: &TlsConnector,
    host: &str,
    stream: S,
) -> Result<tokio_rustls::client::TlsStream<S>, DiscoverError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let server_name = rustls::pki_types::ServerName::try_from(host.to_string())
        .map_err(|_| DiscoverError::Tls(format!("invalid DNS name: {host}")))?;
    connector
        .connect(server_name, stream)
        .await
        .map_err(|e| DiscoverError::Tls(e.to_string()))
}
