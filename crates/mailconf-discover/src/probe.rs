//! Subdomain-guess providers.
//!
//! Educated guesses: many domains run their submission server on
//! `mail.<domain>` or `smtp.<domain>`, on 465 (implicit TLS) or 587
//! (STARTTLS). Each variant opens a real connection and checks that
//! the server speaks SMTP and advertises AUTH before claiming a hit.
//!
//! A guess that does not resolve, connect, or complete its TLS
//! handshake is simply wrong — that is `NotFound`, never an error.
//! Once a server is talking SMTP to us, protocol violations become
//! hard errors.

use crate::provider::{Outcome, Provider, Query};
use crate::smtp::SmtpSession;
use crate::tls;
use async_trait::async_trait;
use mailconf_core::{DiscoverError, Encryption, SmtpConfig};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// Budget for the connect/handshake phase and for each SMTP command.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) struct SubdomainGuessProvider {
    subdomain: &'static str,
    encryption: Encryption,
    name: String,
}

impl SubdomainGuessProvider {
    pub(crate) fn new(subdomain: &'static str, encryption: Encryption) -> Self {
        let name = format!("guess-{subdomain}-{}", encryption.default_port());
        Self {
            subdomain,
            encryption,
            name,
        }
    }

    /// Probe one host/port. Split out from [`Provider::discover`] so
    /// tests can aim it at a local listener.
    async fn probe(&self, host: &str, port: u16) -> Result<Option<SmtpConfig>, DiscoverError> {
        let Ok(Ok(tcp)) = timeout(PROBE_TIMEOUT, TcpStream::connect((host, port))).await else {
            debug!(host, port, "guess did not connect");
            return Ok(None);
        };

        match self.encryption {
            Encryption::ImplicitTls => {
                let connector = tls::connector()?;
                let stream = match timeout(PROBE_TIMEOUT, tls::connect(&connector, host, tcp)).await
                {
                    Ok(Ok(stream)) => stream,
                    // A guessed port that will not do TLS is a wrong guess.
                    Ok(Err(_)) | Err(_) => return Ok(None),
                };
                let mut session = SmtpSession::new(stream, PROBE_TIMEOUT);
                session.greeting().await?;
                self.finish(&mut session, host, port).await
            }
            Encryption::StartTls => {
                let mut session = SmtpSession::new(tcp, PROBE_TIMEOUT);
                session.greeting().await?;
                if !session.ehlo().await?.has_extension("STARTTLS") {
                    return Ok(None);
                }
                session.starttls().await?;

                // From here on the server has committed to TLS; a failed
                // handshake is a real fault, not a wrong guess.
                let connector = tls::connector()?;
                let stream =
                    match timeout(PROBE_TIMEOUT, tls::connect(&connector, host, session.into_inner()))
                        .await
                    {
                        Ok(result) => result?,
                        Err(_) => return Err(DiscoverError::Timeout),
                    };
                let mut session = SmtpSession::new(stream, PROBE_TIMEOUT);
                self.finish(&mut session, host, port).await
            }
            Encryption::None => Ok(None),
        }
    }

    /// EHLO over the (now encrypted) session and require AUTH.
    async fn finish<S>(
        &self,
        session: &mut SmtpSession<S>,
        host: &str,
        port: u16,
    ) -> Result<Option<SmtpConfig>, DiscoverError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        if !session.ehlo().await?.has_extension("AUTH") {
            debug!(host, port, "server does not advertise AUTH");
            return Ok(None);
        }
        Ok(Some(SmtpConfig::new(host, port, self.encryption)))
    }
}

#[async_trait]
impl Provider for SubdomainGuessProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn discover(&self, query: &Query) -> Outcome {
        let host = format!("{}.{}", self.subdomain, query.domain);
        let port = self.encryption.default_port();
        Outcome::from_lookup(self.probe(&host, port).await)
    }
}
