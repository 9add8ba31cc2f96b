//! Minimal SMTP client dialogue for the socket probes.
//!
//! Just enough of RFC 5321 to read the greeting, send EHLO, inspect
//! the advertised extensions, and request STARTTLS. No authentication,
//! no mail transactions.

use mailconf_core::DiscoverError;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

/// Name announced in EHLO; the probe has no identity worth disclosing.
const EHLO_NAME: &str = "localhost";

/// A parsed (possibly multi-line) SMTP reply.
#[derive(Debug)]
pub(crate) struct Reply {
    pub(crate) code: u16,
    pub(crate) lines: Vec<String>,
}

impl Reply {
    /// Fail with an `Smtp` error unless the reply carries `code`.
    pub(crate) fn expect(self, code: u16) -> Result<Self, DiscoverError> {
        if self.code == code {
            Ok(self)
        } else {
            let text = self.lines.first().map_or("", String::as_str);
            Err(DiscoverError::Smtp(format!(
                "unexpected reply {}: {}",
                self.code, text
            )))
        }
    }

    /// Whether an EHLO reply advertises the given extension keyword.
    ///
    /// The first line is the server's greeting text; extension keywords
    /// start on the second line and may carry parameters
    /// (`AUTH PLAIN LOGIN`).
    pub(crate) fn has_extension(&self, keyword: &str) -> bool {
        self.lines.iter().skip(1).any(|line| {
            line.split_whitespace()
                .next()
                .is_some_and(|kw| kw.eq_ignore_ascii_case(keyword))
        })
    }
}

/// Parse one reply line into (code, more-lines-follow, text).
fn parse_reply_line(line: &str) -> Result<(u16, bool, String), DiscoverError> {
    let Some(code_str) = line.get(..3) else {
        return Err(DiscoverError::Smtp(format!("short reply line: {line:?}")));
    };
    let code: u16 = code_str
        .parse()
        .map_err(|_| DiscoverError::Smtp(format!("bad reply code: {line:?}")))?;
    match line.as_bytes().get(3) {
        None => Ok((code, false, String::new())),
        Some(b' ') => Ok((code, false, line[4..].to_string())),
        Some(b'-') => Ok((code, true, line[4..].to_string())),
        Some(_) => Err(DiscoverError::Smtp(format!("malformed reply: {line:?}"))),
    }
}

/// One SMTP session over an arbitrary stream (plain TCP or TLS).
///
/// Every read and write is bounded by a per-command timeout; the
/// session-wide deadline is enforced by the orchestrator aborting the
/// provider task.
pub(crate) struct SmtpSession<S> {
    stream: BufReader<S>,
    command_timeout: Duration,
}

impl<S: AsyncRead + AsyncWrite + Unpin> SmtpSession<S> {
    pub(crate) fn new(stream: S, command_timeout: Duration) -> Self {
        Self {
            stream: BufReader::new(stream),
            command_timeout,
        }
    }

    async fn read_line(&mut self) -> Result<String, DiscoverError> {
        let mut line = String::new();
        let read = tokio::time::timeout(self.command_timeout, self.stream.read_line(&mut line))
            .await
            .map_err(|_| DiscoverError::Timeout)?
            .map_err(|e| DiscoverError::Smtp(e.to_string()))?;
        if read == 0 {
            return Err(DiscoverError::Smtp("connection closed".into()));
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(line)
    }

    pub(crate) async fn read_reply(&mut self) -> Result<Reply, DiscoverError> {
        let mut lines = Vec::new();
        loop {
            let line = self.read_line().await?;
            let (code, more, text) = parse_reply_line(&line)?;
            lines.push(text);
            if !more {
                return Ok(Reply { code, lines });
            }
        }
    }

    pub(crate) async fn command(&mut self, command: &str) -> Result<Reply, DiscoverError> {
        let data = format!("{command}\r\n");
        tokio::time::timeout(self.command_timeout, async {
            self.stream.write_all(data.as_bytes()).await?;
            self.stream.flush().await
        })
        .await
        .map_err(|_| DiscoverError::Timeout)?
        .map_err(|e| DiscoverError::Smtp(e.to_string()))?;
        self.read_reply().await
    }

    /// Consume the 220 greeting the server sends on connect.
    pub(crate) async fn greeting(&mut self) -> Result<(), DiscoverError> {
        self.read_reply().await?.expect(220)?;
        Ok(())
    }

    /// Send EHLO and return the (250) extension listing.
    pub(crate) async fn ehlo(&mut self) -> Result<Reply, DiscoverError> {
        self.command(&format!("EHLO {EHLO_NAME}")).await?.expect(250)
    }

    /// Ask the server to switch to TLS; the caller performs the
    /// handshake on the stream returned by [`Self::into_inner`].
    pub(crate) async fn starttls(&mut self) -> Result<(), DiscoverError> {
        self.command("STARTTLS").await?.expect(220)?;
        Ok(())
    }

    /// Hand the underlying stream back, e.g. for a TLS upgrade.
    pub(crate) fn into_inner(self) -> S {
        self.stream.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    const TIMEOUT: Duration = Duration::from_secs(1);

    #[test]
    fn parses_final_and_continuation_lines() {
        assert_eq!(
            parse_reply_line("250 OK").unwrap(),
            (250, false, "OK".to_string())
        );
        assert_eq!(
            parse_reply_line("250-AUTH PLAIN").unwrap(),
            (250, true, "AUTH PLAIN".to_string())
        );
        assert_eq!(parse_reply_line("220").unwrap(), (220, false, String::new()));
        assert!(parse_reply_line("2x").is_err());
        assert!(parse_reply_line("boom!").is_err());
    }

    #[test]
    fn extension_matching_ignores_greeting_line_and_case() {
        let reply = Reply {
            code: 250,
            lines: vec![
                "mx.example.org".into(),
                "auth PLAIN LOGIN".into(),
                "8BITMIME".into(),
            ],
        };
        assert!(reply.has_extension("AUTH"));
        assert!(reply.has_extension("8bitmime"));
        assert!(!reply.has_extension("STARTTLS"));
        // "mx.example.org" is greeting text, not an extension.
        assert!(!reply.has_extension("mx.example.org"));
    }

    #[tokio::test]
    async fn full_ehlo_exchange() {
        let (client, server) = tokio::io::duplex(1024);

        tokio::spawn(async move {
            let mut server = BufReader::new(server);
            server
                .write_all(b"220 mx.example.org ESMTP ready\r\n")
                .await
                .unwrap();
            let mut line = String::new();
            server.read_line(&mut line).await.unwrap();
            assert_eq!(line, "EHLO localhost\r\n");
            server
                .write_all(b"250-mx.example.org\r\n250-AUTH PLAIN LOGIN\r\n250 8BITMIME\r\n")
                .await
                .unwrap();
        });

        let mut session = SmtpSession::new(client, TIMEOUT);
        session.greeting().await.unwrap();
        let reply = session.ehlo().await.unwrap();
        assert!(reply.has_extension("AUTH"));
        assert!(!reply.has_extension("STARTTLS"));
    }

    #[tokio::test]
    async fn rejecting_greeting_is_an_smtp_error() {
        let (client, server) = tokio::io::duplex(1024);

        tokio::spawn(async move {
            let mut server = server;
            server
                .write_all(b"554 go away\r\n")
                .await
                .unwrap();
        });

        let mut session = SmtpSession::new(client, TIMEOUT);
        let err = session.greeting().await.unwrap_err();
        assert!(matches!(err, DiscoverError::Smtp(_)));
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let (client, _server) = tokio::io::duplex(1024);
        let mut session = SmtpSession::new(client, Duration::from_millis(50));
        let err = session.read_reply().await.unwrap_err();
        assert!(matches!(err, DiscoverError::Timeout));
    }
}
