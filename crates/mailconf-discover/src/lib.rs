//! Concurrent SMTP submission service discovery.
//!
//! Given nothing but an e-mail address, this crate finds the outbound
//! (submission) server configuration for it: hostname, port, and TLS
//! mode. A fixed set of independent lookup strategies ("providers") is
//! raced concurrently under one deadline:
//!
//! 1. DNS SRV (`_submissions._tcp`, then `_submission._tcp` — RFC 8314
//!    section 5.1 and RFC 6186 section 3.1)
//! 2. Mozilla ISPDB over HTTPS
//! 3. The domain's own `autoconfig.` endpoint
//! 4. Four socket probes against `{mail,smtp}.<domain>` on 465/587
//! 5. A last-resort guess derived from the domain's MX records
//!
//! All providers start at once; the winner is picked by the fixed
//! priority above, not by which one answers first. Concurrency only
//! buys latency, never a different answer.
//!
//! # Example
//!
//! ```rust,no_run
//! use mailconf_discover::discover_smtp;
//!
//! # async fn example() -> mailconf_discover::Result<()> {
//! let config = discover_smtp("alice@example.org").await?;
//! println!("{}:{} via {}", config.hostname, config.port, config.encryption);
//! # Ok(())
//! # }
//! ```

mod autoconfig;
mod discover;
mod dns;
mod mx;
mod probe;
mod provider;
mod smtp;
mod tls;

pub use discover::{discover_smtp, OVERALL_TIMEOUT};
pub use provider::{Outcome, Provider, Query};

// Re-export the core value types so callers need a single dependency.
pub use mailconf_core::{DiscoverError, Encryption, Result, SmtpConfig};
