//! The provider contract shared by every lookup strategy.

use async_trait::async_trait;
use mailconf_core::{DiscoverError, SmtpConfig};
use tokio::time::Instant;

/// Inputs shared by every provider within one discovery session.
///
/// The domain is derived from the address exactly once, so all
/// providers observe the same value. The deadline is the session-wide
/// budget; providers treat it as a best-effort signal and may add
/// shorter per-call timeouts of their own.
#[derive(Debug, Clone)]
pub struct Query {
    /// The e-mail address discovery was invoked for
    pub address: String,
    /// The part of the address after `@`
    pub domain: String,
    /// Absolute deadline for the whole session
    pub deadline: Instant,
}

impl Query {
    /// Derive a query from an address, applying the overall deadline.
    pub(crate) fn new(address: &str, domain: &str, deadline: Instant) -> Self {
        Self {
            address: address.to_string(),
            domain: domain.to_string(),
            deadline,
        }
    }
}

/// Tri-state result of a single provider call.
///
/// `NotFound` is not an error: it means "this strategy has no opinion
/// for this domain, ask the next one".
#[derive(Debug)]
pub enum Outcome {
    /// The provider determined a usable configuration
    Found(SmtpConfig),
    /// The strategy does not apply to this domain
    NotFound,
    /// The strategy could not even determine applicability
    Failed(DiscoverError),
}

impl Outcome {
    /// Collapse a `Result<Option<_>, _>` lookup into an outcome.
    pub(crate) fn from_lookup(result: Result<Option<SmtpConfig>, DiscoverError>) -> Self {
        match result {
            Ok(Some(config)) => Self::Found(config),
            Ok(None) => Self::NotFound,
            Err(err) => Self::Failed(err),
        }
    }
}

/// One discovery strategy.
///
/// Implementations must never panic; any unexpected failure is
/// reported through [`Outcome::Failed`].
#[async_trait]
pub trait Provider: Send + Sync {
    /// Short identifier used in log output
    fn name(&self) -> &str;

    /// Map the queried domain to a configuration, a "no opinion"
    /// signal, or a classified error.
    async fn discover(&self, query: &Query) -> Outcome;
}
