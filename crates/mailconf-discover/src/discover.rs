//! The discovery orchestrator.
//!
//! All providers are spawned at once against a shared deadline, but
//! their outcomes are consumed strictly in priority order: the loop
//! waits for provider 0, then provider 1, and so on. Since every task
//! started simultaneously, waiting on an earlier provider does not
//! delay a later one — concurrency improves latency, never the choice
//! of winner.

use crate::autoconfig::{AutoconfigSubdomainProvider, IspdbProvider};
use crate::dns::DnsSrvProvider;
use crate::mx::DnsMxGuessProvider;
use crate::probe::SubdomainGuessProvider;
use crate::provider::{Outcome, Provider, Query};
use mailconf_core::{DiscoverError, Encryption, SmtpConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::debug;

/// Budget for one whole discovery call, nested MX retry included.
pub const OVERALL_TIMEOUT: Duration = Duration::from_secs(15);

/// The fixed provider list; list order is priority order.
fn provider_list(with_mx_guess: bool) -> Vec<Arc<dyn Provider>> {
    let mut providers: Vec<Arc<dyn Provider>> = vec![
        Arc::new(DnsSrvProvider),
        Arc::new(IspdbProvider::new()),
        Arc::new(AutoconfigSubdomainProvider::new()),
        Arc::new(SubdomainGuessProvider::new("mail", Encryption::ImplicitTls)),
        Arc::new(SubdomainGuessProvider::new("smtp", Encryption::ImplicitTls)),
        Arc::new(SubdomainGuessProvider::new("mail", Encryption::StartTls)),
        Arc::new(SubdomainGuessProvider::new("smtp", Encryption::StartTls)),
    ];
    if with_mx_guess {
        providers.push(Arc::new(DnsMxGuessProvider));
    }
    providers
}

/// Discover the outbound mail server configuration for an address.
///
/// Returns the first configuration found in provider priority order,
/// with the username defaulted to `address` when the winning provider
/// left it empty. [`DiscoverError::NotFound`] means every strategy
/// came up empty; [`DiscoverError::Cancelled`] means the 15 second
/// budget expired first.
pub async fn discover_smtp(address: &str) -> Result<SmtpConfig, DiscoverError> {
    let domain = match address.split_once('@') {
        Some((_, domain)) if !domain.is_empty() => domain,
        _ => return Err(DiscoverError::InvalidAddress(address.to_string())),
    };

    let deadline = Instant::now() + OVERALL_TIMEOUT;
    let query = Query::new(address, domain, deadline);
    debug!(domain, "starting SMTP discovery");
    run_providers(&query, true).await
}

/// Run one discovery session. The MX-guess provider re-enters here
/// with `with_mx_guess = false` so the recursion cannot fan out.
pub(crate) async fn run_providers(
    query: &Query,
    with_mx_guess: bool,
) -> Result<SmtpConfig, DiscoverError> {
    race(provider_list(with_mx_guess), query).await
}

/// Race a provider list and reduce the outcomes to a single result.
pub(crate) async fn race(
    providers: Vec<Arc<dyn Provider>>,
    query: &Query,
) -> Result<SmtpConfig, DiscoverError> {
    let query = Arc::new(query.clone());

    let mut handles = Vec::with_capacity(providers.len());
    for provider in providers {
        let query = Arc::clone(&query);
        handles.push(tokio::spawn(async move {
            let outcome = provider.discover(&query).await;
            let label = match &outcome {
                Outcome::Found(_) => "found",
                Outcome::NotFound => "not-found",
                Outcome::Failed(_) => "failed",
            };
            debug!(provider = provider.name(), outcome = label, "provider finished");
            outcome
        }));
    }

    let mut first_error: Option<DiscoverError> = None;
    let mut decision: Option<Result<SmtpConfig, DiscoverError>> = None;

    for handle in &mut handles {
        let joined = match timeout_at(query.deadline, handle).await {
            Ok(joined) => joined,
            Err(_) => {
                decision = Some(Err(DiscoverError::Cancelled));
                break;
            }
        };
        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(err) if err.is_cancelled() => Outcome::NotFound,
            Err(err) => Outcome::Failed(DiscoverError::Internal(err.to_string())),
        };
        match outcome {
            Outcome::Found(mut config) => {
                if config.username.is_none() {
                    config.username = Some(query.address.clone());
                }
                decision = Some(Ok(config));
                break;
            }
            Outcome::NotFound => {}
            Outcome::Failed(err) if err.is_suppressed() => {}
            Outcome::Failed(err) => {
                if first_error.is_none() {
                    first_error = Some(err);
                } else {
                    debug!(error = %err, "dropping lower-priority provider error");
                }
            }
        }
    }

    // Commit: whatever is still running can only lose.
    for handle in &handles {
        handle.abort();
    }

    decision.unwrap_or_else(|| Err(first_error.unwrap_or(DiscoverError::NotFound)))
}
