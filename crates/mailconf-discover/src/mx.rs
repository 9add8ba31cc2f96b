//! MX-derived last-resort guess.
//!
//! When a domain has no submission service of its own, its MX records
//! often point at a hosted mail provider (`mx.provider.example`).
//! Stripping one label from the MX host yields the provider's domain,
//! and the whole discovery sequence is re-run against it — minus this
//! provider, so the recursion cannot fan out.

use crate::discover::run_providers;
use crate::dns::{classify_resolve_error, strip_root_label, system_resolver};
use crate::provider::{Outcome, Provider, Query};
use async_trait::async_trait;
use mailconf_core::DiscoverError;
use tokio::time::timeout_at;
use tracing::debug;

/// Derive the parent domain of an MX host by dropping its first label.
///
/// Deliberately naive: no public-suffix list, just "one label down".
/// The result must still look like a domain (two labels or more).
pub(crate) fn parent_domain(host: &str) -> Option<&str> {
    let (_, parent) = host.split_once('.')?;
    if parent.contains('.') {
        Some(parent)
    } else {
        None
    }
}

/// Derive the candidate retry domain from an MX exchange host.
///
/// Strips the trailing root label, drops one subdomain label, and
/// rejects a result equal to the queried domain: discovery against
/// that domain already ran, so retrying it could only recurse.
fn derive_parent<'a>(exchange: &'a str, domain: &str) -> Option<&'a str> {
    let exchange = strip_root_label(exchange)?;
    let parent = parent_domain(exchange)?;
    if parent == domain {
        None
    } else {
        Some(parent)
    }
}

pub(crate) struct DnsMxGuessProvider;

#[async_trait]
impl Provider for DnsMxGuessProvider {
    fn name(&self) -> &str {
        "dns-mx-guess"
    }

    async fn discover(&self, query: &Query) -> Outcome {
        let resolver = match system_resolver() {
            Ok(resolver) => resolver,
            Err(err) => return Outcome::Failed(err),
        };

        // Fully qualified, matching the SRV lookups; a relative name
        // could be rewritten by resolv.conf search domains.
        let name = format!("{}.", query.domain);
        let lookup = match timeout_at(query.deadline, resolver.mx_lookup(name)).await {
            Err(_) => return Outcome::Failed(DiscoverError::Timeout),
            Ok(Err(err)) => {
                return match classify_resolve_error(&err) {
                    Ok(()) => Outcome::NotFound,
                    Err(err) => Outcome::Failed(err),
                };
            }
            Ok(Ok(lookup)) => lookup,
        };

        let Some(record) = lookup.iter().min_by_key(|mx| mx.preference()) else {
            return Outcome::NotFound;
        };
        let exchange = record.exchange().to_string();
        let Some(derived) = derive_parent(&exchange, &query.domain) else {
            return Outcome::NotFound;
        };

        debug!(mx = %exchange, derived, "retrying discovery against MX parent domain");
        let nested = Query::new(&query.address, derived, query.deadline);
        match run_providers(&nested, false).await {
            Ok(config) => Outcome::Found(config),
            // A fruitless or aborted nested pass means this guess has
            // nothing to offer, same as any other wrong guess.
            Err(DiscoverError::NotFound | DiscoverError::Timeout | DiscoverError::Cancelled) => {
                Outcome::NotFound
            }
            Err(err) => Outcome::Failed(err),
        }
    }
}
