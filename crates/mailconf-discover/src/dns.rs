//! DNS SRV submission service discovery.
//!
//! RFC 6186 section 3.1 defines `_submission._tcp` SRV records for
//! locating the submission server; RFC 8314 section 5.1 adds
//! `_submissions._tcp` for submission over implicit TLS. The implicit
//! TLS service is checked first.

use crate::provider::{Outcome, Provider, Query};
use async_trait::async_trait;
use hickory_resolver::proto::ProtoErrorKind;
use hickory_resolver::{ResolveError, ResolveErrorKind, TokioResolver};
use mailconf_core::{DiscoverError, Encryption, SmtpConfig};
use tokio::time::{timeout_at, Instant};
use tracing::debug;

/// Create a resolver backed by the system configuration.
pub(crate) fn system_resolver() -> Result<TokioResolver, DiscoverError> {
    let resolver = TokioResolver::builder_tokio()
        .map_err(|e| DiscoverError::Dns(format!("failed to create resolver: {e}")))?
        .build();
    Ok(resolver)
}

/// Classify a resolver failure.
///
/// "No such record" means the service simply is not there and is not
/// worth reporting (`Ok(())`); a lookup that ran out of time is the
/// suppressed [`DiscoverError::Timeout`]; anything else is a hard DNS
/// error that the orchestrator may surface.
pub(crate) fn classify_resolve_error(err: &ResolveError) -> Result<(), DiscoverError> {
    match err.kind() {
        ResolveErrorKind::Proto(proto) => match proto.kind() {
            ProtoErrorKind::NoRecordsFound { .. } => Ok(()),
            ProtoErrorKind::Timeout { .. } => Err(DiscoverError::Timeout),
            _ => Err(DiscoverError::Dns(err.to_string())),
        },
        _ => Err(DiscoverError::Dns(err.to_string())),
    }
}

/// Strip the trailing root label from a DNS name.
///
/// Returns `None` when nothing remains, which callers treat as
/// "no usable target".
pub(crate) fn strip_root_label(name: &str) -> Option<&str> {
    let stripped = name.strip_suffix('.').unwrap_or(name);
    if stripped.is_empty() {
        None
    } else {
        Some(stripped)
    }
}

/// Look up one `_<service>._tcp.<domain>` SRV record set and return the
/// best-priority usable target, if any.
async fn lookup_submission(
    resolver: &TokioResolver,
    service: &str,
    domain: &str,
    deadline: Instant,
) -> Result<Option<(String, u16)>, DiscoverError> {
    let name = format!("{service}._tcp.{domain}.");
    debug!(name = %name, "SRV lookup");

    let lookup = match timeout_at(deadline, resolver.srv_lookup(name)).await {
        Err(_) => return Err(DiscoverError::Timeout),
        Ok(Err(err)) => {
            classify_resolve_error(&err)?;
            return Ok(None);
        }
        Ok(Ok(lookup)) => lookup,
    };

    let Some(record) = lookup.iter().min_by_key(|srv| srv.priority()) else {
        return Ok(None);
    };
    let target = record.target().to_string();
    let Some(target) = strip_root_label(&target) else {
        return Ok(None);
    };
    Ok(Some((target.to_string(), record.port())))
}

/// SRV-record based provider (highest priority).
pub(crate) struct DnsSrvProvider;

#[async_trait]
impl Provider for DnsSrvProvider {
    fn name(&self) -> &str {
        "dns-srv"
    }

    async fn discover(&self, query: &Query) -> Outcome {
        let resolver = match system_resolver() {
            Ok(resolver) => resolver,
            Err(err) => return Outcome::Failed(err),
        };

        // Implicit TLS service first (RFC 8314), then STARTTLS (RFC 6186).
        let lookups = [
            ("_submissions", Encryption::ImplicitTls),
            ("_submission", Encryption::StartTls),
        ];
        for (service, encryption) in lookups {
            match lookup_submission(&resolver, service, &query.domain, query.deadline).await {
                Ok(Some((hostname, port))) => {
                    return Outcome::Found(SmtpConfig::new(hostname, port, encryption));
                }
                Ok(None) => {}
                Err(err) => return Outcome::Failed(err),
            }
        }
        Outcome::NotFound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_trailing_root_label() {
        assert_eq!(strip_root_label("mx.example.org."), Some("mx.example.org"));
        assert_eq!(strip_root_label("mx.example.org"), Some("mx.example.org"));
    }

    #[test]
    fn empty_target_is_unusable() {
        assert_eq!(strip_root_label("."), None);
        assert_eq!(strip_root_label(""), None);
    }
}
