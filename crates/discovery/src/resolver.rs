//! Name resolution for `node<index>` hostnames.

use crate::ResolveError;
use async_trait::async_trait;
use hickory_resolver::TokioResolver;
use pubsub_shadow_primitives::NodeIndex;
use std::net::IpAddr;
use tracing::trace;

/// Maps a node index to its routable addresses.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolves `node<index>`. An empty answer is an error.
    async fn resolve(&self, index: NodeIndex) -> Result<Vec<IpAddr>, ResolveError>;
}

/// Resolver backed by the system DNS configuration (`/etc/resolv.conf` and `/etc/hosts`).
#[derive(Clone)]
pub struct DnsResolver {
    inner: TokioResolver,
}

impl std::fmt::Debug for DnsResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DnsResolver").finish_non_exhaustive()
    }
}

impl DnsResolver {
    pub fn from_system_conf() -> Result<Self, ResolveError> {
        let inner = TokioResolver::builder_tokio()
            .map_err(|e| ResolveError::Setup(e.to_string()))?
            .build();
        Ok(Self { inner })
    }
}

#[async_trait]
impl Resolver for DnsResolver {
    async fn resolve(&self, index: NodeIndex) -> Result<Vec<IpAddr>, ResolveError> {
        let hostname = index.hostname();
        let lookup = self
            .inner
            .lookup_ip(hostname.as_str())
            .await
            .map_err(|e| ResolveError::Lookup {
                hostname: hostname.clone(),
                reason: e.to_string(),
            })?;

        let addrs: Vec<IpAddr> = lookup.iter().collect();
        trace!(%hostname, count = addrs.len(), "Resolved");
        if addrs.is_empty() {
            return Err(ResolveError::NoAddresses(hostname));
        }
        Ok(addrs)
    }
}
