//! Registry endpoint resolution from cluster state.

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{QueryError, Result, SyncError};
use crate::selector::LabelSelector;

/// The fields of a pod the resolver looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodStatus {
    pub name: String,
    /// Address of the node the pod is bound to, if any.
    pub host_ip: Option<IpAddr>,
    /// Whether the pod's `Ready` condition is `True`.
    pub ready: bool,
}

impl PodStatus {
    #[must_use]
    pub fn new(name: impl Into<String>, host_ip: Option<IpAddr>, ready: bool) -> Self {
        Self {
            name: name.into(),
            host_ip,
            ready,
        }
    }
}

/// Source of pod state, usually a cached cluster API client.
#[async_trait]
pub trait PodLister: Send + Sync {
    /// Lists pods in `namespace` matching `selector`, in the order the
    /// backing store returns them.
    async fn list_pods(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> std::result::Result<Vec<PodStatus>, QueryError>;
}

#[async_trait]
impl<L: PodLister + ?Sized> PodLister for std::sync::Arc<L> {
    async fn list_pods(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> std::result::Result<Vec<PodStatus>, QueryError> {
        (**self).list_pods(namespace, selector).await
    }
}

/// An address paired with the hostname it is published under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoint {
    pub address: IpAddr,
    pub hostname: String,
}

impl ResolvedEndpoint {
    #[must_use]
    pub fn new(address: IpAddr, hostname: impl Into<String>) -> Self {
        Self {
            address,
            hostname: hostname.into(),
        }
    }

    /// `<address> <hostname>`
    #[must_use]
    pub fn hosts_line(&self) -> String {
        format!("{} {}", self.address, self.hostname)
    }
}

impl fmt::Display for ResolvedEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.hostname, self.address)
    }
}

/// Returns the host address of the first ready pod matching `selector`.
///
/// Pods are taken in listing order. Ready pods not yet bound to a node are
/// skipped.
///
/// # Errors
///
/// Returns [`SyncError::Query`] if listing fails, or
/// [`SyncError::ResolutionNotFound`] if no ready pod has an address.
pub async fn resolve_endpoint<L: PodLister + ?Sized>(
    lister: &L,
    namespace: &str,
    selector: &LabelSelector,
) -> Result<IpAddr> {
    let pods = lister
        .list_pods(namespace, selector)
        .await
        .map_err(SyncError::Query)?;

    for pod in &pods {
        if !pod.ready {
            continue;
        }
        match pod.host_ip {
            Some(ip) => {
                tracing::debug!(pod = %pod.name, address = %ip, "Found ready registry pod");
                return Ok(ip);
            }
            None => tracing::debug!(pod = %pod.name, "Ready pod has no host address, skipping"),
        }
    }

    Err(SyncError::ResolutionNotFound {
        namespace: namespace.to_string(),
        selector: selector.to_string(),
    })
}

/// [`resolve_endpoint`] bounded by `timeout`.
///
/// # Errors
///
/// As [`resolve_endpoint`], plus [`SyncError::QueryTimeout`] when the
/// deadline elapses first.
pub async fn resolve_endpoint_with_deadline<L: PodLister + ?Sized>(
    lister: &L,
    namespace: &str,
    selector: &LabelSelector,
    timeout: Duration,
) -> Result<IpAddr> {
    tokio::time::timeout(timeout, resolve_endpoint(lister, namespace, selector))
        .await
        .map_err(|_| SyncError::QueryTimeout { timeout })?
}

#[derive(Debug, Clone)]
struct LabelledPod {
    namespace: String,
    labels: BTreeMap<String, String>,
    status: PodStatus,
}

/// In-memory [`PodLister`] filtering a fixed pod set by namespace and labels.
#[derive(Debug, Clone, Default)]
pub struct StaticLister {
    pods: Vec<LabelledPod>,
}

impl StaticLister {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a pod; listing order follows insertion order.
    #[must_use]
    pub fn with_pod<'a>(
        mut self,
        namespace: impl Into<String>,
        labels: impl IntoIterator<Item = (&'a str, &'a str)>,
        status: PodStatus,
    ) -> Self {
        self.pods.push(LabelledPod {
            namespace: namespace.into(),
            labels: labels
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            status,
        });
        self
    }
}

#[async_trait]
impl PodLister for StaticLister {
    async fn list_pods(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> std::result::Result<Vec<PodStatus>, QueryError> {
        Ok(self
            .pods
            .iter()
            .filter(|p| p.namespace == namespace && selector.matches(&p.labels))
            .map(|p| p.status.clone())
            .collect())
    }
}
