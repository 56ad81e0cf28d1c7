use crate::{
    error::{
        BootstrapError,
        DiscoveryError,
    },
    services::{
        ingress_addresses,
        service_ports,
        ServiceLister,
    },
};
use k8s_openapi::api::core::v1::Service;
use serde::{
    Deserialize,
    Serialize,
};

pub const DEFAULT_LABEL_SELECTORS: &[&str] = &["app=microsite", "app=lamp"];
pub const DEFAULT_NAME_SUFFIX: &str = "-sftp";

/// The reachable addresses of one matching service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryEntry {
    pub namespace: String,
    /// `<ip>:<port>` for every ingress / port pair, ingress-major.
    pub addresses: Vec<String>,
}

/// Answers discovery queries against a fixed list of label selectors.
pub struct Discovery<L> {
    lister: L,
    label_selectors: Vec<String>,
    name_suffix: String,
}

impl<L: ServiceLister> Discovery<L> {
    pub fn new(lister: L, label_selectors: Vec<String>, name_suffix: impl Into<String>) -> Self {
        Self {
            lister,
            label_selectors,
            name_suffix: name_suffix.into(),
        }
    }

    #[cfg(test)]
    pub(crate) fn lister(&self) -> &L {
        &self.lister
    }

    pub fn label_selectors(&self) -> &[String] {
        &self.label_selectors
    }

    /// Lists services for each selector in order and collects the entries of those whose name carries the suffix.
    ///
    /// The first failing list call aborts the whole query. Nothing is cached between calls.
    #[instrument(level = "debug", skip_all)]
    pub async fn discover(&self) -> Result<Vec<DiscoveryEntry>, DiscoveryError> {
        let mut entries = Vec::new();

        for selector in &self.label_selectors {
            let services = self
                .lister
                .list_by_label(selector)
                .await
                .map_err(|source| DiscoveryError::List {
                    selector: selector.clone(),
                    source,
                })?;

            debug!("Found {} service(s) with label {selector:?}", services.len());

            entries.extend(services.iter().filter_map(|svc| self.entry_for(svc)));
        }

        Ok(entries)
    }

    /// Runs one query before serving so that a misconfigured client fails the process early.
    pub async fn probe(&self) -> Result<(), BootstrapError> {
        let entries = self.discover().await.map_err(BootstrapError::Probe)?;
        info!(
            "Discovery probe found {} sftp service(s) for selectors {:?}",
            entries.len(),
            self.label_selectors
        );
        Ok(())
    }

    fn entry_for(&self, svc: &Service) -> Option<DiscoveryEntry> {
        let name = svc.metadata.name.as_deref()?;
        let ns = svc.metadata.namespace.as_deref().unwrap_or("default");

        if !name.ends_with(&self.name_suffix) {
            trace!("Skipping service {ns}/{name}");
            return None;
        }

        let ports = service_ports(svc);
        let addresses = ingress_addresses(svc)
            .into_iter()
            .flat_map(|addr| ports.iter().map(move |port| format!("{addr}:{port}")))
            .collect();

        Some(DiscoveryEntry {
            namespace: ns.to_string(),
            addresses,
        })
    }
}
