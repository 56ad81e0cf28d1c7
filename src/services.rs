use async_trait::async_trait;
use k8s_openapi::api::core::v1::Service;
use kube::{
    api::ListParams,
    Api,
};

/// Lists services across all namespaces filtered by a label selector.
#[async_trait]
pub trait ServiceLister: Send + Sync {
    async fn list_by_label(&self, label_selector: &str) -> Result<Vec<Service>, kube::Error>;
}

#[async_trait]
impl ServiceLister for kube::Client {
    async fn list_by_label(&self, label_selector: &str) -> Result<Vec<Service>, kube::Error> {
        let services = Api::<Service>::all(self.clone())
            .list(&ListParams::default().labels(label_selector))
            .await?;
        Ok(services.items)
    }
}

/// Load balancer ingress addresses of a service in the order the API returns them.
///
/// An ingress without an ip is reported by its hostname. Ingress records that carry neither are skipped.
pub fn ingress_addresses(svc: &Service) -> Vec<&str> {
    svc.status
        .as_ref()
        .and_then(|s| s.load_balancer.as_ref())
        .and_then(|lb| lb.ingress.as_ref())
        .map(|ingress| {
            ingress
                .iter()
                .filter_map(|i| {
                    let ip = i.ip.as_deref().filter(|ip| !ip.is_empty());
                    ip.or_else(|| i.hostname.as_deref().filter(|hostname| !hostname.is_empty()))
                })
                .collect()
        })
        .unwrap_or_default()
}

pub fn service_ports(svc: &Service) -> Vec<i32> {
    svc.spec
        .as_ref()
        .and_then(|spec| spec.ports.as_ref())
        .map(|ports| ports.iter().map(|p| p.port).collect())
        .unwrap_or_default()
}
