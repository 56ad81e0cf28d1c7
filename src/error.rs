use std::path::PathBuf;

/// A list call against the Kubernetes API failed while answering a discovery query.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("listing services with label selector {selector:?} failed: {source}")]
    List {
        selector: String,
        #[source]
        source: kube::Error,
    },
}

/// Errors that stop the process before it starts serving.
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("unable to load kubeconfig from {path:?}: {source}")]
    Kubeconfig {
        path: PathBuf,
        #[source]
        source: kube::config::KubeconfigError,
    },

    #[error("unable to infer kubernetes config: {0}")]
    InferConfig(#[from] kube::config::InferConfigError),

    #[error("unable to create kubernetes client: {0}")]
    Client(#[from] kube::Error),

    #[error("discovery probe before serving http failed: {0}")]
    Probe(#[source] DiscoveryError),

    #[error("unable to listen on {address:?}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("http server failed: {0}")]
    Serve(#[source] std::io::Error),
}
