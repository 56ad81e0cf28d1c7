use crate::{
    discovery::{
        DEFAULT_LABEL_SELECTORS,
        DEFAULT_NAME_SUFFIX,
    },
    error::BootstrapError,
};
use clap::Parser;
use kube::config::{
    KubeConfigOptions,
    Kubeconfig,
};
use std::path::{
    Path,
    PathBuf,
};

#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Args {
    #[clap(
        long,
        env = "KUBECONFIG",
        help = "Kubeconfig path, or a list of paths merged in order. If not set, the in-cluster or default config is used"
    )]
    pub kubeconfig: Option<PathBuf>,

    #[clap(
        long,
        env = "LISTEN_ADDRESS",
        help = "HTTP listen address, a leading ':' listens on all interfaces",
        default_value = ":8090"
    )]
    pub address: String,

    #[clap(
        long = "label-selector",
        short = 'l',
        help = "Label selector of services to discover, may be repeated",
        default_values = DEFAULT_LABEL_SELECTORS.iter().copied()
    )]
    pub label_selectors: Vec<String>,

    #[clap(
        long,
        env = "NAME_SUFFIX",
        help = "Only services whose name ends with this suffix are reported",
        default_value = DEFAULT_NAME_SUFFIX
    )]
    pub name_suffix: String,
}

impl Args {
    /// The address to bind, with a bare `:port` expanded to all interfaces.
    pub fn listen_address(&self) -> String {
        listen_address(&self.address)
    }
}

pub fn listen_address(address: &str) -> String {
    match address.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{port}"),
        None => address.to_string(),
    }
}

/// Reads and merges a `KUBECONFIG` style path list. Earlier files take precedence.
pub fn load_kubeconfig(paths: &Path) -> Result<Kubeconfig, BootstrapError> {
    let mut merged: Option<Kubeconfig> = None;

    for path in std::env::split_paths(paths).filter(|path| !path.as_os_str().is_empty()) {
        debug!("Loading kubeconfig from {path:?}");
        let to_err = |source| BootstrapError::Kubeconfig {
            path: path.clone(),
            source,
        };
        let next = Kubeconfig::read_from(&path).map_err(to_err)?;
        merged = Some(match merged {
            Some(kubeconfig) => kubeconfig.merge(next).map_err(to_err)?,
            None => next,
        });
    }

    Ok(merged.unwrap_or_default())
}

/// Builds the kubernetes client from explicit kubeconfig paths or, without them, from the environment.
pub async fn connect(kubeconfig: Option<&Path>) -> Result<kube::Client, BootstrapError> {
    let config = match kubeconfig {
        Some(paths) => {
            let kubeconfig = load_kubeconfig(paths)?;
            kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|source| BootstrapError::Kubeconfig {
                    path: paths.to_path_buf(),
                    source,
                })?
        }
        None => kube::Config::infer().await?,
    };

    Ok(kube::Client::try_from(config)?)
}
