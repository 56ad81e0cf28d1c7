#[macro_use]
extern crate tracing;

use clap::Parser;
use eyre::Result;
use sftp_discovery::{
    config::{
        self,
        Args,
    },
    discovery::Discovery,
    error::BootstrapError,
    http,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install().expect("color_eyre init");
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    run(Args::parse())
        .await
        .inspect_err(|err| error!("{err}"))?;

    Ok(())
}

async fn run(args: Args) -> Result<(), BootstrapError> {
    let address = args.listen_address();
    let client = config::connect(args.kubeconfig.as_deref()).await?;

    let discovery = Arc::new(Discovery::new(client, args.label_selectors, args.name_suffix));

    // fail before accepting traffic if the cluster can't be queried
    discovery.probe().await?;

    let listener = http::bind(&address).await?;
    info!(
        "Beginning HTTP server on listen address {address} for selectors {:?}",
        discovery.label_selectors()
    );

    http::serve(listener, http::router(discovery)).await
}
