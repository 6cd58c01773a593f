mod config;
mod identity;
mod network;
mod node;
mod peer_directory;
mod settlement;
mod swap;
mod validator;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use config::Config;
use identity::NodeIdentity;
use intentmesh_horizon::HorizonClient;
use settlement::Settler;
use swap::OneInchClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("intentmesh_node=info,libp2p=warn")),
        )
        .init();

    let config = Config::parse();

    let identity = NodeIdentity::load_or_generate(&config.keypair_path)?;
    tracing::info!("Node identity: {}", identity.peer_id());

    let mut swarm = network::build_swarm(identity.libp2p_keypair.clone(), config.listen_addr.clone())?;
    tracing::info!(
        "Bootstrap multiaddr: {}/p2p/{}",
        config.listen_addr,
        swarm.local_peer_id(),
    );

    let ledger = Arc::new(HorizonClient::new(&config.horizon_url));
    let swap = Arc::new(OneInchClient::new(
        &config.swap_api_url,
        config.swap_api_key.clone(),
    ));
    let settler = Arc::new(Settler::new(ledger, swap));

    let mut node = node::MeshNode::new(config, settler)?;
    node.run(&mut swarm).await
}
