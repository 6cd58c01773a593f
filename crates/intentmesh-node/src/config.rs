use clap::Parser;
use libp2p::Multiaddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "intentmesh-node", about = "Stellar intent coordination mesh node")]
pub struct Config {
    /// libp2p listen multiaddr.
    #[arg(long, default_value = "/ip4/0.0.0.0/tcp/9000")]
    pub listen_addr: Multiaddr,

    /// Bootstrap peer multiaddrs, including the /p2p/<PeerId> suffix
    /// (can repeat). Dialed directly at startup before discovery kicks in;
    /// a failed bootstrap dial is non-fatal.
    #[arg(long, env = "IMESH_BOOTSTRAP")]
    pub bootstrap: Vec<Multiaddr>,

    /// Horizon endpoint for transaction submission.
    #[arg(
        long,
        env = "IMESH_HORIZON_URL",
        default_value = "https://horizon-testnet.stellar.org"
    )]
    pub horizon_url: String,

    /// Network passphrase the received envelopes must be signed for.
    #[arg(
        long,
        env = "IMESH_NETWORK_PASSPHRASE",
        default_value = "Test SDF Network ; September 2015"
    )]
    pub network_passphrase: String,

    /// Swap quote API base URL (chain-specific endpoint).
    #[arg(
        long,
        env = "IMESH_SWAP_API_URL",
        default_value = "https://api.1inch.dev/swap/v5.2/11155111"
    )]
    pub swap_api_url: String,

    /// Bearer token for the swap quote API.
    #[arg(long, env = "IMESH_SWAP_API_KEY")]
    pub swap_api_key: Option<String>,

    /// Path to the 32-byte Ed25519 secret key file.
    #[arg(long, default_value = "intentmesh-identity.key")]
    pub keypair_path: PathBuf,

    /// Path to a JSON intent file. When set, this node acts as the
    /// initiator: it offers the intent to each newly connected peer until
    /// one acknowledges. Without it the node only responds.
    #[arg(long, env = "IMESH_INTENT_PATH")]
    pub intent_path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse() {
        let cfg = Config::parse_from(["intentmesh-node"]);
        assert_eq!(cfg.listen_addr.to_string(), "/ip4/0.0.0.0/tcp/9000");
        assert!(cfg.bootstrap.is_empty());
        assert!(cfg.intent_path.is_none());
        assert_eq!(cfg.network_passphrase, "Test SDF Network ; September 2015");
    }

    #[test]
    fn bootstrap_repeats() {
        let cfg = Config::parse_from([
            "intentmesh-node",
            "--bootstrap",
            "/ip4/127.0.0.1/tcp/9000/p2p/12D3KooWDpJ7As7BWAwRMfu1VU2WCqNjvq387JEYKVBj4NcgqrLH",
            "--bootstrap",
            "/ip4/127.0.0.1/tcp/9001/p2p/12D3KooWPjceQrSwdWXPyLLeABRXmuqt69Rg3sBYbU1Nft9HyQ6X",
        ]);
        assert_eq!(cfg.bootstrap.len(), 2);
    }
}
