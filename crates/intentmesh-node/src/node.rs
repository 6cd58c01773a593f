//! The node event loop.
//!
//! Single-task owner of the swarm, the peer directory and the connection
//! state machine. Slow work (ledger submission, quote fetches) is spawned
//! off the loop; completed responses come back over an mpsc channel so the
//! loop never blocks on I/O other than the swarm itself.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use libp2p::{
    gossipsub, identify,
    multiaddr::Protocol,
    request_response::{self, ResponseChannel},
    swarm::SwarmEvent,
    Multiaddr, PeerId, Swarm,
};
use tokio::sync::mpsc;

use intentmesh_horizon::Network;
use intentmesh_protocol::{
    Intent, Response, ValidationResult, ADVERTISE_INTERVAL_SECS, DISCOVERY_TOPIC,
    FALLBACK_INTERVAL_SECS, INTENT_TYPE_STELLAR_PAYMENT, RETRY_BACKOFF_SECS,
};

use crate::config::Config;
use crate::network::{MeshBehaviour, MeshBehaviourEvent};
use crate::peer_directory::{PeerAddress, PeerDirectory};
use crate::settlement::Settler;
use crate::validator;

/// Progress of the initiator towards a settled exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No exchange in flight. Discovery and fallback keep trying.
    Disconnected,
    /// At least one dial or intent request is in flight.
    Connecting,
    /// The initial intent was delivered and answered.
    Connected,
}

type PendingResponse = (ResponseChannel<Vec<u8>>, Vec<u8>);

pub struct MeshNode {
    config: Config,
    network: Network,
    settler: Arc<Settler>,
    directory: PeerDirectory,
    state: ConnectionState,
    /// Peer that acknowledged our initial intent. When its last connection
    /// closes the state machine drops back to `Disconnected` and the
    /// fallback loop resumes offering the intent.
    settled_peer: Option<PeerId>,
    /// Serialized initiator intent, present when `--intent-path` was given.
    intent_bytes: Option<Vec<u8>>,
    listen_addrs: Vec<Multiaddr>,
    response_tx: mpsc::Sender<PendingResponse>,
    response_rx: mpsc::Receiver<PendingResponse>,
}

impl MeshNode {
    pub fn new(config: Config, settler: Arc<Settler>) -> anyhow::Result<Self> {
        let network = Network::new(&config.network_passphrase);

        // An unreadable or unparseable intent file is a startup error, not
        // something to discover after hours of retrying on the network.
        let intent_bytes = match &config.intent_path {
            Some(path) => {
                let raw = std::fs::read(path)
                    .map_err(|e| anyhow::anyhow!("cannot read intent file {path:?}: {e}"))?;
                let intent = Intent::from_bytes(&raw)
                    .map_err(|e| anyhow::anyhow!("intent file {path:?}: {e}"))?;
                tracing::info!(
                    "Loaded initiator intent from {path:?} (type: {})",
                    intent.intent_type.as_deref().unwrap_or("unknown"),
                );
                Some(intent.to_bytes()?)
            }
            None => None,
        };

        let (response_tx, response_rx) = mpsc::channel(64);

        Ok(Self {
            config,
            network,
            settler,
            directory: PeerDirectory::new(),
            state: ConnectionState::Disconnected,
            settled_peer: None,
            intent_bytes,
            listen_addrs: Vec::new(),
            response_tx,
            response_rx,
        })
    }

    pub async fn run(&mut self, swarm: &mut Swarm<MeshBehaviour>) -> anyhow::Result<()> {
        for addr in self.config.bootstrap.clone() {
            match PeerAddress::from_multiaddr(&addr) {
                Some(peer) => {
                    tracing::info!("Dialing bootstrap peer {} at {}", peer.peer_id, peer.addr);
                    self.state = ConnectionState::Connecting;
                    if let Err(e) = swarm.dial(peer.full_addr()) {
                        tracing::warn!("Bootstrap dial failed: {e}");
                    }
                }
                None => tracing::warn!("Bootstrap address missing /p2p component: {addr}"),
            }
        }

        let mut advertise_timer =
            tokio::time::interval(Duration::from_secs(ADVERTISE_INTERVAL_SECS));
        let mut fallback_timer =
            tokio::time::interval(Duration::from_secs(FALLBACK_INTERVAL_SECS));

        loop {
            tokio::select! {
                event = swarm.select_next_some() => {
                    self.handle_swarm_event(swarm, event);
                }
                Some((channel, bytes)) = self.response_rx.recv() => {
                    if swarm
                        .behaviour_mut()
                        .request_response
                        .send_response(channel, bytes)
                        .is_err()
                    {
                        tracing::warn!("Response channel closed before reply could be sent");
                    }
                }
                _ = advertise_timer.tick() => {
                    if let Err(e) = self.advertise(swarm) {
                        tracing::debug!(
                            "Advertisement not published ({e}) — retrying in {RETRY_BACKOFF_SECS}s",
                        );
                        advertise_timer
                            .reset_after(Duration::from_secs(RETRY_BACKOFF_SECS));
                    }
                }
                _ = fallback_timer.tick() => {
                    self.fallback_tick(swarm);
                }
            }
        }
    }

    fn handle_swarm_event(
        &mut self,
        swarm: &mut Swarm<MeshBehaviour>,
        event: SwarmEvent<MeshBehaviourEvent>,
    ) {
        match event {
            SwarmEvent::NewListenAddr { address, .. } => {
                tracing::info!("Listening on {address}/p2p/{}", swarm.local_peer_id());
                self.listen_addrs.push(address);
            }

            SwarmEvent::ConnectionEstablished { peer_id, endpoint, .. } => {
                tracing::debug!("Connection established with {peer_id}");
                if endpoint.is_dialer() {
                    let remote = endpoint.get_remote_address().clone();
                    let peer = PeerAddress::from_multiaddr(&remote)
                        .unwrap_or(PeerAddress { peer_id, addr: remote });
                    if self.directory.add(peer.clone()) {
                        tracing::info!("Added {} at {} to peer directory", peer_id, peer.addr);
                        swarm.add_peer_address(peer_id, peer.addr);
                    }
                    if self.state != ConnectionState::Connected {
                        self.send_initial_intent(swarm, peer_id);
                    }
                }
            }

            SwarmEvent::ConnectionClosed { peer_id, num_established, cause, .. } => {
                tracing::debug!("Connection to {peer_id} closed: {cause:?}");
                if num_established == 0 && self.settled_peer == Some(peer_id) {
                    tracing::info!(
                        "Lost connection to settled peer {peer_id} — resuming attempts",
                    );
                    self.state = ConnectionState::Disconnected;
                    self.settled_peer = None;
                }
            }

            SwarmEvent::OutgoingConnectionError { peer_id, error, .. } => {
                tracing::warn!("Outgoing connection to {peer_id:?} failed: {error}");
            }

            SwarmEvent::Behaviour(MeshBehaviourEvent::Gossipsub(event)) => {
                self.handle_gossipsub(swarm, event);
            }

            SwarmEvent::Behaviour(MeshBehaviourEvent::Identify(event)) => {
                if let identify::Event::Received { peer_id, info, .. } = event {
                    tracing::debug!(
                        "Identified {peer_id} as {} ({} addrs)",
                        info.protocol_version,
                        info.listen_addrs.len(),
                    );
                }
            }

            SwarmEvent::Behaviour(MeshBehaviourEvent::RequestResponse(event)) => {
                self.handle_request_response(event);
            }

            _ => {}
        }
    }

    // ------------------------------------------------------------------
    // Discovery
    // ------------------------------------------------------------------

    /// Publish every listen address (with our peer id appended) on the
    /// discovery topic.
    fn advertise(
        &mut self,
        swarm: &mut Swarm<MeshBehaviour>,
    ) -> Result<(), gossipsub::PublishError> {
        let peer_id = *swarm.local_peer_id();
        let topic = gossipsub::IdentTopic::new(DISCOVERY_TOPIC);
        for addr in &self.listen_addrs {
            let full = addr.clone().with(Protocol::P2p(peer_id));
            swarm
                .behaviour_mut()
                .gossipsub
                .publish(topic.clone(), full.to_string().into_bytes())?;
            tracing::debug!("Advertised {full}");
        }
        Ok(())
    }

    fn handle_gossipsub(&mut self, swarm: &mut Swarm<MeshBehaviour>, event: gossipsub::Event) {
        match event {
            gossipsub::Event::Message { propagation_source, message, .. } => {
                let text = match std::str::from_utf8(&message.data) {
                    Ok(t) => t,
                    Err(_) => {
                        tracing::debug!(
                            "Non-UTF-8 discovery message from {propagation_source} — ignored",
                        );
                        return;
                    }
                };
                let full: Multiaddr = match text.parse() {
                    Ok(a) => a,
                    Err(e) => {
                        tracing::debug!("Unparseable peer advertisement {text:?}: {e}");
                        return;
                    }
                };
                let peer = match PeerAddress::from_multiaddr(&full) {
                    Some(p) => p,
                    None => {
                        tracing::debug!("Advertisement missing /p2p component: {full}");
                        return;
                    }
                };
                if peer.peer_id == *swarm.local_peer_id() {
                    return; // our own advertisement reflected back
                }
                if self.directory.contains(&peer.addr) {
                    return;
                }
                tracing::info!("Discovered peer {} at {}", peer.peer_id, peer.addr);
                // The dial completes asynchronously; the directory entry is
                // only written once the connection is actually established.
                if let Err(e) = swarm.dial(peer.full_addr()) {
                    tracing::warn!("Dial to discovered peer {} failed: {e}", peer.peer_id);
                }
            }
            gossipsub::Event::Subscribed { peer_id, topic } => {
                tracing::debug!("{peer_id} subscribed to {topic}");
            }
            _ => {}
        }
    }

    // ------------------------------------------------------------------
    // Intent exchange
    // ------------------------------------------------------------------

    fn handle_request_response(
        &mut self,
        event: request_response::Event<Vec<u8>, Vec<u8>>,
    ) {
        match event {
            request_response::Event::Message { peer, message } => match message {
                request_response::Message::Request { request, channel, .. } => {
                    self.handle_intent_request(peer, request, channel);
                }
                request_response::Message::Response { response, .. } => {
                    self.handle_intent_response(peer, &response);
                }
            },
            request_response::Event::OutboundFailure { peer, error, .. } => {
                tracing::warn!("Intent request to {peer} failed: {error}");
            }
            request_response::Event::InboundFailure { peer, error, .. } => {
                tracing::warn!("Inbound intent from {peer} failed: {error}");
            }
            request_response::Event::ResponseSent { peer, .. } => {
                tracing::debug!("Response sent to {peer}");
            }
        }
    }

    /// Spawn the validation/settlement pipeline so a slow ledger call
    /// cannot stall the event loop. The finished response comes back via
    /// the mpsc channel together with its stream handle.
    fn handle_intent_request(
        &mut self,
        peer: PeerId,
        request: Vec<u8>,
        channel: ResponseChannel<Vec<u8>>,
    ) {
        tracing::info!("Intent request from {peer} ({} bytes)", request.len());
        let settler = self.settler.clone();
        let network = self.network.clone();
        let tx = self.response_tx.clone();
        tokio::spawn(async move {
            let response = respond(&settler, &network, &request).await;
            let bytes = response.to_bytes().unwrap_or_else(|_| {
                br#"{"status":"ERROR","reason":"response encoding failed"}"#.to_vec()
            });
            if tx.send((channel, bytes)).await.is_err() {
                tracing::warn!("Event loop gone — dropping response for {peer}");
            }
        });
    }

    fn handle_intent_response(&mut self, peer: PeerId, response: &[u8]) {
        match Response::from_bytes(response) {
            Ok(resp) => tracing::info!("Response from {peer}: {resp:?}"),
            Err(e) => tracing::warn!("Undecodable response from {peer}: {e}"),
        }
        // Delivery itself is what moves the state machine; the business
        // status inside the response is logged, not acted on.
        if self.state != ConnectionState::Connected {
            self.state = ConnectionState::Connected;
            self.settled_peer = Some(peer);
            tracing::info!("Initial intent delivered to {peer}");
        }
    }

    fn send_initial_intent(&mut self, swarm: &mut Swarm<MeshBehaviour>, peer: PeerId) {
        let Some(bytes) = &self.intent_bytes else {
            return;
        };
        tracing::info!("Sending initial intent to {peer}");
        self.state = ConnectionState::Connecting;
        swarm
            .behaviour_mut()
            .request_response
            .send_request(&peer, bytes.clone());
    }

    /// Until an exchange completes, periodically re-offer the initial
    /// intent to every peer in the directory.
    fn fallback_tick(&mut self, swarm: &mut Swarm<MeshBehaviour>) {
        if self.state == ConnectionState::Connected
            || self.intent_bytes.is_none()
            || self.directory.is_empty()
        {
            return;
        }
        for peer in self.directory.all() {
            tracing::debug!("Fallback: offering intent to {}", peer.peer_id);
            swarm.add_peer_address(peer.peer_id, peer.addr.clone());
            self.send_initial_intent(swarm, peer.peer_id);
        }
    }
}

// ===========================================================================
// Responder pipeline
// ===========================================================================

/// Turn raw request bytes into a response.
///
/// Decode → type check → envelope presence → validation → settlement.
/// Every failure folds into a status response; this function cannot fail.
pub(crate) async fn respond(settler: &Settler, network: &Network, data: &[u8]) -> Response {
    let intent = match Intent::from_bytes(data) {
        Ok(i) => i,
        Err(e) => {
            return Response::Error {
                reason: e.to_string(),
            }
        }
    };

    tracing::info!(
        "Received intent of type: {}",
        intent.intent_type.as_deref().unwrap_or("unknown"),
    );

    if intent.intent_type.as_deref() != Some(INTENT_TYPE_STELLAR_PAYMENT) {
        return Response::UnsupportedIntentType;
    }

    if intent.xdr.is_none() {
        return Response::Error {
            reason: "No XDR provided".into(),
        };
    }

    match validator::validate(&intent, network) {
        ValidationResult::Valid => {}
        result => {
            let reason = result
                .reason()
                .unwrap_or("validation failed")
                .to_string();
            tracing::warn!("Intent rejected: {reason}");
            return Response::Invalid { reason };
        }
    }

    Response::Processed {
        results: settler.settle(&intent).await,
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ed25519_dalek::SigningKey;
    use intentmesh_horizon::{
        envelope::Transaction, HorizonError, Ledger, TransactionEnvelope, TxSubmission,
    };
    use intentmesh_protocol::{SwapParams, SWAP_GAS_ESTIMATE};
    use rand::rngs::OsRng;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::swap::{QuoteTx, SwapApi, SwapError, SwapQuote};

    struct MockLedger {
        fail: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Ledger for MockLedger {
        async fn submit(&self, _xdr: &str) -> Result<TxSubmission, HorizonError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(HorizonError::Rejected {
                    status: 400,
                    detail: "tx_bad_seq".into(),
                })
            } else {
                Ok(TxSubmission {
                    hash: "cd".repeat(32),
                    ledger: 987_654,
                })
            }
        }
    }

    struct MockSwap;

    #[async_trait]
    impl SwapApi for MockSwap {
        async fn quote(&self, _params: &SwapParams) -> Result<SwapQuote, SwapError> {
            Ok(SwapQuote {
                raw: serde_json::json!({"dstAmount": "990"}),
                tx: QuoteTx {
                    to: "0xROUTER".into(),
                    data: "0xdeadbeef".into(),
                    value: "0".into(),
                },
            })
        }
    }

    fn settler(fail_ledger: bool) -> (Arc<Settler>, Arc<MockLedger>) {
        let ledger = Arc::new(MockLedger {
            fail: fail_ledger,
            calls: AtomicUsize::new(0),
        });
        let settler = Arc::new(Settler::new(ledger.clone(), Arc::new(MockSwap)));
        (settler, ledger)
    }

    fn signed_xdr(sign: bool) -> String {
        let key = SigningKey::generate(&mut OsRng);
        let source = key.verifying_key().to_bytes();
        let tx = Transaction::payment(source, [9u8; 32], 10_000_000, 42, 100);
        let mut env = TransactionEnvelope::new(tx);
        if sign {
            env.sign(&Network::testnet(), &key);
        }
        env.to_xdr()
    }

    fn request(xdr: Option<String>, intent_type: &str, swap: bool) -> Vec<u8> {
        let mut body = serde_json::json!({
            "metadata": {"source": "GABC"},
            "type": intent_type,
            "swap_required": swap,
        });
        if let Some(x) = xdr {
            body["xdr"] = serde_json::Value::String(x);
        }
        if swap {
            body["swap_params"] = serde_json::json!({
                "from_token": "0xAAA",
                "to_token": "0xBBB",
                "amount": "1000",
                "slippage": 1,
            });
        }
        serde_json::to_vec(&body).unwrap()
    }

    async fn respond_json(settler: &Settler, data: &[u8]) -> serde_json::Value {
        let response = respond(settler, &Network::testnet(), data).await;
        serde_json::to_value(&response).unwrap()
    }

    #[tokio::test]
    async fn valid_payment_is_processed() {
        let (settler, ledger) = settler(false);
        let out = respond_json(&settler, &request(Some(signed_xdr(true)), "stellar_payment", false)).await;

        assert_eq!(out["status"], "PROCESSED");
        assert_eq!(out["results"]["stellar"]["status"], "SUCCESS");
        assert_eq!(out["results"]["stellar"]["tx_hash"], "cd".repeat(32));
        assert_eq!(out["results"]["stellar"]["ledger"], 987_654);
        assert!(out["results"].get("swap").is_none() || out["results"]["swap"].is_null());
        assert_eq!(ledger.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn swap_intent_gets_quote_with_gas_estimate() {
        let (settler, _) = settler(false);
        let out = respond_json(&settler, &request(Some(signed_xdr(true)), "stellar_payment", true)).await;

        assert_eq!(out["status"], "PROCESSED");
        assert_eq!(out["results"]["swap"]["status"], "SWAP_READY");
        assert_eq!(out["results"]["swap"]["tx"]["gas"], SWAP_GAS_ESTIMATE);
        assert_eq!(out["results"]["swap"]["tx"]["to"], "0xROUTER");
    }

    #[tokio::test]
    async fn missing_xdr_is_error_and_never_settles() {
        let (settler, ledger) = settler(false);
        let out = respond_json(&settler, &request(None, "stellar_payment", false)).await;

        assert_eq!(out["status"], "ERROR");
        assert_eq!(out["reason"], "No XDR provided");
        assert_eq!(ledger.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unsigned_envelope_is_invalid_and_never_settles() {
        let (settler, ledger) = settler(false);
        let out = respond_json(&settler, &request(Some(signed_xdr(false)), "stellar_payment", false)).await;

        assert_eq!(out["status"], "INVALID");
        assert_eq!(out["reason"], "No signatures present");
        assert_eq!(ledger.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_intent_type_is_unsupported() {
        let (settler, ledger) = settler(false);
        let out = respond_json(&settler, &request(Some(signed_xdr(true)), "token_transfer", false)).await;

        assert_eq!(out["status"], "UNSUPPORTED_INTENT_TYPE");
        assert_eq!(ledger.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn undecodable_request_is_error() {
        let (settler, _) = settler(false);
        let out = respond_json(&settler, b"{not json").await;

        assert_eq!(out["status"], "ERROR");
        assert!(out["reason"].as_str().unwrap().starts_with("Invalid JSON"));
    }

    #[tokio::test]
    async fn ledger_rejection_is_reported_as_processed_failure() {
        let (settler, _) = settler(true);
        let out = respond_json(&settler, &request(Some(signed_xdr(true)), "stellar_payment", false)).await;

        // Settlement ran and failed; the exchange itself still succeeded.
        assert_eq!(out["status"], "PROCESSED");
        assert_eq!(out["results"]["status"], "ERROR");
        assert!(out["results"]["reason"]
            .as_str()
            .unwrap()
            .contains("tx_bad_seq"));
    }
}
