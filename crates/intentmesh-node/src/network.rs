use std::io;
use std::time::Duration;

use async_trait::async_trait;
use futures::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use libp2p::{
    gossipsub, identify, noise, request_response, tcp, yamux,
    swarm::NetworkBehaviour,
    StreamProtocol,
};

use intentmesh_protocol::{
    DISCOVERY_TOPIC, MAX_INTENT_SIZE, MAX_RESPONSE_SIZE, PROTOCOL_ID, REQUEST_TIMEOUT_SECS,
};

// ============================================================================
// Combined behaviour
// ============================================================================

#[derive(NetworkBehaviour)]
pub struct MeshBehaviour {
    /// Peer-address announcements on the discovery topic.
    pub gossipsub: gossipsub::Behaviour,
    /// Address and key exchange on connect.
    pub identify: identify::Behaviour,
    /// The intent request/response exchange.
    pub request_response: request_response::Behaviour<IntentCodec>,
}

// ============================================================================
// Length-prefixed JSON codec for intent streams
// ============================================================================

/// Simple 4-byte LE length prefix codec.
/// Request  = UTF-8 JSON intent object
/// Response = UTF-8 JSON response object
#[derive(Clone, Default)]
pub struct IntentCodec;

#[async_trait]
impl request_response::Codec for IntentCodec {
    type Protocol = StreamProtocol;
    type Request  = Vec<u8>;
    type Response = Vec<u8>;

    async fn read_request<T>(&mut self, _: &Self::Protocol, io: &mut T)
        -> io::Result<Self::Request>
    where T: AsyncRead + Unpin + Send {
        read_framed(io, MAX_INTENT_SIZE).await
    }

    async fn read_response<T>(&mut self, _: &Self::Protocol, io: &mut T)
        -> io::Result<Self::Response>
    where T: AsyncRead + Unpin + Send {
        read_framed(io, MAX_RESPONSE_SIZE).await
    }

    async fn write_request<T>(&mut self, _: &Self::Protocol, io: &mut T, req: Self::Request)
        -> io::Result<()>
    where T: AsyncWrite + Unpin + Send {
        write_framed(io, &req).await
    }

    async fn write_response<T>(&mut self, _: &Self::Protocol, io: &mut T, res: Self::Response)
        -> io::Result<()>
    where T: AsyncWrite + Unpin + Send {
        write_framed(io, &res).await
    }
}

async fn read_framed<T: AsyncRead + Unpin>(io: &mut T, max: usize) -> io::Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    io.read_exact(&mut len_buf).await?;
    let len = u32::from_le_bytes(len_buf) as usize;
    if len > max {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "frame exceeds limit"));
    }
    let mut buf = vec![0u8; len];
    io.read_exact(&mut buf).await?;
    Ok(buf)
}

async fn write_framed<T: AsyncWrite + Unpin>(io: &mut T, data: &[u8]) -> io::Result<()> {
    io.write_all(&(data.len() as u32).to_le_bytes()).await?;
    io.write_all(data).await?;
    io.flush().await
}

// ============================================================================
// Swarm builder
// ============================================================================

/// Build the libp2p swarm: TCP + Noise + Yamux with a QUIC listener derived
/// from the same address, subscribed to the discovery topic.
pub fn build_swarm(
    keypair: libp2p::identity::Keypair,
    listen_addr: libp2p::Multiaddr,
) -> anyhow::Result<libp2p::Swarm<MeshBehaviour>> {
    let mut swarm = libp2p::SwarmBuilder::with_existing_identity(keypair)
        .with_tokio()
        .with_tcp(tcp::Config::default(), noise::Config::new, yamux::Config::default)?
        .with_quic()
        .with_dns()?
        .with_behaviour(|key| {
            let gossip_cfg = gossipsub::ConfigBuilder::default()
                .heartbeat_interval(Duration::from_secs(10))
                .validation_mode(gossipsub::ValidationMode::Strict)
                .max_transmit_size(MAX_INTENT_SIZE)
                .build()
                .expect("static gossipsub config is valid");

            let gossipsub = gossipsub::Behaviour::new(
                gossipsub::MessageAuthenticity::Signed(key.clone()),
                gossip_cfg,
            )
            .expect("gossipsub init");

            let identify = identify::Behaviour::new(identify::Config::new(
                "/stellar/identify/1.0.0".to_string(),
                key.public(),
            ));

            let request_response = request_response::Behaviour::<IntentCodec>::new(
                [(
                    StreamProtocol::new(PROTOCOL_ID),
                    request_response::ProtocolSupport::Full,
                )],
                request_response::Config::default()
                    .with_request_timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS)),
            );

            MeshBehaviour {
                gossipsub,
                identify,
                request_response,
            }
        })?
        .with_swarm_config(|cfg| cfg.with_idle_connection_timeout(Duration::from_secs(60)))
        .build();

    swarm
        .behaviour_mut()
        .gossipsub
        .subscribe(&gossipsub::IdentTopic::new(DISCOVERY_TOPIC))?;

    // Listen on TCP.
    swarm.listen_on(listen_addr.clone())?;

    // Also listen on QUIC (same IP, same port, UDP).
    // TCP and UDP can share the same port number without conflict.
    if let Some(quic_addr) = to_quic_addr(&listen_addr) {
        match swarm.listen_on(quic_addr.clone()) {
            Ok(_)  => tracing::info!("Also listening on QUIC: {quic_addr}"),
            Err(e) => tracing::warn!("QUIC listen failed for {quic_addr}: {e}"),
        }
    }

    Ok(swarm)
}

/// Derive a QUIC listen address from a TCP listen address.
///
/// /ip4/X.X.X.X/tcp/PORT → /ip4/X.X.X.X/udp/PORT/quic-v1
/// Returns None if the address contains no /tcp component.
fn to_quic_addr(tcp_addr: &libp2p::Multiaddr) -> Option<libp2p::Multiaddr> {
    use libp2p::multiaddr::Protocol;
    let mut new_addr = libp2p::Multiaddr::empty();
    let mut found = false;
    for proto in tcp_addr.iter() {
        match proto {
            Protocol::Tcp(port) => {
                new_addr.push(Protocol::Udp(port));
                new_addr.push(Protocol::QuicV1);
                found = true;
            }
            other => new_addr.push(other),
        }
    }
    if found { Some(new_addr) } else { None }
}
