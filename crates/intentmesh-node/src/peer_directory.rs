use std::collections::HashMap;

use libp2p::{multiaddr::Protocol, Multiaddr, PeerId};

/// Maximum number of distinct peer addresses tracked in memory.
/// Prevents unbounded growth from advertisement floods.
const MAX_PEERS: usize = 1_024;

/// A discovered peer: reachable multiaddress plus peer id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerAddress {
    pub peer_id: PeerId,
    pub addr: Multiaddr,
}

impl PeerAddress {
    /// Split a full multiaddr of the form `/ip4/../tcp/../p2p/<PeerId>`
    /// into its dialable address and peer id. Returns `None` when the
    /// `/p2p` component is missing or malformed.
    pub fn from_multiaddr(full: &Multiaddr) -> Option<Self> {
        let mut addr = Multiaddr::empty();
        let mut peer_id = None;
        for proto in full.iter() {
            match proto {
                Protocol::P2p(pid) => peer_id = Some(pid),
                other => addr.push(other),
            }
        }
        Some(Self {
            peer_id: peer_id?,
            addr,
        })
    }

    /// The full advertised form, `addr ⊕ /p2p/<PeerId>`.
    pub fn full_addr(&self) -> Multiaddr {
        self.addr.clone().with(Protocol::P2p(self.peer_id))
    }
}

/// The set of known peers, keyed by dialable address.
///
/// `add` is idempotent; `all` returns a snapshot, so additions made while a
/// caller walks the result are not reflected. Owned exclusively by the node
/// event loop — no interior locking needed.
pub struct PeerDirectory {
    by_addr: HashMap<Multiaddr, PeerId>,
}

impl PeerDirectory {
    pub fn new() -> Self {
        Self {
            by_addr: HashMap::new(),
        }
    }

    /// Insert a peer. Returns true if the address was not known before.
    /// At capacity, new entries are dropped rather than evicting peers
    /// we have already verified we can reach.
    pub fn add(&mut self, peer: PeerAddress) -> bool {
        if self.by_addr.contains_key(&peer.addr) {
            return false;
        }
        if self.by_addr.len() >= MAX_PEERS {
            tracing::warn!("Peer directory full ({MAX_PEERS}) — dropping {}", peer.addr);
            return false;
        }
        self.by_addr.insert(peer.addr, peer.peer_id);
        true
    }

    pub fn contains(&self, addr: &Multiaddr) -> bool {
        self.by_addr.contains_key(addr)
    }

    /// Snapshot of all known peers.
    pub fn all(&self) -> Vec<PeerAddress> {
        self.by_addr
            .iter()
            .map(|(addr, peer_id)| PeerAddress {
                peer_id: *peer_id,
                addr: addr.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_addr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_addr.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(port: u16) -> PeerAddress {
        let full: Multiaddr = format!(
            "/ip4/127.0.0.1/tcp/{port}/p2p/{}",
            PeerId::random()
        )
        .parse()
        .unwrap();
        PeerAddress::from_multiaddr(&full).unwrap()
    }

    #[test]
    fn add_is_idempotent() {
        let mut dir = PeerDirectory::new();
        let p = peer(9000);
        assert!(dir.add(p.clone()));
        assert!(!dir.add(p.clone()));
        assert_eq!(dir.len(), 1);
        assert!(dir.contains(&p.addr));
    }

    #[test]
    fn snapshot_iteration() {
        let mut dir = PeerDirectory::new();
        dir.add(peer(9000));
        dir.add(peer(9001));
        let snapshot = dir.all();
        assert_eq!(snapshot.len(), 2);
        // Mutating after the snapshot does not affect it.
        dir.add(peer(9002));
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn from_multiaddr_requires_p2p_component() {
        let bare: Multiaddr = "/ip4/127.0.0.1/tcp/9000".parse().unwrap();
        assert!(PeerAddress::from_multiaddr(&bare).is_none());
    }

    #[test]
    fn full_addr_round_trips() {
        let p = peer(9000);
        let again = PeerAddress::from_multiaddr(&p.full_addr()).unwrap();
        assert_eq!(p, again);
    }
}
