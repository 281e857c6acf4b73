//! Peer registry: per-connection outbound state and housekeeping.

use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::time::{Duration, Instant};

use crate::config::PeerConfig;

use super::transport::PeerTransport;

/// Stable key assigned by the transport layer when it accepts a connection.
pub type ConnectionId = i32;

/// Callback capability for peer lifecycle events.
pub trait PeerHandler {
    /// The connection finished transmitting and is going away.
    fn on_disconnect(&mut self, connection: ConnectionId);
}

enum SendResult {
    Sent { drained: bool },
    Failed,
}

struct Peer {
    transport: Option<Box<dyn PeerTransport>>,
    handler: Option<Box<dyn PeerHandler>>,
    send_chunks: VecDeque<Vec<u8>>,
    min_send_interval: Duration,
    inactivity_timeout: Option<Duration>,
    delete_when_drained: bool,
    delete_me: bool,
    /// Set once the game promotes this connection to a full player; promoted
    /// entries are invisible to every non-player accessor.
    player: Option<i32>,
    last_send: Option<Instant>,
    last_activity: Instant,
}

impl Peer {
    fn ready_to_send(&self, now: Instant) -> bool {
        match self.last_send {
            Some(last) => now.duration_since(last) >= self.min_send_interval,
            None => true,
        }
    }

    /// Send the head chunk. Callers check the queue is non-empty.
    fn send_head(&mut self, id: ConnectionId, now: Instant) -> SendResult {
        let Some(chunk) = self.send_chunks.pop_front() else {
            return SendResult::Sent { drained: true };
        };
        if let Some(transport) = self.transport.as_mut() {
            if let Err(err) = transport.send(&chunk) {
                tracing::warn!(connection = id, "peer send failed: {err}");
                return SendResult::Failed;
            }
        }
        self.last_send = Some(now);
        SendResult::Sent { drained: self.send_chunks.is_empty() }
    }
}

/// Owns every tracked peer connection. Shared across the host process and
/// driven from its loop; disconnects only flag entries (`delete_me`) and a
/// separate `sweep` pass evicts them, so disconnect notification can never
/// race registry iteration elsewhere.
pub struct PeerRegistry {
    peers: HashMap<ConnectionId, Peer>,
    max_chunk: usize,
    send_on_enqueue: bool,
}

impl PeerRegistry {
    pub fn new(config: &PeerConfig) -> Self {
        Self {
            peers: HashMap::new(),
            max_chunk: config.max_chunk_bytes.max(1),
            send_on_enqueue: config.send_on_enqueue,
        }
    }

    /// Track a connection the transport layer just accepted. False if the
    /// id is already taken.
    pub fn accept(&mut self, id: ConnectionId, transport: Box<dyn PeerTransport>) -> bool {
        self.accept_at(id, transport, Instant::now())
    }

    pub fn accept_at(&mut self, id: ConnectionId, transport: Box<dyn PeerTransport>, now: Instant) -> bool {
        if self.peers.contains_key(&id) {
            return false;
        }
        self.peers.insert(
            id,
            Peer {
                transport: Some(transport),
                handler: None,
                send_chunks: VecDeque::new(),
                min_send_interval: Duration::ZERO,
                inactivity_timeout: None,
                delete_when_drained: false,
                delete_me: false,
                player: None,
                last_send: None,
                last_activity: now,
            },
        );
        tracing::debug!(connection = id, "peer accepted");
        true
    }

    /// Hide a connection from the non-player surface once the game promotes
    /// it to a full player.
    pub fn promote_to_player(&mut self, id: ConnectionId, player: i32) -> bool {
        match self.peers.get_mut(&id) {
            Some(peer) if !peer.delete_me => {
                peer.player = Some(player);
                true
            }
            _ => false,
        }
    }

    /// Install the lifecycle handler. False if the id does not resolve or a
    /// handler is already registered.
    pub fn register_handler(&mut self, id: ConnectionId, handler: Box<dyn PeerHandler>) -> bool {
        let Some(peer) = self.non_player_mut(id) else {
            return false;
        };
        if peer.handler.is_some() {
            return false;
        }
        peer.handler = Some(handler);
        true
    }

    pub fn remove_handler(&mut self, id: ConnectionId) -> bool {
        self.non_player_mut(id)
            .map_or(false, |peer| peer.handler.take().is_some())
    }

    /// Tear the peer down automatically once its queue drains.
    pub fn set_delete_when_drained(&mut self, id: ConnectionId, enable: bool) -> bool {
        self.non_player_mut(id).map_or(false, |peer| {
            peer.delete_when_drained = enable;
            true
        })
    }

    /// Minimum interval between chunk sends.
    pub fn set_send_throttle(&mut self, id: ConnectionId, interval: Duration) -> bool {
        self.non_player_mut(id).map_or(false, |peer| {
            peer.min_send_interval = interval;
            true
        })
    }

    /// Idle window after which `check_inactivity_at` disconnects the peer;
    /// `None` disables the check. The registry only stores the threshold,
    /// the host loop decides when to evaluate it.
    pub fn set_inactivity_timeout(&mut self, id: ConnectionId, timeout: Option<Duration>) -> bool {
        self.non_player_mut(id).map_or(false, |peer| {
            peer.inactivity_timeout = timeout;
            true
        })
    }

    /// Record inbound traffic so the inactivity window starts over.
    pub fn note_activity_at(&mut self, id: ConnectionId, now: Instant) -> bool {
        self.non_player_mut(id).map_or(false, |peer| {
            peer.last_activity = now;
            true
        })
    }

    /// Queue bytes for transmission, split into chunks of at most the
    /// configured maximum. False for unknown ids, player connections, and
    /// empty buffers. With the send-on-enqueue policy, the first chunk goes
    /// out immediately when the queue was empty and the throttle allows.
    pub fn enqueue(&mut self, id: ConnectionId, data: &[u8]) -> bool {
        if data.is_empty() {
            return false;
        }
        let max_chunk = self.max_chunk;
        let send_now = self.send_on_enqueue;
        let was_empty;
        {
            let Some(peer) = self.non_player_mut(id) else {
                return false;
            };
            was_empty = peer.send_chunks.is_empty();
            for chunk in data.chunks(max_chunk) {
                peer.send_chunks.push_back(chunk.to_vec());
            }
        }
        if send_now && was_empty {
            self.drain_one_at(id, Instant::now());
        }
        true
    }

    /// Chunks still awaiting transmission; 0 for unknown ids.
    pub fn outbound_chunk_count(&self, id: ConnectionId) -> usize {
        self.non_player(id).map_or(0, |peer| peer.send_chunks.len())
    }

    pub fn peer_ip(&self, id: ConnectionId) -> Option<IpAddr> {
        self.non_player(id)?.transport.as_ref()?.peer_addr()
    }

    pub fn peer_hostname(&self, id: ConnectionId) -> Option<String> {
        self.non_player(id)?
            .transport
            .as_ref()?
            .hostname()
            .map(str::to_string)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn drain(&mut self) {
        self.drain_at(Instant::now());
    }

    /// Send at most one queued chunk per peer, honoring each throttle.
    pub fn drain_at(&mut self, now: Instant) {
        let ids: Vec<ConnectionId> = self.peers.keys().copied().collect();
        for id in ids {
            self.drain_one_at(id, now);
        }
    }

    /// Flush everything still queued (throttle bypassed, so the data is
    /// delivered before the close), notify the handler, release the
    /// transport, and flag the entry for the next sweep.
    pub fn disconnect(&mut self, id: ConnectionId) -> bool {
        let now = Instant::now();
        {
            let Some(peer) = self.non_player_mut(id) else {
                return false;
            };
            while !peer.send_chunks.is_empty() {
                if let SendResult::Failed = peer.send_head(id, now) {
                    peer.send_chunks.clear();
                    break;
                }
            }
        }
        self.tear_down(id);
        true
    }

    /// Disconnect peers whose idle window has lapsed.
    pub fn check_inactivity_at(&mut self, now: Instant) {
        let expired: Vec<ConnectionId> = self
            .peers
            .iter()
            .filter(|(_, peer)| !peer.delete_me && peer.player.is_none())
            .filter(|(_, peer)| {
                peer.inactivity_timeout
                    .map_or(false, |window| now.duration_since(peer.last_activity) >= window)
            })
            .map(|(id, _)| *id)
            .collect();
        for id in expired {
            tracing::info!(connection = id, "peer idle too long; disconnecting");
            self.disconnect(id);
        }
    }

    /// Evict entries flagged by disconnect. Run once per host-loop pass,
    /// after drains and handlers have settled. Returns how many were evicted.
    pub fn sweep(&mut self) -> usize {
        let before = self.peers.len();
        self.peers.retain(|_, peer| !peer.delete_me);
        before - self.peers.len()
    }

    fn non_player(&self, id: ConnectionId) -> Option<&Peer> {
        let peer = self.peers.get(&id)?;
        if peer.player.is_some() || peer.delete_me {
            return None;
        }
        Some(peer)
    }

    fn non_player_mut(&mut self, id: ConnectionId) -> Option<&mut Peer> {
        let peer = self.peers.get_mut(&id)?;
        if peer.player.is_some() || peer.delete_me {
            return None;
        }
        Some(peer)
    }

    fn drain_one_at(&mut self, id: ConnectionId, now: Instant) {
        let outcome = {
            let Some(peer) = self.non_player_mut(id) else {
                return;
            };
            if peer.send_chunks.is_empty() || !peer.ready_to_send(now) {
                return;
            }
            peer.send_head(id, now)
        };
        match outcome {
            SendResult::Sent { drained: true } => {
                if self.peers.get(&id).map_or(false, |peer| peer.delete_when_drained) {
                    self.disconnect(id);
                }
            }
            SendResult::Sent { drained: false } => {}
            SendResult::Failed => self.tear_down(id),
        }
    }

    /// Notify and flag for removal; shared by disconnect and send failures.
    fn tear_down(&mut self, id: ConnectionId) {
        let Some(peer) = self.peers.get_mut(&id) else {
            return;
        };
        if let Some(mut handler) = peer.handler.take() {
            handler.on_disconnect(id);
        }
        if let Some(mut transport) = peer.transport.take() {
            let _ = transport.flush();
        }
        peer.send_chunks.clear();
        peer.delete_me = true;
        tracing::debug!(connection = id, "peer disconnected");
    }
}
