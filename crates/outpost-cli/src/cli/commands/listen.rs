//! `outpost listen` – serve a file to raw peers through the outbound queue.

use anyhow::{Context, Result};
use outpost_core::config::OutpostConfig;
use outpost_core::peer::{ConnectionId, PeerHandler, PeerRegistry, TcpPeerTransport};
use std::io;
use std::net::TcpListener;
use std::time::Duration;

const TICK_INTERVAL: Duration = Duration::from_millis(20);

struct LogDisconnect;

impl PeerHandler for LogDisconnect {
    fn on_disconnect(&mut self, connection: ConnectionId) {
        tracing::info!(connection, "peer served and disconnected");
    }
}

pub fn run_listen(cfg: &OutpostConfig, banner: &std::path::Path, port: u16, throttle_ms: u64) -> Result<()> {
    let data = std::fs::read(banner)
        .with_context(|| format!("reading {}", banner.display()))?;

    let listener = TcpListener::bind(("0.0.0.0", port))
        .with_context(|| format!("binding port {port}"))?;
    listener.set_nonblocking(true)?;
    println!("serving {} ({} bytes) on port {port}", banner.display(), data.len());

    let mut peers = PeerRegistry::new(&cfg.peer);
    let mut next_id: ConnectionId = 0;

    loop {
        match listener.accept() {
            Ok((stream, addr)) => {
                next_id += 1;
                let id = next_id;
                tracing::info!(%addr, connection = id, "peer connected");
                peers.accept(id, Box::new(TcpPeerTransport::new(stream)));
                peers.register_handler(id, Box::new(LogDisconnect));
                peers.set_send_throttle(id, Duration::from_millis(throttle_ms));
                peers.set_delete_when_drained(id, true);
                peers.enqueue(id, &data);
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {}
            Err(err) => return Err(err).context("accepting connection"),
        }

        peers.drain();
        peers.sweep();
        std::thread::sleep(TICK_INTERVAL);
    }
}
