//! Host-loop glue.
//!
//! A host loop must tick the fetch scheduler, drain peer queues, run the
//! inactivity check, and sweep disconnected peers at a regular cadence.
//! `Host` bundles those obligations behind one non-blocking `tick`.

use std::time::Instant;

use crate::config::OutpostConfig;
use crate::fetch::FetchScheduler;
use crate::peer::PeerRegistry;

pub struct Host {
    pub jobs: FetchScheduler,
    pub peers: PeerRegistry,
}

impl Host {
    pub fn new(config: &OutpostConfig) -> Self {
        Self {
            jobs: FetchScheduler::with_timeout(config.fetch.timeout()),
            peers: PeerRegistry::new(&config.peer),
        }
    }

    /// Assemble from parts, e.g. a scheduler over a custom engine.
    pub fn from_parts(jobs: FetchScheduler, peers: PeerRegistry) -> Self {
        Self { jobs, peers }
    }

    /// Run one loop iteration. Never blocks.
    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    pub fn tick_at(&mut self, now: Instant) {
        self.jobs.tick_at(now);
        self.peers.drain_at(now);
        self.peers.check_inactivity_at(now);
        self.peers.sweep();
    }
}
