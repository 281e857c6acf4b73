//! Integration: a ban-list refresh chain and a peer drain driven through
//! one `Host`, using only the public API (scripted engine, sink transport).

use std::cell::RefCell;
use std::collections::HashMap;
use std::io;
use std::net::IpAddr;
use std::rc::Rc;
use std::time::Duration;

use outpost_core::banlist::{BanListRefresh, MergeTarget};
use outpost_core::config::PeerConfig;
use outpost_core::fetch::{FetchError, FetchRequest, FetchScheduler, TransferEngine, TransferPoll};
use outpost_core::host::Host;
use outpost_core::peer::{ConnectionId, PeerHandler, PeerRegistry, PeerTransport};

/// Engine that resolves each URL to a canned body (or a failure) on the
/// first poll after it starts.
struct ScriptedEngine {
    bodies: HashMap<String, Option<Vec<u8>>>,
    current: Option<String>,
}

impl ScriptedEngine {
    fn new(bodies: &[(&str, Option<&[u8]>)]) -> Self {
        Self {
            bodies: bodies
                .iter()
                .map(|(url, body)| (url.to_string(), body.map(|b| b.to_vec())))
                .collect(),
            current: None,
        }
    }
}

impl TransferEngine for ScriptedEngine {
    fn begin(&mut self, request: &FetchRequest) -> Result<(), FetchError> {
        assert!(self.current.is_none(), "one transfer at a time");
        self.current = Some(request.url.clone());
        Ok(())
    }

    fn poll(&mut self) -> TransferPoll {
        let Some(url) = self.current.take() else {
            return TransferPoll::InFlight;
        };
        match self.bodies.get(&url) {
            Some(Some(body)) => TransferPoll::Done(body.clone()),
            _ => TransferPoll::Failed { code: 6, message: "could not resolve host".into() },
        }
    }

    fn abort(&mut self) {
        self.current = None;
    }
}

#[derive(Default)]
struct Store {
    merges: Vec<String>,
    finalized: usize,
}

impl MergeTarget for Store {
    fn merge(&mut self, raw: &str) {
        self.merges.push(raw.to_string());
    }

    fn finalize(&mut self) {
        self.finalized += 1;
    }
}

struct SinkTransport(Rc<RefCell<Vec<u8>>>);

impl PeerTransport for SinkTransport {
    fn send(&mut self, data: &[u8]) -> io::Result<()> {
        self.0.borrow_mut().extend_from_slice(data);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn peer_addr(&self) -> Option<IpAddr> {
        None
    }

    fn hostname(&self) -> Option<&str> {
        None
    }
}

struct CountDisconnects(Rc<RefCell<usize>>);

impl PeerHandler for CountDisconnects {
    fn on_disconnect(&mut self, _connection: ConnectionId) {
        *self.0.borrow_mut() += 1;
    }
}

const A: &str = "http://master.example.com/a.txt";
const B: &str = "http://master.example.com/b.txt";
const C: &str = "http://master.example.com/c.txt";

#[test]
fn one_host_loop_drives_refresh_chain_and_peer_drain() {
    let engine = ScriptedEngine::new(&[
        (A, Some(b"1.2.3.4\n")),
        (B, None), // this source fails; the batch must continue
        (C, Some(b"5.6.7.8\n")),
    ]);
    let jobs = FetchScheduler::with_engine(Box::new(engine), Duration::from_secs(60));
    let peers = PeerRegistry::new(&PeerConfig { max_chunk_bytes: 4, send_on_enqueue: false });
    let mut host = Host::from_parts(jobs, peers);

    let store = Rc::new(RefCell::new(Store::default()));
    let refresh = BanListRefresh::new(
        vec![A.to_string(), B.to_string(), C.to_string()],
        Rc::clone(&store) as Rc<RefCell<dyn MergeTarget>>,
    );
    refresh.borrow_mut().start(&mut host.jobs);

    let sent = Rc::new(RefCell::new(Vec::new()));
    let disconnects = Rc::new(RefCell::new(0));
    const PEER: ConnectionId = 7;
    assert!(host.peers.accept(PEER, Box::new(SinkTransport(Rc::clone(&sent)))));
    assert!(host.peers.register_handler(PEER, Box::new(CountDisconnects(Rc::clone(&disconnects)))));
    assert!(host.peers.set_delete_when_drained(PEER, true));
    let payload: Vec<u8> = (0u8..10).collect();
    assert!(host.peers.enqueue(PEER, &payload));
    assert_eq!(host.peers.outbound_chunk_count(PEER), 3);

    for _ in 0..20 {
        host.tick();
        if !refresh.borrow().busy() && host.peers.is_empty() {
            break;
        }
    }

    let store = store.borrow();
    assert_eq!(
        store.merges,
        vec!["1.2.3.4\n".to_string(), "5.6.7.8\n".to_string()],
        "failed source skipped, the rest merged in order"
    );
    assert_eq!(store.finalized, 1);
    assert!(!refresh.borrow().busy());
    assert!(host.jobs.is_idle());

    assert_eq!(*sent.borrow(), payload, "drained chunks reconstruct the buffer");
    assert_eq!(*disconnects.borrow(), 1, "drained peer disconnected exactly once");
    assert!(host.peers.is_empty(), "sweep evicted the finished peer");
}
