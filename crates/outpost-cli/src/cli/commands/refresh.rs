//! `outpost refresh` – walk the configured ban list sources and report.

use anyhow::{bail, Result};
use outpost_core::banlist::{BanListRefresh, MergeTarget};
use outpost_core::config::OutpostConfig;
use outpost_core::fetch::FetchScheduler;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

const TICK_INTERVAL: Duration = Duration::from_millis(50);

/// Counts entries as they are merged; stands in for the host's ban store.
#[derive(Default)]
struct CollectedBans {
    sources: usize,
    entries: usize,
    applied: bool,
}

impl MergeTarget for CollectedBans {
    fn merge(&mut self, raw: &str) {
        self.sources += 1;
        self.entries += raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .count();
    }

    fn finalize(&mut self) {
        self.applied = true;
    }
}

pub fn run_refresh(cfg: &OutpostConfig, urls: Vec<String>) -> Result<()> {
    let sources = if urls.is_empty() { cfg.ban_lists.clone() } else { urls };
    if sources.is_empty() {
        bail!("no ban list sources; pass URLs or set ban_lists in the config file");
    }
    let total = sources.len();

    let store = Rc::new(RefCell::new(CollectedBans::default()));
    let mut jobs = FetchScheduler::with_timeout(cfg.fetch.timeout());
    let refresh = BanListRefresh::new(sources, Rc::clone(&store) as Rc<RefCell<dyn MergeTarget>>);

    refresh.borrow_mut().start(&mut jobs);
    while refresh.borrow().busy() {
        jobs.tick();
        std::thread::sleep(TICK_INTERVAL);
    }

    let store = store.borrow();
    debug_assert!(store.applied, "refresh finished without applying the batch");
    println!(
        "merged {} entries from {}/{} sources",
        store.entries, store.sources, total
    );
    if store.sources < total {
        println!("{} source(s) skipped; see the log for details", total - store.sources);
    }
    Ok(())
}
