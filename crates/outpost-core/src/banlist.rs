//! Chained refresh of remote ban lists.
//!
//! Walks an ordered list of source URLs through the fetch scheduler one at
//! a time, merging each fetched body into a target store. A source that
//! errors or times out is skipped without retry; the batch ends with a
//! single `finalize` once the list is exhausted.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::fetch::{FetchContext, FetchError, FetchHandler, FetchRequest, FetchScheduler};

/// Store the fetched lists are folded into.
pub trait MergeTarget {
    /// Fold one source body into the pending state.
    fn merge(&mut self, raw: &str);

    /// Apply the pending state; called once per completed batch.
    fn finalize(&mut self);
}

/// Sequential consumer of the fetch scheduler: one outstanding job at a
/// time, sources attempted strictly in list order.
pub struct BanListRefresh {
    urls: Vec<String>,
    cursor: usize,
    busy: bool,
    /// Body accumulated for the source currently being fetched.
    pending: Vec<u8>,
    target: Rc<RefCell<dyn MergeTarget>>,
    weak_self: Weak<RefCell<BanListRefresh>>,
}

impl BanListRefresh {
    pub fn new(urls: Vec<String>, target: Rc<RefCell<dyn MergeTarget>>) -> Rc<RefCell<Self>> {
        Rc::new_cyclic(|weak| {
            RefCell::new(Self {
                urls,
                cursor: 0,
                busy: false,
                pending: Vec::new(),
                target,
                weak_self: weak.clone(),
            })
        })
    }

    /// Begin walking the source list. No-op while a batch is in progress,
    /// so overlapping cursors cannot happen.
    pub fn start(&mut self, jobs: &mut FetchScheduler) {
        if self.busy {
            return;
        }
        self.busy = true;
        self.cursor = 0;
        tracing::info!(sources = self.urls.len(), "ban list refresh started");
        self.advance(jobs);
    }

    /// True from `start` until the cursor has exhausted the list. While
    /// false, no outstanding fetch job belongs to this refresher.
    pub fn busy(&self) -> bool {
        self.busy
    }

    fn advance(&mut self, jobs: &mut FetchScheduler) {
        loop {
            if self.cursor >= self.urls.len() {
                self.target.borrow_mut().finalize();
                self.busy = false;
                tracing::info!("ban list refresh finished");
                return;
            }
            self.pending.clear();
            let url = self.urls[self.cursor].clone();
            self.cursor += 1;
            let Some(handler) = self.weak_self.upgrade() else {
                self.busy = false;
                return;
            };
            match jobs.submit(FetchRequest::get(url), handler, None) {
                Ok(_) => return,
                Err(err) => {
                    // Bad source URL; move on to the next one.
                    tracing::warn!("skipping ban list source: {err}");
                }
            }
        }
    }
}

impl FetchHandler for BanListRefresh {
    fn on_done(&mut self, jobs: &mut FetchScheduler, _cx: FetchContext<'_>, body: &[u8], complete: bool) {
        if !self.busy {
            return;
        }
        self.pending.extend_from_slice(body);
        if complete {
            let text = String::from_utf8_lossy(&self.pending).into_owned();
            self.target.borrow_mut().merge(&text);
            self.pending.clear();
            self.advance(jobs);
        }
    }

    fn on_timeout(&mut self, jobs: &mut FetchScheduler, cx: FetchContext<'_>) {
        if !self.busy {
            return;
        }
        tracing::warn!(url = cx.url, "ban list source timed out; skipping");
        self.advance(jobs);
    }

    fn on_error(&mut self, jobs: &mut FetchScheduler, cx: FetchContext<'_>, error: &FetchError) {
        if !self.busy {
            return;
        }
        tracing::warn!(url = cx.url, "ban list source failed: {error}; skipping");
        self.advance(jobs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::FakeEngine;
    use crate::fetch::TransferPoll;
    use std::time::{Duration, Instant};

    #[derive(Default)]
    struct RecordingTarget {
        merges: Vec<String>,
        finalized: usize,
    }

    impl MergeTarget for RecordingTarget {
        fn merge(&mut self, raw: &str) {
            self.merges.push(raw.to_string());
        }

        fn finalize(&mut self) {
            self.finalized += 1;
        }
    }

    const A: &str = "http://master.example.com/a.txt";
    const B: &str = "http://master.example.com/b.txt";
    const C: &str = "http://master.example.com/c.txt";

    fn setup(urls: &[&str]) -> (FakeEngine, FetchScheduler, Rc<RefCell<RecordingTarget>>, Rc<RefCell<BanListRefresh>>) {
        let engine = FakeEngine::default();
        let jobs = FetchScheduler::with_engine(Box::new(engine.clone()), Duration::from_secs(60));
        let target = Rc::new(RefCell::new(RecordingTarget::default()));
        let refresh = BanListRefresh::new(
            urls.iter().map(|u| u.to_string()).collect(),
            Rc::clone(&target) as Rc<RefCell<dyn MergeTarget>>,
        );
        (engine, jobs, target, refresh)
    }

    #[test]
    fn failed_source_is_skipped_and_rest_merged() {
        let (engine, mut jobs, target, refresh) = setup(&[A, B, C]);
        refresh.borrow_mut().start(&mut jobs);
        assert_eq!(engine.begun(), vec![A.to_string()]);

        engine.push(TransferPoll::Done(b"1.2.3.4\n".to_vec()));
        jobs.tick();
        assert_eq!(engine.begun().len(), 2, "next source starts after a merge");

        engine.push(TransferPoll::Failed { code: 6, message: "could not resolve".into() });
        jobs.tick();
        assert_eq!(engine.begun().len(), 3, "failure advances to the next source");

        engine.push(TransferPoll::Done(b"5.6.7.8\n".to_vec()));
        jobs.tick();

        let target = target.borrow();
        assert_eq!(target.merges, vec!["1.2.3.4\n".to_string(), "5.6.7.8\n".to_string()]);
        assert_eq!(target.finalized, 1, "finalize runs once, after the last source");
        assert!(!refresh.borrow().busy());
        assert!(jobs.is_idle());
    }

    #[test]
    fn timed_out_source_is_skipped() {
        let (engine, mut jobs, target, refresh) = setup(&[A, B]);
        refresh.borrow_mut().start(&mut jobs);

        // First source never answers.
        jobs.tick_at(Instant::now() + Duration::from_secs(61));
        assert_eq!(engine.begun().len(), 2, "timeout advances the cursor");

        engine.push(TransferPoll::Done(b"x\n".to_vec()));
        jobs.tick();

        let target = target.borrow();
        assert_eq!(target.merges, vec!["x\n".to_string()]);
        assert_eq!(target.finalized, 1);
        assert!(!refresh.borrow().busy());
    }

    #[test]
    fn start_while_busy_is_a_no_op() {
        let (engine, mut jobs, _target, refresh) = setup(&[A, B]);
        refresh.borrow_mut().start(&mut jobs);
        assert!(refresh.borrow().busy());

        refresh.borrow_mut().start(&mut jobs);
        assert_eq!(engine.begun().len(), 1, "no duplicate job while busy");
        assert_eq!(jobs.pending_jobs(), 1);
    }

    #[test]
    fn empty_source_list_finalizes_immediately() {
        let (engine, mut jobs, target, refresh) = setup(&[]);
        refresh.borrow_mut().start(&mut jobs);
        assert!(!refresh.borrow().busy());
        assert_eq!(target.borrow().finalized, 1);
        assert!(engine.begun().is_empty());
    }

    #[test]
    fn partial_bodies_accumulate_until_complete() {
        let (_engine, mut jobs, target, refresh) = setup(&[A]);
        refresh.borrow_mut().start(&mut jobs);

        let cx = FetchContext { id: 1, url: A, token: None };
        refresh.borrow_mut().on_done(&mut jobs, cx, b"10.0.", false);
        assert!(target.borrow().merges.is_empty(), "nothing merged until complete");
        refresh.borrow_mut().on_done(&mut jobs, cx, b"0.1\n", true);

        let target = target.borrow();
        assert_eq!(target.merges, vec!["10.0.0.1\n".to_string()]);
        assert_eq!(target.finalized, 1);
    }

    #[test]
    fn invalid_source_url_is_skipped_synchronously() {
        let (engine, mut jobs, target, refresh) = setup(&["not a url", A]);
        refresh.borrow_mut().start(&mut jobs);
        assert_eq!(engine.begun(), vec![A.to_string()], "bad source never becomes a job");

        engine.push(TransferPoll::Done(b"ok\n".to_vec()));
        jobs.tick();
        assert_eq!(target.borrow().finalized, 1);
        assert!(!refresh.borrow().busy());
    }
}
