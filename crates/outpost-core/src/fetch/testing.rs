//! Scripted transfer engine shared by unit tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use super::engine::{TransferEngine, TransferPoll};
use super::error::FetchError;
use super::job::FetchRequest;

#[derive(Default)]
struct EngineState {
    begun: Vec<String>,
    outcomes: VecDeque<TransferPoll>,
    active: bool,
    aborted: usize,
}

/// Engine whose poll outcomes are scripted by the test. Asserts the
/// scheduler's single-flight discipline on every `begin`.
#[derive(Clone, Default)]
pub(crate) struct FakeEngine(Rc<RefCell<EngineState>>);

impl FakeEngine {
    /// Queue the outcome the next poll of the active transfer reports.
    pub(crate) fn push(&self, outcome: TransferPoll) {
        self.0.borrow_mut().outcomes.push_back(outcome);
    }

    /// URLs begun so far, in order.
    pub(crate) fn begun(&self) -> Vec<String> {
        self.0.borrow().begun.clone()
    }

    pub(crate) fn aborted(&self) -> usize {
        self.0.borrow().aborted
    }
}

impl TransferEngine for FakeEngine {
    fn begin(&mut self, request: &FetchRequest) -> Result<(), FetchError> {
        let mut state = self.0.borrow_mut();
        assert!(!state.active, "transfer begun while another is active");
        state.active = true;
        state.begun.push(request.url.clone());
        Ok(())
    }

    fn poll(&mut self) -> TransferPoll {
        let mut state = self.0.borrow_mut();
        match state.outcomes.pop_front() {
            Some(outcome) => {
                state.active = false;
                outcome
            }
            None => TransferPoll::InFlight,
        }
    }

    fn abort(&mut self) {
        let mut state = self.0.borrow_mut();
        state.active = false;
        state.aborted += 1;
        // The scripted result belongs to the transfer that just died.
        state.outcomes.clear();
    }
}
