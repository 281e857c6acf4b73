//! Job descriptions and the handler capability.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use super::error::FetchError;
use super::scheduler::FetchScheduler;

/// Scheduler-lifetime unique job id. Monotonically increasing, never reused.
pub type JobId = u64;

/// Opaque caller-supplied value handed back on every completion callback.
/// The scheduler never interprets it.
pub type Token = Box<dyn Any>;

/// Handlers are shared so the scheduler can hold one per queued job while
/// the owner (plugin code, the ban-list refresher) keeps its own reference.
pub type SharedHandler = Rc<RefCell<dyn FetchHandler>>;

/// What to fetch. A present `post_body` selects POST over GET.
#[derive(Debug, Clone, Default)]
pub struct FetchRequest {
    pub url: String,
    pub post_body: Option<String>,
    /// Raw header lines ("Name: value"), sent in order.
    pub headers: Vec<String>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self { url: url.into(), ..Self::default() }
    }

    pub fn post(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            post_body: Some(body.into()),
            headers: Vec::new(),
        }
    }

    pub fn header(mut self, line: impl Into<String>) -> Self {
        self.headers.push(line.into());
        self
    }
}

/// Identity of the job a callback refers to, plus its opaque token.
#[derive(Clone, Copy)]
pub struct FetchContext<'a> {
    pub id: JobId,
    pub url: &'a str,
    pub token: Option<&'a dyn Any>,
}

/// Callback capability for fetch jobs.
///
/// Callbacks receive the scheduler so they can submit or cancel follow-up
/// work from inside a completion; the finished job is already off the queue
/// by the time its handler runs.
pub trait FetchHandler {
    /// The transfer finished with a non-empty body.
    fn on_done(&mut self, jobs: &mut FetchScheduler, cx: FetchContext<'_>, body: &[u8], complete: bool);

    /// The transfer exceeded the scheduler's timeout window.
    fn on_timeout(&mut self, jobs: &mut FetchScheduler, cx: FetchContext<'_>);

    /// The transfer failed, produced no body, or was canceled.
    fn on_error(&mut self, jobs: &mut FetchScheduler, cx: FetchContext<'_>, error: &FetchError);
}

/// Adapts a bare completion closure to the full handler capability, for
/// callers that predate the richer interface and only want the final body.
/// Timeouts and errors are logged and otherwise dropped.
pub struct CallbackHandler<F> {
    callback: F,
}

impl<F: FnMut(&str, &[u8])> CallbackHandler<F> {
    pub fn new(callback: F) -> SharedHandler
    where
        F: 'static,
    {
        Rc::new(RefCell::new(Self { callback }))
    }
}

impl<F: FnMut(&str, &[u8])> FetchHandler for CallbackHandler<F> {
    fn on_done(&mut self, _jobs: &mut FetchScheduler, cx: FetchContext<'_>, body: &[u8], complete: bool) {
        if complete {
            (self.callback)(cx.url, body);
        }
    }

    fn on_timeout(&mut self, _jobs: &mut FetchScheduler, cx: FetchContext<'_>) {
        tracing::warn!(url = cx.url, "fetch timed out");
    }

    fn on_error(&mut self, _jobs: &mut FetchScheduler, cx: FetchContext<'_>, error: &FetchError) {
        tracing::warn!(url = cx.url, "fetch failed: {error}");
    }
}
