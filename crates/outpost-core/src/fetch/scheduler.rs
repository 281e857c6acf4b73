//! FIFO fetch queue with a single transfer in flight.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use url::Url;

use super::curl_engine::CurlEngine;
use super::engine::{TransferEngine, TransferPoll};
use super::error::FetchError;
use super::job::{FetchContext, FetchRequest, JobId, SharedHandler, Token};

/// Window a started job may run before it is reported as timed out.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

struct FetchJob {
    id: JobId,
    request: FetchRequest,
    handler: SharedHandler,
    token: Option<Token>,
    submitted_at: Instant,
    started_at: Option<Instant>,
    /// Begin failure recorded by `start_head`, delivered on the next tick.
    failed: Option<FetchError>,
}

impl FetchJob {
    fn context(&self) -> FetchContext<'_> {
        FetchContext {
            id: self.id,
            url: &self.request.url,
            token: self.token.as_deref(),
        }
    }
}

/// Ordered fetch queue driven by host-loop ticks.
///
/// Jobs start in submission order and exactly one native transfer is open
/// at a time. The head job is popped before its handler runs, so handlers
/// may submit or cancel follow-up jobs from inside a callback.
pub struct FetchScheduler {
    engine: Box<dyn TransferEngine>,
    queue: VecDeque<FetchJob>,
    next_id: JobId,
    timeout: Duration,
}

impl Default for FetchScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl FetchScheduler {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_engine(Box::new(CurlEngine::new()), timeout)
    }

    /// Build over a caller-supplied engine; embedders and tests use this to
    /// swap the transport out.
    pub fn with_engine(engine: Box<dyn TransferEngine>, timeout: Duration) -> Self {
        Self {
            engine,
            queue: VecDeque::new(),
            next_id: 0,
            timeout,
        }
    }

    /// Jobs still queued or in flight.
    pub fn pending_jobs(&self) -> usize {
        self.queue.len()
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn in_flight(&self) -> bool {
        self.queue.front().map_or(false, |job| job.started_at.is_some())
    }

    /// Append a job; if the queue was empty its transfer starts within this
    /// call, so the first tick after submission already observes progress.
    pub fn submit(
        &mut self,
        request: FetchRequest,
        handler: SharedHandler,
        token: Option<Token>,
    ) -> Result<JobId, FetchError> {
        if request.url.is_empty() {
            return Err(FetchError::InvalidArgument("empty URL"));
        }
        if Url::parse(&request.url).is_err() {
            return Err(FetchError::InvalidArgument("malformed URL"));
        }

        self.next_id += 1;
        let id = self.next_id;
        let now = Instant::now();
        self.queue.push_back(FetchJob {
            id,
            request,
            handler,
            token,
            submitted_at: now,
            started_at: None,
            failed: None,
        });
        tracing::debug!(id, queued = self.queue.len(), "fetch job submitted");
        if self.queue.len() == 1 {
            self.start_head(now);
        }
        Ok(id)
    }

    /// Cancel a job by id. The in-flight job has its transfer released and,
    /// when `notify` is set, its handler sees a single `Canceled` error;
    /// queued jobs leave silently. False if no job matches.
    pub fn cancel_by_id(&mut self, id: JobId, notify: bool) -> bool {
        match self.queue.iter().position(|job| job.id == id) {
            Some(pos) => self.cancel_at(pos, notify),
            None => false,
        }
    }

    /// Cancel at most one job matching the URL, head of the queue first.
    pub fn cancel_by_url(&mut self, url: &str, notify: bool) -> bool {
        match self.queue.iter().position(|job| job.request.url == url) {
            Some(pos) => self.cancel_at(pos, notify),
            None => false,
        }
    }

    /// Cancel the in-flight job (with notification) and discard the rest of
    /// the queue without notification.
    pub fn cancel_all(&mut self) {
        let in_flight = self.in_flight();
        if in_flight {
            self.engine.abort();
        }
        let head = if in_flight { self.queue.pop_front() } else { None };
        self.queue.clear();
        if let Some(job) = head {
            tracing::debug!(id = job.id, "in-flight fetch canceled");
            job.handler
                .borrow_mut()
                .on_error(self, job.context(), &FetchError::Canceled);
        }
    }

    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    /// Deterministic variant of `tick` for hosts with their own clock.
    ///
    /// Retires the head job if it failed to start, timed out, or finished,
    /// then starts the next queued job. The timeout check runs before the
    /// completion poll, so a job that exceeds its window on the same tick a
    /// response lands is reported exactly once, as a timeout.
    pub fn tick_at(&mut self, now: Instant) {
        self.retire_head(now);
        self.start_head(now);
    }

    fn retire_head(&mut self, now: Instant) {
        let Some(head) = self.queue.front() else {
            return;
        };

        if head.failed.is_some() {
            if let Some(mut job) = self.queue.pop_front() {
                if let Some(err) = job.failed.take() {
                    tracing::warn!(url = %job.request.url, "fetch could not start: {err}");
                    job.handler.borrow_mut().on_error(self, job.context(), &err);
                }
            }
            return;
        }

        let Some(started) = head.started_at else {
            return;
        };

        if now.duration_since(started) >= self.timeout {
            self.engine.abort();
            if let Some(job) = self.queue.pop_front() {
                tracing::warn!(url = %job.request.url, "fetch timed out");
                job.handler.borrow_mut().on_timeout(self, job.context());
            }
            return;
        }

        match self.engine.poll() {
            TransferPoll::InFlight => {}
            TransferPoll::Done(body) => {
                if let Some(job) = self.queue.pop_front() {
                    if body.is_empty() {
                        job.handler
                            .borrow_mut()
                            .on_error(self, job.context(), &FetchError::Empty);
                    } else {
                        tracing::debug!(id = job.id, bytes = body.len(), "fetch finished");
                        job.handler
                            .borrow_mut()
                            .on_done(self, job.context(), &body, true);
                    }
                }
            }
            TransferPoll::Failed { code, message } => {
                if let Some(job) = self.queue.pop_front() {
                    let err = FetchError::Transport { code, message };
                    tracing::warn!(url = %job.request.url, "fetch failed: {err}");
                    job.handler.borrow_mut().on_error(self, job.context(), &err);
                }
            }
        }
    }

    /// Start the head job if nothing is in flight. A begin failure is
    /// recorded on the job and delivered on the next tick, which keeps
    /// handler callbacks out of nested dispatch.
    fn start_head(&mut self, now: Instant) {
        let begin = match self.queue.front() {
            None => return,
            Some(job) if job.started_at.is_some() || job.failed.is_some() => return,
            Some(job) => self.engine.begin(&job.request),
        };
        if let Some(job) = self.queue.front_mut() {
            match begin {
                Ok(()) => {
                    tracing::debug!(
                        id = job.id,
                        url = %job.request.url,
                        waited = ?now.saturating_duration_since(job.submitted_at),
                        "transfer started"
                    );
                    job.started_at = Some(now);
                }
                Err(err) => job.failed = Some(err),
            }
        }
    }

    fn cancel_at(&mut self, pos: usize, notify: bool) -> bool {
        if pos == 0 {
            let in_flight = self.in_flight();
            if in_flight {
                self.engine.abort();
            }
            let Some(job) = self.queue.pop_front() else {
                return false;
            };
            if in_flight && notify {
                tracing::debug!(id = job.id, "in-flight fetch canceled");
                job.handler
                    .borrow_mut()
                    .on_error(self, job.context(), &FetchError::Canceled);
            }
            true
        } else {
            self.queue.remove(pos).is_some()
        }
    }
}
