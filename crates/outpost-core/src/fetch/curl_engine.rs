//! Production transfer engine over the curl multi interface.
//!
//! One `Multi` handle, opened lazily on the first transfer and kept for the
//! engine's lifetime; at most one `Easy2` attached at a time. Dropping the
//! engine releases any active transfer.

use curl::easy::{Easy2, List};
use curl::multi::{Easy2Handle, Multi};

use super::engine::{TransferEngine, TransferPoll};
use super::error::FetchError;
use super::job::FetchRequest;

/// Accumulates the response body for the active transfer.
#[derive(Default)]
struct BodySink {
    body: Vec<u8>,
}

impl curl::easy::Handler for BodySink {
    fn write(&mut self, data: &[u8]) -> Result<usize, curl::easy::WriteError> {
        self.body.extend_from_slice(data);
        Ok(data.len())
    }
}

#[derive(Default)]
pub struct CurlEngine {
    multi: Option<Multi>,
    active: Option<Easy2Handle<BodySink>>,
}

impl CurlEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Drop for CurlEngine {
    fn drop(&mut self) {
        // Detach the in-flight transfer, if any, before the multi handle goes.
        self.abort();
    }
}

fn transport_error(code: u32, err: impl std::fmt::Display) -> FetchError {
    FetchError::Transport { code, message: err.to_string() }
}

impl TransferEngine for CurlEngine {
    fn begin(&mut self, request: &FetchRequest) -> Result<(), FetchError> {
        // The scheduler never begins while a transfer is active; if it ever
        // does, drop the stale handle rather than leak it.
        self.abort();

        let multi = self.multi.get_or_insert_with(Multi::new);

        let mut easy = Easy2::new(BodySink::default());
        easy.url(&request.url)
            .map_err(|e| transport_error(e.code() as u32, e))?;
        if let Some(body) = &request.post_body {
            easy.post(true)
                .and_then(|_| easy.post_fields_copy(body.as_bytes()))
                .map_err(|e| transport_error(e.code() as u32, e))?;
        }
        if !request.headers.is_empty() {
            let mut list = List::new();
            for line in &request.headers {
                list.append(line)
                    .map_err(|e| transport_error(e.code() as u32, e))?;
            }
            easy.http_headers(list)
                .map_err(|e| transport_error(e.code() as u32, e))?;
        }

        let handle = multi
            .add2(easy)
            .map_err(|e| transport_error(e.code() as u32, e))?;
        self.active = Some(handle);

        // Kick the transfer off so the first tick already has progress.
        let _ = multi.perform();
        Ok(())
    }

    fn poll(&mut self) -> TransferPoll {
        let Some(multi) = self.multi.as_ref() else {
            return TransferPoll::InFlight;
        };
        if self.active.is_none() {
            return TransferPoll::InFlight;
        }

        let running = match multi.perform() {
            Ok(n) => n,
            Err(e) => {
                let code = e.code() as u32;
                let message = e.to_string();
                if let Some(handle) = self.active.take() {
                    let _ = multi.remove2(handle);
                }
                return TransferPoll::Failed { code, message };
            }
        };
        if running > 0 {
            return TransferPoll::InFlight;
        }

        // Transfer count dropped to zero: collect the result message for the
        // active handle, then detach it to recover the buffered body.
        let mut result: Option<Result<(), curl::Error>> = None;
        if let Some(handle) = self.active.as_ref() {
            multi.messages(|msg| {
                if let Some(r) = msg.result_for2(handle) {
                    result = Some(r);
                }
            });
        }
        let Some(handle) = self.active.take() else {
            return TransferPoll::InFlight;
        };
        let mut easy = match multi.remove2(handle) {
            Ok(easy) => easy,
            Err(e) => {
                return TransferPoll::Failed { code: e.code() as u32, message: e.to_string() };
            }
        };
        match result {
            Some(Err(e)) => TransferPoll::Failed { code: e.code() as u32, message: e.to_string() },
            _ => TransferPoll::Done(std::mem::take(&mut easy.get_mut().body)),
        }
    }

    fn abort(&mut self) {
        if let (Some(multi), Some(handle)) = (self.multi.as_ref(), self.active.take()) {
            // Dropping the detached Easy2 releases the native handle.
            let _ = multi.remove2(handle);
        }
    }
}
