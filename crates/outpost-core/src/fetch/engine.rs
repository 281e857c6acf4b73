//! Transfer engine seam: the non-blocking transport the scheduler drives.

use super::error::FetchError;
use super::job::FetchRequest;

/// Outcome of one non-blocking poll of the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferPoll {
    /// Transfer still running; poll again next tick.
    InFlight,
    /// Transfer finished; the buffered response body (possibly empty).
    Done(Vec<u8>),
    /// Transfer failed at the transport level.
    Failed { code: u32, message: String },
}

/// One outbound transfer at a time, driven cooperatively.
///
/// The scheduler guarantees `begin` is never called while a transfer is
/// active, and calls `abort` (or drops the engine) to release an active
/// transfer early. Implementations must never block in `poll`.
pub trait TransferEngine {
    /// Start a transfer for the given request.
    fn begin(&mut self, request: &FetchRequest) -> Result<(), FetchError>;

    /// Advance the active transfer without blocking and report its state.
    fn poll(&mut self) -> TransferPoll;

    /// Release the active transfer, if any, discarding buffered data.
    fn abort(&mut self);
}
