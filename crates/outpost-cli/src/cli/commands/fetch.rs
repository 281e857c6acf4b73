//! `outpost fetch` – fetch one URL through the scheduler.

use anyhow::{bail, Context, Result};
use outpost_core::config::OutpostConfig;
use outpost_core::fetch::{CallbackHandler, FetchRequest, FetchScheduler};
use std::cell::RefCell;
use std::io::Write;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

/// Tick cadence while waiting for the transfer; mirrors a host frame.
const TICK_INTERVAL: Duration = Duration::from_millis(50);

pub fn run_fetch(cfg: &OutpostConfig, url: &str, post: Option<&str>, output: Option<&Path>) -> Result<()> {
    let mut jobs = FetchScheduler::with_timeout(cfg.fetch.timeout());

    let body: Rc<RefCell<Option<Vec<u8>>>> = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&body);
    let handler = CallbackHandler::new(move |_url: &str, data: &[u8]| {
        *sink.borrow_mut() = Some(data.to_vec());
    });

    let request = match post {
        Some(data) => FetchRequest::post(url, data),
        None => FetchRequest::get(url),
    };
    jobs.submit(request, handler, None)?;

    while !jobs.is_idle() {
        jobs.tick();
        std::thread::sleep(TICK_INTERVAL);
    }

    let Some(data) = body.borrow_mut().take() else {
        // Failure details already went to the log via the handler.
        bail!("fetch failed: {url}");
    };

    match output {
        Some(path) => {
            std::fs::write(path, &data)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("saved {} bytes to {}", data.len(), path.display());
        }
        None => {
            std::io::stdout().write_all(&data)?;
        }
    }
    Ok(())
}
