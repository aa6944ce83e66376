//! Background dirty-page writer

use super::Environment;
use crate::error::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy)]
pub struct TrickleConfig {
    /// Share of dirty pages written per pass, in percent
    pub rate: u32,
    /// Wait after a pass that wrote something
    pub busy_wait: Duration,
    /// Wait after a pass that found nothing to write
    pub idle_wait: Duration,
    /// fsync after a pass that wrote pages
    pub sync: bool,
}

impl Default for TrickleConfig {
    fn default() -> Self {
        Self {
            rate: 10,
            busy_wait: Duration::from_millis(1000),
            idle_wait: Duration::from_millis(5000),
            sync: false,
        }
    }
}

impl TrickleConfig {
    /// Wait before the next pass, given how many pages the last one wrote
    pub fn wait_after(&self, pages: usize) -> Duration {
        if pages > 0 {
            self.busy_wait
        } else {
            self.idle_wait
        }
    }
}

struct Shared {
    stop: Mutex<bool>,
    wake: Condvar,
    failure: Mutex<Option<Error>>,
    last_wait: Mutex<Option<Duration>>,
}

/// Thread that keeps writing a share of dirty pages until stopped
pub struct TrickleThread {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl TrickleThread {
    pub fn start(env: Arc<Environment>, config: TrickleConfig) -> Result<Self> {
        let shared = Arc::new(Shared {
            stop: Mutex::new(false),
            wake: Condvar::new(),
            failure: Mutex::new(None),
            last_wait: Mutex::new(None),
        });

        let worker = Arc::clone(&shared);
        let handle = std::thread::Builder::new()
            .name("statstore-trickle".into())
            .spawn(move || run(&env, &worker, config))?;

        info!(rate = config.rate, "Trickle thread started");
        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Wait chosen after the most recent pass
    pub fn last_wait(&self) -> Option<Duration> {
        *self.shared.last_wait.lock()
    }

    /// Signal the thread and wait for it. Reports the error that ended it early.
    pub fn stop(&mut self) -> Result<()> {
        let handle = match self.handle.take() {
            Some(handle) => handle,
            None => return Ok(()),
        };

        *self.shared.stop.lock() = true;
        self.shared.wake.notify_all();

        if handle.join().is_err() {
            return Err(Error::logic("trickle thread panicked"));
        }
        debug!("Trickle thread stopped");

        match self.shared.failure.lock().take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for TrickleThread {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!("Trickle thread: {}", e);
        }
    }
}

fn run(env: &Environment, shared: &Shared, config: TrickleConfig) {
    loop {
        let pass = env.trickle(config.rate).and_then(|pages| {
            if pages > 0 && config.sync {
                env.fsync()?;
            }
            Ok(pages)
        });
        let wait = match pass {
            Ok(pages) => {
                if pages > 0 {
                    debug!(pages, "Trickle pass");
                    metrics::counter!("statstore_trickle_pages_total").increment(pages as u64);
                }
                config.wait_after(pages)
            }
            Err(e) => {
                error!("Trickle pass failed: {}", e);
                *shared.failure.lock() = Some(e);
                return;
            }
        };

        *shared.last_wait.lock() = Some(wait);

        let mut stop = shared.stop.lock();
        if *stop {
            return;
        }
        shared.wake.wait_for(&mut stop, wait);
        if *stop {
            return;
        }
    }
}
