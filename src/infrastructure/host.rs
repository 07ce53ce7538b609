//! Host runtime adapters.
//!
//! [`DetachedHost`] never attaches, which leaves the controller in manual
//! mode; the one-shot `on`/`off` commands run with it. [`ConsoleHost`] treats
//! Ctrl-C (and termination signals) as the host asking the application to
//! quit, so a console session powers its stations down before the process
//! goes away. A second signal exits immediately.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::ports::{AttachMode, HostEvent, HostRuntime};
use crate::error::HostError;

/// Exit status used when a second signal interrupts the power-down
const FORCED_EXIT_CODE: i32 = 130;

/// No host runtime at all
#[derive(Debug, Default)]
pub struct DetachedHost;

impl HostRuntime for DetachedHost {
    fn attach(&mut self, _mode: AttachMode) -> Result<(), HostError> {
        Err(HostError::NoServer)
    }

    fn poll_next_event(&mut self) -> Option<HostEvent> {
        None
    }

    fn acknowledge_quit(&mut self) {}

    fn shutdown(&mut self) {}
}

/// Console session driven by process signals
#[derive(Debug, Default)]
pub struct ConsoleHost {
    signals: Arc<AtomicU32>,
    quit_reported: bool,
}

impl ConsoleHost {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Count one received signal. Returns `true` when it is not the first one.
fn record_signal(signals: &AtomicU32) -> bool {
    signals.fetch_add(1, Ordering::SeqCst) > 0
}

impl HostRuntime for ConsoleHost {
    fn attach(&mut self, mode: AttachMode) -> Result<(), HostError> {
        let signals = Arc::clone(&self.signals);
        ctrlc::set_handler(move || {
            if record_signal(&signals) {
                warn!("Second interrupt, exiting without waiting for power-down");
                std::process::exit(FORCED_EXIT_CODE);
            }
        })
        .map_err(|e| HostError::Init(e.to_string()))?;
        info!("Console host attached ({:?})", mode);
        Ok(())
    }

    fn poll_next_event(&mut self) -> Option<HostEvent> {
        if self.quit_reported || self.signals.load(Ordering::SeqCst) == 0 {
            return None;
        }
        self.quit_reported = true;
        Some(HostEvent::Quit)
    }

    fn acknowledge_quit(&mut self) {
        debug!("Quit acknowledged");
    }

    fn shutdown(&mut self) {
        info!("Console host released");
    }
}
