//! Host runtime lifecycle.
//!
//! Ties the host's quit event to a guaranteed deactivate pass. Once attached,
//! a dedicated watcher thread polls the host event feed. On quit it powers
//! every endpoint down, shuts the host connection down and then fires the
//! [`ExitNotice`]. A panic inside any host call is treated as a quit. If the
//! shutdown signal is raised first (a manual deactivate), the watcher skips
//! straight to host shutdown.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tracing::{debug, error, info, trace, warn};

use crate::domain::dispatcher::CommandDispatcher;
use crate::domain::models::{Endpoint, LifecycleState, OperationOutcome, PowerCommand};
use crate::domain::ports::{AttachMode, HostEvent, HostRuntime};
use crate::domain::shutdown::ShutdownSignal;
use crate::error::HostError;

/// Default host event poll interval
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// What the watcher did on its way out
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Whether a host quit event triggered the shutdown
    pub quit_observed: bool,
    /// Outcomes of the shutdown deactivate pass, empty if none was issued
    pub outcomes: Vec<OperationOutcome>,
}

/// "May now exit" notification. Resolves exactly once.
pub struct ExitNotice {
    rx: oneshot::Receiver<ShutdownReport>,
}

impl ExitNotice {
    pub async fn wait(self) -> ShutdownReport {
        match self.rx.await {
            Ok(report) => report,
            Err(_) => {
                // Watcher went away without reporting; exiting is still allowed
                warn!("Host watcher ended without a shutdown report");
                ShutdownReport::default()
            }
        }
    }
}

pub struct LifecycleCoordinator {
    state: Arc<watch::Sender<LifecycleState>>,
    shutdown: ShutdownSignal,
    poll_interval: Duration,
    watcher: Option<JoinHandle<()>>,
    exit_notice: Option<ExitNotice>,
}

impl LifecycleCoordinator {
    pub fn new(shutdown: ShutdownSignal, poll_interval: Duration) -> Self {
        let (state, _) = watch::channel(LifecycleState::Idle);
        Self {
            state: Arc::new(state),
            shutdown,
            poll_interval,
            watcher: None,
            exit_notice: None,
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Take the "may now exit" notice. `None` if no watcher was started or the
    /// notice was already taken.
    pub fn take_exit_notice(&mut self) -> Option<ExitNotice> {
        self.exit_notice.take()
    }

    /// Attach to the host runtime and start the watcher.
    ///
    /// Never fails: an unreachable host, an init error or a panic inside the
    /// host leaves the coordinator in `HostUnavailable`, where manual commands
    /// keep working without automatic shutdown.
    pub fn attach(
        &mut self,
        mut host: Box<dyn HostRuntime>,
        dispatcher: Arc<CommandDispatcher>,
        endpoints: Arc<[Endpoint]>,
    ) -> OperationOutcome {
        if self.state() != LifecycleState::Idle {
            warn!("Host attach requested in state {:?}", self.state());
            return OperationOutcome::failure("Host runtime already attached;");
        }

        match guarded(|| host.attach(AttachMode::Background)) {
            Ok(Ok(())) => {}
            Ok(Err(HostError::NoServer)) => {
                info!("Host runtime not running, manual control only");
                advance(&self.state, LifecycleState::HostUnavailable);
                return OperationOutcome::success("Init without host runtime;");
            }
            Ok(Err(e)) => {
                error!("Host runtime attach failed: {}", e);
                advance(&self.state, LifecycleState::HostUnavailable);
                return OperationOutcome::failure(format!("{};", e));
            }
            Err(reason) => {
                error!("Host runtime attach panicked: {}", reason);
                advance(&self.state, LifecycleState::HostUnavailable);
                return OperationOutcome::failure(format!("{};", reason));
            }
        }

        let rt = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                error!("Failed to create runtime for host watcher: {}", e);
                host.shutdown();
                advance(&self.state, LifecycleState::HostUnavailable);
                return OperationOutcome::failure(format!("Host watcher: {};", e));
            }
        };

        advance(&self.state, LifecycleState::HostAttached);
        info!("Init with host runtime");

        let (exit_tx, exit_rx) = oneshot::channel();
        let watcher = Watcher {
            host,
            dispatcher,
            endpoints,
            shutdown: self.shutdown.clone(),
            state: Arc::clone(&self.state),
            poll_interval: self.poll_interval,
        };

        let spawned = std::thread::Builder::new()
            .name("host-watcher".to_string())
            .spawn(move || {
                let report = rt.block_on(watcher.run());
                let _ = exit_tx.send(report);
            });

        self.exit_notice = Some(ExitNotice { rx: exit_rx });
        match spawned {
            Ok(handle) => {
                self.watcher = Some(handle);
                OperationOutcome::success("Init with host runtime;")
            }
            Err(e) => {
                // The notice resolves immediately since its sender is gone
                error!("Failed to spawn host watcher: {}", e);
                advance(&self.state, LifecycleState::Terminating);
                OperationOutcome::failure(format!("Host watcher: {};", e))
            }
        }
    }

    /// Block until the watcher thread has finished.
    pub fn join_watcher(&mut self) {
        if let Some(handle) = self.watcher.take() {
            if handle.join().is_err() {
                error!("Host watcher thread panicked");
            }
        }
    }
}

/// Move to `next` if that keeps the state machine monotone.
fn advance(state: &watch::Sender<LifecycleState>, next: LifecycleState) {
    state.send_if_modified(|current| {
        if current.can_advance_to(next) {
            debug!("Lifecycle {:?} -> {:?}", current, next);
            *current = next;
            true
        } else {
            warn!("Ignoring lifecycle transition {:?} -> {:?}", current, next);
            false
        }
    });
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "host runtime panicked".to_string()
    }
}

struct Watcher {
    host: Box<dyn HostRuntime>,
    dispatcher: Arc<CommandDispatcher>,
    endpoints: Arc<[Endpoint]>,
    shutdown: ShutdownSignal,
    state: Arc<watch::Sender<LifecycleState>>,
    poll_interval: Duration,
}

/// Why the watcher stopped waiting
enum WatchExit {
    Quit,
    Cancelled,
    /// A host call panicked; handled like a quit
    HostFailed(String),
}

impl Watcher {
    async fn run(mut self) -> ShutdownReport {
        advance(&self.state, LifecycleState::Watching);
        info!("Host watcher started");

        let exit = self.wait_for_quit().await;
        let quit_observed = matches!(exit, WatchExit::Quit);
        let mut outcomes = Vec::new();

        if let WatchExit::Cancelled = exit {
            info!("Host watcher cancelled");
        } else {
            advance(&self.state, LifecycleState::QuitObserved);
            let mut host_ok = match exit {
                WatchExit::HostFailed(reason) => {
                    error!("Host runtime failed while watching: {}", reason);
                    outcomes.push(OperationOutcome::failure(format!("{};", reason)));
                    false
                }
                _ => {
                    info!("Host quit observed");
                    self.acknowledge_quit()
                }
            };

            advance(&self.state, LifecycleState::Deactivating);
            if self.shutdown.is_raised() {
                // A manual deactivate pass already completed
                debug!("Lighthouses already deactivated");
            } else {
                outcomes.extend(
                    self.dispatcher
                        .dispatch(&self.endpoints, PowerCommand::Deactivate)
                        .await,
                );
            }

            while host_ok && !self.shutdown.is_raised() {
                host_ok = self.acknowledge_quit();
                tokio::time::sleep(self.poll_interval).await;
            }
        }

        advance(&self.state, LifecycleState::Terminating);
        if let Err(reason) = guarded(|| self.host.shutdown()) {
            error!("Host runtime shutdown panicked: {}", reason);
        }
        info!("Host runtime shut down, application may exit");

        ShutdownReport {
            quit_observed,
            outcomes,
        }
    }

    /// Poll the host until it asks us to quit, fails, or the shutdown signal
    /// is raised.
    async fn wait_for_quit(&mut self) -> WatchExit {
        let shutdown = self.shutdown.clone();
        loop {
            tokio::select! {
                biased;
                _ = shutdown.raised() => return WatchExit::Cancelled,
                _ = tokio::time::sleep(self.poll_interval) => {
                    loop {
                        match guarded(|| self.host.poll_next_event()) {
                            Ok(None) => break,
                            Ok(Some(HostEvent::Quit)) => return WatchExit::Quit,
                            Ok(Some(HostEvent::Other(kind))) => {
                                trace!("Ignoring host event {}", kind)
                            }
                            Err(reason) => return WatchExit::HostFailed(reason),
                        }
                    }
                }
            }
        }
    }

    /// Returns `false` if the host panicked
    fn acknowledge_quit(&mut self) -> bool {
        match guarded(|| self.host.acknowledge_quit()) {
            Ok(()) => true,
            Err(reason) => {
                error!("Host runtime panicked acknowledging quit: {}", reason);
                false
            }
        }
    }
}

/// Run a host call, turning a panic into its message
fn guarded<T>(call: impl FnOnce() -> T) -> Result<T, String> {
    catch_unwind(AssertUnwindSafe(call)).map_err(|panic| panic_message(panic.as_ref()))
}
