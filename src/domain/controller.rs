use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OnceCell;
use tracing::info;

use crate::domain::binder::{BindConfig, DeviceBinder};
use crate::domain::dispatcher::CommandDispatcher;
use crate::domain::lifecycle::{ExitNotice, LifecycleCoordinator};
use crate::domain::models::{Endpoint, LifecycleState, OperationOutcome, PowerCommand};
use crate::domain::ports::{BleAdapter, HostRuntime};
use crate::domain::shutdown::ShutdownSignal;

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub bind: BindConfig,
    pub poll_interval: Duration,
    /// Power stations on as soon as the host runtime is attached
    pub activate_on_attach: bool,
}

/// Front door for the application: binds once, attaches the host runtime and
/// routes manual commands.
pub struct PowerController {
    adapter: Arc<dyn BleAdapter>,
    config: ControllerConfig,
    shutdown: ShutdownSignal,
    dispatcher: Arc<CommandDispatcher>,
    lifecycle: LifecycleCoordinator,
    endpoints: OnceCell<Arc<[Endpoint]>>,
}

impl PowerController {
    pub fn new(adapter: Arc<dyn BleAdapter>, config: ControllerConfig) -> Self {
        let shutdown = ShutdownSignal::new();
        Self {
            adapter,
            dispatcher: Arc::new(CommandDispatcher::new(shutdown.clone())),
            lifecycle: LifecycleCoordinator::new(shutdown.clone(), config.poll_interval),
            shutdown,
            config,
            endpoints: OnceCell::new(),
        }
    }

    /// Bind, attach the host runtime and, if attached, power the stations on.
    ///
    /// Returns the binding warnings, the attach outcome, the activation
    /// outcomes and finally a `Lighthouses found` summary that fails when no
    /// station was bound.
    pub async fn start(&mut self, host: Box<dyn HostRuntime>) -> Vec<OperationOutcome> {
        let (endpoints, mut outcomes) = self.bound_endpoints().await;

        let attach = self
            .lifecycle
            .attach(host, Arc::clone(&self.dispatcher), Arc::clone(&endpoints));
        let attached =
            attach.succeeded && self.lifecycle.state() != LifecycleState::HostUnavailable;
        outcomes.push(attach);

        if attached && self.config.activate_on_attach {
            outcomes.extend(
                self.dispatcher
                    .dispatch(&endpoints, PowerCommand::Activate)
                    .await,
            );
        }

        let found = format!("Lighthouses found: {};", endpoints.len());
        outcomes.push(if endpoints.is_empty() {
            OperationOutcome::failure(found)
        } else {
            OperationOutcome::success(found)
        });
        outcomes
    }

    /// Manual command. Binds first if nothing has been bound yet.
    pub async fn send(&self, command: PowerCommand) -> Vec<OperationOutcome> {
        let (endpoints, _) = self.bound_endpoints().await;
        self.dispatcher.dispatch(&endpoints, command).await
    }

    /// Application exit hook: lets the watcher wind down without dispatching.
    pub fn cancel(&self) {
        if self.shutdown.raise() {
            info!("Controller cancelled");
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_raised()
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn take_exit_notice(&mut self) -> Option<ExitNotice> {
        self.lifecycle.take_exit_notice()
    }

    pub fn join_watcher(&mut self) {
        self.lifecycle.join_watcher();
    }

    pub fn endpoint_count(&self) -> usize {
        self.endpoints.get().map_or(0, |e| e.len())
    }

    /// The bound endpoint set plus the warnings of the binding pass, if this
    /// call is the one that ran it. Concurrent callers wait for the same pass.
    async fn bound_endpoints(&self) -> (Arc<[Endpoint]>, Vec<OperationOutcome>) {
        let mut warnings = Vec::new();
        let warnings_slot = &mut warnings;
        let endpoints = self
            .endpoints
            .get_or_init(|| async move {
                let report = DeviceBinder::new(self.adapter.as_ref(), &self.config.bind)
                    .bind()
                    .await;
                *warnings_slot = report.warnings;
                Arc::from(report.endpoints)
            })
            .await;
        (Arc::clone(endpoints), warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{lighthouse_config, FakeAdapter, FakeDevice, FakeHost};

    const WAIT: Duration = Duration::from_secs(5);

    fn controller(devices: Vec<FakeDevice>) -> (PowerController, FakeAdapter) {
        let adapter = FakeAdapter::new(devices);
        let config = ControllerConfig {
            bind: lighthouse_config(),
            poll_interval: Duration::from_millis(5),
            activate_on_attach: true,
        };
        (
            PowerController::new(Arc::new(adapter.clone()), config),
            adapter,
        )
    }

    #[tokio::test]
    async fn test_start_without_host() {
        let (mut controller, adapter) = controller(vec![FakeDevice::lighthouse("LHB-AAAAAAAA")]);

        let outcomes = controller.start(Box::new(FakeHost::no_server())).await;

        assert_eq!(
            outcomes,
            vec![
                OperationOutcome::success("Init without host runtime;"),
                OperationOutcome::success("Lighthouses found: 1;"),
            ]
        );
        assert_eq!(controller.state(), LifecycleState::HostUnavailable);
        assert!(adapter.writes().is_empty());

        let outcomes = controller.send(PowerCommand::Activate).await;
        assert_eq!(outcomes, vec![OperationOutcome::success("")]);
        assert_eq!(adapter.writes(), vec![0x01]);
    }

    #[tokio::test]
    async fn test_start_with_host_activates_and_quit_deactivates() {
        let (mut controller, adapter) = controller(vec![
            FakeDevice::lighthouse("LHB-AAAAAAAA"),
            FakeDevice::lighthouse("LHB-BBBBBBBB"),
        ]);

        let outcomes = controller.start(Box::new(FakeHost::quitting_after(5))).await;

        assert_eq!(outcomes.len(), 4);
        assert_eq!(outcomes[0], OperationOutcome::success("Init with host runtime;"));
        assert_eq!(outcomes[3], OperationOutcome::success("Lighthouses found: 2;"));

        let notice = controller.take_exit_notice().unwrap();
        let report = tokio::time::timeout(WAIT, notice.wait()).await.unwrap();
        assert!(report.quit_observed);
        assert_eq!(adapter.writes(), vec![0x01, 0x01, 0x00, 0x00]);
        assert!(controller.is_shutting_down());

        let rejected = controller.send(PowerCommand::Activate).await;
        assert!(rejected.iter().all(|o| !o.succeeded));
        assert_eq!(adapter.writes().len(), 4);
    }

    #[tokio::test]
    async fn test_no_base_stations_found() {
        let (mut controller, _) = controller(vec![]);

        let outcomes = controller.start(Box::new(FakeHost::no_server())).await;

        assert_eq!(
            outcomes.last(),
            Some(&OperationOutcome::failure("Lighthouses found: 0;"))
        );
        assert!(controller.send(PowerCommand::Deactivate).await.is_empty());
    }

    #[tokio::test]
    async fn test_binding_happens_once() {
        let (mut controller, adapter) = controller(vec![FakeDevice::lighthouse("LHB-AAAAAAAA")]);

        controller.send(PowerCommand::Activate).await;
        controller.send(PowerCommand::Activate).await;
        controller.start(Box::new(FakeHost::no_server())).await;

        assert_eq!(adapter.enumerations(), 1);
        assert_eq!(controller.endpoint_count(), 1);
    }

    #[tokio::test]
    async fn test_bind_warnings_are_reported_by_start() {
        let (mut controller, _) = controller(vec![
            FakeDevice::lighthouse("LHB-AAAAAAAA").services_status(
                crate::domain::ports::GattStatus::Unreachable,
            ),
        ]);

        let outcomes = controller.start(Box::new(FakeHost::no_server())).await;

        assert_eq!(outcomes[0], OperationOutcome::failure("Services Unreachable;"));
    }

    #[tokio::test]
    async fn test_cancel_releases_watcher_without_deactivating() {
        let (mut controller, adapter) = controller(vec![FakeDevice::lighthouse("LHB-AAAAAAAA")]);
        controller.start(Box::new(FakeHost::idle())).await;
        let notice = controller.take_exit_notice().unwrap();

        controller.cancel();
        controller.cancel();
        let report = tokio::time::timeout(WAIT, notice.wait()).await.unwrap();
        controller.join_watcher();

        assert!(!report.quit_observed);
        assert_eq!(adapter.writes(), vec![0x01]);
        assert_eq!(controller.state(), LifecycleState::Terminating);
    }
}
