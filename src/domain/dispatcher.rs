use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::domain::models::{Endpoint, OperationOutcome, PowerCommand};
use crate::domain::shutdown::ShutdownSignal;

/// Writes power commands to bound endpoints.
///
/// Passes are serialized, so a shutdown deactivate issued from the watcher
/// always lands after any manual command already in flight.
pub struct CommandDispatcher {
    shutdown: ShutdownSignal,
    pass_lock: Mutex<()>,
}

impl CommandDispatcher {
    pub fn new(shutdown: ShutdownSignal) -> Self {
        Self {
            shutdown,
            pass_lock: Mutex::new(()),
        }
    }

    /// Send `command` to every endpoint, one outcome per endpoint in input order.
    ///
    /// A failed write never stops the pass. A `Deactivate` pass raises the
    /// shutdown signal as its last step whatever the individual results were.
    /// An `Activate` requested after shutdown has begun is rejected without
    /// touching the devices.
    pub async fn dispatch(
        &self,
        endpoints: &[Endpoint],
        command: PowerCommand,
    ) -> Vec<OperationOutcome> {
        let _pass = self.pass_lock.lock().await;

        if command == PowerCommand::Activate && self.shutdown.is_raised() {
            warn!(
                "Rejecting {} for {} lighthouses: shutting down",
                command,
                endpoints.len()
            );
            return endpoints
                .iter()
                .map(|e| {
                    OperationOutcome::failure(format!(
                        "lighthouse {}: shutting down;",
                        e.display_index
                    ))
                })
                .collect();
        }

        info!("Sending {} to {} lighthouses", command, endpoints.len());
        let mut outcomes = Vec::with_capacity(endpoints.len());
        for endpoint in endpoints {
            let status = endpoint.channel.write(command.as_byte()).await;
            if status.is_success() {
                info!("lighthouse {}: {} ok", endpoint.display_index, command);
                outcomes.push(OperationOutcome::success(String::new()));
            } else {
                error!(
                    "lighthouse {}: {} failed: {}",
                    endpoint.display_index, command, status
                );
                outcomes.push(OperationOutcome::failure(format!(
                    "lighthouse {}: {};",
                    endpoint.display_index, status
                )));
            }
        }

        if command == PowerCommand::Deactivate && self.shutdown.raise() {
            info!("Shutdown signal raised by deactivate pass");
        }

        outcomes
    }
}
