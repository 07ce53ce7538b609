//! Device binding.
//!
//! Resolves the control characteristic of every base station in range into an
//! [`Endpoint`]. Nothing here returns an error: per-device problems become
//! warnings and the pass moves on to the next device.

use regex::Regex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::models::{Endpoint, OperationOutcome};
use crate::domain::ports::{
    BleAdapter, CharacteristicsResult, GattServiceHandle, GattStatus, SharingMode,
};

/// What to bind to
#[derive(Debug, Clone)]
pub struct BindConfig {
    /// Advertised name filter
    pub name_pattern: Regex,
    pub service_id: Uuid,
    pub characteristic_id: Uuid,
    /// Stop retrying `AccessDenied` after this many extra attempts.
    /// `None` retries for as long as the transport keeps denying.
    pub access_denied_retry_limit: Option<u32>,
}

/// Result of a binding pass
#[derive(Debug, Default)]
pub struct BindReport {
    pub endpoints: Vec<Endpoint>,
    pub warnings: Vec<OperationOutcome>,
}

impl BindReport {
    /// "No base stations found" is not an error, but callers must be able to tell.
    pub fn no_base_stations(&self) -> bool {
        self.endpoints.is_empty()
    }
}

pub struct DeviceBinder<'a> {
    adapter: &'a dyn BleAdapter,
    config: &'a BindConfig,
}

impl<'a> DeviceBinder<'a> {
    pub fn new(adapter: &'a dyn BleAdapter, config: &'a BindConfig) -> Self {
        Self { adapter, config }
    }

    /// Run one full binding pass
    pub async fn bind(&self) -> BindReport {
        let mut report = BindReport::default();

        let peripherals = match self.adapter.find_peripherals(self.config.service_id).await {
            Ok(peripherals) => peripherals,
            Err(e) => {
                warn!("Peripheral enumeration failed: {}", e);
                report
                    .warnings
                    .push(OperationOutcome::failure(format!("Devices {};", e)));
                return report;
            }
        };
        info!(
            "Found {} peripherals exposing {}",
            peripherals.len(),
            self.config.service_id
        );

        for peripheral in peripherals {
            if !self.config.name_pattern.is_match(&peripheral.name) {
                debug!("Skipping {:?}: name does not match", peripheral.name);
                continue;
            }

            let session = match self.adapter.open(&peripheral.id).await {
                Ok(session) => session,
                Err(e) => {
                    warn!("{}", e);
                    report
                        .warnings
                        .push(OperationOutcome::failure(format!("{};", e)));
                    continue;
                }
            };

            let services = session.list_services().await;
            if !services.status.is_success() {
                warn!(
                    "Service query for {} failed: {}",
                    peripheral.name, services.status
                );
                report.warnings.push(OperationOutcome::failure(format!(
                    "Services {};",
                    services.status
                )));
                continue;
            }

            for service in services
                .services
                .iter()
                .filter(|s| s.uuid() == self.config.service_id)
            {
                self.bind_service(service.as_ref(), &peripheral.name, &mut report)
                    .await;
            }
        }

        info!("Lighthouses found: {}", report.endpoints.len());
        report
    }

    async fn bind_service(
        &self,
        service: &dyn GattServiceHandle,
        device_name: &str,
        report: &mut BindReport,
    ) {
        let result = self.resolve_characteristics(service).await;
        if !result.status.is_success() {
            warn!(
                "Characteristic query for {} failed: {}",
                device_name, result.status
            );
            report.warnings.push(OperationOutcome::failure(format!(
                "Characteristics {};",
                result.status
            )));
            return;
        }

        let open_status = service.open(SharingMode::SharedReadAndWrite).await;
        if !open_status.is_success() {
            // Writes may still go through; the platform reports this loosely
            debug!("Opening service on {} returned {}", device_name, open_status);
        }

        for characteristic in result
            .characteristics
            .into_iter()
            .filter(|c| c.uuid() == self.config.characteristic_id)
        {
            let display_index = report.endpoints.len() + 1;
            info!("Bound lighthouse {} ({})", display_index, device_name);
            report.endpoints.push(Endpoint {
                display_index,
                channel: characteristic,
            });
        }
    }

    /// Query characteristics, retrying only while access is denied.
    async fn resolve_characteristics(
        &self,
        service: &dyn GattServiceHandle,
    ) -> CharacteristicsResult {
        let mut retries: u32 = 0;
        loop {
            let result = service
                .list_characteristics(self.config.characteristic_id)
                .await;
            if result.status != GattStatus::AccessDenied {
                return result;
            }
            if !may_retry(self.config.access_denied_retry_limit, retries) {
                warn!("Access still denied after {} retries, giving up", retries);
                return result;
            }
            retries = retries.saturating_add(1);
            debug!("Characteristic access denied, retry {}", retries);
        }
    }
}

/// Whether another query may follow `retries` denied ones
fn may_retry(limit: Option<u32>, retries: u32) -> bool {
    limit.map_or(true, |limit| retries < limit)
}
