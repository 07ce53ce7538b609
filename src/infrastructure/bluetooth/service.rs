//! Bluetooth Service Module
//!
//! WinRT backed [`BleAdapter`].

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;
use windows::core::HSTRING;
use windows::Devices::Bluetooth::BluetoothLEDevice;

use super::connection::WinRtSession;
use super::scanner;
use crate::domain::ports::{BleAdapter, GattSession, PeripheralInfo};
use crate::error::BleError;

#[derive(Debug, Default)]
pub struct WinRtBleAdapter;

impl WinRtBleAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BleAdapter for WinRtBleAdapter {
    async fn find_peripherals(&self, service_id: Uuid) -> Result<Vec<PeripheralInfo>, BleError> {
        scanner::find_by_service(service_id).await
    }

    async fn open(&self, peripheral_id: &str) -> Result<Box<dyn GattSession>, BleError> {
        let open_error = |e: windows::core::Error| BleError::Open {
            id: peripheral_id.to_string(),
            reason: e.message().to_string(),
        };

        let device = BluetoothLEDevice::FromIdAsync(&HSTRING::from(peripheral_id))
            .map_err(open_error)?
            .await
            .map_err(open_error)?;
        info!("Device connected: {:?}", device.Name().map(|n| n.to_string()));

        Ok(Box::new(WinRtSession::new(device)))
    }
}
