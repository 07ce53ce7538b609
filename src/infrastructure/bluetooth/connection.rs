//! BLE Connection Module
//!
//! Wraps WinRT GATT objects behind the controller's session, service and
//! command channel traits.

use async_trait::async_trait;
use tracing::{debug, warn};
use uuid::Uuid;
use windows::Devices::Bluetooth::BluetoothLEDevice;
use windows::Devices::Bluetooth::GenericAttributeProfile::{
    GattCharacteristic, GattCommunicationStatus, GattDeviceService, GattOpenStatus,
    GattSharingMode,
};
use windows::Storage::Streams::DataWriter;

use super::scanner::{from_guid, to_guid};
use crate::domain::ports::{
    CharacteristicsResult, CommandChannel, GattServiceHandle, GattSession, GattStatus,
    ServicesResult, SharingMode,
};

fn map_status(status: GattCommunicationStatus) -> GattStatus {
    match status {
        GattCommunicationStatus::Success => GattStatus::Success,
        GattCommunicationStatus::Unreachable => GattStatus::Unreachable,
        GattCommunicationStatus::ProtocolError => GattStatus::ProtocolError,
        GattCommunicationStatus::AccessDenied => GattStatus::AccessDenied,
        other => GattStatus::Other(format!("{:?}", other)),
    }
}

fn map_error(e: windows::core::Error) -> GattStatus {
    GattStatus::Other(e.message().to_string())
}

/// Connected device. Kept alive for as long as any of its services is used.
pub struct WinRtSession {
    device: BluetoothLEDevice,
}

impl WinRtSession {
    pub fn new(device: BluetoothLEDevice) -> Self {
        Self { device }
    }

    async fn query_services(&self) -> windows::core::Result<ServicesResult> {
        let result = self.device.GetGattServicesAsync()?.await?;
        let status = map_status(result.Status()?);
        if status != GattStatus::Success {
            return Ok(ServicesResult {
                status,
                services: Vec::new(),
            });
        }

        let list = result.Services()?;
        let mut services: Vec<Box<dyn GattServiceHandle>> = Vec::new();
        for i in 0..list.Size()? {
            let service = list.GetAt(i)?;
            let uuid = from_guid(service.Uuid()?);
            services.push(Box::new(WinRtService { service, uuid }));
        }
        debug!("Device exposes {} services", services.len());
        Ok(ServicesResult { status, services })
    }
}

#[async_trait]
impl GattSession for WinRtSession {
    async fn list_services(&self) -> ServicesResult {
        match self.query_services().await {
            Ok(result) => result,
            Err(e) => ServicesResult {
                status: map_error(e),
                services: Vec::new(),
            },
        }
    }
}

pub struct WinRtService {
    service: GattDeviceService,
    uuid: Uuid,
}

impl WinRtService {
    async fn query_characteristics(
        &self,
        characteristic_id: Uuid,
    ) -> windows::core::Result<CharacteristicsResult> {
        let result = self
            .service
            .GetCharacteristicsForUuidAsync(to_guid(characteristic_id))?
            .await?;
        let status = map_status(result.Status()?);
        if status != GattStatus::Success {
            return Ok(CharacteristicsResult {
                status,
                characteristics: Vec::new(),
            });
        }

        let list = result.Characteristics()?;
        let mut characteristics: Vec<std::sync::Arc<dyn CommandChannel>> = Vec::new();
        for i in 0..list.Size()? {
            let characteristic = list.GetAt(i)?;
            let uuid = from_guid(characteristic.Uuid()?);
            characteristics.push(std::sync::Arc::new(WinRtCharacteristic {
                characteristic,
                uuid,
                _service: self.service.clone(),
            }));
        }
        Ok(CharacteristicsResult {
            status,
            characteristics,
        })
    }
}

#[async_trait]
impl GattServiceHandle for WinRtService {
    fn uuid(&self) -> Uuid {
        self.uuid
    }

    async fn list_characteristics(&self, characteristic_id: Uuid) -> CharacteristicsResult {
        match self.query_characteristics(characteristic_id).await {
            Ok(result) => result,
            Err(e) => CharacteristicsResult {
                status: map_error(e),
                characteristics: Vec::new(),
            },
        }
    }

    async fn open(&self, mode: SharingMode) -> GattStatus {
        let mode = match mode {
            SharingMode::Exclusive => GattSharingMode::Exclusive,
            SharingMode::SharedReadOnly => GattSharingMode::SharedReadOnly,
            SharingMode::SharedReadAndWrite => GattSharingMode::SharedReadAndWrite,
        };
        let status = match self.service.OpenAsync(mode) {
            Ok(op) => op.await,
            Err(e) => Err(e),
        };
        match status {
            Ok(GattOpenStatus::Success) | Ok(GattOpenStatus::AlreadyOpened) => GattStatus::Success,
            Ok(GattOpenStatus::AccessDenied) => GattStatus::AccessDenied,
            Ok(other) => GattStatus::Other(format!("{:?}", other)),
            Err(e) => {
                warn!("Opening service failed: {}", e);
                map_error(e)
            }
        }
    }
}

/// A base station's power characteristic
pub struct WinRtCharacteristic {
    characteristic: GattCharacteristic,
    uuid: Uuid,
    // Holds the opened service for the characteristic's lifetime
    _service: GattDeviceService,
}

impl WinRtCharacteristic {
    async fn write_byte(&self, value: u8) -> windows::core::Result<GattCommunicationStatus> {
        let writer = DataWriter::new()?;
        writer.WriteByte(value)?;
        let buffer = writer.DetachBuffer()?;
        self.characteristic.WriteValueAsync(&buffer)?.await
    }
}

#[async_trait]
impl CommandChannel for WinRtCharacteristic {
    fn uuid(&self) -> Uuid {
        self.uuid
    }

    async fn write(&self, value: u8) -> GattStatus {
        match self.write_byte(value).await {
            Ok(status) => map_status(status),
            Err(e) => map_error(e),
        }
    }
}
