//! BLE Scanner Module
//!
//! Enumerates paired and known peripherals that expose a given GATT service.

use tracing::{debug, info};
use uuid::Uuid;
use windows::core::GUID;
use windows::Devices::Bluetooth::GenericAttributeProfile::GattDeviceService;
use windows::Devices::Enumeration::DeviceInformation;

use crate::domain::ports::PeripheralInfo;
use crate::error::BleError;

pub fn to_guid(uuid: Uuid) -> GUID {
    GUID::from_u128(uuid.as_u128())
}

pub fn from_guid(guid: GUID) -> Uuid {
    Uuid::from_u128(guid.to_u128())
}

/// Find every device exposing `service_uuid`
pub async fn find_by_service(service_uuid: Uuid) -> Result<Vec<PeripheralInfo>, BleError> {
    info!("Enumerating devices with service UUID: {}", service_uuid);

    let enumeration = |e: windows::core::Error| BleError::Enumeration(e.to_string());

    let selector =
        GattDeviceService::GetDeviceSelectorFromUuid(to_guid(service_uuid)).map_err(enumeration)?;
    let devices = DeviceInformation::FindAllAsyncAqsFilter(&selector)
        .map_err(enumeration)?
        .await
        .map_err(enumeration)?;

    let count = devices.Size().map_err(enumeration)?;
    let mut peripherals = Vec::with_capacity(count as usize);
    for i in 0..count {
        let info = devices.GetAt(i).map_err(enumeration)?;
        let name = info.Name().map_err(enumeration)?.to_string();
        let id = info.Id().map_err(enumeration)?.to_string();
        debug!("Found device {:?} ({})", name, id);
        peripherals.push(PeripheralInfo { name, id });
    }

    Ok(peripherals)
}
