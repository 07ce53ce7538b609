//! Platform capabilities consumed by the controller.
//!
//! The BLE side is async (every call may suspend on the transport); the host
//! runtime side is blocking and is only ever driven from the watcher thread.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{BleError, HostError};

/// Transport status reported by GATT operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GattStatus {
    Success,
    Unreachable,
    ProtocolError,
    /// Known transient condition on first connect
    AccessDenied,
    /// Platform specific status, rendered verbatim
    Other(String),
}

impl GattStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for GattStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "Success"),
            Self::Unreachable => write!(f, "Unreachable"),
            Self::ProtocolError => write!(f, "ProtocolError"),
            Self::AccessDenied => write!(f, "AccessDenied"),
            Self::Other(status) => write!(f, "{}", status),
        }
    }
}

/// How a GATT service is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharingMode {
    Exclusive,
    SharedReadOnly,
    SharedReadAndWrite,
}

/// A peripheral advertising the requested service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeripheralInfo {
    pub name: String,
    pub id: String,
}

pub struct ServicesResult {
    pub status: GattStatus,
    pub services: Vec<Box<dyn GattServiceHandle>>,
}

pub struct CharacteristicsResult {
    pub status: GattStatus,
    pub characteristics: Vec<Arc<dyn CommandChannel>>,
}

/// Entry point into the OS Bluetooth stack.
#[async_trait]
pub trait BleAdapter: Send + Sync {
    /// Enumerate peripherals exposing `service_id`
    async fn find_peripherals(&self, service_id: Uuid) -> Result<Vec<PeripheralInfo>, BleError>;

    /// Open a GATT session to a previously enumerated peripheral
    async fn open(&self, peripheral_id: &str) -> Result<Box<dyn GattSession>, BleError>;
}

#[async_trait]
pub trait GattSession: Send + Sync {
    async fn list_services(&self) -> ServicesResult;
}

#[async_trait]
pub trait GattServiceHandle: Send + Sync {
    fn uuid(&self) -> Uuid;

    async fn list_characteristics(&self, characteristic_id: Uuid) -> CharacteristicsResult;

    async fn open(&self, mode: SharingMode) -> GattStatus;
}

/// A writable characteristic. One of these backs every bound endpoint.
#[async_trait]
pub trait CommandChannel: Send + Sync {
    fn uuid(&self) -> Uuid;

    async fn write(&self, value: u8) -> GattStatus;
}

/// How the controller registers itself with the host runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachMode {
    /// Starts and stops together with the host; never launches it
    Background,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    Quit,
    Other(u32),
}

/// The VR compositor (or whatever else owns the process lifetime).
///
/// Calls block; implementations are moved onto the watcher thread once
/// attached.
pub trait HostRuntime: Send {
    fn attach(&mut self, mode: AttachMode) -> Result<(), HostError>;

    /// Next pending event, if any. Must not block for long.
    fn poll_next_event(&mut self) -> Option<HostEvent>;

    fn acknowledge_quit(&mut self);

    fn shutdown(&mut self);
}
