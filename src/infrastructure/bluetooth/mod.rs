//! Bluetooth Module
//!
//! WinRT implementation of the BLE capability used by the device binder.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    WinRtBleAdapter                       │
//! │        (implements BleAdapter for the controller)        │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!         ┌─────────────┼─────────────┐
//!         │             │             │
//!         ▼             ▼             ▼
//! ┌───────────┐  ┌────────────┐  ┌──────────┐
//! │  Scanner  │  │ Connection │  │ Protocol │
//! │           │  │            │  │          │
//! │ - Device  │  │ - GATT     │  │ - UUIDs  │
//! │   lookup  │  │   services │  │ - Name   │
//! │           │  │ - Writes   │  │   filter │
//! └───────────┘  └────────────┘  └──────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - Service/characteristic identifiers and the name filter
//! - `scanner` - Peripheral enumeration by service selector
//! - `connection` - GATT session, service and characteristic wrappers
//! - `service` - The adapter itself

pub mod protocol;

#[cfg(windows)]
mod connection;
#[cfg(windows)]
mod scanner;
#[cfg(windows)]
pub mod service;

#[cfg(windows)]
pub use service::WinRtBleAdapter;
