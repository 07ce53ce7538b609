//! Lighthouse Power Control
//!
//! Powers SteamVR base stations on and off over Bluetooth LE, following the
//! lifecycle of the host VR runtime.

pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod presentation;

#[cfg(test)]
mod test_support;
