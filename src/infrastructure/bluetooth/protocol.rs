//! Lighthouse V2 Power Protocol
//!
//! Base stations expose a vendor service with a one-byte power characteristic.
//! Writing [`PowerCommand::as_byte`](crate::domain::models::PowerCommand::as_byte)
//! to it switches the station on or off.

use uuid::Uuid;

/// Lighthouse V2 control service UUID
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x00001523_1212_efde_1523_785feabcd124);

/// Power state characteristic UUID
pub const CHARACTERISTIC_UUID: Uuid = Uuid::from_u128(0x00001525_1212_efde_1523_785feabcd124);

/// Advertised name of a V2 base station: `LHB-` followed by 8 characters
pub const NAME_PATTERN: &str = "^LHB-.{8}$";

/// Parse a UUID string as it appears in settings
pub fn parse_uuid(uuid_str: &str) -> Result<Uuid, uuid::Error> {
    Uuid::parse_str(uuid_str.trim())
}
