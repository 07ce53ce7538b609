pub mod bluetooth;
pub mod host;
pub mod logging;
