pub mod binder;
pub mod controller;
pub mod dispatcher;
pub mod lifecycle;
pub mod models;
pub mod ports;
pub mod settings;
pub mod shutdown;
