//! In-memory BLE and host runtime fakes shared by the unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use regex::Regex;
use uuid::Uuid;

use crate::domain::binder::BindConfig;
use crate::domain::models::Endpoint;
use crate::domain::ports::{
    AttachMode, BleAdapter, CharacteristicsResult, CommandChannel, GattServiceHandle, GattSession,
    GattStatus, HostEvent, HostRuntime, PeripheralInfo, ServicesResult, SharingMode,
};
use crate::error::{BleError, HostError};
use crate::infrastructure::bluetooth::protocol;

/// Generic Access service, present on every real device
const GENERIC_ACCESS_UUID: Uuid = Uuid::from_u128(0x00001800_0000_1000_8000_00805f9b34fb);

pub fn lighthouse_config() -> BindConfig {
    BindConfig {
        name_pattern: Regex::new(protocol::NAME_PATTERN).unwrap(),
        service_id: protocol::SERVICE_UUID,
        characteristic_id: protocol::CHARACTERISTIC_UUID,
        access_denied_retry_limit: None,
    }
}

pub fn endpoints(channels: &[FakeChannel]) -> Vec<Endpoint> {
    channels
        .iter()
        .enumerate()
        .map(|(i, c)| Endpoint {
            display_index: i + 1,
            channel: Arc::new(c.clone()),
        })
        .collect()
}

#[derive(Clone)]
pub struct FakeChannel {
    uuid: Uuid,
    status: GattStatus,
    delay: Duration,
    writes: Arc<Mutex<Vec<u8>>>,
    last_write_done: Arc<Mutex<Option<Instant>>>,
    log: Option<Arc<Mutex<Vec<u8>>>>,
}

impl FakeChannel {
    pub fn ok() -> Self {
        Self::failing(GattStatus::Success)
    }

    pub fn failing(status: GattStatus) -> Self {
        Self {
            uuid: protocol::CHARACTERISTIC_UUID,
            status,
            delay: Duration::ZERO,
            writes: Arc::default(),
            last_write_done: Arc::default(),
            log: None,
        }
    }

    pub fn slow(millis: u64) -> Self {
        let mut channel = Self::ok();
        channel.delay = Duration::from_millis(millis);
        channel
    }

    fn with_uuid(mut self, uuid: Uuid) -> Self {
        self.uuid = uuid;
        self
    }

    /// Also append every write to `log`, shared across channels
    pub fn logging_to(mut self, log: &Arc<Mutex<Vec<u8>>>) -> Self {
        self.log = Some(Arc::clone(log));
        self
    }

    pub fn writes(&self) -> Vec<u8> {
        self.writes.lock().unwrap().clone()
    }

    pub fn last_write_done(&self) -> Option<Instant> {
        *self.last_write_done.lock().unwrap()
    }
}

#[async_trait]
impl CommandChannel for FakeChannel {
    fn uuid(&self) -> Uuid {
        self.uuid
    }

    async fn write(&self, value: u8) -> GattStatus {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.writes.lock().unwrap().push(value);
        if let Some(log) = &self.log {
            log.lock().unwrap().push(value);
        }
        *self.last_write_done.lock().unwrap() = Some(Instant::now());
        self.status.clone()
    }
}

/// Counts characteristic queries made against a device
#[derive(Clone, Default)]
pub struct QueryProbe(Arc<AtomicU32>);

impl QueryProbe {
    pub fn get(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
pub struct FakeDevice {
    name: String,
    unopenable: bool,
    services_status: GattStatus,
    characteristic_status: GattStatus,
    deny_remaining: Arc<AtomicU32>,
    queries: QueryProbe,
    channels: Vec<FakeChannel>,
}

impl FakeDevice {
    /// A healthy base station with one control characteristic
    pub fn lighthouse(name: &str) -> Self {
        Self {
            name: name.to_string(),
            unopenable: false,
            services_status: GattStatus::Success,
            characteristic_status: GattStatus::Success,
            deny_remaining: Arc::default(),
            queries: QueryProbe::default(),
            channels: vec![FakeChannel::ok()],
        }
    }

    /// Answer the first `times` characteristic queries with `AccessDenied`
    pub fn deny_access(self, times: u32) -> Self {
        self.deny_remaining.store(times, Ordering::SeqCst);
        self
    }

    pub fn characteristic_status(mut self, status: GattStatus) -> Self {
        self.characteristic_status = status;
        self
    }

    pub fn services_status(mut self, status: GattStatus) -> Self {
        self.services_status = status;
        self
    }

    pub fn with_extra_characteristic(mut self, uuid: Uuid) -> Self {
        self.channels.push(FakeChannel::ok().with_uuid(uuid));
        self
    }

    pub fn unopenable(mut self) -> Self {
        self.unopenable = true;
        self
    }

    pub fn characteristic_queries(&self) -> QueryProbe {
        self.queries.clone()
    }
}

#[derive(Clone)]
pub struct FakeAdapter {
    devices: Arc<Vec<FakeDevice>>,
    opened: Arc<Mutex<Vec<String>>>,
    enumerations: Arc<AtomicUsize>,
    write_log: Arc<Mutex<Vec<u8>>>,
}

impl FakeAdapter {
    pub fn new(devices: Vec<FakeDevice>) -> Self {
        let write_log = Arc::new(Mutex::new(Vec::new()));
        let devices = devices
            .into_iter()
            .map(|mut device| {
                device.channels = device
                    .channels
                    .into_iter()
                    .map(|c| c.logging_to(&write_log))
                    .collect();
                device
            })
            .collect();
        Self {
            devices: Arc::new(devices),
            opened: Arc::default(),
            enumerations: Arc::default(),
            write_log,
        }
    }

    /// Every byte written to any characteristic, in write order
    pub fn writes(&self) -> Vec<u8> {
        self.write_log.lock().unwrap().clone()
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }

    pub fn enumerations(&self) -> usize {
        self.enumerations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BleAdapter for FakeAdapter {
    async fn find_peripherals(&self, _service_id: Uuid) -> Result<Vec<PeripheralInfo>, BleError> {
        self.enumerations.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .devices
            .iter()
            .map(|d| PeripheralInfo {
                name: d.name.clone(),
                id: d.name.clone(),
            })
            .collect())
    }

    async fn open(&self, peripheral_id: &str) -> Result<Box<dyn GattSession>, BleError> {
        let device = self
            .devices
            .iter()
            .find(|d| d.name == peripheral_id)
            .ok_or_else(|| BleError::Open {
                id: peripheral_id.to_string(),
                reason: "unknown device".to_string(),
            })?;
        if device.unopenable {
            return Err(BleError::Open {
                id: peripheral_id.to_string(),
                reason: "device unreachable".to_string(),
            });
        }
        self.opened.lock().unwrap().push(peripheral_id.to_string());
        Ok(Box::new(FakeSession {
            device: device.clone(),
        }))
    }
}

struct FakeSession {
    device: FakeDevice,
}

#[async_trait]
impl GattSession for FakeSession {
    async fn list_services(&self) -> ServicesResult {
        if !self.device.services_status.is_success() {
            return ServicesResult {
                status: self.device.services_status.clone(),
                services: Vec::new(),
            };
        }
        ServicesResult {
            status: GattStatus::Success,
            services: vec![
                Box::new(FakeService {
                    uuid: GENERIC_ACCESS_UUID,
                    device: self.device.clone(),
                }),
                Box::new(FakeService {
                    uuid: protocol::SERVICE_UUID,
                    device: self.device.clone(),
                }),
            ],
        }
    }
}

struct FakeService {
    uuid: Uuid,
    device: FakeDevice,
}

#[async_trait]
impl GattServiceHandle for FakeService {
    fn uuid(&self) -> Uuid {
        self.uuid
    }

    async fn list_characteristics(&self, _characteristic_id: Uuid) -> CharacteristicsResult {
        self.device.queries.0.fetch_add(1, Ordering::SeqCst);
        let denied = self
            .device
            .deny_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        let status = if denied {
            GattStatus::AccessDenied
        } else {
            self.device.characteristic_status.clone()
        };
        let characteristics = if status.is_success() {
            self.device
                .channels
                .iter()
                .map(|c| Arc::new(c.clone()) as Arc<dyn CommandChannel>)
                .collect()
        } else {
            Vec::new()
        };
        CharacteristicsResult {
            status,
            characteristics,
        }
    }

    async fn open(&self, _mode: SharingMode) -> GattStatus {
        GattStatus::Success
    }
}

enum HostScript {
    NoServer,
    InitError(String),
    Panic,
    PanicOnPoll,
    Idle,
    QuitAfter(u32),
    Events(VecDeque<HostEvent>),
}

/// Observes calls made into a [`FakeHost`] after it was moved to the watcher
#[derive(Clone, Default)]
pub struct HostProbe {
    polls: Arc<AtomicU32>,
    acks: Arc<AtomicU32>,
    shutdowns: Arc<AtomicU32>,
    shutdown_at: Arc<Mutex<Option<Instant>>>,
}

impl HostProbe {
    pub fn polls(&self) -> u32 {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn acks(&self) -> u32 {
        self.acks.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> u32 {
        self.shutdowns.load(Ordering::SeqCst)
    }

    pub fn shutdown_at(&self) -> Option<Instant> {
        *self.shutdown_at.lock().unwrap()
    }
}

pub struct FakeHost {
    script: HostScript,
    panic_on_ack: bool,
    probe: HostProbe,
}

impl FakeHost {
    fn scripted(script: HostScript) -> Self {
        Self {
            script,
            panic_on_ack: false,
            probe: HostProbe::default(),
        }
    }

    pub fn no_server() -> Self {
        Self::scripted(HostScript::NoServer)
    }

    pub fn init_error(reason: &str) -> Self {
        Self::scripted(HostScript::InitError(reason.to_string()))
    }

    pub fn panicking() -> Self {
        Self::scripted(HostScript::Panic)
    }

    /// Attaches, then panics on the first event poll
    pub fn panicking_on_poll() -> Self {
        Self::scripted(HostScript::PanicOnPoll)
    }

    pub fn panicking_on_ack(mut self) -> Self {
        self.panic_on_ack = true;
        self
    }

    /// Attaches and never asks to quit
    pub fn idle() -> Self {
        Self::scripted(HostScript::Idle)
    }

    /// Reports a quit event on the `polls`-th poll
    pub fn quitting_after(polls: u32) -> Self {
        Self::scripted(HostScript::QuitAfter(polls))
    }

    pub fn with_events(events: Vec<HostEvent>) -> Self {
        Self::scripted(HostScript::Events(events.into()))
    }

    pub fn probe(&self) -> HostProbe {
        self.probe.clone()
    }
}

impl HostRuntime for FakeHost {
    fn attach(&mut self, _mode: AttachMode) -> Result<(), HostError> {
        match &self.script {
            HostScript::NoServer => Err(HostError::NoServer),
            HostScript::InitError(reason) => Err(HostError::Init(reason.clone())),
            HostScript::Panic => panic!("host runtime exploded"),
            _ => Ok(()),
        }
    }

    fn poll_next_event(&mut self) -> Option<HostEvent> {
        let polls = self.probe.polls.fetch_add(1, Ordering::SeqCst) + 1;
        match &mut self.script {
            HostScript::PanicOnPoll => panic!("host event feed exploded"),
            HostScript::QuitAfter(n) if polls >= *n => Some(HostEvent::Quit),
            HostScript::Events(events) => events.pop_front(),
            _ => None,
        }
    }

    fn acknowledge_quit(&mut self) {
        self.probe.acks.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_ack {
            panic!("host acknowledge exploded");
        }
    }

    fn shutdown(&mut self) {
        self.probe.shutdowns.fetch_add(1, Ordering::SeqCst);
        *self.probe.shutdown_at.lock().unwrap() = Some(Instant::now());
    }
}
