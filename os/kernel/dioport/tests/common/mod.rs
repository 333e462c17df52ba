#![allow(dead_code)]

use dio_abi::{PortRange, Request, Status, ranges_header_len, wire};
use dio_ports::{PortBus, PortFault, pattern_byte};
use dioport::{
    Completion, Device, DriverOptions, LowerCall, LowerDevice, PendingCompletion, Platform,
    PnpRequest, ProcessId, ResourceDescriptor,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn pid(raw: u64) -> ProcessId {
    ProcessId::new(raw).unwrap()
}

/// What the bus saw. Shared with the test after the bus moved into a device.
#[derive(Debug, Default)]
pub struct BusLog {
    pub calls: AtomicUsize,
    pub writes: Mutex<Vec<(u16, Vec<u8>)>>,
    /// Port whose access fails, or `u32::MAX` for none.
    fault_port: AtomicU32,
    /// While set, every access spins after announcing itself in `entered`.
    pub stall: AtomicBool,
    pub entered: AtomicBool,
}

impl BusLog {
    pub fn fail_at(&self, port: u16) {
        self.fault_port.store(u32::from(port), Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self, port: u16) -> Result<(), PortFault> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.store(true, Ordering::SeqCst);
        while self.stall.load(Ordering::SeqCst) {
            std::thread::yield_now();
        }
        if self.fault_port.load(Ordering::SeqCst) == u32::from(port) {
            Err(PortFault::NoResponse { port })
        } else {
            Ok(())
        }
    }
}

pub struct RecordingBus(pub Arc<BusLog>);

impl RecordingBus {
    pub fn new() -> (Self, Arc<BusLog>) {
        let log = Arc::new(BusLog {
            fault_port: AtomicU32::new(u32::MAX),
            ..BusLog::default()
        });
        (Self(Arc::clone(&log)), log)
    }
}

impl PortBus for RecordingBus {
    fn read(&self, port: u16, buf: &mut [u8]) -> Result<(), PortFault> {
        self.0.check(port)?;
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = pattern_byte(i);
        }
        Ok(())
    }

    fn write(&self, port: u16, buf: &[u8]) -> Result<(), PortFault> {
        self.0.check(port)?;
        self.0.writes.lock().unwrap().push((port, buf.to_vec()));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEvent {
    LinkCreated,
    LinkDeleted,
    Interface(bool),
    Attached,
    Detached,
}

#[derive(Debug, Default)]
pub struct RecordingPlatform {
    pub events: Mutex<Vec<PlatformEvent>>,
    pub installed_map: Mutex<Option<Vec<u8>>>,
    pub map_installs: AtomicUsize,
    pub io_access: Mutex<HashMap<u64, bool>>,
    pub fail_attach: AtomicBool,
    pub fail_interface: AtomicBool,
}

impl RecordingPlatform {
    pub fn events(&self) -> Vec<PlatformEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn io_access(&self, pid: ProcessId) -> Option<bool> {
        self.io_access.lock().unwrap().get(&pid.get()).copied()
    }

    pub fn installed_map(&self) -> Vec<u8> {
        self.installed_map.lock().unwrap().clone().unwrap_or_default()
    }

    fn record(&self, event: PlatformEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl Platform for RecordingPlatform {
    fn create_symbolic_link(&self, _link: &str, _target: &str) -> Result<(), Status> {
        self.record(PlatformEvent::LinkCreated);
        Ok(())
    }

    fn delete_symbolic_link(&self, _link: &str) {
        self.record(PlatformEvent::LinkDeleted);
    }

    fn set_device_interface(&self, enabled: bool) -> Result<(), Status> {
        if enabled && self.fail_interface.load(Ordering::SeqCst) {
            return Err(Status::InsufficientResources);
        }
        self.record(PlatformEvent::Interface(enabled));
        Ok(())
    }

    fn attach_to_lower(&self) -> Result<(), Status> {
        if self.fail_attach.load(Ordering::SeqCst) {
            return Err(Status::DeviceGone);
        }
        self.record(PlatformEvent::Attached);
        Ok(())
    }

    fn detach_from_lower(&self) {
        self.record(PlatformEvent::Detached);
    }

    fn set_io_access_map(&self, map: &[u8]) {
        self.map_installs.fetch_add(1, Ordering::SeqCst);
        *self.installed_map.lock().unwrap() = Some(map.to_vec());
    }

    fn set_process_io_access(&self, pid: ProcessId, enabled: bool) {
        self.io_access.lock().unwrap().insert(pid.get(), enabled);
    }
}

/// Lower device answering every minor with a scripted result.
#[derive(Debug, Default)]
pub struct ScriptedLower {
    pub minors: Mutex<Vec<u8>>,
    pub failures: Mutex<HashMap<u8, Status>>,
    /// Complete from another thread after a short delay.
    pub pending: AtomicBool,
    /// Pending calls completed so far.
    pub completed: Arc<AtomicUsize>,
}

impl ScriptedLower {
    pub fn fail(&self, minor: u8, status: Status) {
        self.failures.lock().unwrap().insert(minor, status);
    }

    pub fn minors(&self) -> Vec<u8> {
        self.minors.lock().unwrap().clone()
    }
}

impl LowerDevice for ScriptedLower {
    fn call(&self, request: &PnpRequest<'_>) -> LowerCall {
        let minor = request.minor();
        self.minors.lock().unwrap().push(minor);
        let result = self
            .failures
            .lock()
            .unwrap()
            .get(&minor)
            .map_or(Ok(()), |status| Err(*status));
        if !self.pending.load(Ordering::SeqCst) {
            return LowerCall::Completed(result);
        }
        let pending = Arc::new(PendingCompletion::new());
        let completer = Arc::clone(&pending);
        let completed = Arc::clone(&self.completed);
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            completed.fetch_add(1, Ordering::SeqCst);
            completer.complete(result);
        });
        LowerCall::Pending(pending)
    }
}

pub struct Harness {
    pub device: Arc<Device<RecordingBus>>,
    pub bus: Arc<BusLog>,
    pub platform: Arc<RecordingPlatform>,
    pub lower: Arc<ScriptedLower>,
}

pub const ASSIGNED: [ResourceDescriptor; 1] = [ResourceDescriptor::Port {
    start: 0x7000,
    length: 0x50,
}];

impl Harness {
    pub fn attached(options: DriverOptions) -> Self {
        let (bus, log) = RecordingBus::new();
        let platform = Arc::new(RecordingPlatform::default());
        let lower = Arc::new(ScriptedLower::default());
        let device = Device::attach(
            options,
            bus,
            Arc::clone(&platform) as Arc<dyn Platform>,
            Arc::clone(&lower) as Arc<dyn LowerDevice>,
        )
        .unwrap();
        Self {
            device: Arc::new(device),
            bus: log,
            platform,
            lower,
        }
    }

    pub fn started(options: DriverOptions) -> Self {
        let harness = Self::attached(options);
        let outcome = harness.device.pnp(&PnpRequest::StartDevice {
            translated: &ASSIGNED,
        });
        assert_eq!(outcome.status, Status::Success);
        harness
    }

    pub fn control(&self, pid: ProcessId, request: Request, input: &[u8], output: &mut [u8]) -> Completion {
        self.device
            .device_control(pid, request.control_code(), input, output)
    }

    pub fn grant(&self, pid: ProcessId, ranges: &[PortRange]) -> Completion {
        self.control(pid, Request::GrantPortAccess, &ranges_packet(ranges, 0), &mut [])
    }

    pub fn reset(&self, pid: ProcessId) -> Completion {
        self.control(pid, Request::ResetPortAccess, &[], &mut [])
    }

    /// Read `ranges`, returning the completion and the output buffer.
    pub fn read(&self, pid: ProcessId, ranges: &[PortRange], output_len: usize) -> (Completion, Vec<u8>) {
        let mut output = vec![0u8; output_len];
        let completion = self.control(pid, Request::ReadPort, &ranges_packet(ranges, 0), &mut output);
        (completion, output)
    }

    pub fn write(&self, pid: ProcessId, ranges: &[PortRange], data: &[u8]) -> Completion {
        let mut input = ranges_packet(ranges, data.len());
        let header = input.len() - data.len();
        input[header..].copy_from_slice(data);
        let mut output = vec![0u8; header];
        self.control(pid, Request::WritePort, &input, &mut output)
    }
}

/// `[count] [ranges]` followed by `payload` zero bytes.
pub fn ranges_packet(ranges: &[PortRange], payload: usize) -> Vec<u8> {
    let mut packet = vec![0u8; ranges_header_len(ranges.len()).unwrap() + payload];
    wire::write_ranges(&mut packet, ranges).unwrap();
    packet
}

pub fn span(ranges: &[PortRange]) -> usize {
    ranges.iter().map(|r| r.len() as usize).sum()
}
