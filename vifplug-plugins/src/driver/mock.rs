//! Mock device driver for testing and development.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

use super::{NetworkDeviceDriver, SysfsWrite};
use crate::error::{DriverError, DriverResult};
use crate::types::DEFAULT_INTEGRATION_BRIDGE;

/// A driver call recorded by [`MockDeviceDriver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    DeviceExists { name: String },
    EnsureBridge { bridge: String, interface: Option<String> },
    EnsureVlanBridge { vlan: u16, bridge: String, interface: String, mtu: u32 },
    CreateVethPair { dev1: String, dev2: String, mtu: u32 },
    CreateOvsPort {
        bridge: String,
        port: String,
        interface_id: String,
        mac_address: String,
        instance_id: String,
        timeout: Duration,
    },
    DeleteOvsPort { bridge: String, port: String, timeout: Duration },
    AddBridge { bridge: String },
    DeleteBridge { bridge: String },
    SetBridgeStp { bridge: String, enabled: bool },
    DisableMulticastSnooping { bridge: String },
    SetLinkUp { device: String },
    SetLinkDown { device: String },
    AddBridgePort { bridge: String, device: String },
    RemoveBridgePort { bridge: String, device: String },
}

impl DriverCall {
    /// Operation name, matching the trait method.
    pub fn op(&self) -> &'static str {
        match self {
            DriverCall::DeviceExists { .. } => "device_exists",
            DriverCall::EnsureBridge { .. } => "ensure_bridge",
            DriverCall::EnsureVlanBridge { .. } => "ensure_vlan_bridge",
            DriverCall::CreateVethPair { .. } => "create_veth_pair",
            DriverCall::CreateOvsPort { .. } => "create_ovs_port",
            DriverCall::DeleteOvsPort { .. } => "delete_ovs_port",
            DriverCall::AddBridge { .. } => "add_bridge",
            DriverCall::DeleteBridge { .. } => "delete_bridge",
            DriverCall::SetBridgeStp { .. } => "set_bridge_stp",
            DriverCall::DisableMulticastSnooping { .. } => "disable_multicast_snooping",
            DriverCall::SetLinkUp { .. } => "set_link_up",
            DriverCall::SetLinkDown { .. } => "set_link_down",
            DriverCall::AddBridgePort { .. } => "add_bridge_port",
            DriverCall::RemoveBridgePort { .. } => "remove_bridge_port",
        }
    }

    /// Everything except existence queries.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, DriverCall::DeviceExists { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeviceKind {
    Physical,
    Bridge,
    Vlan,
    Veth,
}

#[derive(Debug, Clone)]
struct MockDevice {
    kind: DeviceKind,
    up: bool,
    mtu: u32,
    master: Option<String>,
    peer: Option<String>,
    stp: bool,
    multicast_snooping: bool,
}

impl MockDevice {
    fn new(kind: DeviceKind) -> Self {
        Self {
            kind,
            up: false,
            mtu: 1500,
            master: None,
            peer: None,
            stp: kind == DeviceKind::Bridge,
            multicast_snooping: kind == DeviceKind::Bridge,
        }
    }
}

/// An OVS port as recorded by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockOvsPort {
    pub interface_id: String,
    pub mac_address: String,
    pub instance_id: String,
}

#[derive(Default)]
struct MockState {
    devices: HashMap<String, MockDevice>,
    ovs_bridges: HashSet<String>,
    ovs_ports: HashMap<(String, String), MockOvsPort>,
    calls: Vec<DriverCall>,
    fail_on: HashSet<&'static str>,
    multicast_snooping_unsupported: bool,
}

impl MockState {
    fn require(&self, name: &str) -> DriverResult<()> {
        if self.devices.contains_key(name) {
            Ok(())
        } else {
            Err(DriverError::CommandFailed {
                command: format!("mock {}", name),
                code: Some(1),
                stderr: format!("Cannot find device \"{}\"", name),
            })
        }
    }

    fn check_failure(&mut self, op: &'static str) -> DriverResult<()> {
        if self.fail_on.remove(op) {
            return Err(DriverError::CommandFailed {
                command: format!("mock {}", op),
                code: Some(1),
                stderr: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn remove_device(&mut self, name: &str) {
        if let Some(device) = self.devices.remove(name) {
            if let Some(peer) = device.peer {
                self.devices.remove(&peer);
            }
            if device.kind == DeviceKind::Bridge {
                for dev in self.devices.values_mut() {
                    if dev.master.as_deref() == Some(name) {
                        dev.master = None;
                    }
                }
            }
        }
    }

    fn ensure_bridge(&mut self, bridge: &str, interface: Option<&str>) -> DriverResult<()> {
        if let Some(iface) = interface {
            self.require(iface)?;
        }
        let dev = self
            .devices
            .entry(bridge.to_string())
            .or_insert_with(|| MockDevice::new(DeviceKind::Bridge));
        dev.up = true;
        dev.stp = false;
        if let Some(iface) = interface {
            if let Some(dev) = self.devices.get_mut(iface) {
                dev.master = Some(bridge.to_string());
                dev.up = true;
            }
        }
        Ok(())
    }
}

/// Mock device driver for testing.
///
/// Keeps an in-memory device table, OVS port table and a log of every call.
/// Useful for:
/// - Asserting the exact call sequence a strategy issues
/// - Simulating partially-applied state and injected failures
/// - Running the CLI without root (`--dev`)
pub struct MockDeviceDriver {
    state: Mutex<MockState>,
}

impl MockDeviceDriver {
    /// Create a mock driver with an empty host and `br-int` present in OVS.
    pub fn new() -> Self {
        info!("Creating mock network device driver");
        let mut state = MockState::default();
        state.ovs_bridges.insert(DEFAULT_INTEGRATION_BRIDGE.to_string());
        Self {
            state: Mutex::new(state),
        }
    }

    /// Create a mock driver with the given physical devices present.
    pub fn with_devices<I, S>(devices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let driver = Self::new();
        {
            let mut state = driver.lock_state();
            for name in devices {
                state
                    .devices
                    .insert(name.into(), MockDevice::new(DeviceKind::Physical));
            }
        }
        driver
    }

    /// A panic while the lock was held leaves the state readable, so a
    /// poisoned lock is recovered everywhere.
    fn lock_state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: DriverCall) -> DriverResult<std::sync::MutexGuard<'_, MockState>> {
        let mut state = self.lock_state();
        debug!(call = ?call, "Mock driver call");
        let op = call.op();
        state.calls.push(call);
        state.check_failure(op)?;
        Ok(state)
    }

    /// Register an additional OVS bridge.
    pub fn add_ovs_bridge(&self, bridge: &str) {
        self.lock_state().ovs_bridges.insert(bridge.to_string());
    }

    /// Make the next call of `op` fail without changing state.
    pub fn fail_on(&self, op: &'static str) {
        self.lock_state().fail_on.insert(op);
    }

    /// Simulate a kernel without the multicast snooping control file.
    pub fn set_multicast_snooping_unsupported(&self, unsupported: bool) {
        self.lock_state().multicast_snooping_unsupported = unsupported;
    }

    /// All recorded calls in order.
    pub fn calls(&self) -> Vec<DriverCall> {
        self.lock_state().calls.clone()
    }

    /// Recorded calls excluding existence queries.
    pub fn mutations(&self) -> Vec<DriverCall> {
        self.lock_state()
            .calls
            .iter()
            .filter(|c| c.is_mutation())
            .cloned()
            .collect()
    }

    /// Number of recorded calls of `op`.
    pub fn count(&self, op: &str) -> usize {
        self.lock_state().calls.iter().filter(|c| c.op() == op).count()
    }

    /// Forget recorded calls, keeping device state.
    pub fn clear_calls(&self) {
        self.lock_state().calls.clear();
    }

    pub fn has_device(&self, name: &str) -> bool {
        self.lock_state().devices.contains_key(name)
    }

    pub fn is_up(&self, name: &str) -> bool {
        self.lock_state().devices.get(name).map_or(false, |d| d.up)
    }

    pub fn master_of(&self, name: &str) -> Option<String> {
        self.lock_state().devices.get(name).and_then(|d| d.master.clone())
    }

    pub fn mtu_of(&self, name: &str) -> Option<u32> {
        self.lock_state().devices.get(name).map(|d| d.mtu)
    }

    pub fn stp_enabled(&self, bridge: &str) -> Option<bool> {
        self.lock_state().devices.get(bridge).map(|d| d.stp)
    }

    pub fn multicast_snooping_enabled(&self, bridge: &str) -> Option<bool> {
        self.lock_state().devices.get(bridge).map(|d| d.multicast_snooping)
    }

    pub fn ovs_port(&self, bridge: &str, port: &str) -> Option<MockOvsPort> {
        self.lock_state()
            .ovs_ports
            .get(&(bridge.to_string(), port.to_string()))
            .cloned()
    }
}

impl Default for MockDeviceDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NetworkDeviceDriver for MockDeviceDriver {
    async fn device_exists(&self, name: &str) -> DriverResult<bool> {
        let state = self.record(DriverCall::DeviceExists {
            name: name.to_string(),
        })?;
        Ok(state.devices.contains_key(name))
    }

    async fn ensure_bridge(&self, bridge: &str, interface: Option<&str>) -> DriverResult<()> {
        let mut state = self.record(DriverCall::EnsureBridge {
            bridge: bridge.to_string(),
            interface: interface.map(str::to_string),
        })?;
        state.ensure_bridge(bridge, interface)
    }

    async fn ensure_vlan_bridge(
        &self,
        vlan: u16,
        bridge: &str,
        interface: &str,
        mtu: u32,
    ) -> DriverResult<String> {
        let mut state = self.record(DriverCall::EnsureVlanBridge {
            vlan,
            bridge: bridge.to_string(),
            interface: interface.to_string(),
            mtu,
        })?;
        state.require(interface)?;

        let vlan_iface = format!("vlan{}", vlan);
        let dev = state
            .devices
            .entry(vlan_iface.clone())
            .or_insert_with(|| MockDevice::new(DeviceKind::Vlan));
        dev.up = true;
        dev.mtu = mtu;

        state.ensure_bridge(bridge, Some(&vlan_iface))?;
        Ok(vlan_iface)
    }

    async fn create_veth_pair(&self, dev1: &str, dev2: &str, mtu: u32) -> DriverResult<()> {
        let mut state = self.record(DriverCall::CreateVethPair {
            dev1: dev1.to_string(),
            dev2: dev2.to_string(),
            mtu,
        })?;
        state.remove_device(dev1);
        state.remove_device(dev2);

        for (name, peer) in [(dev1, dev2), (dev2, dev1)] {
            let mut dev = MockDevice::new(DeviceKind::Veth);
            dev.up = true;
            dev.mtu = mtu;
            dev.peer = Some(peer.to_string());
            state.devices.insert(name.to_string(), dev);
        }
        Ok(())
    }

    async fn create_ovs_port(
        &self,
        bridge: &str,
        port: &str,
        interface_id: &str,
        mac_address: &str,
        instance_id: &str,
        timeout: Duration,
    ) -> DriverResult<()> {
        let mut state = self.record(DriverCall::CreateOvsPort {
            bridge: bridge.to_string(),
            port: port.to_string(),
            interface_id: interface_id.to_string(),
            mac_address: mac_address.to_string(),
            instance_id: instance_id.to_string(),
            timeout,
        })?;
        if !state.ovs_bridges.contains(bridge) {
            return Err(DriverError::CommandFailed {
                command: "mock ovs-vsctl add-port".to_string(),
                code: Some(1),
                stderr: format!("no bridge named {}", bridge),
            });
        }
        state.ovs_ports.insert(
            (bridge.to_string(), port.to_string()),
            MockOvsPort {
                interface_id: interface_id.to_string(),
                mac_address: mac_address.to_string(),
                instance_id: instance_id.to_string(),
            },
        );
        Ok(())
    }

    async fn delete_ovs_port(&self, bridge: &str, port: &str, timeout: Duration) -> DriverResult<()> {
        let mut state = self.record(DriverCall::DeleteOvsPort {
            bridge: bridge.to_string(),
            port: port.to_string(),
            timeout,
        })?;
        state.ovs_ports.remove(&(bridge.to_string(), port.to_string()));
        state.remove_device(port);
        Ok(())
    }

    async fn add_bridge(&self, bridge: &str) -> DriverResult<()> {
        let mut state = self.record(DriverCall::AddBridge {
            bridge: bridge.to_string(),
        })?;
        if state.devices.contains_key(bridge) {
            return Err(DriverError::CommandFailed {
                command: format!("mock add bridge {}", bridge),
                code: Some(2),
                stderr: "File exists".to_string(),
            });
        }
        state
            .devices
            .insert(bridge.to_string(), MockDevice::new(DeviceKind::Bridge));
        Ok(())
    }

    async fn delete_bridge(&self, bridge: &str) -> DriverResult<()> {
        let mut state = self.record(DriverCall::DeleteBridge {
            bridge: bridge.to_string(),
        })?;
        state.require(bridge)?;
        state.remove_device(bridge);
        Ok(())
    }

    async fn set_bridge_stp(&self, bridge: &str, enabled: bool) -> DriverResult<()> {
        let mut state = self.record(DriverCall::SetBridgeStp {
            bridge: bridge.to_string(),
            enabled,
        })?;
        state.require(bridge)?;
        if let Some(dev) = state.devices.get_mut(bridge) {
            dev.stp = enabled;
        }
        Ok(())
    }

    async fn disable_multicast_snooping(&self, bridge: &str) -> DriverResult<SysfsWrite> {
        let mut state = self.record(DriverCall::DisableMulticastSnooping {
            bridge: bridge.to_string(),
        })?;
        if state.multicast_snooping_unsupported {
            return Ok(SysfsWrite::Unsupported);
        }
        match state.devices.get_mut(bridge) {
            Some(dev) if dev.kind == DeviceKind::Bridge => {
                dev.multicast_snooping = false;
                Ok(SysfsWrite::Applied)
            }
            _ => Ok(SysfsWrite::Unsupported),
        }
    }

    async fn set_link_up(&self, device: &str) -> DriverResult<()> {
        let mut state = self.record(DriverCall::SetLinkUp {
            device: device.to_string(),
        })?;
        state.require(device)?;
        if let Some(dev) = state.devices.get_mut(device) {
            dev.up = true;
        }
        Ok(())
    }

    async fn set_link_down(&self, device: &str) -> DriverResult<()> {
        let mut state = self.record(DriverCall::SetLinkDown {
            device: device.to_string(),
        })?;
        state.require(device)?;
        if let Some(dev) = state.devices.get_mut(device) {
            dev.up = false;
        }
        Ok(())
    }

    async fn add_bridge_port(&self, bridge: &str, device: &str) -> DriverResult<()> {
        let mut state = self.record(DriverCall::AddBridgePort {
            bridge: bridge.to_string(),
            device: device.to_string(),
        })?;
        state.require(bridge)?;
        state.require(device)?;
        if let Some(dev) = state.devices.get_mut(device) {
            dev.master = Some(bridge.to_string());
        }
        Ok(())
    }

    async fn remove_bridge_port(&self, bridge: &str, device: &str) -> DriverResult<()> {
        let mut state = self.record(DriverCall::RemoveBridgePort {
            bridge: bridge.to_string(),
            device: device.to_string(),
        })?;
        if let Some(dev) = state.devices.get_mut(device) {
            if dev.master.as_deref() == Some(bridge) {
                dev.master = None;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ensure_bridge_is_idempotent() {
        let driver = MockDeviceDriver::with_devices(["eth0"]);

        driver.ensure_bridge("br100", Some("eth0")).await.unwrap();
        driver.ensure_bridge("br100", Some("eth0")).await.unwrap();

        assert!(driver.has_device("br100"));
        assert_eq!(driver.master_of("eth0").as_deref(), Some("br100"));
        assert_eq!(driver.count("ensure_bridge"), 2);
    }

    #[tokio::test]
    async fn test_ensure_bridge_missing_parent() {
        let driver = MockDeviceDriver::new();
        let result = driver.ensure_bridge("br100", Some("eth9")).await;
        assert!(matches!(result, Err(DriverError::CommandFailed { .. })));
        assert!(!driver.has_device("br100"));
    }

    #[tokio::test]
    async fn test_vlan_bridge() {
        let driver = MockDeviceDriver::with_devices(["eth1"]);
        let iface = driver.ensure_vlan_bridge(42, "br42", "eth1", 9000).await.unwrap();

        assert_eq!(iface, "vlan42");
        assert_eq!(driver.mtu_of("vlan42"), Some(9000));
        assert_eq!(driver.master_of("vlan42").as_deref(), Some("br42"));
    }

    #[tokio::test]
    async fn test_veth_pair_replaced_and_removed_together() {
        let driver = MockDeviceDriver::new();
        driver.create_veth_pair("qvba", "qvoa", 1500).await.unwrap();
        driver.create_veth_pair("qvba", "qvoa", 1400).await.unwrap();
        assert_eq!(driver.mtu_of("qvoa"), Some(1400));

        let timeout = Duration::from_secs(5);
        driver.create_ovs_port("br-int", "qvoa", "id", "mac", "vm", timeout).await.unwrap();
        assert!(driver.ovs_port("br-int", "qvoa").is_some());

        driver.delete_ovs_port("br-int", "qvoa", timeout).await.unwrap();
        assert!(driver.ovs_port("br-int", "qvoa").is_none());
        assert!(!driver.has_device("qvoa"));
        assert!(!driver.has_device("qvba"));

        // Deleting again is fine
        driver.delete_ovs_port("br-int", "qvoa", timeout).await.unwrap();
    }

    #[tokio::test]
    async fn test_add_bridge_twice_fails() {
        let driver = MockDeviceDriver::new();
        driver.add_bridge("qbr1").await.unwrap();
        assert!(driver.add_bridge("qbr1").await.is_err());
    }

    #[tokio::test]
    async fn test_injected_failure_is_one_shot() {
        let driver = MockDeviceDriver::new();
        driver.fail_on("add_bridge");

        assert!(driver.add_bridge("qbr1").await.is_err());
        assert!(!driver.has_device("qbr1"));
        driver.add_bridge("qbr1").await.unwrap();
        assert_eq!(driver.count("add_bridge"), 2);
    }

    #[tokio::test]
    async fn test_poisoned_lock_is_recovered() {
        let driver = std::sync::Arc::new(MockDeviceDriver::with_devices(["eth0"]));
        let poisoner = driver.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.state.lock().unwrap();
            panic!("poison the mock state");
        })
        .join();
        assert!(driver.state.is_poisoned());

        assert!(driver.device_exists("eth0").await.unwrap());
        driver.add_bridge("qbr1").await.unwrap();
        assert!(driver.has_device("qbr1"));
        assert_eq!(driver.count("device_exists"), 1);
    }

    #[tokio::test]
    async fn test_unknown_ovs_bridge() {
        let driver = MockDeviceDriver::new();
        let result = driver
            .create_ovs_port("br-ex", "qvo1", "id", "mac", "vm", Duration::from_secs(1))
            .await;
        assert!(result.is_err());

        driver.add_ovs_bridge("br-ex");
        driver
            .create_ovs_port("br-ex", "qvo1", "id", "mac", "vm", Duration::from_secs(1))
            .await
            .unwrap();
    }
}
