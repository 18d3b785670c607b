//! Network device driver abstraction.
//!
//! The plugging strategies never touch the host directly. They query and
//! mutate device state through [`NetworkDeviceDriver`]:
//! - **Linux**: shells out to `ip` and `ovs-vsctl`, writes sysfs
//! - **Mock**: in-memory device table with a call log, for tests and dev mode
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────┐   ┌────────────────────┐
//! │ LinuxBridgePlugin  │   │  OvsHybridPlugin   │
//! └─────────┬──────────┘   └─────────┬──────────┘
//!           └────────────┬───────────┘
//!                        ▼
//!             ┌─────────────────────┐
//!             │ NetworkDeviceDriver │
//!             └──────────┬──────────┘
//!            ┌───────────┴───────────┐
//!            ▼                       ▼
//!   ┌──────────────────┐   ┌──────────────────┐
//!   │ LinuxDeviceDriver│   │ MockDeviceDriver │
//!   └──────────────────┘   └──────────────────┘
//! ```

mod linux;
mod mock;

pub use linux::LinuxDeviceDriver;
pub use mock::{DriverCall, MockDeviceDriver, MockOvsPort};

use async_trait::async_trait;
use std::time::Duration;

use crate::error::DriverResult;

/// Outcome of a best-effort sysfs write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SysfsWrite {
    /// The control file was written.
    Applied,
    /// The kernel does not expose the control file.
    Unsupported,
}

/// Host network device primitives.
///
/// Every `ensure_*`, `create_*` and `delete_*` operation must succeed when
/// the target state already holds.
#[async_trait]
pub trait NetworkDeviceDriver: Send + Sync {
    // =========================================================================
    // Queries
    // =========================================================================

    /// Check whether a network device exists.
    async fn device_exists(&self, name: &str) -> DriverResult<bool>;

    // =========================================================================
    // Idempotent composites
    // =========================================================================

    /// Ensure a bridge exists and, if given, that `interface` is enslaved to it.
    async fn ensure_bridge(&self, bridge: &str, interface: Option<&str>) -> DriverResult<()>;

    /// Ensure a VLAN sub-interface of `interface` exists and is enslaved to
    /// `bridge`.
    ///
    /// Returns the name of the VLAN sub-interface.
    async fn ensure_vlan_bridge(
        &self,
        vlan: u16,
        bridge: &str,
        interface: &str,
        mtu: u32,
    ) -> DriverResult<String>;

    /// Create a veth pair, replacing stale devices of the same names.
    async fn create_veth_pair(&self, dev1: &str, dev2: &str, mtu: u32) -> DriverResult<()>;

    /// Add `port` to the OVS bridge with its external-ids set.
    async fn create_ovs_port(
        &self,
        bridge: &str,
        port: &str,
        interface_id: &str,
        mac_address: &str,
        instance_id: &str,
        timeout: Duration,
    ) -> DriverResult<()>;

    /// Remove `port` from the OVS bridge. A missing port is not an error.
    async fn delete_ovs_port(&self, bridge: &str, port: &str, timeout: Duration) -> DriverResult<()>;

    // =========================================================================
    // Raw primitives
    // =========================================================================

    /// Create a Linux bridge device.
    async fn add_bridge(&self, bridge: &str) -> DriverResult<()>;

    /// Delete a Linux bridge device.
    async fn delete_bridge(&self, bridge: &str) -> DriverResult<()>;

    /// Turn the spanning-tree protocol on or off.
    async fn set_bridge_stp(&self, bridge: &str, enabled: bool) -> DriverResult<()>;

    /// Disable IGMP/MLD snooping on a bridge.
    async fn disable_multicast_snooping(&self, bridge: &str) -> DriverResult<SysfsWrite>;

    /// Bring a device administratively up.
    async fn set_link_up(&self, device: &str) -> DriverResult<()>;

    /// Bring a device administratively down.
    async fn set_link_down(&self, device: &str) -> DriverResult<()>;

    /// Enslave a device to a bridge.
    async fn add_bridge_port(&self, bridge: &str, device: &str) -> DriverResult<()>;

    /// Release a device from a bridge.
    async fn remove_bridge_port(&self, bridge: &str, device: &str) -> DriverResult<()>;
}
