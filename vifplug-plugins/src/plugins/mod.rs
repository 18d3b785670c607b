//! VIF plugging strategies.
//!
//! - **Linux bridge**: ensures a shared (optionally VLAN-backed) bridge
//! - **OVS hybrid**: per-VIF Linux bridge chained to the OVS integration
//!   bridge through a veth pair

mod linux_bridge;
mod ovs_hybrid;

pub use linux_bridge::LinuxBridgePlugin;
pub use ovs_hybrid::OvsHybridPlugin;

use crate::error::{Result, VifPlugError};
use crate::types::{PortProfile, Vif};

/// The OVS interface id of a VIF, or the reason it has none.
pub(crate) fn ovs_interface_id(vif: &Vif) -> Result<&str> {
    match &vif.port_profile {
        None => Err(VifPlugError::MissingPortProfile),
        Some(PortProfile::OpenVSwitch { interface_id }) => Ok(interface_id),
        Some(other) => Err(VifPlugError::WrongPortProfile(other.type_name().to_string())),
    }
}
