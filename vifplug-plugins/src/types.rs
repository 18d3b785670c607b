//! VIF, network and plugin descriptor types.
//!
//! These are read-only inputs to the plugging strategies. They deserialize
//! from YAML so the CLI can load them from descriptor files.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, VifPlugError};

/// Default OVS integration bridge.
pub const DEFAULT_INTEGRATION_BRIDGE: &str = "br-int";

fn default_integration_bridge() -> String {
    DEFAULT_INTEGRATION_BRIDGE.to_string()
}

/// A virtual network interface attached to a guest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vif {
    /// Stable VIF identifier (usually the Neutron port UUID)
    pub id: String,
    /// Guest MAC address
    pub address: String,
    /// Host bridge this VIF is plugged into
    pub bridge_name: String,
    /// Network the VIF belongs to
    pub network: Network,
    /// Backend port metadata
    #[serde(default)]
    pub port_profile: Option<PortProfile>,
    /// Guest-facing device name (e.g., "tap1234")
    #[serde(default)]
    pub vif_name: Option<String>,
    /// Name of the plugin the VIF was bound to
    #[serde(default)]
    pub plugin: Option<String>,
}

impl Vif {
    /// Create a VIF with no port profile.
    pub fn new(
        id: impl Into<String>,
        address: impl Into<String>,
        bridge_name: impl Into<String>,
        network: Network,
    ) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            bridge_name: bridge_name.into(),
            network,
            port_profile: None,
            vif_name: None,
            plugin: None,
        }
    }

    /// Set the port profile.
    pub fn with_port_profile(mut self, profile: PortProfile) -> Self {
        self.port_profile = Some(profile);
        self
    }
}

/// Logical network description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    /// Network ID
    #[serde(default)]
    pub id: String,
    /// Bridge is managed per compute host rather than centrally
    #[serde(default)]
    pub multi_host: bool,
    /// This host is responsible for creating the bridge
    #[serde(default)]
    pub should_provide_bridge: bool,
    /// This host is responsible for the VLAN sub-interface
    #[serde(default)]
    pub should_provide_vlan: bool,
    /// VLAN tag, present iff `should_provide_vlan`
    #[serde(default)]
    pub vlan: Option<u16>,
    /// Physical/parent interface name
    #[serde(default)]
    pub bridge_interface: Option<String>,
    /// OVS integration bridge (hybrid strategy)
    #[serde(default = "default_integration_bridge")]
    pub bridge: String,
}

impl Network {
    /// Create a network with every flag off and the default integration bridge.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            multi_host: false,
            should_provide_bridge: false,
            should_provide_vlan: false,
            vlan: None,
            bridge_interface: None,
            bridge: default_integration_bridge(),
        }
    }

    /// Check that the VLAN fields agree with each other.
    pub fn validate(&self) -> Result<()> {
        match (self.should_provide_vlan, self.vlan) {
            (true, None) => Err(VifPlugError::InvalidNetwork(format!(
                "network {} should provide a VLAN but has no tag",
                self.id
            ))),
            (_, Some(tag)) if tag == 0 || tag > 4094 => Err(VifPlugError::InvalidNetwork(
                format!("network {} has VLAN tag {} outside 1..=4094", self.id, tag),
            )),
            _ => Ok(()),
        }
    }
}

/// Port profile attached to a VIF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PortProfile {
    /// Port managed by Open vSwitch
    #[serde(rename = "openvswitch")]
    OpenVSwitch {
        /// OVS external-id correlating the port to the VIF
        interface_id: String,
    },
    /// IEEE 802.1Qbg (VEPA) port
    #[serde(rename = "8021qbg")]
    Ieee8021Qbg {
        manager_id: u32,
        type_id: u32,
        type_id_version: u32,
        instance_id: String,
    },
    /// IEEE 802.1Qbh port
    #[serde(rename = "8021qbh")]
    Ieee8021Qbh { profile_id: String },
}

impl PortProfile {
    /// Stable type name used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            PortProfile::OpenVSwitch { .. } => "VIFPortProfileOpenVSwitch",
            PortProfile::Ieee8021Qbg { .. } => "VIFPortProfile8021Qbg",
            PortProfile::Ieee8021Qbh { .. } => "VIFPortProfile8021Qbh",
        }
    }
}

/// Owning instance of a VIF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceInfo {
    /// Instance UUID
    pub uuid: Uuid,
    /// Instance display name
    #[serde(default)]
    pub name: String,
}

impl InstanceInfo {
    pub fn new(uuid: Uuid, name: impl Into<String>) -> Self {
        Self {
            uuid,
            name: name.into(),
        }
    }
}

/// A VIF object type and version range a plugin supports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginVifInfo {
    /// VIF object type name (e.g., "VIFBridge")
    pub vif_object_name: String,
    /// Minimum supported object version
    pub min_version: String,
    /// Maximum supported object version
    pub max_version: String,
}

/// What a plugin reports from `describe()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginInfo {
    pub vif_info: Vec<PluginVifInfo>,
}

impl PluginInfo {
    /// Info for a plugin that only handles `VIFBridge` 1.0.
    pub fn vif_bridge_v1() -> Self {
        Self {
            vif_info: vec![PluginVifInfo {
                vif_object_name: "VIFBridge".to_string(),
                min_version: "1.0".to_string(),
                max_version: "1.0".to_string(),
            }],
        }
    }
}
