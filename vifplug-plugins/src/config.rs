//! Strategy configuration.
//!
//! Each strategy takes its own config struct at construction time. Both
//! deserialize from YAML with every field optional.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigError;

/// Default MTU applied to devices the strategies create.
pub const DEFAULT_NETWORK_DEVICE_MTU: u32 = 1500;

/// Default timeout passed to `ovs-vsctl`, in seconds.
pub const DEFAULT_OVS_VSCTL_TIMEOUT_SECS: u64 = 120;

/// Longest accepted `ovs-vsctl` timeout, in seconds.
pub const MAX_OVS_VSCTL_TIMEOUT_SECS: u64 = 3600;

const MIN_MTU: u32 = 68;
const MAX_MTU: u32 = 65535;

fn validate_mtu(mtu: u32) -> Result<(), ConfigError> {
    if !(MIN_MTU..=MAX_MTU).contains(&mtu) {
        return Err(ConfigError::InvalidValue {
            field: "network_device_mtu".to_string(),
            message: format!("must be between {} and {}", MIN_MTU, MAX_MTU),
        });
    }
    Ok(())
}

fn validate_interface(field: &str, name: &Option<String>) -> Result<(), ConfigError> {
    if let Some(name) = name {
        if name.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: field.to_string(),
                message: "must not be empty when set".to_string(),
            });
        }
    }
    Ok(())
}

/// Linux bridge strategy configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinuxBridgeConfig {
    /// MTU for VLAN sub-interfaces
    pub network_device_mtu: u32,
    /// Parent interface override for VLAN networks
    pub vlan_interface: Option<String>,
    /// Parent interface override for flat networks
    pub flat_interface: Option<String>,
}

impl Default for LinuxBridgeConfig {
    fn default() -> Self {
        Self {
            network_device_mtu: DEFAULT_NETWORK_DEVICE_MTU,
            vlan_interface: None,
            flat_interface: None,
        }
    }
}

impl LinuxBridgeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_mtu(self.network_device_mtu)?;
        validate_interface("vlan_interface", &self.vlan_interface)?;
        validate_interface("flat_interface", &self.flat_interface)?;
        Ok(())
    }
}

/// OVS hybrid strategy configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OvsHybridConfig {
    /// MTU for the veth pair
    pub network_device_mtu: u32,
    /// Timeout for ovs-vsctl calls in seconds
    pub ovs_vsctl_timeout_secs: u64,
}

impl Default for OvsHybridConfig {
    fn default() -> Self {
        Self {
            network_device_mtu: DEFAULT_NETWORK_DEVICE_MTU,
            ovs_vsctl_timeout_secs: DEFAULT_OVS_VSCTL_TIMEOUT_SECS,
        }
    }
}

impl OvsHybridConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_mtu(self.network_device_mtu)?;

        if self.ovs_vsctl_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ovs_vsctl_timeout_secs".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }
        if self.ovs_vsctl_timeout_secs > MAX_OVS_VSCTL_TIMEOUT_SECS {
            return Err(ConfigError::InvalidValue {
                field: "ovs_vsctl_timeout_secs".to_string(),
                message: format!("must be at most {}", MAX_OVS_VSCTL_TIMEOUT_SECS),
            });
        }

        Ok(())
    }

    pub fn ovs_vsctl_timeout(&self) -> Duration {
        Duration::from_secs(self.ovs_vsctl_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let lb = LinuxBridgeConfig::default();
        assert_eq!(lb.network_device_mtu, 1500);
        assert!(lb.validate().is_ok());

        let hybrid = OvsHybridConfig::default();
        assert_eq!(hybrid.ovs_vsctl_timeout(), Duration::from_secs(120));
        assert!(hybrid.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: LinuxBridgeConfig = serde_yaml::from_str("vlan_interface: eth1").unwrap();
        assert_eq!(config.vlan_interface.as_deref(), Some("eth1"));
        assert_eq!(config.network_device_mtu, DEFAULT_NETWORK_DEVICE_MTU);
        assert!(config.flat_interface.is_none());
    }

    #[test]
    fn test_invalid_values() {
        let config = OvsHybridConfig {
            network_device_mtu: 9000,
            ovs_vsctl_timeout_secs: 0,
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "ovs_vsctl_timeout_secs".to_string(),
                message: "must be greater than 0".to_string(),
            })
        );

        let config = OvsHybridConfig {
            ovs_vsctl_timeout_secs: u64::MAX,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "ovs_vsctl_timeout_secs".to_string(),
                message: "must be at most 3600".to_string(),
            })
        );
        let config = OvsHybridConfig {
            ovs_vsctl_timeout_secs: MAX_OVS_VSCTL_TIMEOUT_SECS,
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        let config = LinuxBridgeConfig {
            network_device_mtu: 40,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = LinuxBridgeConfig {
            flat_interface: Some(String::new()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
