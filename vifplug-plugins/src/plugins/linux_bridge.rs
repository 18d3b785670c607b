//! Plain Linux bridge strategy.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::config::LinuxBridgeConfig;
use crate::driver::NetworkDeviceDriver;
use crate::error::{ConfigError, Result, VifPlugError};
use crate::traits::VifPlugin;
use crate::types::{InstanceInfo, PluginInfo, Vif};

/// Ensures the shared bridge a VIF plugs into exists.
///
/// Only single-host networks this host is told to provide a bridge for get
/// one. The bridge is shared by every VIF on the network, so unplug never
/// removes it.
pub struct LinuxBridgePlugin {
    driver: Arc<dyn NetworkDeviceDriver>,
    config: LinuxBridgeConfig,
}

impl LinuxBridgePlugin {
    /// Create the plugin, validating the configuration.
    pub fn new(
        driver: Arc<dyn NetworkDeviceDriver>,
        config: LinuxBridgeConfig,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { driver, config })
    }

    pub fn config(&self) -> &LinuxBridgeConfig {
        &self.config
    }
}

#[async_trait]
impl VifPlugin for LinuxBridgePlugin {
    fn describe(&self) -> PluginInfo {
        PluginInfo::vif_bridge_v1()
    }

    #[instrument(skip(self, vif, instance), fields(vif_id = %vif.id, bridge = %vif.bridge_name))]
    async fn plug(&self, vif: &Vif, instance: &InstanceInfo) -> Result<()> {
        let network = &vif.network;

        if network.multi_host || !network.should_provide_bridge {
            debug!(
                multi_host = network.multi_host,
                should_provide_bridge = network.should_provide_bridge,
                "Bridge is provided elsewhere"
            );
            return Ok(());
        }

        if network.should_provide_vlan {
            let vlan = network.vlan.ok_or_else(|| {
                VifPlugError::InvalidNetwork(format!(
                    "network {} should provide a VLAN but has no tag",
                    network.id
                ))
            })?;
            let iface = self
                .config
                .vlan_interface
                .as_deref()
                .or(network.bridge_interface.as_deref())
                .ok_or_else(|| {
                    VifPlugError::InvalidNetwork(format!(
                        "network {} has no interface to carry VLAN {}",
                        network.id, vlan
                    ))
                })?;

            let vlan_iface = self
                .driver
                .ensure_vlan_bridge(vlan, &vif.bridge_name, iface, self.config.network_device_mtu)
                .await?;

            info!(
                vlan = vlan,
                interface = %vlan_iface,
                instance = %instance.uuid,
                "VLAN bridge ready"
            );
        } else {
            let iface = self
                .config
                .flat_interface
                .as_deref()
                .or(network.bridge_interface.as_deref());

            self.driver.ensure_bridge(&vif.bridge_name, iface).await?;

            info!(interface = ?iface, instance = %instance.uuid, "Flat bridge ready");
        }

        Ok(())
    }

    async fn unplug(&self, vif: &Vif, _instance: &InstanceInfo) -> Result<()> {
        // Shared bridge outlives any single VIF.
        debug!(vif_id = %vif.id, bridge = %vif.bridge_name, "Nothing to unplug");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{DriverCall, MockDeviceDriver};
    use crate::types::Network;
    use uuid::Uuid;

    fn instance() -> InstanceInfo {
        InstanceInfo::new(Uuid::new_v4(), "test-vm")
    }

    fn provided_network() -> Network {
        let mut network = Network::new("net-1");
        network.should_provide_bridge = true;
        network.bridge_interface = Some("eth0".to_string());
        network
    }

    fn plugin(driver: &Arc<MockDeviceDriver>, config: LinuxBridgeConfig) -> LinuxBridgePlugin {
        LinuxBridgePlugin::new(driver.clone(), config).unwrap()
    }

    #[tokio::test]
    async fn test_multi_host_is_noop() {
        let driver = Arc::new(MockDeviceDriver::with_devices(["eth0"]));
        let plugin = plugin(&driver, LinuxBridgeConfig::default());

        for should_provide_bridge in [true, false] {
            let mut network = provided_network();
            network.multi_host = true;
            network.should_provide_bridge = should_provide_bridge;
            let vif = Vif::new("vif-1", "fa:16:3e:00:00:01", "br100", network);

            plugin.plug(&vif, &instance()).await.unwrap();
        }

        assert!(driver.calls().is_empty());
    }

    #[tokio::test]
    async fn test_not_provided_is_noop() {
        let driver = Arc::new(MockDeviceDriver::with_devices(["eth0"]));
        let plugin = plugin(&driver, LinuxBridgeConfig::default());

        let mut network = provided_network();
        network.should_provide_bridge = false;
        let vif = Vif::new("vif-1", "fa:16:3e:00:00:01", "br100", network);

        plugin.plug(&vif, &instance()).await.unwrap();
        assert!(driver.calls().is_empty());
    }

    #[tokio::test]
    async fn test_flat_bridge() {
        let driver = Arc::new(MockDeviceDriver::with_devices(["eth0"]));
        let plugin = plugin(&driver, LinuxBridgeConfig::default());
        let vif = Vif::new("vif-1", "fa:16:3e:00:00:01", "br100", provided_network());

        plugin.plug(&vif, &instance()).await.unwrap();

        assert_eq!(
            driver.calls(),
            vec![DriverCall::EnsureBridge {
                bridge: "br100".to_string(),
                interface: Some("eth0".to_string()),
            }]
        );
        assert_eq!(driver.master_of("eth0").as_deref(), Some("br100"));
    }

    #[tokio::test]
    async fn test_flat_interface_override() {
        let driver = Arc::new(MockDeviceDriver::with_devices(["eth0", "eth2"]));
        let config = LinuxBridgeConfig {
            flat_interface: Some("eth2".to_string()),
            vlan_interface: Some("eth3".to_string()),
            ..Default::default()
        };
        let plugin = plugin(&driver, config);
        let vif = Vif::new("vif-1", "fa:16:3e:00:00:01", "br100", provided_network());

        plugin.plug(&vif, &instance()).await.unwrap();

        assert_eq!(
            driver.calls(),
            vec![DriverCall::EnsureBridge {
                bridge: "br100".to_string(),
                interface: Some("eth2".to_string()),
            }]
        );
    }

    #[tokio::test]
    async fn test_flat_bridge_without_uplink() {
        let driver = Arc::new(MockDeviceDriver::new());
        let plugin = plugin(&driver, LinuxBridgeConfig::default());

        let mut network = provided_network();
        network.bridge_interface = None;
        let vif = Vif::new("vif-1", "fa:16:3e:00:00:01", "br100", network);

        plugin.plug(&vif, &instance()).await.unwrap();
        assert!(driver.has_device("br100"));
    }

    #[tokio::test]
    async fn test_vlan_bridge() {
        let driver = Arc::new(MockDeviceDriver::with_devices(["eth0", "eth1"]));
        let config = LinuxBridgeConfig {
            network_device_mtu: 9000,
            vlan_interface: Some("eth1".to_string()),
            ..Default::default()
        };
        let plugin = plugin(&driver, config);

        let mut network = provided_network();
        network.should_provide_vlan = true;
        network.vlan = Some(101);
        let vif = Vif::new("vif-1", "fa:16:3e:00:00:01", "br101", network);

        plugin.plug(&vif, &instance()).await.unwrap();

        assert_eq!(
            driver.calls(),
            vec![DriverCall::EnsureVlanBridge {
                vlan: 101,
                bridge: "br101".to_string(),
                interface: "eth1".to_string(),
                mtu: 9000,
            }]
        );
    }

    #[tokio::test]
    async fn test_vlan_without_tag_fails_before_driver() {
        let driver = Arc::new(MockDeviceDriver::with_devices(["eth0"]));
        let plugin = plugin(&driver, LinuxBridgeConfig::default());

        let mut network = provided_network();
        network.should_provide_vlan = true;
        let vif = Vif::new("vif-1", "fa:16:3e:00:00:01", "br101", network);

        let result = plugin.plug(&vif, &instance()).await;
        assert!(matches!(result, Err(VifPlugError::InvalidNetwork(_))));
        assert!(driver.calls().is_empty());
    }

    #[tokio::test]
    async fn test_vlan_without_parent_fails_before_driver() {
        let driver = Arc::new(MockDeviceDriver::with_devices(["eth0"]));
        let plugin = plugin(&driver, LinuxBridgeConfig::default());

        let mut network = provided_network();
        network.should_provide_vlan = true;
        network.vlan = Some(101);
        network.bridge_interface = None;
        let vif = Vif::new("vif-1", "fa:16:3e:00:00:01", "br101", network);

        let result = plugin.plug(&vif, &instance()).await;
        match result {
            Err(VifPlugError::InvalidNetwork(msg)) => assert!(msg.contains("VLAN 101")),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(driver.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unplug_is_noop() {
        let driver = Arc::new(MockDeviceDriver::with_devices(["eth0"]));
        let plugin = plugin(&driver, LinuxBridgeConfig::default());
        let vif = Vif::new("vif-1", "fa:16:3e:00:00:01", "br100", provided_network());

        plugin.plug(&vif, &instance()).await.unwrap();
        driver.clear_calls();
        plugin.unplug(&vif, &instance()).await.unwrap();

        assert!(driver.calls().is_empty());
        assert!(driver.has_device("br100"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let driver = Arc::new(MockDeviceDriver::new());
        let config = LinuxBridgeConfig {
            network_device_mtu: 0,
            ..Default::default()
        };
        assert!(LinuxBridgePlugin::new(driver, config).is_err());
    }
}
