//! OVS hybrid strategy.
//!
//! Packet filters can only hook Linux bridge ports, so each VIF gets its own
//! Linux bridge which is chained to the OVS integration bridge through a
//! veth pair:
//!
//! ```text
//!  guest tap ── qbrXXX (Linux bridge) ── qvbXXX ═══ qvoXXX ── br-int (OVS)
//!                                          └─ veth pair ─┘
//! ```

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::ovs_interface_id;
use crate::config::OvsHybridConfig;
use crate::driver::{NetworkDeviceDriver, SysfsWrite};
use crate::error::{ConfigError, Result};
use crate::naming::{self, VethPair};
use crate::traits::VifPlugin;
use crate::types::{InstanceInfo, PluginInfo, Vif};

/// Wires a VIF into OVS through a per-VIF Linux bridge.
pub struct OvsHybridPlugin {
    driver: Arc<dyn NetworkDeviceDriver>,
    config: OvsHybridConfig,
}

impl OvsHybridPlugin {
    /// Create the plugin, validating the configuration.
    pub fn new(
        driver: Arc<dyn NetworkDeviceDriver>,
        config: OvsHybridConfig,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { driver, config })
    }

    pub fn config(&self) -> &OvsHybridConfig {
        &self.config
    }

    /// Veth pair names for a VIF; identical on plug and unplug.
    pub fn veth_pair_names(vif: &Vif) -> VethPair {
        naming::veth_pair_names(&vif.id)
    }
}

#[async_trait]
impl VifPlugin for OvsHybridPlugin {
    fn describe(&self) -> PluginInfo {
        PluginInfo::vif_bridge_v1()
    }

    /// Create the per-VIF bridge and veth pair, then register the OVS end.
    ///
    /// Each stage is skipped when its device already exists, so a retry after
    /// a partial failure only performs what is missing.
    #[instrument(skip(self, vif, instance), fields(vif_id = %vif.id, bridge = %vif.bridge_name))]
    async fn plug(&self, vif: &Vif, instance: &InstanceInfo) -> Result<()> {
        let interface_id = ovs_interface_id(vif)?;
        let VethPair {
            bridge_side: v1,
            ovs_side: v2,
        } = Self::veth_pair_names(vif);
        let bridge = vif.bridge_name.as_str();

        if !self.driver.device_exists(bridge).await? {
            info!("Creating per-VIF bridge");
            self.driver.add_bridge(bridge).await?;
            self.driver.set_bridge_stp(bridge, false).await?;
            match self.driver.disable_multicast_snooping(bridge).await? {
                SysfsWrite::Applied => debug!("Multicast snooping disabled"),
                SysfsWrite::Unsupported => {
                    warn!("Multicast snooping not supported by kernel, leaving it as is")
                }
            }
        }

        if !self.driver.device_exists(&v2).await? {
            info!(v1 = %v1, v2 = %v2, "Creating veth pair");
            self.driver
                .create_veth_pair(&v1, &v2, self.config.network_device_mtu)
                .await?;
            self.driver.set_link_up(bridge).await?;
            self.driver.add_bridge_port(bridge, &v1).await?;
            // Last, so OVS never sees a port whose Linux side is unwired.
            self.driver
                .create_ovs_port(
                    &vif.network.bridge,
                    &v2,
                    interface_id,
                    &vif.address,
                    &instance.uuid.to_string(),
                    self.config.ovs_vsctl_timeout(),
                )
                .await?;
        }

        info!(ovs_bridge = %vif.network.bridge, port = %v2, "VIF plugged");
        Ok(())
    }

    /// Tear down the per-VIF bridge and remove the OVS port.
    #[instrument(skip(self, vif, _instance), fields(vif_id = %vif.id, bridge = %vif.bridge_name))]
    async fn unplug(&self, vif: &Vif, _instance: &InstanceInfo) -> Result<()> {
        ovs_interface_id(vif)?;
        let VethPair {
            bridge_side: v1,
            ovs_side: v2,
        } = Self::veth_pair_names(vif);
        let bridge = vif.bridge_name.as_str();

        if self.driver.device_exists(bridge).await? {
            info!("Removing per-VIF bridge");
            self.driver.remove_bridge_port(bridge, &v1).await?;
            self.driver.set_link_down(bridge).await?;
            self.driver.delete_bridge(bridge).await?;
        }

        // No explicit veth teardown; the driver drops the OVS end with its port.
        self.driver
            .delete_ovs_port(&vif.network.bridge, &v2, self.config.ovs_vsctl_timeout())
            .await?;

        info!(ovs_bridge = %vif.network.bridge, port = %v2, "VIF unplugged");
        Ok(())
    }
}
