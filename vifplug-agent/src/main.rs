//! # vifplug
//!
//! Operator CLI that plugs and unplugs VM network interfaces on this host
//! using the Linux bridge or OVS hybrid strategy.
//!
//! ## Usage
//! ```bash
//! vifplug describe --plugin ovs-hybrid
//! vifplug plug --plugin ovs-hybrid --vif vif.yaml --instance-uuid <uuid>
//! vifplug unplug --plugin ovs-hybrid --vif vif.yaml --instance-uuid <uuid>
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{debug, info};
use vifplug_plugins::{
    InstanceInfo, LinuxBridgePlugin, LinuxDeviceDriver, MockDeviceDriver, NetworkDeviceDriver,
    OvsHybridPlugin, Vif, VifPlugin,
};

mod cli;
mod config;
mod descriptor;

use cli::{Args, Command, PluginKind, VifArgs};
use config::{Config, LogFormat};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::resolve(&args)?.with_cli_overrides(&args);
    config.validate()?;

    match config.logging.format {
        LogFormat::Pretty => vifplug_common::init_logging(&config.logging.level)?,
        LogFormat::Json => vifplug_common::init_logging_json(&config.logging.level)?,
    }

    debug!(version = env!("CARGO_PKG_VERSION"), dev = args.dev, "Starting vifplug");

    match &args.command {
        Command::Describe { plugin } => {
            let driver: Arc<dyn NetworkDeviceDriver> = Arc::new(MockDeviceDriver::new());
            let plugin = build_plugin(*plugin, driver, &config)?;
            println!("{}", serde_json::to_string_pretty(&plugin.describe())?);
        }
        Command::Plug(vif_args) => {
            let (plugin, vif, instance) = prepare(&args, vif_args, &config)?;
            plugin
                .plug(&vif, &instance)
                .await
                .with_context(|| format!("Failed to plug VIF {}", vif.id))?;
            info!(
                vif_id = %vif.id,
                vif_name = vif.vif_name.as_deref().unwrap_or("-"),
                bound_plugin = vif.plugin.as_deref().unwrap_or("-"),
                instance = %instance.uuid,
                "VIF plugged"
            );
        }
        Command::Unplug(vif_args) => {
            let (plugin, vif, instance) = prepare(&args, vif_args, &config)?;
            plugin
                .unplug(&vif, &instance)
                .await
                .with_context(|| format!("Failed to unplug VIF {}", vif.id))?;
            info!(
                vif_id = %vif.id,
                vif_name = vif.vif_name.as_deref().unwrap_or("-"),
                bound_plugin = vif.plugin.as_deref().unwrap_or("-"),
                instance = %instance.uuid,
                "VIF unplugged"
            );
        }
    }

    Ok(())
}

/// Load the VIF, pick a driver and build the requested plugin.
fn prepare(
    args: &Args,
    vif_args: &VifArgs,
    config: &Config,
) -> Result<(Box<dyn VifPlugin>, Vif, InstanceInfo)> {
    let vif = descriptor::load_vif(&vif_args.vif)?;
    let instance = InstanceInfo::new(vif_args.instance_uuid, vif_args.instance_name.clone());

    let driver: Arc<dyn NetworkDeviceDriver> = if args.dev {
        Arc::new(dev_driver(&vif, config))
    } else {
        Arc::new(LinuxDeviceDriver::new())
    };

    let plugin = build_plugin(vif_args.plugin, driver, config)?;
    Ok((plugin, vif, instance))
}

fn build_plugin(
    kind: PluginKind,
    driver: Arc<dyn NetworkDeviceDriver>,
    config: &Config,
) -> Result<Box<dyn VifPlugin>> {
    let plugin: Box<dyn VifPlugin> = match kind {
        PluginKind::LinuxBridge => Box::new(
            LinuxBridgePlugin::new(driver, config.linux_bridge.clone())
                .context("Invalid linux_bridge configuration")?,
        ),
        PluginKind::OvsHybrid => Box::new(
            OvsHybridPlugin::new(driver, config.ovs_hybrid.clone())
                .context("Invalid ovs_hybrid configuration")?,
        ),
    };
    Ok(plugin)
}

/// Mock driver pre-seeded with every uplink the VIF could need.
fn dev_driver(vif: &Vif, config: &Config) -> MockDeviceDriver {
    let uplinks = [
        vif.network.bridge_interface.as_ref(),
        config.linux_bridge.vlan_interface.as_ref(),
        config.linux_bridge.flat_interface.as_ref(),
    ];
    let driver = MockDeviceDriver::with_devices(uplinks.into_iter().flatten().cloned());
    driver.add_ovs_bridge(&vif.network.bridge);
    driver
}
