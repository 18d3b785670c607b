//! # vifplug Plugins
//!
//! Host-side plugging of guest network interfaces (VIFs).
//!
//! Two strategies are provided:
//! - **Linux bridge** - ensures the shared bridge (flat or VLAN) a VIF
//!   attaches to exists
//! - **OVS hybrid** - per-VIF Linux bridge chained to the OVS integration
//!   bridge through a veth pair, so packet filters can hook the VIF
//!
//! Both are idempotent: they read host state through a
//! [`NetworkDeviceDriver`] before every step and only apply what is missing.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vifplug_plugins::{LinuxDeviceDriver, OvsHybridConfig, OvsHybridPlugin, VifPlugin};
//!
//! #[tokio::main]
//! async fn main() {
//!     let driver = Arc::new(LinuxDeviceDriver::new());
//!     let plugin = OvsHybridPlugin::new(driver, OvsHybridConfig::default()).unwrap();
//!
//!     plugin.plug(&vif, &instance).await.unwrap();
//! }
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod naming;
pub mod plugins;
pub mod traits;
pub mod types;

pub use config::{LinuxBridgeConfig, OvsHybridConfig};
pub use driver::{DriverCall, LinuxDeviceDriver, MockDeviceDriver, NetworkDeviceDriver, SysfsWrite};
pub use error::{ConfigError, DriverError, VifPlugError};
pub use naming::{veth_pair_names, VethPair, NIC_NAME_LEN};
pub use plugins::{LinuxBridgePlugin, OvsHybridPlugin};
pub use traits::VifPlugin;
pub use types::*;
