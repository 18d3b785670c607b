//! Linux network device driver.
//!
//! This module handles:
//! - Bridge, VLAN and veth management via iproute2 (`ip`)
//! - OVS port management via `ovs-vsctl`
//! - Bridge tunables exposed through sysfs
//!
//! The driver assumes it already runs with `CAP_NET_ADMIN`.

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use super::{NetworkDeviceDriver, SysfsWrite};
use crate::error::{DriverError, DriverResult};

/// Default sysfs mount point.
pub const DEFAULT_SYSFS_ROOT: &str = "/sys";

/// Extra time allowed past `ovs-vsctl --timeout` before the child is killed.
const OVS_TIMEOUT_GRACE: Duration = Duration::from_secs(5);

/// Network device driver backed by host tooling.
#[derive(Debug, Clone)]
pub struct LinuxDeviceDriver {
    /// Root of the sysfs tree (default: "/sys")
    sysfs_root: PathBuf,
    /// iproute2 binary
    ip_path: String,
    /// ovs-vsctl binary
    ovs_vsctl_path: String,
}

impl LinuxDeviceDriver {
    /// Create a driver using binaries from `PATH` and the real sysfs.
    pub fn new() -> Self {
        Self {
            sysfs_root: PathBuf::from(DEFAULT_SYSFS_ROOT),
            ip_path: "ip".to_string(),
            ovs_vsctl_path: "ovs-vsctl".to_string(),
        }
    }

    /// Use a different sysfs root.
    pub fn with_sysfs_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.sysfs_root = root.into();
        self
    }

    /// Set the ip binary path.
    pub fn with_ip(mut self, path: impl Into<String>) -> Self {
        self.ip_path = path.into();
        self
    }

    /// Set the ovs-vsctl binary path.
    pub fn with_ovs_vsctl(mut self, path: impl Into<String>) -> Self {
        self.ovs_vsctl_path = path.into();
        self
    }

    fn net_path(&self, device: &str) -> PathBuf {
        self.sysfs_root.join("class/net").join(device)
    }

    /// Name of the bridge `device` is enslaved to, if any.
    async fn master_of(&self, device: &str) -> DriverResult<Option<String>> {
        let link = self.net_path(device).join("master");
        match tokio::fs::read_link(&link).await {
            Ok(target) => Ok(target
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(DriverError::Sysfs {
                path: link.display().to_string(),
                source: e,
            }),
        }
    }

    async fn run(&self, program: &str, args: &[String]) -> DriverResult<String> {
        let command = format!("{} {}", program, args.join(" "));
        debug!(command = %command, "Executing");

        let output = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| DriverError::Spawn {
                command: command.clone(),
                source: e,
            })?;

        if !output.status.success() {
            return Err(DriverError::CommandFailed {
                command,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn ip(&self, args: &[String]) -> DriverResult<String> {
        self.run(&self.ip_path, args).await
    }

    async fn ovs_vsctl(&self, args: &[String], timeout: Duration) -> DriverResult<String> {
        let deadline = timeout.saturating_add(OVS_TIMEOUT_GRACE);
        match tokio::time::timeout(deadline, self.run(&self.ovs_vsctl_path, args)).await {
            Ok(result) => result,
            Err(_) => Err(DriverError::Timeout {
                command: format!("{} {}", self.ovs_vsctl_path, args.join(" ")),
                secs: timeout.as_secs(),
            }),
        }
    }

    async fn delete_net_dev(&self, device: &str) -> DriverResult<()> {
        if self.device_exists(device).await? {
            self.ip(&link_del_args(device)).await?;
            debug!(device = %device, "Net device deleted");
        }
        Ok(())
    }
}

impl Default for LinuxDeviceDriver {
    fn default() -> Self {
        Self::new()
    }
}

fn to_args(args: &[&str]) -> Vec<String> {
    args.iter().map(|a| a.to_string()).collect()
}

/// `ip link set dev <device> <attrs...>`
fn link_set_args(device: &str, attrs: &[&str]) -> Vec<String> {
    let mut args = to_args(&["link", "set", "dev", device]);
    args.extend(attrs.iter().map(|a| a.to_string()));
    args
}

fn link_del_args(device: &str) -> Vec<String> {
    to_args(&["link", "del", "dev", device])
}

fn add_bridge_args(bridge: &str) -> Vec<String> {
    to_args(&["link", "add", "name", bridge, "type", "bridge"])
}

fn bridge_stp_args(bridge: &str, enabled: bool) -> Vec<String> {
    let state = if enabled { "1" } else { "0" };
    link_set_args(bridge, &["type", "bridge", "stp_state", state])
}

fn add_vlan_args(parent: &str, name: &str, vlan: u16) -> Vec<String> {
    let id = vlan.to_string();
    to_args(&["link", "add", "link", parent, "name", name, "type", "vlan", "id", &id])
}

fn add_veth_args(dev1: &str, dev2: &str) -> Vec<String> {
    to_args(&["link", "add", dev1, "type", "veth", "peer", "name", dev2])
}

/// Arguments for a replace-or-add of an OVS port with VIF external-ids.
fn add_port_args(
    bridge: &str,
    port: &str,
    interface_id: &str,
    mac_address: &str,
    instance_id: &str,
    timeout: Duration,
) -> Vec<String> {
    vec![
        format!("--timeout={}", timeout.as_secs()),
        "--".to_string(),
        "--if-exists".to_string(),
        "del-port".to_string(),
        port.to_string(),
        "--".to_string(),
        "add-port".to_string(),
        bridge.to_string(),
        port.to_string(),
        "--".to_string(),
        "set".to_string(),
        "Interface".to_string(),
        port.to_string(),
        format!("external-ids:iface-id={}", interface_id),
        "external-ids:iface-status=active".to_string(),
        format!("external-ids:attached-mac={}", mac_address),
        format!("external-ids:vm-uuid={}", instance_id),
    ]
}

fn del_port_args(bridge: &str, port: &str, timeout: Duration) -> Vec<String> {
    vec![
        format!("--timeout={}", timeout.as_secs()),
        "--".to_string(),
        "--if-exists".to_string(),
        "del-port".to_string(),
        bridge.to_string(),
        port.to_string(),
    ]
}

#[async_trait]
impl NetworkDeviceDriver for LinuxDeviceDriver {
    async fn device_exists(&self, name: &str) -> DriverResult<bool> {
        let path = self.net_path(name);
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| DriverError::Sysfs {
                path: path.display().to_string(),
                source: e,
            })
    }

    #[instrument(skip(self))]
    async fn ensure_bridge(&self, bridge: &str, interface: Option<&str>) -> DriverResult<()> {
        if !self.device_exists(bridge).await? {
            info!(bridge = %bridge, "Creating bridge");
            self.add_bridge(bridge).await?;
            self.set_bridge_stp(bridge, false).await?;
            self.set_link_up(bridge).await?;
        }

        if let Some(iface) = interface {
            if self.master_of(iface).await?.as_deref() != Some(bridge) {
                info!(bridge = %bridge, interface = %iface, "Adding interface to bridge");
                self.add_bridge_port(bridge, iface).await?;
            }
            self.set_link_up(iface).await?;
        }

        Ok(())
    }

    #[instrument(skip(self))]
    async fn ensure_vlan_bridge(
        &self,
        vlan: u16,
        bridge: &str,
        interface: &str,
        mtu: u32,
    ) -> DriverResult<String> {
        let vlan_iface = format!("vlan{}", vlan);

        if !self.device_exists(&vlan_iface).await? {
            info!(vlan = vlan, interface = %vlan_iface, parent = %interface, "Creating VLAN interface");
            self.ip(&add_vlan_args(interface, &vlan_iface, vlan)).await?;
            self.set_link_up(&vlan_iface).await?;
        }
        self.ip(&link_set_args(&vlan_iface, &["mtu", &mtu.to_string()]))
            .await?;

        self.ensure_bridge(bridge, Some(&vlan_iface)).await?;
        Ok(vlan_iface)
    }

    #[instrument(skip(self))]
    async fn create_veth_pair(&self, dev1: &str, dev2: &str, mtu: u32) -> DriverResult<()> {
        for dev in [dev1, dev2] {
            self.delete_net_dev(dev).await?;
        }

        self.ip(&add_veth_args(dev1, dev2)).await?;

        let mtu = mtu.to_string();
        for dev in [dev1, dev2] {
            self.set_link_up(dev).await?;
            self.ip(&link_set_args(dev, &["promisc", "on"])).await?;
            self.ip(&link_set_args(dev, &["mtu", &mtu])).await?;
        }

        info!(dev1 = %dev1, dev2 = %dev2, "Veth pair created");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn create_ovs_port(
        &self,
        bridge: &str,
        port: &str,
        interface_id: &str,
        mac_address: &str,
        instance_id: &str,
        timeout: Duration,
    ) -> DriverResult<()> {
        let args = add_port_args(bridge, port, interface_id, mac_address, instance_id, timeout);
        self.ovs_vsctl(&args, timeout).await?;

        info!(bridge = %bridge, port = %port, iface_id = %interface_id, "OVS port created");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_ovs_port(&self, bridge: &str, port: &str, timeout: Duration) -> DriverResult<()> {
        self.ovs_vsctl(&del_port_args(bridge, port, timeout), timeout)
            .await?;
        // Removing the OVS-side end also removes its veth peer.
        self.delete_net_dev(port).await?;

        debug!(bridge = %bridge, port = %port, "OVS port deleted");
        Ok(())
    }

    async fn add_bridge(&self, bridge: &str) -> DriverResult<()> {
        self.ip(&add_bridge_args(bridge)).await?;
        self.ip(&link_set_args(bridge, &["type", "bridge", "forward_delay", "0"]))
            .await?;
        Ok(())
    }

    async fn delete_bridge(&self, bridge: &str) -> DriverResult<()> {
        self.ip(&link_del_args(bridge)).await?;
        Ok(())
    }

    async fn set_bridge_stp(&self, bridge: &str, enabled: bool) -> DriverResult<()> {
        self.ip(&bridge_stp_args(bridge, enabled)).await?;
        Ok(())
    }

    async fn disable_multicast_snooping(&self, bridge: &str) -> DriverResult<SysfsWrite> {
        let path = self.net_path(bridge).join("bridge/multicast_snooping");

        let file = tokio::fs::OpenOptions::new().write(true).open(&path).await;
        let mut file = match file {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Multicast snooping control not available");
                return Ok(SysfsWrite::Unsupported);
            }
            Err(e) => {
                return Err(DriverError::Sysfs {
                    path: path.display().to_string(),
                    source: e,
                })
            }
        };

        file.write_all(b"0")
            .await
            .map_err(|e| DriverError::Sysfs {
                path: path.display().to_string(),
                source: e,
            })?;

        Ok(SysfsWrite::Applied)
    }

    async fn set_link_up(&self, device: &str) -> DriverResult<()> {
        self.ip(&link_set_args(device, &["up"])).await?;
        Ok(())
    }

    async fn set_link_down(&self, device: &str) -> DriverResult<()> {
        self.ip(&link_set_args(device, &["down"])).await?;
        Ok(())
    }

    async fn add_bridge_port(&self, bridge: &str, device: &str) -> DriverResult<()> {
        self.ip(&link_set_args(device, &["master", bridge])).await?;
        Ok(())
    }

    async fn remove_bridge_port(&self, bridge: &str, device: &str) -> DriverResult<()> {
        if self.master_of(device).await?.as_deref() != Some(bridge) {
            debug!(bridge = %bridge, device = %device, "Device not enslaved to bridge, skipping");
            return Ok(());
        }
        self.ip(&link_set_args(device, &["nomaster"])).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fake_sysfs() -> (tempfile::TempDir, LinuxDeviceDriver) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("class/net")).unwrap();
        let driver = LinuxDeviceDriver::new()
            .with_sysfs_root(dir.path())
            .with_ip("/nonexistent/ip");
        (dir, driver)
    }

    #[test]
    fn test_add_port_args() {
        let args = add_port_args(
            "br-int",
            "qvo1234567890",
            "abc",
            "fa:16:3e:aa:bb:cc",
            "vm-1",
            Duration::from_secs(120),
        );
        assert_eq!(args[0], "--timeout=120");
        assert!(args.contains(&"add-port".to_string()));
        assert!(args.contains(&"external-ids:iface-id=abc".to_string()));
        assert!(args.contains(&"external-ids:attached-mac=fa:16:3e:aa:bb:cc".to_string()));
        assert!(args.contains(&"external-ids:vm-uuid=vm-1".to_string()));
    }

    #[test]
    fn test_del_port_args() {
        let args = del_port_args("br-int", "qvo1", Duration::from_secs(10));
        assert_eq!(
            args,
            vec!["--timeout=10", "--", "--if-exists", "del-port", "br-int", "qvo1"]
        );
    }

    #[test]
    fn test_ip_link_args() {
        assert_eq!(
            add_bridge_args("qbr1"),
            vec!["link", "add", "name", "qbr1", "type", "bridge"]
        );
        assert_eq!(
            bridge_stp_args("qbr1", false),
            vec!["link", "set", "dev", "qbr1", "type", "bridge", "stp_state", "0"]
        );
        assert_eq!(
            bridge_stp_args("qbr1", true).last().map(String::as_str),
            Some("1")
        );
        assert_eq!(
            add_vlan_args("eth1", "vlan101", 101),
            vec!["link", "add", "link", "eth1", "name", "vlan101", "type", "vlan", "id", "101"]
        );
        assert_eq!(
            add_veth_args("qvb1", "qvo1"),
            vec!["link", "add", "qvb1", "type", "veth", "peer", "name", "qvo1"]
        );
        assert_eq!(
            link_set_args("qvb1", &["master", "qbr1"]),
            vec!["link", "set", "dev", "qvb1", "master", "qbr1"]
        );
        assert_eq!(link_set_args("qbr1", &["down"]), vec!["link", "set", "dev", "qbr1", "down"]);
        assert_eq!(link_del_args("qbr1"), vec!["link", "del", "dev", "qbr1"]);
    }

    #[tokio::test]
    async fn test_huge_ovs_timeout_does_not_overflow() {
        let (_dir, driver) = fake_sysfs();
        let driver = driver.with_ovs_vsctl("/nonexistent/ovs-vsctl");

        let result = driver
            .delete_ovs_port("br-int", "qvo1", Duration::from_secs(u64::MAX))
            .await;
        assert!(matches!(result, Err(DriverError::Spawn { .. })));
    }

    #[tokio::test]
    async fn test_device_exists() {
        let (dir, driver) = fake_sysfs();
        assert!(!driver.device_exists("qbr1").await.unwrap());

        fs::create_dir_all(dir.path().join("class/net/qbr1")).unwrap();
        assert!(driver.device_exists("qbr1").await.unwrap());
    }

    #[tokio::test]
    async fn test_multicast_snooping() {
        let (dir, driver) = fake_sysfs();

        // No control file: unsupported, and nothing gets created
        fs::create_dir_all(dir.path().join("class/net/qbr1")).unwrap();
        assert_eq!(
            driver.disable_multicast_snooping("qbr1").await.unwrap(),
            SysfsWrite::Unsupported
        );
        assert!(!dir.path().join("class/net/qbr1/bridge/multicast_snooping").exists());

        let control = dir.path().join("class/net/qbr1/bridge/multicast_snooping");
        fs::create_dir_all(control.parent().unwrap()).unwrap();
        fs::write(&control, "1").unwrap();

        assert_eq!(
            driver.disable_multicast_snooping("qbr1").await.unwrap(),
            SysfsWrite::Applied
        );
        assert_eq!(fs::read_to_string(&control).unwrap(), "0");
    }

    #[tokio::test]
    async fn test_remove_bridge_port_skips_foreign_master() {
        let (dir, driver) = fake_sysfs();
        let net = dir.path().join("class/net");
        fs::create_dir_all(net.join("qbr2")).unwrap();
        fs::create_dir_all(net.join("qvb1")).unwrap();
        std::os::unix::fs::symlink(net.join("qbr2"), net.join("qvb1/master")).unwrap();

        // The ip binary does not exist, so any command would fail.
        driver.remove_bridge_port("qbr1", "qvb1").await.unwrap();
        driver.remove_bridge_port("qbr1", "missing").await.unwrap();

        let result = driver.remove_bridge_port("qbr2", "qvb1").await;
        assert!(matches!(result, Err(DriverError::Spawn { .. })));
    }
}
