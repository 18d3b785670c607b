//! VIF plugin trait.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{InstanceInfo, PluginInfo, Vif};

/// A strategy for wiring a VIF into the host network.
///
/// `plug` and `unplug` are called once per attach/detach event. Both must
/// converge from whatever partial state a previous failed call left behind,
/// so a failed call is recovered by calling it again.
#[async_trait]
pub trait VifPlugin: Send + Sync {
    /// VIF object types and versions this plugin handles.
    fn describe(&self) -> PluginInfo;

    /// Create whatever host devices the VIF needs.
    async fn plug(&self, vif: &Vif, instance: &InstanceInfo) -> Result<()>;

    /// Remove the host devices `plug` created.
    async fn unplug(&self, vif: &Vif, instance: &InstanceInfo) -> Result<()>;
}
