//! Host device naming.

/// Longest device name the strategies will generate.
pub const NIC_NAME_LEN: usize = 14;

/// Prefix of the Linux-bridge-side veth end.
pub const VETH_BRIDGE_PREFIX: &str = "qvb";

/// Prefix of the OVS-side veth end.
pub const VETH_OVS_PREFIX: &str = "qvo";

/// The two ends of the veth pair wiring a per-VIF bridge to OVS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VethPair {
    /// End enslaved to the per-VIF Linux bridge
    pub bridge_side: String,
    /// End registered as an OVS port
    pub ovs_side: String,
}

/// Prefix `id` and cut the result to [`NIC_NAME_LEN`] characters.
pub fn device_name(prefix: &str, id: &str) -> String {
    prefix.chars().chain(id.chars()).take(NIC_NAME_LEN).collect()
}

/// Veth pair names for a VIF id.
pub fn veth_pair_names(vif_id: &str) -> VethPair {
    VethPair {
        bridge_side: device_name(VETH_BRIDGE_PREFIX, vif_id),
        ovs_side: device_name(VETH_OVS_PREFIX, vif_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_veth_pair_names() {
        let pair = veth_pair_names("1234567890");
        assert_eq!(pair.bridge_side, "qvb1234567890");
        assert_eq!(pair.ovs_side, "qvo1234567890");

        let pair = veth_pair_names("f6a1c2d4-9b7e-4a31-8c55-0e1d2f3a4b5c");
        assert_eq!(pair.bridge_side, "qvbf6a1c2d4-9b");
        assert_eq!(pair.ovs_side, "qvof6a1c2d4-9b");
    }

    #[test]
    fn test_names_fit_and_differ() {
        let ids = [
            "",
            "1",
            "12345678901",
            "123456789012345678901234567890",
            "näme-with-ünicode-chars",
            "f6a1c2d4-9b7e-4a31-8c55-0e1d2f3a4b5c",
        ];
        for id in ids {
            let pair = veth_pair_names(id);
            assert!(pair.bridge_side.chars().count() <= NIC_NAME_LEN, "{}", id);
            assert!(pair.ovs_side.chars().count() <= NIC_NAME_LEN, "{}", id);
            assert_ne!(pair.bridge_side, pair.ovs_side);
            assert_eq!(pair, veth_pair_names(id));
        }
    }
}
