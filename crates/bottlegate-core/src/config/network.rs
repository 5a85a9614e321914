//! IP to MAC resolution configuration.

use serde::{Deserialize, Serialize};

/// Where the system MAC resolver looks for link-layer addresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// dnsmasq lease files, checked in order.
    #[serde(default = "default_lease_files")]
    pub lease_files: Vec<String>,
    /// Kernel ARP table.
    #[serde(default = "default_arp_table")]
    pub arp_table: String,
    /// Whether to fall back to running the `arp` command.
    #[serde(default = "default_true")]
    pub use_arp_command: bool,
    /// The `arp` executable.
    #[serde(default = "default_arp_command")]
    pub arp_command: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            lease_files: default_lease_files(),
            arp_table: default_arp_table(),
            use_arp_command: true,
            arp_command: default_arp_command(),
        }
    }
}

fn default_lease_files() -> Vec<String> {
    vec![
        "/var/lib/misc/dnsmasq.leases".to_string(),
        "/var/lib/dnsmasq/dnsmasq.leases".to_string(),
    ]
}

fn default_arp_table() -> String {
    "/proc/net/arp".to_string()
}

fn default_arp_command() -> String {
    "arp".to_string()
}

fn default_true() -> bool {
    true
}
