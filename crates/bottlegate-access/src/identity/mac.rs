//! MAC lookup from the host's DHCP leases and ARP table.

use std::net::IpAddr;
use std::process::Stdio;

use async_trait::async_trait;
use tracing::{debug, trace};

use bottlegate_core::config::NetworkConfig;
use bottlegate_core::traits::MacResolver;

/// Address reported for incomplete ARP entries.
const ZERO_MAC: &str = "00:00:00:00:00:00";

/// Resolves client addresses on the portal host.
///
/// Sources, in order: dnsmasq lease files, the kernel ARP table, and the
/// output of `arp -n` / `arp -a`. Every failure is treated as "not found".
#[derive(Debug, Clone)]
pub struct SystemMacResolver {
    config: NetworkConfig,
}

impl SystemMacResolver {
    /// Creates a resolver reading the configured sources.
    pub fn new(config: NetworkConfig) -> Self {
        Self { config }
    }

    async fn from_leases(&self, ip: &str) -> Option<String> {
        for path in &self.config.lease_files {
            match tokio::fs::read_to_string(path).await {
                Ok(content) => {
                    if let Some(mac) = mac_from_leases(&content, ip) {
                        return Some(mac);
                    }
                }
                Err(e) => trace!(path = %path, error = %e, "Lease file not readable"),
            }
        }
        None
    }

    async fn from_arp_table(&self, ip: &str) -> Option<String> {
        match tokio::fs::read_to_string(&self.config.arp_table).await {
            Ok(content) => mac_from_arp_table(&content, ip),
            Err(e) => {
                trace!(path = %self.config.arp_table, error = %e, "ARP table not readable");
                None
            }
        }
    }

    async fn from_arp_command(&self, ip: &str) -> Option<String> {
        for flag in ["-n", "-a"] {
            let output = tokio::process::Command::new(&self.config.arp_command)
                .arg(flag)
                .arg(ip)
                .stdin(Stdio::null())
                .stderr(Stdio::null())
                .output()
                .await;

            match output {
                Ok(out) if out.status.success() => {
                    if let Some(mac) = extract_mac(&String::from_utf8_lossy(&out.stdout)) {
                        return Some(mac);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    trace!(command = %self.config.arp_command, error = %e, "arp command failed");
                    return None;
                }
            }
        }
        None
    }
}

#[async_trait]
impl MacResolver for SystemMacResolver {
    async fn resolve(&self, ip: &str) -> Option<String> {
        // Only well-formed addresses reach files and subprocesses.
        if ip.parse::<IpAddr>().is_err() {
            debug!(ip = %ip, "Skipping MAC lookup for malformed address");
            return None;
        }

        if let Some(mac) = self.from_leases(ip).await {
            return Some(mac);
        }
        if let Some(mac) = self.from_arp_table(ip).await {
            return Some(mac);
        }
        if self.config.use_arp_command {
            return self.from_arp_command(ip).await;
        }
        None
    }
}

/// Find `ip` in dnsmasq lease lines: `<expiry> <mac> <ip> [<host> ...]`.
pub fn mac_from_leases(content: &str, ip: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let mut parts = line.split_whitespace();
        let _expiry = parts.next()?;
        let mac = parts.next()?;
        let lease_ip = parts.next()?;
        (lease_ip == ip).then(|| normalize_mac(mac)).flatten()
    })
}

/// Find `ip` in `/proc/net/arp`; the MAC is the fourth column.
pub fn mac_from_arp_table(content: &str, ip: &str) -> Option<String> {
    content.lines().skip(1).find_map(|line| {
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            [entry_ip, _, _, mac, ..] if *entry_ip == ip => normalize_mac(mac),
            _ => None,
        }
    })
}

/// Pull the first MAC-looking token out of `arp` command output.
pub fn extract_mac(output: &str) -> Option<String> {
    output
        .split(|c: char| c.is_whitespace() || matches!(c, '(' | ')' | '[' | ']'))
        .find(|token| is_mac_like(token))
        .and_then(normalize_mac)
}

/// Six hex pairs separated by `:` or `-`.
fn is_mac_like(token: &str) -> bool {
    let bytes = token.as_bytes();
    bytes.len() == 17
        && bytes.iter().enumerate().all(|(i, b)| {
            if i % 3 == 2 {
                *b == b':' || *b == b'-'
            } else {
                b.is_ascii_hexdigit()
            }
        })
}

/// Lowercase, colon-separated form; `None` for incomplete entries.
fn normalize_mac(mac: &str) -> Option<String> {
    if !is_mac_like(mac) {
        return None;
    }
    let normalized = mac.to_ascii_lowercase().replace('-', ":");
    (normalized != ZERO_MAC).then_some(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEASES: &str = "\
1718000000 AA:BB:CC:00:11:22 192.168.4.10 phone 01:aa:bb:cc:00:11:22
1718000100 de:ad:be:ef:00:01 192.168.4.11 * *
";

    const ARP_TABLE: &str = "\
IP address       HW type     Flags       HW address            Mask     Device
192.168.4.12     0x1         0x2         66:55:44:33:22:11     *        wlan0
192.168.4.13     0x1         0x0         00:00:00:00:00:00     *        wlan0
";

    #[test]
    fn test_lease_lookup_lowercases() {
        assert_eq!(
            mac_from_leases(LEASES, "192.168.4.10").as_deref(),
            Some("aa:bb:cc:00:11:22")
        );
        assert_eq!(mac_from_leases(LEASES, "192.168.4.99"), None);
    }

    #[test]
    fn test_arp_table_skips_header_and_incomplete() {
        assert_eq!(
            mac_from_arp_table(ARP_TABLE, "192.168.4.12").as_deref(),
            Some("66:55:44:33:22:11")
        );
        assert_eq!(mac_from_arp_table(ARP_TABLE, "192.168.4.13"), None);
        assert_eq!(mac_from_arp_table(ARP_TABLE, "IP"), None);
    }

    #[test]
    fn test_extract_mac_from_command_output() {
        let linux = "? (192.168.4.14) at 0a:1b:2c:3d:4e:5f [ether] on wlan0";
        assert_eq!(extract_mac(linux).as_deref(), Some("0a:1b:2c:3d:4e:5f"));

        let windows = "  192.168.4.15          0A-1B-2C-3D-4E-60     dynamic";
        assert_eq!(extract_mac(windows).as_deref(), Some("0a:1b:2c:3d:4e:60"));

        assert_eq!(extract_mac("192.168.4.16 (192.168.4.16) -- no entry"), None);
    }

    #[tokio::test]
    async fn test_missing_sources_resolve_to_none() {
        let resolver = SystemMacResolver::new(NetworkConfig {
            lease_files: vec!["/nonexistent/dnsmasq.leases".to_string()],
            arp_table: "/nonexistent/arp".to_string(),
            use_arp_command: true,
            arp_command: "/nonexistent/arp-binary".to_string(),
        });

        assert_eq!(resolver.resolve("192.168.4.20").await, None);
        assert_eq!(resolver.resolve("not-an-ip; rm -rf /").await, None);
    }
}
