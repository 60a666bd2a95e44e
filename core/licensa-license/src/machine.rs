//! Machine identity for license binding.
//!
//! A license may be bound to MAC addresses and/or host names. The resolver
//! reports one node-wide MAC address: hosts with several network interfaces
//! are matched on that single address only.

use serde::{Deserialize, Serialize};

use crate::error::{LicenseError, LicenseResult};

/// Local facts a license binding is checked against.
pub trait MachineIdentity {
    /// Primary hardware address as lowercase `aa:bb:cc:dd:ee:ff`.
    fn primary_mac(&self) -> LicenseResult<String>;

    /// Configured host name, lowercased.
    fn hostname(&self) -> LicenseResult<String>;
}

/// Reads identity from the running system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemIdentity;

impl MachineIdentity for SystemIdentity {
    fn primary_mac(&self) -> LicenseResult<String> {
        get_primary_mac()
            .ok_or_else(|| LicenseError::Environment("no hardware network address found".into()))
    }

    fn hostname(&self) -> LicenseResult<String> {
        let name = hostname::get()
            .map_err(|e| LicenseError::Environment(format!("cannot read host name: {e}")))?;
        name.into_string()
            .map(|h| h.to_lowercase())
            .map_err(|_| LicenseError::Environment("host name is not valid UTF-8".into()))
    }
}

/// Identity with fixed values, for tests and for checking a license
/// against a machine other than the one running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticIdentity {
    /// Reported MAC address, lowercased on read.
    pub mac: String,
    /// Reported host name, lowercased on read.
    pub host: String,
}

impl StaticIdentity {
    /// Creates an identity reporting `mac` and `host`.
    pub fn new(mac: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            mac: mac.into(),
            host: host.into(),
        }
    }
}

impl MachineIdentity for StaticIdentity {
    fn primary_mac(&self) -> LicenseResult<String> {
        Ok(self.mac.to_lowercase())
    }

    fn hostname(&self) -> LicenseResult<String> {
        Ok(self.host.to_lowercase())
    }
}

/// The values an issuer needs to bind a license to this machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineFingerprint {
    /// Primary MAC address.
    pub mac: String,
    /// Host name.
    pub hostname: String,
}

impl MachineFingerprint {
    /// Collects both identity values.
    pub fn collect(identity: &dyn MachineIdentity) -> LicenseResult<Self> {
        Ok(Self {
            mac: identity.primary_mac()?,
            hostname: identity.hostname()?,
        })
    }
}

/// Normalizes a MAC address to lowercase, colon-separated form.
///
/// Accepts `:` or `-` separators. Returns `None` unless the input is six
/// two-digit hex octets.
#[must_use]
pub fn normalize_mac(raw: &str) -> Option<String> {
    let octets: Vec<&str> = raw.trim().split([':', '-']).collect();
    if octets.len() != 6
        || !octets
            .iter()
            .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()))
    {
        return None;
    }
    Some(octets.join(":").to_lowercase())
}

fn usable(mac: &str) -> bool {
    mac != "00:00:00:00:00:00"
}

/// Bit 1 of the first octet marks a locally administered (random or
/// software-assigned) address.
fn locally_administered(mac: &str) -> bool {
    u8::from_str_radix(&mac[..2], 16).is_ok_and(|octet| octet & 0x02 != 0)
}

#[cfg(target_os = "linux")]
const SYSFS_NET: &str = "/sys/class/net";

/// Picks the most stable address under a sysfs `class/net` directory.
///
/// Interfaces backed by a device (a `device` link) rank above virtual ones
/// such as bridges, bonds and veths; within each group universally
/// administered addresses rank above locally administered ones. Ties go to
/// the first interface in name order.
#[cfg(any(target_os = "linux", test))]
fn primary_mac_in(root: &std::path::Path) -> Option<String> {
    let mut entries: Vec<_> = std::fs::read_dir(root)
        .ok()?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .collect();
    entries.sort();
    entries
        .iter()
        .filter_map(|dir| {
            let mac = normalize_mac(&std::fs::read_to_string(dir.join("address")).ok()?)?;
            let virtual_if = !dir.join("device").exists();
            Some(((virtual_if, locally_administered(&mac)), mac))
        })
        .filter(|(_, mac)| usable(mac))
        .min_by_key(|(rank, _)| *rank)
        .map(|(_, mac)| mac)
}

/// Most stable usable hardware address, platform-specific.
fn get_primary_mac() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        primary_mac_in(std::path::Path::new(SYSFS_NET))
    }

    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("ifconfig")
            .output()
            .ok()
            .and_then(|o| String::from_utf8(o.stdout).ok())
            .and_then(|output| {
                output
                    .lines()
                    .filter_map(|l| l.trim().strip_prefix("ether "))
                    .filter_map(normalize_mac)
                    .filter(|mac| usable(mac))
                    .min_by_key(|mac| locally_administered(mac))
            })
    }

    #[cfg(target_os = "windows")]
    {
        // `getmac /fo csv /nh` prints "AA-BB-CC-DD-EE-FF","\Device\..." per adapter
        std::process::Command::new("getmac")
            .args(["/fo", "csv", "/nh"])
            .output()
            .ok()
            .and_then(|o| String::from_utf8(o.stdout).ok())
            .and_then(|output| {
                output
                    .lines()
                    .filter_map(|l| l.split(',').next())
                    .filter_map(|field| normalize_mac(field.trim_matches('"')))
                    .filter(|mac| usable(mac))
                    .min_by_key(|mac| locally_administered(mac))
            })
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
    {
        None
    }
}
