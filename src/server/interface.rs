//! Network interface lookup
//!
//! The advertised streaming host is the first IPv4 address of a named
//! interface, so renderers on that link can reach the resource URLs.

use std::net::Ipv4Addr;

use network_interface::{Addr, NetworkInterface, NetworkInterfaceConfig};

/// Error type for interface lookup
#[derive(Debug)]
pub enum InterfaceError {
    /// Interfaces could not be enumerated
    Enumerate(String),
    /// No interface with this name
    NotFound(String),
    /// The interface exists but has no IPv4 address
    NoIpv4(String),
}

impl std::fmt::Display for InterfaceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InterfaceError::Enumerate(e) => write!(f, "Failed to list network interfaces: {}", e),
            InterfaceError::NotFound(name) => write!(f, "No such network interface: {}", name),
            InterfaceError::NoIpv4(name) => write!(f, "Interface {} has no IPv4 address", name),
        }
    }
}

impl std::error::Error for InterfaceError {}

/// Resolve the IPv4 address of a network interface
pub fn interface_ipv4(name: &str) -> Result<Ipv4Addr, InterfaceError> {
    let interfaces = NetworkInterface::show().map_err(|e| InterfaceError::Enumerate(e.to_string()))?;

    // Some platforms list one entry per address, so gather every match
    let mut found = false;
    for interface in interfaces.iter().filter(|iface| iface.name == name) {
        found = true;
        for addr in &interface.addr {
            if let Addr::V4(v4) = addr {
                return Ok(v4.ip);
            }
        }
    }

    if found {
        Err(InterfaceError::NoIpv4(name.to_string()))
    } else {
        Err(InterfaceError::NotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_interface() {
        let err = interface_ipv4("no-such-iface0").unwrap_err();
        assert!(matches!(err, InterfaceError::NotFound(_)));
        assert_eq!(err.to_string(), "No such network interface: no-such-iface0");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_loopback() {
        assert_eq!(interface_ipv4("lo").unwrap(), Ipv4Addr::LOCALHOST);
    }
}
