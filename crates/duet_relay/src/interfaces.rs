//! Startup diagnostics: which local IPv4 addresses clients can dial.

use std::net::Ipv4Addr;

use network_interface::{Addr, NetworkInterface, NetworkInterfaceConfig};
use tracing::info;

use crate::error::RelayError;

/// All IPv4 addresses assigned to local interfaces, sorted and deduplicated.
pub fn local_ipv4_addresses() -> Result<Vec<Ipv4Addr>, RelayError> {
    let interfaces =
        NetworkInterface::show().map_err(|e| RelayError::Interfaces(e.to_string()))?;

    let mut addrs: Vec<Ipv4Addr> = interfaces
        .iter()
        .flat_map(|iface| iface.addr.iter())
        .filter_map(|addr| match addr {
            Addr::V4(v4) => Some(v4.ip),
            Addr::V6(_) => None,
        })
        .collect();
    addrs.sort();
    addrs.dedup();
    Ok(addrs)
}

/// Log every local IPv4 address.
pub fn log_local_addresses() -> Result<(), RelayError> {
    for ip in local_ipv4_addresses()? {
        info!("- IP address: {ip}");
    }
    Ok(())
}
