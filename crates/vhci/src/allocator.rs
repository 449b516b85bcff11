//! Free port selection
//!
//! vhci_hcd splits its ports between a USB 2.0 and a USB 3.0 root hub.
//! A device can only be attached to a port on the hub matching its speed,
//! so allocation never falls back to the other tier.

use crate::table::PortTable;
use crate::types::DeviceSpeed;

/// First free port, in ascending order, on the hub tier `speed` requires
///
/// Read-only: the caller still has to attach and refresh, and nothing
/// stops a concurrent caller from picking the same port in between.
pub fn find_free_port(table: &PortTable, speed: DeviceSpeed) -> Option<u16> {
    let hub = speed.hub_class();

    table
        .iter()
        .find(|record| record.hub == hub && record.is_free())
        .map(|record| record.port)
}
