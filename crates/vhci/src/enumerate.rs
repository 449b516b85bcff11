//! Controller and port discovery

use crate::control::ControlFiles;
use crate::error::{Result, VhciError};
use tracing::debug;

/// Name prefix shared by all VHCI controller instances
pub const CONTROLLER_PREFIX: &str = "vhci_hcd.";

/// Read the total number of ports across all controllers
///
/// The value is parsed as unsigned decimal; a leading `-` or any trailing
/// garbage makes the attribute invalid.
pub fn nports<C: ControlFiles>(control: &C) -> Result<usize> {
    let raw = control
        .read_attribute("nports")
        .map_err(|e| VhciError::attribute_missing("nports", e))?;

    let nports = raw
        .trim()
        .parse::<usize>()
        .map_err(|e| VhciError::attribute_missing("nports", format!("{:?}: {}", raw.trim(), e)))?;

    debug!("available ports: {}", nports);
    Ok(nports)
}

/// Count the `vhci_hcd.N` objects next to the controller
pub fn controller_count<C: ControlFiles>(control: &C) -> Result<usize> {
    let names = control
        .sibling_names()
        .map_err(|e| VhciError::Enumeration(format!("failed to read controller parent: {}", e)))?;

    let count = names
        .iter()
        .filter(|name| name.starts_with(CONTROLLER_PREFIX))
        .count();

    debug!("available controllers: {}", count);
    Ok(count)
}

/// Status attribute name for a controller index
pub fn status_attribute(index: usize) -> String {
    if index == 0 {
        "status".to_string()
    } else {
        format!("status.{}", index)
    }
}
