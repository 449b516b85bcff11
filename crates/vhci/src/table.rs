//! Port table assembly
//!
//! The table holds one record per port, indexed by port number. It is
//! sized once when a session opens and rebuilt from scratch on every
//! refresh, so nothing from an earlier refresh survives into a new one.

use crate::control::ControlFiles;
use crate::enricher::DeviceEnricher;
use crate::enumerate::status_attribute;
use crate::error::{Result, VhciError};
use crate::status::parse_status;
use crate::types::PortRecord;
use tracing::debug;

/// Fixed-length table of port records indexed by port number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortTable {
    ports: Box<[PortRecord]>,
}

impl PortTable {
    /// Create a table of `nports` ports that no status line has reported yet
    ///
    /// Port numbers must fit the `u16` port column.
    pub fn new(nports: u16) -> Self {
        Self {
            ports: (0..nports).map(PortRecord::unreported).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// Record for `port`, or `None` when out of range
    pub fn get(&self, port: usize) -> Option<&PortRecord> {
        self.ports.get(port)
    }

    /// All records in ascending port order
    pub fn iter(&self) -> std::slice::Iter<'_, PortRecord> {
        self.ports.iter()
    }
}

impl<'a> IntoIterator for &'a PortTable {
    type Item = &'a PortRecord;
    type IntoIter = std::slice::Iter<'a, PortRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Read every controller's status and assemble a fresh table
///
/// Records land at the index given by their own `port` column. A port out
/// of range or reported twice is a malformed line. A port no controller
/// reports keeps an `Undefined` status and is never free. Any failure
/// discards the partially built table.
pub fn read_table<C: ControlFiles, E: DeviceEnricher>(
    control: &C,
    enricher: &E,
    nports: u16,
    controllers: usize,
) -> Result<PortTable> {
    let mut table = PortTable::new(nports);
    let mut seen = vec![false; table.len()];

    for index in 0..controllers {
        let name = status_attribute(index);
        let text = control
            .read_attribute(&name)
            .map_err(|e| VhciError::attribute_missing(&name, e))?;

        debug!("controller {}", index);

        let mut records =
            parse_status(&text, enricher).map_err(|e| e.in_controller(index))?;

        while let Some(record) = records.next() {
            let record = record.map_err(|e| e.in_controller(index))?;
            let slot = usize::from(record.port);

            let reason = match seen.get(slot) {
                None => Some(format!("port {} out of range (nports {})", slot, nports)),
                Some(true) => Some(format!("port {} reported twice", slot)),
                Some(false) => None,
            };
            if let Some(reason) = reason {
                let (line_number, line) = records.last_line();
                return Err(VhciError::malformed(line_number, line, reason).in_controller(index));
            }

            seen[slot] = true;
            table.ports[slot] = record;
        }
    }

    Ok(table)
}
