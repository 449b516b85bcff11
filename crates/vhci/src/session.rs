//! Driver session
//!
//! A [`Session`] owns the port table for one open view of the VHCI
//! controllers. It is sized at [`Session::open`] and refreshed on demand.
//!
//! # Concurrency
//!
//! All operations are blocking and unsynchronized. A session shared
//! between threads must be wrapped in a mutex by the caller, and
//! `find_free_port` + `attach` is not atomic against other processes
//! attaching to the same controller.

use crate::allocator;
use crate::command::{self, AttachCommand, DetachCommand};
use crate::control::{ControlFiles, SysfsControl};
use crate::enricher::{DeviceEnricher, SysfsEnricher};
use crate::enumerate;
use crate::error::{Result, VhciError};
use crate::table::{PortTable, read_table};
use crate::types::{DeviceId, DeviceSpeed, PortRecord};
use tracing::{debug, info, warn};

/// An open view of the VHCI controllers and their ports
pub struct Session<C = SysfsControl, E = SysfsEnricher> {
    control: C,
    enricher: E,
    nports: u16,
    controllers: usize,
    table: PortTable,
}

impl Session {
    /// Open the controllers at their default sysfs locations
    pub fn open_default() -> Result<Self> {
        Self::open(SysfsControl::default(), SysfsEnricher::default())
    }
}

impl<C: ControlFiles, E: DeviceEnricher> Session<C, E> {
    /// Discover ports and controllers, then load the initial table
    ///
    /// # Errors
    ///
    /// - [`VhciError::AttributeMissing`] if `nports` cannot be read
    /// - [`VhciError::Enumeration`] if there are no ports or no controllers
    /// - any error from the initial [`Session::refresh`]
    pub fn open(control: C, enricher: E) -> Result<Self> {
        let nports = enumerate::nports(&control)?;
        if nports == 0 {
            return Err(VhciError::Enumeration("no available ports".to_string()));
        }
        let nports = u16::try_from(nports).map_err(|_| {
            VhciError::Enumeration(format!("port count {} exceeds {}", nports, u16::MAX))
        })?;

        let controllers = enumerate::controller_count(&control)?;
        if controllers == 0 {
            return Err(VhciError::Enumeration(
                "no available usb controllers".to_string(),
            ));
        }

        let table = read_table(&control, &enricher, nports, controllers)?;

        info!(
            "Opened VHCI session: {} ports on {} controllers",
            nports, controllers
        );

        Ok(Self {
            control,
            enricher,
            nports,
            controllers,
            table,
        })
    }

    /// Release the session
    pub fn close(self) {
        info!("Closed VHCI session ({} ports)", self.nports);
    }

    pub fn nports(&self) -> usize {
        usize::from(self.nports)
    }

    pub fn controller_count(&self) -> usize {
        self.controllers
    }

    /// Re-read every controller's status and replace the table
    ///
    /// Controllers are read one after another, so the result may mix
    /// states from before and after a concurrent attach. On error the
    /// previous table stays in place.
    pub fn refresh(&mut self) -> Result<()> {
        match read_table(&self.control, &self.enricher, self.nports, self.controllers) {
            Ok(table) => {
                self.table = table;
                debug!("refreshed {} ports", self.nports);
                Ok(())
            }
            Err(e) => {
                warn!("failed to refresh device list: {}", e);
                Err(e)
            }
        }
    }

    /// First free port on the hub tier `speed` requires
    pub fn find_free_port(&self, speed: DeviceSpeed) -> Option<u16> {
        allocator::find_free_port(&self.table, speed)
    }

    /// Attach a remote device connected through `socket` to `port`
    ///
    /// Does not update the table; call [`Session::refresh`] afterwards.
    pub fn attach(
        &self,
        port: u16,
        socket: i32,
        device_id: DeviceId,
        speed: DeviceSpeed,
    ) -> Result<()> {
        command::attach(
            &self.control,
            &AttachCommand {
                port,
                socket,
                device_id,
                speed,
            },
        )
    }

    /// Pick a free port for `speed` and attach to it
    ///
    /// Returns the port written to. Does not refresh.
    pub fn attach_to_free_port(
        &self,
        socket: i32,
        device_id: DeviceId,
        speed: DeviceSpeed,
    ) -> Result<u16> {
        let port = self
            .find_free_port(speed)
            .ok_or(VhciError::NoFreePort {
                hub: speed.hub_class(),
            })?;

        self.attach(port, socket, device_id, speed)?;
        Ok(port)
    }

    /// Detach whatever is attached to `port`
    ///
    /// Does not update the table; call [`Session::refresh`] afterwards.
    pub fn detach(&self, port: u16) -> Result<()> {
        command::detach(&self.control, &DetachCommand { port })
    }

    /// Last observed state of `port`, or `None` if out of range
    pub fn port_info(&self, port: usize) -> Option<&PortRecord> {
        self.table.get(port)
    }

    /// All ports in ascending order
    pub fn ports(&self) -> impl Iterator<Item = &PortRecord> {
        self.table.iter()
    }

    /// Occupied ports in ascending order
    pub fn attached(&self) -> impl Iterator<Item = &PortRecord> {
        self.table.iter().filter(|record| record.descriptor.is_some())
    }
}

impl<C, E> std::fmt::Debug for Session<C, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("controllers", &self.controllers)
            .field("nports", &self.nports)
            .finish_non_exhaustive()
    }
}
