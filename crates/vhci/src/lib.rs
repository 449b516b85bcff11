//! Port tracking for the Linux USB/IP virtual host controller
//!
//! This crate reads and drives the sysfs control files of the `vhci_hcd`
//! kernel module. It parses each controller's `status` table into port
//! records, picks free ports by hub tier, and writes `attach`/`detach`
//! commands. Forwarding USB traffic over the attached socket is left to
//! the caller.
//!
//! # Example
//!
//! ```no_run
//! use vhci::{DeviceId, DeviceSpeed, Session};
//!
//! # fn main() -> vhci::Result<()> {
//! let mut session = Session::open_default()?;
//!
//! if let Some(port) = session.find_free_port(DeviceSpeed::High) {
//!     // `sockfd` is a connected USB/IP socket owned by the caller
//!     # let sockfd = 3;
//!     session.attach(port, sockfd, DeviceId::from_parts(1, 2), DeviceSpeed::High)?;
//!     session.refresh()?;
//!     println!("{:?}", session.port_info(port.into()));
//! }
//!
//! session.close();
//! # Ok(())
//! # }
//! ```

pub mod allocator;
pub mod command;
pub mod control;
pub mod enricher;
pub mod enumerate;
pub mod error;
pub mod session;
pub mod status;
pub mod table;
pub mod types;

pub use allocator::find_free_port;
pub use command::{AttachCommand, DetachCommand};
pub use control::{ControlFiles, DEFAULT_CONTROLLER_PATH, SysfsControl};
pub use enricher::{DEFAULT_USB_DEVICES_PATH, DeviceEnricher, SysfsEnricher};
pub use error::{Result, VhciError};
pub use session::Session;
pub use status::{StatusRecords, parse_status};
pub use table::PortTable;
pub use types::{DeviceDescriptor, DeviceId, DeviceSpeed, HubSpeed, PortRecord, PortStatus};
