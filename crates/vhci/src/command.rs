//! Attach and detach commands
//!
//! ## Attach Format
//!
//! Write to `attach`: `<port> <sockfd> <devid> <speed>`
//!
//! - `port`: VHCI port number
//! - `sockfd`: Socket file descriptor connected to the remote USB/IP host
//! - `devid`: Remote device ID (busnum << 16 | devnum), printed in decimal
//! - `speed`: Device speed code (1=low, 2=full, 3=high, 5=super)
//!
//! ## Detach Format
//!
//! Write to `detach`: `<port>`
//!
//! Neither command updates a cached port table; the kernel applies them
//! asynchronously and callers must refresh to observe the result.

use crate::control::ControlFiles;
use crate::error::{Result, VhciError};
use crate::types::{DeviceId, DeviceSpeed};
use std::fmt;
use tracing::debug;

/// Claim a port for a remote device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachCommand {
    pub port: u16,
    pub socket: i32,
    pub device_id: DeviceId,
    pub speed: DeviceSpeed,
}

impl fmt::Display for AttachCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.port,
            self.socket,
            self.device_id.0,
            self.speed.code()
        )
    }
}

/// Release a port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetachCommand {
    pub port: u16,
}

impl fmt::Display for DetachCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.port)
    }
}

fn write_command<C: ControlFiles>(
    control: &C,
    attribute: &'static str,
    command: String,
) -> Result<()> {
    debug!("writing {}: {}", attribute, command);

    control
        .write_attribute(attribute, &command)
        .map_err(|source| VhciError::ControlWrite {
            attribute,
            command,
            source,
        })
}

/// Write an attach command to the controller
pub fn attach<C: ControlFiles>(control: &C, command: &AttachCommand) -> Result<()> {
    write_command(control, "attach", command.to_string())?;
    debug!("attached port: {}", command.port);
    Ok(())
}

/// Write a detach command to the controller
pub fn detach<C: ControlFiles>(control: &C, command: &DetachCommand) -> Result<()> {
    write_command(control, "detach", command.to_string())?;
    debug!("detached port: {}", command.port);
    Ok(())
}
