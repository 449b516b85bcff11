//! Control-file access to a vhci_hcd controller
//!
//! vhci_hcd exposes its state and commands as sysfs attributes:
//!
//! - `/sys/devices/platform/vhci_hcd.0/nports` - total port count
//! - `/sys/devices/platform/vhci_hcd.0/status` (`status.N` for controller N)
//! - `/sys/devices/platform/vhci_hcd.0/attach` - attach a device
//! - `/sys/devices/platform/vhci_hcd.0/detach` - detach a device
//!
//! Additional controllers appear as `vhci_hcd.N` siblings under
//! `/sys/devices/platform`, but all attributes live on `vhci_hcd.0`.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default location of the first VHCI controller
pub const DEFAULT_CONTROLLER_PATH: &str = "/sys/devices/platform/vhci_hcd.0";

/// Attribute-level access to the controller
///
/// Every call is a blocking, self-contained I/O operation; implementations
/// hold no open handles between calls.
pub trait ControlFiles {
    /// Read an attribute's full text
    fn read_attribute(&self, name: &str) -> io::Result<String>;

    /// Write a command to an attribute
    fn write_attribute(&self, name: &str, value: &str) -> io::Result<()>;

    /// Names of all objects sharing the controller's parent
    fn sibling_names(&self) -> io::Result<Vec<String>>;
}

impl<T: ControlFiles + ?Sized> ControlFiles for &T {
    fn read_attribute(&self, name: &str) -> io::Result<String> {
        (**self).read_attribute(name)
    }

    fn write_attribute(&self, name: &str, value: &str) -> io::Result<()> {
        (**self).write_attribute(name, value)
    }

    fn sibling_names(&self) -> io::Result<Vec<String>> {
        (**self).sibling_names()
    }
}

/// [`ControlFiles`] backed by a sysfs controller directory
#[derive(Debug, Clone)]
pub struct SysfsControl {
    controller_path: PathBuf,
}

impl SysfsControl {
    pub fn new(controller_path: impl Into<PathBuf>) -> Self {
        Self {
            controller_path: controller_path.into(),
        }
    }

    pub fn controller_path(&self) -> &Path {
        &self.controller_path
    }
}

impl Default for SysfsControl {
    fn default() -> Self {
        Self::new(DEFAULT_CONTROLLER_PATH)
    }
}

impl ControlFiles for SysfsControl {
    fn read_attribute(&self, name: &str) -> io::Result<String> {
        fs::read_to_string(self.controller_path.join(name))
    }

    fn write_attribute(&self, name: &str, value: &str) -> io::Result<()> {
        let path = self.controller_path.join(name);

        debug!("Writing to {}: {}", path.display(), value);

        // sysfs attributes are never created or truncated by writers
        let mut file = OpenOptions::new().write(true).open(&path)?;
        file.write_all(value.as_bytes())?;
        file.flush()
    }

    fn sibling_names(&self) -> io::Result<Vec<String>> {
        let parent = self.controller_path.parent().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} has no parent", self.controller_path.display()),
            )
        })?;

        let mut names = Vec::new();
        for entry in fs::read_dir(parent)? {
            let entry = entry?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }
}
