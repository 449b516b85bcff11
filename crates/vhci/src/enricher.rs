//! Descriptive attributes for devices on occupied ports
//!
//! When a VHCI port is in use, its status line names the local bus id the
//! imported device was given (e.g. `3-1`). The enricher turns that bus id
//! into a [`DeviceDescriptor`] by reading the device's sysfs attributes.

use crate::types::{DeviceDescriptor, DeviceSpeed};
use std::fs;
use std::path::{Path, PathBuf};

/// Default sysfs directory holding one entry per USB device
pub const DEFAULT_USB_DEVICES_PATH: &str = "/sys/bus/usb/devices";

/// Resolves a bus id to device attributes
pub trait DeviceEnricher {
    /// Describe the device at `bus_id`, or explain why it cannot be described
    fn describe(&self, bus_id: &str) -> Result<DeviceDescriptor, String>;
}

impl<T: DeviceEnricher + ?Sized> DeviceEnricher for &T {
    fn describe(&self, bus_id: &str) -> Result<DeviceDescriptor, String> {
        (**self).describe(bus_id)
    }
}

/// [`DeviceEnricher`] reading `/sys/bus/usb/devices/<bus_id>/`
#[derive(Debug, Clone)]
pub struct SysfsEnricher {
    usb_devices_path: PathBuf,
}

impl SysfsEnricher {
    pub fn new(usb_devices_path: impl Into<PathBuf>) -> Self {
        Self {
            usb_devices_path: usb_devices_path.into(),
        }
    }

    pub fn usb_devices_path(&self) -> &Path {
        &self.usb_devices_path
    }
}

impl Default for SysfsEnricher {
    fn default() -> Self {
        Self::new(DEFAULT_USB_DEVICES_PATH)
    }
}

/// Attribute reader for one device directory
struct DeviceDir<'a> {
    path: &'a Path,
}

impl DeviceDir<'_> {
    fn read(&self, name: &str) -> Result<String, String> {
        fs::read_to_string(self.path.join(name))
            .map(|value| value.trim().to_string())
            .map_err(|e| format!("{}: {}", name, e))
    }

    fn hex_u16(&self, name: &str) -> Result<u16, String> {
        let value = self.read(name)?;
        u16::from_str_radix(&value, 16).map_err(|e| format!("{}: {:?}: {}", name, value, e))
    }

    fn hex_u8(&self, name: &str) -> Result<u8, String> {
        let value = self.read(name)?;
        u8::from_str_radix(&value, 16).map_err(|e| format!("{}: {:?}: {}", name, value, e))
    }

    fn dec_u16(&self, name: &str) -> Result<u16, String> {
        let value = self.read(name)?;
        value
            .parse::<u16>()
            .map_err(|e| format!("{}: {:?}: {}", name, value, e))
    }

    /// Decimal u8 attribute that is blank until the device is configured
    fn optional_dec_u8(&self, name: &str) -> u8 {
        self.read(name)
            .ok()
            .and_then(|value| value.parse::<u8>().ok())
            .unwrap_or(0)
    }
}

impl DeviceEnricher for SysfsEnricher {
    fn describe(&self, bus_id: &str) -> Result<DeviceDescriptor, String> {
        let path = self.usb_devices_path.join(bus_id);
        let dir = DeviceDir { path: &path };

        let vendor_id = dir.hex_u16("idVendor");
        let product_id = dir.hex_u16("idProduct");
        let bcd_device = dir.hex_u16("bcdDevice");
        let class = dir.hex_u8("bDeviceClass");
        let subclass = dir.hex_u8("bDeviceSubClass");
        let protocol = dir.hex_u8("bDeviceProtocol");
        let num_configurations = dir.hex_u8("bNumConfigurations");
        let bus_number = dir.dec_u16("busnum");
        let device_number = dir.dec_u16("devnum");

        // Report every missing attribute at once
        let failures: Vec<&str> = [
            vendor_id.as_ref().err(),
            product_id.as_ref().err(),
            bcd_device.as_ref().err(),
            bus_number.as_ref().err(),
            device_number.as_ref().err(),
            class.as_ref().err(),
            subclass.as_ref().err(),
            protocol.as_ref().err(),
            num_configurations.as_ref().err(),
        ]
        .into_iter()
        .flatten()
        .map(String::as_str)
        .collect();

        if !failures.is_empty() {
            return Err(format!(
                "failed to describe device {}: {}",
                bus_id,
                failures.join("; ")
            ));
        }

        Ok(DeviceDescriptor {
            bus_id: bus_id.to_string(),
            sys_path: path.display().to_string(),
            bus_number: bus_number?,
            device_number: device_number?,
            speed: dir
                .read("speed")
                .map(|s| DeviceSpeed::from_sysfs(&s))
                .unwrap_or_default(),
            vendor_id: vendor_id?,
            product_id: product_id?,
            bcd_device: bcd_device?,
            class: class?,
            subclass: subclass?,
            protocol: protocol?,
            configuration_value: dir.optional_dec_u8("bConfigurationValue"),
            num_configurations: num_configurations?,
            num_interfaces: dir.optional_dec_u8("bNumInterfaces"),
        })
    }
}
