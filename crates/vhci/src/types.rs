//! Port and device type definitions
//!
//! These types mirror the values the vhci_hcd driver prints in its `status`
//! attributes and accepts in its `attach` attribute.

use serde::Serialize;
use std::fmt;

/// Physical hub tier a VHCI port belongs to
///
/// Fixed by the controller topology: each vhci_hcd instance exposes one
/// USB 2.0 root hub (`hs`) and one USB 3.0 root hub (`ss`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HubSpeed {
    /// USB 2.0 root hub, carries low/full/high/wireless devices
    High,
    /// USB 3.0 root hub, carries SuperSpeed devices only
    Super,
}

impl HubSpeed {
    /// Parse the two-character hub tag used in status lines
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "hs" => Some(HubSpeed::High),
            "ss" => Some(HubSpeed::Super),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            HubSpeed::High => "hs",
            HubSpeed::Super => "ss",
        }
    }
}

impl fmt::Display for HubSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HubSpeed::High => write!(f, "high-speed"),
            HubSpeed::Super => write!(f, "super-speed"),
        }
    }
}

/// USB/IP device status codes (`enum usbip_device_status` in the kernel)
///
/// The `SDev*` codes belong to the exporting side and never appear on a
/// VHCI port in practice, but the kernel shares the numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PortStatus {
    Undefined,
    SDevAvailable,
    SDevUsed,
    SDevError,
    /// Port is free
    Null,
    /// Port was reserved but no device is assigned yet; still free
    NotAssigned,
    /// A remote device is attached
    Used,
    /// The attached device hit an error and awaits detach
    Error,
}

impl PortStatus {
    pub fn from_code(code: u32) -> Option<Self> {
        let status = match code {
            0 => PortStatus::Undefined,
            1 => PortStatus::SDevAvailable,
            2 => PortStatus::SDevUsed,
            3 => PortStatus::SDevError,
            4 => PortStatus::Null,
            5 => PortStatus::NotAssigned,
            6 => PortStatus::Used,
            7 => PortStatus::Error,
            _ => return None,
        };
        Some(status)
    }

    pub fn code(self) -> u32 {
        match self {
            PortStatus::Undefined => 0,
            PortStatus::SDevAvailable => 1,
            PortStatus::SDevUsed => 2,
            PortStatus::SDevError => 3,
            PortStatus::Null => 4,
            PortStatus::NotAssigned => 5,
            PortStatus::Used => 6,
            PortStatus::Error => 7,
        }
    }

    /// Whether a new device may be attached to a port in this state
    pub fn is_free(self) -> bool {
        matches!(self, PortStatus::Null | PortStatus::NotAssigned)
    }
}

/// USB device speed codes (`enum usb_device_speed` in the kernel)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceSpeed {
    #[default]
    Unknown,
    /// Low speed - 1.5 Mbps (USB 1.0)
    Low,
    /// Full speed - 12 Mbps (USB 1.1)
    Full,
    /// High speed - 480 Mbps (USB 2.0)
    High,
    /// Wireless USB - 53.3-480 Mbps
    Wireless,
    /// SuperSpeed - 5 Gbps (USB 3.0)
    Super,
    /// SuperSpeed+ - 10 Gbps (USB 3.1)
    SuperPlus,
}

impl DeviceSpeed {
    /// Map a kernel speed code, falling back to `Unknown`
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => DeviceSpeed::Low,
            2 => DeviceSpeed::Full,
            3 => DeviceSpeed::High,
            4 => DeviceSpeed::Wireless,
            5 => DeviceSpeed::Super,
            6 => DeviceSpeed::SuperPlus,
            _ => DeviceSpeed::Unknown,
        }
    }

    pub fn code(self) -> u32 {
        match self {
            DeviceSpeed::Unknown => 0,
            DeviceSpeed::Low => 1,
            DeviceSpeed::Full => 2,
            DeviceSpeed::High => 3,
            DeviceSpeed::Wireless => 4,
            DeviceSpeed::Super => 5,
            DeviceSpeed::SuperPlus => 6,
        }
    }

    /// Map the sysfs `speed` attribute (in Mbps) to a speed code
    pub fn from_sysfs(value: &str) -> Self {
        match value.trim() {
            "1.5" => DeviceSpeed::Low,
            "12" => DeviceSpeed::Full,
            "480" => DeviceSpeed::High,
            "53.3-480" => DeviceSpeed::Wireless,
            "5000" => DeviceSpeed::Super,
            "10000" | "20000" => DeviceSpeed::SuperPlus,
            _ => DeviceSpeed::Unknown,
        }
    }

    /// Hub tier that must host a device of this speed
    ///
    /// vhci_hcd routes only `USB_SPEED_SUPER` to its USB 3.0 hub; every
    /// other speed goes to the USB 2.0 hub.
    pub fn hub_class(self) -> HubSpeed {
        match self {
            DeviceSpeed::Super => HubSpeed::Super,
            _ => HubSpeed::High,
        }
    }
}

impl std::str::FromStr for DeviceSpeed {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(DeviceSpeed::Low),
            "full" => Ok(DeviceSpeed::Full),
            "high" => Ok(DeviceSpeed::High),
            "wireless" => Ok(DeviceSpeed::Wireless),
            "super" => Ok(DeviceSpeed::Super),
            "super-plus" | "superplus" => Ok(DeviceSpeed::SuperPlus),
            other => other
                .parse::<u32>()
                .ok()
                .filter(|code| *code <= 6)
                .map(DeviceSpeed::from_code)
                .ok_or_else(|| format!("unknown device speed '{}'", s)),
        }
    }
}

/// Remote device identifier: bus number in the high 16 bits, device
/// number in the low 16 bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct DeviceId(pub u32);

impl DeviceId {
    pub fn from_parts(bus_number: u16, device_number: u16) -> Self {
        DeviceId((u32::from(bus_number) << 16) | u32::from(device_number))
    }

    pub fn bus_number(self) -> u16 {
        (self.0 >> 16) as u16
    }

    pub fn device_number(self) -> u16 {
        (self.0 & 0xffff) as u16
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.bus_number(), self.device_number())
    }
}

/// Descriptive attributes of the local USB device backing an occupied port
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DeviceDescriptor {
    /// Local bus id (e.g. `3-1`)
    pub bus_id: String,
    /// Device directory in sysfs
    pub sys_path: String,
    pub bus_number: u16,
    pub device_number: u16,
    pub speed: DeviceSpeed,
    pub vendor_id: u16,
    pub product_id: u16,
    pub bcd_device: u16,
    pub class: u8,
    pub subclass: u8,
    pub protocol: u8,
    /// Active configuration; 0 until the device is configured
    pub configuration_value: u8,
    pub num_configurations: u8,
    /// Interfaces of the active configuration; 0 until configured
    pub num_interfaces: u8,
}

impl DeviceDescriptor {
    /// usbfs device node for this device
    pub fn dev_node(&self) -> String {
        format!(
            "/dev/bus/usb/{:03}/{:03}",
            self.bus_number, self.device_number
        )
    }
}

/// One VHCI port as last observed in the controller status
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortRecord {
    pub port: u16,
    pub hub: HubSpeed,
    pub status: PortStatus,
    /// Speed code reported for the port
    pub speed: DeviceSpeed,
    pub device_id: DeviceId,
    /// Socket descriptor recorded by the kernel, not owned here
    pub socket: i32,
    /// Present only while the port is occupied
    pub descriptor: Option<DeviceDescriptor>,
}

impl PortRecord {
    /// Placeholder for a port no status line has described
    ///
    /// Its status is `Undefined`, so it is never handed out as free.
    pub(crate) fn unreported(port: u16) -> Self {
        Self {
            port,
            hub: HubSpeed::High,
            status: PortStatus::Undefined,
            speed: DeviceSpeed::Unknown,
            device_id: DeviceId::default(),
            socket: 0,
            descriptor: None,
        }
    }

    pub fn is_free(&self) -> bool {
        self.status.is_free()
    }
}
