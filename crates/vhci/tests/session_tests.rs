//! Session integration tests
//!
//! Each test builds a fake sysfs tree in a temporary directory:
//!
//! - `devices/platform/vhci_hcd.N/` - controllers, attributes on `vhci_hcd.0`
//! - `bus/usb/devices/<busid>/` - descriptors for occupied ports
//!
//! Run with: `cargo test -p vhci --test session_tests`

use std::fs;
use std::path::PathBuf;
use tempfile::{TempDir, tempdir};
use vhci::{
    DeviceId, DeviceSpeed, HubSpeed, PortStatus, Session, SysfsControl, SysfsEnricher, VhciError,
};

const HEADER: &str = "hub port sta spd dev      sockfd local_busid\n";

// ============================================================================
// Fake sysfs
// ============================================================================

struct FakeSysfs {
    root: TempDir,
}

impl FakeSysfs {
    /// Tree with `controllers` controller directories and writable
    /// `attach`/`detach` attributes
    fn new(nports: &str, controllers: usize) -> Self {
        let root = tempdir().unwrap();
        let sysfs = Self { root };

        for i in 0..controllers {
            fs::create_dir_all(sysfs.platform().join(format!("vhci_hcd.{}", i))).unwrap();
        }
        fs::create_dir_all(sysfs.usb_devices()).unwrap();

        sysfs.write_attr("nports", nports);
        sysfs.write_attr("attach", "");
        sysfs.write_attr("detach", "");
        sysfs
    }

    fn platform(&self) -> PathBuf {
        self.root.path().join("devices/platform")
    }

    fn controller(&self) -> PathBuf {
        self.platform().join("vhci_hcd.0")
    }

    fn usb_devices(&self) -> PathBuf {
        self.root.path().join("bus/usb/devices")
    }

    fn write_attr(&self, name: &str, value: &str) {
        fs::write(self.controller().join(name), value).unwrap();
    }

    fn read_attr(&self, name: &str) -> String {
        fs::read_to_string(self.controller().join(name)).unwrap()
    }

    fn set_status(&self, name: &str, lines: &[&str]) {
        let mut text = HEADER.to_string();
        for line in lines {
            text.push_str(line);
            text.push('\n');
        }
        self.write_attr(name, &text);
    }

    fn add_device(&self, bus_id: &str, vendor: &str, product: &str, busnum: u16, devnum: u16) {
        let dir = self.usb_devices().join(bus_id);
        fs::create_dir_all(&dir).unwrap();
        let attrs = [
            ("idVendor", vendor.to_string()),
            ("idProduct", product.to_string()),
            ("bcdDevice", "0200".to_string()),
            ("bDeviceClass", "00".to_string()),
            ("bDeviceSubClass", "00".to_string()),
            ("bDeviceProtocol", "00".to_string()),
            ("bNumConfigurations", "1".to_string()),
            ("busnum", busnum.to_string()),
            ("devnum", devnum.to_string()),
            ("speed", "5000".to_string()),
        ];
        for (name, value) in attrs {
            fs::write(dir.join(name), format!("{}\n", value)).unwrap();
        }
    }

    fn remove_device(&self, bus_id: &str) {
        fs::remove_dir_all(self.usb_devices().join(bus_id)).unwrap();
    }

    fn open(&self) -> vhci::Result<Session> {
        Session::open(
            SysfsControl::new(self.controller()),
            SysfsEnricher::new(self.usb_devices()),
        )
    }
}

/// Four ports: two high-speed, two super-speed, one of each occupied
fn populated() -> FakeSysfs {
    let sysfs = FakeSysfs::new("4\n", 1);
    sysfs.set_status(
        "status",
        &[
            "hs  0000 006 002 00010002 000010 2-1",
            "hs  0001 004 000 00000000 000000 0-0",
            "ss  0002 004 000 00000000 000000 0-0",
            "ss  0003 006 005 00080002 000011 2-2",
        ],
    );
    sysfs.add_device("2-1", "dead", "beef", 2, 33);
    sysfs.add_device("2-2", "1d6b", "0003", 2, 34);
    sysfs
}

// ============================================================================
// Open / close
// ============================================================================

mod lifecycle {
    use super::*;

    #[test]
    fn test_open_loads_table() {
        let sysfs = populated();
        let session = sysfs.open().unwrap();

        assert_eq!(session.nports(), 4);
        assert_eq!(session.controller_count(), 1);

        let port0 = session.port_info(0).unwrap();
        assert_eq!(port0.status, PortStatus::Used);
        assert_eq!(port0.device_id, DeviceId(0x0001_0002));
        let descriptor = port0.descriptor.as_ref().unwrap();
        assert_eq!(descriptor.vendor_id, 0xdead);
        assert_eq!(descriptor.product_id, 0xbeef);
        assert_eq!(descriptor.dev_node(), "/dev/bus/usb/002/033");

        let attached: Vec<u16> = session.attached().map(|r| r.port).collect();
        assert_eq!(attached, vec![0, 3]);

        session.close();
    }

    #[test]
    fn test_open_without_nports() {
        let sysfs = FakeSysfs::new("4", 1);
        fs::remove_file(sysfs.controller().join("nports")).unwrap();

        let err = sysfs.open().unwrap_err();
        assert!(matches!(err, VhciError::AttributeMissing { .. }));
    }

    #[test]
    fn test_open_with_invalid_nports() {
        let sysfs = FakeSysfs::new("many", 1);
        let err = sysfs.open().unwrap_err();
        assert!(matches!(err, VhciError::AttributeMissing { .. }));
    }

    #[test]
    fn test_open_with_zero_ports() {
        let sysfs = FakeSysfs::new("0\n", 1);
        sysfs.set_status("status", &[]);

        let err = sysfs.open().unwrap_err();
        assert!(matches!(err, VhciError::Enumeration(_)));
    }

    #[test]
    fn test_open_counts_sibling_controllers() {
        let sysfs = FakeSysfs::new("4\n", 2);
        fs::create_dir_all(sysfs.platform().join("serial8250")).unwrap();
        sysfs.set_status(
            "status",
            &[
                "hs  0000 004 000 00000000 000000 0-0",
                "ss  0001 004 000 00000000 000000 0-0",
            ],
        );
        sysfs.set_status(
            "status.1",
            &[
                "hs  0002 004 000 00000000 000000 0-0",
                "ss  0003 004 000 00000000 000000 0-0",
            ],
        );

        let session = sysfs.open().unwrap();
        assert_eq!(session.controller_count(), 2);
        assert_eq!(session.port_info(2).unwrap().hub, HubSpeed::High);
        assert_eq!(session.port_info(3).unwrap().hub, HubSpeed::Super);
    }

    #[test]
    fn test_open_fails_on_missing_second_status() {
        let sysfs = FakeSysfs::new("4\n", 2);
        sysfs.set_status("status", &["hs  0000 004 000 00000000 000000 0-0"]);

        let err = sysfs.open().unwrap_err();
        assert!(matches!(err, VhciError::AttributeMissing { ref name, .. } if name == "status.1"));
    }

    #[test]
    fn test_open_fails_on_undescribable_device() {
        let sysfs = populated();
        sysfs.remove_device("2-2");

        let err = sysfs.open().unwrap_err();
        assert!(err.to_string().contains("failed to describe device 2-2"));
    }

    #[test]
    fn test_independent_sessions() {
        let a = populated();
        let b = FakeSysfs::new("2\n", 1);
        b.set_status(
            "status",
            &[
                "hs  0000 004 000 00000000 000000 0-0",
                "ss  0001 004 000 00000000 000000 0-0",
            ],
        );

        let first = a.open().unwrap();
        let second = b.open().unwrap();
        assert_eq!(first.nports(), 4);
        assert_eq!(second.nports(), 2);
        assert_eq!(second.attached().count(), 0);
    }
}

// ============================================================================
// Lookup
// ============================================================================

mod lookup {
    use super::*;

    #[test]
    fn test_port_info_out_of_range_is_none() {
        let sysfs = populated();
        let session = sysfs.open().unwrap();

        for port in [4, 5, 255, usize::MAX] {
            assert!(session.port_info(port).is_none(), "port {}", port);
        }
    }

    #[test]
    fn test_free_and_occupied_records() {
        let sysfs = FakeSysfs::new("2\n", 1);
        sysfs.set_status(
            "status",
            &[
                "hs  0000 004 000 00000000 000000 0-0",
                "ss  0001 006 005 00030004 000009 3-1",
            ],
        );
        sysfs.add_device("3-1", "0781", "5581", 3, 4);

        let session = sysfs.open().unwrap();

        let free = session.port_info(0).unwrap();
        assert!(free.is_free());
        assert_eq!(free.hub, HubSpeed::High);
        assert!(free.descriptor.is_none());

        let used = session.port_info(1).unwrap();
        assert!(!used.is_free());
        assert_eq!(used.hub, HubSpeed::Super);
        assert_eq!(used.socket, 9);
        let descriptor = used.descriptor.as_ref().unwrap();
        assert_eq!(descriptor.bus_id, "3-1");
        assert_eq!(descriptor.vendor_id, 0x0781);
        assert_eq!(descriptor.speed, DeviceSpeed::Super);
    }

    #[test]
    fn test_unreported_port_is_never_free() {
        let sysfs = FakeSysfs::new("4\n", 1);
        sysfs.set_status(
            "status",
            &[
                "ss  0000 004 000 00000000 000000 0-0",
                "ss  0001 004 000 00000000 000000 0-0",
            ],
        );

        let session = sysfs.open().unwrap();

        assert_eq!(session.find_free_port(DeviceSpeed::High), None);
        let record = session.port_info(2).unwrap();
        assert_eq!(record.status, PortStatus::Undefined);
        assert!(!record.is_free());
        assert_eq!(session.find_free_port(DeviceSpeed::Super), Some(0));
    }

    #[test]
    fn test_records_serialize_to_json() {
        let sysfs = populated();
        let session = sysfs.open().unwrap();

        let json = serde_json::to_value(session.port_info(0).unwrap()).unwrap();
        assert_eq!(json["hub"], "high");
        assert_eq!(json["status"], "used");
        assert_eq!(json["descriptor"]["bus_id"], "2-1");
        assert!(serde_json::to_value(session.port_info(1).unwrap()).unwrap()["descriptor"].is_null());
    }
}

// ============================================================================
// Refresh
// ============================================================================

mod refresh {
    use super::*;

    #[test]
    fn test_refresh_observes_attach() {
        let sysfs = FakeSysfs::new("4\n", 1);
        sysfs.set_status(
            "status",
            &[
                "hs  0000 004 000 00000000 000000 0-0",
                "hs  0001 004 000 00000000 000000 0-0",
                "ss  0002 004 000 00000000 000000 0-0",
                "ss  0003 004 000 00000000 000000 0-0",
            ],
        );
        let mut session = sysfs.open().unwrap();
        assert!(session.port_info(3).unwrap().is_free());

        sysfs.set_status(
            "status",
            &[
                "hs  0000 004 000 00000000 000000 0-0",
                "hs  0001 004 000 00000000 000000 0-0",
                "ss  0002 004 000 00000000 000000 0-0",
                "ss  0003 006 005 00080002 000011 2-2",
            ],
        );
        sysfs.add_device("2-2", "dead", "beef", 2, 34);

        session.refresh().unwrap();
        let record = session.port_info(3).unwrap();
        assert_eq!(record.status, PortStatus::Used);
        assert_eq!(record.descriptor.as_ref().unwrap().device_number, 34);
    }

    #[test]
    fn test_refresh_keeps_port_count() {
        let sysfs = populated();
        let mut session = sysfs.open().unwrap();

        // nports changing underneath an open session does not resize it
        sysfs.write_attr("nports", "8\n");
        session.refresh().unwrap();

        assert_eq!(session.nports(), 4);
        assert_eq!(session.ports().count(), 4);
        assert!(session.port_info(4).is_none());
        assert!(format!("{:?}", session).contains("nports: 4"));
    }

    #[test]
    fn test_refresh_drops_detached_descriptor() {
        let sysfs = populated();
        let mut session = sysfs.open().unwrap();
        assert!(session.port_info(3).unwrap().descriptor.is_some());

        sysfs.remove_device("2-2");
        sysfs.set_status(
            "status",
            &[
                "hs  0000 006 002 00010002 000010 2-1",
                "hs  0001 004 000 00000000 000000 0-0",
                "ss  0002 004 000 00000000 000000 0-0",
                "ss  0003 004 000 00080000 000000 0-0",
            ],
        );

        session.refresh().unwrap();
        let record = session.port_info(3).unwrap();
        assert!(record.is_free());
        assert!(record.descriptor.is_none());
        assert_eq!(session.attached().count(), 1);
    }

    #[test]
    fn test_short_line_keeps_previous_table() {
        let sysfs = populated();
        let mut session = sysfs.open().unwrap();
        let before: Vec<_> = session.ports().cloned().collect();

        sysfs.set_status(
            "status",
            &[
                "hs  0000 004 000 00000000 000000 0-0",
                "hs  0001 004",
            ],
        );

        let err = session.refresh().unwrap_err();
        assert!(matches!(err, VhciError::MalformedStatusLine { line_number: 2, .. }));

        let after: Vec<_> = session.ports().cloned().collect();
        assert_eq!(before, after);
        assert_eq!(session.port_info(0).unwrap().status, PortStatus::Used);
    }

    #[test]
    fn test_failure_in_second_controller_keeps_previous_table() {
        let sysfs = FakeSysfs::new("4\n", 2);
        sysfs.set_status(
            "status",
            &[
                "hs  0000 004 000 00000000 000000 0-0",
                "ss  0001 004 000 00000000 000000 0-0",
            ],
        );
        sysfs.set_status(
            "status.1",
            &[
                "hs  0002 004 000 00000000 000000 0-0",
                "ss  0003 004 000 00000000 000000 0-0",
            ],
        );
        let mut session = sysfs.open().unwrap();

        // First controller changes, second becomes unreadable
        sysfs.set_status(
            "status",
            &[
                "hs  0000 006 002 00010002 000010 2-1",
                "ss  0001 004 000 00000000 000000 0-0",
            ],
        );
        sysfs.add_device("2-1", "dead", "beef", 2, 33);
        sysfs.set_status("status.1", &["qq  0002 004 000 00000000 000000 0-0"]);

        let err = session.refresh().unwrap_err();
        assert!(matches!(err, VhciError::MalformedStatusLine { controller: 1, .. }));
        assert!(session.port_info(0).unwrap().is_free());
    }
}

// ============================================================================
// Allocation and commands
// ============================================================================

mod commands {
    use super::*;

    #[test]
    fn test_find_free_port_respects_hub_tier() {
        let sysfs = populated();
        let session = sysfs.open().unwrap();

        assert_eq!(session.find_free_port(DeviceSpeed::High), Some(1));
        assert_eq!(session.find_free_port(DeviceSpeed::Full), Some(1));
        assert_eq!(session.find_free_port(DeviceSpeed::Super), Some(2));
    }

    #[test]
    fn test_find_free_port_exhausted() {
        let sysfs = FakeSysfs::new("2\n", 1);
        sysfs.set_status(
            "status",
            &[
                "hs  0000 006 002 00010002 000010 2-1",
                "ss  0001 004 000 00000000 000000 0-0",
            ],
        );
        sysfs.add_device("2-1", "dead", "beef", 2, 33);
        let session = sysfs.open().unwrap();

        assert_eq!(session.find_free_port(DeviceSpeed::High), None);
        let err = session
            .attach_to_free_port(7, DeviceId(1), DeviceSpeed::High)
            .unwrap_err();
        assert!(matches!(err, VhciError::NoFreePort { hub: HubSpeed::High }));
        assert_eq!(sysfs.read_attr("attach"), "");
    }

    #[test]
    fn test_attach_writes_command() {
        let sysfs = populated();
        let session = sysfs.open().unwrap();

        session
            .attach(3, 7, DeviceId(0x0001_0002), DeviceSpeed::High)
            .unwrap();
        assert_eq!(sysfs.read_attr("attach"), "3 7 65538 3");
    }

    #[test]
    fn test_attach_does_not_touch_table() {
        let sysfs = populated();
        let session = sysfs.open().unwrap();

        session
            .attach(1, 7, DeviceId(0x0001_0002), DeviceSpeed::High)
            .unwrap();
        assert!(session.port_info(1).unwrap().is_free());
    }

    #[test]
    fn test_attach_to_free_port() {
        let sysfs = populated();
        let session = sysfs.open().unwrap();

        let port = session
            .attach_to_free_port(12, DeviceId::from_parts(4, 5), DeviceSpeed::Super)
            .unwrap();
        assert_eq!(port, 2);
        assert_eq!(sysfs.read_attr("attach"), "2 12 262149 5");
    }

    #[test]
    fn test_detach_writes_command() {
        let sysfs = populated();
        let session = sysfs.open().unwrap();

        session.detach(5).unwrap();
        assert_eq!(sysfs.read_attr("detach"), "5");
    }

    #[test]
    fn test_write_failure_is_control_write_error() {
        let sysfs = populated();
        let session = sysfs.open().unwrap();
        fs::remove_file(sysfs.controller().join("detach")).unwrap();
        assert!(!sysfs.controller().join("detach").exists());

        let err = session.detach(0).unwrap_err();
        assert!(matches!(
            err,
            VhciError::ControlWrite {
                attribute: "detach",
                ..
            }
        ));
        assert!(!sysfs.controller().join("detach").exists());
    }
}
