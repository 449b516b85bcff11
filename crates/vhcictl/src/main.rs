//! vhcictl
//!
//! Inspect and drive the USB/IP virtual host controller (vhci_hcd) from the
//! command line: list ports, pick free ports, attach and detach devices.

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use common::setup_logging;
use std::path::PathBuf;
use tracing::{debug, info};
use vhci::{DeviceId, DeviceSpeed, PortRecord, Session, SysfsControl, SysfsEnricher};

#[derive(Parser, Debug)]
#[command(name = "vhcictl")]
#[command(author, version, about = "Inspect and control USB/IP virtual host controller ports")]
#[command(long_about = "
Reads the vhci_hcd sysfs interface to show port state and writes attach and
detach commands to it.

EXAMPLES:
    # Show every port
    vhcictl ports

    # First free port for a SuperSpeed device
    vhcictl free-port --speed super

    # Attach a device already connected on socket fd 7
    vhcictl attach --port 3 --socket 7 --devid 0x00010002 --speed high

    # Release a port
    vhcictl detach --port 3

CONFIGURATION:
    The configuration file is looked up in the following order:
    1. Path specified with --config
    2. ~/.config/vhcictl/config.toml
    3. /etc/vhcictl/config.toml
    4. Built-in defaults
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every port
    Ports {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// List occupied ports with their device details
    Attached {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Print the first free port for a device speed
    FreePort {
        #[arg(long, value_parser = parse_speed)]
        speed: DeviceSpeed,
    },
    /// Attach a connected USB/IP socket to a port
    Attach {
        #[arg(long)]
        port: u16,
        /// Connected socket file descriptor, inherited by this process
        #[arg(long, allow_hyphen_values = true)]
        socket: i32,
        /// Remote device id (busnum << 16 | devnum), decimal or 0x-hex
        #[arg(long, value_parser = parse_device_id)]
        devid: DeviceId,
        #[arg(long, value_parser = parse_speed)]
        speed: DeviceSpeed,
    },
    /// Attach to the first free port matching the speed
    AttachFree {
        #[arg(long, allow_hyphen_values = true)]
        socket: i32,
        #[arg(long, value_parser = parse_device_id)]
        devid: DeviceId,
        #[arg(long, value_parser = parse_speed)]
        speed: DeviceSpeed,
    },
    /// Detach the device on a port
    Detach {
        #[arg(long)]
        port: u16,
    },
}

fn parse_speed(value: &str) -> std::result::Result<DeviceSpeed, String> {
    value.parse()
}

fn parse_device_id(value: &str) -> std::result::Result<DeviceId, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse::<u32>(),
    };
    parsed
        .map(DeviceId)
        .map_err(|e| format!("invalid device id '{}': {}", value, e))
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Handle --save-config flag early (before loading config)
    if args.save_config {
        let config = config::VhciConfig::default();
        let path = config::VhciConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let config = if let Some(ref path) = args.config {
        config::VhciConfig::load(Some(path.clone())).context("Failed to load configuration")?
    } else {
        config::VhciConfig::load_or_default()
    };

    // Use CLI log level if specified, otherwise use config value
    let log_level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.general.log_level);

    setup_logging(log_level).context("Failed to setup logging")?;

    debug!("vhcictl v{}", env!("CARGO_PKG_VERSION"));

    let command = args.command.unwrap_or(Command::Ports { json: false });

    let controller_path = config.sysfs.controller_path();
    let mut session = Session::open(
        SysfsControl::new(&controller_path),
        SysfsEnricher::new(config.sysfs.usb_devices_path()),
    )
    .with_context(|| {
        format!(
            "Failed to open vhci_hcd at {} (is the vhci-hcd module loaded?)",
            controller_path.display()
        )
    })?;

    let result = run(&mut session, command);
    session.close();
    result
}

fn run(session: &mut Session, command: Command) -> Result<()> {
    match command {
        Command::Ports { json } => print_records(session.ports(), json),
        Command::Attached { json } => print_records(session.attached(), json),
        Command::FreePort { speed } => {
            match session.find_free_port(speed) {
                Some(port) => println!("{}", port),
                None => anyhow::bail!("No free {} port", speed.hub_class()),
            }
            Ok(())
        }
        Command::Attach {
            port,
            socket,
            devid,
            speed,
        } => {
            session
                .attach(port, socket, devid, speed)
                .context("Failed to attach device")?;
            info!("Attached device {} to port {}", devid, port);
            show_port(session, port)
        }
        Command::AttachFree {
            socket,
            devid,
            speed,
        } => {
            let port = session
                .attach_to_free_port(socket, devid, speed)
                .context("Failed to attach device")?;
            info!("Attached device {} to port {}", devid, port);
            show_port(session, port)
        }
        Command::Detach { port } => {
            session.detach(port).context("Failed to detach device")?;
            info!("Detached port {}", port);
            show_port(session, port)
        }
    }
}

/// Refresh and print one port after a command
fn show_port(session: &mut Session, port: u16) -> Result<()> {
    session
        .refresh()
        .context("Command written, but refreshing the port table failed")?;

    match session.port_info(usize::from(port)) {
        Some(record) => print_records(std::iter::once(record), false),
        None => anyhow::bail!("Port {} is out of range ({} ports)", port, session.nports()),
    }
}

fn print_records<'a>(records: impl Iterator<Item = &'a PortRecord>, json: bool) -> Result<()> {
    if json {
        let records: Vec<&PortRecord> = records.collect();
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    println!(
        "{:<5} {:<4} {:<12} {:<10} {:<6} DEVICE",
        "PORT", "HUB", "STATUS", "DEVID", "SOCKET"
    );
    for record in records {
        println!("{}", format_record(record));
    }
    Ok(())
}

fn format_record(record: &PortRecord) -> String {
    let device = match &record.descriptor {
        Some(d) => format!(
            "{} {:04x}:{:04x} {}",
            d.bus_id,
            d.vendor_id,
            d.product_id,
            d.dev_node()
        ),
        None => "-".to_string(),
    };

    format!(
        "{:<5} {:<4} {:<12} {:<10} {:<6} {}",
        record.port,
        record.hub.tag(),
        format!("{:?}", record.status),
        format!("{:08x}", record.device_id.0),
        record.socket,
        device
    )
}
