//! Controller status table parsing
//!
//! Each controller prints a table like:
//!
//! ```text
//! hub port sta spd dev      sockfd local_busid
//! hs  0000 006 002 00010002 000010 2-1
//! hs  0001 004 000 00000000 000000 0-0
//! ss  0008 004 000 00000000 000000 0-0
//! ```
//!
//! Columns: hub tier, port, status code, speed code, device id (hex),
//! socket descriptor, local bus id. The first five columns are mandatory;
//! socket and bus id may be absent on free ports.

use crate::enricher::DeviceEnricher;
use crate::error::{Result, VhciError};
use crate::types::{DeviceId, DeviceSpeed, HubSpeed, PortRecord, PortStatus};
use tracing::debug;

/// Longest bus id the kernel reports (`SYSFS_BUS_ID_SIZE` minus NUL)
pub const BUS_ID_MAX: usize = 31;

/// Fields that must scan for a line to be considered at all
const MIN_FIELDS: usize = 5;

/// Columns of one status line, scanned left to right
#[derive(Debug, Default)]
struct RawLine<'a> {
    hub: &'a str,
    port: u16,
    status: u32,
    speed: u32,
    device_id: u32,
    socket: i32,
    bus_id: Option<&'a str>,
}

/// Scan columns in order, stopping at the first that does not parse
///
/// Returns the partially filled line and how many columns were read.
fn scan_line(line: &str) -> (RawLine<'_>, usize) {
    let mut raw = RawLine::default();
    let mut tokens = line.split_whitespace();
    let mut scanned = 0;

    macro_rules! scan {
        ($field:ident, $parse:expr) => {
            match tokens.next().map($parse) {
                Some(Ok(value)) => {
                    raw.$field = value;
                    scanned += 1;
                }
                _ => return (raw, scanned),
            }
        };
    }

    match tokens.next() {
        Some(token) => {
            raw.hub = token;
            scanned += 1;
        }
        None => return (raw, scanned),
    }
    scan!(port, str::parse::<u16>);
    scan!(status, str::parse::<u32>);
    scan!(speed, str::parse::<u32>);
    scan!(device_id, |t| u32::from_str_radix(t, 16));
    scan!(socket, str::parse::<i32>);

    if let Some(token) = tokens.next() {
        // Longer ids are cut like a bounded `%31s` scan
        let end = token
            .char_indices()
            .nth(BUS_ID_MAX)
            .map_or(token.len(), |(i, _)| i);
        raw.bus_id = Some(&token[..end]);
        scanned += 1;
    }

    (raw, scanned)
}

/// Parse one data line into a port record
///
/// Occupied ports are described through `enricher`; a port that cannot be
/// described is rejected like any other malformed line.
pub fn parse_line<E: DeviceEnricher>(
    line_number: usize,
    line: &str,
    enricher: &E,
) -> Result<PortRecord> {
    let (raw, scanned) = scan_line(line);

    if scanned < MIN_FIELDS {
        return Err(VhciError::malformed(
            line_number,
            line,
            format!("only {} of {} required fields", scanned, MIN_FIELDS),
        ));
    }

    let hub = HubSpeed::from_tag(raw.hub).ok_or_else(|| {
        VhciError::malformed(line_number, line, format!("unknown hub tag {:?}", raw.hub))
    })?;

    let status = PortStatus::from_code(raw.status).ok_or_else(|| {
        VhciError::malformed(line_number, line, format!("unknown status {}", raw.status))
    })?;

    debug!(
        "hub {} port {} status {:?} speed {} devid {:x} sockfd {} busid {:?}",
        raw.hub, raw.port, status, raw.speed, raw.device_id, raw.socket, raw.bus_id
    );

    let descriptor = if status.is_free() {
        None
    } else {
        let bus_id = raw.bus_id.ok_or_else(|| {
            VhciError::malformed(line_number, line, "occupied port without bus id")
        })?;
        let descriptor = enricher
            .describe(bus_id)
            .map_err(|reason| VhciError::malformed(line_number, line, reason))?;
        Some(descriptor)
    };

    Ok(PortRecord {
        port: raw.port,
        hub,
        status,
        speed: DeviceSpeed::from_code(raw.speed),
        device_id: DeviceId(raw.device_id),
        socket: raw.socket,
        descriptor,
    })
}

/// Lazily parsed records of one controller's status text
///
/// Yields one item per data line in file order. After the first error the
/// iterator is fused and yields nothing more.
pub struct StatusRecords<'a, E> {
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
    enricher: &'a E,
    last: (usize, &'a str),
    failed: bool,
}

impl<'a, E> StatusRecords<'a, E> {
    /// Line number and text of the line most recently parsed
    pub fn last_line(&self) -> (usize, &'a str) {
        self.last
    }
}

impl<E: DeviceEnricher> Iterator for StatusRecords<'_, E> {
    type Item = Result<PortRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            let (index, line) = self.lines.next()?;
            if line.trim().is_empty() {
                continue;
            }

            self.last = (index + 1, line);
            let result = parse_line(index + 1, line, self.enricher);
            self.failed = result.is_err();
            return Some(result);
        }
    }
}

impl<E: DeviceEnricher> std::iter::FusedIterator for StatusRecords<'_, E> {}

/// Parse a controller's status text, skipping the header line
///
/// Fails immediately if the text has no line break after the header.
pub fn parse_status<'a, E: DeviceEnricher>(
    text: &'a str,
    enricher: &'a E,
) -> Result<StatusRecords<'a, E>> {
    let (_header, body) = text
        .split_once('\n')
        .ok_or_else(|| VhciError::malformed(0, text, "missing header line"))?;

    Ok(StatusRecords {
        lines: body.lines().enumerate(),
        enricher,
        last: (0, ""),
        failed: false,
    })
}
