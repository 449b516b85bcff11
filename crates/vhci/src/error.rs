//! VHCI error types

use crate::types::HubSpeed;
use thiserror::Error;

/// Errors raised while talking to a vhci_hcd controller
#[derive(Debug, Error)]
pub enum VhciError {
    /// Controllers or ports could not be discovered
    #[error("Enumeration error: {0}")]
    Enumeration(String),

    /// A required read-only attribute is absent or unparsable
    #[error("Attribute '{name}' missing or invalid: {reason}")]
    AttributeMissing { name: String, reason: String },

    /// A status line failed validation or its device could not be described
    #[error("Malformed status line {line_number} of controller {controller}: {reason} ({line:?})")]
    MalformedStatusLine {
        controller: usize,
        line_number: usize,
        line: String,
        reason: String,
    },

    /// Writing an attach or detach command failed
    #[error("Failed to write '{command}' to {attribute}: {source}")]
    ControlWrite {
        attribute: &'static str,
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// No free port exists on the requested hub tier
    #[error("No available {hub} VHCI ports (detach a device to free a port)")]
    NoFreePort { hub: HubSpeed },
}

impl VhciError {
    pub(crate) fn attribute_missing(name: &str, reason: impl ToString) -> Self {
        VhciError::AttributeMissing {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn malformed(line_number: usize, line: &str, reason: impl ToString) -> Self {
        VhciError::MalformedStatusLine {
            controller: 0,
            line_number,
            line: line.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Attach the controller index to a status-line error
    pub(crate) fn in_controller(self, index: usize) -> Self {
        match self {
            VhciError::MalformedStatusLine {
                line_number,
                line,
                reason,
                ..
            } => VhciError::MalformedStatusLine {
                controller: index,
                line_number,
                line,
                reason,
            },
            other => other,
        }
    }
}

/// Type alias for VHCI results
pub type Result<T> = std::result::Result<T, VhciError>;
