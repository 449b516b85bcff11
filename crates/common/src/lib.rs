//! Common utilities for vhci-rs
//!
//! Shared error handling and logging setup used by the library and the
//! `vhcictl` front end.

pub mod error;
pub mod logging;

pub use error::{Error, Result};
pub use logging::{LOG_LEVELS, setup_logging};
