//! # asdo-tag
//!
//! A portable, no_std Rust library for programming ASDO/CSDE station tags: the MIFARE
//! Classic 1K tags that tell an approaching train where it may stop automatically and
//! which doors may open.
//!
//! The crate covers the two parts of that job with real correctness constraints:
//! - bit-exact encoding of a [`ConfigurationRecord`](record::ConfigurationRecord) into its
//!   16-byte block ([`encoding`])
//! - delivering that block to the tag writer over a serial line and confirming the write,
//!   using the writer's ready/echo/confirm handshake ([`handshake`])
//!
//! ## Crate features
//! | Feature     | Description |
//! |-------------|-------------|
//! | `std`       | Uses `std::string::String` for writer diagnostics and enables [`channel::IoChannel`] |
//! | `defmt-0-3` | Uses `defmt` logging |
//! | `log`       | Uses `log` logging |
//!
//! ## Usage
//!
//! ```rust,ignore
//! use asdo_tag::channel::IoChannel;
//! use asdo_tag::handshake::write_tag;
//! use asdo_tag::record::{ApproachDirection, ConfigurationRecord, DoorEnable};
//!
//! let record = ConfigurationRecord::new(ApproachDirection::North, 250, 1204, 3)
//!     .with_door_enable(DoorEnable::Left | DoorEnable::Right);
//! let port = serialport::new("/dev/ttyACM0", 115_200).open()?;
//! write_tag(IoChannel::new(port), &record)?;
//! ```
//!
//! On a bare-metal host, wrap the UART in [`channel::SerialChannel`] instead.
//!
//! ## Integration Notes
//!
//! - The handshake has no timeouts of its own; configure a read timeout on the port.
//! - Out-of-range field values are masked, matching the legacy tag writer. Call
//!   [`ConfigurationRecord::validate`](record::ConfigurationRecord::validate) to reject them.
//! - Map results to a process status with [`error::exit_code`].

#![deny(
    bad_style,
    dead_code,
    improper_ctypes,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    unconditional_recursion,
    unused,
    while_true,
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    unused_results
)]
#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
pub use heapless;

#[macro_use]
mod fmt;

pub mod channel;
pub mod consts;
pub mod encoding;
pub mod error;
pub mod handshake;
pub mod record;

pub use encoding::{Block, encode};
pub use error::Error;
pub use handshake::write_tag;
pub use record::ConfigurationRecord;
