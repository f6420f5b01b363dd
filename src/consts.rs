//! Constants used across the block encoder and the writer handshake.
//!
//! This module defines the block geometry, the textual control signals
//! exchanged with the tag writer, and the single-byte confirm/abort codes.
//!
//! ## Key Concepts
//!
//! - **Block**: Fixed 16-byte payload, one MIFARE Classic 1K data block.
//! - **Signals**: Newline-terminated ASCII lines sent by the writer, compared
//!   after trimming surrounding whitespace.
//! - **Control bytes**: Raw bytes sent by the host after the echo check.
//! - **Line Limits**: Upper bound on how much of a signal line is kept.

/// Length (in bytes) of an encoded ASDO/CSDE block.
pub const BLOCK_LEN: usize = 16;

/// Number of leading block bytes that carry record fields.
///
/// Bytes `BLOCK_PAYLOAD_LEN..BLOCK_LEN` are reserved and always zero.
pub const BLOCK_PAYLOAD_LEN: usize = 6;

/// Block slot used by this application on a multi-block tag.
pub const DEFAULT_BLOCK_ID: u8 = 0;

/// Application code written when none is given.
pub const DEFAULT_APPLICATION_CODE: u8 = 1;

/// Layout version written when none is given.
pub const DEFAULT_VERSION: u8 = 0;

/// Line the writer sends once it is ready to receive a block.
pub const WRITER_READY: &str = "WRITER READY";

/// Line the writer sends once the tag has been written successfully.
pub const WRITE_DONE: &str = "WRITE DONE";

/// Sent after a matching echo; tells the writer to commit the block.
pub const PROCEED_BYTE: u8 = 0x40;

/// Sent after a mismatched echo; tells the writer to discard the block.
pub const ABORT_BYTE: u8 = 0x00;

/// Maximum number of bytes kept from a single signal line, newline included.
///
/// Longer lines are cut at this length, which can never equal a valid signal.
pub const MAX_LINE_LEN: usize = 64;

/// Description substring used to recognise the writer when listing serial ports.
pub const PERIPHERAL_DESCRIPTION: &str = "Arduino";

/// Default serial baud rate of the writer firmware.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Process exit status for a completed write.
pub const EXIT_SUCCESS: u8 = 0;

/// Process exit status for any failure.
pub const EXIT_FAILURE: u8 = 1;
