//! Error types for encoding and the writer handshake.

use core::fmt;

use thiserror::Error;

use crate::consts::{BLOCK_LEN, EXIT_FAILURE, EXIT_SUCCESS};
#[cfg(not(feature = "std"))]
use crate::consts::MAX_LINE_LEN;
use crate::encoding::Block;
use crate::record::Field;

/// Text of a line received from the writer, kept as failure detail.
#[cfg(feature = "std")]
pub type Line = String;

/// Text of a line received from the writer, kept as failure detail.
#[cfg(not(feature = "std"))]
pub type Line = heapless::String<MAX_LINE_LEN>;

/// Bytes the writer echoed back, as many as arrived (at most one block).
pub type Echo = heapless::Vec<u8, BLOCK_LEN>;

/// A field value that does not fit its wire width.
///
/// Only produced by [`ConfigurationRecord::validate`](crate::record::ConfigurationRecord::validate);
/// encoding itself truncates instead.
#[derive(Error, PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
#[error("{field} value {value} does not fit in {} bits", .field.width())]
pub struct OutOfRange {
    /// Offending field.
    pub field: Field,
    /// Value supplied for it.
    pub value: u32,
}

/// An approach direction string other than `N` or `S`.
#[derive(Error, PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
#[error("approach direction must be `N` or `S`")]
pub struct ParseDirectionError;

/// Everything that can end a tag write.
///
/// `E` is the error type of the underlying [`Channel`](crate::channel::Channel).
/// Protocol variants are terminal for their session; nothing is retried internally.
#[derive(Error, Debug)]
pub enum Error<E> {
    /// A record field was rejected by strict validation.
    #[error("encoding out of range: {0}")]
    EncodingOutOfRange(#[from] OutOfRange),
    /// No serial port matched the writer's description.
    #[error("No peripheral detected")]
    PeripheralNotFound,
    /// The first line from the writer was not `WRITER READY`.
    #[error("Writer not detected")]
    WriterNotDetected,
    /// The echoed block differs from the block that was sent.
    #[error("Block echo failed")]
    EchoMismatch {
        /// Block written to the channel.
        sent: Block,
        /// Bytes read back from the writer. Shorter than a block if the echo was cut off.
        echoed: Echo,
    },
    /// The writer finished with something other than `WRITE DONE`.
    #[error("Error while writing: {0}")]
    WriteFailed(Line),
    /// The channel itself failed.
    #[error("channel error: {0:?}")]
    Channel(E),
}

/// Which kind of [`Error`] ended a write, without its payload.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum FailureReason {
    /// See [`Error::EncodingOutOfRange`].
    EncodingOutOfRange,
    /// See [`Error::PeripheralNotFound`].
    PeripheralNotFound,
    /// See [`Error::WriterNotDetected`].
    WriterNotDetected,
    /// See [`Error::EchoMismatch`].
    EchoMismatch,
    /// See [`Error::WriteFailed`].
    WriteFailed,
    /// See [`Error::Channel`].
    Channel,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureReason::EncodingOutOfRange => "encoding out of range",
            FailureReason::PeripheralNotFound => "peripheral not found",
            FailureReason::WriterNotDetected => "writer not detected",
            FailureReason::EchoMismatch => "echo mismatch",
            FailureReason::WriteFailed => "write failed",
            FailureReason::Channel => "channel error",
        })
    }
}

impl<E> Error<E> {
    /// The kind of this error.
    pub fn reason(&self) -> FailureReason {
        match self {
            Error::EncodingOutOfRange(_) => FailureReason::EncodingOutOfRange,
            Error::PeripheralNotFound => FailureReason::PeripheralNotFound,
            Error::WriterNotDetected => FailureReason::WriterNotDetected,
            Error::EchoMismatch { .. } => FailureReason::EchoMismatch,
            Error::WriteFailed(_) => FailureReason::WriteFailed,
            Error::Channel(_) => FailureReason::Channel,
        }
    }
}

/// Maps the outcome of a tag write to the process exit status.
///
/// `0` on success, `1` on any failure.
pub fn exit_code<T, E>(result: &Result<T, Error<E>>) -> u8 {
    match result {
        Ok(_) => EXIT_SUCCESS,
        Err(_) => EXIT_FAILURE,
    }
}
