//! The duplex byte channel the handshake runs over.
//!
//! The handshake never touches a serial port directly. It talks to a [`Channel`]:
//! something that can read single bytes, write byte slices, and (through provided
//! methods) read newline-terminated lines and fixed-length frames.
//!
//! Two adapters are included:
//!
//! - [`SerialChannel`] wraps any `embedded-hal-nb` UART, blocking on each byte with
//!   [`nb::block!`]. Suitable for `no_std` hosts.
//! - [`IoChannel`] (feature `std`) wraps any `std::io::Read + Write` handle, such as
//!   an open `serialport` port.
//!
//! Timeouts are the channel's business; the handshake waits as long as the channel
//! lets it.
//!
//! [`select_port`] picks the writer out of a list of enumerated ports by description.

use embedded_hal_nb::serial::{ErrorType, Read, Write};
use nb::block;

use crate::error::Error;

/// A blocking duplex byte channel.
///
/// Implementors provide [`read_byte`](Channel::read_byte) and [`write`](Channel::write);
/// the rest have default implementations that may be overridden when the transport
/// can do better.
pub trait Channel {
    /// Transport error.
    type Error: core::fmt::Debug;

    /// Blocks until one byte is available.
    fn read_byte(&mut self) -> Result<u8, Self::Error>;

    /// Writes every byte of `bytes`.
    fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Writes a single byte.
    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error> {
        self.write(&[byte])
    }

    /// Pushes any buffered output onto the wire.
    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Reads into `buf` until a `\n` (kept) or until `buf` is full.
    ///
    /// Returns the filled prefix of `buf`.
    fn read_line<'b>(&mut self, buf: &'b mut [u8]) -> Result<&'b [u8], Self::Error> {
        let mut len = 0;
        while len < buf.len() {
            let byte = self.read_byte()?;
            buf[len] = byte;
            len += 1;
            if byte == b'\n' {
                break;
            }
        }
        Ok(&buf[..len])
    }

    /// Fills `buf` completely.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), Self::Error> {
        for slot in buf.iter_mut() {
            *slot = self.read_byte()?;
        }
        Ok(())
    }

    /// Reads at most `buf.len()` bytes, returning how many arrived.
    ///
    /// Transports that can tell when input has stopped (a read timeout, end of
    /// stream) return a short count instead of an error. The default has no such
    /// notion and fills `buf` like [`read_exact`](Channel::read_exact).
    fn read_frame(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.read_exact(buf)?;
        Ok(buf.len())
    }
}

impl<C: Channel + ?Sized> Channel for &mut C {
    type Error = C::Error;

    fn read_byte(&mut self) -> Result<u8, Self::Error> {
        (**self).read_byte()
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        (**self).write(bytes)
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error> {
        (**self).write_byte(byte)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        (**self).flush()
    }

    fn read_line<'b>(&mut self, buf: &'b mut [u8]) -> Result<&'b [u8], Self::Error> {
        (**self).read_line(buf)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), Self::Error> {
        (**self).read_exact(buf)
    }

    fn read_frame(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        (**self).read_frame(buf)
    }
}

/// [`Channel`] over a non-blocking `embedded-hal-nb` serial peripheral.
///
/// ## Example
///
/// ```rust
/// # use embedded_hal_mock::eh1::serial::{Mock as SerialMock, Transaction as SerialTransaction};
/// use asdo_tag::channel::{Channel, SerialChannel};
///
/// # let serial = SerialMock::new(&[SerialTransaction::read_many(b"WRITER READY\n")]);
/// let mut channel = SerialChannel::new(serial);
/// let mut buf = [0u8; 64];
/// assert_eq!(channel.read_line(&mut buf).unwrap(), b"WRITER READY\n");
/// # channel.release().done();
/// ```
#[derive(Debug)]
pub struct SerialChannel<S> {
    serial: S,
}

impl<S> SerialChannel<S> {
    /// Wraps `serial`.
    pub fn new(serial: S) -> Self {
        Self { serial }
    }

    /// Gives back the wrapped peripheral.
    pub fn release(self) -> S {
        self.serial
    }
}

impl<S> Channel for SerialChannel<S>
where
    S: Read<u8> + Write<u8>,
{
    type Error = <S as ErrorType>::Error;

    fn read_byte(&mut self) -> Result<u8, Self::Error> {
        block!(self.serial.read())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        for &byte in bytes {
            block!(self.serial.write(byte))?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        block!(self.serial.flush())
    }
}

#[cfg(feature = "std")]
pub use io::IoChannel;

#[cfg(feature = "std")]
mod io {
    use std::io::{self, BufReader, ErrorKind, Read as _};

    use super::Channel;

    /// [`Channel`] over a blocking `std::io` handle, e.g. a `serialport` port
    /// opened at [`DEFAULT_BAUD_RATE`](crate::consts::DEFAULT_BAUD_RATE).
    ///
    /// Reads are buffered. A read timeout or end of stream ends the current line
    /// or frame early instead of failing, so a silent writer shows up as a line
    /// mismatch and a cut-off echo as a short frame.
    /// [`read_exact`](Channel::read_exact) still fails on either.
    #[derive(Debug)]
    pub struct IoChannel<T> {
        inner: BufReader<T>,
    }

    impl<T: io::Read + io::Write> IoChannel<T> {
        /// Wraps `port`.
        pub fn new(port: T) -> Self {
            Self {
                inner: BufReader::new(port),
            }
        }

        /// Gives back the wrapped handle. Unread buffered input is discarded.
        pub fn release(self) -> T {
            self.inner.into_inner()
        }
    }

    impl<T: io::Read + io::Write> Channel for IoChannel<T> {
        type Error = io::Error;

        fn read_byte(&mut self) -> io::Result<u8> {
            let mut byte = [0u8; 1];
            self.inner.read_exact(&mut byte)?;
            Ok(byte[0])
        }

        fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
            self.inner.get_mut().write_all(bytes)
        }

        fn flush(&mut self) -> io::Result<()> {
            self.inner.get_mut().flush()
        }

        fn read_line<'b>(&mut self, buf: &'b mut [u8]) -> io::Result<&'b [u8]> {
            let mut len = 0;
            while len < buf.len() {
                match self.read_byte() {
                    Ok(byte) => {
                        buf[len] = byte;
                        len += 1;
                        if byte == b'\n' {
                            break;
                        }
                    }
                    Err(e) if input_stopped(&e) => break,
                    Err(e) => return Err(e),
                }
            }
            Ok(&buf[..len])
        }

        fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
            self.inner.read_exact(buf)
        }

        fn read_frame(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            for (len, slot) in buf.iter_mut().enumerate() {
                match self.read_byte() {
                    Ok(byte) => *slot = byte,
                    Err(e) if input_stopped(&e) => return Ok(len),
                    Err(e) => return Err(e),
                }
            }
            Ok(buf.len())
        }
    }

    fn input_stopped(err: &io::Error) -> bool {
        matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::UnexpectedEof)
    }
}

/// An enumerated serial port.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct PortInfo<'a> {
    /// OS device name, e.g. `/dev/ttyACM0` or `COM3`.
    pub name: &'a str,
    /// Human-readable description reported by the OS.
    pub description: &'a str,
}

/// Returns the first port whose name or description contains `needle`
/// (normally [`PERIPHERAL_DESCRIPTION`](crate::consts::PERIPHERAL_DESCRIPTION)).
///
/// # Errors
/// [`Error::PeripheralNotFound`] when nothing matches.
pub fn select_port<'a, I, E>(ports: I, needle: &str) -> Result<PortInfo<'a>, Error<E>>
where
    I: IntoIterator<Item = PortInfo<'a>>,
{
    ports
        .into_iter()
        .find(|port| port.description.contains(needle) || port.name.contains(needle))
        .ok_or(Error::PeripheralNotFound)
}
