//! Host side of the tag writer's block transfer handshake.
//!
//! The writer (an Arduino driving an RFID module) and the host share one serial line
//! that carries both ASCII control lines and raw block bytes, so every read and write
//! has to happen in exactly the right order. [`HandshakeSession`] makes that order an
//! explicit state machine:
//!
//! ```text
//! Idle ─▶ AwaitingReady ─▶ Sending ─▶ VerifyingEcho ─▶ AwaitingDone ─▶ Success
//!              │                            │                │
//!              ▼                            ▼                ▼
//!     Failed(WriterNotDetected)   Failed(EchoMismatch)  Failed(WriteFailed)
//! ```
//!
//! | State | Reads | Writes |
//! |-------|-------|--------|
//! | `AwaitingReady` | one line, must be `WRITER READY` | — |
//! | `Sending` | — | the 16 block bytes |
//! | `VerifyingEcho` | up to 16 bytes, must equal the block | `0x40` on match, `0x00` on mismatch |
//! | `AwaitingDone` | one line, must be `WRITE DONE` | — |
//!
//! An echo cut short by the channel (timeout, end of stream) is a mismatch. Any other
//! channel error ends the session in `Failed(Channel)`.
//!
//! Nothing is retried. To retry, run a new session; [`HandshakeClient`] does this
//! bookkeeping across sessions on one channel.
//!
//! ## Example
//!
//! ```rust
//! # use embedded_hal_mock::eh1::serial::{Mock as SerialMock, Transaction as SerialTransaction};
//! use asdo_tag::channel::SerialChannel;
//! use asdo_tag::encoding::encode;
//! use asdo_tag::handshake::write_tag;
//! use asdo_tag::record::{ApproachDirection, ConfigurationRecord, DoorEnable};
//!
//! let record = ConfigurationRecord::new(ApproachDirection::North, 250, 1204, 3)
//!     .with_door_enable(DoorEnable::Left);
//! # let block = encode(&record);
//! # let serial = SerialMock::new(&[
//! #     SerialTransaction::read_many(b"WRITER READY\r\n"),
//! #     SerialTransaction::write_many(block.0),
//! #     SerialTransaction::flush(),
//! #     SerialTransaction::read_many(block.0),
//! #     SerialTransaction::write(0x40),
//! #     SerialTransaction::flush(),
//! #     SerialTransaction::read_many(b"WRITE DONE\r\n"),
//! # ]);
//! let mut channel = SerialChannel::new(serial);
//!
//! write_tag(&mut channel, &record).unwrap();
//! # channel.release().done();
//! ```

use core::fmt;

use crate::channel::Channel;
use crate::consts::{ABORT_BYTE, BLOCK_LEN, MAX_LINE_LEN, PROCEED_BYTE, WRITE_DONE, WRITER_READY};
use crate::encoding::{Block, encode};
use crate::error::{Echo, Error, FailureReason, Line};
use crate::record::ConfigurationRecord;

/// Protocol state of a [`HandshakeSession`].
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum HandshakeState {
    /// Created, nothing exchanged yet.
    #[default]
    Idle,
    /// Waiting for the writer's `WRITER READY` line.
    AwaitingReady,
    /// About to send the block.
    Sending,
    /// Waiting for the writer to echo the block back.
    VerifyingEcho,
    /// Proceed byte sent; waiting for `WRITE DONE`.
    AwaitingDone,
    /// The writer confirmed the tag write.
    Success,
    /// The session ended early.
    Failed(FailureReason),
}

impl HandshakeState {
    /// Whether the session has ended, either way.
    pub fn is_terminal(self) -> bool {
        matches!(self, HandshakeState::Success | HandshakeState::Failed(_))
    }
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeState::Idle => f.write_str("idle"),
            HandshakeState::AwaitingReady => f.write_str("awaiting ready"),
            HandshakeState::Sending => f.write_str("sending"),
            HandshakeState::VerifyingEcho => f.write_str("verifying echo"),
            HandshakeState::AwaitingDone => f.write_str("awaiting done"),
            HandshakeState::Success => f.write_str("success"),
            HandshakeState::Failed(reason) => write!(f, "failed ({reason})"),
        }
    }
}

/// One attempt at writing one block over one channel.
///
/// Holds the channel exclusively for its lifetime, so two sessions can never
/// interleave on the same line.
#[derive(Debug)]
pub struct HandshakeSession<'c, C> {
    channel: &'c mut C,
    block: Block,
    state: HandshakeState,
    line: [u8; MAX_LINE_LEN],
}

impl<'c, C: Channel> HandshakeSession<'c, C> {
    /// Starts a session in [`HandshakeState::Idle`]. No I/O happens until [`run`](Self::run).
    pub fn new(channel: &'c mut C, block: Block) -> Self {
        Self {
            channel,
            block,
            state: HandshakeState::Idle,
            line: [0; MAX_LINE_LEN],
        }
    }

    /// Current state.
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// The block this session delivers.
    pub fn block(&self) -> &Block {
        &self.block
    }

    /// Drives the protocol to completion.
    ///
    /// # Errors
    /// - [`Error::WriterNotDetected`] if the first line is not `WRITER READY`. Nothing is sent.
    /// - [`Error::EchoMismatch`] if the echo differs or is cut short. `0x00` has been
    ///   sent, or at least attempted.
    /// - [`Error::WriteFailed`] with the writer's line if it is not `WRITE DONE`.
    /// - [`Error::Channel`] if the channel fails at any point.
    pub fn run(mut self) -> Result<(), Error<C::Error>> {
        while !self.state.is_terminal() {
            self.step()?;
        }
        Ok(())
    }

    /// Advances by one state. Terminal states are left as they are.
    fn step(&mut self) -> Result<(), Error<C::Error>> {
        if self.state.is_terminal() {
            return Ok(());
        }
        match self.advance() {
            Ok(next) => {
                debug!("handshake: {} -> {}", self.state, next);
                self.state = next;
                Ok(())
            }
            Err(err) => {
                let reason = err.reason();
                warn!("handshake failed while {}: {}", self.state, reason);
                self.state = HandshakeState::Failed(reason);
                Err(err)
            }
        }
    }

    fn advance(&mut self) -> Result<HandshakeState, Error<C::Error>> {
        match self.state {
            HandshakeState::Idle => Ok(HandshakeState::AwaitingReady),
            HandshakeState::AwaitingReady => {
                let signal = self.read_signal()?;
                if signal != WRITER_READY {
                    warn!("expected writer ready, got: {}", signal);
                    return Err(Error::WriterNotDetected);
                }
                Ok(HandshakeState::Sending)
            }
            HandshakeState::Sending => {
                self.channel.write(&self.block.0).map_err(Error::Channel)?;
                self.channel.flush().map_err(Error::Channel)?;
                Ok(HandshakeState::VerifyingEcho)
            }
            HandshakeState::VerifyingEcho => {
                let mut echo = [0u8; BLOCK_LEN];
                let len = self.channel.read_frame(&mut echo).map_err(Error::Channel)?;
                let echoed = &echo[..len];
                if echoed != &self.block.0[..] {
                    if let Err(err) = self.send_control(ABORT_BYTE) {
                        warn!("abort byte not delivered: {}", err.reason());
                    }
                    return Err(Error::EchoMismatch {
                        sent: self.block,
                        echoed: echoed.iter().copied().collect::<Echo>(),
                    });
                }
                self.send_control(PROCEED_BYTE)?;
                Ok(HandshakeState::AwaitingDone)
            }
            HandshakeState::AwaitingDone => {
                let signal = self.read_signal()?;
                if signal != WRITE_DONE {
                    return Err(Error::WriteFailed(to_line(signal)));
                }
                Ok(HandshakeState::Success)
            }
            HandshakeState::Success | HandshakeState::Failed(_) => Ok(self.state),
        }
    }

    fn read_signal(&mut self) -> Result<&str, Error<C::Error>> {
        let line = self
            .channel
            .read_line(&mut self.line)
            .map_err(Error::Channel)?;
        Ok(signal_text(line))
    }

    fn send_control(&mut self, byte: u8) -> Result<(), Error<C::Error>> {
        self.channel.write_byte(byte).map_err(Error::Channel)?;
        self.channel.flush().map_err(Error::Channel)
    }
}

/// Decodes a received line and trims surrounding whitespace.
///
/// Bytes from the first invalid UTF-8 sequence onward are dropped.
fn signal_text(line: &[u8]) -> &str {
    let text = match core::str::from_utf8(line) {
        Ok(text) => text,
        Err(e) => core::str::from_utf8(&line[..e.valid_up_to()]).unwrap_or_default(),
    };
    text.trim()
}

fn to_line(text: &str) -> Line {
    let mut line = Line::new();
    // Fits: `text` came out of a MAX_LINE_LEN buffer.
    let _ = line.push_str(text);
    line
}

/// Writes blocks over a channel it owns, one [`HandshakeSession`] per block.
///
/// The channel is released (dropped, closing it) with the client, on every path.
#[derive(Debug)]
pub struct HandshakeClient<C> {
    channel: C,
    last_state: HandshakeState,

    /// Number of sessions that ended in [`HandshakeState::Success`].
    pub writes_good: u32,

    /// Number of sessions that ended in [`HandshakeState::Failed`].
    pub writes_failed: u32,
}

impl<C: Channel> HandshakeClient<C> {
    /// Takes ownership of an open channel.
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            last_state: HandshakeState::Idle,
            writes_good: 0,
            writes_failed: 0,
        }
    }

    /// Runs one session delivering `block`.
    ///
    /// # Errors
    /// See [`HandshakeSession::run`].
    pub fn write_block(&mut self, block: &Block) -> Result<(), Error<C::Error>> {
        info!("block to write: {}", block);
        let result = HandshakeSession::new(&mut self.channel, *block).run();
        match &result {
            Ok(()) => {
                info!("block written");
                self.writes_good = self.writes_good.saturating_add(1);
                self.last_state = HandshakeState::Success;
            }
            Err(err) => {
                self.writes_failed = self.writes_failed.saturating_add(1);
                self.last_state = HandshakeState::Failed(err.reason());
            }
        }
        result
    }

    /// Encodes `record` and writes it with [`write_block`](Self::write_block).
    ///
    /// # Errors
    /// See [`HandshakeSession::run`].
    pub fn write_record(&mut self, record: &ConfigurationRecord) -> Result<(), Error<C::Error>> {
        self.write_block(&encode(record))
    }

    /// Final state of the most recent session, or [`HandshakeState::Idle`] before the first.
    pub fn last_state(&self) -> HandshakeState {
        self.last_state
    }

    /// Gives back the channel.
    pub fn release(self) -> C {
        self.channel
    }
}

/// Encodes `record` and writes it over `channel` in a single session.
///
/// `channel` is dropped before returning, whatever the outcome.
///
/// # Errors
/// See [`HandshakeSession::run`].
pub fn write_tag<C: Channel>(
    channel: C,
    record: &ConfigurationRecord,
) -> Result<(), Error<C::Error>> {
    HandshakeClient::new(channel).write_record(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{IoChannel, SerialChannel};
    use crate::record::{ApproachDirection, DoorEnable};
    use embedded_hal_mock::eh1::serial::{Mock as SerialMock, Transaction as SerialTransaction};
    use embedded_hal_nb::serial::ErrorKind;
    use std::io::{self, Cursor};

    fn record() -> ConfigurationRecord {
        ConfigurationRecord::new(ApproachDirection::South, 180, 2048, 4)
            .with_door_enable(DoorEnable::Both)
    }

    fn happy_path(block: &Block) -> [SerialTransaction<u8>; 7] {
        [
            SerialTransaction::read_many(b"WRITER READY\r\n"),
            SerialTransaction::write_many(block.0),
            SerialTransaction::flush(),
            SerialTransaction::read_many(block.0),
            SerialTransaction::write(PROCEED_BYTE),
            SerialTransaction::flush(),
            SerialTransaction::read_many(b"WRITE DONE\r\n"),
        ]
    }

    #[test]
    fn test_happy_path_sends_proceed_once() {
        let block = encode(&record());
        let serial = SerialMock::new(&happy_path(&block));
        let mut client = HandshakeClient::new(SerialChannel::new(serial));

        assert!(client.write_block(&block).is_ok());
        assert_eq!(client.last_state(), HandshakeState::Success);
        assert_eq!(client.writes_good, 1);
        assert_eq!(client.writes_failed, 0);
        client.release().release().done();
    }

    #[test]
    fn test_session_walks_every_state() {
        let block = encode(&record());
        let mut channel = SerialChannel::new(SerialMock::new(&happy_path(&block)));
        let mut session = HandshakeSession::new(&mut channel, block);

        assert_eq!(session.state(), HandshakeState::Idle);
        assert_eq!(session.block(), &block);
        for expected in [
            HandshakeState::AwaitingReady,
            HandshakeState::Sending,
            HandshakeState::VerifyingEcho,
            HandshakeState::AwaitingDone,
            HandshakeState::Success,
        ] {
            session.step().unwrap();
            assert_eq!(session.state(), expected);
        }
        session.step().unwrap();
        assert_eq!(session.state(), HandshakeState::Success);
        channel.release().done();
    }

    #[test]
    fn test_ready_mismatch_writes_nothing() {
        let block = encode(&record());
        let serial = SerialMock::new(&[SerialTransaction::read_many(b"NOT READY\n")]);
        let mut client = HandshakeClient::new(SerialChannel::new(serial));

        let result = client.write_block(&block);
        assert!(matches!(result, Err(Error::WriterNotDetected)));
        assert_eq!(
            client.last_state(),
            HandshakeState::Failed(FailureReason::WriterNotDetected)
        );
        client.release().release().done();
    }

    #[test]
    fn test_echo_mismatch_sends_abort_only() {
        let block = encode(&record());
        let mut corrupted = block;
        corrupted.0[3] ^= 0x10;
        let serial = SerialMock::new(&[
            SerialTransaction::read_many(b"WRITER READY\n"),
            SerialTransaction::write_many(block.0),
            SerialTransaction::flush(),
            SerialTransaction::read_many(corrupted.0),
            SerialTransaction::write(ABORT_BYTE),
            SerialTransaction::flush(),
        ]);
        let mut client = HandshakeClient::new(SerialChannel::new(serial));

        match client.write_block(&block) {
            Err(Error::EchoMismatch { sent, echoed }) => {
                assert_eq!(sent, block);
                assert_eq!(echoed[..], corrupted.0[..]);
            }
            other => panic!("expected echo mismatch, got {other:?}"),
        }
        assert_eq!(client.writes_failed, 1);
        client.release().release().done();
    }

    #[test]
    fn test_failed_abort_still_reports_echo_mismatch() {
        let block = encode(&record());
        let mut corrupted = block;
        corrupted.0[0] ^= 0x01;
        let serial = SerialMock::new(&[
            SerialTransaction::read_many(b"WRITER READY\n"),
            SerialTransaction::write_many(block.0),
            SerialTransaction::flush(),
            SerialTransaction::read_many(corrupted.0),
            SerialTransaction::write_error(ABORT_BYTE, nb::Error::Other(ErrorKind::Other)),
        ]);
        let mut client = HandshakeClient::new(SerialChannel::new(serial));

        let result = client.write_block(&block);
        assert!(matches!(result, Err(Error::EchoMismatch { .. })));
        assert_eq!(
            client.last_state(),
            HandshakeState::Failed(FailureReason::EchoMismatch)
        );
        client.release().release().done();
    }

    #[test]
    fn test_done_mismatch_carries_writer_message() {
        let block = encode(&record());
        let serial = SerialMock::new(&[
            SerialTransaction::read_many(b"WRITER READY\n"),
            SerialTransaction::write_many(block.0),
            SerialTransaction::flush(),
            SerialTransaction::read_many(block.0),
            SerialTransaction::write(PROCEED_BYTE),
            SerialTransaction::flush(),
            SerialTransaction::read_many(b"ERROR: bad checksum\n"),
        ]);
        let mut client = HandshakeClient::new(SerialChannel::new(serial));

        match client.write_block(&block) {
            Err(Error::WriteFailed(detail)) => assert_eq!(detail, "ERROR: bad checksum"),
            other => panic!("expected write failure, got {other:?}"),
        }
        assert_eq!(
            client.last_state(),
            HandshakeState::Failed(FailureReason::WriteFailed)
        );
        client.release().release().done();
    }

    #[test]
    fn test_caller_retry_runs_fresh_session() {
        let block = encode(&record());
        let mut script = Vec::from([SerialTransaction::read_many(b"BOOTING\n")]);
        script.extend(happy_path(&block));
        let mut client = HandshakeClient::new(SerialChannel::new(SerialMock::new(&script)));

        assert!(client.write_record(&record()).is_err());
        assert!(client.write_record(&record()).is_ok());
        assert_eq!(client.writes_good, 1);
        assert_eq!(client.writes_failed, 1);
        client.release().release().done();
    }

    #[test]
    fn test_signal_text_trims_and_tolerates_bad_utf8() {
        assert_eq!(signal_text(b"  WRITE DONE \r\n"), "WRITE DONE");
        assert_eq!(signal_text(b"WRITE\xFFDONE\n"), "WRITE");
        assert_eq!(signal_text(b""), "");
    }

    /// Scripted port: reads come from `input`, writes land in `output`.
    ///
    /// Once `input` runs dry, reads hit end of stream, or time out if `times_out` is set.
    #[derive(Debug, Default)]
    struct Port {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
        times_out: bool,
    }

    impl Port {
        fn with_input(input: &[u8]) -> Self {
            Self {
                input: Cursor::new(input.to_vec()),
                output: Vec::new(),
                times_out: false,
            }
        }

        fn timing_out(input: &[u8]) -> Self {
            Self {
                times_out: true,
                ..Self::with_input(input)
            }
        }
    }

    impl io::Read for Port {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = io::Read::read(&mut self.input, buf)?;
            if n == 0 && !buf.is_empty() && self.times_out {
                return Err(io::Error::from(io::ErrorKind::TimedOut));
            }
            Ok(n)
        }
    }

    impl io::Write for Port {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_silent_writer_is_not_detected() {
        let mut channel = IoChannel::new(Port::with_input(b""));

        let result = write_tag(&mut channel, &record());
        assert!(matches!(result, Err(Error::WriterNotDetected)));
        assert!(channel.release().output.is_empty());
    }

    fn expect_short_echo(port: Port, block: &Block, received: usize) {
        let mut channel = IoChannel::new(port);

        match write_tag(&mut channel, &record()) {
            Err(Error::EchoMismatch { sent, echoed }) => {
                assert_eq!(&sent, block);
                assert_eq!(echoed[..], block.0[..received]);
            }
            other => panic!("expected echo mismatch, got {other:?}"),
        }
        let mut expected = Vec::from(&block.0[..]);
        expected.push(ABORT_BYTE);
        assert_eq!(channel.release().output, expected);
    }

    #[test]
    fn test_timed_out_echo_aborts() {
        let block = encode(&record());
        let mut input = Vec::from(&b"WRITER READY\n"[..]);
        input.extend_from_slice(&block.0[..10]);

        expect_short_echo(Port::timing_out(&input), &block, 10);
    }

    #[test]
    fn test_truncated_echo_aborts() {
        let block = encode(&record());
        let mut input = Vec::from(&b"WRITER READY\n"[..]);
        input.extend_from_slice(&block.0[..6]);

        expect_short_echo(Port::with_input(&input), &block, 6);
    }

    #[test]
    fn test_missing_echo_aborts() {
        let block = encode(&record());

        expect_short_echo(Port::timing_out(b"WRITER READY\n"), &block, 0);
    }

    #[test]
    fn test_write_tag_over_io_port() {
        let block = encode(&record());
        let mut input = Vec::from(&b"WRITER READY\r\n"[..]);
        input.extend_from_slice(&block.0);
        input.extend_from_slice(b"WRITE DONE\r\n");
        let mut channel = IoChannel::new(Port::with_input(&input));

        write_tag(&mut channel, &record()).unwrap();

        let mut expected = Vec::from(&block.0[..]);
        expected.push(PROCEED_BYTE);
        assert_eq!(channel.release().output, expected);
    }
}
