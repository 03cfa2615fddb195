//! Byte sources feeding the framer
//!
//! A [`ByteSource`] hands out one byte at a time and may block for up to its
//! read timeout. Opening and configuring the physical link (baud rate,
//! termios, timeouts) is left to the application; anything implementing
//! [`std::io::Read`] can be wrapped in a [`ReaderSource`].
//!
//! The reader must have a read timeout. Closing is observed between reads,
//! so a reader that blocks until the next byte keeps a closed connection
//! waiting for as long as the line is silent.
//!
//! ```rust,no_run
//! use mmgps::source::ReaderSource;
//! use std::fs::File;
//!
//! // Serial device already configured by the application, including a
//! // read timeout (VTIME on Unix)
//! let port = File::open("/dev/ttyACM0")?;
//! let source = ReaderSource::new(port);
//! # Ok::<(), std::io::Error>(())
//! ```

mod reader;
mod replay;

pub use reader::ReaderSource;
pub use replay::ReplaySource;

/// Outcome of waiting for one byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEvent {
    Byte(u8),
    /// The read window elapsed without data. Reading may continue.
    Timeout,
    /// The source is permanently exhausted or closed.
    Closed,
}

/// Blocking, byte-at-a-time data source.
pub trait ByteSource {
    /// Wait for the next byte, at most for the source's read timeout.
    ///
    /// Hard I/O failures are returned as errors; end of stream and closure
    /// are reported as [`SourceEvent::Closed`].
    fn read_byte(&mut self) -> std::io::Result<SourceEvent>;

    /// Close the source. Idempotent; later reads report `Closed`.
    fn close(&mut self);

    fn is_closed(&self) -> bool;
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn read_byte(&mut self) -> std::io::Result<SourceEvent> {
        (**self).read_byte()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_closed(&self) -> bool {
        (**self).is_closed()
    }
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    fn read_byte(&mut self) -> std::io::Result<SourceEvent> {
        (**self).read_byte()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_closed(&self) -> bool {
        (**self).is_closed()
    }
}
