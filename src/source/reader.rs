//! Byte source over any `std::io::Read`

use std::io::{BufReader, ErrorKind, Read};
use tracing::debug;

use super::{ByteSource, SourceEvent};

/// Adapts a reader (serial device, TCP stream, pipe) to [`ByteSource`].
///
/// Read timeouts configured on the underlying handle surface as
/// `TimedOut`/`WouldBlock` errors and are reported as
/// [`SourceEvent::Timeout`]. End of stream closes the source.
///
/// Configure a read timeout on the handle before wrapping it: a
/// [`CloseHandle`](crate::CloseHandle) is only noticed once the blocked
/// read returns.
pub struct ReaderSource<R> {
    reader: Option<BufReader<R>>,
}

impl<R: Read> ReaderSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader: Some(BufReader::new(reader)) }
    }

    /// Give back the underlying reader, unless the source was closed.
    pub fn into_inner(self) -> Option<R> {
        self.reader.map(BufReader::into_inner)
    }
}

impl<R: Read> ByteSource for ReaderSource<R> {
    fn read_byte(&mut self) -> std::io::Result<SourceEvent> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(SourceEvent::Closed);
        };

        let mut byte = [0u8; 1];
        loop {
            match reader.read(&mut byte) {
                Ok(0) => {
                    debug!("Reader reached end of stream");
                    self.reader = None;
                    return Ok(SourceEvent::Closed);
                }
                Ok(_) => return Ok(SourceEvent::Byte(byte[0])),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                    return Ok(SourceEvent::Timeout);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn close(&mut self) {
        if self.reader.take().is_some() {
            debug!("Reader source closed");
        }
    }

    fn is_closed(&self) -> bool {
        self.reader.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io;

    /// Reader replaying a script of chunks and errors
    struct Scripted(VecDeque<io::Result<Vec<u8>>>);

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.pop_front() {
                None => Ok(0),
                Some(Err(e)) => Err(e),
                Some(Ok(chunk)) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    Ok(n)
                }
            }
        }
    }

    fn source(script: Vec<io::Result<Vec<u8>>>) -> ReaderSource<Scripted> {
        ReaderSource::new(Scripted(script.into()))
    }

    #[test]
    fn yields_bytes_then_closes_at_eof() {
        let mut src = source(vec![Ok(vec![0xFF, 0x47])]);
        assert_eq!(src.read_byte().unwrap(), SourceEvent::Byte(0xFF));
        assert_eq!(src.read_byte().unwrap(), SourceEvent::Byte(0x47));
        assert_eq!(src.read_byte().unwrap(), SourceEvent::Closed);
        assert!(src.is_closed());
        assert_eq!(src.read_byte().unwrap(), SourceEvent::Closed);
    }

    #[test]
    fn timeouts_are_recoverable() {
        let mut src = source(vec![
            Err(io::Error::new(ErrorKind::TimedOut, "no data")),
            Err(io::Error::new(ErrorKind::Interrupted, "signal")),
            Ok(vec![0x01]),
        ]);
        assert_eq!(src.read_byte().unwrap(), SourceEvent::Timeout);
        assert_eq!(src.read_byte().unwrap(), SourceEvent::Byte(0x01));
    }

    #[test]
    fn hard_errors_propagate() {
        let mut src = source(vec![Err(io::Error::new(ErrorKind::BrokenPipe, "unplugged"))]);
        let err = src.read_byte().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BrokenPipe);
    }

    #[test]
    fn close_is_idempotent() {
        let mut src = source(vec![Ok(vec![0x01])]);
        src.close();
        src.close();
        assert_eq!(src.read_byte().unwrap(), SourceEvent::Closed);
        assert!(src.into_inner().is_none());
    }
}
