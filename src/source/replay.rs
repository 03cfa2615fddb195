//! Byte source replaying a raw serial capture

use bytes::Bytes;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{ByteSource, SourceEvent};
use crate::{ConnectionError, Result};

/// Replays a recorded byte stream, then reports [`SourceEvent::Closed`].
///
/// The capture is loaded into memory when opened; reads never block.
pub struct ReplaySource {
    data: Bytes,
    position: usize,
    closed: bool,
    path: PathBuf,
}

impl ReplaySource {
    /// Load a raw capture file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = std::fs::read(&path)
            .map_err(|e| ConnectionError::file_error(path.clone(), e))?;

        info!("Loaded capture {} ({} bytes)", path.display(), data.len());
        Ok(Self { data: data.into(), position: 0, closed: false, path })
    }

    /// Replay bytes held in memory.
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self { data: data.into(), position: 0, closed: false, path: PathBuf::from("<memory>") }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl ByteSource for ReplaySource {
    fn read_byte(&mut self) -> std::io::Result<SourceEvent> {
        if self.closed {
            return Ok(SourceEvent::Closed);
        }
        match self.data.get(self.position) {
            Some(byte) => {
                self.position += 1;
                Ok(SourceEvent::Byte(*byte))
            }
            None => {
                debug!("Replay of {} finished after {} bytes", self.path.display(), self.position);
                self.closed = true;
                Ok(SourceEvent::Closed)
            }
        }
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replays_then_closes() {
        let mut src = ReplaySource::from_bytes(vec![1u8, 2]);
        assert_eq!(src.len(), 2);
        assert_eq!(src.read_byte().unwrap(), SourceEvent::Byte(1));
        assert_eq!(src.remaining(), 1);
        assert_eq!(src.read_byte().unwrap(), SourceEvent::Byte(2));
        assert_eq!(src.read_byte().unwrap(), SourceEvent::Closed);
        assert!(src.is_closed());
    }

    #[test]
    fn close_stops_replay_early() {
        let mut src = ReplaySource::from_bytes(vec![1u8, 2, 3]);
        src.close();
        assert_eq!(src.read_byte().unwrap(), SourceEvent::Closed);
        assert_eq!(src.position(), 0);
    }

    #[test]
    fn missing_capture_reports_path() {
        let err = ReplaySource::open("/definitely/not/here.bin").err().unwrap();
        match err {
            ConnectionError::File { path, .. } => {
                assert_eq!(path, PathBuf::from("/definitely/not/here.bin"))
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn loads_capture_from_disk() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("capture.bin");
        std::fs::write(&path, [0xFF, 0x47, 0x01])?;

        let mut src = ReplaySource::open(&path)?;
        assert_eq!(src.path(), path.as_path());
        assert_eq!(src.read_byte()?, SourceEvent::Byte(0xFF));
        Ok(())
    }
}
