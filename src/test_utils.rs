//! Test utilities shared by unit tests, integration tests and benchmarks
//!
//! Provides captured wire frames, a scripted [`ByteSource`] for driving the
//! framer and beacon deterministically, and helpers for locating capture
//! fixtures under `test-data/`.

#![cfg(any(test, feature = "benchmark"))]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::source::{ByteSource, SourceEvent};

/// Hedgehog position packet: ts 6400 ticks (100 s), x 1234, y -567,
/// z 89 cm, flags `0x02`, hedgehog address 5 in the trailing payload.
pub const POSITION_FRAME: [u8; 23] = [
    0xFF, 0x47, 0x01, 0x00, 0x10, 0x00, 0x19, 0x00, 0x00, 0xD2, 0x04, 0xC9, 0xFD, 0x59, 0x00,
    0x02, 0x05, 0x00, 0x00, 0x00, 0x00, 0xFD, 0x2A,
];

/// Frozen beacons packet with beacon 3 at (1.00, 2.00, -0.50) and
/// beacon 4 at (-15.00, 25.00, 3.00).
pub const STATUS_FRAME: [u8; 24] = [
    0xFF, 0x47, 0x02, 0x00, 0x11, 0x02, 0x03, 0x64, 0x00, 0xC8, 0x00, 0xCE, 0xFF, 0x00, 0x04,
    0x24, 0xFA, 0xC4, 0x09, 0x2C, 0x01, 0x00, 0x2A, 0xFC,
];

/// Capture of 11 packets after line noise, two of them malformed. See
/// `test-data/captures/README.md`.
pub const SAMPLE_CAPTURE: &str = "sample_session.bin";

/// Guidance shown when capture fixtures are missing from the checkout.
pub const FIXTURE_GUIDANCE: &str =
    "Capture fixtures are stored under test-data/captures. Regenerate them with `python3 test-data/captures/generate.py`.";

/// Error returned when a required capture fixture cannot be located.
#[derive(Debug, Clone)]
pub struct FixtureError {
    message: String,
}

impl std::fmt::Display for FixtureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for FixtureError {}

/// Directory holding raw serial captures.
pub fn captures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("test-data").join("captures")
}

/// Resolve a capture by file name, failing loudly when it is missing.
pub fn require_capture(file_name: &str) -> Result<PathBuf, FixtureError> {
    let path = captures_dir().join(file_name);
    if path.exists() {
        Ok(path)
    } else {
        Err(FixtureError {
            message: format!("Missing capture fixture: {}. {}", path.display(), FIXTURE_GUIDANCE),
        })
    }
}

/// Byte source replaying a fixed script of events.
///
/// Once the script is exhausted every read returns the trailing event
/// (`Closed` unless changed with [`ScriptedSource::then`]).
#[derive(Debug, Clone)]
pub struct ScriptedSource {
    events: VecDeque<SourceEvent>,
    trailing: SourceEvent,
    delay: Option<Duration>,
    closed: bool,
    reads: usize,
}

impl ScriptedSource {
    pub fn new(events: impl IntoIterator<Item = SourceEvent>) -> Self {
        Self {
            events: events.into_iter().collect(),
            trailing: SourceEvent::Closed,
            delay: None,
            closed: false,
            reads: 0,
        }
    }

    /// Script delivering `bytes` one at a time.
    pub fn from_bytes(bytes: impl AsRef<[u8]>) -> Self {
        Self::new(bytes.as_ref().iter().copied().map(SourceEvent::Byte))
    }

    /// Event returned after the script runs out.
    pub fn then(mut self, trailing: SourceEvent) -> Self {
        self.trailing = trailing;
        self
    }

    /// Sleep before every read, imitating a slow serial line.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push(&mut self, event: SourceEvent) {
        self.events.push_back(event);
    }

    pub fn extend_bytes(&mut self, bytes: &[u8]) {
        self.events.extend(bytes.iter().copied().map(SourceEvent::Byte));
    }

    /// Number of `read_byte` calls made so far.
    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl ByteSource for ScriptedSource {
    fn read_byte(&mut self) -> std::io::Result<SourceEvent> {
        self.reads += 1;
        if self.closed {
            return Ok(SourceEvent::Closed);
        }
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        Ok(self.events.pop_front().unwrap_or(self.trailing))
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
