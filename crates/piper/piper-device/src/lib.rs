//! Capability-set device interfaces: the virtual playback device and the
//! capture-side sink are out of core scope, but a minimal, testable shape is
//! still provided so the CLI's `feed`/`drain` commands and the producer loop
//! have something real to run against. No inheritance hierarchy — just two
//! small traits and a couple of straightforward implementers (`stdio`,
//! `mock`).

use std::io;

/// Produces raw PCM bytes, e.g. from stdin or a host audio callback.
pub trait CaptureSource {
    /// Fill as much of `dest` as is currently available; short reads are
    /// permitted and expected (the caller loops until `dest` is full or EOF
    /// is reached).
    fn read_into(&mut self, dest: &mut [u8]) -> io::Result<usize>;
}

/// Consumes raw PCM bytes, e.g. to stdout or a host audio callback.
pub trait PlaybackSink {
    fn write_all(&mut self, src: &[u8]) -> io::Result<()>;
}

pub mod stdio {
    use super::{CaptureSource, PlaybackSink};
    use std::io::{self, Read, Write};

    pub struct StdioCapture {
        stdin: io::Stdin,
    }

    impl StdioCapture {
        pub fn new() -> Self {
            StdioCapture { stdin: io::stdin() }
        }
    }

    impl Default for StdioCapture {
        fn default() -> Self {
            Self::new()
        }
    }

    impl CaptureSource for StdioCapture {
        fn read_into(&mut self, dest: &mut [u8]) -> io::Result<usize> {
            self.stdin.lock().read(dest)
        }
    }

    pub struct StdioPlayback {
        stdout: io::Stdout,
    }

    impl StdioPlayback {
        pub fn new() -> Self {
            StdioPlayback { stdout: io::stdout() }
        }
    }

    impl Default for StdioPlayback {
        fn default() -> Self {
            Self::new()
        }
    }

    impl PlaybackSink for StdioPlayback {
        fn write_all(&mut self, src: &[u8]) -> io::Result<()> {
            self.stdout.lock().write_all(src)
        }
    }
}

pub mod mock {
    use super::{CaptureSource, PlaybackSink};
    use std::collections::VecDeque;
    use std::io;

    /// Deterministic in-memory capture source for tests and benches: yields
    /// bytes from a fixed pattern, repeating indefinitely.
    pub struct MockCapture {
        pattern: Vec<u8>,
        offset: usize,
    }

    impl MockCapture {
        pub fn repeating(pattern: Vec<u8>) -> Self {
            assert!(!pattern.is_empty());
            MockCapture { pattern, offset: 0 }
        }
    }

    impl CaptureSource for MockCapture {
        fn read_into(&mut self, dest: &mut [u8]) -> io::Result<usize> {
            for byte in dest.iter_mut() {
                *byte = self.pattern[self.offset];
                self.offset = (self.offset + 1) % self.pattern.len();
            }
            Ok(dest.len())
        }
    }

    /// In-memory playback sink that records every block it receives, for
    /// assertions in tests and benches.
    #[derive(Default)]
    pub struct MockPlayback {
        blocks: VecDeque<Vec<u8>>,
    }

    impl MockPlayback {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn blocks(&self) -> &VecDeque<Vec<u8>> {
            &self.blocks
        }
    }

    impl PlaybackSink for MockPlayback {
        fn write_all(&mut self, src: &[u8]) -> io::Result<()> {
            self.blocks.push_back(src.to_vec());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{MockCapture, MockPlayback};
    use super::{CaptureSource, PlaybackSink};

    #[test]
    fn mock_capture_repeats_pattern() {
        let mut cap = MockCapture::repeating(vec![1, 2, 3]);
        let mut buf = [0u8; 7];
        cap.read_into(&mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 1, 2, 3, 1]);
    }

    #[test]
    fn mock_playback_records_blocks() {
        let mut sink = MockPlayback::new();
        sink.write_all(&[9, 9]).unwrap();
        sink.write_all(&[1]).unwrap();
        assert_eq!(sink.blocks().len(), 2);
    }
}
