//! Serial framing for VISCA responses
//!
//! The camera terminates every response with `0xFF`. The framer buffers the
//! byte stream and emits each run up to and including the terminator.

use bytes::{Bytes, BytesMut};

use crate::protocol::{MAX_PAYLOAD_SIZE, TERMINATOR};

/// Pull-based decoder splitting a serial byte stream into terminated frames
pub struct FrameDecoder {
    buffer: BytesMut,
    /// Number of bytes already scanned without finding a terminator
    scanned: usize,
    /// Dropping the rest of an over-long run up to its terminator
    skipping: bool,
    max_frame_len: usize,
    discarded: u64,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::with_max_frame_len(MAX_PAYLOAD_SIZE)
    }

    /// Create a decoder that drops unterminated runs longer than `max_frame_len`
    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(256),
            scanned: 0,
            skipping: false,
            max_frame_len,
            discarded: 0,
        }
    }

    /// Append raw bytes read from the serial line
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Take the next complete frame.
    /// Returns None if more data is needed
    pub fn decode(&mut self) -> Option<Bytes> {
        loop {
            if self.skipping {
                match self.buffer.iter().position(|&b| b == TERMINATOR) {
                    Some(pos) => {
                        let _ = self.buffer.split_to(pos + 1);
                        self.skipping = false;
                    }
                    None => {
                        self.buffer.clear();
                        return None;
                    }
                }
            }

            if let Some(pos) = self.buffer[self.scanned..]
                .iter()
                .position(|&b| b == TERMINATOR)
            {
                let end = self.scanned + pos + 1;
                self.scanned = 0;

                if end > self.max_frame_len {
                    self.drop_run(end);
                    continue;
                }

                return Some(self.buffer.split_to(end).freeze());
            }

            if self.buffer.len() > self.max_frame_len {
                // Can never fit a packet; skip until the next terminator
                let len = self.buffer.len();
                self.drop_run(len);
                self.skipping = true;
                return None;
            }

            self.scanned = self.buffer.len();
            return None;
        }
    }

    /// Append bytes and collect every frame they complete
    #[cfg(test)]
    pub fn feed(&mut self, data: &[u8]) -> Vec<Bytes> {
        self.extend(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.decode() {
            frames.push(frame);
        }
        frames
    }

    /// Bytes buffered without a terminator yet
    #[cfg(test)]
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Number of over-long runs thrown away so far
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    fn drop_run(&mut self, len: usize) {
        tracing::warn!(
            "Discarding {} serial bytes without terminator (max frame: {})",
            len,
            self.max_frame_len
        );
        let _ = self.buffer.split_to(len);
        self.scanned = 0;
        self.discarded += 1;
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_frames() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.feed(&[0x81, 0x01, 0xFF, 0x90, 0x50, 0xFF]);

        assert_eq!(frames.len(), 2);
        assert_eq!(&frames[0][..], &[0x81, 0x01, 0xFF]);
        assert_eq!(&frames[1][..], &[0x90, 0x50, 0xFF]);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_bare_terminator() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.feed(&[0xFF, 0xFF, 0x90, 0x41, 0xFF]);

        assert_eq!(frames.len(), 3);
        assert_eq!(&frames[0][..], &[0xFF]);
        assert_eq!(&frames[1][..], &[0xFF]);
        assert_eq!(&frames[2][..], &[0x90, 0x41, 0xFF]);
    }

    #[test]
    fn test_split_across_reads() {
        let mut decoder = FrameDecoder::new();

        assert!(decoder.feed(&[0x90]).is_empty());
        assert!(decoder.feed(&[0x50, 0x02]).is_empty());
        assert_eq!(decoder.pending(), 3);

        let frames = decoder.feed(&[0xFF, 0x90]);
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], &[0x90, 0x50, 0x02, 0xFF]);
        assert_eq!(decoder.pending(), 1);

        let frames = decoder.feed(&[0x41, 0xFF]);
        assert_eq!(&frames[0][..], &[0x90, 0x41, 0xFF]);
    }

    #[test]
    fn test_pull_decode() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.decode().is_none());

        decoder.extend(&[0x90, 0x41, 0xFF, 0x90, 0x51, 0xFF, 0x90]);
        assert_eq!(&decoder.decode().unwrap()[..], &[0x90, 0x41, 0xFF]);
        assert_eq!(&decoder.decode().unwrap()[..], &[0x90, 0x51, 0xFF]);
        assert!(decoder.decode().is_none());
        assert_eq!(decoder.pending(), 1);
    }

    #[test]
    fn test_overlong_run_discarded() {
        let mut decoder = FrameDecoder::with_max_frame_len(4);

        // Unterminated garbage exceeding the limit is dropped while buffering
        assert!(decoder.feed(&[0x01, 0x02, 0x03, 0x04, 0x05]).is_empty());
        assert_eq!(decoder.discarded(), 1);
        assert_eq!(decoder.pending(), 0);

        // The rest of that run is skipped through its terminator
        let frames = decoder.feed(&[0x06, 0x07, 0xFF, 0x90, 0x41, 0xFF]);
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], &[0x90, 0x41, 0xFF]);
        assert_eq!(decoder.discarded(), 1);
    }

    #[test]
    fn test_overlong_tail_split_across_reads() {
        let mut decoder = FrameDecoder::with_max_frame_len(4);

        assert!(decoder.feed(&[0x01, 0x02, 0x03, 0x04, 0x05, 0x06]).is_empty());
        assert!(decoder.feed(&[0x07, 0x08]).is_empty());
        assert_eq!(decoder.pending(), 0);
        assert!(decoder.feed(&[0x09]).is_empty());

        let frames = decoder.feed(&[0xFF, 0x90]);
        assert!(frames.is_empty());
        assert_eq!(decoder.pending(), 1);

        let frames = decoder.feed(&[0x51, 0xFF]);
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], &[0x90, 0x51, 0xFF]);
        assert_eq!(decoder.discarded(), 1);
    }

    #[test]
    fn test_overlong_terminated_run_discarded() {
        let mut decoder = FrameDecoder::with_max_frame_len(4);

        let frames = decoder.feed(&[0x01, 0x02, 0x03, 0x04, 0xFF, 0x90, 0xFF]);
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], &[0x90, 0xFF]);
        assert_eq!(decoder.discarded(), 1);
    }
}
