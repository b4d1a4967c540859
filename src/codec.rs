//! Marker-anchored framing for the rover byte stream.
//!
//! The rover multiplexes video and telemetry over a single TCP stream with no
//! transport-level message boundaries. Each message is wrapped as:
//!
//! ```text
//! ┌──────────────┬──────┬──────────────┬──────────────┬──────────────┐
//! │ START (3B)   │ TYPE │ LENGTH (4B)  │ PAYLOAD      │ END (3B)     │
//! │ AA BB CC     │ (1B) │ u32 LE       │ LENGTH bytes │ DD EE FF     │
//! └──────────────┴──────┴──────────────┴──────────────┴──────────────┘
//! ```
//!
//! [`FrameCodec`] recovers from arbitrary corruption by scanning a 24-bit
//! rolling window for the start marker. A length outside `1..=200_000` or a
//! wrong end marker abandons the current frame and scanning resumes after the
//! bytes already consumed; there is no backtracking, so one corrupted frame
//! costs at most one frame of data.
//!
//! ## Usage Example
//!
//! ```rust
//! use marcs_link::codec::{FrameCodec, encode_frame};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> marcs_link::Result<()> {
//! let mut wire = vec![0x13, 0x37];
//! wire.extend(encode_frame(5, b"V:3.70"));
//!
//! let mut codec = FrameCodec::new(wire.as_slice());
//! let frame = codec.next_frame().await?.expect("one frame");
//! assert_eq!(frame.frame_type, 5);
//! assert_eq!(frame.payload, b"V:3.70");
//! assert!(codec.next_frame().await?.is_none());
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use futures::Stream;
use tokio::io::{AsyncRead, AsyncReadExt, BufReader};
use tracing::{debug, trace};

use crate::{LinkError, Result};

/// Start marker as a 24-bit value.
pub const START_MARKER: u32 = 0x00AA_BBCC;

/// End marker bytes in wire order.
pub const END_MARKER: [u8; 3] = [0xDD, 0xEE, 0xFF];

/// Largest accepted payload; slightly above the 153 600-byte video frame.
pub const MAX_PAYLOAD_LEN: u32 = 200_000;

const MARKER_MASK: u32 = 0x00FF_FFFF;
const READ_BUFFER_CAPACITY: usize = 64 * 1024;

/// One complete, marker-delimited unit extracted from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub frame_type: u8,
    pub payload: Vec<u8>,
}

/// Why a frame attempt was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResyncReason {
    /// Declared length was zero or above [`MAX_PAYLOAD_LEN`].
    LengthOutOfBounds(u32),
    /// The three bytes after the payload were not [`END_MARKER`].
    BadEndMarker([u8; 3]),
}

impl std::fmt::Display for ResyncReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LengthOutOfBounds(len) => write!(f, "length {len} out of bounds"),
            Self::BadEndMarker([a, b, c]) => {
                write!(f, "bad end marker {a:02X} {b:02X} {c:02X}")
            }
        }
    }
}

/// Result of a single decode step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    Frame(Frame),
    /// Framing violation; the codec is already scanning for the next start marker.
    Resync(ResyncReason),
    /// The source ended, either between frames or mid-frame.
    EndOfStream,
}

/// Running counters for a codec instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CodecStats {
    pub frames: u64,
    pub resyncs: u64,
    /// Bytes skipped while hunting for a start marker.
    pub discarded_bytes: u64,
}

/// Pulls [`Frame`]s out of any async byte source.
pub struct FrameCodec<R> {
    source: BufReader<R>,
    read_timeout: Option<Duration>,
    stats: CodecStats,
}

impl<R: AsyncRead + Unpin> FrameCodec<R> {
    /// Create a codec without an inactivity timeout.
    pub fn new(source: R) -> Self {
        Self::with_read_timeout(source, None)
    }

    /// Create a codec where any single read waiting longer than `read_timeout`
    /// for bytes fails with [`LinkError::Timeout`].
    pub fn with_read_timeout(source: R, read_timeout: Option<Duration>) -> Self {
        Self {
            source: BufReader::with_capacity(READ_BUFFER_CAPACITY, source),
            read_timeout,
            stats: CodecStats::default(),
        }
    }

    pub fn stats(&self) -> CodecStats {
        self.stats
    }

    /// Run one decode step.
    ///
    /// Returns `Err` only for transport failures (I/O errors and read timeouts);
    /// framing problems are reported as [`FrameOutcome::Resync`].
    pub async fn next_outcome(&mut self) -> Result<FrameOutcome> {
        if !self.scan_for_start().await? {
            return Ok(FrameOutcome::EndOfStream);
        }

        let mut header = [0u8; 5];
        if !self.fill(&mut header).await? {
            return Ok(FrameOutcome::EndOfStream);
        }
        let frame_type = header[0];
        let len = u32::from_le_bytes([header[1], header[2], header[3], header[4]]);

        if len == 0 || len > MAX_PAYLOAD_LEN {
            self.stats.resyncs += 1;
            return Ok(FrameOutcome::Resync(ResyncReason::LengthOutOfBounds(len)));
        }

        let mut payload = vec![0u8; len as usize];
        if !self.fill(&mut payload).await? {
            return Ok(FrameOutcome::EndOfStream);
        }

        let mut trailer = [0u8; 3];
        if !self.fill(&mut trailer).await? {
            return Ok(FrameOutcome::EndOfStream);
        }
        if trailer != END_MARKER {
            self.stats.resyncs += 1;
            return Ok(FrameOutcome::Resync(ResyncReason::BadEndMarker(trailer)));
        }

        self.stats.frames += 1;
        trace!(frame_type, len, "frame decoded");
        Ok(FrameOutcome::Frame(Frame { frame_type, payload }))
    }

    /// Next valid frame, skipping over resynchronizations.
    ///
    /// `Ok(None)` means the source ended.
    pub async fn next_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            match self.next_outcome().await? {
                FrameOutcome::Frame(frame) => return Ok(Some(frame)),
                FrameOutcome::Resync(reason) => debug!(%reason, "resynchronizing"),
                FrameOutcome::EndOfStream => return Ok(None),
            }
        }
    }

    /// Lazy stream of frames that ends with the source or after the first transport error.
    pub fn into_stream(self) -> impl Stream<Item = Result<Frame>>
    where
        R: Send,
    {
        futures::stream::unfold(Some(self), |state| async move {
            let mut codec = state?;
            match codec.next_frame().await {
                Ok(Some(frame)) => Some((Ok(frame), Some(codec))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }

    /// Slide the window one byte at a time until it holds the start marker.
    async fn scan_for_start(&mut self) -> Result<bool> {
        let mut window = 0u32;
        let mut scanned = 0u64;
        let mut byte = [0u8; 1];

        loop {
            if !self.fill(&mut byte).await? {
                self.stats.discarded_bytes += scanned;
                return Ok(false);
            }
            scanned += 1;
            window = ((window << 8) | u32::from(byte[0])) & MARKER_MASK;
            if scanned >= 3 && window == START_MARKER {
                self.stats.discarded_bytes += scanned - 3;
                return Ok(true);
            }
        }
    }

    /// Fill `buf` completely. `Ok(false)` means the source hit end-of-stream first.
    async fn fill(&mut self, buf: &mut [u8]) -> Result<bool> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read_some(&mut buf[filled..]).await?;
            if n == 0 {
                return Ok(false);
            }
            filled += n;
        }
        Ok(true)
    }

    async fn read_some(&mut self, buf: &mut [u8]) -> Result<usize> {
        let read = self.source.read(buf);
        let n = match self.read_timeout {
            Some(duration) => tokio::time::timeout(duration, read)
                .await
                .map_err(|_| LinkError::Timeout { duration })??,
            None => read.await?,
        };
        Ok(n)
    }
}

/// Wrap a payload in start marker, type, length and end marker.
///
/// # Panics
///
/// Panics if `payload` is longer than `u32::MAX` bytes.
pub fn encode_frame(frame_type: u8, payload: &[u8]) -> Vec<u8> {
    let len = u32::try_from(payload.len()).expect("payload length fits in u32");
    let mut out = Vec::with_capacity(3 + 1 + 4 + payload.len() + 3);
    out.extend_from_slice(&START_MARKER.to_be_bytes()[1..]);
    out.push(frame_type);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(payload);
    out.extend_from_slice(&END_MARKER);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use proptest::prelude::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    fn header(frame_type: u8, len: u32) -> Vec<u8> {
        let mut out = vec![0xAA, 0xBB, 0xCC, frame_type];
        out.extend_from_slice(&len.to_le_bytes());
        out
    }

    async fn collect(wire: &[u8]) -> Vec<FrameOutcome> {
        let mut codec = FrameCodec::new(wire);
        let mut outcomes = Vec::new();
        loop {
            let outcome = codec.next_outcome().await.unwrap();
            let done = outcome == FrameOutcome::EndOfStream;
            outcomes.push(outcome);
            if done {
                return outcomes;
            }
        }
    }

    struct FailingReader;

    impl AsyncRead for FailingReader {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")))
        }
    }

    #[test]
    fn encode_layout() {
        let wire = encode_frame(2, b"X:1,Y:2");
        assert_eq!(&wire[..3], &[0xAA, 0xBB, 0xCC]);
        assert_eq!(wire[3], 2);
        assert_eq!(&wire[4..8], &7u32.to_le_bytes());
        assert_eq!(&wire[8..15], b"X:1,Y:2");
        assert_eq!(&wire[15..], &END_MARKER);
    }

    #[tokio::test]
    async fn decodes_single_frame() {
        let wire = encode_frame(3, b"P:1013.25");
        let outcomes = collect(&wire).await;
        assert_eq!(
            outcomes,
            vec![
                FrameOutcome::Frame(Frame { frame_type: 3, payload: b"P:1013.25".to_vec() }),
                FrameOutcome::EndOfStream,
            ]
        );
    }

    #[tokio::test]
    async fn skips_leading_and_interleaved_garbage() {
        let mut wire = vec![0x00, 0xAA, 0xBB, 0x11, 0xCC];
        wire.extend(encode_frame(2, b"X:1,Y:2"));
        wire.extend([0xFF, 0xEE, 0xDD, 0xAA]);
        wire.extend(encode_frame(4, b"LAT:1,LON:2"));

        let mut codec = FrameCodec::new(wire.as_slice());
        assert_eq!(codec.next_frame().await.unwrap().unwrap().frame_type, 2);
        assert_eq!(codec.next_frame().await.unwrap().unwrap().frame_type, 4);
        assert!(codec.next_frame().await.unwrap().is_none());

        let stats = codec.stats();
        assert_eq!(stats.frames, 2);
        assert_eq!(stats.resyncs, 0);
        assert_eq!(stats.discarded_bytes, 9);
    }

    #[tokio::test]
    async fn zero_length_resyncs() {
        let mut wire = header(5, 0);
        wire.extend(encode_frame(5, b"V:4.0"));

        let outcomes = collect(&wire).await;
        assert_eq!(outcomes[0], FrameOutcome::Resync(ResyncReason::LengthOutOfBounds(0)));
        assert!(matches!(&outcomes[1], FrameOutcome::Frame(f) if f.payload == b"V:4.0"));
        assert_eq!(outcomes[2], FrameOutcome::EndOfStream);
    }

    #[tokio::test]
    async fn oversized_length_resyncs_without_reading_payload() {
        let mut wire = header(1, MAX_PAYLOAD_LEN + 1);
        wire.extend(encode_frame(2, b"X:5,Y:6"));

        let outcomes = collect(&wire).await;
        assert_eq!(
            outcomes[0],
            FrameOutcome::Resync(ResyncReason::LengthOutOfBounds(MAX_PAYLOAD_LEN + 1))
        );
        assert!(matches!(&outcomes[1], FrameOutcome::Frame(f) if f.frame_type == 2));
    }

    #[tokio::test]
    async fn max_length_is_accepted() {
        let payload = vec![0x42; MAX_PAYLOAD_LEN as usize];
        let wire = encode_frame(9, &payload);
        let mut codec = FrameCodec::new(wire.as_slice());
        let frame = codec.next_frame().await.unwrap().unwrap();
        assert_eq!(frame.payload.len(), MAX_PAYLOAD_LEN as usize);
    }

    #[tokio::test]
    async fn bad_end_marker_drops_frame_and_recovers() {
        let mut corrupted = encode_frame(2, b"X:1,Y:1");
        let last = corrupted.len() - 1;
        corrupted[last] = 0x00;

        let mut wire = corrupted;
        wire.extend(encode_frame(2, b"X:2,Y:2"));

        let outcomes = collect(&wire).await;
        assert_eq!(
            outcomes[0],
            FrameOutcome::Resync(ResyncReason::BadEndMarker([0xDD, 0xEE, 0x00]))
        );
        assert!(matches!(&outcomes[1], FrameOutcome::Frame(f) if f.payload == b"X:2,Y:2"));
        assert_eq!(outcomes[2], FrameOutcome::EndOfStream);
    }

    #[tokio::test]
    async fn short_declared_length_costs_one_frame() {
        // Declared length is one short, so the trailer check sees the last payload byte.
        let mut wire = header(5, 5);
        wire.extend_from_slice(b"V:3.70");
        wire.extend_from_slice(&END_MARKER);
        wire.extend(encode_frame(5, b"V:4.10"));

        let mut codec = FrameCodec::new(wire.as_slice());
        let frame = codec.next_frame().await.unwrap().unwrap();
        assert_eq!(frame.payload, b"V:4.10");
        assert_eq!(codec.stats().resyncs, 1);
    }

    #[tokio::test]
    async fn end_of_stream_mid_frame() {
        let wire = encode_frame(1, &[0u8; 64]);
        for cut in [1, 3, 5, 8, 40, wire.len() - 1] {
            let outcomes = collect(&wire[..cut]).await;
            assert_eq!(outcomes, vec![FrameOutcome::EndOfStream], "cut at {cut}");
        }
    }

    #[tokio::test]
    async fn empty_source_is_end_of_stream() {
        assert_eq!(collect(&[]).await, vec![FrameOutcome::EndOfStream]);
    }

    #[tokio::test]
    async fn io_errors_surface_as_errors() {
        let mut codec = FrameCodec::new(FailingReader);
        let err = codec.next_outcome().await.unwrap_err();
        assert!(matches!(err, LinkError::Io(ref e) if e.kind() == std::io::ErrorKind::ConnectionReset));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_peer_times_out() {
        let (_writer, reader) = tokio::io::duplex(64);
        let mut codec = FrameCodec::with_read_timeout(reader, Some(Duration::from_secs(5)));
        let err = codec.next_outcome().await.unwrap_err();
        assert!(matches!(err, LinkError::Timeout { duration } if duration == Duration::from_secs(5)));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_but_steady_peer_does_not_time_out() {
        use tokio::io::AsyncWriteExt;

        let (mut writer, reader) = tokio::io::duplex(64);
        let wire = encode_frame(5, b"V:3.90");
        tokio::spawn(async move {
            for byte in wire {
                tokio::time::sleep(Duration::from_secs(1)).await;
                writer.write_all(&[byte]).await.unwrap();
            }
        });

        let mut codec = FrameCodec::with_read_timeout(reader, Some(Duration::from_secs(5)));
        let frame = codec.next_frame().await.unwrap().unwrap();
        assert_eq!(frame.payload, b"V:3.90");
    }

    #[tokio::test]
    async fn stream_yields_frames_in_order() {
        let mut wire = Vec::new();
        for i in 1..=5u8 {
            wire.extend(encode_frame(i, &[i; 4]));
        }
        let frames: Vec<Frame> = FrameCodec::new(std::io::Cursor::new(wire))
            .into_stream()
            .map(|r| r.unwrap())
            .collect()
            .await;
        let types: Vec<u8> = frames.iter().map(|f| f.frame_type).collect();
        assert_eq!(types, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn stream_ends_after_error() {
        let items: Vec<Result<Frame>> = FrameCodec::new(FailingReader).into_stream().collect().await;
        assert_eq!(items.len(), 1);
        assert!(items[0].is_err());
    }

    fn garbage() -> impl Strategy<Value = Vec<u8>> {
        // No 0xAA means no accidental start marker can form inside the garbage.
        prop::collection::vec(any::<u8>().prop_filter("no marker lead byte", |b| *b != 0xAA), 0..32)
    }

    fn frame() -> impl Strategy<Value = (u8, Vec<u8>)> {
        (any::<u8>(), prop::collection::vec(any::<u8>(), 1..128))
    }

    proptest! {
        #[test]
        fn recovers_every_frame_between_garbage(
            segments in prop::collection::vec((garbage(), frame()), 0..12),
            tail in garbage()
        ) {
            let mut wire = Vec::new();
            for (junk, (frame_type, payload)) in &segments {
                wire.extend_from_slice(junk);
                wire.extend(encode_frame(*frame_type, payload));
            }
            wire.extend_from_slice(&tail);

            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let decoded = runtime.block_on(async {
                let mut codec = FrameCodec::new(wire.as_slice());
                let mut out = Vec::new();
                while let Some(frame) = codec.next_frame().await.unwrap() {
                    out.push((frame.frame_type, frame.payload));
                }
                out
            });

            let expected: Vec<(u8, Vec<u8>)> = segments.into_iter().map(|(_, f)| f).collect();
            prop_assert_eq!(decoded, expected);
        }

        #[test]
        fn arbitrary_bytes_never_error(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let result = runtime.block_on(async {
                let mut codec = FrameCodec::new(bytes.as_slice());
                while codec.next_frame().await?.is_some() {}
                Ok::<_, LinkError>(codec.stats())
            });
            prop_assert!(result.is_ok());
        }
    }
}
