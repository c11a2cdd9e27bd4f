//! Per-channel block classification.
//!
//! Each channel is cut into non-overlapping windows of [`BLOCK_SIZE`] samples
//! (a trailing partial window is dropped). A window is stored as one of:
//!
//! ```text
//! Repeated    [4, s1]              all four samples equal
//! Compressed  [s1, d1, d2, d3]     every first difference within tolerance
//! Raw         [s1, s2, s3, s4]     anything else
//! ```
//!
//! All elements keep the input width. Channels are concatenated channel-major
//! into one payload, and every window yields one diagnostic [`ChecksumWord`].

use crate::error::NasError;
use crate::format::BLOCK_SIZE;
use crate::sample::{SampleBuffer, SampleMatrix};

const WINDOW: usize = BLOCK_SIZE as usize;

/// Element behaviour needed by the classifier, implemented for every
/// block-encodable primitive.
pub trait BlockSample: Copy + PartialEq {
    /// Encoded size of one element in bytes.
    const WIDTH: usize;

    /// Difference `self - prev` at the element width (wrapping for integers).
    fn delta(self, prev: Self) -> Self;

    /// Whether this difference lies within 10% of the type's maximum magnitude.
    fn within_tolerance(self) -> bool;

    /// Tolerance as a plain number, for reporting.
    fn tolerance() -> f64;

    /// The length marker leading a repeated block.
    fn length_marker() -> Self;

    fn to_f64(self) -> f64;

    fn put_le(self, out: &mut Vec<u8>);
}

macro_rules! impl_signed {
    ($($ty:ty),*) => {
        $(
            impl BlockSample for $ty {
                const WIDTH: usize = std::mem::size_of::<$ty>();

                #[inline]
                fn delta(self, prev: Self) -> Self {
                    self.wrapping_sub(prev)
                }

                #[inline]
                fn within_tolerance(self) -> bool {
                    self.unsigned_abs() <= (<$ty>::MAX / 10).unsigned_abs()
                }

                fn tolerance() -> f64 {
                    (<$ty>::MAX / 10) as f64
                }

                fn length_marker() -> Self {
                    BLOCK_SIZE as $ty
                }

                #[inline]
                fn to_f64(self) -> f64 {
                    self as f64
                }

                #[inline]
                fn put_le(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }
            }
        )*
    };
}

macro_rules! impl_unsigned {
    ($($ty:ty),*) => {
        $(
            impl BlockSample for $ty {
                const WIDTH: usize = std::mem::size_of::<$ty>();

                #[inline]
                fn delta(self, prev: Self) -> Self {
                    self.wrapping_sub(prev)
                }

                // A decreasing step wraps to a large value and fails the check.
                #[inline]
                fn within_tolerance(self) -> bool {
                    self <= <$ty>::MAX / 10
                }

                fn tolerance() -> f64 {
                    (<$ty>::MAX / 10) as f64
                }

                fn length_marker() -> Self {
                    BLOCK_SIZE as $ty
                }

                #[inline]
                fn to_f64(self) -> f64 {
                    self as f64
                }

                #[inline]
                fn put_le(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }
            }
        )*
    };
}

impl_signed!(i8, i16, i32);
impl_unsigned!(u8, u16, u32);

/// Float samples are assumed normalised to ±1.0. Compared at element width,
/// so a delta of exactly `0.1f32` is within tolerance.
const FLOAT_TOLERANCE: f32 = 0.1;

impl BlockSample for f32 {
    const WIDTH: usize = 4;

    #[inline]
    fn delta(self, prev: Self) -> Self {
        self - prev
    }

    #[inline]
    fn within_tolerance(self) -> bool {
        self.abs() <= FLOAT_TOLERANCE
    }

    fn tolerance() -> f64 {
        FLOAT_TOLERANCE as f64
    }

    fn length_marker() -> Self {
        BLOCK_SIZE as f32
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn put_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

// ── Classification ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Compressed,
    Repeated,
    Raw,
}

impl BlockKind {
    /// Kind code packed into bits 8..16 of a checksum word.
    pub const fn code(self) -> i64 {
        match self {
            BlockKind::Compressed => 0,
            BlockKind::Repeated => 1,
            BlockKind::Raw => 2,
        }
    }

    /// Number of elements the block occupies in the payload.
    pub const fn elements(self) -> usize {
        match self {
            BlockKind::Repeated => 2,
            BlockKind::Compressed | BlockKind::Raw => WINDOW,
        }
    }
}

/// Choose the encoding for one window.
///
/// Four equal samples are always `Repeated`, even though their zero deltas
/// would also qualify as `Compressed`.
pub fn classify<T: BlockSample>(window: [T; WINDOW]) -> BlockKind {
    let [s1, s2, s3, s4] = window;
    if s1 == s2 && s2 == s3 && s3 == s4 {
        return BlockKind::Repeated;
    }
    let deltas = [s2.delta(s1), s3.delta(s2), s4.delta(s3)];
    if deltas.iter().all(|d| d.within_tolerance()) {
        BlockKind::Compressed
    } else {
        BlockKind::Raw
    }
}

// ── Checksum words ─────────────────────────────────────────────────────────

/// Diagnostic metadata for one block. Never consulted when encoding.
///
/// The packed value ORs four fields together without masking:
/// `offset_bucket | kind << 8 | len << 16 | summary << 24`, so a negative
/// bucket or summary bleeds into the other fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChecksumWord {
    pub kind: BlockKind,
    /// Running payload offset of the block within its channel, in bytes.
    pub offset: u64,
    pub summary: i64,
    pub packed: i64,
}

impl ChecksumWord {
    fn bucket_base(value: i64) -> i64 {
        if value > 4096 {
            4096
        } else {
            512
        }
    }

    pub fn new(kind: BlockKind, offset: u64, summary: i64) -> Self {
        let offset_signed = offset as i64;
        let bucket = offset_signed - Self::bucket_base(offset_signed);
        let packed = bucket | (kind.code() << 8) | ((BLOCK_SIZE as i64) << 16) | (summary << 24);
        Self {
            kind,
            offset,
            summary,
            packed,
        }
    }

    /// The value persisted in the CHKS chunk.
    ///
    /// Repeated blocks store the packed value divided by 4096 or 512 (chosen
    /// against the packed value itself); other kinds store it unchanged.
    pub fn stored_value(&self) -> f64 {
        match self.kind {
            BlockKind::Repeated => self.packed as f64 / Self::bucket_base(self.packed) as f64,
            BlockKind::Compressed | BlockKind::Raw => self.packed as f64,
        }
    }
}

/// Content summary packed into a checksum word. Computed in `f64` and
/// truncated toward zero.
fn summary<T: BlockSample>(kind: BlockKind, window: [T; WINDOW], deltas: [T; 3]) -> i64 {
    let s = window.map(T::to_f64);
    let value = match kind {
        BlockKind::Compressed => {
            let d = deltas.map(T::to_f64);
            (s[0] - 32.0) - (d[0] - 24.0) - (d[1] - 16.0) - (d[2] - 8.0)
        }
        BlockKind::Repeated => s[0] - 32.0,
        BlockKind::Raw => (s[0] + s[1] + s[2] + s[3]) / 4.0,
    };
    value.trunc() as i64
}

// ── Encoding ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockStats {
    pub compressed: u64,
    pub repeated: u64,
    pub raw: u64,
}

impl BlockStats {
    pub fn total(&self) -> u64 {
        self.compressed + self.repeated + self.raw
    }

    fn record(&mut self, kind: BlockKind) {
        match kind {
            BlockKind::Compressed => self.compressed += 1,
            BlockKind::Repeated => self.repeated += 1,
            BlockKind::Raw => self.raw += 1,
        }
    }
}

/// Output of block-encoding a whole matrix.
#[derive(Debug, Clone, Default)]
pub struct EncodedBlocks {
    /// Channel-major concatenation of every block, before compression.
    pub payload: Vec<u8>,
    /// One word per block, in emission order.
    pub checksums: Vec<ChecksumWord>,
    pub stats: BlockStats,
}

/// Block-encode every channel of `matrix`.
///
/// Fails with [`NasError::UnsupportedSampleType`] for element types without a
/// payload layout (float16, float64, int64, uint64).
pub fn encode_blocks(matrix: &SampleMatrix) -> Result<EncodedBlocks, NasError> {
    let channels = matrix.channels();
    match matrix.buffer() {
        SampleBuffer::F32(v) => Ok(encode_typed(v, channels)),
        SampleBuffer::I8(v) => Ok(encode_typed(v, channels)),
        SampleBuffer::I16(v) => Ok(encode_typed(v, channels)),
        SampleBuffer::I32(v) => Ok(encode_typed(v, channels)),
        SampleBuffer::U8(v) => Ok(encode_typed(v, channels)),
        SampleBuffer::U16(v) => Ok(encode_typed(v, channels)),
        SampleBuffer::U32(v) => Ok(encode_typed(v, channels)),
        SampleBuffer::F16(_) | SampleBuffer::F64(_) | SampleBuffer::I64(_) | SampleBuffer::U64(_) => {
            Err(NasError::UnsupportedSampleType(matrix.element_type()))
        }
    }
}

fn encode_typed<T: BlockSample>(samples: &[T], channels: usize) -> EncodedBlocks {
    let frames = samples.len() / channels;
    let windows = frames / WINDOW;

    let mut out = EncodedBlocks {
        payload: Vec::with_capacity(samples.len() * T::WIDTH),
        checksums: Vec::with_capacity(windows * channels),
        stats: BlockStats::default(),
    };

    for ch in 0..channels {
        let mut offset = 0u64;
        for w in 0..windows {
            let base = w * WINDOW;
            let window: [T; WINDOW] = std::array::from_fn(|i| samples[(base + i) * channels + ch]);
            let [s1, s2, s3, s4] = window;
            let deltas = [s2.delta(s1), s3.delta(s2), s4.delta(s3)];

            let kind = classify(window);
            match kind {
                BlockKind::Compressed => {
                    s1.put_le(&mut out.payload);
                    for d in deltas {
                        d.put_le(&mut out.payload);
                    }
                }
                BlockKind::Repeated => {
                    T::length_marker().put_le(&mut out.payload);
                    s1.put_le(&mut out.payload);
                }
                BlockKind::Raw => {
                    for s in window {
                        s.put_le(&mut out.payload);
                    }
                }
            }

            out.checksums
                .push(ChecksumWord::new(kind, offset, summary(kind, window, deltas)));
            out.stats.record(kind);
            offset += (kind.elements() * T::WIDTH) as u64;
        }
    }

    out
}
