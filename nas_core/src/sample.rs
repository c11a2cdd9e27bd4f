use std::fmt;

use half::f16;

use crate::error::NasError;

/// Element type of a sample matrix, as delivered by the audio source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    F16,
    F32,
    F64,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
}

impl ElementType {
    pub const ALL: [ElementType; 11] = [
        ElementType::F16,
        ElementType::F32,
        ElementType::F64,
        ElementType::I8,
        ElementType::I16,
        ElementType::I32,
        ElementType::I64,
        ElementType::U8,
        ElementType::U16,
        ElementType::U32,
        ElementType::U64,
    ];

    /// Whether the block encoder has a payload layout for this type.
    ///
    /// `F64` is not encodable directly; the encoder narrows it to `F32` first.
    pub fn is_block_encodable(self) -> bool {
        matches!(
            self,
            ElementType::F32
                | ElementType::I8
                | ElementType::I16
                | ElementType::I32
                | ElementType::U8
                | ElementType::U16
                | ElementType::U32
        )
    }

    pub fn size_bytes(self) -> usize {
        match self {
            ElementType::I8 | ElementType::U8 => 1,
            ElementType::F16 | ElementType::I16 | ElementType::U16 => 2,
            ElementType::F32 | ElementType::I32 | ElementType::U32 => 4,
            ElementType::F64 | ElementType::I64 | ElementType::U64 => 8,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementType::F16 => "float16",
            ElementType::F32 => "float32",
            ElementType::F64 => "float64",
            ElementType::I8 => "int8",
            ElementType::I16 => "int16",
            ElementType::I32 => "int32",
            ElementType::I64 => "int64",
            ElementType::U8 => "uint8",
            ElementType::U16 => "uint16",
            ElementType::U32 => "uint32",
            ElementType::U64 => "uint64",
        };
        f.write_str(name)
    }
}

/// Interleaved (frame-major) sample storage, one variant per element type.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleBuffer {
    F16(Vec<f16>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
}

impl SampleBuffer {
    pub fn element_type(&self) -> ElementType {
        match self {
            SampleBuffer::F16(_) => ElementType::F16,
            SampleBuffer::F32(_) => ElementType::F32,
            SampleBuffer::F64(_) => ElementType::F64,
            SampleBuffer::I8(_) => ElementType::I8,
            SampleBuffer::I16(_) => ElementType::I16,
            SampleBuffer::I32(_) => ElementType::I32,
            SampleBuffer::I64(_) => ElementType::I64,
            SampleBuffer::U8(_) => ElementType::U8,
            SampleBuffer::U16(_) => ElementType::U16,
            SampleBuffer::U32(_) => ElementType::U32,
            SampleBuffer::U64(_) => ElementType::U64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            SampleBuffer::F16(v) => v.len(),
            SampleBuffer::F32(v) => v.len(),
            SampleBuffer::F64(v) => v.len(),
            SampleBuffer::I8(v) => v.len(),
            SampleBuffer::I16(v) => v.len(),
            SampleBuffer::I32(v) => v.len(),
            SampleBuffer::I64(v) => v.len(),
            SampleBuffer::U8(v) => v.len(),
            SampleBuffer::U16(v) => v.len(),
            SampleBuffer::U32(v) => v.len(),
            SampleBuffer::U64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A primitive that can populate a [`SampleBuffer`].
pub trait Element: Copy {
    const TYPE: ElementType;

    fn into_buffer(samples: Vec<Self>) -> SampleBuffer;
}

macro_rules! impl_element {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const TYPE: ElementType = ElementType::$variant;

                fn into_buffer(samples: Vec<Self>) -> SampleBuffer {
                    SampleBuffer::$variant(samples)
                }
            }
        )*
    };
}

impl_element!(
    f16 => F16,
    f32 => F32,
    f64 => F64,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
);

/// Rectangular frames × channels matrix of one element type.
///
/// Immutable once built; the encoder takes ownership for the duration of one encode.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleMatrix {
    channels: usize,
    data: SampleBuffer,
}

impl SampleMatrix {
    /// Build from interleaved samples (`frame0ch0, frame0ch1, ..., frame1ch0, ...`).
    pub fn from_interleaved<T: Element>(channels: usize, samples: Vec<T>) -> Result<Self, NasError> {
        Self::from_buffer(channels, T::into_buffer(samples))
    }

    pub fn from_buffer(channels: usize, data: SampleBuffer) -> Result<Self, NasError> {
        if channels == 0 {
            return Err(NasError::NoChannels);
        }
        let remainder = data.len() % channels;
        if remainder != 0 {
            return Err(NasError::RaggedFrame {
                frame: data.len() / channels,
                expected: channels,
                found: remainder,
            });
        }
        Ok(Self { channels, data })
    }

    /// Build from per-frame rows; every row must have the same channel count.
    pub fn from_frames<T: Element>(frames: Vec<Vec<T>>) -> Result<Self, NasError> {
        let channels = frames.first().map(Vec::len).ok_or(NasError::NoChannels)?;
        let mut samples = Vec::with_capacity(frames.len() * channels);
        for (frame, row) in frames.into_iter().enumerate() {
            if row.len() != channels {
                return Err(NasError::RaggedFrame {
                    frame,
                    expected: channels,
                    found: row.len(),
                });
            }
            samples.extend(row);
        }
        Self::from_interleaved(channels, samples)
    }

    /// Single-channel matrix.
    pub fn mono<T: Element>(samples: Vec<T>) -> Self {
        Self {
            channels: 1,
            data: T::into_buffer(samples),
        }
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    #[inline]
    pub fn frames(&self) -> usize {
        self.data.len() / self.channels
    }

    #[inline]
    pub fn element_type(&self) -> ElementType {
        self.data.element_type()
    }

    #[inline]
    pub fn buffer(&self) -> &SampleBuffer {
        &self.data
    }

    /// Downcast float64 storage to float32; every other type passes through.
    pub fn narrowed(self) -> Self {
        match self.data {
            SampleBuffer::F64(samples) => Self {
                channels: self.channels,
                data: SampleBuffer::F32(samples.into_iter().map(|s| s as f32).collect()),
            },
            data => Self {
                channels: self.channels,
                data,
            },
        }
    }
}
