use crate::format::tag_str;
use crate::sample::ElementType;

/// Errors raised while building, encoding, or inspecting a NAS container.
#[derive(Debug, thiserror::Error)]
pub enum NasError {
    #[error("unsupported sample type {0}: block encoding handles float32, int8/16/32 and uint8/16/32")]
    UnsupportedSampleType(ElementType),

    #[error("sample matrix has no channels")]
    NoChannels,

    #[error("ragged sample matrix: frame {frame} has {found} channels, expected {expected}")]
    RaggedFrame {
        frame: usize,
        expected: usize,
        found: usize,
    },

    #[error("encoder stage '{attempted}' cannot run after '{current}'")]
    OutOfOrder {
        attempted: &'static str,
        current: &'static str,
    },

    #[error("{what} ({value}) does not fit in a 32-bit field")]
    OffsetOverflow { what: &'static str, value: u64 },

    #[error("invalid NAS magic bytes {0:?}: not a NAS file")]
    BadMagic([u8; 3]),

    #[error("unknown type tag 0x{0:02x}")]
    UnknownTypeTag(u8),

    #[error("expected chunk '{}' at offset {offset}, found '{}'", tag_str(.expected), tag_str(.found))]
    UnexpectedChunk {
        offset: u64,
        expected: [u8; 4],
        found: [u8; 4],
    },

    #[error("unknown payload codec tag '{}'", tag_str(.0))]
    UnknownCodec([u8; 4]),

    #[error("codec mismatch: file uses '{}' but provided codec is '{}'", tag_str(.file), tag_str(.provided))]
    CodecMismatch { file: [u8; 4], provided: [u8; 4] },

    #[error("truncated container: {what}")]
    Truncated { what: &'static str },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
