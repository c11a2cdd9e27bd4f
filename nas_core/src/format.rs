use crate::error::NasError;
use crate::tag::TypeTag;

/// Magic bytes at the start of every NAS container.
pub const MAGIC: &[u8; 3] = b"NAS";

/// Every header block and chunk ends on a multiple of this many bytes.
pub const ALIGNMENT: u64 = 64;

/// Filler written by alignment padding and by the header pre-fill.
pub const FILL_BYTE: u8 = 0xCD;

/// Value of the header-chunk pointer, both at offset 4 and in the pointer table.
pub const HEADER_CHUNK_POINTER: u32 = 64;

/// Absolute offset of the two-slot pointer table, rewritten last.
pub const POINTER_TABLE_OFFSET: u64 = 16;

/// Samples per block. Stored verbatim as the block-size constant at offset 14.
pub const BLOCK_SIZE: u8 = 4;

/// Length of the fixed header fields before alignment fill.
///   magic[3] + type_tag:u8 + header_ptr:u32 + channels:u8
///   + frames:u40 + block_size:u8
///   = 3 + 1 + 4 + 1 + 5 + 1 = 15
pub const HEADER_FIELDS_LEN: usize = 15;

/// Largest frame count the 5-byte field can hold. Larger counts are stored mod 2^40.
pub const MAX_FRAME_COUNT: u64 = (1 << 40) - 1;

// ── Chunk tags ─────────────────────────────────────────────────────────────

pub const TAG_DATA: [u8; 4] = *b"DATA";
pub const TAG_CHKS: [u8; 4] = *b"CHKS";

/// Payload sub-chunk tag inside DATA.
pub const TAG_ZLIB: [u8; 4] = *b"ZLIB";

/// Round `offset` up to the next multiple of [`ALIGNMENT`].
#[inline]
pub fn align_up(offset: u64) -> u64 {
    (offset + ALIGNMENT - 1) & !(ALIGNMENT - 1)
}

/// Fill bytes needed to bring `offset` onto the alignment grid (0 if already on it).
#[inline]
pub fn padding_for(offset: u64) -> u64 {
    align_up(offset) - offset
}

/// Render a 4-byte tag for messages, replacing non-printable bytes.
pub fn tag_str(tag: &[u8; 4]) -> String {
    tag.iter()
        .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
        .collect()
}

// ── Channel descriptor ─────────────────────────────────────────────────────

/// One-byte channel descriptor.
///
/// Counts up to 7 are stored literally. Larger counts set bit 7 and keep only
/// the low nibble of the count, so the extended form is lossy above 15
/// channels and cannot tell 16 channels from 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelDescriptor(pub u8);

impl ChannelDescriptor {
    pub const EXTENDED_FLAG: u8 = 0x80;

    pub fn from_count(channels: usize) -> Self {
        if channels <= 7 {
            Self((channels & 7) as u8)
        } else {
            Self((channels & 0x0F) as u8 | Self::EXTENDED_FLAG)
        }
    }

    #[inline]
    pub fn is_extended(&self) -> bool {
        self.0 & Self::EXTENDED_FLAG != 0
    }

    /// Channel count as recoverable from the byte.
    pub fn count(&self) -> usize {
        if self.is_extended() {
            (self.0 & 0x0F) as usize
        } else {
            self.0 as usize
        }
    }
}

// ── Header ─────────────────────────────────────────────────────────────────

/// Decoded representation of the fixed header fields at offsets 0..15.
#[derive(Debug, Clone, PartialEq)]
pub struct NasHeader {
    pub type_tag: TypeTag,
    /// Offset of the header chunk; always [`HEADER_CHUNK_POINTER`] when written.
    pub header_ptr: u32,
    pub channels: ChannelDescriptor,
    /// Frames per channel, mod 2^40.
    pub frames: u64,
    pub block_size: u8,
}

impl NasHeader {
    pub fn new(type_tag: TypeTag, channels: usize, frames: u64) -> Self {
        Self {
            type_tag,
            header_ptr: HEADER_CHUNK_POINTER,
            channels: ChannelDescriptor::from_count(channels),
            frames: frames & MAX_FRAME_COUNT,
            block_size: BLOCK_SIZE,
        }
    }

    /// Serialize the fields (no fill) to exactly `HEADER_FIELDS_LEN` bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_FIELDS_LEN] {
        let mut buf = [0u8; HEADER_FIELDS_LEN];
        buf[0..3].copy_from_slice(MAGIC);
        buf[3] = self.type_tag.to_byte();
        buf[4..8].copy_from_slice(&self.header_ptr.to_le_bytes());
        buf[8] = self.channels.0;
        buf[9..14].copy_from_slice(&(self.frames & MAX_FRAME_COUNT).to_le_bytes()[..5]);
        buf[14] = self.block_size;
        buf
    }

    /// Deserialize from the first `HEADER_FIELDS_LEN` bytes, checking the magic.
    pub fn from_bytes(buf: &[u8; HEADER_FIELDS_LEN]) -> Result<Self, NasError> {
        if &buf[0..3] != MAGIC {
            return Err(NasError::BadMagic([buf[0], buf[1], buf[2]]));
        }
        let type_tag = TypeTag::from_byte(buf[3]).ok_or(NasError::UnknownTypeTag(buf[3]))?;
        let mut frames = [0u8; 8];
        frames[..5].copy_from_slice(&buf[9..14]);
        Ok(Self {
            type_tag,
            header_ptr: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
            channels: ChannelDescriptor(buf[8]),
            frames: u64::from_le_bytes(frames),
            block_size: buf[14],
        })
    }
}

// ── Pointer table ──────────────────────────────────────────────────────────

/// The two u32 slots at [`POINTER_TABLE_OFFSET`], finalized after every chunk is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PointerTable {
    pub header_ptr: u32,
    /// Offset of the CHKS tag, or 0 when no checksum chunk was written.
    pub checksum_ptr: u32,
}

impl PointerTable {
    pub const SIZE: usize = 8;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.header_ptr.to_le_bytes());
        buf[4..8].copy_from_slice(&self.checksum_ptr.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8; Self::SIZE]) -> Self {
        Self {
            header_ptr: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            checksum_ptr: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
        }
    }
}
