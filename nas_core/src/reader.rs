use std::fs::File;
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

use crate::codec::Codec;
use crate::error::NasError;
use crate::format::{
    align_up, NasHeader, PointerTable, ALIGNMENT, BLOCK_SIZE, FILL_BYTE, HEADER_FIELDS_LEN,
    POINTER_TABLE_OFFSET, TAG_CHKS, TAG_DATA,
};

/// The optional CHKS chunk as found on disk.
#[derive(Debug, Clone)]
pub struct ChecksumChunk {
    /// Offset of the CHKS tag.
    pub offset: u64,
    /// Backpatched end offset stored after the tag.
    pub end: u32,
    /// One value per block, in emission order.
    pub values: Vec<f64>,
}

/// Structural reader for NAS containers.
///
/// # Open sequence
/// 1. Read the 64-byte header block (magic check, type tag, channel
///    descriptor, frame count) and the pointer table at offset 16.
/// 2. Seek to the header-chunk pointer, expect the DATA tag.
/// 3. Read the payload sub-chunk at the next 64-byte boundary: codec tag,
///    u32 length, compressed bytes.
/// 4. If the checksum pointer is non-zero, read the CHKS chunk there.
///
/// The reader exposes container structure and the inflated block stream only;
/// it does not reconstruct samples from blocks.
#[derive(Debug, Clone)]
pub struct Reader {
    header: NasHeader,
    pointers: PointerTable,
    data_offset: u64,
    codec_tag: [u8; 4],
    compressed: Vec<u8>,
    checksum: Option<ChecksumChunk>,
}

impl Reader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, NasError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: Read + Seek>(mut src: R) -> Result<Self, NasError> {
        // ── Header block ────────────────────────────────────────────────────
        let mut block = [0u8; ALIGNMENT as usize];
        read_exact(&mut src, &mut block, "header block")?;
        let mut fields = [0u8; HEADER_FIELDS_LEN];
        fields.copy_from_slice(&block[..HEADER_FIELDS_LEN]);
        let header = NasHeader::from_bytes(&fields)?;

        let table_start = POINTER_TABLE_OFFSET as usize;
        let mut table = [0u8; PointerTable::SIZE];
        table.copy_from_slice(&block[table_start..table_start + PointerTable::SIZE]);
        let pointers = PointerTable::from_bytes(&table);

        // ── DATA chunk and payload sub-chunk ────────────────────────────────
        let data_offset = pointers.header_ptr as u64;
        expect_tag(&mut src, data_offset, TAG_DATA)?;

        src.seek(SeekFrom::Start(align_up(data_offset + 4)))?;
        let mut codec_tag = [0u8; 4];
        read_exact(&mut src, &mut codec_tag, "payload codec tag")?;
        let mut len = [0u8; 4];
        read_exact(&mut src, &mut len, "payload length")?;
        let len = u32::from_le_bytes(len) as u64;
        let compressed = read_counted(&mut src, len, "compressed payload")?;

        let mut reader = Self {
            header,
            pointers,
            data_offset,
            codec_tag,
            compressed,
            checksum: None,
        };

        // ── Optional CHKS chunk ─────────────────────────────────────────────
        if pointers.checksum_ptr != 0 {
            let offset = pointers.checksum_ptr as u64;
            expect_tag(&mut src, offset, TAG_CHKS)?;
            let mut end = [0u8; 4];
            read_exact(&mut src, &mut end, "checksum chunk end")?;
            let end = u32::from_le_bytes(end);

            let slots = (end as u64).saturating_sub(offset + 8) / 8;
            let area = read_counted(&mut src, slots * 8, "checksum values")?;
            let mut values: Vec<f64> = area
                .chunks_exact(8)
                .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                .collect();

            // The value area ends in fill. A literal descriptor gives the exact
            // block count; an extended one does not, so drop whole fill slots.
            if reader.header.channels.is_extended() {
                let filled = area
                    .chunks_exact(8)
                    .rev()
                    .take_while(|c| c.iter().all(|&b| b == FILL_BYTE))
                    .count();
                values.truncate(values.len() - filled);
            } else {
                values.truncate(reader.expected_blocks().min(slots) as usize);
            }
            reader.checksum = Some(ChecksumChunk { offset, end, values });
        }

        Ok(reader)
    }

    #[inline]
    pub fn header(&self) -> &NasHeader {
        &self.header
    }

    #[inline]
    pub fn pointers(&self) -> PointerTable {
        self.pointers
    }

    /// Offset of the DATA tag.
    #[inline]
    pub fn data_offset(&self) -> u64 {
        self.data_offset
    }

    /// Tag of the codec that compressed the payload.
    #[inline]
    pub fn codec_tag(&self) -> [u8; 4] {
        self.codec_tag
    }

    pub fn compressed_payload(&self) -> &[u8] {
        &self.compressed
    }

    pub fn checksum_chunk(&self) -> Option<&ChecksumChunk> {
        self.checksum.as_ref()
    }

    /// Blocks implied by the header: channels × (frames / 4).
    ///
    /// Exact only for literal channel descriptors (up to 7 channels). The
    /// extended descriptor keeps just the low nibble of the count.
    pub fn expected_blocks(&self) -> u64 {
        self.header.channels.count() as u64 * (self.header.frames / BLOCK_SIZE as u64)
    }

    /// Inflate the payload sub-chunk back to the concatenated block stream.
    ///
    /// `codec` must match the tag stored in the file.
    pub fn payload(&self, codec: &dyn Codec) -> Result<Vec<u8>, NasError> {
        if codec.tag() != self.codec_tag {
            return Err(NasError::CodecMismatch {
                file: self.codec_tag,
                provided: codec.tag(),
            });
        }
        Ok(codec.decompress(&self.compressed)?)
    }
}

fn read_exact<R: Read>(src: &mut R, buf: &mut [u8], what: &'static str) -> Result<(), NasError> {
    src.read_exact(buf).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => NasError::Truncated { what },
        _ => NasError::Io(e),
    })
}

/// Read exactly `len` bytes without trusting `len` for the allocation.
fn read_counted<R: Read>(src: &mut R, len: u64, what: &'static str) -> Result<Vec<u8>, NasError> {
    let mut buf = Vec::new();
    src.take(len).read_to_end(&mut buf)?;
    if (buf.len() as u64) < len {
        return Err(NasError::Truncated { what });
    }
    Ok(buf)
}

fn expect_tag<R: Read + Seek>(src: &mut R, offset: u64, expected: [u8; 4]) -> Result<(), NasError> {
    src.seek(SeekFrom::Start(offset))?;
    let mut found = [0u8; 4];
    read_exact(src, &mut found, "chunk tag")?;
    if found != expected {
        return Err(NasError::UnexpectedChunk {
            offset,
            expected,
            found,
        });
    }
    Ok(())
}
