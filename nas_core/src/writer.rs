use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::block::{encode_blocks, BlockStats, ChecksumWord};
use crate::codec::Codec;
use crate::error::NasError;
use crate::format::{
    padding_for, NasHeader, PointerTable, ALIGNMENT, FILL_BYTE, HEADER_CHUNK_POINTER,
    POINTER_TABLE_OFFSET, TAG_CHKS, TAG_DATA,
};
use crate::sample::{ElementType, SampleMatrix};
use crate::tag::TypeTag;

/// Encoder options.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncoderConfig {
    /// Write the CHKS chunk. Used by [`encode`]; the staged API takes the flag directly.
    pub checksum: bool,
    /// Reject element types the block encoder cannot handle before writing the
    /// header. When off, such types get a header (with the fallback tag where
    /// they have no tag) and fail in [`Encoder::write_data`].
    pub strict_types: bool,
}

/// Pipeline position. Every stage runs exactly once, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    HeaderWritten,
    DataWritten,
    ChecksumWritten,
    ChecksumSkipped,
    PointersFinalized,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::Init => "init",
            Stage::HeaderWritten => "header",
            Stage::DataWritten => "data",
            Stage::ChecksumWritten => "checksum",
            Stage::ChecksumSkipped => "checksum (skipped)",
            Stage::PointersFinalized => "pointer table",
        }
    }
}

/// Summary of one finished encode.
#[derive(Debug, Clone)]
pub struct EncodeReport {
    /// Element type after float64 narrowing.
    pub element_type: ElementType,
    pub type_tag: TypeTag,
    pub sample_rate: u32,
    pub channels: usize,
    pub frames: u64,
    pub stats: BlockStats,
    /// Concatenated block payload size before compression.
    pub payload_len: u64,
    pub compressed_len: u64,
    pub codec_tag: [u8; 4],
    /// Offset of the DATA tag.
    pub data_offset: u64,
    /// Offset of the CHKS tag, or 0 when the chunk was skipped.
    pub checksum_offset: u64,
    pub file_size: u64,
}

struct Source {
    matrix: SampleMatrix,
    sample_rate: u32,
    type_tag: TypeTag,
}

/// Staged writer for NAS containers.
///
/// # Write contract
/// Call the stages in order, each exactly once:
/// [`write_header`] → [`write_data`] → [`write_checksum`] →
/// [`write_pointer_table`] → [`finish`]. Out-of-order calls fail with
/// [`NasError::OutOfOrder`] and write nothing.
///
/// # Format layout written
/// ```text
/// [HEADER: 15 bytes of fields + 0xCD fill to 64]
/// ["DATA" + fill] ["ZLIB" len:u32 compressed... + fill]
/// ["CHKS" end:u32 value:f64 × N + fill]                  ← optional
/// ← seek to 16, overwrite [64:u32][chks_offset:u32]
/// ```
///
/// The encode is append-only apart from two backpatches (the CHKS end field
/// and the pointer table). A failure part-way leaves a truncated file behind.
///
/// [`write_header`]: Encoder::write_header
/// [`write_data`]: Encoder::write_data
/// [`write_checksum`]: Encoder::write_checksum
/// [`write_pointer_table`]: Encoder::write_pointer_table
/// [`finish`]: Encoder::finish
pub struct Encoder<W: Write + Seek> {
    out: W,
    codec: Box<dyn Codec>,
    config: EncoderConfig,
    /// Current write position (mirrors the stream cursor).
    cursor: u64,
    stage: Stage,
    source: Option<Source>,
    checksums: Vec<ChecksumWord>,
    stats: BlockStats,
    payload_len: u64,
    compressed_len: u64,
    data_offset: u64,
    checksum_ptr: u32,
}

impl Encoder<BufWriter<File>> {
    /// Create a new NAS file at `path`, overwriting any existing file.
    pub fn create(
        path: impl AsRef<Path>,
        codec: Box<dyn Codec>,
        config: EncoderConfig,
    ) -> Result<Self, NasError> {
        let file = File::create(path)?;
        Self::new(BufWriter::new(file), codec, config)
    }
}

impl<W: Write + Seek> Encoder<W> {
    /// Wrap a destination positioned at its start. The first 64 bytes are
    /// pre-filled with `0xCD`.
    pub fn new(mut out: W, codec: Box<dyn Codec>, config: EncoderConfig) -> Result<Self, NasError> {
        out.write_all(&[FILL_BYTE; ALIGNMENT as usize])?;
        out.seek(SeekFrom::Start(0))?;
        Ok(Self {
            out,
            codec,
            config,
            cursor: 0,
            stage: Stage::Init,
            source: None,
            checksums: Vec::new(),
            stats: BlockStats::default(),
            payload_len: 0,
            compressed_len: 0,
            data_offset: 0,
            checksum_ptr: 0,
        })
    }

    /// The destination as written so far.
    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Checksum words accumulated by [`write_data`](Self::write_data), in emission order.
    pub fn checksums(&self) -> &[ChecksumWord] {
        &self.checksums
    }

    fn expect_stage(&self, attempted: Stage, allowed: &[Stage]) -> Result<(), NasError> {
        if allowed.contains(&self.stage) {
            Ok(())
        } else {
            Err(NasError::OutOfOrder {
                attempted: attempted.name(),
                current: self.stage.name(),
            })
        }
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), NasError> {
        self.out.write_all(bytes)?;
        self.cursor += bytes.len() as u64;
        Ok(())
    }

    /// Pad with `0xCD` up to the next 64-byte boundary.
    fn align(&mut self) -> Result<(), NasError> {
        let padding = padding_for(self.cursor);
        debug!("padding {} bytes at offset {}", padding, self.cursor);
        self.write_bytes(&vec![FILL_BYTE; padding as usize])
    }

    /// Overwrite bytes at `at`, then return to the append position.
    fn patch(&mut self, at: u64, bytes: &[u8]) -> Result<(), NasError> {
        self.out.seek(SeekFrom::Start(at))?;
        self.out.write_all(bytes)?;
        self.out.seek(SeekFrom::Start(self.cursor))?;
        Ok(())
    }

    /// Resolve the element type, write the header fields and align.
    ///
    /// float64 input is narrowed to float32 here, so the type tag and the
    /// block payload always agree.
    pub fn write_header(&mut self, matrix: SampleMatrix, sample_rate: u32) -> Result<(), NasError> {
        self.expect_stage(Stage::HeaderWritten, &[Stage::Init])?;

        if matrix.element_type() == ElementType::F64 {
            info!("downcasting float64 to float32 to reduce file size");
        }
        let matrix = matrix.narrowed();
        let element = matrix.element_type();
        if self.config.strict_types && !element.is_block_encodable() {
            return Err(NasError::UnsupportedSampleType(element));
        }

        let type_tag = TypeTag::for_element(element);
        let header = NasHeader::new(type_tag, matrix.channels(), matrix.frames() as u64);
        self.write_bytes(&header.to_bytes())?;
        self.align()?;

        self.source = Some(Source {
            matrix,
            sample_rate,
            type_tag,
        });
        self.stage = Stage::HeaderWritten;
        Ok(())
    }

    /// Block-encode every channel, compress the payload and write the DATA chunk.
    pub fn write_data(&mut self) -> Result<(), NasError> {
        self.expect_stage(Stage::DataWritten, &[Stage::HeaderWritten])?;
        let source = self.source.as_ref().ok_or(NasError::OutOfOrder {
            attempted: Stage::DataWritten.name(),
            current: self.stage.name(),
        })?;

        let blocks = encode_blocks(&source.matrix)?;
        let compressed = self.codec.compress(&blocks.payload)?;
        let compressed_len = to_u32("compressed payload length", compressed.len() as u64)?;

        self.data_offset = self.cursor;
        self.write_bytes(&TAG_DATA)?;
        self.align()?;
        let tag = self.codec.tag();
        self.write_bytes(&tag)?;
        self.write_bytes(&compressed_len.to_le_bytes())?;
        self.write_bytes(&compressed)?;
        self.align()?;

        info!(
            "blocks written: {} (compressed {}, repeated {}, raw {})",
            blocks.stats.total(),
            blocks.stats.compressed,
            blocks.stats.repeated,
            blocks.stats.raw
        );
        info!(
            "payload: {} bytes uncompressed, {} bytes {}",
            blocks.payload.len(),
            compressed.len(),
            self.codec.name()
        );

        self.payload_len = blocks.payload.len() as u64;
        self.compressed_len = compressed.len() as u64;
        self.stats = blocks.stats;
        self.checksums = blocks.checksums;
        self.stage = Stage::DataWritten;
        Ok(())
    }

    /// Write the CHKS chunk when `enabled`; otherwise record a null checksum pointer.
    ///
    /// The u32 after the tag is backpatched with the chunk's end offset after alignment.
    pub fn write_checksum(&mut self, enabled: bool) -> Result<(), NasError> {
        self.expect_stage(Stage::ChecksumWritten, &[Stage::DataWritten])?;

        if !enabled {
            self.checksum_ptr = 0;
            self.stage = Stage::ChecksumSkipped;
            return Ok(());
        }

        let chunk_start = self.cursor;
        self.checksum_ptr = to_u32("checksum chunk offset", chunk_start)?;
        self.write_bytes(&TAG_CHKS)?;
        self.write_bytes(&[0u8; 4])?;
        let mut values = Vec::with_capacity(self.checksums.len() * 8);
        for word in &self.checksums {
            values.extend_from_slice(&word.stored_value().to_le_bytes());
        }
        self.write_bytes(&values)?;
        self.align()?;

        let chunk_end = to_u32("checksum chunk end", self.cursor)?;
        self.patch(chunk_start + 4, &chunk_end.to_le_bytes())?;
        debug!(
            "checksum chunk: {} values at offset {}, file size {} bytes",
            self.checksums.len(),
            chunk_start,
            self.cursor
        );

        self.stage = Stage::ChecksumWritten;
        Ok(())
    }

    /// Finalize the pointer table at offset 16.
    pub fn write_pointer_table(&mut self) -> Result<(), NasError> {
        self.expect_stage(
            Stage::PointersFinalized,
            &[Stage::ChecksumWritten, Stage::ChecksumSkipped],
        )?;
        let table = PointerTable {
            header_ptr: HEADER_CHUNK_POINTER,
            checksum_ptr: self.checksum_ptr,
        };
        self.patch(POINTER_TABLE_OFFSET, &table.to_bytes())?;
        self.stage = Stage::PointersFinalized;
        Ok(())
    }

    /// Flush the destination and hand it back with the encode summary.
    pub fn finish(mut self) -> Result<(W, EncodeReport), NasError> {
        let finish_err = NasError::OutOfOrder {
            attempted: "finish",
            current: self.stage.name(),
        };
        if self.stage != Stage::PointersFinalized {
            return Err(finish_err);
        }
        let source = self.source.take().ok_or(finish_err)?;
        self.out.flush()?;

        let report = EncodeReport {
            element_type: source.matrix.element_type(),
            type_tag: source.type_tag,
            sample_rate: source.sample_rate,
            channels: source.matrix.channels(),
            frames: source.matrix.frames() as u64,
            stats: self.stats,
            payload_len: self.payload_len,
            compressed_len: self.compressed_len,
            codec_tag: self.codec.tag(),
            data_offset: self.data_offset,
            checksum_offset: self.checksum_ptr as u64,
            file_size: self.cursor,
        };
        Ok((self.out, report))
    }
}

fn to_u32(what: &'static str, value: u64) -> Result<u32, NasError> {
    u32::try_from(value).map_err(|_| NasError::OffsetOverflow { what, value })
}

/// Run the whole pipeline on `out`, writing the CHKS chunk when `config.checksum` is set.
pub fn encode<W: Write + Seek>(
    out: W,
    matrix: SampleMatrix,
    sample_rate: u32,
    codec: Box<dyn Codec>,
    config: EncoderConfig,
) -> Result<(W, EncodeReport), NasError> {
    run_stages(Encoder::new(out, codec, config)?, matrix, sample_rate)
}

/// Encode into a new file at `path`.
pub fn encode_file(
    path: impl AsRef<Path>,
    matrix: SampleMatrix,
    sample_rate: u32,
    codec: Box<dyn Codec>,
    config: EncoderConfig,
) -> Result<EncodeReport, NasError> {
    let (_, report) = run_stages(Encoder::create(path, codec, config)?, matrix, sample_rate)?;
    Ok(report)
}

fn run_stages<W: Write + Seek>(
    mut encoder: Encoder<W>,
    matrix: SampleMatrix,
    sample_rate: u32,
) -> Result<(W, EncodeReport), NasError> {
    encoder.write_header(matrix, sample_rate)?;
    encoder.write_data()?;
    encoder.write_checksum(encoder.config.checksum)?;
    encoder.write_pointer_table()?;
    encoder.finish()
}
