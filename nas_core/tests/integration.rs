/// Integration tests: encode sample matrices into complete NAS containers and
/// check the on-disk layout byte by byte.
///
/// The payload is inflated with `flate2` directly rather than through the
/// codec that wrote it, so the ZLIB sub-chunk is checked against an
/// independent zlib implementation.
use std::io::{Cursor, Read};

use flate2::read::ZlibDecoder;

use nas_codecs::ZlibCodec;
use nas_core::format::{align_up, ALIGNMENT, FILL_BYTE};
use nas_core::{
    encode, encode_blocks, encode_file, Codec, ElementType, Encoder, EncoderConfig, NasError,
    Reader, SampleMatrix, Stage,
};

// ── helpers ───────────────────────────────────────────────────────────────

fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("nas_test_{}.nas", name))
}

fn encode_bytes(matrix: SampleMatrix, checksum: bool) -> (Vec<u8>, nas_core::EncodeReport) {
    let config = EncoderConfig {
        checksum,
        ..Default::default()
    };
    let (out, report) = encode(
        Cursor::new(Vec::new()),
        matrix,
        44_100,
        Box::new(ZlibCodec::default()),
        config,
    )
    .unwrap();
    (out.into_inner(), report)
}

/// Pass-through codec so block bytes can be checked without inflating.
struct Verbatim;

impl Codec for Verbatim {
    fn tag(&self) -> [u8; 4] {
        *b"RAW "
    }

    fn name(&self) -> &'static str {
        "verbatim"
    }

    fn compress(&self, raw: &[u8]) -> std::io::Result<Vec<u8>> {
        Ok(raw.to_vec())
    }

    fn decompress(&self, compressed: &[u8]) -> std::io::Result<Vec<u8>> {
        Ok(compressed.to_vec())
    }
}

fn u32_at(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap())
}

fn inflate(compressed: &[u8]) -> Vec<u8> {
    let mut raw = Vec::new();
    ZlibDecoder::new(compressed).read_to_end(&mut raw).unwrap();
    raw
}

/// Returns (codec tag, compressed bytes) of the payload sub-chunk.
fn payload_subchunk(bytes: &[u8]) -> ([u8; 4], &[u8]) {
    let start = 128;
    let tag: [u8; 4] = bytes[start..start + 4].try_into().unwrap();
    let len = u32_at(bytes, start + 4) as usize;
    (tag, &bytes[start + 8..start + 8 + len])
}

fn i16s(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|c| i16::from_le_bytes([c[0], c[1]]))
        .collect()
}

fn ramp_then_constant() -> SampleMatrix {
    SampleMatrix::mono(vec![0i16, 1, 2, 3, 100, 100, 100, 100])
}

// ── tests ──────────────────────────────────────────────────────────────────

/// One int16 channel: a compressed ramp followed by a repeated constant.
#[test]
fn test_compressed_then_repeated_payload() {
    let (bytes, report) = encode_bytes(ramp_then_constant(), false);

    let (tag, compressed) = payload_subchunk(&bytes);
    assert_eq!(&tag, b"ZLIB");
    assert_eq!(i16s(&inflate(compressed)), vec![0, 1, 1, 1, 4, 100]);

    assert_eq!(report.stats.compressed, 1);
    assert_eq!(report.stats.repeated, 1);
    assert_eq!(report.stats.raw, 0);
    assert_eq!(report.payload_len, 12);
    assert_eq!(report.compressed_len as usize, compressed.len());
}

#[test]
fn test_header_fields_and_fill() {
    let (bytes, _) = encode_bytes(ramp_then_constant(), false);

    assert_eq!(&bytes[0..3], b"NAS");
    assert_eq!(bytes[3], 0x23, "int16 type tag");
    assert_eq!(u32_at(&bytes, 4), 64);
    assert_eq!(bytes[8], 1, "channel descriptor");
    assert_eq!(&bytes[9..14], &[8, 0, 0, 0, 0], "uint40 frame count");
    assert_eq!(bytes[14], 4, "block-size constant");
    assert_eq!(bytes[15], FILL_BYTE);
    assert!(bytes[24..64].iter().all(|&b| b == FILL_BYTE));

    assert_eq!(&bytes[64..68], b"DATA");
    assert!(bytes[68..128].iter().all(|&b| b == FILL_BYTE));
}

#[test]
fn test_pointer_table_without_checksum() {
    let (bytes, report) = encode_bytes(ramp_then_constant(), false);
    assert_eq!(u32_at(&bytes, 16), 64);
    assert_eq!(u32_at(&bytes, 20), 0);
    assert_eq!(report.checksum_offset, 0);
    assert!(!bytes.windows(4).any(|w| w == b"CHKS"));
}

#[test]
fn test_checksum_chunk_and_backpatches() {
    let (bytes, report) = encode_bytes(ramp_then_constant(), true);

    let chks = u32_at(&bytes, 20) as usize;
    assert_eq!(u32_at(&bytes, 16), 64);
    assert_eq!(chks as u64, report.checksum_offset);
    assert_eq!(chks as u64, align_up(128 + 8 + report.compressed_len));
    assert_eq!(&bytes[chks..chks + 4], b"CHKS");

    // size field holds the chunk's end offset after alignment
    let end = u32_at(&bytes, chks + 4) as usize;
    assert_eq!(end, bytes.len());
    assert_eq!(end as u64 % ALIGNMENT, 0);

    let first = f64::from_le_bytes(bytes[chks + 8..chks + 16].try_into().unwrap());
    let second = f64::from_le_bytes(bytes[chks + 16..chks + 24].try_into().unwrap());
    let blocks = encode_blocks(&ramp_then_constant()).unwrap();
    assert_eq!(first, blocks.checksums[0].stored_value());
    assert_eq!(second, blocks.checksums[1].stored_value());
    assert!(bytes[chks + 24..].iter().all(|&b| b == FILL_BYTE));
}

/// Every chunk ends on the 64-byte grid, whatever the payload size.
#[test]
fn test_file_length_always_aligned() {
    for frames in [0usize, 3, 4, 17, 64, 1000, 4099] {
        let samples: Vec<i32> = (0..frames * 3).map(|i| (i as i32 * 7919) % 50_000).collect();
        let matrix = SampleMatrix::from_interleaved(3, samples).unwrap();
        for checksum in [false, true] {
            let (bytes, report) = encode_bytes(matrix.clone(), checksum);
            assert_eq!(bytes.len() as u64 % ALIGNMENT, 0, "frames={frames}");
            assert_eq!(report.file_size, bytes.len() as u64);
        }
    }
}

#[test]
fn test_type_tags_for_supported_types() {
    let cases: Vec<(SampleMatrix, u8)> = vec![
        (SampleMatrix::mono(vec![0.25f32; 8]), 0x19),
        (SampleMatrix::mono(vec![0.25f64; 8]), 0x19),
        (SampleMatrix::mono(vec![5i8; 8]), 0x21),
        (SampleMatrix::mono(vec![5i16; 8]), 0x23),
        (SampleMatrix::mono(vec![5i32; 8]), 0x29),
        (SampleMatrix::mono(vec![5u8; 8]), 0x41),
        (SampleMatrix::mono(vec![5u16; 8]), 0x43),
        (SampleMatrix::mono(vec![5u32; 8]), 0x49),
    ];
    for (matrix, tag) in cases {
        let element = matrix.element_type();
        let (bytes, _) = encode_bytes(matrix, false);
        assert_eq!(bytes[3], tag, "{element}");
        assert_eq!(bytes[9], 8, "{element}");
    }
}

#[test]
fn test_float64_is_narrowed_before_encoding() {
    let samples = vec![0.0f64, 0.01, 0.02, 0.03, 0.5, -0.5, 0.5, -0.5];
    let (bytes, report) = encode_bytes(SampleMatrix::mono(samples), false);

    assert_eq!(report.element_type, ElementType::F32);
    let (_, compressed) = payload_subchunk(&bytes);
    let payload = inflate(compressed);
    assert_eq!(payload.len(), 8 * 4, "two four-element float32 blocks");
    let first = f32::from_le_bytes(payload[0..4].try_into().unwrap());
    assert_eq!(first, 0.0);
    assert_eq!(report.stats.compressed, 1);
    assert_eq!(report.stats.raw, 1);
}

#[test]
fn test_extended_channel_descriptor() {
    let matrix = SampleMatrix::from_interleaved(9, vec![1u8; 9 * 4]).unwrap();
    let (bytes, report) = encode_bytes(matrix, false);
    assert_eq!(bytes[8], 0x89);
    assert_eq!(report.stats.repeated, 9);
}

/// Without strict typing the header is written with the fallback tag and the
/// failure surfaces in the data stage.
#[test]
fn test_unsupported_type_fails_in_data_stage() {
    let mut encoder = Encoder::new(
        Cursor::new(Vec::new()),
        Box::new(ZlibCodec::default()),
        EncoderConfig::default(),
    )
    .unwrap();
    encoder
        .write_header(SampleMatrix::mono(vec![1i64, 2, 3, 4]), 8_000)
        .unwrap();
    assert_eq!(encoder.get_ref().get_ref()[3], 0x01, "fallback tag");

    let err = encoder.write_data().unwrap_err();
    assert!(matches!(err, NasError::UnsupportedSampleType(ElementType::I64)));
    assert_eq!(encoder.stage(), Stage::HeaderWritten);
}

#[test]
fn test_float16_keeps_its_tag_but_cannot_be_encoded() {
    let samples = vec![half::f16::from_f32(0.5); 4];
    let mut encoder = Encoder::new(
        Cursor::new(Vec::new()),
        Box::new(ZlibCodec::default()),
        EncoderConfig::default(),
    )
    .unwrap();
    encoder.write_header(SampleMatrix::mono(samples), 8_000).unwrap();
    assert_eq!(encoder.get_ref().get_ref()[3], 0x13);
    assert!(matches!(
        encoder.write_data(),
        Err(NasError::UnsupportedSampleType(ElementType::F16))
    ));
}

#[test]
fn test_strict_types_rejects_before_header() {
    let config = EncoderConfig {
        strict_types: true,
        ..Default::default()
    };
    let mut encoder =
        Encoder::new(Cursor::new(Vec::new()), Box::new(ZlibCodec::default()), config).unwrap();
    let err = encoder
        .write_header(SampleMatrix::mono(vec![7u64; 8]), 8_000)
        .unwrap_err();
    assert!(matches!(err, NasError::UnsupportedSampleType(ElementType::U64)));
    assert_eq!(encoder.stage(), Stage::Init);
    assert!(encoder.get_ref().get_ref().iter().all(|&b| b == FILL_BYTE));
}

#[test]
fn test_stages_must_run_in_order() {
    let mut encoder = Encoder::new(
        Cursor::new(Vec::new()),
        Box::new(ZlibCodec::default()),
        EncoderConfig::default(),
    )
    .unwrap();
    assert!(matches!(encoder.write_data(), Err(NasError::OutOfOrder { .. })));
    assert!(matches!(encoder.write_pointer_table(), Err(NasError::OutOfOrder { .. })));

    encoder.write_header(ramp_then_constant(), 8_000).unwrap();
    assert!(matches!(
        encoder.write_header(ramp_then_constant(), 8_000),
        Err(NasError::OutOfOrder { .. })
    ));
    assert!(matches!(encoder.write_checksum(true), Err(NasError::OutOfOrder { .. })));

    encoder.write_data().unwrap();
    encoder.write_checksum(false).unwrap();
    assert_eq!(encoder.stage(), Stage::ChecksumSkipped);
    encoder.write_pointer_table().unwrap();
    assert!(encoder.finish().is_ok());
}

#[test]
fn test_checksum_words_follow_block_order() {
    // two channels: channel 0 raw, channel 1 compressed
    let samples: Vec<i16> = vec![0, 10, 9000, 11, -9000, 12, 50, 13];
    let matrix = SampleMatrix::from_interleaved(2, samples).unwrap();
    let mut encoder = Encoder::new(
        Cursor::new(Vec::new()),
        Box::new(ZlibCodec::default()),
        EncoderConfig::default(),
    )
    .unwrap();
    encoder.write_header(matrix, 8_000).unwrap();
    encoder.write_data().unwrap();

    let kinds: Vec<_> = encoder.checksums().iter().map(|c| c.kind).collect();
    assert_eq!(
        kinds,
        vec![nas_core::BlockKind::Raw, nas_core::BlockKind::Compressed]
    );
    assert!(encoder.checksums().iter().all(|c| c.offset == 0));
}

/// Write to disk, reopen with the structural reader, and compare every part.
#[test]
fn test_reader_round_trip_from_file() {
    let path = temp_path("reader_round_trip");
    let samples: Vec<u16> = (0..4096u32).map(|i| ((i * 37) % 1200) as u16).collect();
    let matrix = SampleMatrix::from_interleaved(2, samples).unwrap();
    let expected = encode_blocks(&matrix).unwrap();

    let config = EncoderConfig {
        checksum: true,
        ..Default::default()
    };
    let report = encode_file(&path, matrix, 48_000, Box::new(ZlibCodec::default()), config).unwrap();

    let reader = Reader::open(&path).unwrap();
    assert_eq!(reader.header().channels.count(), 2);
    assert_eq!(reader.header().frames, 2048);
    assert_eq!(reader.header().type_tag, report.type_tag);
    assert_eq!(reader.pointers().header_ptr, 64);
    assert_eq!(reader.data_offset(), 64);
    assert_eq!(&reader.codec_tag(), b"ZLIB");
    assert_eq!(reader.expected_blocks(), expected.stats.total());

    let payload = reader.payload(&ZlibCodec::default()).unwrap();
    assert_eq!(payload, expected.payload);

    let chunk = reader.checksum_chunk().unwrap();
    assert_eq!(chunk.offset, report.checksum_offset);
    assert_eq!(chunk.end as u64, report.file_size);
    let stored: Vec<f64> = expected.checksums.iter().map(|c| c.stored_value()).collect();
    assert_eq!(chunk.values, stored);
}

#[test]
fn test_reader_codec_mismatch_error() {
    let config = EncoderConfig::default();
    let (out, _) = encode(
        Cursor::new(Vec::new()),
        ramp_then_constant(),
        8_000,
        Box::new(Verbatim),
        config,
    )
    .unwrap();
    let reader = Reader::from_reader(Cursor::new(out.into_inner())).unwrap();
    assert_eq!(&reader.codec_tag(), b"RAW ");
    assert!(reader.checksum_chunk().is_none());

    let err = reader.payload(&ZlibCodec::default()).unwrap_err();
    assert!(
        err.to_string().contains("codec mismatch"),
        "error message should mention codec mismatch, got: {err}"
    );
    assert_eq!(
        reader.payload(&Verbatim).unwrap(),
        encode_blocks(&ramp_then_constant()).unwrap().payload
    );
}

#[test]
fn test_injected_codec_sees_block_stream() {
    let (out, _) = encode(
        Cursor::new(Vec::new()),
        ramp_then_constant(),
        8_000,
        Box::new(Verbatim),
        EncoderConfig::default(),
    )
    .unwrap();
    let bytes = out.into_inner();
    let (tag, payload) = payload_subchunk(&bytes);
    assert_eq!(&tag, b"RAW ");
    assert_eq!(i16s(payload), vec![0, 1, 1, 1, 4, 100]);
}

#[test]
fn test_reader_rejects_truncated_and_foreign_files() {
    let (bytes, _) = encode_bytes(ramp_then_constant(), true);

    let err = Reader::from_reader(Cursor::new(bytes[..100].to_vec())).unwrap_err();
    assert!(matches!(err, NasError::Truncated { .. }));

    let mut foreign = bytes.clone();
    foreign[0..3].copy_from_slice(b"RIF");
    assert!(matches!(
        Reader::from_reader(Cursor::new(foreign)),
        Err(NasError::BadMagic(_))
    ));

    let mut no_data = bytes;
    no_data[64..68].copy_from_slice(b"JUNK");
    assert!(matches!(
        Reader::from_reader(Cursor::new(no_data)),
        Err(NasError::UnexpectedChunk { offset: 64, .. })
    ));
}

#[test]
fn test_reader_rejects_oversized_payload_length() {
    let (mut bytes, _) = encode_bytes(ramp_then_constant(), false);
    // payload length field follows the ZLIB tag at offset 128
    bytes[132..136].copy_from_slice(&u32::MAX.to_le_bytes());
    assert!(matches!(
        Reader::from_reader(Cursor::new(bytes)),
        Err(NasError::Truncated { what: "compressed payload" })
    ));
}

#[test]
fn test_reader_keeps_all_checksums_with_extended_descriptor() {
    // 16 channels x 8 frames: the descriptor keeps only the low nibble (0)
    let samples: Vec<u8> = (0..16 * 8).map(|i| (i % 251) as u8).collect();
    let matrix = SampleMatrix::from_interleaved(16, samples).unwrap();
    let expected = encode_blocks(&matrix).unwrap();
    assert_eq!(expected.checksums.len(), 32);

    let (bytes, report) = encode_bytes(matrix, true);
    let reader = Reader::from_reader(Cursor::new(bytes)).unwrap();
    assert!(reader.header().channels.is_extended());
    assert_eq!(reader.expected_blocks(), 0);

    let chunk = reader.checksum_chunk().unwrap();
    assert_eq!(chunk.offset, report.checksum_offset);
    let stored: Vec<f64> = expected.checksums.iter().map(|c| c.stored_value()).collect();
    assert_eq!(chunk.values, stored);
}
