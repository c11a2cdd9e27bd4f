use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use nas_core::format::TAG_ZLIB;
use nas_core::Codec;

/// zlib-wrapped deflate at a fixed level, the container's payload codec.
///
/// Output is a standard zlib stream (2-byte header, deflate data, Adler-32),
/// so any zlib implementation can inflate the payload sub-chunk.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZlibCodec;

impl ZlibCodec {
    pub const LEVEL: u32 = 6;
}

impl Codec for ZlibCodec {
    fn tag(&self) -> [u8; 4] {
        TAG_ZLIB
    }

    fn name(&self) -> &'static str {
        "zlib"
    }

    fn compress(&self, raw: &[u8]) -> std::io::Result<Vec<u8>> {
        let mut encoder =
            ZlibEncoder::new(Vec::with_capacity(raw.len() / 2), Compression::new(Self::LEVEL));
        encoder.write_all(raw)?;
        encoder.finish()
    }

    fn decompress(&self, compressed: &[u8]) -> std::io::Result<Vec<u8>> {
        let mut raw = Vec::new();
        ZlibDecoder::new(compressed).read_to_end(&mut raw)?;
        Ok(raw)
    }
}
