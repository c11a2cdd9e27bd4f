/// Compressor for the block payload carried inside the DATA chunk.
///
/// Each `Codec` implementation:
/// - Is identified by a stable 4-byte sub-chunk tag written in front of the
///   compressed bytes (`ZLIB` for the default deflate codec).
/// - Compresses the whole concatenated block stream in one call; the
///   container holds exactly one payload sub-chunk.
/// - Must reproduce the input byte-exactly from `decompress`.
pub trait Codec: Send + Sync {
    /// Sub-chunk tag stored before the compressed length.
    fn tag(&self) -> [u8; 4];

    /// Human-readable codec name for CLI display.
    fn name(&self) -> &'static str;

    fn compress(&self, raw: &[u8]) -> std::io::Result<Vec<u8>>;

    fn decompress(&self, compressed: &[u8]) -> std::io::Result<Vec<u8>>;
}
