mod zlib_codec;

pub use zlib_codec::ZlibCodec;

use nas_core::format::TAG_ZLIB;
use nas_core::{Codec, NasError};

/// Resolve a codec from the payload sub-chunk tag of an existing file.
///
/// Called by the CLI when inspecting a container, so the payload can be
/// inflated with the codec that wrote it.
pub fn codec_by_tag(tag: [u8; 4]) -> Result<Box<dyn Codec>, NasError> {
    match tag {
        TAG_ZLIB => Ok(Box::new(ZlibCodec)),
        _ => Err(NasError::UnknownCodec(tag)),
    }
}
