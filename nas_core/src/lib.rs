pub mod block;
pub mod codec;
pub mod error;
pub mod format;
pub mod reader;
pub mod sample;
pub mod tag;
pub mod writer;

pub use block::{classify, encode_blocks, BlockKind, BlockStats, ChecksumWord, EncodedBlocks};
pub use codec::Codec;
pub use error::NasError;
pub use format::{NasHeader, PointerTable, MAGIC};
pub use reader::Reader;
pub use sample::{ElementType, SampleBuffer, SampleMatrix};
pub use tag::TypeTag;
pub use writer::{encode, encode_file, EncodeReport, Encoder, EncoderConfig, Stage};
