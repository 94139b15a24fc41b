pub mod bitstream;
pub mod colorer;
pub mod control_word;
pub mod decoder;
pub mod dictionary;
pub mod encoder;
pub mod error;
pub mod sequencer;
pub mod table;

pub use bitstream::{BitReader, BitWriter, MaskReader};
pub use colorer::{BufferColorer, FrameBuffer, TILE_SIZE, TileColorer};
pub use control_word::{ControlWord, PackedControlWord, TileType};
pub use decoder::{DecodeStats, FrameDecoder, FrameDecoderBuilder};
pub use dictionary::DictionaryWriter;
pub use encoder::{EncodedScene, EncoderOptions, SceneEncoder};
pub use error::{CodecError, Result};
pub use sequencer::{ControlWordSequencer, EncodedFrame, OperationKey, SequencedTable, TileOp};
pub use table::ControlWordTable;
