use thiserror::Error;

use crate::control_word::TileType;

/// Error conditions returned by the movie codec.
///
/// Format errors describe malformed input. `Unsupported` is kept apart from
/// them: it reports input that is well formed but cannot be expressed by the
/// codec, so callers can tell "not buildable" from "broken".
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("packed control word table shorter than its 4-byte header ({0} bytes)")]
    TableTooShort(usize),
    #[error("packed table header {0} is not a multiple of 3")]
    TableLengthNotMultipleOfThree(u32),
    #[error("packed table record {record} has a zero repeat count")]
    ZeroRepeat { record: usize },
    #[error("packed table record {record} repeats {times} times but only {remaining} slots remain")]
    RepeatOverrun {
        record: usize,
        times: usize,
        remaining: usize,
    },
    #[error("packed table ended after {produced} of {expected} control words")]
    TableTruncated { expected: usize, produced: usize },
    #[error("frame decoder option `{0}` was not provided")]
    MissingOption(&'static str),
    #[error("frame dimensions {width}x{height} are not non-zero multiples of 4")]
    InvalidDimensions { width: usize, height: usize },
    #[error("frame is {actual_width}x{actual_height} but {width}x{height} was expected")]
    DimensionMismatch {
        width: usize,
        height: usize,
        actual_width: usize,
        actual_height: usize,
    },
    #[error("control word {value:#08x} at index {index} resolves to type {kind:?}")]
    CorruptTable {
        index: usize,
        value: u32,
        kind: TileType,
    },
    #[error("control word index {index} outside table of {len} words")]
    TableIndexOutOfRange { index: usize, len: usize },
    #[error("dictionary range {offset}..{end} outside dictionary of {len} bytes")]
    DictionaryOutOfRange { offset: usize, end: usize, len: usize },
    #[error("tile operation {kind:?} with parameter {parameter:#x} was never registered")]
    UnregisteredOperation { kind: TileType, parameter: u32 },
    #[error("unsupported: {0}")]
    Unsupported(String),
}

pub type Result<T, E = CodecError> = std::result::Result<T, E>;
