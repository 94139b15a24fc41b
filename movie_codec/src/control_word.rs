//! Control words: one tile-painting instruction each.
//!
//! Layout of the 24 significant bits:
//!
//! ```text
//!  23    20 19   17 16                     0
//! +--------+-------+------------------------+
//! | count  | type  |       parameter        |   terminal word (count != 0)
//! +--------+-------+------------------------+
//! |  0000  |          long offset           |   indirection (count == 0)
//! +--------+--------------------------------+
//! ```

const COUNT_SHIFT: u32 = 20;
const COUNT_MASK: u32 = 0xF;
const TYPE_SHIFT: u32 = 17;
const TYPE_MASK: u32 = 0x7;
const PARAMETER_MASK: u32 = 0x1_FFFF;
const LONG_OFFSET_MASK: u32 = 0xF_FFFF;
const VALUE_MASK: u32 = 0xFF_FFFF;
const TIMES_SHIFT: u32 = 24;

/// Largest value the 17-bit parameter field can carry.
pub const MAX_PARAMETER: u32 = PARAMETER_MASK;

/// Largest offset a long-offset indirection can address.
pub const MAX_LONG_OFFSET: u32 = LONG_OFFSET_MASK;

/// Largest code length the 4-bit count field can carry.
pub const MAX_COUNT: u32 = COUNT_MASK;

/// How a tile is painted (or not painted).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum TileType {
    Skip = 0,
    RepeatPrevious = 1,
    Color2Static = 2,
    Color2Masked = 3,
    Color4Masked = 4,
    Color8Masked = 5,
    Color16Masked = 6,
    Unknown = 7,
}

impl TileType {
    pub fn from_bits(bits: u32) -> Self {
        match bits & TYPE_MASK {
            0 => TileType::Skip,
            1 => TileType::RepeatPrevious,
            2 => TileType::Color2Static,
            3 => TileType::Color2Masked,
            4 => TileType::Color4Masked,
            5 => TileType::Color8Masked,
            6 => TileType::Color16Masked,
            _ => TileType::Unknown,
        }
    }

    /// Palette size and mask width for painting types.
    ///
    /// Returns `(colors, mask_bytes, index_bits)`; `mask_bytes` is zero when
    /// the mask is the fixed checkerboard.
    pub fn paint_shape(self) -> Option<(usize, usize, u32)> {
        match self {
            TileType::Color2Static => Some((2, 0, 1)),
            TileType::Color2Masked => Some((2, 2, 1)),
            TileType::Color4Masked => Some((4, 4, 2)),
            TileType::Color8Masked => Some((8, 6, 3)),
            TileType::Color16Masked => Some((16, 8, 4)),
            TileType::Skip | TileType::RepeatPrevious | TileType::Unknown => None,
        }
    }

    /// True for the types whose parameter is a dictionary offset.
    pub fn uses_dictionary(self) -> bool {
        matches!(
            self,
            TileType::Color4Masked | TileType::Color8Masked | TileType::Color16Masked
        )
    }
}

/// A single control word as stored in the unpacked table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ControlWord(pub u32);

impl ControlWord {
    pub const ZERO: ControlWord = ControlWord(0);

    /// Build a terminal word. `count` must be non-zero for the word to be
    /// terminal; callers pass code lengths in `1..=15`.
    pub fn terminal(kind: TileType, parameter: u32, count: u32) -> Self {
        debug_assert!(count != 0 && count <= COUNT_MASK);
        debug_assert!(parameter <= PARAMETER_MASK);
        ControlWord(
            ((count & COUNT_MASK) << COUNT_SHIFT)
                | ((kind as u32) << TYPE_SHIFT)
                | (parameter & PARAMETER_MASK),
        )
    }

    /// Build an indirection into the extension region of the table.
    pub fn long_offset_to(offset: u32) -> Self {
        debug_assert!(offset <= LONG_OFFSET_MASK);
        ControlWord(offset & LONG_OFFSET_MASK)
    }

    #[inline]
    pub fn value(self) -> u32 {
        self.0 & VALUE_MASK
    }

    #[inline]
    pub fn count(self) -> u32 {
        (self.0 >> COUNT_SHIFT) & COUNT_MASK
    }

    #[inline]
    pub fn tile_type(self) -> TileType {
        TileType::from_bits(self.0 >> TYPE_SHIFT)
    }

    #[inline]
    pub fn parameter(self) -> u32 {
        self.0 & PARAMETER_MASK
    }

    #[inline]
    pub fn is_long_offset(self) -> bool {
        self.count() == 0
    }

    #[inline]
    pub fn long_offset(self) -> u32 {
        self.0 & LONG_OFFSET_MASK
    }

    /// The two literal colors of a 2-color word.
    pub fn literal_colors(self) -> [u8; 2] {
        let parameter = self.parameter();
        [parameter as u8, (parameter >> 8) as u8]
    }
}

/// On-disk run-length record: word value plus repeat count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedControlWord(pub u32);

impl PackedControlWord {
    pub fn new(word: ControlWord, times: u8) -> Self {
        PackedControlWord(word.value() | ((times as u32) << TIMES_SHIFT))
    }

    #[inline]
    pub fn value(self) -> ControlWord {
        ControlWord(self.0 & VALUE_MASK)
    }

    #[inline]
    pub fn times(self) -> u8 {
        (self.0 >> TIMES_SHIFT) as u8
    }
}
