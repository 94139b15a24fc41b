//! Frame decoder.
//!
//! Each frame is a pair of streams: a bitstream of variable-length codes that
//! index the shared control word table, and a maskstream holding the per-tile
//! slot masks. Tiles are visited row by row until the bitstream runs out, so
//! a frame that stops early leaves the remaining tiles as they were.

use std::sync::Arc;

use log::{debug, trace};

use crate::bitstream::{BitReader, MaskReader};
use crate::colorer::{CHECKERBOARD_MASK, FrameBuffer, TILE_SIZE, TileColorer, check_dimensions};
use crate::control_word::{ControlWord, TileType};
use crate::error::{CodecError, Result};
use crate::table::ControlWordTable;

/// Width of the primary table index peeked for every tile.
pub const PRIMARY_INDEX_BITS: u32 = 12;

/// Bits consumed by the primary index of a long-offset word.
pub const LONG_PREFIX_BITS: u32 = 8;

/// Width of each chained extension offset.
pub const EXTENSION_BITS: u32 = 4;

/// Width of the inline skip count following a `Skip` word.
pub const SKIP_COUNT_BITS: u32 = 5;

/// Skip count meaning "the rest of this tile row".
pub const SKIP_REST_OF_ROW: u32 = (1 << SKIP_COUNT_BITS) - 1;

/// Collects the decoder configuration; `build` may be called repeatedly.
#[derive(Debug, Clone, Default)]
pub struct FrameDecoderBuilder {
    table: Option<Arc<ControlWordTable>>,
    dictionary: Option<Arc<[u8]>>,
    dimensions: Option<(usize, usize)>,
}

impl FrameDecoderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, table: impl Into<Arc<ControlWordTable>>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn dictionary(mut self, dictionary: impl Into<Arc<[u8]>>) -> Self {
        self.dictionary = Some(dictionary.into());
        self
    }

    /// Frame size in pixels; both must be multiples of 4.
    pub fn dimensions(mut self, width: usize, height: usize) -> Self {
        self.dimensions = Some((width, height));
        self
    }

    pub fn build(&self) -> Result<FrameDecoder> {
        let table = self.table.clone().ok_or(CodecError::MissingOption("table"))?;
        let dictionary = self
            .dictionary
            .clone()
            .ok_or(CodecError::MissingOption("dictionary"))?;
        let (width, height) = self
            .dimensions
            .ok_or(CodecError::MissingOption("dimensions"))?;
        check_dimensions(width, height)?;

        Ok(FrameDecoder {
            table,
            dictionary,
            width,
            height,
        })
    }
}

/// Counters describing one decoded frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    pub tiles_painted: usize,
    pub tiles_skipped: usize,
    pub bits_consumed: usize,
    pub mask_bytes_consumed: usize,
}

/// Decodes frames against one shared table and dictionary.
///
/// The decoder holds no per-frame state; every call starts fresh readers, so
/// one decoder can serve any number of frames, from any number of threads.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    table: Arc<ControlWordTable>,
    dictionary: Arc<[u8]>,
    width: usize,
    height: usize,
}

impl FrameDecoder {
    pub fn builder() -> FrameDecoderBuilder {
        FrameDecoderBuilder::new()
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    pub fn table(&self) -> &ControlWordTable {
        &self.table
    }

    pub fn dictionary(&self) -> &[u8] {
        &self.dictionary
    }

    /// Decode one frame into a [`FrameBuffer`] of matching size.
    pub fn decode_into(
        &self,
        bitstream: &[u8],
        maskstream: &[u8],
        frame: &mut FrameBuffer,
    ) -> Result<DecodeStats> {
        if frame.width() != self.width || frame.height() != self.height {
            return Err(CodecError::DimensionMismatch {
                width: self.width,
                height: self.height,
                actual_width: frame.width(),
                actual_height: frame.height(),
            });
        }
        self.decode(bitstream, maskstream, &mut frame.colorer())
    }

    /// Decode one frame, painting through `colorer`.
    pub fn decode<C>(
        &self,
        bitstream: &[u8],
        maskstream: &[u8],
        colorer: &mut C,
    ) -> Result<DecodeStats>
    where
        C: TileColorer + ?Sized,
    {
        let mut bits = BitReader::new(bitstream);
        let mut masks = MaskReader::new(maskstream);
        let mut last_control = ControlWord::ZERO;
        let mut stats = DecodeStats::default();

        let tiles_wide = self.width / TILE_SIZE;
        let tiles_high = self.height / TILE_SIZE;

        'rows: for tile_row in 0..tiles_high {
            let mut tile_col = 0;
            while tile_col < tiles_wide {
                if bits.exhausted() {
                    break 'rows;
                }

                let (index, mut word) = self.resolve(&mut bits)?;
                match word.tile_type() {
                    TileType::Unknown => {
                        return Err(CodecError::CorruptTable {
                            index,
                            value: word.value(),
                            kind: TileType::Unknown,
                        });
                    }
                    TileType::RepeatPrevious => word = last_control,
                    _ => {}
                }

                if word.tile_type() == TileType::Skip {
                    let count = bits.peek(SKIP_COUNT_BITS);
                    bits.advance(SKIP_COUNT_BITS as usize);
                    if count == SKIP_REST_OF_ROW {
                        stats.tiles_skipped += tiles_wide - tile_col;
                        break;
                    }
                    let run = (count as usize + 1).min(tiles_wide - tile_col);
                    stats.tiles_skipped += run;
                    tile_col += run;
                    continue;
                }

                self.paint(word, index, tile_col, tile_row, &mut masks, colorer)?;
                last_control = word;
                stats.tiles_painted += 1;
                tile_col += 1;
            }
        }

        stats.bits_consumed = bits.position().min(bitstream.len() * 8);
        stats.mask_bytes_consumed = masks.position();
        debug!(
            "decoded {}x{} frame: {} painted, {} skipped, {} bits, {} mask bytes",
            self.width,
            self.height,
            stats.tiles_painted,
            stats.tiles_skipped,
            stats.bits_consumed,
            stats.mask_bytes_consumed
        );
        Ok(stats)
    }

    /// Chase a code through the table until a terminal word is found.
    ///
    /// Returns the final table index with the word for error reporting.
    fn resolve(&self, bits: &mut BitReader<'_>) -> Result<(usize, ControlWord)> {
        let mut index = bits.peek(PRIMARY_INDEX_BITS) as usize;
        let mut word = self.table.get(index)?;

        if word.is_long_offset() {
            bits.advance(LONG_PREFIX_BITS as usize);
            let mut depth = 0;
            while word.is_long_offset() {
                bits.advance(EXTENSION_BITS as usize);
                let offset = bits.peek(EXTENSION_BITS) as usize;
                index = word.long_offset() as usize + offset;
                word = self.table.get(index)?;
                depth += 1;
                // A chain longer than the table must revisit an entry.
                if depth > self.table.len() {
                    return Err(CodecError::CorruptTable {
                        index,
                        value: word.value(),
                        kind: word.tile_type(),
                    });
                }
            }
            trace!("long-offset chain of depth {depth} resolved to index {index}");
        }

        bits.advance(word.count() as usize);
        Ok((index, word))
    }

    fn paint<C>(
        &self,
        word: ControlWord,
        index: usize,
        tile_col: usize,
        tile_row: usize,
        masks: &mut MaskReader<'_>,
        colorer: &mut C,
    ) -> Result<()>
    where
        C: TileColorer + ?Sized,
    {
        let kind = word.tile_type();
        let (colors, mask_bytes, index_bits) =
            kind.paint_shape().ok_or(CodecError::CorruptTable {
                index,
                value: word.value(),
                kind,
            })?;

        let literal;
        let palette: &[u8] = if kind.uses_dictionary() {
            let offset = word.parameter() as usize;
            let end = offset + colors;
            self.dictionary
                .get(offset..end)
                .ok_or(CodecError::DictionaryOutOfRange {
                    offset,
                    end,
                    len: self.dictionary.len(),
                })?
        } else {
            literal = word.literal_colors();
            &literal
        };

        let mask = if mask_bytes == 0 {
            CHECKERBOARD_MASK
        } else {
            masks.read(mask_bytes)
        };

        colorer.paint(tile_col, tile_row, palette, mask, index_bits);
        Ok(())
    }
}
