//! Scene encoder: turns raw 8-bit frames into a table, a dictionary and
//! per-frame stream pairs.
//!
//! Each frame is diffed against the previous one (all zero before the first
//! frame). Unchanged tiles become skip runs, changed tiles get the smallest
//! palette that covers them. Zero is the transparent color, so a pixel can
//! never be repainted to zero once it holds another value.

use log::debug;

use crate::colorer::{CHECKERBOARD_MASK, TILE_PIXELS, TILE_SIZE, check_dimensions};
use crate::control_word::{MAX_PARAMETER, TileType};
use crate::decoder::{FrameDecoder, SKIP_REST_OF_ROW};
use crate::dictionary::DictionaryWriter;
use crate::error::{CodecError, Result};
use crate::sequencer::{ControlWordSequencer, EncodedFrame, TileOp};
use crate::table::ControlWordTable;

/// Longest skip run a single non-terminal skip op covers.
const MAX_SKIP_RUN: usize = SKIP_REST_OF_ROW as usize;
const CHECKERBOARD_INVERTED: u64 = !CHECKERBOARD_MASK & 0xFFFF;

/// Encoder switches; both are on by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderOptions {
    /// Emit `RepeatPrevious` when a tile reuses the previous painted word.
    pub repeat_previous: bool,
    /// Emit mask-free `Color2Static` for checkerboard and solid tiles.
    pub static_checkerboard: bool,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            repeat_previous: true,
            static_checkerboard: true,
        }
    }
}

/// Everything a decoder needs to replay a scene.
#[derive(Debug, Clone)]
pub struct EncodedScene {
    pub width: usize,
    pub height: usize,
    pub table: ControlWordTable,
    pub dictionary: Vec<u8>,
    pub frames: Vec<EncodedFrame>,
}

impl EncodedScene {
    /// The table in its packed on-disk form.
    pub fn packed_table(&self) -> Vec<u8> {
        self.table.pack()
    }

    pub fn decoder(&self) -> Result<FrameDecoder> {
        FrameDecoder::builder()
            .table(self.table.clone())
            .dictionary(self.dictionary.clone())
            .dimensions(self.width, self.height)
            .build()
    }
}

#[derive(Debug)]
pub struct SceneEncoder {
    width: usize,
    height: usize,
    options: EncoderOptions,
    previous: Vec<u8>,
    dictionary: DictionaryWriter,
    sequencer: ControlWordSequencer,
    frames: Vec<Vec<TileOp>>,
}

impl SceneEncoder {
    pub fn new(width: usize, height: usize) -> Result<Self> {
        Self::with_options(width, height, EncoderOptions::default())
    }

    pub fn with_options(width: usize, height: usize, options: EncoderOptions) -> Result<Self> {
        check_dimensions(width, height)?;
        Ok(Self {
            width,
            height,
            options,
            previous: vec![0u8; width * height],
            dictionary: DictionaryWriter::new(),
            sequencer: ControlWordSequencer::new(),
            frames: Vec::new(),
        })
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn dictionary(&self) -> &[u8] {
        self.dictionary.as_bytes()
    }

    /// Diff `pixels` against the previous frame and queue its operations.
    ///
    /// A rejected frame leaves the encoder exactly as it was, dictionary
    /// included.
    pub fn push_frame(&mut self, pixels: &[u8]) -> Result<&[TileOp]> {
        let checkpoint = self.dictionary.len();
        let ops = match self
            .frame_ops(pixels)
            .and_then(|ops| self.sequencer.register(&ops).map(|()| ops))
        {
            Ok(ops) => ops,
            Err(err) => {
                self.dictionary.truncate(checkpoint);
                return Err(err);
            }
        };

        self.previous.copy_from_slice(pixels);
        debug!(
            "frame {}: {} ops, dictionary {} bytes",
            self.frames.len(),
            ops.len(),
            self.dictionary.len()
        );
        self.frames.push(ops);
        Ok(self.frames.last().map(Vec::as_slice).unwrap_or_default())
    }

    fn frame_ops(&mut self, pixels: &[u8]) -> Result<Vec<TileOp>> {
        if pixels.len() != self.width * self.height {
            return Err(CodecError::DimensionMismatch {
                width: self.width,
                height: self.height,
                actual_width: self.width,
                actual_height: pixels.len() / self.width,
            });
        }

        let tiles_wide = self.width / TILE_SIZE;
        let tiles_high = self.height / TILE_SIZE;
        let mut ops = Vec::new();
        let mut last_paint: Option<(TileType, u32)> = None;

        for tile_row in 0..tiles_high {
            let mut pending_skip = 0usize;
            for tile_col in 0..tiles_wide {
                let current = self.tile(pixels, tile_col, tile_row);
                let previous = self.tile(&self.previous, tile_col, tile_row);
                if current == previous {
                    pending_skip += 1;
                    continue;
                }
                let cleared = (0..TILE_PIXELS).find(|&i| current[i] == 0 && previous[i] != 0);
                if let Some(pixel) = cleared {
                    return Err(CodecError::Unsupported(format!(
                        "frame {} repaints pixel ({}, {}) to transparent color 0",
                        self.frames.len(),
                        tile_col * TILE_SIZE + pixel % TILE_SIZE,
                        tile_row * TILE_SIZE + pixel / TILE_SIZE
                    )));
                }

                flush_skips(&mut ops, &mut pending_skip);
                let (kind, parameter, mask) = self.plan_tile(&current)?;
                if self.options.repeat_previous && last_paint == Some((kind, parameter)) {
                    ops.push(TileOp::Repeat { mask });
                } else {
                    ops.push(TileOp::Paint {
                        kind,
                        parameter,
                        mask,
                    });
                }
                last_paint = Some((kind, parameter));
            }
            if pending_skip > 0 {
                ops.push(TileOp::Skip {
                    count: SKIP_REST_OF_ROW as u8,
                });
            }
        }

        // Nothing changes after the last paint; the stream can simply end.
        while matches!(ops.last(), Some(TileOp::Skip { .. })) {
            ops.pop();
        }
        Ok(ops)
    }

    /// Sequence every queued frame and emit the scene.
    pub fn finish(self) -> Result<EncodedScene> {
        let sequenced = self.sequencer.sequence()?;
        let frames = self
            .frames
            .iter()
            .map(|ops| sequenced.bitstream_for(ops))
            .collect::<Result<Vec<_>>>()?;

        Ok(EncodedScene {
            width: self.width,
            height: self.height,
            table: sequenced.into_table(),
            dictionary: self.dictionary.into_inner(),
            frames,
        })
    }

    fn tile(&self, pixels: &[u8], tile_col: usize, tile_row: usize) -> [u8; TILE_PIXELS] {
        let mut tile = [0u8; TILE_PIXELS];
        let origin = tile_row * TILE_SIZE * self.width + tile_col * TILE_SIZE;
        for (y, row) in tile.chunks_exact_mut(TILE_SIZE).enumerate() {
            let start = origin + y * self.width;
            row.copy_from_slice(&pixels[start..start + TILE_SIZE]);
        }
        tile
    }

    /// Pick the cheapest painting type for a changed tile.
    fn plan_tile(&mut self, tile: &[u8; TILE_PIXELS]) -> Result<(TileType, u32, u64)> {
        let mut colors: Vec<u8> = tile.to_vec();
        colors.sort_unstable();
        colors.dedup();

        if colors.len() <= 2 {
            let low = colors[0];
            let high = colors[colors.len() - 1];
            let mask = slot_mask(tile, &[low, high], 1);
            if self.options.static_checkerboard {
                if low == high || mask == CHECKERBOARD_MASK {
                    return Ok((TileType::Color2Static, pair(low, high), CHECKERBOARD_MASK));
                }
                if mask == CHECKERBOARD_INVERTED {
                    return Ok((TileType::Color2Static, pair(high, low), CHECKERBOARD_MASK));
                }
            }
            return Ok((TileType::Color2Masked, pair(low, high), mask));
        }

        let (kind, size, index_bits) = match colors.len() {
            3..=4 => (TileType::Color4Masked, 4, 2),
            5..=8 => (TileType::Color8Masked, 8, 3),
            _ => (TileType::Color16Masked, 16, 4),
        };
        let mask = slot_mask(tile, &colors, index_bits);
        // Unused slots repeat the last color; they are never selected.
        let last = colors[colors.len() - 1];
        colors.resize(size, last);

        let offset = self.dictionary.write(&colors);
        if offset > MAX_PARAMETER as usize {
            return Err(CodecError::Unsupported(format!(
                "dictionary offset {offset} exceeds the 17-bit control word field"
            )));
        }
        Ok((kind, offset as u32, mask))
    }
}

fn pair(first: u8, second: u8) -> u32 {
    first as u32 | (second as u32) << 8
}

/// Pack each pixel's palette slot, first pixel in the lowest bits.
fn slot_mask(tile: &[u8; TILE_PIXELS], palette: &[u8], index_bits: u32) -> u64 {
    tile.iter().enumerate().fold(0u64, |mask, (pixel, value)| {
        let slot = palette.iter().position(|c| c == value).unwrap_or(0) as u64;
        mask | slot << (pixel as u32 * index_bits)
    })
}

/// Emit skip ops covering `pending` unchanged tiles before a painted tile.
fn flush_skips(ops: &mut Vec<TileOp>, pending: &mut usize) {
    while *pending > 0 {
        let run = (*pending).min(MAX_SKIP_RUN);
        ops.push(TileOp::Skip {
            count: (run - 1) as u8,
        });
        *pending -= run;
    }
}
