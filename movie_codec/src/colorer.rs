//! Tile painting into 8-bit indexed surfaces.

use crate::error::{CodecError, Result};

/// Edge length of a tile in pixels.
pub const TILE_SIZE: usize = 4;

/// Pixels per tile.
pub const TILE_PIXELS: usize = TILE_SIZE * TILE_SIZE;

/// Alternating slot pattern used by `Color2Static` tiles: even rows start
/// with slot 0, odd rows with slot 1.
pub const CHECKERBOARD_MASK: u64 = 0x5A5A;

/// Paints a single tile from a small palette and a packed slot mask.
///
/// Pixel `i` of the tile sits at column `i % 4`, row `i / 4` and takes its
/// palette slot from bits `i * index_bits ..` of `mask`. A palette entry of
/// zero is transparent and leaves the destination pixel untouched.
pub trait TileColorer {
    fn paint(
        &mut self,
        tile_col: usize,
        tile_row: usize,
        colors: &[u8],
        mask: u64,
        index_bits: u32,
    );
}

/// Palette slot for pixel `pixel` of a tile.
#[inline]
pub fn mask_slot(mask: u64, pixel: usize, index_bits: u32) -> usize {
    let shift = pixel as u32 * index_bits;
    ((mask >> shift) & ((1u64 << index_bits) - 1)) as usize
}

/// Colorer over a caller-owned pixel slice with a fixed stride.
#[derive(Debug)]
pub struct BufferColorer<'a> {
    pixels: &'a mut [u8],
    stride: usize,
}

impl<'a> BufferColorer<'a> {
    pub fn new(pixels: &'a mut [u8], stride: usize) -> Self {
        Self { pixels, stride }
    }
}

impl TileColorer for BufferColorer<'_> {
    /// # Panics
    ///
    /// Panics if the tile lies outside the pixel slice.
    fn paint(
        &mut self,
        tile_col: usize,
        tile_row: usize,
        colors: &[u8],
        mask: u64,
        index_bits: u32,
    ) {
        debug_assert_eq!(colors.len(), 1 << index_bits);
        let origin = tile_row * TILE_SIZE * self.stride + tile_col * TILE_SIZE;
        for pixel in 0..TILE_PIXELS {
            let value = colors[mask_slot(mask, pixel, index_bits)];
            if value == 0 {
                continue;
            }
            let offset = origin + (pixel / TILE_SIZE) * self.stride + pixel % TILE_SIZE;
            self.pixels[offset] = value;
        }
    }
}

/// Owned 8-bit indexed frame, reused across frames to keep delta content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    width: usize,
    height: usize,
    stride: usize,
    pixels: Vec<u8>,
}

impl FrameBuffer {
    pub fn new(width: usize, height: usize) -> Result<Self> {
        Self::with_stride(width, height, width)
    }

    /// Frame whose rows are `stride` bytes apart (`stride >= width`).
    pub fn with_stride(width: usize, height: usize, stride: usize) -> Result<Self> {
        check_dimensions(width, height)?;
        if stride < width {
            return Err(CodecError::InvalidDimensions { width: stride, height });
        }
        Ok(Self {
            width,
            height,
            stride,
            pixels: vec![0u8; stride * height],
        })
    }

    /// Wrap existing pixels, e.g. a raw frame loaded from disk.
    pub fn from_pixels(width: usize, height: usize, pixels: Vec<u8>) -> Result<Self> {
        check_dimensions(width, height)?;
        if pixels.len() != width * height {
            return Err(CodecError::DimensionMismatch {
                width,
                height,
                actual_width: width,
                actual_height: pixels.len() / width,
            });
        }
        Ok(Self {
            width,
            height,
            stride: width,
            pixels,
        })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn row(&self, y: usize) -> &[u8] {
        let start = y * self.stride;
        &self.pixels[start..start + self.width]
    }

    /// Copy the visible pixels into a tightly packed `width * height` buffer.
    pub fn to_packed(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.width * self.height);
        for y in 0..self.height {
            out.extend_from_slice(self.row(y));
        }
        out
    }

    pub fn fill(&mut self, value: u8) {
        self.pixels.fill(value);
    }

    pub fn colorer(&mut self) -> BufferColorer<'_> {
        BufferColorer::new(&mut self.pixels, self.stride)
    }
}

pub(crate) fn check_dimensions(width: usize, height: usize) -> Result<()> {
    if width == 0 || height == 0 || width % TILE_SIZE != 0 || height % TILE_SIZE != 0 {
        return Err(CodecError::InvalidDimensions { width, height });
    }
    Ok(())
}
