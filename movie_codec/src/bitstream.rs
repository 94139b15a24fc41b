//! Bit and byte cursors over the per-frame streams.
//!
//! The bitstream is read most-significant-bit first and is padded with
//! virtual zeros past its end, so a peek is always satisfiable. The
//! maskstream is a flat byte buffer read in little-endian chunks.

/// Largest run a single peek or write may cover.
pub const MAX_BITS: u32 = 32;

/// Largest chunk the mask reader accumulates into a `u64`.
pub const MAX_MASK_BYTES: usize = 8;

/// Big-endian bit reader with separate peek and advance.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Return the next `bits` bits right-aligned without moving the cursor.
    ///
    /// Bits beyond the end of the buffer read as zero.
    ///
    /// # Panics
    ///
    /// Panics if `bits` exceeds [`MAX_BITS`].
    pub fn peek(&self, bits: u32) -> u32 {
        assert!(
            bits <= MAX_BITS,
            "bit reader peek of {bits} bits exceeds {MAX_BITS}"
        );
        if bits == 0 {
            return 0;
        }

        let byte = self.position / 8;
        let shift = (self.position % 8) as u32;
        // Five bytes always cover a 32-bit read at any sub-byte offset.
        let mut window = 0u64;
        for i in 0..5 {
            let value = self
                .data
                .get(byte.saturating_add(i))
                .copied()
                .unwrap_or(0);
            window = (window << 8) | value as u64;
        }
        let value = window >> (40 - shift - bits);
        (value & ((1u64 << bits) - 1)) as u32
    }

    /// Move the cursor forward, possibly past the end of the buffer.
    pub fn advance(&mut self, bits: usize) {
        self.position = self.position.saturating_add(bits);
    }

    /// True once every real bit of the buffer has been consumed.
    pub fn exhausted(&self) -> bool {
        self.position >= self.data.len() * 8
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }
}

/// Little-endian reader for the byte-aligned mask integers.
#[derive(Debug, Clone)]
pub struct MaskReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> MaskReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Accumulate `byte_count` bytes, least significant first.
    ///
    /// Bytes past the end of the buffer read as zero.
    ///
    /// # Panics
    ///
    /// Panics if `byte_count` exceeds [`MAX_MASK_BYTES`].
    pub fn read(&mut self, byte_count: usize) -> u64 {
        assert!(
            byte_count <= MAX_MASK_BYTES,
            "mask reader cannot read {byte_count} bytes into a u64"
        );
        let mut value = 0u64;
        for i in 0..byte_count {
            let byte = self
                .data
                .get(self.position.saturating_add(i))
                .copied()
                .unwrap_or(0);
            value |= (byte as u64) << (8 * i);
        }
        self.position = self.position.saturating_add(byte_count);
        value
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }
}

/// MSB-first bit writer producing streams for [`BitReader`].
#[derive(Debug, Default)]
pub struct BitWriter {
    output: Vec<u8>,
    pending: u64,
    pending_bits: u32,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the low `bits` bits of `value`, most significant first.
    ///
    /// # Panics
    ///
    /// Panics if `bits` exceeds [`MAX_BITS`].
    pub fn write_bits(&mut self, value: u32, bits: u32) {
        assert!(
            bits <= MAX_BITS,
            "bit writer cannot write {bits} bits at once"
        );
        if bits == 0 {
            return;
        }
        let masked = value as u64 & ((1u64 << bits) - 1);
        self.pending = (self.pending << bits) | masked;
        self.pending_bits += bits;

        while self.pending_bits >= 8 {
            self.pending_bits -= 8;
            self.output.push((self.pending >> self.pending_bits) as u8);
        }
        self.pending &= (1u64 << self.pending_bits) - 1;
    }

    /// Number of bits written so far.
    pub fn bit_len(&self) -> usize {
        self.output.len() * 8 + self.pending_bits as usize
    }

    /// Flush the final partial byte, padded with zero bits.
    pub fn finish(mut self) -> Vec<u8> {
        if self.pending_bits > 0 {
            let byte = (self.pending << (8 - self.pending_bits)) as u8;
            self.output.push(byte);
        }
        self.output
    }
}
