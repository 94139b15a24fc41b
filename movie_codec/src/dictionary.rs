//! Deduplicating writer for the shared color dictionary.
//!
//! Masked control words reference palettes by byte offset, so any palette
//! already present in the buffer, or overlapping its tail, is reused.

/// Append-only byte arena that reuses existing and overlapping runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DictionaryWriter {
    buffer: Vec<u8>,
}

impl DictionaryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `data` and return the offset it can be read back from.
    pub fn write(&mut self, data: &[u8]) -> usize {
        if let Some(offset) = find(&self.buffer, data) {
            return offset;
        }

        let max_overlap = data.len().saturating_sub(1).min(self.buffer.len());
        for overlap in (1..=max_overlap).rev() {
            let start = self.buffer.len() - overlap;
            if self.buffer[start..] == data[..overlap] {
                self.buffer.extend_from_slice(&data[overlap..]);
                return start;
            }
        }

        let start = self.buffer.len();
        self.buffer.extend_from_slice(data);
        start
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drop everything written after the first `len` bytes.
    pub fn truncate(&mut self, len: usize) {
        self.buffer.truncate(len);
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }
}

impl From<Vec<u8>> for DictionaryWriter {
    fn from(buffer: Vec<u8>) -> Self {
        Self { buffer }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
