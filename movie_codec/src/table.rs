//! Packed control word table.
//!
//! On disk the table is a little-endian `u32` holding the byte length of the
//! unpacked table (3 bytes per word) followed by 4-byte run-length records:
//! the low 3 bytes carry the word, the high byte how many times it repeats.

use byteorder::{ByteOrder, LittleEndian};
use log::warn;

use crate::control_word::{ControlWord, PackedControlWord};
use crate::error::{CodecError, Result};

const HEADER_LEN: usize = 4;
const RECORD_LEN: usize = 4;
const WORD_BYTES: usize = 3;
const MAX_RUN: usize = u8::MAX as usize;

/// Flat lookup array of control words shared by every frame of a scene.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlWordTable {
    words: Vec<ControlWord>,
}

impl ControlWordTable {
    pub fn new(words: Vec<ControlWord>) -> Self {
        Self { words }
    }

    /// Expand a packed table.
    pub fn unpack(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(CodecError::TableTooShort(bytes.len()));
        }
        let header = LittleEndian::read_u32(&bytes[..HEADER_LEN]);
        if header as usize % WORD_BYTES != 0 {
            return Err(CodecError::TableLengthNotMultipleOfThree(header));
        }
        let expected = header as usize / WORD_BYTES;

        // The header is untrusted; reserve only what the records can yield.
        let producible = (bytes.len() - HEADER_LEN) / RECORD_LEN * MAX_RUN;
        let mut words = Vec::with_capacity(expected.min(producible));
        let mut records = bytes[HEADER_LEN..].chunks(RECORD_LEN).enumerate();
        while words.len() < expected {
            let Some((record, chunk)) = records.next() else {
                break;
            };
            if chunk.len() < RECORD_LEN {
                break;
            }
            let packed = PackedControlWord(LittleEndian::read_u32(chunk));
            let times = packed.times() as usize;
            let remaining = expected - words.len();
            if times == 0 {
                return Err(CodecError::ZeroRepeat { record });
            }
            if times > remaining {
                return Err(CodecError::RepeatOverrun {
                    record,
                    times,
                    remaining,
                });
            }
            words.extend(std::iter::repeat(packed.value()).take(times));
        }

        if words.len() < expected {
            return Err(CodecError::TableTruncated {
                expected,
                produced: words.len(),
            });
        }

        let leftover = records.map(|(_, chunk)| chunk.len()).sum::<usize>();
        if leftover > 0 {
            warn!("ignoring {leftover} bytes after packed control word table");
        }

        Ok(Self { words })
    }

    /// Run-length encode the table into its on-disk form.
    pub fn pack(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.words.len() * RECORD_LEN);
        let header = (self.words.len() * WORD_BYTES) as u32;
        out.extend_from_slice(&header.to_le_bytes());

        let mut index = 0;
        while index < self.words.len() {
            let word = self.words[index];
            let run = self.words[index..]
                .iter()
                .take(MAX_RUN)
                .take_while(|&&other| other.value() == word.value())
                .count();
            let packed = PackedControlWord::new(word, run as u8);
            out.extend_from_slice(&packed.0.to_le_bytes());
            index += run;
        }
        out
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Look up a word, reporting indices past the end as a corrupt table.
    pub fn get(&self, index: usize) -> Result<ControlWord> {
        self.words
            .get(index)
            .copied()
            .ok_or(CodecError::TableIndexOutOfRange {
                index,
                len: self.words.len(),
            })
    }

    pub fn words(&self) -> &[ControlWord] {
        &self.words
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(table: &ControlWordTable) -> Vec<u32> {
        table.words().iter().map(|word| word.value()).collect()
    }

    #[test]
    fn unpacks_empty_table() {
        let table = ControlWordTable::unpack(&[0, 0, 0, 0]).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn unpacks_single_record() {
        let table = ControlWordTable::unpack(&[0x03, 0, 0, 0, 0xCC, 0xBB, 0xAA, 0x01]).unwrap();
        assert_eq!(values(&table), vec![0xAABBCC]);
    }

    #[test]
    fn unpacks_repeated_records_in_order() {
        let bytes = [
            0x09, 0, 0, 0, 0xCC, 0xBB, 0xAA, 0x02, 0x33, 0x22, 0x11, 0x01,
        ];
        let table = ControlWordTable::unpack(&bytes).unwrap();
        assert_eq!(values(&table), vec![0xAABBCC, 0xAABBCC, 0x112233]);
    }

    #[test]
    fn rejects_malformed_headers() {
        assert_eq!(
            ControlWordTable::unpack(&[0x03, 0, 0]),
            Err(CodecError::TableTooShort(3))
        );
        assert_eq!(
            ControlWordTable::unpack(&[0x04, 0, 0, 0, 0xCC, 0xBB, 0xAA, 0x01]),
            Err(CodecError::TableLengthNotMultipleOfThree(4))
        );
    }

    #[test]
    fn rejects_overshooting_run() {
        let bytes = [0x06, 0, 0, 0, 0xCC, 0xBB, 0xAA, 0x03];
        assert_eq!(
            ControlWordTable::unpack(&bytes),
            Err(CodecError::RepeatOverrun {
                record: 0,
                times: 3,
                remaining: 2,
            })
        );
    }

    #[test]
    fn rejects_missing_and_zero_records() {
        let short = [0x09, 0, 0, 0, 0xCC, 0xBB, 0xAA, 0x02, 0x33, 0x22];
        assert_eq!(
            ControlWordTable::unpack(&short),
            Err(CodecError::TableTruncated {
                expected: 3,
                produced: 2,
            })
        );
        let zero = [0x03, 0, 0, 0, 0xCC, 0xBB, 0xAA, 0x00];
        assert_eq!(
            ControlWordTable::unpack(&zero),
            Err(CodecError::ZeroRepeat { record: 0 })
        );
    }

    #[test]
    fn huge_header_without_records_is_truncated() {
        let bytes = [0xFF, 0xFF, 0xFF, 0xFF, 0xCC, 0xBB, 0xAA, 0x01];
        assert_eq!(
            ControlWordTable::unpack(&bytes),
            Err(CodecError::TableTruncated {
                expected: 0x5555_5555,
                produced: 1,
            })
        );
    }

    #[test]
    fn ignores_trailing_records() {
        let bytes = [0x03, 0, 0, 0, 0xCC, 0xBB, 0xAA, 0x01, 0x33, 0x22, 0x11, 0x01];
        let table = ControlWordTable::unpack(&bytes).unwrap();
        assert_eq!(values(&table), vec![0xAABBCC]);
    }

    #[test]
    fn pack_merges_runs_and_caps_them() {
        let mut words = vec![ControlWord(0x112233); 300];
        words.push(ControlWord(0x445566));
        words.push(ControlWord(0x112233));
        let table = ControlWordTable::new(words);
        let packed = table.pack();

        assert_eq!(&packed[..4], &(302u32 * 3).to_le_bytes());
        assert_eq!(&packed[4..8], &[0x33, 0x22, 0x11, 0xFF]);
        assert_eq!(&packed[8..12], &[0x33, 0x22, 0x11, 45]);
        assert_eq!(&packed[12..16], &[0x66, 0x55, 0x44, 0x01]);
        assert_eq!(&packed[16..20], &[0x33, 0x22, 0x11, 0x01]);
        assert_eq!(ControlWordTable::unpack(&packed).unwrap(), table);
    }

    #[test]
    fn get_reports_out_of_range() {
        let table = ControlWordTable::new(vec![ControlWord(1)]);
        assert_eq!(table.get(0), Ok(ControlWord(1)));
        assert_eq!(
            table.get(5),
            Err(CodecError::TableIndexOutOfRange { index: 5, len: 1 })
        );
    }
}
