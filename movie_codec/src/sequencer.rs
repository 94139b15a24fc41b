//! Control word sequencing: turns tile operations into a prefix-coded table.
//!
//! Every tile operation is a symbol of a canonical prefix code whose
//! codewords index the 12-bit primary table. Short codes are replicated over
//! every primary index sharing their prefix. When a scene has more distinct
//! operations than the primary table can hold, the least common ones are
//! reached through the 8-bit prefix `0xFF` and a trie of 16-entry extension
//! tables linked by long-offset words.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use log::debug;

use crate::bitstream::{BitWriter, MAX_BITS};
use crate::control_word::{ControlWord, MAX_LONG_OFFSET, MAX_PARAMETER, TileType};
use crate::decoder::{EXTENSION_BITS, PRIMARY_INDEX_BITS, SKIP_COUNT_BITS, SKIP_REST_OF_ROW};
use crate::error::{CodecError, Result};
use crate::table::ControlWordTable;

const PRIMARY_SLOTS: usize = 1 << PRIMARY_INDEX_BITS;
const EXTENSION_SLOTS: usize = 1 << EXTENSION_BITS;
const ESCAPE_PREFIX: u32 = 0xFF;
/// Primary indices left for direct codes once the escape prefix is reserved.
const DIRECT_SLOTS: usize = PRIMARY_SLOTS - EXTENSION_SLOTS;

const SKIP_KEY: OperationKey = OperationKey {
    kind: TileType::Skip,
    parameter: 0,
};
const REPEAT_KEY: OperationKey = OperationKey {
    kind: TileType::RepeatPrevious,
    parameter: 0,
};

/// One tile's worth of instructions for the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileOp {
    /// Leave `count + 1` tiles alone; a count of 31 skips the rest of the row.
    Skip { count: u8 },
    /// Paint with the previous painted word and a fresh mask.
    Repeat { mask: u64 },
    Paint {
        kind: TileType,
        parameter: u32,
        mask: u64,
    },
}

impl TileOp {
    pub fn key(&self) -> OperationKey {
        match *self {
            TileOp::Skip { .. } => SKIP_KEY,
            TileOp::Repeat { .. } => REPEAT_KEY,
            TileOp::Paint {
                kind, parameter, ..
            } => OperationKey { kind, parameter },
        }
    }
}

/// The table-visible part of an operation: type plus parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationKey {
    pub kind: TileType,
    pub parameter: u32,
}

/// Per-frame streams produced for a list of operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedFrame {
    pub bitstream: Vec<u8>,
    pub maskstream: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Code {
    bits: u32,
    len: u32,
}

/// Accumulates operation frequencies across every frame of a scene.
#[derive(Debug, Clone, Default)]
pub struct ControlWordSequencer {
    frequencies: HashMap<OperationKey, u64>,
}

impl ControlWordSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count the operations of one frame; nothing is counted if any is invalid.
    pub fn register(&mut self, ops: &[TileOp]) -> Result<()> {
        ops.iter().try_for_each(validate)?;
        for op in ops {
            *self.frequencies.entry(op.key()).or_default() += 1;
        }
        Ok(())
    }

    pub fn distinct_operations(&self) -> usize {
        self.frequencies.len()
    }

    /// Assign codes and lay out the control word table.
    pub fn sequence(self) -> Result<SequencedTable> {
        let mut symbols: Vec<(OperationKey, u64)> = self.frequencies.into_iter().collect();
        if !symbols.iter().any(|(key, _)| *key == SKIP_KEY) {
            symbols.push((SKIP_KEY, 1));
        }
        // Skip first so it always receives the all-zero code, then by
        // descending frequency.
        symbols.sort_by(|a, b| {
            (a.0 != SKIP_KEY)
                .cmp(&(b.0 != SKIP_KEY))
                .then(b.1.cmp(&a.1))
                .then(a.0.cmp(&b.0))
        });

        let sequenced = if symbols.len() <= PRIMARY_SLOTS {
            primary_only(&symbols)
        } else {
            with_extension(&symbols)?
        };
        debug!(
            "sequenced {} operations into {} control words",
            symbols.len(),
            sequenced.table.len()
        );
        Ok(sequenced)
    }
}

/// A laid-out table together with the code of every operation in it.
#[derive(Debug, Clone)]
pub struct SequencedTable {
    table: ControlWordTable,
    codes: HashMap<OperationKey, Code>,
}

impl SequencedTable {
    pub fn table(&self) -> &ControlWordTable {
        &self.table
    }

    pub fn into_table(self) -> ControlWordTable {
        self.table
    }

    /// Number of bits the operation's code occupies in a bitstream.
    pub fn code_len(&self, key: OperationKey) -> Option<u32> {
        self.codes.get(&key).map(|code| code.len)
    }

    /// Emit the streams that replay `ops` through the frame decoder.
    pub fn bitstream_for(&self, ops: &[TileOp]) -> Result<EncodedFrame> {
        let mut bits = BitWriter::new();
        let mut maskstream = Vec::new();
        let mut last_paint: Option<TileType> = None;

        for op in ops {
            let key = op.key();
            let code = self
                .codes
                .get(&key)
                .ok_or(CodecError::UnregisteredOperation {
                    kind: key.kind,
                    parameter: key.parameter,
                })?;
            bits.write_bits(code.bits, code.len);

            let (kind, mask) = match *op {
                TileOp::Skip { count } => {
                    bits.write_bits(count as u32, SKIP_COUNT_BITS);
                    continue;
                }
                TileOp::Repeat { mask } => {
                    let kind = last_paint.ok_or_else(|| {
                        CodecError::Unsupported("repeat before any painted tile".to_string())
                    })?;
                    (kind, mask)
                }
                TileOp::Paint { kind, mask, .. } => (kind, mask),
            };

            if let Some((_, mask_bytes, _)) = kind.paint_shape() {
                maskstream.extend_from_slice(&mask.to_le_bytes()[..mask_bytes]);
            }
            last_paint = Some(kind);
        }

        Ok(EncodedFrame {
            bitstream: bits.finish(),
            maskstream,
        })
    }
}

fn validate(op: &TileOp) -> Result<()> {
    match *op {
        TileOp::Skip { count } if count as u32 > SKIP_REST_OF_ROW => Err(CodecError::Unsupported(
            format!("skip count {count} does not fit in {SKIP_COUNT_BITS} bits"),
        )),
        TileOp::Paint { kind, .. } if kind.paint_shape().is_none() => Err(
            CodecError::Unsupported(format!("{kind:?} is not a painting operation")),
        ),
        TileOp::Paint { parameter, .. } if parameter > MAX_PARAMETER => {
            Err(CodecError::Unsupported(format!(
                "parameter {parameter:#x} exceeds the 17-bit control word field"
            )))
        }
        _ => Ok(()),
    }
}

/// Word stored in slots no valid code reaches.
fn unreachable_word(count: u32) -> ControlWord {
    ControlWord::terminal(TileType::Unknown, 0, count)
}

fn primary_only(symbols: &[(OperationKey, u64)]) -> SequencedTable {
    let frequencies: Vec<u64> = symbols.iter().map(|&(_, freq)| freq).collect();
    let mut lengths = limited_code_lengths(&frequencies, PRIMARY_INDEX_BITS);

    // Skip must own the shortest length so its canonical code is all zeros.
    if let Some(shortest) = (0..lengths.len()).min_by_key(|&i| (lengths[i], i)) {
        lengths.swap(0, shortest);
    }

    let mut order: Vec<usize> = (0..symbols.len()).collect();
    order.sort_by_key(|&i| (lengths[i], i));

    let mut words = vec![unreachable_word(PRIMARY_INDEX_BITS); PRIMARY_SLOTS];
    let mut codes = HashMap::with_capacity(symbols.len());
    let mut code = 0u32;
    let mut prev_len = 0u32;
    for (position, &i) in order.iter().enumerate() {
        let len = lengths[i];
        if position > 0 {
            code = (code + 1) << (len - prev_len);
        }
        prev_len = len;

        let key = symbols[i].0;
        let span = 1usize << (PRIMARY_INDEX_BITS - len);
        let start = (code as usize) << (PRIMARY_INDEX_BITS - len);
        words[start..start + span].fill(ControlWord::terminal(key.kind, key.parameter, len));
        codes.insert(key, Code { bits: code, len });
    }

    SequencedTable {
        table: ControlWordTable::new(words),
        codes,
    }
}

fn with_extension(symbols: &[(OperationKey, u64)]) -> Result<SequencedTable> {
    let (direct, rest) = symbols.split_at(DIRECT_SLOTS);
    let mut words = Vec::with_capacity(PRIMARY_SLOTS + rest.len() * 2);
    let mut codes = HashMap::with_capacity(symbols.len());

    for (index, &(key, _)) in direct.iter().enumerate() {
        words.push(ControlWord::terminal(
            key.kind,
            key.parameter,
            PRIMARY_INDEX_BITS,
        ));
        codes.insert(
            key,
            Code {
                bits: index as u32,
                len: PRIMARY_INDEX_BITS,
            },
        );
    }
    words.extend([ControlWord::long_offset_to(PRIMARY_SLOTS as u32); EXTENSION_SLOTS]);

    let mut depth = 1u32;
    while EXTENSION_SLOTS.pow(depth) < rest.len() {
        depth += 1;
    }
    let keys: Vec<OperationKey> = rest.iter().map(|&(key, _)| key).collect();
    // Escape prefix, then the four bits the decoder steps over.
    let escape = ESCAPE_PREFIX << EXTENSION_BITS;
    let escape_len = PRIMARY_INDEX_BITS;
    build_extension(&mut words, &mut codes, &keys, depth, escape, escape_len)?;

    Ok(SequencedTable {
        table: ControlWordTable::new(words),
        codes,
    })
}

/// Append one 16-entry extension table and return its offset.
fn build_extension(
    words: &mut Vec<ControlWord>,
    codes: &mut HashMap<OperationKey, Code>,
    keys: &[OperationKey],
    depth: u32,
    path: u32,
    path_len: u32,
) -> Result<u32> {
    let offset = words.len();
    if offset + EXTENSION_SLOTS - 1 > MAX_LONG_OFFSET as usize
        || path_len + EXTENSION_BITS * depth > MAX_BITS
    {
        return Err(CodecError::Unsupported(format!(
            "control word table outgrows the {}-bit long offset",
            MAX_LONG_OFFSET.count_ones()
        )));
    }
    words.extend([unreachable_word(EXTENSION_BITS); EXTENSION_SLOTS]);

    let span = EXTENSION_SLOTS.pow(depth - 1);
    for (nibble, chunk) in keys.chunks(span).enumerate() {
        let child_path = (path << EXTENSION_BITS) | nibble as u32;
        let child_len = path_len + EXTENSION_BITS;
        if depth == 1 {
            let key = chunk[0];
            words[offset + nibble] = ControlWord::terminal(key.kind, key.parameter, EXTENSION_BITS);
            codes.insert(
                key,
                Code {
                    bits: child_path,
                    len: child_len,
                },
            );
        } else {
            let child = build_extension(words, codes, chunk, depth - 1, child_path, child_len)?;
            words[offset + nibble] = ControlWord::long_offset_to(child);
        }
    }
    Ok(offset as u32)
}

/// Huffman code lengths no longer than `max_bits`.
///
/// Frequencies are halved until the tree fits; with every weight at one the
/// tree is balanced, so this terminates for up to `2^max_bits` symbols.
fn limited_code_lengths(frequencies: &[u64], max_bits: u32) -> Vec<u32> {
    let mut shift = 0u32;
    loop {
        let adjusted: Vec<u64> = frequencies
            .iter()
            .map(|&freq| freq.checked_shr(shift).unwrap_or(0).max(1))
            .collect();
        let lengths = huffman_code_lengths(&adjusted);
        if lengths.iter().all(|&len| len <= max_bits) {
            return lengths;
        }
        shift += 1;
    }
}

fn huffman_code_lengths(frequencies: &[u64]) -> Vec<u32> {
    let count = frequencies.len();
    if count <= 1 {
        return vec![1; count];
    }

    // Nodes 0..count are leaves; internal nodes follow.
    let mut parent = vec![usize::MAX; count];
    let mut heap: BinaryHeap<(Reverse<u64>, Reverse<usize>)> = frequencies
        .iter()
        .enumerate()
        .map(|(node, &freq)| (Reverse(freq), Reverse(node)))
        .collect();

    while heap.len() > 1 {
        let (Some((Reverse(freq_a), Reverse(a))), Some((Reverse(freq_b), Reverse(b)))) =
            (heap.pop(), heap.pop())
        else {
            break;
        };
        let node = parent.len();
        parent.push(usize::MAX);
        parent[a] = node;
        parent[b] = node;
        heap.push((Reverse(freq_a.saturating_add(freq_b)), Reverse(node)));
    }

    (0..count)
        .map(|leaf| {
            let mut depth = 0;
            let mut node = leaf;
            while parent[node] != usize::MAX {
                node = parent[node];
                depth += 1;
            }
            depth
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paint(parameter: u32) -> TileOp {
        TileOp::Paint {
            kind: TileType::Color4Masked,
            parameter,
            mask: 0,
        }
    }

    #[test]
    fn huffman_lengths_follow_frequency() {
        let lengths = huffman_code_lengths(&[40, 30, 20, 10]);
        assert_eq!(lengths, vec![1, 2, 3, 3]);
        assert_eq!(huffman_code_lengths(&[7]), vec![1]);
    }

    #[test]
    fn limited_lengths_fit_the_primary_index() {
        // Fibonacci weights make a maximally skewed tree.
        let mut weights = vec![1u64, 1];
        while weights.len() < 30 {
            let next = weights[weights.len() - 1] + weights[weights.len() - 2];
            weights.push(next);
        }
        let lengths = limited_code_lengths(&weights, 12);
        assert!(lengths.iter().all(|&len| len <= 12));
        let kraft: f64 = lengths.iter().map(|&len| 0.5f64.powi(len as i32)).sum();
        assert!((kraft - 1.0).abs() < 1e-9);
    }

    #[test]
    fn skip_always_gets_the_zero_code() {
        let mut sequencer = ControlWordSequencer::new();
        let ops: Vec<TileOp> = (0..5).flat_map(|_| [paint(0), paint(4)]).collect();
        sequencer.register(&ops).unwrap();
        sequencer.register(&[TileOp::Skip { count: 0 }]).unwrap();

        let sequenced = sequencer.sequence().unwrap();
        let table = sequenced.table();
        assert_eq!(table.len(), PRIMARY_SLOTS);
        assert_eq!(table.words()[0].tile_type(), TileType::Skip);
        let skip_len = sequenced.code_len(SKIP_KEY).unwrap();
        assert_eq!(table.words()[0].count(), skip_len);
        assert!(
            [paint(0), paint(4)]
                .iter()
                .all(|op| sequenced.code_len(op.key()).unwrap() >= skip_len)
        );
    }

    #[test]
    fn skip_is_registered_even_when_unused() {
        let mut sequencer = ControlWordSequencer::new();
        sequencer.register(&[paint(8)]).unwrap();
        let sequenced = sequencer.sequence().unwrap();
        assert_eq!(sequenced.code_len(SKIP_KEY), Some(1));
        assert_eq!(sequenced.table().words()[0].tile_type(), TileType::Skip);
        assert_eq!(
            sequenced.table().words()[PRIMARY_SLOTS - 1].tile_type(),
            TileType::Color4Masked
        );
    }

    #[test]
    fn bitstream_writes_codes_skip_counts_and_masks() {
        let mut sequencer = ControlWordSequencer::new();
        let ops = [
            TileOp::Paint {
                kind: TileType::Color2Masked,
                parameter: 0x0201,
                mask: 0xBEEF,
            },
            TileOp::Skip { count: 3 },
            TileOp::Repeat { mask: 0x1234 },
        ];
        sequencer.register(&ops).unwrap();
        let sequenced = sequencer.sequence().unwrap();
        let frame = sequenced.bitstream_for(&ops).unwrap();

        assert_eq!(frame.maskstream, vec![0xEF, 0xBE, 0x34, 0x12]);
        let code_bits: u32 = ops
            .iter()
            .map(|op| sequenced.code_len(op.key()).unwrap())
            .sum();
        assert_eq!(frame.bitstream.len(), (code_bits as usize + 5).div_ceil(8));
    }

    #[test]
    fn unknown_operations_are_rejected() {
        let mut sequencer = ControlWordSequencer::new();
        sequencer.register(&[paint(0)]).unwrap();
        let sequenced = sequencer.sequence().unwrap();
        assert_eq!(
            sequenced.bitstream_for(&[paint(4)]),
            Err(CodecError::UnregisteredOperation {
                kind: TileType::Color4Masked,
                parameter: 4,
            })
        );
        assert!(matches!(
            sequenced.bitstream_for(&[TileOp::Repeat { mask: 0 }]),
            Err(CodecError::UnregisteredOperation { .. })
        ));
    }

    #[test]
    fn invalid_operations_are_unsupported() {
        let mut sequencer = ControlWordSequencer::new();
        assert!(matches!(
            sequencer.register(&[TileOp::Skip { count: 32 }]),
            Err(CodecError::Unsupported(_))
        ));
        assert!(matches!(
            sequencer.register(&[paint(MAX_PARAMETER + 1)]),
            Err(CodecError::Unsupported(_))
        ));
        assert!(matches!(
            sequencer.register(&[TileOp::Paint {
                kind: TileType::Unknown,
                parameter: 0,
                mask: 0,
            }]),
            Err(CodecError::Unsupported(_))
        ));
    }

    #[test]
    fn rejected_frame_counts_nothing() {
        let mut sequencer = ControlWordSequencer::new();
        assert!(
            sequencer
                .register(&[paint(0), paint(4), TileOp::Skip { count: 40 }])
                .is_err()
        );
        assert_eq!(sequencer.distinct_operations(), 0);
    }

    #[test]
    fn overflowing_operations_go_through_extension_tables() {
        let mut sequencer = ControlWordSequencer::new();
        let ops: Vec<TileOp> = (0..5000).map(paint).collect();
        sequencer.register(&ops).unwrap();
        let sequenced = sequencer.sequence().unwrap();
        let table = sequenced.table();

        assert!(table.words()[DIRECT_SLOTS].is_long_offset());
        assert_eq!(table.words()[DIRECT_SLOTS].long_offset(), PRIMARY_SLOTS as u32);
        // 5001 symbols: 4080 direct, 921 behind a depth-3 trie.
        let escaped = ops
            .iter()
            .filter(|op| sequenced.code_len(op.key()) == Some(24))
            .count();
        assert_eq!(escaped, 5001 - DIRECT_SLOTS);
    }
}
