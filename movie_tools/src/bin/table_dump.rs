//! Summarise a packed control word table.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use movie_codec::{ControlWordTable, TileType};

#[derive(Parser, Debug)]
#[command(about = "Inspect a packed control word table", version)]
struct Args {
    /// Packed table (table.bin)
    table: PathBuf,

    /// List every control word
    #[arg(long)]
    words: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let bytes = fs::read(&args.table).with_context(|| format!("reading {}", args.table.display()))?;
    let table = ControlWordTable::unpack(&bytes)
        .with_context(|| format!("unpacking {}", args.table.display()))?;

    let mut histogram: BTreeMap<TileType, usize> = BTreeMap::new();
    let mut long_offsets = 0usize;
    for word in table.words() {
        if word.is_long_offset() {
            long_offsets += 1;
        } else {
            *histogram.entry(word.tile_type()).or_default() += 1;
        }
    }

    println!(
        "{}: {} control words ({} packed bytes)",
        args.table.display(),
        table.len(),
        bytes.len()
    );
    println!("  long offsets: {long_offsets}");
    for (kind, count) in &histogram {
        println!("  {:<16} {count}", format!("{kind:?}"));
    }

    if args.words {
        for (index, word) in table.words().iter().enumerate() {
            if word.is_long_offset() {
                println!("{index:>7}  {:06x}  -> {}", word.value(), word.long_offset());
            } else {
                println!(
                    "{index:>7}  {:06x}  {:?} param={:#x} bits={}",
                    word.value(),
                    word.tile_type(),
                    word.parameter(),
                    word.count()
                );
            }
        }
    }

    Ok(())
}
