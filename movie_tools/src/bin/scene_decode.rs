//! Replay a tile movie scene and dump every frame.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::debug;
use movie_codec::FrameBuffer;
use movie_tools::{SceneFiles, encode_pgm, frame_stem};

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    /// Bare `width * height` palette indices
    Raw,
    /// Binary greyscale PGM preview
    Pgm,
}

impl OutputFormat {
    fn extension(self) -> &'static str {
        match self {
            OutputFormat::Raw => "raw",
            OutputFormat::Pgm => "pgm",
        }
    }
}

#[derive(Parser, Debug)]
#[command(about = "Decode a tile movie scene into per-frame images", version)]
struct Args {
    /// Scene manifest (scene.json)
    manifest: PathBuf,

    /// Directory receiving the decoded frames
    output_dir: PathBuf,

    /// Output image format
    #[arg(long, value_enum, default_value_t = OutputFormat::Raw)]
    format: OutputFormat,

    /// Decode at most this many frames
    #[arg(long)]
    limit: Option<usize>,

    /// Keep frames that already exist on disk (they are still decoded)
    #[arg(long)]
    skip_existing: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let files = SceneFiles::load(&args.manifest)?;
    let decoder = files.decoder().context("building frame decoder")?;
    let mut frame = FrameBuffer::new(decoder.width(), decoder.height())?;

    fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("creating {}", args.output_dir.display()))?;

    let total = files.manifest.frames.len();
    let count = args.limit.map_or(total, |limit| limit.min(total));
    let mut written = 0usize;
    for index in 0..count {
        let (bitstream, maskstream) = files.read_frame(index)?;
        // Every frame is a delta, so earlier frames are decoded even when kept.
        let stats = decoder
            .decode_into(&bitstream, &maskstream, &mut frame)
            .with_context(|| format!("decoding frame {index}"))?;
        debug!("frame {index}: {stats:?}");

        let dest = args
            .output_dir
            .join(format!("{}.{}", frame_stem(index), args.format.extension()));
        if args.skip_existing && dest.exists() {
            continue;
        }
        let bytes = match args.format {
            OutputFormat::Raw => frame.to_packed(),
            OutputFormat::Pgm => encode_pgm(frame.width(), frame.height(), &frame.to_packed())?,
        };
        fs::write(&dest, bytes).with_context(|| format!("writing {}", dest.display()))?;
        written += 1;
    }

    println!(
        "Decoded {} of {} frames from {} ({} written to {})",
        count,
        total,
        args.manifest.display(),
        written,
        args.output_dir.display()
    );

    Ok(())
}
