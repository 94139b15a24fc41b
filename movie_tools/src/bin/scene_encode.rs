//! Encode a directory of raw 8-bit frames into a tile movie scene.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::info;
use movie_codec::{EncoderOptions, SceneEncoder};
use movie_tools::write_scene;
use walkdir::WalkDir;

#[derive(Parser, Debug)]
#[command(about = "Encode raw 8-bit frames into a tile movie scene", version)]
struct Args {
    /// Frame width in pixels (multiple of 4)
    #[arg(long)]
    width: usize,

    /// Frame height in pixels (multiple of 4)
    #[arg(long)]
    height: usize,

    /// Never emit repeat-previous tiles
    #[arg(long)]
    no_repeat: bool,

    /// Never emit mask-free checkerboard tiles
    #[arg(long)]
    no_checkerboard: bool,

    /// Directory of `*.raw` frames, encoded in file name order
    frames_dir: PathBuf,

    /// Directory receiving the table, dictionary, streams and scene.json
    output_dir: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let frames = collect_frames(&args.frames_dir);
    if frames.is_empty() {
        bail!("no .raw frames found under {}", args.frames_dir.display());
    }

    let options = EncoderOptions {
        repeat_previous: !args.no_repeat,
        static_checkerboard: !args.no_checkerboard,
    };
    let mut encoder = SceneEncoder::with_options(args.width, args.height, options)
        .context("configuring scene encoder")?;

    for path in &frames {
        let pixels = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let ops = encoder
            .push_frame(&pixels)
            .with_context(|| format!("encoding {}", path.display()))?;
        info!("{}: {} tile operations", path.display(), ops.len());
    }

    let scene = encoder.finish().context("sequencing control words")?;
    let manifest = write_scene(&scene, &args.output_dir)?;

    let bits: usize = scene.frames.iter().map(|f| f.bitstream.len()).sum();
    let masks: usize = scene.frames.iter().map(|f| f.maskstream.len()).sum();
    println!(
        "Encoded {} frames ({}x{}): {} control words, {} dictionary bytes, \
         {} bitstream bytes, {} mask bytes",
        scene.frames.len(),
        scene.width,
        scene.height,
        scene.table.len(),
        scene.dictionary.len(),
        bits,
        masks
    );
    println!("Manifest written to {}", manifest.display());

    Ok(())
}

fn collect_frames(root: &Path) -> Vec<PathBuf> {
    let mut frames: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|res| res.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("raw"))
                .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();
    frames.sort();
    frames
}
