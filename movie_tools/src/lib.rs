//! On-disk scene layout shared by the movie command line tools.
//!
//! A scene directory holds a packed control word table, the color
//! dictionary, one bitstream and maskstream per frame, and a `scene.json`
//! manifest tying them together. Paths inside the manifest are relative to
//! the manifest itself.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use movie_codec::{ControlWordTable, EncodedScene, FrameDecoder};
use serde::{Deserialize, Serialize};

pub const MANIFEST_NAME: &str = "scene.json";
pub const TABLE_NAME: &str = "table.bin";
pub const DICTIONARY_NAME: &str = "dictionary.bin";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneManifest {
    pub width: usize,
    pub height: usize,
    pub table: PathBuf,
    pub dictionary: PathBuf,
    pub frames: Vec<FrameEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameEntry {
    pub bitstream: PathBuf,
    pub maskstream: PathBuf,
}

/// A manifest loaded together with the directory its paths resolve against.
#[derive(Debug, Clone)]
pub struct SceneFiles {
    pub root: PathBuf,
    pub manifest: SceneManifest,
}

impl SceneFiles {
    pub fn load(manifest_path: &Path) -> Result<Self> {
        let text = fs::read_to_string(manifest_path)
            .with_context(|| format!("reading manifest {}", manifest_path.display()))?;
        let manifest: SceneManifest = serde_json::from_str(&text)
            .with_context(|| format!("parsing manifest {}", manifest_path.display()))?;
        let root = manifest_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(Self { root, manifest })
    }

    pub fn resolve(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }

    pub fn read_table(&self) -> Result<ControlWordTable> {
        let path = self.resolve(&self.manifest.table);
        let bytes = fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
        ControlWordTable::unpack(&bytes).with_context(|| format!("unpacking {}", path.display()))
    }

    pub fn read_dictionary(&self) -> Result<Vec<u8>> {
        let path = self.resolve(&self.manifest.dictionary);
        fs::read(&path).with_context(|| format!("reading {}", path.display()))
    }

    pub fn decoder(&self) -> Result<FrameDecoder> {
        let decoder = FrameDecoder::builder()
            .table(self.read_table()?)
            .dictionary(self.read_dictionary()?)
            .dimensions(self.manifest.width, self.manifest.height)
            .build()?;
        Ok(decoder)
    }

    /// Read the bitstream and maskstream of frame `index`.
    pub fn read_frame(&self, index: usize) -> Result<(Vec<u8>, Vec<u8>)> {
        let entry = self
            .manifest
            .frames
            .get(index)
            .with_context(|| format!("manifest has no frame {index}"))?;
        let bits_path = self.resolve(&entry.bitstream);
        let mask_path = self.resolve(&entry.maskstream);
        let bitstream =
            fs::read(&bits_path).with_context(|| format!("reading {}", bits_path.display()))?;
        let maskstream =
            fs::read(&mask_path).with_context(|| format!("reading {}", mask_path.display()))?;
        Ok((bitstream, maskstream))
    }
}

pub fn frame_stem(index: usize) -> String {
    format!("frame_{index:05}")
}

/// Write every file of an encoded scene into `dir` and return the manifest path.
pub fn write_scene(scene: &EncodedScene, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let table_path = dir.join(TABLE_NAME);
    fs::write(&table_path, scene.packed_table())
        .with_context(|| format!("writing {}", table_path.display()))?;
    let dictionary_path = dir.join(DICTIONARY_NAME);
    fs::write(&dictionary_path, &scene.dictionary)
        .with_context(|| format!("writing {}", dictionary_path.display()))?;

    let mut frames = Vec::with_capacity(scene.frames.len());
    for (index, frame) in scene.frames.iter().enumerate() {
        let stem = frame_stem(index);
        let entry = FrameEntry {
            bitstream: PathBuf::from(format!("{stem}.bits")),
            maskstream: PathBuf::from(format!("{stem}.mask")),
        };
        for (name, bytes) in [
            (&entry.bitstream, &frame.bitstream),
            (&entry.maskstream, &frame.maskstream),
        ] {
            let path = dir.join(name);
            fs::write(&path, bytes).with_context(|| format!("writing {}", path.display()))?;
        }
        frames.push(entry);
    }

    let manifest = SceneManifest {
        width: scene.width,
        height: scene.height,
        table: PathBuf::from(TABLE_NAME),
        dictionary: PathBuf::from(DICTIONARY_NAME),
        frames,
    };
    let manifest_path = dir.join(MANIFEST_NAME);
    let json = serde_json::to_string_pretty(&manifest)?;
    fs::write(&manifest_path, json)
        .with_context(|| format!("writing {}", manifest_path.display()))?;
    Ok(manifest_path)
}

/// Binary PGM (`P5`) image of 8-bit palette indices.
pub fn encode_pgm(width: usize, height: usize, pixels: &[u8]) -> Result<Vec<u8>> {
    ensure!(
        pixels.len() == width * height,
        "expected {} pixels for a {width}x{height} image, got {}",
        width * height,
        pixels.len()
    );
    let mut out = format!("P5\n{width} {height}\n255\n").into_bytes();
    out.extend_from_slice(pixels);
    Ok(out)
}
