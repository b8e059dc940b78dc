use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;

/// Create the directory if it doesn't exist; error if a non-directory exists there.
pub(crate) fn ensure_dir_exists(path: &Path) -> Result<()> {
    if path.exists() {
        if !path.is_dir() {
            anyhow::bail!("Path exists but is not a directory: {}", path.display());
        }
    } else {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory {}", path.display()))?;
    }
    Ok(())
}

/// Remove and recreate a directory, so each run starts from an empty sink.
pub(crate) fn recreate_dir(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)
            .with_context(|| format!("Failed to clear directory {}", path.display()))?;
    }
    fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory {}", path.display()))?;
    Ok(())
}

/// Serialize `value` as gzipped JSON to `target`, atomically (tempfile -> rename).
pub(crate) fn write_json_gz<T: Serialize>(target: &Path, value: &T) -> Result<()> {
    let parent = target.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(parent)
        .with_context(|| format!("create dir {}", parent.display()))?;

    let tmp = NamedTempFile::new_in(parent).context("create temp file")?;
    let mut encoder = GzEncoder::new(BufWriter::new(tmp.as_file()), Compression::best());
    serde_json::to_writer(&mut encoder, value)
        .with_context(|| format!("serialize {}", target.display()))?;
    encoder
        .finish()
        .and_then(|mut w| w.flush().map(|_| ()))
        .with_context(|| format!("write {}", target.display()))?;

    tmp.persist(target)
        .with_context(|| format!("rename to {}", target.display()))?;
    Ok(())
}

/// Read a gzipped JSON file written by [`write_json_gz`].
pub(crate) fn read_json_gz<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let decoder = GzDecoder::new(BufReader::new(file));
    serde_json::from_reader(decoder).with_context(|| format!("parse {}", path.display()))
}
