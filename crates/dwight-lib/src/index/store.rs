//! Flat-file persistence for [`CorpusIndex`].
//!
//! Two companion artifacts live in the index directory:
//! - `vectors.bin`: magic `DWVX`, format version, dimension, count, the
//!   checksum of the `documents.json` bytes it was written with, then
//!   `count * dimension` little-endian `f32` values
//! - `documents.json`: the metadata table, one record per vector
//!
//! The two files are renamed into place one after the other. The checksum
//! binds them, so a pair from different builds is rejected on load.

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use super::{CorpusIndex, DocumentChunk};

pub const VECTORS_FILE: &str = "vectors.bin";
pub const DOCUMENTS_FILE: &str = "documents.json";

const MAGIC: &[u8; 4] = b"DWVX";
const FORMAT_VERSION: u32 = 2;
/// magic + version + dimension + count + metadata checksum
const HEADER_LEN: usize = 4 + 4 + 4 + 8 + 8;

/// Header and body of `vectors.bin`.
struct VectorBlob {
    dimension: usize,
    metadata_checksum: u64,
    vectors: Vec<f32>,
}

/// Paths of both artifacts for an index directory.
pub fn artifact_paths(dir: &Path) -> (PathBuf, PathBuf) {
    (dir.join(VECTORS_FILE), dir.join(DOCUMENTS_FILE))
}

/// Whether both persisted artifacts are present.
pub fn exists(dir: &Path) -> bool {
    let (vectors, documents) = artifact_paths(dir);
    vectors.is_file() && documents.is_file()
}

/// Persist `index` into `dir`, replacing any previous artifacts.
///
/// Both files are written to temporary names first and renamed into place
/// only after both writes succeed.
pub fn save(index: &CorpusIndex, dir: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create index directory {}", dir.display()))?;
    let (vectors_path, documents_path) = artifact_paths(dir);
    let vectors_tmp = vectors_path.with_extension("bin.tmp");
    let documents_tmp = documents_path.with_extension("json.tmp");

    let documents =
        serde_json::to_vec(index.chunks()).context("Failed to encode metadata table")?;
    write_vectors(index, metadata_checksum(&documents), &vectors_tmp)?;
    fs::write(&documents_tmp, &documents)
        .with_context(|| format!("Failed to write {}", documents_tmp.display()))?;

    fs::rename(&vectors_tmp, &vectors_path)
        .with_context(|| format!("Failed to move {} into place", vectors_path.display()))?;
    fs::rename(&documents_tmp, &documents_path)
        .with_context(|| format!("Failed to move {} into place", documents_path.display()))?;

    debug!(
        dir = %dir.display(),
        entries = index.len(),
        dimension = index.dimension(),
        "Persisted index"
    );
    Ok(())
}

/// Load a persisted index from `dir`.
///
/// Returns `Ok(None)` when either artifact is missing, and an error when the
/// artifacts exist but are unreadable or inconsistent with each other.
pub fn load(dir: &Path) -> anyhow::Result<Option<CorpusIndex>> {
    if !exists(dir) {
        return Ok(None);
    }
    let (vectors_path, documents_path) = artifact_paths(dir);

    let blob = read_vectors(&vectors_path)?;
    let documents = fs::read(&documents_path)
        .with_context(|| format!("Failed to read {}", documents_path.display()))?;
    anyhow::ensure!(
        metadata_checksum(&documents) == blob.metadata_checksum,
        "Persisted vectors and metadata disagree: {} was not written with {}",
        documents_path.display(),
        vectors_path.display()
    );
    let chunks: Vec<DocumentChunk> = serde_json::from_slice(&documents)
        .with_context(|| format!("Failed to parse {}", documents_path.display()))?;

    let dimension = blob.dimension;
    let index = CorpusIndex::from_flat(dimension, blob.vectors, chunks)
        .context("Persisted vectors and metadata disagree")?;
    debug!(
        dir = %dir.display(),
        entries = index.len(),
        dimension,
        "Loaded persisted index"
    );
    Ok(Some(index))
}

/// FNV-1a over the encoded metadata table.
fn metadata_checksum(documents: &[u8]) -> u64 {
    documents.iter().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(0x0100_0000_01b3)
    })
}

fn write_vectors(
    index: &CorpusIndex,
    metadata_checksum: u64,
    path: &Path,
) -> anyhow::Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let dimension = u32::try_from(index.dimension()).context("Dimension exceeds u32")?;
    let count = u64::try_from(index.len()).context("Entry count exceeds u64")?;

    writer.write_all(MAGIC)?;
    writer.write_all(&FORMAT_VERSION.to_le_bytes())?;
    writer.write_all(&dimension.to_le_bytes())?;
    writer.write_all(&count.to_le_bytes())?;
    writer.write_all(&metadata_checksum.to_le_bytes())?;
    for value in index.raw_vectors() {
        writer.write_all(&value.to_le_bytes())?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

fn read_vectors(path: &Path) -> anyhow::Result<VectorBlob> {
    let mut bytes = Vec::new();
    File::open(path)
        .and_then(|mut f| f.read_to_end(&mut bytes))
        .with_context(|| format!("Failed to read {}", path.display()))?;

    anyhow::ensure!(bytes.len() >= HEADER_LEN, "{} is truncated", path.display());
    anyhow::ensure!(&bytes[0..4] == MAGIC, "{} is not a vector blob", path.display());
    let version = u32::from_le_bytes(bytes[4..8].try_into()?);
    anyhow::ensure!(
        version == FORMAT_VERSION,
        "Unsupported vector blob version {version}"
    );
    let dimension = u32::from_le_bytes(bytes[8..12].try_into()?) as usize;
    let count = usize::try_from(u64::from_le_bytes(bytes[12..20].try_into()?))
        .context("Entry count exceeds usize")?;
    let metadata_checksum = u64::from_le_bytes(bytes[20..28].try_into()?);

    let body = &bytes[HEADER_LEN..];
    let expected = count
        .checked_mul(dimension)
        .and_then(|n| n.checked_mul(4))
        .context("Vector blob header overflows")?;
    anyhow::ensure!(
        body.len() == expected,
        "{} holds {} bytes of vectors, header declares {expected}",
        path.display(),
        body.len()
    );

    let vectors = body
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    Ok(VectorBlob {
        dimension,
        metadata_checksum,
        vectors,
    })
}
