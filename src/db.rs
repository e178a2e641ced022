//! Persistence (C8): the binary table format, written with `byteorder` and
//! served zero-copy through `memmap2`, grounded directly on the reference
//! solver's `saveDB`/`mmapDB` wire format.
//!
//! ```text
//! offset 0: "TEEK"      (4 bytes, magic)
//! offset 4: version     (u32 LE)
//! then, for n = 0..9, one of:
//!   version 1 (uncompressed): u32 size_n, then i8 * size_n scores
//!   version 2 (canonical):    u32 canonical_count_n, u32 num_checkpoints_n,
//!                             u32 * num_checkpoints_n checkpoints,
//!                             i8 * canonical_count_n canonical scores
//! ```

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use byteorder::{LittleEndian, WriteBytesExt};
use memmap2::Mmap;

use crate::goedel::{goedel, CONFIGS};
use crate::score::Score;
use crate::symmetry::{canonical_goedel, SymmetryIndex};

const MAGIC: &[u8; 4] = b"TEEK";
const VERSION_UNCOMPRESSED: u32 = 1;
const VERSION_CANONICAL: u32 = 2;

/// A solved table, either held in memory (just-computed) or memory-mapped
/// from a `.tdb` file written by a previous run.
pub enum Database {
    Owned(Vec<Vec<Score>>),
    Mapped(MappedDatabase),
}

impl Database {
    /// Wraps freshly computed layers (layers 0..=8, in order) for
    /// in-process serving without a round trip through disk.
    pub fn from_tables(tables: Vec<Vec<Score>>) -> Self {
        assert_eq!(tables.len(), 9, "a database always holds all 9 layers");
        Database::Owned(tables)
    }

    /// Looks up the score for `(A, B)` at piece count `n`.
    pub fn score(&self, a: u32, b: u32, n: u8) -> Score {
        match self {
            Database::Owned(tables) => {
                let g = goedel(a, b, n);
                tables[n as usize][g]
            }
            Database::Mapped(mapped) => mapped.score(a, b, n),
        }
    }

    /// Writes the uncompressed (version 1) format. Only meaningful for an
    /// owned, freshly solved table.
    pub fn save_uncompressed(&self, path: impl AsRef<Path>) -> Result<()> {
        let Database::Owned(tables) = self else {
            bail!("save_uncompressed requires an owned, solved table");
        };
        let mut w = BufWriter::new(
            File::create(path.as_ref())
                .with_context(|| format!("creating {}", path.as_ref().display()))?,
        );
        w.write_all(MAGIC)?;
        w.write_u32::<LittleEndian>(VERSION_UNCOMPRESSED)?;
        for (n, layer) in tables.iter().enumerate() {
            assert_eq!(layer.len(), CONFIGS[n], "layer {n} has the wrong size");
            w.write_u32::<LittleEndian>(layer.len() as u32)?;
            let bytes: Vec<u8> = layer.iter().map(|&s| s as u8).collect();
            w.write_all(&bytes)?;
        }
        w.flush()?;
        Ok(())
    }

    /// Writes the D4-canonical (version 2) format, using one
    /// already-built `SymmetryIndex` per layer.
    pub fn save_compressed(&self, path: impl AsRef<Path>, indices: &[SymmetryIndex; 9]) -> Result<()> {
        let Database::Owned(tables) = self else {
            bail!("save_compressed requires an owned, solved table");
        };
        let mut w = BufWriter::new(
            File::create(path.as_ref())
                .with_context(|| format!("creating {}", path.as_ref().display()))?,
        );
        w.write_all(MAGIC)?;
        w.write_u32::<LittleEndian>(VERSION_CANONICAL)?;
        for (n, layer) in tables.iter().enumerate() {
            let index = &indices[n];
            assert_eq!(index.n as usize, n, "index/layer mismatch");
            let compressed = index.compress(layer);
            w.write_u32::<LittleEndian>(compressed.len() as u32)?;
            w.write_u32::<LittleEndian>(index.num_checkpoints() as u32)?;
            for &checkpoint in index.checkpoints() {
                w.write_u32::<LittleEndian>(checkpoint)?;
            }
            let bytes: Vec<u8> = compressed.iter().map(|&s| s as u8).collect();
            w.write_all(&bytes)?;
        }
        w.flush()?;
        Ok(())
    }

    /// Opens a `.tdb` file by memory-mapping it, validating the header and
    /// every layer's declared size against `configs[n]` before returning.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())
            .with_context(|| format!("opening {}", path.as_ref().display()))?;
        // SAFETY: the file is not expected to be mutated by another process
        // while mapped; this is the documented caveat of mmap-based reads.
        let mmap = unsafe { Mmap::map(&file)? };

        if mmap.len() < 8 || &mmap[0..4] != MAGIC {
            bail!("invalid database: bad magic");
        }
        let version = read_u32(&mmap, 4)?;

        let mut offset = 8usize;
        let mut layers = Vec::with_capacity(9);
        match version {
            VERSION_UNCOMPRESSED => {
                for n in 0..9 {
                    let size = read_u32(&mmap, offset)? as usize;
                    offset += 4;
                    if size != CONFIGS[n] {
                        bail!(
                            "size mismatch for {n} pieces: expected {}, got {size}",
                            CONFIGS[n]
                        );
                    }
                    if offset + size > mmap.len() {
                        bail!("truncated database at layer {n}");
                    }
                    layers.push(LayerView::Uncompressed { offset, size });
                    offset += size;
                }
            }
            VERSION_CANONICAL => {
                for n in 0..9 {
                    let canonical_count = read_u32(&mmap, offset)? as usize;
                    let num_checkpoints = read_u32(&mmap, offset + 4)? as usize;
                    offset += 8;

                    let checkpoints_bytes = num_checkpoints
                        .checked_mul(4)
                        .context("checkpoint count overflow")?;
                    if offset + checkpoints_bytes > mmap.len() {
                        bail!("truncated database at layer {n} checkpoints");
                    }
                    let mut checkpoints = Vec::with_capacity(num_checkpoints);
                    for i in 0..num_checkpoints {
                        checkpoints.push(read_u32(&mmap, offset + i * 4)?);
                    }
                    offset += checkpoints_bytes;

                    if offset + canonical_count > mmap.len() {
                        bail!("truncated database at layer {n} scores");
                    }
                    let index = SymmetryIndex::from_checkpoints(n as u8, checkpoints);
                    layers.push(LayerView::Compressed {
                        index,
                        offset,
                    });
                    offset += canonical_count;
                }
            }
            other => bail!("unsupported database version: {other}"),
        }

        Ok(Database::Mapped(MappedDatabase { mmap, layers }))
    }
}

fn read_u32(mmap: &Mmap, offset: usize) -> Result<u32> {
    let bytes = mmap
        .get(offset..offset + 4)
        .context("truncated database header")?;
    Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
}

enum LayerView {
    Uncompressed { offset: usize, size: usize },
    Compressed { index: SymmetryIndex, offset: usize },
}

/// A database backed by a read-only memory map, as produced by `serve`.
pub struct MappedDatabase {
    mmap: Mmap,
    layers: Vec<LayerView>,
}

impl MappedDatabase {
    pub fn score(&self, a: u32, b: u32, n: u8) -> Score {
        match &self.layers[n as usize] {
            LayerView::Uncompressed { offset, size } => {
                let g = goedel(a, b, n);
                debug_assert!(g < *size);
                self.mmap[offset + g] as i8
            }
            LayerView::Compressed { index, offset } => {
                let g_c = canonical_goedel(a, b, n);
                let rank = index.rank(g_c);
                self.mmap[offset + rank] as i8
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::{SCORE_A_WIN, SCORE_B_WIN, SCORE_TIE};

    fn tiny_tables() -> Vec<Vec<Score>> {
        (0..9u8)
            .map(|n| vec![SCORE_TIE; CONFIGS[n as usize]])
            .collect()
    }

    #[test]
    fn round_trips_through_uncompressed_save_and_load() {
        let mut tables = tiny_tables();
        tables[0][0] = 42;
        tables[4][100] = SCORE_A_WIN;
        tables[8][0] = SCORE_B_WIN;
        let db = Database::from_tables(tables);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.tdb");
        db.save_uncompressed(&path).unwrap();

        let loaded = Database::open(&path).unwrap();
        assert_eq!(loaded.score(0, 0, 0), 42);
        let (a, b) = crate::goedel::degoedel(100, 4);
        assert_eq!(loaded.score(a, b, 4), SCORE_A_WIN);
        let (a8, b8) = crate::goedel::degoedel(0, 8);
        assert_eq!(loaded.score(a8, b8, 8), SCORE_B_WIN);
    }

    #[test]
    fn rejects_bad_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.tdb");
        std::fs::write(&path, b"NOPE\x01\x00\x00\x00").unwrap();
        assert!(Database::open(&path).is_err());
    }

    #[test]
    fn rejects_size_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.tdb");
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&7u32.to_le_bytes()); // wrong: configs[0] == 1
        bytes.push(0);
        std::fs::write(&path, bytes).unwrap();
        assert!(Database::open(&path).is_err());
    }

    #[test]
    fn round_trips_through_compressed_save_and_load() {
        // Write the marker at a canonical representative itself, since only
        // canonical entries survive compression.
        let (a, b) = crate::goedel::degoedel(3, 1);
        let g_c = canonical_goedel(a, b, 1);
        let mut tables = tiny_tables();
        tables[1][g_c] = 17;
        let db = Database::from_tables(tables);

        let indices: Vec<SymmetryIndex> = (0..9u8).map(SymmetryIndex::build).collect();
        let indices: [SymmetryIndex; 9] = indices
            .try_into()
            .unwrap_or_else(|_| unreachable!("exactly 9 layers"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("compressed.tdb");
        db.save_compressed(&path, &indices).unwrap();

        let loaded = Database::open(&path).unwrap();
        let (a_c, b_c) = crate::goedel::degoedel(g_c, 1);
        assert_eq!(loaded.score(a_c, b_c, 1), 17);
    }
}
