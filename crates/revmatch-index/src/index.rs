//! Flat inner-product vector index.
//!
//! Rows are stored contiguously (row-major) and searched exhaustively. Rows
//! are expected to be L2-normalized by the caller, which makes the inner
//! product equal to cosine similarity. Exhaustive search is exact and fast
//! enough for a few thousand reviewers.

use std::path::Path;

use serde::{Deserialize, Serialize};

use revmatch_core::error::{Result, RevmatchError};

use crate::persist;

const INDEX_MAGIC: [u8; 4] = *b"RVMX";
const INDEX_FORMAT_VERSION: u32 = 1;

/// A single hit returned from an index search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    /// Row position inside the index.
    pub position: usize,
    /// Inner product between the query and the row.
    pub score: f32,
}

/// Exhaustive inner-product index over fixed-dimension rows.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIpIndex {
    dim: usize,
    data: Vec<f32>,
}

/// On-disk layout of a [`FlatIpIndex`].
#[derive(Serialize, Deserialize)]
struct IndexFile {
    magic: [u8; 4],
    version: u32,
    dim: u64,
    rows: u64,
    data: Vec<f32>,
}

impl FlatIpIndex {
    /// Create an empty index for vectors of dimension `dim`.
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            data: Vec::new(),
        }
    }

    /// Build an index from rows that all have dimension `dim`.
    pub fn from_rows<'a, I>(dim: usize, rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a [f32]>,
    {
        let mut index = Self::new(dim);
        for row in rows {
            index.add(row)?;
        }
        Ok(index)
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of rows in the index.
    pub fn len(&self) -> usize {
        if self.dim == 0 {
            0
        } else {
            self.data.len() / self.dim
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append one row.
    pub fn add(&mut self, row: &[f32]) -> Result<()> {
        if row.len() != self.dim || self.dim == 0 {
            return Err(RevmatchError::DimensionMismatch {
                expected: self.dim,
                actual: row.len(),
            });
        }
        self.data.extend_from_slice(row);
        Ok(())
    }

    /// The row stored at `position`.
    pub fn row(&self, position: usize) -> Option<&[f32]> {
        if position >= self.len() {
            return None;
        }
        let start = position * self.dim;
        Some(&self.data[start..start + self.dim])
    }

    /// Return the `k` rows with the highest inner product against `query`,
    /// sorted by descending score. Equal scores keep row order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if query.len() != self.dim {
            return Err(RevmatchError::DimensionMismatch {
                expected: self.dim,
                actual: query.len(),
            });
        }
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits: Vec<SearchHit> = self
            .data
            .chunks_exact(self.dim)
            .enumerate()
            .map(|(position, row)| SearchHit {
                position,
                score: dot(query, row),
            })
            .collect();

        // Stable sort, so ties stay in row order.
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);
        Ok(hits)
    }

    /// Write the index to `path`, replacing any previous file atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = IndexFile {
            magic: INDEX_MAGIC,
            version: INDEX_FORMAT_VERSION,
            dim: self.dim as u64,
            rows: self.len() as u64,
            data: self.data.clone(),
        };
        let bytes = bincode::serialize(&file)?;
        persist::write_atomic(path, &bytes)
    }

    /// Read an index written by [`FlatIpIndex::save`].
    ///
    /// I/O failures are reported as such; a file that cannot be decoded or
    /// whose header disagrees with its payload is corrupt state.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let file: IndexFile = bincode::deserialize(&bytes).map_err(|e| {
            RevmatchError::CorruptState(format!("unreadable index {}: {}", path.display(), e))
        })?;

        if file.magic != INDEX_MAGIC {
            return Err(RevmatchError::CorruptState(format!(
                "{} is not a revmatch index",
                path.display()
            )));
        }
        if file.version != INDEX_FORMAT_VERSION {
            return Err(RevmatchError::CorruptState(format!(
                "unsupported index format version {}",
                file.version
            )));
        }
        let expected = (file.dim as usize).checked_mul(file.rows as usize);
        if file.dim == 0 || expected != Some(file.data.len()) {
            return Err(RevmatchError::CorruptState(format!(
                "index header says {} rows of dimension {}, payload holds {} values",
                file.rows,
                file.dim,
                file.data.len()
            )));
        }

        Ok(Self {
            dim: file.dim as usize,
            data: file.data,
        })
    }
}

/// Inner product of two equal-length vectors.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Scale `v` to unit L2 norm. Zero vectors are left as they are.
pub fn normalize_in_place(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Unit-norm copy of `v`; see [`normalize_in_place`].
pub fn normalize(v: &[f32]) -> Vec<f32> {
    let mut out = v.to_vec();
    normalize_in_place(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_hot(dim: usize, hot: usize) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        v[hot] = 1.0;
        v
    }

    #[test]
    fn test_normalize_unit_vector_is_idempotent() {
        let v = normalize(&[3.0, 4.0]);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);

        let again = normalize(&v);
        for (a, b) in v.iter().zip(&again) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_normalize_zero_vector_stays_zero() {
        let v = normalize(&[0.0; 8]);
        assert_eq!(v, vec![0.0; 8]);
    }

    #[test]
    fn test_normalize_negative_components() {
        let v = normalize(&[-2.0, 0.0]);
        assert_eq!(v, vec![-1.0, 0.0]);
    }

    #[test]
    fn test_add_and_len() {
        let mut index = FlatIpIndex::new(3);
        assert!(index.is_empty());
        index.add(&[1.0, 0.0, 0.0]).unwrap();
        index.add(&[0.0, 1.0, 0.0]).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.row(1), Some(&[0.0, 1.0, 0.0][..]));
        assert_eq!(index.row(2), None);
    }

    #[test]
    fn test_add_rejects_wrong_dimension() {
        let mut index = FlatIpIndex::new(3);
        let err = index.add(&[1.0, 0.0]).unwrap_err();
        assert!(matches!(
            err,
            RevmatchError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
        assert!(index.is_empty());
    }

    #[test]
    fn test_search_orders_by_score() {
        let rows = [one_hot(4, 0), normalize(&[1.0, 1.0, 0.0, 0.0]), one_hot(4, 1)];
        let index = FlatIpIndex::from_rows(4, rows.iter().map(Vec::as_slice)).unwrap();

        let hits = index.search(&one_hot(4, 0), 3).unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].position, 0);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
        assert_eq!(hits[1].position, 1);
        assert_eq!(hits[2].position, 2);
        assert!(hits[2].score.abs() < 1e-6);
    }

    #[test]
    fn test_search_respects_k_and_size() {
        let rows: Vec<Vec<f32>> = (0..5).map(|i| one_hot(5, i)).collect();
        let index = FlatIpIndex::from_rows(5, rows.iter().map(Vec::as_slice)).unwrap();

        assert_eq!(index.search(&one_hot(5, 0), 2).unwrap().len(), 2);
        assert_eq!(index.search(&one_hot(5, 0), 50).unwrap().len(), 5);
        assert!(index.search(&one_hot(5, 0), 0).unwrap().is_empty());
    }

    #[test]
    fn test_search_ties_keep_row_order() {
        let rows = vec![one_hot(3, 1), one_hot(3, 2), one_hot(3, 1)];
        let index = FlatIpIndex::from_rows(3, rows.iter().map(Vec::as_slice)).unwrap();

        let hits = index.search(&one_hot(3, 0), 3).unwrap();
        let positions: Vec<usize> = hits.iter().map(|h| h.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn test_search_empty_index() {
        let index = FlatIpIndex::new(384);
        assert!(index.search(&vec![1.0; 384], 5).unwrap().is_empty());
    }

    #[test]
    fn test_search_rejects_wrong_query_dimension() {
        let index = FlatIpIndex::new(3);
        assert!(matches!(
            index.search(&[1.0], 1),
            Err(RevmatchError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.bin");

        let rows = [normalize(&[1.0, 2.0, 3.0]), normalize(&[-1.0, 0.5, 0.0])];
        let index = FlatIpIndex::from_rows(3, rows.iter().map(Vec::as_slice)).unwrap();
        index.save(&path).unwrap();

        let loaded = FlatIpIndex::load(&path).unwrap();
        assert_eq!(loaded, index);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = FlatIpIndex::load(&dir.path().join("missing.bin")).unwrap_err();
        assert!(matches!(err, RevmatchError::Io(_)));
    }

    #[test]
    fn test_load_garbage_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.bin");
        std::fs::write(&path, b"definitely not an index").unwrap();
        let err = FlatIpIndex::load(&path).unwrap_err();
        assert!(matches!(err, RevmatchError::CorruptState(_)));
    }

    #[test]
    fn test_load_header_payload_mismatch_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.bin");
        let file = IndexFile {
            magic: INDEX_MAGIC,
            version: INDEX_FORMAT_VERSION,
            dim: 3,
            rows: 2,
            data: vec![1.0, 0.0, 0.0],
        };
        std::fs::write(&path, bincode::serialize(&file).unwrap()).unwrap();

        let err = FlatIpIndex::load(&path).unwrap_err();
        assert!(matches!(err, RevmatchError::CorruptState(_)));
    }
}
