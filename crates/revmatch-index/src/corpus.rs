//! Reviewer corpus ingestion.
//!
//! A corpus directory holds one subdirectory per author, each containing that
//! author's papers as `*.pdf` or already-parsed `*.txt` files. When both
//! `paper.pdf` and `paper.txt` exist the text file wins and the PDF is not
//! parsed again. Every paper is embedded separately and an author's
//! embedding is the element-wise mean of their paper embeddings.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use revmatch_core::error::{Result, RevmatchError};
use revmatch_extract::pdf::text_from_pdf_bytes;

use crate::embedding::DynEmbeddingService;
use crate::manager::{IndexManager, IndexSnapshot};
use crate::store::EmbeddingMap;

/// One author's papers as trimmed, non-empty texts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorPapers {
    pub name: String,
    pub papers: Vec<String>,
}

/// Authors and their papers, sorted by author name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorCorpus {
    authors: Vec<AuthorPapers>,
}

impl AuthorCorpus {
    pub fn new(mut authors: Vec<AuthorPapers>) -> Self {
        authors.sort_by(|a, b| a.name.cmp(&b.name));
        Self { authors }
    }

    /// Read a corpus directory. Plain files at the top level are ignored,
    /// as are papers with no text (blank files, scanned or broken PDFs).
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut authors = Vec::new();

        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();

            let files = paper_files(&entry.path())?;
            let mut papers = Vec::with_capacity(files.len());
            for file in files {
                let text = read_paper(&file)?;
                if text.is_empty() {
                    debug!(paper = %file.display(), "Paper has no text, skipped");
                } else {
                    papers.push(text);
                }
            }

            debug!(author = %name, papers = papers.len(), "Author corpus read");
            authors.push(AuthorPapers { name, papers });
        }

        let corpus = Self::new(authors);
        info!(
            authors = corpus.len(),
            papers = corpus.paper_count(),
            dir = %dir.display(),
            "Author corpus loaded"
        );
        Ok(corpus)
    }

    pub fn authors(&self) -> &[AuthorPapers] {
        &self.authors
    }

    pub fn len(&self) -> usize {
        self.authors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.authors.is_empty()
    }

    pub fn paper_count(&self) -> usize {
        self.authors.iter().map(|a| a.papers.len()).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PaperKind {
    Text,
    Pdf,
}

fn paper_kind(path: &Path) -> Option<PaperKind> {
    let ext = path.extension()?.to_str()?;
    if ext.eq_ignore_ascii_case("txt") {
        Some(PaperKind::Text)
    } else if ext.eq_ignore_ascii_case("pdf") {
        Some(PaperKind::Pdf)
    } else {
        None
    }
}

/// Paper files of one author, sorted, one per file stem; a `.txt` shadows a
/// `.pdf` of the same stem.
fn paper_files(author_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut by_stem: BTreeMap<String, (PaperKind, PathBuf)> = BTreeMap::new();

    for entry in std::fs::read_dir(author_dir)? {
        let path = entry?.path();
        let Some(kind) = paper_kind(&path) else {
            continue;
        };
        let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            continue;
        };
        match by_stem.get(&stem) {
            Some((PaperKind::Text, _)) => {}
            _ => {
                by_stem.insert(stem, (kind, path));
            }
        }
    }

    Ok(by_stem.into_values().map(|(_, path)| path).collect())
}

/// Trimmed text of one paper; empty when nothing could be read from it.
fn read_paper(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    let text = match paper_kind(path) {
        Some(PaperKind::Pdf) => text_from_pdf_bytes(&bytes, &path.display().to_string()),
        _ => String::from_utf8_lossy(&bytes).into_owned(),
    };
    Ok(text.trim().to_string())
}

/// Embed every paper and average per author.
///
/// Authors without papers are skipped.
pub async fn embed_corpus(
    corpus: &AuthorCorpus,
    embedder: &dyn DynEmbeddingService,
) -> Result<EmbeddingMap> {
    let mut map = EmbeddingMap::with_capacity(corpus.len());

    for author in corpus.authors() {
        if author.papers.is_empty() {
            warn!(author = %author.name, "Author has no readable papers, skipped");
            continue;
        }

        let mut embeddings = Vec::with_capacity(author.papers.len());
        for paper in &author.papers {
            embeddings.push(embedder.embed_boxed(paper).await?);
        }
        map.insert(author.name.clone(), mean_embedding(&embeddings)?);
    }

    info!(authors = map.len(), "Author embeddings computed");
    Ok(map)
}

/// Embed `corpus` and make it the new embedding store, rebuilding the index.
///
/// A corpus with no readable papers is rejected before anything is embedded
/// and the existing store is kept.
pub async fn ingest_corpus(
    manager: &IndexManager,
    corpus: &AuthorCorpus,
    embedder: &dyn DynEmbeddingService,
) -> Result<IndexSnapshot> {
    if corpus.paper_count() == 0 {
        return Err(RevmatchError::InvalidInput(format!(
            "corpus of {} authors has no readable papers",
            corpus.len()
        )));
    }

    let map = embed_corpus(corpus, embedder).await?;
    manager.replace_store(&map)
}

/// Element-wise mean of equal-length vectors.
pub fn mean_embedding(vectors: &[Vec<f32>]) -> Result<Vec<f32>> {
    let Some(first) = vectors.first() else {
        return Err(RevmatchError::InvalidInput(
            "cannot average zero embeddings".to_string(),
        ));
    };

    let mut sum = vec![0.0f32; first.len()];
    for v in vectors {
        if v.len() != sum.len() {
            return Err(RevmatchError::DimensionMismatch {
                expected: sum.len(),
                actual: v.len(),
            });
        }
        for (acc, x) in sum.iter_mut().zip(v) {
            *acc += x;
        }
    }

    let n = vectors.len() as f32;
    Ok(sum.into_iter().map(|x| x / n).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{EmbeddingService, MockEmbedding};
    use revmatch_core::config::IndexPaths;

    fn write_paper(dir: &Path, author: &str, file: &str, text: &str) {
        let author_dir = dir.join(author);
        std::fs::create_dir_all(&author_dir).unwrap();
        std::fs::write(author_dir.join(file), text).unwrap();
    }

    #[test]
    fn test_from_dir_reads_authors_and_papers() {
        let dir = tempfile::tempdir().unwrap();
        write_paper(dir.path(), "Turing", "b.txt", "  On computable numbers  ");
        write_paper(dir.path(), "Turing", "a.txt", "Computing machinery");
        write_paper(dir.path(), "Turing", "notes.md", "ignored");
        write_paper(dir.path(), "Hopper", "empty.txt", "   \n");
        std::fs::write(dir.path().join("README.txt"), "top-level file").unwrap();

        let corpus = AuthorCorpus::from_dir(dir.path()).unwrap();
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.paper_count(), 2);

        let authors = corpus.authors();
        assert_eq!(authors[0].name, "Hopper");
        assert!(authors[0].papers.is_empty());
        assert_eq!(authors[1].name, "Turing");
        assert_eq!(
            authors[1].papers,
            vec!["Computing machinery", "On computable numbers"]
        );
    }

    #[test]
    fn test_from_dir_missing_is_io_error() {
        let err = AuthorCorpus::from_dir(Path::new("/no/such/corpus")).unwrap_err();
        assert!(matches!(err, RevmatchError::Io(_)));
    }

    #[test]
    fn test_mean_embedding() {
        let mean = mean_embedding(&[vec![1.0, 2.0], vec![3.0, 6.0]]).unwrap();
        assert_eq!(mean, vec![2.0, 4.0]);
    }

    #[test]
    fn test_mean_embedding_errors() {
        assert!(matches!(
            mean_embedding(&[]),
            Err(RevmatchError::InvalidInput(_))
        ));
        assert!(matches!(
            mean_embedding(&[vec![1.0], vec![1.0, 2.0]]),
            Err(RevmatchError::DimensionMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_embed_corpus_averages_and_skips_empty() {
        let embedder = MockEmbedding::with_dimensions(8);
        let corpus = AuthorCorpus::new(vec![
            AuthorPapers {
                name: "Lovelace".to_string(),
                papers: vec!["engines".to_string(), "notes".to_string()],
            },
            AuthorPapers {
                name: "Babbage".to_string(),
                papers: vec![],
            },
        ]);

        let map = embed_corpus(&corpus, &embedder).await.unwrap();
        assert_eq!(map.len(), 1);

        let a = embedder.embed("engines").await.unwrap();
        let b = embedder.embed("notes").await.unwrap();
        let expected: Vec<f32> = a.iter().zip(&b).map(|(x, y)| (x + y) / 2.0).collect();
        assert_eq!(map["Lovelace"], expected);
    }

    #[test]
    fn test_from_dir_skips_unparseable_pdf() {
        let dir = tempfile::tempdir().unwrap();
        write_paper(dir.path(), "Knuth", "scan.pdf", "%PDF-1.4 truncated");
        write_paper(dir.path(), "Knuth", "tex.txt", "Typesetting mathematics");
        write_paper(dir.path(), "Wirth", "broken.PDF", "not a pdf at all");

        let corpus = AuthorCorpus::from_dir(dir.path()).unwrap();
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.paper_count(), 1);
        assert_eq!(corpus.authors()[0].papers, vec!["Typesetting mathematics"]);
        assert!(corpus.authors()[1].papers.is_empty());
    }

    #[test]
    fn test_from_dir_prefers_parsed_text_over_pdf() {
        let dir = tempfile::tempdir().unwrap();
        write_paper(dir.path(), "Liskov", "abstraction.pdf", "%PDF-1.4 truncated");
        write_paper(dir.path(), "Liskov", "abstraction.txt", "Data abstraction");

        let corpus = AuthorCorpus::from_dir(dir.path()).unwrap();
        assert_eq!(corpus.authors()[0].papers, vec!["Data abstraction"]);
    }

    #[tokio::test]
    async fn test_ingest_blank_corpus_keeps_existing_store() {
        let data = tempfile::tempdir().unwrap();
        let manager = IndexManager::new(IndexPaths::in_dir(data.path()), 8);
        manager.register_reviewer("Alice", vec![1.0; 8]).unwrap();
        manager.register_reviewer("Bob", vec![-1.0; 8]).unwrap();

        let corpus_dir = tempfile::tempdir().unwrap();
        write_paper(corpus_dir.path(), "Carol", "p.txt", "   \n");
        let corpus = AuthorCorpus::from_dir(corpus_dir.path()).unwrap();
        assert!(!corpus.is_empty());

        let embedder = MockEmbedding::with_dimensions(8);
        let err = ingest_corpus(&manager, &corpus, &embedder).await.unwrap_err();
        assert!(matches!(err, RevmatchError::InvalidInput(_)));

        assert_eq!(manager.store().names().unwrap(), ["Alice", "Bob"]);
        assert_eq!(manager.load_or_build().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_ingest_replaces_store_and_rebuilds() {
        let data = tempfile::tempdir().unwrap();
        let manager = IndexManager::new(IndexPaths::in_dir(data.path()), 8);
        manager.register_reviewer("Alice", vec![1.0; 8]).unwrap();

        let corpus_dir = tempfile::tempdir().unwrap();
        write_paper(corpus_dir.path(), "Hamming", "codes.txt", "error detecting codes");
        let corpus = AuthorCorpus::from_dir(corpus_dir.path()).unwrap();

        let embedder = MockEmbedding::with_dimensions(8);
        let snapshot = ingest_corpus(&manager, &corpus, &embedder).await.unwrap();
        assert_eq!(snapshot.names(), ["Hamming"]);
        assert_eq!(manager.store().names().unwrap(), ["Hamming"]);
    }
}
