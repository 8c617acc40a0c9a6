//! Directory-backed document index with keyword ranking.
//!
//! Documents are loaded once, split into fixed-size character windows that
//! overlap their neighbours, and kept in memory. A query is broken into
//! lowercase terms; each chunk scores the number of term occurrences,
//! normalised by chunk length.

use dossier_core::error::RetrievalError;
use dossier_core::knowledge::Passage;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// File extensions the index reads.
const INDEXED_EXTENSIONS: &[&str] = &["txt", "md"];

/// Words too common to rank on.
const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "from", "that", "this", "are", "was", "were", "into", "about",
    "under", "over", "its", "their", "based", "only", "any", "all", "has", "have", "what",
    "which", "how", "does", "not", "but", "you", "your",
];

/// Chunking and ranking parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            top_k: 4,
        }
    }
}

/// One indexed window of a source document.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    pub source: String,
    lowered: String,
}

/// An in-memory index over a document directory.
#[derive(Debug, Clone)]
pub struct DocumentIndex {
    settings: IndexSettings,
    chunks: Vec<Chunk>,
    documents: usize,
}

impl DocumentIndex {
    /// An empty index.
    pub fn new(settings: IndexSettings) -> Self {
        Self {
            settings,
            chunks: Vec::new(),
            documents: 0,
        }
    }

    /// Index every `.txt` / `.md` file below `dir`.
    pub fn load_dir(dir: &Path, settings: IndexSettings) -> Result<Self, RetrievalError> {
        if !dir.is_dir() {
            return Err(RetrievalError::NotReady(format!(
                "data directory {} not found",
                dir.display()
            )));
        }

        let files = collect_files(dir)?;

        let mut index = Self::new(settings);
        for path in files {
            let text = match std::fs::read_to_string(&path) {
                Ok(text) => text,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable document");
                    continue;
                }
            };
            let source = path
                .strip_prefix(dir)
                .unwrap_or(&path)
                .display()
                .to_string();
            index.add_document(&source, &text);
        }

        if index.is_empty() {
            warn!(dir = %dir.display(), "No documents indexed");
        } else {
            info!(
                dir = %dir.display(),
                documents = index.documents,
                chunks = index.chunks.len(),
                "Document index loaded"
            );
        }

        Ok(index)
    }

    /// Split `text` into chunks and add them under `source`.
    pub fn add_document(&mut self, source: &str, text: &str) {
        let pieces = split_text(text, self.settings.chunk_size, self.settings.chunk_overlap);
        debug!(source, chunks = pieces.len(), "Indexed document");
        if pieces.is_empty() {
            return;
        }
        self.documents += 1;
        self.chunks.extend(pieces.into_iter().map(|text| Chunk {
            lowered: text.to_lowercase(),
            text,
            source: source.to_string(),
        }));
    }

    /// The best `top_k` chunks for `query`, highest score first.
    ///
    /// Chunks without any query term are never returned; ties keep document
    /// order.
    pub fn search(&self, query: &str) -> Vec<Passage> {
        let terms = query_terms(query);
        if terms.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(f32, &Chunk)> = self
            .chunks
            .iter()
            .filter_map(|chunk| {
                let occurrences: usize = terms
                    .iter()
                    .map(|t| chunk.lowered.matches(t.as_str()).count())
                    .sum();
                if occurrences == 0 {
                    return None;
                }
                let score = occurrences as f32 / (chunk.text.len() as f32 / 100.0).max(1.0);
                Some((score, chunk))
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(self.settings.top_k);

        scored
            .into_iter()
            .map(|(score, chunk)| Passage {
                text: chunk.text.clone(),
                source: Some(chunk.source.clone()),
                score,
            })
            .collect()
    }

    pub fn settings(&self) -> IndexSettings {
        self.settings
    }

    /// Number of documents that produced at least one chunk.
    pub fn document_count(&self) -> usize {
        self.documents
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Indexable files below `dir` in file-name order. Symlinks are followed;
/// loops and unreadable entries below the root are logged and skipped.
fn collect_files(dir: &Path) -> Result<Vec<PathBuf>, RetrievalError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
    {
        match entry {
            Ok(e) if e.file_type().is_file() => {
                let indexed = e
                    .path()
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| {
                        INDEXED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
                    });
                if indexed {
                    files.push(e.into_path());
                }
            }
            Ok(_) => {}
            Err(e) if e.depth() == 0 => {
                return Err(RetrievalError::Storage(format!("{}: {e}", dir.display())));
            }
            Err(e) => warn!(error = %e, "Skipping path during indexing"),
        }
    }
    Ok(files)
}

/// Lowercase alphanumeric terms of at least three characters, minus
/// stopwords, deduplicated.
fn query_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for word in query.split(|c: char| !c.is_alphanumeric()) {
        let word = word.to_lowercase();
        if word.chars().count() < 3 || STOPWORDS.contains(&word.as_str()) {
            continue;
        }
        if !terms.contains(&word) {
            terms.push(word);
        }
    }
    terms
}

/// Split text into windows of `chunk_size` characters, each starting
/// `chunk_size - chunk_overlap` characters after the previous one.
/// Whitespace-only windows are dropped.
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() || chunk_size == 0 {
        return Vec::new();
    }

    let step = chunk_size.saturating_sub(chunk_overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + chunk_size).min(chars.len());
        let window: String = chars[start..end].iter().collect();
        let trimmed = window.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }
        if end == chars.len() {
            break;
        }
        start += step;
    }
    chunks
}
