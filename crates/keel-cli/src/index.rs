//! Keyword code index
//!
//! A small in-memory inverted index over the project's source files.
//! Built on demand (the `/index` command), queried by the code_search
//! tool. Scoring is plain term-frequency overlap; good enough to point
//! an agent at the right files.

use parking_lot::RwLock;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use crate::config::IndexConfig;

static TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]{2,}").unwrap());

/// Shared handle to the session's index. `None` until `/index` runs.
pub type IndexHandle = Arc<RwLock<Option<CodeIndex>>>;

pub fn new_handle() -> IndexHandle {
    Arc::new(RwLock::new(None))
}

/// One indexed file
struct IndexedFile {
    path: PathBuf,
    lines: Vec<String>,
}

/// Summary counters for the index
#[derive(Debug, Clone, Copy)]
pub struct IndexStats {
    pub files: usize,
    pub terms: usize,
}

/// A search hit: a file plus its best matching line
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub path: PathBuf,
    pub score: u32,
    pub line_number: usize,
    pub snippet: String,
}

/// Inverted keyword index over source files
pub struct CodeIndex {
    files: Vec<IndexedFile>,
    /// term -> (file index -> occurrence count)
    terms: HashMap<String, HashMap<usize, u32>>,
}

impl CodeIndex {
    /// Walk the working directory and index every file matching the
    /// configured globs. Unreadable or oversized files are skipped.
    pub fn build(root: &Path, config: &IndexConfig) -> std::io::Result<Self> {
        let mut index = Self {
            files: vec![],
            terms: HashMap::new(),
        };

        let mut seen = HashSet::new();
        for pattern in &config.include {
            let full_pattern = root.join(pattern).to_string_lossy().to_string();
            let Ok(entries) = glob::glob(&full_pattern) else {
                tracing::warn!("invalid index glob: {}", pattern);
                continue;
            };
            for path in entries.flatten() {
                if !path.is_file() || !seen.insert(path.clone()) {
                    continue;
                }
                let path_str = path.to_string_lossy();
                if path_str.contains("/.git/")
                    || path_str.contains("/target/")
                    || path_str.contains("/node_modules/")
                {
                    continue;
                }
                if let Ok(meta) = path.metadata() {
                    if meta.len() > config.max_file_size {
                        continue;
                    }
                }
                if let Ok(content) = fs::read_to_string(&path) {
                    index.add_file(path, content);
                }
            }
        }

        Ok(index)
    }

    fn add_file(&mut self, path: PathBuf, content: String) {
        let file_id = self.files.len();
        for token in TOKEN.find_iter(&content) {
            let term = token.as_str().to_lowercase();
            *self
                .terms
                .entry(term)
                .or_default()
                .entry(file_id)
                .or_insert(0) += 1;
        }
        self.files.push(IndexedFile {
            path,
            lines: content.lines().map(str::to_string).collect(),
        });
    }

    /// Rank files by summed term frequency across the query's tokens
    pub fn search(&self, query: &str, limit: usize) -> Vec<SearchHit> {
        let query_terms: Vec<String> = TOKEN
            .find_iter(query)
            .map(|t| t.as_str().to_lowercase())
            .collect();
        if query_terms.is_empty() {
            return vec![];
        }

        let mut scores: HashMap<usize, u32> = HashMap::new();
        for term in &query_terms {
            if let Some(postings) = self.terms.get(term) {
                for (&file_id, &count) in postings {
                    *scores.entry(file_id).or_insert(0) += count;
                }
            }
        }

        let mut ranked: Vec<(usize, u32)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.truncate(limit);

        ranked
            .into_iter()
            .map(|(file_id, score)| {
                let file = &self.files[file_id];
                let (line_number, snippet) = best_line(&file.lines, &query_terms);
                SearchHit {
                    path: file.path.clone(),
                    score,
                    line_number,
                    snippet,
                }
            })
            .collect()
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            files: self.files.len(),
            terms: self.terms.len(),
        }
    }
}

/// First line containing any query term, 1-indexed
fn best_line(lines: &[String], query_terms: &[String]) -> (usize, String) {
    for (i, line) in lines.iter().enumerate() {
        let lower = line.to_lowercase();
        if query_terms.iter().any(|t| lower.contains(t)) {
            return (i + 1, line.trim().to_string());
        }
    }
    (1, lines.first().cloned().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_fixture() -> (tempfile::TempDir, CodeIndex) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("server.rs"),
            "fn start_server(port: u16) {\n    listen(port);\n}\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("client.rs"),
            "fn connect_client(addr: &str) {\n    dial(addr);\n}\n",
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "not indexed").unwrap();

        let config = IndexConfig {
            include: vec!["**/*.rs".to_string()],
            max_file_size: 1024 * 1024,
        };
        let index = CodeIndex::build(dir.path(), &config).unwrap();
        (dir, index)
    }

    #[test]
    fn test_build_respects_globs() {
        let (_dir, index) = build_fixture();
        assert_eq!(index.stats().files, 2);
    }

    #[test]
    fn test_search_ranks_matching_file_first() {
        let (_dir, index) = build_fixture();
        let hits = index.search("start_server", 10);
        assert_eq!(hits.len(), 1);
        assert!(hits[0].path.ends_with("server.rs"));
        assert_eq!(hits[0].line_number, 1);
        assert!(hits[0].snippet.contains("start_server"));
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let (_dir, index) = build_fixture();
        let hits = index.search("CONNECT_CLIENT", 10);
        assert_eq!(hits.len(), 1);
        assert!(hits[0].path.ends_with("client.rs"));
    }

    #[test]
    fn test_empty_query_returns_nothing() {
        let (_dir, index) = build_fixture();
        assert!(index.search("++--", 10).is_empty());
    }

    #[test]
    fn test_oversized_files_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("big.rs"), "x".repeat(100)).unwrap();
        let config = IndexConfig {
            include: vec!["**/*.rs".to_string()],
            max_file_size: 10,
        };
        let index = CodeIndex::build(dir.path(), &config).unwrap();
        assert_eq!(index.stats().files, 0);
    }
}
