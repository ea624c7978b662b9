use crate::index::RawDocument;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Anything that can hand over the full corpus in one go.
pub trait CorpusSource {
    /// Every document, in the order the source keeps them. Implementations
    /// must fail rather than return a partial set.
    fn fetch_all(&self) -> Result<Vec<RawDocument>>;
}

impl CorpusSource for [RawDocument] {
    fn fetch_all(&self) -> Result<Vec<RawDocument>> { Ok(self.to_vec()) }
}

impl CorpusSource for Vec<RawDocument> {
    fn fetch_all(&self) -> Result<Vec<RawDocument>> { Ok(self.clone()) }
}

/// Reads token maps from a `.jsonl`/`.json` file, or from every such file
/// under a directory (sorted by path).
///
/// Each JSONL line, or each element of a JSON array, is one record:
/// `{"id": 12, "title": "Moby Dick", "tokens": {"whale": 1219}}`.
pub struct JsonlSource {
    root: PathBuf,
}

impl JsonlSource {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    fn files(&self) -> Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = Vec::new();
        if self.root.is_dir() {
            for entry in WalkDir::new(&self.root).sort_by_file_name() {
                let entry = entry.with_context(|| format!("walking {}", self.root.display()))?;
                let p = entry.path();
                if p.is_file() {
                    if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                        if matches!(ext, "json" | "jsonl") {
                            files.push(p.to_path_buf());
                        }
                    }
                }
            }
        } else if self.root.is_file() {
            files.push(self.root.clone());
        } else {
            anyhow::bail!("input path {} does not exist", self.root.display());
        }
        Ok(files)
    }
}

impl CorpusSource for JsonlSource {
    fn fetch_all(&self) -> Result<Vec<RawDocument>> {
        let mut docs = Vec::new();
        for file in self.files()? {
            if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
                read_jsonl(&file, &mut docs)?;
            } else {
                read_json(&file, &mut docs)?;
            }
        }
        tracing::debug!(root = %self.root.display(), num_docs = docs.len(), "read token maps");
        Ok(docs)
    }
}

fn open(file: &Path) -> Result<BufReader<File>> {
    let f = File::open(file).with_context(|| format!("opening {}", file.display()))?;
    Ok(BufReader::new(f))
}

fn read_jsonl(file: &Path, docs: &mut Vec<RawDocument>) -> Result<()> {
    let reader = open(file)?;
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let doc: RawDocument = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}", file.display(), lineno + 1))?;
        docs.push(doc);
    }
    Ok(())
}

fn read_json(file: &Path, docs: &mut Vec<RawDocument>) -> Result<()> {
    let reader = open(file)?;
    let json: serde_json::Value = serde_json::from_reader(reader)
        .with_context(|| format!("parsing {}", file.display()))?;
    match json {
        serde_json::Value::Array(arr) => {
            for v in arr {
                docs.push(record(v, file)?);
            }
        }
        serde_json::Value::Object(_) => docs.push(record(json, file)?),
        _ => anyhow::bail!("{}: expected an object or an array of objects", file.display()),
    }
    Ok(())
}

fn record(value: serde_json::Value, file: &Path) -> Result<RawDocument> {
    serde_json::from_value(value).with_context(|| format!("record in {}", file.display()))
}
