use super::{RecordIter, RecordSource};
use statpipe_common::{Record, Result, StatPipeError};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Newline-delimited JSON record source, one `Record` per line. Blank lines
/// are skipped; a line that fails to parse is yielded as a per-record
/// `Deserialization` error carrying the file and line number.
#[derive(Debug, Clone)]
pub struct JsonLinesSource {
    paths: Vec<PathBuf>,
}

impl JsonLinesSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonLinesSource {
            paths: vec![path.into()],
        }
    }

    /// Resolve a glob pattern into a multi-file source. Files are sorted so
    /// enumeration order is stable across runs.
    pub fn from_glob(pattern: &str) -> Result<Self> {
        let mut paths: Vec<PathBuf> = glob::glob(pattern)
            .map_err(|e| StatPipeError::SourceUnavailable(e.to_string()))?
            .flatten()
            .filter(|p| p.is_file())
            .collect();
        paths.sort();
        if paths.is_empty() {
            return Err(StatPipeError::SourceUnavailable(format!(
                "no files match '{pattern}'"
            )));
        }
        Ok(JsonLinesSource { paths })
    }

    fn open(path: &Path) -> Result<RecordIter> {
        let display = path.display().to_string();
        let file = std::fs::File::open(path).map_err(|e| {
            StatPipeError::SourceUnavailable(format!("cannot open {display}: {e}"))
        })?;
        let reader = BufReader::new(file);
        let iter = reader.lines().enumerate().filter_map(move |(idx, line)| {
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    return Some(Err(StatPipeError::SourceUnavailable(format!(
                        "read failed at {display}:{}: {e}",
                        idx + 1
                    ))))
                }
            };
            if line.trim().is_empty() {
                return None;
            }
            match serde_json::from_str::<Record>(&line) {
                Ok(r) => Some(Ok(r)),
                Err(e) => Some(Err(StatPipeError::Deserialization(format!(
                    "{display}:{}: {e}",
                    idx + 1
                )))),
            }
        });
        Ok(Box::new(iter))
    }
}

impl RecordSource for JsonLinesSource {
    fn fetch_all(&self) -> Result<RecordIter> {
        let mut iters = Vec::with_capacity(self.paths.len());
        for p in &self.paths {
            iters.push(Self::open(p)?);
        }
        Ok(Box::new(iters.into_iter().flatten()))
    }

    fn partition_hint(&self) -> usize {
        self.paths.len()
    }

    // one partition per file
    fn partitions(&self) -> Result<Vec<RecordIter>> {
        self.paths.iter().map(|p| Self::open(p)).collect()
    }
}
