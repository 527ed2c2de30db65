use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use folio_types::layout::{read_optional, write_atomic};
use tracing::{debug, warn};

use crate::error::{ChunkError, ChunkResult};
use crate::record::DocChunk;

/// Newline-delimited JSON change log (`chunks.ndjson`).
///
/// On-disk format: one serialized [`DocChunk`] per line. Appends use
/// `O_APPEND`; flag changes rewrite the whole file through a temp file and
/// a rename. Lines that fail to decode are skipped on read and preserved
/// verbatim on rewrite.
pub struct ChunkLog {
    path: PathBuf,
    fsync: bool,
}

impl ChunkLog {
    pub fn new(path: impl Into<PathBuf>, fsync: bool) -> Self {
        Self {
            path: path.into(),
            fsync,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Append one chunk as a single line.
    pub fn append(&self, chunk: &DocChunk) -> ChunkResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut line = serde_json::to_string(chunk)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        if self.fsync {
            file.sync_data()?;
        }

        debug!(seq = chunk.sequence, len = line.len(), "chunk appended");
        Ok(())
    }

    /// Every decodable chunk, in file order. A missing log is empty.
    pub fn read_all(&self) -> ChunkResult<Vec<DocChunk>> {
        let Some(text) = read_optional(&self.path)? else {
            return Ok(Vec::new());
        };

        let mut chunks = Vec::new();
        for (index, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<DocChunk>(line) {
                Ok(chunk) => chunks.push(chunk),
                Err(e) => {
                    warn!(line = index + 1, error = %e, "malformed chunk line; skipping");
                }
            }
        }
        Ok(chunks)
    }

    pub fn find(&self, sequence: u64) -> ChunkResult<DocChunk> {
        self.read_all()?
            .into_iter()
            .find(|c| c.sequence == sequence)
            .ok_or(ChunkError::ChunkNotFound(sequence))
    }

    /// Apply `change` to the `active` flag of chunk `sequence`.
    ///
    /// Returns the previous flag. The log is rewritten only when the flag
    /// actually changes.
    pub fn update_active<F>(&self, sequence: u64, change: F) -> ChunkResult<bool>
    where
        F: FnOnce(bool) -> bool,
    {
        let text = read_optional(&self.path)?.unwrap_or_default();
        let mut change = Some(change);
        let mut previous = None;
        let mut lines = Vec::new();

        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let parsed = serde_json::from_str::<DocChunk>(line).ok();
            match parsed {
                Some(mut chunk) if chunk.sequence == sequence && previous.is_none() => {
                    let before = chunk.active;
                    if let Some(f) = change.take() {
                        chunk.active = f(before);
                    }
                    previous = Some((before, chunk.active));
                    lines.push(serde_json::to_string(&chunk)?);
                }
                _ => lines.push(line.to_string()),
            }
        }

        let (before, after) = previous.ok_or(ChunkError::ChunkNotFound(sequence))?;
        if before != after {
            self.write_lines(&lines)?;
            debug!(seq = sequence, active = after, "chunk flag rewritten");
        }
        Ok(before)
    }

    /// Replace the whole log with `chunks`.
    pub fn replace(&self, chunks: &[DocChunk]) -> ChunkResult<()> {
        let lines = chunks
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?;
        self.write_lines(&lines)
    }

    /// Move the log to `dest`. A missing log is not an error.
    pub fn archive(&self, dest: &Path) -> ChunkResult<bool> {
        match fs::rename(&self.path, dest) {
            Ok(()) => {
                debug!(from = %self.path.display(), to = %dest.display(), "chunk log archived");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn write_lines(&self, lines: &[String]) -> ChunkResult<()> {
        let mut data = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
        for line in lines {
            data.push_str(line);
            data.push('\n');
        }
        write_atomic(&self.path, data.as_bytes(), self.fsync)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use folio_types::ChunkOp;

    use super::*;

    fn chunk(seq: u64, content: &str) -> DocChunk {
        DocChunk {
            sequence: seq,
            timestamp: Utc::now(),
            op: ChunkOp::AddFull,
            content: content.into(),
            user: "u".into(),
            source: "test".into(),
            hash: folio_crypto::chunk_hash(content),
            active: true,
        }
    }

    #[test]
    fn append_and_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let log = ChunkLog::new(dir.path().join("chunks.ndjson"), false);
        assert!(log.read_all().unwrap().is_empty());

        log.append(&chunk(1, "one\ntwo")).unwrap();
        log.append(&chunk(2, "three")).unwrap();

        let chunks = log.read_all().unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, "one\ntwo");
        assert_eq!(log.find(2).unwrap().content, "three");
        assert!(matches!(log.find(9), Err(ChunkError::ChunkNotFound(9))));
    }

    #[test]
    fn malformed_lines_are_skipped_and_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunks.ndjson");
        let log = ChunkLog::new(&path, false);
        log.append(&chunk(1, "a")).unwrap();
        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(b"{garbage\n").unwrap();
        }
        log.append(&chunk(2, "b")).unwrap();

        assert_eq!(log.read_all().unwrap().len(), 2);

        let before = log.update_active(2, |_| false).unwrap();
        assert!(before);
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("{garbage"));
        assert!(!log.find(2).unwrap().active);
    }

    #[test]
    fn unchanged_flag_does_not_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let log = ChunkLog::new(dir.path().join("chunks.ndjson"), false);
        log.append(&chunk(1, "a")).unwrap();
        assert!(log.update_active(1, |a| a).unwrap());
        assert!(matches!(
            log.update_active(5, |_| false),
            Err(ChunkError::ChunkNotFound(5))
        ));
    }

    #[test]
    fn archive_moves_file() {
        let dir = tempfile::tempdir().unwrap();
        let log = ChunkLog::new(dir.path().join("chunks.ndjson"), false);
        let dest = dir.path().join("chunks.ndjson.bak-x");
        assert!(!log.archive(&dest).unwrap());
        log.append(&chunk(1, "a")).unwrap();
        assert!(log.archive(&dest).unwrap());
        assert!(dest.exists());
        assert!(!log.exists());
    }
}
