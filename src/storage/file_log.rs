//! Durable log kept as a JSON-lines file.
//!
//! Each row is appended as a single line and never rewritten. The whole file
//! is read once on open and served from memory afterwards; appends go to the
//! file first and become visible in memory only once written.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::storage::errors::{StorageError, StorageResult};
use crate::storage::log::{LogFilter, LogRecord, LogRow, MemoryLog, RepositoryLog};

/// A log persisted to a `.jsonl` file.
pub struct FileLog {
    path: PathBuf,
    /// append handle, also serializes id assignment
    file: Mutex<File>,
    rows: MemoryLog,
}

impl FileLog {
    /// Open a log file, creating it (and its parent directory) if missing.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).read(true).open(&path)?;
        let rows = Self::load(&path)?;
        tracing::debug!(path = %path.display(), rows = rows.len(), "opened repository log");

        Ok(Self {
            path,
            file: Mutex::new(file),
            rows: MemoryLog::from_rows(rows),
        })
    }

    /// read and validate every row of the file
    fn load(path: &Path) -> StorageResult<Vec<LogRow>> {
        let reader = BufReader::new(File::open(path)?);
        let mut rows: Vec<LogRow> = Vec::new();

        for (n, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let row: LogRow = serde_json::from_str(&line).map_err(|e| StorageError::CorruptedData {
                path: path.to_path_buf(),
                reason: format!("line {}: {}", n + 1, e),
            })?;
            if let Some(last) = rows.last() {
                if row.id <= last.id {
                    return Err(StorageError::CorruptedData {
                        path: path.to_path_buf(),
                        reason: format!(
                            "line {}: row id {} does not follow {}",
                            n + 1,
                            row.id,
                            last.id
                        ),
                    });
                }
            }
            rows.push(row);
        }

        Ok(rows)
    }

    /// Get the log file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Write one whole line, calling `rollback` to cut off any partial write.
fn append_line<W: Write>(
    out: &mut W,
    line: &[u8],
    rollback: impl FnOnce(&mut W) -> io::Result<()>,
) -> io::Result<()> {
    if let Err(e) = out.write_all(line).and_then(|()| out.flush()) {
        if let Err(undo) = rollback(out) {
            tracing::warn!(error = %undo, "could not drop partially written log line");
        }
        return Err(e);
    }
    Ok(())
}

impl RepositoryLog for FileLog {
    fn insert(&self, record: LogRecord) -> StorageResult<LogRow> {
        let mut file = self.file.lock();
        let row = LogRow {
            id: self.rows.next_id(),
            record,
        };

        let mut line = serde_json::to_vec(&row)?;
        line.push(b'\n');
        let len = file.metadata()?.len();
        append_line(&mut *file, &line, |f| f.set_len(len))?;

        self.rows.push(row.clone());
        Ok(row)
    }

    fn select(&self, filter: &LogFilter) -> StorageResult<Vec<LogRow>> {
        self.rows.select(filter)
    }

    fn len(&self) -> StorageResult<usize> {
        self.rows.len()
    }
}

impl std::fmt::Debug for FileLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileLog")
            .field("path", &self.path)
            .field("rows", &self.rows)
            .finish()
    }
}
