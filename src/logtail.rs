//! # Log Tail
//!
//! Follows every `*.log` file in a directory and copies new lines to stdout,
//! the way `tail -n 0 -f dir/*.log` would. Files are read from their end at
//! the time they are first seen, except files created after the tail started,
//! which are read from the beginning.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

use crate::error::{DatastoreError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

struct FollowedFile {
    reader: BufReader<File>,
    position: u64,
}

/// Tracks read positions for the `*.log` files in one directory
///
/// ```rust
/// use oeem_datastore::logtail::LogTail;
///
/// # tokio_test::block_on(async {
/// let dir = tempfile::tempdir().unwrap();
/// std::fs::write(dir.path().join("access.log"), "old line\n").unwrap();
///
/// let mut tail = LogTail::new(dir.path());
/// let mut out = Vec::new();
/// assert_eq!(tail.poll(&mut out).await.unwrap(), 0);
/// # });
/// ```
pub struct LogTail {
    dir: PathBuf,
    files: HashMap<PathBuf, FollowedFile>,
    started: bool,
}

impl LogTail {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            files: HashMap::new(),
            started: false,
        }
    }

    fn log_files(&self) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| DatastoreError::io(&self.dir, e))?;
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "log"))
            .collect();
        paths.sort();
        Ok(paths)
    }

    async fn open(path: &Path, from_end: bool) -> Result<FollowedFile> {
        let mut file = File::open(path).await.map_err(|e| DatastoreError::io(path, e))?;
        let position = if from_end {
            file.seek(std::io::SeekFrom::End(0))
                .await
                .map_err(|e| DatastoreError::io(path, e))?
        } else {
            0
        };
        Ok(FollowedFile {
            reader: BufReader::new(file),
            position,
        })
    }

    /// Read whatever was appended since the last poll and write it to `out`
    ///
    /// Each line is written as-is; a partial trailing line waits for the next poll.
    pub async fn poll<W: AsyncWrite + Unpin>(&mut self, out: &mut W) -> Result<usize> {
        let from_end = !self.started;
        for path in self.log_files()? {
            if !self.files.contains_key(&path) {
                debug!(file = %path.display(), "Following log file");
                let followed = Self::open(&path, from_end).await?;
                self.files.insert(path, followed);
            }
        }
        self.started = true;

        let mut written = 0;
        for (path, followed) in self.files.iter_mut() {
            let length = tokio::fs::metadata(path)
                .await
                .map(|m| m.len())
                .unwrap_or(followed.position);
            if length < followed.position {
                warn!(file = %path.display(), "Log file truncated, restarting from the beginning");
                followed
                    .reader
                    .seek(std::io::SeekFrom::Start(0))
                    .await
                    .map_err(|e| DatastoreError::io(path, e))?;
                followed.position = 0;
            }

            let mut line = String::new();
            loop {
                line.clear();
                let read = followed
                    .reader
                    .read_line(&mut line)
                    .await
                    .map_err(|e| DatastoreError::io(path, e))?;
                if read == 0 {
                    break;
                }
                if !line.ends_with('\n') {
                    followed
                        .reader
                        .seek(std::io::SeekFrom::Start(followed.position))
                        .await
                        .map_err(|e| DatastoreError::io(path, e))?;
                    break;
                }
                followed.position += read as u64;
                out.write_all(line.as_bytes())
                    .await
                    .map_err(|e| DatastoreError::io("stdout", e))?;
                written += 1;
            }
        }
        out.flush().await.map_err(|e| DatastoreError::io("stdout", e))?;
        Ok(written)
    }
}

/// Follow `dir/*.log` on stdout until the process is killed
pub async fn tail_logs(dir: &Path) -> Result<()> {
    let mut tail = LogTail::new(dir);
    let mut stdout = tokio::io::stdout();
    loop {
        tail.poll(&mut stdout).await?;
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
