//! View file rotation
//!
//! After every write the primary log is re-read and written back, newest line first,
//! into a sibling "view" file. Once the primary grows past the byte threshold it is
//! deleted and the view file is archived under a timestamped name.
//!
//! Every pass reads the whole primary file, so the cost of a write grows with the
//! file. The small default threshold keeps that bounded; raising it far past a few
//! hundred kilobytes turns each log call into a large copy.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use tracing::debug;

use super::error::RotationError;

/// Primary size (bytes) above which the view is archived
pub const DEFAULT_ROTATION_THRESHOLD: u64 = 1000;

/// Prefix joined to the primary file name to form the view file name
pub const VIEW_PREFIX: &str = "view_";

/// Permission bits for files created by the logger
#[cfg(unix)]
pub(crate) const FILE_MODE: u32 = 0o644;

/// Result of one rotation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationOutcome {
    /// Number of lines written to the view file
    pub lines: usize,
    /// Size of the primary file when it was inspected
    pub primary_bytes: u64,
    /// Archive created by this pass, if the threshold was crossed
    pub archived: Option<PathBuf>,
}

/// Rotation bound to one primary file
#[derive(Debug, Clone)]
pub struct Rotator {
    primary: PathBuf,
    view: PathBuf,
    threshold_bytes: u64,
}

/// Derive the view path for a primary log file (`dir/error.log` -> `dir/view_error.log`)
pub fn view_path_for(primary: &Path) -> PathBuf {
    let name = primary
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    primary.with_file_name(format!("{}{}", VIEW_PREFIX, name))
}

/// Suffix appended to archived view files
///
/// UTC with a `Z` suffix, so names sort in creation order.
pub fn archive_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parse the timestamp suffix of an archive name
fn archive_time(path: &Path, prefix: &str) -> Option<DateTime<FixedOffset>> {
    let name = path.file_name()?.to_str()?;
    DateTime::parse_from_rfc3339(name.strip_prefix(prefix)?).ok()
}

pub(crate) fn create_options() -> OpenOptions {
    let mut options = OpenOptions::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(FILE_MODE);
    }
    options
}

impl Rotator {
    /// Create a rotator for `primary` with the default threshold
    pub fn new(primary: impl Into<PathBuf>) -> Self {
        Self::with_threshold(primary, DEFAULT_ROTATION_THRESHOLD)
    }

    /// Create a rotator for `primary` archiving once it exceeds `threshold_bytes`
    pub fn with_threshold(primary: impl Into<PathBuf>, threshold_bytes: u64) -> Self {
        let primary = primary.into();
        let view = view_path_for(&primary);
        Self {
            primary,
            view,
            threshold_bytes,
        }
    }

    pub fn primary_path(&self) -> &Path {
        &self.primary
    }

    pub fn view_path(&self) -> &Path {
        &self.view
    }

    pub fn threshold_bytes(&self) -> u64 {
        self.threshold_bytes
    }

    /// Rewrite the view file from the primary and archive it if the primary is too large
    pub fn rotate(&self) -> Result<RotationOutcome, RotationError> {
        let primary = match File::open(&self.primary) {
            Ok(file) => Some(file),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(source) => {
                return Err(RotationError::OpenPrimary {
                    path: self.primary.clone(),
                    source,
                })
            }
        };

        let lines = match &primary {
            Some(file) => read_lines(file).map_err(|source| RotationError::ReadPrimary {
                path: self.primary.clone(),
                source,
            })?,
            None => Vec::new(),
        };

        self.write_view(&lines)?;

        let primary_bytes = match &primary {
            Some(file) => {
                file.metadata()
                    .map_err(|source| RotationError::Stat {
                        path: self.primary.clone(),
                        source,
                    })?
                    .len()
            }
            None => 0,
        };
        drop(primary);

        let archived = if primary_bytes > self.threshold_bytes {
            Some(self.archive()?)
        } else {
            None
        };

        Ok(RotationOutcome {
            lines: lines.len(),
            primary_bytes,
            archived,
        })
    }

    /// Archive files produced for this view, oldest first
    pub fn list_archives(&self) -> io::Result<Vec<PathBuf>> {
        let dir = match self.view.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let prefix = match self.view.file_name().and_then(|n| n.to_str()) {
            Some(name) => format!("{}.", name),
            None => return Ok(Vec::new()),
        };
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut archives = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if name.starts_with(&prefix) && path.is_file() {
                    archives.push(path);
                }
            }
        }
        // Archives written with a local offset still order by instant; unparsable names go first
        archives.sort_by_cached_key(|path| (archive_time(path, &prefix), path.clone()));
        Ok(archives)
    }

    fn write_view(&self, lines: &[Vec<u8>]) -> Result<(), RotationError> {
        let file = create_options()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.view)
            .map_err(|source| RotationError::OpenView {
                path: self.view.clone(),
                source,
            })?;

        let mut writer = BufWriter::new(file);
        let written: io::Result<()> = lines.iter().rev().try_for_each(|line| {
            writer.write_all(line)?;
            writer.write_all(b"\n")
        });
        written
            .and_then(|_| writer.flush())
            .map_err(|source| RotationError::WriteView {
                path: self.view.clone(),
                source,
            })
    }

    fn archive(&self) -> Result<PathBuf, RotationError> {
        fs::remove_file(&self.primary).map_err(|source| RotationError::RemovePrimary {
            path: self.primary.clone(),
            source,
        })?;

        let mut name = self.view.as_os_str().to_os_string();
        name.push(".");
        name.push(archive_timestamp());
        let target = PathBuf::from(name);

        fs::rename(&self.view, &target).map_err(|source| RotationError::Archive {
            from: self.view.clone(),
            to: target.clone(),
            source,
        })?;

        debug!(archive = %target.display(), "Archived view file");
        Ok(target)
    }
}

/// Read every line without its terminator (`\n` or `\r\n`)
fn read_lines(file: &File) -> io::Result<Vec<Vec<u8>>> {
    let mut reader = BufReader::new(file);
    let mut lines = Vec::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        }
        lines.push(buf.clone());
    }
    Ok(lines)
}
