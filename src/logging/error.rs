//! Failure taxonomy for writes and rotation passes
//!
//! None of these errors reach callers of the logging entry points. They are reported
//! through `tracing` and the current operation is abandoned or continued.

use std::io;
use std::path::PathBuf;

/// Coarse cause of an I/O failure, used to tag reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskErrorKind {
    DiskFull,
    PermissionDenied,
    NotFound,
    Other,
}

impl DiskErrorKind {
    /// Classify an I/O error
    pub fn of(e: &io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::StorageFull | io::ErrorKind::WriteZero => DiskErrorKind::DiskFull,
            io::ErrorKind::PermissionDenied | io::ErrorKind::ReadOnlyFilesystem => {
                DiskErrorKind::PermissionDenied
            }
            io::ErrorKind::NotFound => DiskErrorKind::NotFound,
            _ if is_quota_exceeded(e) => DiskErrorKind::DiskFull,
            _ => DiskErrorKind::Other,
        }
    }

    /// Short tag for reports
    pub fn user_message(&self) -> &'static str {
        match self {
            DiskErrorKind::DiskFull => "disk full",
            DiskErrorKind::PermissionDenied => "permission denied",
            DiskErrorKind::NotFound => "file or directory not found",
            DiskErrorKind::Other => "i/o error",
        }
    }
}

impl From<&io::Error> for DiskErrorKind {
    fn from(e: &io::Error) -> Self {
        DiskErrorKind::of(e)
    }
}

/// EDQUOT has no stable `ErrorKind` and a per-platform errno
fn is_quota_exceeded(e: &io::Error) -> bool {
    #[cfg(target_os = "linux")]
    {
        e.raw_os_error() == Some(122)
    }
    #[cfg(target_os = "macos")]
    {
        e.raw_os_error() == Some(69)
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        let _ = e;
        false
    }
}

/// Failure while appending a record to the primary file
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("opening log file {path} failed: {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("writing log file {path} failed: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("closing log file {path} failed: {source}")]
    Close { path: PathBuf, source: io::Error },
}

/// Failure during a rotation pass
#[derive(Debug, thiserror::Error)]
pub enum RotationError {
    #[error("failed to open file {path}: {source}")]
    OpenPrimary { path: PathBuf, source: io::Error },

    #[error("failed to read file {path}: {source}")]
    ReadPrimary { path: PathBuf, source: io::Error },

    #[error("opening view file {path} failed: {source}")]
    OpenView { path: PathBuf, source: io::Error },

    #[error("writing view file {path} failed: {source}")]
    WriteView { path: PathBuf, source: io::Error },

    #[error("failed to stat file {path}: {source}")]
    Stat { path: PathBuf, source: io::Error },

    #[error("failed to remove file {path}: {source}")]
    RemovePrimary { path: PathBuf, source: io::Error },

    #[error("failed to archive {from} as {to}: {source}")]
    Archive {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
}

impl WriteError {
    pub fn io(&self) -> &io::Error {
        match self {
            WriteError::Open { source, .. }
            | WriteError::Write { source, .. }
            | WriteError::Close { source, .. } => source,
        }
    }

    pub fn kind(&self) -> DiskErrorKind {
        DiskErrorKind::of(self.io())
    }
}

impl RotationError {
    pub fn io(&self) -> &io::Error {
        match self {
            RotationError::OpenPrimary { source, .. }
            | RotationError::ReadPrimary { source, .. }
            | RotationError::OpenView { source, .. }
            | RotationError::WriteView { source, .. }
            | RotationError::Stat { source, .. }
            | RotationError::RemovePrimary { source, .. }
            | RotationError::Archive { source, .. } => source,
        }
    }

    pub fn kind(&self) -> DiskErrorKind {
        DiskErrorKind::of(self.io())
    }
}
