//! Leveled file logging
//!
//! Appends formatted records to a primary log file, keeps a newest-first view of it
//! next to it and archives that view once the primary grows past a byte threshold.

mod diagnostics;
mod error;
mod format;
mod level;
mod logger;
mod rotation;

pub use diagnostics::init_diagnostics;
pub use error::{DiskErrorKind, RotationError, WriteError};
pub use format::{join_values, normalize_body, render_line, render_template};
pub use level::{should_emit, ParseLevelError, TraceLevel};
pub use logger::{Logger, DEFAULT_LOG_FILE, DEFAULT_TRACE_LEVEL, FATAL_EXIT_CODE};
pub use rotation::{
    view_path_for, RotationOutcome, Rotator, DEFAULT_ROTATION_THRESHOLD, VIEW_PREFIX,
};
