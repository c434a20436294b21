//! The leveled file logger
//!
//! A [`Logger`] appends one line per call to its primary file and immediately runs a
//! rotation pass over that same file. The write and the rotation happen under the
//! logger's own lock, so calls on one logger never interleave.

use std::fmt::{self, Display};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::{error, warn};

use super::error::{RotationError, WriteError};
use super::format::{join_values, render_line_now, render_template};
use super::level::TraceLevel;
use super::rotation::{create_options, Rotator, DEFAULT_ROTATION_THRESHOLD};
use crate::config::LoggerConfig;

/// Default primary log file
pub const DEFAULT_LOG_FILE: &str = "./logs/error.log";

/// Default minimum level
pub const DEFAULT_TRACE_LEVEL: TraceLevel = TraceLevel::Debug;

/// Exit status used after a fatal record
pub const FATAL_EXIT_CODE: i32 = 1;

type OpenPrimary = fn(&Path) -> io::Result<Box<dyn Write>>;

/// Leveled logger writing to a single file
pub struct Logger {
    file_path: PathBuf,
    minimum_level: TraceLevel,
    rotator: Rotator,
    lock: Mutex<()>,
    open_primary: OpenPrimary,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("file_path", &self.file_path)
            .field("minimum_level", &self.minimum_level)
            .field("rotator", &self.rotator)
            .finish_non_exhaustive()
    }
}

fn open_for_append(path: &Path) -> io::Result<Box<dyn Write>> {
    let file = create_options().create(true).append(true).open(path)?;
    Ok(Box::new(file))
}

impl Logger {
    /// Create a logger for `file_path` emitting `minimum_level` and above
    pub fn new(file_path: impl Into<PathBuf>, minimum_level: TraceLevel) -> Self {
        Self::with_threshold(file_path, minimum_level, DEFAULT_ROTATION_THRESHOLD)
    }

    /// Create a logger with a custom archive threshold
    pub fn with_threshold(
        file_path: impl Into<PathBuf>,
        minimum_level: TraceLevel,
        threshold_bytes: u64,
    ) -> Self {
        let file_path = file_path.into();
        let rotator = Rotator::with_threshold(&file_path, threshold_bytes);
        Self {
            file_path,
            minimum_level,
            rotator,
            lock: Mutex::new(()),
            open_primary: open_for_append,
        }
    }

    #[cfg(test)]
    fn with_opener(mut self, open_primary: OpenPrimary) -> Self {
        self.open_primary = open_primary;
        self
    }

    /// Logger on `./logs/error.log` at `Debug`
    pub fn default_logger() -> Self {
        Self::new(DEFAULT_LOG_FILE, DEFAULT_TRACE_LEVEL)
    }

    pub fn from_config(config: &LoggerConfig) -> Self {
        Self::with_threshold(
            &config.file_path,
            config.minimum_level,
            config.rotation_threshold_bytes,
        )
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn minimum_level(&self) -> TraceLevel {
        self.minimum_level
    }

    pub fn rotator(&self) -> &Rotator {
        &self.rotator
    }

    /// Whether a call at `level` would be written
    pub fn enabled(&self, level: TraceLevel) -> bool {
        self.minimum_level.allows(level)
    }

    pub fn debug(&self, values: &[&dyn Display]) {
        self.log(TraceLevel::Debug, || join_values(values));
    }

    pub fn debugf(&self, args: fmt::Arguments<'_>) {
        self.log(TraceLevel::Debug, || render_template(args));
    }

    pub fn info(&self, values: &[&dyn Display]) {
        self.log(TraceLevel::Info, || join_values(values));
    }

    pub fn infof(&self, args: fmt::Arguments<'_>) {
        self.log(TraceLevel::Info, || render_template(args));
    }

    pub fn warning(&self, values: &[&dyn Display]) {
        self.log(TraceLevel::Warning, || join_values(values));
    }

    pub fn warningf(&self, args: fmt::Arguments<'_>) {
        self.log(TraceLevel::Warning, || render_template(args));
    }

    pub fn error(&self, values: &[&dyn Display]) {
        self.log(TraceLevel::Error, || join_values(values));
    }

    pub fn errorf(&self, args: fmt::Arguments<'_>) {
        self.log(TraceLevel::Error, || render_template(args));
    }

    /// Write a fatal record, then exit the process with status 1
    pub fn fatal(&self, values: &[&dyn Display]) -> ! {
        self.log(TraceLevel::Fatal, || join_values(values));
        std::process::exit(FATAL_EXIT_CODE)
    }

    /// Write a fatal record, then exit the process with status 1
    pub fn fatalf(&self, args: fmt::Arguments<'_>) -> ! {
        self.log(TraceLevel::Fatal, || render_template(args));
        std::process::exit(FATAL_EXIT_CODE)
    }

    fn log(&self, level: TraceLevel, render: impl FnOnce() -> String) {
        if !self.enabled(level) {
            return;
        }

        let _guard = self.acquire();
        let line = render_line_now(level, &render());

        match self.append(&line) {
            Err(e @ WriteError::Open { .. }) => {
                report_write_error(&e);
                return;
            }
            Err(e) => report_write_error(&e),
            Ok(()) => {}
        }

        if let Err(e) = self.rotator.rotate() {
            report_rotation_error(&e);
        }
    }

    fn acquire(&self) -> MutexGuard<'_, ()> {
        // The guarded data is (), a panic while holding the lock leaves nothing torn
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append one line; the file is closed before returning
    fn append(&self, line: &str) -> Result<(), WriteError> {
        let mut file = (self.open_primary)(&self.file_path).map_err(|source| WriteError::Open {
            path: self.file_path.clone(),
            source,
        })?;

        let written = file
            .write_all(line.as_bytes())
            .map_err(|source| WriteError::Write {
                path: self.file_path.clone(),
                source,
            });

        let closed = file.flush().map_err(|source| WriteError::Close {
            path: self.file_path.clone(),
            source,
        });
        drop(file);

        // A write failure wins over a close failure; the close failure is still reported
        if let (Err(_), Err(close)) = (&written, &closed) {
            report_write_error(close);
        }
        written.and(closed)
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::default_logger()
    }
}

fn report_write_error(e: &WriteError) {
    match e {
        WriteError::Close { .. } => warn!(kind = e.kind().user_message(), "{}", e),
        _ => error!(kind = e.kind().user_message(), "{}", e),
    }
}

fn report_rotation_error(e: &RotationError) {
    error!(kind = e.kind().user_message(), "Rotation pass aborted: {}", e);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    const BIG: u64 = 10 * 1024 * 1024;

    fn lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    fn is_well_formed(line: &str) -> bool {
        // [timestamp][Tag][body]
        line.starts_with('[') && line.ends_with(']') && line.matches("][").count() >= 2
    }

    #[test]
    fn test_default_logger() {
        let logger = Logger::default_logger();
        assert_eq!(logger.file_path(), Path::new("./logs/error.log"));
        assert_eq!(logger.minimum_level(), TraceLevel::Debug);
        assert_eq!(
            logger.rotator().view_path(),
            Path::new("./logs/view_error.log")
        );
        assert_eq!(logger.rotator().threshold_bytes(), 1000);
    }

    #[test]
    fn test_threshold_filters_lower_levels() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("error.log");
        let logger = Logger::with_threshold(&path, TraceLevel::Warning, BIG);

        logger.debug(&[&"hidden"]);
        logger.info(&[&"hidden"]);
        assert!(!path.exists(), "suppressed calls must not touch the file");

        logger.warning(&[&"w"]);
        logger.error(&[&"e"]);
        let written = lines(&path);
        assert_eq!(written.len(), 2);
        assert!(written[0].contains("][Warning][w]"));
        assert!(written[1].contains("][Error][e]"));
    }

    #[test]
    fn test_suppressed_template_is_never_rendered() {
        struct Exploding;
        impl Display for Exploding {
            fn fmt(&self, _: &mut fmt::Formatter<'_>) -> fmt::Result {
                panic!("suppressed call was formatted");
            }
        }

        let temp_dir = TempDir::new().unwrap();
        let logger = Logger::new(temp_dir.path().join("error.log"), TraceLevel::Error);
        logger.debugf(format_args!("{}", Exploding));
        logger.info(&[&Exploding]);
    }

    #[test]
    fn test_positional_and_template_forms() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("error.log");
        let logger = Logger::with_threshold(&path, TraceLevel::Debug, BIG);

        logger.info(&[&"disk", &42, &'x']);
        logger.errorf(format_args!("code={:03} ratio={:.1}", 7, 0.54));

        let written = lines(&path);
        assert!(written[0].ends_with("][Info][disk, 42, x]"));
        assert!(written[1].ends_with("][Error][code=007 ratio=0.5]"));
    }

    #[test]
    fn test_embedded_newlines_stay_on_one_line() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("error.log");
        let logger = Logger::with_threshold(&path, TraceLevel::Debug, BIG);

        logger.warning(&[&"line1\nline2"]);

        let written = lines(&path);
        assert_eq!(written.len(), 1);
        assert!(written[0].ends_with("][Warning][line1 line2]"));
    }

    #[test]
    fn test_each_write_refreshes_view() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("error.log");
        let logger = Logger::with_threshold(&path, TraceLevel::Debug, BIG);

        logger.info(&[&"A"]);
        logger.info(&[&"B"]);
        logger.info(&[&"C"]);

        let view = lines(logger.rotator().view_path());
        let bodies: Vec<&str> = view.iter().map(|l| &l[l.len() - 3..]).collect();
        assert_eq!(bodies, vec!["[C]", "[B]", "[A]"]);
    }

    #[test]
    fn test_archives_once_primary_exceeds_threshold() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("error.log");
        let logger = Logger::new(&path, TraceLevel::Debug);
        let filler = "x".repeat(100);

        let mut written = 0;
        while logger.rotator().list_archives().unwrap().is_empty() {
            logger.error(&[&written, &filler]);
            written += 1;
            assert!(written < 50, "primary never crossed the threshold");
        }

        assert!(!path.exists());
        let archives = logger.rotator().list_archives().unwrap();
        assert_eq!(archives.len(), 1);
        let archived = lines(&archives[0]);
        assert_eq!(archived.len(), written);
        assert!(archived[0].contains(&format!("[{}, ", written - 1)));
        assert!(archived[archived.len() - 1].contains("[0, "));

        // Next write starts a fresh primary
        logger.info(&[&"after"]);
        assert_eq!(lines(&path).len(), 1);
    }

    #[test]
    fn test_open_failure_is_not_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing-dir").join("error.log");
        let logger = Logger::new(&path, TraceLevel::Debug);

        logger.error(&[&"goes nowhere"]);

        assert!(!path.exists());
        assert!(!logger.rotator().view_path().exists());
    }

    #[test]
    fn test_concurrent_writes_do_not_interleave() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 50;

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("error.log");
        let logger = Arc::new(Logger::with_threshold(&path, TraceLevel::Debug, BIG));

        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let logger = Arc::clone(&logger);
                thread::spawn(move || {
                    for i in 0..PER_THREAD {
                        logger.infof(format_args!("thread={} seq={} {}", t, i, "y".repeat(40)));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let written = lines(&path);
        assert_eq!(written.len(), THREADS * PER_THREAD);
        assert!(written.iter().all(|l| is_well_formed(l)));
        for t in 0..THREADS {
            let seqs: Vec<usize> = written
                .iter()
                .filter_map(|l| {
                    let body = l.split("thread=").nth(1)?;
                    let (thread, rest) = body.split_once(' ')?;
                    if thread.parse::<usize>().ok()? != t {
                        return None;
                    }
                    rest.strip_prefix("seq=")?.split(' ').next()?.parse().ok()
                })
                .collect();
            assert_eq!(seqs, (0..PER_THREAD).collect::<Vec<_>>());
        }
        assert_eq!(lines(logger.rotator().view_path()).len(), THREADS * PER_THREAD);
    }

    #[test]
    fn test_concurrent_writes_across_archives_lose_nothing() {
        const THREADS: usize = 4;
        const PER_THREAD: usize = 25;

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("error.log");
        let logger = Arc::new(Logger::new(&path, TraceLevel::Debug));

        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let logger = Arc::clone(&logger);
                thread::spawn(move || {
                    for i in 0..PER_THREAD {
                        logger.error(&[&t, &i]);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut total = lines(&path).len();
        for archive in logger.rotator().list_archives().unwrap() {
            let archived = lines(&archive);
            assert!(archived.iter().all(|l| is_well_formed(l)));
            total += archived.len();
        }
        assert_eq!(total, THREADS * PER_THREAD);
    }

    fn open_read_only(path: &Path) -> io::Result<Box<dyn Write>> {
        Ok(Box::new(File::open(path)?))
    }

    struct FlushFails(File);

    impl Write for FlushFails {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::other("device went away"))
        }
    }

    fn open_flush_fails(path: &Path) -> io::Result<Box<dyn Write>> {
        let file = create_options().create(true).append(true).open(path)?;
        Ok(Box::new(FlushFails(file)))
    }

    #[test]
    fn test_write_failure_still_rotates() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("error.log");
        fs::write(&path, "A\nB\n").unwrap();
        let logger =
            Logger::with_threshold(&path, TraceLevel::Debug, BIG).with_opener(open_read_only);

        logger.error(&[&"rejected"]);

        assert_eq!(fs::read_to_string(&path).unwrap(), "A\nB\n");
        assert_eq!(
            fs::read_to_string(logger.rotator().view_path()).unwrap(),
            "B\nA\n"
        );
    }

    #[test]
    fn test_close_failure_still_rotates() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("error.log");
        let logger =
            Logger::with_threshold(&path, TraceLevel::Debug, BIG).with_opener(open_flush_fails);

        logger.info(&[&"first"]);
        logger.info(&[&"second"]);

        let view = lines(logger.rotator().view_path());
        assert_eq!(view.len(), 2);
        assert!(view[0].ends_with("][Info][second]"));
        assert!(view[1].ends_with("][Info][first]"));
    }

    #[test]
    fn test_close_failure_still_archives() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("error.log");
        let logger =
            Logger::with_threshold(&path, TraceLevel::Debug, 1).with_opener(open_flush_fails);

        logger.error(&[&"over the limit"]);

        assert!(!path.exists());
        let archives = logger.rotator().list_archives().unwrap();
        assert_eq!(archives.len(), 1);
        assert!(lines(&archives[0])[0].ends_with("][Error][over the limit]"));
    }

    /// Runs only when re-executed by `run_fatal_child`
    #[test]
    fn fatal_child_process() {
        if let Ok(path) = std::env::var("VIEWLOG_FATAL_CHILD_LOG") {
            let level = std::env::var("VIEWLOG_FATAL_CHILD_LEVEL")
                .ok()
                .and_then(|l| l.parse().ok())
                .unwrap_or(TraceLevel::Debug);
            let logger = Logger::with_threshold(path, level, BIG);
            logger.info(&[&"before"]);
            logger.fatal(&[&"unrecoverable", &"state"]);
        }
    }

    fn run_fatal_child(path: &Path, level: TraceLevel) -> std::process::ExitStatus {
        std::process::Command::new(std::env::current_exe().unwrap())
            .args([
                "logging::logger::tests::fatal_child_process",
                "--exact",
                "--nocapture",
                "--test-threads=1",
            ])
            .env("VIEWLOG_FATAL_CHILD_LOG", path)
            .env("VIEWLOG_FATAL_CHILD_LEVEL", level.to_string())
            .status()
            .unwrap()
    }

    #[test]
    fn test_fatal_exits_with_status_one() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("error.log");

        let status = run_fatal_child(&path, TraceLevel::Debug);

        assert_eq!(status.code(), Some(FATAL_EXIT_CODE));
        let written = lines(&path);
        assert_eq!(written.len(), 2);
        assert!(written[0].ends_with("][Info][before]"));
        assert!(written[1].ends_with("][Fatal][unrecoverable, state]"));
        assert_eq!(
            lines(&view_of(&path)),
            written.iter().rev().cloned().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_fatal_written_above_warning_threshold() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("error.log");

        let status = run_fatal_child(&path, TraceLevel::Warning);

        assert_eq!(status.code(), Some(FATAL_EXIT_CODE));
        let written = lines(&path);
        assert_eq!(written.len(), 1);
        assert!(written[0].ends_with("][Fatal][unrecoverable, state]"));
        assert_eq!(lines(&view_of(&path)), written);
    }

    fn view_of(path: &Path) -> PathBuf {
        crate::logging::rotation::view_path_for(path)
    }
}
