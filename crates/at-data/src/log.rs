//! Per-experiment log stream mirrored to the console through `tracing`.

use chrono::Local;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use at_types::TuneResult;

pub const LOG_FILE_NAME: &str = "log.txt";

/// Human-readable progress log for one component of an experiment.
///
/// Lines are emitted as `tracing` events carrying a `component` field and
/// appended to `<dir>/log.txt` as `[component HH:MM:SS] message`.
#[derive(Debug)]
pub struct RunLogger {
    component: String,
    path: Option<PathBuf>,
    file: Option<Mutex<File>>,
}

impl RunLogger {
    /// Logger that appends to `dir/log.txt`, creating the directory if needed.
    pub fn open<P: AsRef<Path>>(component: impl Into<String>, dir: P) -> TuneResult<Self> {
        let component = component.into();
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let path = dir.join(LOG_FILE_NAME);
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(file, "=== Log started for {component} ===")?;

        Ok(Self {
            component,
            path: Some(path),
            file: Some(Mutex::new(file)),
        })
    }

    /// Console-only logger.
    pub fn console(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            path: None,
            file: None,
        }
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn log(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        info!(component = %self.component, "{message}");
        self.append(message);
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        warn!(component = %self.component, "{message}");
        self.append(message);
    }

    fn append(&self, message: &str) {
        let Some(file) = &self.file else {
            return;
        };
        let line = format!(
            "[{} {}] {}\n",
            self.component,
            Local::now().format("%H:%M:%S"),
            message
        );
        // The log file is a convenience mirror; losing a line must not stop a run.
        if let Err(e) = file.lock().write_all(line.as_bytes()) {
            warn!(component = %self.component, error = %e, "failed to append to run log");
        }
    }
}
