//! Append-only JSONL outcome sinks
//!
//! Every scan outcome goes to the "all" sink. Live pages (status 200) also
//! go to the "active" sink, everything else to "inactive".

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use onionwatch_core::SinkRecord;

use crate::StoreError;

/// File locations for the three sinks
#[derive(Debug, Clone)]
pub struct SinkPaths {
    pub all: PathBuf,
    pub active: PathBuf,
    pub inactive: PathBuf,
}

impl Default for SinkPaths {
    fn default() -> Self {
        Self::in_dir(Path::new("."))
    }
}

impl SinkPaths {
    /// Default file names under `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            all: dir.join("out.jsonl"),
            active: dir.join("active_onions.jsonl"),
            inactive: dir.join("inactive_onions.jsonl"),
        }
    }
}

/// Which partition a record landed in besides "all"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkRoute {
    Active,
    Inactive,
}

struct JsonlSink {
    path: PathBuf,
    file: File,
}

impl JsonlSink {
    fn open(path: &Path) -> Result<Self, StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| StoreError::io(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    fn append(&mut self, line: &str) -> Result<(), StoreError> {
        self.file
            .write_all(line.as_bytes())
            .map_err(|e| StoreError::io(&self.path, e))
    }
}

/// The three outcome logs
pub struct OutcomeSinks {
    all: JsonlSink,
    active: JsonlSink,
    inactive: JsonlSink,
}

impl OutcomeSinks {
    pub fn open(paths: &SinkPaths) -> Result<Self, StoreError> {
        Ok(Self {
            all: JsonlSink::open(&paths.all)?,
            active: JsonlSink::open(&paths.active)?,
            inactive: JsonlSink::open(&paths.inactive)?,
        })
    }

    /// Append one record to "all" and to its partition
    pub fn write(&mut self, record: &SinkRecord) -> Result<SinkRoute, StoreError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        self.all.append(&line)?;

        if record.is_active() {
            self.active.append(&line)?;
            Ok(SinkRoute::Active)
        } else {
            self.inactive.append(&line)?;
            Ok(SinkRoute::Inactive)
        }
    }
}
