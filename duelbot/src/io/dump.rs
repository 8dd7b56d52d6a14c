//! Stuck-dialog diagnostics written under the dump directory.
//!
//! Dumps are product artifacts: they are written whenever an episode gets
//! stuck, independent of `RUST_LOG`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::core::dialog::StuckDump;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DumpRecord {
    pub captured_at: DateTime<Utc>,
    pub deck: String,
    pub turn: Option<u32>,
    pub dump: StuckDump,
}

/// Destination for stuck-dialog diagnostics.
pub trait DumpSink {
    fn collect(&self, record: &DumpRecord) -> Result<()>;
}

/// Writes one pretty-printed JSON file per record.
#[derive(Debug)]
pub struct FsDumpSink {
    dir: PathBuf,
    written: AtomicU32,
}

impl FsDumpSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            written: AtomicU32::new(0),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, record: &DumpRecord, seq: u32) -> PathBuf {
        let stamp = record.captured_at.format("%Y%m%dT%H%M%S%.3fZ");
        self.dir.join(format!("dialog-stuck-{stamp}-{seq:03}.json"))
    }
}

impl DumpSink for FsDumpSink {
    fn collect(&self, record: &DumpRecord) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create dump dir {}", self.dir.display()))?;
        let seq = self.written.fetch_add(1, Ordering::Relaxed);
        let path = self.path_for(record, seq);
        write_json(&path, record)?;
        info!(path = %path.display(), reason = %record.dump.reason, "wrote stuck dialog dump");
        Ok(())
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut payload = serde_json::to_string_pretty(value).context("serialize dump json")?;
    payload.push('\n');
    fs::write(path, payload).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}
