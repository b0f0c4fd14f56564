// lib/src/metrics/metrics_recorder.rs
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use log::{debug, error, info, warn};
use models::errors::{LedgerError, LedgerResult};
use serde::{Deserialize, Serialize};

use crate::config::MetricsConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub value: f64,
    /// Unix milliseconds.
    pub timestamp: i64,
}

pub type MetricSeries = BTreeMap<String, Vec<MetricSample>>;

#[derive(Debug, Default)]
struct RecorderState {
    series: MetricSeries,
    unflushed: usize,
    generation: u64,
    closed: bool,
}

/// Serialized series taken under the state lock and written after it is
/// released. Generations only grow, so a stale snapshot never overwrites a
/// newer file.
#[derive(Debug)]
struct Snapshot {
    generation: u64,
    samples: usize,
    json: String,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Writes `snapshot` to `path` via a temp file and rename. `written` holds the
/// last generation on disk and serializes writers.
fn write_snapshot(path: &Path, written: &Mutex<u64>, snapshot: Snapshot) -> LedgerResult<()> {
    let mut last = lock(written);
    if *last >= snapshot.generation {
        debug!("Skipping stale metrics snapshot {}", snapshot.generation);
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, snapshot.json)?;
    fs::rename(&tmp_path, path)?;
    *last = snapshot.generation;
    debug!("Flushed {} metric samples to {:?}", snapshot.samples, path);
    Ok(())
}

/// Append-only log of named numeric observations.
///
/// Created once at startup and handed to whoever records. Samples are kept in
/// memory and written to `path` on `flush`, on `close`, and every
/// `flush_every` samples when that is non-zero. Periodic writes run on the
/// blocking pool when a tokio runtime is available, so `record` never waits
/// on the disk.
#[derive(Debug)]
pub struct MetricsRecorder {
    path: Option<PathBuf>,
    flush_every: usize,
    state: Mutex<RecorderState>,
    written: Arc<Mutex<u64>>,
}

impl MetricsRecorder {
    /// Recorder without a backing file.
    pub fn in_memory() -> Self {
        MetricsRecorder {
            path: None,
            flush_every: 0,
            state: Mutex::new(RecorderState::default()),
            written: Arc::new(Mutex::new(0)),
        }
    }

    /// Opens `path`, loading any samples already there.
    pub fn open(path: impl Into<PathBuf>, flush_every: usize) -> LedgerResult<Self> {
        let path = path.into();
        let series = Self::load_series(&path)?;
        info!("Metrics recorder opened at {:?} with {} series", path, series.len());
        Ok(MetricsRecorder {
            path: Some(path),
            flush_every,
            state: Mutex::new(RecorderState { series, ..Default::default() }),
            written: Arc::new(Mutex::new(0)),
        })
    }

    pub fn from_config(config: &MetricsConfig) -> LedgerResult<Self> {
        match &config.file {
            Some(path) => Self::open(path, config.flush_interval_records),
            None => Ok(Self::in_memory()),
        }
    }

    /// Reads a series file. A missing or empty file is an empty series.
    pub fn load_series(path: &Path) -> LedgerResult<MetricSeries> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(MetricSeries::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(MetricSeries::new());
        }
        serde_json::from_str(&content).map_err(|e| {
            LedgerError::Serialization(format!("Invalid metrics file {}: {}", path.display(), e))
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn state(&self) -> MutexGuard<'_, RecorderState> {
        lock(&self.state)
    }

    /// Appends a sample. Non-finite values are dropped. Returns whether the
    /// sample was kept.
    pub fn record(&self, name: &str, value: f64) -> bool {
        if !value.is_finite() {
            debug!("Dropping non-finite sample for {}", name);
            return false;
        }
        let mut state = self.state();
        if state.closed {
            warn!("Metrics recorder closed, dropping sample for {}", name);
            return false;
        }
        state.series.entry(name.to_string()).or_default().push(MetricSample {
            value,
            timestamp: Utc::now().timestamp_millis(),
        });
        state.unflushed += 1;

        if self.flush_every > 0 && state.unflushed >= self.flush_every {
            let snapshot = self.snapshot(&mut state);
            drop(state);
            match snapshot {
                Ok(Some(snapshot)) => self.write_in_background(snapshot),
                Ok(None) => {}
                Err(e) => error!("Periodic metrics flush failed: {}", e),
            }
        }
        true
    }

    pub fn read_all(&self) -> MetricSeries {
        self.state().series.clone()
    }

    /// Writes every sample recorded so far. Blocks on file IO.
    pub fn flush(&self) -> LedgerResult<()> {
        let snapshot = self.snapshot(&mut self.state())?;
        self.write_now(snapshot)
    }

    /// Flushes and stops accepting samples. Blocks on file IO.
    pub fn close(&self) -> LedgerResult<()> {
        let snapshot = {
            let mut state = self.state();
            if state.closed {
                return Ok(());
            }
            state.closed = true;
            self.snapshot(&mut state)?
        };
        self.write_now(snapshot)?;
        info!("Metrics recorder closed");
        Ok(())
    }

    /// `None` when there is no backing file.
    fn snapshot(&self, state: &mut RecorderState) -> LedgerResult<Option<Snapshot>> {
        let samples = std::mem::take(&mut state.unflushed);
        if self.path.is_none() {
            return Ok(None);
        }
        let json = serde_json::to_string_pretty(&state.series)?;
        state.generation += 1;
        Ok(Some(Snapshot { generation: state.generation, samples, json }))
    }

    fn write_now(&self, snapshot: Option<Snapshot>) -> LedgerResult<()> {
        match (&self.path, snapshot) {
            (Some(path), Some(snapshot)) => write_snapshot(path, &self.written, snapshot),
            _ => Ok(()),
        }
    }

    fn write_in_background(&self, snapshot: Snapshot) {
        let Some(path) = self.path.clone() else {
            return;
        };
        let written = Arc::clone(&self.written);
        let write = move || {
            if let Err(e) = write_snapshot(&path, &written, snapshot) {
                error!("Periodic metrics flush failed: {}", e);
            }
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(write);
            }
            Err(_) => write(),
        }
    }
}
