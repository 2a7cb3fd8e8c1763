//! In-Memory Sink

use crate::records::{now_ms, FeatureRecord, WindowRecord};
use crate::{FeatureSink, StoreError};
use classifier::{FeatureArray, ModType};
use num_complex::Complex64;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

#[derive(Debug, Default)]
struct MemoryState {
    session: Option<ModType>,
    sessions_started: usize,
    features: VecDeque<FeatureRecord>,
    windows: VecDeque<WindowRecord>,
}

/// Sink that keeps records in memory.
///
/// Clones share the same storage, so a test or monitor can keep a handle
/// while the feature engine owns another.
#[derive(Debug, Clone)]
pub struct MemorySink {
    state: Arc<Mutex<MemoryState>>,
    /// Max records of each kind retained
    max_records: usize,
}

impl MemorySink {
    /// Create a sink retaining up to 10,000 records of each kind
    pub fn new() -> Self {
        Self::with_capacity(10_000)
    }

    /// Create a sink with a custom retention limit
    pub fn with_capacity(max_records: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            max_records: max_records.max(1),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state.lock().map_err(|e| StoreError::Lock(e.to_string()))
    }

    /// Snapshot of stored feature records (oldest first)
    pub fn features(&self) -> Vec<FeatureRecord> {
        self.lock().map(|s| s.features.iter().cloned().collect()).unwrap_or_default()
    }

    /// Snapshot of stored window records (oldest first)
    pub fn windows(&self) -> Vec<WindowRecord> {
        self.lock().map(|s| s.windows.iter().cloned().collect()).unwrap_or_default()
    }

    /// Number of stored feature records
    pub fn feature_count(&self) -> usize {
        self.lock().map(|s| s.features.len()).unwrap_or(0)
    }

    /// Number of sessions opened so far
    pub fn sessions_started(&self) -> usize {
        self.lock().map(|s| s.sessions_started).unwrap_or(0)
    }

    /// Label of the open session
    pub fn session_label(&self) -> Option<ModType> {
        self.lock().ok().and_then(|s| s.session)
    }

    /// Clear all data
    pub fn clear(&self) {
        if let Ok(mut state) = self.lock() {
            state.features.clear();
            state.windows.clear();
        }
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureSink for MemorySink {
    fn start(&mut self, label: ModType) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.session = Some(label);
        state.sessions_started += 1;
        debug!("Memory sink session started for {}", label);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), StoreError> {
        self.lock()?.session = None;
        Ok(())
    }

    fn write_features(&mut self, label: ModType, features: &FeatureArray) -> Result<(), StoreError> {
        let max_records = self.max_records;
        let mut state = self.lock()?;
        if state.session.is_none() {
            return Err(StoreError::NotStarted);
        }

        // Enforce retention
        while state.features.len() >= max_records {
            state.features.pop_front();
        }
        state.features.push_back(FeatureRecord {
            label,
            timestamp_ms: now_ms(),
            features: *features,
        });
        Ok(())
    }

    fn write_window(&mut self, label: ModType, window: &[Complex64]) -> Result<(), StoreError> {
        let max_records = self.max_records;
        let mut state = self.lock()?;
        if state.session.is_none() {
            return Err(StoreError::NotStarted);
        }

        while state.windows.len() >= max_records {
            state.windows.pop_front();
        }
        state.windows.push_back(WindowRecord::new(label, window));
        Ok(())
    }

    fn is_started(&self) -> bool {
        self.lock().map(|s| s.session.is_some()).unwrap_or(false)
    }
}
