//! File-Backed Sink and Dataset Loader
//!
//! Feature vectors go to `<LABEL>_<unix-ms>.features.jsonl`, one JSON record
//! per line. Raw windows go to `<LABEL>_<unix-ms>.windows.bin` as postcard
//! frames, each prefixed with its length as a little-endian `u32`.

use crate::records::{now_ms, Dataset, FeatureRecord, WindowRecord};
use crate::{FeatureSink, StoreError};
use classifier::{FeatureArray, ModType};
use num_complex::Complex64;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const FEATURE_SUFFIX: &str = ".features.jsonl";
const WINDOW_SUFFIX: &str = ".windows.bin";

/// Open capture session
struct Session {
    label: ModType,
    stem: String,
    features: BufWriter<File>,
    windows: Option<BufWriter<File>>,
    records_written: usize,
    windows_written: usize,
}

/// Sink writing one pair of files per session into a directory
pub struct FeatureFileWriter {
    dir: PathBuf,
    session: Option<Session>,
}

impl FeatureFileWriter {
    /// Create a writer targeting `dir` (created on first session)
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            session: None,
        }
    }

    /// Directory sessions are written to
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the current session's feature file
    pub fn features_path(&self) -> Option<PathBuf> {
        self.session
            .as_ref()
            .map(|s| self.dir.join(format!("{}{}", s.stem, FEATURE_SUFFIX)))
    }

    /// Path of the current session's window file
    pub fn windows_path(&self) -> Option<PathBuf> {
        self.session
            .as_ref()
            .map(|s| self.dir.join(format!("{}{}", s.stem, WINDOW_SUFFIX)))
    }

    fn open_append(path: &Path) -> Result<BufWriter<File>, StoreError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(BufWriter::new(file))
    }

    fn session_mut(&mut self) -> Result<&mut Session, StoreError> {
        self.session.as_mut().ok_or(StoreError::NotStarted)
    }
}

impl FeatureSink for FeatureFileWriter {
    fn start(&mut self, label: ModType) -> Result<(), StoreError> {
        if self.session.is_some() {
            self.stop()?;
        }
        fs::create_dir_all(&self.dir)?;

        let stem = format!("{}_{}", label.as_str(), now_ms());
        let features = Self::open_append(&self.dir.join(format!("{}{}", stem, FEATURE_SUFFIX)))?;
        info!("Opened capture session {} in {}", stem, self.dir.display());

        self.session = Some(Session {
            label,
            stem,
            features,
            windows: None,
            records_written: 0,
            windows_written: 0,
        });
        Ok(())
    }

    fn stop(&mut self) -> Result<(), StoreError> {
        if let Some(mut session) = self.session.take() {
            session.features.flush()?;
            if let Some(windows) = session.windows.as_mut() {
                windows.flush()?;
            }
            info!(
                "Closed capture session {} ({}): {} feature records, {} windows",
                session.stem, session.label, session.records_written, session.windows_written
            );
        }
        Ok(())
    }

    fn write_features(&mut self, label: ModType, features: &FeatureArray) -> Result<(), StoreError> {
        let session = self.session_mut()?;
        let record = FeatureRecord {
            label,
            timestamp_ms: now_ms(),
            features: *features,
        };
        serde_json::to_writer(&mut session.features, &record)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        session.features.write_all(b"\n")?;
        session.records_written += 1;
        Ok(())
    }

    fn write_window(&mut self, label: ModType, window: &[Complex64]) -> Result<(), StoreError> {
        let dir = self.dir.clone();
        let session = self.session_mut()?;
        if session.windows.is_none() {
            let path = dir.join(format!("{}{}", session.stem, WINDOW_SUFFIX));
            session.windows = Some(Self::open_append(&path)?);
        }

        let record = WindowRecord::new(label, window);
        let bytes = postcard::to_allocvec(&record).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let len = u32::try_from(bytes.len())
            .map_err(|_| StoreError::Serialization(format!("window frame too large: {} bytes", bytes.len())))?;

        if let Some(writer) = session.windows.as_mut() {
            writer.write_all(&len.to_le_bytes())?;
            writer.write_all(&bytes)?;
        }
        session.windows_written += 1;
        Ok(())
    }

    fn is_started(&self) -> bool {
        self.session.is_some()
    }
}

impl Drop for FeatureFileWriter {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("Failed to close capture session on drop: {}", e);
        }
    }
}

/// Read every parsable record from one feature file.
///
/// Returns the records and the number of lines skipped.
pub fn read_feature_file(path: &Path) -> Result<(Vec<FeatureRecord>, usize), StoreError> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    let mut skipped = 0;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<FeatureRecord>(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                debug!("Skipping {}:{}: {}", path.display(), line_no + 1, e);
                skipped += 1;
            }
        }
    }
    Ok((records, skipped))
}

/// Load every `*.features.jsonl` file in `dir` into one dataset
pub fn load_dataset(dir: &Path) -> Result<Dataset, StoreError> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .map_or(false, |name| name.ends_with(FEATURE_SUFFIX))
        })
        .collect();
    files.sort();

    let mut dataset = Dataset::default();
    for path in &files {
        let (records, skipped) = read_feature_file(path)?;
        debug!("Loaded {} records from {}", records.len(), path.display());
        dataset.skipped += skipped;
        for record in records {
            dataset.push(record);
        }
    }

    if dataset.skipped > 0 {
        warn!("Skipped {} unparsable feature records in {}", dataset.skipped, dir.display());
    }
    info!("Loaded dataset of {} samples from {} files", dataset.len(), files.len());
    Ok(dataset)
}

/// Read every window frame from a `.windows.bin` file
pub fn read_windows(path: &Path) -> Result<Vec<WindowRecord>, StoreError> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    let corrupt = |reason: String| StoreError::Corrupt {
        path: path.display().to_string(),
        reason,
    };

    loop {
        let mut len_bytes = [0u8; 4];
        match reader.read_exact(&mut len_bytes) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }

        let len = u32::from_le_bytes(len_bytes) as usize;
        let mut frame = vec![0u8; len];
        reader
            .read_exact(&mut frame)
            .map_err(|e| corrupt(format!("truncated frame {}: {}", records.len(), e)))?;
        let record: WindowRecord = postcard::from_bytes(&frame).map_err(|e| corrupt(e.to_string()))?;
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(seed: f64) -> FeatureArray {
        let mut f = [0.0; 9];
        for (i, v) in f.iter_mut().enumerate() {
            *v = seed + i as f64;
        }
        f
    }

    #[test]
    fn test_write_requires_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = FeatureFileWriter::new(dir.path());
        let err = writer.write_features(ModType::Fm, &features(0.0)).unwrap_err();
        assert!(matches!(err, StoreError::NotStarted));
        assert!(writer.stop().is_ok());
    }

    #[test]
    fn test_features_round_trip_through_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = FeatureFileWriter::new(dir.path().join("captures"));

        writer.start(ModType::Fm).unwrap();
        writer.write_features(ModType::Fm, &features(1.0)).unwrap();
        writer.write_features(ModType::Fm, &features(2.0)).unwrap();
        let path = writer.features_path().unwrap();
        assert!(path.to_string_lossy().contains("FM_"));
        writer.stop().unwrap();

        writer.start(ModType::Mqam).unwrap();
        writer.write_features(ModType::Mqam, &features(3.0)).unwrap();
        writer.stop().unwrap();

        let dataset = load_dataset(&dir.path().join("captures")).unwrap();
        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.skipped, 0);
        assert!(dataset.responses.contains(&ModType::Fm));
        assert!(dataset.responses.contains(&ModType::Mqam));
        assert!(dataset.samples.contains(&features(2.0)));
    }

    #[test]
    fn test_nan_records_are_skipped_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = FeatureFileWriter::new(dir.path());
        writer.start(ModType::Ask2).unwrap();
        writer.write_features(ModType::Ask2, &features(0.5)).unwrap();
        let mut degenerate = features(0.0);
        degenerate[3] = f64::NAN;
        writer.write_features(ModType::Ask2, &degenerate).unwrap();
        writer.stop().unwrap();

        let dataset = load_dataset(dir.path()).unwrap();
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.skipped, 1);
    }

    #[test]
    fn test_windows_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = FeatureFileWriter::new(dir.path());
        writer.start(ModType::Psk2).unwrap();

        let window: Vec<Complex64> = (0..8).map(|i| Complex64::new(i as f64, -1.0)).collect();
        writer.write_window(ModType::Psk2, &window).unwrap();
        writer.write_window(ModType::Psk2, &window[..4]).unwrap();
        let path = writer.windows_path().unwrap();
        writer.stop().unwrap();

        let records = read_windows(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].label, ModType::Psk2);
        assert_eq!(records[0].to_complex(), window);
        assert_eq!(records[1].samples.len(), 4);
    }

    #[test]
    fn test_truncated_window_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.windows.bin");
        std::fs::write(&path, [16u8, 0, 0, 0, 1, 2]).unwrap();
        assert!(matches!(read_windows(&path), Err(StoreError::Corrupt { .. })));
    }
}
