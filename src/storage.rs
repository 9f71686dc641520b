use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::instance::{join_instance, parse_instance, validate_features, Instance, InstanceFormat};
use crate::knn::{MemoryBasedModel, Weighting};

/// Default number of buffered instances before a training set flushes to disk
pub const DEFAULT_FLUSH_THRESHOLD: usize = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Malformed line {line} in {path}")]
    ParseError { path: String, line: usize },
    #[error("File not found: {0}. Did you train and save the classifier first?")]
    NotFound(String),
    #[error("Invalid instance: {0}")]
    InvalidInstance(String),
}

/// A buffered, append-only training set backed by `<prefix>.train`.
///
/// Instances accumulate in memory and are flushed once the threshold is
/// reached, or explicitly via [`TrainingSet::flush`]. With `overwrite` set
/// and an existing train file, the first flush truncates it; subsequent
/// flushes always append.
#[derive(Debug)]
pub struct TrainingSet {
    prefix: PathBuf,
    format: InstanceFormat,
    flush_threshold: usize,
    pending: Vec<Instance>,
    flushed: bool,
}

impl TrainingSet {
    pub fn new<P: AsRef<Path>>(prefix: P, format: InstanceFormat, overwrite: bool) -> Self {
        let prefix = prefix.as_ref().to_path_buf();
        let train_path = Self::train_path_for(&prefix);
        // An existing file we are not allowed to overwrite counts as
        // already-flushed, so new instances append to it.
        let flushed = !overwrite && train_path.exists();
        Self {
            prefix,
            format,
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            pending: Vec::new(),
            flushed,
        }
    }

    pub fn with_flush_threshold(mut self, threshold: usize) -> Self {
        self.flush_threshold = threshold.max(1);
        self
    }

    pub fn train_path(&self) -> PathBuf {
        Self::train_path_for(&self.prefix)
    }

    fn train_path_for(prefix: &Path) -> PathBuf {
        let mut path = prefix.as_os_str().to_os_string();
        path.push(".train");
        PathBuf::from(path)
    }

    /// Buffers one training instance, flushing if the threshold is reached.
    pub fn append(
        &mut self,
        features: &[impl AsRef<str>],
        label: &str,
    ) -> Result<(), StorageError> {
        let features: Vec<String> = features.iter().map(|f| f.as_ref().to_string()).collect();
        if label.is_empty() || label.contains(self.format.delimiter()) {
            return Err(StorageError::InvalidInstance(format!(
                "Bad class label {:?}",
                label
            )));
        }
        if let Err(pos) = validate_features(&features, self.format) {
            return Err(StorageError::InvalidInstance(format!(
                "Feature {} contains the delimiter: {:?}",
                pos + 1,
                features[pos]
            )));
        }
        self.pending.push(Instance {
            features,
            label: label.to_string(),
        });
        if self.pending.len() >= self.flush_threshold {
            self.flush()?;
        }
        Ok(())
    }

    /// Writes all buffered instances to the train file. Returns `false` when
    /// there was nothing to write.
    pub fn flush(&mut self) -> Result<bool, StorageError> {
        if self.pending.is_empty() {
            return Ok(false);
        }
        let path = self.train_path();
        debug!("Flushing {} instances to {}", self.pending.len(), path.display());

        let file = OpenOptions::new()
            .create(true)
            .append(self.flushed)
            .write(true)
            .truncate(!self.flushed)
            .open(&path)?;
        let mut writer = BufWriter::new(file);
        for instance in &self.pending {
            writeln!(
                writer,
                "{}",
                join_instance(&instance.features, &instance.label, self.format)
            )?;
        }
        writer.flush()?;
        self.flushed = true;
        self.pending.clear();
        Ok(true)
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

/// Saves a trained model as `<prefix>.ibase` (the instance base, one instance
/// per line) and `<prefix>.wgt` (the feature weight table).
pub fn save_model<P: AsRef<Path>>(model: &MemoryBasedModel, prefix: P) -> Result<(), StorageError> {
    let prefix = prefix.as_ref();
    let ibase_path = with_extension(prefix, "ibase");
    let wgt_path = with_extension(prefix, "wgt");

    let mut ibase = BufWriter::new(File::create(&ibase_path)?);
    for instance in model.instances() {
        writeln!(
            ibase,
            "{}",
            join_instance(&instance.features, &instance.label, model.format())
        )?;
    }
    ibase.flush()?;

    let mut wgt = BufWriter::new(File::create(&wgt_path)?);
    writeln!(wgt, "# Feature weights ({:?})", model.weighting())?;
    for (i, weight) in model.weights().iter().enumerate() {
        writeln!(wgt, "{}\t{}", i + 1, weight)?;
    }
    wgt.flush()?;

    info!(
        "Saved model: {} instances to {}, {} weights to {}",
        model.num_instances(),
        ibase_path.display(),
        model.weights().len(),
        wgt_path.display()
    );
    Ok(())
}

/// Rebuilds a model from `<prefix>.ibase`, recomputing weights with the given
/// scheme. The `.wgt` file is advisory output for inspection; weights are
/// derived from the instance base itself, which keeps the two from drifting
/// apart.
pub fn load_model<P: AsRef<Path>>(
    prefix: P,
    format: InstanceFormat,
    weighting: Weighting,
    k: usize,
) -> Result<MemoryBasedModel, StorageError> {
    let prefix = prefix.as_ref();
    let ibase_path = with_extension(prefix, "ibase");
    if !ibase_path.exists() {
        return Err(StorageError::NotFound(ibase_path.display().to_string()));
    }

    let instances = read_instances(&ibase_path, format)?;
    MemoryBasedModel::train(instances, format, weighting, k)
        .map_err(|e| StorageError::InvalidInstance(e.to_string()))
}

/// Reads an instance file (train or ibase), skipping blanks and `#` comments.
pub fn read_instances<P: AsRef<Path>>(
    path: P,
    format: InstanceFormat,
) -> Result<Vec<Instance>, StorageError> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut instances = Vec::new();
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let instance = parse_instance(&line, format).ok_or_else(|| StorageError::ParseError {
            path: path.display().to_string(),
            line: line_no + 1,
        })?;
        instances.push(instance);
    }
    Ok(instances)
}

fn with_extension(prefix: &Path, extension: &str) -> PathBuf {
    let mut path = prefix.as_os_str().to_os_string();
    path.push(".");
    path.push(extension);
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Model;
    use std::fs;

    fn temp_prefix(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("hippocampus-storage-test");
        fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    #[test]
    fn test_append_and_flush() -> Result<(), StorageError> {
        let prefix = temp_prefix("flush");
        let mut set = TrainingSet::new(&prefix, InstanceFormat::Columns, true);
        assert!(!set.flush()?);

        set.append(&["sunny", "hot"], "play")?;
        set.append(&["rainy", "cold"], "stay")?;
        assert_eq!(set.pending(), 2);
        assert!(set.flush()?);
        assert_eq!(set.pending(), 0);

        let contents = fs::read_to_string(set.train_path())?;
        assert_eq!(contents, "sunny hot play\nrainy cold stay\n");
        Ok(())
    }

    #[test]
    fn test_threshold_triggers_flush() -> Result<(), StorageError> {
        let prefix = temp_prefix("threshold");
        let mut set =
            TrainingSet::new(&prefix, InstanceFormat::Columns, true).with_flush_threshold(2);
        set.append(&["a"], "x")?;
        assert_eq!(set.pending(), 1);
        set.append(&["b"], "y")?;
        // Threshold reached, buffer written out
        assert_eq!(set.pending(), 0);
        assert!(set.train_path().exists());
        Ok(())
    }

    #[test]
    fn test_overwrite_truncates_on_first_flush() -> Result<(), StorageError> {
        let prefix = temp_prefix("overwrite");
        let mut set = TrainingSet::new(&prefix, InstanceFormat::Columns, true);
        set.append(&["old"], "x")?;
        set.flush()?;

        let mut set = TrainingSet::new(&prefix, InstanceFormat::Columns, true);
        set.append(&["new"], "y")?;
        set.flush()?;
        assert_eq!(fs::read_to_string(set.train_path())?, "new y\n");

        // Second flush of the same set appends
        set.append(&["more"], "z")?;
        set.flush()?;
        assert_eq!(fs::read_to_string(set.train_path())?, "new y\nmore z\n");
        Ok(())
    }

    #[test]
    fn test_append_rejects_delimiter() {
        let prefix = temp_prefix("reject");
        let mut set = TrainingSet::new(&prefix, InstanceFormat::Columns, true);
        assert!(matches!(
            set.append(&["two words"], "x"),
            Err(StorageError::InvalidInstance(_))
        ));
        assert!(matches!(
            set.append(&["ok"], "bad label"),
            Err(StorageError::InvalidInstance(_))
        ));
    }

    #[test]
    fn test_save_and_load_round_trip() -> Result<(), Box<dyn std::error::Error>> {
        let prefix = temp_prefix("roundtrip");
        let instances = vec![
            Instance {
                features: vec!["sunny".into(), "hot".into()],
                label: "play".into(),
            },
            Instance {
                features: vec!["rainy".into(), "cold".into()],
                label: "stay".into(),
            },
        ];
        let model =
            MemoryBasedModel::train(instances, InstanceFormat::Columns, Weighting::GainRatio, 1)?;
        save_model(&model, &prefix)?;

        let mut loaded = load_model(&prefix, InstanceFormat::Columns, Weighting::GainRatio, 1)?;
        assert_eq!(loaded.num_instances(), model.num_instances());
        assert_eq!(loaded.weights(), model.weights());
        let result = loaded.classify("sunny hot ?")?.unwrap();
        assert_eq!(result.label, "play");
        Ok(())
    }

    #[test]
    fn test_load_missing_prefix() {
        let prefix = temp_prefix("missing");
        assert!(matches!(
            load_model(&prefix, InstanceFormat::Columns, Weighting::GainRatio, 1),
            Err(StorageError::NotFound(_))
        ));
    }
}
