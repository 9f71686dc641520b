use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::{error, info};

use super::classifier::Classifier;
use super::error::ClassifierError;
use crate::instance::{parse_instance, validate_features, Instance, InstanceFormat};
use crate::knn::{MemoryBasedModel, Weighting};

/// A builder for constructing a Classifier with a fluent interface.
///
/// Collects training instances, validates them against the chosen record
/// format, then trains the memory-based model and splits off the detached
/// clone template in [`ClassifierBuilder::build`].
#[derive(Debug)]
pub struct ClassifierBuilder {
    format: InstanceFormat,
    weighting: Weighting,
    k: usize,
    instances: Vec<Instance>,
}

impl Default for ClassifierBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassifierBuilder {
    /// Creates a new empty ClassifierBuilder with default configuration:
    /// tabbed format, gain-ratio weighting, k = 1.
    pub fn new() -> Self {
        Self {
            format: InstanceFormat::default(),
            weighting: Weighting::default(),
            k: 1,
            instances: Vec::new(),
        }
    }

    /// Sets the record format used for training lines and queries
    pub fn with_format(mut self, format: InstanceFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets the feature weighting scheme computed at build time
    pub fn with_weighting(mut self, weighting: Weighting) -> Self {
        self.weighting = weighting;
        self
    }

    /// Sets the number of nearest distances whose instances get a vote
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    /// Adds a single training instance.
    ///
    /// # Errors
    /// * `ValidationError` if the label is empty, a feature is empty, the
    ///   label or a feature contains the format's delimiter, or the arity
    ///   differs from previously added instances.
    pub fn add_instance(
        mut self,
        features: &[impl AsRef<str>],
        label: &str,
    ) -> Result<Self, ClassifierError> {
        let features: Vec<String> = features.iter().map(|f| f.as_ref().to_string()).collect();
        self.validate_instance(&features, label)?;
        self.instances.push(Instance {
            features,
            label: label.to_string(),
        });
        Ok(self)
    }

    /// Adds all instances from a training file, one instance per line, the
    /// last column being the class label. Empty lines and lines starting
    /// with `#` are skipped.
    pub fn add_instances_from_file<P: AsRef<Path>>(
        mut self,
        path: P,
    ) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            error!("Failed to open training file {}: {}", path.display(), e);
            ClassifierError::BuildError(format!(
                "Failed to open training file {}: {}",
                path.display(),
                e
            ))
        })?;

        let mut added = 0;
        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| {
                ClassifierError::BuildError(format!(
                    "Failed to read {} at line {}: {}",
                    path.display(),
                    line_no + 1,
                    e
                ))
            })?;
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let instance = parse_instance(&line, self.format).ok_or_else(|| {
                ClassifierError::BuildError(format!(
                    "Malformed training line {} in {}",
                    line_no + 1,
                    path.display()
                ))
            })?;
            self.validate_instance(&instance.features, &instance.label)?;
            self.instances.push(instance);
            added += 1;
        }
        info!("Loaded {} instances from {}", added, path.display());
        Ok(self)
    }

    /// Builds and returns the final Classifier instance.
    ///
    /// # Errors
    /// * `BuildError` if no instances were added or training fails
    /// * `CloneError` if the detached clone template cannot be created
    pub fn build(self) -> Result<Classifier, ClassifierError> {
        if self.instances.is_empty() {
            return Err(ClassifierError::BuildError(
                "At least one training instance must be added".to_string(),
            ));
        }

        let num_instances = self.instances.len();
        let model = MemoryBasedModel::train(self.instances, self.format, self.weighting, self.k)?;
        info!(
            "Built classifier: {} instances, weighting {:?}, k {}",
            num_instances, self.weighting, self.k
        );
        Classifier::from_model(model, self.format)
    }

    fn validate_instance(
        &self,
        features: &[String],
        label: &str,
    ) -> Result<(), ClassifierError> {
        if label.is_empty() {
            return Err(ClassifierError::ValidationError(
                "Class label cannot be empty".to_string(),
            ));
        }
        if label.contains(self.format.delimiter()) {
            return Err(ClassifierError::ValidationError(format!(
                "Class label contains the {} delimiter: {:?}",
                self.format, label
            )));
        }
        if features.is_empty() {
            return Err(ClassifierError::ValidationError(
                "Instance must have at least one feature".to_string(),
            ));
        }
        if let Some(pos) = features.iter().position(|f| f.is_empty()) {
            return Err(ClassifierError::ValidationError(format!(
                "Feature {} cannot be empty",
                pos + 1
            )));
        }
        if let Err(pos) = validate_features(features, self.format) {
            return Err(ClassifierError::ValidationError(format!(
                "Feature {} contains the {} delimiter: {:?}",
                pos + 1,
                self.format,
                features[pos]
            )));
        }
        if let Some(first) = self.instances.first() {
            if features.len() != first.features.len() {
                return Err(ClassifierError::ValidationError(format!(
                    "Instance has {} features, expected {}",
                    features.len(),
                    first.features.len()
                )));
            }
        }
        Ok(())
    }
}
