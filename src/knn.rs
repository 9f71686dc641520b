use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use crate::classifier::ClassifierError;
use crate::distribution::ClassDistribution;
use crate::instance::{parse_query, Instance, InstanceFormat};
use crate::model::{Model, ModelMatch};

/// Feature weighting scheme applied to the overlap metric at training time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weighting {
    /// All features weigh 1.0
    None,
    /// Information gain: entropy reduction per feature
    InformationGain,
    /// Information gain divided by the feature's split info
    GainRatio,
}

impl Default for Weighting {
    fn default() -> Self {
        Weighting::GainRatio
    }
}

/// Metadata about the most recent lookup, written by `classify`.
///
/// This per-call bookkeeping is the reason a model is cloned per thread
/// instead of shared behind a reference.
#[derive(Debug, Clone)]
pub struct LastMatch {
    pub neighbour: Instance,
    pub distance: f64,
    pub match_depth: usize,
}

/// A trained memory-based (k-nearest-neighbour) model.
///
/// The instance base is stored verbatim and shared immutably between clones;
/// feature weights and lookup bookkeeping are owned per clone. Lookup uses
/// the weighted overlap metric: the distance between two instances is the sum
/// of the weights of the features on which they disagree.
#[derive(Debug)]
pub struct MemoryBasedModel {
    instances: Arc<Vec<Instance>>,
    weights: Vec<f64>,
    /// Feature indices in descending weight order; drives match-depth counting
    feature_order: Vec<usize>,
    k: usize,
    format: InstanceFormat,
    arity: usize,
    weighting: Weighting,
    last_match: Option<LastMatch>,
}

impl MemoryBasedModel {
    /// Trains a model over `instances`.
    ///
    /// All instances must share the same arity. `k` is the number of nearest
    /// *distances* considered: every instance at one of the `k` smallest
    /// distances gets a vote, so more than `k` instances may contribute.
    pub fn train(
        instances: Vec<Instance>,
        format: InstanceFormat,
        weighting: Weighting,
        k: usize,
    ) -> Result<Self, ClassifierError> {
        if instances.is_empty() {
            return Err(ClassifierError::BuildError(
                "Cannot train on an empty instance base".to_string(),
            ));
        }
        if k == 0 {
            return Err(ClassifierError::BuildError(
                "k must be at least 1".to_string(),
            ));
        }
        let arity = instances[0].features.len();
        if arity == 0 {
            return Err(ClassifierError::BuildError(
                "Instances must have at least one feature".to_string(),
            ));
        }
        if let Some(pos) = instances.iter().position(|i| i.features.len() != arity) {
            return Err(ClassifierError::BuildError(format!(
                "Instance {} has {} features, expected {}",
                pos,
                instances[pos].features.len(),
                arity
            )));
        }

        let weights = compute_weights(&instances, arity, weighting);
        let mut feature_order: Vec<usize> = (0..arity).collect();
        feature_order.sort_by(|&a, &b| {
            weights[b]
                .partial_cmp(&weights[a])
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });
        debug!(
            "Trained memory-based model: {} instances, arity {}, weighting {:?}",
            instances.len(),
            arity,
            weighting
        );

        Ok(Self {
            instances: Arc::new(instances),
            weights,
            feature_order,
            k,
            format,
            arity,
            weighting,
            last_match: None,
        })
    }

    pub fn num_instances(&self) -> usize {
        self.instances.len()
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn format(&self) -> InstanceFormat {
        self.format
    }

    pub fn weighting(&self) -> Weighting {
        self.weighting
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// The distinct class labels in the instance base, in first-seen order.
    pub fn class_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = Vec::new();
        for instance in self.instances.iter() {
            if !labels.iter().any(|l| l == &instance.label) {
                labels.push(instance.label.clone());
            }
        }
        labels
    }

    /// Metadata about the most recent `classify` call on this model value.
    pub fn last_match(&self) -> Option<&LastMatch> {
        self.last_match.as_ref()
    }

    /// Iterates the instance base (used by persistence).
    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    fn overlap_distance(&self, query: &[String], instance: &Instance) -> f64 {
        let mut distance = 0.0;
        for (i, feature) in query.iter().enumerate() {
            if feature != &instance.features[i] {
                distance += self.weights[i];
            }
        }
        distance
    }

    fn match_depth(&self, query: &[String], instance: &Instance) -> usize {
        let mut depth = 0;
        for &i in &self.feature_order {
            if query[i] == instance.features[i] {
                depth += 1;
            } else {
                break;
            }
        }
        depth
    }
}

impl Model for MemoryBasedModel {
    fn classify(&mut self, line: &str) -> Result<Option<ModelMatch>, ClassifierError> {
        let query = match parse_query(line, self.arity, self.format) {
            Some(query) => query,
            None => return Ok(None),
        };

        let mut ranked: Vec<(f64, usize)> = self
            .instances
            .iter()
            .enumerate()
            .map(|(idx, instance)| (self.overlap_distance(&query, instance), idx))
            .collect();
        ranked.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });

        // All instances at the k smallest distinct distances vote.
        let mut distribution = ClassDistribution::new();
        let mut distances_seen = 0;
        let mut previous_distance = f64::NEG_INFINITY;
        for &(distance, idx) in &ranked {
            if distance > previous_distance {
                distances_seen += 1;
                if distances_seen > self.k {
                    break;
                }
                previous_distance = distance;
            }
            distribution.add(&self.instances[idx].label, 1.0);
        }

        let (nearest_distance, nearest_idx) = ranked[0];
        let nearest = &self.instances[nearest_idx];
        // The vote loop always includes the nearest neighbour, so the
        // distribution holds at least its label.
        let label = distribution
            .best_label()
            .unwrap_or(&nearest.label)
            .to_string();
        let match_depth = self.match_depth(&query, nearest);

        self.last_match = Some(LastMatch {
            neighbour: nearest.clone(),
            distance: nearest_distance,
            match_depth,
        });

        Ok(Some(ModelMatch {
            label,
            distribution,
            distance: nearest_distance,
            match_depth,
        }))
    }

    fn try_clone(&self) -> Result<Self, ClassifierError> {
        // The instance base is shared immutably; everything mutable is
        // copied by value.
        Ok(Self {
            instances: Arc::clone(&self.instances),
            weights: self.weights.clone(),
            feature_order: self.feature_order.clone(),
            k: self.k,
            format: self.format,
            arity: self.arity,
            weighting: self.weighting,
            last_match: self.last_match.clone(),
        })
    }
}

fn compute_weights(instances: &[Instance], arity: usize, weighting: Weighting) -> Vec<f64> {
    match weighting {
        Weighting::None => vec![1.0; arity],
        Weighting::InformationGain => (0..arity)
            .map(|f| information_gain(instances, f).0)
            .collect(),
        Weighting::GainRatio => (0..arity)
            .map(|f| {
                let (gain, split_info) = information_gain(instances, f);
                if split_info > 0.0 {
                    gain / split_info
                } else {
                    0.0
                }
            })
            .collect(),
    }
}

/// Returns `(information gain, split info)` for feature `f`.
fn information_gain(instances: &[Instance], f: usize) -> (f64, f64) {
    let total = instances.len() as f64;

    let mut class_counts: HashMap<&str, usize> = HashMap::new();
    let mut value_counts: HashMap<&str, usize> = HashMap::new();
    let mut value_class_counts: HashMap<&str, HashMap<&str, usize>> = HashMap::new();
    for instance in instances {
        *class_counts.entry(instance.label.as_str()).or_insert(0) += 1;
        let value = instance.features[f].as_str();
        *value_counts.entry(value).or_insert(0) += 1;
        *value_class_counts
            .entry(value)
            .or_default()
            .entry(instance.label.as_str())
            .or_insert(0) += 1;
    }

    let class_entropy = entropy(class_counts.values().copied(), total);

    let mut conditional_entropy = 0.0;
    let mut split_info = 0.0;
    for (value, count) in &value_counts {
        let p = *count as f64 / total;
        conditional_entropy +=
            p * entropy(value_class_counts[value].values().copied(), *count as f64);
        split_info -= p * p.log2();
    }

    (class_entropy - conditional_entropy, split_info)
}

fn entropy(counts: impl Iterator<Item = usize>, total: f64) -> f64 {
    counts
        .map(|c| {
            let p = c as f64 / total;
            -p * p.log2()
        })
        .sum()
}
