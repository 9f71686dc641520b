use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::warn;
use serde::Serialize;

use super::error::ClassifierError;
use super::ClassifierInfo;
use crate::instance::InstanceFormat;
use crate::knn::MemoryBasedModel;
use crate::model::{Model, ModelMatch};
use crate::pool::ClonePool;

/// Distance reported when no usable neighbour was produced, either because
/// nothing matched or because the match-depth gate rejected the best one.
pub const DISTANCE_SENTINEL: f64 = 999_999.0;

/// The three observably different ways a full classification can end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outcome {
    /// A neighbour was found and passed the depth gate
    Match,
    /// A neighbour was found but matched fewer feature positions than required
    DepthNotMet,
    /// No neighbour: empty or malformed input, or an untrained model
    NoMatch,
}

/// The structured result of a full classification call.
#[derive(Debug, Clone, Serialize)]
pub struct Classification {
    pub outcome: Outcome,
    /// Predicted label; empty unless the outcome is `Match`
    pub label: String,
    /// Label -> score mapping from the distribution codec; empty unless the
    /// outcome is `Match`
    pub scores: HashMap<String, f64>,
    /// Nearest-neighbour distance; [`DISTANCE_SENTINEL`] unless the outcome
    /// is `Match`
    pub distance: f64,
}

impl Classification {
    /// Whether a neighbour was found at all. True for both `Match` and
    /// `DepthNotMet`; use [`Classification::outcome`] to tell them apart.
    pub fn found(&self) -> bool {
        self.outcome != Outcome::NoMatch
    }

    fn matched(label: String, scores: HashMap<String, f64>, distance: f64) -> Self {
        Self {
            outcome: Outcome::Match,
            label,
            scores,
            distance,
        }
    }

    fn depth_not_met() -> Self {
        Self {
            outcome: Outcome::DepthNotMet,
            label: String::new(),
            scores: HashMap::new(),
            distance: DISTANCE_SENTINEL,
        }
    }

    fn no_match() -> Self {
        Self {
            outcome: Outcome::NoMatch,
            label: String::new(),
            scores: HashMap::new(),
            distance: DISTANCE_SENTINEL,
        }
    }
}

/// A memory-based classifier with lock-free concurrent classification.
///
/// # Thread Safety
///
/// [`Classifier::classify_concurrent`] is safe to call from any number of
/// threads at once: each thread classifies on a private clone of the trained
/// model, resolved through a [`ClonePool`] whose lock covers only map
/// bookkeeping. The other classify variants take `&mut self` because they run
/// on the base model directly and write its lookup bookkeeping; the borrow
/// checker therefore rules out mixing them with concurrent classification at
/// compile time.
///
/// Single-thread usage:
/// ```rust
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use hippocampus::{Classifier, InstanceFormat};
///
/// let mut classifier = Classifier::builder()
///     .with_format(InstanceFormat::Columns)
///     .add_instance(&["sunny", "hot", "no"], "play")?
///     .add_instance(&["rainy", "cold", "yes"], "stay")?
///     .build()?;
///
/// let label = classifier.classify("sunny hot no ?")?;
/// assert_eq!(label.as_deref(), Some("play"));
/// # Ok(())
/// # }
/// ```
///
/// Multi-thread usage:
/// ```rust
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use hippocampus::{Classifier, InstanceFormat};
/// use std::sync::Arc;
/// use std::thread;
///
/// let classifier = Arc::new(Classifier::builder()
///     .with_format(InstanceFormat::Columns)
///     .add_instance(&["sunny", "hot", "no"], "play")?
///     .add_instance(&["rainy", "cold", "yes"], "stay")?
///     .build()?);
///
/// let mut handles = vec![];
/// for _ in 0..3 {
///     let classifier = Arc::clone(&classifier);
///     handles.push(thread::spawn(move || {
///         classifier.classify_concurrent("sunny hot no ?", true, 0).unwrap();
///     }));
/// }
///
/// for handle in handles {
///     handle.join().unwrap();
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Classifier<M: Model = MemoryBasedModel> {
    model: M,
    pool: ClonePool<M>,
    format: InstanceFormat,
    in_flight: AtomicUsize,
}

impl<M: Model> Classifier<M> {
    /// Wraps an already-trained model. A detached template for the clone
    /// pool is split off immediately; the wrapped model itself serves the
    /// non-concurrent variants.
    pub fn from_model(model: M, format: InstanceFormat) -> Result<Self, ClassifierError> {
        let template = model.try_clone()?;
        Ok(Self {
            model,
            pool: ClonePool::new(template),
            format,
            in_flight: AtomicUsize::new(0),
        })
    }

    /// Predicts the label for one input line.
    ///
    /// Returns `Ok(None)` when the model finds no neighbour. Runs on the base
    /// model, so it needs exclusive access; use
    /// [`Classifier::classify_concurrent`] from multiple threads.
    pub fn classify(&mut self, line: &str) -> Result<Option<String>, ClassifierError> {
        Ok(self.model.classify(line)?.map(|m| m.label))
    }

    /// Like [`Classifier::classify`], additionally reporting the
    /// nearest-neighbour distance.
    pub fn classify_with_distance(
        &mut self,
        line: &str,
    ) -> Result<Option<(String, f64)>, ClassifierError> {
        Ok(self
            .model
            .classify(line)?
            .map(|m| (m.label, m.distance)))
    }

    /// Full classification on the base model: label, class distribution and
    /// distance, with optional distribution normalization and a
    /// minimum-match-depth gate.
    ///
    /// With `required_depth > 0`, a best neighbour that agrees on fewer than
    /// `required_depth` feature positions is rejected: the result still counts
    /// as found but carries an empty label, an empty score map and the
    /// sentinel distance.
    pub fn classify_full(
        &mut self,
        line: &str,
        normalize: bool,
        required_depth: usize,
    ) -> Result<Classification, ClassifierError> {
        let raw = self.model.classify(line)?;
        Ok(Self::gate(raw, normalize, required_depth))
    }

    /// The concurrency-safe variant of [`Classifier::classify_full`].
    ///
    /// Resolves a private clone for the calling thread (creating it on first
    /// use) and classifies on that clone. Arbitrarily many threads may call
    /// this at once. It cannot run concurrently with the `&mut self` variants
    /// or with teardown; Rust's borrow rules enforce both.
    pub fn classify_concurrent(
        &self,
        line: &str,
        normalize: bool,
        required_depth: usize,
    ) -> Result<Classification, ClassifierError> {
        let _guard = InFlightGuard::enter(&self.in_flight);

        let clone = self.pool.resolve()?;
        let mut model = clone.lock().map_err(|_| {
            ClassifierError::PredictionError("Model clone lock poisoned".to_string())
        })?;
        let raw = model.classify(line)?;
        Ok(Self::gate(raw, normalize, required_depth))
    }

    /// Number of concurrent classification calls currently in flight.
    ///
    /// Embedding layers that share the classifier through `Arc` can poll this
    /// to drain outstanding work before releasing their last handle.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Number of per-thread clones created so far.
    pub fn active_clones(&self) -> usize {
        self.pool.len()
    }

    pub fn format(&self) -> InstanceFormat {
        self.format
    }

    /// Read access to the base model (weights, instance base, bookkeeping).
    pub fn model(&self) -> &M {
        &self.model
    }

    fn gate(raw: Option<ModelMatch>, normalize: bool, required_depth: usize) -> Classification {
        match raw {
            None => Classification::no_match(),
            Some(m) if required_depth > 0 && m.match_depth < required_depth => {
                warn!(
                    "Best neighbour matched {} positions, {} required; rejecting",
                    m.match_depth, required_depth
                );
                Classification::depth_not_met()
            }
            Some(m) => {
                let scores = m.distribution.score_map(normalize, 0.0);
                Classification::matched(m.label, scores, m.distance)
            }
        }
    }
}

impl Classifier<MemoryBasedModel> {
    /// Creates a new ClassifierBuilder for fluent construction
    pub fn builder() -> super::builder::ClassifierBuilder {
        super::builder::ClassifierBuilder::new()
    }

    /// Returns information about the classifier's current state
    pub fn info(&self) -> ClassifierInfo {
        ClassifierInfo {
            num_instances: self.model.num_instances(),
            arity: self.model.arity(),
            k: self.model.k(),
            class_labels: self.model.class_labels(),
            format: self.format.to_string(),
            weighting: format!("{:?}", self.model.weighting()),
            active_clones: self.active_clones(),
        }
    }

    /// Human-readable description of the best neighbour of the most recent
    /// non-concurrent classification, if any.
    pub fn best_neighbour(&self) -> Option<String> {
        self.model.last_match().map(|last| {
            format!(
                "{} -> {} (distance {}, matched {} positions)",
                last.neighbour.features.join(" "),
                last.neighbour.label,
                last.distance,
                last.match_depth
            )
        })
    }
}

/// RAII increment/decrement of the in-flight counter, so every exit path of
/// a concurrent call (match, gate rejection, no match, error) decrements.
struct InFlightGuard<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> InFlightGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self { counter }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<Classifier<MemoryBasedModel>>();
    }
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::builder::ClassifierBuilder;
    use crate::instance::InstanceFormat;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    /// Model whose clones can be made to fail on demand.
    #[derive(Debug)]
    struct FlakyCloneModel {
        fail_clones: Arc<AtomicBool>,
    }

    impl Model for FlakyCloneModel {
        fn classify(&mut self, _line: &str) -> Result<Option<ModelMatch>, ClassifierError> {
            Ok(None)
        }

        fn try_clone(&self) -> Result<Self, ClassifierError> {
            if self.fail_clones.load(Ordering::SeqCst) {
                return Err(ClassifierError::CloneError(
                    "clone construction refused".to_string(),
                ));
            }
            Ok(Self {
                fail_clones: Arc::clone(&self.fail_clones),
            })
        }
    }

    fn weather_classifier() -> Classifier {
        ClassifierBuilder::new()
            .with_format(InstanceFormat::Columns)
            .add_instance(&["sunny", "hot", "no"], "play")
            .unwrap()
            .add_instance(&["sunny", "mild", "no"], "play")
            .unwrap()
            .add_instance(&["rainy", "cold", "yes"], "stay")
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn test_classify_returns_label() {
        let mut classifier = weather_classifier();
        let label = classifier.classify("sunny hot no ?").unwrap();
        assert_eq!(label.as_deref(), Some("play"));
    }

    #[test]
    fn test_classify_with_distance() {
        let mut classifier = weather_classifier();
        let (label, distance) = classifier
            .classify_with_distance("sunny hot no ?")
            .unwrap()
            .unwrap();
        assert_eq!(label, "play");
        assert_eq!(distance, 0.0);
    }

    #[test]
    fn test_classify_full_match() {
        let mut classifier = weather_classifier();
        let result = classifier.classify_full("sunny hot no ?", true, 0).unwrap();
        assert_eq!(result.outcome, Outcome::Match);
        assert!(result.found());
        assert_eq!(result.label, "play");
        assert_eq!(result.scores["play"], 1.0);
        assert_eq!(result.distance, 0.0);
    }

    #[test]
    fn test_no_match_carries_sentinel() {
        let mut classifier = weather_classifier();
        let result = classifier.classify_full("not-enough-columns", true, 0).unwrap();
        assert_eq!(result.outcome, Outcome::NoMatch);
        assert!(!result.found());
        assert!(result.label.is_empty());
        assert!(result.scores.is_empty());
        assert_eq!(result.distance, DISTANCE_SENTINEL);
    }

    #[test]
    fn test_depth_gate_rejects_shallow_match() {
        let mut classifier = weather_classifier();
        // Nothing matches on every position, so depth 3 cannot be met.
        let result = classifier
            .classify_full("foggy damp maybe ?", true, 3)
            .unwrap();
        assert_eq!(result.outcome, Outcome::DepthNotMet);
        // Deliberately still "found": a neighbour existed, it just fell short.
        assert!(result.found());
        assert!(result.label.is_empty());
        assert!(result.scores.is_empty());
        assert_eq!(result.distance, DISTANCE_SENTINEL);
    }

    #[test]
    fn test_depth_gate_passes_deep_match() {
        let mut classifier = weather_classifier();
        let result = classifier.classify_full("sunny hot no ?", true, 3).unwrap();
        assert_eq!(result.outcome, Outcome::Match);
        assert_eq!(result.label, "play");
    }

    #[test]
    fn test_concurrent_variant_matches_base_variant() {
        let mut classifier = weather_classifier();
        let sequential = classifier.classify_full("sunny mild no ?", true, 0).unwrap();
        let concurrent = classifier
            .classify_concurrent("sunny mild no ?", true, 0)
            .unwrap();
        assert_eq!(sequential.label, concurrent.label);
        assert_eq!(sequential.distance, concurrent.distance);
        assert_eq!(sequential.scores, concurrent.scores);
    }

    #[test]
    fn test_failed_clone_is_fatal_for_that_call_only() {
        let fail_clones = Arc::new(AtomicBool::new(false));
        let classifier = Classifier::from_model(
            FlakyCloneModel {
                fail_clones: Arc::clone(&fail_clones),
            },
            InstanceFormat::Columns,
        )
        .unwrap();

        fail_clones.store(true, Ordering::SeqCst);
        let err = classifier.classify_concurrent("x ?", true, 0).unwrap_err();
        assert!(matches!(err, ClassifierError::CloneError(_)));
        // No partial pool entry, and the counter drained on the error path.
        assert_eq!(classifier.active_clones(), 0);
        assert_eq!(classifier.in_flight(), 0);

        fail_clones.store(false, Ordering::SeqCst);
        assert!(classifier.classify_concurrent("x ?", true, 0).is_ok());
        assert_eq!(classifier.active_clones(), 1);
    }

    #[test]
    fn test_in_flight_returns_to_zero() {
        let classifier = weather_classifier();
        classifier
            .classify_concurrent("sunny hot no ?", true, 0)
            .unwrap();
        classifier.classify_concurrent("bad input", true, 0).unwrap();
        assert_eq!(classifier.in_flight(), 0);
    }

    #[test]
    fn test_info_reports_model_shape() {
        let classifier = weather_classifier();
        let info = classifier.info();
        assert_eq!(info.num_instances, 3);
        assert_eq!(info.arity, 3);
        assert_eq!(info.class_labels, vec!["play", "stay"]);
    }

    #[test]
    fn test_best_neighbour_reflects_last_call() {
        let mut classifier = weather_classifier();
        assert!(classifier.best_neighbour().is_none());
        classifier.classify("rainy cold yes ?").unwrap();
        let description = classifier.best_neighbour().unwrap();
        assert!(description.contains("stay"));
    }
}
