use crate::classifier::ClassifierError;
use crate::distribution::ClassDistribution;

/// The raw outcome of a single model lookup: the winning label, the class
/// distribution among the nearest neighbours, the nearest-neighbour distance
/// and the match depth of the best neighbour.
#[derive(Debug, Clone)]
pub struct ModelMatch {
    pub label: String,
    pub distribution: ClassDistribution,
    pub distance: f64,
    /// Number of consecutive feature positions, walked in the model's feature
    /// ordering, on which the best neighbour agreed exactly with the query.
    pub match_depth: usize,
}

/// The memory-based learner behind a [`Classifier`](crate::Classifier).
///
/// A model is logically read-only once trained, but a lookup is allowed to
/// write per-call bookkeeping (such as last-match metadata), which is why
/// `classify` takes `&mut self` and why concurrent classification goes
/// through per-thread clones rather than a shared reference.
///
/// `try_clone` must produce a structurally independent copy: mutable lookup
/// state is copied by value, while the read-only instance base may be shared
/// immutably between the original and the clone.
pub trait Model: Send + Sync {
    /// Classifies a single input line in the model's record syntax.
    ///
    /// Returns `Ok(None)` when no neighbour can be found: the input is empty
    /// or malformed, or the model holds no instances.
    fn classify(&mut self, line: &str) -> Result<Option<ModelMatch>, ClassifierError>;

    /// Creates an independent working copy of this model.
    ///
    /// Failures surface as [`ClassifierError::CloneError`] and must leave the
    /// original untouched.
    fn try_clone(&self) -> Result<Self, ClassifierError>
    where
        Self: Sized;
}
