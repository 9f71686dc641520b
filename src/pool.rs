use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

use log::debug;

use crate::classifier::ClassifierError;
use crate::model::Model;

/// A lazily populated registry of per-thread model clones.
///
/// Each calling thread gets exactly one private clone of the detached
/// template, created on first use and kept for the life of the pool. The
/// pool's own lock covers only map lookup and insertion; it is never held
/// while a clone is being produced or while a clone is classifying. The
/// per-clone mutex exists to make single-thread ownership expressible in
/// safe Rust and is uncontended by construction: no thread ever resolves
/// another thread's entry.
#[derive(Debug)]
pub struct ClonePool<M: Model> {
    template: Arc<M>,
    clones: Mutex<HashMap<ThreadId, Arc<Mutex<M>>>>,
}

impl<M: Model> ClonePool<M> {
    /// Creates a pool around a detached template. The template itself is
    /// never classified on; it only serves as the source for clones.
    pub fn new(template: M) -> Self {
        Self {
            template: Arc::new(template),
            clones: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the calling thread's private clone, creating it on first use.
    ///
    /// The expensive template copy happens outside the pool lock. If two
    /// threads race on the very first resolution for the same thread id
    /// (possible only with recycled thread ids), the losing clone is
    /// discarded and the winner is returned.
    pub fn resolve(&self) -> Result<Arc<Mutex<M>>, ClassifierError> {
        let thread_id = thread::current().id();

        {
            let clones = self.lock_clones()?;
            if let Some(clone) = clones.get(&thread_id) {
                return Ok(Arc::clone(clone));
            }
        }

        let fresh = self.template.try_clone()?;
        debug!("Created model clone for {:?}", thread_id);

        let mut clones = self.lock_clones()?;
        let entry = clones
            .entry(thread_id)
            .or_insert_with(|| Arc::new(Mutex::new(fresh)));
        Ok(Arc::clone(entry))
    }

    /// Number of clones created so far.
    pub fn len(&self) -> usize {
        // Even a poisoned map still holds the real entry count.
        self.clones
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_clones(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<ThreadId, Arc<Mutex<M>>>>, ClassifierError> {
        self.clones
            .lock()
            .map_err(|_| ClassifierError::PredictionError("Clone pool lock poisoned".to_string()))
    }
}
