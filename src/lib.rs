//! A memory-based (nearest-neighbour) text classifier with lock-free
//! concurrent classification.
//!
//! # Basic Usage
//!
//! ```rust
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use hippocampus::{Classifier, InstanceFormat};
//!
//! let mut classifier = Classifier::builder()
//!     .with_format(InstanceFormat::Columns)
//!     .add_instance(&["sunny", "hot", "no"], "play")?
//!     .add_instance(&["sunny", "mild", "no"], "play")?
//!     .add_instance(&["rainy", "cold", "yes"], "stay")?
//!     .build()?;
//!
//! let result = classifier.classify_full("sunny hot no ?", true, 0)?;
//! println!("Predicted class: {}", result.label);
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! Classification normally writes per-call bookkeeping into the model, so a
//! single trained model cannot be shared behind `&self`. Instead of
//! serializing callers behind one lock,
//! [`Classifier::classify_concurrent`] gives every calling thread a private
//! clone of the trained model, created lazily on first use and registered in
//! a [`ClonePool`]. The pool's lock covers only the lookup/insert step, never
//! the nearest-neighbour search itself:
//!
//! ```rust
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use hippocampus::{Classifier, InstanceFormat};
//! use std::sync::Arc;
//! use std::thread;
//!
//! let classifier = Arc::new(Classifier::builder()
//!     .with_format(InstanceFormat::Columns)
//!     .add_instance(&["sunny", "hot", "no"], "play")?
//!     .add_instance(&["rainy", "cold", "yes"], "stay")?
//!     .build()?);
//!
//! let mut handles = vec![];
//! for _ in 0..3 {
//!     let classifier = Arc::clone(&classifier);
//!     handles.push(thread::spawn(move || {
//!         classifier.classify_concurrent("sunny hot no ?", true, 0).unwrap();
//!     }));
//! }
//!
//! for handle in handles {
//!     handle.join().unwrap();
//! }
//! # Ok(())
//! # }
//! ```

pub mod classifier;
pub mod distribution;
pub mod instance;
pub mod knn;
pub mod model;
pub mod pool;
pub mod storage;

pub use classifier::{
    Classification, Classifier, ClassifierBuilder, ClassifierError, ClassifierInfo, Outcome,
    DISTANCE_SENTINEL,
};
pub use distribution::ClassDistribution;
pub use instance::{Instance, InstanceFormat};
pub use knn::{LastMatch, MemoryBasedModel, Weighting};
pub use model::{Model, ModelMatch};
pub use pool::ClonePool;
pub use storage::{load_model, save_model, StorageError, TrainingSet};

pub fn init_logger() {
    env_logger::init();
}
