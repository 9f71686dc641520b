use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use env_logger::{Builder, Env};
use hippocampus::{Classification, Classifier, ClonePool, InstanceFormat, MemoryBasedModel, Model};

// Initialize test logger
fn init() {
    let _ = Builder::from_env(Env::default().default_filter_or("warn")).try_init();
}

fn trained_model() -> MemoryBasedModel {
    let classifier = demo_classifier();
    classifier.model().try_clone().unwrap()
}

fn demo_classifier() -> Classifier {
    Classifier::builder()
        .with_format(InstanceFormat::Columns)
        .add_instance(&["sunny", "hot", "high", "no"], "play")
        .unwrap()
        .add_instance(&["sunny", "mild", "high", "no"], "play")
        .unwrap()
        .add_instance(&["overcast", "hot", "normal", "no"], "play")
        .unwrap()
        .add_instance(&["rainy", "cold", "normal", "yes"], "stay")
        .unwrap()
        .add_instance(&["rainy", "mild", "normal", "yes"], "stay")
        .unwrap()
        .build()
        .unwrap()
}

fn query_lines() -> Vec<String> {
    let inputs = [
        "sunny hot high no ?",
        "sunny cold high no ?",
        "rainy cold normal yes ?",
        "overcast mild normal yes ?",
        "foggy damp weird maybe ?",
    ];
    (0..1000)
        .map(|i| inputs[i % inputs.len()].to_string())
        .collect()
}

#[test]
fn test_same_thread_resolves_same_clone() {
    init();
    let pool = ClonePool::new(trained_model());
    let first = pool.resolve().unwrap();
    let second = pool.resolve().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(pool.len(), 1);
}

#[test]
fn test_distinct_threads_resolve_distinct_clones() {
    init();
    let pool = Arc::new(ClonePool::new(trained_model()));
    let local = pool.resolve().unwrap();

    let remote = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || pool.resolve().unwrap()).join().unwrap()
    };

    assert!(!Arc::ptr_eq(&local, &remote));
    assert_eq!(pool.len(), 2);
}

#[test]
fn test_racing_first_resolutions_create_exactly_n_entries() {
    init();
    const THREADS: usize = 8;
    let pool = Arc::new(ClonePool::new(trained_model()));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let pool = Arc::clone(&pool);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                // Several resolves per thread; only the first may create.
                for _ in 0..10 {
                    pool.resolve().unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(pool.len(), THREADS);
}

#[test]
fn test_concurrent_results_match_sequential() {
    init();
    const THREADS: usize = 8;

    let mut sequential_classifier = demo_classifier();
    let lines = query_lines();
    let sequential: Vec<Classification> = lines
        .iter()
        .map(|line| sequential_classifier.classify_full(line, true, 0).unwrap())
        .collect();
    let sequential = Arc::new(sequential);

    let classifier = Arc::new(demo_classifier());
    let barrier = Arc::new(Barrier::new(THREADS));
    let lines = Arc::new(lines);

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let classifier = Arc::clone(&classifier);
            let barrier = Arc::clone(&barrier);
            let lines = Arc::clone(&lines);
            let sequential = Arc::clone(&sequential);
            thread::spawn(move || {
                barrier.wait();
                for (line, expected) in lines.iter().zip(sequential.iter()) {
                    let result = classifier.classify_concurrent(line, true, 0).unwrap();
                    assert_eq!(result.outcome, expected.outcome);
                    assert_eq!(result.label, expected.label);
                    assert_eq!(result.distance, expected.distance);
                    assert_eq!(result.scores, expected.scores);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(classifier.active_clones(), THREADS);
    assert_eq!(classifier.in_flight(), 0);
}

#[test]
fn test_in_flight_observed_nonzero_during_calls() {
    init();
    let classifier = Arc::new(demo_classifier());
    let peak = Arc::new(Mutex::new(0usize));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let classifier = Arc::clone(&classifier);
            let peak = Arc::clone(&peak);
            thread::spawn(move || {
                for _ in 0..200 {
                    classifier
                        .classify_concurrent("sunny hot high no ?", true, 0)
                        .unwrap();
                    let seen = classifier.in_flight();
                    let mut peak = peak.lock().unwrap();
                    if seen > *peak {
                        *peak = seen;
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // Counter drained once all calls completed.
    assert_eq!(classifier.in_flight(), 0);
}

#[test]
fn test_clones_do_not_share_bookkeeping_with_base() {
    init();
    let classifier = Arc::new(demo_classifier());
    classifier
        .classify_concurrent("rainy cold normal yes ?", true, 0)
        .unwrap();
    // The concurrent call ran on a clone; the base model saw nothing.
    assert!(classifier.model().last_match().is_none());
    assert_eq!(classifier.active_clones(), 1);
}

#[test]
fn test_depth_gate_on_concurrent_path() {
    init();
    let classifier = Arc::new(demo_classifier());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let classifier = Arc::clone(&classifier);
            thread::spawn(move || {
                let result = classifier
                    .classify_concurrent("foggy damp weird maybe ?", true, 4)
                    .unwrap();
                assert!(result.found());
                assert!(result.label.is_empty());
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}
