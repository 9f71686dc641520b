use anyhow::Result;
use clap::Parser;
use hippocampus::{Classifier, ClassifierBuilder, InstanceFormat, Weighting};
use log::info;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Train from this file instead of the built-in demo corpus
    #[arg(short, long)]
    train: Option<String>,

    /// Use space-separated columns instead of tabs
    #[arg(short, long)]
    columns: bool,

    /// Number of nearest distances whose instances get a vote
    #[arg(short, long, default_value_t = 1)]
    k: usize,

    /// Number of worker threads for the concurrent demo
    #[arg(long, default_value_t = 4)]
    threads: usize,
}

fn build_classifier(args: &Args) -> Result<Classifier> {
    let format = if args.columns || args.train.is_none() {
        InstanceFormat::Columns
    } else {
        InstanceFormat::Tabbed
    };

    let builder = ClassifierBuilder::new()
        .with_format(format)
        .with_weighting(Weighting::GainRatio)
        .with_k(args.k);

    let builder = match &args.train {
        Some(path) => builder.add_instances_from_file(path)?,
        None => builder
            .add_instance(&["sunny", "hot", "high", "no"], "play")?
            .add_instance(&["sunny", "hot", "high", "yes"], "stay")?
            .add_instance(&["overcast", "hot", "high", "no"], "play")?
            .add_instance(&["rainy", "mild", "high", "no"], "play")?
            .add_instance(&["rainy", "cold", "normal", "no"], "play")?
            .add_instance(&["rainy", "cold", "normal", "yes"], "stay")?
            .add_instance(&["overcast", "cold", "normal", "yes"], "play")?
            .add_instance(&["sunny", "mild", "high", "no"], "stay")?,
    };

    Ok(builder.build()?)
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    info!("=== Starting Memory-Based Classifier Demo ===");

    let start_time = Instant::now();
    let mut classifier = build_classifier(&args)?;
    let build_time = start_time.elapsed();
    info!("=== Classifier Built Successfully (took {:.2?}) ===", build_time);

    let info = classifier.info();
    println!(
        "Trained on {} instances, {} features, classes: {:?}",
        info.num_instances, info.arity, info.class_labels
    );

    let test_inputs = vec![
        "sunny hot high no ?",
        "rainy cold normal yes ?",
        "overcast mild normal no ?",
        "foggy damp weird maybe ?",
    ];

    info!("=== Running Classifications ({} inputs) ===", test_inputs.len());
    for (i, line) in test_inputs.iter().enumerate() {
        let result = classifier.classify_full(line, true, 0)?;
        println!("\nTest {}/{}: {}", i + 1, test_inputs.len(), line);
        if result.found() {
            println!("  Predicted class: {}", result.label);
            println!("  Distance: {}", result.distance);
            let mut scores: Vec<_> = result.scores.into_iter().collect();
            scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            for (label, score) in scores {
                println!("    {}: {:.2}", label, score);
            }
            if let Some(neighbour) = classifier.best_neighbour() {
                println!("  Best neighbour: {}", neighbour);
            }
        } else {
            println!("  No match");
        }
    }

    // Concurrent path: every worker resolves its own private clone.
    info!("=== Concurrent Demo ({} threads) ===", args.threads);
    let concurrent_start = Instant::now();
    let classifier = Arc::new(classifier);
    let mut handles = vec![];
    for worker in 0..args.threads {
        let classifier = Arc::clone(&classifier);
        handles.push(thread::spawn(move || -> Result<()> {
            for _ in 0..250 {
                classifier.classify_concurrent("sunny hot high no ?", true, 0)?;
            }
            info!("Worker {} done", worker);
            Ok(())
        }));
    }
    for handle in handles {
        handle.join().expect("worker thread panicked")?;
    }

    println!(
        "\nRan {} concurrent classifications across {} threads in {:.2?} ({} clones, {} in flight)",
        250 * args.threads,
        args.threads,
        concurrent_start.elapsed(),
        classifier.active_clones(),
        classifier.in_flight(),
    );

    info!("=== Demo Complete ===");
    info!("Total time: {:.2?}", start_time.elapsed());
    Ok(())
}
