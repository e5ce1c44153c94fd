use clap::Parser;
use colored::*;
use lockstep::{ConcurrentQueue, ConcurrentStack, EmptyContainerError};
use std::collections::HashSet;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Command-line arguments for the container demo
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log every container operation (trace level)
    #[arg(short, long)]
    verbose: bool,

    /// Number of producer threads in the queue demo
    #[arg(long, default_value_t = 5)]
    producers: usize,

    /// Number of consumer threads in the queue demo
    #[arg(long, default_value_t = 5)]
    consumers: usize,

    /// Items pushed by each producer
    #[arg(long, default_value_t = 10)]
    items: usize,

    /// Only run the stack demo
    #[arg(long, conflicts_with = "queue_only")]
    stack_only: bool,

    /// Only run the queue demos
    #[arg(long)]
    queue_only: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "lockstep=trace" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_thread_names(true)
        .init();

    println!("{}", "Lock-based Containers Demonstration".green().bold());
    println!("=====================================\n");

    let mut passed = true;
    if !args.queue_only {
        passed &= report("stack LIFO", stack_demo());
    }
    if !args.stack_only {
        passed &= report(
            "queue producers/consumers",
            queue_demo(args.producers, args.consumers, args.items),
        );
        passed &= report(
            "queue close-driven drain",
            close_demo(args.producers, args.consumers, args.items),
        );
    }

    if passed {
        println!("\n{}", "All demonstrations passed!".green().bold());
        ExitCode::SUCCESS
    } else {
        println!("\n{}", "Some demonstrations failed.".red().bold());
        ExitCode::FAILURE
    }
}

fn report(name: &str, result: Result<(), String>) -> bool {
    match result {
        Ok(()) => {
            println!("{} {}", "PASS".green().bold(), name);
            true
        }
        Err(reason) => {
            println!("{} {}: {}", "FAIL".red().bold(), name, reason);
            false
        }
    }
}

/// Pushes 1, 2, 3 and pops them back in reverse
fn stack_demo() -> Result<(), String> {
    println!("{}", "\nRunning stack demonstration...".yellow().bold());

    let stack = ConcurrentStack::new();
    println!("Pushing values 1, 2, 3 onto the stack");
    for value in 1..=3 {
        stack.push(value);
    }

    let snapshot = stack.clone();
    println!("Copied stack under lock: {snapshot:?}");

    let mut popped = Vec::new();
    while let Ok(value) = stack.pop() {
        println!("Popped: {value}");
        popped.push(value);
    }
    if popped != [3, 2, 1] {
        return Err(format!("expected [3, 2, 1], popped {popped:?}"));
    }
    if !stack.is_empty() {
        return Err("stack not empty after draining".into());
    }
    if stack.pop() != Err(EmptyContainerError) {
        return Err("pop on empty stack did not fail".into());
    }
    println!("Pop on empty stack: {}", EmptyContainerError.to_string().cyan());
    if snapshot.len() != 3 {
        return Err("copy changed along with the source".into());
    }
    Ok(())
}

/// Spawns producers pushing `id * items + i` and consumers draining with
/// `wait_and_pop`, then checks every value arrived exactly once
fn queue_demo(producers: usize, consumers: usize, items: usize) -> Result<(), String> {
    println!(
        "{}",
        format!("\nRunning queue demonstration ({producers} producers x {items} items, {consumers} consumers)...")
            .yellow()
            .bold()
    );

    let total = producers * items;
    if consumers == 0 || total % consumers != 0 {
        return Err(format!("{total} items cannot be split across {consumers} consumers"));
    }

    let queue = Arc::new(ConcurrentQueue::new());
    let results = Arc::new(Mutex::new(Vec::with_capacity(total)));
    let start = Instant::now();

    let producer_handles: Vec<_> = (0..producers)
        .map(|id| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..items {
                    queue.push(id * items + i);
                }
            })
        })
        .collect();

    let consumer_handles: Vec<_> = (0..consumers)
        .map(|_| {
            let queue = Arc::clone(&queue);
            let results = Arc::clone(&results);
            thread::spawn(move || {
                for _ in 0..total / consumers {
                    let mut item = 0;
                    queue.wait_and_pop_into(&mut item);
                    results
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .push(item);
                }
            })
        })
        .collect();

    for handle in producer_handles.into_iter().chain(consumer_handles) {
        handle.join().map_err(|_| "worker thread panicked".to_string())?;
    }

    let results = results.lock().unwrap_or_else(|e| e.into_inner());
    let unique: HashSet<_> = results.iter().copied().collect();
    println!(
        "Consumed {} values ({} unique) in {:?}",
        results.len(),
        unique.len(),
        start.elapsed()
    );
    if results.len() != total || unique != (0..total).collect() {
        return Err("some values were lost or duplicated".into());
    }
    Ok(())
}

/// Consumers run until the queue is closed and drained instead of counting
/// items up front
fn close_demo(producers: usize, consumers: usize, items: usize) -> Result<(), String> {
    println!("{}", "\nRunning close-driven drain...".yellow().bold());

    let queue = Arc::new(ConcurrentQueue::new());
    let consumer_handles: Vec<_> = (0..consumers.max(1))
        .map(|_| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let mut count = 0usize;
                while queue.wait_and_pop_until_closed().is_ok() {
                    count += 1;
                }
                count
            })
        })
        .collect();

    let producer_handles: Vec<_> = (0..producers)
        .map(|id| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..items {
                    queue.push(id * items + i);
                }
            })
        })
        .collect();
    for handle in producer_handles {
        handle.join().map_err(|_| "producer panicked".to_string())?;
    }

    println!("Producers done, closing queue");
    queue.close();

    let mut consumed = 0;
    for handle in consumer_handles {
        consumed += handle.join().map_err(|_| "consumer panicked".to_string())?;
    }
    println!("Consumers drained {consumed} values before shutdown");

    if consumed != producers * items {
        return Err(format!("expected {} values, drained {consumed}", producers * items));
    }
    if queue.wait_and_pop_timeout(Duration::from_millis(10)).is_ok() {
        return Err("closed queue still produced a value".into());
    }
    Ok(())
}
