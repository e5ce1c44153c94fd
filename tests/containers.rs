#![cfg(not(loom))]

use lockstep::{ConcurrentQueue, ConcurrentStack, EmptyContainerError};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn stack_pops_in_reverse_push_order() {
    let stack = ConcurrentStack::new();
    let values: Vec<i64> = vec![4, -2, 17, 0, 9, 9, 31];
    for &value in &values {
        stack.push(value);
    }

    let popped: Vec<_> = std::iter::from_fn(|| stack.pop().ok()).collect();
    let mut expected = values.clone();
    expected.reverse();
    assert_eq!(popped, expected);
}

#[test]
fn stack_push_pop_then_empty() {
    let stack = ConcurrentStack::new();
    stack.push(1);
    stack.push(2);
    stack.push(3);

    assert_eq!(stack.pop(), Ok(3));
    assert_eq!(stack.pop(), Ok(2));
    assert_eq!(stack.pop(), Ok(1));
    assert!(stack.is_empty());
    assert_eq!(stack.pop(), Err(EmptyContainerError));
    assert!(stack.is_empty());
}

#[test]
fn queue_single_thread_fifo() {
    let queue = ConcurrentQueue::new();
    queue.push(1);
    queue.push(2);
    queue.push(3);

    assert_eq!(queue.try_pop().as_deref(), Some(&1));
    assert_eq!(queue.try_pop().as_deref(), Some(&2));
    assert_eq!(queue.try_pop().as_deref(), Some(&3));
    assert_eq!(queue.try_pop(), None);
}

#[test]
fn queue_try_pop_on_empty_returns_immediately() {
    let queue: ConcurrentQueue<u64> = ConcurrentQueue::new();
    let start = Instant::now();
    for _ in 0..1000 {
        assert!(queue.try_pop().is_none());
    }
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[test]
fn queue_try_pop_does_not_wait_for_producer() {
    let queue = Arc::new(ConcurrentQueue::new());
    let waiter = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || queue.wait_and_pop_timeout(Duration::from_secs(5)))
    };

    // A blocked consumer holds no lock, so try_pop still answers at once
    thread::sleep(Duration::from_millis(20));
    assert!(queue.try_pop().is_none());

    queue.push(8u8);
    assert_eq!(waiter.join().unwrap().as_deref(), Ok(&8));
}

#[test]
fn queue_five_producers_five_consumers() {
    let queue = Arc::new(ConcurrentQueue::new());
    let results = Arc::new(Mutex::new(Vec::new()));
    let num_producers = 5;
    let num_consumers = 5;
    let items_per_producer = 10;

    let producers: Vec<_> = (0..num_producers)
        .map(|id| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..items_per_producer {
                    queue.push(id * items_per_producer + i);
                    thread::sleep(Duration::from_millis(1));
                }
            })
        })
        .collect();

    let consumers: Vec<_> = (0..num_consumers)
        .map(|_| {
            let queue = Arc::clone(&queue);
            let results = Arc::clone(&results);
            thread::spawn(move || {
                for _ in 0..num_producers * items_per_producer / num_consumers {
                    let mut item = 0;
                    queue.wait_and_pop_into(&mut item);
                    results.lock().unwrap().push(item);
                }
            })
        })
        .collect();

    for handle in producers.into_iter().chain(consumers) {
        handle.join().unwrap();
    }

    let mut results = results.lock().unwrap().clone();
    results.sort_unstable();
    assert_eq!(results, (0..50).collect::<Vec<_>>());
}

#[test]
fn queue_many_producers_many_consumers_complete() {
    let queue = Arc::new(ConcurrentQueue::new());
    let num_producers = 8;
    let num_consumers = 3;
    let items_per_producer = 2000;

    let consumers: Vec<_> = (0..num_consumers)
        .map(|_| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let mut received = Vec::new();
                while let Ok(value) = queue.wait_and_pop_until_closed() {
                    received.push(*value);
                }
                received
            })
        })
        .collect();

    let producers: Vec<_> = (0..num_producers)
        .map(|id| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..items_per_producer {
                    queue.push(id * items_per_producer + i);
                }
            })
        })
        .collect();
    for handle in producers {
        handle.join().unwrap();
    }
    queue.close();

    let mut seen = HashSet::new();
    for handle in consumers {
        for value in handle.join().unwrap() {
            assert!(seen.insert(value), "value {value} popped twice");
        }
    }
    assert_eq!(seen.len(), num_producers * items_per_producer);
    assert!(queue.is_empty());
}

#[test]
fn queue_per_producer_order_is_preserved() {
    let queue = Arc::new(ConcurrentQueue::new());
    let num_producers = 4;
    let items_per_producer = 500;

    let producers: Vec<_> = (0..num_producers)
        .map(|id| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..items_per_producer {
                    queue.push((id, i));
                }
            })
        })
        .collect();

    let mut last_seen = vec![None; num_producers];
    for _ in 0..num_producers * items_per_producer {
        let (id, i) = *queue.wait_and_pop();
        if let Some(previous) = last_seen[id] {
            assert!(i > previous, "producer {id} reordered: {i} after {previous}");
        }
        last_seen[id] = Some(i);
    }

    for handle in producers {
        handle.join().unwrap();
    }
}
