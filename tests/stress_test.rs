//! Randomized stress test: writers and readers hammer one lock for a fixed
//! wall-clock window and verify that no reader ever observes a writer inside
//! its critical section.

use prometheus_read_mostly::builders::CoordinatorBuilder;
use prometheus_read_mostly::config::{CoordinatorConfig, ThreadingMode};
use prometheus_read_mostly::core::{CoordinatorExt, ReadWriteCoordinator};
use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const READERS: usize = 6;
const RUN_FOR: Duration = Duration::from_millis(500);

#[derive(Default)]
struct Witness {
    writing: AtomicBool,
    readers_inside: AtomicUsize,
    violations: AtomicUsize,
    value: AtomicUsize,
}

/// Runs readers and writers until the deadline and returns the number of writes.
fn hammer(lock: &Arc<dyn ReadWriteCoordinator>, witness: &Arc<Witness>, writers: usize) -> usize {
    let deadline = Instant::now() + RUN_FOR;
    let reader_handles: Vec<_> = (0..READERS)
        .map(|_| {
            let lock = Arc::clone(lock);
            let witness = Arc::clone(witness);
            thread::spawn(move || {
                let mut rng = rand::rng();
                let mut reads = 0_usize;
                while Instant::now() < deadline {
                    reads += 1;
                    lock.run_read(|| {
                        witness.readers_inside.fetch_add(1, Ordering::SeqCst);
                        if witness.writing.load(Ordering::SeqCst) {
                            witness.violations.fetch_add(1, Ordering::SeqCst);
                        }
                        if rng.random_range(0..8) == 0 {
                            thread::yield_now();
                        }
                        witness.readers_inside.fetch_sub(1, Ordering::SeqCst);
                    })
                    .unwrap();
                }
                reads
            })
        })
        .collect();

    let writer_handles: Vec<_> = (0..writers)
        .map(|_| {
            let lock = Arc::clone(lock);
            let witness = Arc::clone(witness);
            move || {
                let mut rng = rand::rng();
                let mut writes = 0_usize;
                while Instant::now() < deadline {
                    writes += 1;
                    lock.run_write(|| {
                        if witness.writing.swap(true, Ordering::SeqCst) {
                            witness.violations.fetch_add(1, Ordering::SeqCst);
                        }
                        if witness.readers_inside.load(Ordering::SeqCst) != 0 {
                            witness.violations.fetch_add(1, Ordering::SeqCst);
                        }
                        witness.value.fetch_add(1, Ordering::SeqCst);
                        witness.writing.store(false, Ordering::SeqCst);
                    })
                    .unwrap();
                    thread::sleep(Duration::from_micros(rng.random_range(0..200)));
                }
                writes
            }
        })
        .collect();

    // The write-thread lock only accepts writes from the thread that built it,
    // so a single writer runs inline.
    let mut writes = 0;
    let mut spawned = Vec::new();
    let mut writer_handles = writer_handles.into_iter();
    if writers == 1 {
        if let Some(write) = writer_handles.next() {
            writes += write();
        }
    } else {
        spawned.extend(writer_handles.map(thread::spawn));
    }

    for handle in spawned {
        writes += handle.join().unwrap();
    }
    let reads: usize = reader_handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .sum();
    assert!(reads > 0);
    assert!(writes > 0);
    writes
}

#[test]
fn test_any_thread_readers_never_see_writers() {
    let lock = CoordinatorBuilder::new(CoordinatorConfig::new().with_mode(ThreadingMode::AnyThread))
        .build()
        .unwrap();
    let witness = Arc::new(Witness::default());

    let writes = hammer(&lock, &witness, 3);

    assert_eq!(witness.violations.load(Ordering::SeqCst), 0);
    assert_eq!(witness.value.load(Ordering::SeqCst), writes);
    assert!(!lock.is_write_locked());
}

#[test]
fn test_write_thread_readers_never_see_writer() {
    let lock = CoordinatorBuilder::new(
        CoordinatorConfig::new()
            .with_mode(ThreadingMode::WriteThread)
            .with_implicit_read(false),
    )
    .build()
    .unwrap();
    let witness = Arc::new(Witness::default());

    let writes = hammer(&lock, &witness, 1);

    assert_eq!(witness.violations.load(Ordering::SeqCst), 0);
    assert_eq!(witness.value.load(Ordering::SeqCst), writes);
    assert!(!lock.is_write_locked());
}
