//! START/FINISH accounting under random barge-in schedules.

use hark::InterruptCounter;
use hark::pipeline::messages::WorkItem;
use hark::pipeline::queue::{CommandQueue, Reconciliation};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

const FINISH_WAIT: Duration = Duration::from_millis(100);

fn pair(n: usize) -> (WorkItem, WorkItem) {
    WorkItem::pair(format!("command {n}"), false, false, Instant::now())
}

/// Pop the next START and reconcile it, as the response worker does.
fn round(queue: &CommandQueue, counter: &InterruptCounter, interrupted: bool) -> Reconciliation {
    let start = queue
        .pop_timeout(FINISH_WAIT)
        .expect("a START should be queued");
    assert!(start.is_start());
    queue.reconcile(&start, interrupted, counter, FINISH_WAIT)
}

#[test]
fn random_schedules_balance_out() {
    for seed in 0..50_u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let queue = CommandQueue::new();
        let counter = InterruptCounter::new();
        let mut queued = 0_usize;
        let mut reconciled = 0_usize;
        let total = rng.gen_range(1..20);

        for n in 0..total {
            let (start, finish) = pair(n);
            queue.push_pair(start, finish);
            queued += 1;

            for _ in 0..rng.gen_range(0..3) {
                queue.register_barge_in(&counter);
            }
            if rng.gen_bool(0.5) {
                let interrupted = counter.is_interrupted() || rng.gen_bool(0.2);
                let result = round(&queue, &counter, interrupted);
                assert!(
                    matches!(result, Reconciliation::Reconciled { .. }),
                    "seed {seed}: {result:?}"
                );
                reconciled += 1;
            }
        }
        while reconciled < queued {
            let interrupted = counter.is_interrupted();
            let result = round(&queue, &counter, interrupted);
            assert_eq!(result, Reconciliation::Reconciled { interrupted }, "seed {seed}");
            reconciled += 1;
        }

        assert!(queue.is_empty(), "seed {seed}");
        assert_eq!(counter.get(), 0, "seed {seed}");
        assert_eq!(queue.register_barge_in(&counter), None);
    }
}

#[test]
fn every_interrupted_round_is_acknowledged_once() {
    let mut rng = StdRng::seed_from_u64(7);
    let queue = CommandQueue::new();
    let counter = InterruptCounter::new();

    for n in 0..100 {
        let (start, finish) = pair(n);
        queue.push_pair(start, finish);
        let start = queue.pop_timeout(FINISH_WAIT).unwrap();

        let barge_ins = rng.gen_range(0..4);
        for _ in 0..barge_ins {
            assert!(queue.register_barge_in(&counter).is_some());
        }
        let result = queue.reconcile(&start, false, &counter, FINISH_WAIT);
        assert_eq!(
            result,
            Reconciliation::Reconciled {
                interrupted: barge_ins > 0
            }
        );
        // Extra barge-ins against a drained queue are surplus.
        assert_eq!(counter.get(), 0);
    }
}

#[test]
fn concurrent_producer_consumer_and_barge_ins() {
    const ROUNDS: usize = 200;
    let queue = Arc::new(CommandQueue::new());
    let counter = InterruptCounter::new();
    let done = Arc::new(AtomicBool::new(false));

    let producer = {
        let queue = Arc::clone(&queue);
        std::thread::spawn(move || {
            let mut rng = StdRng::seed_from_u64(11);
            for n in 0..ROUNDS {
                let (start, finish) = pair(n);
                queue.push_pair(start, finish);
                if rng.gen_bool(0.3) {
                    std::thread::sleep(Duration::from_micros(rng.gen_range(0..500)));
                }
            }
        })
    };

    let barge_in = {
        let queue = Arc::clone(&queue);
        let counter = counter.clone();
        let done = Arc::clone(&done);
        std::thread::spawn(move || {
            let mut rng = StdRng::seed_from_u64(13);
            let mut counted = 0_usize;
            while !done.load(Ordering::SeqCst) {
                if queue.register_barge_in(&counter).is_some() {
                    counted += 1;
                }
                std::thread::sleep(Duration::from_micros(rng.gen_range(100..2000)));
            }
            counted
        })
    };

    let mut finished = 0;
    let mut interrupted_rounds = 0;
    while finished < ROUNDS {
        let start = queue
            .pop_timeout(Duration::from_secs(5))
            .expect("producer stalled");
        assert!(start.is_start(), "FINISH popped out of order: {start:?}");
        let interrupted = counter.is_interrupted();
        match queue.reconcile(&start, interrupted, &counter, Duration::from_secs(1)) {
            Reconciliation::Reconciled { interrupted } => {
                finished += 1;
                if interrupted {
                    interrupted_rounds += 1;
                }
            }
            other => panic!("round {finished} not reconciled: {other:?}"),
        }
    }

    producer.join().unwrap();
    done.store(true, Ordering::SeqCst);
    let counted = barge_in.join().unwrap();

    assert!(queue.is_empty());
    assert_eq!(counter.get(), 0);
    // Each interrupted round consumed at least one counted barge-in.
    assert!(interrupted_rounds <= counted);
}
