//! Integration tests for the thread model and monitors on real host threads.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use vmsys::prelude::*;
use vmsys::ThreadState;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn system() -> Arc<HostSystem> {
    init_logging();
    make_system(16 * 1024 * 1024)
}

/// Starts `task` and returns its thread.
fn spawn(system: &HostSystem, task: &Arc<Task>) -> Arc<dyn Thread> {
    let status = system.start(task.clone());
    assert!(system.success(status), "start failed: {status}");
    task.state().thread().expect("attached by start")
}

#[test]
fn test_join_waits_for_run() {
    let system = system();
    let finished = Arc::new(AtomicBool::new(false));

    let task = {
        let finished = Arc::clone(&finished);
        Arc::new(Task::new(move |_| {
            std::thread::sleep(Duration::from_millis(30));
            finished.store(true, Ordering::SeqCst);
        }))
    };

    let thread = spawn(&system, &task);
    thread.join();
    assert!(finished.load(Ordering::SeqCst));
    assert_eq!(thread.state(), ThreadState::Joined);

    thread.dispose();
    assert_eq!(thread.state(), ThreadState::Disposed);
    system.dispose();
}

#[test]
fn test_interrupt_stops_cooperative_loop() {
    let system = system();
    let iterations = Arc::new(AtomicUsize::new(0));

    let task = {
        let iterations = Arc::clone(&iterations);
        Arc::new(Task::new(move |state| {
            while !state.interrupted() {
                iterations.fetch_add(1, Ordering::Relaxed);
                std::thread::yield_now();
            }
        }))
    };

    let thread = spawn(&system, &task);
    while iterations.load(Ordering::Relaxed) == 0 {
        std::thread::yield_now();
    }

    thread.interrupt();
    thread.interrupt();
    thread.join();
    assert!(task.interrupted());

    // Interrupting a finished thread is harmless
    thread.interrupt();
    thread.dispose();
}

#[test]
fn test_interrupt_wakes_monitor_wait() {
    let system = system();
    let monitor = system.make().unwrap();
    let entered = Arc::new(AtomicBool::new(false));
    let woken = Arc::new(AtomicBool::new(false));

    let task = {
        let monitor = Arc::clone(&monitor);
        let entered = Arc::clone(&entered);
        let woken = Arc::clone(&woken);
        Arc::new(Task::new(move |state| {
            let me = state.thread().unwrap();
            monitor.acquire(&*me);
            entered.store(true, Ordering::SeqCst);
            // An interrupt delivered before parking is still observed.
            woken.store(monitor.wait(&*me, 0), Ordering::SeqCst);
            assert_eq!(monitor.owner(), Some(me.id()));
            monitor.release(&*me);
        }))
    };

    let thread = spawn(&system, &task);
    while !entered.load(Ordering::SeqCst) {
        std::thread::yield_now();
    }

    thread.interrupt();
    thread.join();
    assert!(woken.load(Ordering::SeqCst));
    thread.dispose();
    monitor.dispose();
}

#[test]
fn test_monitor_mutual_exclusion_across_threads() {
    let system = system();
    let monitor = system.make().unwrap();
    // Plain load/store, so lost updates show up if exclusion fails.
    let counter = Arc::new(AtomicUsize::new(0));
    const ROUNDS: usize = 2_000;

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let monitor = Arc::clone(&monitor);
            let counter = Arc::clone(&counter);
            Arc::new(Task::new(move |state| {
                let me = state.thread().unwrap();
                for _ in 0..ROUNDS {
                    monitor.acquire(&*me);
                    monitor.acquire(&*me);
                    let value = counter.load(Ordering::Relaxed);
                    counter.store(value + 1, Ordering::Relaxed);
                    monitor.release(&*me);
                    monitor.release(&*me);
                }
            }))
        })
        .collect();

    let threads: Vec<_> = tasks.iter().map(|task| spawn(&system, task)).collect();
    for thread in &threads {
        thread.join();
        thread.dispose();
    }

    assert_eq!(counter.load(Ordering::Relaxed), 4 * ROUNDS);
    assert_eq!(monitor.owner(), None);
    monitor.dispose();
}

#[test]
fn test_producer_consumer_no_missed_wakeup() {
    let system = system();
    let monitor = system.make().unwrap();
    let slot = Arc::new(AtomicUsize::new(0));
    let consumed = Arc::new(AtomicUsize::new(0));
    const ITEMS: usize = 500;

    // slot == 0 means empty; items are 1..=ITEMS.
    let producer = {
        let monitor = Arc::clone(&monitor);
        let slot = Arc::clone(&slot);
        Arc::new(Task::new(move |state| {
            let me = state.thread().unwrap();
            for item in 1..=ITEMS {
                monitor.acquire(&*me);
                while slot.load(Ordering::Relaxed) != 0 {
                    monitor.wait(&*me, 0);
                }
                slot.store(item, Ordering::Relaxed);
                monitor.notify_all(&*me);
                monitor.release(&*me);
            }
        }))
    };

    let consumer = {
        let monitor = Arc::clone(&monitor);
        let slot = Arc::clone(&slot);
        let consumed = Arc::clone(&consumed);
        Arc::new(Task::new(move |state| {
            let me = state.thread().unwrap();
            for expected in 1..=ITEMS {
                monitor.acquire(&*me);
                while slot.load(Ordering::Relaxed) == 0 {
                    monitor.wait(&*me, 0);
                }
                assert_eq!(slot.swap(0, Ordering::Relaxed), expected);
                consumed.fetch_add(1, Ordering::Relaxed);
                monitor.notify_all(&*me);
                monitor.release(&*me);
            }
        }))
    };

    let threads = [spawn(&system, &consumer), spawn(&system, &producer)];
    for thread in &threads {
        thread.join();
        thread.dispose();
    }

    assert_eq!(consumed.load(Ordering::Relaxed), ITEMS);
    monitor.dispose();
}

#[test]
fn test_timed_wait_expires() {
    let system = system();
    let monitor = system.make().unwrap();
    let result = Arc::new(AtomicUsize::new(usize::MAX));

    let task = {
        let monitor = Arc::clone(&monitor);
        let result = Arc::clone(&result);
        Arc::new(Task::new(move |state| {
            let me = state.thread().unwrap();
            monitor.acquire(&*me);
            let woken = monitor.wait(&*me, 15);
            monitor.release(&*me);
            result.store(usize::from(woken), Ordering::SeqCst);
        }))
    };

    let thread = spawn(&system, &task);
    thread.join();
    thread.dispose();
    assert_eq!(result.load(Ordering::SeqCst), 0);
    monitor.dispose();
}

#[test]
fn test_panic_in_run_is_contained() {
    let system = system();
    let task = Arc::new(Task::new(|_| panic!("runnable failure")));

    let thread = spawn(&system, &task);
    thread.join();
    assert_eq!(thread.state(), ThreadState::Joined);
    thread.dispose();
    assert_eq!(system.thread_count(), 0);
}

#[test]
fn test_current_thread_inside_run() {
    let system = system();
    let matched = Arc::new(AtomicBool::new(false));

    let task = {
        let system = Arc::clone(&system);
        let matched = Arc::clone(&matched);
        Arc::new(Task::new(move |state| {
            let current = system.current_thread().map(|thread| thread.id());
            let attached = state.handle().map(|handle| handle.id());
            matched.store(current.is_some() && current == attached, Ordering::SeqCst);
        }))
    };

    let thread = spawn(&system, &task);
    thread.join();
    thread.dispose();
    assert!(matched.load(Ordering::SeqCst));
    assert!(system.current_thread().is_none());
}

#[test]
fn test_thread_ids_are_unique() {
    let system = system();
    let tasks: Vec<_> = (0..8).map(|_| Arc::new(Task::new(|_| {}))).collect();
    let threads: Vec<_> = tasks.iter().map(|task| spawn(&system, task)).collect();

    let mut ids: Vec<ThreadId> = threads.iter().map(|thread| thread.id()).collect();
    ids.sort_by_key(|id| id.value());
    ids.dedup();
    assert_eq!(ids.len(), 8);

    for thread in &threads {
        thread.join();
        thread.dispose();
    }
}

#[test]
fn test_interrupt_wakes_blocked_join() {
    let system = system();
    let stop = Arc::new(AtomicBool::new(false));

    let target_task = {
        let stop = Arc::clone(&stop);
        Arc::new(Task::new(move |_| {
            while !stop.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(1));
            }
        }))
    };
    let target = spawn(&system, &target_task);

    let joining = Arc::new(AtomicBool::new(false));
    let returned_early = Arc::new(AtomicBool::new(false));
    let joiner_task = {
        let target = Arc::clone(&target);
        let joining = Arc::clone(&joining);
        let returned_early = Arc::clone(&returned_early);
        Arc::new(Task::new(move |state| {
            joining.store(true, Ordering::SeqCst);
            target.join();
            // Returned before the target finished, with the interrupt consumed.
            returned_early.store(
                target.state().is_alive() && !state.interrupted(),
                Ordering::SeqCst,
            );
        }))
    };
    let joiner = spawn(&system, &joiner_task);

    while !joining.load(Ordering::SeqCst) {
        std::thread::yield_now();
    }
    std::thread::sleep(Duration::from_millis(20));
    joiner.interrupt();
    joiner.join();
    assert!(returned_early.load(Ordering::SeqCst));
    assert!(target.state().is_alive());
    joiner.dispose();

    // The target is still joinable once it finishes.
    stop.store(true, Ordering::SeqCst);
    target.join();
    assert_eq!(target.state(), ThreadState::Joined);
    target.dispose();
}

#[test]
fn test_join_of_finished_thread_ignores_interrupt() {
    let system = system();
    let target_task = Arc::new(Task::new(|_| {}));
    let target = spawn(&system, &target_task);

    let joined = Arc::new(AtomicBool::new(false));
    let joiner_task = {
        let target = Arc::clone(&target);
        let joined = Arc::clone(&joined);
        Arc::new(Task::new(move |state| {
            // Wait for the target to finish before interrupting ourselves.
            while target.state().is_alive() {
                std::thread::yield_now();
            }
            state.thread().unwrap().interrupt();
            target.join();
            joined.store(target.state() == ThreadState::Joined, Ordering::SeqCst);
        }))
    };

    let joiner = spawn(&system, &joiner_task);
    joiner.join();
    joiner.dispose();
    assert!(joined.load(Ordering::SeqCst));
    target.dispose();
}

#[test]
fn test_acknowledged_interrupt_does_not_cut_wait_short() {
    let system = system();
    let monitor = system.make().unwrap();
    let outcome = Arc::new(parking_lot::Mutex::new(None));

    let task = {
        let monitor = Arc::clone(&monitor);
        let outcome = Arc::clone(&outcome);
        Arc::new(Task::new(move |state| {
            let me = state.thread().unwrap();
            me.interrupt();
            assert!(state.interrupted());
            // Acknowledged by the runnable itself.
            state.set_interrupted(false);

            monitor.acquire(&*me);
            let started = Instant::now();
            let woken = monitor.wait(&*me, 50);
            let elapsed = started.elapsed();
            monitor.release(&*me);
            *outcome.lock() = Some((woken, elapsed));
        }))
    };

    let thread = spawn(&system, &task);
    thread.join();
    thread.dispose();

    let (woken, elapsed) = outcome.lock().take().expect("task ran");
    assert!(!woken);
    assert!(elapsed >= Duration::from_millis(50));
    monitor.dispose();
}

#[test]
fn test_interrupted_wait_clears_runnable_flag() {
    let system = system();
    let monitor = system.make().unwrap();
    let flag_after = Arc::new(AtomicBool::new(true));

    let task = {
        let monitor = Arc::clone(&monitor);
        let flag_after = Arc::clone(&flag_after);
        Arc::new(Task::new(move |state| {
            let me = state.thread().unwrap();
            monitor.acquire(&*me);
            me.interrupt();
            assert!(monitor.wait(&*me, 0));
            flag_after.store(state.interrupted(), Ordering::SeqCst);
            // Nothing pending any more, so this wait times out.
            assert!(!monitor.wait(&*me, 10));
            monitor.release(&*me);
        }))
    };

    let thread = spawn(&system, &task);
    thread.join();
    thread.dispose();
    assert!(!flag_after.load(Ordering::SeqCst));
    monitor.dispose();
}
