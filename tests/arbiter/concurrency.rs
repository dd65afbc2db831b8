use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use hookwarden::action::ActorRole;
use hookwarden::config::DelegationConfig;
use hookwarden::delegation::DelegationEnforcer;
use hookwarden::guard::{Acquire, ReentrancyGuard};
use hookwarden::memory::{EventDraft, MemorySource, MemoryType};
use hookwarden::state::{FsStateStore, StateStore};

use crate::harness::Workspace;

const CONTENDERS: usize = 8;

fn fresh_store(ws: &Workspace) -> Arc<dyn StateStore> {
    // One store per contender, as separate hook processes would have.
    Arc::new(FsStateStore::from_config(&ws.config))
}

#[test]
fn exactly_one_contender_acquires_a_topic() {
    let ws = Arc::new(Workspace::new());
    let barrier = Arc::new(Barrier::new(CONTENDERS));
    let now = chrono::Utc::now().timestamp_millis();

    let handles: Vec<_> = (0..CONTENDERS)
        .map(|_| {
            let ws = Arc::clone(&ws);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let guard = ReentrancyGuard::new(fresh_store(&ws));
                barrier.wait();
                guard
                    .try_acquire("permission-execute", Duration::from_secs(30), now)
                    .expect("lock dir usable")
            })
        })
        .collect();

    let outcomes: Vec<Acquire> = handles
        .into_iter()
        .map(|h| h.join().expect("contender panicked"))
        .collect();
    let held = outcomes.iter().filter(|o| o.is_held()).count();
    assert_eq!(held, 1, "outcomes: {outcomes:?}");
}

#[test]
fn guarded_section_never_has_two_holders() {
    const THREADS: usize = 16;
    const ROUNDS: usize = 400;
    let ws = Arc::new(Workspace::new());
    let barrier = Arc::new(Barrier::new(THREADS));
    let inside = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let entries = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let ws = Arc::clone(&ws);
            let barrier = Arc::clone(&barrier);
            let inside = Arc::clone(&inside);
            let peak = Arc::clone(&peak);
            let entries = Arc::clone(&entries);
            thread::spawn(move || {
                let guard = ReentrancyGuard::new(fresh_store(&ws));
                barrier.wait();
                for _ in 0..ROUNDS {
                    let Some(token) = guard.enter("permission-execute", Duration::from_secs(30))
                    else {
                        continue;
                    };
                    let now_inside = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now_inside, Ordering::SeqCst);
                    entries.fetch_add(1, Ordering::SeqCst);
                    thread::yield_now();
                    inside.fetch_sub(1, Ordering::SeqCst);
                    drop(token);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("contender panicked");
    }

    assert_eq!(peak.load(Ordering::SeqCst), 1);
    assert!(entries.load(Ordering::SeqCst) > 0);
    let leftover = ws.store().marker_stamp("permission-execute").expect("readable");
    assert_eq!(leftover, None);
}

#[test]
fn stale_marker_is_reclaimed_once() {
    let ws = Workspace::new();
    let guard = ReentrancyGuard::new(ws.store());
    let now = chrono::Utc::now().timestamp_millis();
    let timeout = Duration::from_secs(30);

    assert_eq!(
        guard.try_acquire("permission-write", timeout, now - 120_000).expect("acquire"),
        Acquire::Acquired
    );
    // Holder crashed without releasing.
    assert_eq!(
        guard.try_acquire("permission-write", timeout, now).expect("reclaim"),
        Acquire::Reclaimed
    );
    assert_eq!(
        guard.try_acquire("permission-write", timeout, now).expect("contend"),
        Acquire::Contended
    );
    guard.release("permission-write");
    assert!(guard.acquire("permission-write", timeout));
}

#[test]
fn concurrent_window_updates_are_not_lost() {
    let ws = Arc::new(Workspace::new());
    let barrier = Arc::new(Barrier::new(CONTENDERS));
    let config = DelegationConfig {
        warn_at: 100,
        block_at: 200,
        ..DelegationConfig::default()
    };

    let handles: Vec<_> = (0..CONTENDERS)
        .map(|_| {
            let ws = Arc::clone(&ws);
            let barrier = Arc::clone(&barrier);
            let config = config.clone();
            thread::spawn(move || {
                let enforcer = DelegationEnforcer::new(fresh_store(&ws), config);
                let request = ws.exec(ActorRole::Orchestrator, "cargo build");
                barrier.wait();
                enforcer.observe(&request, chrono::Utc::now().timestamp_millis());
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("observer panicked");
    }

    let enforcer = DelegationEnforcer::new(ws.store(), config);
    let (_, count) = enforcer.snapshot(
        &ws.project(),
        ActorRole::Orchestrator,
        chrono::Utc::now().timestamp_millis(),
    );
    assert_eq!(count, CONTENDERS);
}

#[test]
fn concurrent_appends_keep_every_record_whole() {
    const PER_WRITER: usize = 25;
    let ws = Arc::new(Workspace::new());
    let barrier = Arc::new(Barrier::new(CONTENDERS));

    let handles: Vec<_> = (0..CONTENDERS)
        .map(|writer| {
            let ws = Arc::clone(&ws);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let log = ws.log();
                barrier.wait();
                for n in 0..PER_WRITER {
                    let content = format!("writer {writer} note {n} {}", "x".repeat(512));
                    log.append(
                        EventDraft::new(MemoryType::Workflow, MemorySource::Recorder, content),
                    )
                    .expect("append");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("writer panicked");
    }

    let events = ws.log().read_all().expect("read");
    assert_eq!(events.len(), CONTENDERS * PER_WRITER);
    let ids: HashSet<_> = events.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids.len(), events.len());
}
