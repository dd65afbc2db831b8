use chrono::{Duration, Utc};
use hookwarden::memory::{
    EventDraft, MemorySource, MemoryType, SearchScope, run_if_due, sweep,
};

use crate::harness::Workspace;

#[test]
fn expired_events_are_tombstoned_and_hidden() {
    let ws = Workspace::new();
    let log = ws.log();
    let now = Utc::now();
    let old = log
        .append_at(
            EventDraft::new(MemoryType::Decision, MemorySource::Arbiter, "deny execute rm")
                .with_ttl_days(Some(1)),
            now - Duration::days(3),
        )
        .expect("append");
    let kept = log
        .append_at(
            EventDraft::new(MemoryType::Decision, MemorySource::Arbiter, "allow execute rm")
                .with_ttl_days(Some(30)),
            now - Duration::days(3),
        )
        .expect("append");

    let report = sweep(&log, now).expect("sweep");
    assert_eq!(report.tombstoned, 1);
    assert_eq!(sweep(&log, now).expect("sweep again").tombstoned, 0);

    let live = log
        .search_at("rm", &SearchScope::Shared, None, 10, now)
        .expect("search");
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].id, kept.id);
    // Tombstoning appends; the original record stays on disk.
    assert!(log.read_all().expect("read").iter().any(|e| e.id == old.id));
}

#[test]
fn periodic_sweep_is_throttled() {
    let ws = Workspace::new();
    let log = ws.log();
    let store = ws.store();
    let now = Utc::now();
    let interval = Duration::hours(12);

    assert!(run_if_due(&log, store.as_ref(), interval, now, false).expect("first").is_some());
    assert!(
        run_if_due(&log, store.as_ref(), interval, now + Duration::hours(1), false)
            .expect("second")
            .is_none()
    );
    assert!(
        run_if_due(&log, store.as_ref(), interval, now + Duration::hours(1), true)
            .expect("forced")
            .is_some()
    );
    assert!(
        run_if_due(&log, store.as_ref(), interval, now + Duration::hours(14), false)
            .expect("due again")
            .is_some()
    );
}
