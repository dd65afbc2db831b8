use hookwarden::memory::{EventDraft, MemoryScope, MemorySource, MemoryType, SearchScope};
use proptest::prelude::*;

use crate::harness::Workspace;

const SESSIONS: &[&str] = &["alpha", "beta", "gamma"];

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn session_records_stay_in_their_session(
        writes in prop::collection::vec(
            (prop::sample::select(SESSIONS), any::<bool>()),
            1..12,
        ),
        reader in prop::sample::select(SESSIONS),
    ) {
        let ws = Workspace::new();
        let log = ws.log();
        for (session, private) in &writes {
            let draft = EventDraft::new(
                MemoryType::Observation,
                MemorySource::Host,
                format!("build output seen by {session}"),
            )
            .for_session(Some((*session).to_string()));
            let draft = if *private { draft } else { draft.with_scope(MemoryScope::Shared) };
            log.append(draft).expect("append");
        }

        let own = log
            .search("build", &SearchScope::Session(reader.to_string()), None, 100)
            .expect("search");
        prop_assert!(own.iter().all(|e| e.session_id.as_deref() == Some(reader)
            && e.scope == MemoryScope::Session));
        let expected_own = writes.iter().filter(|(s, p)| *p && *s == reader).count();
        prop_assert_eq!(own.len(), expected_own);

        let visible = log
            .search(
                "build",
                &SearchScope::Visible { session_id: Some(reader.to_string()) },
                None,
                100,
            )
            .expect("search");
        prop_assert!(visible.iter().all(|e| e.scope != MemoryScope::Session
            || e.session_id.as_deref() == Some(reader)));

        let anonymous = log
            .search("build", &SearchScope::Visible { session_id: None }, None, 100)
            .expect("search");
        prop_assert!(anonymous.iter().all(|e| e.scope != MemoryScope::Session));
    }
}

#[test]
fn user_scope_lives_in_the_global_log() {
    let ws = Workspace::new();
    let log = ws.log();
    log.append(EventDraft::new(
        MemoryType::Preference,
        MemorySource::User,
        "prefers small focused commits",
    ))
    .expect("append");

    let other_project = hookwarden::memory::EventLog::from_config(
        &ws.config,
        Some(&ws.temp.path().join("elsewhere")),
    );
    let found = other_project
        .search("commits", &SearchScope::User, None, 5)
        .expect("search");
    assert_eq!(found.len(), 1);
    assert!(found[0].importance_score > 0.5);
}
