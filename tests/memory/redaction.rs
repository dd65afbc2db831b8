use hookwarden::memory::redact::REDACTED;
use hookwarden::memory::{EventDraft, MemorySource, MemoryType, SearchScope};
use serde_json::json;

use crate::harness::Workspace;

#[test]
fn credentials_never_reach_disk() {
    let ws = Workspace::new();
    let log = ws.log();
    log.append(
        EventDraft::new(
            MemoryType::Workflow,
            MemorySource::Host,
            "deploy with password=hunter2hunter2 and token ghp_abcdefghijklmnop1234",
        )
        .with_metadata("headers", json!({ "Authorization": "Bearer abc.def.ghi" })),
    )
    .expect("append");

    let raw = std::fs::read_to_string(log.path_for(hookwarden::memory::MemoryScope::Shared))
        .expect("read log");
    assert!(!raw.contains("hunter2"));
    assert!(!raw.contains("ghp_abcdefghijklmnop1234"));
    assert!(!raw.contains("abc.def.ghi"));

    let found = log
        .search("deploy", &SearchScope::Shared, None, 5)
        .expect("search");
    assert_eq!(found.len(), 1);
    assert!(found[0].content.contains(&format!("password={REDACTED}")));
    assert!(found[0].content.contains("deploy with"));
}

#[test]
fn ordinary_text_is_untouched() {
    let ws = Workspace::new();
    let log = ws.log();
    let content = "the skeleton key test in task-runner passed";
    let event = log
        .append(EventDraft::new(MemoryType::Workflow, MemorySource::Host, content))
        .expect("append");
    assert_eq!(event.content, content);
}
