use std::fs::OpenOptions;
use std::io::Write;

use hookwarden::memory::{EventDraft, MemoryScope, MemorySource, MemoryType};

use crate::harness::Workspace;

fn note(n: usize) -> EventDraft {
    EventDraft::new(MemoryType::Research, MemorySource::Host, format!("finding number {n}"))
        .with_scope(MemoryScope::Shared)
        .with_tag(format!("n{n}"))
}

#[test]
fn events_come_back_in_append_order() {
    let ws = Workspace::new();
    let log = ws.log();
    let written: Vec<_> = (0..20)
        .map(|n| log.append(note(n)).expect("append"))
        .collect();

    let read = log.read_all().expect("read");
    let ids = |events: &[hookwarden::memory::MemoryEvent]| {
        events.iter().map(|e| (e.id.clone(), e.content.clone())).collect::<Vec<_>>()
    };
    assert_eq!(ids(&read), ids(&written));
}

#[test]
fn torn_tail_costs_only_the_torn_record() {
    let ws = Workspace::new();
    let log = ws.log();
    for n in 0..3 {
        log.append(note(n)).expect("append");
    }
    // A writer died mid-record.
    let mut file = OpenOptions::new()
        .append(true)
        .open(log.path_for(MemoryScope::Shared))
        .expect("open log");
    file.write_all(br#"{"record":"event","id":"0192","content":"half a rec"#)
        .expect("tear");
    drop(file);

    let after = log.append(note(3)).expect("append after tear");

    let read = log.read_all().expect("read");
    assert_eq!(read.len(), 4);
    assert_eq!(read.last().map(|e| e.id.as_str()), Some(after.id.as_str()));
}

#[test]
fn foreign_lines_are_skipped() {
    let ws = Workspace::new();
    let log = ws.log();
    log.append(note(0)).expect("append");
    let mut file = OpenOptions::new()
        .append(true)
        .open(log.path_for(MemoryScope::Shared))
        .expect("open log");
    writeln!(file, "not json at all").expect("write");
    writeln!(file, r#"{{"record":"unknown_kind"}}"#).expect("write");
    drop(file);
    log.append(note(1)).expect("append");

    assert_eq!(log.read_all().expect("read").len(), 2);
}

#[cfg(unix)]
#[test]
fn log_files_are_private() {
    use std::os::unix::fs::PermissionsExt;

    let ws = Workspace::new();
    let log = ws.log();
    log.append(note(0)).expect("append");
    let mode = std::fs::metadata(log.path_for(MemoryScope::Shared))
        .expect("metadata")
        .permissions()
        .mode();
    assert_eq!(mode & 0o077, 0);
}
