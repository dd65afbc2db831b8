use hookwarden::action::ActorRole;
use hookwarden::decision::{DecisionSource, Verdict};
use hookwarden::memory::{MemoryType, SearchScope};
use hookwarden::pipeline::HookClass;

use crate::harness::{ScriptedOracle, Workspace};

#[tokio::test]
async fn recursive_root_delete_is_denied() {
    let ws = Workspace::new();
    let oracle = ScriptedOracle::replying(r#"{"verdict":"allow","confidence":0.99}"#);
    let arbiter = ws.arbiter_with(oracle.clone());

    let decision = arbiter
        .evaluate(&ws.exec(ActorRole::Subordinate, "rm -rf /"), HookClass::Permission)
        .await;

    assert_eq!(decision.verdict(), Verdict::Deny);
    assert_eq!(decision.rule_id(), Some("rm-root"));
    assert_eq!(oracle.calls(), 0, "a matched rule must not consult the oracle");
}

#[tokio::test]
async fn read_only_git_is_allowed_without_oracle() {
    let ws = Workspace::new();
    let oracle = ScriptedOracle::replying(r#"{"verdict":"deny","confidence":0.99}"#);
    let arbiter = ws.arbiter_with(oracle.clone());

    let decision = arbiter
        .evaluate(&ws.exec(ActorRole::Subordinate, "git status"), HookClass::Permission)
        .await;

    assert_eq!(decision.verdict(), Verdict::Allow);
    assert_eq!(decision.source(), DecisionSource::Classifier);
    assert_eq!(oracle.calls(), 0);
}

#[tokio::test]
async fn low_confidence_oracle_answer_asks() {
    let ws = Workspace::new();
    let oracle = ScriptedOracle::replying(
        r#"{"verdict":"allow","confidence":0.4,"reason":"looks like a build script"}"#,
    );
    let arbiter = ws.arbiter_with(oracle.clone());

    let decision = arbiter
        .evaluate(
            &ws.exec(ActorRole::Subordinate, "./scripts/custom-release.sh --dry-run"),
            HookClass::Permission,
        )
        .await;

    assert_eq!(oracle.calls(), 1);
    assert_eq!(decision.verdict(), Verdict::Ask);
    assert_eq!(decision.source(), DecisionSource::Judge);
    assert_eq!(decision.confidence(), Some(0.4));
}

#[tokio::test]
async fn confident_oracle_answer_is_taken() {
    let ws = Workspace::new();
    let arbiter = ws.arbiter_with(ScriptedOracle::replying(
        r#"{"verdict":"allow","confidence":0.92}"#,
    ));

    let decision = arbiter
        .evaluate(&ws.exec(ActorRole::Subordinate, "make docs"), HookClass::Permission)
        .await;

    assert_eq!(decision.verdict(), Verdict::Allow);
    assert_eq!(decision.rule_id(), Some("oracle:scripted"));
}

#[tokio::test]
async fn secret_paths_are_denied_for_every_role() {
    let ws = Workspace::new();
    let arbiter = ws.arbiter();
    for role in [ActorRole::Orchestrator, ActorRole::Subordinate] {
        let decision = arbiter
            .evaluate(&ws.write(role, ".env"), HookClass::Permission)
            .await;
        assert_eq!(decision.verdict(), Verdict::Deny, "role {role}");
    }
}

#[tokio::test]
async fn every_evaluation_is_recorded() {
    let ws = Workspace::new();
    let arbiter = ws.arbiter();
    arbiter
        .evaluate(&ws.exec(ActorRole::Subordinate, "git log"), HookClass::Permission)
        .await;
    arbiter
        .evaluate(&ws.exec(ActorRole::Subordinate, "sudo ls"), HookClass::Permission)
        .await;

    let decisions = ws
        .log()
        .search(
            "",
            &SearchScope::Visible {
                session_id: Some("session-1".into()),
            },
            Some(MemoryType::Decision),
            10,
        )
        .expect("search");
    assert_eq!(decisions.len(), 2);
    let verdicts: Vec<_> = decisions
        .iter()
        .map(|e| e.metadata["decision"]["verdict"].as_str().unwrap_or_default().to_string())
        .collect();
    assert!(verdicts.contains(&"allow".to_string()));
    assert!(verdicts.contains(&"deny".to_string()));
}
