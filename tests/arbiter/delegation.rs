use hookwarden::action::{ActorRole, ProjectLocator};
use hookwarden::decision::{DecisionSource, Verdict};
use hookwarden::delegation::{DELEGATION_RULE_ID, WindowState};
use hookwarden::hook;
use hookwarden::pipeline::{Arbiter, HookClass};

use crate::harness::{ScriptedOracle, Workspace};

async fn run(arbiter: &Arbiter, ws: &Workspace, count: usize) -> Vec<(Verdict, bool)> {
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let decision = arbiter
            .evaluate(&ws.exec(ActorRole::Orchestrator, "cargo test"), HookClass::Permission)
            .await;
        out.push((decision.verdict(), decision.advisory().is_some()));
    }
    out
}

#[tokio::test]
async fn verdicts_follow_the_window_thresholds() {
    let ws = Workspace::new();
    let arbiter = ws.arbiter();

    let verdicts = run(&arbiter, &ws, 6).await;

    assert_eq!(
        verdicts,
        vec![
            (Verdict::Allow, false),
            (Verdict::Allow, false),
            (Verdict::Allow, true),
            (Verdict::Allow, true),
            (Verdict::Deny, false),
            (Verdict::Deny, false),
        ]
    );
}

#[tokio::test]
async fn sixth_direct_action_is_denied_whatever_the_oracle_says() {
    let ws = Workspace::new();
    let oracle = ScriptedOracle::replying(r#"{"verdict":"allow","confidence":1.0}"#);
    let arbiter = ws.arbiter_with(oracle.clone());
    run(&arbiter, &ws, 5).await;

    let decision = arbiter
        .evaluate(
            &ws.exec(ActorRole::Orchestrator, "./deploy.sh"),
            HookClass::Permission,
        )
        .await;

    assert_eq!(decision.verdict(), Verdict::Deny);
    assert_eq!(decision.source(), DecisionSource::Enforcer);
    assert_eq!(decision.rule_id(), Some(DELEGATION_RULE_ID));
    assert!(decision.reason().unwrap_or_default().contains("delegate"));
    assert_eq!(oracle.calls(), 0, "a blocked window skips the oracle");
}

#[tokio::test]
async fn delegating_restarts_the_count() {
    let ws = Workspace::new();
    let arbiter = ws.arbiter();
    run(&arbiter, &ws, 4).await;

    let delegated = arbiter.evaluate(&ws.delegate(), HookClass::Permission).await;
    assert_eq!(delegated.verdict(), Verdict::Allow);
    let (state, count) =
        arbiter
            .enforcer()
            .snapshot(&ws.project(), ActorRole::Orchestrator, chrono::Utc::now().timestamp_millis());
    assert_eq!((state, count), (WindowState::Idle, 0));

    let verdicts = run(&arbiter, &ws, 3).await;
    assert_eq!(verdicts[0], (Verdict::Allow, false));
    assert_eq!(verdicts[2], (Verdict::Allow, true));
}

#[tokio::test]
async fn subordinates_are_never_counted() {
    let ws = Workspace::new();
    let arbiter = ws.arbiter();
    for _ in 0..8 {
        let decision = arbiter
            .evaluate(&ws.exec(ActorRole::Subordinate, "cargo build"), HookClass::Permission)
            .await;
        assert_eq!(decision.verdict(), Verdict::Allow);
    }
    let (state, _) =
        arbiter
            .enforcer()
            .snapshot(&ws.project(), ActorRole::Subordinate, chrono::Utc::now().timestamp_millis());
    assert_eq!(state, WindowState::Idle);
}

#[tokio::test]
async fn allowlisted_paths_do_not_advance_the_window() {
    let ws = Workspace::new();
    let arbiter = ws.arbiter();
    for _ in 0..6 {
        let decision = arbiter
            .evaluate(&ws.write(ActorRole::Orchestrator, "Cargo.toml"), HookClass::Permission)
            .await;
        assert_eq!(decision.verdict(), Verdict::Allow);
    }
}

#[tokio::test]
async fn manual_reset_clears_a_blocked_window() {
    let ws = Workspace::new();
    let arbiter = ws.arbiter();
    run(&arbiter, &ws, 5).await;

    let cleared = arbiter
        .reset_delegation(&ws.project(), "reviewed by a human")
        .expect("reset");
    assert_eq!(cleared, 5);

    let verdicts = run(&arbiter, &ws, 1).await;
    assert_eq!(verdicts, vec![(Verdict::Allow, false)]);
}

#[tokio::test]
async fn changing_directory_inside_the_repository_keeps_one_window() {
    let ws = Workspace::new();
    let root = ws.project();
    std::fs::create_dir_all(root.join(".git")).expect("vcs marker");
    std::fs::create_dir_all(root.join("src").join("api")).expect("subdir");
    let locator = ProjectLocator::default();

    let call = |cwd: &std::path::Path| {
        serde_json::json!({
            "tool_name": "Bash",
            "tool_input": { "command": "cargo test" },
            "hook_event_name": "PreToolUse",
            "session_id": "session-1",
            "cwd": cwd,
        })
        .to_string()
    };

    for cwd in [root.clone(), root.join("src"), root.clone(), root.join("src").join("api"), root.clone()] {
        let response =
            hook::evaluate_payload(&ws.config, &call(&cwd), ActorRole::Orchestrator, &cwd, &locator)
                .await;
        assert_eq!(response.verdict(), Verdict::Allow);
    }

    let nested = root.join("src");
    let response =
        hook::evaluate_payload(&ws.config, &call(&nested), ActorRole::Orchestrator, &nested, &locator)
            .await;
    assert_eq!(response.verdict(), Verdict::Deny);
    let reason = response
        .hook_specific_output
        .permission_decision_reason
        .unwrap_or_default();
    assert!(reason.contains("delegate"), "{reason}");

    let (state, count) = ws.arbiter().enforcer().snapshot(
        &root,
        ActorRole::Orchestrator,
        chrono::Utc::now().timestamp_millis(),
    );
    assert_eq!(state, WindowState::Block);
    assert!(count >= 5, "window holds {count}");
}
