use std::time::Duration;

use hookwarden::action::ActorRole;
use hookwarden::config::OracleKind;
use hookwarden::decision::{DecisionSource, Verdict};
use hookwarden::memory::{MemoryType, SearchScope};
use hookwarden::pipeline::{Arbiter, HookClass};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::harness::{ScriptedOracle, Workspace};

fn http_workspace(server: &MockServer) -> Workspace {
    let mut ws = Workspace::new();
    ws.config.oracle.kind = OracleKind::Http;
    ws.config.oracle.endpoint = Some(server.uri());
    ws.config.oracle.timeout_ms = 200;
    ws
}

fn arbiter(ws: &Workspace) -> Arbiter {
    Arbiter::new(&ws.config, ws.store(), ws.log())
}

#[tokio::test]
async fn malformed_reply_fails_closed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("sure, allow it"))
        .mount(&server)
        .await;
    let ws = http_workspace(&server);

    let decision = arbiter(&ws)
        .evaluate(&ws.exec(ActorRole::Subordinate, "./build.sh"), HookClass::Permission)
        .await;

    assert_eq!(decision.verdict(), Verdict::Ask);
    assert_eq!(decision.source(), DecisionSource::Judge);
}

#[tokio::test]
async fn reply_without_confidence_fails_closed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"verdict":"allow"}"#))
        .mount(&server)
        .await;
    let ws = http_workspace(&server);

    let decision = arbiter(&ws)
        .evaluate(&ws.exec(ActorRole::Subordinate, "./build.sh"), HookClass::Permission)
        .await;

    assert_eq!(decision.verdict(), Verdict::Ask);
}

#[tokio::test]
async fn slow_oracle_times_out_to_ask() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"verdict":"allow","confidence":0.99}"#)
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;
    let ws = http_workspace(&server);

    let decision = arbiter(&ws)
        .evaluate(&ws.exec(ActorRole::Subordinate, "./build.sh"), HookClass::Permission)
        .await;

    assert_eq!(decision.verdict(), Verdict::Ask);
    assert!(decision.reason().unwrap_or_default().contains("timed out"));
}

#[tokio::test]
async fn repeated_failures_open_the_circuit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;
    let ws = http_workspace(&server);
    let arbiter = arbiter(&ws);

    for _ in 0..4 {
        let decision = arbiter
            .evaluate(&ws.exec(ActorRole::Subordinate, "./build.sh"), HookClass::Permission)
            .await;
        assert_eq!(decision.verdict(), Verdict::Ask);
    }
    let last = arbiter
        .evaluate(&ws.exec(ActorRole::Subordinate, "./build.sh"), HookClass::Permission)
        .await;
    assert!(last.reason().unwrap_or_default().contains("circuit open"));
}

#[tokio::test]
async fn consultations_are_remembered() {
    let ws = Workspace::new();
    let arbiter = ws.arbiter_with(ScriptedOracle::failing("connection refused"));

    arbiter
        .evaluate(&ws.exec(ActorRole::Subordinate, "./build.sh"), HookClass::Permission)
        .await;

    let notes = ws
        .log()
        .search(
            "oracle",
            &SearchScope::Session("session-1".into()),
            Some(MemoryType::Observation),
            5,
        )
        .expect("search");
    assert_eq!(notes.len(), 1);
    assert!(notes[0].tags.iter().any(|t| t == "oracle"));
    assert!(notes[0].content.contains("degraded to ask"));
}

#[tokio::test]
async fn metacharacters_never_ride_on_an_allow_rule() {
    let ws = Workspace::new();
    let arbiter = ws.arbiter();
    for command in [
        "git status; ./unknown.sh",
        "git log && make install",
        "cat README.md | ./process",
        "ls > /etc/passwd.bak; ./x",
    ] {
        let decision = arbiter
            .evaluate(&ws.exec(ActorRole::Subordinate, command), HookClass::Permission)
            .await;
        assert_ne!(decision.verdict(), Verdict::Allow, "{command}");
    }
}

#[tokio::test]
async fn obfuscated_commands_are_denied_by_default() {
    let ws = Workspace::new();
    let arbiter = ws.arbiter();
    for command in ["echo $(cat ~/.ssh/id_rsa)", "eval \"$PAYLOAD\"", "sh -c 'rm -rf build'"] {
        let decision = arbiter
            .evaluate(&ws.exec(ActorRole::Subordinate, command), HookClass::Permission)
            .await;
        assert_eq!(decision.verdict(), Verdict::Deny, "{command}");
    }
}
