use hookwarden::action::{ActionKind, ActionTarget, ActorRole};
use hookwarden::config::ClassifierConfig;
use hookwarden::decision::Verdict;
use hookwarden::policy::RuleClassifier;
use proptest::prelude::*;

use crate::harness::Workspace;

const ALLOWED: &[&str] = &[
    "git status",
    "git diff --stat",
    "cargo test",
    "ls -la",
    "cat Cargo.toml",
    "npm test",
    "pytest -q",
];

const DESTRUCTIVE: &[&str] = &[
    "rm -rf /",
    "sudo apt install x",
    "git push --force origin main",
    "git reset --hard HEAD~3",
    "dd if=/dev/zero of=/dev/sda",
];

const SEPARATORS: &[&str] = &[" && ", " ; ", " || ", " | "];

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn one_destructive_segment_denies_the_whole_line(
        before in prop::collection::vec(prop::sample::select(ALLOWED), 0..3),
        after in prop::collection::vec(prop::sample::select(ALLOWED), 0..3),
        destructive in prop::sample::select(DESTRUCTIVE),
        separator in prop::sample::select(SEPARATORS),
    ) {
        let ws = Workspace::new();
        let classifier = RuleClassifier::from_config(&ClassifierConfig::default());
        let mut segments: Vec<&str> = before;
        segments.push(destructive);
        segments.extend(after);
        let line = segments.join(separator);

        let request = ws.request(
            ActorRole::Subordinate,
            ActionKind::Execute,
            ActionTarget::from_command(&line),
        );
        let decision = classifier.classify(&request);
        prop_assert_eq!(decision.map(|d| d.verdict()), Some(Verdict::Deny), "{}", line);
    }

    #[test]
    fn chains_of_allowed_commands_stay_allowed(
        segments in prop::collection::vec(prop::sample::select(ALLOWED), 1..4),
    ) {
        let ws = Workspace::new();
        let classifier = RuleClassifier::from_config(&ClassifierConfig::default());
        let line = segments.join(" && ");
        let request = ws.request(
            ActorRole::Subordinate,
            ActionKind::Execute,
            ActionTarget::from_command(&line),
        );
        let decision = classifier.classify(&request);
        prop_assert_eq!(decision.map(|d| d.verdict()), Some(Verdict::Allow), "{}", line);
    }
}
