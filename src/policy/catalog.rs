//! Built-in rule catalog. User rules from config are evaluated ahead of
//! these within each verdict class.

use super::rules::{CommandPattern, Rule, RuleVerdict};
use crate::action::{ActionKind, Indicator};

fn command_rule(
    id: &str,
    verdict: RuleVerdict,
    pattern: CommandPattern,
    reason: Option<&str>,
) -> Rule {
    Rule {
        id: id.into(),
        verdict,
        kinds: vec![ActionKind::Execute],
        command: Some(pattern),
        indicators: vec![],
        paths: vec![],
        project_only: false,
        reason: reason.map(String::from),
    }
}

fn cmd(program: &str, subcommands: &[&str], flags: &[&str], args: &[&str]) -> CommandPattern {
    let owned = |items: &[&str]| items.iter().map(|s| (*s).to_string()).collect();
    CommandPattern {
        program: program.into(),
        subcommands: owned(subcommands),
        flags: owned(flags),
        args: owned(args),
    }
}

fn deny(id: &str, pattern: CommandPattern, reason: &str) -> Rule {
    command_rule(id, RuleVerdict::Deny, pattern, Some(reason))
}

fn allow(id: &str, pattern: CommandPattern) -> Rule {
    command_rule(id, RuleVerdict::Allow, pattern, None)
}

#[must_use]
pub fn builtin_rules() -> Vec<Rule> {
    let mut rules = vec![
        deny(
            "rm-root",
            cmd("rm", &[], &["-r|-R|--recursive"], &["/", "/*"]),
            "recursive delete of the filesystem root",
        ),
        deny(
            "rm-home",
            cmd("rm", &[], &["-r|-R|--recursive"], &["~", "~/", "~/*", "$HOME", "$HOME/*"]),
            "recursive delete of the home directory",
        ),
        deny("sudo", cmd("sudo|doas", &[], &[], &[]), "privilege escalation"),
        deny(
            "dd-device",
            cmd("dd", &[], &[], &["of=/dev/*"]),
            "raw write to a block device",
        ),
        deny("mkfs", cmd("mkfs*", &[], &[], &[]), "filesystem creation"),
        deny("fdisk", cmd("fdisk|sfdisk|parted", &[], &[], &[]), "partition table edit"),
        deny(
            "shutdown",
            cmd("shutdown|reboot|halt|poweroff", &[], &[], &[]),
            "host power state change",
        ),
        deny("kill-all", cmd("kill", &[], &[], &["-1"]), "signals every process"),
        deny(
            "chmod-root",
            cmd("chmod|chown", &[], &["-R|--recursive"], &["/", "/*", "~", "~/"]),
            "recursive permission change at a root",
        ),
        deny(
            "git-clean-force",
            cmd("git", &["clean"], &["-f|--force"], &[]),
            "irreversible removal of untracked files",
        ),
        deny(
            "git-reset-hard",
            cmd("git", &["reset"], &["--hard"], &[]),
            "discards uncommitted work",
        ),
        deny(
            "git-push-force",
            cmd("git", &["push"], &["-f|--force|--force-with-lease"], &[]),
            "rewrites remote history",
        ),
        deny(
            "gh-repo-delete",
            cmd("gh", &["repo"], &[], &["delete"]),
            "deletes a hosted repository",
        ),
    ];

    rules.push(Rule {
        indicators: vec![Indicator::PipeToInterpreter],
        ..deny(
            "curl-pipe-shell",
            cmd("curl|wget", &[], &[], &[]),
            "downloaded script piped into an interpreter",
        )
    });

    rules.extend([
        allow(
            "git-read",
            cmd(
                "git",
                &[
                    "status", "diff", "log", "show", "rev-parse", "blame", "ls-files",
                    "describe", "shortlog",
                ],
                &[],
                &[],
            ),
        ),
        allow(
            "cargo-dev",
            cmd(
                "cargo",
                &["build", "test", "check", "clippy", "fmt", "doc", "tree", "metadata", "run", "bench"],
                &[],
                &[],
            ),
        ),
        allow("npm-dev", cmd("npm|pnpm|yarn", &["test", "run", "ci", "install", "ls"], &[], &[])),
        allow("pytest", cmd("pytest", &[], &[], &[])),
        allow(
            "inspect",
            cmd(
                "ls|cat|head|tail|wc|grep|rg|pwd|echo|which|stat|du|df|diff",
                &[],
                &[],
                &[],
            ),
        ),
    ]);

    rules.extend([
        Rule {
            id: "read-any".into(),
            verdict: RuleVerdict::Allow,
            kinds: vec![ActionKind::Read],
            command: None,
            indicators: vec![],
            paths: vec!["**".into()],
            project_only: false,
            reason: None,
        },
        Rule {
            id: "write-project".into(),
            verdict: RuleVerdict::Allow,
            kinds: vec![ActionKind::Write],
            command: None,
            indicators: vec![],
            paths: vec![],
            project_only: true,
            reason: None,
        },
        Rule {
            id: "delegate".into(),
            verdict: RuleVerdict::Allow,
            kinds: vec![ActionKind::Delegate],
            command: None,
            indicators: vec![],
            paths: vec![],
            project_only: false,
            reason: None,
        },
    ]);
    rules
}
