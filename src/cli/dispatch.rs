use std::path::PathBuf;

use anyhow::{Context, Result};
use serde_json::json;
use tokio::io::AsyncReadExt;

use super::commands::{Cli, Commands, ScopeArg};
use crate::action::{ActorRole, ProjectLocator, RoleEvidence, derive_role};
use crate::config::Config;
use crate::hook::{self, HookResponse};
use crate::memory::{EventDraft, EventLog, MemorySource, SearchScope, TokenBudget};
use crate::pipeline::Arbiter;

async fn read_stdin() -> std::io::Result<String> {
    let mut raw = String::new();
    tokio::io::stdin().read_to_string(&mut raw).await?;
    Ok(raw)
}

fn working_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn current_role() -> (RoleEvidence, ActorRole) {
    let evidence = RoleEvidence::collect();
    let role = derive_role(&evidence);
    (evidence, role)
}

/// Print the safe `ask` response. Used when nothing else can run.
pub fn emit_fallback(reason: &str) {
    let decision = crate::decision::Decision::ask(crate::decision::DecisionSource::Fallback, reason);
    println!("{}", HookResponse::from_decision("PreToolUse", &decision).to_json());
}

pub async fn dispatch(cli: Cli, config: Config) -> Result<()> {
    let locator = ProjectLocator::from_env(cli.project.as_deref());
    let cwd = working_dir();
    let project = locator.locate(&cwd);
    tracing::debug!(project = %project.display(), "project root resolved");
    match cli.command.unwrap_or(Commands::Evaluate) {
        Commands::Evaluate => {
            let response = match read_stdin().await {
                Ok(raw) => {
                    let (_, role) = current_role();
                    hook::evaluate_payload(&config, &raw, role, &cwd, &locator).await
                }
                Err(error) => {
                    tracing::warn!(%error, "failed to read hook input");
                    emit_fallback(&format!("hook input could not be read: {error}"));
                    return Ok(());
                }
            };
            println!("{}", response.to_json());
            Ok(())
        }

        Commands::Record => {
            let raw = read_stdin().await.context("read post-tool payload")?;
            let (_, role) = current_role();
            let event = hook::record_payload(&config, &raw, role, &cwd, &locator)?;
            tracing::debug!(id = %event.id, "recorded tool call");
            Ok(())
        }

        Commands::Search {
            query,
            scope,
            memory_type,
            limit,
            session,
            budget,
        } => {
            let log = EventLog::from_config(&config, Some(&project));
            if let Some(tokens) = budget {
                let tokens = if tokens == 0 {
                    config.memory.search_budget_tokens
                } else {
                    tokens
                };
                let budget = TokenBudget::new(tokens, config.memory.scope_weights);
                if !matches!(scope, ScopeArg::Visible) {
                    tracing::warn!("--budget searches every visible scope; --scope ignored");
                }
                for event in log.search_with_budget(&query, session.as_deref(), memory_type, &budget)? {
                    println!("{}", serde_json::to_string(&event)?);
                }
                return Ok(());
            }
            let scope = match (scope, session) {
                (ScopeArg::Session, Some(id)) => SearchScope::Session(id),
                (ScopeArg::Session, None) => anyhow::bail!("--scope session requires --session"),
                (ScopeArg::User, _) => SearchScope::User,
                (ScopeArg::Shared, _) => SearchScope::Shared,
                (ScopeArg::Visible, session_id) => SearchScope::Visible { session_id },
            };
            for event in log.search(&query, &scope, memory_type, limit)? {
                println!("{}", serde_json::to_string(&event)?);
            }
            Ok(())
        }

        Commands::Remember {
            content,
            memory_type,
            scope,
            ttl_days,
            tags,
            session,
        } => {
            let mut draft = EventDraft::new(memory_type, MemorySource::User, content)
                .with_ttl_days(ttl_days)
                .for_session(session);
            if let Some(scope) = scope {
                draft = draft.with_scope(scope);
            }
            for tag in tags {
                draft = draft.with_tag(tag);
            }
            let log = EventLog::from_config(&config, Some(&project));
            let event = log.append(draft)?;
            println!("{}", serde_json::to_string(&event)?);
            Ok(())
        }

        Commands::Sweep { force } => {
            let arbiter = Arbiter::from_config(&config, &project);
            match arbiter.sweep_if_due(force)? {
                Some(report) => println!("{}", serde_json::to_string(&report)?),
                None => println!("{}", json!({ "skipped": "not due" })),
            }
            Ok(())
        }

        Commands::Promote => {
            let arbiter = Arbiter::from_config(&config, &project);
            match arbiter.promote()? {
                Some(report) => println!("{}", serde_json::to_string(&report)?),
                None => println!("{}", json!({ "skipped": "already running" })),
            }
            Ok(())
        }

        Commands::Stats => {
            let log = EventLog::from_config(&config, Some(&project));
            println!("{}", serde_json::to_string_pretty(&log.stats()?)?);
            Ok(())
        }

        Commands::ResetDelegation { reason } => {
            let arbiter = Arbiter::from_config(&config, &project);
            let cleared = arbiter.reset_delegation(&project, &reason)?;
            println!("{}", json!({ "cleared": cleared }));
            Ok(())
        }

        Commands::Status => {
            let (evidence, role) = current_role();
            let arbiter = Arbiter::from_config(&config, &project);
            let (state, count) = arbiter.enforcer().snapshot(
                &project,
                ActorRole::Orchestrator,
                chrono::Utc::now().timestamp_millis(),
            );
            let status = json!({
                "config": config.config_path,
                "project": project,
                "evidence": evidence,
                "role": role,
                "delegation": { "state": state, "count": count },
            });
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(())
        }
    }
}
