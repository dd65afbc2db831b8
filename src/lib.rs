#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::unnecessary_literal_bound,
    clippy::module_name_repetitions,
    clippy::struct_field_names,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::return_self_not_must_use
)]

pub mod action;
pub mod cli;
pub mod config;
pub mod decision;
pub mod delegation;
pub mod error;
pub mod guard;
pub mod hook;
pub mod judge;
pub mod memory;
pub mod pipeline;
pub mod policy;
pub mod state;

pub use action::{ActionKind, ActionRequest, ActionTarget, ActorRole};
pub use config::Config;
pub use decision::{Decision, DecisionSource, Verdict};
pub use error::{Result, WardenError};
pub use pipeline::{Arbiter, HookClass};
