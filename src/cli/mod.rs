pub mod commands;
pub mod dispatch;

pub use commands::{Cli, Commands, ScopeArg};
pub use dispatch::{dispatch, emit_fallback};
