mod env_overrides;
mod loader;
pub mod schema;

pub use schema::{
    ClassifierConfig, Config, DelegationConfig, GuardConfig, MemoryConfig, OracleConfig,
    OracleKind, ScopeWeights,
};
