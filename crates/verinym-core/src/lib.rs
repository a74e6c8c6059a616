//! Verinym Core: Identifiers, roles, errors, and configuration shared by
//! every layer of the identity walkthrough.

pub mod config;
pub mod error;
pub mod types;

pub use config::{
    LoggingConfig, PoolConfig, ScenarioConfig, SelectionConfig, SelectionPolicyKind, TailsConfig,
    WalkthroughConfig, WalletStorageConfig, REGISTRY_CAPACITY,
};
pub use error::CoreError;
pub use types::{Did, Role, Verkey};
