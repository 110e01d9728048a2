//! Operator CLI for the berth allocation engine.

use anyhow::{bail, Context};
use berth_allocation::AllocationEngine;
use berth_store::{Config, StoreBackend};

pub mod cli;
pub mod commands;
pub mod error;

pub use cli::{Cli, Command};
pub use error::AdminError;

/// Connects the configured store and wires an engine on top of it.
///
/// Each invocation is a separate process, so the in-memory backend would
/// lose every ticket between commands; only Postgres is accepted.
pub async fn build_engine(config: &Config) -> anyhow::Result<AllocationEngine> {
    if config.store.backend == StoreBackend::Memory {
        bail!("berth-admin needs store.backend = \"postgres\" and a [database] section; the in-memory store does not outlive a single command");
    }

    let store = berth_store::connect(config)
        .await
        .with_context(|| format!("failed to open {:?} ticket store", config.store.backend))?;

    Ok(AllocationEngine::new(store, config.quotas, config.passenger_rules))
}
