use anyhow::Context;
use berth_allocation::{AllocationEngine, PassengerInput};
use berth_core::PoolLayout;
use serde_json::{json, Value};
use std::path::Path;
use tracing::info;

use crate::cli::Command;
use crate::error::AdminError;

/// Runs one command and returns what should be printed on success.
pub async fn run(engine: &AllocationEngine, pool: &PoolLayout, command: Command) -> Result<Value, AdminError> {
    let output = match command {
        Command::Seed => {
            let created = engine.initialize_pool(pool).await?;
            info!("Seed created {} berths", created);
            json!({ "created": created, "layout": pool })
        }
        Command::Submit { name, age, gender, with_minor } => {
            let input = PassengerInput {
                gender,
                has_dependent_minor: with_minor.then_some(true),
                ..PassengerInput::new(name, age)
            };
            serde_json::to_value(engine.submit_request(input).await?)?
        }
        Command::Group { file } => {
            let party = read_party(&file).map_err(AdminError::Input)?;
            serde_json::to_value(engine.submit_group(party).await?)?
        }
        Command::Release { ticket_id } => serde_json::to_value(engine.release_request(ticket_id).await?)?,
        Command::Admitted => serde_json::to_value(engine.list_admitted().await?)?,
        Command::Availability => serde_json::to_value(engine.list_free_resources().await?)?,
        Command::History { ticket_id } => serde_json::to_value(engine.ticket_history(ticket_id).await?)?,
        Command::Purge { ticket_id } => {
            engine.purge_ticket(ticket_id).await?;
            json!({ "purged": ticket_id })
        }
    };
    Ok(output)
}

fn read_party(path: &Path) -> anyhow::Result<Vec<PassengerInput>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not a JSON array of passengers", path.display()))
}
