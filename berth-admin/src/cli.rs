use berth_shared::Gender;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

/// Allocate, release and inspect berths.
#[derive(Parser, Debug)]
#[command(name = "berth-admin")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the berth pool from the configured layout
    Seed,

    /// Book one passenger
    Submit {
        #[arg(long)]
        name: String,

        #[arg(long, allow_negative_numbers = true)]
        age: i32,

        /// M or F
        #[arg(long)]
        gender: Option<Gender>,

        /// Passenger travels with a child under the child age
        #[arg(long)]
        with_minor: bool,
    },

    /// Book a party from a JSON array of passengers, all or nothing
    Group {
        #[arg(long)]
        file: PathBuf,
    },

    /// Cancel a ticket and promote waiting tickets
    Release { ticket_id: Uuid },

    /// List admitted tickets, newest first
    Admitted,

    /// Show free berths and remaining tier capacity
    Availability,

    /// Show a ticket's history, newest first
    History { ticket_id: Uuid },

    /// Delete a released ticket and its history
    Purge { ticket_id: Uuid },
}
