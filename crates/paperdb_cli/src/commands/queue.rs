//! Queue command implementation.

use super::print_json;
use clap::Subcommand;
use paperdb_core::Store;
use serde_json::json;
use tracing::info;

/// Queue subcommands.
#[derive(Debug, Subcommand)]
pub enum QueueCommand {
    /// Advance the queue by one image
    Rotate {
        /// Step backwards instead
        #[arg(short, long)]
        back: bool,
    },

    /// Rebuild the queue from the available images
    Generate {
        /// Image that should end the new queue
        #[arg(short, long)]
        current: Option<i64>,
    },
}

/// Runs a queue subcommand.
pub fn run(store: &Store, command: QueueCommand) -> Result<(), Box<dyn std::error::Error>> {
    info!("Updating media queue: {:?}", command);
    let settings = store.settings();
    let image = match command {
        QueueCommand::Rotate { back } => settings.rotate_media_queue(!back)?,
        QueueCommand::Generate { current } => settings.generate_media_queue(current)?,
    };
    print_json(&json!({"current": image.current, "queue": image.queue}))
}
