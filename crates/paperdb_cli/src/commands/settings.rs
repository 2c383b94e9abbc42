//! Settings command implementation.

use super::{print_json, ArgumentError};
use clap::Subcommand;
use paperdb_core::Store;
use tracing::info;

/// Settings subcommands.
#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    /// Print a settings value
    Get {
        /// Settings key (token, password, image, ...)
        key: String,
    },

    /// Replace a settings value
    Set {
        /// Settings key
        key: String,

        /// New value as JSON
        value: String,
    },
}

/// Runs a settings subcommand.
pub fn run(store: &Store, command: SettingsCommand) -> Result<(), Box<dyn std::error::Error>> {
    let settings = store.settings();
    match command {
        SettingsCommand::Get { key } => {
            if key == paperdb_core::settings::CIPHER {
                return Err("the cipher secret is not printed".into());
            }
            print_json(&settings.get(&key)?)
        }
        SettingsCommand::Set { key, value } => {
            let value = serde_json::from_str(&value).map_err(|err| ArgumentError::InvalidJson {
                key: key.clone(),
                message: err.to_string(),
            })?;
            info!("Replacing settings {:?}", key);
            settings.set(&key, &value)?;
            println!("Updated {key}");
            Ok(())
        }
    }
}
