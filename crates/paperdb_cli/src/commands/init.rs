//! Init command implementation.

use paperdb_core::Store;
use tracing::info;

/// Runs the init command. Opening the store already bootstrapped it.
pub fn run(store: &Store) -> Result<(), Box<dyn std::error::Error>> {
    info!("Initializing {}", store.location());
    let rows: i64 = store.row_counts()?.iter().map(|(_, n)| n).sum();
    println!("Initialized {} ({} rows)", store.location(), rows);
    Ok(())
}
