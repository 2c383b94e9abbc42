//! Inspect command implementation.

use paperdb_core::{EntityKind, Store};
use serde::Serialize;

/// Database inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Database location.
    pub location: String,
    /// Total rows across all tables.
    pub total_rows: i64,
    /// Per-type statistics, in registry order.
    pub types: Vec<TypeStats>,
}

/// Statistics for a single entity type.
#[derive(Debug, Serialize)]
pub struct TypeStats {
    /// Entity type name.
    pub name: String,
    /// Table name.
    pub table: String,
    /// `standard` or `config`.
    pub kind: &'static str,
    /// Number of columns.
    pub columns: usize,
    /// Number of relationships.
    pub relationships: usize,
    /// Number of rows.
    pub rows: i64,
}

/// Runs the inspect command.
pub fn run(store: &Store, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let counts = store.row_counts()?;
    let types: Vec<TypeStats> = store
        .registry()
        .iter()
        .zip(counts)
        .map(|(descriptor, (_, rows))| TypeStats {
            name: descriptor.name.clone(),
            table: descriptor.table.clone(),
            kind: match descriptor.kind {
                EntityKind::Standard => "standard",
                EntityKind::Config => "config",
            },
            columns: descriptor.columns.len(),
            relationships: descriptor.relationships.len(),
            rows,
        })
        .collect();

    let result = InspectResult {
        location: store.location(),
        total_rows: types.iter().map(|t| t.rows).sum(),
        types,
    };

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("PaperDB Database Inspection");
    println!("===========================");
    println!();
    println!("Location: {}", result.location);
    println!("Rows:     {}", result.total_rows);
    println!();
    println!("Entity types:");
    for stats in &result.types {
        println!(
            "  {:<16} {:<18} {:<8} {:>3} columns {:>2} relationships {:>6} rows",
            stats.name, stats.table, stats.kind, stats.columns, stats.relationships, stats.rows
        );
    }
}
