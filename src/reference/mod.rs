pub mod data_loader;
pub mod normalize;
pub mod table;

pub use data_loader::{load_reference_entries, load_reference_file};
pub use normalize::normalize_name;
pub use table::{ReferenceEntry, ReferenceTable};

use anyhow::Result;
use std::sync::OnceLock;
use tracing::{info, warn};

/// Process-wide reference table. Set once before the first plate is built, never mutated.
static GLOBAL_TABLE: OnceLock<ReferenceTable> = OnceLock::new();

/// Installs `table` as the process-wide reference table.
///
/// Only the first install wins; later calls keep the existing table and log a warning.
pub fn install_global(table: ReferenceTable) -> &'static ReferenceTable {
    if let Some(existing) = GLOBAL_TABLE.get() {
        warn!("Reference table already installed; keeping the existing {} entries", existing.len());
        return existing;
    }
    let installed = GLOBAL_TABLE.get_or_init(|| table);
    info!("Reference table installed with {} entries", installed.len());
    installed
}

/// The process-wide table, installing the built-in one on first use.
pub fn global_table() -> Result<&'static ReferenceTable> {
    if let Some(table) = GLOBAL_TABLE.get() {
        return Ok(table);
    }
    Ok(install_global(ReferenceTable::builtin()?))
}
