//! List-base-dns command implementation.

use super::{open_root, CommandResult};
use std::path::Path;

/// Runs the list-base-dns command.
pub fn run(path: &Path, base_dns: &[String]) -> CommandResult<()> {
    let root = open_root(path, base_dns)?;

    println!("{:<40} {:<24} {:>10}", "BASE DN", "PREFIX", "ENTRIES");
    for suffix in root.suffix_containers() {
        let count = suffix
            .entry_count()
            .map_or_else(|| "unknown".to_string(), |count| count.to_string());
        println!(
            "{:<40} {:<24} {:>10}",
            suffix.base_dn().to_string(),
            suffix.prefix(),
            count
        );
    }
    let total = root
        .get_entry_count()
        .map_or_else(|| "unknown".to_string(), |count| count.to_string());
    println!("total entries: {total}");

    root.close();
    Ok(())
}
