//! Dump-tree command implementation.

use super::{hex, open_storage, CommandResult};
use dirstore_core::{Storage, StorageError, TreeName};
use std::path::Path;

/// Reads up to `limit` records of `tree` in key order.
pub fn collect(
    storage: &impl Storage,
    tree: &TreeName,
    limit: Option<usize>,
) -> CommandResult<Vec<(Vec<u8>, Vec<u8>)>> {
    let limit = limit.unwrap_or(usize::MAX);
    let records = storage.read(|txn| -> Result<_, StorageError> {
        let mut cursor = txn.open_cursor(tree)?;
        let mut records = Vec::new();
        while records.len() < limit && cursor.next()? {
            if let (Some(key), Some(value)) = (cursor.key(), cursor.value()) {
                records.push((key.to_vec(), value.to_vec()));
            }
        }
        Ok(records)
    })?;
    Ok(records)
}

/// Runs the dump-tree command.
pub fn run(path: &Path, tree: &str, limit: Option<usize>) -> CommandResult<()> {
    let name = TreeName::parse(tree).ok_or_else(|| format!("invalid tree name {tree:?}"))?;
    let storage = open_storage(path)?;
    if !storage.list_trees()?.contains(&name) {
        storage.close();
        return Err(format!("no tree named {name}").into());
    }
    let records = collect(&storage, &name, limit)?;
    storage.close();

    for (key, value) in &records {
        println!("{} => {}", hex(key), hex(value));
    }
    println!("{} record(s)", records.len());
    Ok(())
}
