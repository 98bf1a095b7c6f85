//! List-trees command implementation.

use super::{open_storage, CommandResult};
use dirstore_core::{Storage, StorageError, TreeName};
use serde::Serialize;
use std::path::Path;

/// One tree of the volume.
#[derive(Debug, Serialize)]
pub struct TreeSummary {
    /// Full tree name.
    pub name: String,
    /// Suffix prefix part of the name.
    pub prefix: String,
    /// Index part of the name.
    pub index: String,
    /// Number of records.
    pub records: u64,
}

/// Collects a summary of every tree in `storage`.
pub fn summarize(storage: &impl Storage) -> CommandResult<Vec<TreeSummary>> {
    let names = storage.list_trees()?;
    let summaries = storage.read(|txn| -> Result<Vec<TreeSummary>, StorageError> {
        names
            .iter()
            .map(|name: &TreeName| {
                Ok(TreeSummary {
                    name: name.to_string(),
                    prefix: name.prefix().to_string(),
                    index: name.index_id().to_string(),
                    records: txn.record_count(name)?,
                })
            })
            .collect()
    })?;
    Ok(summaries)
}

/// Runs the list-trees command.
pub fn run(path: &Path, format: &str) -> CommandResult<()> {
    let storage = open_storage(path)?;
    let summaries = summarize(&storage)?;
    storage.close();

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&summaries)?),
        _ => {
            println!("{:<40} {:>12}", "TREE", "RECORDS");
            for summary in &summaries {
                println!("{:<40} {:>12}", summary.name, summary.records);
            }
            println!("{} tree(s)", summaries.len());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dirstore_core::JournalStorage;

    #[test]
    fn summaries_count_records_per_tree() {
        let storage = JournalStorage::in_memory();
        storage.open().unwrap();
        storage
            .write(|txn| -> Result<(), StorageError> {
                txn.create(&TreeName::new("dccom", "dn2id"), b"\0", &[0; 8])?;
                txn.create(&TreeName::new("dccom", "id2entry"), &[0; 8], b"x")?;
                txn.create(&TreeName::new("dccom", "id2entry"), &[1; 8], b"y")
            })
            .unwrap();

        let summaries = summarize(&storage).unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[1].name, "dccom_id2entry");
        assert_eq!(summaries[1].index, "id2entry");
        assert_eq!(summaries[1].records, 2);
    }
}
