//! CLI command implementations.

pub mod dump_tree;
pub mod get_entry;
pub mod list_base_dns;
pub mod list_trees;

use dirstore_backend::{BackendConfig, DefaultEntryCache, Dn, RootContainer};
use dirstore_core::{JournalStorage, Storage, StorageConfig};
use std::path::Path;
use std::sync::Arc;

/// Error type shared by the commands.
pub type CommandResult<T> = Result<T, Box<dyn std::error::Error>>;

fn ensure_backend(path: &Path) -> CommandResult<()> {
    if !path.is_dir() {
        return Err(format!("no backend found at {}", path.display()).into());
    }
    Ok(())
}

/// Opens the storage engine of the backend at `path`, without creating
/// anything.
pub fn open_storage(path: &Path) -> CommandResult<JournalStorage> {
    ensure_backend(path)?;
    let storage = JournalStorage::new(
        StorageConfig::directory(path)
            .create_if_missing(false)
            .sync_on_commit(false),
    );
    storage.open()?;
    Ok(storage)
}

/// Opens the backend at `path` as a root container serving `base_dns`.
///
/// Nothing is created or written: base DNs without trees read as empty.
pub fn open_root(path: &Path, base_dns: &[String]) -> CommandResult<RootContainer<JournalStorage>> {
    ensure_backend(path)?;
    let mut config = BackendConfig::new("dirstore-cli")
        .db_directory(path)
        .sync_on_commit(false);
    for text in base_dns {
        config = config.base_dn(Dn::parse(text)?);
    }
    let storage = JournalStorage::new(config.storage_config().create_if_missing(false));
    let root = RootContainer::new(
        config,
        Arc::new(storage),
        Arc::new(DefaultEntryCache::default()),
    )?;
    root.open_read_only()?;
    Ok(root)
}

/// Lower-case hex rendering of `bytes`.
pub fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write;

    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, byte| {
        let _ = write!(out, "{byte:02x}");
        out
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_rendering() {
        assert_eq!(hex(&[0x00, 0xab, 0x10]), "00ab10");
        assert_eq!(hex(&[]), "");
    }

    #[test]
    fn inspecting_unknown_base_dn_adds_no_trees() {
        let temp = tempfile::tempdir().unwrap();
        let config = BackendConfig::new("userRoot")
            .db_directory(temp.path())
            .base_dn(Dn::parse("dc=example,dc=com").unwrap());
        let root =
            RootContainer::with_journal_storage(config, Arc::new(DefaultEntryCache::default()))
                .unwrap();
        root.open().unwrap();
        root.close();

        let storage = open_storage(temp.path()).unwrap();
        let before = storage.list_trees().unwrap();
        storage.close();

        let inspected = open_root(
            temp.path(),
            &["dc=example,dc=com".to_string(), "dc=typo,dc=com".to_string()],
        )
        .unwrap();
        assert_eq!(inspected.get_entry_count(), Some(0));
        inspected.close();

        let storage = open_storage(temp.path()).unwrap();
        assert_eq!(storage.list_trees().unwrap(), before);
        storage.close();
    }

    #[test]
    fn missing_backend_is_reported() {
        let temp = tempfile::tempdir().unwrap();
        let missing = temp.path().join("absent");
        assert!(open_storage(&missing).is_err());
        assert!(!missing.exists());
    }
}
