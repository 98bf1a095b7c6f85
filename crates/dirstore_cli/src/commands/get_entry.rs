//! Get-entry command implementation.

use super::{open_root, CommandResult};
use dirstore_backend::{BackendError, Dn};
use std::path::Path;

/// Runs the get-entry command.
pub fn run(path: &Path, base_dns: &[String], dn: &str) -> CommandResult<()> {
    let dn = Dn::parse(dn)?;
    let root = open_root(path, base_dns)?;

    let result = match root.get_suffix_container(&dn) {
        Some(suffix) => suffix.get_entry(&dn),
        None => Err(BackendError::NoSuchSuffix { dn: dn.clone() }),
    };
    root.close();

    match result? {
        Some(entry) => {
            println!("dn: {}", entry.dn());
            for (attribute, values) in entry.attributes() {
                for value in values {
                    println!("{attribute}: {value}");
                }
            }
        }
        None => println!("{dn}: not found"),
    }
    Ok(())
}
