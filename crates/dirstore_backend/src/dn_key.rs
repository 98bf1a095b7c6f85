//! Suffix-relative DN keys.
//!
//! A DN is keyed by its RDNs below the suffix base, base side first, each
//! normalised RDN followed by a `0x00` byte. The base entry has no relative
//! RDNs and uses the single byte `0x00`, which sorts before every other
//! key. Everything below a DN shares that DN's key as a prefix, so a
//! subtree is one contiguous key range.

use crate::dn::{Dn, Rdn};
use crate::error::{BackendError, BackendResult};

/// Separator written after every RDN.
pub const RDN_SEPARATOR: u8 = 0x00;

/// Key of the suffix base entry.
pub const BASE_KEY: &[u8] = &[RDN_SEPARATOR];

/// Encodes `dn` relative to `base`.
pub fn encode(dn: &Dn, base: &Dn) -> BackendResult<Vec<u8>> {
    if !dn.is_descendant_of(base) {
        return Err(BackendError::invalid_dn(
            dn.to_string(),
            format!("not below base DN {base}"),
        ));
    }
    let relative = &dn.rdns()[..dn.size() - base.size()];
    if relative.is_empty() {
        return Ok(BASE_KEY.to_vec());
    }
    let mut key = Vec::new();
    for rdn in relative.iter().rev() {
        key.extend_from_slice(rdn.to_string().as_bytes());
        key.push(RDN_SEPARATOR);
    }
    Ok(key)
}

/// Rebuilds the DN a key was encoded from.
pub fn decode(key: &[u8], base: &Dn) -> BackendResult<Dn> {
    if key == BASE_KEY {
        return Ok(base.clone());
    }
    let Some(body) = key.strip_suffix(BASE_KEY) else {
        return Err(BackendError::codec("DN key is not separator-terminated"));
    };
    let mut dn = base.clone();
    for component in body.split(|byte| *byte == RDN_SEPARATOR) {
        let text = std::str::from_utf8(component)
            .map_err(|_| BackendError::codec("DN key is not valid UTF-8"))?;
        dn = dn.child(Rdn::parse(text)?);
    }
    Ok(dn)
}

/// Returns the prefix shared by the keys of every entry below `parent_key`.
pub fn subtree_prefix(parent_key: &[u8]) -> &[u8] {
    if parent_key == BASE_KEY {
        &[]
    } else {
        parent_key
    }
}

/// Returns true if `key` names an immediate child of the entry whose
/// subtree prefix is `prefix`.
pub fn is_child_key(prefix: &[u8], key: &[u8]) -> bool {
    if key == BASE_KEY || key.len() <= prefix.len() || !key.starts_with(prefix) {
        return false;
    }
    let rest = &key[prefix.len()..];
    rest.iter().position(|byte| *byte == RDN_SEPARATOR) == Some(rest.len() - 1)
}
