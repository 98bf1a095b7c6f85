//! Distinguished names.
//!
//! Only the subset of the DN grammar the backend needs is understood:
//! `attr=value` components separated by unescaped `,`, multi-valued RDNs
//! joined with `+`, and backslash escapes which are kept verbatim.
//! Attribute types and values are normalised to trimmed lower case, so two
//! DNs that differ only in case or surrounding spaces compare equal.

use crate::error::{BackendError, BackendResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One attribute-value assertion of an RDN.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct Ava {
    attribute: String,
    value: String,
}

impl Ava {
    fn new(attribute: &str, value: &str, text: &str) -> BackendResult<Self> {
        if attribute.contains('\0') || value.contains('\0') {
            return Err(BackendError::invalid_dn(text, "NUL character in RDN"));
        }
        let attribute = normalize(attribute);
        if attribute.is_empty() {
            return Err(BackendError::invalid_dn(text, "empty attribute type"));
        }
        Ok(Self {
            attribute,
            value: normalize(value),
        })
    }
}

/// A relative distinguished name: one component of a DN.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Rdn {
    avas: Vec<Ava>,
}

impl Rdn {
    /// Creates a single-valued RDN.
    ///
    /// Fails on an empty attribute type or a NUL character, which the DN
    /// key format reserves as its separator.
    pub fn new(attribute: &str, value: &str) -> BackendResult<Self> {
        Ok(Self {
            avas: vec![Ava::new(attribute, value, &format!("{attribute}={value}"))?],
        })
    }

    /// Parses one RDN, e.g. `cn=John+uid=jdoe`.
    pub fn parse(text: &str) -> BackendResult<Self> {
        let mut avas = split_unescaped(text, '+')
            .into_iter()
            .map(|ava| {
                let (attribute, value) = ava
                    .split_once('=')
                    .ok_or_else(|| BackendError::invalid_dn(text, "RDN component lacks '='"))?;
                Ava::new(attribute, value, text)
            })
            .collect::<BackendResult<Vec<_>>>()?;
        avas.sort();
        avas.dedup();
        Ok(Self { avas })
    }

    /// Returns the value of `attribute` in this RDN.
    pub fn value_of(&self, attribute: &str) -> Option<&str> {
        let attribute = normalize(attribute);
        self.avas
            .iter()
            .find(|ava| ava.attribute == attribute)
            .map(|ava| ava.value.as_str())
    }

    /// Returns true for a multi-valued RDN.
    pub fn is_multi_valued(&self) -> bool {
        self.avas.len() > 1
    }
}

impl fmt::Display for Rdn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, ava) in self.avas.iter().enumerate() {
            if i > 0 {
                f.write_str("+")?;
            }
            write!(f, "{}={}", ava.attribute, ava.value)?;
        }
        Ok(())
    }
}

/// A distinguished name.
///
/// RDNs are stored leaf first, the way they are written: the RDN at index
/// 0 names the entry itself and the last one is closest to the root. The
/// empty DN is the root DN.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Dn {
    rdns: Vec<Rdn>,
}

impl Dn {
    /// Returns the root DN.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Parses a DN such as `ou=People, dc=Example,dc=com`.
    pub fn parse(text: &str) -> BackendResult<Self> {
        if text.trim().is_empty() {
            return Ok(Self::root());
        }
        let rdns = split_unescaped(text, ',')
            .into_iter()
            .map(Rdn::parse)
            .collect::<BackendResult<Vec<_>>>()?;
        Ok(Self { rdns })
    }

    /// Returns true for the root DN.
    pub fn is_root(&self) -> bool {
        self.rdns.is_empty()
    }

    /// Number of RDN components.
    pub fn size(&self) -> usize {
        self.rdns.len()
    }

    /// The RDNs, leaf first.
    pub fn rdns(&self) -> &[Rdn] {
        &self.rdns
    }

    /// The entry's own RDN, or `None` for the root DN.
    pub fn rdn(&self) -> Option<&Rdn> {
        self.rdns.first()
    }

    /// The immediate parent, or `None` for the root DN.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            rdns: self.rdns[1..].to_vec(),
        })
    }

    /// Returns the DN of the child named `rdn`.
    #[must_use]
    pub fn child(&self, rdn: Rdn) -> Self {
        let mut rdns = Vec::with_capacity(self.rdns.len() + 1);
        rdns.push(rdn);
        rdns.extend(self.rdns.iter().cloned());
        Self { rdns }
    }

    /// Returns true if this DN is `ancestor` or lies below it.
    pub fn is_descendant_of(&self, ancestor: &Dn) -> bool {
        self.rdns.ends_with(&ancestor.rdns)
    }

    /// Iterates over this DN and each of its parents, stopping before the
    /// root DN.
    pub fn ancestors(&self) -> impl Iterator<Item = Dn> + '_ {
        (0..self.rdns.len()).map(move |skip| Self {
            rdns: self.rdns[skip..].to_vec(),
        })
    }
}

impl fmt::Display for Dn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, rdn) in self.rdns.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{rdn}")?;
        }
        Ok(())
    }
}

impl FromStr for Dn {
    type Err = BackendError;

    fn from_str(text: &str) -> BackendResult<Self> {
        Self::parse(text)
    }
}

impl TryFrom<String> for Dn {
    type Error = BackendError;

    fn try_from(text: String) -> BackendResult<Self> {
        Self::parse(&text)
    }
}

impl From<Dn> for String {
    fn from(dn: Dn) -> Self {
        dn.to_string()
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Splits on `separator` except where it is escaped with a backslash.
fn split_unescaped(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == separator {
            parts.push(&text[start..i]);
            start = i + c.len_utf8();
        }
    }
    parts.push(&text[start..]);
    parts
}
