//! # dirstore backend
//!
//! The directory layer on top of a [`dirstore_core::Storage`] engine.
//!
//! This crate provides:
//! - [`Dn`] and [`Rdn`] with case-ignore normalisation
//! - The suffix-relative DN key format ([`dn_key`])
//! - The [`Dn2Id`] and [`Id2Entry`] indexes
//! - [`SuffixContainer`], owning the indexes of one base DN
//! - [`RootContainer`], owning every suffix of a backend and the storage
//!   engine they share
//! - The [`EntryCache`] contract and [`DefaultEntryCache`]
//!
//! ## Example
//!
//! ```rust
//! use dirstore_backend::{BackendConfig, DefaultEntryCache, Entry, EntryId, RootContainer};
//! use std::sync::Arc;
//!
//! let config = BackendConfig::new("userRoot").base_dn("dc=example,dc=com".parse().unwrap());
//! let root =
//!     RootContainer::with_journal_storage(config, Arc::new(DefaultEntryCache::default())).unwrap();
//! root.open().unwrap();
//!
//! let dn = "ou=people,dc=example,dc=com".parse().unwrap();
//! let suffix = root.get_suffix_container(&dn).unwrap();
//! suffix.add_entry(&Entry::new(dn.clone()), EntryId::new(5)).unwrap();
//! assert!(suffix.entry_exists(&dn).unwrap());
//! assert_eq!(root.get_entry_count(), Some(1));
//! root.close();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod config;
mod dn;
mod dn2id;
pub mod dn_key;
mod entry;
mod error;
mod id2entry;
mod root;
mod suffix;

pub use cache::{DefaultEntryCache, EntryCache};
pub use config::{parse_permissions, BackendConfig};
pub use dn::{Dn, Rdn};
pub use dn2id::Dn2Id;
pub use entry::{Entry, EntryId};
pub use error::{BackendError, BackendResult};
pub use id2entry::Id2Entry;
pub use root::{sum_entry_counts, RootContainer};
pub use suffix::SuffixContainer;
