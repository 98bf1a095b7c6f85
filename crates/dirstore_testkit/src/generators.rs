//! Property-based test generators using proptest.

use dirstore_backend::{Dn, Entry, Rdn};
use proptest::prelude::*;

/// Strategy for single-valued RDNs with simple lower-case values.
pub fn rdn_strategy() -> impl Strategy<Value = Rdn> {
    (
        prop::sample::select(vec!["ou", "cn", "uid", "dc"]),
        prop::string::string_regex("[a-z][a-z0-9]{0,7}").expect("Invalid regex"),
    )
        .prop_map(|(attribute, value)| Rdn::new(attribute, &value).expect("Invalid RDN"))
}

/// Strategy for DNs below `base`, at most `depth` levels deep (the base
/// itself included).
pub fn dn_below_strategy(base: Dn, depth: usize) -> impl Strategy<Value = Dn> {
    prop::collection::vec(rdn_strategy(), 0..=depth).prop_map(move |rdns| {
        rdns.into_iter()
            .fold(base.clone(), |parent, rdn| parent.child(rdn))
    })
}

/// Strategy for entries below `base` with a few attributes.
pub fn entry_strategy(base: Dn) -> impl Strategy<Value = Entry> {
    (
        dn_below_strategy(base, 3),
        prop::collection::btree_map(
            prop::string::string_regex("[a-z]{1,8}").expect("Invalid regex"),
            prop::collection::vec(".{0,16}", 1..3),
            0..4,
        ),
    )
        .prop_map(|(dn, attributes)| {
            attributes
                .into_iter()
                .fold(Entry::new(dn), |entry, (name, values)| {
                    entry.with_attribute(&name, values)
                })
        })
}

/// Strategy for arbitrary keys, short enough to collide now and then.
pub fn key_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..6)
}

/// Strategy for arbitrary values.
pub fn value_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..64)
}
