//! Cross-zone deduplication
//!
//! Many zones share a POSIX string, a transition history, or both.
//! This pass records a one-way alias from each later zone to the
//! earliest zone carrying the same value, leaving the owner's data
//! untouched. POSIX-string equality and transition-list equality are
//! tracked independently since a zone may share one but not the other.

use alloc::{
    collections::BTreeMap,
    string::{String, ToString},
    vec::Vec,
};

use hashbrown::HashMap;
use indexmap::IndexMap;

use crate::resolver::ResolvedZone;

/// The alias maps produced by canonicalization: duplicate zone name to
/// canonical owner name.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CanonicalAliases {
    pub tzstr: BTreeMap<String, String>,
    pub transitions: BTreeMap<String, String>,
}

impl CanonicalAliases {
    /// The canonical owner of a zone's POSIX string.
    pub fn tzstr_owner<'a>(&'a self, zone: &'a str) -> &'a str {
        self.tzstr.get(zone).map_or(zone, String::as_str)
    }

    /// The canonical owner of a zone's transition list.
    pub fn transitions_owner<'a>(&'a self, zone: &'a str) -> &'a str {
        self.transitions.get(zone).map_or(zone, String::as_str)
    }
}

/// Deduplicates resolved zones.
///
/// Zones are visited in lexicographic name order, so repeated runs over
/// the same resolved model produce identical alias maps regardless of
/// the input map's iteration order.
pub fn canonicalize(resolved: &IndexMap<String, ResolvedZone>) -> CanonicalAliases {
    let mut names: Vec<&String> = resolved.keys().collect();
    names.sort();

    let mut aliases = CanonicalAliases::default();
    let mut tzstr_owners: HashMap<String, &str> = HashMap::new();
    let mut transition_owners: HashMap<Vec<u8>, &str> = HashMap::new();

    for name in names {
        let zone = &resolved[name];

        let tzstr = zone.tzstr();
        match tzstr_owners.get(tzstr.as_str()) {
            Some(owner) => {
                aliases.tzstr.insert(name.to_string(), owner.to_string());
            }
            None => {
                tzstr_owners.insert(tzstr, name.as_str());
            }
        }

        // Zones without transitions all trivially match; only real
        // histories participate in this pass.
        if zone.transitions.is_empty() {
            continue;
        }
        let encoded: Vec<u8> = zone
            .packed_transitions()
            .iter()
            .flat_map(|transition| transition.pack())
            .collect();
        match transition_owners.get(&encoded) {
            Some(owner) => {
                aliases
                    .transitions
                    .insert(name.to_string(), owner.to_string());
            }
            None => {
                transition_owners.insert(encoded, name.as_str());
            }
        }
    }

    aliases
}

/// Encodes each canonical owner's transitions as a contiguous sequence
/// of 8-byte packed records, in zone definition order. Aliased zones
/// and zones without transitions are omitted.
pub fn encode_owners(
    resolved: &IndexMap<String, ResolvedZone>,
    aliases: &CanonicalAliases,
) -> IndexMap<String, Vec<u8>> {
    let mut owners = IndexMap::new();
    for (name, zone) in resolved {
        if zone.transitions.is_empty() || aliases.transitions.contains_key(name) {
            continue;
        }
        let bytes = zone
            .packed_transitions()
            .iter()
            .flat_map(|transition| transition.pack())
            .collect();
        owners.insert(name.clone(), bytes);
    }
    owners
}
