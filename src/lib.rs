//! A library for parsing and compiling IANA Time Zone Database sources
//! into canonical time zone transition data.
//!
//! `tzdb_rs` accepts both the textual rule grammar (area files or the
//! compact `tzdata.zi`) and compiled binary TZif files, resolves
//! concrete DST transitions across a year range, deduplicates zones
//! with identical derived data, and packs each resolved transition into
//! a fixed 8-byte record suitable for embedding in resource-constrained
//! targets.
//!
//! The pipeline is a single-threaded batch run: load, resolve,
//! canonicalize, encode. Any failure aborts the whole run before any
//! output is produced. Emitting target-language source from the
//! resolved model is left to downstream consumers of [`TzData`],
//! [`resolver::ResolvedZone`], and [`canonical::CanonicalAliases`].

// Implementation note: this library is NOT designed to be the most
// optimal speed. Instead invariance and clarity is preferred where
// need be.
//
// We can get away with any performance penalty primarily because
// this library is designed to aid with build time tooling, on
// a limited dataset, NOT at runtime on extremely large datasets.

#![no_std]

extern crate alloc;

use alloc::{
    string::{String, ToString},
    vec::Vec,
};

use hashbrown::HashMap;
use indexmap::IndexMap;

#[cfg(feature = "std")]
extern crate std;

#[cfg(feature = "std")]
use std::{io, path::Path};

pub(crate) mod utils;

pub mod canonical;
pub mod codec;
pub mod parser;
pub mod posix;
pub mod resolver;
pub mod rule;
pub mod tables;
pub mod types;
pub mod tzif;
pub mod zone;

#[doc(inline)]
pub use parser::TzdataParser;

#[doc(inline)]
pub use resolver::RuleResolver;

use parser::TzdataParseError;
use posix::PosixParseError;
use resolver::{ResolveError, ResolvedZone};
use rule::Rules;
use tables::{TzdbVersion, ZoneTableError};
use tzif::TzifParseError;
use zone::Zone;

/// Well-known area file names of the multi-file source form
pub const TZDATA_FILES: [&str; 9] = [
    "africa",
    "antarctica",
    "asia",
    "australasia",
    "backward",
    "etcetera",
    "europe",
    "northamerica",
    "southamerica",
];

/// File containing the compact single-file source, with version marker
pub const TZDATA_COMPACT_FILE: &str = "tzdata.zi";

/// Standalone version marker file name
pub const TZDATA_VERSION_FILE: &str = "version";

/// The general error type for time zone database operations
#[derive(Debug)]
pub enum TzError {
    Parse(TzdataParseError),
    Tzif(TzifParseError),
    Posix(PosixParseError),
    Resolve(ResolveError),
    Table(ZoneTableError),
    /// A Link whose target is neither a zone nor another link
    UnknownLinkTarget { alias: String, target: String },
    /// A Link chain that never reaches a zone
    LinkCycle(String),
    #[cfg(feature = "std")]
    Io(io::Error),
}

impl core::fmt::Display for TzError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "{err}"),
            Self::Tzif(err) => write!(f, "{err}"),
            Self::Posix(err) => write!(f, "{err}"),
            Self::Resolve(err) => write!(f, "{err}"),
            Self::Table(err) => write!(f, "{err}"),
            Self::UnknownLinkTarget { alias, target } => {
                write!(f, "link {alias}: unknown target {target}")
            }
            Self::LinkCycle(alias) => write!(f, "link {alias} never resolves to a zone"),
            #[cfg(feature = "std")]
            Self::Io(err) => write!(f, "{err}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for TzError {}

impl From<TzdataParseError> for TzError {
    fn from(value: TzdataParseError) -> Self {
        Self::Parse(value)
    }
}

impl From<TzifParseError> for TzError {
    fn from(value: TzifParseError) -> Self {
        Self::Tzif(value)
    }
}

impl From<PosixParseError> for TzError {
    fn from(value: PosixParseError) -> Self {
        Self::Posix(value)
    }
}

impl From<ResolveError> for TzError {
    fn from(value: ResolveError) -> Self {
        Self::Resolve(value)
    }
}

impl From<ZoneTableError> for TzError {
    fn from(value: ZoneTableError) -> Self {
        Self::Table(value)
    }
}

#[cfg(feature = "std")]
impl From<io::Error> for TzError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

/// `TzData` is the parsed time zone database: rule sets keyed by name,
/// zones and links in definition order, document metadata, and the
/// release version when the source carries a marker.
///
/// All entities are built in one load pass and read-only afterwards.
/// Links are a separate alias table referencing zones by name; a zone
/// is never copied into its aliases.
#[non_exhaustive]
#[derive(Debug, Clone, Default)]
pub struct TzData {
    /// The database release version, when a marker line was present
    pub version: Option<TzdbVersion>,
    /// Leading `# ` comment lines preceding any record
    pub comments: Vec<String>,
    /// Rule sets keyed by Rule name
    pub rules: HashMap<String, Rules>,
    /// Zones keyed by name, in definition order
    pub zones: IndexMap<String, Zone>,
    /// Alias name to target zone name
    pub links: IndexMap<String, String>,
}

impl TzData {
    /// Parses a complete source text, either the compact single-file
    /// form or one area file, and validates the link graph.
    pub fn from_tzdata_str(source: &str) -> Result<Self, TzError> {
        let tzdata = TzdataParser::from_tzdata_str(source).parse()?;
        tzdata.validate_links()?;
        Ok(tzdata)
    }

    /// Parses the multi-file source form from a directory using the
    /// well-known area file names, plus the standalone version file
    /// when present.
    #[cfg(feature = "std")]
    pub fn from_directory<P: AsRef<Path>>(dir: P) -> Result<Self, TzError> {
        let mut tzdata = Self::default();
        for filename in TZDATA_FILES {
            let file_path = dir.as_ref().join(filename);
            log::debug!("loading {filename}");
            let source = std::fs::read_to_string(file_path)?;
            tzdata.extend(TzdataParser::from_tzdata_str(&source).parse()?);
        }
        if tzdata.version.is_none() {
            let version_path = dir.as_ref().join(TZDATA_VERSION_FILE);
            if let Ok(marker) = std::fs::read_to_string(version_path) {
                tzdata.version = TzdbVersion::from_marker_line(&marker);
            }
        }
        tzdata.validate_links()?;
        Ok(tzdata)
    }

    /// Parses the compact single-file form from a file path.
    #[cfg(feature = "std")]
    pub fn from_filepath<P: AsRef<Path>>(path: P) -> Result<Self, TzError> {
        Self::from_tzdata_str(&std::fs::read_to_string(path)?)
    }

    /// Merges another parsed fragment into this one. Duplicate link
    /// aliases keep the first definition seen.
    pub fn extend(&mut self, other: Self) {
        for (name, rules) in other.rules {
            match self.rules.entry(name) {
                hashbrown::hash_map::Entry::Occupied(mut entry) => {
                    for rule in rules.all() {
                        entry.get_mut().push(rule.clone());
                    }
                }
                hashbrown::hash_map::Entry::Vacant(entry) => {
                    entry.insert(rules);
                }
            }
        }
        self.zones.extend(other.zones);
        for (alias, target) in other.links {
            if let Some(existing) = self.links.get(&alias) {
                log::warn!("duplicate Link {alias} (keeping {existing}, discarding {target})");
            } else {
                self.links.insert(alias, target);
            }
        }
        self.comments.extend(other.comments);
        if self.version.is_none() {
            self.version = other.version;
        }
    }

    /// Checks that every link resolves, possibly through further links,
    /// to a defined zone.
    pub fn validate_links(&self) -> Result<(), TzError> {
        for (alias, target) in &self.links {
            let mut current = target;
            for _ in 0..=self.links.len() {
                if self.zones.contains_key(current) {
                    break;
                }
                current = self
                    .links
                    .get(current)
                    .ok_or_else(|| TzError::UnknownLinkTarget {
                        alias: alias.clone(),
                        target: current.clone(),
                    })?;
            }
            if !self.zones.contains_key(current) {
                return Err(TzError::LinkCycle(alias.clone()));
            }
        }
        Ok(())
    }

    /// Looks up a zone by name, following link aliases.
    pub fn get_zone(&self, name: &str) -> Option<&Zone> {
        let mut current = name;
        for _ in 0..=self.links.len() {
            if let Some(zone) = self.zones.get(current) {
                return Some(zone);
            }
            current = self.links.get(current)?;
        }
        None
    }

    /// Resolves every zone across the year range, in definition order.
    pub fn resolve(
        &self,
        years: core::ops::RangeInclusive<i32>,
    ) -> Result<IndexMap<String, ResolvedZone>, TzError> {
        let resolver = RuleResolver::new(&self.rules);
        let mut resolved = IndexMap::with_capacity(self.zones.len());
        for (name, zone) in &self.zones {
            resolved.insert(name.to_string(), resolver.resolve_zone(zone, years.clone())?);
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "\
Z Etc/UTC 0 - UTC
L Etc/UTC Universal
L Universal Zulu
";

    #[test]
    fn links_resolve_through_chains() {
        let tzdata = TzData::from_tzdata_str(SOURCE).unwrap();
        assert!(tzdata.get_zone("Etc/UTC").is_some());
        assert_eq!(tzdata.get_zone("Universal").unwrap().name, "Etc/UTC");
        assert_eq!(tzdata.get_zone("Zulu").unwrap().name, "Etc/UTC");
        assert!(tzdata.get_zone("Etc/Missing").is_none());
    }

    #[test]
    fn dangling_link_is_fatal() {
        let err = TzData::from_tzdata_str("Z Etc/UTC 0 - UTC\nL Etc/GMT Greenwich\n").unwrap_err();
        assert!(matches!(err, TzError::UnknownLinkTarget { .. }));
    }

    #[test]
    fn extend_merges_fragments() {
        let mut base = TzData::from_tzdata_str(
            "# version 2024a\nR US 1918 1919 - Mar lastSun 2:00 1:00 D\nZ Etc/UTC 0 - UTC\n",
        )
        .unwrap();
        let other = TzData::from_tzdata_str(
            "R US 1918 1919 - Oct lastSun 2:00 0 S\nZ Etc/GMT 0 - GMT\nL Etc/GMT GMT\n",
        )
        .unwrap();
        base.extend(other);
        assert_eq!(base.rules["US"].all().len(), 2);
        assert_eq!(base.zones.len(), 2);
        assert_eq!(base.links["GMT"], "Etc/GMT");
        assert_eq!(base.version.unwrap().to_string(), "2024a");
    }
}
