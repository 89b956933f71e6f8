//! Geographic cross-reference tables and the database version marker
//!
//! The auxiliary tables (`iso3166.tab`, `zone1970.tab`) map country
//! codes to names and zones to the countries observing them. They are
//! read-only lookups for emitters and take no part in DST resolution.

use alloc::{
    borrow::ToOwned,
    string::{String, ToString},
    vec::Vec,
};

use crate::TzData;

/// The zone table parsing/validation error
#[derive(Debug, Clone, PartialEq)]
pub enum ZoneTableError {
    MissingField(u32),
    /// A table row references a zone that is neither defined nor linked
    UnknownZone(String),
}

impl core::fmt::Display for ZoneTableError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::MissingField(line) => write!(f, "line {line}: missing field"),
            Self::UnknownZone(zone) => write!(f, "unknown zone {zone} in zone table"),
        }
    }
}

/// The database release version, from a `# version YYYYx` marker.
///
/// `2024a` is release (2024, 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TzdbVersion {
    pub major: u16,
    pub minor: u8,
}

impl TzdbVersion {
    /// Parses a bare `YYYYx` version string.
    pub fn parse(s: &str) -> Option<Self> {
        let (year, letter) = s.split_at_checked(4)?;
        let major = year.parse::<u16>().ok()?;
        let mut letters = letter.bytes();
        let letter = letters.next()?;
        if !(letter.is_ascii_lowercase() && letters.next().is_none()) {
            return None;
        }
        Some(Self {
            major,
            minor: 1 + letter - b'a',
        })
    }

    /// Parses a version marker line, either `# version YYYYx` or the
    /// bare version from a standalone `version` file.
    pub fn from_marker_line(line: &str) -> Option<Self> {
        Self::parse(line.trim().rsplit(' ').next()?)
    }
}

impl core::fmt::Display for TzdbVersion {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}{}", self.major, (b'a' + self.minor - 1) as char)
    }
}

/// One `iso3166.tab` row.
#[derive(Debug, Clone, PartialEq)]
pub struct Country {
    pub code: String,
    pub name: String,
}

/// One `zone1970.tab` row.
#[derive(Debug, Clone, PartialEq)]
pub struct CountryZone {
    /// ISO 3166 codes of the countries observing the zone, the most
    /// populous first
    pub country_codes: Vec<String>,
    /// ISO 6709 coordinates of the zone's principal location; may be
    /// blank in trimmed tables
    pub coordinates: String,
    /// The zone name
    pub zone: String,
    /// Distinguishing remark when a country has several zones
    pub comments: Option<String>,
}

impl CountryZone {
    /// The display caption: the comments when present, otherwise the
    /// final segment of the zone name.
    pub fn caption(&self) -> &str {
        match &self.comments {
            Some(comments) => comments,
            None => self.zone.rsplit('/').next().unwrap_or(&self.zone),
        }
    }
}

/// The geographic cross-reference built from the auxiliary tables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZoneTable {
    pub countries: Vec<Country>,
    pub zones: Vec<CountryZone>,
}

impl ZoneTable {
    /// Parses both tables from their file contents.
    pub fn from_table_strs(iso3166: &str, zone1970: &str) -> Result<Self, ZoneTableError> {
        let mut table = ZoneTable::default();

        for (number, line) in table_lines(iso3166) {
            let mut fields = line.split('\t');
            let code = fields.next().filter(|s| !s.is_empty());
            let name = fields.next().filter(|s| !s.is_empty());
            let (Some(code), Some(name)) = (code, name) else {
                return Err(ZoneTableError::MissingField(number));
            };
            table.countries.push(Country {
                code: code.to_owned(),
                name: name.to_owned(),
            });
        }

        for (number, line) in table_lines(zone1970) {
            let mut fields = line.split('\t');
            let codes = fields.next().filter(|s| !s.is_empty());
            let coordinates = fields.next();
            let zone = fields.next().filter(|s| !s.is_empty());
            let (Some(codes), Some(coordinates), Some(zone)) = (codes, coordinates, zone) else {
                return Err(ZoneTableError::MissingField(number));
            };
            table.zones.push(CountryZone {
                country_codes: codes.split(',').map(str::to_owned).collect(),
                coordinates: coordinates.to_owned(),
                zone: zone.to_owned(),
                comments: fields.next().map(str::to_owned),
            });
        }

        Ok(table)
    }

    /// Checks that every referenced zone is defined or linked.
    pub fn validate(&self, tzdata: &TzData) -> Result<(), ZoneTableError> {
        for entry in &self.zones {
            if !tzdata.zones.contains_key(&entry.zone) && !tzdata.links.contains_key(&entry.zone) {
                return Err(ZoneTableError::UnknownZone(entry.zone.clone()));
            }
        }
        Ok(())
    }

    pub fn country(&self, code: &str) -> Option<&Country> {
        self.countries.iter().find(|country| country.code == code)
    }

    /// The zones observed by a country, in table order.
    pub fn zones_for_country<'a>(&'a self, code: &'a str) -> impl Iterator<Item = &'a CountryZone> {
        self.zones
            .iter()
            .filter(move |entry| entry.country_codes.iter().any(|c| c == code))
    }

    /// The countries observing a zone.
    pub fn countries_for_zone(&self, zone: &str) -> Vec<&Country> {
        self.zones
            .iter()
            .filter(|entry| entry.zone == zone)
            .flat_map(|entry| entry.country_codes.iter())
            .filter_map(|code| self.country(code))
            .collect()
    }

    /// The distinct area prefixes of the referenced zones, sorted.
    pub fn areas(&self) -> Vec<String> {
        let mut areas: Vec<String> = self
            .zones
            .iter()
            .map(|entry| {
                entry
                    .zone
                    .split_once('/')
                    .map_or("", |(area, _)| area)
                    .to_string()
            })
            .collect();
        areas.sort();
        areas.dedup();
        areas
    }
}

fn table_lines(content: &str) -> impl Iterator<Item = (u32, &str)> {
    content
        .lines()
        .enumerate()
        .map(|(i, line)| (i as u32 + 1, line.trim_end()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
}

/// Facet toggles for emitters: which parts of the resolved model an
/// output should carry. Decoupled from resolution, which always
/// computes the full model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Projection {
    pub name: bool,
    pub tzstr: bool,
    pub rules: bool,
    pub transitions: bool,
}

impl Default for Projection {
    fn default() -> Self {
        Self {
            name: true,
            tzstr: true,
            rules: true,
            transitions: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ISO3166: &str = "\
# ISO 3166 alpha-2 country codes
AD\tAndorra
ES\tSpain
GE\tGeorgia
";

    const ZONE1970: &str = "\
# codes\tcoordinates\tTZ\tcomments
AD\t+4230+00131\tEurope/Andorra
ES,GE\t\tEurope/Madrid\tSpain (mainland)
GE\t+4143+04449\tAsia/Tbilisi
";

    #[test]
    fn version_markers() {
        let version = TzdbVersion::parse("2024a").unwrap();
        assert_eq!((version.major, version.minor), (2024, 1));
        assert_eq!(version.to_string(), "2024a");

        let version = TzdbVersion::from_marker_line("# version 2023c").unwrap();
        assert_eq!((version.major, version.minor), (2023, 3));

        let version = TzdbVersion::from_marker_line("2024b\n").unwrap();
        assert_eq!((version.major, version.minor), (2024, 2));

        assert_eq!(TzdbVersion::parse("2024"), None);
        assert_eq!(TzdbVersion::parse("2024aa"), None);
        assert_eq!(TzdbVersion::parse("badly"), None);
    }

    #[test]
    fn tables_parse_and_query() {
        let table = ZoneTable::from_table_strs(ISO3166, ZONE1970).unwrap();
        assert_eq!(table.countries.len(), 3);
        assert_eq!(table.zones.len(), 3);

        assert_eq!(table.country("ES").unwrap().name, "Spain");
        let spanish: Vec<_> = table.zones_for_country("ES").collect();
        assert_eq!(spanish.len(), 1);
        assert_eq!(spanish[0].zone, "Europe/Madrid");
        assert_eq!(spanish[0].caption(), "Spain (mainland)");

        let georgian: Vec<_> = table.zones_for_country("GE").collect();
        assert_eq!(georgian.len(), 2);
        assert_eq!(georgian[1].caption(), "Tbilisi");

        let countries = table.countries_for_zone("Europe/Madrid");
        assert_eq!(countries.len(), 2);
        assert_eq!(countries[0].code, "ES");

        assert_eq!(table.areas(), ["Asia", "Europe"]);
    }

    #[test]
    fn zone_references_validate_against_the_model() {
        let tzdata = crate::TzData::from_tzdata_str(
            "Z Europe/Madrid -0:14:44 - LMT 1901\n0:00 - WET\nL Europe/Madrid Europe/Ceuta\n",
        )
        .unwrap();

        let table =
            ZoneTable::from_table_strs("ES\tSpain\n", "ES\t\tEurope/Madrid\n").unwrap();
        table.validate(&tzdata).unwrap();

        // Linked names are acceptable references too.
        let table = ZoneTable::from_table_strs("ES\tSpain\n", "ES\t\tEurope/Ceuta\n").unwrap();
        table.validate(&tzdata).unwrap();

        let table = ZoneTable::from_table_strs("ES\tSpain\n", "ES\t\tEurope/Lisbon\n").unwrap();
        assert_eq!(
            table.validate(&tzdata).unwrap_err(),
            ZoneTableError::UnknownZone("Europe/Lisbon".into())
        );
    }

    #[test]
    fn blank_coordinates_are_accepted() {
        let table = ZoneTable::from_table_strs("", "AD\t\tEurope/Andorra\n").unwrap();
        assert_eq!(table.zones[0].coordinates, "");
    }

    #[test]
    fn short_rows_are_rejected() {
        let err = ZoneTable::from_table_strs("AD\n", "").unwrap_err();
        assert_eq!(err, ZoneTableError::MissingField(1));
        let err = ZoneTable::from_table_strs("", "AD\t+4230+00131\n").unwrap_err();
        assert_eq!(err, ZoneTableError::MissingField(1));
    }
}
