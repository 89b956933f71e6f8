//! End-to-end pipeline tests: load, resolve, canonicalize, encode.

use tzdb_rs::{
    canonical::{canonicalize, encode_owners},
    codec::{PackedTransition, PACKED_TRANSITION_LEN},
    posix::PosixTimeZone,
    resolver::FULL_YEAR_RANGE,
    TzData,
};

const COMPACT_SOURCE: &str = "\
# version 2024a
R US 1918 1919 - Mar lastSun 2:00 1:00 D
R US 1918 1919 - Oct lastSun 2:00 0 S
Z America/Chicago -5:50:36 - LMT 1883 Nov 18 18:00u
-6:00 US C%sT
Z America/Winnetka -5:50:36 - LMT 1883 Nov 18 18:00u
-6:00 US C%sT
Z Etc/UTC 0 - UTC
L America/Chicago US/Central
";

const FULL_FORM_SOURCE: &str = "\
# version 2024a
Rule US 1918 1919 - Mar lastSun 2:00 1:00 D
Rule US 1918 1919 - Oct lastSun 2:00 0 S
Zone America/Chicago -5:50:36 - LMT 1883 Nov 18 18:00u
\t\t\t-6:00\tUS\tC%sT
Zone America/Winnetka -5:50:36 - LMT 1883 Nov 18 18:00u
\t\t\t-6:00\tUS\tC%sT
Zone Etc/UTC 0 - UTC
Link America/Chicago US/Central
";

#[test]
fn load_resolve_canonicalize_encode() {
    let tzdata = TzData::from_tzdata_str(COMPACT_SOURCE).unwrap();
    assert_eq!(tzdata.version.unwrap().to_string(), "2024a");
    assert_eq!(tzdata.get_zone("US/Central").unwrap().name, "America/Chicago");

    let resolved = tzdata.resolve(FULL_YEAR_RANGE).unwrap();
    let chicago = &resolved["America/Chicago"];

    assert_eq!(chicago.initial_record.designation, "LMT");
    assert_eq!(
        chicago.designations(),
        ["LMT".to_string(), "CST".to_string(), "CDT".to_string()]
    );

    let packed = chicago.packed_transitions();
    assert_eq!(packed.len(), 5);
    assert_eq!(
        packed[0],
        PackedTransition {
            time: -2_717_647_200,
            desig_idx: 1,
            offset_minutes: -360,
            is_dst: false,
        }
    );
    assert_eq!(
        packed[1],
        PackedTransition {
            time: -1_633_276_800,
            desig_idx: 2,
            offset_minutes: -300,
            is_dst: true,
        }
    );

    // The byte stream is one 8-byte record per transition, and decoding
    // it reproduces the records exactly.
    let bytes: Vec<u8> = packed.iter().flat_map(|t| t.pack()).collect();
    assert_eq!(bytes.len(), packed.len() * PACKED_TRANSITION_LEN);
    let decoded: Vec<PackedTransition> = bytes
        .chunks_exact(PACKED_TRANSITION_LEN)
        .map(|chunk| PackedTransition::unpack(chunk.try_into().unwrap()))
        .collect();
    assert_eq!(decoded, packed);

    // One canonical owner for the identical zones, never two copies.
    let aliases = canonicalize(&resolved);
    assert_eq!(
        aliases.transitions.get("America/Winnetka").map(String::as_str),
        Some("America/Chicago")
    );
    assert_eq!(aliases.transitions.len(), 1);
    assert_eq!(aliases.transitions_owner("America/Chicago"), "America/Chicago");

    let owners = encode_owners(&resolved, &aliases);
    assert_eq!(owners.len(), 1);
    assert_eq!(owners["America/Chicago"], bytes);
}

#[test]
fn source_forms_resolve_identically() {
    let compact = TzData::from_tzdata_str(COMPACT_SOURCE).unwrap();
    let full = TzData::from_tzdata_str(FULL_FORM_SOURCE).unwrap();

    let compact_resolved = compact.resolve(FULL_YEAR_RANGE).unwrap();
    let full_resolved = full.resolve(FULL_YEAR_RANGE).unwrap();

    for (name, resolved) in &compact_resolved {
        assert_eq!(
            resolved.packed_transitions(),
            full_resolved[name].packed_transitions(),
            "{name} diverged between source forms"
        );
        assert_eq!(resolved.tzstr(), full_resolved[name].tzstr());
    }
}

#[test]
fn repeated_resolution_is_stable() {
    let tzdata = TzData::from_tzdata_str(COMPACT_SOURCE).unwrap();
    let first = tzdata.resolve(FULL_YEAR_RANGE).unwrap();
    let second = tzdata.resolve(FULL_YEAR_RANGE).unwrap();
    assert_eq!(first, second);
    assert_eq!(canonicalize(&first), canonicalize(&second));
}

#[test]
fn derived_posix_strings_decode_back() {
    let tzdata = TzData::from_tzdata_str(COMPACT_SOURCE).unwrap();
    let resolved = tzdata.resolve(FULL_YEAR_RANGE).unwrap();
    for zone in resolved.values() {
        let tzstr = zone.tzstr();
        let decoded = PosixTimeZone::parse(&tzstr).unwrap();
        assert_eq!(decoded.to_string(), Ok(tzstr));
    }
}
