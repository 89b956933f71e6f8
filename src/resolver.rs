//! Transition resolution
//!
//! This module computes concrete UTC transition instants for a zone's
//! eras across a year range. The DST offset used to convert a rule's
//! nominal local instant to UTC is the one carried over from the
//! previously applied rule, threaded across years and eras in
//! application order.

use alloc::{
    collections::BTreeSet,
    string::{String, ToString},
    vec::Vec,
};
use core::ops::RangeInclusive;

use hashbrown::HashMap;
use indexmap::IndexSet;

use crate::{
    codec::PackedTransition,
    posix::PosixTimeZone,
    rule::Rules,
    types::{QualifiedTimeKind, RuleRef, Time, YEAR_MAX, YEAR_MIN},
    zone::{Era, Zone},
};

/// The default year range for transition resolution.
pub const FULL_YEAR_RANGE: RangeInclusive<i32> = YEAR_MIN..=YEAR_MAX;

/// The transition resolution error
#[derive(Debug, Clone, PartialEq)]
pub enum ResolveError {
    /// An era references a rule set that was never defined
    UnknownRuleSet { zone: String, rule_set: String },
    /// A rule set never settles into a standard-time rule
    MissingStandardRule { zone: String, rule_set: String },
}

impl core::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::UnknownRuleSet { zone, rule_set } => {
                write!(f, "zone {zone}: unknown rule set {rule_set}")
            }
            Self::MissingStandardRule { zone, rule_set } => {
                write!(f, "zone {zone}: rule set {rule_set} has no standard-time rule")
            }
        }
    }
}

/// A local time record: the offset, savings, and designation in force
/// between two transitions.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalTimeRecord {
    pub offset: i64,
    pub saving: Time,
    pub letters: Option<String>,
    pub designation: String,
}

/// A resolved transition.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct ResolvedTransition {
    /// The UTC instant of the transition, in Unix epoch seconds
    pub at_time: i64,
    /// Whether the instant was specified in local, standard, or
    /// universal time
    pub time_type: QualifiedTimeKind,
    /// The total offset in force after the transition, in seconds
    pub offset: i64,
    /// Whether the record transitioned into is daylight saving
    pub dst: bool,
    /// The exact savings amount in force after the transition
    pub savings: Time,
    /// The LETTER data used in the formatted designation
    pub letters: Option<String>,
    /// The formatted designation, e.g. `CST`
    pub designation: String,
}

impl Ord for ResolvedTransition {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        self.at_time.cmp(&other.at_time)
    }
}

impl PartialOrd for ResolvedTransition {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// The complete resolved data for one zone: an initial record for times
/// predating every transition, the ordered transition set, and the
/// POSIX time zone covering times beyond it.
#[non_exhaustive]
#[derive(Debug, PartialEq)]
pub struct ResolvedZone {
    pub initial_record: LocalTimeRecord,
    pub transitions: BTreeSet<ResolvedTransition>,
    pub posix_time_zone: PosixTimeZone,
}

impl ResolvedZone {
    /// The zone's designation table, in order of first use. The packed
    /// record's designator index points into this table.
    pub fn designations(&self) -> Vec<String> {
        let mut set = IndexSet::new();
        set.insert(self.initial_record.designation.clone());
        for transition in &self.transitions {
            set.insert(transition.designation.clone());
        }
        set.into_iter().collect()
    }

    /// Packs the resolved transitions into fixed 8-byte records.
    pub fn packed_transitions(&self) -> Vec<PackedTransition> {
        let mut designations = IndexSet::new();
        designations.insert(self.initial_record.designation.clone());
        self.transitions
            .iter()
            .map(|transition| {
                let (index, _) = designations.insert_full(transition.designation.clone());
                debug_assert!(index <= u8::MAX as usize);
                PackedTransition {
                    time: transition.at_time,
                    desig_idx: index as u8,
                    offset_minutes: transition.offset.div_euclid(60) as i16,
                    is_dst: transition.dst,
                }
            })
            .collect()
    }

    /// The POSIX string for the zone, e.g. `CST6CDT,M3.2.0,M11.1.0`.
    pub fn tzstr(&self) -> String {
        self.posix_time_zone
            .to_string()
            .unwrap_or_else(|_| String::new())
    }
}

/// Running state threaded across eras and years while resolving.
#[derive(Debug, Clone)]
struct EraContext {
    saving: Time,
    letters: Option<String>,
    /// Universal time at which the current era takes effect
    start: i64,
    start_year: i32,
    start_kind: QualifiedTimeKind,
    previous_offset: i64,
    previous_dst: bool,
    previous_designation: String,
}

impl EraContext {
    fn new(first_era: &Era) -> Self {
        let (start, start_year) = first_era
            .until
            .map(|until| {
                (
                    until.as_precise_ut_time(first_era.std_offset.as_secs(), 0),
                    until.date.year,
                )
            })
            .unwrap_or((i64::MIN, 0));
        Self {
            saving: Time::default(),
            letters: None,
            start,
            start_year,
            start_kind: first_era
                .until
                .map_or(QualifiedTimeKind::Universal, |u| u.time.time_kind()),
            previous_offset: first_era.std_offset.as_secs(),
            previous_dst: false,
            previous_designation: first_era.format.format(
                first_era.std_offset.as_secs(),
                None,
                false,
            ),
        }
    }

    fn apply(&mut self, transition: &ResolvedTransition) {
        self.saving = transition.savings;
        self.letters = transition.letters.clone();
        self.previous_offset = transition.offset;
        self.previous_dst = transition.dst;
        self.previous_designation = transition.designation.clone();
    }
}

/// Resolves zones against a shared rule table.
#[derive(Debug, Clone, Copy)]
pub struct RuleResolver<'a> {
    rules: &'a HashMap<String, Rules>,
}

impl<'a> RuleResolver<'a> {
    pub fn new(rules: &'a HashMap<String, Rules>) -> Self {
        Self { rules }
    }

    /// Resolves one era in isolation, with no carried savings.
    ///
    /// Eras with no rule reference or a fixed savings amount produce no
    /// transitions.
    pub fn resolve_era(
        &self,
        zone: &Zone,
        era: &Era,
        years: RangeInclusive<i32>,
    ) -> Result<Vec<ResolvedTransition>, ResolveError> {
        let mut context = EraContext {
            saving: Time::default(),
            letters: None,
            start: i64::MIN,
            start_year: *years.start(),
            start_kind: QualifiedTimeKind::Universal,
            previous_offset: i64::MIN,
            previous_dst: false,
            previous_designation: String::new(),
        };
        let mut transitions = BTreeSet::new();
        self.resolve_era_rules(&zone.name, era, &years, &mut context, &mut transitions)?;
        Ok(transitions.into_iter().collect())
    }

    /// Resolves a whole zone: every era in order, with the savings and
    /// letter state carried across era boundaries.
    pub fn resolve_zone(
        &self,
        zone: &Zone,
        years: RangeInclusive<i32>,
    ) -> Result<ResolvedZone, ResolveError> {
        let mut era_iter = zone.eras.iter();
        let first = era_iter
            .next()
            .expect("a parsed zone has at least one era");
        let initial_record = LocalTimeRecord {
            offset: first.std_offset.as_secs(),
            saving: Time::default(),
            letters: None,
            designation: first.format.format(first.std_offset.as_secs(), None, false),
        };
        let mut context = EraContext::new(first);
        let mut transitions = BTreeSet::new();

        for era in era_iter {
            // Entering a new era is itself a potential transition.
            let boundary = self.era_boundary_transition(&zone.name, era, &context)?;
            let differs = boundary.offset != context.previous_offset
                || boundary.designation != context.previous_designation
                || boundary.dst != context.previous_dst;
            context.apply(&boundary);
            if differs {
                transitions.insert(boundary);
            }

            self.resolve_era_rules(&zone.name, era, &years, &mut context, &mut transitions)?;

            if let Some(until) = era.until {
                context.start =
                    until.as_precise_ut_time(era.std_offset.as_secs(), context.saving.as_secs());
                context.start_year = until.date.year;
                context.start_kind = until.time.time_kind();
            }
        }

        let posix_time_zone = zone.posix_time_zone(self.rules)?;
        Ok(ResolvedZone {
            initial_record,
            transitions,
            posix_time_zone,
        })
    }

    /// Computes the rule-driven transitions of one era into `transitions`.
    fn resolve_era_rules(
        &self,
        zone_name: &str,
        era: &Era,
        years: &RangeInclusive<i32>,
        context: &mut EraContext,
        transitions: &mut BTreeSet<ResolvedTransition>,
    ) -> Result<(), ResolveError> {
        let RuleRef::Named(name) = &era.rule else {
            return Ok(());
        };
        let rules = self
            .rules
            .get(name)
            .ok_or_else(|| ResolveError::UnknownRuleSet {
                zone: zone_name.to_string(),
                rule_set: name.clone(),
            })?;

        let first_year = context.start_year.max(*years.start());
        let last_year = era
            .until
            .map(|until| until.date.year)
            .or_else(|| rules.final_precompute_year())
            .unwrap_or(first_year)
            .min(*years.end());

        for year in first_year..=last_year {
            let mut rules_for_year = rules.rules_for_year(year);
            // Order the year's rules by a rough instant; the zero
            // saving keeps the sort key independent of application
            // order.
            rules_for_year.sort_by(|r1, r2| {
                let r1_time = r1.transition_time_for_year(year, &era.std_offset, &Time::default());
                let r2_time = r2.transition_time_for_year(year, &era.std_offset, &Time::default());
                r1_time.cmp(&r2_time)
            });

            for rule in rules_for_year {
                let at_time = rule.transition_time_for_year(year, &era.std_offset, &context.saving);
                let until_secs = era.until.map(|until| {
                    until.as_precise_ut_time(era.std_offset.as_secs(), context.saving.as_secs())
                });
                let offset = era.std_offset.as_secs() + rule.save.as_secs();
                let designation =
                    era.format
                        .format(offset, rule.letters.as_deref(), rule.is_dst());

                let within_range =
                    at_time >= context.start && until_secs.map_or(true, |until| at_time < until);
                let differs = offset != context.previous_offset
                    || designation != context.previous_designation
                    || rule.is_dst() != context.previous_dst;
                if within_range && differs {
                    let transition = ResolvedTransition {
                        at_time,
                        time_type: rule.at.time_kind(),
                        offset,
                        dst: rule.is_dst(),
                        savings: rule.save,
                        letters: rule.letters.clone(),
                        designation,
                    };
                    context.apply(&transition);
                    transitions.insert(transition);
                }
            }
        }
        Ok(())
    }

    /// The local time record entering an era, expressed as a transition
    /// at the era's start instant.
    fn era_boundary_transition(
        &self,
        zone_name: &str,
        era: &Era,
        context: &EraContext,
    ) -> Result<ResolvedTransition, ResolveError> {
        let transition = match &era.rule {
            RuleRef::None => {
                let offset = era.std_offset.as_secs();
                ResolvedTransition {
                    at_time: context.start,
                    time_type: context.start_kind,
                    offset,
                    dst: false,
                    savings: Time::default(),
                    letters: None,
                    designation: era.format.format(offset, None, false),
                }
            }
            RuleRef::Fixed(t) => {
                let offset = era.std_offset.as_secs() + t.as_secs();
                ResolvedTransition {
                    at_time: context.start,
                    time_type: context.start_kind,
                    offset,
                    dst: true,
                    savings: *t,
                    letters: None,
                    designation: era.format.format(offset, None, true),
                }
            }
            RuleRef::Named(name) => {
                let rules = self
                    .rules
                    .get(name)
                    .ok_or_else(|| ResolveError::UnknownRuleSet {
                        zone: zone_name.to_string(),
                        rule_set: name.clone(),
                    })?;
                // Switching to a named rule mid-stream: if a rule has
                // already fired before this instant, carry its SAVE and
                // LETTER; otherwise assume standard time and the LETTER
                // of the earliest zero-SAVE rule.
                let (savings, letters, dst) =
                    if let Some(rule) = rules.search_last_active_rule(context.start) {
                        (rule.save, rule.letters.clone(), rule.is_dst())
                    } else {
                        (
                            Time::default(),
                            rules.initial_transition_letters(),
                            false,
                        )
                    };
                let offset = era.std_offset.as_secs() + savings.as_secs();
                let designation = era.format.format(offset, letters.as_deref(), dst);
                ResolvedTransition {
                    at_time: context.start,
                    time_type: context.start_kind,
                    offset,
                    dst,
                    savings,
                    letters,
                    designation,
                }
            }
        };
        Ok(transition)
    }
}
