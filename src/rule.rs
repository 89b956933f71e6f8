//! Rule records and day-selector date arithmetic
//!
//! A named rule set is the collection of all Rule lines sharing one NAME
//! field, in file order.
//!
//! # Example
//!
//! ```txt
//! # Rule    NAME    FROM    TO    -    IN    ON    AT    SAVE    LETTER
//! Rule    Chicago    1920    only    -    Jun    13    2:00    1:00    D
//! Rule    Chicago    1920    1921    -    Oct    lastSun    2:00    0    S
//! Rule    Chicago    1921    only    -    Mar    lastSun    2:00    1:00    D
//! Rule    Chicago    1922    1966    -    Apr    lastSun    2:00    1:00    D
//! ```
//!
//! Rules appear sorted by their start year, but their end years may
//! differ, so at any one time the active pair can be [std, dst],
//! [dst, std], or a single orphan rule.

use core::ops::RangeInclusive;

use alloc::{borrow::ToOwned, string::String, vec::Vec};

use crate::{
    parser::{next_split, ContextParse, LineParseContext, TzdataParseError},
    types::{DayOfMonth, Month, QualifiedTime, Time, YEAR_MAX, YEAR_MIN},
    utils::{self, epoch_seconds_for_epoch_days},
};

/// The last rules in effect for an open-ended era, from which its POSIX
/// time zone is derived.
#[derive(Debug)]
pub struct LastRules {
    pub standard: Rule,
    pub saving: Option<Rule>,
}

/// All Rule lines sharing one NAME.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rules {
    rules: Vec<Rule>,
}

impl Rules {
    pub fn push(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    pub fn all(&self) -> &[Rule] {
        &self.rules
    }

    pub(crate) fn rules_for_year(&self, year: i32) -> Vec<Rule> {
        self.rules
            .iter()
            .filter(|rule| rule.range().contains(&year))
            .cloned()
            .collect()
    }

    /// The LETTER data to assume before any transition has happened:
    /// the earliest rule with a SAVE of zero.
    pub(crate) fn initial_transition_letters(&self) -> Option<String> {
        self.rules
            .iter()
            .find(|rule| rule.save == Time::default())
            .and_then(|rule| rule.letters.clone())
    }

    /// Searches for the rule most recently applied before `transition_point`.
    pub(crate) fn search_last_active_rule(&self, transition_point: i64) -> Option<&Rule> {
        let mut last = (i64::MIN, None);
        for rule in &self.rules {
            let epoch_days = epoch_days_for_rule_date(rule.to, rule.in_month, rule.on_date);
            let rule_date_in_seconds = epoch_seconds_for_epoch_days(epoch_days);
            if rule_date_in_seconds < transition_point && last.0 < rule_date_in_seconds {
                last = (rule_date_in_seconds, Some(rule))
            } else if transition_point < rule_date_in_seconds {
                break;
            }
        }
        last.1
    }

    /// The last year for which a transition is worth precomputing.
    ///
    /// Rules running to "max" contribute their FROM year; beyond it the
    /// derived POSIX string takes over.
    pub(crate) fn final_precompute_year(&self) -> Option<i32> {
        self.rules
            .iter()
            .map(|rule| if rule.to == YEAR_MAX { rule.from } else { rule.to })
            .max()
    }

    /// Finds the rules in effect after every dated rule has expired.
    ///
    /// Returns `None` when the set never settles into a standard-time
    /// rule, which a well-formed database does not produce.
    pub(crate) fn get_last_rules(&self) -> Option<LastRules> {
        let mut final_epoch_days = i32::MIN;
        let mut final_rule = None;
        let mut std_max = None;
        let mut savings_max = None;

        for rule in &self.rules {
            if rule.to < YEAR_MAX {
                let epoch_days = epoch_days_for_rule_date(rule.to, rule.in_month, rule.on_date);
                if final_epoch_days < epoch_days {
                    final_epoch_days = epoch_days;
                    final_rule = Some(rule.clone());
                }
            } else if rule.is_dst() {
                savings_max = Some(rule.clone())
            } else {
                std_max = Some(rule.clone())
            }
        }

        let standard = std_max.or(final_rule)?;
        Some(LastRules {
            standard,
            saving: savings_max,
        })
    }
}

/// A single Rule line.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub from: i32,
    pub to: i32,
    pub in_month: Month,
    pub on_date: DayOfMonth,
    pub at: QualifiedTime,
    pub save: Time,
    pub letters: Option<String>,
}

impl Rule {
    fn range(&self) -> RangeInclusive<i32> {
        self.from..=self.to
    }

    pub(crate) fn is_dst(&self) -> bool {
        self.save != Time::default()
    }

    /// Returns the UTC transition instant for the given year, applying
    /// `saving` as the DST offset in effect before this rule.
    pub(crate) fn transition_time_for_year(
        &self,
        year: i32,
        std_offset: &Time,
        saving: &Time,
    ) -> i64 {
        let epoch_days = epoch_days_for_rule_date(year, self.in_month, self.on_date);
        let epoch_seconds = epoch_seconds_for_epoch_days(epoch_days);
        epoch_seconds
            + self
                .at
                .to_universal_seconds(std_offset.as_secs(), saving.as_secs())
    }
}

/// Calculates the epoch days selected by a rule date in a given year and month.
///
/// The `>=`/`<=` searches and the `last` walk operate in epoch-day space,
/// so a selection near a month boundary may land in the neighboring
/// month. The IN-ON combination "Oct Sun>=31" stands for the first
/// Sunday on or after October 31, even if that Sunday falls in November.
pub(crate) fn epoch_days_for_rule_date(year: i32, month: Month, day_of_month: DayOfMonth) -> i32 {
    let day_of_year_for_month = month.month_start_to_day_of_year(year);
    let epoch_days_for_year = utils::epoch_days_for_year(year);
    let epoch_days = epoch_days_for_year + day_of_year_for_month;
    let day_of_month = match day_of_month {
        DayOfMonth::Last(weekday) => {
            let mut day_of_month = month.month_end_to_day_of_year(year) - day_of_year_for_month;
            loop {
                let target_days = epoch_days + day_of_month;
                let target_week_day = utils::epoch_days_to_week_day(target_days);
                if target_week_day == weekday as u8 {
                    break;
                }
                day_of_month -= 1;
            }
            day_of_month
        }
        DayOfMonth::WeekDayGEThanMonthDay(week_day, d) => {
            let mut day_of_month = d as i32 - 1;
            loop {
                let target_days = epoch_days + day_of_month;
                let target_week_day = utils::epoch_days_to_week_day(target_days);
                if week_day as u8 == target_week_day {
                    break day_of_month;
                }
                day_of_month += 1;
            }
        }
        DayOfMonth::WeekDayLEThanMonthDay(week_day, d) => {
            let mut day_of_month = d as i32 - 1;
            loop {
                let target_days = epoch_days + day_of_month;
                let target_week_day = utils::epoch_days_to_week_day(target_days);
                if week_day as u8 == target_week_day {
                    break day_of_month;
                }
                day_of_month -= 1;
            }
        }
        DayOfMonth::Day(day) => day as i32 - 1,
    };
    epoch_days + day_of_month
}

fn parse_from_year(s: &str, ctx: &mut LineParseContext) -> Result<i32, TzdataParseError> {
    if s.starts_with("mi") {
        return Ok(YEAR_MIN);
    }
    s.context_parse::<i32>(ctx)
}

fn parse_to_year(s: &str, from: i32, ctx: &mut LineParseContext) -> Result<i32, TzdataParseError> {
    if s.starts_with('o') {
        return Ok(from);
    }
    if s.starts_with("ma") {
        return Ok(YEAR_MAX);
    }
    s.context_parse::<i32>(ctx)
}

impl Rule {
    /// Parse a `Rule` from a line
    ///
    /// A rule line is made up of the following columns:
    ///
    /// # Rule    NAME    FROM    TO    -    IN    ON    AT    SAVE    LETTER
    ///
    /// The "-" is a reserved field that represents the deprecated TYPE
    /// field. It is preserved for backward compatibility reasons.
    pub fn parse_from_line(
        line: &str,
        context: &mut LineParseContext,
    ) -> Result<(String, Self), TzdataParseError> {
        context.enter("Rule");
        let mut splits = line.split_whitespace();
        let keyword = splits.next(); // Consume "Rule" or "R"
        debug_assert!(keyword == Some("Rule") || keyword == Some("R"));
        // AKA the NAME field
        let name = next_split(&mut splits, context)?.to_owned();
        let from = parse_from_year(next_split(&mut splits, context)?, context)?;
        let to = parse_to_year(next_split(&mut splits, context)?, from, context)?;
        if to < from {
            return Err(TzdataParseError::InvalidYearRange(context.line_number));
        }
        next_split(&mut splits, context)?; // Skip the deprecated TYPE field
        let in_month = next_split(&mut splits, context)?.context_parse::<Month>(context)?;
        let on_date = next_split(&mut splits, context)?.context_parse::<DayOfMonth>(context)?;
        let at = next_split(&mut splits, context)?.context_parse::<QualifiedTime>(context)?;
        // The SAVE amount may carry a trailing `s`/`d` marker; DST status
        // is derived from the amount being non-zero.
        let save_field = next_split(&mut splits, context)?;
        let save = save_field
            .trim_end_matches(['s', 'd'])
            .context_parse::<Time>(context)?;
        let letter_field = next_split(&mut splits, context)?;
        let letters = if letter_field == "-" {
            None
        } else {
            Some(letter_field.to_owned())
        };

        context.exit();
        let data = Rule {
            from,
            to,
            in_month,
            on_date,
            at,
            save,
            letters,
        };

        Ok((name, data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Sign, WeekDay};
    use crate::utils::{epoch_days_to_week_day, ymd_from_epoch_days};

    const TEST_DATA: [&str; 12] = [
        "Rule	Algeria	1916	only	-	Jun	14	23:00s	1:00	S",
        "Rule	Algeria	1916	1919	-	Oct	Sun>=1	23:00s	0	-",
        "Rule	Algeria	1917	only	-	Mar	24	23:00s	1:00	S",
        "Rule	Algeria	1918	only	-	Mar	 9	23:00s	1:00	S",
        "Rule	Algeria	1939	only	-	Nov	19	 1:00	0	-",
        "Rule	Algeria	1944	1945	-	Apr	Mon>=1	 2:00	1:00	S",
        "Rule	Algeria	1944	only	-	Oct	 8	 2:00	0	-",
        "Rule	Algeria	1971	only	-	Sep	26	23:00s	0	-",
        "Rule	Algeria	1977	only	-	May	 6	 0:00	1:00	S",
        "Rule	Algeria	1978	only	-	Mar	24	 1:00	1:00	S",
        "Rule	Algeria	1980	only	-	Apr	25	 0:00	1:00	S",
        "Rule	Algeria	1980	only	-	Oct	31	 2:00	0	-",
    ];

    #[test]
    fn rule_parse() {
        let (name, data) =
            Rule::parse_from_line(TEST_DATA[0], &mut LineParseContext::default()).unwrap();
        assert_eq!(name, "Algeria");
        assert_eq!(
            data,
            Rule {
                from: 1916,
                to: 1916,
                in_month: Month::Jun,
                on_date: DayOfMonth::Day(14),
                at: QualifiedTime::Standard(Time {
                    sign: Sign::Positive,
                    hour: 23,
                    minute: 0,
                    second: 0
                }),
                save: Time {
                    sign: Sign::Positive,
                    hour: 1,
                    minute: 0,
                    second: 0
                },
                letters: Some("S".to_owned()),
            }
        );
    }

    #[test]
    fn rule_parse_cycle() {
        for line in TEST_DATA {
            let _success = Rule::parse_from_line(line, &mut LineParseContext::default()).unwrap();
        }
    }

    #[test]
    fn compact_rule_line() {
        let compact = "R u 1918 1919 - Mar lastSu 2 1 D";
        let (name, rule) =
            Rule::parse_from_line(compact, &mut LineParseContext::default()).unwrap();
        assert_eq!(name, "u");
        assert_eq!(rule.in_month, Month::Mar);
        assert_eq!(rule.on_date, DayOfMonth::Last(WeekDay::Sun));
        assert_eq!(rule.save.as_secs(), 3600);
    }

    #[test]
    fn year_sentinels() {
        let (_, rule) = Rule::parse_from_line(
            "Rule	EU	1981	max	-	Mar	lastSun	 1:00u	1:00	S",
            &mut LineParseContext::default(),
        )
        .unwrap();
        assert_eq!((rule.from, rule.to), (1981, YEAR_MAX));

        let (_, rule) = Rule::parse_from_line(
            "Rule	X	min	1918	-	Mar	lastSun	 1:00u	1:00	S",
            &mut LineParseContext::default(),
        )
        .unwrap();
        assert_eq!((rule.from, rule.to), (YEAR_MIN, 1918));

        let err = Rule::parse_from_line(
            "Rule	X	1990	1980	-	Mar	lastSun	 1:00u	1:00	S",
            &mut LineParseContext::default(),
        )
        .unwrap_err();
        assert!(matches!(err, TzdataParseError::InvalidYearRange(_)));
    }

    #[test]
    fn date_calcs() {
        // Test epoch
        let epoch_days = epoch_days_for_rule_date(1970, Month::Jan, DayOfMonth::Day(1));
        assert_eq!(epoch_days, 0);

        // Last Sunday of March 2024 was the 31st
        let epoch_days = epoch_days_for_rule_date(2024, Month::Mar, DayOfMonth::Last(WeekDay::Sun));
        assert_eq!(ymd_from_epoch_days(epoch_days), (2024, 3, 31));

        // First Sunday on or after March 8th, 2024 was the 10th
        let epoch_days = epoch_days_for_rule_date(
            2024,
            Month::Mar,
            DayOfMonth::WeekDayGEThanMonthDay(WeekDay::Sun, 8),
        );
        assert_eq!(ymd_from_epoch_days(epoch_days), (2024, 3, 10));

        // Test pre epoch
        let epoch_days = epoch_days_for_rule_date(1969, Month::Dec, DayOfMonth::Day(31));
        assert_eq!(epoch_days, -1);
        let epoch_days = epoch_days_for_rule_date(1969, Month::Dec, DayOfMonth::Last(WeekDay::Sun));
        assert_eq!(epoch_days, -4);
        let epoch_days = epoch_days_for_rule_date(
            1969,
            Month::Dec,
            DayOfMonth::WeekDayLEThanMonthDay(WeekDay::Sun, 30),
        );
        assert_eq!(epoch_days, -4);
    }

    #[test]
    fn rule_date_may_spill_into_next_month() {
        // "Oct Sun>=31" in 2022: October 31st was a Monday, so the
        // selection lands on November 6th.
        let epoch_days = epoch_days_for_rule_date(
            2022,
            Month::Oct,
            DayOfMonth::WeekDayGEThanMonthDay(WeekDay::Sun, 31),
        );
        assert_eq!(ymd_from_epoch_days(epoch_days), (2022, 11, 6));
        assert_eq!(epoch_days_to_week_day(epoch_days), WeekDay::Sun as u8);
    }

    #[test]
    fn resolved_dates_land_on_requested_weekday() {
        for selector in [
            DayOfMonth::Last(WeekDay::Fri),
            DayOfMonth::WeekDayGEThanMonthDay(WeekDay::Thurs, 15),
            DayOfMonth::WeekDayLEThanMonthDay(WeekDay::Mon, 25),
        ] {
            let weekday = match selector {
                DayOfMonth::Last(w)
                | DayOfMonth::WeekDayGEThanMonthDay(w, _)
                | DayOfMonth::WeekDayLEThanMonthDay(w, _) => w,
                DayOfMonth::Day(_) => unreachable!(),
            };
            for year in [1969, 1999, 2024, 2025] {
                let days = epoch_days_for_rule_date(year, Month::Jun, selector);
                assert_eq!(epoch_days_to_week_day(days), weekday as u8);
            }
        }
    }

    #[test]
    fn scenario_standard_time_reference() {
        // A rule at 2:00s with an era standard offset of +1:00 and no
        // prior DST resolves one hour before local 2:00.
        let (_, rule) = Rule::parse_from_line(
            "Rule	EU	1970	only	-	Jan	1	2:00s	1:00	S",
            &mut LineParseContext::default(),
        )
        .unwrap();
        let std = Time::from_seconds(3600);
        let at = rule.transition_time_for_year(1970, &std, &Time::default());
        assert_eq!(at, 3600); // 1970-01-01T01:00:00Z
    }
}
