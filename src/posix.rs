//! POSIX time zone strings
//!
//! The POSIX string designated by the [GNU documentation][gnu-docs] is
//! both derived here from a zone's final era (for zones whose rules run
//! open-ended) and decoded back into structured rules. Only the
//! `Mm.w.d` transition date form is decoded; it is the only form the
//! compiled database emits.
//!
//! [gnu-docs]: https://www.gnu.org/software/libc/manual/html_node/TZ-Variable.html

use crate::{
    rule::{LastRules, Rule},
    types::{DayOfMonth, Month, QualifiedTime, Sign, Time, WeekDay},
    utils::month_to_day,
    zone::Era,
};
use alloc::{borrow::ToOwned, string::String};
use core::fmt::Write;

/// Seconds added to the standard offset when a DST designator carries
/// no explicit offset.
const DST_OFFSET_DEFAULT: i64 = 3600;

/// The POSIX time zone string decoding error
#[derive(Debug, Clone, PartialEq)]
pub enum PosixParseError {
    Empty,
    /// Designators are barewords or angle-bracket quoted
    InvalidDesignator(String),
    InvalidOffset(String),
    /// A date form other than `Mm.w.d`, e.g. the Julian `Jn`/`n` forms
    UnsupportedDateForm(String),
    InvalidDate(String),
    /// A DST designator without transition dates
    MissingTransitionRule(String),
    TrailingInput(String),
}

impl core::fmt::Display for PosixParseError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty POSIX time zone string"),
            Self::InvalidDesignator(s) => write!(f, "invalid designator in {s:?}"),
            Self::InvalidOffset(s) => write!(f, "invalid offset in {s:?}"),
            Self::UnsupportedDateForm(s) => {
                write!(f, "unsupported transition date form {s:?} (only Mm.w.d)")
            }
            Self::InvalidDate(s) => write!(f, "invalid transition date {s:?}"),
            Self::MissingTransitionRule(s) => {
                write!(f, "DST designator without transition rules in {s:?}")
            }
            Self::TrailingInput(s) => write!(f, "trailing input {s:?}"),
        }
    }
}

/// A structured POSIX time zone.
#[derive(Debug, PartialEq)]
pub struct PosixTimeZone {
    pub abbr: PosixAbbreviation,
    /// Offset in the local-minus-UTC convention (POSIX source text is
    /// inverted; the decoder negates it)
    pub offset: Time,
    pub transition_info: Option<PosixTransition>,
}

impl PosixTimeZone {
    pub(crate) fn from_era_and_savings(era: &Era, savings: Time) -> Self {
        let offset = era.std_offset.add(savings);
        let formatted = era
            .format
            .format(offset.as_secs(), None, savings != Time::default());
        let abbr = PosixAbbreviation {
            is_numeric: is_numeric(&formatted),
            formatted,
        };
        Self {
            abbr,
            offset,
            transition_info: None,
        }
    }

    pub(crate) fn from_era_and_rules(era: &Era, rules: &LastRules) -> Self {
        let offset = era.std_offset.add(rules.standard.save);
        let formatted = era.format.format(
            era.std_offset.as_secs(),
            rules.standard.letters.as_deref(),
            rules.standard.is_dst(),
        );
        let is_numeric = is_numeric(&formatted);
        let abbr = PosixAbbreviation {
            is_numeric,
            formatted,
        };

        let transition_info = rules.saving.as_ref().map(|rule| {
            let formatted = era.format.format(
                era.std_offset.as_secs() + rule.save.as_secs(),
                rule.letters.as_deref(),
                rule.is_dst(),
            );
            let abbr = PosixAbbreviation {
                is_numeric,
                formatted,
            };
            let savings = rule.save;
            let start =
                PosixDateTime::from_rule_and_transition_info(rule, era.std_offset, rules.standard.save);
            let end = PosixDateTime::from_rule_and_transition_info(
                &rules.standard,
                era.std_offset,
                rule.save,
            );
            PosixTransition {
                abbr,
                savings,
                start,
                end,
            }
        });

        PosixTimeZone {
            abbr,
            offset,
            transition_info,
        }
    }
}

// ==== Decoding ====

impl PosixTimeZone {
    /// Decodes a POSIX time zone string.
    ///
    /// `STD offset[DST[offset][,date[/time][,date[/time]]]]`
    pub fn parse(tzstr: &str) -> Result<Self, PosixParseError> {
        let mut rest = tzstr.strip_prefix(':').unwrap_or(tzstr);
        if rest.is_empty() {
            return Err(PosixParseError::Empty);
        }
        let std_abbr = take_designator(&mut rest, tzstr)?;
        let std_offset = take_offset(&mut rest, tzstr)?
            .ok_or_else(|| PosixParseError::InvalidOffset(tzstr.to_owned()))?;

        let mut transition_info = None;
        if rest.starts_with(|c: char| c.is_ascii_alphabetic() || c == '<') {
            let dst_abbr = take_designator(&mut rest, tzstr)?;
            let dst_offset =
                take_offset(&mut rest, tzstr)?.unwrap_or(std_offset + DST_OFFSET_DEFAULT);

            let Some(stripped) = rest.strip_prefix(',') else {
                return Err(PosixParseError::MissingTransitionRule(tzstr.to_owned()));
            };
            rest = stripped;
            let start = take_datetime(&mut rest)?;
            rest = rest
                .strip_prefix(',')
                .ok_or_else(|| PosixParseError::InvalidDate(tzstr.to_owned()))?;
            let end = take_datetime(&mut rest)?;

            transition_info = Some(PosixTransition {
                abbr: PosixAbbreviation {
                    is_numeric: is_numeric(&dst_abbr),
                    formatted: dst_abbr,
                },
                savings: Time::from_seconds(dst_offset - std_offset),
                start,
                end,
            });
        }

        if !rest.is_empty() {
            return Err(PosixParseError::TrailingInput(rest.to_owned()));
        }

        Ok(PosixTimeZone {
            abbr: PosixAbbreviation {
                is_numeric: is_numeric(&std_abbr),
                formatted: std_abbr,
            },
            offset: Time::from_seconds(std_offset),
            transition_info,
        })
    }
}

fn take_designator(rest: &mut &str, whole: &str) -> Result<String, PosixParseError> {
    if let Some(quoted) = rest.strip_prefix('<') {
        let (name, after) = quoted
            .split_once('>')
            .ok_or_else(|| PosixParseError::InvalidDesignator(whole.to_owned()))?;
        if name.is_empty() {
            return Err(PosixParseError::InvalidDesignator(whole.to_owned()));
        }
        *rest = after;
        return Ok(name.to_owned());
    }
    let end = rest
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(rest.len());
    if end == 0 {
        return Err(PosixParseError::InvalidDesignator(whole.to_owned()));
    }
    let (name, after) = rest.split_at(end);
    *rest = after;
    Ok(name.to_owned())
}

/// Takes an `[-]h[:mm[:ss]]` offset and negates it: POSIX offsets are
/// "subtract from local to get UTC", the rest of this crate is
/// local-minus-UTC.
fn take_offset(rest: &mut &str, whole: &str) -> Result<Option<i64>, PosixParseError> {
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || matches!(c, ':' | '+' | '-')))
        .unwrap_or(rest.len());
    if end == 0 {
        return Ok(None);
    }
    let (field, after) = rest.split_at(end);
    *rest = after;
    let (field, sign) = match field.strip_prefix('-') {
        Some(stripped) => (stripped, -1i64),
        None => (field.strip_prefix('+').unwrap_or(field), 1),
    };
    let mut seconds = 0i64;
    for (i, part) in field.split(':').enumerate() {
        if i > 2 {
            return Err(PosixParseError::InvalidOffset(whole.to_owned()));
        }
        let value = part
            .parse::<i64>()
            .map_err(|_| PosixParseError::InvalidOffset(whole.to_owned()))?;
        seconds += value * [3600, 60, 1][i];
    }
    Ok(Some(-(seconds * sign)))
}

fn take_datetime(rest: &mut &str) -> Result<PosixDateTime, PosixParseError> {
    let end = rest.find(',').unwrap_or(rest.len());
    let (field, after) = rest.split_at(end);
    *rest = after;

    let (date, time) = match field.split_once('/') {
        Some((date, time)) => (date, Some(time)),
        None => (field, None),
    };

    let mwd = date
        .strip_prefix('M')
        .ok_or_else(|| PosixParseError::UnsupportedDateForm(date.to_owned()))?;
    let mut parts = mwd.split('.');
    let month = next_date_part(&mut parts, date)?;
    let week = next_date_part(&mut parts, date)?;
    let day = next_date_part(&mut parts, date)?;
    if parts.next().is_some() {
        return Err(PosixParseError::InvalidDate(date.to_owned()));
    }
    let month =
        Month::from_index(month).ok_or_else(|| PosixParseError::InvalidDate(date.to_owned()))?;
    if !(1..=5).contains(&week) {
        return Err(PosixParseError::InvalidDate(date.to_owned()));
    }
    let day =
        WeekDay::from_index(day).ok_or_else(|| PosixParseError::InvalidDate(date.to_owned()))?;

    let time = match time {
        Some(t) => parse_transition_time(t)?,
        None => Time::two_hour(),
    };

    Ok(PosixDateTime {
        date: PosixDate::MonthWeekDay(MonthWeekDay(month, week, day)),
        time,
    })
}

fn next_date_part(
    parts: &mut core::str::Split<'_, char>,
    date: &str,
) -> Result<u8, PosixParseError> {
    parts
        .next()
        .and_then(|p| p.parse::<u8>().ok())
        .ok_or_else(|| PosixParseError::InvalidDate(date.to_owned()))
}

/// Transition times may be negative or exceed 24h (Nuuk, Scoresbysund).
fn parse_transition_time(s: &str) -> Result<Time, PosixParseError> {
    let (s, sign) = match s.strip_prefix('-') {
        Some(stripped) => (stripped, Sign::Negative),
        None => (s.strip_prefix('+').unwrap_or(s), Sign::Positive),
    };
    let mut fields = [0u8; 3];
    for (i, part) in s.split(':').enumerate() {
        if i > 2 {
            return Err(PosixParseError::InvalidDate(s.to_owned()));
        }
        fields[i] = part
            .parse::<u8>()
            .map_err(|_| PosixParseError::InvalidDate(s.to_owned()))?;
    }
    Ok(Time {
        sign,
        hour: fields[0],
        minute: fields[1],
        second: fields[2],
    })
}

// ==== Encoding ====

impl PosixTimeZone {
    pub fn to_string(&self) -> Result<String, core::fmt::Error> {
        let mut posix_string = String::new();
        write_abbr(&self.abbr, &mut posix_string)?;
        write_inverted_time(&self.offset, &mut posix_string)?;

        if let Some(transition_info) = &self.transition_info {
            write_abbr(&transition_info.abbr, &mut posix_string)?;
            if transition_info.savings != Time::one_hour() {
                write_inverted_time(&self.offset.add(transition_info.savings), &mut posix_string)?;
            }
            write_date_time(&transition_info.start, &mut posix_string)?;
            write_date_time(&transition_info.end, &mut posix_string)?;
        }
        Ok(posix_string)
    }
}

/// The representation of a POSIX time zone transition
#[non_exhaustive]
#[derive(Debug, PartialEq)]
pub struct PosixTransition {
    /// The transition's designated abbreviation
    pub abbr: PosixAbbreviation,
    /// The savings value to be added to the offset
    pub savings: Time,
    /// The start time for the transition
    pub start: PosixDateTime,
    /// The end time for the transition
    pub end: PosixDateTime,
}

#[non_exhaustive]
#[derive(Debug, PartialEq, Clone)]
pub struct PosixAbbreviation {
    /// Flag whether formatted abbreviation is numeric
    pub is_numeric: bool,
    /// The formatted abbreviation
    pub formatted: String,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub struct MonthWeekDay(pub Month, pub u8, pub WeekDay);

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum PosixDate {
    /// Day of year, 1-based, February 29 never counted. Encode-only.
    JulianNoLeap(u16),
    MonthWeekDay(MonthWeekDay),
}

impl PosixDate {
    pub(crate) fn from_rule(rule: &Rule) -> Self {
        match rule.on_date {
            // The `J` form names the same calendar date every year.
            DayOfMonth::Day(day) => {
                PosixDate::JulianNoLeap(month_to_day(rule.in_month as u8, 0) as u16 + day as u16)
            }
            DayOfMonth::Last(wd) => PosixDate::MonthWeekDay(MonthWeekDay(rule.in_month, 5, wd)),
            DayOfMonth::WeekDayGEThanMonthDay(week_day, day_of_month) => {
                let week = 1 + (day_of_month - 1) / 7;
                PosixDate::MonthWeekDay(MonthWeekDay(rule.in_month, week, week_day))
            }
            DayOfMonth::WeekDayLEThanMonthDay(week_day, day_of_month) => {
                let week = day_of_month / 7;
                PosixDate::MonthWeekDay(MonthWeekDay(rule.in_month, week, week_day))
            }
        }
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub struct PosixDateTime {
    pub date: PosixDate,
    pub time: Time,
}

impl PosixDateTime {
    pub(crate) fn from_rule_and_transition_info(rule: &Rule, offset: Time, savings: Time) -> Self {
        let date = PosixDate::from_rule(rule);
        let time = match rule.at {
            QualifiedTime::Local(time) => time,
            QualifiedTime::Standard(standard_time) => standard_time.add(rule.save),
            QualifiedTime::Universal(universal_time) => universal_time.add(offset).add(savings),
        };
        Self { date, time }
    }
}

// ==== Helper functions ====

fn is_numeric(str: &str) -> bool {
    str.parse::<i16>().is_ok()
}

fn write_abbr(posix_abbr: &PosixAbbreviation, output: &mut String) -> core::fmt::Result {
    if posix_abbr.is_numeric {
        write!(output, "<")?;
        write!(output, "{}", posix_abbr.formatted)?;
        write!(output, ">")?;
        return Ok(());
    }
    write!(output, "{}", posix_abbr.formatted)
}

fn write_inverted_time(time: &Time, output: &mut String) -> core::fmt::Result {
    // Yep, it's inverted
    if time.sign == Sign::Positive && time.as_secs() != 0 {
        write!(output, "-")?;
    }
    write_time(time, output, false)
}

fn write_time(time: &Time, output: &mut String, signed: bool) -> core::fmt::Result {
    if signed && time.sign == Sign::Negative && time.as_secs() != 0 {
        write!(output, "-")?;
    }
    write!(output, "{}", time.hour)?;
    if time.minute == 0 && time.second == 0 {
        return Ok(());
    }
    write!(output, ":{}", time.minute)?;
    if time.second > 0 {
        write!(output, ":{}", time.second)?;
    }
    Ok(())
}

fn write_date_time(datetime: &PosixDateTime, output: &mut String) -> core::fmt::Result {
    write!(output, ",")?;
    match datetime.date {
        PosixDate::JulianNoLeap(d) => write!(output, "J{d}")?,
        PosixDate::MonthWeekDay(MonthWeekDay(month, week, day)) => {
            write!(output, "M{}.{week}.{}", month as u8, day as u8)?
        }
    }
    if datetime.time != Time::two_hour() {
        write!(output, "/")?;
        write_time(&datetime.time, output, true)?;
    }
    Ok(())
}
