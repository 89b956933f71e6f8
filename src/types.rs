//! Field value types shared by the tzdata text grammar
//!
//! This module contains the general value types that appear in Rule,
//! Zone, and Link records.

use core::fmt::Write;

use alloc::{borrow::ToOwned, string::String};

use crate::{
    parser::{next_split, ContextParse, LineParseContext, TryFromStr, TzdataParseError},
    rule::epoch_days_for_rule_date,
    utils,
};

// ==== Zone record specific types ====

/// The RULES column of an era: no rule, a literal fixed savings amount,
/// or a reference to a named rule set.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleRef {
    None,
    Fixed(Time),
    Named(String),
}

impl TryFromStr<LineParseContext> for RuleRef {
    type Error = TzdataParseError;
    fn try_from_str(s: &str, ctx: &mut LineParseContext) -> Result<Self, Self::Error> {
        ctx.enter("RuleRef");
        if s == "-" {
            ctx.exit();
            return Ok(Self::None);
        }
        if s.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '+') {
            ctx.exit();
            return Time::try_from_str(s, ctx).map(Self::Fixed);
        }
        ctx.exit();
        Ok(Self::Named(s.to_owned()))
    }
}

/// The FORMAT column of an era.
#[derive(Debug, Clone, PartialEq)]
pub enum AbbreviationFormat {
    String(String),
    Numeric,
    Pair(String, String),
    Formattable(FormattableAbbr),
}

impl AbbreviationFormat {
    pub fn format(&self, offset: i64, letters: Option<&str>, is_dst: bool) -> String {
        match self {
            Self::String(s) => s.clone(),
            Self::Formattable(s) => s.to_formatted_string(letters.unwrap_or("")),
            Self::Pair(std, dst) => {
                if is_dst {
                    dst.clone()
                } else {
                    std.clone()
                }
            }
            Self::Numeric => offset_to_str(offset),
        }
    }
}

fn offset_to_str(n: i64) -> String {
    let mut output = String::new();
    if n.is_negative() {
        write!(&mut output, "-").expect("failed to write");
    } else {
        write!(&mut output, "+").expect("failed to write");
    }
    let hour = n.abs().div_euclid(3600);
    write!(&mut output, "{hour:02}").expect("failed to write");
    let minute = n.abs().rem_euclid(3600).div_euclid(60);
    if minute > 0 {
        write!(&mut output, "{minute:02}").expect("failed to write");
    }
    output
}

impl TryFromStr<LineParseContext> for AbbreviationFormat {
    type Error = TzdataParseError;
    fn try_from_str(s: &str, ctx: &mut LineParseContext) -> Result<Self, Self::Error> {
        ctx.enter("Abbr. Format");
        let value = if s.contains("%s") {
            Ok(Self::Formattable(FormattableAbbr(s.to_owned())))
        } else if s.contains("%z") {
            Ok(Self::Numeric)
        } else if s.contains('/') {
            let (std, dst) = s
                .split_once('/')
                .ok_or(TzdataParseError::unknown(s, ctx))?;
            Ok(Self::Pair(std.to_owned(), dst.to_owned()))
        } else {
            Ok(AbbreviationFormat::String(s.to_owned()))
        };
        ctx.exit();
        value
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormattableAbbr(String);

impl FormattableAbbr {
    pub fn to_formatted_string(&self, letters: &str) -> String {
        self.0.replace("%s", letters)
    }
}

/// The UNTIL column of an era: `year [month [day [time]]]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UntilDateTime {
    pub date: Date,
    pub time: QualifiedTime,
}

impl UntilDateTime {
    pub fn as_date_secs(self) -> i64 {
        self.date.as_secs()
    }

    pub fn as_precise_ut_time(self, std_offset: i64, save: i64) -> i64 {
        self.as_date_secs() + self.time.to_universal_seconds(std_offset, save)
    }
}

impl TryFromStr<LineParseContext> for UntilDateTime {
    type Error = TzdataParseError;
    fn try_from_str(s: &str, ctx: &mut LineParseContext) -> Result<Self, Self::Error> {
        ctx.enter("UntilDateTime");
        let mut splits = s.split_whitespace();
        let year = next_split(&mut splits, ctx)?.context_parse::<i32>(ctx)?;
        let date = if let Some(month) = splits.next() {
            let month = month.context_parse::<Month>(ctx)?;
            let day = splits
                .next()
                .map(|s| s.context_parse::<DayOfMonth>(ctx))
                .transpose()?
                .unwrap_or(DayOfMonth::Day(1));
            Date { year, month, day }
        } else {
            ctx.exit();
            return Ok(UntilDateTime {
                date: Date {
                    year,
                    month: Month::Jan,
                    day: DayOfMonth::Day(1),
                },
                time: QualifiedTime::Local(Time::default()),
            });
        };

        let time = splits
            .next()
            .map(|t| t.context_parse::<QualifiedTime>(ctx))
            .transpose()?
            .unwrap_or(QualifiedTime::Local(Time::default()));

        ctx.exit();
        Ok(Self { date, time })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Date {
    pub year: i32,
    pub month: Month,
    pub day: DayOfMonth,
}

impl Date {
    pub fn as_secs(&self) -> i64 {
        let epoch_days = epoch_days_for_rule_date(self.year, self.month, self.day);
        utils::epoch_seconds_for_epoch_days(epoch_days)
    }
}

/// `Time` represents any [-]hh:mm:ss time value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Time {
    pub sign: Sign,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(i8)]
pub enum Sign {
    #[default]
    Positive = 1,
    Negative = -1,
}

impl Time {
    pub(crate) const fn one_hour() -> Self {
        Time {
            sign: Sign::Positive,
            hour: 1,
            minute: 0,
            second: 0,
        }
    }

    pub(crate) const fn two_hour() -> Self {
        Time {
            sign: Sign::Positive,
            hour: 2,
            minute: 0,
            second: 0,
        }
    }

    pub const fn as_secs(&self) -> i64 {
        (self.hour as i64 * 3600 + self.minute as i64 * 60 + self.second as i64) * self.sign as i64
    }

    pub const fn from_seconds(seconds: i64) -> Self {
        let sign = if seconds < 0 {
            Sign::Negative
        } else {
            Sign::Positive
        };
        let (hour, rem) = (
            seconds.abs().div_euclid(3600),
            seconds.abs().rem_euclid(3600),
        );
        let (minute, second) = (rem.abs().div_euclid(60), rem.abs().rem_euclid(60));
        debug_assert!(hour < u8::MAX as i64);
        Self {
            sign,
            hour: hour as u8,
            minute: minute as u8,
            second: second as u8,
        }
    }

    pub fn add(&self, other: Self) -> Self {
        Self::from_seconds(self.as_secs() + other.as_secs())
    }
}

impl TryFromStr<LineParseContext> for Time {
    type Error = TzdataParseError;
    fn try_from_str(s: &str, ctx: &mut LineParseContext) -> Result<Self, Self::Error> {
        ctx.enter("Time");
        let (s, sign) = if let Some(stripped) = s.strip_prefix('-') {
            (stripped, Sign::Negative)
        } else {
            (s.strip_prefix('+').unwrap_or(s), Sign::Positive)
        };
        if !s.contains(':') {
            let hour = s.context_parse::<u8>(ctx)?;
            ctx.exit();
            return Ok(Time {
                sign,
                hour,
                minute: 0,
                second: 0,
            });
        }
        let (hour, sub_hour) = s
            .split_once(':')
            .ok_or(TzdataParseError::unknown(s, ctx))?;
        let hour = hour.context_parse::<u8>(ctx)?;
        if !sub_hour.contains(':') {
            let minute = sub_hour.context_parse::<u8>(ctx)?;
            ctx.exit();
            return Ok(Self {
                sign,
                hour,
                minute,
                second: 0,
            });
        }
        let (minute, second) = sub_hour
            .split_once(':')
            .ok_or(TzdataParseError::UnknownValue(
                ctx.line_number,
                s.to_owned(),
            ))?;
        let minute = minute.context_parse::<u8>(ctx)?;
        let second = second.context_parse::<u8>(ctx)?;
        ctx.exit();
        Ok(Self {
            sign,
            hour,
            minute,
            second,
        })
    }
}

// ==== Rule types ====

/// The first supported year. Spelled "min" or "mi" in source text.
pub const YEAR_MIN: i32 = 1;
/// The last supported year. Spelled "max" or "ma" in source text.
pub const YEAR_MAX: i32 = 9999;

// Month and weekday names match by unambiguous prefix. The compact
// single-file form shortens them ("O" for October, "Su" for Sunday),
// while area files spell the usual three letters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(u8)]
pub enum Month {
    Jan = 1,
    Feb,
    Mar,
    Apr,
    May,
    Jun,
    Jul,
    Aug,
    Sep,
    Oct,
    Nov,
    Dec,
}

impl Month {
    /// Calculates the day of year for the start of the month
    pub(crate) fn month_start_to_day_of_year(self, year: i32) -> i32 {
        utils::month_to_day(self as u8, utils::num_leap_days(year))
    }

    /// Calculates the day of year for the end of the month
    pub(crate) fn month_end_to_day_of_year(self, year: i32) -> i32 {
        utils::month_to_day(self as u8 + 1, utils::num_leap_days(year)) - 1
    }

    pub(crate) const fn from_index(index: u8) -> Option<Self> {
        Some(match index {
            1 => Self::Jan,
            2 => Self::Feb,
            3 => Self::Mar,
            4 => Self::Apr,
            5 => Self::May,
            6 => Self::Jun,
            7 => Self::Jul,
            8 => Self::Aug,
            9 => Self::Sep,
            10 => Self::Oct,
            11 => Self::Nov,
            12 => Self::Dec,
            _ => return None,
        })
    }
}

impl TryFromStr<LineParseContext> for Month {
    type Error = TzdataParseError;
    fn try_from_str(s: &str, ctx: &mut LineParseContext) -> Result<Self, Self::Error> {
        ctx.enter("Month");
        let result = if s.starts_with("Ja") {
            Ok(Self::Jan)
        } else if s.starts_with('F') {
            Ok(Self::Feb)
        } else if s.starts_with("Mar") {
            Ok(Self::Mar)
        } else if s.starts_with("Ap") {
            Ok(Self::Apr)
        } else if s.starts_with("May") {
            Ok(Self::May)
        } else if s.starts_with("Jun") {
            Ok(Self::Jun)
        } else if s.starts_with("Jul") {
            Ok(Self::Jul)
        } else if s.starts_with("Au") {
            Ok(Self::Aug)
        } else if s.starts_with('S') {
            Ok(Self::Sep)
        } else if s.starts_with('O') {
            Ok(Self::Oct)
        } else if s.starts_with('N') {
            Ok(Self::Nov)
        } else if s.starts_with('D') {
            Ok(Self::Dec)
        } else {
            Err(TzdataParseError::unknown(s, ctx))
        };
        ctx.exit();
        result
    }
}

/// The ON column: a concrete day, the last given weekday of the month,
/// or the first weekday on-or-after / on-or-before a given day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DayOfMonth {
    Last(WeekDay),
    WeekDayGEThanMonthDay(WeekDay, u8),
    WeekDayLEThanMonthDay(WeekDay, u8),
    Day(u8),
}

impl TryFromStr<LineParseContext> for DayOfMonth {
    type Error = TzdataParseError;
    fn try_from_str(s: &str, ctx: &mut LineParseContext) -> Result<Self, Self::Error> {
        ctx.enter("DayOfMonth");
        let result = if let Some(weekday) = s.strip_prefix("last") {
            Ok(DayOfMonth::Last(weekday.context_parse(ctx)?))
        } else if s.contains(">=") {
            let (week_day, day) = parse_date_split(s, ">=", ctx)?;
            Ok(DayOfMonth::WeekDayGEThanMonthDay(week_day, day))
        } else if s.contains("<=") {
            let (week_day, day) = parse_date_split(s, "<=", ctx)?;
            Ok(DayOfMonth::WeekDayLEThanMonthDay(week_day, day))
        } else {
            s.context_parse(ctx).map(DayOfMonth::Day)
        };
        ctx.exit();
        result
    }
}

fn parse_date_split(
    s: &str,
    pat: &str,
    ctx: &mut LineParseContext,
) -> Result<(WeekDay, u8), TzdataParseError> {
    let (week_day, num) = s
        .split_once(pat)
        .ok_or(TzdataParseError::unknown(s, ctx))?;
    let w = week_day.context_parse::<WeekDay>(ctx)?;
    let d = num.context_parse(ctx)?;
    Ok((w, d))
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(u8)]
pub enum WeekDay {
    Sun = 0,
    Mon,
    Tues,
    Wed,
    Thurs,
    Fri,
    Sat,
}

impl WeekDay {
    pub(crate) const fn from_index(index: u8) -> Option<Self> {
        Some(match index {
            0 => Self::Sun,
            1 => Self::Mon,
            2 => Self::Tues,
            3 => Self::Wed,
            4 => Self::Thurs,
            5 => Self::Fri,
            6 => Self::Sat,
            _ => return None,
        })
    }
}

impl TryFromStr<LineParseContext> for WeekDay {
    type Error = TzdataParseError;
    fn try_from_str(s: &str, ctx: &mut LineParseContext) -> Result<Self, Self::Error> {
        if s.starts_with("Su") {
            Ok(Self::Sun)
        } else if s.starts_with('M') {
            Ok(Self::Mon)
        } else if s.starts_with("Tu") {
            Ok(Self::Tues)
        } else if s.starts_with('W') {
            Ok(Self::Wed)
        } else if s.starts_with("Th") {
            Ok(Self::Thurs)
        } else if s.starts_with('F') {
            Ok(Self::Fri)
        } else if s.starts_with("Sa") {
            Ok(Self::Sat)
        } else {
            Err(TzdataParseError::UnknownValue(
                ctx.line_number,
                s.to_owned(),
            ))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualifiedTimeKind {
    Local,
    Standard,
    Universal,
}

/// `QualifiedTime` represents any [-]hh:mm:ss[u|s|g|z|w] time value,
/// where the time value is qualified with a kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QualifiedTime {
    // Local wall-clock time including dst shifts
    Local(Time),
    // Local standard time excluding dst shifts
    Standard(Time),
    Universal(Time),
}

impl QualifiedTime {
    /// Converts a nominal local instant to universal seconds.
    pub fn to_universal_seconds(&self, std_offset: i64, save: i64) -> i64 {
        match self {
            Self::Local(t) => t.as_secs() - std_offset - save,
            Self::Standard(t) => t.as_secs() - std_offset,
            Self::Universal(t) => t.as_secs(),
        }
    }

    pub fn time_kind(&self) -> QualifiedTimeKind {
        match self {
            Self::Local(_) => QualifiedTimeKind::Local,
            Self::Standard(_) => QualifiedTimeKind::Standard,
            Self::Universal(_) => QualifiedTimeKind::Universal,
        }
    }
}

impl TryFromStr<LineParseContext> for QualifiedTime {
    type Error = TzdataParseError;
    fn try_from_str(s: &str, ctx: &mut LineParseContext) -> Result<Self, Self::Error> {
        // Standard suffix
        if let Some(time) = s.strip_suffix('s') {
            return at_time_variant_from_str(time, ctx, Self::Standard);
        // Universal suffixes
        } else if let Some(time) = s.strip_suffix('u') {
            return at_time_variant_from_str(time, ctx, Self::Universal);
        } else if let Some(time) = s.strip_suffix('g') {
            return at_time_variant_from_str(time, ctx, Self::Universal);
        } else if let Some(time) = s.strip_suffix('z') {
            return at_time_variant_from_str(time, ctx, Self::Universal);
        } else if let Some(time) = s.strip_suffix('w') {
            return at_time_variant_from_str(time, ctx, Self::Local);
        }
        at_time_variant_from_str(s, ctx, Self::Local)
    }
}

fn at_time_variant_from_str<F>(
    s: &str,
    ctx: &mut LineParseContext,
    variant: F,
) -> Result<QualifiedTime, TzdataParseError>
where
    F: FnOnce(Time) -> QualifiedTime,
{
    let time = s.context_parse::<Time>(ctx)?;
    Ok(variant(time))
}

#[cfg(test)]
mod tests {
    use alloc::borrow::ToOwned;

    use crate::parser::{ContextParse, LineParseContext};

    use super::*;

    #[test]
    fn abbr_formatting() {
        let abbr = AbbreviationFormat::Numeric.format(3600, Some("D"), true);
        assert_eq!(abbr, "+01");

        let abbr = AbbreviationFormat::Numeric.format(-16966, None, false);
        assert_eq!(abbr, "-0442");

        let abbr = AbbreviationFormat::Formattable(FormattableAbbr("C%sT".to_owned())).format(
            3600,
            Some("D"),
            false,
        );
        assert_eq!(abbr, "CDT");

        let abbr = AbbreviationFormat::Pair("CST".to_owned(), "CDT".to_owned()).format(
            3600,
            Some("D"),
            true,
        );
        assert_eq!(abbr, "CDT");

        let abbr = AbbreviationFormat::Pair("CST".to_owned(), "CDT".to_owned()).format(
            3600,
            Some("S"),
            false,
        );
        assert_eq!(abbr, "CST");
    }

    #[test]
    fn prefix_month_names() {
        let mut ctx = LineParseContext::default();
        for (compact, full, expected) in [
            ("Ja", "Jan", Month::Jan),
            ("F", "Feb", Month::Feb),
            ("Mar", "Mar", Month::Mar),
            ("Ap", "Apr", Month::Apr),
            ("May", "May", Month::May),
            ("Jun", "Jun", Month::Jun),
            ("Jul", "Jul", Month::Jul),
            ("Au", "Aug", Month::Aug),
            ("S", "Sep", Month::Sep),
            ("O", "Oct", Month::Oct),
            ("N", "Nov", Month::Nov),
            ("D", "Dec", Month::Dec),
        ] {
            assert_eq!(compact.context_parse::<Month>(&mut ctx), Ok(expected));
            assert_eq!(full.context_parse::<Month>(&mut ctx), Ok(expected));
        }
        assert!("Ju".context_parse::<Month>(&mut ctx).is_err());
    }

    #[test]
    fn prefix_weekday_names() {
        let mut ctx = LineParseContext::default();
        for (compact, full, expected) in [
            ("Su", "Sun", WeekDay::Sun),
            ("M", "Mon", WeekDay::Mon),
            ("Tu", "Tue", WeekDay::Tues),
            ("W", "Wed", WeekDay::Wed),
            ("Th", "Thu", WeekDay::Thurs),
            ("F", "Fri", WeekDay::Fri),
            ("Sa", "Sat", WeekDay::Sat),
        ] {
            assert_eq!(compact.context_parse::<WeekDay>(&mut ctx), Ok(expected));
            assert_eq!(full.context_parse::<WeekDay>(&mut ctx), Ok(expected));
        }
        assert!("S".context_parse::<WeekDay>(&mut ctx).is_err());
    }

    #[test]
    fn time_parse() {
        let mut ctx = LineParseContext::default();
        let result = "-5:50:36".context_parse::<Time>(&mut ctx).unwrap();
        assert_eq!(
            result,
            Time {
                sign: Sign::Negative,
                hour: 5,
                minute: 50,
                second: 36,
            }
        );
        assert_eq!(result.as_secs(), -21036);
    }

    #[test]
    fn time_add() {
        let one = Time {
            sign: Sign::Positive,
            hour: 1,
            ..Default::default()
        };
        let result = one.add(Time::default());
        assert_eq!(result, one);

        let neg_three = Time {
            sign: Sign::Negative,
            hour: 3,
            ..Default::default()
        };
        let one_half = Time {
            sign: Sign::Positive,
            hour: 1,
            minute: 30,
            ..Default::default()
        };
        let neg_one_half = neg_three.add(one_half);
        assert_eq!(
            neg_one_half,
            Time {
                sign: Sign::Negative,
                hour: 1,
                minute: 30,
                ..Default::default()
            }
        );

        let neg_half = one.add(neg_one_half);
        assert_eq!(
            neg_half,
            Time {
                sign: Sign::Negative,
                hour: 0,
                minute: 30,
                ..Default::default()
            }
        )
    }

    #[test]
    fn at_time_qualifiers() {
        let mut ctx = LineParseContext::default();
        let wall = "2:00".context_parse::<QualifiedTime>(&mut ctx).unwrap();
        assert_eq!(wall.to_universal_seconds(3600, 3600), 0);

        let std = "2:00s".context_parse::<QualifiedTime>(&mut ctx).unwrap();
        assert_eq!(std.to_universal_seconds(3600, 3600), 3600);

        for universal in ["2:00u", "2:00g", "2:00z"] {
            let parsed = universal.context_parse::<QualifiedTime>(&mut ctx).unwrap();
            assert_eq!(parsed.to_universal_seconds(3600, 3600), 7200);
        }
    }
}
