//! Zone records and their eras
//!
//! A Zone record is made up of a single header line carrying the zone
//! name and first era, with zero or more continuation lines extending
//! the era list until the next record.
//!
//! # Example
//!
//! The `America/Chicago` zone record
//!
//! ```txt
//! # Zone    NAME        STDOFF    RULES    FORMAT    [UNTIL]
//! Zone America/Chicago    -5:50:36 -    LMT    1883 Nov 18 18:00u
//!             -6:00    US    C%sT    1920
//!             -6:00    Chicago    C%sT    1936 Mar  1  2:00
//!             -5:00    -    EST    1936 Nov 15  2:00
//!             -6:00    Chicago    C%sT    1942
//!             -6:00    US    C%sT    1946
//!             -6:00    Chicago    C%sT    1967
//!             -6:00    US    C%sT
//! ```

use core::{iter::Peekable, str::Lines};

use alloc::{borrow::ToOwned, string::String, vec::Vec};
use hashbrown::HashMap;

use crate::{
    parser::{
        next_split, remove_comments, ContextParse, LineParseContext, TryFromStr, TzdataParseError,
    },
    posix::PosixTimeZone,
    resolver::ResolveError,
    rule::Rules,
    types::{AbbreviationFormat, RuleRef, Time, UntilDateTime},
};

/// One row of a Zone record: a period during which a single standard
/// offset and rule reference are in force.
#[derive(Debug, Clone, PartialEq)]
pub struct Era {
    /// Standard offset from universal time
    pub std_offset: Time,
    /// Rule in use
    pub rule: RuleRef,
    /// Abbreviation format
    pub format: AbbreviationFormat,
    /// End of the era; `None` for the final, open-ended era
    pub until: Option<UntilDateTime>,
}

impl Era {
    /// Whether a date (as epoch seconds, at date precision) falls before
    /// this era's UNTIL.
    pub fn applies_to(&self, date_secs: i64) -> bool {
        self.until
            .map_or(true, |until| date_secs < until.as_date_secs())
    }
}

impl TryFromStr<LineParseContext> for Era {
    type Error = TzdataParseError;
    fn try_from_str(s: &str, ctx: &mut LineParseContext) -> Result<Self, Self::Error> {
        ctx.enter("Era");
        let mut splits = s.split_whitespace();
        let std_offset = next_split(&mut splits, ctx)?.context_parse::<Time>(ctx)?;
        let rule = next_split(&mut splits, ctx)?.context_parse::<RuleRef>(ctx)?;
        let format = next_split(&mut splits, ctx)?.context_parse::<AbbreviationFormat>(ctx)?;
        let datetime = splits.collect::<Vec<&str>>();
        let until = if datetime.is_empty() {
            None
        } else {
            let dt_str = datetime.join(" ");
            Some(dt_str.context_parse::<UntilDateTime>(ctx)?)
        };

        ctx.exit();
        Ok(Era {
            std_offset,
            rule,
            format,
            until,
        })
    }
}

/// A named timeline of eras.
///
/// Immutable after load; rule sets referenced by name are resolved
/// against the shared rule table rather than copied in.
#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    /// The full zone name, e.g. `America/Chicago`
    pub name: String,
    /// The eras of the zone, in order; exactly the final one is open-ended
    pub eras: Vec<Era>,
}

impl Zone {
    /// The area segment of the name (`America` for `America/Chicago`);
    /// empty for single-segment names.
    pub fn area(&self) -> &str {
        self.name.split_once('/').map_or("", |(area, _)| area)
    }

    /// The location segment of the name (`Chicago` for `America/Chicago`).
    pub fn location(&self) -> &str {
        self.name.split_once('/').map_or(&*self.name, |(_, loc)| loc)
    }

    /// The final, open-ended era.
    pub fn final_era(&self) -> &Era {
        self.eras.last().expect("a parsed zone has at least one era")
    }

    /// Derives the POSIX time zone in effect beyond the final era's
    /// dated rules.
    pub fn posix_time_zone(
        &self,
        rules: &HashMap<String, Rules>,
    ) -> Result<PosixTimeZone, ResolveError> {
        let era = self.final_era();
        match &era.rule {
            RuleRef::None => Ok(PosixTimeZone::from_era_and_savings(era, Time::default())),
            RuleRef::Fixed(t) => Ok(PosixTimeZone::from_era_and_savings(era, *t)),
            RuleRef::Named(name) => {
                let rule_set = rules
                    .get(name)
                    .ok_or_else(|| ResolveError::UnknownRuleSet {
                        zone: self.name.clone(),
                        rule_set: name.clone(),
                    })?;
                let last_rules =
                    rule_set
                        .get_last_rules()
                        .ok_or_else(|| ResolveError::MissingStandardRule {
                            zone: self.name.clone(),
                            rule_set: name.clone(),
                        })?;
                Ok(PosixTimeZone::from_era_and_rules(era, &last_rules))
            }
        }
    }
}

impl Zone {
    /// Parses a Zone record starting from the provided header line and
    /// consuming continuation lines until the next record keyword.
    pub fn parse_full_record(
        lines: &mut Peekable<Lines<'_>>,
        ctx: &mut LineParseContext,
    ) -> Result<(String, Self), TzdataParseError> {
        ctx.enter("zone record");
        let mut eras = Vec::default();
        let header = lines.next().ok_or(TzdataParseError::unexpected_eol(ctx))?;
        ctx.line_number += 1;
        let (name, era) = Self::parse_header_line(header, ctx)?;
        eras.push(era);
        while let Some(&line) = lines.peek() {
            let cleaned_line = remove_comments(line);
            if cleaned_line.trim().is_empty() {
                lines.next();
                ctx.line_number += 1;
                continue;
            }
            // A line opening the next record ends the continuation run.
            let first = cleaned_line.split_whitespace().next();
            if matches!(first, Some("R" | "Rule" | "Z" | "Zone" | "L" | "Link") | None) {
                break;
            }
            let era = Era::try_from_str(cleaned_line, ctx)?;
            eras.push(era);
            lines.next();
            ctx.line_number += 1;
        }

        // Exactly the final era may be open-ended.
        let well_formed = eras
            .iter()
            .enumerate()
            .all(|(i, era)| era.until.is_some() == (i + 1 < eras.len()));
        if !well_formed {
            return Err(TzdataParseError::UnterminatedZone(name));
        }

        ctx.exit();
        Ok((
            name.clone(),
            Self { name, eras },
        ))
    }

    /// Parse a header line, i.e. the first zone record line.
    pub fn parse_header_line(
        header_line: &str,
        ctx: &mut LineParseContext,
    ) -> Result<(String, Era), TzdataParseError> {
        ctx.enter("zone header");
        let cleaned = remove_comments(header_line);
        let mut splits = cleaned.split_ascii_whitespace();
        if !matches!(splits.next(), Some("Zone" | "Z")) {
            return Err(TzdataParseError::InvalidZoneHeader(ctx.line_number));
        }
        let name = splits
            .next()
            .ok_or(TzdataParseError::MissingIdentifier(ctx.line_number))?;

        let era_str = splits.collect::<Vec<&str>>().join(" ");
        let era = Era::try_from_str(&era_str, ctx)?;
        ctx.exit();
        Ok((name.to_owned(), era))
    }
}
