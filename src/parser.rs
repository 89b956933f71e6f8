//! Line parser for IANA time zone database source text
//!
//! The database ships in two logically equivalent spellings: the
//! multi-file form (`Rule`/`Zone`/`Link` keywords, one file per area)
//! and the compact single-file form (`R`/`Z`/`L`, usually named
//! `tzdata.zi`). Both are accepted here and produce the same model.

use core::{iter::Peekable, num::ParseIntError, str::Lines};

use alloc::{borrow::ToOwned, string::String, vec, vec::Vec};

use crate::{rule::Rule, tables::TzdbVersion, zone::Zone, TzData};

/// The tzdata source parsing error
#[derive(Debug, PartialEq)]
pub enum TzdataParseError {
    InvalidZoneHeader(u32),
    MissingIdentifier(u32),
    UnexpectedEndOfLine(u32, &'static str),
    UnknownValue(u32, String),
    ParseIntError(u32, ParseIntError, &'static str),
    /// A Rule line whose FROM year is later than its TO year
    InvalidYearRange(u32),
    /// A continuation line outside any Zone record
    OrphanContinuation(u32),
    /// A Zone whose final era is closed, or a non-final era that is open
    UnterminatedZone(String),
}

impl TzdataParseError {
    pub(crate) fn unexpected_eol(ctx: &LineParseContext) -> Self {
        Self::UnexpectedEndOfLine(ctx.line_number, ctx.span())
    }

    pub(crate) fn unknown(s: &str, ctx: &LineParseContext) -> Self {
        Self::UnknownValue(ctx.line_number, s.to_owned())
    }
}

impl core::fmt::Display for TzdataParseError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidZoneHeader(line) => write!(f, "line {line}: invalid Zone header"),
            Self::MissingIdentifier(line) => write!(f, "line {line}: missing identifier"),
            Self::UnexpectedEndOfLine(line, span) => {
                write!(f, "line {line}: unexpected end of line in {span}")
            }
            Self::UnknownValue(line, value) => write!(f, "line {line}: unknown value {value:?}"),
            Self::ParseIntError(line, err, span) => {
                write!(f, "line {line}: {err} in {span}")
            }
            Self::InvalidYearRange(line) => {
                write!(f, "line {line}: Rule FROM year is later than TO year")
            }
            Self::OrphanContinuation(line) => {
                write!(f, "line {line}: continuation line outside a Zone record")
            }
            Self::UnterminatedZone(name) => {
                write!(f, "zone {name}: exactly the final era must be open-ended")
            }
        }
    }
}

/// A utility trait for implementing a `try_from_str` with a provided
/// context.
pub trait TryFromStr<C>: Sized {
    type Error;
    fn try_from_str(s: &str, context: &mut C) -> Result<Self, Self::Error>;
}

/// The context for the line parser
#[derive(Debug, Clone)]
pub struct LineParseContext {
    pub line_number: u32,
    pub spans: Vec<&'static str>,
}

impl LineParseContext {
    pub fn enter(&mut self, name: &'static str) {
        self.spans.push(name);
    }

    pub fn span(&self) -> &'static str {
        self.spans.last().expect("span not defined")
    }

    pub fn exit(&mut self) {
        self.spans.pop();
    }
}

impl Default for LineParseContext {
    fn default() -> Self {
        Self {
            line_number: 1,
            spans: vec!["undefined"],
        }
    }
}

pub trait ContextParse {
    fn context_parse<T: TryFromStr<LineParseContext>>(
        &self,
        ctx: &mut LineParseContext,
    ) -> Result<T, <T as TryFromStr<LineParseContext>>::Error>;
}

impl ContextParse for &str {
    fn context_parse<T: TryFromStr<LineParseContext>>(
        &self,
        ctx: &mut LineParseContext,
    ) -> Result<T, <T as TryFromStr<LineParseContext>>::Error> {
        T::try_from_str(self, ctx)
    }
}

impl ContextParse for String {
    fn context_parse<T: TryFromStr<LineParseContext>>(
        &self,
        ctx: &mut LineParseContext,
    ) -> Result<T, <T as TryFromStr<LineParseContext>>::Error> {
        T::try_from_str(self, ctx)
    }
}

impl TryFromStr<LineParseContext> for String {
    type Error = TzdataParseError;
    fn try_from_str(s: &str, _: &mut LineParseContext) -> Result<Self, Self::Error> {
        Ok(s.to_owned())
    }
}

impl TryFromStr<LineParseContext> for u8 {
    type Error = TzdataParseError;
    fn try_from_str(s: &str, ctx: &mut LineParseContext) -> Result<Self, Self::Error> {
        s.parse::<u8>()
            .map_err(|e| TzdataParseError::ParseIntError(ctx.line_number, e, ctx.span()))
    }
}

impl TryFromStr<LineParseContext> for i32 {
    type Error = TzdataParseError;
    fn try_from_str(s: &str, ctx: &mut LineParseContext) -> Result<Self, Self::Error> {
        s.parse::<i32>()
            .map_err(|e| TzdataParseError::ParseIntError(ctx.line_number, e, ctx.span()))
    }
}

pub(crate) fn next_split<'a>(
    splits: &mut core::str::SplitWhitespace<'a>,
    context: &LineParseContext,
) -> Result<&'a str, TzdataParseError> {
    splits.next().ok_or(TzdataParseError::UnexpectedEndOfLine(
        context.line_number,
        context.span(),
    ))
}

pub(crate) fn remove_comments(line: &str) -> &str {
    if let Some((cleaned, _comment)) = line.split_once("#") {
        cleaned
    } else {
        line
    }
}

/// Returns the record keyword of a line, if the line starts one.
///
/// Era continuation lines never match: their first field is an offset,
/// which cannot collide with a record keyword.
fn record_keyword(line: &str) -> Option<&str> {
    let first = line.split_whitespace().next()?;
    matches!(first, "R" | "Rule" | "Z" | "Zone" | "L" | "Link").then_some(first)
}

/// The primary parser for tzdata source text.
///
/// This parser takes a single `&str` of data and evaluates the text line
/// by line, classifying each record by its leading keyword.
#[non_exhaustive]
pub struct TzdataParser<'data> {
    lines: Peekable<Lines<'data>>,
}

impl<'data> TzdataParser<'data> {
    /// Creates a parser from a `&str`
    pub fn from_tzdata_str(source: &'data str) -> Self {
        Self {
            lines: source.lines().peekable(),
        }
    }

    /// Parse the provided lines
    pub fn parse(&mut self) -> Result<TzData, TzdataParseError> {
        let mut tzdata = TzData::default();
        let mut context = LineParseContext::default();
        let mut seen_record = false;

        // The allow clippy is used in favor of for so that `Zone` can
        // iterate and parse its own continuation lines in `Zone::parse_full_record`.
        #[allow(clippy::while_let_on_iterator)]
        while let Some(&line) = self.lines.peek() {
            let trimmed = line.trim_end();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                // Leading `# ` lines before any record are document metadata,
                // e.g. `# version 2024a`.
                if !seen_record {
                    if let Some(comment) = trimmed.strip_prefix("# ") {
                        if let Some(marker) = comment.strip_prefix("version ") {
                            tzdata.version = TzdbVersion::parse(marker.trim());
                        }
                        tzdata.comments.push(comment.to_owned());
                    }
                }
                self.lines.next();
                context.line_number += 1;
                continue;
            }

            match record_keyword(trimmed) {
                Some("R") | Some("Rule") => {
                    seen_record = true;
                    let (name, rule) =
                        Rule::parse_from_line(remove_comments(trimmed), &mut context)?;
                    tzdata.rules.entry(name).or_default().push(rule);
                    self.lines.next();
                    context.line_number += 1;
                }
                Some("Z") | Some("Zone") => {
                    seen_record = true;
                    let (name, zone) = Zone::parse_full_record(&mut self.lines, &mut context)?;
                    tzdata.zones.insert(name, zone);
                    // `parse_full_record` has already consumed its lines.
                }
                Some("L") | Some("Link") => {
                    seen_record = true;
                    context.enter("Link");
                    let mut splits = remove_comments(trimmed).split_whitespace();
                    next_split(&mut splits, &context)?; // Consume the keyword
                    let target = next_split(&mut splits, &context)?;
                    let alias = next_split(&mut splits, &context)?;
                    if let Some(existing) = tzdata.links.get(alias) {
                        log::warn!(
                            "line {}: duplicate Link {alias} (keeping {existing}, discarding {target})",
                            context.line_number
                        );
                    } else {
                        tzdata.links.insert(alias.to_owned(), target.to_owned());
                    }
                    context.exit();
                    self.lines.next();
                    context.line_number += 1;
                }
                _ => return Err(TzdataParseError::OrphanContinuation(context.line_number)),
            }
        }
        Ok(tzdata)
    }
}
