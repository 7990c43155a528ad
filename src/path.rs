//! Ownership path parser
//!
//! Parses chain strings of the form
//! `"Name1 [p1%] -> Name2 [p2%] -> ... -> NameN"` into ordered segments,
//! ultimate parent first and subject last.
//!
//! Parsing is total: every input yields segments. A bracket whose content is
//! not a share is logged and read as an unknown share. Callers decide whether
//! a path has enough segments to be useful.

use nom::{
    bytes::complete::take_until,
    character::complete::{char, space0},
    combinator::{all_consuming, opt},
    number::complete::double,
    sequence::{delimited, terminated, tuple},
    IResult,
};
use ownership_types::Segment;

/// Separator between segments
pub const PATH_DELIMITER: &str = " -> ";

/// Bracket content for an explicitly unknown share (case-sensitive)
pub const UNKNOWN_SHARE: &str = "unknown %";

/// Split a path string into segments
///
/// ```
/// use ownership_engine::path::parse_path;
///
/// let segments = parse_path("Parent [50%] -> Plant");
/// assert_eq!(segments.len(), 2);
/// assert_eq!(segments[0].percentage, Some(50.0));
/// ```
pub fn parse_path(path: &str) -> Vec<Segment> {
    path.split(PATH_DELIMITER).map(parse_segment).collect()
}

/// True when the string has at least one delimiter
pub fn is_chain(path: &str) -> bool {
    path.contains(PATH_DELIMITER)
}

/// Parse one segment: a name with an optional trailing `[share]`
pub fn parse_segment(raw: &str) -> Segment {
    let trimmed = raw.trim();

    let Some((name, content)) = split_trailing_bracket(trimmed) else {
        return Segment::new(trimmed, None);
    };

    let percentage = if content == UNKNOWN_SHARE {
        None
    } else {
        match all_consuming(share)(content) {
            Ok((_, value)) if value.is_finite() => Some(value),
            _ => {
                tracing::warn!(segment = %trimmed, content = %content, "Unparseable ownership share");
                None
            }
        }
    };

    Segment::new(name.trim(), percentage)
}

/// `("Name", "5.07%")` for `"Name [5.07%]"`, when the bracket ends the segment
fn split_trailing_bracket(segment: &str) -> Option<(&str, &str)> {
    if !segment.ends_with(']') {
        return None;
    }
    let open = segment.rfind('[')?;
    let (_, content) = all_consuming(bracketed)(&segment[open..]).ok()?;
    Some((&segment[..open], content))
}

fn bracketed(input: &str) -> IResult<&str, &str> {
    delimited(char('['), take_until("]"), char(']'))(input)
}

/// A float with optional surrounding spaces and trailing `%`
fn share(input: &str) -> IResult<&str, f64> {
    delimited(space0, terminated(double, tuple((space0, opt(char('%'))))), space0)(input)
}
