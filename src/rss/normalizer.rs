//! Item normalization.
//!
//! Decodes HTML entities in titles and descriptions and resolves the many
//! `pubDate` spellings found in the wild into a UTC timestamp. Everything
//! here is pure: no I/O, and an unrecognized date is reported as `None`
//! rather than as an error.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use tracing::warn;

use crate::rss::types::{ParsedFeed, ParsedItem, RawFeed, RawItem};

/// A single accepted date spelling.
#[derive(Debug, Clone, Copy)]
enum DateFormat {
    /// RFC 2822 (covers RFC 1123 and RFC 822 with numeric or US zone names).
    Rfc2822,
    /// RFC 3339 / ISO 8601 with offset.
    Rfc3339,
    /// strftime pattern ending in a numeric `%z` offset.
    WithOffset(&'static str),
    /// strftime pattern followed by a zone abbreviation such as `UTC` or `PST`.
    WithZoneName(&'static str),
    /// strftime pattern without zone, read as UTC.
    Utc(&'static str),
}

/// Accepted formats, tried in order. The first successful parse wins.
///
/// The leading weekday is stripped before matching, so none of these
/// patterns name it.
const DATE_FORMATS: &[DateFormat] = &[
    DateFormat::Rfc2822,
    DateFormat::WithOffset("%d %b %Y %H:%M:%S %z"),
    DateFormat::WithZoneName("%d %b %Y %H:%M:%S"),
    DateFormat::WithOffset("%d %b %y %H:%M %z"),
    DateFormat::WithZoneName("%d %b %y %H:%M"),
    DateFormat::Rfc3339,
    // Day of month without leading zero: "9 Jan 2024 ..."
    DateFormat::WithOffset("%e %b %Y %H:%M:%S %z"),
    DateFormat::WithZoneName("%e %b %Y %H:%M:%S"),
    DateFormat::WithOffset("%Y-%m-%dT%H:%M:%S%z"),
    DateFormat::Utc("%Y-%m-%dT%H:%M:%S"),
    DateFormat::Utc("%Y-%m-%d %H:%M:%S"),
];

impl DateFormat {
    fn parse(self, raw: &str) -> Option<DateTime<Utc>> {
        match self {
            DateFormat::Rfc2822 => DateTime::parse_from_rfc2822(raw)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            DateFormat::Rfc3339 => DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            DateFormat::WithOffset(fmt) => DateTime::parse_from_str(raw, fmt)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            DateFormat::WithZoneName(fmt) => {
                let (rest, zone) = raw.rsplit_once(' ')?;
                let naive = NaiveDateTime::parse_from_str(rest.trim_end(), fmt).ok()?;
                let offset = match zone_offset(zone) {
                    Some(offset) => offset,
                    None if is_zone_abbreviation(zone) => {
                        warn!(zone, date = raw, "Unknown time zone abbreviation, reading as UTC");
                        FixedOffset::east_opt(0)?
                    }
                    None => return None,
                };
                offset
                    .from_local_datetime(&naive)
                    .single()
                    .map(|dt| dt.with_timezone(&Utc))
            }
            DateFormat::Utc(fmt) => NaiveDateTime::parse_from_str(raw, fmt)
                .ok()
                .map(|naive| naive.and_utc()),
        }
    }
}

/// Offset for the zone abbreviations that show up in feeds.
fn zone_offset(name: &str) -> Option<FixedOffset> {
    let hours = match name.to_ascii_uppercase().as_str() {
        "UT" | "UTC" | "GMT" | "Z" => 0,
        "EST" => -5,
        "EDT" => -4,
        "CST" => -6,
        "CDT" => -5,
        "MST" => -7,
        "MDT" => -6,
        "PST" => -8,
        "PDT" => -7,
        _ => return None,
    };
    FixedOffset::east_opt(hours * 3600)
}

/// Looks like a zone abbreviation (`CEST`, `JST`) even if not in the table.
fn is_zone_abbreviation(name: &str) -> bool {
    (3..=5).contains(&name.len()) && name.bytes().all(|b| b.is_ascii_alphabetic())
}

/// Drop a leading `Tue, ` or `Tuesday, ` so a wrong weekday cannot reject
/// an otherwise valid date.
fn strip_weekday(raw: &str) -> &str {
    match raw.split_once(',') {
        Some((day, rest))
            if (3..=9).contains(&day.len()) && day.bytes().all(|b| b.is_ascii_alphabetic()) =>
        {
            rest.trim_start()
        }
        _ => raw,
    }
}

/// Resolve a raw `pubDate` value.
///
/// Returns `None` when no known format matches; callers decide the fallback.
pub fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let raw = strip_weekday(raw);
    DATE_FORMATS.iter().find_map(|format| format.parse(raw))
}

/// Decode HTML entities. Unknown entities are left as they are.
pub fn decode_entities(text: &str) -> String {
    html_escape::decode_html_entities(text).into_owned()
}

/// Normalize one item.
pub fn normalize_item(raw: RawItem) -> ParsedItem {
    let published_at = parse_pub_date(&raw.pub_date);
    ParsedItem {
        title: decode_entities(&raw.title),
        link: raw.link.trim().to_string(),
        description: decode_entities(&raw.description),
        pub_date: raw.pub_date,
        published_at,
    }
}

/// Normalize a channel and all of its items, keeping document order.
pub fn normalize_feed(raw: RawFeed) -> ParsedFeed {
    ParsedFeed {
        title: decode_entities(&raw.title),
        link: raw.link,
        description: decode_entities(&raw.description),
        items: raw.items.into_iter().map(normalize_item).collect(),
    }
}
