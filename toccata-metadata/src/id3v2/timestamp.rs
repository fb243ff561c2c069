// Toccata
// Copyright (c) 2025 The Project Toccata Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ID3v2.4 timestamp parsing.
//!
//! ID3v2.4 timestamps are a subset of ISO-8601: `yyyy`, `yyyy-MM`, `yyyy-MM-dd`,
//! `yyyy-MM-ddTHH`, `yyyy-MM-ddTHH:mm`, and `yyyy-MM-ddTHH:mm:ss`, optionally suffixed with a
//! `Z` or numeric UTC offset. Two timestamps joined by `/` or `--` form a range.

use chrono::{FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};

use toccata_core::meta::Timestamp;

/// Parse a timestamp, or timestamp range, from text.
///
/// Returns `None` when neither half of the text parses.
pub fn parse_timestamp(text: &str) -> Option<Timestamp> {
    let (head, tail) = split_range(text);

    let (start, offset) = parse_point(head.trim());

    let (end, end_offset) = match tail {
        Some(tail) => parse_point(tail.trim()),
        None => (None, None),
    };

    match (start, end) {
        (Some(start), end) => Some(Timestamp { start, offset, end }),
        // Only the second half parsed; treat it as a lone timestamp.
        (None, Some(end)) => Some(Timestamp { start: end, offset: end_offset, end: None }),
        (None, None) => None,
    }
}

/// Split a range on `/` or `--`.
fn split_range(text: &str) -> (&str, Option<&str>) {
    if let Some((head, tail)) = text.split_once("--") {
        return (head, Some(tail));
    }

    if let Some((head, tail)) = text.split_once('/') {
        return (head, Some(tail));
    }

    (text, None)
}

/// Parse a single timestamp of any supported precision.
fn parse_point(text: &str) -> (Option<NaiveDateTime>, Option<FixedOffset>) {
    let (text, offset) = split_offset(text);

    let (date_text, time_text) = match text.split_once(['T', ' ']) {
        Some((date_text, time_text)) => (date_text, Some(time_text)),
        None => (text, None),
    };

    let date = match parse_date(date_text) {
        Some(date) => date,
        None => return (None, None),
    };

    let time = match time_text {
        Some(time_text) => match parse_time(time_text) {
            Some(time) => time,
            None => return (None, None),
        },
        // A date-only timestamp implies midnight.
        None => NaiveTime::MIN,
    };

    (Some(date.and_time(time)), offset)
}

/// Strip and parse a trailing `Z` or numeric UTC offset. Numeric offsets are only recognized
/// after the time separator so that date dashes are never misread.
fn split_offset(text: &str) -> (&str, Option<FixedOffset>) {
    if let Some(stripped) = text.strip_suffix(['Z', 'z']) {
        return (stripped, FixedOffset::east_opt(0));
    }

    if let Some(t_at) = text.find(['T', ' ']) {
        if let Some(rel) = text[t_at..].rfind(['+', '-']) {
            let at = t_at + rel;
            if let Some(offset) = parse_offset(&text[at..]) {
                return (&text[..at], Some(offset));
            }
        }
    }

    (text, None)
}

/// Parse a `±HH`, `±HHMM`, or `±HH:MM` UTC offset.
fn parse_offset(text: &str) -> Option<FixedOffset> {
    let (sign, digits) = match text.as_bytes().first()? {
        b'+' => (1, &text[1..]),
        b'-' => (-1, &text[1..]),
        _ => return None,
    };

    let (hours, minutes) = match digits.len() {
        2 => (digits.parse::<i32>().ok()?, 0),
        4 => (digits[..2].parse::<i32>().ok()?, digits[2..].parse::<i32>().ok()?),
        5 if digits.as_bytes()[2] == b':' => {
            (digits[..2].parse::<i32>().ok()?, digits[3..].parse::<i32>().ok()?)
        }
        _ => return None,
    };

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Parse a `yyyy[-MM[-dd]]` date. Missing components default to 1.
fn parse_date(text: &str) -> Option<NaiveDate> {
    let mut parts = text.splitn(3, '-');

    let year = parts.next()?;

    // A bare year must be 4 digits to avoid misreading free-form text.
    if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let year = year.parse::<i32>().ok()?;
    let month = match parts.next() {
        Some(month) => month.parse::<u32>().ok()?,
        None => 1,
    };
    let day = match parts.next() {
        Some(day) => day.parse::<u32>().ok()?,
        None => 1,
    };

    NaiveDate::from_ymd_opt(year, month, day)
}

/// Parse a `HH[:mm[:ss]]` time. Missing components default to 0.
fn parse_time(text: &str) -> Option<NaiveTime> {
    let mut parts = text.splitn(3, ':');

    let hour = parts.next()?.parse::<u32>().ok()?;
    let minute = match parts.next() {
        Some(minute) => minute.parse::<u32>().ok()?,
        None => 0,
    };
    let second = match parts.next() {
        Some(second) => second.parse::<u32>().ok()?,
        None => 0,
    };

    NaiveTime::from_hms_opt(hour, minute, second)
}

#[cfg(test)]
mod tests {
    use super::parse_timestamp;

    use chrono::{FixedOffset, NaiveDate};

    fn date(y: i32, m: u32, d: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    fn datetime(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, mi, s).unwrap()
    }

    #[test]
    fn verify_parse_timestamp_precisions() {
        assert_eq!(parse_timestamp("2004").unwrap().start, date(2004, 1, 1));
        assert_eq!(parse_timestamp("2004-06").unwrap().start, date(2004, 6, 1));
        assert_eq!(parse_timestamp("2004-06-13").unwrap().start, date(2004, 6, 13));
        assert_eq!(
            parse_timestamp("2004-06-13T14").unwrap().start,
            datetime(2004, 6, 13, 14, 0, 0)
        );
        assert_eq!(
            parse_timestamp("2004-06-13T14:30").unwrap().start,
            datetime(2004, 6, 13, 14, 30, 0)
        );
        assert_eq!(
            parse_timestamp("2004-06-13T14:30:59").unwrap().start,
            datetime(2004, 6, 13, 14, 30, 59)
        );
    }

    #[test]
    fn verify_parse_timestamp_offsets() {
        let ts = parse_timestamp("2004-06-13T14:30:00Z").unwrap();
        assert_eq!(ts.start, datetime(2004, 6, 13, 14, 30, 0));
        assert_eq!(ts.offset, FixedOffset::east_opt(0));

        let ts = parse_timestamp("2004-06-13T14:30:00+02:00").unwrap();
        assert_eq!(ts.offset, FixedOffset::east_opt(2 * 3600));

        let ts = parse_timestamp("2004-06-13T14:30:00-0530").unwrap();
        assert_eq!(ts.offset, FixedOffset::east_opt(-(5 * 3600 + 30 * 60)));

        // Date dashes must not be misread as offsets.
        let ts = parse_timestamp("2004-06-13").unwrap();
        assert_eq!(ts.offset, None);
    }

    #[test]
    fn verify_parse_timestamp_ranges() {
        let ts = parse_timestamp("2004/2006").unwrap();
        assert_eq!(ts.start, date(2004, 1, 1));
        assert_eq!(ts.end, Some(date(2006, 1, 1)));

        let ts = parse_timestamp("2004-01-01--2004-12-31").unwrap();
        assert_eq!(ts.start, date(2004, 1, 1));
        assert_eq!(ts.end, Some(date(2004, 12, 31)));

        // An unparseable end half degrades to a lone timestamp.
        let ts = parse_timestamp("2004/later").unwrap();
        assert_eq!(ts.start, date(2004, 1, 1));
        assert_eq!(ts.end, None);
    }

    #[test]
    fn verify_parse_timestamp_rejects() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("sometime").is_none());
        assert!(parse_timestamp("04").is_none());
        assert!(parse_timestamp("2004-13").is_none());
        assert!(parse_timestamp("2004-00-99").is_none());
        assert!(parse_timestamp("never/always").is_none());
    }
}
