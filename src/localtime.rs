// src/localtime.rs
//! Fixed UTC+9 local time, bucket formatting and a permissive timestamp parser.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, Utc};

use crate::error::{DigestError, Result};

/// Local offset in seconds east of UTC. No DST.
pub const LOCAL_OFFSET_SECS: i32 = 9 * 3600;

pub fn local_offset() -> FixedOffset {
    FixedOffset::east_opt(LOCAL_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

pub fn now_local() -> DateTime<FixedOffset> {
    to_local(Utc::now())
}

pub fn to_local<Tz: chrono::TimeZone>(dt: DateTime<Tz>) -> DateTime<FixedOffset> {
    dt.with_timezone(&local_offset())
}

/// Interpret a naive local wall-clock time in the fixed local zone.
pub fn at_local(ndt: NaiveDateTime) -> DateTime<FixedOffset> {
    let off = local_offset();
    let utc = ndt - chrono::Duration::seconds(i64::from(off.local_minus_utc()));
    DateTime::from_naive_utc_and_offset(utc, off)
}

/// `MM-DD HH:MM`, written into the first column of every row.
pub fn search_timestamp(now: &DateTime<FixedOffset>) -> String {
    now.format("%m-%d %H:%M").to_string()
}

/// `MM-DD` day bucket in local time.
pub fn day_bucket(dt: &DateTime<FixedOffset>) -> String {
    to_local(*dt).format("%m-%d").to_string()
}

// Offset-aware layouts tried after RFC 2822 / RFC 3339.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%:z",
    "%a, %d %b %Y %H:%M:%S %z",
    "%d %b %Y %H:%M:%S %z",
];

// Zone-less layouts; read as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%a, %d %b %Y %H:%M:%S",
    "%d %b %Y %H:%M:%S",
];

// Zone abbreviations seen in feeds that RFC 2822 does not define.
const EXTRA_ZONES: &[(&str, &str)] = &[
    ("UTC", "+0000"),
    ("Z", "+0000"),
    ("KST", "+0900"),
    ("JST", "+0900"),
    ("HKT", "+0800"),
    ("SGT", "+0800"),
    ("BST", "+0100"),
    ("CET", "+0100"),
    ("CEST", "+0200"),
    ("AEST", "+1000"),
    ("AEDT", "+1100"),
];

/// Rewrite RFC 2822 near-misses: a full weekday name (`Monday,`) and a zone
/// abbreviation from [`EXTRA_ZONES`]. `None` when nothing changed.
fn loosen_rfc2822(s: &str) -> Option<String> {
    let mut out = s.to_string();
    if let Some((day, rest)) = s.split_once(',') {
        let day = day.trim();
        if day.len() > 3 && day.parse::<chrono::Weekday>().is_ok() {
            out = format!("{},{}", &day[..3], rest);
        }
    }
    if let Some((head, zone)) = out.rsplit_once(' ') {
        if let Some((_, off)) = EXTRA_ZONES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(zone))
        {
            out = format!("{head} {off}");
        }
    }
    (out != s).then_some(out)
}

/// Parse a feed timestamp in whatever shape the feed chose.
///
/// Zone-less values are taken as UTC, matching how most feeds that omit the
/// zone behave in practice.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<FixedOffset>> {
    let s = raw.trim();
    let fail = || DigestError::TimestampUnparseable {
        raw: raw.to_string(),
    };
    if s.is_empty() {
        return Err(fail());
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Ok(dt);
    }
    if let Some(fixed) = loosen_rfc2822(s) {
        if let Ok(dt) = DateTime::parse_from_rfc2822(&fixed) {
            return Ok(dt);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt);
    }
    for f in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, f) {
            return Ok(dt);
        }
    }
    for f in NAIVE_FORMATS {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, f) {
            return Ok(ndt.and_utc().fixed_offset());
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(ndt) = d.and_hms_opt(0, 0, 0) {
            return Ok(ndt.and_utc().fixed_offset());
        }
    }
    Err(fail())
}
