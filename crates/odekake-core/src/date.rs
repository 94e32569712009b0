use std::sync::OnceLock;

use chrono::{Datelike, Days, NaiveDate, Weekday};
use regex::Regex;

fn md_ja_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{1,2})月(\d{1,2})日$").unwrap())
}

fn ymd_ja_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{4})年(\d{1,2})月(\d{1,2})日$").unwrap())
}

/// Resolve a user-supplied date expression to a calendar date relative to
/// `today`.
///
/// Accepts relative Japanese/English words (今日, 明日, 明後日, today,
/// tomorrow), Japanese absolute forms (10月6日, 2025年10月6日), and the
/// numeric forms `YYYY-MM-DD`, `YYYY/MM/DD`, and `MM/DD`. Month/day forms
/// without a year resolve to the current year, rolling into the next year
/// when the date has already passed.
///
/// Returns `None` when the expression cannot be understood.
#[must_use]
pub fn parse_target_date(input: &str, today: NaiveDate) -> Option<NaiveDate> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }

    match s {
        "今日" | "本日" | "today" => return Some(today),
        "明日" | "あした" | "tomorrow" => return today.checked_add_days(Days::new(1)),
        "明後日" | "あさって" => return today.checked_add_days(Days::new(2)),
        _ => {}
    }

    if let Some(caps) = ymd_ja_re().captures(s) {
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    if let Some(caps) = md_ja_re().captures(s) {
        let month: u32 = caps[1].parse().ok()?;
        let day: u32 = caps[2].parse().ok()?;
        return resolve_month_day(month, day, today);
    }

    for fmt in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Some(date);
        }
    }

    // MM/DD without a year.
    if let Some((m, d)) = s.split_once('/') {
        if m.len() <= 2 && d.len() <= 2 {
            if let (Ok(month), Ok(day)) = (m.parse::<u32>(), d.parse::<u32>()) {
                return resolve_month_day(month, day, today);
            }
        }
    }

    None
}

/// A month/day with no year resolves to this year unless it has already
/// passed, in which case the caller means next year.
fn resolve_month_day(month: u32, day: u32, today: NaiveDate) -> Option<NaiveDate> {
    let this_year = NaiveDate::from_ymd_opt(today.year(), month, day)?;
    if this_year < today {
        NaiveDate::from_ymd_opt(today.year() + 1, month, day)
    } else {
        Some(this_year)
    }
}

/// Normalize a date expression to `YYYY-MM-DD`. Expressions that cannot be
/// parsed pass through unchanged so the caller can surface them verbatim.
#[must_use]
pub fn normalize_date(input: &str, today: NaiveDate) -> String {
    match parse_target_date(input, today) {
        Some(date) => date.format("%Y-%m-%d").to_string(),
        None => input.to_string(),
    }
}

/// Japanese weekday label, e.g. `月曜日` for Monday.
#[must_use]
pub fn weekday_ja(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "月曜日",
        Weekday::Tue => "火曜日",
        Weekday::Wed => "水曜日",
        Weekday::Thu => "木曜日",
        Weekday::Fri => "金曜日",
        Weekday::Sat => "土曜日",
        Weekday::Sun => "日曜日",
    }
}
