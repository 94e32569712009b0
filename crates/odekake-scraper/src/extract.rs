//! Regex heuristics that read closure facts out of facility page text.
//!
//! The facility's extractor kind picks which structured heuristics apply to
//! its site format; within that selection the heuristics run in reliability
//! order and the first one that produces a signal wins. Each signal carries
//! the confidence of the heuristic that produced it, so the resolver can
//! weigh it against other tiers.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;

use odekake_core::{ExtractorKind, FacilityRule};

/// What a pattern heuristic concluded about one facility/date pair.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternSignal {
    pub is_closed: bool,
    pub confidence: f64,
    pub matched_context: String,
}

const CLOSURE_KEYWORDS: &[&str] = &[
    "休館",
    "休み",
    "閉館",
    "休業",
    "CLOSED",
    "closed",
    "展示替",
    "メンテナンス",
    "設備点検",
    "工事",
    "整備",
];

/// Runs the heuristic ladder over one page's text, scoped by the facility's
/// extractor kind.
///
/// A kind selects the structured heuristic its site format calls for; the
/// notice heuristics (explicit 臨時 mentions, keyword proximity) apply to
/// every machine-readable site. `Standard` tries the full ladder, since the
/// page format is unknown. Facilities whose site publishes closures only as
/// a calendar image have no machine-readable pattern to find, so they yield
/// no signal at all.
#[must_use]
pub fn extract(page_text: &str, target_date: NaiveDate, rule: &FacilityRule) -> Option<PatternSignal> {
    match rule.extractor {
        ExtractorKind::ImageCalendar => None,
        ExtractorKind::HolidayArray => iso_date_array(page_text, target_date)
            .or_else(|| notice_signals(page_text, target_date)),
        ExtractorKind::MonthDayList => month_day_list(page_text, target_date)
            .or_else(|| notice_signals(page_text, target_date)),
        ExtractorKind::ReservationCalendar => temporary_notice(page_text, target_date)
            .or_else(|| calendar_cell(page_text, target_date))
            .or_else(|| keyword_proximity(page_text, target_date)),
        ExtractorKind::Standard => iso_date_array(page_text, target_date)
            .or_else(|| month_day_list(page_text, target_date))
            .or_else(|| temporary_notice(page_text, target_date))
            .or_else(|| calendar_cell(page_text, target_date))
            .or_else(|| keyword_proximity(page_text, target_date)),
    }
}

/// The format-independent notice heuristics shared by every kind.
fn notice_signals(text: &str, target: NaiveDate) -> Option<PatternSignal> {
    temporary_notice(text, target).or_else(|| keyword_proximity(text, target))
}

fn quoted_iso_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""(\d{4})-(\d{2})-(\d{2})""#).unwrap())
}

/// Heuristic 1: embedded ISO date arrays, the machine-readable closure lists
/// some sites ship as JavaScript data.
fn iso_date_array(text: &str, target: NaiveDate) -> Option<PatternSignal> {
    let mut dates = BTreeSet::new();
    for caps in quoted_iso_re().captures_iter(text) {
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = caps[3].parse().ok()?;
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            dates.insert(date);
        }
    }
    if dates.is_empty() {
        return None;
    }

    if dates.contains(&target) {
        return Some(PatternSignal {
            is_closed: true,
            confidence: 0.98,
            matched_context: format!("休館日リストに\"{}\"が記載", target.format("%Y-%m-%d")),
        });
    }
    // The list covers the target month, so absence means open.
    if dates
        .iter()
        .any(|d| d.year() == target.year() && d.month() == target.month())
    {
        return Some(PatternSignal {
            is_closed: false,
            confidence: 0.98,
            matched_context: format!(
                "{}月の休館日リストに{}日の記載なし",
                target.month(),
                target.day()
            ),
        });
    }
    None
}

fn month_heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // A month heading followed by a run of day tokens with weekday parens,
    // e.g. "10月 4(土)-10(金),14(火),20(月),28(火)".
    RE.get_or_init(|| {
        Regex::new(
            r"(\d{1,2})月[\s:：]*((?:\d{1,2}\([月火水木金土日]\)(?:\s*[-ー～〜]\s*\d{1,2}\([月火水木金土日]\))?[、,\s]*)+)",
        )
        .unwrap()
    })
}

fn day_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(\d{1,2})\([月火水木金土日]\)(?:\s*[-ー～〜]\s*(\d{1,2})\([月火水木金土日]\))?",
        )
        .unwrap()
    })
}

/// Heuristic 2: month-heading day lists. A leading day may open a range,
/// `4(土)-10(金)`, which expands to every day in between.
fn month_day_list(text: &str, target: NaiveDate) -> Option<PatternSignal> {
    for caps in month_heading_re().captures_iter(text) {
        let month: u32 = caps[1].parse().ok()?;
        if month != target.month() {
            continue;
        }
        let list_text = caps.get(2)?.as_str();
        let mut closed_days = BTreeSet::new();
        for token in day_token_re().captures_iter(list_text) {
            let first: u32 = token[1].parse().ok()?;
            match token.get(2) {
                Some(end) => {
                    let last: u32 = end.as_str().parse().ok()?;
                    if first <= last {
                        closed_days.extend(first..=last);
                    }
                }
                None => {
                    closed_days.insert(first);
                }
            }
        }
        if closed_days.is_empty() {
            continue;
        }
        let is_closed = closed_days.contains(&target.day());
        return Some(PatternSignal {
            is_closed,
            confidence: 0.97,
            matched_context: format!(
                "{}月の休館日カレンダー「{}」",
                month,
                list_text.trim()
            ),
        });
    }
    None
}

/// Date spellings a Japanese page might use for the target date.
fn date_spellings(target: NaiveDate) -> Vec<String> {
    vec![
        format!("{}月{}日", target.month(), target.day()),
        format!("{}月{:02}日", target.month(), target.day()),
        target.format("%Y-%m-%d").to_string(),
        format!("{}/{}", target.month(), target.day()),
    ]
}

/// Heuristic 3: an explicit temporary closure or opening notice naming the
/// exact date, e.g. "10月27日は臨時開館いたします".
fn temporary_notice(text: &str, target: NaiveDate) -> Option<PatternSignal> {
    let spellings = date_spellings(target);
    for line in text.lines() {
        let has_date = spellings.iter().any(|s| line.contains(s.as_str()));
        if !has_date {
            continue;
        }
        if line.contains("臨時開館") {
            return Some(PatternSignal {
                is_closed: false,
                confidence: 0.95,
                matched_context: line.trim().to_string(),
            });
        }
        if line.contains("臨時休館") {
            return Some(PatternSignal {
                is_closed: true,
                confidence: 0.95,
                matched_context: line.trim().to_string(),
            });
        }
    }
    None
}

/// Heuristic 4: a calendar-grid cell like "21休館日". The leading boundary
/// guard keeps day 21 from matching inside a year like "2021".
fn calendar_cell(text: &str, target: NaiveDate) -> Option<PatternSignal> {
    let pattern = format!(r"(?:^|[^0-9]){}(?:日)?\s*休館", target.day());
    let re = Regex::new(&pattern).ok()?;
    let m = re.find(text)?;
    Some(PatternSignal {
        is_closed: true,
        confidence: 0.93,
        matched_context: m.as_str().trim().to_string(),
    })
}

/// Heuristic 5: the target date mentioned within five lines of a closure
/// keyword. The loosest signal, and the last one tried.
fn keyword_proximity(text: &str, target: NaiveDate) -> Option<PatternSignal> {
    let spellings = date_spellings(target);
    let lines: Vec<&str> = text.lines().collect();
    for (i, line) in lines.iter().enumerate() {
        if !spellings.iter().any(|s| line.contains(s.as_str())) {
            continue;
        }
        let lo = i.saturating_sub(5);
        let hi = (i + 5).min(lines.len().saturating_sub(1));
        for nearby in &lines[lo..=hi] {
            if CLOSURE_KEYWORDS.iter().any(|kw| nearby.contains(kw)) {
                return Some(PatternSignal {
                    is_closed: true,
                    confidence: 0.88,
                    matched_context: format!("{} / {}", line.trim(), nearby.trim()),
                });
            }
        }
    }
    None
}
