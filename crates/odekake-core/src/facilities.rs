use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Weekly closed day, stored in YAML as a lowercase English weekday name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClosedWeekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl ClosedWeekday {
    #[must_use]
    pub fn to_weekday(self) -> Weekday {
        match self {
            ClosedWeekday::Monday => Weekday::Mon,
            ClosedWeekday::Tuesday => Weekday::Tue,
            ClosedWeekday::Wednesday => Weekday::Wed,
            ClosedWeekday::Thursday => Weekday::Thu,
            ClosedWeekday::Friday => Weekday::Fri,
            ClosedWeekday::Saturday => Weekday::Sat,
            ClosedWeekday::Sunday => Weekday::Sun,
        }
    }
}

/// Which pattern-extraction strategy a facility's pages need.
///
/// `ImageCalendar` marks facilities whose site publishes closures only as a
/// color-coded calendar image; no analyzer for that capability is wired in,
/// so the extractor reports no signal for it and the resolver falls through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractorKind {
    #[default]
    Standard,
    HolidayArray,
    MonthDayList,
    ReservationCalendar,
    ImageCalendar,
}

/// A curated per-date deviation from the regular pattern: a confirmed closure
/// or a confirmed exceptional opening.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverrideEntry {
    pub closed: bool,
    pub reason: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default = "default_override_source")]
    pub source: String,
}

fn default_confidence() -> f64 {
    1.0
}

fn default_override_source() -> String {
    "official-site".to_string()
}

/// A hand-maintained multi-day closure block (renovation, whole-building
/// closure), checked at the same precedence as the override table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LongClosure {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub reason: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default = "default_override_source")]
    pub source: String,
}

impl LongClosure {
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// A month/day window that may span the year boundary, e.g. Dec 29 – Jan 3.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SeasonalWindow {
    pub start_month: u32,
    pub start_day: u32,
    pub end_month: u32,
    pub end_day: u32,
}

impl SeasonalWindow {
    /// The standard year-end/New-Year closure shared by most museums.
    #[must_use]
    pub fn year_end() -> Self {
        Self {
            start_month: 12,
            start_day: 29,
            end_month: 1,
            end_day: 3,
        }
    }

    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        let md = (date.month(), date.day());
        let start = (self.start_month, self.start_day);
        let end = (self.end_month, self.end_day);
        if start <= end {
            start <= md && md <= end
        } else {
            // Window wraps the year boundary.
            md >= start || md <= end
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacilityRule {
    pub slug: String,
    pub name: String,
    /// Alternative names users type ("大拙館" for 鈴木大拙館).
    #[serde(default)]
    pub aliases: Vec<String>,
    pub url: String,
    /// Facility-specific pages checked after the main page (closure
    /// calendars, reservation pages, iframe targets).
    #[serde(default)]
    pub extra_pages: Vec<String>,
    #[serde(default)]
    pub regular_closed: Vec<ClosedWeekday>,
    /// When the regular closed day lands on a holiday the facility opens and
    /// the closure shifts to the following business day.
    #[serde(default)]
    pub transfer_holiday: bool,
    #[serde(default)]
    pub overrides: BTreeMap<NaiveDate, OverrideEntry>,
    #[serde(default)]
    pub long_closures: Vec<LongClosure>,
    pub seasonal_blackout: Option<SeasonalWindow>,
    #[serde(default)]
    pub extractor: ExtractorKind,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl FacilityRule {
    #[must_use]
    pub fn is_regular_closed_weekday(&self, weekday: Weekday) -> bool {
        self.regular_closed
            .iter()
            .any(|d| d.to_weekday() == weekday)
    }
}

#[derive(Debug, Deserialize)]
pub struct FacilitiesFile {
    pub facilities: Vec<FacilityRule>,
}

/// The immutable per-facility rule table, loaded once at startup.
#[derive(Debug, Clone)]
pub struct FacilityTable {
    facilities: Vec<FacilityRule>,
}

impl FacilityTable {
    /// Load and validate the facility rule table from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read, parsed, or fails
    /// validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::FacilitiesFileIo {
                path: path.display().to_string(),
                source: e,
            })?;
        let file: FacilitiesFile = serde_yaml::from_str(&content)?;
        Self::from_rules(file.facilities)
    }

    /// Build a table from already-parsed rules, applying the same validation
    /// as [`FacilityTable::load`].
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` on duplicate slugs, empty names, or
    /// out-of-range confidences.
    pub fn from_rules(facilities: Vec<FacilityRule>) -> Result<Self, ConfigError> {
        validate_rules(&facilities)?;
        Ok(Self { facilities })
    }

    #[must_use]
    pub fn all(&self) -> &[FacilityRule] {
        &self.facilities
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.facilities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.facilities.is_empty()
    }

    #[must_use]
    pub fn get(&self, slug: &str) -> Option<&FacilityRule> {
        self.facilities.iter().find(|f| f.slug == slug)
    }

    /// Resolve a user-supplied facility reference: exact slug, exact name,
    /// then substring match against name and aliases (so "大拙館" finds
    /// 鈴木大拙館, as the original tool surface allowed).
    #[must_use]
    pub fn find(&self, reference: &str) -> Option<&FacilityRule> {
        let needle = reference.trim();
        if needle.is_empty() {
            return None;
        }
        self.facilities
            .iter()
            .find(|f| f.slug == needle || f.name == needle)
            .or_else(|| {
                self.facilities.iter().find(|f| {
                    f.name.contains(needle)
                        || f.aliases.iter().any(|a| a == needle || a.contains(needle))
                })
            })
    }
}

fn validate_rules(facilities: &[FacilityRule]) -> Result<(), ConfigError> {
    let mut seen_slugs = HashSet::new();

    for rule in facilities {
        if rule.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "facility name must be non-empty".to_string(),
            ));
        }
        if rule.slug.trim().is_empty()
            || !rule
                .slug
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(ConfigError::Validation(format!(
                "facility '{}' has invalid slug '{}'; use lowercase ascii and dashes",
                rule.name, rule.slug
            )));
        }
        if !seen_slugs.insert(rule.slug.clone()) {
            return Err(ConfigError::Validation(format!(
                "duplicate facility slug: '{}'",
                rule.slug
            )));
        }
        for (date, entry) in &rule.overrides {
            if !(0.0..=1.0).contains(&entry.confidence) {
                return Err(ConfigError::Validation(format!(
                    "facility '{}' override {date} has confidence {} outside [0,1]",
                    rule.slug, entry.confidence
                )));
            }
        }
        for block in &rule.long_closures {
            if block.end < block.start {
                return Err(ConfigError::Validation(format!(
                    "facility '{}' long closure ends {} before it starts {}",
                    rule.slug, block.end, block.start
                )));
            }
        }
        if let Some(window) = &rule.seasonal_blackout {
            for (month, day) in [
                (window.start_month, window.start_day),
                (window.end_month, window.end_day),
            ] {
                if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
                    return Err(ConfigError::Validation(format!(
                        "facility '{}' seasonal blackout has invalid month/day {month}/{day}",
                        rule.slug
                    )));
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(slug: &str, name: &str) -> FacilityRule {
        FacilityRule {
            slug: slug.to_string(),
            name: name.to_string(),
            aliases: Vec::new(),
            url: "https://example.com/".to_string(),
            extra_pages: Vec::new(),
            regular_closed: Vec::new(),
            transfer_holiday: false,
            overrides: BTreeMap::new(),
            long_closures: Vec::new(),
            seasonal_blackout: Some(SeasonalWindow::year_end()),
            extractor: ExtractorKind::Standard,
            phone: None,
            address: None,
            notes: None,
        }
    }

    #[test]
    fn seasonal_window_wraps_year_boundary() {
        let w = SeasonalWindow::year_end();
        let dec_29 = NaiveDate::from_ymd_opt(2025, 12, 29).unwrap();
        let jan_3 = NaiveDate::from_ymd_opt(2026, 1, 3).unwrap();
        let jan_4 = NaiveDate::from_ymd_opt(2026, 1, 4).unwrap();
        let jul_1 = NaiveDate::from_ymd_opt(2025, 7, 1).unwrap();
        assert!(w.contains(dec_29));
        assert!(w.contains(jan_3));
        assert!(!w.contains(jan_4));
        assert!(!w.contains(jul_1));
    }

    #[test]
    fn seasonal_window_within_single_year() {
        let w = SeasonalWindow {
            start_month: 9,
            start_day: 1,
            end_month: 12,
            end_day: 15,
        };
        assert!(w.contains(NaiveDate::from_ymd_opt(2025, 10, 7).unwrap()));
        assert!(!w.contains(NaiveDate::from_ymd_opt(2025, 8, 31).unwrap()));
        assert!(!w.contains(NaiveDate::from_ymd_opt(2025, 12, 16).unwrap()));
    }

    #[test]
    fn find_matches_slug_name_and_alias_substring() {
        let mut daisetz = rule("suzuki-daisetz", "鈴木大拙館");
        daisetz.aliases = vec!["大拙館".to_string()];
        let table =
            FacilityTable::from_rules(vec![daisetz, rule("kenrokuen", "特別名勝 兼六園")])
                .unwrap();

        assert_eq!(table.find("suzuki-daisetz").unwrap().slug, "suzuki-daisetz");
        assert_eq!(table.find("鈴木大拙館").unwrap().slug, "suzuki-daisetz");
        assert_eq!(table.find("大拙館").unwrap().slug, "suzuki-daisetz");
        assert_eq!(table.find("兼六園").unwrap().slug, "kenrokuen");
        assert!(table.find("存在しない施設").is_none());
        assert!(table.find("  ").is_none());
    }

    #[test]
    fn validate_rejects_duplicate_slug() {
        let err = FacilityTable::from_rules(vec![rule("a", "A"), rule("a", "B")]).unwrap_err();
        assert!(err.to_string().contains("duplicate facility slug"));
    }

    #[test]
    fn validate_rejects_bad_slug() {
        let err = FacilityTable::from_rules(vec![rule("Bad Slug", "A")]).unwrap_err();
        assert!(err.to_string().contains("invalid slug"));
    }

    #[test]
    fn validate_rejects_out_of_range_confidence() {
        let mut r = rule("a", "A");
        r.overrides.insert(
            NaiveDate::from_ymd_opt(2025, 10, 27).unwrap(),
            OverrideEntry {
                closed: false,
                reason: "臨時開館".to_string(),
                confidence: 1.5,
                source: "official-site".to_string(),
            },
        );
        let err = FacilityTable::from_rules(vec![r]).unwrap_err();
        assert!(err.to_string().contains("outside [0,1]"));
    }

    #[test]
    fn validate_rejects_inverted_long_closure() {
        let mut r = rule("a", "A");
        r.long_closures.push(LongClosure {
            start: NaiveDate::from_ymd_opt(2025, 12, 15).unwrap(),
            end: NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
            reason: "工事".to_string(),
            confidence: 1.0,
            source: "official-site".to_string(),
        });
        let err = FacilityTable::from_rules(vec![r]).unwrap_err();
        assert!(err.to_string().contains("before it starts"));
    }

    #[test]
    fn rule_yaml_roundtrip() {
        let yaml = r#"
facilities:
  - slug: shinise-kinenkan
    name: 金沢市老舗記念館
    url: https://www.kanazawa-museum.jp/shinise/
    regular_closed: [monday]
    transfer_holiday: true
    seasonal_blackout: { start_month: 12, start_day: 29, end_month: 1, end_day: 3 }
    overrides:
      2025-10-14:
        closed: true
        reason: 振替休館日
        confidence: 0.95
        source: 公式ルール（祝日振替）
"#;
        let file: FacilitiesFile = serde_yaml::from_str(yaml).unwrap();
        let table = FacilityTable::from_rules(file.facilities).unwrap();
        let rule = table.get("shinise-kinenkan").unwrap();
        assert!(rule.transfer_holiday);
        assert!(rule.is_regular_closed_weekday(Weekday::Mon));
        assert!(!rule.is_regular_closed_weekday(Weekday::Tue));
        let entry = rule
            .overrides
            .get(&NaiveDate::from_ymd_opt(2025, 10, 14).unwrap())
            .unwrap();
        assert!(entry.closed);
        assert!((entry.confidence - 0.95).abs() < f64::EPSILON);
    }
}
