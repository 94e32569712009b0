use std::collections::BTreeMap;

use chrono::NaiveDate;

/// Source of Japanese public-holiday facts for the transfer-closure rule.
///
/// The resolver only needs membership plus a display name, so callers can
/// swap in an API-backed implementation without touching resolution logic.
pub trait HolidayCalendar: Send + Sync {
    fn is_holiday(&self, date: NaiveDate) -> bool;

    fn holiday_name(&self, date: NaiveDate) -> Option<&str>;
}

/// A fixed in-memory holiday table.
#[derive(Debug, Clone, Default)]
pub struct StaticHolidayCalendar {
    holidays: BTreeMap<NaiveDate, String>,
}

impl StaticHolidayCalendar {
    #[must_use]
    pub fn new(holidays: BTreeMap<NaiveDate, String>) -> Self {
        Self { holidays }
    }

    /// Japanese public holidays for 2025, per the Cabinet Office calendar.
    #[must_use]
    pub fn japan_2025() -> Self {
        let entries = [
            (2025, 1, 1, "元日"),
            (2025, 1, 13, "成人の日"),
            (2025, 2, 11, "建国記念の日"),
            (2025, 2, 23, "天皇誕生日"),
            (2025, 2, 24, "振替休日"),
            (2025, 3, 20, "春分の日"),
            (2025, 4, 29, "昭和の日"),
            (2025, 5, 3, "憲法記念日"),
            (2025, 5, 4, "みどりの日"),
            (2025, 5, 5, "こどもの日"),
            (2025, 5, 6, "振替休日"),
            (2025, 7, 21, "海の日"),
            (2025, 8, 11, "山の日"),
            (2025, 9, 15, "敬老の日"),
            (2025, 9, 23, "秋分の日"),
            (2025, 10, 13, "スポーツの日"),
            (2025, 11, 3, "文化の日"),
            (2025, 11, 23, "勤労感謝の日"),
            (2025, 11, 24, "振替休日"),
        ];
        let mut holidays = BTreeMap::new();
        for (y, m, d, name) in entries {
            if let Some(date) = NaiveDate::from_ymd_opt(y, m, d) {
                holidays.insert(date, name.to_string());
            }
        }
        Self { holidays }
    }
}

impl HolidayCalendar for StaticHolidayCalendar {
    fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays.contains_key(&date)
    }

    fn holiday_name(&self, date: NaiveDate) -> Option<&str> {
        self.holidays.get(&date).map(String::as_str)
    }
}

/// Calendar that knows no holidays; handy in tests and offline mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHolidays;

impl HolidayCalendar for NoHolidays {
    fn is_holiday(&self, _date: NaiveDate) -> bool {
        false
    }

    fn holiday_name(&self, _date: NaiveDate) -> Option<&str> {
        None
    }
}
