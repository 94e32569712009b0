use serde::{Deserialize, Serialize};

/// One resolved (facility, date) answer.
///
/// `is_closed` is `None` only when every signal failed, and then `error`
/// explains why; an undetermined verdict never silently defaults to open.
/// `confidence` carries the winning tier's score, not any average.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosureVerdict {
    pub facility: String,
    pub date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekday: Option<String>,
    pub is_closed: Option<bool>,
    pub closure_reason: String,
    pub confidence: f64,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub holiday_info: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ClosureVerdict {
    /// A determined verdict; reason is empty when open.
    #[must_use]
    pub fn determined(
        facility: &str,
        date: &str,
        weekday: &str,
        is_closed: bool,
        reason: &str,
        confidence: f64,
        source: &str,
    ) -> Self {
        Self {
            facility: facility.to_string(),
            date: date.to_string(),
            weekday: Some(weekday.to_string()),
            is_closed: Some(is_closed),
            closure_reason: if is_closed { reason.to_string() } else { String::new() },
            confidence,
            source: source.to_string(),
            holiday_info: None,
            additional_info: None,
            error: None,
        }
    }

    /// Total resolution failure: no tier produced an answer.
    #[must_use]
    pub fn undetermined(facility: &str, date: &str, error: &str) -> Self {
        Self {
            facility: facility.to_string(),
            date: date.to_string(),
            weekday: None,
            is_closed: None,
            closure_reason: String::new(),
            confidence: 0.0,
            source: String::new(),
            holiday_info: None,
            additional_info: None,
            error: Some(error.to_string()),
        }
    }

    #[must_use]
    pub fn with_holiday_info(mut self, info: String) -> Self {
        self.holiday_info = Some(info);
        self
    }

    #[must_use]
    pub fn with_additional_info(mut self, info: String) -> Self {
        self.additional_info = Some(info);
        self
    }
}
