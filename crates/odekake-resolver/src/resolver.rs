use std::sync::Arc;

use chrono::{Datelike, Days, NaiveDate};

use odekake_core::{weekday_ja, AppConfig, FacilityRule, FacilityTable, HolidayCalendar};
use odekake_llm::LlmClient;
use odekake_scraper::{extract, PageClient, RawPageContent};

use crate::error::ResolveError;
use crate::verdict::ClosureVerdict;

/// Merges the per-facility rule table, holiday logic, scraped patterns, and
/// LLM readings into one verdict per (facility, date) pair.
///
/// Tiers run in precedence order and the first that produces an answer wins;
/// a failing tier is logged and skipped, never fatal.
pub struct Resolver {
    table: Arc<FacilityTable>,
    holidays: Arc<dyn HolidayCalendar>,
    fetcher: Option<PageClient>,
    llm: Option<LlmClient>,
}

impl Resolver {
    /// A resolver with no network collaborators: only the rule table and
    /// holiday calendar answer, with the weekday fallback closing the gap.
    #[must_use]
    pub fn offline(table: Arc<FacilityTable>, holidays: Arc<dyn HolidayCalendar>) -> Self {
        Self {
            table,
            holidays,
            fetcher: None,
            llm: None,
        }
    }

    /// Wires up the page fetcher and, when an endpoint is configured, the
    /// LLM client.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError` if an HTTP client cannot be constructed.
    pub fn from_config(
        config: &AppConfig,
        table: Arc<FacilityTable>,
        holidays: Arc<dyn HolidayCalendar>,
    ) -> Result<Self, ResolveError> {
        let fetcher = PageClient::new(
            config.fetch_timeout_secs,
            &config.fetch_user_agent,
            config.fetch_accept_invalid_certs,
        )?;
        let llm = match &config.llm_endpoint {
            Some(endpoint) => Some(LlmClient::new(
                endpoint,
                config.llm_api_key.clone(),
                &config.llm_model,
                config.llm_timeout_secs,
            )?),
            None => None,
        };
        Ok(Self {
            table,
            holidays,
            fetcher: Some(fetcher),
            llm,
        })
    }

    #[must_use]
    pub fn table(&self) -> &FacilityTable {
        &self.table
    }

    /// Resolves one facility for one date.
    pub async fn resolve(&self, rule: &FacilityRule, date: NaiveDate) -> ClosureVerdict {
        if let Some(v) = self.resolve_static(rule, date) {
            return v;
        }

        let pages = self.fetch_pages(rule).await;
        if let Some(v) = pattern_verdict(rule, date, &pages) {
            return v;
        }
        if let Some(v) = self.llm_tier(rule, date, &pages).await {
            return v;
        }
        self.fallback_verdict(rule, date)
    }

    /// Tiers 1–3: blackout, override table and long closures, weekday rule
    /// with the holiday transfer.
    fn resolve_static(&self, rule: &FacilityRule, date: NaiveDate) -> Option<ClosureVerdict> {
        self.blackout_verdict(rule, date)
            .or_else(|| override_verdict(rule, date))
            .or_else(|| self.weekday_verdict(rule, date))
    }

    /// Tier 1: the seasonal blackout closes unconditionally.
    fn blackout_verdict(&self, rule: &FacilityRule, date: NaiveDate) -> Option<ClosureVerdict> {
        let window = rule.seasonal_blackout.as_ref()?;
        if !window.contains(date) {
            return None;
        }
        Some(ClosureVerdict::determined(
            &rule.name,
            &date.format("%Y-%m-%d").to_string(),
            weekday_ja(date.weekday()),
            true,
            &format!(
                "年末年始休館（{}/{}～{}/{}）",
                window.start_month, window.start_day, window.end_month, window.end_day
            ),
            1.0,
            "基本ルール",
        ))
    }

    /// Tier 3: the regular closed weekday, holiday openings, and the
    /// transferred closure on the day after a closed-weekday holiday.
    fn weekday_verdict(&self, rule: &FacilityRule, date: NaiveDate) -> Option<ClosureVerdict> {
        let weekday = date.weekday();
        let date_str = date.format("%Y-%m-%d").to_string();
        let label = weekday_ja(weekday);

        if rule.is_regular_closed_weekday(weekday) {
            if let Some(name) = self.holidays.holiday_name(date) {
                // A holiday on the regular closed day opens the facility.
                return Some(
                    ClosureVerdict::determined(
                        &rule.name,
                        &date_str,
                        label,
                        false,
                        "",
                        0.95,
                        "祝日判定ロジック",
                    )
                    .with_holiday_info(format!("{name}（祝日）"))
                    .with_additional_info(format!(
                        "{}ですが{name}のため開館",
                        label
                    )),
                );
            }
            return Some(ClosureVerdict::determined(
                &rule.name,
                &date_str,
                label,
                true,
                &format!("{}定休日", label.trim_end_matches('日')),
                0.95,
                "基本ルール",
            ));
        }

        if rule.transfer_holiday {
            let yesterday = date.checked_sub_days(Days::new(1))?;
            if rule.is_regular_closed_weekday(yesterday.weekday()) {
                if let Some(name) = self.holidays.holiday_name(yesterday) {
                    return Some(
                        ClosureVerdict::determined(
                            &rule.name,
                            &date_str,
                            label,
                            true,
                            &format!("振替休館日（前日{name}のため）"),
                            0.95,
                            "公式ルール（祝日振替）",
                        )
                        .with_holiday_info(name.to_string()),
                    );
                }
            }
        }

        None
    }

    async fn fetch_pages(&self, rule: &FacilityRule) -> Vec<RawPageContent> {
        let Some(fetcher) = &self.fetcher else {
            return Vec::new();
        };
        let mut pages = Vec::new();
        for url in std::iter::once(&rule.url).chain(rule.extra_pages.iter()) {
            match fetcher.fetch_text(url).await {
                Ok(page) => pages.push(page),
                Err(e) => {
                    tracing::warn!(facility = %rule.slug, url = %url, error = %e, "page fetch failed");
                }
            }
        }
        pages
    }

    /// Tier 5: the LLM reads the page text the heuristics could not, and its
    /// answer only counts when it is confident itself.
    async fn llm_tier(
        &self,
        rule: &FacilityRule,
        date: NaiveDate,
        pages: &[RawPageContent],
    ) -> Option<ClosureVerdict> {
        let llm = self.llm.as_ref()?;
        if pages.is_empty() {
            return None;
        }
        let combined: String = pages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let label = weekday_ja(date.weekday());

        match llm.judge(&rule.name, date, label, &combined).await {
            Ok(verdict) if verdict.confidence > 0.7 => {
                let mut out = ClosureVerdict::determined(
                    &rule.name,
                    &date.format("%Y-%m-%d").to_string(),
                    label,
                    verdict.is_closed,
                    &verdict.reason,
                    verdict.confidence,
                    "LLM分析",
                );
                if !verdict.detected_info.is_empty() {
                    out = out.with_additional_info(verdict.detected_info);
                }
                Some(out)
            }
            Ok(verdict) => {
                tracing::debug!(
                    facility = %rule.slug,
                    confidence = verdict.confidence,
                    "LLM verdict below confidence floor, ignoring"
                );
                None
            }
            Err(e) => {
                tracing::warn!(facility = %rule.slug, error = %e, "LLM tier failed");
                None
            }
        }
    }

    /// Tier 6: the weekday rule alone, explicitly low-confidence and flagged
    /// for verification.
    fn fallback_verdict(&self, rule: &FacilityRule, date: NaiveDate) -> ClosureVerdict {
        let label = weekday_ja(date.weekday());
        let closed = rule.is_regular_closed_weekday(date.weekday());
        let mut v = ClosureVerdict::determined(
            &rule.name,
            &date.format("%Y-%m-%d").to_string(),
            label,
            closed,
            &format!("{}定休日（推定）", label.trim_end_matches('日')),
            if closed { 0.8 } else { 0.7 },
            "フォールバック（要確認）",
        );
        v = v.with_additional_info("最新情報は公式サイトでご確認ください".to_string());
        v
    }
}

/// Tier 2: curated overrides and long-closure blocks, returned verbatim.
fn override_verdict(rule: &FacilityRule, date: NaiveDate) -> Option<ClosureVerdict> {
    let date_str = date.format("%Y-%m-%d").to_string();
    let label = weekday_ja(date.weekday());

    if let Some(entry) = rule.overrides.get(&date) {
        return Some(ClosureVerdict::determined(
            &rule.name,
            &date_str,
            label,
            entry.closed,
            &entry.reason,
            entry.confidence,
            &entry.source,
        ));
    }
    if let Some(block) = rule.long_closures.iter().find(|b| b.contains(date)) {
        return Some(
            ClosureVerdict::determined(
                &rule.name,
                &date_str,
                label,
                true,
                &block.reason,
                block.confidence,
                &block.source,
            )
            .with_additional_info(format!(
                "{}～{}の期間休館",
                block.start.format("%Y-%m-%d"),
                block.end.format("%Y-%m-%d")
            )),
        );
    }
    None
}

/// Tier 4: the first regex heuristic that fires on any fetched page wins;
/// heuristics are never combined by voting.
fn pattern_verdict(
    rule: &FacilityRule,
    date: NaiveDate,
    pages: &[RawPageContent],
) -> Option<ClosureVerdict> {
    for page in pages {
        if let Some(signal) = extract(&page.text, date, rule) {
            tracing::debug!(
                facility = %rule.slug,
                url = %page.url,
                confidence = signal.confidence,
                "pattern heuristic fired"
            );
            return Some(
                ClosureVerdict::determined(
                    &rule.name,
                    &date.format("%Y-%m-%d").to_string(),
                    weekday_ja(date.weekday()),
                    signal.is_closed,
                    "公式サイト記載の休館日",
                    signal.confidence,
                    "公式サイト",
                )
                .with_additional_info(signal.matched_context),
            );
        }
    }
    None
}
